use crate::app::App;
use anyhow::Result;
use appointbot_core::records::{AppointmentFilter, AppointmentRecord};
use appointbot_core::{AgentLoop, SharedLedger};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument};

pub const WELCOME_MESSAGE: &str =
    "Hi! Welcome to our Doctor Appointment Booking Service. How can I help you today?";

#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentLoop>,
    pub ledger: SharedLedger,
}

impl From<App> for AppState {
    fn from(app: App) -> Self {
        Self {
            agent: app.agent,
            ledger: app.ledger,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/new_chat", post(new_chat))
        .route("/appointments", get(list_appointments))
        .route("/appointments/filter", get(filter_appointments))
        .route("/appointments/{id}", get(get_appointment))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(app: App, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, router(app.into()))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

/// Error returned by handlers, rendered as `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    pub conversation_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub response: String,
    pub conversation_id: String,
    pub timestamp: String,
}

impl ChatReply {
    fn new(response: String, conversation_id: String) -> Self {
        Self {
            response,
            conversation_id,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AppointmentList {
    pub appointments: Vec<AppointmentRecord>,
    pub count: usize,
}

impl From<Vec<AppointmentRecord>> for AppointmentList {
    fn from(appointments: Vec<AppointmentRecord>) -> Self {
        Self {
            count: appointments.len(),
            appointments,
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[instrument(skip(state, body), fields(conversation_id = tracing::field::Empty))]
async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let message = body.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("No message provided".to_string()));
    }

    let conversation_id = body
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::Span::current().record("conversation_id", conversation_id.as_str());

    let response = state
        .agent
        .chat(message, &conversation_id)
        .await
        .map_err(|e| {
            error!("chat failed: {:#}", e);
            ApiError::from(e)
        })?;

    Ok(Json(ChatReply::new(response, conversation_id)))
}

#[instrument]
async fn new_chat() -> Json<ChatReply> {
    Json(ChatReply::new(
        WELCOME_MESSAGE.to_string(),
        uuid::Uuid::new_v4().to_string(),
    ))
}

fn with_ledger<T>(
    ledger: &SharedLedger,
    f: impl FnOnce(&appointbot_core::PatientLedger) -> T,
) -> Result<T, ApiError> {
    let ledger = ledger
        .lock()
        .map_err(|_| ApiError::Internal("appointment store lock poisoned".to_string()))?;
    Ok(f(&ledger))
}

#[instrument(skip(state))]
async fn list_appointments(
    State(state): State<AppState>,
) -> Result<Json<AppointmentList>, ApiError> {
    let appointments = with_ledger(&state.ledger, |l| l.filter(&AppointmentFilter::default()))?;
    Ok(Json(appointments.into()))
}

#[instrument(skip(state))]
async fn filter_appointments(
    State(state): State<AppState>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<AppointmentList>, ApiError> {
    let appointments = with_ledger(&state.ledger, |l| l.filter(&filter))?;
    Ok(Json(appointments.into()))
}

#[instrument(skip(state))]
async fn get_appointment(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<AppointmentRecord>, ApiError> {
    with_ledger(&state.ledger, |l| l.get(id).cloned())?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use appointbot_core::records::NewAppointment;
    use appointbot_core::{
        ChatRequest as ModelRequest, ChatResponse, ContextBuilder, InMemoryCheckpointer,
        PatientLedger, Provider, ToolRegistry,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct EchoProvider {
        fail: bool,
    }

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        async fn chat(&self, request: ModelRequest<'_>) -> anyhow::Result<ChatResponse> {
            if self.fail {
                anyhow::bail!("model offline");
            }
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse {
                text: Some(format!("echo: {}", last)),
                ..Default::default()
            })
        }
    }

    fn state(tmp: &TempDir, fail: bool) -> AppState {
        let ledger = PatientLedger::open(tmp.path().join("patients.csv")).unwrap();
        let agent = AgentLoop::new(
            Arc::new(EchoProvider { fail }),
            ContextBuilder::new(),
            Arc::new(ToolRegistry::new()),
            Arc::new(InMemoryCheckpointer::new()),
        );
        AppState {
            agent: Arc::new(agent),
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    fn book(state: &AppState, patient: &str, doctor: &str, date: &str) -> u32 {
        state
            .ledger
            .lock()
            .unwrap()
            .book(NewAppointment {
                patient_name: patient.into(),
                patient_age: 40,
                doctor_id: 0,
                doctor_name: doctor.into(),
                specialty: "Cardiology".into(),
                appointment_date: date.into(),
                slot_timing: "09:00-10:00".into(),
                symptoms: String::new(),
            })
            .unwrap()
            .appointment_id
    }

    #[tokio::test]
    async fn chat_assigns_conversation_id() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, false);

        let Json(reply) = chat(
            State(state.clone()),
            Json(ChatRequest {
                message: "  hello  ".into(),
                conversation_id: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(reply.response, "echo: hello");
        assert!(uuid::Uuid::parse_str(&reply.conversation_id).is_ok());
        assert_eq!(state.agent.history(&reply.conversation_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn chat_keeps_given_conversation_id() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, false);

        let Json(reply) = chat(
            State(state),
            Json(ChatRequest {
                message: "hi".into(),
                conversation_id: Some("abc".into()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(reply.conversation_id, "abc");
    }

    #[tokio::test]
    async fn blank_message_is_bad_request() {
        let tmp = TempDir::new().unwrap();
        let err = chat(
            State(state(&tmp, false)),
            Json(ChatRequest {
                message: "   ".into(),
                conversation_id: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_is_internal_error() {
        let tmp = TempDir::new().unwrap();
        let err = chat(
            State(state(&tmp, true)),
            Json(ChatRequest {
                message: "hi".into(),
                conversation_id: Some("t".into()),
            }),
        )
        .await
        .unwrap_err();

        assert!(matches!(&err, ApiError::Internal(m) if m.contains("model offline")));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn new_chat_returns_welcome() {
        let Json(reply) = new_chat().await;
        assert_eq!(reply.response, WELCOME_MESSAGE);
        assert!(!reply.conversation_id.is_empty());
    }

    #[tokio::test]
    async fn appointments_list_and_filter() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, false);
        book(&state, "Ann", "Dr. Smith", "2025-03-10");
        let second = book(&state, "Bob", "Dr. Chen", "2025-03-12");
        state.ledger.lock().unwrap().cancel(second).unwrap();

        let Json(all) = list_appointments(State(state.clone())).await.unwrap();
        assert_eq!(all.count, 2);
        assert_eq!(all.appointments[0].patient_name, "Bob");

        let Json(confirmed) = filter_appointments(
            State(state.clone()),
            Query(AppointmentFilter {
                status: Some("confirmed".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(confirmed.count, 1);
        assert_eq!(confirmed.appointments[0].patient_name, "Ann");

        let Json(by_doctor) = filter_appointments(
            State(state),
            Query(AppointmentFilter {
                doctor: Some("chen".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(by_doctor.count, 1);
    }

    #[tokio::test]
    async fn appointment_lookup_by_id() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, false);
        let id = book(&state, "Ann", "Dr. Smith", "2025-03-10");

        let Json(record) = get_appointment(State(state.clone()), Path(id)).await.unwrap();
        assert_eq!(record.patient_name, "Ann");

        let missing = get_appointment(State(state), Path(999)).await.unwrap_err();
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }
}
