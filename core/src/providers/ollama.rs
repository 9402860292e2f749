use crate::traits::{ChatMessage, ChatRequest, ChatResponse, Provider, ToolCall, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatBody {
    model: String,
    messages: Vec<OutgoingMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ModelOptions>,
    stream: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct OutgoingMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OutgoingToolCall>>,
}

#[derive(Debug, Serialize, PartialEq)]
struct OutgoingToolCall {
    function: OutgoingFunction,
}

#[derive(Debug, Serialize, PartialEq)]
struct OutgoingFunction {
    name: String,
    arguments: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ToolSchema {
    r#type: String,
    function: FunctionSchema,
}

#[derive(Debug, Serialize)]
struct FunctionSchema {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ModelOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: IncomingMessage,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    content: Option<String>,
    tool_calls: Option<Vec<IncomingToolCall>>,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncomingToolCall {
    function: IncomingFunction,
}

#[derive(Debug, Deserialize)]
struct IncomingFunction {
    name: String,
    arguments: serde_json::Value,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OllamaProvider {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            temperature: 0.2,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let url = base_url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Not every local model family understands the `tool` role, so each run
    /// of tool results is sent as a single user message.
    fn convert_messages(messages: &[ChatMessage]) -> Vec<OutgoingMessage> {
        let mut result = Vec::new();
        let mut pending_results: Vec<String> = Vec::new();

        for m in messages {
            if m.role == "tool" {
                let tool_call_id = m.tool_call_id.as_deref().unwrap_or("unknown");
                pending_results.push(format!(
                    "<tool_result id=\"{}\">\n{}\n</tool_result>",
                    tool_call_id, m.content
                ));
                continue;
            }

            Self::flush_tool_results(&mut pending_results, &mut result);

            let tool_calls = m.tool_calls.as_ref().map(|tcs| {
                tcs.iter()
                    .map(|tc| OutgoingToolCall {
                        function: OutgoingFunction {
                            name: tc.name.clone(),
                            arguments: serde_json::from_str(&tc.arguments)
                                .unwrap_or(serde_json::Value::Null),
                        },
                    })
                    .collect()
            });

            result.push(OutgoingMessage {
                role: m.role.clone(),
                content: if m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                },
                tool_calls,
            });
        }

        Self::flush_tool_results(&mut pending_results, &mut result);
        result
    }

    fn flush_tool_results(buffer: &mut Vec<String>, out: &mut Vec<OutgoingMessage>) {
        if buffer.is_empty() {
            return;
        }
        out.push(OutgoingMessage {
            role: "user".to_string(),
            content: Some(format!("[Tool results]\n{}", buffer.join("\n"))),
            tool_calls: None,
        });
        buffer.clear();
    }

    fn convert_tools(tools: &[ToolSpec]) -> Vec<ToolSchema> {
        tools
            .iter()
            .map(|t| ToolSchema {
                r#type: "function".to_string(),
                function: FunctionSchema {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters_schema.clone(),
                },
            })
            .collect()
    }

    fn into_chat_response(response: ChatReply) -> ChatResponse {
        let tool_calls: Vec<ToolCall> = response
            .message
            .tool_calls
            .map(|tcs| {
                tcs.into_iter()
                    .map(|tc| ToolCall {
                        id: format!("ollama_{}", uuid::Uuid::new_v4()),
                        name: tc.function.name,
                        arguments: serde_json::to_string(&tc.function.arguments)
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let content = response.message.content;

        // Reasoning models sometimes stop after thinking without an answer.
        let text = if content.as_ref().is_none_or(|c| c.is_empty())
            && tool_calls.is_empty()
            && let Some(thinking) = &response.message.thinking
        {
            let preview: String = thinking.chars().take(200).collect();
            Some(format!(
                "I started working through this ({}...) but didn't reach an answer. Could you try asking again?",
                preview
            ))
        } else {
            content
        };

        ChatResponse { text, tool_calls }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let body = ChatBody {
            model: self.model.clone(),
            messages: Self::convert_messages(request.messages),
            tools: request.tools.map(Self::convert_tools),
            options: Some(ModelOptions {
                temperature: self.temperature,
            }),
            stream: false,
        };

        tracing::debug!(model = %self.model, messages = body.messages.len(), "ollama chat");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Ollama API error ({}): {}",
                status,
                error_text
            ));
        }

        let reply: ChatReply = response.json().await?;
        Ok(Self::into_chat_response(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_results_fold_into_one_user_message() {
        let messages = vec![
            ChatMessage::user("chest pain"),
            ChatMessage::assistant_with_tool_calls(
                "",
                vec![ToolCall {
                    id: "c1".into(),
                    name: "get_doctors_by_specialty".into(),
                    arguments: r#"{"specialty":"Cardiology"}"#.into(),
                }],
            ),
            ChatMessage::tool_result("c1".into(), "[]"),
            ChatMessage::tool_result("c2".into(), "{}"),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[1].content, None);
        let calls = converted[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, json!({"specialty": "Cardiology"}));

        assert_eq!(converted[2].role, "user");
        let folded = converted[2].content.as_deref().unwrap();
        assert!(folded.starts_with("[Tool results]"));
        assert!(folded.contains("<tool_result id=\"c1\">"));
        assert!(folded.contains("<tool_result id=\"c2\">"));
    }

    #[test]
    fn native_tool_calls_are_parsed() {
        let raw = json!({
            "message": {
                "content": "",
                "tool_calls": [
                    {"function": {"name": "cancel_appointment", "arguments": {"appointment_id": 4}}}
                ]
            }
        });
        let response: ChatReply = serde_json::from_value(raw).unwrap();
        let chat = OllamaProvider::into_chat_response(response);

        assert!(chat.has_tool_calls());
        assert_eq!(chat.tool_calls[0].name, "cancel_appointment");
        assert_eq!(chat.tool_calls[0].arguments, r#"{"appointment_id":4}"#);
        assert!(chat.tool_calls[0].id.starts_with("ollama_"));
    }

    #[test]
    fn thinking_without_answer_becomes_retry_hint() {
        let raw = json!({"message": {"content": "", "thinking": "the user wants a cardiologist"}});
        let response: ChatReply = serde_json::from_value(raw).unwrap();
        let chat = OllamaProvider::into_chat_response(response);

        assert!(chat.text_or_empty().contains("the user wants a cardiologist"));
        assert!(chat.text_or_empty().contains("try asking again"));
    }
}
