use crate::agent::{ContextBuilder, ToolRegistry};
use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, Checkpointer, Provider, ToolCall, ToolResult,
};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ITERATIONS: usize = 20;
const DEFAULT_MAX_HISTORY: usize = 50;
const COMPACT_KEEP_RECENT: usize = 20;
const COMPACTION_MAX_SOURCE_CHARS: usize = 12_000;
const COMPACTION_MAX_SUMMARY_CHARS: usize = 2_000;

pub const MAX_ITERATIONS_REPLY: &str =
    "I'm sorry, I couldn't finish that request. Could you try rephrasing it?";
pub const EMPTY_REPLY: &str = "No response from provider";

const TOOL_CALL_OPEN_TAGS: &[&str] = &["<tool_call>", "<function_call>"];
const TOOL_CALL_CLOSE_TAGS: &[&str] = &["</tool_call>", "</function_call>"];

/// Where the turn goes next. The model node either hands a batch of calls
/// to the tool node or ends the turn with a reply.
#[derive(Debug)]
enum Node {
    Agent,
    Tools(Vec<ToolCall>),
    End(String),
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    context_builder: ContextBuilder,
    tool_registry: Arc<ToolRegistry>,
    checkpointer: Arc<dyn Checkpointer>,
    max_iterations: usize,
    max_history: usize,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        context_builder: ContextBuilder,
        tool_registry: Arc<ToolRegistry>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        let context_builder = context_builder.with_tool_specs(tool_registry.get_specs());
        Self {
            provider,
            context_builder,
            tool_registry,
            checkpointer,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            max_history: DEFAULT_MAX_HISTORY,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        &self.tool_registry
    }

    /// Runs one user turn on `thread_id` and returns the assistant's reply.
    ///
    /// The thread is checkpointed only when the turn finishes; a provider
    /// error leaves the stored thread untouched.
    pub async fn chat(&self, message: &str, thread_id: &str) -> Result<String> {
        let mut history = self.checkpointer.load(thread_id).await?;
        history.push(ChatMessage::user(message));

        let mut iterations = 0;
        let mut node = Node::Agent;

        loop {
            node = match node {
                Node::Agent => {
                    if iterations >= self.max_iterations {
                        warn!(thread_id, iterations, "max iterations reached");
                        history.push(ChatMessage::assistant(MAX_ITERATIONS_REPLY));
                        Node::End(MAX_ITERATIONS_REPLY.to_string())
                    } else {
                        iterations += 1;
                        if self.should_compact_history(&history) {
                            self.compact_history(&mut history).await;
                        }
                        let response = self.call_model(&history).await?;
                        self.route(response, &mut history)
                    }
                }
                Node::Tools(calls) => {
                    self.run_tools(calls, &mut history).await;
                    Node::Agent
                }
                Node::End(reply) => {
                    self.checkpointer.save(thread_id, &history).await?;
                    info!(thread_id, iterations, messages = history.len(), "turn complete");
                    return Ok(reply);
                }
            };
        }
    }

    /// Forgets the thread. Returns whether it existed.
    pub async fn reset(&self, thread_id: &str) -> Result<bool> {
        self.checkpointer.clear(thread_id).await
    }

    pub async fn history(&self, thread_id: &str) -> Result<Vec<ChatMessage>> {
        self.checkpointer.load(thread_id).await
    }

    async fn call_model(&self, history: &[ChatMessage]) -> Result<ChatResponse> {
        let messages = self.context_builder.build_messages(history);
        let tools = self.tool_registry.get_specs();
        let request = ChatRequest {
            messages: &messages,
            tools: if tools.is_empty() { None } else { Some(&tools) },
        };
        self.provider.chat(request).await
    }

    /// Conditional edge out of the model node.
    fn route(&self, response: ChatResponse, history: &mut Vec<ChatMessage>) -> Node {
        let (assistant_text, tool_calls) = if response.has_tool_calls() {
            (response.text.unwrap_or_default(), response.tool_calls)
        } else if let Some(text) = &response.text {
            self.parse_tool_calls_fallback(text)
        } else {
            return Node::End(EMPTY_REPLY.to_string());
        };

        if tool_calls.is_empty() {
            if assistant_text.trim().is_empty() {
                return Node::End(EMPTY_REPLY.to_string());
            }
            history.push(ChatMessage::assistant(assistant_text.clone()));
            return Node::End(assistant_text);
        }

        history.push(ChatMessage::assistant_with_tool_calls(
            assistant_text,
            tool_calls.clone(),
        ));
        Node::Tools(tool_calls)
    }

    async fn run_tools(&self, calls: Vec<ToolCall>, history: &mut Vec<ChatMessage>) {
        for tool_call in calls {
            let result = match serde_json::from_str::<serde_json::Value>(&tool_call.arguments) {
                Ok(args) => {
                    debug!(tool = %tool_call.name, %args, "executing tool");
                    self.tool_registry.execute(&tool_call.name, args).await
                }
                Err(e) => ToolResult::error(format!(
                    "Failed to parse tool arguments for {}: {}",
                    tool_call.name, e
                )),
            };

            if !result.success {
                debug!(tool = %tool_call.name, error = ?result.error, "tool returned an error");
            }

            history.push(ChatMessage::tool_result(
                tool_call.id,
                serde_json::to_string(&result).unwrap_or_default(),
            ));
        }
    }

    fn should_compact_history(&self, history: &[ChatMessage]) -> bool {
        history.len() > self.max_history
    }

    async fn compact_history(&self, history: &mut Vec<ChatMessage>) {
        let keep_recent = COMPACT_KEEP_RECENT
            .min(self.max_history)
            .max(1)
            .min(history.len());
        let mut compact_end = history.len().saturating_sub(keep_recent);

        // A tool result must stay behind the assistant message that asked for it.
        while compact_end < history.len() && history[compact_end].role == "tool" {
            compact_end += 1;
        }
        if compact_end == 0 || compact_end >= history.len() {
            return;
        }

        let transcript = self.build_transcript(&history[..compact_end]);
        let summary = match self.summarize(&transcript).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "history summary failed, truncating instead");
                self.truncate_transcript(&transcript)
            }
        };

        debug!(compacted = compact_end, "history compacted");
        let summary_msg =
            ChatMessage::assistant(format!("[Conversation summary]\n{}", summary.trim()));
        history.splice(..compact_end, std::iter::once(summary_msg));
    }

    fn build_transcript(&self, messages: &[ChatMessage]) -> String {
        let mut transcript = String::new();
        for msg in messages {
            let role = msg.role.to_uppercase();
            let _ = std::fmt::write(
                &mut transcript,
                format_args!("{}: {}\n", role, msg.content.trim()),
            );
        }

        if transcript.chars().count() > COMPACTION_MAX_SOURCE_CHARS {
            self.truncate_transcript(&transcript)
        } else {
            transcript
        }
    }

    fn truncate_transcript(&self, text: &str) -> String {
        if text.chars().count() <= COMPACTION_MAX_SUMMARY_CHARS {
            return text.to_string();
        }

        let truncated: String = text.chars().take(COMPACTION_MAX_SUMMARY_CHARS).collect();
        format!("{}...", truncated)
    }

    async fn summarize(&self, transcript: &str) -> Result<String> {
        let messages = [
            ChatMessage::system(
                "You summarize conversations between a patient and a clinic booking assistant. \
                 Keep the patient's name, age, symptoms, chosen doctors, appointment ids and \
                 anything still unresolved. Stay under 2000 characters.",
            ),
            ChatMessage::user(format!("Summarize this conversation:\n\n{}", transcript)),
        ];
        let request = ChatRequest {
            messages: &messages,
            tools: None,
        };

        let response = self.provider.chat(request).await?;
        Ok(response
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.truncate_transcript(transcript)))
    }

    fn parse_tool_calls_fallback(&self, response: &str) -> (String, Vec<ToolCall>) {
        let mut text_parts = Vec::new();
        let mut calls = Vec::new();
        let mut remaining = response;

        while let Some((start, open_tag)) = self.find_first_tag(remaining, TOOL_CALL_OPEN_TAGS) {
            let Some(close_tag) = self.matching_tool_call_close_tag(open_tag) else {
                break;
            };

            // An unclosed tag leaves `remaining` whole, prefix included.
            let after_open = &remaining[start + open_tag.len()..];
            let Some(close_idx) = after_open.find(close_tag) else {
                break;
            };

            let before = &remaining[..start];
            if !before.trim().is_empty() {
                text_parts.push(before.trim().to_string());
            }

            let inner = &after_open[..close_idx];
            calls.extend(
                self.extract_json_values(inner)
                    .iter()
                    .filter_map(|value| self.parse_tool_call_value(value)),
            );
            remaining = &after_open[close_idx + close_tag.len()..];
        }

        if !remaining.trim().is_empty() {
            text_parts.push(remaining.trim().to_string());
        }

        (text_parts.join("\n"), calls)
    }

    fn find_first_tag<'a>(&self, text: &str, tags: &'a [&'a str]) -> Option<(usize, &'a str)> {
        tags.iter()
            .filter_map(|tag| text.find(tag).map(|idx| (idx, *tag)))
            .min_by_key(|(idx, _)| *idx)
    }

    fn matching_tool_call_close_tag(&self, open_tag: &str) -> Option<&'static str> {
        let idx = TOOL_CALL_OPEN_TAGS.iter().position(|&t| t == open_tag)?;
        TOOL_CALL_CLOSE_TAGS.get(idx).copied()
    }

    fn extract_json_values(&self, text: &str) -> Vec<serde_json::Value> {
        let mut values = Vec::new();
        let mut depth = 0usize;
        let mut start = None;
        let mut in_string = false;
        let mut escape_next = false;

        for (i, ch) in text.char_indices() {
            if escape_next {
                escape_next = false;
                continue;
            }
            match ch {
                '\\' if in_string => escape_next = true,
                '"' => in_string = !in_string,
                '{' if !in_string => {
                    if depth == 0 {
                        start = Some(i);
                    }
                    depth += 1;
                }
                '}' if !in_string && depth > 0 => {
                    depth -= 1;
                    if depth == 0
                        && let Some(s) = start.take()
                        && let Ok(value) = serde_json::from_str::<serde_json::Value>(&text[s..=i])
                    {
                        values.push(value);
                    }
                }
                _ => {}
            }
        }

        values
    }

    fn parse_tool_call_value(&self, value: &serde_json::Value) -> Option<ToolCall> {
        let name = value.get("name")?.as_str()?.to_string();
        let arguments = value
            .get("arguments")
            .or_else(|| value.get("parameters"))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        let arguments_str = serde_json::to_string(&arguments).ok()?;
        let digest = md5::compute(format!("{}:{}", name, arguments_str).as_bytes());

        Some(ToolCall {
            id: format!("call_{:x}", digest),
            name,
            arguments: arguments_str,
        })
    }
}
