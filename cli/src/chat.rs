use anyhow::Result;
use appointbot_core::AgentLoop;
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::path::PathBuf;
use termimad::MadSkin;

const PROMPT: &str = "you › ";

fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".appointbot").join("chat_history"))
}

fn print_reply(skin: &MadSkin, reply: &str) {
    println!();
    skin.print_text(reply);
    println!();
}

/// Sends a single message and prints the reply.
pub async fn run_once(agent: &AgentLoop, message: &str, thread_id: &str) -> Result<()> {
    let reply = agent.chat(message, thread_id).await?;
    print_reply(&MadSkin::default(), &reply);
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Quit,
}

/// `/new` only switches to a fresh id; the previous thread stays stored and
/// can be resumed with `--thread`.
async fn handle_line(
    agent: &AgentLoop,
    skin: &MadSkin,
    input: &str,
    thread_id: &mut String,
) -> Step {
    match input {
        "/exit" | "/quit" => return Step::Quit,
        "/new" => {
            *thread_id = uuid::Uuid::new_v4().to_string();
            println!("{} {}", style("new thread:").green(), style(&*thread_id).dim());
            return Step::Continue;
        }
        _ => {}
    }

    match agent.chat(input, thread_id.as_str()).await {
        Ok(reply) => print_reply(skin, &reply),
        Err(e) => {
            tracing::error!(thread_id = %thread_id, "chat failed: {:#}", e);
            eprintln!("{} {}", style("error:").red().bold(), e);
        }
    }
    Step::Continue
}

pub async fn run_repl(agent: &AgentLoop, thread_id: String) -> Result<()> {
    let skin = MadSkin::default();
    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history {
        let _ = editor.load_history(path);
    }

    let mut thread_id = thread_id;

    println!("{}", style("Doctor Appointment Booking Assistant").cyan().bold());
    println!(
        "{}",
        style("Commands: /new starts a new conversation, /exit quits (Ctrl+D works too).").dim()
    );
    println!("{} {}", style("thread:").dim(), style(&thread_id).dim());
    println!();

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(input);

        if handle_line(agent, &skin, input, &mut thread_id).await == Step::Quit {
            break;
        }
    }

    if let Some(path) = &history {
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        if let Err(e) = editor.save_history(path) {
            tracing::debug!("could not save chat history: {}", e);
        }
    }
    println!("{}", style("Goodbye!").dim());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use appointbot_core::{
        ChatRequest, ChatResponse, ContextBuilder, FileCheckpointer, Provider, ToolRegistry,
    };
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixed;

    #[async_trait]
    impl Provider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn chat(&self, _request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
            Ok(ChatResponse {
                text: Some("noted".into()),
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn new_command_keeps_previous_thread() {
        let tmp = TempDir::new().unwrap();
        let agent = AgentLoop::new(
            Arc::new(Fixed),
            ContextBuilder::new(),
            Arc::new(ToolRegistry::new()),
            Arc::new(FileCheckpointer::new(tmp.path()).unwrap()),
        );
        let skin = MadSkin::default();
        let mut thread_id = "first".to_string();

        assert_eq!(handle_line(&agent, &skin, "I'm John", &mut thread_id).await, Step::Continue);
        assert_eq!(handle_line(&agent, &skin, "/new", &mut thread_id).await, Step::Continue);

        assert_ne!(thread_id, "first");
        assert_eq!(agent.history("first").await.unwrap().len(), 2);
        assert!(agent.history(&thread_id).await.unwrap().is_empty());
        assert_eq!(handle_line(&agent, &skin, "/exit", &mut thread_id).await, Step::Quit);
    }
}
