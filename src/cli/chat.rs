//! Line-oriented interactive chat over one session.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::cli::{build_gateway, open_transcript, TurnArgs};
use crate::core::chat_stream::{StreamMessage, StreamOutcome};
use crate::core::config::Config;
use crate::core::gateway::{ChatGateway, TurnOptions};
use crate::core::session::{SessionId, SessionManager};

const SESSION: SessionId = 1;

/// What a line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum ChatInput<'a> {
    Quit,
    Clear,
    Empty,
    Prompt(&'a str),
}

pub fn parse_input(line: &str) -> ChatInput<'_> {
    match line.trim() {
        "" => ChatInput::Empty,
        "/quit" | "/exit" => ChatInput::Quit,
        "/clear" => ChatInput::Clear,
        text => ChatInput::Prompt(text),
    }
}

pub async fn run_chat(
    config: &Config,
    provider: Option<String>,
    turn: TurnArgs,
) -> Result<(), Box<dyn Error>> {
    let backend = config.resolve_backend(provider.as_deref(), turn.model.as_deref())?;
    let search = turn.search_enabled(config);
    let banner = format!(
        "chatgate: {} via {} ({})",
        backend.model, backend.base_url, backend.protocol
    );

    let (gateway, mut rx) = build_gateway(config, SessionManager::new(Some(backend)), search);
    let transcript = open_transcript(&turn, "chatgate chat")?;

    match gateway.search_provider() {
        Some(provider) => eprintln!("{banner}, web search via {}", provider.name()),
        None => eprintln!("{banner}"),
    }
    if let Some(path) = transcript.path() {
        eprintln!("Logging to {}", path.display());
    }
    eprintln!("Type /clear to start over, /quit to leave. Ctrl+C stops a reply.");
    let options = TurnOptions {
        search,
        backend_override: None,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            // the handler replaces the default one, so Ctrl+C at the prompt has to quit
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match parse_input(&line) {
            ChatInput::Quit => break,
            ChatInput::Empty => continue,
            ChatInput::Clear => {
                gateway
                    .sessions()
                    .with(|manager| manager.clear_messages(SESSION));
                transcript.log_note("conversation cleared")?;
                eprintln!("Conversation cleared.");
            }
            ChatInput::Prompt(text) => {
                transcript.log_prompt("You", text)?;
                let before = history_len(&gateway);
                let outcome = chat_turn(&gateway, &mut rx, text, options.clone()).await;
                // a turn cancelled before any text is dropped from the history
                if history_len(&gateway) > before {
                    if let Some(reply) = gateway
                        .sessions()
                        .messages(SESSION)
                        .and_then(|messages| messages.last().cloned())
                    {
                        transcript.log_reply(&reply)?;
                    }
                }
                if outcome == Some(StreamOutcome::Cancelled) {
                    transcript.log_note("reply cancelled")?;
                }
            }
        }
    }
    Ok(())
}

fn history_len(gateway: &ChatGateway) -> usize {
    gateway
        .sessions()
        .messages(SESSION)
        .map_or(0, |messages| messages.len())
}

/// Runs one turn, echoing chunks and cancelling on Ctrl+C. `None` when the turn failed.
async fn chat_turn(
    gateway: &ChatGateway,
    rx: &mut UnboundedReceiver<(StreamMessage, SessionId)>,
    text: &str,
    options: TurnOptions,
) -> Option<StreamOutcome> {
    let printer = async {
        let mut stdout = io::stdout();
        let mut interrupted = false;
        loop {
            tokio::select! {
                message = rx.recv() => match message {
                    Some((StreamMessage::Chunk(chunk), _)) => {
                        print!("{chunk}");
                        let _ = stdout.flush();
                    }
                    Some((StreamMessage::End, _)) => {
                        println!();
                        if interrupted {
                            eprintln!("[cancelled]");
                        }
                        break;
                    }
                    Some((StreamMessage::Error(err), _)) => {
                        eprintln!("\n❌ {err}");
                        break;
                    }
                    None => break,
                },
                signal = tokio::signal::ctrl_c(), if !interrupted => {
                    interrupted = true;
                    if signal.is_ok() {
                        gateway.cancel(SESSION);
                    }
                }
            }
        }
    };

    let (result, ()) = tokio::join!(gateway.send_turn(SESSION, text, options), printer);
    result.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_prompts() {
        assert_eq!(parse_input("  /quit "), ChatInput::Quit);
        assert_eq!(parse_input("/exit"), ChatInput::Quit);
        assert_eq!(parse_input("/clear"), ChatInput::Clear);
        assert_eq!(parse_input("   "), ChatInput::Empty);
        assert_eq!(
            parse_input(" what is a monad? "),
            ChatInput::Prompt("what is a monad?")
        );
        assert_eq!(parse_input("/quitting"), ChatInput::Prompt("/quitting"));
    }
}
