//! One-shot "say" command

use std::error::Error;
use std::io::{self, Write};

use tokio::sync::mpsc::UnboundedReceiver;

use crate::cli::{build_gateway, open_transcript, TurnArgs};
use crate::core::chat_stream::StreamMessage;
use crate::core::config::Config;
use crate::core::gateway::{ChatGateway, TurnOptions};
use crate::core::message::Message;
use crate::core::protocol::BackendConfig;
use crate::core::session::{SessionId, SessionManager};

/// Sends one prompt. With one provider the answer streams to stdout; with several,
/// every provider is asked concurrently and each answer is printed under its name.
pub async fn run_say(
    config: &Config,
    providers: Vec<String>,
    turn: TurnArgs,
    prompt: String,
) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err("Usage: chatgate say <prompt>".into());
    }

    let targets = resolve_targets(config, &providers, turn.model.as_deref())?;
    let mut sessions = SessionManager::default();
    let mut labelled: Vec<(String, SessionId)> = Vec::with_capacity(targets.len());
    for (index, (label, backend)) in targets.into_iter().enumerate() {
        let id = if index == 0 {
            sessions.set_selection(1, Some(backend));
            1
        } else {
            sessions.create_session(Some(backend))
        };
        labelled.push((label, id));
    }

    let search = turn.search_enabled(config);
    let (gateway, rx) = build_gateway(config, sessions, search);
    let transcript = open_transcript(&turn, "chatgate say")?;
    transcript.log_prompt("You", prompt)?;

    let options = TurnOptions {
        search,
        backend_override: None,
    };
    let failures = match labelled.as_slice() {
        [(_, id)] => say_streaming(&gateway, rx, *id, prompt, options).await,
        _ => {
            drop(rx);
            say_concurrently(&gateway, &labelled, prompt, &options).await
        }
    };

    for (_, id) in &labelled {
        let reply = gateway
            .sessions()
            .messages(*id)
            .and_then(|messages| messages.last().cloned());
        if let Some(reply) = reply {
            transcript.log_reply(&reply)?;
        }
    }

    if failures > 0 {
        return Err(format!("{failures} of {} requests failed", labelled.len()).into());
    }
    Ok(())
}

fn resolve_targets(
    config: &Config,
    providers: &[String],
    model: Option<&str>,
) -> Result<Vec<(String, BackendConfig)>, Box<dyn Error>> {
    if providers.is_empty() {
        let backend = config.resolve_backend(None, model)?;
        let label = config
            .default_provider
            .clone()
            .unwrap_or_else(|| backend.protocol.to_string());
        return Ok(vec![(label, backend)]);
    }
    providers
        .iter()
        .map(|provider| {
            let backend = config.resolve_backend(Some(provider), model)?;
            Ok((provider.clone(), backend))
        })
        .collect()
}

/// Returns the number of failed turns (0 or 1).
async fn say_streaming(
    gateway: &ChatGateway,
    mut rx: UnboundedReceiver<(StreamMessage, SessionId)>,
    id: SessionId,
    prompt: &str,
    options: TurnOptions,
) -> usize {
    let printer = async {
        let mut stdout = io::stdout();
        while let Some((message, _)) = rx.recv().await {
            match message {
                StreamMessage::Chunk(text) => {
                    print!("{text}");
                    let _ = stdout.flush();
                }
                StreamMessage::End => {
                    println!();
                    break;
                }
                StreamMessage::Error(err) => {
                    eprintln!("\n❌ {err}");
                    break;
                }
            }
        }
    };

    let (result, ()) = tokio::join!(gateway.send_turn(id, prompt, options), printer);
    usize::from(result.is_err())
}

async fn say_concurrently(
    gateway: &ChatGateway,
    labelled: &[(String, SessionId)],
    prompt: &str,
    options: &TurnOptions,
) -> usize {
    let ids: Vec<SessionId> = labelled.iter().map(|(_, id)| *id).collect();
    let results = gateway.send_to_sessions(&ids, prompt, options).await;

    let mut failures = 0;
    for ((label, _), (id, result)) in labelled.iter().zip(results) {
        if result.is_err() {
            failures += 1;
        }
        let reply = gateway
            .sessions()
            .messages(id)
            .and_then(|messages| messages.last().cloned())
            .filter(Message::is_assistant)
            .map(|message| message.content)
            .unwrap_or_default();
        println!("=== {label} ===");
        println!("{reply}");
        println!();
    }
    failures
}
