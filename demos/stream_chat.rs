//! Streaming chat example.
//!
//! Run with:
//! ```bash
//! export CHATWIRE_BASE_URL="http://localhost:8000"
//! cargo run --example stream_chat -- "Write a haiku about Rust programming."
//! ```
//!
//! Press Ctrl-C while the reply is streaming to cancel it.

use std::io::Write;

use chatwire::handler::StreamNotification;
use chatwire::model::{StreamEvent, StreamRequest, Transcript};
use chatwire::ChatClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let message = std::env::args()
        .skip(1)
        .collect::<Vec<_>>()
        .join(" ");
    if message.trim().is_empty() {
        eprintln!("usage: stream_chat <message>");
        return Ok(());
    }

    let client = ChatClient::from_env()?;
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let handle = client.open_stream(StreamRequest::new(message), tx);

    let mut transcript = Transcript::new();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                handle.close();
            }
            notification = rx.recv() => {
                let Some(notification) = notification else { break };
                match notification {
                    StreamNotification::Open => print!("Response: "),
                    StreamNotification::Message(event) => {
                        print!("{}", event.text());
                        std::io::stdout().flush()?;
                        if let StreamEvent::Final { tool_calls, .. } = &event {
                            for call in tool_calls {
                                println!("\n[tool call] {} {:?}", call.name, call.arguments);
                            }
                        }
                        transcript.push(&event);
                    }
                    StreamNotification::Error(e) => {
                        // The core never retries; show a fallback instead
                        eprintln!("\nSorry, the reply could not be delivered ({}).", e);
                        break;
                    }
                    StreamNotification::Close => {
                        println!();
                        break;
                    }
                }
            }
        }
    }

    println!(
        "\n=== {} characters received, complete: {} ===",
        transcript.content.chars().count(),
        transcript.complete
    );
    Ok(())
}
