//! Session management example using the plain endpoints.
//!
//! Run with:
//! ```bash
//! export CHATWIRE_BASE_URL="http://localhost:8000"
//! cargo run --example sessions
//! ```

use chatwire::model::ChatRequest;
use chatwire::ChatClient;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let client = ChatClient::from_env()?;

    if !client.health_check().await {
        eprintln!("backend at {} is not reachable", client.options().base_url);
        return Ok(());
    }

    let session = client.create_session(Some("Rust questions")).await?;
    println!("Created session {} ({})", session.id, session.title);

    let reply = client
        .send_message(&ChatRequest::new("What is a lifetime?").with_session(session.id.clone()))
        .await?;
    println!("Assistant: {}", reply.message.content);

    for message in client.session_messages(&session.id).await? {
        println!("[{:?}] {}", message.role, message.content);
    }

    println!("\nAll sessions:");
    for s in client.list_sessions().await? {
        println!("- {} {} (active: {})", s.id, s.title, s.is_active);
    }

    client.delete_session(&session.id).await?;
    println!("Deleted session {}", session.id);
    Ok(())
}
