//! # chatwire - streaming chat client
//!
//! Client library for a conversational backend that answers either with one
//! complete message or with a server-sent event stream of incremental chunks.
//!
//! ## Features
//! - Async-first, tokio based
//! - Incremental SSE decoding that survives split lines and split UTF-8
//! - Cancellable stream sessions with exactly one terminal notification
//! - Callback, channel or pull-style consumption of stream events
//! - Bindings for the session management endpoints
//!
//! ## Architecture
//!
//! Bytes flow from a [`StreamTransport`](transport::StreamTransport) through the
//! [`LineDecoder`](decoder::LineDecoder) and the record parser in [`sse`] to a
//! [`StreamHandler`](handler::StreamHandler). A
//! [`StreamSession`](session::StreamSession) owns that pipeline for one exchange
//! and reconciles end of body, the `[DONE]` sentinel, errors and cancellation
//! into a single `on_close` or `on_error`.
//!
//! [`ChatClient`](client::ChatClient) is the HTTP transport and also exposes the
//! plain endpoints. It is an ordinary value: construct it, configure its auth
//! token and pass it around.
//!
//! ## Example
//! ```no_run
//! use chatwire::client::ChatClient;
//! use chatwire::handler::StreamNotification;
//! use chatwire::model::{StreamRequest, Transcript};
//! use chatwire::options::ClientOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ChatClient::new(ClientOptions::default())?;
//!
//!     let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
//!     let _handle = client.open_stream(StreamRequest::new("Hello!"), tx);
//!
//!     let mut transcript = Transcript::new();
//!     while let Some(notification) = rx.recv().await {
//!         match notification {
//!             StreamNotification::Message(event) => transcript.push(&event),
//!             StreamNotification::Error(e) => return Err(e.into()),
//!             StreamNotification::Close => break,
//!             StreamNotification::Open => {}
//!         }
//!     }
//!     println!("{}", transcript.content);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod decoder;
pub mod handler;
pub mod http;
pub mod model;
pub mod options;
pub mod session;
pub mod sessions;
pub mod sse;
pub mod transport;

// Re-exports for convenience
pub use client::{ChatClient, ClientError};
pub use handler::{Callbacks, StreamHandler, StreamNotification};
pub use model::{StreamEvent, StreamRequest, ToolCall, Transcript};
pub use options::ClientOptions;
pub use session::{SessionState, StreamHandle, StreamSession};
pub use transport::StreamTransport;
