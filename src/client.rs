//! The chat backend client and its error type.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{IntoUrl, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use crate::handler::StreamHandler;
use crate::http::{add_auth, add_extra_headers, build_http_client};
use crate::model::{ChatRequest, ChatResponse, StreamEvent, StreamRequest};
use crate::options::{ClientOptions, SecretString};
use crate::session::{StreamHandle, StreamSession};
use crate::sse::SseStreamExt;
use crate::transport::{ByteStream, StreamTransport};

pub(crate) const STREAM_PATH: &str = "/api/chat/stream";
pub(crate) const MESSAGE_PATH: &str = "/api/chat/message";
pub(crate) const HEALTH_PATH: &str = "/health";

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// True when the error was raised by cancelling the request rather than
    /// by a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// HTTP status for non-success responses.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Build a status error from a response body. The backend reports
    /// failures as `{"detail": ...}`; other bodies are kept verbatim.
    pub(crate) fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|value| value.get("detail").cloned())
            .map(|detail| match detail {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            });

        ClientError::Status {
            status: status.as_u16(),
            body: detail.unwrap_or_else(|| body.to_string()),
        }
    }
}

/// HTTP client for the chat backend.
///
/// Constructed explicitly and passed where needed. Cloning is cheap and
/// clones share the connection pool; each clone has its own auth token.
///
/// # Example
/// ```no_run
/// use chatwire::client::ChatClient;
/// use chatwire::handler::Callbacks;
/// use chatwire::model::StreamRequest;
/// use chatwire::options::ClientOptions;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut client = ChatClient::new(ClientOptions::new("http://localhost:8000"))?;
///     client.set_auth_token("token");
///
///     let handle = client.open_stream(
///         StreamRequest::new("Hello!"),
///         Callbacks::new().with_message(|event| print!("{}", event.text())),
///     );
///     handle.join().await;
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    options: ClientOptions,
}

impl ChatClient {
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let http = build_http_client(&options)?;
        Ok(Self { http, options })
    }

    /// Client configured from the environment, see [`ClientOptions::from_env`].
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientOptions::from_env()?)
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Attach `Authorization: Bearer <token>` to every subsequent request.
    pub fn set_auth_token(&mut self, token: impl Into<SecretString>) {
        self.options.auth_token = Some(token.into());
    }

    pub fn clear_auth_token(&mut self) {
        self.options.auth_token = None;
    }

    /// Request with auth and extra headers applied, without a total timeout.
    fn request(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        let req = self.http.request(method, url);
        let req = add_auth(req, &self.options.auth_token);
        add_extra_headers(req, &self.options.extra_headers)
    }

    /// Request for a plain call, bounded by the configured timeout.
    pub(crate) fn plain(&self, method: Method, url: impl IntoUrl) -> RequestBuilder {
        let req = self.request(method, url);
        match self.options.timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        }
    }

    /// Send and fail on non-success status.
    pub(crate) async fn execute(
        &self,
        req: RequestBuilder,
    ) -> Result<reqwest::Response, ClientError> {
        let response = req.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, &body));
        }
        Ok(response)
    }

    pub(crate) async fn execute_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.execute(req).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send one message and wait for the complete reply.
    pub async fn send_message(&self, request: &ChatRequest) -> Result<ChatResponse, ClientError> {
        let body = ChatRequest {
            stream: Some(false),
            ..request.clone()
        };
        let req = self
            .plain(Method::POST, self.options.url(MESSAGE_PATH))
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        self.execute_json(req).await
    }

    /// True when `GET /health` answers with a success status.
    pub async fn health_check(&self) -> bool {
        match self.plain(Method::GET, self.options.url(HEALTH_PATH)).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, "health check failed");
                false
            }
        }
    }

    /// Open a callback-driven stream session for `request`.
    ///
    /// # Panics
    /// Must be called from within a tokio runtime.
    pub fn open_stream<H: StreamHandler>(
        &self,
        request: StreamRequest,
        handler: H,
    ) -> StreamHandle {
        StreamSession::new(self.clone()).open(request, handler)
    }

    /// Stream events for `request` as a pull-style stream.
    ///
    /// Ends at the `[DONE]` sentinel or the end of the body. Dropping the
    /// stream cancels the request.
    pub async fn stream_events(
        &self,
        request: &StreamRequest,
    ) -> Result<impl Stream<Item = Result<StreamEvent, ClientError>> + Send, ClientError> {
        let body = self.open(request).await?;
        Ok(body.sse_events())
    }
}

#[async_trait]
impl StreamTransport for ChatClient {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, ClientError> {
        let req = self
            .request(Method::POST, self.options.url(STREAM_PATH))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&ChatRequest::from(request));

        let response = self.execute(req).await?;
        debug!(status = %response.status(), "stream response started");

        Ok(Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(ClientError::from))))
    }
}
