//! Session management endpoints.
//!
//! Plain request/response calls: no streaming, no retry.

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::Serialize;
use tracing::debug;

use crate::client::{ChatClient, ClientError};
use crate::model::{ChatMessage, ChatSession};
use crate::options::ClientOptions;

const SESSIONS_PATH: &str = "/api/chat/sessions";

#[derive(Debug, Serialize)]
struct CreateSession<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

fn session_url(
    options: &ClientOptions,
    session_id: &str,
    tail: Option<&str>,
) -> Result<Url, ClientError> {
    if matches!(session_id.trim(), "" | "." | "..") {
        return Err(ClientError::Config(format!("invalid session id {:?}", session_id)));
    }
    let mut segments = vec![session_id];
    segments.extend(tail);
    options.url_with_segments(SESSIONS_PATH, &segments)
}

impl ChatClient {
    /// Create a session. Without a title the backend picks its default.
    pub async fn create_session(&self, title: Option<&str>) -> Result<ChatSession, ClientError> {
        let req = self
            .plain(Method::POST, self.options().url(SESSIONS_PATH))
            .header(CONTENT_TYPE, "application/json")
            .json(&CreateSession { title });
        let session: ChatSession = self.execute_json(req).await?;
        debug!(session_id = %session.id, "created session");
        Ok(session)
    }

    pub async fn list_sessions(&self) -> Result<Vec<ChatSession>, ClientError> {
        let url = self.options().url(SESSIONS_PATH);
        self.execute_json(self.plain(Method::GET, url)).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<ChatSession, ClientError> {
        let url = session_url(self.options(), session_id, None)?;
        self.execute_json(self.plain(Method::GET, url)).await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<(), ClientError> {
        let url = session_url(self.options(), session_id, None)?;
        self.execute(self.plain(Method::DELETE, url)).await?;
        debug!(session_id, "deleted session");
        Ok(())
    }

    /// All messages of a session, oldest first.
    pub async fn session_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, ClientError> {
        let url = session_url(self.options(), session_id, Some("messages"))?;
        self.execute_json(self.plain(Method::GET, url)).await
    }
}
