//! Client configuration.

use reqwest::Url;
use std::collections::HashMap;
use std::time::Duration;

use crate::client::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const ENV_BASE_URL: &str = "CHATWIRE_BASE_URL";
pub const ENV_TOKEN: &str = "CHATWIRE_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "CHATWIRE_TIMEOUT_SECS";

/// A secret string type for sensitive data like auth tokens.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Connection settings for [`ChatClient`](crate::client::ChatClient).
///
/// # Example
/// ```rust
/// use chatwire::options::ClientOptions;
/// use std::time::Duration;
///
/// let options = ClientOptions::new("http://localhost:8000")
///     .with_auth_token("secret")
///     .with_timeout(Duration::from_secs(10));
/// assert_eq!(options.base_url, "http://localhost:8000");
/// ```
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of the chat backend, without a trailing slash
    pub base_url: String,

    /// Bearer token attached to every request
    pub auth_token: Option<SecretString>,

    /// Total timeout for plain request/response calls. Streaming calls never
    /// time out on their own.
    pub timeout: Option<Duration>,

    /// Timeout for establishing the TCP connection (all calls)
    pub connect_timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token: None,
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: None,
            proxy: None,
            extra_headers: None,
        }
    }

    /// Build options from `CHATWIRE_BASE_URL`, `CHATWIRE_TOKEN` and
    /// `CHATWIRE_TIMEOUT_SECS`. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let mut options = match lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            Some(base_url) => Self::new(base_url.trim()),
            None => Self::default(),
        };

        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.is_empty()) {
            options.auth_token = Some(SecretString::new(token));
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!(
                    "{} must be a whole number of seconds, got {:?}",
                    ENV_TIMEOUT_SECS, raw
                ))
            })?;
            options.timeout = Some(Duration::from_secs(secs));
        }

        Ok(options)
    }

    /// Set the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<SecretString>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Set the timeout for plain calls.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Disable the timeout for plain calls.
    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }

    /// Absolute URL for an API path such as `/api/chat/stream`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL for `path` followed by `segments`. Each segment is percent-encoded
    /// as a single path segment, so `/`, `?` and `#` cannot escape it.
    pub fn url_with_segments(&self, path: &str, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.url(path)).map_err(|e| {
            ClientError::Config(format!("invalid base url {:?}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::Config(format!("base url {:?} cannot take a path", self.base_url))
            })?
            .extend(segments);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let options = ClientOptions::default();
        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert_eq!(options.timeout, Some(DEFAULT_TIMEOUT));
        assert!(options.auth_token.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let options = ClientOptions::new("http://example.com/");
        assert_eq!(options.url("/health"), "http://example.com/health");
    }

    #[test]
    fn test_url_with_segments_encodes_each_segment() {
        let options = ClientOptions::new("http://example.com/base/");
        let url = options
            .url_with_segments("/api/chat/sessions", &["a/b?c#d", "messages"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://example.com/base/api/chat/sessions/a%2Fb%3Fc%23d/messages"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let err = ClientOptions::new("not a url").url_with_segments("/x", &["y"]).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let options = ClientOptions::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://chat.internal:9000"),
            (ENV_TOKEN, "tok"),
            (ENV_TIMEOUT_SECS, "5"),
        ]))
        .unwrap();

        assert_eq!(options.base_url, "http://chat.internal:9000");
        assert_eq!(options.auth_token.unwrap().expose_secret(), "tok");
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_from_lookup_rejects_bad_timeout() {
        let err = ClientOptions::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.contains(ENV_TIMEOUT_SECS)));
    }

    #[test]
    fn test_from_lookup_empty_values_keep_defaults() {
        let options = ClientOptions::from_lookup(lookup(&[
            (ENV_BASE_URL, "  "),
            (ENV_TOKEN, ""),
            (ENV_TIMEOUT_SECS, ""),
        ]))
        .unwrap();

        assert_eq!(options.base_url, DEFAULT_BASE_URL);
        assert!(options.auth_token.is_none());
        assert_eq!(options.timeout, Some(DEFAULT_TIMEOUT));

        let options = ClientOptions::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, " ")])).unwrap();
        assert_eq!(options.timeout, Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_secret_is_redacted() {
        let options = ClientOptions::default().with_auth_token("very-secret");
        let printed = format!("{:?}", options);
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("REDACTED"));
    }
}
