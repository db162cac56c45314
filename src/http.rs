//! HTTP client utilities for talking to the chat backend.
//!
//! Client construction and per-request header handling shared by the
//! streaming transport and the plain session endpoints.

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder};
use std::collections::HashMap;
use tracing::warn;

use crate::options::{ClientOptions, SecretString};

/// Build a configured HTTP client from client options.
///
/// No total timeout is set here: it would also cut long-running streams.
/// Plain calls apply [`ClientOptions::timeout`] per request instead.
pub fn build_http_client(options: &ClientOptions) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = options.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    if let Some(proxy_url) = &options.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy url"),
        }
    }

    builder.build()
}

/// Add extra headers to a request if any are configured.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// Attach `Authorization: Bearer <token>` when a token is set.
pub fn add_auth(request: RequestBuilder, token: &Option<SecretString>) -> RequestBuilder {
    match token {
        Some(token) => request.header(AUTHORIZATION, bearer(token)),
        None => request,
    }
}

pub(crate) fn bearer(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}
