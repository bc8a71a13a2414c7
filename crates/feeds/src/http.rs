//! Shared HTTP helpers for the fetchers.

use crate::config::HeaderSettings;
use crate::error::FetchError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

fn header_value(value: &str) -> Result<HeaderValue, FetchError> {
    HeaderValue::from_str(value)
        .map_err(|e| FetchError::Transport(format!("invalid header value {:?}: {}", value, e)))
}

/// Build a fresh client for one fetch. Nothing is shared between calls.
pub(crate) fn build_client(headers: &HeaderSettings, timeout: Duration) -> Result<Client, FetchError> {
    let mut map = HeaderMap::new();
    map.insert(USER_AGENT, header_value(&headers.user_agent)?);
    map.insert(ACCEPT, header_value(&headers.accept)?);
    map.insert(ACCEPT_LANGUAGE, header_value(&headers.accept_language)?);

    Client::builder()
        .default_headers(map)
        .timeout(timeout)
        .build()
        .map_err(|e| FetchError::Transport(e.to_string()))
}

/// Send a request and return the body, treating non-2xx as a transport error.
pub(crate) async fn send_for_text(request: RequestBuilder) -> Result<String, FetchError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Transport(format!(
            "HTTP {} from {}",
            status,
            response.url()
        )));
    }
    Ok(response.text().await?)
}
