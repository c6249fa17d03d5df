use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Response too large (exceeds {0} bytes)")]
    TooLarge(usize),
}

/// Send a request, giving up after `timeout`.
pub async fn send_with_timeout(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, BodyError> {
    tokio::time::timeout(timeout, request.send())
        .await
        .map_err(|_| BodyError::Timeout(timeout.as_secs()))?
        .map_err(BodyError::Network)
}

/// Read a response body, refusing anything over `limit` bytes or taking
/// longer than `timeout`.
///
/// Checks Content-Length first, then enforces the cap while streaming in
/// case the header is missing or wrong.
pub async fn read_limited(
    response: reqwest::Response,
    limit: usize,
    timeout: Duration,
) -> Result<Vec<u8>, BodyError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(BodyError::TooLarge(limit));
        }
    }

    tokio::time::timeout(timeout, stream_body(response, limit))
        .await
        .map_err(|_| BodyError::Timeout(timeout.as_secs()))?
}

async fn stream_body(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, BodyError> {
    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BodyError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(BodyError::TooLarge(limit));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
