//! Remote document collection.
//!
//! One document per article, queried newest first. [`RemoteCollection`] is
//! the seam the sync façade depends on; [`FirestoreCollection`] talks to the
//! Firestore REST API and [`MemoryCollection`] keeps documents in process.

mod codec;
mod firestore;
mod listener;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::Article;

pub use firestore::FirestoreCollection;
pub use listener::RemoteListener;
pub use memory::MemoryCollection;

/// Minimum id length the remote store accepts as one of its own ids.
///
/// Firestore auto-ids are 20 characters; client tokens are shorter and get a
/// server-minted id instead.
pub const SERVER_ID_MIN_LEN: usize = 20;

/// True if `id` can be used verbatim as a remote document id.
pub fn is_server_assignable(id: &str) -> bool {
    id.len() >= SERVER_ID_MIN_LEN && !id.contains('/')
}

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error: status {status}")]
    HttpStatus { status: u16 },
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
    #[error("Remote collection unavailable")]
    Unavailable,
}

impl From<crate::util::BodyError> for RemoteError {
    fn from(err: crate::util::BodyError) -> Self {
        use crate::util::BodyError;
        match err {
            BodyError::Timeout(_) => RemoteError::Timeout,
            BodyError::Network(e) => RemoteError::Network(e.to_string()),
            BodyError::TooLarge(limit) => RemoteError::ResponseTooLarge(limit),
        }
    }
}

/// Store/query/subscribe over the article collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// All articles ordered by creation time, newest first.
    async fn query(&self) -> Result<Vec<Article>, RemoteError>;

    /// Create a document. With `id` the document gets that id; without, the
    /// store mints one. Returns the id the document was stored under.
    async fn create(&self, article: &Article, id: Option<&str>) -> Result<String, RemoteError>;

    /// Replace the whole document stored under `article.id`.
    async fn replace(&self, article: &Article) -> Result<(), RemoteError>;

    /// Delete by id. Deleting a missing document is not an error.
    async fn delete(&self, id: &str) -> Result<(), RemoteError>;

    /// Push-based subscription: each item is a fresh ordered snapshot or an
    /// error from the store. Dropping the listener unsubscribes.
    fn listen(&self) -> RemoteListener;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_assignable_threshold() {
        assert!(!is_server_assignable("k3j9x0q2a"));
        assert!(!is_server_assignable("default-1"));
        assert!(is_server_assignable("Xy7pQ2mN9aB4cD6eF8gH"));
        assert!(!is_server_assignable("aaaaaaaaaa/bbbbbbbbbbbb"));
    }
}
