use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::codec::{decode_document, encode_fields, Document, ListResponse};
use super::listener::RemoteListener;
use super::{RemoteCollection, RemoteError};
use crate::config::RemoteCredentials;
use crate::model::{sort_newest_first, Article};
use crate::util::{read_limited, require_secure_base, send_with_timeout};

/// Inline generated images make documents large; this bounds one page.
const MAX_RESPONSE_SIZE: usize = 32 * 1024 * 1024; // 32MB
const PAGE_SIZE: &str = "300";
/// Guards against a server that keeps returning page tokens.
const MAX_PAGES: usize = 50;

/// Firestore REST collection of article documents.
///
/// The API key travels in the `X-Goog-Api-Key` header, never in the URL, so
/// it does not end up in request logs.
#[derive(Clone)]
pub struct FirestoreCollection {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    collection_url: Url,
    api_key: SecretString,
    timeout: Duration,
    poll_interval: Duration,
}

impl FirestoreCollection {
    pub fn from_credentials(
        creds: &RemoteCredentials,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let base = require_secure_base(&creds.base_url).map_err(|_| RemoteError::InsecureBaseUrl)?;
        let raw = format!(
            "{}/v1/projects/{}/databases/(default)/documents/{}",
            base, creds.project_id, creds.collection
        );
        let collection_url = Url::parse(&raw).map_err(|e| RemoteError::Malformed(e.to_string()))?;

        tracing::info!(
            project = %creds.project_id,
            collection = %creds.collection,
            "Remote collection configured"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                collection_url,
                api_key: SecretString::from(creds.api_key.expose_secret().to_string()),
                timeout,
                poll_interval: Duration::from_secs(creds.poll_interval_secs.max(1)),
            }),
        })
    }

    fn document_url(&self, id: &str) -> Result<Url, RemoteError> {
        let mut url = self.inner.collection_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Malformed("collection URL cannot have segments".into()))?
            .push(id);
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.inner
            .client
            .request(method, url)
            .header("X-Goog-Api-Key", self.inner.api_key.expose_secret())
    }

    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, RemoteError> {
        let response = send_with_timeout(request, self.inner.timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
            });
        }
        Ok(read_limited(response, MAX_RESPONSE_SIZE, self.inner.timeout).await?)
    }

    async fn fetch_page(&self, token: Option<&str>) -> Result<ListResponse, RemoteError> {
        let mut url = self.inner.collection_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("pageSize", PAGE_SIZE);
            query.append_pair("orderBy", "createdAt desc");
            if let Some(token) = token {
                query.append_pair("pageToken", token);
            }
        }
        let body = self.execute(self.request(reqwest::Method::GET, url)).await?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Malformed(e.to_string()))
    }

    fn json_body(&self, article: &Article) -> Result<Vec<u8>, RemoteError> {
        serde_json::to_vec(&encode_fields(article)).map_err(|e| RemoteError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RemoteCollection for FirestoreCollection {
    async fn query(&self) -> Result<Vec<Article>, RemoteError> {
        let mut articles = Vec::new();
        let mut token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let page = self.fetch_page(token.as_deref()).await?;
            for doc in &page.documents {
                match decode_document(doc) {
                    Ok(article) => articles.push(article),
                    Err(e) => {
                        tracing::warn!(document = %doc.name, error = %e, "Skipping malformed remote document");
                    }
                }
            }
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        sort_newest_first(&mut articles);
        Ok(articles)
    }

    async fn create(&self, article: &Article, id: Option<&str>) -> Result<String, RemoteError> {
        let mut url = self.inner.collection_url.clone();
        if let Some(id) = id {
            url.query_pairs_mut().append_pair("documentId", id);
        }
        let request = self
            .request(reqwest::Method::POST, url)
            .header("Content-Type", "application/json")
            .body(self.json_body(article)?);
        let body = self.execute(request).await?;
        let doc: Document =
            serde_json::from_slice(&body).map_err(|e| RemoteError::Malformed(e.to_string()))?;
        tracing::debug!(id = %doc.id(), "Created remote document");
        Ok(doc.id().to_string())
    }

    async fn replace(&self, article: &Article) -> Result<(), RemoteError> {
        let url = self.document_url(&article.id)?;
        let request = self
            .request(reqwest::Method::PATCH, url)
            .header("Content-Type", "application/json")
            .body(self.json_body(article)?);
        self.execute(request).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.document_url(id)?;
        match self.execute(self.request(reqwest::Method::DELETE, url)).await {
            Ok(_) | Err(RemoteError::HttpStatus { status: 404 }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn listen(&self) -> RemoteListener {
        RemoteListener::polling(Arc::new(self.clone()), self.inner.poll_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::article;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const COLLECTION_PATH: &str = "/v1/projects/demo/databases/(default)/documents/articles";

    fn creds(base_url: &str) -> RemoteCredentials {
        RemoteCredentials {
            project_id: "demo".into(),
            api_key: SecretString::from("test-key".to_string()),
            collection: "articles".into(),
            base_url: base_url.into(),
            poll_interval_secs: 1,
        }
    }

    fn collection(server: &MockServer) -> FirestoreCollection {
        FirestoreCollection::from_credentials(
            &creds(&server.uri()),
            reqwest::Client::new(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn doc(id: &str, title: &str, created_at: i64) -> serde_json::Value {
        json!({
            "name": format!("projects/demo/databases/(default)/documents/articles/{id}"),
            "fields": {
                "title": { "stringValue": title },
                "category": { "stringValue": "כלכלה" },
                "createdAt": { "integerValue": created_at.to_string() }
            }
        })
    }

    #[test]
    fn test_http_base_url_rejected() {
        let result = FirestoreCollection::from_credentials(
            &creds("http://evil.com"),
            reqwest::Client::new(),
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(RemoteError::InsecureBaseUrl)));
    }

    #[tokio::test]
    async fn test_query_follows_pages_and_sorts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(query_param("pageToken", "p2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "documents": [doc("b", "B", 300)] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(COLLECTION_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "documents": [doc("a", "A", 200), { "name": "x/articles/bad", "fields": {} }],
                "nextPageToken": "p2"
            })))
            .mount(&server)
            .await;

        let articles = collection(&server).query().await.unwrap();
        let ids: Vec<_> = articles.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_empty_collection() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        assert!(collection(&server).query().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_without_id_returns_server_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COLLECTION_PATH))
            .and(body_partial_json(json!({ "fields": { "title": { "stringValue": "Title k3j9x0q2a" } } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc("Xy7pQ2mN9aB4cD6eF8gH", "t", 1)))
            .expect(1)
            .mount(&server)
            .await;

        let id = collection(&server)
            .create(&article("k3j9x0q2a", 1), None)
            .await
            .unwrap();
        assert_eq!(id, "Xy7pQ2mN9aB4cD6eF8gH");
    }

    #[tokio::test]
    async fn test_create_with_id_passes_document_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("documentId", "Xy7pQ2mN9aB4cD6eF8gH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc("Xy7pQ2mN9aB4cD6eF8gH", "t", 1)))
            .expect(1)
            .mount(&server)
            .await;

        let id = collection(&server)
            .create(&article("Xy7pQ2mN9aB4cD6eF8gH", 1), Some("Xy7pQ2mN9aB4cD6eF8gH"))
            .await
            .unwrap();
        assert_eq!(id, "Xy7pQ2mN9aB4cD6eF8gH");
    }

    #[tokio::test]
    async fn test_replace_patches_document() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path(format!("{COLLECTION_PATH}/Xy7pQ2mN9aB4cD6eF8gH")))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc("Xy7pQ2mN9aB4cD6eF8gH", "t", 1)))
            .expect(1)
            .mount(&server)
            .await;

        collection(&server)
            .replace(&article("Xy7pQ2mN9aB4cD6eF8gH", 1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_document_is_ok() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(collection(&server).delete("gone").await.is_ok());
    }

    #[tokio::test]
    async fn test_http_500_surfaces_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = collection(&server).query().await;
        assert!(matches!(result, Err(RemoteError::HttpStatus { status: 500 })));
    }

    #[tokio::test]
    async fn test_listener_emits_initial_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "documents": [doc("a", "A", 1)] })))
            .mount(&server)
            .await;

        let mut listener = collection(&server).listen();
        let first = listener.recv().await.unwrap().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].title, "A");
    }
}
