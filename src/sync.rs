//! Synchronization façade over the local fallback store and the optional
//! remote collection.
//!
//! Every write lands in the local store first. When a remote collection is
//! configured the same write is then forwarded to it; a remote failure is
//! logged and reported in the returned [`WriteReport`] but never fails the
//! call, so the local copy always reflects what the user did.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::RemoteConfig;
use crate::model::Article;
use crate::remote::{is_server_assignable, FirestoreCollection, RemoteCollection, RemoteError};
use crate::storage::{CollectionChange, DatabaseError, LocalStore};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Local store error: {0}")]
    Local(#[from] DatabaseError),
}

/// Outcome of forwarding a write to the remote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteWrite {
    /// Local-only backend; nothing was sent.
    Skipped,
    /// Remote write succeeded. `id` is the remote document id, which differs
    /// from the local id when the remote minted one.
    Written { id: String },
    /// Remote write failed; the local write stands.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub remote: RemoteWrite,
}

impl WriteReport {
    fn skipped() -> Self {
        Self {
            remote: RemoteWrite::Skipped,
        }
    }

    fn from_remote(op: &'static str, result: Result<String, RemoteError>) -> Self {
        let remote = match result {
            Ok(id) => RemoteWrite::Written { id },
            Err(e) => {
                tracing::error!(op, error = %e, "Remote write failed, local copy kept");
                RemoteWrite::Failed {
                    reason: e.to_string(),
                }
            }
        };
        Self { remote }
    }

    pub fn remote_failed(&self) -> bool {
        matches!(self.remote, RemoteWrite::Failed { .. })
    }
}

/// Which store is authoritative for reads. Chosen once at startup.
#[derive(Clone)]
pub enum Backend {
    RemoteBacked(Arc<dyn RemoteCollection>),
    LocalOnly,
}

impl Backend {
    /// Remote-backed when real credentials are configured, local-only
    /// otherwise.
    pub fn from_config(remote: &RemoteConfig, client: reqwest::Client, timeout: Duration) -> Self {
        let Some(creds) = remote.credentials() else {
            tracing::info!("Remote store not configured, running local-only");
            return Backend::LocalOnly;
        };
        match FirestoreCollection::from_credentials(&creds, client, timeout) {
            Ok(collection) => Backend::RemoteBacked(Arc::new(collection)),
            Err(e) => {
                tracing::warn!(error = %e, "Remote store rejected, running local-only");
                Backend::LocalOnly
            }
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Backend::RemoteBacked(_))
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::RemoteBacked(_) => f.write_str("RemoteBacked"),
            Backend::LocalOnly => f.write_str("LocalOnly"),
        }
    }
}

/// Active snapshot subscription. Dropping it unsubscribes.
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How often a local-only subscription checks the database for writes made
/// by other processes.
pub const LOCAL_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct ArticleSync {
    backend: Backend,
    local: LocalStore,
    local_poll_interval: Duration,
}

impl ArticleSync {
    pub fn new(backend: Backend, local: LocalStore) -> Self {
        tracing::debug!(backend = ?backend, "Article sync ready");
        Self {
            backend,
            local,
            local_poll_interval: LOCAL_POLL_INTERVAL,
        }
    }

    pub fn with_local_poll_interval(mut self, interval: Duration) -> Self {
        self.local_poll_interval = interval;
        self
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Deliver newest-first snapshots of the collection to `callback` until
    /// the returned subscription is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Vec<Article>) + Send + Sync + 'static,
    {
        let local = self.local.clone();
        let handle = match &self.backend {
            Backend::RemoteBacked(remote) => {
                let mut listener = remote.listen();
                tokio::spawn(async move {
                    while let Some(event) = listener.recv().await {
                        match event {
                            Ok(snapshot) => callback(snapshot),
                            Err(e) => {
                                tracing::warn!(error = %e, "Remote snapshot failed, serving local copy");
                                callback(local_or_empty(&local).await);
                            }
                        }
                    }
                    tracing::debug!("Remote listener closed");
                })
            }
            Backend::LocalOnly => {
                // Subscribe before the initial read so no write slips between them
                let changes = local.watch();
                let interval = self.local_poll_interval;
                tokio::spawn(watch_local(local, changes, interval, callback))
            }
        };
        Subscription {
            handle: Some(handle),
        }
    }

    pub async fn add(&self, article: &Article) -> Result<WriteReport, SyncError> {
        self.local.add_article(article).await?;
        let Backend::RemoteBacked(remote) = &self.backend else {
            return Ok(WriteReport::skipped());
        };
        let id = is_server_assignable(&article.id).then_some(article.id.as_str());
        Ok(WriteReport::from_remote("add", remote.create(article, id).await))
    }

    pub async fn update(&self, article: &Article) -> Result<WriteReport, SyncError> {
        self.local.update_article(article).await?;
        let Backend::RemoteBacked(remote) = &self.backend else {
            return Ok(WriteReport::skipped());
        };
        let result = remote.replace(article).await.map(|_| article.id.clone());
        Ok(WriteReport::from_remote("update", result))
    }

    pub async fn remove(&self, id: &str) -> Result<WriteReport, SyncError> {
        if !self.local.remove_article(id).await? {
            tracing::debug!(id, "Removed article was not in local store");
        }
        let Backend::RemoteBacked(remote) = &self.backend else {
            return Ok(WriteReport::skipped());
        };
        let result = remote.delete(id).await.map(|_| id.to_string());
        Ok(WriteReport::from_remote("remove", result))
    }

    /// Replace the whole collection.
    ///
    /// Remote documents not in `articles` are deleted, then every article is
    /// written. The first remote failure stops reconciliation.
    pub async fn save_all(&self, articles: &[Article]) -> Result<WriteReport, SyncError> {
        self.local.save_articles(articles).await?;
        let Backend::RemoteBacked(remote) = &self.backend else {
            return Ok(WriteReport::skipped());
        };
        let result = reconcile(remote.as_ref(), articles)
            .await
            .map(|written| format!("{written} documents"));
        Ok(WriteReport::from_remote("save_all", result))
    }

    /// Current local snapshot, newest first.
    pub async fn local_snapshot(&self) -> Result<Vec<Article>, SyncError> {
        Ok(self.local.load_articles().await?)
    }
}

async fn reconcile(remote: &dyn RemoteCollection, articles: &[Article]) -> Result<usize, RemoteError> {
    let existing = remote.query().await?;
    for stale in existing
        .iter()
        .filter(|doc| !articles.iter().any(|a| a.id == doc.id))
    {
        remote.delete(&stale.id).await?;
    }
    for article in articles {
        if is_server_assignable(&article.id) {
            remote.replace(article).await?;
        } else {
            remote.create(article, None).await?;
        }
    }
    tracing::info!(count = articles.len(), "Remote collection reconciled");
    Ok(articles.len())
}

/// Deliver the local snapshot, then every in-process change as it is
/// published, plus a fresh snapshot whenever the stored revision moves
/// without a matching in-process change (a write from another process).
async fn watch_local<F>(
    local: LocalStore,
    mut changes: broadcast::Receiver<CollectionChange>,
    interval: Duration,
    callback: F,
) where
    F: Fn(Vec<Article>) + Send + Sync + 'static,
{
    let mut seen = local.revision().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Local revision unreadable");
        0
    });
    callback(local_or_empty(&local).await);

    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(10)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            change = changes.recv() => match change {
                // Already covered by a newer reload
                Ok(change) if change.version <= seen => {}
                Ok(change) => {
                    seen = change.version;
                    callback(change.articles.as_ref().clone());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Subscriber lagged, reloading snapshot");
                    seen = local.revision().await.unwrap_or(seen);
                    callback(local_or_empty(&local).await);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ticker.tick() => match local.revision().await {
                Ok(revision) if revision != seen => {
                    tracing::debug!(from = seen, to = revision, "Local store changed externally, reloading");
                    seen = revision;
                    callback(local_or_empty(&local).await);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Local revision unreadable"),
            },
        }
    }
}

async fn local_or_empty(local: &LocalStore) -> Vec<Article> {
    local.load_articles().await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Local snapshot unavailable");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryCollection;
    use crate::storage::Database;
    use crate::test_support::{article, test_store};
    use crate::util::new_token;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    fn collector() -> (
        impl Fn(Vec<Article>) + Send + Sync + 'static,
        mpsc::UnboundedReceiver<Vec<Article>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |list| {
                let _ = tx.send(list);
            },
            rx,
        )
    }

    fn ids(list: &[Article]) -> Vec<&str> {
        list.iter().map(|a| a.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_local_only_delivers_initial_and_changes() {
        let sync = ArticleSync::new(Backend::LocalOnly, test_store().await);
        let (callback, mut rx) = collector();
        let _sub = sync.subscribe(callback);

        assert!(rx.recv().await.unwrap().is_empty());

        let report = sync.add(&article("a", 10)).await.unwrap();
        assert_eq!(report.remote, RemoteWrite::Skipped);
        assert_eq!(ids(&rx.recv().await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_local_only_redelivers_writes_from_another_store() {
        let dir = std::env::temp_dir().join(format!("truenews_sync_test_{}", new_token()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("news.db");
        let path = path.to_str().unwrap();
        let watcher = LocalStore::new(Database::open(path).await.unwrap());
        let writer = LocalStore::new(Database::open(path).await.unwrap());

        let sync = ArticleSync::new(Backend::LocalOnly, watcher)
            .with_local_poll_interval(Duration::from_millis(50));
        let (callback, mut rx) = collector();
        let _sub = sync.subscribe(callback);
        assert!(rx.recv().await.unwrap().is_empty());

        writer.add_article(&article("foreign", 7)).await.unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("foreign write not delivered")
            .unwrap();
        assert_eq!(ids(&delivered), vec!["foreign"]);

        // Own writes keep flowing after an external reload
        sync.add(&article("own", 9)).await.unwrap();
        let delivered = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids(&delivered), vec!["own", "foreign"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_add_then_subscribe_yields_new_article_first() {
        let sync = ArticleSync::new(Backend::LocalOnly, test_store().await);
        sync.add(&article("old", 10)).await.unwrap();
        sync.add(&article("new", 20)).await.unwrap();

        let (callback, mut rx) = collector();
        let _sub = sync.subscribe(callback);
        assert_eq!(ids(&rx.recv().await.unwrap()), vec!["new", "old"]);
    }

    #[tokio::test]
    async fn test_save_all_then_fresh_subscribe() {
        let sync = ArticleSync::new(Backend::LocalOnly, test_store().await);
        sync.add(&article("gone", 5)).await.unwrap();
        sync.save_all(&[article("A", 1), article("B", 2)])
            .await
            .unwrap();

        let (callback, mut rx) = collector();
        let _sub = sync.subscribe(callback);
        assert_eq!(ids(&rx.recv().await.unwrap()), vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let sync = ArticleSync::new(Backend::LocalOnly, test_store().await);
        let (callback, mut rx) = collector();
        let sub = sync.subscribe(callback);
        rx.recv().await.unwrap();

        sub.unsubscribe();
        sync.add(&article("a", 1)).await.unwrap();
        // The sender lives in the aborted task, so the channel closes
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_remote_add_mints_id_for_short_tokens() {
        let remote = MemoryCollection::new();
        let sync = ArticleSync::new(
            Backend::RemoteBacked(Arc::new(remote.clone())),
            test_store().await,
        );

        let report = sync.add(&article("k3j9x0q2a", 1)).await.unwrap();
        let RemoteWrite::Written { id } = &report.remote else {
            panic!("expected remote write, got {:?}", report.remote);
        };
        assert_eq!(id.len(), crate::remote::SERVER_ID_MIN_LEN);
        assert_eq!(ids(&sync.local_snapshot().await.unwrap()), vec!["k3j9x0q2a"]);

        let long = "Xy7pQ2mN9aB4cD6eF8gH";
        let report = sync.add(&article(long, 2)).await.unwrap();
        assert_eq!(report.remote, RemoteWrite::Written { id: long.into() });
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_local_write() {
        let remote = MemoryCollection::new();
        remote.set_failing(true);
        let sync = ArticleSync::new(
            Backend::RemoteBacked(Arc::new(remote.clone())),
            test_store().await,
        );

        let report = sync.add(&article("a", 1)).await.unwrap();
        assert!(report.remote_failed());
        assert_eq!(ids(&sync.local_snapshot().await.unwrap()), vec!["a"]);
    }

    #[tokio::test]
    async fn test_remote_error_falls_back_to_local_snapshot() {
        let remote = MemoryCollection::new();
        remote.set_failing(true);
        let store = test_store().await;
        store.add_article(&article("cached", 1)).await.unwrap();
        let sync = ArticleSync::new(Backend::RemoteBacked(Arc::new(remote)), store);

        let (callback, mut rx) = collector();
        let _sub = sync.subscribe(callback);
        assert_eq!(ids(&rx.recv().await.unwrap()), vec!["cached"]);
    }

    #[tokio::test]
    async fn test_remote_snapshots_forwarded() {
        let long = "Xy7pQ2mN9aB4cD6eF8gH";
        let remote = MemoryCollection::with_articles(vec![article(long, 1)]);
        let sync = ArticleSync::new(
            Backend::RemoteBacked(Arc::new(remote.clone())),
            test_store().await,
        );

        let (callback, mut rx) = collector();
        let _sub = sync.subscribe(callback);
        assert_eq!(ids(&rx.recv().await.unwrap()), vec![long]);

        sync.remove(long).await.unwrap();
        assert!(rx.recv().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_all_reconciles_remote() {
        let keep = "Kp7pQ2mN9aB4cD6eF8gH";
        let stale = "St7pQ2mN9aB4cD6eF8gH";
        let remote = MemoryCollection::with_articles(vec![article(keep, 1), article(stale, 2)]);
        let sync = ArticleSync::new(
            Backend::RemoteBacked(Arc::new(remote.clone())),
            test_store().await,
        );

        let mut edited = article(keep, 1);
        edited.title = "edited".into();
        let report = sync.save_all(&[edited, article("short", 3)]).await.unwrap();
        assert!(matches!(report.remote, RemoteWrite::Written { .. }));

        let docs = remote.query().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.id != stale));
        assert!(docs.iter().any(|d| d.id == keep && d.title == "edited"));
    }

    #[test]
    fn test_unconfigured_remote_is_local_only() {
        let backend = Backend::from_config(
            &RemoteConfig::default(),
            reqwest::Client::new(),
            Duration::from_secs(1),
        );
        assert!(!backend.is_remote());
    }
}
