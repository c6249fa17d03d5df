use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use super::listener::RemoteListener;
use super::{RemoteCollection, RemoteError, SERVER_ID_MIN_LEN};
use crate::model::{sort_newest_first, Article};

/// In-process remote collection.
///
/// Behaves like a document store with real-time listeners: every write is
/// pushed to all active listeners. `set_failing(true)` makes every call fail,
/// which is how tests exercise the degraded paths.
#[derive(Clone, Default)]
pub struct MemoryCollection {
    inner: Arc<Inner>,
}

struct Inner {
    docs: Mutex<Vec<Article>>,
    changed: broadcast::Sender<()>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl Default for Inner {
    fn default() -> Self {
        let (changed, _) = broadcast::channel(16);
        Self {
            docs: Mutex::new(Vec::new()),
            changed,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<Article>) -> Self {
        let collection = Self::new();
        if let Ok(mut docs) = collection.inner.docs.lock() {
            *docs = articles;
        }
        collection
    }

    /// Make every subsequent call fail with [`RemoteError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::Release);
        let _ = self.inner.changed.send(());
    }

    /// Number of store calls made so far (listeners excluded).
    pub fn call_count(&self) -> usize {
        self.inner.calls.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<(), RemoteError> {
        self.inner.calls.fetch_add(1, Ordering::AcqRel);
        if self.inner.failing.load(Ordering::Acquire) {
            return Err(RemoteError::Unavailable);
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<Article>, RemoteError> {
        if self.inner.failing.load(Ordering::Acquire) {
            return Err(RemoteError::Unavailable);
        }
        let docs = self.inner.docs.lock().map_err(|_| RemoteError::Unavailable)?;
        let mut list = docs.clone();
        sort_newest_first(&mut list);
        Ok(list)
    }

    fn write<T>(&self, apply: impl FnOnce(&mut Vec<Article>) -> T) -> Result<T, RemoteError> {
        self.check()?;
        let result = {
            let mut docs = self.inner.docs.lock().map_err(|_| RemoteError::Unavailable)?;
            apply(&mut docs)
        };
        let _ = self.inner.changed.send(());
        Ok(result)
    }
}

fn mint_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SERVER_ID_MIN_LEN)
        .map(char::from)
        .collect()
}

#[async_trait]
impl RemoteCollection for MemoryCollection {
    async fn query(&self) -> Result<Vec<Article>, RemoteError> {
        self.check()?;
        self.snapshot()
    }

    async fn create(&self, article: &Article, id: Option<&str>) -> Result<String, RemoteError> {
        let id = id.map(str::to_string).unwrap_or_else(mint_id);
        let mut stored = article.clone();
        stored.id = id.clone();
        self.write(move |docs| {
            docs.retain(|a| a.id != stored.id);
            docs.push(stored);
        })?;
        Ok(id)
    }

    async fn replace(&self, article: &Article) -> Result<(), RemoteError> {
        let article = article.clone();
        self.write(move |docs| match docs.iter_mut().find(|a| a.id == article.id) {
            Some(existing) => *existing = article,
            None => docs.push(article),
        })
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        self.write(|docs| docs.retain(|a| a.id != id))
    }

    fn listen(&self) -> RemoteListener {
        let (tx, rx) = RemoteListener::channel();
        let this = self.clone();
        let mut changed = self.inner.changed.subscribe();
        let handle = tokio::spawn(async move {
            loop {
                if tx.send(this.snapshot()).await.is_err() {
                    break;
                }
                match changed.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        RemoteListener::new(rx, Some(handle))
    }
}
