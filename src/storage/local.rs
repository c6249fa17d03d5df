//! Local fallback store.
//!
//! Holds the whole article collection as one JSON document under
//! [`ARTICLES_KEY`], next to the cached session user and the registered
//! credentials. Every handle cloned from the same [`LocalStore`] shares one
//! change channel, so a write through any handle reaches every subscriber.
//!
//! Writes from other processes never reach that channel. Each article write
//! also bumps a revision counter in the database ([`ARTICLES_REVISION_KEY`]),
//! which watchers poll to notice them.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use super::schema::Database;
use super::types::{CollectionChange, DatabaseError};
use crate::model::{sort_newest_first, Article};

/// Key holding the serialized article collection.
pub const ARTICLES_KEY: &str = "news_articles_backup";
/// Key holding the cached session user.
pub const SESSION_USER_KEY: &str = "news_user";
/// Key holding the registered credentials list.
pub const CREDENTIALS_KEY: &str = "registered_users";
/// Counter bumped with every write of [`ARTICLES_KEY`].
pub const ARTICLES_REVISION_KEY: &str = "news_articles_revision";

/// Buffered change events per subscriber before it starts lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct LocalStore {
    db: Database,
    changes: broadcast::Sender<CollectionChange>,
    // Serializes read-modify-write cycles on the article document
    write_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            db,
            changes,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Receive every subsequent change to the article collection.
    pub fn watch(&self) -> broadcast::Receiver<CollectionChange> {
        self.changes.subscribe()
    }

    /// Revision of the stored article collection (0 before any write).
    ///
    /// Read from the database, so it includes writes made by other
    /// processes sharing the file.
    pub async fn revision(&self) -> Result<u64, DatabaseError> {
        self.db.get_counter(ARTICLES_REVISION_KEY).await
    }

    // ========================================================================
    // Article Collection
    // ========================================================================

    /// Load the article snapshot, newest first.
    ///
    /// A missing key is an empty collection. A corrupt document is logged and
    /// also treated as empty, matching how a browser store behaves when its
    /// key cannot be parsed.
    pub async fn load_articles(&self) -> Result<Vec<Article>, DatabaseError> {
        let mut articles: Vec<Article> = match self.db.get_value(ARTICLES_KEY).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(list) => list,
                Err(e) => {
                    tracing::warn!(key = ARTICLES_KEY, error = %e, "Discarding unreadable article snapshot");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        sort_newest_first(&mut articles);
        Ok(articles)
    }

    /// Replace the entire snapshot and notify subscribers.
    pub async fn save_articles(&self, articles: &[Article]) -> Result<(), DatabaseError> {
        let _guard = self.write_lock.lock().await;
        let mut list = articles.to_vec();
        sort_newest_first(&mut list);
        self.store_and_publish(list).await
    }

    /// Insert an article, replacing any existing entry with the same id.
    pub async fn add_article(&self, article: &Article) -> Result<(), DatabaseError> {
        self.modify(|list| {
            list.retain(|a| a.id != article.id);
            list.push(article.clone());
            true
        })
        .await
        .map(|_| ())
    }

    /// Full-document replace by id. An unknown id is inserted.
    pub async fn update_article(&self, article: &Article) -> Result<(), DatabaseError> {
        self.modify(|list| {
            match list.iter_mut().find(|a| a.id == article.id) {
                Some(existing) => *existing = article.clone(),
                None => list.push(article.clone()),
            }
            true
        })
        .await
        .map(|_| ())
    }

    /// Delete by id. Returns true if an article was removed.
    ///
    /// Removing an unknown id still publishes a change so subscribers stay in
    /// step with every write call.
    pub async fn remove_article(&self, id: &str) -> Result<bool, DatabaseError> {
        self.modify(|list| {
            let before = list.len();
            list.retain(|a| a.id != id);
            list.len() != before
        })
        .await
    }

    async fn modify<F>(&self, apply: F) -> Result<bool, DatabaseError>
    where
        F: FnOnce(&mut Vec<Article>) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut list = self.load_articles().await?;
        let changed = apply(&mut list);
        sort_newest_first(&mut list);
        self.store_and_publish(list).await?;
        Ok(changed)
    }

    async fn store_and_publish(&self, list: Vec<Article>) -> Result<(), DatabaseError> {
        let raw = serde_json::to_string(&list).map_err(|source| DatabaseError::Encoding {
            key: ARTICLES_KEY,
            source,
        })?;
        let version = self
            .db
            .set_value_counted(ARTICLES_KEY, &raw, ARTICLES_REVISION_KEY)
            .await?;
        let receivers = self.changes.receiver_count();
        // No receivers is not an error: nobody is watching yet
        let _ = self.changes.send(CollectionChange {
            version,
            articles: Arc::new(list),
        });
        tracing::debug!(version, receivers, "Published local collection change");
        Ok(())
    }

    // ========================================================================
    // Auxiliary Documents
    // ========================================================================

    /// Read a JSON document stored under `key`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        key: &'static str,
    ) -> Result<Option<T>, DatabaseError> {
        match self.db.get_value(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| DatabaseError::Encoding { key, source }),
            None => Ok(None),
        }
    }

    /// Write a JSON document under `key`.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &'static str,
        value: &T,
    ) -> Result<(), DatabaseError> {
        let raw =
            serde_json::to_string(value).map_err(|source| DatabaseError::Encoding { key, source })?;
        self.db.set_value(key, &raw).await
    }

    pub async fn remove_key(&self, key: &str) -> Result<(), DatabaseError> {
        self.db.remove_value(key).await.map(|_| ())
    }
}
