use crate::ai::GeminiClient;
use crate::audio::{NarrationError, NarrationOutcome, Narrator};
use crate::auth::{AuthError, AuthState};
use crate::editor::{self, ArticleDraft, ValidationError};
use crate::model::{Article, Category, Comment, User};
use crate::seed;
use crate::sync::{ArticleSync, Subscription, SyncError, WriteReport};
use crate::util::{new_token, now_ms};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How often the clock used for breaking-news expiry is refreshed.
pub const TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Pending clock ticks. Snapshots do not queue: only the latest is kept.
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Events and Errors
// ============================================================================

/// Events from background tasks
#[derive(Debug)]
pub enum AppEvent {
    /// A fresh newest-first snapshot of the collection.
    ArticlesChanged(Vec<Article>),
    /// Clock refresh, in epoch milliseconds.
    Tick(i64),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Narration(#[from] NarrationError),
    #[error("Permission denied")]
    Unauthorized,
    #[error("Article not found: {0}")]
    ArticleNotFound(String),
    #[error("No article is open")]
    NoArticleOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Home,
    Admin,
    Article,
}

// ============================================================================
// Derived Views
// ============================================================================

/// Articles in `category` (all when `None`) whose title, subtitle or body
/// contains `search`, ignoring case. Order is preserved.
pub fn filter_articles<'a>(
    articles: &'a [Article],
    category: Option<Category>,
    search: &str,
) -> Vec<&'a Article> {
    let needle = search.to_lowercase();
    articles
        .iter()
        .filter(|a| category.map_or(true, |c| a.category == c))
        .filter(|a| needle.is_empty() || a.matches_search(&needle))
        .collect()
}

// ============================================================================
// Application State
// ============================================================================

/// Central application state
///
/// Holds a read-mirror of the article collection; every mutation goes through
/// [`ArticleSync`] and comes back as an [`AppEvent::ArticlesChanged`].
pub struct App {
    sync: ArticleSync,
    auth: AuthState,
    ai: GeminiClient,
    narrator: Narrator,

    articles: Vec<Article>,
    /// True until the first snapshot has been applied.
    loading: bool,
    now: i64,

    view: View,
    category: Option<Category>,
    search: String,
    selected: Option<Article>,

    event_tx: mpsc::Sender<AppEvent>,
    event_rx: mpsc::Receiver<AppEvent>,
    // Latest undelivered snapshot; a newer one replaces it
    snapshot_tx: watch::Sender<Option<Vec<Article>>>,
    snapshot_rx: watch::Receiver<Option<Vec<Article>>>,
    subscription: Option<Subscription>,
    tick_handle: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(sync: ArticleSync, auth: AuthState, ai: GeminiClient, narrator: Narrator) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        Self {
            sync,
            auth,
            ai,
            narrator,
            articles: Vec::new(),
            loading: true,
            now: now_ms(),
            view: View::Home,
            category: None,
            search: String::new(),
            selected: None,
            event_tx,
            event_rx,
            snapshot_tx,
            snapshot_rx,
            subscription: None,
            tick_handle: None,
        }
    }

    /// Subscribe to the collection and start the clock. Idempotent.
    pub fn mount(&mut self) {
        if self.subscription.is_some() {
            return;
        }
        let snapshots = self.snapshot_tx.clone();
        self.subscription = Some(self.sync.subscribe(move |articles| {
            snapshots.send_replace(Some(articles));
        }));

        let tx = self.event_tx.clone();
        self.tick_handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(TICK_INTERVAL);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if tx.send(AppEvent::Tick(now_ms())).await.is_err() {
                    break;
                }
            }
        }));
        tracing::debug!("App mounted");
    }

    /// Stop receiving snapshots and clock ticks.
    pub fn unmount(&mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.unsubscribe();
        }
        if let Some(handle) = self.tick_handle.take() {
            handle.abort();
        }
    }

    /// Wait for the next background event.
    ///
    /// Snapshots published while the previous one was still pending replace
    /// it, so the one returned is always the newest.
    pub async fn next_event(&mut self) -> Option<AppEvent> {
        loop {
            tokio::select! {
                changed = self.snapshot_rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    if let Some(list) = self.snapshot_rx.borrow_and_update().clone() {
                        return Some(AppEvent::ArticlesChanged(list));
                    }
                }
                event = self.event_rx.recv() => return event,
            }
        }
    }

    /// Receive and apply one event.
    pub async fn pump(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Mount and apply events until the first snapshot is in.
    pub async fn load(&mut self) {
        self.mount();
        while self.loading {
            if !self.pump().await {
                break;
            }
        }
    }

    pub async fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::ArticlesChanged(list) => self.apply_snapshot(list).await,
            AppEvent::Tick(now) => self.now = now,
        }
    }

    async fn apply_snapshot(&mut self, list: Vec<Article>) {
        self.articles = if list.is_empty() {
            match self.sync.local_snapshot().await {
                Ok(local) if !local.is_empty() => {
                    tracing::debug!(count = local.len(), "Empty snapshot, showing local backup");
                    local
                }
                Ok(_) => seed::default_articles(self.now),
                Err(e) => {
                    tracing::warn!(error = %e, "Local backup unreadable, showing samples");
                    seed::default_articles(self.now)
                }
            }
        } else {
            list
        };

        if let Some(selected) = self.selected.as_mut() {
            if let Some(latest) = self.articles.iter().find(|a| a.id == selected.id) {
                *selected = latest.clone();
            }
        }
        self.loading = false;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn selected_article(&self) -> Option<&Article> {
        self.selected.as_ref()
    }

    /// True when a remote collection is the source of truth.
    pub fn is_remote_backed(&self) -> bool {
        self.sync.backend().is_remote()
    }

    pub fn ai(&self) -> &GeminiClient {
        &self.ai
    }

    pub fn current_user(&self) -> Option<&User> {
        self.auth.current_user()
    }

    fn is_admin(&self) -> bool {
        self.current_user().is_some_and(User::is_admin)
    }

    fn is_unfiltered(&self) -> bool {
        self.category.is_none() && self.search.is_empty()
    }

    // ========================================================================
    // Derived Views
    // ========================================================================

    pub fn breaking_news(&self) -> Vec<&Article> {
        self.articles
            .iter()
            .filter(|a| a.is_breaking_at(self.now))
            .collect()
    }

    pub fn filtered_articles(&self) -> Vec<&Article> {
        filter_articles(&self.articles, self.category, &self.search)
    }

    /// Newest article, shown large on the unfiltered home view.
    pub fn hero_article(&self) -> Option<&Article> {
        if self.view == View::Home && self.is_unfiltered() {
            self.articles.first()
        } else {
            None
        }
    }

    /// The grid under the hero. Unfiltered, the first (hero) item is left out.
    pub fn list_articles(&self) -> Vec<&Article> {
        let mut list = self.filtered_articles();
        if self.is_unfiltered() && !list.is_empty() {
            list.remove(0);
        }
        list
    }

    /// Admins may delete any comment; users may delete their own.
    pub fn can_delete_comment(&self, comment: &Comment) -> bool {
        match self.current_user() {
            Some(user) => user.is_admin() || user.name == comment.user_name,
            None => false,
        }
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn go_home(&mut self) {
        self.view = View::Home;
        self.category = None;
        self.search.clear();
        self.selected = None;
    }

    pub fn select_category(&mut self, category: Option<Category>) {
        self.category = category;
        self.view = View::Home;
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
        self.view = View::Home;
    }

    pub fn open_article(&mut self, id: &str) -> Result<&Article, AppError> {
        self.narrator.stop();
        let article = self
            .articles
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| AppError::ArticleNotFound(id.to_string()))?;
        self.view = View::Article;
        Ok(self.selected.insert(article))
    }

    pub fn open_admin(&mut self) -> Result<(), AppError> {
        if !self.is_admin() {
            return Err(AppError::Unauthorized);
        }
        self.view = View::Admin;
        Ok(())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Store a new article and return to the home view.
    ///
    /// Articles without a title or body are rejected before any store call.
    pub async fn publish(&mut self, article: Article) -> Result<WriteReport, AppError> {
        if !self.is_admin() {
            return Err(AppError::Unauthorized);
        }
        editor::validate(&article)?;
        let report = self.sync.add(&article).await?;
        tracing::info!(id = %article.id, title = %article.title, "Published article");
        self.go_home();
        Ok(report)
    }

    /// Build the draft as the signed-in author and publish it.
    pub async fn publish_draft(&mut self, draft: &ArticleDraft) -> Result<WriteReport, AppError> {
        let author = match self.current_user() {
            Some(user) if user.is_admin() => user.name.clone(),
            _ => return Err(AppError::Unauthorized),
        };
        let article = draft.build(&author, now_ms())?;
        self.publish(article).await
    }

    pub async fn remove_article(&mut self, id: &str) -> Result<WriteReport, AppError> {
        if !self.is_admin() {
            return Err(AppError::Unauthorized);
        }
        let report = self.sync.remove(id).await?;
        if self.selected.as_ref().is_some_and(|a| a.id == id) {
            self.go_home();
        }
        Ok(report)
    }

    /// Append a comment to the open article as the signed-in user.
    ///
    /// Returns `None` without touching the store when no article is open, no
    /// one is signed in, or the text is blank.
    pub async fn add_comment(&mut self, text: &str) -> Result<Option<WriteReport>, AppError> {
        let text = text.trim();
        let (Some(article), Some(user)) = (self.selected.as_ref(), self.auth.current_user()) else {
            return Ok(None);
        };
        if text.is_empty() {
            return Ok(None);
        }

        let mut updated = article.clone();
        updated.comments.push(Comment {
            id: new_token(),
            user_name: user.name.clone(),
            text: text.to_string(),
            created_at: now_ms(),
        });
        let report = self.sync.update(&updated).await?;
        self.selected = Some(updated);
        Ok(Some(report))
    }

    /// Remove a comment from the open article.
    ///
    /// An id that is not on the article is a no-op. Only admins and the
    /// comment's author may delete.
    pub async fn delete_comment(&mut self, comment_id: &str) -> Result<Option<WriteReport>, AppError> {
        let article = self.selected.as_ref().ok_or(AppError::NoArticleOpen)?;
        let Some(comment) = article.comment(comment_id) else {
            tracing::debug!(comment_id, "Comment not on article, nothing to delete");
            return Ok(None);
        };
        if !self.can_delete_comment(comment) {
            return Err(AppError::Unauthorized);
        }

        let mut updated = article.clone();
        updated.comments.retain(|c| c.id != comment_id);
        let report = self.sync.update(&updated).await?;
        self.selected = Some(updated);
        Ok(Some(report))
    }

    // ========================================================================
    // Authentication
    // ========================================================================

    pub async fn restore_session(&mut self) -> Option<&User> {
        self.auth.restore().await
    }

    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        admin_code: Option<&str>,
    ) -> Result<User, AppError> {
        Ok(self.auth.register(username, password, admin_code).await?)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User, AppError> {
        Ok(self.auth.login(username, password).await?)
    }

    pub async fn logout(&mut self) -> Result<(), AppError> {
        self.auth.logout().await?;
        if self.view == View::Admin {
            self.view = View::Home;
        }
        Ok(())
    }

    // ========================================================================
    // Narration
    // ========================================================================

    pub async fn toggle_narration(&mut self) -> Result<NarrationOutcome, AppError> {
        let article = self.selected.as_ref().ok_or(AppError::NoArticleOpen)?;
        Ok(self.narrator.toggle(article).await?)
    }

    /// Block until the current narration finishes on its own.
    pub async fn wait_for_narration(&mut self) {
        self.narrator.wait().await;
    }
}

// ============================================================================
// Resource Cleanup
// ============================================================================

/// Abort all in-flight background tasks on App drop.
impl Drop for App {
    fn drop(&mut self) {
        self.narrator.stop();
        self.unmount();
    }
}
