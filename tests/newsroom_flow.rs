//! End-to-end newsroom scenarios driven through the `App` controller.
//!
//! Each test creates its own in-memory SQLite database. Remote-backed tests
//! use the in-process collection so writes and listener pushes stay local.

use std::sync::Arc;
use std::time::Duration;

use truenews::ai::GeminiClient;
use truenews::app::{App, AppError, View};
use truenews::audio::{Narrator, TimedSink};
use truenews::auth::AuthState;
use truenews::config::DEFAULT_ADMIN_CODE;
use truenews::editor::ArticleDraft;
use truenews::model::Category;
use truenews::remote::{MemoryCollection, RemoteCollection};
use truenews::seed;
use truenews::storage::{Database, LocalStore};
use truenews::sync::{ArticleSync, Backend, RemoteWrite};

async fn test_store() -> LocalStore {
    LocalStore::new(Database::open(":memory:").await.unwrap())
}

fn build_app(backend: Backend, store: LocalStore) -> App {
    App::new(
        ArticleSync::new(backend, store.clone()),
        AuthState::stored(store, DEFAULT_ADMIN_CODE),
        GeminiClient::unconfigured(),
        Narrator::new(GeminiClient::unconfigured(), Arc::new(TimedSink)),
    )
}

fn draft(title: &str, content: &str) -> ArticleDraft {
    ArticleDraft::new(title, content)
}

/// Apply events until `done` holds, failing the test after a few seconds.
async fn pump_until(app: &mut App, done: impl Fn(&App) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done(app) {
            assert!(app.pump().await, "event channel closed");
        }
    })
    .await
    .expect("condition not reached in time");
}

// ============================================================================
// Local-only mode
// ============================================================================

#[tokio::test]
async fn test_fresh_install_shows_samples_until_first_publish() {
    let store = test_store().await;
    let mut app = build_app(Backend::LocalOnly, store.clone());
    app.load().await;

    let ids: Vec<&str> = app.articles().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, seed::SEED_IDS.to_vec());
    assert!(app.breaking_news().is_empty());

    app.register("chief", "secret", Some(DEFAULT_ADMIN_CODE))
        .await
        .unwrap();
    app.login("chief", "secret").await.unwrap();
    app.publish_draft(&draft("פתיחה", "גוף הכתבה")).await.unwrap();

    pump_until(&mut app, |app| app.articles()[0].title == "פתיחה").await;
    // Samples disappear once real content exists
    assert_eq!(app.articles().len(), 1);
    assert_eq!(store.load_articles().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_comment_lifecycle_across_users() {
    let store = test_store().await;
    let mut app = build_app(Backend::LocalOnly, store.clone());
    app.register("chief", "pw", Some(DEFAULT_ADMIN_CODE))
        .await
        .unwrap();
    app.register("reader", "pw", None).await.unwrap();
    app.register("other", "pw", None).await.unwrap();

    app.login("chief", "pw").await.unwrap();
    app.load().await;
    app.publish_draft(&draft("כותרת", "גוף")).await.unwrap();
    pump_until(&mut app, |app| app.articles()[0].title == "כותרת").await;
    let article_id = app.articles()[0].id.clone();
    app.logout().await.unwrap();

    // Reader comments
    app.login("reader", "pw").await.unwrap();
    app.open_article(&article_id).unwrap();
    assert_eq!(app.view(), View::Article);
    let report = app.add_comment("  תגובה ראשונה  ").await.unwrap().unwrap();
    assert_eq!(report.remote, RemoteWrite::Skipped);
    let comment_id = app.selected_article().unwrap().comments[0].id.clone();
    assert_eq!(app.selected_article().unwrap().comments[0].text, "תגובה ראשונה");

    // Someone else may not delete it
    app.logout().await.unwrap();
    app.login("other", "pw").await.unwrap();
    assert!(matches!(
        app.delete_comment(&comment_id).await,
        Err(AppError::Unauthorized)
    ));

    // An admin may
    app.logout().await.unwrap();
    app.login("chief", "pw").await.unwrap();
    assert!(app.delete_comment(&comment_id).await.unwrap().is_some());
    assert!(app.selected_article().unwrap().comments.is_empty());

    let stored = store.load_articles().await.unwrap();
    assert!(stored[0].comments.is_empty());
}

#[tokio::test]
async fn test_guest_cannot_comment_or_publish() {
    let mut app = build_app(Backend::LocalOnly, test_store().await);
    app.load().await;
    app.open_article(seed::SEED_IDS[0]).unwrap();

    assert!(app.add_comment("hello").await.unwrap().is_none());
    assert!(matches!(
        app.publish_draft(&draft("t", "c")).await,
        Err(AppError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_category_and_search_filters_compose() {
    let store = test_store().await;
    let mut app = build_app(Backend::LocalOnly, store);
    app.register("chief", "pw", Some(DEFAULT_ADMIN_CODE))
        .await
        .unwrap();
    app.login("chief", "pw").await.unwrap();
    app.load().await;

    let mut sports = draft("גמר הגביע", "משחק צמוד");
    sports.category = Category::Sports;
    app.publish_draft(&sports).await.unwrap();
    let mut economy = draft("הריבית עולה", "בנק ישראל");
    economy.category = Category::Economy;
    app.publish_draft(&economy).await.unwrap();
    pump_until(&mut app, |app| {
        app.articles().len() == 2 && !app.articles().iter().any(|a| seed::is_seed(&a.id))
    })
    .await;

    app.select_category(Some(Category::Sports));
    let titles: Vec<&str> = app
        .filtered_articles()
        .iter()
        .map(|a| a.title.as_str())
        .collect();
    assert_eq!(titles, vec!["גמר הגביע"]);

    app.set_search("ריבית");
    assert!(app.filtered_articles().is_empty());

    app.select_category(None);
    assert_eq!(app.filtered_articles().len(), 1);
    assert_eq!(app.hero_article().unwrap().title, "הריבית עולה");
    assert!(app.list_articles().is_empty());
}

#[tokio::test]
async fn test_watcher_sees_publish_from_another_session() {
    let dir = std::env::temp_dir().join(format!("truenews_flow_{}", truenews::util::new_token()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("news.db");
    let path = path.to_str().unwrap();

    // Two independent stores on one file, like two terminals
    let watcher_store = LocalStore::new(Database::open(path).await.unwrap());
    let writer_store = LocalStore::new(Database::open(path).await.unwrap());
    let mut watcher = App::new(
        ArticleSync::new(Backend::LocalOnly, watcher_store.clone())
            .with_local_poll_interval(Duration::from_millis(50)),
        AuthState::stored(watcher_store, DEFAULT_ADMIN_CODE),
        GeminiClient::unconfigured(),
        Narrator::new(GeminiClient::unconfigured(), Arc::new(TimedSink)),
    );
    let mut writer = build_app(Backend::LocalOnly, writer_store);

    watcher.load().await;
    assert!(watcher.articles().iter().all(|a| seed::is_seed(&a.id)));

    writer
        .register("chief", "pw", Some(DEFAULT_ADMIN_CODE))
        .await
        .unwrap();
    writer.login("chief", "pw").await.unwrap();
    writer.publish_draft(&draft("ממסוף אחר", "גוף")).await.unwrap();

    pump_until(&mut watcher, |app| app.articles()[0].title == "ממסוף אחר").await;
    assert_eq!(watcher.articles().len(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

// ============================================================================
// Remote-backed mode
// ============================================================================

#[tokio::test]
async fn test_remote_publish_reaches_listener_and_backup() {
    let store = test_store().await;
    let remote = MemoryCollection::new();
    let mut app = build_app(
        Backend::RemoteBacked(Arc::new(remote.clone())),
        store.clone(),
    );
    app.register("chief", "pw", Some(DEFAULT_ADMIN_CODE))
        .await
        .unwrap();
    app.login("chief", "pw").await.unwrap();
    app.load().await;

    let report = app.publish_draft(&draft("מרחוק", "גוף")).await.unwrap();
    let RemoteWrite::Written { id } = &report.remote else {
        panic!("expected remote write, got {:?}", report.remote);
    };

    pump_until(&mut app, |app| app.articles()[0].title == "מרחוק").await;
    assert_eq!(&app.articles()[0].id, id);
    assert_eq!(remote.query().await.unwrap().len(), 1);
    assert_eq!(store.load_articles().await.unwrap()[0].title, "מרחוק");
}

#[tokio::test]
async fn test_remote_outage_keeps_local_copy() {
    let store = test_store().await;
    let remote = MemoryCollection::new();
    remote.set_failing(true);
    let mut app = build_app(
        Backend::RemoteBacked(Arc::new(remote.clone())),
        store.clone(),
    );
    app.register("chief", "pw", Some(DEFAULT_ADMIN_CODE))
        .await
        .unwrap();
    app.login("chief", "pw").await.unwrap();
    app.load().await;
    // Nothing anywhere, so the samples show
    assert_eq!(app.articles().len(), seed::SEED_IDS.len());

    let report = app.publish_draft(&draft("בלי רשת", "גוף")).await.unwrap();
    assert!(report.remote_failed());
    assert_eq!(store.load_articles().await.unwrap()[0].title, "בלי רשת");

    let id = store.load_articles().await.unwrap()[0].id.clone();
    let removed = app.remove_article(&id).await.unwrap();
    assert!(removed.remote_failed());
    assert!(store.load_articles().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_existing_remote_documents_load_newest_first() {
    let store = test_store().await;
    let seeded_remote = MemoryCollection::new();
    let sync = ArticleSync::new(
        Backend::RemoteBacked(Arc::new(seeded_remote.clone())),
        store.clone(),
    );
    let mut older = seed::default_articles(1_000_000)[1].clone();
    older.id = "Aa1Bb2Cc3Dd4Ee5Ff6Gg".into();
    let mut newer = seed::default_articles(1_000_000)[0].clone();
    newer.id = "Hh7Ii8Jj9Kk0Ll1Mm2Nn".into();
    sync.save_all(&[older, newer]).await.unwrap();

    let mut app = build_app(Backend::RemoteBacked(Arc::new(seeded_remote)), store);
    app.load().await;
    let ids: Vec<&str> = app.articles().iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["Hh7Ii8Jj9Kk0Ll1Mm2Nn", "Aa1Bb2Cc3Dd4Ee5Ff6Gg"]);
}
