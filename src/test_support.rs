//! Fixtures shared by unit tests.

use crate::model::{Article, Category, Comment};
use crate::storage::{Database, LocalStore};

pub(crate) fn article(id: &str, created_at: i64) -> Article {
    Article {
        id: id.to_string(),
        title: format!("Title {id}"),
        subtitle: String::new(),
        content: "Body".to_string(),
        author: "Desk".to_string(),
        category: Category::Politics,
        image_url: String::new(),
        created_at,
        is_breaking: None,
        breaking_expiry: None,
        comments: Vec::new(),
    }
}

pub(crate) fn comment(id: &str, user_name: &str) -> Comment {
    Comment {
        id: id.to_string(),
        user_name: user_name.to_string(),
        text: format!("comment {id}"),
        created_at: 1,
    }
}

pub(crate) async fn test_store() -> LocalStore {
    let db = Database::open(":memory:").await.unwrap();
    LocalStore::new(db)
}
