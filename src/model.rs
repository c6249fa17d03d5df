//! Domain types shared by every layer.
//!
//! Serialized field names are camelCase so the local snapshot and the remote
//! documents keep the same JSON shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Category
// ============================================================================

/// Closed set of article sections. Serialized as the Hebrew display label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "פוליטיקה")]
    Politics,
    #[serde(rename = "ספורט")]
    Sports,
    #[serde(rename = "טכנולוגיה")]
    Technology,
    #[serde(rename = "תרבות")]
    Culture,
    #[serde(rename = "כלכלה")]
    Economy,
    #[serde(rename = "בריאות")]
    Health,
}

impl Category {
    /// All categories in filter-bar order.
    pub const ALL: [Category; 6] = [
        Category::Politics,
        Category::Sports,
        Category::Technology,
        Category::Culture,
        Category::Economy,
        Category::Health,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Politics => "פוליטיקה",
            Category::Sports => "ספורט",
            Category::Technology => "טכנולוגיה",
            Category::Culture => "תרבות",
            Category::Economy => "כלכלה",
            Category::Health => "בריאות",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Category::Politics => "politics",
            Category::Sports => "sports",
            Category::Technology => "technology",
            Category::Culture => "culture",
            Category::Economy => "economy",
            Category::Health => "health",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    /// Accepts the English slug (case-insensitive) or the Hebrew label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.label() == trimmed || c.slug().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

// ============================================================================
// Comment
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub user_name: String,
    pub text: String,
    pub created_at: i64,
}

// ============================================================================
// Article
// ============================================================================

/// A published article with its embedded comments.
///
/// `breaking_expiry` must be present whenever `is_breaking` is set. The flag
/// is never cleared once the expiry passes; readers compare against the clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub content: String,
    pub author: String,
    pub category: Category,
    pub image_url: String,
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_breaking: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaking_expiry: Option<i64>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Article {
    /// True while the article should appear in the breaking-news ticker.
    ///
    /// An article exactly at its expiry is still live; it drops out once
    /// `now_ms` moves past it.
    pub fn is_breaking_at(&self, now_ms: i64) -> bool {
        if !self.is_breaking.unwrap_or(false) {
            return false;
        }
        match self.breaking_expiry {
            Some(expiry) => expiry >= now_ms,
            None => true,
        }
    }

    /// Case-insensitive substring match over title, subtitle and body.
    ///
    /// `needle_lower` must already be lowercased.
    pub fn matches_search(&self, needle_lower: &str) -> bool {
        [&self.title, &self.subtitle, &self.content]
            .iter()
            .any(|field| field.to_lowercase().contains(needle_lower))
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }
}

/// Sort newest first. Ties keep their relative order.
pub fn sort_newest_first(articles: &mut [Article]) {
    articles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ============================================================================
// Users
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// The signed-in user as cached across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::article;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_category_parses_slug_and_label() {
        assert_eq!("technology".parse(), Ok(Category::Technology));
        assert_eq!("Sports".parse(), Ok(Category::Sports));
        assert_eq!("כלכלה".parse(), Ok(Category::Economy));
        assert!("weather".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_as_label() {
        let json = serde_json::to_string(&Category::Health).unwrap();
        assert_eq!(json, "\"בריאות\"");
    }

    #[test]
    fn test_article_wire_shape_is_camel_case() {
        let mut a = article("a1", 1_700_000_000_000);
        a.is_breaking = Some(true);
        a.breaking_expiry = Some(1_700_000_360_000);
        let value = serde_json::to_value(&a).unwrap();
        assert!(value.get("imageUrl").is_some());
        assert!(value.get("createdAt").is_some());
        assert_eq!(value["isBreaking"], serde_json::json!(true));
        assert_eq!(value["breakingExpiry"], serde_json::json!(1_700_000_360_000i64));
    }

    #[test]
    fn test_missing_comments_deserialize_as_empty() {
        let json = r#"{"id":"x","title":"t","subtitle":"","content":"c","author":"a",
            "category":"ספורט","imageUrl":"","createdAt":5}"#;
        let a: Article = serde_json::from_str(json).unwrap();
        assert!(a.comments.is_empty());
        assert_eq!(a.is_breaking, None);
    }

    #[test]
    fn test_breaking_expiry_boundary() {
        let mut a = article("b", 0);
        a.is_breaking = Some(true);
        a.breaking_expiry = Some(1_000);
        assert!(a.is_breaking_at(999));
        assert!(a.is_breaking_at(1_000));
        assert!(!a.is_breaking_at(1_001));
        // Flag itself is untouched
        assert_eq!(a.is_breaking, Some(true));
    }

    #[test]
    fn test_not_breaking_without_flag() {
        let mut a = article("b", 0);
        a.breaking_expiry = Some(i64::MAX);
        assert!(!a.is_breaking_at(0));
    }

    #[test]
    fn test_matches_search_is_case_insensitive() {
        let mut a = article("s", 0);
        a.subtitle = "Markets RALLY".to_string();
        assert!(a.matches_search("rally"));
        assert!(!a.matches_search("crash"));
    }

    #[test]
    fn test_sort_newest_first() {
        let mut list = vec![article("old", 1), article("new", 3), article("mid", 2)];
        sort_newest_first(&mut list);
        let ids: Vec<_> = list.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }
}
