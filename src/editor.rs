//! Article authoring: a draft form that validates into an [`Article`], with
//! optional AI fill-in.

use thiserror::Error;

use crate::ai::GeminiClient;
use crate::model::{Article, Category};
use crate::util::{new_token, validate_image_ref, EndpointError};

pub const DEFAULT_IMAGE_URL: &str =
    "https://images.unsplash.com/photo-1495020689067-958852a7765e?auto=format&fit=crop&q=80&w=800";

pub const MIN_BREAKING_HOURS: u32 = 1;
pub const MAX_BREAKING_HOURS: u32 = 24;

const HOUR_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("אנא הזן כותרת ותוכן.")]
    MissingTitleOrContent,
    #[error("אנא הזן כותרת כדי לייצר תוכן.")]
    MissingTitle,
    #[error("אנא הזן תוכן כדי להציע כותרת.")]
    MissingContent,
    #[error("Invalid image reference: {0}")]
    Image(#[from] EndpointError),
}

/// Reject articles without a title or body.
pub fn validate(article: &Article) -> Result<(), ValidationError> {
    if article.title.trim().is_empty() || article.content.trim().is_empty() {
        return Err(ValidationError::MissingTitleOrContent);
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDraft {
    pub title: String,
    pub subtitle: String,
    pub content: String,
    pub category: Category,
    pub image_url: String,
    pub is_breaking: bool,
    breaking_hours: u32,
}

impl Default for ArticleDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: String::new(),
            content: String::new(),
            category: Category::Politics,
            image_url: DEFAULT_IMAGE_URL.to_string(),
            is_breaking: false,
            breaking_hours: MIN_BREAKING_HOURS,
        }
    }
}

impl ArticleDraft {
    /// A draft with the given headline and body and default everything else.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn breaking_hours(&self) -> u32 {
        self.breaking_hours
    }

    pub fn set_breaking_hours(&mut self, hours: u32) {
        self.breaking_hours = hours.clamp(MIN_BREAKING_HOURS, MAX_BREAKING_HOURS);
    }

    /// Validate and produce a new article stamped with `now`.
    pub fn build(&self, author: &str, now: i64) -> Result<Article, ValidationError> {
        validate_image_ref(&self.image_url)?;
        let article = Article {
            id: new_token(),
            title: self.title.trim().to_string(),
            subtitle: self.subtitle.trim().to_string(),
            content: self.content.trim().to_string(),
            author: author.to_string(),
            category: self.category,
            image_url: self.image_url.trim().to_string(),
            created_at: now,
            is_breaking: Some(self.is_breaking),
            breaking_expiry: self
                .is_breaking
                .then(|| now + i64::from(self.breaking_hours) * HOUR_MS),
            comments: Vec::new(),
        };
        validate(&article)?;
        Ok(article)
    }

    /// Fill body, subtitle and (when one comes back) image from the title.
    pub async fn auto_generate(&mut self, ai: &GeminiClient) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        self.content = ai.generate_article(&self.title).await;
        self.subtitle = ai.summarize(&self.content).await;
        if let Some(image) = ai.generate_image(&self.title).await {
            self.image_url = image;
        }
        tracing::debug!(content_len = self.content.len(), "Draft filled by AI");
        Ok(())
    }

    pub async fn suggest_title(&mut self, ai: &GeminiClient) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingContent);
        }
        let title = ai.suggest_title(&self.content).await;
        if !title.is_empty() {
            self.title = title;
        }
        Ok(())
    }
}
