//! Generative AI helpers for authoring and narration.
//!
//! The public methods never fail: without an API key they return fixed
//! placeholder text (or `None`), and any request failure is logged and turned
//! into an empty result. The `try_*` methods expose the underlying
//! [`AiError`] for callers that want it.

mod gemini;

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::util::{read_limited, require_secure_base, send_with_timeout, BodyError};
use gemini::{image_config, speech_config, GenerateRequest, GenerateResponse};

const SUMMARY_MODEL: &str = "gemini-3-flash-preview";
const TITLE_MODEL: &str = "gemini-3-flash-preview";
const ARTICLE_MODEL: &str = "gemini-3-pro-preview";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const TTS_VOICE: &str = "Kore";
/// Characters of article text sent for narration.
pub const TTS_MAX_CHARS: usize = 1000;

/// Images and audio come back inline as base64.
const MAX_RESPONSE_SIZE: usize = 20 * 1024 * 1024; // 20MB

pub const SUMMARY_UNCONFIGURED: &str = "מפתח API חסר. לא ניתן לייצר תקציר.";
pub const TITLE_UNCONFIGURED: &str = "כותרת (חסר API Key)";
pub const ARTICLE_UNCONFIGURED: &str = "לא ניתן לייצר תוכן ללא מפתח API של Gemini.";
pub const ARTICLE_FAILED: &str = "נכשלה יצירת התוכן. נסה שוב.";

const SUMMARY_SYSTEM: &str = "אתה עורך חדשות בכיר ומקצועי. עליך להחזיר אך ורק את כותרת המשנה עצמה. חל איסור מוחלט לכלול משפטי פתיחה, הקדמות, הסברים או מלל נוסף מכל סוג שהוא. התוצאה צריכה להיות בעברית תקנית ומושכת.";
const TITLE_SYSTEM: &str =
    "אתה כותב כותרות מבריק. עליך להחזיר אך ורק את הכותרת עצמה. אל תכתוב הקדמות. רק את הכותרת.";
const ARTICLE_SYSTEM: &str = "אתה עיתונאי בכיר באתר חדשות מוביל. כתוב בסגנון חדשותי, אובייקטיבי ומרתק בעברית. עליך להחזיר אך ורק את גוף הכתבה עצמה.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI API key not configured")]
    NotConfigured,
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Response contained no usable content")]
    Empty,
}

impl From<BodyError> for AiError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::Timeout(_) => AiError::Timeout,
            BodyError::Network(e) => AiError::Network(e.to_string()),
            BodyError::TooLarge(limit) => AiError::ResponseTooLarge(limit),
        }
    }
}

struct Inner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

/// Client for the Gemini `generateContent` API.
#[derive(Clone)]
pub struct GeminiClient {
    inner: Option<Arc<Inner>>,
}

impl GeminiClient {
    /// Build a client. A missing key or an insecure base URL leaves the
    /// client unconfigured.
    pub fn new(
        api_key: Option<SecretString>,
        base_url: &str,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        let Some(api_key) = api_key else {
            tracing::info!("Gemini API key not set, AI features return placeholders");
            return Self::unconfigured();
        };
        let base_url = match require_secure_base(base_url) {
            Ok(base) => base,
            Err(e) => {
                tracing::error!(error = %e, "Rejecting AI base URL, AI features disabled");
                return Self::unconfigured();
            }
        };
        Self {
            inner: Some(Arc::new(Inner {
                client,
                base_url,
                api_key,
                timeout,
            })),
        }
    }

    pub fn unconfigured() -> Self {
        Self { inner: None }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }

    async fn generate(&self, model: &str, request: GenerateRequest) -> Result<GenerateResponse, AiError> {
        let inner = self.inner.as_ref().ok_or(AiError::NotConfigured)?;
        let url = format!("{}/v1beta/models/{}:generateContent", inner.base_url, model);
        let body = serde_json::to_vec(&request).map_err(|e| AiError::Malformed(e.to_string()))?;

        let builder = inner
            .client
            .post(&url)
            .header("X-Goog-Api-Key", inner.api_key.expose_secret())
            .header("Content-Type", "application/json")
            .body(body);
        let response = send_with_timeout(builder, inner.timeout).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AiError::HttpStatus(status.as_u16()));
        }
        let bytes = read_limited(response, MAX_RESPONSE_SIZE, inner.timeout).await?;
        tracing::debug!(model, bytes = bytes.len(), "AI response received");
        serde_json::from_slice(&bytes).map_err(|e| AiError::Malformed(e.to_string()))
    }

    // ========================================================================
    // Fallible calls
    // ========================================================================

    pub async fn try_summarize(&self, content: &str) -> Result<String, AiError> {
        let prompt = format!("אנא כתוב כותרת משנה קצרה ומושכת (עד 20 מילים) למאמר החדשות הבא: {content}");
        let request = GenerateRequest::prompt(prompt).with_system(SUMMARY_SYSTEM);
        Ok(self.generate(SUMMARY_MODEL, request).await?.text())
    }

    pub async fn try_suggest_title(&self, content: &str) -> Result<String, AiError> {
        let prompt = format!("הצע כותרת ראשית חזקה ומעניינת למאמר הבא: {content}");
        let request = GenerateRequest::prompt(prompt).with_system(TITLE_SYSTEM);
        Ok(self.generate(TITLE_MODEL, request).await?.text())
    }

    pub async fn try_generate_article(&self, title: &str) -> Result<String, AiError> {
        let prompt =
            format!("כתוב כתבת חדשות מלאה, מעניינת ומקצועית המבוססת על הכותרת הבאה: \"{title}\".");
        let request = GenerateRequest::prompt(prompt).with_system(ARTICLE_SYSTEM);
        Ok(self.generate(ARTICLE_MODEL, request).await?.text())
    }

    /// Returns a `data:` URI for the generated image.
    pub async fn try_generate_image(&self, prompt: &str) -> Result<String, AiError> {
        let prompt = format!(
            "A professional news photograph of: {prompt}. Realistic, high quality, detailed, news agency style. ABSOLUTELY NO TEXT."
        );
        let request = GenerateRequest::prompt(prompt).with_config(image_config("16:9"));
        let response = self.generate(IMAGE_MODEL, request).await?;
        let image = response.inline_data().ok_or(AiError::Empty)?;
        let mime = if image.mime_type.starts_with("image/") {
            image.mime_type.as_str()
        } else {
            "image/png"
        };
        Ok(format!("data:{};base64,{}", mime, image.data))
    }

    /// Returns base64 PCM16 audio for the first [`TTS_MAX_CHARS`] characters
    /// of `text`.
    pub async fn try_text_to_speech(&self, text: &str) -> Result<String, AiError> {
        let excerpt: String = text.chars().take(TTS_MAX_CHARS).collect();
        let prompt = format!("הקרא בצורה חדשותית וברורה את הכתבה הבאה: {excerpt}");
        let request = GenerateRequest::prompt(prompt).with_config(speech_config(TTS_VOICE));
        let response = self.generate(TTS_MODEL, request).await?;
        response
            .inline_data()
            .map(|audio| audio.data.clone())
            .filter(|data| !data.is_empty())
            .ok_or(AiError::Empty)
    }

    // ========================================================================
    // Infallible wrappers
    // ========================================================================

    /// A short subtitle for `content`.
    pub async fn summarize(&self, content: &str) -> String {
        if !self.is_configured() {
            return SUMMARY_UNCONFIGURED.to_string();
        }
        self.try_summarize(content).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Summary generation failed");
            String::new()
        })
    }

    pub async fn suggest_title(&self, content: &str) -> String {
        if !self.is_configured() {
            return TITLE_UNCONFIGURED.to_string();
        }
        self.try_suggest_title(content).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Title suggestion failed");
            String::new()
        })
    }

    pub async fn generate_article(&self, title: &str) -> String {
        if !self.is_configured() {
            return ARTICLE_UNCONFIGURED.to_string();
        }
        self.try_generate_article(title).await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Article generation failed");
            ARTICLE_FAILED.to_string()
        })
    }

    pub async fn generate_image(&self, prompt: &str) -> Option<String> {
        if !self.is_configured() {
            return None;
        }
        self.try_generate_image(prompt)
            .await
            .map_err(|e| tracing::error!(error = %e, "Image generation failed"))
            .ok()
    }

    pub async fn text_to_speech(&self, text: &str) -> Option<String> {
        if !self.is_configured() {
            return None;
        }
        self.try_text_to_speech(text)
            .await
            .map_err(|e| tracing::error!(error = %e, "Speech synthesis failed"))
            .ok()
    }
}
