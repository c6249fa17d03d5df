//! Configuration file parser for ~/.config/truenews/config.toml.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which runs in local-only mode with AI features degraded. Unknown keys are
//! accepted by serde and logged as a warning in case they are typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Registration code that elevates a new account to admin.
pub const DEFAULT_ADMIN_CODE: &str = "1234";

pub const DEFAULT_AI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://firestore.googleapis.com";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// The custom Debug impl masks every credential.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Code that grants the admin role at registration.
    pub admin_code: String,

    /// Gemini API key (alternative to the GEMINI_API_KEY env var).
    /// Env var takes precedence over config file.
    pub gemini_api_key: Option<String>,

    /// Base URL of the generative-AI API.
    pub ai_base_url: String,

    /// Timeout applied to every outbound HTTP request, in seconds.
    pub request_timeout_secs: u64,

    /// Remote document collection. Absent or placeholder credentials select
    /// local-only mode.
    pub remote: RemoteConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            admin_code: DEFAULT_ADMIN_CODE.to_string(),
            gemini_api_key: None,
            ai_base_url: DEFAULT_AI_BASE_URL.to_string(),
            request_timeout_secs: 60,
            remote: RemoteConfig::default(),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("admin_code", &"[REDACTED]")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("ai_base_url", &self.ai_base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("remote", &self.remote)
            .finish()
    }
}

/// `[remote]` table.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub project_id: Option<String>,
    pub api_key: Option<String>,
    pub collection: String,
    pub base_url: String,
    /// How often the subscription re-queries the collection.
    pub poll_interval_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            api_key: None,
            collection: "articles".to_string(),
            base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            poll_interval_secs: 5,
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("project_id", &self.project_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("collection", &self.collection)
            .field("base_url", &self.base_url)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .finish()
    }
}

/// Validated remote credentials, only produced when every value is real.
pub struct RemoteCredentials {
    pub project_id: String,
    pub api_key: SecretString,
    pub collection: String,
    pub base_url: String,
    pub poll_interval_secs: u64,
}

impl RemoteConfig {
    /// Returns credentials if the project id and key are present and are
    /// not template placeholders.
    pub fn credentials(&self) -> Option<RemoteCredentials> {
        let project_id = self.project_id.as_deref().filter(|v| !is_placeholder(v))?;
        let api_key = self.api_key.as_deref().filter(|v| !is_placeholder(v))?;
        if self.collection.trim().is_empty() {
            return None;
        }
        Some(RemoteCredentials {
            project_id: project_id.trim().to_string(),
            api_key: SecretString::from(api_key.trim().to_string()),
            collection: self.collection.trim().to_string(),
            base_url: self.base_url.clone(),
            poll_interval_secs: self.poll_interval_secs.max(1),
        })
    }
}

/// Empty values and the usual "fill me in" markers.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    if v.is_empty() {
        return true;
    }
    let upper = v.to_uppercase();
    upper.contains("YOUR_")
        || upper.contains("PLACEHOLDER")
        || upper.contains("CHANGEME")
        || (v.starts_with('<') && v.ends_with('>'))
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "admin_code",
        "gemini_api_key",
        "ai_base_url",
        "request_timeout_secs",
        "remote",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply environment overrides. Env vars win over the file.
    ///
    /// - `GEMINI_API_KEY`, then `API_KEY` → `gemini_api_key`
    /// - `TRUENEWS_REMOTE_PROJECT_ID` → `remote.project_id`
    /// - `TRUENEWS_REMOTE_API_KEY` → `remote.api_key`
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(|name| std::env::var(name).ok());
        self
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("GEMINI_API_KEY").or_else(|| lookup("API_KEY")) {
            self.gemini_api_key = Some(key);
        }
        if let Some(project) = lookup("TRUENEWS_REMOTE_PROJECT_ID") {
            self.remote.project_id = Some(project);
        }
        if let Some(key) = lookup("TRUENEWS_REMOTE_API_KEY") {
            self.remote.api_key = Some(key);
        }
    }

    /// The AI key, if one is configured and not a placeholder.
    pub fn gemini_key(&self) -> Option<SecretString> {
        self.gemini_api_key
            .as_deref()
            .filter(|k| !is_placeholder(k))
            .map(|k| SecretString::from(k.trim().to_string()))
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

// ============================================================================
// Tests
// ============================================================================
