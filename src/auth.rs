//! Registration, login and the cached session.
//!
//! Credentials live behind [`CredentialRepository`] so the controller never
//! touches storage keys directly. Passwords are kept as SHA-256 hex digests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::model::{Role, User};
use crate::storage::{DatabaseError, LocalStore, CREDENTIALS_KEY, SESSION_USER_KEY};
use crate::util::new_token;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("נא למלא את כל השדות")]
    MissingFields,
    #[error("שם משתמש זה כבר תפוס")]
    UsernameTaken,
    #[error("שם משתמש או סיסמה לא נכונים. במידה ולא נרשמת, עבור ללשונית ההרשמה.")]
    InvalidCredentials,
    #[error("Credential storage error: {0}")]
    Storage(#[from] DatabaseError),
    #[error("Credential storage unavailable")]
    Unavailable,
}

/// A registered account as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub username: String,
    pub password_digest: String,
    pub role: Role,
}

impl Credential {
    /// The session record for this account. Display name is the username.
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.username.clone(),
            name: self.username.clone(),
            role: self.role,
        }
    }
}

pub fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn load_all(&self) -> Result<Vec<Credential>, AuthError>;
    async fn insert(&self, credential: Credential) -> Result<(), AuthError>;
}

/// Credentials stored as one JSON list in the local store.
pub struct StoredCredentials {
    store: LocalStore,
}

impl StoredCredentials {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialRepository for StoredCredentials {
    async fn load_all(&self) -> Result<Vec<Credential>, AuthError> {
        Ok(self
            .store
            .get_json::<Vec<Credential>>(CREDENTIALS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn insert(&self, credential: Credential) -> Result<(), AuthError> {
        let mut all = self.load_all().await?;
        all.push(credential);
        self.store.set_json(CREDENTIALS_KEY, &all).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCredentials {
    users: Mutex<Vec<Credential>>,
}

#[async_trait]
impl CredentialRepository for MemoryCredentials {
    async fn load_all(&self) -> Result<Vec<Credential>, AuthError> {
        let users = self.users.lock().map_err(|_| AuthError::Unavailable)?;
        Ok(users.clone())
    }

    async fn insert(&self, credential: Credential) -> Result<(), AuthError> {
        let mut users = self.users.lock().map_err(|_| AuthError::Unavailable)?;
        users.push(credential);
        Ok(())
    }
}

/// Where the signed-in user is remembered between runs.
pub enum SessionCache {
    Stored(LocalStore),
    Memory,
}

impl SessionCache {
    async fn load(&self) -> Result<Option<User>, AuthError> {
        match self {
            SessionCache::Stored(store) => Ok(store.get_json(SESSION_USER_KEY).await?),
            SessionCache::Memory => Ok(None),
        }
    }

    async fn save(&self, user: &User) -> Result<(), AuthError> {
        if let SessionCache::Stored(store) = self {
            store.set_json(SESSION_USER_KEY, user).await?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        if let SessionCache::Stored(store) = self {
            store.remove_key(SESSION_USER_KEY).await?;
        }
        Ok(())
    }
}

pub struct AuthState {
    repo: Arc<dyn CredentialRepository>,
    session: SessionCache,
    admin_code: String,
    current: Option<User>,
}

impl AuthState {
    pub fn new(repo: Arc<dyn CredentialRepository>, session: SessionCache, admin_code: impl Into<String>) -> Self {
        Self {
            repo,
            session,
            admin_code: admin_code.into(),
            current: None,
        }
    }

    /// Stored credentials and session over one local store.
    pub fn stored(store: LocalStore, admin_code: impl Into<String>) -> Self {
        Self::new(
            Arc::new(StoredCredentials::new(store.clone())),
            SessionCache::Stored(store),
            admin_code,
        )
    }

    pub fn in_memory(admin_code: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryCredentials::default()), SessionCache::Memory, admin_code)
    }

    pub fn current_user(&self) -> Option<&User> {
        self.current.as_ref()
    }

    /// Load the cached session user. A corrupt cache is discarded.
    pub async fn restore(&mut self) -> Option<&User> {
        match self.session.load().await {
            Ok(user) => self.current = user,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session cache");
                self.current = None;
            }
        }
        self.current.as_ref()
    }

    /// Create an account. Does not sign in.
    ///
    /// The account is an admin only when `admin_code` matches the configured
    /// secret exactly.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        admin_code: Option<&str>,
    ) -> Result<User, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let existing = self.repo.load_all().await?;
        if existing.iter().any(|c| c.username == username) {
            return Err(AuthError::UsernameTaken);
        }

        let role = if admin_code == Some(self.admin_code.as_str()) {
            Role::Admin
        } else {
            Role::User
        };
        let credential = Credential {
            id: new_token(),
            username: username.to_string(),
            password_digest: password_digest(password),
            role,
        };
        let user = credential.to_user();
        self.repo.insert(credential).await?;
        tracing::info!(username, role = ?role, "Registered user");
        Ok(user)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<&User, AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingFields);
        }
        let digest = password_digest(password);
        let user = self
            .repo
            .load_all()
            .await?
            .into_iter()
            .find(|c| c.username == username && c.password_digest == digest)
            .map(|c| c.to_user())
            .ok_or(AuthError::InvalidCredentials)?;

        self.session.save(&user).await?;
        tracing::info!(username, "Signed in");
        Ok(self.current.insert(user))
    }

    pub async fn logout(&mut self) -> Result<(), AuthError> {
        self.current = None;
        self.session.clear().await
    }
}
