mod kv;
mod local;
mod schema;
mod types;

pub use local::{LocalStore, ARTICLES_KEY, ARTICLES_REVISION_KEY, CREDENTIALS_KEY, SESSION_USER_KEY};
pub use schema::Database;
pub use types::{CollectionChange, DatabaseError};
