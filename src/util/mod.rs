//! Utility functions for common operations.
//!
//! - **Identifiers**: short random tokens for articles, comments and users
//! - **Endpoints**: HTTPS enforcement for remote services and image references
//! - **HTTP**: timeouts and size-capped body reads shared by the API clients
//! - **Text**: Unicode-aware width calculation and truncation for the CLI views

mod endpoint;
mod http;
mod id;
mod text;

pub use endpoint::{require_secure_base, validate_image_ref, EndpointError};
pub use http::{read_limited, send_with_timeout, BodyError};
pub use id::{new_token, now_ms};
pub use text::{display_width, first_line, truncate_to_width};
