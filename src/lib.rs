//! truenews: a news publishing app over a remote document collection with a
//! local fallback store.
//!
//! The crate is split the same way the runtime is layered:
//!
//! - [`storage`] - SQLite-backed key-value store holding the local article
//!   snapshot, the session user and registered credentials
//! - [`remote`] - remote document collection (Firestore REST)
//! - [`sync`] - the façade the rest of the app uses for article persistence
//! - [`auth`] - registration, login and the cached session
//! - [`ai`] - generative text/image/speech client
//! - [`audio`] - narration decoding and playback state
//! - [`editor`] - the authoring form and its validation
//! - [`app`] - application state controller
//! - [`render`] - plain-text views used by the CLI

pub mod ai;
pub mod app;
pub mod audio;
pub mod auth;
pub mod config;
pub mod editor;
pub mod model;
pub mod remote;
pub mod render;
pub mod seed;
pub mod storage;
pub mod sync;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;
