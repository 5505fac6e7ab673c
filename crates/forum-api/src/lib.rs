//! HTTP-facing auth and reaction core of the forum: password hashing,
//! session-cookie identity, OAuth login, and like/dislike toggling.

pub mod auth;
pub mod authenticator;
pub mod error;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod posts;
pub mod reactions;
pub mod router;
pub mod settings;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;
