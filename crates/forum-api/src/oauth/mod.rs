//! Third-party login: the one-shot state registry and the provider client.

pub mod handlers;
pub mod provider;
pub mod state;

pub use provider::{ProviderClient, ProviderError, ProviderSettings};
pub use state::{OAuthStateStore, StateError};
