//! API key resolution

mod env_provider;

pub use env_provider::{ApiKeySource, Credential, DEFAULT_API_KEY_ENV};
