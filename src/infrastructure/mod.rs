//! Infrastructure layer - Provider backends, credentials and persistence

pub mod credentials;
pub mod llm;
pub mod logging;
pub mod persistence;
