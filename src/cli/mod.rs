//! CLI module for llm-providers
//!
//! - `complete`: run a single completion through the provider factory
//! - `models`: list supported model identifiers

pub mod complete;
pub mod models;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// llm-providers - Provider-agnostic LLM completions
#[derive(Parser)]
#[command(name = "llm-providers")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Send a prompt and print the completion
    Complete(complete::CompleteArgs),

    /// List supported models
    Models,
}

/// Load `.env` and configuration, then install logging
pub fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging);

    config
}
