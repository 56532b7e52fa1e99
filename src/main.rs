use clap::Parser;
use llm_providers::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli::bootstrap();

    match cli.command {
        Command::Complete(args) => cli::complete::run(args, config.provider).await,
        Command::Models => cli::models::run(),
    }
}
