//! Complete command - one prompt in, one completion out

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::domain::{CompletionInput, CompletionOptions, LlmResponse, Message};
use crate::infrastructure::llm::{ProviderConfig, ProviderFactory};
use crate::infrastructure::persistence;

/// Arguments for the complete command
#[derive(Args, Clone, Debug)]
pub struct CompleteArgs {
    /// Prompt text
    pub prompt: String,

    /// Model identifier (overrides config)
    #[arg(long)]
    pub model: Option<String>,

    /// Route through the kernel backend
    #[arg(long, conflicts_with = "direct")]
    pub kernel: bool,

    /// Call the provider API directly
    #[arg(long)]
    pub direct: bool,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// System message sent before the prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Directory to save the response in
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

impl CompleteArgs {
    /// `None` leaves the choice to config and environment
    pub fn backend_flag(&self) -> Option<bool> {
        match (self.kernel, self.direct) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn input(&self) -> CompletionInput {
        match self.system {
            Some(ref system) => CompletionInput::Messages(vec![
                Message::system(system.clone()),
                Message::user(self.prompt.clone()),
            ]),
            None => CompletionInput::from(self.prompt.as_str()),
        }
    }

    fn options(&self) -> CompletionOptions {
        let mut options = CompletionOptions::default();
        if let Some(temperature) = self.temperature {
            options = options.temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            options = options.max_tokens(max_tokens);
        }
        options
    }
}

/// Run the complete command
pub async fn run(args: CompleteArgs, provider_config: ProviderConfig) -> anyhow::Result<()> {
    let factory = ProviderFactory::new();
    let response = execute(&factory, &args, provider_config).await?;

    println!("{}", response.content);

    if let Some(ref dir) = args.save_dir {
        let path =
            persistence::save_responses(dir, std::slice::from_ref(&response), "completion", None)
                .await?;
        info!(path = %path.display(), "Response saved");
    }

    Ok(())
}

async fn execute(
    factory: &ProviderFactory,
    args: &CompleteArgs,
    mut provider_config: ProviderConfig,
) -> anyhow::Result<LlmResponse> {
    if let Some(ref model) = args.model {
        provider_config.model = Some(model.clone());
    }

    let provider = factory
        .create_provider(&provider_config, true, args.backend_flag())
        .await?;

    info!(
        model = provider.model(),
        backend = %provider.backend(),
        "Sending completion"
    );

    Ok(provider.complete(args.input(), args.options()).await?)
}
