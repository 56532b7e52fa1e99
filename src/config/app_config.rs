use serde::Deserialize;

use crate::infrastructure::llm::ProviderConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

fn default_level() -> String {
    "warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(
            config::Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load_from(env: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(env)
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        config::Environment::with_prefix("APP")
            .separator("__")
            .try_parsing(true)
            .source(Some(source))
    }

    #[test]
    fn test_defaults_without_sources() {
        let config = AppConfig::load_from(env(&[])).unwrap();

        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.provider, ProviderConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::load_from(env(&[
            ("APP__LOGGING__FORMAT", "json"),
            ("APP__PROVIDER__MODEL", "gpt-4o-mini"),
            ("APP__PROVIDER__TIMEOUT", "30"),
            ("APP__PROVIDER__USE_SEMANTIC_KERNEL", "true"),
        ]))
        .unwrap();

        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.provider.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.provider.timeout, Some(30));
        assert_eq!(config.provider.use_semantic_kernel, Some(true));
    }
}
