use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::protocol::{BackendConfig, ProtocolKind};
use crate::core::search::{SearchBackend, SearchDepth, SearchLimits, DEFAULT_MAX_RESULTS};

use super::io::ConfigError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub protocol: ProtocolKind,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Environment variable holding the key; checked before `api_key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchSection {
    /// Whether turns search by default; `--search`/`--no-search` override it.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub depth: SearchDepth,
    #[serde(default)]
    pub backends: Vec<SearchBackend>,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            enabled: false,
            max_results: DEFAULT_MAX_RESULTS,
            depth: SearchDepth::default(),
            backends: Vec::new(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    pub default_provider: Option<String>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    /// Seconds without body bytes before a stream fails; unset or 0 disables it.
    pub idle_timeout_secs: Option<u64>,
    #[serde(default)]
    pub search: SearchSection,
}

impl Config {
    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|provider| provider.id.eq_ignore_ascii_case(id))
    }

    /// Picks the backend for a turn: the named provider, else the default, else
    /// the first configured one, else an OpenAI backend from `OPENAI_API_KEY`.
    pub fn resolve_backend(
        &self,
        provider: Option<&str>,
        model_override: Option<&str>,
    ) -> Result<BackendConfig, ConfigError> {
        self.resolve_backend_with(provider, model_override, |name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_backend_with(
        &self,
        provider: Option<&str>,
        model_override: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<BackendConfig, ConfigError> {
        let requested = provider.or(self.default_provider.as_deref());
        let chosen = match requested {
            Some(id) => Some(
                self.provider(id)
                    .ok_or_else(|| ConfigError::UnknownProvider(id.to_string()))?,
            ),
            None => self.providers.first(),
        };

        let Some(chosen) = chosen else {
            return env_fallback(model_override, &env);
        };

        let api_key = chosen
            .api_key_env
            .as_deref()
            .and_then(&env)
            .or_else(|| chosen.api_key.clone())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey(chosen.id.clone()))?;

        Ok(BackendConfig {
            base_url: chosen.base_url.clone(),
            api_key,
            model: model_override.unwrap_or(&chosen.model).to_string(),
            protocol: chosen.protocol,
        })
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_results: self.search.max_results,
            depth: self.search.depth,
        }
    }

    /// The backend searches go to; only the first configured one is used.
    pub fn search_backend(&self) -> Option<&SearchBackend> {
        self.search.backends.first()
    }
}

fn env_fallback(
    model_override: Option<&str>,
    env: &impl Fn(&str) -> Option<String>,
) -> Result<BackendConfig, ConfigError> {
    let api_key = env("OPENAI_API_KEY")
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::NoProvider)?;
    let base_url =
        env("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

    Ok(BackendConfig {
        base_url,
        api_key,
        model: model_override.unwrap_or(DEFAULT_OPENAI_MODEL).to_string(),
        protocol: ProtocolKind::OpenAi,
    })
}
