use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

pub const DEFAULT_OPENAI_HOST: &str = "https://api.openai.com";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// One request to the remote endpoint may block the whole session, so every
/// provider carries a hard timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl OpenAiProviderConfig {
    pub fn new(host: String, api_key: String) -> Self {
        Self {
            host,
            api_key,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Read the credential once at process start. A missing key is a fatal
    /// startup error, not a per-call error.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable is not set"))?;
        let host = env::var("OPENAI_HOST").unwrap_or_else(|_| DEFAULT_OPENAI_HOST.to_string());
        Ok(Self::new(host, api_key))
    }
}

#[derive(Debug, Clone)]
pub struct OllamaProviderConfig {
    pub host: String,
    pub timeout: Duration,
}

impl OllamaProviderConfig {
    pub fn new(host: String) -> Self {
        Self {
            host,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn from_env() -> Result<Self> {
        let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());
        Ok(Self::new(host))
    }
}

/// Unified enum to wrap different provider configurations
#[derive(Debug, Clone)]
pub enum ProviderConfig {
    OpenAi(OpenAiProviderConfig),
    Ollama(OllamaProviderConfig),
}
