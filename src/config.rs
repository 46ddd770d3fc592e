use anyhow::Result;
use serde::Deserialize;

use crate::transport::gemini::DEFAULT_LIVE_ENDPOINT;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveConfig,
    pub content: ContentConfig,
    pub progress: ProgressConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LiveConfig {
    /// Websocket endpoint of the live voice service
    pub endpoint: String,
    /// Model identifier for live sessions
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
}

#[derive(Debug, Deserialize)]
pub struct ContentConfig {
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ProgressConfig {
    /// JSON file holding completion lists
    pub path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "habla-live".to_string(),
            },
            live: LiveConfig {
                endpoint: DEFAULT_LIVE_ENDPOINT.to_string(),
                model: "gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
                api_key_env: "GEMINI_API_KEY".to_string(),
            },
            content: ContentConfig {
                retry_attempts: 3,
                retry_delay_ms: 1000,
            },
            progress: ProgressConfig {
                path: "progress.json".to_string(),
            },
        }
    }
}
