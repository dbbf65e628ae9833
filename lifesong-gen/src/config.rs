//! Configuration for lifesong-gen
//!
//! TOML file (optional) → built-in defaults, with CLI overrides applied by
//! `main.rs`. API keys resolve ENV → TOML and are looked up lazily so the
//! service starts without generation credentials.

use lifesong_common::config::{load_toml_config, resolve_secret};
use lifesong_common::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 5790;

/// Full service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub api_keys: ApiKeysConfig,
    pub endpoints: EndpointsConfig,
    pub generation: GenerationConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Keys as written in TOML; see `GenConfig::anthropic_key` and friends for
/// the resolved values
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeysConfig {
    pub anthropic: Option<String>,
    pub suno: Option<String>,
    pub openai: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub spotify_api_base: String,
    pub gmail_api_base: String,
    pub anthropic_url: String,
    pub suno_base_url: String,
    pub whisper_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            spotify_api_base: "https://api.spotify.com/v1".to_string(),
            gmail_api_base: "https://gmail.googleapis.com/gmail/v1".to_string(),
            anthropic_url: "https://api.anthropic.com/v1/messages".to_string(),
            suno_base_url: "https://studio-api.suno.ai/api/external".to_string(),
            whisper_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub poll_interval_secs: u64,
    pub max_wait_secs: u64,
    pub text_model: String,
    pub max_output_tokens: u32,
    pub transcription_model: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            max_wait_secs: 600,
            text_model: "claude-3-haiku-20240307".to_string(),
            max_output_tokens: 1024,
            transcription_model: crate::transcription::DEFAULT_MODEL.to_string(),
        }
    }
}

impl GenerationConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    /// Local message store; defaults to `~/Library/Messages/chat.db`
    pub db_path: Option<PathBuf>,
    pub days_back: u32,
    pub max_messages: u32,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            days_back: 7,
            max_messages: 1000,
        }
    }
}

impl MessagesConfig {
    pub fn resolved_db_path(&self) -> Option<PathBuf> {
        self.db_path.clone().or_else(|| {
            dirs::home_dir().map(|home| home.join("Library").join("Messages").join("chat.db"))
        })
    }
}

impl GenConfig {
    /// Load from a TOML file; a missing file yields defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_toml_config(path)
    }

    pub fn anthropic_key(&self) -> Option<String> {
        resolve_secret(
            "Anthropic API key",
            "ANTHROPIC_API_KEY",
            self.api_keys.anthropic.as_deref(),
        )
    }

    pub fn suno_key(&self) -> Option<String> {
        resolve_secret("Suno API key", "SUNO_API_KEY", self.api_keys.suno.as_deref())
    }

    pub fn openai_key(&self) -> Option<String> {
        resolve_secret(
            "OpenAI API key",
            "OPENAI_API_KEY",
            self.api_keys.openai.as_deref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GenConfig::default();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.generation.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.generation.max_wait(), Duration::from_secs(600));
        assert_eq!(config.messages.days_back, 7);
        assert_eq!(config.messages.max_messages, 1000);
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: GenConfig = toml::from_str(
            r#"
            [server]
            port = 6000

            [generation]
            max_wait_secs = 120
            transcription_model = "whisper-large"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 6000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.generation.max_wait_secs, 120);
        assert_eq!(config.generation.poll_interval_secs, 5);
        assert_eq!(config.generation.transcription_model, "whisper-large");
        assert_eq!(config.generation.text_model, "claude-3-haiku-20240307");
        assert_eq!(config.endpoints.spotify_api_base, "https://api.spotify.com/v1");
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let messages = MessagesConfig {
            db_path: Some(PathBuf::from("/tmp/chat.db")),
            ..Default::default()
        };
        assert_eq!(messages.resolved_db_path(), Some(PathBuf::from("/tmp/chat.db")));
    }
}
