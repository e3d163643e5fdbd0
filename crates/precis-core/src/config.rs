//! Service configuration loaded from `precis.toml`.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Lookup order: explicit path, `./precis.toml`, then
//! `<user config dir>/precis/precis.toml`, then built-in defaults.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const CONFIG_FILE_NAME: &str = "precis.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind_addr: SocketAddr,
    /// Allow cross-origin requests from any origin.
    pub cors: bool,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            cors: true,
            max_body_bytes: 2 * 1024 * 1024,
            request_timeout_secs: 120,
        }
    }
}

/// Checkpoint location and input shaping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub checkpoint_dir: PathBuf,
    /// Encoder input cap in tokens; also drives the character pre-truncation.
    pub max_input_tokens: usize,
    pub task_prefix: String,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            checkpoint_dir: PathBuf::from("models").join("checkpoint"),
            max_input_tokens: 512,
            task_prefix: "summarize: ".to_string(),
        }
    }
}

/// Decoding defaults and the bounds enforced on per-request overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_length: i64,
    pub min_length: i64,
    pub num_beams: i64,
    pub no_repeat_ngram_size: usize,
    pub length_penalty: f32,
    pub early_stopping: bool,
    /// Largest `max_length` a request may ask for.
    pub max_length_limit: i64,
    /// Largest `num_beams` a request may ask for.
    pub max_beams: i64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_length: 200,
            min_length: 30,
            num_beams: 8,
            no_repeat_ngram_size: 3,
            length_penalty: 2.0,
            early_stopping: true,
            max_length_limit: 1024,
            max_beams: 16,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSettings,
    pub model: ModelSettings,
    pub generation: GenerationSettings,
}

impl Config {
    /// Load from an explicit path, or search the standard locations.
    ///
    /// An explicit path that does not exist is an error; a missing file in the
    /// standard locations is not.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        match Self::find_config_file() {
            Some(found) => Self::load_from(&found),
            None => {
                debug!("no {CONFIG_FILE_NAME} found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate a specific TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check that the defaults are themselves acceptable request values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.generation;
        if g.num_beams < 1 || g.num_beams > g.max_beams {
            return Err(ConfigError::Invalid(format!(
                "generation.num_beams must be within 1..={}, got {}",
                g.max_beams, g.num_beams
            )));
        }
        if g.min_length < 0 {
            return Err(ConfigError::Invalid(format!(
                "generation.min_length must not be negative, got {}",
                g.min_length
            )));
        }
        if g.max_length < 1 || g.max_length > g.max_length_limit {
            return Err(ConfigError::Invalid(format!(
                "generation.max_length must be within 1..={}, got {}",
                g.max_length_limit, g.max_length
            )));
        }
        if !g.length_penalty.is_finite() {
            return Err(ConfigError::Invalid(
                "generation.length_penalty must be finite".to_string(),
            ));
        }
        if self.model.max_input_tokens == 0 {
            return Err(ConfigError::Invalid(
                "model.max_input_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn find_config_file() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        dirs::config_dir()
            .map(|dir| dir.join("precis").join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.generation.max_length, 200);
        assert_eq!(config.generation.min_length, 30);
        assert_eq!(config.generation.num_beams, 8);
        assert_eq!(config.generation.no_repeat_ngram_size, 3);
        assert_eq!(config.generation.length_penalty, 2.0);
        assert_eq!(config.model.max_input_tokens, 512);
        assert_eq!(config.model.task_prefix, "summarize: ");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            bind_addr = "0.0.0.0:9000"

            [generation]
            num_beams = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.server.bind_addr.port(), 9000);
        assert!(config.server.cors);
        assert_eq!(config.generation.num_beams, 4);
        assert_eq!(config.generation.max_length, 200);
    }

    #[test]
    fn rejects_out_of_range_defaults() {
        let err = Config::from_toml("[generation]\nnum_beams = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = Config::from_toml("[generation]\nmax_length = 5000\n").unwrap_err();
        assert!(err.to_string().contains("max_length"));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = Config::from_toml("[server\nbind_addr = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[model]\ncheckpoint_dir = \"/opt/models/t5\"").unwrap();
        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.model.checkpoint_dir, PathBuf::from("/opt/models/t5"));
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn renders_back_to_toml() {
        let rendered = Config::default().to_toml().unwrap();
        let reparsed = Config::from_toml(&rendered).unwrap();
        assert_eq!(reparsed, Config::default());
    }
}
