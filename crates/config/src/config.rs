use std::{fs, io, path::Path};

use heimdall_primitives::params::{ChainParams, CheckpointParams};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{relayer::RelayerConfig, sidetx::SideTxConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config: {0}")]
    Io(#[from] io::Error),

    #[error("parsing config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directives, e.g. `info,heimdall_sidetx=debug`.
    pub filter: Option<String>,

    /// OTLP collector endpoint.  Stdout only if unset.
    pub otlp_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainParams,

    #[serde(default)]
    pub checkpoint: CheckpointParams,

    #[serde(default)]
    pub relayer: RelayerConfig,

    #[serde(default)]
    pub sidetx: SideTxConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.chain.chain_id.is_empty() {
            return Err(ConfigError::Invalid("chain.chain_id is empty"));
        }

        if self.chain.bor_chain_id.is_empty() {
            return Err(ConfigError::Invalid("chain.bor_chain_id is empty"));
        }

        if self.relayer.queue_capacity == 0 {
            return Err(ConfigError::Invalid("relayer.queue_capacity must be positive"));
        }

        if self.relayer.max_task_attempts == 0 {
            return Err(ConfigError::Invalid("relayer.max_task_attempts must be positive"));
        }

        if self.sidetx.chain_reader_timeout_ms == 0 {
            return Err(ConfigError::Invalid("sidetx.chain_reader_timeout_ms must be positive"));
        }

        Ok(())
    }
}
