//! Runtime configuration for the filter command.
//!
//! Values resolve CLI flag > environment > built-in default, and each
//! resolved value records where it came from.

use pux_archive::{FilterOptions, DEFAULT_COPY_BUFFER_SIZE};
use serde::Serialize;
use thiserror::Error;

/// Environment variable overriding the attachment copy buffer size.
pub const BUFFER_SIZE_ENV: &str = "FILTER_1PUX_BUFFER_SIZE";

/// Errors from configuration resolution.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}: {reason}")]
    InvalidEnv {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,
}

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    Env,
    Cli,
}

/// Resolved filter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    pub copy_buffer_size: usize,
    pub copy_buffer_size_source: ValueSource,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            copy_buffer_size_source: ValueSource::Default,
        }
    }
}

impl FilterConfig {
    /// Resolve against the process environment.
    pub fn load(cli_buffer_size: Option<usize>) -> Result<Self, ConfigError> {
        Self::resolve(cli_buffer_size, std::env::var(BUFFER_SIZE_ENV).ok())
    }

    /// Resolve from an explicit CLI value and environment value.
    pub fn resolve(
        cli_buffer_size: Option<usize>,
        env_buffer_size: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = env_buffer_size {
            config.copy_buffer_size =
                raw.trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::InvalidEnv {
                        name: BUFFER_SIZE_ENV,
                        value: raw.clone(),
                        reason: e.to_string(),
                    })?;
            config.copy_buffer_size_source = ValueSource::Env;
        }

        if let Some(size) = cli_buffer_size {
            config.copy_buffer_size = size;
            config.copy_buffer_size_source = ValueSource::Cli;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.copy_buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(())
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions::default().with_copy_buffer_size(self.copy_buffer_size)
    }
}
