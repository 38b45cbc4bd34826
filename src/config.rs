//! Configuration file handling

use crate::external::backend::DisplayDescriptor;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("surface.step must be between 1 and 100, not {0}")]
    InvalidStep(u16),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// flexi_logger log specification, e.g. `info` or `debug, regex = warn`
    pub log_level: String,
    pub backend: BackendConfig,
    pub surface: SurfaceConfig,
}

/// Which [crate::external::backend::DisplayBackend] to use
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawBackendConfig")]
pub enum BackendConfig {
    Ddcutil {
        executable: String,
        /// Passed to every ddcutil invocation
        extra_args: Vec<String>,
    },
    Mock {
        displays: Vec<DisplayDescriptor>,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BackendKind {
    #[default]
    Ddcutil,
    Mock,
}

/// The `[backend]` table as written, every key optional.
#[derive(Deserialize)]
struct RawBackendConfig {
    #[serde(default)]
    kind: BackendKind,
    #[serde(default = "default_executable")]
    executable: String,
    #[serde(default)]
    extra_args: Vec<String>,
    #[serde(default)]
    displays: Vec<DisplayDescriptor>,
}

impl From<RawBackendConfig> for BackendConfig {
    fn from(raw: RawBackendConfig) -> Self {
        match raw.kind {
            BackendKind::Ddcutil => BackendConfig::Ddcutil {
                executable: raw.executable,
                extra_args: raw.extra_args,
            },
            BackendKind::Mock => BackendConfig::Mock {
                displays: raw.displays,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Granularity of the brightness control
    pub step: u16,
}

fn default_executable() -> String {
    "ddcutil".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: "info".to_owned(),
            backend: BackendConfig::default(),
            surface: SurfaceConfig::default(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Ddcutil {
            executable: default_executable(),
            extra_args: Vec::new(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        SurfaceConfig { step: 5 }
    }
}

impl BackendConfig {
    /// A mock backend with a couple of made-up displays, for trying things
    /// out without DDC-capable monitors.
    pub fn demo_mock() -> BackendConfig {
        BackendConfig::Mock {
            displays: vec![
                DisplayDescriptor::new("demo-1", "Demo Monitor", 50),
                DisplayDescriptor::new("demo-2", "Demo Projector", 80),
            ],
        }
    }
}

impl Config {
    /// Read and validate the configuration file at `path`.
    pub async fn load(path: &Path) -> Result<Config, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_owned(),
                source,
            })?;
        Config::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config, ConfigError> {
        let value: toml::Value = contents.parse()?;
        Config::from_toml(value)
    }

    pub fn from_toml(value: toml::Value) -> Result<Config, ConfigError> {
        let config: Config = value.try_into()?;
        if !(1..=100).contains(&config.surface.step) {
            return Err(ConfigError::InvalidStep(config.surface.step));
        }
        Ok(config)
    }
}
