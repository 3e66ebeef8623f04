//! Viewer settings read from `GLOBE_*` environment variables.

use std::path::PathBuf;

use thiserror::Error;

use crate::projection::{MapQuality, Projection};

pub const DEFAULT_TILE_SIZE: u32 = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}: unknown projection `{value}`")]
    Projection { var: &'static str, value: String },

    #[error("{var}: unknown quality `{value}`")]
    Quality { var: &'static str, value: String },

    #[error("{var}: expected a positive integer, got `{value}`")]
    Threads { var: &'static str, value: String },

    #[error("{var}: expected a power of two between 16 and 1024, got `{value}`")]
    TileSize { var: &'static str, value: String },

    #[error("{var}: expected 0, 1, true or false, got `{value}`")]
    Flag { var: &'static str, value: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub data_dir: PathBuf,
    pub projection: Projection,
    pub quality: MapQuality,
    pub threads: usize,
    pub tile_size: u32,
    pub show_relief: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            projection: Projection::Equirectangular,
            quality: MapQuality::Normal,
            threads: default_threads(),
            tile_size: DEFAULT_TILE_SIZE,
            show_relief: true,
            log_file: None,
        }
    }
}

fn default_threads() -> usize {
    std::thread::available_parallelism().map_or(1, |n| n.get())
}

impl ViewerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the config from any variable lookup; unset or empty variables
    /// keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("GLOBE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(value) = get("GLOBE_PROJECTION") {
            config.projection = Projection::from_name(&value).ok_or(ConfigError::Projection {
                var: "GLOBE_PROJECTION",
                value,
            })?;
        }

        if let Some(value) = get("GLOBE_QUALITY") {
            config.quality = MapQuality::from_name(&value).ok_or(ConfigError::Quality {
                var: "GLOBE_QUALITY",
                value,
            })?;
        }

        if let Some(value) = get("GLOBE_THREADS") {
            config.threads = match value.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Threads {
                        var: "GLOBE_THREADS",
                        value,
                    })
                }
            };
        }

        if let Some(value) = get("GLOBE_TILE_SIZE") {
            config.tile_size = match value.trim().parse::<u32>() {
                Ok(n) if n.is_power_of_two() && (16..=1024).contains(&n) => n,
                _ => {
                    return Err(ConfigError::TileSize {
                        var: "GLOBE_TILE_SIZE",
                        value,
                    })
                }
            };
        }

        if let Some(value) = get("GLOBE_RELIEF") {
            config.show_relief = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => {
                    return Err(ConfigError::Flag {
                        var: "GLOBE_RELIEF",
                        value,
                    })
                }
            };
        }

        config.log_file = get("GLOBE_LOG").map(PathBuf::from);

        Ok(config)
    }
}
