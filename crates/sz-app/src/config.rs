//! Application configuration (YAML).

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sz_core::Projection;
use sz_sheet::{MergePolicy, SheetLayout, DEFAULT_BUFFER_ROWS};

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "STAMPZ_DATA_DIR";

pub const DEFAULT_DATA_DIR: &str = "data/color_analysis";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Row index where the centroid band starts instead of directly below the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_centroid_start_row: Option<usize>,
    #[serde(default = "default_buffer_rows")]
    pub buffer_rows: usize,
    /// Project color-analysis data through RGB instead of L*a*b*.
    #[serde(default)]
    pub prefer_rgb: bool,
    /// Merge policy for external imports.
    #[serde(default = "default_import_policy")]
    pub default_merge_policy: MergePolicy,
}

fn default_buffer_rows() -> usize {
    DEFAULT_BUFFER_ROWS
}

fn default_import_policy() -> MergePolicy {
    MergePolicy::PreserveExisting
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            custom_centroid_start_row: None,
            buffer_rows: default_buffer_rows(),
            prefer_rgb: false,
            default_merge_policy: default_import_policy(),
        }
    }
}

impl SyncConfig {
    pub fn projection(&self) -> Projection {
        if self.prefer_rgb {
            Projection::Rgb
        } else {
            Projection::Lab
        }
    }

    /// Standard layout, with the band moved when a custom start is set.
    pub fn layout(&self) -> SheetLayout {
        let standard = SheetLayout::standard();
        match self.custom_centroid_start_row {
            Some(start) => standard.with_centroid_start(start).unwrap_or_else(|| {
                tracing::warn!(start, "custom centroid start must follow the header; using standard layout");
                standard
            }),
            None => standard,
        }
    }
}

/// Load configuration from a YAML file.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AppError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| AppError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Save configuration to a YAML file.
pub fn save_config(path: &Path, config: &AppConfig) -> AppResult<()> {
    let content = serde_yaml::to_string(config).map_err(|e| AppError::Config {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(|e| AppError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

impl AppConfig {
    /// CLI flag, then `STAMPZ_DATA_DIR`, then the config file, then the default.
    pub fn resolve_data_dir(&self, cli: Option<&Path>) -> PathBuf {
        let env = std::env::var_os(DATA_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        self.resolve_data_dir_with(cli, env)
    }

    pub fn resolve_data_dir_with(&self, cli: Option<&Path>, env: Option<PathBuf>) -> PathBuf {
        cli.map(Path::to_path_buf)
            .or(env)
            .or_else(|| self.data_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }
}
