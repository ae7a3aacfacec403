//! Pipeline configuration with notMNIST defaults.
//!
//! Every field has a default so a partial TOML file (or none at all) yields a
//! runnable configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of class folders every archive must extract to.
pub const NUM_CLASSES: usize = 10;
/// Side length of every glyph image, in pixels.
pub const IMAGE_SIZE: usize = 28;
/// Raw pixel depth used for normalization: `(value - depth/2) / depth`.
pub const PIXEL_DEPTH: f32 = 255.0;

/// Errors returned when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// One remote archive with its verification size and normalizer threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSpec {
    /// Archive filename, appended to the base URL to form the fetch URL.
    pub filename: String,
    /// Exact byte size the downloaded file must have.
    pub expected_bytes: u64,
    /// Minimum readable images each class folder must yield.
    pub min_images_per_class: usize,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local root directory for archives, extracted folders, and caches.
    pub data_root: PathBuf,
    /// Remote base URL that archive filenames are appended to.
    pub base_url: String,
    /// Large archive used for the train and validation splits.
    pub train_archive: ArchiveSpec,
    /// Small archive used for the test split.
    pub test_archive: ArchiveSpec,
    /// Per-class row count for the train split.
    pub train_size: usize,
    /// Per-class row count for the validation split.
    pub valid_size: usize,
    /// Per-class row count for the test split.
    pub test_size: usize,
    /// Seed for every random draw in the pipeline.
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("notMNIST"),
            base_url: "https://commondatastorage.googleapis.com/books1000/".to_string(),
            train_archive: ArchiveSpec {
                filename: "notMNIST_large.tar.gz".to_string(),
                expected_bytes: 247_336_696,
                min_images_per_class: 45_000,
            },
            test_archive: ArchiveSpec {
                filename: "notMNIST_small.tar.gz".to_string(),
                expected_bytes: 8_458_043,
                min_images_per_class: 1_800,
            },
            train_size: 100,
            valid_size: 10,
            test_size: 10,
            seed: 133,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file, defaulting missing fields.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_describe_both_archives() {
        let config = PipelineConfig::default();
        assert_eq!(config.train_archive.expected_bytes, 247_336_696);
        assert_eq!(config.test_archive.expected_bytes, 8_458_043);
        assert_eq!(config.seed, 133);
        assert!(config.base_url.ends_with('/'));
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("glyphset.toml");
        std::fs::write(&path, "train_size = 5000\nseed = 7\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.train_size, 5000);
        assert_eq!(config.seed, 7);
        assert_eq!(config.valid_size, PipelineConfig::default().valid_size);
        assert_eq!(
            config.train_archive.filename,
            "notMNIST_large.tar.gz"
        );
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "train_size = \"many\"\n").unwrap();
        let err = PipelineConfig::load(&path).unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }
}
