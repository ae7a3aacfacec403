//! Export and reload the final six-tensor dataset bundle.
//!
//! Layout mirrors the per-class cache: a `manifest.json` describing shapes
//! plus one raw blob per tensor, `f32le` for datasets and `i32le` for labels.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::IMAGE_SIZE;
use crate::pipeline::merge::SplitPair;

const FORMAT_VERSION: i64 = 1;
const MANIFEST_FILE: &str = "manifest.json";

/// Errors reading or writing a bundle directory.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported bundle format version {0}")]
    BadVersion(i64),
    #[error("{file}: blob length does not match the manifest shape")]
    LengthMismatch { file: String },
}

/// Parsed contents of a bundle `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: i64,
    /// Image side length for every dataset tensor.
    pub image_size: usize,
    /// One entry per split, in train/valid/test order.
    pub splits: Vec<SplitEntry>,
}

/// Shape and file names for one exported split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitEntry {
    pub name: String,
    pub rows: usize,
    /// Dataset blob file name (`f32le`).
    pub dataset: String,
    /// Label blob file name (`i32le`).
    pub labels: String,
}

/// The three reloaded splits.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub train: SplitPair,
    pub valid: SplitPair,
    pub test: SplitPair,
}

/// Write all six tensors plus the manifest into `dir`.
pub fn export_bundle(
    dir: &Path,
    train: &SplitPair,
    valid: &SplitPair,
    test: &SplitPair,
) -> Result<(), BundleError> {
    fs::create_dir_all(dir)?;
    let mut splits = Vec::new();
    for (name, pair) in [("train", train), ("valid", valid), ("test", test)] {
        let dataset_file = format!("{name}_dataset.f32le");
        let labels_file = format!("{name}_labels.i32le");
        write_f32(&dir.join(&dataset_file), pair.dataset.iter().copied())?;
        write_i32(&dir.join(&labels_file), pair.labels.iter().copied())?;
        splits.push(SplitEntry {
            name: name.to_string(),
            rows: pair.len(),
            dataset: dataset_file,
            labels: labels_file,
        });
    }
    let manifest = BundleManifest {
        format_version: FORMAT_VERSION,
        image_size: IMAGE_SIZE,
        splits,
    };
    let mut writer = BufWriter::new(File::create(dir.join(MANIFEST_FILE))?);
    serde_json::to_writer_pretty(&mut writer, &manifest)?;
    writer.flush()?;
    tracing::info!("Bundle written to {}", dir.display());
    Ok(())
}

/// Reload a bundle directory written by [`export_bundle`].
pub fn load_bundle(dir: &Path) -> Result<Bundle, BundleError> {
    let mut manifest_bytes = Vec::new();
    File::open(dir.join(MANIFEST_FILE))?.read_to_end(&mut manifest_bytes)?;
    let manifest: BundleManifest = serde_json::from_slice(&manifest_bytes)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(BundleError::BadVersion(manifest.format_version));
    }

    let mut train = None;
    let mut valid = None;
    let mut test = None;
    for entry in &manifest.splits {
        let pair = load_split(dir, entry, manifest.image_size)?;
        match entry.name.as_str() {
            "train" => train = Some(pair),
            "valid" => valid = Some(pair),
            "test" => test = Some(pair),
            other => {
                tracing::warn!("ignoring unknown split {other:?} in bundle manifest");
            }
        }
    }
    let missing = || BundleError::LengthMismatch {
        file: MANIFEST_FILE.to_string(),
    };
    Ok(Bundle {
        train: train.ok_or_else(missing)?,
        valid: valid.ok_or_else(missing)?,
        test: test.ok_or_else(missing)?,
    })
}

fn load_split(dir: &Path, entry: &SplitEntry, image_size: usize) -> Result<SplitPair, BundleError> {
    let values = read_f32(&dir.join(&entry.dataset))?;
    if values.len() != entry.rows * image_size * image_size {
        return Err(BundleError::LengthMismatch {
            file: entry.dataset.clone(),
        });
    }
    let labels = read_i32(&dir.join(&entry.labels))?;
    if labels.len() != entry.rows {
        return Err(BundleError::LengthMismatch {
            file: entry.labels.clone(),
        });
    }
    let dataset = Array3::from_shape_vec((entry.rows, image_size, image_size), values)
        .map_err(|_| BundleError::LengthMismatch {
            file: entry.dataset.clone(),
        })?;
    Ok(SplitPair {
        dataset,
        labels: Array1::from_vec(labels),
    })
}

fn write_f32(path: &Path, values: impl Iterator<Item = f32>) -> Result<(), BundleError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_i32(path: &Path, values: impl Iterator<Item = i32>) -> Result<(), BundleError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for value in values {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn read_f32(path: &Path) -> Result<Vec<f32>, BundleError> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(BundleError::LengthMismatch {
            file: path.display().to_string(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunk size verified")))
        .collect())
}

fn read_i32(path: &Path) -> Result<Vec<i32>, BundleError> {
    let bytes = fs::read(path)?;
    if bytes.len() % 4 != 0 {
        return Err(BundleError::LengthMismatch {
            file: path.display().to_string(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| i32::from_le_bytes(chunk.try_into().expect("chunk size verified")))
        .collect())
}
