//! On-disk cache for per-class tensors.
//!
//! One `.tensor` file per class folder: a fixed header (magic, format
//! version, shape) followed by rows of little-endian `f32` values. The
//! encoding round-trips losslessly.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use ndarray::Array3;
use thiserror::Error;

use crate::pipeline::error::PipelineError;
use crate::pipeline::normalize;

const MAGIC: &[u8; 4] = b"GTSR";
const FORMAT_VERSION: u32 = 1;

/// File suffix for cached class tensors.
pub const CACHE_SUFFIX: &str = "tensor";

/// Errors reading or writing a cached tensor.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a tensor cache file")]
    BadMagic,
    #[error("unsupported cache version {0}")]
    BadVersion(u32),
    #[error("cache payload length does not match its header")]
    LengthMismatch,
}

/// Cache file path for a class folder (`<folder>.tensor`, next to the folder).
pub fn cache_path(folder: &Path) -> PathBuf {
    let mut name = folder
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(CACHE_SUFFIX);
    folder.with_file_name(name)
}

/// Serialize a tensor to `path`.
pub fn write_tensor(path: &Path, tensor: &Array3<f32>) -> Result<(), CacheError> {
    let (rows, height, width) = tensor.dim();
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(MAGIC)?;
    writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
    writer.write_all(&(rows as u32).to_le_bytes())?;
    writer.write_all(&(height as u32).to_le_bytes())?;
    writer.write_all(&(width as u32).to_le_bytes())?;
    for value in tensor.iter() {
        writer.write_all(&value.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

/// Deserialize a tensor from `path`.
pub fn read_tensor(path: &Path) -> Result<Array3<f32>, CacheError> {
    let mut file = File::open(path)?;
    let mut header = [0u8; 20];
    file.read_exact(&mut header).map_err(|_| CacheError::LengthMismatch)?;
    if &header[0..4] != MAGIC {
        return Err(CacheError::BadMagic);
    }
    let version = u32::from_le_bytes(header[4..8].try_into().expect("fixed header"));
    if version != FORMAT_VERSION {
        return Err(CacheError::BadVersion(version));
    }
    let rows = u32::from_le_bytes(header[8..12].try_into().expect("fixed header")) as usize;
    let height = u32::from_le_bytes(header[12..16].try_into().expect("fixed header")) as usize;
    let width = u32::from_le_bytes(header[16..20].try_into().expect("fixed header")) as usize;

    let mut payload = Vec::new();
    file.read_to_end(&mut payload)?;
    if payload.len() != rows * height * width * size_of::<f32>() {
        return Err(CacheError::LengthMismatch);
    }
    let values: Vec<f32> = payload
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().expect("chunk size verified")))
        .collect();
    Array3::from_shape_vec((rows, height, width), values)
        .map_err(|_| CacheError::LengthMismatch)
}

/// Ensure every class folder has a cached tensor, returning cache paths in
/// class-enumeration order.
///
/// A cache hit (unless forced) skips normalization entirely. A cache write
/// failure is logged and the run continues; the next run recomputes.
pub fn maybe_cache_classes(
    folders: &[PathBuf],
    min_images: usize,
    force: bool,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut cache_paths = Vec::with_capacity(folders.len());
    for folder in folders {
        let path = cache_path(folder);
        if path.is_file() && !force {
            tracing::info!("{} already cached, skipping", path.display());
        } else {
            let tensor = normalize::load_class_folder(folder, min_images)?;
            if let Err(err) = write_tensor(&path, &tensor) {
                tracing::warn!("Unable to cache {}: {err}", path.display());
            }
        }
        cache_paths.push(path);
    }
    Ok(cache_paths)
}
