//! Per-class image normalization with corrupt-file skipping.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use thiserror::Error;

use crate::config::{IMAGE_SIZE, PIXEL_DEPTH};
use crate::pipeline::error::PipelineError;

/// Why a single image file was skipped.
///
/// These are the only recoverable failures in the pipeline: each is logged
/// and the file is passed over without aborting the class.
#[derive(Debug, Error)]
pub enum DecodeFailure {
    #[error("open failed: {0}")]
    Open(std::io::Error),
    #[error("decode failed: {0}")]
    Decode(image::ImageError),
    #[error("unexpected image shape: {width}x{height}")]
    Shape { width: u32, height: u32 },
}

/// Decode one file as a normalized grayscale row.
fn decode_image(path: &Path) -> Result<Vec<f32>, DecodeFailure> {
    let reader = image::ImageReader::open(path).map_err(DecodeFailure::Open)?;
    let decoded = reader.decode().map_err(DecodeFailure::Decode)?;
    let gray = decoded.to_luma8();
    let (width, height) = gray.dimensions();
    if width as usize != IMAGE_SIZE || height as usize != IMAGE_SIZE {
        return Err(DecodeFailure::Shape { width, height });
    }
    Ok(gray
        .pixels()
        .map(|pixel| (f32::from(pixel.0[0]) - PIXEL_DEPTH / 2.0) / PIXEL_DEPTH)
        .collect())
}

/// Load every readable image in `folder` into an `(n, 28, 28)` tensor.
///
/// Files are visited in sorted order. Rows are appended only on a successful
/// decode, so skipped files can never leave a hole in the tensor. Fewer than
/// `min_images` successes is fatal.
pub fn load_class_folder(
    folder: &Path,
    min_images: usize,
) -> Result<Array3<f32>, PipelineError> {
    let mut files: Vec<PathBuf> = fs::read_dir(folder)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut rows: Vec<f32> = Vec::new();
    let mut loaded = 0usize;
    for file in &files {
        match decode_image(file) {
            Ok(pixels) => {
                rows.extend_from_slice(&pixels);
                loaded += 1;
            }
            Err(failure) => {
                tracing::warn!("Could not read {}: {failure}; skipping", file.display());
            }
        }
    }
    if loaded < min_images {
        return Err(PipelineError::InsufficientData {
            path: folder.to_path_buf(),
            available: loaded,
            required: min_images,
        });
    }
    let tensor = Array3::from_shape_vec((loaded, IMAGE_SIZE, IMAGE_SIZE), rows)
        .expect("row buffer grows by one whole image per success");
    let mean = tensor.mean().unwrap_or(0.0);
    let stddev = tensor.std(0.0);
    tracing::info!(
        "{}: tensor {:?}, mean {mean:.4}, stddev {stddev:.4}",
        folder.display(),
        tensor.dim()
    );
    Ok(tensor)
}
