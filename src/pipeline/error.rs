//! Error taxonomy for the preparation pipeline.
//!
//! Everything here is fatal and propagates to the caller. The only locally
//! absorbed failures are per-file decode errors (see `normalize`) and cache
//! write errors (see `cache`), which are logged instead.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal pipeline failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Downloaded archive size mismatch. Never retried.
    #[error("Failed to verify {path}: expected {expected} bytes, found {actual}")]
    Verification {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
    /// Transport failure while fetching an archive.
    #[error("Fetching {url}: {message}")]
    Http { url: String, message: String },
    /// Malformed or oversized archive contents.
    #[error("Reading archive {path}: {message}")]
    Archive { path: PathBuf, message: String },
    /// Extracted class-folder count does not match the expected class count.
    #[error("Expected {expected} class folders under {root}, found {found}")]
    Structure {
        root: PathBuf,
        expected: usize,
        found: usize,
    },
    /// Too few readable images for a class. Signals a systemic extraction
    /// problem rather than a per-file one.
    #[error("{path}: {available} images available, need at least {required}")]
    InsufficientData {
        path: PathBuf,
        available: usize,
        required: usize,
    },
    /// A cached class tensor could not be read back.
    #[error("Cache {path}: {message}")]
    Cache { path: PathBuf, message: String },
    /// Failure while assembling one class into the merged splits.
    #[error("Merging class {label} from {path}: {source}")]
    Merge {
        label: usize,
        path: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },
    /// Any other filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
