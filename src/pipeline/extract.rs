//! Archive extraction into per-class folders.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::pipeline::error::PipelineError;

const MAX_ARCHIVE_ENTRIES: usize = 1_500_000;
const MAX_TOTAL_UNCOMPRESSED_BYTES: u64 = 8 * 1024 * 1024 * 1024;

/// Extract `archive_path` under `data_root` and return the sorted class folders.
///
/// When the target root already exists and `force` is unset, extraction is
/// skipped and the existing subfolders are re-listed. The returned list is
/// lexicographically sorted; downstream label indices are assigned by its
/// enumeration order. A folder count other than `num_classes` is fatal.
pub fn maybe_extract(
    archive_path: &Path,
    data_root: &Path,
    num_classes: usize,
    force: bool,
) -> Result<Vec<PathBuf>, PipelineError> {
    let root = archive_root(data_root, archive_path);
    if root.is_dir() && !force {
        tracing::info!(
            "{} already present, skipping extraction of {}",
            root.display(),
            archive_path.display()
        );
    } else {
        tracing::info!(
            "Extracting {} to {}; this may take a while",
            archive_path.display(),
            root.display()
        );
        unpack_tar_gz(archive_path, data_root)?;
    }
    let folders = sorted_class_folders(&root)?;
    if folders.len() != num_classes {
        return Err(PipelineError::Structure {
            root,
            expected: num_classes,
            found: folders.len(),
        });
    }
    Ok(folders)
}

/// Extraction root: the archive filename minus its two-part `.tar.gz` extension.
pub fn archive_root(data_root: &Path, archive_path: &Path) -> PathBuf {
    let name = archive_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".tar.gz")
        .or_else(|| name.strip_suffix(".tgz"))
        .unwrap_or_else(|| name.split('.').next().unwrap_or(name));
    data_root.join(stem)
}

fn unpack_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), PipelineError> {
    let file = File::open(archive_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    let mut entry_count = 0usize;
    let mut total_bytes = 0u64;
    let entries = archive
        .entries()
        .map_err(|err| archive_error(archive_path, err.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| archive_error(archive_path, err.to_string()))?;
        entry_count += 1;
        if entry_count > MAX_ARCHIVE_ENTRIES {
            return Err(archive_error(
                archive_path,
                format!("more than {MAX_ARCHIVE_ENTRIES} entries"),
            ));
        }
        total_bytes = total_bytes.saturating_add(entry.size());
        if total_bytes > MAX_TOTAL_UNCOMPRESSED_BYTES {
            return Err(archive_error(
                archive_path,
                format!("uncompressed size exceeds {MAX_TOTAL_UNCOMPRESSED_BYTES} bytes"),
            ));
        }
        // unpack_in skips entries whose paths escape the destination,
        // signalling the skip through its return value.
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|err| archive_error(archive_path, err.to_string()))?;
        if !unpacked {
            tracing::warn!(
                "Skipping archive entry with an escaping path: {}",
                entry.path().unwrap_or_default().display()
            );
        }
    }
    Ok(())
}

fn archive_error(path: &Path, message: String) -> PipelineError {
    PipelineError::Archive {
        path: path.to_path_buf(),
        message,
    }
}

fn sorted_class_folders(root: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut folders = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}
