//! Dataset preparation stages, in dependency order.
//!
//! Data flows strictly downward: archive -> class folders -> per-class
//! caches -> merged splits -> shuffled splits. Each stage owns its output;
//! the on-disk cache is the only shared state between runs.

pub mod balance;
pub mod bundle;
pub mod cache;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod merge;
pub mod normalize;
pub mod shuffle;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{NUM_CLASSES, PipelineConfig};
use error::PipelineError;
use merge::SplitPair;

/// Fully prepared, shuffled splits.
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub train: SplitPair,
    pub valid: SplitPair,
    pub test: SplitPair,
}

/// Per-run force flags for the cached stages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForceFlags {
    /// Re-download archives even when a verified copy exists.
    pub download: bool,
    /// Re-extract archives even when the target root exists.
    pub extract: bool,
    /// Rebuild per-class tensors even when cached.
    pub normalize: bool,
}

/// Run the full preparation pipeline described by `config`.
pub fn prepare(
    config: &PipelineConfig,
    force: ForceFlags,
) -> Result<PreparedDataset, PipelineError> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut progress = fetch::ProgressPrinter::stdout();
    let train_archive = fetch::maybe_download(
        &config.data_root,
        &config.base_url,
        &config.train_archive,
        force.download,
        &mut progress,
    )?;
    let mut progress = fetch::ProgressPrinter::stdout();
    let test_archive = fetch::maybe_download(
        &config.data_root,
        &config.base_url,
        &config.test_archive,
        force.download,
        &mut progress,
    )?;

    let train_folders =
        extract::maybe_extract(&train_archive, &config.data_root, NUM_CLASSES, force.extract)?;
    let test_folders =
        extract::maybe_extract(&test_archive, &config.data_root, NUM_CLASSES, force.extract)?;

    let train_caches = cache::maybe_cache_classes(
        &train_folders,
        config.train_archive.min_images_per_class,
        force.normalize,
    )?;
    let test_caches = cache::maybe_cache_classes(
        &test_folders,
        config.test_archive.min_images_per_class,
        force.normalize,
    )?;

    // Diagnostic only; an unreadable cache will fail the merge below anyway.
    for caches in [&train_caches, &test_caches] {
        if let Err(err) = balance::check_balance(caches) {
            tracing::warn!("balance check failed: {err}");
        }
    }

    let (valid, train) =
        merge::merge_datasets(&train_caches, config.train_size, config.valid_size, &mut rng)?;
    let (_, test) = merge::merge_datasets(&test_caches, config.test_size, 0, &mut rng)?;

    tracing::info!(
        "Training {:?}, validation {:?}, testing {:?}",
        train.dataset.dim(),
        valid.dataset.dim(),
        test.dataset.dim()
    );

    Ok(PreparedDataset {
        train: shuffle::shuffle_pair(&train, &mut rng),
        valid: shuffle::shuffle_pair(&valid, &mut rng),
        test: shuffle::shuffle_pair(&test, &mut rng),
    })
}
