//! Merge cached per-class tensors into labeled train/validation splits.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array3, Axis, s};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::config::IMAGE_SIZE;
use crate::pipeline::cache;
use crate::pipeline::error::PipelineError;

/// A dataset tensor with its parallel label vector.
///
/// Invariant: `labels[i]` names the class that contributed `dataset[i]`.
#[derive(Debug, Clone)]
pub struct SplitPair {
    pub dataset: Array3<f32>,
    pub labels: Array1<i32>,
}

impl SplitPair {
    /// Number of rows in the split.
    pub fn len(&self) -> usize {
        self.dataset.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Draw `valid_size` then `train_size` rows from every class tensor, in
/// enumeration order, stamping each row with the integer class label.
///
/// Each class tensor is shuffled individually before slicing so the drawn
/// rows are a random sample; the outputs stay laid out class-by-class and
/// global interleaving is left to [`super::shuffle::shuffle_pair`]. A class
/// with fewer than `valid_size + train_size` rows is an explicit error, and
/// any per-class failure aborts the whole merge.
pub fn merge_datasets(
    cache_paths: &[PathBuf],
    train_size: usize,
    valid_size: usize,
    rng: &mut StdRng,
) -> Result<(SplitPair, SplitPair), PipelineError> {
    let mut valid = SplitBuilder::with_capacity(cache_paths.len() * valid_size);
    let mut train = SplitBuilder::with_capacity(cache_paths.len() * train_size);
    for (label, path) in cache_paths.iter().enumerate() {
        merge_class(path, label, train_size, valid_size, rng, &mut valid, &mut train)
            .map_err(|source| PipelineError::Merge {
                label,
                path: path.clone(),
                source: Box::new(source),
            })?;
    }
    Ok((valid.finish(), train.finish()))
}

fn merge_class(
    path: &Path,
    label: usize,
    train_size: usize,
    valid_size: usize,
    rng: &mut StdRng,
    valid: &mut SplitBuilder,
    train: &mut SplitBuilder,
) -> Result<(), PipelineError> {
    let tensor = cache::read_tensor(path).map_err(|err| PipelineError::Cache {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let rows = tensor.dim().0;
    let required = valid_size + train_size;
    if rows < required {
        return Err(PipelineError::InsufficientData {
            path: path.to_path_buf(),
            available: rows,
            required,
        });
    }
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(rng);
    let shuffled = tensor.select(Axis(0), &order);
    valid.push_rows(&shuffled, 0, valid_size, label as i32);
    train.push_rows(&shuffled, valid_size, train_size, label as i32);
    Ok(())
}

/// Growable split buffer; rows are appended class by class.
struct SplitBuilder {
    data: Vec<f32>,
    labels: Vec<i32>,
}

impl SplitBuilder {
    fn with_capacity(rows: usize) -> Self {
        Self {
            data: Vec::with_capacity(rows * IMAGE_SIZE * IMAGE_SIZE),
            labels: Vec::with_capacity(rows),
        }
    }

    fn push_rows(&mut self, tensor: &Array3<f32>, start: usize, count: usize, label: i32) {
        let slice = tensor.slice(s![start..start + count, .., ..]);
        self.data.extend(slice.iter());
        self.labels.extend(std::iter::repeat(label).take(count));
    }

    fn finish(self) -> SplitPair {
        let rows = self.labels.len();
        SplitPair {
            dataset: Array3::from_shape_vec((rows, IMAGE_SIZE, IMAGE_SIZE), self.data)
                .expect("builder rows are whole images"),
            labels: Array1::from_vec(self.labels),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cache::{cache_path, write_tensor};
    use rand::SeedableRng;
    use tempfile::tempdir;

    /// Write one cache per class where every pixel of class `i` equals `i`.
    fn write_class_caches(dir: &Path, classes: usize, rows_per_class: usize) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for class in 0..classes {
            let folder = dir.join(format!("{class}"));
            let path = cache_path(&folder);
            let tensor = Array3::from_elem((rows_per_class, 28, 28), class as f32);
            write_tensor(&path, &tensor).unwrap();
            paths.push(path);
        }
        paths
    }

    #[test]
    fn labels_form_contiguous_class_blocks() {
        let dir = tempdir().unwrap();
        let paths = write_class_caches(dir.path(), 3, 10);
        let mut rng = StdRng::seed_from_u64(1);
        let (valid, train) = merge_datasets(&paths, 4, 2, &mut rng).unwrap();

        assert_eq!(train.dataset.dim(), (12, 28, 28));
        assert_eq!(valid.dataset.dim(), (6, 28, 28));
        let train_labels: Vec<i32> = train.labels.to_vec();
        assert_eq!(train_labels, vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2]);
        let valid_labels: Vec<i32> = valid.labels.to_vec();
        assert_eq!(valid_labels, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn every_row_comes_from_its_labeled_class() {
        let dir = tempdir().unwrap();
        let paths = write_class_caches(dir.path(), 4, 8);
        let mut rng = StdRng::seed_from_u64(7);
        let (valid, train) = merge_datasets(&paths, 5, 3, &mut rng).unwrap();
        for pair in [&valid, &train] {
            for (row, &label) in pair.dataset.outer_iter().zip(pair.labels.iter()) {
                assert!(row.iter().all(|&value| value == label as f32));
            }
        }
    }

    #[test]
    fn zero_valid_size_yields_empty_validation_split() {
        let dir = tempdir().unwrap();
        let paths = write_class_caches(dir.path(), 2, 5);
        let mut rng = StdRng::seed_from_u64(3);
        let (valid, train) = merge_datasets(&paths, 5, 0, &mut rng).unwrap();
        assert!(valid.is_empty());
        assert_eq!(train.len(), 10);
    }

    #[test]
    fn short_class_tensor_is_an_explicit_error() {
        let dir = tempdir().unwrap();
        let paths = write_class_caches(dir.path(), 2, 5);
        let mut rng = StdRng::seed_from_u64(3);
        let err = merge_datasets(&paths, 5, 1, &mut rng).unwrap_err();
        let PipelineError::Merge { label, source, .. } = err else {
            panic!("expected merge error");
        };
        assert_eq!(label, 0);
        assert!(matches!(
            *source,
            PipelineError::InsufficientData {
                available: 5,
                required: 6,
                ..
            }
        ));
    }

    #[test]
    fn missing_cache_aborts_the_merge() {
        let dir = tempdir().unwrap();
        let mut paths = write_class_caches(dir.path(), 2, 5);
        paths.push(dir.path().join("missing.tensor"));
        let mut rng = StdRng::seed_from_u64(3);
        let err = merge_datasets(&paths, 2, 1, &mut rng).unwrap_err();
        assert!(matches!(err, PipelineError::Merge { label: 2, .. }));
    }
}
