//! Class-balance diagnostic over cached tensors.

use std::path::PathBuf;

use crate::pipeline::cache::{self, CacheError};

/// Tolerated spread as a fraction of the mean class size.
const BALANCE_TOLERANCE: f64 = 0.1;

/// Per-class sample counts and the balance verdict.
#[derive(Debug, Clone)]
pub struct BalanceReport {
    /// Row counts per class, in cache-path order.
    pub counts: Vec<usize>,
    /// True when `max - min <= 0.1 * mean`.
    pub balanced: bool,
}

/// Load each cached tensor and check that class sizes stay within tolerance.
///
/// Purely diagnostic; the verdict gates nothing downstream.
pub fn check_balance(cache_paths: &[PathBuf]) -> Result<BalanceReport, CacheError> {
    let mut counts = Vec::with_capacity(cache_paths.len());
    for path in cache_paths {
        let tensor = cache::read_tensor(path)?;
        counts.push(tensor.dim().0);
    }
    let report = BalanceReport {
        balanced: counts_balanced(&counts),
        counts,
    };
    if report.balanced {
        tracing::info!("class sizes {:?}: balanced", report.counts);
    } else {
        tracing::warn!("class sizes {:?}: not balanced", report.counts);
    }
    Ok(report)
}

fn counts_balanced(counts: &[usize]) -> bool {
    let (Some(&max), Some(&min)) = (counts.iter().max(), counts.iter().min()) else {
        return true;
    };
    let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
    (max - min) as f64 <= mean * BALANCE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cache::{cache_path, write_tensor};
    use ndarray::Array3;
    use tempfile::tempdir;

    #[test]
    fn equal_counts_are_balanced() {
        assert!(counts_balanced(&[100, 100, 100]));
    }

    #[test]
    fn spread_just_inside_tolerance_is_balanced() {
        // mean = 97, 0.1 * mean = 9.7, spread = 9
        assert!(counts_balanced(&[100, 100, 91]));
    }

    #[test]
    fn spread_just_outside_tolerance_is_not_balanced() {
        // mean ~= 96.7, 0.1 * mean ~= 9.67, spread = 10
        assert!(!counts_balanced(&[100, 100, 90]));
        assert!(!counts_balanced(&[100, 100, 89]));
    }

    #[test]
    fn empty_count_list_is_trivially_balanced() {
        assert!(counts_balanced(&[]));
    }

    #[test]
    fn report_reads_counts_from_cached_tensors() {
        let dir = tempdir().unwrap();
        let mut paths = Vec::new();
        for (name, rows) in [("A", 4usize), ("B", 4), ("C", 4)] {
            let folder = dir.path().join(name);
            let path = cache_path(&folder);
            write_tensor(&path, &Array3::<f32>::zeros((rows, 28, 28))).unwrap();
            paths.push(path);
        }
        let report = check_balance(&paths).unwrap();
        assert_eq!(report.counts, vec![4, 4, 4]);
        assert!(report.balanced);
    }
}
