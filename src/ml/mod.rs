//! Linear classifiers and evaluation over prepared splits.

pub mod linear;
pub mod metrics;

use ndarray::{Array1, Array2, Array3, s};

use crate::pipeline::merge::SplitPair;
use linear::{FeatureSet, Penalty, TrainOptions};

/// Training-set sizes probed when tracing a learning curve.
pub const LEARNING_CURVE_SIZES: &[usize] = &[50, 100, 1000, 5000];

/// Reshape an `(n, h, w)` image tensor into `(n, h*w)` feature rows.
///
/// Row order is preserved, so label vectors carry over unchanged.
pub fn flatten_images(dataset: &Array3<f32>) -> Array2<f32> {
    let (rows, height, width) = dataset.dim();
    Array2::from_shape_vec((rows, height * width), dataset.iter().copied().collect())
        .expect("row-major iteration yields rows * height * width values")
}

/// Flatten a split into a trainable feature set.
pub fn feature_set(pair: &SplitPair) -> FeatureSet {
    FeatureSet {
        x: flatten_images(&pair.dataset),
        y: pair.labels.clone(),
    }
}

/// The three fixed benchmark heads, by display name.
pub fn benchmark_heads() -> Vec<(&'static str, TrainOptions)> {
    vec![
        (
            "L1 logistic",
            TrainOptions {
                penalty: Penalty::L1(1e-4),
                ..TrainOptions::default()
            },
        ),
        (
            "L2 logistic",
            TrainOptions {
                penalty: Penalty::L2(1e-4),
                ..TrainOptions::default()
            },
        ),
        (
            // The SGD core is natively multinomial, so this head shares the
            // L2 options and differs from the one-vs-rest framing in name only.
            "multinomial logistic",
            TrainOptions {
                penalty: Penalty::L2(1e-4),
                ..TrainOptions::default()
            },
        ),
    ]
}

/// Accuracy measured at one training-set size.
#[derive(Debug, Clone, Copy)]
pub struct CurvePoint {
    pub train_size: usize,
    pub train_accuracy: f32,
    pub test_accuracy: f32,
}

/// Train on growing prefixes of the training set and score each model.
///
/// Sizes beyond the available rows are clamped; duplicates after clamping
/// are dropped.
pub fn learning_curve(
    train: &FeatureSet,
    test: &FeatureSet,
    num_classes: usize,
    sizes: &[usize],
    options: &TrainOptions,
) -> Result<Vec<CurvePoint>, String> {
    let available = train.len();
    let mut points = Vec::new();
    let mut last_size = 0usize;
    for &requested in sizes {
        let size = requested.min(available);
        if size == 0 || size == last_size {
            continue;
        }
        last_size = size;
        let subset = train.head(size);
        let model = linear::train_linear(&subset, num_classes, options)?;
        points.push(CurvePoint {
            train_size: size,
            train_accuracy: model.score(&subset),
            test_accuracy: model.score(test),
        });
    }
    Ok(points)
}

impl FeatureSet {
    /// Number of feature rows.
    pub fn len(&self) -> usize {
        self.x.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Owned copy of the first `rows` rows.
    pub fn head(&self, rows: usize) -> FeatureSet {
        FeatureSet {
            x: self.x.slice(s![0..rows, ..]).to_owned(),
            y: Array1::from_iter(self.y.iter().take(rows).copied()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn flatten_preserves_row_order() {
        let dataset = Array::from_iter((0..2 * 28 * 28).map(|v| v as f32))
            .into_shape_with_order((2, 28, 28))
            .unwrap();
        let flat = flatten_images(&dataset);
        assert_eq!(flat.dim(), (2, 784));
        assert_eq!(flat[[0, 0]], 0.0);
        assert_eq!(flat[[0, 783]], 783.0);
        assert_eq!(flat[[1, 0]], 784.0);
    }

    #[test]
    fn head_keeps_feature_label_pairing() {
        let set = FeatureSet {
            x: Array::from_iter((0..12).map(|v| v as f32))
                .into_shape_with_order((4, 3))
                .unwrap(),
            y: Array1::from_vec(vec![0, 1, 2, 3]),
        };
        let head = set.head(2);
        assert_eq!(head.len(), 2);
        assert_eq!(head.y.to_vec(), vec![0, 1]);
        assert_eq!(head.x[[1, 0]], 3.0);
    }

    #[test]
    fn benchmark_heads_cover_the_three_models() {
        let heads = benchmark_heads();
        let names: Vec<&str> = heads.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            names,
            vec!["L1 logistic", "L2 logistic", "multinomial logistic"]
        );
        assert!(matches!(heads[0].1.penalty, Penalty::L1(_)));
        assert!(matches!(heads[1].1.penalty, Penalty::L2(_)));
        assert!(matches!(heads[2].1.penalty, Penalty::L2(_)));
    }

    #[test]
    fn learning_curve_clamps_and_dedups_sizes() {
        let rows = 60usize;
        let x = Array::from_shape_fn((rows, 2), |(row, col)| {
            if (row % 2 == 0) == (col == 0) { 1.0 } else { -1.0 }
        });
        let y = Array1::from_iter((0..rows as i32).map(|row| row % 2));
        let set = FeatureSet { x, y };
        let options = TrainOptions {
            epochs: 5,
            ..TrainOptions::default()
        };
        let points = learning_curve(&set, &set, 2, &[50, 100, 1000], &options).unwrap();
        let sizes: Vec<usize> = points.iter().map(|point| point.train_size).collect();
        assert_eq!(sizes, vec![50, 60]);
    }
}
