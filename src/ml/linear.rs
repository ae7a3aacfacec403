//! Multinomial logistic regression trained with mini-batch SGD.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ml::metrics::{ConfusionMatrix, accuracy};

/// Regularization penalty applied during training.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Penalty {
    None,
    L1(f32),
    L2(f32),
}

/// Training options for a linear head.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    pub penalty: Penalty,
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs: 30,
            learning_rate: 0.1,
            penalty: Penalty::L2(1e-4),
            batch_size: 128,
            seed: 42,
        }
    }
}

/// Flattened feature matrix with integer class labels.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// `(n, dim)` feature rows.
    pub x: Array2<f32>,
    /// `n` class indices, each in `[0, num_classes)`.
    pub y: Array1<i32>,
}

/// Trained linear model: `num_classes * dim` weights plus per-class bias.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub num_classes: usize,
    pub dim: usize,
    pub weights: Vec<f32>,
    pub bias: Vec<f32>,
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&value| (value - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 {
        return vec![1.0 / logits.len().max(1) as f32; logits.len()];
    }
    exps.into_iter().map(|value| value / sum).collect()
}

impl LinearModel {
    /// Class probabilities for one feature row.
    pub fn predict_proba(&self, features: &[f32]) -> Vec<f32> {
        if features.len() != self.dim {
            return Vec::new();
        }
        let mut logits = vec![0.0f32; self.num_classes];
        for (class, logit) in logits.iter_mut().enumerate() {
            let base = class * self.dim;
            let mut sum = self.bias[class];
            for (idx, &value) in features.iter().enumerate() {
                sum += self.weights[base + idx] * value;
            }
            *logit = sum;
        }
        softmax(&logits)
    }

    /// Argmax class index for one feature row.
    pub fn predict_class_index(&self, features: &[f32]) -> usize {
        let proba = self.predict_proba(features);
        let mut best = 0usize;
        let mut best_val = f32::NEG_INFINITY;
        for (idx, &p) in proba.iter().enumerate() {
            if p > best_val {
                best_val = p;
                best = idx;
            }
        }
        best
    }

    /// Confusion matrix over a whole feature set.
    pub fn evaluate(&self, set: &FeatureSet) -> ConfusionMatrix {
        let mut cm = ConfusionMatrix::new(self.num_classes);
        for (row, &truth) in set.x.outer_iter().zip(set.y.iter()) {
            let row = row.as_slice().expect("feature rows are contiguous");
            let predicted = self.predict_class_index(row);
            cm.add(truth as usize, predicted);
        }
        cm
    }

    /// Mean accuracy over a whole feature set.
    pub fn score(&self, set: &FeatureSet) -> f32 {
        accuracy(&self.evaluate(set))
    }
}

/// Train a multinomial logistic regression head on `set`.
pub fn train_linear(
    set: &FeatureSet,
    num_classes: usize,
    options: &TrainOptions,
) -> Result<LinearModel, String> {
    let (rows, dim) = set.x.dim();
    if rows == 0 {
        return Err("Empty training set".to_string());
    }
    if rows != set.y.len() {
        return Err("Mismatched training inputs/labels".to_string());
    }
    if num_classes == 0 {
        return Err("No classes available for training".to_string());
    }
    for &label in set.y.iter() {
        if label < 0 || label as usize >= num_classes {
            return Err(format!("Label {label} out of range 0..{num_classes}"));
        }
    }

    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut weights = vec![0.0f32; num_classes * dim];
    let mut bias = vec![0.0f32; num_classes];
    for w in &mut weights {
        *w = (rng.random::<f32>() - 0.5) * 0.01;
    }

    let mut indices: Vec<usize> = (0..rows).collect();
    let batch_size = options.batch_size.max(1);
    let lr = options.learning_rate;

    for _epoch in 0..options.epochs {
        indices.shuffle(&mut rng);
        for chunk in indices.chunks(batch_size) {
            let mut grad_w = vec![0.0f32; weights.len()];
            let mut grad_b = vec![0.0f32; bias.len()];
            for &idx in chunk {
                let x = set.x.row(idx);
                let x = x.as_slice().expect("feature rows are contiguous");
                let y = set.y[idx] as usize;
                let mut logits = vec![0.0f32; num_classes];
                for (class, logit) in logits.iter_mut().enumerate() {
                    let base = class * dim;
                    let mut sum = bias[class];
                    for (feature, &value) in x.iter().enumerate() {
                        sum += weights[base + feature] * value;
                    }
                    *logit = sum;
                }
                let probs = softmax(&logits);
                for class in 0..num_classes {
                    let diff = probs[class] - if class == y { 1.0 } else { 0.0 };
                    let base = class * dim;
                    for (feature, &value) in x.iter().enumerate() {
                        grad_w[base + feature] += diff * value;
                    }
                    grad_b[class] += diff;
                }
            }
            let inv = 1.0 / chunk.len() as f32;
            for (idx, weight) in weights.iter_mut().enumerate() {
                let penalty_term = match options.penalty {
                    Penalty::None => 0.0,
                    Penalty::L1(strength) => strength * weight.signum(),
                    Penalty::L2(strength) => strength * *weight,
                };
                *weight -= lr * (grad_w[idx] * inv + penalty_term);
            }
            for (class, b) in bias.iter_mut().enumerate() {
                *b -= lr * grad_b[class] * inv;
            }
        }
    }

    Ok(LinearModel {
        num_classes,
        dim,
        weights,
        bias,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn separable_set(rows_per_class: usize) -> FeatureSet {
        // Class 0 points at (+1, -1), class 1 at (-1, +1).
        let rows = rows_per_class * 2;
        let x = Array::from_shape_fn((rows, 2), |(row, col)| {
            let class = row % 2;
            if (class == 0) == (col == 0) { 1.0 } else { -1.0 }
        });
        let y = Array1::from_iter((0..rows as i32).map(|row| row % 2));
        FeatureSet { x, y }
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, 0.0]);
        assert!((probs[0] - 1.0).abs() < 1e-6);
        assert!(probs.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn learns_a_separable_problem() {
        let set = separable_set(32);
        for penalty in [Penalty::None, Penalty::L1(1e-4), Penalty::L2(1e-4)] {
            let options = TrainOptions {
                penalty,
                ..TrainOptions::default()
            };
            let model = train_linear(&set, 2, &options).unwrap();
            assert!(
                model.score(&set) > 0.95,
                "penalty {penalty:?} failed to separate"
            );
        }
    }

    #[test]
    fn rejects_out_of_range_labels() {
        let set = FeatureSet {
            x: Array2::zeros((2, 2)),
            y: Array1::from_vec(vec![0, 5]),
        };
        let err = train_linear(&set, 2, &TrainOptions::default()).unwrap_err();
        assert!(err.contains("out of range"));
    }

    #[test]
    fn rejects_empty_training_set() {
        let set = FeatureSet {
            x: Array2::zeros((0, 2)),
            y: Array1::from_vec(vec![]),
        };
        assert!(train_linear(&set, 2, &TrainOptions::default()).is_err());
    }

    #[test]
    fn predict_proba_rejects_wrong_dim() {
        let model = LinearModel {
            num_classes: 2,
            dim: 3,
            weights: vec![0.0; 6],
            bias: vec![0.0; 2],
        };
        assert!(model.predict_proba(&[1.0]).is_empty());
    }
}
