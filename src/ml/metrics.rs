//! Evaluation metrics for classification models.

/// Confusion matrix for a `K`-class classifier.
#[derive(Debug, Clone)]
pub struct ConfusionMatrix {
    /// Number of classes.
    pub n_classes: usize,
    /// Row-major `KxK` counts (`truth * K + predicted`).
    pub counts: Vec<u32>,
}

impl ConfusionMatrix {
    /// Create an empty `KxK` confusion matrix.
    pub fn new(n_classes: usize) -> Self {
        Self {
            n_classes,
            counts: vec![0; n_classes * n_classes],
        }
    }

    pub fn add(&mut self, truth: usize, predicted: usize) {
        if truth >= self.n_classes || predicted >= self.n_classes {
            return;
        }
        let idx = truth * self.n_classes + predicted;
        self.counts[idx] = self.counts[idx].saturating_add(1);
    }

    pub fn get(&self, truth: usize, predicted: usize) -> u32 {
        self.counts[truth * self.n_classes + predicted]
    }
}

/// Compute overall accuracy from a confusion matrix.
pub fn accuracy(cm: &ConfusionMatrix) -> f32 {
    let mut correct = 0u64;
    let mut total = 0u64;
    for truth in 0..cm.n_classes {
        for predicted in 0..cm.n_classes {
            let v = cm.get(truth, predicted) as u64;
            total += v;
            if truth == predicted {
                correct += v;
            }
        }
    }
    if total == 0 {
        0.0
    } else {
        (correct as f32) / (total as f32)
    }
}
