//! Joint random permutation of a dataset tensor and its label vector.

use ndarray::Axis;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::pipeline::merge::SplitPair;

/// Apply one random permutation identically to dataset and labels.
///
/// The pairing is preserved exactly: output row `j` carries the same
/// sample/label pair as whichever input row the permutation mapped there.
pub fn shuffle_pair(pair: &SplitPair, rng: &mut StdRng) -> SplitPair {
    let mut order: Vec<usize> = (0..pair.len()).collect();
    order.shuffle(rng);
    SplitPair {
        dataset: pair.dataset.select(Axis(0), &order),
        labels: pair.labels.select(Axis(0), &order),
    }
}
