//! Math utility functions

/// Argmax - index of the maximum value, first one on ties
pub fn argmax(x: &[f64]) -> usize {
    let mut best = 0;
    for (idx, value) in x.iter().enumerate() {
        if *value > x[best] {
            best = idx;
        }
    }
    best
}

/// Scale a non-negative vector so it sums to one; all-zero input is left untouched
pub fn normalize_sum(v: &mut [f64]) {
    let sum: f64 = v.iter().sum();
    if sum > 0.0 {
        for x in v.iter_mut() {
            *x /= sum;
        }
    }
}
