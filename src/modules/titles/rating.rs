//! Derived rating computation.
//!
//! A title's rating is the arithmetic mean of its review scores, recomputed on
//! every read. Nothing is cached, so the value is always consistent with the
//! current review set. The listing query computes the identical expression in
//! SQL (`COALESCE(AVG(score), 0)`).

/// Mean of the given scores; 0.0 when there are none.
pub fn mean_score(scores: &[i64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<i64>() as f64 / scores.len() as f64
}
