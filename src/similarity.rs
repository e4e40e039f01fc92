//! Vector similarity for exact candidate re-ranking
//!
//! The LSH index narrows the candidate set; the exact cosine ranking runs
//! over that reduced set. Accumulation happens in f64 so the result is
//! stable regardless of vector dimension.

/// Compute cosine similarity between two vectors
///
/// Returns a value in [-1.0, 1.0]. A zero-norm vector (including the empty
/// vector) has similarity 0.0 with everything, never NaN. Mismatched
/// dimensions also yield 0.0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    ((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0)) as f32
}
