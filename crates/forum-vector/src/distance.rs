//! Similarity functions for unit-norm embedding vectors.
//!
//! Every vector stored in a [`FlatIndex`](crate::FlatIndex) has unit L2 norm,
//! so cosine similarity reduces to a dot product.

/// Default tolerance when checking that a vector has unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

// ============================================================================
// Vector Helpers
// ============================================================================

/// Compute the dot product of two vectors.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    let mut sum = 0.0f32;

    // Manual loop unrolling for better performance
    let chunks = a.len() / 4;
    let remainder = a.len() % 4;

    for i in 0..chunks {
        let base = i * 4;
        sum += a[base] * b[base]
            + a[base + 1] * b[base + 1]
            + a[base + 2] * b[base + 2]
            + a[base + 3] * b[base + 3];
    }

    let start = chunks * 4;
    for i in 0..remainder {
        let idx = start + i;
        sum += a[idx] * b[idx];
    }

    sum
}

/// L2 norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    dot_product(v, v).sqrt()
}

/// Scale a vector to unit length in place.
///
/// Returns `false` (leaving the vector untouched) for zero or non-finite input.
pub fn normalize(v: &mut [f32]) -> bool {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= norm;
    }
    true
}

/// Whether the vector has unit length within `tolerance`.
pub fn is_unit(v: &[f32], tolerance: f32) -> bool {
    (l2_norm(v) - 1.0).abs() <= tolerance
}
