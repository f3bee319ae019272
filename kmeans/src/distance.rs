use crate::KMeansError;

/// Number of leading coordinates that only position a point on screen.
/// They are carried through clustering but never measured.
pub const SPATIAL_DIMS: usize = 2;

/// Squared Euclidean distance over the feature columns (index 2 onwards).
///
/// Points shorter than [`SPATIAL_DIMS`] are rejected with
/// [`KMeansError::InvalidInput`], points of unequal length with
/// [`KMeansError::DimensionMismatch`].
pub fn squared_distance(a: &[f64], b: &[f64]) -> Result<f64, KMeansError> {
    if a.len() < SPATIAL_DIMS || b.len() < SPATIAL_DIMS {
        return Err(KMeansError::InvalidInput(format!(
            "point has {} coordinates, need at least {SPATIAL_DIMS}",
            a.len().min(b.len())
        )));
    }
    if a.len() != b.len() {
        return Err(KMeansError::DimensionMismatch {
            expected: a.len(),
            got: b.len(),
        });
    }

    let mut sum = 0.0;
    for i in SPATIAL_DIMS..a.len() {
        let d = a[i] - b[i];
        sum += d * d;
    }
    Ok(sum)
}

/// Euclidean distance over the feature columns (index 2 onwards).
pub fn distance(a: &[f64], b: &[f64]) -> Result<f64, KMeansError> {
    squared_distance(a, b).map(f64::sqrt)
}
