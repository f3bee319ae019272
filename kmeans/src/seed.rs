use rand::Rng;
use tracing::debug;

use crate::distance::squared_distance;
use crate::{KMeansError, Point, Seeding};

/// Picks `k` initial centroids from `points`.
///
/// Every centroid is an owned copy of a dataset point. With
/// [`Seeding::Random`] points are drawn uniformly with replacement, so
/// duplicates are possible and `k` may exceed `points.len()`.
/// With [`Seeding::PlusPlus`] the k-means++ scheme is used.
pub fn select_seeds<R: Rng + ?Sized>(
    points: &[Point],
    k: usize,
    seeding: Seeding,
    rng: &mut R,
) -> Result<Vec<Point>, KMeansError> {
    if points.is_empty() {
        return Err(KMeansError::InvalidInput("empty dataset".into()));
    }
    if k == 0 {
        return Err(KMeansError::InvalidInput("k must be at least 1".into()));
    }

    match seeding {
        Seeding::Random => Ok(random_seeds(points, k, rng)),
        Seeding::PlusPlus => plusplus_seeds(points, k, rng),
    }
}

fn random_seeds<R: Rng + ?Sized>(points: &[Point], k: usize, rng: &mut R) -> Vec<Point> {
    (0..k)
        .map(|_| points[rng.gen_range(0..points.len())].clone())
        .collect()
}

/// k-means++: the first seed is uniform, each following seed is drawn with
/// probability proportional to its squared distance from the nearest seed
/// chosen so far.
fn plusplus_seeds<R: Rng + ?Sized>(
    points: &[Point],
    k: usize,
    rng: &mut R,
) -> Result<Vec<Point>, KMeansError> {
    let n = points.len();
    let mut chosen = vec![false; n];
    let mut seeds: Vec<Point> = Vec::with_capacity(k);

    let first = rng.gen_range(0..n);
    chosen[first] = true;
    seeds.push(points[first].clone());

    // Squared distance from each point to its nearest seed.
    let mut nearest: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(&seeds[0], p))
        .collect::<Result<_, _>>()?;

    while seeds.len() < k {
        let total: f64 = nearest.iter().sum();
        let idx = if total > 0.0 {
            weighted_pick(&nearest, total, rng)
        } else {
            // Every point sits on a seed already.
            let idx = unchosen_pick(&chosen, rng);
            debug!(
                seed = seeds.len(),
                point = idx,
                "kmeans: zero total distance, uniform fallback"
            );
            idx
        };

        chosen[idx] = true;
        let seed = points[idx].clone();
        for (d, p) in nearest.iter_mut().zip(points) {
            let sq = squared_distance(&seed, p)?;
            if sq < *d {
                *d = sq;
            }
        }
        seeds.push(seed);
    }

    Ok(seeds)
}

/// Walks the cumulative distribution of `weights` with a single uniform draw
/// in `[0, total)`. Zero-weight entries are never returned.
fn weighted_pick<R: Rng + ?Sized>(weights: &[f64], total: f64, rng: &mut R) -> usize {
    let target = rng.r#gen::<f64>() * total;
    let mut cum = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cum += w;
        if w > 0.0 && target < cum {
            return i;
        }
    }
    // Rounding can leave target just past the final sum.
    weights.iter().rposition(|&w| w > 0.0).unwrap_or(0)
}

/// Uniform pick among indices not chosen yet, or among all indices once
/// every one has been used.
fn unchosen_pick<R: Rng + ?Sized>(chosen: &[bool], rng: &mut R) -> usize {
    let remaining: Vec<usize> = chosen
        .iter()
        .enumerate()
        .filter(|(_, c)| !**c)
        .map(|(i, _)| i)
        .collect();
    if remaining.is_empty() {
        rng.gen_range(0..chosen.len())
    } else {
        remaining[rng.gen_range(0..remaining.len())]
    }
}
