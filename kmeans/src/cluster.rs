use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::distance::SPATIAL_DIMS;
use crate::lloyd::{ClusterRun, Clustering};
use crate::seed::select_seeds;
use crate::{Config, KMeansError, Point, Seeding};

/// Clusters `points` into `k` groups and returns one label per point.
///
/// Labels are in `[0, k)`. With `rng_seed` set the result is reproducible;
/// without it the generator is seeded from OS entropy.
///
/// A run that hits the default iteration cap fails with
/// [`KMeansError::NonConvergence`], which still carries the labels.
pub fn cluster(
    points: &[Point],
    k: usize,
    use_plusplus_seeding: bool,
    rng_seed: Option<u64>,
) -> Result<Vec<usize>, KMeansError> {
    let mut cfg = Config::new(k).with_seeding(Seeding::from_plusplus(use_plusplus_seeding));
    cfg.seed = rng_seed;
    run(points, &cfg)?.into_labels()
}

/// Runs one clustering pass as described by `cfg` and returns the full
/// result. Hitting the iteration cap is not an error here; check
/// [`Clustering::converged`].
pub fn run(points: &[Point], cfg: &Config) -> Result<Clustering, KMeansError> {
    validate(points, cfg.k)?;
    let mut rng = new_rng(cfg.seed);
    run_with_rng(points, cfg, &mut rng, None)
}

/// Like [`run`], with the random source supplied by the caller.
/// `cfg.seed` is ignored.
pub fn run_with_rng<R: Rng + ?Sized>(
    points: &[Point],
    cfg: &Config,
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> Result<Clustering, KMeansError> {
    validate(points, cfg.k)?;
    let cfg = cfg.clone().with_defaults();

    let seeds = select_seeds(points, cfg.k, cfg.seeding, rng)?;
    let result = ClusterRun::new(seeds, points.len()).iterate(
        points,
        cfg.max_iterations,
        rng,
        cancel,
    )?;

    info!(
        points = points.len(),
        k = cfg.k,
        iterations = result.iterations,
        converged = result.converged,
        inertia = result.inertia,
        "kmeans: run finished"
    );
    Ok(result)
}

/// Rejects inputs that cannot be clustered at all. Length differences
/// between points are left to the distance computation.
pub(crate) fn validate(points: &[Point], k: usize) -> Result<(), KMeansError> {
    if points.is_empty() {
        return Err(KMeansError::InvalidInput("empty dataset".into()));
    }
    if k == 0 {
        return Err(KMeansError::InvalidInput("k must be at least 1".into()));
    }
    if let Some((i, p)) = points
        .iter()
        .enumerate()
        .find(|(_, p)| p.len() < SPATIAL_DIMS)
    {
        return Err(KMeansError::InvalidInput(format!(
            "point {i} has {} coordinates, need at least {SPATIAL_DIMS}",
            p.len()
        )));
    }
    Ok(())
}

pub(crate) fn new_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
