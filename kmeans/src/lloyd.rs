use std::fmt;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::distance::{distance, squared_distance};
use crate::{KMeansError, Point};

/// Label of a point that has not been through an assignment pass yet.
const UNASSIGNED: usize = usize::MAX;

/// Outcome of one clustering run.
#[derive(Clone)]
pub struct Clustering {
    /// Cluster index for each input point, in input order.
    pub labels: Vec<usize>,

    /// Final centroids, indexed by label.
    pub centroids: Vec<Point>,

    /// Completed assign/update rounds. The final pass that confirms
    /// convergence is not counted.
    pub iterations: usize,

    /// Sum of squared feature distances from each point to its centroid.
    pub inertia: f64,

    /// False when the iteration cap stopped the run.
    pub converged: bool,
}

impl Clustering {
    /// Number of clusters.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Number of points assigned to each cluster.
    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0usize; self.centroids.len()];
        for &l in &self.labels {
            if let Some(s) = sizes.get_mut(l) {
                *s += 1;
            }
        }
        sizes
    }

    /// Returns the labels, or [`KMeansError::NonConvergence`] carrying them
    /// when the run hit its iteration cap.
    pub fn into_labels(self) -> Result<Vec<usize>, KMeansError> {
        if self.converged {
            Ok(self.labels)
        } else {
            Err(KMeansError::NonConvergence {
                iterations: self.iterations,
                labels: self.labels,
            })
        }
    }
}

impl fmt::Debug for Clustering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clustering")
            .field("k", &self.centroids.len())
            .field("points", &self.labels.len())
            .field("iterations", &self.iterations)
            .field("inertia", &self.inertia)
            .field("converged", &self.converged)
            .finish()
    }
}

/// State of a Lloyd iteration in progress.
///
/// [`ClusterRun::iterate`] drives the whole loop; [`ClusterRun::assign`] and
/// [`ClusterRun::update`] expose the two phases for callers that want to step
/// through it.
pub struct ClusterRun {
    centroids: Vec<Point>,
    labels: Vec<usize>,
    iterations: usize,
}

impl ClusterRun {
    /// Starts a run over `len` points from the given initial centroids.
    /// All labels start out unassigned.
    pub fn new(centroids: Vec<Point>, len: usize) -> Self {
        Self {
            centroids,
            labels: vec![UNASSIGNED; len],
            iterations: 0,
        }
    }

    pub fn centroids(&self) -> &[Point] {
        &self.centroids
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Moves every point to its nearest centroid. Ties go to the lowest
    /// centroid index. Returns how many labels changed.
    pub fn assign(&mut self, points: &[Point]) -> Result<usize, KMeansError> {
        if self.labels.len() != points.len() {
            self.labels = vec![UNASSIGNED; points.len()];
        }

        let mut changed = 0usize;
        for (label, p) in self.labels.iter_mut().zip(points) {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for (j, c) in self.centroids.iter().enumerate() {
                let d = distance(c, p)?;
                if d < best_dist {
                    best_dist = d;
                    best = j;
                }
            }
            if *label != best {
                *label = best;
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Moves every centroid to the coordinate-wise mean of its members.
    /// A centroid without members is replaced by a copy of a random point.
    pub fn update<R: Rng + ?Sized>(&mut self, points: &[Point], rng: &mut R) {
        if points.is_empty() {
            return;
        }

        let dim = points[0].len();
        let k = self.centroids.len();
        let mut sums = vec![vec![0.0f64; dim]; k];
        let mut counts = vec![0usize; k];

        for (p, &l) in points.iter().zip(&self.labels) {
            if l >= k {
                continue;
            }
            counts[l] += 1;
            for (s, v) in sums[l].iter_mut().zip(p) {
                *s += v;
            }
        }

        for (j, (mut sum, count)) in sums.into_iter().zip(counts).enumerate() {
            if count == 0 {
                let idx = rng.gen_range(0..points.len());
                debug!(cluster = j, point = idx, "kmeans: reseeding empty cluster");
                self.centroids[j] = points[idx].clone();
                continue;
            }
            let n = count as f64;
            for s in sum.iter_mut() {
                *s /= n;
            }
            self.centroids[j] = sum;
        }
    }

    /// Sum of squared feature distances from each assigned point to its
    /// centroid.
    pub fn inertia(&self, points: &[Point]) -> Result<f64, KMeansError> {
        let mut total = 0.0;
        for (p, &l) in points.iter().zip(&self.labels) {
            if let Some(c) = self.centroids.get(l) {
                total += squared_distance(c, p)?;
            }
        }
        Ok(total)
    }

    /// Alternates assignment and update until no label changes or
    /// `max_iterations` rounds have completed. After the last round one more
    /// assignment pass decides convergence, so the returned labels always
    /// match the returned centroids.
    ///
    /// `cancel` is checked before every assignment pass.
    pub fn iterate<R: Rng + ?Sized>(
        mut self,
        points: &[Point],
        max_iterations: usize,
        rng: &mut R,
        cancel: Option<&CancellationToken>,
    ) -> Result<Clustering, KMeansError> {
        let cap = max_iterations.max(1);
        let converged = loop {
            if cancel.is_some_and(|c| c.is_cancelled()) {
                warn!(iterations = self.iterations, "kmeans: run cancelled");
                return Err(KMeansError::Cancelled);
            }

            let changed = self.assign(points)?;
            debug!(iteration = self.iterations + 1, changed, "kmeans: assignment pass");
            if changed == 0 {
                break true;
            }
            if self.iterations == cap {
                break false;
            }

            self.update(points, rng);
            self.iterations += 1;
        };

        if !converged {
            warn!(
                iterations = self.iterations,
                "kmeans: iteration cap reached before convergence"
            );
        }

        let inertia = self.inertia(points)?;
        Ok(Clustering {
            labels: self.labels,
            centroids: self.centroids,
            iterations: self.iterations,
            inertia,
            converged,
        })
    }
}
