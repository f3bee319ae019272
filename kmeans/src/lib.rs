//! k-means clustering over the feature columns of a point set.
//!
//! Each point is a row of numbers. Columns 0 and 1 place the point on a
//! scatter plot and are carried along untouched; every column after that is
//! a clustering feature.
//!
//! # Usage
//!
//! ```
//! use giztoy_kmeans::cluster;
//!
//! let points = vec![
//!     vec![0.0, 0.0, 1.0],
//!     vec![1.0, 0.0, 2.0],
//!     vec![2.0, 0.0, 9.0],
//!     vec![3.0, 0.0, 10.0],
//! ];
//! let labels = cluster(&points, 2, true, Some(7)).unwrap();
//! assert_eq!(labels.len(), 4);
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```
//!
//! Inside a Tokio runtime, [`submit`] or [`Clusterer`] run the same work on
//! the blocking pool and hand back a [`ClusterTask`].
//!
//! # Design
//!
//! Seeding is either uniform or k-means++ ([`Seeding`]). Lloyd iteration
//! stops once an assignment pass changes no label, or after
//! [`Config::max_iterations`] rounds. Clusters that lose all their points
//! are reseeded with a random point rather than dropped, so a run always
//! returns exactly k centroids.

mod cluster;
mod config;
mod distance;
mod error;
mod lloyd;
mod seed;
mod task;

/// A row of the dataset: two spatial columns followed by features.
pub type Point = Vec<f64>;

pub use cluster::{cluster, run, run_with_rng};
pub use config::{Config, DEFAULT_MAX_ITERATIONS, Seeding};
pub use distance::{SPATIAL_DIMS, distance, squared_distance};
pub use error::KMeansError;
pub use lloyd::{ClusterRun, Clustering};
pub use seed::select_seeds;
pub use task::{ClusterTask, Clusterer, submit};
