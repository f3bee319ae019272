//! Background execution of clustering runs.
//!
//! A run is CPU-bound and never yields, so it goes to Tokio's blocking pool.
//! The caller gets a [`ClusterTask`] back immediately and either awaits it or
//! registers a completion callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cluster::{new_rng, run_with_rng, validate};
use crate::lloyd::Clustering;
use crate::{Config, KMeansError, Point};

/// Handle to a clustering run executing in the background.
///
/// Dropping the handle does not stop the run; its result is discarded.
pub struct ClusterTask {
    rx: oneshot::Receiver<Result<Clustering, KMeansError>>,
    cancel: CancellationToken,
    handle: Handle,
}

impl ClusterTask {
    /// Asks the run to stop. The worker notices between rounds and the
    /// task then resolves to [`KMeansError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns the cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Waits for the run to finish.
    pub async fn wait(self) -> Result<Clustering, KMeansError> {
        self.rx.await.map_err(|_| KMeansError::Aborted)?
    }

    /// Calls `f` once with the result when the run finishes.
    pub fn on_complete<F>(self, f: F) -> JoinHandle<()>
    where
        F: FnOnce(Result<Clustering, KMeansError>) + Send + 'static,
    {
        let handle = self.handle.clone();
        handle.spawn(async move { f(self.wait().await) })
    }
}

/// Starts a clustering run on the blocking pool of the current Tokio runtime.
///
/// Input errors are returned here, before any work is scheduled.
pub fn submit(points: Arc<Vec<Point>>, config: Config) -> Result<ClusterTask, KMeansError> {
    spawn_run(points, config, CancellationToken::new(), None)
}

/// Submits runs one at a time.
///
/// While a run is in flight further submissions fail with
/// [`KMeansError::Busy`]. The slot frees up as soon as the worker is done,
/// whether it succeeded, failed, or was cancelled.
pub struct Clusterer {
    config: Config,
    busy: Arc<AtomicBool>,
}

impl Clusterer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replaces the configuration used by [`Clusterer::submit`].
    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    /// Returns true while a submitted run has not finished.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Starts a run with the stored configuration.
    pub fn submit(&self, points: Arc<Vec<Point>>) -> Result<ClusterTask, KMeansError> {
        self.submit_with(points, self.config.clone())
    }

    /// Starts a run with an explicit configuration.
    pub fn submit_with(
        &self,
        points: Arc<Vec<Point>>,
        config: Config,
    ) -> Result<ClusterTask, KMeansError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(KMeansError::Busy);
        }
        let guard = BusyGuard(self.busy.clone());
        spawn_run(points, config, CancellationToken::new(), Some(guard))
    }
}

/// Clears the busy flag when dropped.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn spawn_run(
    points: Arc<Vec<Point>>,
    config: Config,
    cancel: CancellationToken,
    busy: Option<BusyGuard>,
) -> Result<ClusterTask, KMeansError> {
    validate(&points, config.k)?;
    let handle = Handle::try_current().map_err(|_| KMeansError::NoRuntime)?;

    let (tx, rx) = oneshot::channel();
    let token = cancel.clone();
    handle.spawn_blocking(move || {
        let mut rng = new_rng(config.seed);
        let result = run_with_rng(&points, &config, &mut rng, Some(&token));
        // Free the slot before the waiter can observe the result.
        drop(busy);
        if tx.send(result).is_err() {
            debug!("kmeans: task handle dropped, discarding result");
        }
    });

    Ok(ClusterTask { rx, cancel, handle })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::{Seeding, run};

    fn blobs() -> Arc<Vec<Point>> {
        let points = (0..30)
            .map(|i| {
                let base = if i % 2 == 0 { 0.0 } else { 50.0 };
                vec![i as f64, 0.0, base + (i % 5) as f64]
            })
            .collect();
        Arc::new(points)
    }

    #[tokio::test]
    async fn background_matches_foreground() {
        let points = blobs();
        let cfg = Config::new(2).with_seeding(Seeding::PlusPlus).with_seed(17);

        let expected = run(&points, &cfg).unwrap();
        let got = submit(points.clone(), cfg).unwrap().wait().await.unwrap();

        assert_eq!(got.labels, expected.labels);
        assert_eq!(got.iterations, expected.iterations);
    }

    #[test]
    fn invalid_input_fails_before_scheduling() {
        // No runtime here: validation must come first.
        let err = submit(Arc::new(Vec::new()), Config::new(2)).err().unwrap();
        assert!(matches!(err, KMeansError::InvalidInput(_)));

        let err = submit(blobs(), Config::new(0)).err().unwrap();
        assert!(matches!(err, KMeansError::InvalidInput(_)));
    }

    #[test]
    fn requires_runtime() {
        let err = submit(blobs(), Config::new(2)).err().unwrap();
        assert!(matches!(err, KMeansError::NoRuntime));
    }

    #[tokio::test]
    async fn on_complete_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let (tx, rx) = oneshot::channel();

        let task = submit(blobs(), Config::new(2).with_seed(1)).unwrap();
        let join = task.on_complete(move |result| {
            seen.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(result.map(|c| c.labels.len()));
        });

        join.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(rx.await.unwrap().unwrap(), 30);
    }

    #[tokio::test]
    async fn cancelled_run_reports_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let task = spawn_run(blobs(), Config::new(3).with_seed(2), token, None).unwrap();
        let err = task.wait().await.unwrap_err();
        assert!(matches!(err, KMeansError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_through_handle() {
        let task = submit(blobs(), Config::new(2).with_seed(8)).unwrap();
        task.cancel();
        assert!(task.cancellation_token().is_cancelled());
        // The run may already be done; either outcome is fine as long as
        // the task resolves.
        match task.wait().await {
            Ok(c) => assert!(c.converged),
            Err(e) => assert!(matches!(e, KMeansError::Cancelled)),
        }
    }

    /// Uniformly scattered rows: Lloyd needs many slow rounds on these.
    fn scatter(n: usize, features: usize) -> Arc<Vec<Point>> {
        let mut state = 0x2545f4914f6cdd1du64;
        let points = (0..n)
            .map(|i| {
                let mut p = vec![(i % 500) as f64, (i / 500) as f64];
                for _ in 0..features {
                    state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                    p.push(((state >> 33) as f64) / (u32::MAX as f64) * 100.0);
                }
                p
            })
            .collect();
        Arc::new(points)
    }

    #[test]
    fn clusterer_rejects_overlapping_runs() {
        // A single blocking thread, held by `gate`, keeps the first run
        // pending until the second submission has been refused.
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .max_blocking_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let (release, gate) = std::sync::mpsc::channel::<()>();

        rt.block_on(async {
            let blocker = tokio::task::spawn_blocking(move || {
                let _ = gate.recv();
            });

            let clusterer = Clusterer::new(Config::new(2).with_seed(5));
            let first = clusterer.submit(blobs()).unwrap();
            assert!(clusterer.is_busy());

            let err = clusterer.submit(blobs()).err().unwrap();
            assert!(matches!(err, KMeansError::Busy));
            let err = clusterer.submit_with(blobs(), Config::new(3)).err().unwrap();
            assert!(matches!(err, KMeansError::Busy));

            release.send(()).unwrap();
            blocker.await.unwrap();
            first.wait().await.unwrap();
            assert!(!clusterer.is_busy());

            let second = clusterer.submit(blobs()).unwrap();
            let result = second.wait().await.unwrap();
            assert_eq!(result.labels.len(), 30);
        });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cancel_stops_a_running_job() {
        let clusterer = Clusterer::new(Config::new(64).with_seed(3));
        let task = clusterer.submit(scatter(100_000, 8)).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(clusterer.is_busy());
        let err = clusterer.submit(blobs()).err().unwrap();
        assert!(matches!(err, KMeansError::Busy));

        task.cancel();
        let err = task.wait().await.unwrap_err();
        assert!(matches!(err, KMeansError::Cancelled));
        assert!(!clusterer.is_busy());
    }

    #[tokio::test]
    async fn clusterer_frees_slot_after_invalid_input() {
        let clusterer = Clusterer::new(Config::new(0));
        let err = clusterer.submit(blobs()).err().unwrap();
        assert!(matches!(err, KMeansError::InvalidInput(_)));
        assert!(!clusterer.is_busy());

        let task = clusterer.submit_with(blobs(), Config::new(1)).unwrap();
        let result = task.wait().await.unwrap();
        assert_eq!(result.labels, vec![0; 30]);
        assert_eq!(result.iterations, 1);
    }

    #[tokio::test]
    async fn clusterer_frees_slot_after_failure() {
        let clusterer = Clusterer::new(Config::new(2).with_seed(0));
        let points = Arc::new(vec![vec![0.0, 0.0, 1.0], vec![0.0, 0.0, 1.0, 2.0]]);
        let err = clusterer.submit(points).unwrap().wait().await.unwrap_err();
        assert!(matches!(err, KMeansError::DimensionMismatch { .. }));
        assert!(!clusterer.is_busy());
    }
}
