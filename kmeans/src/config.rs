use serde::{Deserialize, Serialize};

/// Default cap on assign/update rounds.
pub const DEFAULT_MAX_ITERATIONS: usize = 300;

/// How the initial centroids are chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seeding {
    /// k uniform draws from the dataset, with replacement.
    #[default]
    Random,
    /// k-means++: later seeds favor points far from earlier ones.
    PlusPlus,
}

impl Seeding {
    pub fn from_plusplus(use_plusplus: bool) -> Self {
        if use_plusplus {
            Seeding::PlusPlus
        } else {
            Seeding::Random
        }
    }
}

/// Controls a single clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Number of clusters. Must be at least 1.
    pub k: usize,

    /// Seeding strategy. Default: random.
    #[serde(default)]
    pub seeding: Seeding,

    /// Cap on assign/update rounds. One more assignment pass runs after the
    /// last round, so a run that settles in exactly this many rounds still
    /// reports convergence.
    /// Default: 300. Zero means default.
    #[serde(default)]
    pub max_iterations: usize,

    /// RNG seed. `None` seeds from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Config {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            seeding: Seeding::Random,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            seed: None,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_seeding(mut self, seeding: Seeding) -> Self {
        self.seeding = seeding;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn with_defaults(mut self) -> Self {
        if self.max_iterations == 0 {
            self.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        self
    }
}
