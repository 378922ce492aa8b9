use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct SearchConfig {
    /// Exploration weight in the UCT term.
    pub uct_temperature: f64,
    /// Maps raw game scores into roughly unit range for UCT.
    pub score_scale: f64,
    /// Selection-expansion-rollout-backup iterations per search.
    pub rollouts: u32,
    /// Per-kind node budget; exceeding it is fatal.
    pub slab_capacity: usize,
    /// Search RNG seed; drawn from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            uct_temperature: 0.45,
            score_scale: 1.0 / 80.0,
            rollouts: 15_000,
            slab_capacity: 32_768,
            seed: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uct_temperature(mut self, temperature: f64) -> Self {
        self.uct_temperature = temperature;
        self
    }

    pub fn score_scale(mut self, scale: f64) -> Self {
        self.score_scale = scale;
        self
    }

    pub fn rollouts(mut self, rollouts: u32) -> Self {
        self.rollouts = rollouts;
        self
    }

    pub fn slab_capacity(mut self, capacity: usize) -> Self {
        self.slab_capacity = capacity;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}
