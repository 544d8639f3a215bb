use serde::{Deserialize, Serialize};

/// Settings for one build and simulation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fixed number of gates the netlist can hold
    pub capacity: usize,
    /// Seed for the RNG that resolves unstable set/reset latches
    pub seed: u64,
}

impl Config {
    pub const DEFAULT_CAPACITY: usize = 5000;
}

impl Default for Config {
    fn default() -> Self {
        Config {
            capacity: Self::DEFAULT_CAPACITY,
            seed: 0,
        }
    }
}
