use crate::error::{BhptError, Result};

/// Construction parameters for a [`crate::BhptTable`].
///
/// Capacity and history length have no sensible defaults and must be given
/// to [`BhptConfig::new`]; the remaining knobs follow the defaults from the
/// specification and can be overridden with the `with_*` builder methods or
/// by mutating the public fields directly.
#[derive(Debug, Clone, PartialEq)]
pub struct BhptConfig {
    /// Number of tracked entries, `I`.
    pub capacity: usize,
    /// Bits of history retained per entry, `L`.
    pub history_length: usize,
    /// Number of most-recent bits the weight function considers, `N`.
    pub consideration_depth: usize,
    /// Minimal Weight State Position. `-1` disables the floor.
    pub mwsp: i32,
    /// Batch weight recomputation until the distribution is next needed.
    pub defer: bool,
    /// Evict the lowest-weight entry on `insert` into a full table.
    pub auto_remove: bool,
    /// Seed for the table's PRNG. `None` draws a fresh seed at construction.
    pub seed: Option<u64>,
}

impl BhptConfig {
    /// Start a config with the required `capacity`/`history_length` and the
    /// spec's defaults for everything else (`consideration_depth ==
    /// history_length`, `mwsp == -1`, `defer == false`, `auto_remove ==
    /// false`, `seed == None`).
    pub fn new(capacity: usize, history_length: usize) -> Self {
        Self {
            capacity,
            history_length,
            consideration_depth: history_length,
            mwsp: -1,
            defer: false,
            auto_remove: false,
            seed: None,
        }
    }

    pub fn with_consideration_depth(mut self, n: usize) -> Self {
        self.consideration_depth = n;
        self
    }

    pub fn with_mwsp(mut self, m: i32) -> Self {
        self.mwsp = m;
        self
    }

    pub fn with_defer(mut self, defer: bool) -> Self {
        self.defer = defer;
        self
    }

    pub fn with_auto_remove(mut self, auto_remove: bool) -> Self {
        self.auto_remove = auto_remove;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.history_length == 0 {
            return Err(BhptError::InvalidArgument(
                "history_length must be at least 1".into(),
            ));
        }
        if self.consideration_depth == 0 || self.consideration_depth > self.history_length {
            return Err(BhptError::InvalidArgument(format!(
                "consideration_depth must satisfy 1 <= N <= {} (history_length), got {}",
                self.history_length, self.consideration_depth
            )));
        }
        if self.mwsp < -1 || self.mwsp >= self.consideration_depth as i32 {
            return Err(BhptError::InvalidArgument(format!(
                "mwsp must satisfy -1 <= m < {} (consideration_depth), got {}",
                self.consideration_depth, self.mwsp
            )));
        }
        Ok(())
    }
}
