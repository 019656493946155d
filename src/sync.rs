//! An opt-in thread-safe wrapper around [`BhptTable`].
//!
//! The core table has no internal synchronization (§5 of the
//! specification); this is purely a convenience for callers who want to
//! share one table across threads, in the same spirit as the teacher
//! codebase wrapping shared maps in `parking_lot::RwLock` (see
//! `BitmapIndex`). It does not change any selection or weighting
//! semantics — every method simply takes the lock and forwards.

use parking_lot::Mutex;

use crate::config::BhptConfig;
use crate::error::Result;
use crate::table::BhptTable;
use crate::weight::WeightFn;

/// `BhptTable` behind a `parking_lot::Mutex`, for callers sharing one table
/// across threads. Not part of the core contract.
#[derive(Debug)]
pub struct SharedBhptTable {
    inner: Mutex<BhptTable>,
}

impl SharedBhptTable {
    pub fn new(config: BhptConfig) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(BhptTable::new(config)?),
        })
    }

    pub fn with_weight_fn(config: BhptConfig, weight_fn: Box<dyn WeightFn>) -> Result<Self> {
        Ok(Self {
            inner: Mutex::new(BhptTable::with_weight_fn(config, weight_fn)?),
        })
    }

    pub fn history_of(&self, index: usize) -> Result<Vec<bool>> {
        self.inner.lock().history_of(index)
    }

    pub fn push(&self, index: usize, bit: bool) -> Result<()> {
        self.inner.lock().push(index, bit)
    }

    pub fn select(&self) -> Result<usize> {
        self.inner.lock().select()
    }

    pub fn insert(&self, initial_state: &[bool]) -> Result<usize> {
        self.inner.lock().insert(initial_state)
    }

    pub fn remove(&self, index: usize) -> Result<()> {
        self.inner.lock().remove(index)
    }

    pub fn set_mwsp(&self, m: i32) -> Result<()> {
        self.inner.lock().set_mwsp(m)
    }

    pub fn set_defer(&self, defer: bool) {
        self.inner.lock().set_defer(defer)
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    pub fn valid_count(&self) -> usize {
        self.inner.lock().valid_count()
    }
}
