//! The BHPT façade: [`BhptTable`] ties the history store, validity
//! bitmap, weight engine, dirty tracking and selector together behind the
//! public operations of the specification.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};

use crate::bitset::PackedBitset;
use crate::config::BhptConfig;
use crate::error::{BhptError, Result};
use crate::history::HistoryStore;
use crate::weight::{ShiftRegisterWeight, WeightEngine, WeightFn};

/// A fixed-capacity Binary History Probability Table.
///
/// See the crate-level documentation for the full contract. In short:
/// each of `capacity` entries carries a `history_length`-bit shift
/// register; [`BhptTable::select`] performs a weighted random draw over
/// the valid entries, where the weight of an entry grows with how many of
/// its most recent `consideration_depth` states were `true`.
pub struct BhptTable {
    config: BhptConfig,
    history: HistoryStore,
    validity: PackedBitset,
    dirty_entries: PackedBitset,
    free_list: Vec<usize>,
    valid_count: usize,
    weights: Vec<f64>,
    weight_engine: WeightEngine,
    dist_stale: bool,
    cumulative: Vec<f64>,
    total_weight: f64,
    rng: Box<dyn RngCore>,
}

impl std::fmt::Debug for BhptTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BhptTable")
            .field("config", &self.config)
            .field("valid_count", &self.valid_count)
            .field("dist_stale", &self.dist_stale)
            .field("total_weight", &self.total_weight)
            .finish_non_exhaustive()
    }
}

impl BhptTable {
    /// Builds a table with the default [`ShiftRegisterWeight`] function.
    pub fn new(config: BhptConfig) -> Result<Self> {
        Self::with_weight_fn(config, Box::new(ShiftRegisterWeight))
    }

    /// Builds a table with a custom weight function. This is the seam the
    /// specification's roadmap note anticipates a future learned weight
    /// function plugging into.
    pub fn with_weight_fn(config: BhptConfig, weight_fn: Box<dyn WeightFn>) -> Result<Self> {
        config.validate()?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let capacity = config.capacity;
        let n = config.consideration_depth;
        let mwsp = config.mwsp;

        tracing::debug!(capacity, history_length = config.history_length, n, mwsp, seed, "constructing BhptTable");

        Ok(Self {
            history: HistoryStore::new(capacity, config.history_length),
            validity: PackedBitset::new(capacity),
            dirty_entries: PackedBitset::new(capacity),
            free_list: (0..capacity).rev().collect(),
            valid_count: 0,
            weights: vec![0.0; capacity],
            weight_engine: WeightEngine::new(n, mwsp, weight_fn),
            dist_stale: true,
            cumulative: Vec::with_capacity(capacity + 1),
            total_weight: 0.0,
            rng: Box::new(StdRng::seed_from_u64(seed)),
            config,
        })
    }

    // ---- introspection ----------------------------------------------

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn history_length(&self) -> usize {
        self.history.length()
    }

    pub fn consideration_depth(&self) -> usize {
        self.weight_engine.consideration_depth()
    }

    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    pub fn is_valid(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        Ok(self.validity.get(index))
    }

    pub fn config(&self) -> &BhptConfig {
        &self.config
    }

    // ---- façade -------------------------------------------------------

    /// Returns entry `index`'s history, age-0 first. All-zero if the entry
    /// was never written, or if it is currently invalid.
    pub fn history_of(&self, index: usize) -> Result<Vec<bool>> {
        self.check_index(index)?;
        if !self.validity.get(index) {
            return Ok(vec![false; self.history.length()]);
        }
        Ok(self.history.read_row(index))
    }

    /// Records the most recent state for `index`. Pushing to a currently
    /// invalid index implicitly revalidates it with an all-zero history
    /// before the push, per the façade's read/write asymmetry.
    pub fn push(&mut self, index: usize, bit: bool) -> Result<()> {
        self.check_index(index)?;
        if !self.validity.get(index) {
            self.validity.set(index);
            self.valid_count += 1;
            // Implicit Free -> Valid transition must consume this index from
            // the free list, exactly as insert()'s own allocation path does,
            // or a later insert() could hand it out again and alias two
            // "new entry" calls onto one physical slot.
            self.free_list.retain(|&x| x != index);
        }
        self.history.shift_in(index, bit);
        self.dist_stale = true;

        if self.config.defer {
            self.dirty_entries.set(index);
        } else {
            self.recompute_weight(index);
            self.dirty_entries.clear(index);
        }
        Ok(())
    }

    /// Weighted random draw over the valid entries.
    pub fn select(&mut self) -> Result<usize> {
        if self.dist_stale {
            self.rebuild_distribution();
        }
        if self.total_weight == 0.0 {
            return Err(BhptError::NoSelectableEntry);
        }

        let u = self.rng.random_range(0.0..self.total_weight);
        // Smallest k such that cumulative[k + 1] > u.
        let i = self.cumulative.partition_point(|&c| c <= u);
        Ok(i - 1)
    }

    /// Allocates a fresh index, or — with `auto_remove` enabled and the
    /// table full — evicts the lowest-weight entry to make room.
    /// `initial_state` is pushed oldest-bit-first once the index is
    /// validated.
    pub fn insert(&mut self, initial_state: &[bool]) -> Result<usize> {
        if initial_state.len() > self.history.length() {
            return Err(BhptError::InvalidArgument(format!(
                "initial_state has {} bits, history_length is {}",
                initial_state.len(),
                self.history.length()
            )));
        }

        let index = match self.free_list.pop() {
            Some(e) => e,
            None if self.config.auto_remove => self.evict_lowest_weight()?,
            None => {
                tracing::warn!(capacity = self.config.capacity, "insert failed: table is full");
                return Err(BhptError::NoCapacity);
            }
        };

        self.validity.set(index);
        self.history.clear(index);
        self.valid_count += 1;
        self.dist_stale = true;
        if self.config.defer {
            self.dirty_entries.set(index);
        } else {
            self.recompute_weight(index);
            self.dirty_entries.clear(index);
        }

        for &bit in initial_state {
            self.push(index, bit)?;
        }

        Ok(index)
    }

    /// Idempotent: removing an already-free index is a no-op.
    pub fn remove(&mut self, index: usize) -> Result<()> {
        self.check_index(index)?;
        if !self.validity.get(index) {
            return Ok(());
        }
        self.invalidate(index);
        self.free_list.push(index);
        Ok(())
    }

    /// `-1` disables the Minimal Weight State Position floor; otherwise
    /// `m` must lie in `[0, consideration_depth)`.
    pub fn set_mwsp(&mut self, m: i32) -> Result<()> {
        if m < -1 || m >= self.weight_engine.consideration_depth() as i32 {
            return Err(BhptError::InvalidArgument(format!(
                "mwsp must satisfy -1 <= m < {}, got {}",
                self.weight_engine.consideration_depth(),
                m
            )));
        }
        self.config.mwsp = m;
        self.weight_engine.set_mwsp(m);
        tracing::debug!(mwsp = m, "mwsp reconfigured");
        self.mark_all_valid_dirty();
        Ok(())
    }

    /// Toggling `defer` changes the cost schedule of subsequent pushes,
    /// not any weight already computed.
    pub fn set_defer(&mut self, defer: bool) {
        self.config.defer = defer;
    }

    // ---- internals ------------------------------------------------------

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.config.capacity {
            return Err(BhptError::InvalidIndex(index));
        }
        Ok(())
    }

    fn recompute_weight(&mut self, index: usize) {
        let n = self.weight_engine.consideration_depth();
        let bits: Vec<bool> = (0..n).map(|pos| self.history.bit_at(index, pos)).collect();
        self.weights[index] = self.weight_engine.compute(&bits);
    }

    fn recompute_all_dirty(&mut self) {
        for index in 0..self.config.capacity {
            if self.dirty_entries.get(index) {
                self.recompute_weight(index);
                self.dirty_entries.clear(index);
            }
        }
    }

    /// Marks every valid entry dirty (the weight function itself changed).
    /// In eager mode this recomputes immediately, matching the eager
    /// contract that weights are never observably stale between calls; in
    /// deferred mode recomputation is left for the next `select`/auto-evict.
    fn mark_all_valid_dirty(&mut self) {
        for index in 0..self.config.capacity {
            if self.validity.get(index) {
                self.dirty_entries.set(index);
            }
        }
        self.dist_stale = true;
        if !self.config.defer {
            self.recompute_all_dirty();
        }
    }

    fn rebuild_distribution(&mut self) {
        if self.config.defer {
            self.recompute_all_dirty();
        }
        self.cumulative.clear();
        self.cumulative.push(0.0);
        let mut acc = 0.0;
        for &w in &self.weights {
            acc += w;
            self.cumulative.push(acc);
        }
        self.total_weight = acc;
        self.dist_stale = false;
    }

    fn invalidate(&mut self, index: usize) {
        self.validity.clear(index);
        self.history.clear(index);
        self.weights[index] = 0.0;
        self.dirty_entries.clear(index);
        self.valid_count -= 1;
        self.dist_stale = true;
    }

    fn evict_lowest_weight(&mut self) -> Result<usize> {
        self.recompute_all_dirty();
        if self.valid_count == 0 {
            return Err(BhptError::NoCapacity);
        }

        let min_weight = (0..self.config.capacity)
            .filter(|&i| self.validity.get(i))
            .map(|i| self.weights[i])
            .fold(f64::INFINITY, f64::min);

        let candidates: Vec<usize> = (0..self.config.capacity)
            .filter(|&i| self.validity.get(i) && self.weights[i] == min_weight)
            .collect();

        let chosen = *candidates
            .choose(&mut self.rng)
            .expect("valid_count > 0 guarantees at least one candidate");

        tracing::debug!(index = chosen, weight = min_weight, "auto-evicting lowest-weight entry");
        self.invalidate(chosen);
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(capacity: usize, length: usize) -> BhptTable {
        BhptTable::new(BhptConfig::new(capacity, length).with_seed(42)).unwrap()
    }

    #[test]
    fn s1_shift_semantics_and_weight() {
        let mut t = table(2, 4);
        let e = t.insert(&[]).unwrap();
        assert_eq!(e, 0);
        for bit in [true, false, true, true, false] {
            t.push(e, bit).unwrap();
        }
        assert_eq!(t.history_of(e).unwrap(), vec![false, true, true, false]);

        let expected = 2f64.powf(1.5) + 2f64.powf(3.0);
        t.select().ok(); // force a distribution rebuild
        let w = t.cumulative[1] - t.cumulative[0];
        assert!((w - expected).abs() < 1e-6);
    }

    #[test]
    fn s2_zero_weight_rejection() {
        let mut t = table(3, 8);
        t.insert(&[]).unwrap();
        t.insert(&[]).unwrap();
        t.insert(&[]).unwrap();
        assert_eq!(t.select(), Err(BhptError::NoSelectableEntry));
    }

    #[test]
    fn s3_mwsp_rescue_gives_uniform_selection() {
        let mut t = BhptTable::new(
            BhptConfig::new(3, 8)
                .with_mwsp(7)
                .with_seed(7),
        )
        .unwrap();
        t.insert(&[]).unwrap();
        t.insert(&[]).unwrap();
        t.insert(&[]).unwrap();

        let mut counts = [0u32; 3];
        for _ in 0..6000 {
            let e = t.select().unwrap();
            counts[e] += 1;
        }
        for c in counts {
            let freq = c as f64 / 6000.0;
            assert!((freq - 1.0 / 3.0).abs() < 0.03, "frequency {freq} too far from 1/3");
        }
    }

    #[test]
    fn s4_auto_evict_lowest() {
        let mut t = BhptTable::new(
            BhptConfig::new(2, 4).with_auto_remove(true).with_seed(1),
        )
        .unwrap();
        let a = t.insert(&[]).unwrap();
        let b = t.insert(&[]).unwrap();
        assert_eq!((a, b), (0, 1));

        for bit in [true, true, true, true] {
            t.push(a, bit).unwrap();
        }
        for bit in [false, false, false, true] {
            t.push(b, bit).unwrap();
        }

        let reused = t.insert(&[]).unwrap();
        assert_eq!(reused, b);
        assert!(t.is_valid(a).unwrap());
    }

    #[test]
    fn s5_defer_equivalence() {
        let seed = 123;
        let bits: Vec<(usize, bool)> = (0..200)
            .map(|i| (i % 10, (i * 2654435761u64 as usize) % 2 == 0))
            .collect();

        let mut eager = BhptTable::new(BhptConfig::new(10, 16).with_seed(seed)).unwrap();
        let mut deferred =
            BhptTable::new(BhptConfig::new(10, 16).with_defer(true).with_seed(seed)).unwrap();
        for i in 0..10 {
            eager.insert(&[]).unwrap();
            deferred.insert(&[]).unwrap();
        }

        for &(e, bit) in &bits {
            eager.push(e, bit).unwrap();
            deferred.push(e, bit).unwrap();
        }

        eager.select().unwrap();
        deferred.select().unwrap();
        assert_eq!(eager.weights, deferred.weights);
        assert_eq!(eager.cumulative, deferred.cumulative);
    }

    #[test]
    fn s6_repeated_select_does_no_recompute_without_intervening_push() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        #[derive(Debug)]
        struct CountingWeight(Arc<AtomicUsize>);
        impl WeightFn for CountingWeight {
            fn weight(&self, bits: &[bool], mwsp: i32, coeffs: &[f64]) -> f64 {
                self.0.fetch_add(1, Ordering::SeqCst);
                ShiftRegisterWeight.weight(bits, mwsp, coeffs)
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let mut t = BhptTable::with_weight_fn(
            BhptConfig::new(2, 4).with_seed(9),
            Box::new(CountingWeight(calls.clone())),
        )
        .unwrap();
        let e = t.insert(&[]).unwrap();
        t.push(e, true).unwrap();

        t.select().unwrap();
        let before = calls.load(Ordering::SeqCst);

        // A second select with no intervening push must not touch the
        // weight function again.
        t.select().unwrap();
        let after = calls.load(Ordering::SeqCst);
        assert_eq!(before, after, "select() recomputed weights with nothing dirty");
    }

    #[test]
    fn determinism_same_seed_same_sequence_same_selections() {
        fn run(seed: u64) -> Vec<usize> {
            let mut t = BhptTable::new(BhptConfig::new(4, 6).with_seed(seed)).unwrap();
            for _ in 0..4 {
                t.insert(&[]).unwrap();
            }
            for e in 0..4 {
                t.push(e, true).unwrap();
            }
            (0..50).map(|_| t.select().unwrap()).collect()
        }
        assert_eq!(run(999), run(999));
    }

    #[test]
    fn remove_is_idempotent() {
        let mut t = table(2, 4);
        let e = t.insert(&[]).unwrap();
        t.remove(e).unwrap();
        t.remove(e).unwrap();
        assert!(!t.is_valid(e).unwrap());
    }

    #[test]
    fn invalid_index_is_an_error_for_reads_and_writes() {
        let t = table(2, 4);
        assert_eq!(t.history_of(5), Err(BhptError::InvalidIndex(5)));
        let mut t = t;
        assert_eq!(t.push(5, true), Err(BhptError::InvalidIndex(5)));
    }

    #[test]
    fn push_on_free_index_implicitly_validates_it() {
        let mut t = table(2, 4);
        assert!(!t.is_valid(0).unwrap());
        t.push(0, true).unwrap();
        assert!(t.is_valid(0).unwrap());
        assert_eq!(t.history_of(0).unwrap()[0], true);
    }

    #[test]
    fn implicit_validation_via_push_removes_index_from_free_list() {
        // A later insert() must not be able to reclaim an index that was
        // implicitly validated by push() without ever going through insert().
        let mut t = table(2, 4);
        t.push(0, true).unwrap();
        assert_eq!(t.valid_count(), 1);

        let e = t.insert(&[]).unwrap();
        assert_eq!(e, 1, "insert must not hand out the already-valid index 0");
        assert_eq!(t.valid_count(), 2);
        // index 0's history must survive untouched.
        assert_eq!(t.history_of(0).unwrap(), vec![true, false, false, false]);
    }

    #[test]
    fn invalid_entry_history_reads_as_all_zero() {
        let mut t = table(2, 4);
        let e = t.insert(&[]).unwrap();
        t.push(e, true).unwrap();
        t.remove(e).unwrap();
        assert_eq!(t.history_of(e).unwrap(), vec![false; 4]);
    }

    #[test]
    fn insert_without_capacity_or_auto_remove_fails() {
        let mut t = table(1, 4);
        t.insert(&[]).unwrap();
        assert_eq!(t.insert(&[]), Err(BhptError::NoCapacity));
    }

    #[test]
    fn zero_capacity_table_always_fails_to_insert() {
        let mut t = BhptTable::new(BhptConfig::new(0, 4).with_auto_remove(true)).unwrap();
        assert_eq!(t.insert(&[]), Err(BhptError::NoCapacity));
    }

    #[test]
    fn set_mwsp_rejects_out_of_range_values() {
        let mut t = table(2, 4);
        assert!(t.set_mwsp(4).is_err());
        assert!(t.set_mwsp(-2).is_err());
        assert!(t.set_mwsp(3).is_ok());
    }

    #[test]
    fn initial_state_is_pushed_oldest_to_newest() {
        let mut t = table(1, 4);
        let e = t.insert(&[true, false, true]).unwrap();
        // last element of initial_state is the most recent push
        assert_eq!(t.history_of(e).unwrap(), vec![true, false, true, false]);
    }
}
