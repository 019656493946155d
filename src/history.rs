//! Bit-packed shift-register history storage.
//!
//! Each row is `L` bits realized as logical-head rotation: a per-row head
//! index tracks where "age 0" currently lives, so `shift_in` is O(1)
//! regardless of `L` instead of the O(L) cost a physical left-shift would
//! pay on every push. Both strategies are equivalent from the outside; see
//! the read-position contract on [`HistoryStore::bit_at`].

#[derive(Debug, Clone)]
struct Row {
    words: Vec<u64>,
    /// Bit index that the *next* `shift_in` will write to.
    head: usize,
}

impl Row {
    fn new(length: usize) -> Self {
        let word_count = (length + 63) / 64;
        Self {
            words: vec![0u64; word_count],
            head: 0,
        }
    }

    #[inline]
    fn get(&self, idx: usize) -> bool {
        (self.words[idx / 64] >> (idx % 64)) & 1 != 0
    }

    #[inline]
    fn set(&mut self, idx: usize, bit: bool) {
        let word = &mut self.words[idx / 64];
        if bit {
            *word |= 1u64 << (idx % 64);
        } else {
            *word &= !(1u64 << (idx % 64));
        }
    }

    fn clear(&mut self) {
        for w in self.words.iter_mut() {
            *w = 0;
        }
        self.head = 0;
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HistoryStore {
    rows: Vec<Row>,
    length: usize,
}

impl HistoryStore {
    pub(crate) fn new(capacity: usize, length: usize) -> Self {
        Self {
            rows: (0..capacity).map(|_| Row::new(length)).collect(),
            length,
        }
    }

    /// Pushes `bit` as the new age-0 state for row `e`, discarding the bit
    /// at age `L - 1`.
    pub(crate) fn shift_in(&mut self, e: usize, bit: bool) {
        let row = &mut self.rows[e];
        let write_idx = row.head;
        row.set(write_idx, bit);
        row.head = if row.head == 0 {
            self.length - 1
        } else {
            row.head - 1
        };
    }

    /// Reads the bit at age `pos` (`0` = most recent) of row `e`.
    #[inline]
    pub(crate) fn bit_at(&self, e: usize, pos: usize) -> bool {
        debug_assert!(pos < self.length);
        let row = &self.rows[e];
        let idx = (row.head + 1 + pos) % self.length;
        row.get(idx)
    }

    pub(crate) fn read_row(&self, e: usize) -> Vec<bool> {
        (0..self.length).map(|pos| self.bit_at(e, pos)).collect()
    }

    pub(crate) fn clear(&mut self, e: usize) {
        self.rows[e].clear();
    }

    pub(crate) fn length(&self) -> usize {
        self.length
    }
}
