use log::debug;

use crate::reference::Ref;
use crate::utils::pairing2;

#[derive(Copy, Clone)]
struct Entry {
    x: Ref,
    y: Ref,
    z: Ref,
}

impl Entry {
    const EMPTY: Entry = Entry {
        x: Ref::none(),
        y: Ref::none(),
        z: Ref::none(),
    };
}

/// Direct-mapped memo for the store's binary AND.
///
/// The table starts at `2^size_log` entries and doubles whenever the observed
/// hit rate improves across successive lookup epochs, up to `2^max_log`.
/// Garbage collection in the store invalidates node ids held here, so the
/// whole table is cleared wholesale at that point.
pub struct OpCache {
    entries: Vec<Entry>,
    mask: u64,
    max_size: usize,
    lookups: u64,
    hits: u64,
    threshold: u64,
    hit_rate: f64,
}

fn key(x: Ref, y: Ref) -> u64 {
    pairing2(x.get() as u32 as u64, y.get() as u32 as u64)
}

impl OpCache {
    /// Create a cache of `2^size_log` entries growable to `2^max_log`.
    pub fn new(size_log: usize, max_log: usize) -> Self {
        assert!(
            max_log >= size_log,
            "cache max must not be smaller than cache size"
        );
        assert!(max_log <= 31, "cache bits should be in the range 0..=31");

        let size = 1usize << size_log;
        let max_size = 1usize << max_log;
        debug!("allocating {} cache entries", size);

        Self {
            entries: vec![Entry::EMPTY; size],
            mask: (size - 1) as u64,
            max_size,
            lookups: 0,
            hits: 0,
            // An epoch ends after as many lookups as there are entries;
            // disabled once the table cannot grow.
            threshold: if size == max_size { 0 } else { size as u64 },
            hit_rate: 1.0,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }
    pub fn lookups(&self) -> u64 {
        self.lookups
    }
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn lookup(&mut self, x: Ref, y: Ref) -> Option<Ref> {
        self.lookups += 1;
        if self.threshold != 0 && self.lookups > self.threshold {
            let rate = self.hits as f64 / self.lookups as f64;
            debug!(
                "cache epoch: hits = {}, lookups = {}, rate = {:.4}",
                self.hits, self.lookups, rate
            );
            if rate > self.hit_rate {
                self.grow();
            }
            if self.entries.len() == self.max_size {
                self.threshold = u64::MAX;
            } else {
                self.threshold <<= 1;
            }
            self.hit_rate = rate;
        }
        let i = (key(x, y) & self.mask) as usize;
        let e = &self.entries[i];
        if e.x == x && e.y == y {
            self.hits += 1;
            return Some(e.z);
        }
        None
    }

    pub fn insert(&mut self, x: Ref, y: Ref, z: Ref) {
        let i = (key(x, y) & self.mask) as usize;
        self.entries[i] = Entry { x, y, z };
    }

    /// Wipe every entry. Required after garbage collection: stale entries
    /// would reference freed slots.
    pub fn clear(&mut self) {
        self.entries.fill(Entry::EMPTY);
    }

    fn grow(&mut self) {
        let old_size = self.entries.len();
        let size = old_size << 1;
        debug!("reallocating {} cache entries", size);
        self.entries.resize(size, Entry::EMPTY);
        self.mask = (size - 1) as u64;
        for j in 0..old_size {
            let e = self.entries[j];
            if !e.x.is_none() || !e.y.is_none() {
                let i = (key(e.x, e.y) & self.mask) as usize;
                if i != j {
                    self.entries[i] = e;
                    self.entries[j] = Entry::EMPTY;
                }
            }
        }
    }
}
