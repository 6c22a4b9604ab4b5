use std::cell::{Cell, RefCell};
use std::fmt::Debug;

use log::debug;

use crate::cache::OpCache;
use crate::reference::Ref;

/// Sizing knobs for the [`Store`]. All sizes are powers of two.
#[derive(Debug, Copy, Clone)]
pub struct StoreConfig {
    /// Initial node capacity (log2).
    pub objs_log: usize,
    /// Maximum node capacity (log2); growth stops here.
    pub objs_max_log: usize,
    /// Unique-table density: buckets = capacity << density.
    pub unique_density_log: usize,
    /// Initial operation-cache size (log2).
    pub cache_log: usize,
    /// Maximum operation-cache size (log2).
    pub cache_max_log: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            objs_log: 15,
            objs_max_log: 20,
            unique_density_log: 1,
            cache_log: 15,
            cache_max_log: 20,
        }
    }
}

// Repeating single-word patterns for the first six variables.
const VAR_WORDS: [u64; 6] = [
    0xaaaa_aaaa_aaaa_aaaa,
    0xcccc_cccc_cccc_cccc,
    0xf0f0_f0f0_f0f0_f0f0,
    0xff00_ff00_ff00_ff00,
    0xffff_0000_ffff_0000,
    0xffff_ffff_0000_0000,
];

/// The Boolean Function Store: a hash-consed, reference-counted truth-table
/// manager over a fixed set of input variables.
///
/// Every function is a bit vector over all `2^max(nvars, 6)` assignments,
/// canonicalized by polarity (the all-false assignment evaluates to 0 in the
/// stored table; the complement lives in the [`Ref`] sign). Hash-consing makes
/// function equality a `Ref` comparison, which the optimization engine relies
/// on to detect that a rewrite changed nothing.
///
/// [`Store::and`] may grow the arena or run a garbage-collection sweep as a
/// side effect; callers must hold a reference (`inc_ref`) on any intermediate
/// result they need across further store calls.
pub struct Store {
    nvars: usize,
    /// Words per table.
    nwords: usize,
    /// Next never-used node index.
    nobjs: Cell<usize>,
    capacity: Cell<usize>,
    max_objs: usize,
    /// Number of live (allocated, not freed) nodes.
    live: Cell<usize>,
    vals: RefCell<Vec<u64>>,
    nexts: RefCell<Vec<usize>>,
    refs: RefCell<Vec<u16>>,
    one_counts: RefCell<Vec<u64>>,
    buckets: RefCell<Vec<usize>>,
    bucket_mask: Cell<usize>,
    /// Head of the freed-slot list, threaded through `nexts`. 0 = empty.
    removed_head: Cell<usize>,
    cache: RefCell<OpCache>,
    tmp: RefCell<Vec<u64>>,
}

impl Store {
    pub fn new(nvars: usize, config: StoreConfig) -> Self {
        assert!(
            config.objs_max_log >= config.objs_log,
            "max capacity must not be smaller than initial capacity"
        );
        let capacity = 1usize << config.objs_log;
        assert!(
            capacity > nvars + 2,
            "initial capacity must exceed the variable count"
        );
        let nwords = if nvars >= 6 { 1 << (nvars - 6) } else { 1 };
        let bucket_len = capacity << config.unique_density_log;

        let store = Self {
            nvars,
            nwords,
            nobjs: Cell::new(1),
            capacity: Cell::new(capacity),
            max_objs: 1 << config.objs_max_log,
            live: Cell::new(0),
            vals: RefCell::new(vec![0; capacity * nwords]),
            nexts: RefCell::new(vec![0; capacity]),
            refs: RefCell::new(vec![0; capacity]),
            one_counts: RefCell::new(vec![0; capacity]),
            buckets: RefCell::new(vec![0; bucket_len]),
            bucket_mask: Cell::new(bucket_len - 1),
            removed_head: Cell::new(0),
            cache: RefCell::new(OpCache::new(config.cache_log, config.cache_max_log)),
            tmp: RefCell::new(vec![0; nwords]),
        };

        // Node 1 is the constant-false table.
        let zero = store.unique_create();
        assert_eq!(zero, store.zero());

        // Variable tables: bit `a` of the table is bit `v` of assignment `a`.
        for v in 0..nvars {
            {
                let mut tmp = store.tmp.borrow_mut();
                for (j, w) in tmp.iter_mut().enumerate() {
                    *w = if v < 6 {
                        VAR_WORDS[v]
                    } else if (j >> (v - 6)) & 1 != 0 {
                        u64::MAX
                    } else {
                        0
                    };
                }
            }
            let x = store.unique_create();
            assert_eq!(x.index(), v + 2);
        }

        // Pin the constant and the variables.
        {
            let mut refs = store.refs.borrow_mut();
            for a in 1..=nvars + 1 {
                refs[a] = u16::MAX;
            }
        }

        store
    }

    pub fn num_vars(&self) -> usize {
        self.nvars
    }
    /// Number of live nodes, constants and variables included.
    pub fn num_nodes(&self) -> usize {
        self.live.get()
    }
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub const fn zero(&self) -> Ref {
        Ref::new(1)
    }
    pub const fn one(&self) -> Ref {
        Ref::new(-1)
    }
    pub fn ith_var(&self, v: usize) -> Ref {
        assert!(v < self.nvars, "variable {} out of range", v);
        Ref::new((v + 2) as i32)
    }

    pub fn is_zero(&self, x: Ref) -> bool {
        x == self.zero()
    }
    pub fn is_one(&self, x: Ref) -> bool {
        x == self.one()
    }

    /// Conditional complement: `x` if `c` is false, `NOT x` otherwise.
    pub fn lit_cond(&self, x: Ref, c: bool) -> Ref {
        if c {
            -x
        } else {
            x
        }
    }

    /// Number of satisfying assignments (out of `2^max(nvars, 6)`).
    pub fn one_count(&self, x: Ref) -> u64 {
        let count = self.one_counts.borrow()[x.index()];
        if x.is_negated() {
            (self.nwords as u64 * 64) - count
        } else {
            count
        }
    }

    pub fn inc_ref(&self, x: Ref) {
        if x.is_none() {
            return;
        }
        let mut refs = self.refs.borrow_mut();
        let r = &mut refs[x.index()];
        if *r != u16::MAX {
            *r += 1;
        }
    }

    pub fn dec_ref(&self, x: Ref) {
        if x.is_none() {
            return;
        }
        let mut refs = self.refs.borrow_mut();
        let r = &mut refs[x.index()];
        if *r != u16::MAX {
            debug_assert!(*r > 0, "dec_ref on node {} with zero count", x.index());
            *r -= 1;
        }
    }

    pub fn num_refs(&self, x: Ref) -> u16 {
        self.refs.borrow()[x.index()]
    }
}

// The single cached binary operator.
impl Store {
    pub fn and(&self, x: Ref, y: Ref) -> Ref {
        if self.is_zero(x) || self.is_one(y) {
            return x;
        }
        if self.is_one(x) || self.is_zero(y) {
            return y;
        }
        if x.index() == y.index() {
            return if x == y { x } else { self.zero() };
        }
        // Commutative: canonicalize the operand order for the cache.
        let (x, y) = if x.get() > y.get() { (y, x) } else { (x, y) };
        if let Some(z) = self.cache.borrow_mut().lookup(x, y) {
            return z;
        }
        {
            let vals = self.vals.borrow();
            let mut tmp = self.tmp.borrow_mut();
            let xc = if x.is_negated() { u64::MAX } else { 0 };
            let yc = if y.is_negated() { u64::MAX } else { 0 };
            let xw = &vals[self.nwords * x.index()..self.nwords * (x.index() + 1)];
            let yw = &vals[self.nwords * y.index()..self.nwords * (y.index() + 1)];
            for j in 0..self.nwords {
                tmp[j] = (xw[j] ^ xc) & (yw[j] ^ yc);
            }
        }
        let z = self.unique_create();
        self.cache.borrow_mut().insert(x, y, z);
        z
    }

    pub fn not(&self, x: Ref) -> Ref {
        -x
    }

    pub fn or(&self, x: Ref, y: Ref) -> Ref {
        -self.and(-x, -y)
    }

    pub fn xor(&self, x: Ref, y: Ref) -> Ref {
        let a = self.and(x, -y);
        self.inc_ref(a);
        let b = self.and(-x, y);
        self.inc_ref(b);
        let z = self.or(a, b);
        self.dec_ref(a);
        self.dec_ref(b);
        z
    }

    pub fn and_many(&self, nodes: impl IntoIterator<Item = Ref>) -> Ref {
        let mut res = self.one();
        for x in nodes {
            self.inc_ref(res);
            let next = self.and(res, x);
            self.dec_ref(res);
            res = next;
        }
        res
    }
}

// Unique table.
impl Store {
    fn hash_words(&self, words: &[u64]) -> usize {
        let mut h: u64 = 0;
        for &w in words {
            h ^= w.wrapping_mul(0x9e37_79b9_7f4a_7c15);
            h = h.rotate_left(27);
        }
        h ^= h >> 32;
        (h as usize) & self.bucket_mask.get()
    }

    /// Intern the table currently in `tmp`, canonicalizing its polarity.
    fn unique_create(&self) -> Ref {
        let compl = {
            let mut tmp = self.tmp.borrow_mut();
            let compl = tmp[0] & 1 != 0;
            if compl {
                for w in tmp.iter_mut() {
                    *w ^= u64::MAX;
                }
            }
            compl
        };
        let a = match self.unique_create_int() {
            Some(a) => a,
            None => {
                if !self.grow() && !self.collect_garbage() {
                    panic!("out of nodes (max capacity reached, nothing to collect)");
                }
                self.unique_create_int()
                    .unwrap_or_else(|| panic!("out of nodes (max capacity reached)"))
            }
        };
        let x = Ref::new(a as i32);
        if compl {
            -x
        } else {
            x
        }
    }

    fn unique_create_int(&self) -> Option<usize> {
        let bucket = {
            let tmp = self.tmp.borrow();
            self.hash_words(&tmp)
        };
        // Search the chain for an existing node with this table.
        {
            let tmp = self.tmp.borrow();
            let vals = self.vals.borrow();
            let nexts = self.nexts.borrow();
            let mut a = self.buckets.borrow()[bucket];
            while a != 0 {
                if vals[self.nwords * a..self.nwords * (a + 1)] == tmp[..] {
                    return Some(a);
                }
                a = nexts[a];
            }
        }
        // Allocate a slot: a fresh one, else a freed one.
        let a = if self.nobjs.get() < self.capacity.get() {
            let a = self.nobjs.get();
            self.nobjs.set(a + 1);
            a
        } else if self.removed_head.get() != 0 {
            let a = self.removed_head.get();
            self.removed_head.set(self.nexts.borrow()[a]);
            a
        } else {
            return None;
        };
        {
            let tmp = self.tmp.borrow();
            let mut vals = self.vals.borrow_mut();
            let mut one_counts = self.one_counts.borrow_mut();
            vals[self.nwords * a..self.nwords * (a + 1)].copy_from_slice(&tmp);
            one_counts[a] = tmp.iter().map(|w| w.count_ones() as u64).sum();
        }
        // Insert at the head of the chain.
        {
            let mut buckets = self.buckets.borrow_mut();
            let mut nexts = self.nexts.borrow_mut();
            nexts[a] = buckets[bucket];
            buckets[bucket] = a;
        }
        self.live.set(self.live.get() + 1);
        Some(a)
    }

    /// Double the node arena and split the unique-table buckets.
    /// Node ids are stable across growth.
    fn grow(&self) -> bool {
        if self.capacity.get() == self.max_objs {
            return false;
        }
        let capacity = self.capacity.get() << 1;
        debug!("reallocating {} nodes", capacity);
        self.capacity.set(capacity);
        self.vals.borrow_mut().resize(capacity * self.nwords, 0);
        self.nexts.borrow_mut().resize(capacity, 0);
        self.refs.borrow_mut().resize(capacity, 0);
        self.one_counts.borrow_mut().resize(capacity, 0);

        let old_len = self.buckets.borrow().len();
        debug!("reallocating {} unique table entries", old_len << 1);
        self.buckets.borrow_mut().resize(old_len << 1, 0);
        self.bucket_mask.set((old_len << 1) - 1);
        // Power-of-two doubling: every node either stays in its bucket or
        // moves to bucket + old_len.
        let vals = self.vals.borrow();
        let mut buckets = self.buckets.borrow_mut();
        let mut nexts = self.nexts.borrow_mut();
        for b in 0..old_len {
            let mut a = buckets[b];
            buckets[b] = 0;
            while a != 0 {
                let next = nexts[a];
                let h = self.hash_words(&vals[self.nwords * a..self.nwords * (a + 1)]);
                nexts[a] = buckets[h];
                buckets[h] = a;
                a = next;
            }
        }
        true
    }

    /// Sweep every unique-table chain, unlinking nodes whose reference count
    /// is zero onto the free list. Clears the operation cache (its entries
    /// may reference freed slots). Returns true if anything was freed.
    pub fn collect_garbage(&self) -> bool {
        debug!("garbage collect");
        let mut freed = false;
        {
            let refs = self.refs.borrow();
            let mut buckets = self.buckets.borrow_mut();
            let mut nexts = self.nexts.borrow_mut();
            let mut removed = self.removed_head.get();
            let mut live = self.live.get();
            let mut free = |a: usize, nexts: &mut Vec<usize>| {
                nexts[a] = removed;
                removed = a;
                live -= 1;
                freed = true;
            };
            for b in 0..buckets.len() {
                // Drop the dead run at the head of the chain.
                let mut head = buckets[b];
                while head != 0 && refs[head] == 0 {
                    let next = nexts[head];
                    free(head, &mut nexts);
                    head = next;
                }
                buckets[b] = head;
                // Then unlink dead nodes behind each survivor.
                let mut prev = head;
                while prev != 0 {
                    let mut cur = nexts[prev];
                    while cur != 0 && refs[cur] == 0 {
                        let next = nexts[cur];
                        free(cur, &mut nexts);
                        cur = next;
                    }
                    nexts[prev] = cur;
                    prev = cur;
                }
            }
            self.removed_head.set(removed);
            self.live.set(live);
        }
        self.cache.borrow_mut().clear();
        freed
    }
}

impl Store {
    /// Render the full truth table of `x` (most significant assignment first).
    pub fn to_bits_string(&self, x: Ref) -> String {
        let vals = self.vals.borrow();
        let c = if x.is_negated() { u64::MAX } else { 0 };
        let mut s = String::new();
        for j in (0..self.nwords).rev() {
            s.push_str(&format!("{:064b}", vals[self.nwords * x.index() + j] ^ c));
        }
        s
    }
}

impl Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("nvars", &self.nvars)
            .field("capacity", &self.capacity.get())
            .field("live", &self.live.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn store(nvars: usize) -> Store {
        Store::new(nvars, StoreConfig::default())
    }

    #[test]
    fn test_constants() {
        let s = store(2);
        assert!(s.is_zero(s.zero()));
        assert!(s.is_one(s.one()));
        assert_eq!(s.zero(), -s.one());
        assert_eq!(s.one_count(s.zero()), 0);
        assert_eq!(s.one_count(s.one()), 64);
    }

    #[test]
    fn test_vars() {
        let s = store(3);
        let a = s.ith_var(0);
        let b = s.ith_var(1);
        assert_ne!(a, b);
        assert_eq!(s.one_count(a), 32);
        assert_eq!(s.one_count(-a), 32);
        assert_eq!(s.and(a, a), a);
        assert_eq!(s.and(a, -a), s.zero());
    }

    #[test]
    fn test_and_identities() {
        let s = store(2);
        let a = s.ith_var(0);
        let b = s.ith_var(1);
        assert_eq!(s.and(a, s.one()), a);
        assert_eq!(s.and(s.one(), b), b);
        assert_eq!(s.and(a, s.zero()), s.zero());
        assert_eq!(s.and(s.zero(), b), s.zero());
        assert_eq!(s.and(a, b), s.and(b, a));
    }

    #[test]
    fn test_hash_consing() {
        let s = store(4);
        let a = s.ith_var(0);
        let b = s.ith_var(1);
        let c = s.ith_var(2);
        let ab = s.and(a, b);
        s.inc_ref(ab);
        let bc = s.and(b, c);
        s.inc_ref(bc);
        // Same function through different call sequences: same node.
        assert_eq!(s.and(ab, c), s.and(a, bc));
        s.dec_ref(ab);
        s.dec_ref(bc);
    }

    #[test]
    fn test_de_morgan() {
        let s = store(2);
        let a = s.ith_var(0);
        let b = s.ith_var(1);
        assert_eq!(-s.and(a, b), s.or(-a, -b));
        assert_eq!(-s.or(a, b), s.and(-a, -b));
    }

    #[test]
    fn test_xor() {
        let s = store(2);
        let a = s.ith_var(0);
        let b = s.ith_var(1);
        let x = s.xor(a, b);
        assert_eq!(s.one_count(x), 32);
        assert_eq!(s.xor(x, b), a);
        assert_eq!(s.xor(a, a), s.zero());
        assert_eq!(s.xor(a, -a), s.one());
    }

    #[test]
    fn test_wide_tables() {
        let s = store(8);
        let mut acc = s.one();
        for v in 0..8 {
            s.inc_ref(acc);
            let next = s.and(acc, s.ith_var(v));
            s.dec_ref(acc);
            acc = next;
        }
        // The full minterm has exactly one satisfying assignment.
        assert_eq!(s.one_count(acc), 1);
        assert_eq!(s.one_count(-acc), 255);
    }

    #[test]
    fn test_garbage_collection() {
        let s = store(3);
        let a = s.ith_var(0);
        let b = s.ith_var(1);
        let keep = s.and(a, b);
        s.inc_ref(keep);
        let dead = s.and(a, -b);
        assert_eq!(s.num_refs(dead), 0);
        let before = s.num_nodes();
        assert!(s.collect_garbage());
        assert!(s.num_nodes() < before);
        // The kept node survives and interning the dead one again works.
        assert_eq!(s.and(a, b), keep);
        let again = s.and(a, -b);
        assert_eq!(s.one_count(again), s.one_count(a) / 2);
        s.dec_ref(keep);
    }

    #[test]
    fn test_grow() {
        let config = StoreConfig {
            objs_log: 3,
            objs_max_log: 10,
            ..StoreConfig::default()
        };
        let s = Store::new(3, config);
        let mut held = Vec::new();
        // Distinct minterms of three variables: forces a capacity doubling.
        for m in 0..8u32 {
            let cube = s.and_many((0..3).map(|v| {
                let x = s.ith_var(v);
                s.lit_cond(x, (m >> v) & 1 == 0)
            }));
            s.inc_ref(cube);
            held.push(cube);
        }
        assert!(s.capacity() > 8);
        assert_eq!(held.iter().map(|&x| s.one_count(x)).sum::<u64>(), 64);
    }

    #[test]
    #[should_panic(expected = "out of nodes")]
    fn test_out_of_nodes() {
        let config = StoreConfig {
            objs_log: 3,
            objs_max_log: 4,
            ..StoreConfig::default()
        };
        let s = Store::new(3, config);
        // Hold a reference on every distinct function we can reach; with at
        // most 16 slots this must exhaust the store.
        let mut frontier = vec![s.ith_var(0), s.ith_var(1), s.ith_var(2)];
        loop {
            let mut next = Vec::new();
            for &x in &frontier {
                for &y in &frontier {
                    let z = s.and(x, -y);
                    s.inc_ref(z);
                    next.push(z);
                }
            }
            frontier = next;
        }
    }
}
