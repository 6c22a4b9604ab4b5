use std::fmt::Debug;

use log::{debug, info, trace};

use crate::circuit::Circuit;
use crate::reference::Ref;
use crate::signal::Signal;
use crate::store::{Store, StoreConfig};

/// Which permissible-function annotation is currently cached on the network.
/// Switching modes invalidates every gate's cached care annotation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PfState {
    None,
    Cspf,
    Mspf,
}

/// Fanin ordering applied before redundancy checks. Cheaper fanins are
/// checked (and thus removed) last, which biases what survives.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaninSort {
    /// Keep encounter order.
    None,
    /// Fanins later in the traversal order are costlier.
    Topological,
    /// Fewer satisfying assignments of the polarity-adjusted fanin first.
    OneCountEdge,
    /// Fewer satisfying assignments of the source function first.
    OneCount,
    /// Compare the complemented count of one side against the plain count of
    /// the other. Pseudo random.
    OneCountComplement,
}

/// Optimizer configuration.
#[derive(Debug, Copy, Clone)]
pub struct Config {
    pub sort: FaninSort,
    /// Track levels/slacks and refuse rewrites that deepen the network.
    pub level_aware: bool,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sort: FaninSort::Topological,
            level_aware: false,
            store: StoreConfig::default(),
        }
    }
}

/// Retain `y`, release the old value, store `y` in the slot.
pub(crate) fn update(store: &Store, slot: &mut Ref, y: Ref) {
    store.inc_ref(y);
    store.dec_ref(*slot);
    *slot = y;
}

pub(crate) fn del_refs(store: &Store, v: &mut Vec<Ref>) {
    for &x in v.iter() {
        store.dec_ref(x);
    }
    v.clear();
}

pub(crate) fn copy_refs(store: &Store, dst: &mut Vec<Ref>, src: &[Ref]) {
    for &x in src {
        store.inc_ref(x);
    }
    for &x in dst.iter() {
        store.dec_ref(x);
    }
    dst.clear();
    dst.extend_from_slice(src);
}

/// A deep copy of the whole network state, with retained references on every
/// store function it mentions, for all-or-nothing rollback.
#[derive(Default)]
pub struct Snapshot {
    saved: bool,
    nobjs: usize,
    state: Option<PfState>,
    objs: Vec<usize>,
    fis: Vec<Vec<Signal>>,
    fos: Vec<Vec<usize>>,
    fs: Vec<Ref>,
    gs: Vec<Ref>,
    cs: Vec<Vec<Ref>>,
    updates: Vec<bool>,
    pf_updates: Vec<bool>,
    fo_cone_shared: Vec<bool>,
    levels: Vec<usize>,
    slacks: Vec<isize>,
    max_levels: usize,
}

/// The mutable multi-fanin network under optimization.
///
/// Gates live in an arena of dense slots. Slot 0 is the constant node,
/// primary inputs follow, then the imported gates, then one single-fanin
/// slot per primary output. `objs` is the topologically ordered list of live
/// internal gates (inputs and outputs excluded).
pub struct Transduction {
    pub(crate) store: Store,
    pub(crate) nobjs: usize,
    pub(crate) pis: Vec<usize>,
    pub(crate) pos: Vec<usize>,
    pub(crate) objs: Vec<usize>,
    pub(crate) fis: Vec<Vec<Signal>>,
    pub(crate) fos: Vec<Vec<usize>>,
    /// Simulated function per gate.
    pub(crate) fs: Vec<Ref>,
    /// Global don't-care per gate.
    pub(crate) gs: Vec<Ref>,
    /// Per-fanin-edge don't-care annotations, parallel to `fis`.
    pub(crate) cs: Vec<Vec<Ref>>,
    /// Gate needs re-simulation.
    pub(crate) updates: Vec<bool>,
    /// Gate needs care recomputation.
    pub(crate) pf_updates: Vec<bool>,
    /// Gate's exact global don't-care was computed through the shared-cone
    /// path (MSPF bookkeeping).
    pub(crate) fo_cone_shared: Vec<bool>,
    /// Expected output functions, snapshotted at construction.
    pub(crate) po_fs: Vec<Ref>,
    pub(crate) state: PfState,
    pub(crate) sort: FaninSort,
    pub(crate) flevel: bool,
    pub(crate) levels: Vec<usize>,
    pub(crate) slacks: Vec<isize>,
    pub(crate) max_levels: usize,
}

impl Transduction {
    pub fn new(circuit: &Circuit, config: Config) -> Self {
        let nobjs = 1 + circuit.num_inputs() + circuit.num_gates() + circuit.num_outputs();
        let store = Store::new(circuit.num_inputs(), config.store);
        let mut t = Self {
            store,
            nobjs,
            pis: Vec::new(),
            pos: Vec::new(),
            objs: Vec::new(),
            fis: vec![Vec::new(); nobjs],
            fos: vec![Vec::new(); nobjs],
            fs: vec![Ref::none(); nobjs],
            gs: vec![Ref::none(); nobjs],
            cs: vec![Vec::new(); nobjs],
            updates: vec![false; nobjs],
            pf_updates: vec![false; nobjs],
            fo_cone_shared: vec![false; nobjs],
            po_fs: Vec::new(),
            state: PfState::None,
            sort: config.sort,
            flevel: config.level_aware,
            levels: vec![0; nobjs],
            slacks: vec![0; nobjs],
            max_levels: 0,
        };
        t.import(circuit);
        t.fs[0] = t.store.zero();
        for (v, &pi) in t.pis.clone().iter().enumerate() {
            t.fs[pi] = t.store.ith_var(v);
        }
        t.build(false);
        t.remove_const_outputs();
        for j in 0..t.pos.len() {
            let x = t.lit_fi(t.pos[j], 0);
            t.store.inc_ref(x);
            t.po_fs.push(x);
        }
        if t.flevel {
            t.max_levels = t.count_levels();
            t.compute_level();
        }
        t
    }

    pub fn state(&self) -> PfState {
        self.state
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

// Import / export.
impl Transduction {
    fn import(&mut self, circuit: &Circuit) {
        debug!("import circuit");
        let zero = self.store.zero();
        let npis = circuit.num_inputs();
        let mut v = vec![Signal::zero(); 1 + npis + circuit.num_gates()];
        for i in 0..npis {
            self.pis.push(i + 1);
            v[i + 1] = Signal::from_index(i + 1);
        }
        for (k, gate) in circuit.gates().iter().enumerate() {
            let i = npis + 1 + k;
            trace!("import gate {}", i);
            let map = |f: Signal| v[f.index()].negate_if(f.is_negated());
            if gate[0] == gate[1] {
                // AND of a literal with itself: alias, no gate created.
                v[i] = map(gate[0]);
            } else {
                for &f in gate.iter() {
                    self.connect(i, map(f), false, true, zero);
                }
                self.objs.push(i);
                v[i] = Signal::from_index(i);
            }
        }
        for (j, &out) in circuit.outputs().iter().enumerate() {
            let po = 1 + npis + circuit.num_gates() + j;
            trace!("import po {}", j);
            self.pos.push(po);
            let f = v[out.index()].negate_if(out.is_negated());
            self.connect(po, f, false, true, zero);
        }
    }

    /// Re-emit the network as a flat two-fanin circuit, folding any wide gate
    /// down to a chain of binary ANDs on the fly.
    pub fn to_circuit(&self) -> Circuit {
        let mut circuit = Circuit::new(self.pis.len());
        let mut values = vec![Signal::zero(); self.nobjs];
        for (k, &pi) in self.pis.iter().enumerate() {
            values[pi] = circuit.input(k);
        }
        for &i in &self.objs {
            assert!(self.fis[i].len() > 1, "stable gate {} with one fanin", i);
            let map = |f: Signal| values[f.index()].negate_if(f.is_negated());
            let mut r = circuit.and(map(self.fis[i][0]), map(self.fis[i][1]));
            for &f in &self.fis[i][2..] {
                r = circuit.and(r, map(f));
            }
            values[i] = r;
        }
        for &po in &self.pos {
            let f = self.fis[po][0];
            circuit.add_output(values[f.index()].negate_if(f.is_negated()));
        }
        circuit
    }
}

// Structural primitives.
impl Transduction {
    /// The polarity-adjusted simulated function of fanin `j` of gate `i`.
    pub(crate) fn lit_fi(&self, i: usize, j: usize) -> Ref {
        let f = self.fis[i][j];
        self.store.lit_cond(self.fs[f.index()], f.is_negated())
    }

    /// As `lit_fi`, reading functions from an alternative vector.
    pub(crate) fn lit_fi_with(&self, i: usize, j: usize, fs: &[Ref]) -> Ref {
        let f = self.fis[i][j];
        self.store.lit_cond(fs[f.index()], f.is_negated())
    }

    pub(crate) fn find_fi(&self, i: usize, i0: usize) -> Option<usize> {
        self.fis[i].iter().position(|f| f.index() == i0)
    }

    pub(crate) fn erase_obj(&mut self, i: usize) {
        let p = self
            .objs
            .iter()
            .position(|&x| x == i)
            .expect("gate missing from the traversal order");
        self.objs.remove(p);
    }

    /// Move every not-yet-sorted fanin source of `i` before `i` in the
    /// traversal order, recursively.
    pub(crate) fn sort_objs_rec(&mut self, i: usize) {
        let mut at = self.objs.iter().position(|&x| x == i).unwrap();
        for j in 0..self.fis[i].len() {
            let i0 = self.fis[i][j].index();
            if self.fis[i0].is_empty() {
                continue;
            }
            if let Some(p) = self.objs[at..].iter().position(|&x| x == i0) {
                if p > 0 {
                    trace!("move {} before {}", i0, i);
                    self.objs.remove(at + p);
                    self.objs.insert(at, i0);
                    self.sort_objs_rec(i0);
                    at = self.objs.iter().position(|&x| x == i).unwrap();
                }
            }
        }
    }

    pub(crate) fn connect(&mut self, i: usize, f: Signal, sort: bool, update: bool, c: Ref) {
        let i0 = f.index();
        trace!("connect {} to {}", f, i);
        assert!(
            !self.fis[i].contains(&f),
            "duplicate fanin {} of gate {}",
            f,
            i
        );
        self.fis[i].push(f);
        self.fos[i0].push(i);
        if update {
            self.updates[i] = true;
        }
        self.store.inc_ref(c);
        self.cs[i].push(c);
        if sort && !self.fos[i].is_empty() && !self.fis[i0].is_empty() {
            if let Some(at) = self.objs.iter().position(|&x| x == i) {
                if let Some(p) = self.objs[at..].iter().position(|&x| x == i0) {
                    trace!("move {} before {}", i0, i);
                    self.objs.remove(at + p);
                    self.objs.insert(at, i0);
                    self.sort_objs_rec(i0);
                }
            }
        }
    }

    pub(crate) fn disconnect(&mut self, i: usize, i0: usize, j: usize, update: bool, pf_update: bool) {
        trace!("disconnect {} from {}", self.fis[i][j], i);
        let p = self.fos[i0]
            .iter()
            .position(|&k| k == i)
            .expect("missing reciprocal fanout");
        self.fos[i0].remove(p);
        self.fis[i].remove(j);
        self.store.dec_ref(self.cs[i][j]);
        self.cs[i].remove(j);
        if update {
            self.updates[i] = true;
        }
        if pf_update {
            self.pf_updates[i0] = true;
        }
    }

    /// Detach and clear a gate with no remaining fanouts. Returns the number
    /// of wires removed. Re-removal of an already-dead slot is a no-op.
    pub(crate) fn remove(&mut self, i: usize, pf_update: bool) -> i32 {
        debug!("remove {}", i);
        assert!(
            self.fos[i].is_empty(),
            "remove of gate {} with live fanouts",
            i
        );
        for j in 0..self.fis[i].len() {
            let i0 = self.fis[i][j].index();
            let p = self.fos[i0]
                .iter()
                .position(|&k| k == i)
                .expect("missing reciprocal fanout");
            self.fos[i0].remove(p);
            if pf_update {
                self.pf_updates[i0] = true;
            }
        }
        let count = self.fis[i].len() as i32;
        self.fis[i].clear();
        self.store.dec_ref(self.fs[i]);
        self.store.dec_ref(self.gs[i]);
        self.fs[i] = Ref::none();
        self.gs[i] = Ref::none();
        let mut cs = std::mem::take(&mut self.cs[i]);
        del_refs(&self.store, &mut cs);
        self.updates[i] = false;
        self.pf_updates[i] = false;
        count
    }

    /// Redirect every fanout of `i` to the literal `f`, merging duplicate
    /// fanins where this creates one, then remove `i`. Returns the number of
    /// wires eliminated.
    pub(crate) fn replace(&mut self, i: usize, f: Signal, update: bool) -> i32 {
        debug!("replace {} by {}", i, f);
        assert_ne!(i, f.index());
        let mut count = 0;
        for j in 0..self.fos[i].len() {
            let k = self.fos[i][j];
            let l = self
                .find_fi(k, i)
                .expect("fanout without reciprocal fanin");
            let fc = f.negate_if(self.fis[k][l].is_negated());
            if self.fis[k].contains(&fc) {
                self.store.dec_ref(self.cs[k][l]);
                self.cs[k].remove(l);
                self.fis[k].remove(l);
                count += 1;
            } else {
                self.fis[k][l] = fc;
                self.fos[f.index()].push(k);
            }
            if update {
                self.updates[k] = true;
            }
        }
        self.fos[i].clear();
        self.pf_updates[f.index()] = true;
        count + self.remove(i, true)
    }

    /// Propagate a constant into every fanout of `i`, recursively simplifying
    /// fanouts that thereby become constant or single-fanin. Returns the
    /// number of wires eliminated.
    pub(crate) fn replace_by_const(&mut self, i: usize, c: bool) -> i32 {
        debug!("replace {} by constant {}", i, c);
        let mut count = 0;
        while let Some(&k) = self.fos[i].first() {
            self.fos[i].remove(0);
            let l = self
                .find_fi(k, i)
                .expect("fanout without reciprocal fanin");
            let fc = c ^ self.fis[k][l].is_negated();
            self.store.dec_ref(self.cs[k][l]);
            self.cs[k].remove(l);
            self.fis[k].remove(l);
            count += 1;
            if fc {
                if self.fis[k].len() == 1 {
                    let f = self.fis[k][0];
                    count += self.replace(k, f, true);
                } else {
                    self.updates[k] = true;
                }
            } else {
                count += self.replace_by_const(k, false);
            }
        }
        count + self.remove(i, true)
    }

    /// Find (or allocate) a free gate slot at or after `*pos`.
    pub(crate) fn new_gate(&mut self, pos: &mut usize) {
        while *pos != self.nobjs && (!self.fis[*pos].is_empty() || !self.fos[*pos].is_empty()) {
            *pos += 1;
        }
        debug!("create {}", *pos);
        if *pos == self.nobjs {
            self.nobjs += 1;
            self.fis.push(Vec::new());
            self.fos.push(Vec::new());
            self.fs.push(Ref::none());
            self.gs.push(Ref::none());
            self.cs.push(Vec::new());
            self.updates.push(false);
            self.pf_updates.push(false);
            self.fo_cone_shared.push(false);
            self.levels.push(0);
            self.slacks.push(0);
        }
    }

    /// Whether `target` is reachable from `from` through fanin edges.
    pub(crate) fn in_fi_cone(&self, from: usize, target: usize) -> bool {
        let mut seen = vec![false; self.nobjs];
        let mut stack = vec![from];
        while let Some(x) = stack.pop() {
            if x == target {
                return true;
            }
            if seen[x] {
                continue;
            }
            seen[x] = true;
            stack.extend(self.fis[x].iter().map(|f| f.index()));
        }
        false
    }

    pub(crate) fn mark_fo_cone(&self, marks: &mut [bool], i: usize) {
        let mut stack = vec![i];
        while let Some(x) = stack.pop() {
            if marks[x] {
                continue;
            }
            marks[x] = true;
            stack.extend(self.fos[x].iter().copied());
        }
    }
}

// Simulation.
impl Transduction {
    /// Recompute the simulated function of `i` in `fs`: the conjunction of
    /// its polarity-adjusted fanin functions.
    pub(crate) fn build_one_into(&self, i: usize, fs: &mut Vec<Ref>) {
        trace!("build {}", i);
        update(&self.store, &mut fs[i], self.store.one());
        for j in 0..self.fis[i].len() {
            let l = self.lit_fi_with(i, j, fs);
            let z = self.store.and(fs[i], l);
            update(&self.store, &mut fs[i], z);
        }
    }

    pub(crate) fn build_one(&mut self, i: usize) {
        let mut fs = std::mem::take(&mut self.fs);
        self.build_one_into(i, &mut fs);
        self.fs = fs;
    }

    /// Lazily re-simulate every dirty gate in traversal order, propagating
    /// the dirty flag to fanouts whose input function actually changed.
    pub(crate) fn build(&mut self, pf_update: bool) {
        debug!("build");
        let mut fs = std::mem::take(&mut self.fs);
        for idx in 0..self.objs.len() {
            let i = self.objs[idx];
            if self.updates[i] {
                let x = fs[i];
                self.store.inc_ref(x);
                self.build_one_into(i, &mut fs);
                if x != fs[i] {
                    for j in 0..self.fos[i].len() {
                        let k = self.fos[i][j];
                        self.updates[k] = true;
                    }
                }
                self.store.dec_ref(x);
            }
        }
        self.fs = fs;
        if pf_update {
            for &i in &self.objs {
                self.pf_updates[i] = self.pf_updates[i] || self.updates[i];
            }
        }
        for &i in &self.objs {
            self.updates[i] = false;
        }
        if self.flevel {
            self.compute_level();
        }
    }

    /// Force every gate dirty and rebuild; a correct lazy build must
    /// reproduce the stored functions exactly.
    pub fn build_debug(&mut self) -> bool {
        for idx in 0..self.objs.len() {
            let i = self.objs[idx];
            self.updates[i] = true;
        }
        let mut old = Vec::new();
        copy_refs(&self.store, &mut old, &self.fs);
        self.build(false);
        let r = old == self.fs;
        del_refs(&self.store, &mut old);
        r
    }

    /// Fold away primary outputs whose function is provably constant under
    /// the output's don't-care, then sweep the cones they released.
    pub(crate) fn remove_const_outputs(&mut self) {
        let zero = self.store.zero();
        let mut removed = false;
        for j in 0..self.pos.len() {
            let po = self.pos[j];
            let i0 = self.fis[po][0].index();
            if i0 == 0 {
                continue;
            }
            let l = self.lit_fi(po, 0);
            let dc = self.cs[po][0];
            if self.store.is_one(self.store.or(l, dc)) {
                debug!("constant 1 output: po {}", j);
                self.disconnect(po, i0, 0, false, false);
                self.connect(po, Signal::one(), false, false, zero);
                removed |= self.fos[i0].is_empty();
            } else if self.store.is_one(self.store.or(-l, dc)) {
                debug!("constant 0 output: po {}", j);
                self.disconnect(po, i0, 0, false, false);
                self.connect(po, Signal::zero(), false, false, zero);
                removed |= self.fos[i0].is_empty();
            }
        }
        if removed {
            debug!("remove unused");
            for idx in (0..self.objs.len()).rev() {
                let i = self.objs[idx];
                if self.fos[i].is_empty() {
                    self.remove(i, false);
                    self.objs.remove(idx);
                }
            }
        }
    }
}

// Fanin cost ordering.
impl Transduction {
    /// Whether fanin literal `a` is costlier than `b` under the configured
    /// strategy.
    fn cost_compare(&self, a: Signal, b: Signal) -> bool {
        let a0 = a.index();
        let b0 = b.index();
        if self.fis[a0].is_empty() && self.fis[b0].is_empty() {
            // Both are inputs: earlier in the input order is costlier.
            let pa = self.pis.iter().position(|&x| x == a0);
            let pb = self.pis.iter().position(|&x| x == b0);
            return match (pa, pb) {
                (Some(x), Some(y)) => y >= x,
                _ => false,
            };
        }
        if self.fis[a0].is_empty() {
            return false;
        }
        if self.fis[b0].is_empty() {
            return true;
        }
        if self.fos[a0].len() > self.fos[b0].len() {
            return false;
        }
        if self.fos[a0].len() < self.fos[b0].len() {
            return true;
        }
        match self.sort {
            FaninSort::Topological => match self.objs.iter().position(|&x| x == a0) {
                Some(x) => !self.objs[x..].contains(&b0),
                None => true,
            },
            FaninSort::OneCountEdge => {
                let fa = self.store.lit_cond(self.fs[a0], a.is_negated());
                let fb = self.store.lit_cond(self.fs[b0], b.is_negated());
                self.store.one_count(fa) < self.store.one_count(fb)
            }
            FaninSort::OneCount => self.store.one_count(self.fs[a0]) < self.store.one_count(self.fs[b0]),
            FaninSort::OneCountComplement => {
                self.store.one_count(-self.fs[a0]) < self.store.one_count(self.fs[b0])
            }
            FaninSort::None => false,
        }
    }

    /// Insertion sort of `i`'s fanins (and their annotations) by descending
    /// cost. Returns whether anything moved.
    pub(crate) fn sort_fis(&mut self, i: usize) -> bool {
        trace!("sort fanins {}", i);
        let mut sorted = false;
        for p in 1..self.fis[i].len() {
            let f = self.fis[i][p];
            let c = self.cs[i][p];
            let mut q = p;
            while q > 0 && self.cost_compare(f, self.fis[i][q - 1]) {
                self.fis[i][q] = self.fis[i][q - 1];
                self.cs[i][q] = self.cs[i][q - 1];
                q -= 1;
            }
            if q != p {
                sorted = true;
                self.fis[i][q] = f;
                self.cs[i][q] = c;
            }
        }
        sorted
    }
}

// Levels and slacks (level-aware mode).
pub(crate) fn lev_add(lev: &mut Vec<bool>, i: usize) {
    if lev.len() <= i {
        lev.resize(i + 1, false);
    }
    if !lev[i] {
        lev[i] = true;
    } else {
        lev[i] = false;
        lev_add(lev, i + 1);
    }
}

/// Whether one more fanin at level `i` still fits the counter without
/// carrying past its top.
pub(crate) fn lev_noexcess(lev: &[bool], i: usize) -> bool {
    if lev.len() <= i {
        return true;
    }
    lev[i..].iter().any(|&b| !b)
}

impl Transduction {
    fn gate_level(&self, levels: &[usize], i: usize) -> usize {
        let max = self.fis[i].iter().map(|f| levels[f.index()]).max().unwrap_or(0);
        if self.fis[i].len() <= 2 {
            max + 1
        } else {
            // Depth of the best balanced pairing: the binary counter over
            // fanin levels.
            let mut lev: Vec<bool> = Vec::new();
            for f in &self.fis[i] {
                lev_add(&mut lev, levels[f.index()]);
            }
            if lev.iter().filter(|&&b| b).count() == 1 {
                lev.len() - 1
            } else {
                lev.len()
            }
        }
    }

    pub(crate) fn compute_level(&mut self) {
        let mut levels = vec![0; self.nobjs];
        for idx in 0..self.objs.len() {
            let i = self.objs[idx];
            levels[i] = self.gate_level(&levels, i);
        }
        let mut slacks = vec![isize::MAX; self.nobjs];
        let bound = self.max_levels as isize;
        for idx in (0..self.objs.len()).rev() {
            let i = self.objs[idx];
            let mut s = isize::MAX;
            for &k in &self.fos[i] {
                let sk = if self.pos.contains(&k) {
                    bound - levels[i] as isize
                } else {
                    // Dead fanout cones keep an unconstrained slack.
                    slacks[k].saturating_add(levels[k] as isize - levels[i] as isize - 1)
                };
                s = s.min(sk);
            }
            slacks[i] = s;
        }
        self.levels = levels;
        self.slacks = slacks;
    }

    /// Maximum level over all primary outputs.
    pub fn count_levels(&self) -> usize {
        let mut levels = vec![0; self.nobjs];
        for &i in &self.objs {
            levels[i] = self.gate_level(&levels, i);
        }
        self.pos
            .iter()
            .map(|&po| levels[self.fis[po][0].index()])
            .max()
            .unwrap_or(0)
    }
}

// Counters and checks.
impl Transduction {
    pub fn count_gates(&self) -> usize {
        self.objs.len()
    }

    pub fn count_wires(&self) -> usize {
        self.objs.iter().map(|&i| self.fis[i].len()).sum()
    }

    /// Number of two-input nodes the network folds down to.
    pub fn count_nodes(&self) -> i32 {
        self.count_wires() as i32 - self.count_gates() as i32
    }

    pub fn print_stats(&self) {
        info!(
            "gates = {}, wires = {}, nodes = {}, levels = {}",
            self.count_gates(),
            self.count_wires(),
            self.count_nodes(),
            self.count_levels()
        );
    }

    pub(crate) fn all_false_updates(&self) -> bool {
        self.objs.iter().all(|&i| !self.updates[i])
    }

    pub(crate) fn all_false_pf_updates(&self) -> bool {
        self.objs.iter().all(|&i| !self.pf_updates[i])
    }

    /// Check global functional equivalence against the import-time snapshot:
    /// each output may differ from its expected function only where its
    /// don't-care holds.
    pub fn verify(&self) -> bool {
        for j in 0..self.pos.len() {
            let po = self.pos[j];
            let x = self.store.xor(self.lit_fi(po, 0), self.po_fs[j]);
            self.store.inc_ref(x);
            let bad = self.store.and(x, -self.cs[po][0]);
            self.store.dec_ref(x);
            if !self.store.is_zero(bad) {
                return false;
            }
        }
        true
    }
}

// Snapshot / rollback.
impl Transduction {
    pub fn save(&self, b: &mut Snapshot) {
        debug!("save");
        b.nobjs = self.nobjs;
        b.state = Some(self.state);
        b.objs = self.objs.clone();
        b.fis = self.fis.clone();
        b.fos = self.fos.clone();
        copy_refs(&self.store, &mut b.fs, &self.fs);
        copy_refs(&self.store, &mut b.gs, &self.gs);
        for v in &mut b.cs {
            del_refs(&self.store, v);
        }
        b.cs = self.cs.clone();
        for v in &b.cs {
            for &x in v {
                self.store.inc_ref(x);
            }
        }
        b.updates = self.updates.clone();
        b.pf_updates = self.pf_updates.clone();
        b.fo_cone_shared = self.fo_cone_shared.clone();
        b.levels = self.levels.clone();
        b.slacks = self.slacks.clone();
        b.max_levels = self.max_levels;
        b.saved = true;
    }

    pub fn load(&mut self, b: &Snapshot) {
        debug!("load");
        assert!(b.saved, "load from an empty snapshot");
        self.nobjs = b.nobjs;
        self.state = b.state.unwrap();
        self.objs = b.objs.clone();
        self.fis = b.fis.clone();
        self.fos = b.fos.clone();
        copy_refs(&self.store, &mut self.fs, &b.fs);
        copy_refs(&self.store, &mut self.gs, &b.gs);
        for v in &mut self.cs {
            del_refs(&self.store, v);
        }
        self.cs = b.cs.clone();
        for v in &self.cs {
            for &x in v {
                self.store.inc_ref(x);
            }
        }
        self.updates = b.updates.clone();
        self.pf_updates = b.pf_updates.clone();
        self.fo_cone_shared = b.fo_cone_shared.clone();
        self.levels = b.levels.clone();
        self.slacks = b.slacks.clone();
        self.max_levels = b.max_levels;
    }

    /// Release every store reference a snapshot holds.
    pub fn free_snapshot(&self, b: &mut Snapshot) {
        del_refs(&self.store, &mut b.fs);
        del_refs(&self.store, &mut b.gs);
        for v in &mut b.cs {
            del_refs(&self.store, v);
        }
        b.cs.clear();
        b.saved = false;
    }
}

impl Debug for Transduction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transduction")
            .field("gates", &self.count_gates())
            .field("wires", &self.count_wires())
            .field("nodes", &self.count_nodes())
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::circuit::Circuit;

    fn and4_chain() -> Circuit {
        // out = ((a & b) & (c & d))
        let mut c = Circuit::new(4);
        let (a, b, x, y) = (c.input(0), c.input(1), c.input(2), c.input(3));
        let g1 = c.and(a, b);
        let g2 = c.and(x, y);
        let g3 = c.and(g1, g2);
        c.add_output(g3);
        c
    }

    #[test]
    fn test_import_counts() {
        let t = Transduction::new(&and4_chain(), Config::default());
        assert_eq!(t.count_gates(), 3);
        assert_eq!(t.count_wires(), 6);
        assert_eq!(t.count_nodes(), 3);
        assert_eq!(t.count_levels(), 2);
        assert!(t.verify());
    }

    #[test]
    fn test_import_alias() {
        let mut c = Circuit::new(2);
        let a = c.input(0);
        let g = c.and(a, a); // alias of a
        let b = c.input(1);
        let h = c.and(g, b);
        c.add_output(h);
        let t = Transduction::new(&c, Config::default());
        assert_eq!(t.count_gates(), 1);
        assert!(t.verify());
    }

    #[test]
    fn test_build_debug() {
        let mut t = Transduction::new(&and4_chain(), Config::default());
        assert!(t.build_debug());
    }

    #[test]
    fn test_reciprocity() {
        let t = Transduction::new(&and4_chain(), Config::default());
        for &i in &t.objs {
            for f in &t.fis[i] {
                assert!(t.fos[f.index()].contains(&i));
            }
            for &k in &t.fos[i] {
                assert!(t.fis[k].iter().any(|f| f.index() == i));
            }
        }
    }

    #[test]
    fn test_const_output_folds() {
        // out = a & !a is constant false.
        let mut c = Circuit::new(1);
        let a = c.input(0);
        let g = c.and(a, !a);
        c.add_output(g);
        let t = Transduction::new(&c, Config::default());
        assert_eq!(t.count_gates(), 0);
        let po = t.pos[0];
        assert_eq!(t.fis[po][0], Signal::zero());
        assert!(t.verify());
    }

    #[test]
    fn test_const_one_output_folds() {
        // out = !(a & !a) is constant true.
        let mut c = Circuit::new(1);
        let a = c.input(0);
        let g = c.and(a, !a);
        c.add_output(!g);
        let t = Transduction::new(&c, Config::default());
        assert_eq!(t.count_gates(), 0);
        let po = t.pos[0];
        assert_eq!(t.fis[po][0], Signal::one());
        assert!(t.verify());
    }

    #[test]
    fn test_export_round() {
        let t = Transduction::new(&and4_chain(), Config::default());
        let c = t.to_circuit();
        assert_eq!(c.num_inputs(), 4);
        assert_eq!(c.num_gates(), 3);
        assert_eq!(c.num_outputs(), 1);
        let t2 = Transduction::new(&c, Config::default());
        assert!(t2.verify());
        assert_eq!(t2.count_wires(), t.count_wires());
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut t = Transduction::new(&and4_chain(), Config::default());
        let mut b = Snapshot::default();
        t.save(&mut b);
        let wires = t.count_wires();
        // Mutate: rip out the whole network behind the output.
        let po = t.pos[0];
        let i0 = t.fis[po][0].index();
        let zero = t.store.zero();
        t.disconnect(po, i0, 0, false, false);
        t.connect(po, Signal::one(), false, false, zero);
        for idx in (0..t.objs.len()).rev() {
            let i = t.objs[idx];
            if t.fos[i].is_empty() {
                t.remove(i, false);
                t.objs.remove(idx);
            }
        }
        assert_eq!(t.count_gates(), 0);
        assert!(!t.verify());
        t.load(&b);
        assert_eq!(t.count_wires(), wires);
        assert!(t.verify());
        t.free_snapshot(&mut b);
    }

    #[test]
    fn test_levels_wide_gate() {
        let mut t = Transduction::new(&and4_chain(), Config {
            level_aware: true,
            ..Config::default()
        });
        assert_eq!(t.max_levels, 2);
        // Collapse into one 4-fanin gate: the balanced bound is still 2.
        let po_src = t.fis[t.pos[0]][0].index();
        let _ = t.trivial_merge();
        assert_eq!(t.fis[po_src].len(), 4);
        assert_eq!(t.count_levels(), 2);
    }
}
