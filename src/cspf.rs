//! Compatible sets of permissible functions.
//!
//! A sound but conservative don't-care computation that treats each gate as
//! observable along a single path: the global don't-care of a gate is the
//! conjunction of the per-edge don't-cares of its fanouts, and per-edge
//! don't-cares are assigned in fanin order so that compatibility between
//! sibling edges is maintained by construction.

use log::{debug, trace};

use crate::network::{copy_refs, del_refs, update, PfState, Transduction};
use crate::reference::Ref;

impl Transduction {
    /// Drop every fanin of `i` whose value can never influence whether `i`
    /// meets its global don't-care. Scanning starts at fanin slot `j`;
    /// `block_i0` names a source exempt from removal.
    pub(crate) fn remove_redundant_fis(
        &mut self,
        i: usize,
        block_i0: Option<usize>,
        mut j: usize,
    ) -> i32 {
        let mut count = 0;
        while j < self.fis[i].len() {
            if block_i0 == Some(self.fis[i][j].index()) {
                j += 1;
                continue;
            }
            let mut x = self.store.one();
            self.store.inc_ref(x);
            for jj in 0..self.fis[i].len() {
                if jj != j {
                    let z = self.store.and(x, self.lit_fi(i, jj));
                    update(&self.store, &mut x, z);
                }
            }
            let z = self.store.or(-x, self.gs[i]);
            update(&self.store, &mut x, z);
            let z = self.store.or(x, self.lit_fi(i, j));
            update(&self.store, &mut x, z);
            let redundant = self.store.is_one(x);
            self.store.dec_ref(x);
            if redundant {
                let f = self.fis[i][j];
                trace!("remove redundant wire {} -> {}", f, i);
                self.disconnect(i, f.index(), j, true, true);
                count += 1;
            } else {
                j += 1;
            }
        }
        count
    }

    /// Global don't-care of `i`: the conjunction of the per-edge don't-cares
    /// of all its fanout edges.
    pub(crate) fn calc_g(&mut self, i: usize) {
        let one = self.store.one();
        update(&self.store, &mut self.gs[i], one);
        for j in 0..self.fos[i].len() {
            let k = self.fos[i][j];
            let l = self
                .find_fi(k, i)
                .expect("fanout without reciprocal fanin");
            let z = self.store.and(self.gs[i], self.cs[k][l]);
            update(&self.store, &mut self.gs[i], z);
        }
    }

    /// Per-edge don't-cares of `i`'s fanins, assigned in order: edge `j` may
    /// be wrong wherever a later fanin already forces the output low, or the
    /// gate itself is not cared for. Edges that turn out fully redundant are
    /// disconnected on the spot.
    pub(crate) fn calc_c(&mut self, i: usize) -> i32 {
        let mut count = 0;
        let mut j = 0;
        while j < self.fis[i].len() {
            let mut x = self.store.one();
            self.store.inc_ref(x);
            for jj in j + 1..self.fis[i].len() {
                let z = self.store.and(x, self.lit_fi(i, jj));
                update(&self.store, &mut x, z);
            }
            let z = self.store.or(-x, self.gs[i]);
            update(&self.store, &mut x, z);
            let f = self.fis[i][j];
            if self.store.is_one(self.store.or(x, self.lit_fi(i, j))) {
                trace!("cspf remove wire {} -> {}", f, i);
                self.disconnect(i, f.index(), j, true, true);
                count += 1;
            } else {
                if self.cs[i][j] != x {
                    update(&self.store, &mut self.cs[i][j], x);
                    self.pf_updates[f.index()] = true;
                }
                j += 1;
            }
            self.store.dec_ref(x);
        }
        count
    }

    /// One CSPF sweep in reverse traversal order, lazily recomputing the
    /// don't-care annotations of dirty gates and deleting whatever becomes
    /// unused or single-fanin on the way. Returns the number of wires
    /// eliminated.
    ///
    /// With `sort_remove`, fanins are cost-sorted and redundant ones removed
    /// per gate; `block` exempts one gate from that removal (all of it, or
    /// all but the `block_i0` source).
    pub fn cspf(&mut self, sort_remove: bool, block: Option<usize>, block_i0: Option<usize>) -> i32 {
        debug!("cspf (block {:?} -> {:?})", block_i0, block);
        if self.state != PfState::Cspf {
            for idx in 0..self.objs.len() {
                let i = self.objs[idx];
                self.pf_updates[i] = true;
            }
        }
        self.state = PfState::Cspf;
        let mut count = 0;
        let mut idx = self.objs.len();
        while idx > 0 {
            idx -= 1;
            let i = self.objs[idx];
            if self.fos[i].is_empty() {
                trace!("remove unused {}", i);
                count += self.remove(i, true);
                self.objs.remove(idx);
                continue;
            }
            if !self.pf_updates[i] {
                continue;
            }
            trace!("cspf {}", i);
            self.calc_g(i);
            if sort_remove {
                if block != Some(i) {
                    self.sort_fis(i);
                    count += self.remove_redundant_fis(i, None, 0);
                } else if block_i0.is_some() {
                    count += self.remove_redundant_fis(i, block_i0, 0);
                }
            }
            count += self.calc_c(i);
            self.pf_updates[i] = false;
            assert!(!self.fis[i].is_empty());
            if self.fis[i].len() == 1 {
                let f = self.fis[i][0];
                count += self.replace(i, f, true);
                self.objs.remove(idx);
            }
        }
        self.build(false);
        debug_assert!(self.all_false_pf_updates());
        count
    }

    /// Recompute every annotation from scratch and check it matches what the
    /// lazy sweep left behind.
    pub fn cspf_debug(&mut self) -> bool {
        let mut gs_old = Vec::new();
        copy_refs(&self.store, &mut gs_old, &self.gs);
        let mut cs_old: Vec<Vec<Ref>> = vec![Vec::new(); self.cs.len()];
        for i in 0..self.cs.len() {
            copy_refs(&self.store, &mut cs_old[i], &self.cs[i]);
        }
        self.state = PfState::None;
        self.cspf(false, None, None);
        let r = gs_old == self.gs && cs_old == self.cs;
        del_refs(&self.store, &mut gs_old);
        for v in &mut cs_old {
            del_refs(&self.store, v);
        }
        r
    }
}
