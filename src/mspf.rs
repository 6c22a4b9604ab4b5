//! Maximum sets of permissible functions.
//!
//! Exact don't-care computation. For a gate whose fanout cone reconverges,
//! the conjunction-of-edges approximation is not exact, so the global
//! don't-care is obtained by simulating the whole cone a second time with
//! the gate's value complemented and collecting, per primary output, the
//! condition under which the two runs agree (or the output does not care).

use log::{debug, trace};

use crate::network::{copy_refs, del_refs, update, PfState, Transduction};
use crate::reference::Ref;

impl Transduction {
    /// Whether two different fanout branches of `i` meet again downstream.
    pub(crate) fn is_fo_cone_shared(&self, i: usize) -> bool {
        let mut visits = vec![0usize; self.nobjs];
        for (j, &start) in self.fos[i].iter().enumerate() {
            let visitor = j + 1;
            let mut stack = vec![start];
            while let Some(x) = stack.pop() {
                if visits[x] == visitor {
                    continue;
                }
                if visits[x] != 0 {
                    return true;
                }
                visits[x] = visitor;
                stack.extend(self.fos[x].iter().copied());
            }
        }
        false
    }

    /// Resimulate the fanout cone of `i` with `i`'s value complemented,
    /// leaving the per-output results in `po_fs_compl`.
    fn build_fo_cone_compl(&self, i: usize, po_fs_compl: &mut [Ref]) {
        trace!("build with complemented {}", i);
        let mut fs_compl = Vec::new();
        copy_refs(&self.store, &mut fs_compl, &self.fs);
        update(&self.store, &mut fs_compl[i], -self.fs[i]);
        let mut updates = vec![false; self.nobjs];
        for &k in &self.fos[i] {
            updates[k] = true;
        }
        for idx in 0..self.objs.len() {
            let k = self.objs[idx];
            if updates[k] {
                self.build_one_into(k, &mut fs_compl);
                if fs_compl[k] != self.fs[k] {
                    for &k2 in &self.fos[k] {
                        updates[k2] = true;
                    }
                }
            }
        }
        for j in 0..self.pos.len() {
            let x = self.lit_fi_with(self.pos[j], 0, &fs_compl);
            update(&self.store, &mut po_fs_compl[j], x);
        }
        del_refs(&self.store, &mut fs_compl);
    }

    /// Exact global don't-care of a gate with a shared fanout cone: the
    /// conjunction over outputs of "output unchanged by flipping `i`, or
    /// output not cared for". Returns whether the value changed.
    pub(crate) fn mspf_calc_g(&mut self, i: usize) -> bool {
        let g = self.gs[i];
        self.store.inc_ref(g);
        let mut po_fs_compl = vec![Ref::none(); self.pos.len()];
        self.build_fo_cone_compl(i, &mut po_fs_compl);
        let one = self.store.one();
        update(&self.store, &mut self.gs[i], one);
        for j in 0..self.pos.len() {
            let mut x = -self.store.xor(self.po_fs[j], po_fs_compl[j]);
            self.store.inc_ref(x);
            let z = self.store.or(x, self.cs[self.pos[j]][0]);
            update(&self.store, &mut x, z);
            let z = self.store.and(self.gs[i], x);
            update(&self.store, &mut self.gs[i], z);
            self.store.dec_ref(x);
        }
        del_refs(&self.store, &mut po_fs_compl);
        self.store.dec_ref(g);
        self.gs[i] != g
    }

    /// Per-edge don't-cares under the exact global don't-care. The edge
    /// condition here uses all sibling fanins, not just later ones. On the
    /// first removal the remaining slots are rechecked for redundancy and
    /// the caller must resimulate.
    pub(crate) fn mspf_calc_c(&mut self, i: usize, block_i0: Option<usize>) -> i32 {
        for j in 0..self.fis[i].len() {
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
            let f = self.fis[i][j];
            if block_i0 != Some(f.index())
                && self.store.is_one(self.store.or(x, self.lit_fi(i, j)))
            {
                trace!("mspf remove wire {} -> {}", f, i);
                self.disconnect(i, f.index(), j, true, true);
                self.store.dec_ref(x);
                return self.remove_redundant_fis(i, block_i0, j) + 1;
            } else if self.cs[i][j] != x {
                update(&self.store, &mut self.cs[i][j], x);
                self.pf_updates[f.index()] = true;
            }
            self.store.dec_ref(x);
        }
        0
    }

    /// One MSPF sweep. Gates whose cone reconverges get the exact global
    /// don't-care; gates provably constant under it are propagated away.
    /// Any structural change resimulates and restarts the sweep from the
    /// outputs, so the annotations are exact on return. Returns the number
    /// of wires eliminated.
    pub fn mspf(&mut self, sort: bool, block: Option<usize>, block_i0: Option<usize>) -> i32 {
        debug!("mspf (block {:?} -> {:?})", block_i0, block);
        debug_assert!(self.all_false_updates());
        if self.state != PfState::Mspf {
            for idx in 0..self.objs.len() {
                let i = self.objs[idx];
                self.pf_updates[i] = true;
            }
        }
        self.state = PfState::Mspf;
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
            if !self.fo_cone_shared[i]
                && !self.pf_updates[i]
                && (self.fos[i].len() == 1 || !self.is_fo_cone_shared(i))
            {
                continue;
            }
            trace!("mspf {}", i);
            if self.fos[i].len() == 1 || !self.is_fo_cone_shared(i) {
                if self.fo_cone_shared[i] {
                    // The cone stopped being shared; the edge conjunction is
                    // exact again, so only proceed if it actually differs.
                    self.fo_cone_shared[i] = false;
                    let g = self.gs[i];
                    self.store.inc_ref(g);
                    self.calc_g(i);
                    self.store.dec_ref(g);
                    if g == self.gs[i] && !self.pf_updates[i] {
                        continue;
                    }
                } else {
                    self.calc_g(i);
                }
            } else {
                self.fo_cone_shared[i] = true;
                if !self.mspf_calc_g(i) && !self.pf_updates[i] {
                    continue;
                }
                let is_const1 = self.store.is_one(self.store.or(self.gs[i], self.fs[i]));
                let is_const0 =
                    !is_const1 && self.store.is_one(self.store.or(self.gs[i], -self.fs[i]));
                if is_const1 || is_const0 {
                    count += self.replace_by_const(i, is_const1);
                    self.objs.remove(idx);
                    self.build(true);
                    idx = self.objs.len();
                    continue;
                }
            }
            if sort && block != Some(i) {
                self.sort_fis(i);
            }
            let diff = if block == Some(i) {
                self.mspf_calc_c(i, block_i0)
            } else {
                self.mspf_calc_c(i, None)
            };
            if diff != 0 {
                count += diff;
                assert!(!self.fis[i].is_empty());
                if self.fis[i].len() == 1 {
                    let f = self.fis[i][0];
                    count += self.replace(i, f, true);
                    self.objs.remove(idx);
                }
                self.build(true);
                idx = self.objs.len();
                continue;
            }
            self.pf_updates[i] = false;
        }
        debug_assert!(self.all_false_updates());
        debug_assert!(self.all_false_pf_updates());
        count
    }

    /// Recompute every annotation from scratch and check it matches what the
    /// lazy sweep left behind.
    pub fn mspf_debug(&mut self) -> bool {
        let mut gs_old = Vec::new();
        copy_refs(&self.store, &mut gs_old, &self.gs);
        let mut cs_old: Vec<Vec<Ref>> = vec![Vec::new(); self.cs.len()];
        for i in 0..self.cs.len() {
            copy_refs(&self.store, &mut cs_old[i], &self.cs[i]);
        }
        self.state = PfState::None;
        self.mspf(false, None, None);
        let r = gs_old == self.gs && cs_old == self.cs;
        del_refs(&self.store, &mut gs_old);
        for v in &mut cs_old {
            del_refs(&self.store, v);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::circuit::Circuit;
    use crate::network::{Config, PfState, Transduction};

    // xor-of-shared-gate shape: g's fanout cone reconverges at the output.
    fn reconvergent() -> Circuit {
        let mut c = Circuit::new(3);
        let (a, b, s) = (c.input(0), c.input(1), c.input(2));
        let g = c.and(a, b);
        let x = c.and(g, s);
        let y = c.and(!g, !s);
        let o = c.and(!x, !y);
        c.add_output(!o);
        c
    }

    #[test]
    fn test_shared_cone_detected() {
        let c = reconvergent();
        let t = Transduction::new(&c, Config::default());
        let g = t.objs[0];
        assert!(t.fos[g].len() > 1);
        assert!(t.is_fo_cone_shared(g));
        let o = *t.objs.last().unwrap();
        assert!(!t.is_fo_cone_shared(o));
    }

    #[test]
    fn test_mspf_is_consistent() {
        let mut t = Transduction::new(&reconvergent(), Config::default());
        t.mspf(true, None, None);
        assert!(t.mspf_debug());
        assert!(t.verify());
        assert!(t.build_debug());
        assert_eq!(t.state(), PfState::Mspf);
    }

    #[test]
    fn test_mspf_wire_accounting() {
        let mut t = Transduction::new(&reconvergent(), Config::default());
        let wires = t.count_wires() as i32;
        let count = t.mspf(true, None, None);
        assert_eq!(t.count_wires() as i32, wires - count);
        assert!(t.verify());
    }

    #[test]
    fn test_mspf_not_weaker_than_cspf() {
        // MSPF must remove at least as many wires as CSPF does on the same
        // network.
        let mut a = Transduction::new(&reconvergent(), Config::default());
        let mut b = Transduction::new(&reconvergent(), Config::default());
        let ca = a.cspf(true, None, None);
        let cb = b.mspf(true, None, None);
        assert!(cb >= ca);
        assert!(a.verify());
        assert!(b.verify());
    }
}
