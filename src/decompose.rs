//! Splitting wide gates back into two-fanin form, and factoring fanin sets
//! shared between gates into new gates.

use log::{debug, trace};

use crate::network::{update, PfState, Transduction};
use crate::signal::Signal;

impl Transduction {
    /// Give a freshly created child gate `p` of `i` a valid don't-care
    /// annotation, when one can be inherited. The child computes a partial
    /// conjunction, so under CSPF it is exactly as observable as `i`; under
    /// MSPF the remaining sibling fanins weaken the condition further.
    fn inherit_care(&mut self, i: usize, p: usize) {
        if self.pf_updates[i] {
            return;
        }
        match self.state {
            PfState::None => {}
            PfState::Cspf => {
                let g = self.gs[i];
                update(&self.store, &mut self.gs[p], g);
            }
            PfState::Mspf => {
                let mut x = self.store.one();
                self.store.inc_ref(x);
                for j in 0..self.fis[i].len() {
                    let z = self.store.and(x, self.lit_fi(i, j));
                    update(&self.store, &mut x, z);
                }
                let z = self.store.or(-x, self.gs[i]);
                update(&self.store, &mut self.gs[p], z);
                self.store.dec_ref(x);
            }
        }
    }

    /// Split a gate with more than two fanins into a chain of two-fanin
    /// gates, pairing fanins from the back. Returns the (negative) wire
    /// delta.
    pub(crate) fn trivial_decompose_one(&mut self, i: usize, pos: &mut usize) -> i32 {
        trace!("trivial decompose {}", i);
        assert!(self.fis[i].len() > 2);
        let count = 2 - self.fis[i].len() as i32;
        while self.fis[i].len() > 2 {
            let f0 = *self.fis[i].last().unwrap();
            let c0 = *self.cs[i].last().unwrap();
            self.store.inc_ref(c0);
            self.disconnect(i, f0.index(), self.fis[i].len() - 1, false, false);
            let f1 = *self.fis[i].last().unwrap();
            let c1 = *self.cs[i].last().unwrap();
            self.store.inc_ref(c1);
            self.disconnect(i, f1.index(), self.fis[i].len() - 1, false, false);
            self.new_gate(pos);
            let p = *pos;
            self.connect(p, f1, false, false, c1);
            self.connect(p, f0, false, false, c0);
            self.store.dec_ref(c0);
            self.store.dec_ref(c1);
            self.inherit_care(i, p);
            let care = if self.gs[p].is_none() {
                self.store.zero()
            } else {
                self.gs[p]
            };
            self.connect(i, Signal::from_index(p), false, false, care);
            let at = self
                .objs
                .iter()
                .position(|&x| x == i)
                .expect("gate missing from the traversal order");
            self.objs.insert(at, p);
            self.build_one(p);
        }
        count
    }

    /// Binarize every wide gate, reusing dead slots from the front.
    pub fn trivial_decompose(&mut self) -> i32 {
        debug!("trivial decompose");
        let mut count = 0;
        let mut pos = self.pis.len() + 1;
        let mut idx = 0;
        while idx < self.objs.len() {
            let i = self.objs[idx];
            if self.fis[i].len() > 2 {
                count += self.trivial_decompose_one(i, &mut pos);
                idx = self
                    .objs
                    .iter()
                    .position(|&x| x == i)
                    .expect("gate missing from the traversal order");
            }
            idx += 1;
        }
        count
    }

    /// As `trivial_decompose_one`, but always pair the two shallowest
    /// sources so the added depth stays at the balanced-tree bound. Levels
    /// of the new gates are filled in on the fly; slacks are left to the
    /// next full level computation.
    pub(crate) fn balanced_decompose_one(&mut self, i: usize, pos: &mut usize) -> i32 {
        trace!("balanced decompose {}", i);
        assert!(self.fis[i].len() > 2);
        let count = 2 - self.fis[i].len() as i32;
        while self.fis[i].len() > 2 {
            // Deepest first, so the back holds the two shallowest fanins.
            for q in 1..self.fis[i].len() {
                let f = self.fis[i][q];
                let c = self.cs[i][q];
                let lf = self.levels[f.index()];
                let mut r = q;
                while r > 0 && self.levels[self.fis[i][r - 1].index()] < lf {
                    self.fis[i][r] = self.fis[i][r - 1];
                    self.cs[i][r] = self.cs[i][r - 1];
                    r -= 1;
                }
                self.fis[i][r] = f;
                self.cs[i][r] = c;
            }
            let f0 = *self.fis[i].last().unwrap();
            let c0 = *self.cs[i].last().unwrap();
            self.store.inc_ref(c0);
            self.disconnect(i, f0.index(), self.fis[i].len() - 1, false, false);
            let f1 = *self.fis[i].last().unwrap();
            let c1 = *self.cs[i].last().unwrap();
            self.store.inc_ref(c1);
            self.disconnect(i, f1.index(), self.fis[i].len() - 1, false, false);
            self.new_gate(pos);
            let p = *pos;
            self.connect(p, f1, false, false, c1);
            self.connect(p, f0, false, false, c0);
            self.store.dec_ref(c0);
            self.store.dec_ref(c1);
            self.inherit_care(i, p);
            let care = if self.gs[p].is_none() {
                self.store.zero()
            } else {
                self.gs[p]
            };
            self.connect(i, Signal::from_index(p), false, false, care);
            let at = self
                .objs
                .iter()
                .position(|&x| x == i)
                .expect("gate missing from the traversal order");
            self.objs.insert(at, p);
            self.build_one(p);
            self.levels[p] = 1 + self.levels[f0.index()].max(self.levels[f1.index()]);
        }
        count
    }

    /// Factor fanin sets shared between pairs of gates: an intersection of
    /// more than one literal is hoisted into a new gate feeding both, or,
    /// when one fanin set contains the other, the smaller gate is reused
    /// directly. Finishes by binarizing whatever is still wide.
    pub fn decompose(&mut self) -> i32 {
        debug!("decompose shared");
        let zero = self.store.zero();
        let mut count = 0;
        let mut idx = 0;
        while idx < self.objs.len() {
            let i = self.objs[idx];
            let mut jdx = idx + 1;
            while jdx < self.objs.len() {
                let k = self.objs[jdx];
                let common: Vec<Signal> = self.fis[i]
                    .iter()
                    .copied()
                    .filter(|f| self.fis[k].contains(f))
                    .collect();
                if common.len() < 2 {
                    jdx += 1;
                    continue;
                }
                if common.len() == self.fis[i].len() && common.len() == self.fis[k].len() {
                    // Identical fanin sets: the gates compute the same
                    // function, keep the earlier one.
                    trace!("merge identical {} into {}", k, i);
                    count += self.replace(k, Signal::from_index(i), true);
                    self.objs.remove(jdx);
                    continue;
                }
                if common.len() == self.fis[i].len() && !self.fis[k].contains(&Signal::from_index(i))
                {
                    // i's whole fanin set sits inside k: feed i into k.
                    trace!("reuse {} inside {}", i, k);
                    for f in &common {
                        let l = self
                            .fis[k]
                            .iter()
                            .position(|x| x == f)
                            .expect("fanin vanished during factoring");
                        self.disconnect(k, f.index(), l, true, true);
                        count += 1;
                    }
                    self.connect(k, Signal::from_index(i), false, true, zero);
                    self.pf_updates[i] = true;
                    self.pf_updates[k] = true;
                    count -= 1;
                } else if common.len() == self.fis[k].len()
                    && !self.fis[i].contains(&Signal::from_index(k))
                    && !self.in_fi_cone(k, i)
                {
                    // k's whole fanin set sits inside i: feed k into i. The
                    // sorting connect moves k before i in the traversal
                    // order.
                    trace!("reuse {} inside {}", k, i);
                    for f in &common {
                        let l = self
                            .fis[i]
                            .iter()
                            .position(|x| x == f)
                            .expect("fanin vanished during factoring");
                        self.disconnect(i, f.index(), l, true, true);
                        count += 1;
                    }
                    self.connect(i, Signal::from_index(k), true, true, zero);
                    self.pf_updates[i] = true;
                    self.pf_updates[k] = true;
                    count -= 1;
                } else {
                    trace!("factor {} common fanins of {} and {}", common.len(), i, k);
                    let mut pos = self.nobjs;
                    self.new_gate(&mut pos);
                    for &f in &common {
                        self.connect(pos, f, false, false, zero);
                    }
                    self.objs.insert(idx, pos);
                    idx += 1;
                    jdx += 1;
                    self.build_one(pos);
                    if self.flevel {
                        self.levels[pos] = 1 + common
                            .iter()
                            .map(|f| self.levels[f.index()])
                            .max()
                            .unwrap_or(0);
                    }
                    for &g in &[i, k] {
                        for f in &common {
                            let l = self
                                .fis[g]
                                .iter()
                                .position(|x| x == f)
                                .expect("fanin vanished during factoring");
                            self.disconnect(g, f.index(), l, true, true);
                            count += 1;
                        }
                        self.connect(g, Signal::from_index(pos), false, true, zero);
                        self.pf_updates[g] = true;
                        count -= 1;
                    }
                    self.pf_updates[pos] = true;
                    count -= common.len() as i32;
                }
                jdx += 1;
            }
            idx += 1;
        }
        self.build(true);
        count + self.trivial_decompose()
    }
}
