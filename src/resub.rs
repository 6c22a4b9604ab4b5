//! Resubstitution: speculatively wiring existing signals into a gate and
//! letting a blocked permissible-function pass decide which of the original
//! fanins the addition makes redundant. Unprofitable attempts are rolled
//! back from a snapshot.

use log::{debug, trace};

use crate::network::{lev_add, lev_noexcess, Snapshot, Transduction};
use crate::signal::Signal;

impl Transduction {
    /// Connect source `i0` (with polarity `c0`) into gate `i` if the current
    /// don't-care already implies the candidate wherever `i` must be high:
    /// `!f | g | lit` a tautology means the extra conjunct cannot break the
    /// function.
    pub(crate) fn try_connect(&mut self, i: usize, i0: usize, c0: bool) -> bool {
        let f = Signal::new(i0, c0);
        if !self.fis[i].contains(&f) {
            let x = self.store.or(-self.fs[i], self.gs[i]);
            self.store.inc_ref(x);
            let lit = self.store.lit_cond(self.fs[i0], c0);
            let ok = self.store.is_one(self.store.or(x, lit));
            self.store.dec_ref(x);
            if ok {
                trace!("connect {} to {}", f, i);
                let zero = self.store.zero();
                self.connect(i, f, true, true, zero);
                return true;
            }
        }
        false
    }

    /// For each gate, outputs first: merge, throw every compatible signal at
    /// it at once, let one blocked pass plus one free pass clean up, and keep
    /// the result only if the two-input node count did not grow. Wide
    /// survivors are decomposed. Returns the number of nodes eliminated.
    pub fn resub(&mut self, mspf: bool) -> i32 {
        debug!("resubstitution (mspf = {})", mspf);
        let mut count = if mspf {
            self.mspf(true, None, None)
        } else {
            self.cspf(true, None, None)
        };
        let mut nodes = self.count_nodes();
        let mut b = Snapshot::default();
        self.save(&mut b);
        let mut count_saved = count;
        let targets: Vec<usize> = self.objs.clone();
        for &t in targets.iter().rev() {
            if self.fos[t].is_empty() {
                continue;
            }
            trace!("resubstitute {}", t);
            count += self.trivial_merge_one(t);
            let mut lev: Vec<bool> = Vec::new();
            if self.flevel {
                for j in 0..self.fis[t].len() {
                    lev_add(&mut lev, self.levels[self.fis[t][j].index()]);
                }
                let bound = self.levels[t] as isize + self.slacks[t];
                if lev.len() as isize > bound {
                    self.load(&b);
                    count = count_saved;
                    continue;
                }
                lev.resize(bound as usize, false);
            }
            let mut connected = false;
            let mut marks = vec![false; self.nobjs];
            self.mark_fo_cone(&mut marks, t);
            let targets2: Vec<usize> = self.objs.clone();
            for &t2 in &targets2 {
                if self.flevel && lev.len() as isize > self.levels[t] as isize + self.slacks[t] {
                    break;
                }
                if !marks[t2]
                    && !self.fos[t2].is_empty()
                    && (!self.flevel || lev_noexcess(&lev, self.levels[t2]))
                    && (self.try_connect(t, t2, false) || self.try_connect(t, t2, true))
                {
                    connected = true;
                    count -= 1;
                    if self.flevel {
                        lev_add(&mut lev, self.levels[t2]);
                    }
                }
            }
            if connected {
                if mspf {
                    self.build(true);
                    count += self.mspf(true, Some(t), None);
                } else {
                    self.pf_updates[t] = true;
                    count += self.cspf(true, Some(t), None);
                }
                if !self.fos[t].is_empty() {
                    self.pf_updates[t] = true;
                    count += if mspf {
                        self.mspf(true, None, None)
                    } else {
                        self.cspf(true, None, None)
                    };
                }
            }
            if nodes < self.count_nodes() {
                self.load(&b);
                count = count_saved;
                continue;
            }
            if !self.fos[t].is_empty() && self.fis[t].len() > 2 {
                let mut pos = self.nobjs;
                if self.flevel {
                    count += self.balanced_decompose_one(t, &mut pos);
                    count += if mspf {
                        self.mspf(true, None, None)
                    } else {
                        self.cspf(true, None, None)
                    };
                } else {
                    count += self.trivial_decompose_one(t, &mut pos);
                }
            }
            nodes = self.count_nodes();
            self.save(&mut b);
            count_saved = count;
        }
        self.free_snapshot(&mut b);
        count
    }

    /// One candidate at a time: each accepted connection must let the
    /// blocked pass remove at least one wire, otherwise it is undone
    /// immediately. Candidates are the primary inputs first, then every
    /// gate outside the target's fanout cone.
    pub fn resub_mono(&mut self, mspf: bool) -> i32 {
        debug!("resubstitution mono (mspf = {})", mspf);
        let mut count = if mspf {
            self.mspf(true, None, None)
        } else {
            self.cspf(true, None, None)
        };
        let targets: Vec<usize> = self.objs.clone();
        for &t in targets.iter().rev() {
            if self.fos[t].is_empty() {
                continue;
            }
            trace!("resubstitute mono {}", t);
            count += self.trivial_merge_one(t);
            let mut b = Snapshot::default();
            self.save(&mut b);
            let mut count_saved = count;
            let pis = self.pis.clone();
            for &pi in &pis {
                if self.fos[t].is_empty() {
                    break;
                }
                if self.try_connect(t, pi, false) || self.try_connect(t, pi, true) {
                    count -= 1;
                    count = self.resub_mono_step(t, pi, mspf, &mut b, count, &mut count_saved);
                }
            }
            if self.fos[t].is_empty() {
                self.free_snapshot(&mut b);
                continue;
            }
            let mut marks = vec![false; self.nobjs];
            self.mark_fo_cone(&mut marks, t);
            let targets2: Vec<usize> = self.objs.clone();
            for &t2 in &targets2 {
                if self.fos[t].is_empty() {
                    break;
                }
                if !marks[t2]
                    && !self.fos[t2].is_empty()
                    && (self.try_connect(t, t2, false) || self.try_connect(t, t2, true))
                {
                    count -= 1;
                    count = self.resub_mono_step(t, t2, mspf, &mut b, count, &mut count_saved);
                }
            }
            self.free_snapshot(&mut b);
            if self.fos[t].is_empty() {
                continue;
            }
            if self.fis[t].len() > 2 {
                let mut pos = self.nobjs;
                if self.flevel {
                    count += self.balanced_decompose_one(t, &mut pos);
                    count += if mspf {
                        self.mspf(true, None, None)
                    } else {
                        self.cspf(true, None, None)
                    };
                } else {
                    count += self.trivial_decompose_one(t, &mut pos);
                }
            }
        }
        count
    }

    /// Evaluate one speculative connection of source `cand` into `t`: run
    /// the blocked pass, then either commit (snapshot the improvement) or
    /// roll back. Returns the adjusted count.
    fn resub_mono_step(
        &mut self,
        t: usize,
        cand: usize,
        mspf: bool,
        b: &mut Snapshot,
        mut count: i32,
        count_saved: &mut i32,
    ) -> i32 {
        let diff = if mspf {
            self.build(true);
            self.mspf(true, Some(t), Some(cand))
        } else {
            self.pf_updates[t] = true;
            self.cspf(true, Some(t), Some(cand))
        };
        if diff != 0 {
            count += diff;
            if !self.fos[t].is_empty() {
                self.pf_updates[t] = true;
                count += if mspf {
                    self.mspf(true, None, None)
                } else {
                    self.cspf(true, None, None)
                };
            }
            if self.flevel && self.count_levels() > self.max_levels {
                self.load(b);
                count = *count_saved;
            } else {
                self.save(b);
                *count_saved = count;
            }
        } else {
            self.load(b);
            count = *count_saved;
        }
        count
    }

    /// Connect every compatible signal everywhere without rollback, then
    /// factor the resulting shared fanin structure.
    pub fn resub_shared(&mut self, mspf: bool) -> i32 {
        debug!("shared resubstitution (mspf = {})", mspf);
        let mut count = if mspf {
            self.mspf(true, None, None)
        } else {
            self.cspf(true, None, None)
        };
        let targets: Vec<usize> = self.objs.clone();
        for &t in targets.iter().rev() {
            if self.fos[t].is_empty() {
                continue;
            }
            trace!("shared resubstitute {}", t);
            count += self.trivial_merge_one(t);
            let mut connected = false;
            let pis = self.pis.clone();
            for &pi in &pis {
                if self.try_connect(t, pi, false) || self.try_connect(t, pi, true) {
                    connected = true;
                    count -= 1;
                }
            }
            let mut marks = vec![false; self.nobjs];
            self.mark_fo_cone(&mut marks, t);
            for &t2 in &targets {
                if !marks[t2]
                    && !self.fos[t2].is_empty()
                    && (self.try_connect(t, t2, false) || self.try_connect(t, t2, true))
                {
                    connected = true;
                    count -= 1;
                }
            }
            if connected {
                if mspf {
                    self.build(true);
                    count += self.mspf(true, Some(t), None);
                } else {
                    self.pf_updates[t] = true;
                    count += self.cspf(true, Some(t), None);
                }
                if !self.fos[t].is_empty() {
                    self.pf_updates[t] = true;
                    count += if mspf {
                        self.mspf(true, None, None)
                    } else {
                        self.cspf(true, None, None)
                    };
                }
            }
        }
        count + self.decompose()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::circuit::Circuit;
    use crate::network::{Config, Transduction};

    // Two functionally overlapping cones: h = a & b & x and g = a & b leave
    // g resubstitutable into h's cone.
    fn overlapping() -> Circuit {
        let mut c = Circuit::new(3);
        let (a, b, x) = (c.input(0), c.input(1), c.input(2));
        let g = c.and(a, b);
        let h1 = c.and(a, x);
        let h2 = c.and(h1, b);
        c.add_output(g);
        c.add_output(h2);
        c
    }

    #[test]
    fn test_resub_reduces_nodes() {
        let mut t = Transduction::new(&overlapping(), Config::default());
        let nodes = t.count_nodes();
        let count = t.resub(false);
        assert!(count > 0);
        assert!(t.count_nodes() < nodes);
        assert!(t.verify());
        assert!(t.cspf_debug());
    }

    #[test]
    fn test_resub_mspf() {
        let mut t = Transduction::new(&overlapping(), Config::default());
        let nodes = t.count_nodes();
        t.resub(true);
        assert!(t.count_nodes() <= nodes);
        assert!(t.verify());
        assert!(t.mspf_debug());
    }

    #[test]
    fn test_resub_mono() {
        let mut t = Transduction::new(&overlapping(), Config::default());
        let nodes = t.count_nodes();
        t.resub_mono(false);
        assert!(t.count_nodes() <= nodes);
        assert!(t.verify());
    }

    #[test]
    fn test_resub_shared() {
        let mut t = Transduction::new(&overlapping(), Config::default());
        t.resub_shared(false);
        assert!(t.verify());
        // Every surviving gate is binary after the trailing decompose.
        for &i in &t.objs {
            assert!(t.fis[i].len() <= 2);
        }
    }

    #[test]
    fn test_resub_never_grows_nodes() {
        let mut c = Circuit::new(4);
        let (a, b, x, y) = (c.input(0), c.input(1), c.input(2), c.input(3));
        let g1 = c.and(a, b);
        let g2 = c.and(x, y);
        let g3 = c.and(g1, !g2);
        let g4 = c.and(!g1, g2);
        let g5 = c.and(!g3, !g4);
        c.add_output(!g5);
        c.add_output(g1);
        let mut t = Transduction::new(&c, Config::default());
        let nodes = t.count_nodes();
        t.resub(false);
        assert!(t.count_nodes() <= nodes);
        assert!(t.verify());
    }

    #[test]
    fn test_resub_level_bound() {
        let mut t = Transduction::new(
            &overlapping(),
            Config {
                level_aware: true,
                ..Config::default()
            },
        );
        let max = t.count_levels();
        t.resub(false);
        assert!(t.count_levels() <= max.max(1));
        assert!(t.verify());
    }
}
