//! Gate inlining.
//!
//! A non-inverted fanin that is itself an internal gate with a single
//! fanout computes a conjunction used exactly once, so its fanins can be
//! spliced directly into the consumer, removing one level of indirection.

use log::{debug, trace};

use crate::network::{PfState, Transduction};

impl Transduction {
    /// Inline every eligible fanin of `i`, transitively (spliced-in fanins
    /// are themselves reconsidered). Returns the number of wires eliminated.
    pub(crate) fn trivial_merge_one(&mut self, i: usize) -> i32 {
        trace!("trivial merge {}", i);
        let mut count = 0;
        let mut fis_old = std::mem::take(&mut self.fis[i]);
        let mut cs_old = std::mem::take(&mut self.cs[i]);
        let mut j = 0;
        while j < fis_old.len() {
            let f = fis_old[j];
            let i0 = f.index();
            if self.fis[i0].is_empty() || self.fos[i0].len() > 1 || f.is_negated() {
                if self.fis[i].contains(&f) {
                    // A duplicate collapses; only valid while no annotation
                    // is cached.
                    assert!(self.state == PfState::None);
                    trace!("collapse duplicate fanin {} of {}", f, i);
                    let p = self.fos[i0]
                        .iter()
                        .position(|&k| k == i)
                        .expect("missing reciprocal fanout");
                    self.fos[i0].remove(p);
                    self.store.dec_ref(cs_old[j]);
                    count += 1;
                } else {
                    self.fis[i].push(f);
                    self.cs[i].push(cs_old[j]);
                }
                j += 1;
                continue;
            }
            trace!("inline {} into {}", i0, i);
            self.pf_updates[i] |= self.pf_updates[i0];
            let p = self.fos[i0]
                .iter()
                .position(|&k| k == i)
                .expect("missing reciprocal fanout");
            self.fos[i0].remove(p);
            count += 1;
            let mut at = j;
            for jj in 0..self.fis[i0].len() {
                let g = self.fis[i0][jj];
                if !self.fis[i].contains(&g) {
                    self.fos[g.index()].push(i);
                    let cg = self.cs[i0][jj];
                    self.store.inc_ref(cg);
                    fis_old.insert(at, g);
                    cs_old.insert(at, cg);
                    at += 1;
                    count -= 1;
                } else {
                    // A duplicate collapses; only valid while no annotation
                    // is cached.
                    assert!(self.state == PfState::None);
                }
            }
            count += self.remove(i0, false);
            self.erase_obj(i0);
            self.store.dec_ref(cs_old[at]);
            fis_old.remove(at);
            cs_old.remove(at);
            // Reprocess from the first spliced-in fanin.
        }
        count
    }

    /// Inline across the whole network, outputs first.
    pub fn trivial_merge(&mut self) -> i32 {
        debug!("trivial merge");
        let mut count = 0;
        let mut idx = self.objs.len();
        while idx > 0 {
            idx -= 1;
            let i = self.objs[idx];
            count += self.trivial_merge_one(i);
            idx = self
                .objs
                .iter()
                .position(|&x| x == i)
                .expect("gate missing from the traversal order");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::circuit::Circuit;
    use crate::network::{Config, Transduction};

    #[test]
    fn test_merge_chain() {
        // Three stacked single-fanout ANDs collapse into one 4-fanin gate.
        let mut c = Circuit::new(4);
        let (a, b, x, y) = (c.input(0), c.input(1), c.input(2), c.input(3));
        let g1 = c.and(a, b);
        let g2 = c.and(g1, x);
        let g3 = c.and(g2, y);
        c.add_output(g3);
        let mut t = Transduction::new(&c, Config::default());
        assert_eq!(t.count_gates(), 3);
        let count = t.trivial_merge();
        assert_eq!(t.count_gates(), 1);
        let i = t.objs[0];
        assert_eq!(t.fis[i].len(), 4);
        // Two gates gone, each trade removed one wire net.
        assert_eq!(count, 2);
        assert!(t.build_debug());
        assert!(t.verify());
    }

    #[test]
    fn test_merge_keeps_inverted_fanin() {
        let mut c = Circuit::new(3);
        let (a, b, x) = (c.input(0), c.input(1), c.input(2));
        let g1 = c.and(a, b);
        let g2 = c.and(!g1, x);
        c.add_output(g2);
        let mut t = Transduction::new(&c, Config::default());
        let count = t.trivial_merge();
        assert_eq!(count, 0);
        assert_eq!(t.count_gates(), 2);
        assert!(t.verify());
    }

    #[test]
    fn test_merge_keeps_shared_fanin() {
        let mut c = Circuit::new(3);
        let (a, b, x) = (c.input(0), c.input(1), c.input(2));
        let g1 = c.and(a, b);
        let g2 = c.and(g1, x);
        c.add_output(g2);
        c.add_output(g1);
        let mut t = Transduction::new(&c, Config::default());
        let count = t.trivial_merge();
        assert_eq!(count, 0);
        assert_eq!(t.count_gates(), 2);
        assert!(t.verify());
    }

    #[test]
    fn test_merge_collapses_duplicate() {
        // g2 = g1 & a where g1 = a & b: inlining makes the a-fanin a
        // duplicate, which collapses.
        let mut c = Circuit::new(2);
        let (a, b) = (c.input(0), c.input(1));
        let g1 = c.and(a, b);
        let g2 = c.and(g1, a);
        c.add_output(g2);
        let mut t = Transduction::new(&c, Config::default());
        let count = t.trivial_merge();
        assert_eq!(t.count_gates(), 1);
        let i = t.objs[0];
        assert_eq!(t.fis[i].len(), 2);
        assert_eq!(count, 2);
        assert!(t.verify());
    }
}
