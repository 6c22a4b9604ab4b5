//! Fixpoint scripts chaining the resubstitution variants.

use log::debug;

use crate::network::{Snapshot, Transduction};

impl Transduction {
    /// Iterate one resubstitution variant until it stops paying off.
    pub fn repeat_resub(&mut self, mono: bool, mspf: bool) -> i32 {
        let mut count = 0;
        loop {
            let diff = if mono {
                self.resub_mono(mspf)
            } else {
                self.resub(mspf)
            };
            if diff == 0 {
                return count;
            }
            count += diff;
        }
    }

    /// Alternate the mono and plain variants; with `inner`, iterate the
    /// alternation itself to a fixpoint.
    pub fn repeat_resub_inner(&mut self, mspf: bool, inner: bool) -> i32 {
        let mut count = 0;
        loop {
            let diff = self.repeat_resub(true, mspf) + self.repeat_resub(false, mspf);
            if diff == 0 {
                return count;
            }
            count += diff;
            if !inner {
                return count;
            }
        }
    }

    /// Run the inner loop under CSPF, then (if `mspf`) again under MSPF;
    /// with `outer`, iterate that pairing to a fixpoint.
    pub fn repeat_resub_outer(&mut self, mspf: bool, inner: bool, outer: bool) -> i32 {
        let mut count = 0;
        loop {
            let diff = if mspf {
                self.repeat_resub_inner(false, inner) + self.repeat_resub_inner(true, inner)
            } else {
                self.repeat_resub_inner(false, inner)
            };
            if diff == 0 {
                return count;
            }
            count += diff;
            if !outer {
                return count;
            }
        }
    }

    /// The whole optimization script: optional shared-resubstitution
    /// prepass, then repeated rounds of shared resubstitution plus the
    /// outer fixpoint, keeping a snapshot so a non-improving final round is
    /// undone. Returns the total number of nodes eliminated.
    pub fn optimize(
        &mut self,
        first_merge: bool,
        mspf_merge: bool,
        mspf_resub: bool,
        inner: bool,
        outer: bool,
    ) -> i32 {
        debug!("optimize");
        let mut b = Snapshot::default();
        self.save(&mut b);
        let mut count = 0;
        let mut diff = 0;
        if first_merge {
            diff = self.resub_shared(mspf_merge);
        }
        diff += self.repeat_resub_outer(mspf_resub, inner, outer);
        if diff > 0 {
            count = diff;
            self.save(&mut b);
            diff = 0;
        }
        loop {
            diff += self.resub_shared(mspf_merge) + self.repeat_resub_outer(mspf_resub, inner, outer);
            if diff > 0 {
                count += diff;
                self.save(&mut b);
                diff = 0;
            } else {
                self.load(&b);
                break;
            }
        }
        self.free_snapshot(&mut b);
        count
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use crate::circuit::Circuit;
    use crate::network::{Config, Transduction};

    fn adder_bit() -> Circuit {
        // Full adder: sum and carry share the a/b/cin cones heavily.
        let mut c = Circuit::new(3);
        let (a, b, cin) = (c.input(0), c.input(1), c.input(2));
        let axb = c.xor(a, b);
        let sum = c.xor(axb, cin);
        let ab = c.and(a, b);
        let t = c.and(axb, cin);
        let cout = c.or(ab, t);
        c.add_output(sum);
        c.add_output(cout);
        c
    }

    #[test]
    fn test_repeat_resub_converges() {
        let mut t = Transduction::new(&adder_bit(), Config::default());
        let count = t.repeat_resub(false, false);
        assert!(count >= 0);
        assert!(t.verify());
        // A second run finds nothing more.
        assert_eq!(t.resub(false), 0);
    }

    #[test]
    fn test_optimize_cspf() {
        let mut t = Transduction::new(&adder_bit(), Config::default());
        let wires = t.count_wires() as i32;
        let nodes = t.count_nodes();
        let count = t.optimize(true, false, false, true, true);
        assert_eq!(t.count_wires() as i32, wires - count);
        assert!(t.count_nodes() <= nodes);
        assert!(t.verify());
    }

    #[test]
    fn test_optimize_mspf() {
        let mut t = Transduction::new(&adder_bit(), Config::default());
        let wires = t.count_wires() as i32;
        let count = t.optimize(false, true, true, false, false);
        assert_eq!(t.count_wires() as i32, wires - count);
        assert!(t.verify());
    }

    #[test]
    fn test_optimize_exports_valid_circuit() {
        let orig = adder_bit();
        let mut t = Transduction::new(&orig, Config::default());
        t.optimize(true, true, true, true, true);
        assert!(t.verify());
        let out = t.to_circuit();
        // Exhaustive equivalence check against the source circuit.
        for v in 0u32..8 {
            let ins: Vec<bool> = (0..3).map(|k| v >> k & 1 != 0).collect();
            assert_eq!(orig.eval(&ins), out.eval(&ins), "mismatch on {:?}", ins);
        }
    }
}
