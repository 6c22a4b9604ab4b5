use crate::signal::Signal;

/// A combinational circuit of two-input AND gates with optional complement
/// on every edge. Node 0 is the constant false, nodes `1..=num_inputs` are
/// the primary inputs, gates follow in topological order.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    num_inputs: usize,
    gates: Vec<[Signal; 2]>,
    outputs: Vec<Signal>,
}

impl Circuit {
    pub fn new(num_inputs: usize) -> Self {
        Self {
            num_inputs,
            gates: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_gates(&self) -> usize {
        self.gates.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn gates(&self) -> &[[Signal; 2]] {
        &self.gates
    }

    pub fn outputs(&self) -> &[Signal] {
        &self.outputs
    }

    pub fn input(&self, i: usize) -> Signal {
        assert!(i < self.num_inputs, "input {} out of range", i);
        Signal::from_index(i + 1)
    }

    /// Add an AND gate over two existing literals and return its literal.
    pub fn and(&mut self, a: Signal, b: Signal) -> Signal {
        let next = 1 + self.num_inputs + self.gates.len();
        assert!(a.index() < next, "fanin {} out of range", a);
        assert!(b.index() < next, "fanin {} out of range", b);
        self.gates.push([a, b]);
        Signal::from_index(next)
    }

    pub fn or(&mut self, a: Signal, b: Signal) -> Signal {
        !self.and(!a, !b)
    }

    pub fn xor(&mut self, a: Signal, b: Signal) -> Signal {
        let x = self.and(a, !b);
        let y = self.and(!a, b);
        self.or(x, y)
    }

    pub fn add_output(&mut self, f: Signal) {
        assert!(
            f.index() < 1 + self.num_inputs + self.gates.len(),
            "output {} out of range",
            f
        );
        self.outputs.push(f);
    }

    /// Evaluate the circuit on one input assignment.
    pub fn eval(&self, inputs: &[bool]) -> Vec<bool> {
        assert_eq!(inputs.len(), self.num_inputs);
        let mut values = vec![false; 1 + self.num_inputs + self.gates.len()];
        values[1..=self.num_inputs].copy_from_slice(inputs);
        for (k, gate) in self.gates.iter().enumerate() {
            let v = |f: Signal| values[f.index()] ^ f.is_negated();
            values[1 + self.num_inputs + k] = v(gate[0]) & v(gate[1]);
        }
        self.outputs
            .iter()
            .map(|&f| values[f.index()] ^ f.is_negated())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_eval() {
        let mut c = Circuit::new(2);
        let (a, b) = (c.input(0), c.input(1));
        let g = c.xor(a, b);
        c.add_output(g);
        assert_eq!(c.eval(&[false, false]), vec![false]);
        assert_eq!(c.eval(&[true, false]), vec![true]);
        assert_eq!(c.eval(&[false, true]), vec![true]);
        assert_eq!(c.eval(&[true, true]), vec![false]);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_bad_fanin() {
        let mut c = Circuit::new(1);
        let a = c.input(0);
        let ghost = Signal::from_index(5);
        c.and(a, ghost);
    }

    #[test]
    fn test_const_inputs() {
        let mut c = Circuit::new(1);
        let a = c.input(0);
        let g = c.and(a, Signal::one());
        c.add_output(g);
        assert_eq!(c.eval(&[true]), vec![true]);
        assert_eq!(c.eval(&[false]), vec![false]);
    }
}
