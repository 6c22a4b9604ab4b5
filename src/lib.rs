//! # transduce-rs: Don't-Care-Based Logic Optimization in Rust
//!
//! **`transduce-rs`** implements the transduction method for multi-level
//! logic networks: it computes, per gate, the set of *permissible functions*
//! (everything the gate could compute without changing any primary output)
//! and uses that freedom to delete redundant wires, resubstitute existing
//! signals, merge, decompose, and factor shared structure.
//!
//! ## Architecture
//!
//! - **Manager-Centric Function Store**: All boolean functions live in one
//!   [`Store`][crate::store::Store] as hash-consed truth tables, referenced
//!   through lightweight signed [`Ref`][crate::reference::Ref] handles.
//!   Hash consing makes semantic equality an integer comparison, which the
//!   rewrite loops rely on to detect convergence.
//! - **Mutable Network**: The [`Transduction`][crate::network::Transduction]
//!   engine owns a multi-fanin AND network with per-edge complement flags
//!   ([`Signal`][crate::signal::Signal]) and per-edge don't-care
//!   annotations, kept consistent lazily through dirty flags.
//! - **Two Don't-Care Engines**: CSPF (compatible, conservative, cheap) and
//!   MSPF (exact, handles reconvergent fanout by double simulation).
//! - **Snapshot Rollback**: Speculative rewrites are guarded by deep
//!   [`Snapshot`][crate::network::Snapshot]s, so a non-improving attempt is
//!   undone wholesale.
//!
//! ## Basic Usage
//!
//! ```rust
//! use transduce_rs::circuit::Circuit;
//! use transduce_rs::network::{Config, Transduction};
//!
//! // Build a small two-fanin circuit: out = (a & b) & (a & c)
//! let mut circuit = Circuit::new(3);
//! let a = circuit.input(0);
//! let b = circuit.input(1);
//! let c = circuit.input(2);
//! let ab = circuit.and(a, b);
//! let ac = circuit.and(a, c);
//! let out = circuit.and(ab, ac);
//! circuit.add_output(out);
//!
//! // Optimize and export.
//! let mut t = Transduction::new(&circuit, Config::default());
//! t.optimize(true, false, false, true, true);
//! assert!(t.verify());
//! let optimized = t.to_circuit();
//! assert!(optimized.num_gates() <= circuit.num_gates());
//! ```

pub mod cache;
pub mod circuit;
pub mod network;
pub mod reference;
pub mod signal;
pub mod store;
pub mod utils;

mod cspf;
mod decompose;
mod merge;
mod mspf;
mod resub;
mod script;
