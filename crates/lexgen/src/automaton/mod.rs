//! # Automaton Module
//!
//! The compilation back half: NFA construction, subset construction,
//! DFA minimization, and mode combination.
//!
//! ## Overview
//!
//! Each stage consumes the previous stage's value and produces a new
//! one; nothing is shared or mutated across stages:
//!
//! - [`nfa::build`] - a mode's rules into an [`Nfa`] (Thompson
//!   construction)
//! - [`subset::construct`] - an [`Nfa`] into a [`Dfa`] (powerset
//!   construction with literal-preference ambiguity resolution)
//! - [`minimize::minimize`] - a [`Dfa`] into its minimal equivalent
//!   (partition refinement)
//! - [`combine::combine`] - per-mode DFAs into one
//!   [`CombinedAutomaton`] with a mode table
//!
//! Nodes are integer indices into flat state tables, so the cyclic
//! transition graphs involve no ownership cycles.

pub mod combine;
pub mod dfa;
pub mod minimize;
pub mod nfa;
pub mod subset;

pub use combine::{CombinedAutomaton, Mode, combine};
pub use dfa::Dfa;
pub use minimize::minimize;
pub use nfa::{Nfa, build as build_nfa};
pub use subset::construct;

use std::fmt;

/// Index of one node in an automaton's flat state table.
///
/// `u32` is sufficient for all practical automaton sizes; conversions
/// to `usize` for indexing are safe on all supported platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    /// The start node of every automaton
    pub const START: Self = Self(0);
    /// The reserved invalid sink, never a successor of the start node
    /// inside an NFA
    pub const INVALID: Self = Self(1);

    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
