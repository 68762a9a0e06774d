// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The interface between an intra-procedural dataflow analysis and the
//! worklist solver.

use crate::graph::cfg::CfgNode;

/// An intra-procedural dataflow analysis over one method's CFG.
///
/// Transfer functions must be monotone in the fact lattice; the solver
/// otherwise has no termination guarantee.
pub trait DataflowAnalysis {
    type Fact: Clone + PartialEq;

    fn is_forward(&self) -> bool;

    /// The fact at the boundary (the entry for forward analyses, the exit
    /// for backward ones).
    fn boundary_fact(&self) -> Self::Fact;

    /// The fact every other program point starts from.
    fn initial_fact(&self) -> Self::Fact;

    /// Meets `fact` into `target`; returns true if `target` changed.
    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact) -> bool;

    /// Computes the out-fact of `node` from its in-fact; returns true if
    /// `out` changed.
    fn transfer(&self, node: CfgNode, input: &Self::Fact, out: &mut Self::Fact) -> bool;
}
