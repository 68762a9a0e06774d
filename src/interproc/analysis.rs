// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The interface between an inter-procedural dataflow analysis and the
//! ICFG worklist solver.

use std::collections::VecDeque;

use crate::graph::icfg::{IcfgEdge, IcfgNodeId};
use crate::ir::method::MethodId;

/// The solver state a node transfer may consult: every node's current OUT
/// fact, and the worklist for re-activating nodes (used by the alias-aware
/// constant propagation to wake matching loads after a store changed).
pub struct SolverView<'a, F> {
    pub(crate) out_facts: &'a [F],
    pub(crate) worklist: &'a mut VecDeque<IcfgNodeId>,
}

impl<'a, F> SolverView<'a, F> {
    #[inline]
    pub fn out_fact(&self, node: IcfgNodeId) -> &F {
        &self.out_facts[node.index()]
    }

    #[inline]
    pub fn push(&mut self, node: IcfgNodeId) {
        self.worklist.push_back(node);
    }
}

/// An inter-procedural dataflow analysis over the ICFG. All transfers must
/// be monotone.
pub trait InterDataflowAnalysis {
    type Fact: Clone + PartialEq;

    /// The fact at the entry of the program's entry method.
    fn boundary_fact(&self, entry: MethodId) -> Self::Fact;

    fn initial_fact(&self) -> Self::Fact;

    /// Meets `fact` into `target`; returns true if `target` changed.
    fn meet_into(&self, fact: &Self::Fact, target: &mut Self::Fact) -> bool;

    /// Applies the edge-transfer function of `edge` to the source's OUT
    /// fact.
    fn transfer_edge(&self, edge: &IcfgEdge, out_fact: &Self::Fact) -> Self::Fact;

    /// Computes the new OUT fact of `node`.
    fn transfer_node(
        &mut self,
        node: IcfgNodeId,
        input: &Self::Fact,
        view: &mut SolverView<'_, Self::Fact>,
    ) -> Self::Fact;
}
