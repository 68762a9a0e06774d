// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The inter-procedural worklist solver over the ICFG.

use std::collections::VecDeque;

use super::analysis::{InterDataflowAnalysis, SolverView};
use crate::graph::icfg::{Icfg, IcfgNodeId};

pub struct InterDataflowResult<F> {
    in_facts: Vec<F>,
    out_facts: Vec<F>,
}

impl<F> InterDataflowResult<F> {
    #[inline]
    pub fn in_fact(&self, node: IcfgNodeId) -> &F {
        &self.in_facts[node.index()]
    }

    #[inline]
    pub fn out_fact(&self, node: IcfgNodeId) -> &F {
        &self.out_facts[node.index()]
    }
}

/// Solves `analysis` over `icfg` to a fixpoint.
///
/// `IN(n)` is recomputed as the meet over the edge-transferred OUT facts of
/// the incoming edges; the boundary node keeps its boundary fact. Nodes a
/// transfer pushed through the [`SolverView`] are re-processed even when
/// their own input did not change.
pub fn solve<A: InterDataflowAnalysis>(
    icfg: &Icfg,
    analysis: &mut A,
) -> InterDataflowResult<A::Fact> {
    let n = icfg.num_nodes();
    let mut in_facts: Vec<A::Fact> = (0..n).map(|_| analysis.initial_fact()).collect();
    let mut out_facts: Vec<A::Fact> = (0..n).map(|_| analysis.initial_fact()).collect();

    let boundary = icfg.entry_node();
    out_facts[boundary.index()] = analysis.boundary_fact(icfg.entry_method());

    let mut worklist: VecDeque<IcfgNodeId> = icfg.node_ids().filter(|&id| id != boundary).collect();
    while let Some(node) = worklist.pop_front() {
        let mut input = analysis.initial_fact();
        for (edge, src) in icfg.in_edges(node) {
            let fact = analysis.transfer_edge(&edge, &out_facts[src.index()]);
            analysis.meet_into(&fact, &mut input);
        }
        let new_out = {
            let mut view = SolverView {
                out_facts: &out_facts,
                worklist: &mut worklist,
            };
            analysis.transfer_node(node, &input, &mut view)
        };
        in_facts[node.index()] = input;
        if new_out != out_facts[node.index()] {
            out_facts[node.index()] = new_out;
            worklist.extend(icfg.succs(node));
        }
    }

    InterDataflowResult {
        in_facts,
        out_facts,
    }
}
