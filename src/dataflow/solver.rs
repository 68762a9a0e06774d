// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The generic intra-procedural worklist solver.

use std::collections::{HashMap, VecDeque};

use super::analysis::DataflowAnalysis;
use crate::graph::cfg::{CfgNode, ControlFlowGraph};

/// The in/out facts a solve computed for every CFG node.
pub struct DataflowResult<F> {
    in_facts: HashMap<CfgNode, F>,
    out_facts: HashMap<CfgNode, F>,
}

impl<F> DataflowResult<F> {
    pub fn in_fact(&self, node: CfgNode) -> &F {
        &self.in_facts[&node]
    }

    pub fn out_fact(&self, node: CfgNode) -> &F {
        &self.out_facts[&node]
    }
}

/// Solves `analysis` over `cfg` to a fixpoint.
///
/// Forward analyses recompute `IN(n)` as the meet over predecessors' OUT
/// facts; backward analyses run the same loop on the reversed graph. The
/// boundary node keeps its boundary fact and is never transferred.
pub fn solve<A: DataflowAnalysis>(cfg: &ControlFlowGraph, analysis: &A) -> DataflowResult<A::Fact> {
    let forward = analysis.is_forward();
    let boundary = if forward { cfg.entry() } else { cfg.exit() };

    let mut in_facts: HashMap<CfgNode, A::Fact> = HashMap::new();
    let mut out_facts: HashMap<CfgNode, A::Fact> = HashMap::new();
    for node in cfg.nodes() {
        in_facts.insert(node, analysis.initial_fact());
        out_facts.insert(node, analysis.initial_fact());
    }
    // In the backward direction "out" plays the role of the input fact.
    if forward {
        out_facts.insert(boundary, analysis.boundary_fact());
    } else {
        in_facts.insert(boundary, analysis.boundary_fact());
    }

    let mut worklist: VecDeque<CfgNode> = cfg.nodes().filter(|&n| n != boundary).collect();
    while let Some(node) = worklist.pop_front() {
        if forward {
            let mut input = analysis.initial_fact();
            for pred in cfg.preds(node) {
                analysis.meet_into(&out_facts[&pred], &mut input);
            }
            let out = out_facts.get_mut(&node).unwrap();
            let changed = analysis.transfer(node, &input, out);
            in_facts.insert(node, input);
            if changed {
                worklist.extend(cfg.succs(node));
            }
        } else {
            let mut input = analysis.initial_fact();
            for succ in cfg.succs(node) {
                analysis.meet_into(&in_facts[&succ], &mut input);
            }
            let in_fact = in_facts.get_mut(&node).unwrap();
            let changed = analysis.transfer(node, &input, in_fact);
            out_facts.insert(node, input);
            if changed {
                worklist.extend(cfg.preds(node));
            }
        }
    }

    DataflowResult {
        in_facts,
        out_facts,
    }
}
