// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Backward live-variable analysis; its result feeds the dead-code client.

use std::collections::HashSet;

use super::analysis::DataflowAnalysis;
use super::solver::{self, DataflowResult};
use crate::graph::cfg::CfgNode;
use crate::ir::method::{MethodId, VarId};
use crate::ir::Program;

pub const RESULT_ID: &str = "livevar";

pub struct LiveVariables<'a> {
    program: &'a Program,
    method: MethodId,
}

impl<'a> LiveVariables<'a> {
    pub fn new(program: &'a Program, method: MethodId) -> Self {
        LiveVariables { program, method }
    }

    pub fn analyze(&self) -> DataflowResult<HashSet<VarId>> {
        let cfg = &self.program.body(self.method).cfg;
        solver::solve(cfg, self)
    }
}

impl<'a> DataflowAnalysis for LiveVariables<'a> {
    type Fact = HashSet<VarId>;

    fn is_forward(&self) -> bool {
        false
    }

    fn boundary_fact(&self) -> HashSet<VarId> {
        HashSet::new()
    }

    fn initial_fact(&self) -> HashSet<VarId> {
        HashSet::new()
    }

    fn meet_into(&self, fact: &HashSet<VarId>, target: &mut HashSet<VarId>) -> bool {
        let before = target.len();
        target.extend(fact.iter().copied());
        target.len() != before
    }

    /// `IN = (OUT \ def) ∪ use`.
    fn transfer(&self, node: CfgNode, input: &HashSet<VarId>, out: &mut HashSet<VarId>) -> bool {
        let mut new_fact = input.clone();
        if let Some(s) = node.stmt() {
            let stmt = self.program.body(self.method).stmt(s);
            if let Some(def) = stmt.def() {
                new_fact.remove(&def);
            }
            new_fact.extend(stmt.uses());
        }
        if new_fact != *out {
            *out = new_fact;
            true
        } else {
            false
        }
    }
}
