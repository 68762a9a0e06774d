// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Dead-code detection: a client of constant propagation and live
//! variables. Reports control-flow-unreachable statements and dead
//! assignments.

use std::collections::{BTreeSet, HashSet, VecDeque};

use super::const_prop::eval_rel;
use super::lattice::{CPFact, Value};
use super::solver::DataflowResult;
use crate::graph::cfg::{CfgEdgeKind, CfgNode};
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::{BinaryOp, Stmt, StmtId};
use crate::ir::Program;

pub const RESULT_ID: &str = "deadcode";

/// Finds the dead statements of one method.
///
/// Branches whose condition constant-evaluates are followed only along the
/// matching edge, so statements reachable exclusively through the dead edge
/// are reported. An assignment is dead when its target is not live after
/// the statement and the right-hand side cannot have a side effect.
pub fn find_dead_code(
    program: &Program,
    method: MethodId,
    const_facts: &DataflowResult<CPFact>,
    live_facts: &DataflowResult<HashSet<VarId>>,
) -> BTreeSet<StmtId> {
    let body = program.body(method);
    let cfg = &body.cfg;

    let mut visited: HashSet<CfgNode> = HashSet::new();
    let mut queue: VecDeque<CfgNode> = VecDeque::new();
    let mut dead: BTreeSet<StmtId> = BTreeSet::new();

    queue.push_back(cfg.entry());
    while let Some(node) = queue.pop_front() {
        if !visited.insert(node) {
            continue;
        }
        let stmt = node.stmt().map(|s| body.stmt(s));
        match stmt {
            Some(Stmt::If { x, op, y, .. }) => {
                let input = const_facts.in_fact(node);
                match eval_rel(*op, input.get(*x), input.get(*y)) {
                    Some(taken) => {
                        let kind = if taken {
                            CfgEdgeKind::IfTrue
                        } else {
                            CfgEdgeKind::IfFalse
                        };
                        for (edge, succ) in cfg.succ_edges(node) {
                            if edge == kind {
                                queue.push_back(succ);
                            }
                        }
                    }
                    None => queue.extend(cfg.succs(node)),
                }
            }
            Some(Stmt::Switch { key, cases, .. }) => {
                let input = const_facts.in_fact(node);
                match input.get(*key) {
                    Value::Const(k) => {
                        let matched = if cases.iter().any(|&(v, _)| v == k) {
                            CfgEdgeKind::SwitchCase(k)
                        } else {
                            CfgEdgeKind::SwitchDefault
                        };
                        for (edge, succ) in cfg.succ_edges(node) {
                            if edge == matched {
                                queue.push_back(succ);
                            }
                        }
                    }
                    _ => queue.extend(cfg.succs(node)),
                }
            }
            _ => queue.extend(cfg.succs(node)),
        }

        if let Some(s) = node.stmt() {
            let stmt = body.stmt(s);
            if let Some(def) = stmt.def() {
                if !live_facts.out_fact(node).contains(&def) && side_effect_free(stmt) {
                    dead.insert(s);
                }
            }
        }
    }

    // Whatever the pruned traversal never reached is dead, the synthetic
    // entry/exit excluded.
    for s in body.stmt_ids() {
        if !visited.contains(&CfgNode::Stmt(s)) {
            dead.insert(s);
        }
    }
    dead
}

/// True if re-executing the right-hand side can be observed: allocations,
/// casts, heap accesses, calls, and division/remainder (which may throw)
/// all count as effects.
fn side_effect_free(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Copy { .. } | Stmt::AssignLiteral { .. } => true,
        Stmt::Binary { op, .. } => !matches!(op, BinaryOp::Div | BinaryOp::Rem),
        _ => false,
    }
}
