// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The intra-procedural control-flow graph of a method body.
//!
//! Nodes are statements plus a synthetic entry and exit. Successor and
//! predecessor iteration is in edge-insertion order, which the solvers rely
//! on for determinism.

use std::collections::HashMap;

use petgraph::graph::{DefaultIx, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};

use crate::ir::stmt::{Stmt, StmtId};
use crate::util::index::Idx;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CfgNode {
    Entry,
    Stmt(StmtId),
    Exit,
}

impl CfgNode {
    pub fn stmt(self) -> Option<StmtId> {
        match self {
            CfgNode::Stmt(s) => Some(s),
            CfgNode::Entry | CfgNode::Exit => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CfgEdgeKind {
    Fallthrough,
    Goto,
    IfTrue,
    IfFalse,
    SwitchCase(i32),
    SwitchDefault,
}

pub struct ControlFlowGraph {
    graph: Graph<CfgNode, CfgEdgeKind, petgraph::Directed, DefaultIx>,
    node_map: HashMap<CfgNode, NodeIndex>,
}

impl ControlFlowGraph {
    /// Builds the CFG of a statement list. Fallthrough edges connect a
    /// statement to its successor; `If`, `Goto`, `Switch` and `Return`
    /// statements contribute their explicit edges instead.
    pub fn build(stmts: &[Stmt]) -> Self {
        let mut cfg = ControlFlowGraph {
            graph: Graph::new(),
            node_map: HashMap::new(),
        };
        cfg.add_node(CfgNode::Entry);
        for i in 0..stmts.len() {
            cfg.add_node(CfgNode::Stmt(StmtId::new(i)));
        }
        cfg.add_node(CfgNode::Exit);

        let next_of = |i: usize| {
            if i + 1 < stmts.len() {
                CfgNode::Stmt(StmtId::new(i + 1))
            } else {
                CfgNode::Exit
            }
        };

        let first = if stmts.is_empty() {
            CfgNode::Exit
        } else {
            CfgNode::Stmt(StmtId::new(0))
        };
        cfg.add_edge(CfgNode::Entry, first, CfgEdgeKind::Fallthrough);

        for (i, stmt) in stmts.iter().enumerate() {
            let node = CfgNode::Stmt(StmtId::new(i));
            match stmt {
                Stmt::Goto { target } => {
                    cfg.add_edge(node, CfgNode::Stmt(*target), CfgEdgeKind::Goto);
                }
                Stmt::If { target, .. } => {
                    cfg.add_edge(node, CfgNode::Stmt(*target), CfgEdgeKind::IfTrue);
                    cfg.add_edge(node, next_of(i), CfgEdgeKind::IfFalse);
                }
                Stmt::Switch {
                    cases,
                    default_target,
                    ..
                } => {
                    for (value, target) in cases {
                        cfg.add_edge(
                            node,
                            CfgNode::Stmt(*target),
                            CfgEdgeKind::SwitchCase(*value),
                        );
                    }
                    cfg.add_edge(
                        node,
                        CfgNode::Stmt(*default_target),
                        CfgEdgeKind::SwitchDefault,
                    );
                }
                Stmt::Return { .. } => {
                    cfg.add_edge(node, CfgNode::Exit, CfgEdgeKind::Fallthrough);
                }
                _ => {
                    cfg.add_edge(node, next_of(i), CfgEdgeKind::Fallthrough);
                }
            }
        }
        cfg
    }

    fn add_node(&mut self, node: CfgNode) -> NodeIndex {
        let id = self.graph.add_node(node);
        self.node_map.insert(node, id);
        id
    }

    fn add_edge(&mut self, from: CfgNode, to: CfgNode, kind: CfgEdgeKind) {
        let from = self.node_map[&from];
        let to = self.node_map[&to];
        self.graph.add_edge(from, to, kind);
    }

    pub fn entry(&self) -> CfgNode {
        CfgNode::Entry
    }

    pub fn exit(&self) -> CfgNode {
        CfgNode::Exit
    }

    /// All nodes in insertion order: entry, statements, exit.
    pub fn nodes(&self) -> impl Iterator<Item = CfgNode> + '_ {
        self.graph.node_indices().map(|i| self.graph[i])
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    pub fn preds(&self, node: CfgNode) -> Vec<CfgNode> {
        self.neighbors(node, Direction::Incoming)
    }

    pub fn succs(&self, node: CfgNode) -> Vec<CfgNode> {
        self.neighbors(node, Direction::Outgoing)
    }

    /// Outgoing edges of `node` with their kinds, in insertion order.
    pub fn succ_edges(&self, node: CfgNode) -> Vec<(CfgEdgeKind, CfgNode)> {
        let id = self.node_map[&node];
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (*e.weight(), self.graph[e.target()]))
            .collect();
        // petgraph iterates edges most-recent-first; restore insertion order.
        edges.reverse();
        edges
    }

    fn neighbors(&self, node: CfgNode, dir: Direction) -> Vec<CfgNode> {
        let id = self.node_map[&node];
        let mut nodes: Vec<_> = self
            .graph
            .neighbors_directed(id, dir)
            .map(|n| self.graph[n])
            .collect();
        nodes.reverse();
        nodes
    }
}
