// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The inter-procedural control-flow graph.
//!
//! Nodes are the per-method CFG nodes qualified by their method; edges are
//! the four inter-procedural kinds the edge-transfer functions dispatch on.
//! The graph is built over the reachable part of a call graph, so building
//! it after pointer analysis yields the precise on-the-fly version.

use itertools::Itertools;
use petgraph::graph::{DefaultIx, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};
use std::collections::HashMap;

use super::call_graph::CallGraph;
use super::cfg::CfgNode;
use crate::ir::method::MethodId;
use crate::ir::stmt::Site;
use crate::ir::Program;

pub type IcfgNodeId = NodeIndex<DefaultIx>;

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct IcfgNode {
    pub method: MethodId,
    pub node: CfgNode,
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum IcfgEdge {
    /// An intra-procedural edge not leaving a call site.
    Normal,
    /// The intra-procedural edge from a call site to its return site.
    CallToReturn { site: Site },
    /// From a call site to a callee's entry.
    Call { site: Site, callee: MethodId },
    /// From a callee's exit back to a return site of the call.
    Return { site: Site, callee: MethodId },
}

pub struct Icfg {
    graph: Graph<IcfgNode, IcfgEdge>,
    node_map: HashMap<IcfgNode, IcfgNodeId>,
    entry_method: MethodId,
}

impl Icfg {
    /// Builds the ICFG of the methods reachable in `cg`.
    pub fn build(program: &Program, cg: &CallGraph<MethodId, Site>) -> Self {
        let mut icfg = Icfg {
            graph: Graph::new(),
            node_map: HashMap::new(),
            entry_method: program.main_method(),
        };

        let reachable = cg
            .reachable()
            .filter(|&m| program.method(m).body.is_some())
            .collect_vec();
        for &method in &reachable {
            for node in program.body(method).cfg.nodes() {
                icfg.add_node(IcfgNode { method, node });
            }
        }

        for &method in &reachable {
            let cfg = &program.body(method).cfg;
            for node in cfg.nodes() {
                let from = IcfgNode { method, node };
                let is_call = node
                    .stmt()
                    .is_some_and(|s| program.body(method).stmt(s).is_call());
                if !is_call {
                    for succ in cfg.succs(node) {
                        icfg.add_edge(from, IcfgNode { method, node: succ }, IcfgEdge::Normal);
                    }
                    continue;
                }

                let site = Site::new(method, node.stmt().unwrap());
                for succ in cfg.succs(node) {
                    icfg.add_edge(
                        from,
                        IcfgNode { method, node: succ },
                        IcfgEdge::CallToReturn { site },
                    );
                }
                for callee in cg.callees_of(site) {
                    if program.method(callee).body.is_none() {
                        continue;
                    }
                    icfg.add_edge(
                        from,
                        IcfgNode {
                            method: callee,
                            node: CfgNode::Entry,
                        },
                        IcfgEdge::Call { site, callee },
                    );
                    for succ in cfg.succs(node) {
                        icfg.add_edge(
                            IcfgNode {
                                method: callee,
                                node: CfgNode::Exit,
                            },
                            IcfgNode { method, node: succ },
                            IcfgEdge::Return { site, callee },
                        );
                    }
                }
            }
        }
        icfg
    }

    fn add_node(&mut self, node: IcfgNode) -> IcfgNodeId {
        match self.node_map.entry(node) {
            std::collections::hash_map::Entry::Occupied(o) => *o.get(),
            std::collections::hash_map::Entry::Vacant(v) => *v.insert(self.graph.add_node(node)),
        }
    }

    fn add_edge(&mut self, from: IcfgNode, to: IcfgNode, edge: IcfgEdge) {
        let from = self.node_map[&from];
        let to = self.node_map[&to];
        self.graph.add_edge(from, to, edge);
    }

    #[inline]
    pub fn node(&self, id: IcfgNodeId) -> IcfgNode {
        self.graph[id]
    }

    pub fn node_of(&self, method: MethodId, node: CfgNode) -> Option<IcfgNodeId> {
        self.node_map.get(&IcfgNode { method, node }).copied()
    }

    /// The boundary node: the entry method's synthetic entry.
    pub fn entry_node(&self) -> IcfgNodeId {
        self.node_map[&IcfgNode {
            method: self.entry_method,
            node: CfgNode::Entry,
        }]
    }

    pub fn entry_method(&self) -> MethodId {
        self.entry_method
    }

    /// All nodes in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = IcfgNodeId> {
        self.graph.node_indices()
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// Incoming edges of `id` with their sources, in insertion order.
    pub fn in_edges(&self, id: IcfgNodeId) -> Vec<(IcfgEdge, IcfgNodeId)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(id, Direction::Incoming)
            .map(|e| (*e.weight(), e.source()))
            .collect();
        edges.reverse();
        edges
    }

    pub fn succs(&self, id: IcfgNodeId) -> Vec<IcfgNodeId> {
        let mut succs: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        succs.reverse();
        succs
    }
}
