// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! A call graph generic over its function and call-site representations.
//!
//! The class-hierarchy builder instantiates it with plain method ids and
//! statement sites; the pointer analysis instantiates it with
//! context-sensitive ids. Functions that enter the graph are pushed onto an
//! append-only reachable queue, which the solvers drain through a
//! [`chunked_queue::IterCopied`] cursor while the graph keeps growing.

use petgraph::graph::{DefaultIx, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::ir::stmt::CallKind;
use crate::util::chunked_queue::{self, ChunkedQueue};

/// Unique identifiers for call graph nodes.
pub type CGNodeId = NodeIndex<DefaultIx>;
/// Unique identifiers for call graph edges.
pub type CGEdgeId = EdgeIndex<DefaultIx>;

#[derive(Debug)]
pub struct CallGraphEdge<S> {
    pub kind: CallKind,
    pub callsite: S,
}

pub struct CallGraph<F, S> {
    /// The graph structure capturing call relationships.
    graph: Graph<F, CallGraphEdge<S>>,
    /// A map from functions to their corresponding call graph nodes.
    func_nodes: HashMap<F, CGNodeId>,
    /// A map from call sites to their outgoing call edges.
    callsite_edges: HashMap<S, Vec<CGEdgeId>>,
    /// Edge identity for deduplication.
    edge_set: HashSet<(S, F)>,
    /// A queue of functions in reachability order.
    reach_funcs: ChunkedQueue<F>,
}

impl<F, S> CallGraph<F, S>
where
    F: Copy + Eq + Hash + Debug,
    S: Copy + Eq + Hash + Debug,
{
    pub fn new() -> Self {
        CallGraph {
            graph: Graph::new(),
            func_nodes: HashMap::new(),
            callsite_edges: HashMap::new(),
            edge_set: HashSet::new(),
            reach_funcs: ChunkedQueue::new(),
        }
    }

    /// Adds a function node, marking it reachable.
    pub fn add_node(&mut self, func: F) {
        self.get_or_insert_node(func);
    }

    fn get_or_insert_node(&mut self, func: F) -> CGNodeId {
        match self.func_nodes.entry(func) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                self.reach_funcs.push(func);
                *v.insert(self.graph.add_node(func))
            }
        }
    }

    pub fn contains(&self, func: F) -> bool {
        self.func_nodes.contains_key(&func)
    }

    /// Adds a call edge. Both endpoints become reachable. Returns false if
    /// an edge from `callsite` to `callee` already existed.
    pub fn add_edge(&mut self, kind: CallKind, callsite: S, caller: F, callee: F) -> bool {
        let caller_node = self.get_or_insert_node(caller);
        let callee_node = self.get_or_insert_node(callee);
        if !self.edge_set.insert((callsite, callee)) {
            return false;
        }
        let edge_id = self
            .graph
            .add_edge(caller_node, callee_node, CallGraphEdge { kind, callsite });
        self.callsite_edges.entry(callsite).or_default().push(edge_id);
        true
    }

    pub fn has_edge(&self, callsite: S, callee: F) -> bool {
        self.edge_set.contains(&(callsite, callee))
    }

    /// The callees of `callsite` in edge-insertion order.
    pub fn callees_of(&self, callsite: S) -> Vec<F> {
        match self.callsite_edges.get(&callsite) {
            Some(edges) => edges
                .iter()
                .filter_map(|&e| self.graph.edge_endpoints(e))
                .map(|(_, callee)| self.graph[callee])
                .collect(),
            None => Vec::new(),
        }
    }

    /// The call edges leaving `func`: `(kind, callsite, callee)`.
    pub fn callees_from(&self, func: F) -> Vec<(CallKind, S, F)> {
        let Some(&node) = self.func_nodes.get(&func) else {
            return Vec::new();
        };
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.weight().kind, e.weight().callsite, self.graph[e.target()]))
            .collect();
        edges.reverse();
        edges
    }

    /// All edges as `(kind, callsite, caller, callee)`, in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (CallKind, S, F, F)> + '_ {
        self.graph.edge_indices().map(move |e| {
            let (caller, callee) = self.graph.edge_endpoints(e).unwrap();
            let weight = &self.graph[e];
            (
                weight.kind,
                weight.callsite,
                self.graph[caller],
                self.graph[callee],
            )
        })
    }

    /// Reachable functions in the order they were discovered.
    pub fn reachable(&self) -> impl Iterator<Item = F> + '_ {
        self.reach_funcs.iter_copied()
    }

    /// A cursor over the reachable-function queue that keeps yielding
    /// functions added after its creation.
    pub fn reach_funcs_iter(&self) -> chunked_queue::IterCopied<F> {
        self.reach_funcs.iter_copied()
    }

    pub fn num_funcs(&self) -> usize {
        self.func_nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }
}

impl<F, S> Default for CallGraph<F, S>
where
    F: Copy + Eq + Hash + Debug,
    S: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
