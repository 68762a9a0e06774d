// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The pointer-flow graph: inclusion edges between pointers.
//!
//! An edge `s → t` means `pt(s) ⊆ pt(t)`. Node indices double as the
//! pointer identity space: points-to sets are keyed by [`PointerId`], and
//! the arena never shrinks during a solve.

use petgraph::graph::{DefaultIx, NodeIndex};
use petgraph::{Direction, Graph};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::pta::cs_elems::Pointer;
use crate::util::index::Idx;

/// Unique identifier of a pointer, an index into the PFG node arena.
pub type PointerId = NodeIndex<DefaultIx>;

impl Idx for PointerId {
    #[inline]
    fn new(idx: usize) -> Self {
        NodeIndex::new(idx)
    }

    #[inline]
    fn index(self) -> usize {
        self.index()
    }
}

pub struct PointerFlowGraph {
    graph: Graph<Pointer, ()>,
    pointer_map: HashMap<Pointer, PointerId>,
    edge_set: HashSet<(PointerId, PointerId)>,
}

impl PointerFlowGraph {
    pub fn new() -> Self {
        PointerFlowGraph {
            graph: Graph::new(),
            pointer_map: HashMap::new(),
            edge_set: HashSet::new(),
        }
    }

    /// Interns `pointer`, returning its stable id.
    pub fn get_or_insert(&mut self, pointer: Pointer) -> PointerId {
        match self.pointer_map.entry(pointer) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => *v.insert(self.graph.add_node(pointer)),
        }
    }

    pub fn get(&self, pointer: Pointer) -> Option<PointerId> {
        self.pointer_map.get(&pointer).copied()
    }

    #[inline]
    pub fn pointer(&self, id: PointerId) -> Pointer {
        self.graph[id]
    }

    /// Adds an inclusion edge; returns true if the edge is new.
    pub fn add_edge(&mut self, src: PointerId, dst: PointerId) -> bool {
        if !self.edge_set.insert((src, dst)) {
            return false;
        }
        self.graph.add_edge(src, dst, ());
        true
    }

    /// Successors of `id` in edge-insertion order.
    pub fn succs(&self, id: PointerId) -> Vec<PointerId> {
        let mut succs: Vec<_> = self
            .graph
            .neighbors_directed(id, Direction::Outgoing)
            .collect();
        succs.reverse();
        succs
    }

    /// All interned pointers in insertion order.
    pub fn pointer_ids(&self) -> impl Iterator<Item = PointerId> {
        self.graph.node_indices()
    }

    pub fn num_pointers(&self) -> usize {
        self.graph.node_count()
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }
}

impl Default for PointerFlowGraph {
    fn default() -> Self {
        Self::new()
    }
}
