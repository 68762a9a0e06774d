// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Taint analysis: a plugin attached to the pointer-analysis solver.
//!
//! Sources seed synthetic taint objects at their call sites; transfers
//! short-circuit taint across calls the analysis does not enter; sinks are
//! read off at the end. A taint object keeps the identity of its source
//! call while its logical type changes at each transfer.

use std::collections::{BTreeSet, HashMap, VecDeque};

use log::*;

use self::config::TaintConfig;
use crate::graph::pfg::{PointerFlowGraph, PointerId};
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::{Invoke, Site};
use crate::ir::types::TypeId;
use crate::ir::Program;
use crate::pta::cs_elems::{CSCallSiteId, CSManager, CSObjId, Pointer};
use crate::pta::heap::HeapModel;
use crate::pta::PointsTo;
use crate::pts_set::points_to::PointsToSet;
use crate::pts_set::pt_data::PTData;

pub mod config;

/// The stable id taint flows are stored under.
pub const RESULT_ID: &str = "taint";

/// A witnessed flow from a source call to a sink call's argument.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct TaintFlow {
    pub source: Site,
    pub sink: Site,
    pub index: usize,
}

pub struct TaintAnalysis {
    config: TaintConfig,
    /// Taint-transfer edges: propagated taints of the key pointer re-seed
    /// the value pointers with the recorded type.
    transfer_edges: HashMap<PointerId, Vec<(PointerId, TypeId)>>,
    /// Sink argument positions discovered at reachable call sites.
    sink_calls: BTreeSet<(CSCallSiteId, usize)>,
}

impl TaintAnalysis {
    pub fn new(config: TaintConfig) -> Self {
        TaintAnalysis {
            config,
            transfer_edges: HashMap::new(),
            sink_calls: BTreeSet::new(),
        }
    }

    /// Hook: a new call-graph edge to `callee` appeared at `cs_site`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn on_new_call_edge(
        &mut self,
        program: &Program,
        csm: &mut CSManager,
        heap: &mut HeapModel,
        pfg: &mut PointerFlowGraph,
        pt_data: &PTData<PointerId, CSObjId>,
        worklist: &mut VecDeque<(PointerId, PointsTo)>,
        cs_site: CSCallSiteId,
        callee: MethodId,
    ) {
        let cs = csm.cs_call_site_data(cs_site);
        let invoke = program.invoke_at(cs.site);

        if let Some(&ty) = self.config.sources.get(&callee) {
            if let Some(result) = invoke.result {
                debug!("taint source at {:?}", cs.site);
                let obj = heap.taint_obj(cs.site, ty);
                let cs_obj = csm.cs_obj(csm.empty_ctx(), obj);
                let cs_var = csm.cs_var(cs.ctx, result);
                let pointer = pfg.get_or_insert(Pointer::Var(cs_var));
                worklist.push_back((pointer, PointsTo::singleton(cs_obj)));
            }
        }

        for &(method, index) in &self.config.sinks {
            if method == callee {
                self.sink_calls.insert((cs_site, index));
            }
        }

        let Some(transfers) = self.config.transfers.get(&callee) else {
            return;
        };
        for &transfer in transfers {
            let Some(from) = index_var(invoke, transfer.from) else {
                continue;
            };
            let Some(to) = index_var(invoke, transfer.to) else {
                continue;
            };
            let from_ptr = pfg.get_or_insert(Pointer::Var(csm.cs_var(cs.ctx, from)));
            let to_ptr = pfg.get_or_insert(Pointer::Var(csm.cs_var(cs.ctx, to)));
            let edges = self.transfer_edges.entry(from_ptr).or_default();
            if !edges.contains(&(to_ptr, transfer.ty)) {
                edges.push((to_ptr, transfer.ty));
            }
            // Taints already sitting on the from-pointer transfer now.
            let seeded = retype_taints(csm, heap, pt_data.pts(from_ptr), transfer.ty);
            if !seeded.is_empty() {
                worklist.push_back((to_ptr, seeded));
            }
        }
    }

    /// Hook: `pointer` received the new objects `delta`. Only the delta is
    /// re-seeded along transfer edges, so taint growth stays linear.
    pub(crate) fn on_propagated(
        &mut self,
        csm: &mut CSManager,
        heap: &mut HeapModel,
        worklist: &mut VecDeque<(PointerId, PointsTo)>,
        pointer: PointerId,
        delta: &PointsTo,
    ) {
        let Some(edges) = self.transfer_edges.get(&pointer) else {
            return;
        };
        for &(to_ptr, ty) in edges {
            let seeded = retype_taints(csm, heap, delta, ty);
            if !seeded.is_empty() {
                worklist.push_back((to_ptr, seeded));
            }
        }
    }

    /// Reads the points-to sets of the recorded sink arguments and emits
    /// one flow per tainted object, ordered by `(source, sink, index)`.
    pub(crate) fn collect_flows(
        &self,
        program: &Program,
        csm: &CSManager,
        heap: &HeapModel,
        pfg: &PointerFlowGraph,
        pt_data: &PTData<PointerId, CSObjId>,
    ) -> Vec<TaintFlow> {
        let mut flows = BTreeSet::new();
        for &(cs_site, index) in &self.sink_calls {
            let cs = csm.cs_call_site_data(cs_site);
            let invoke = program.invoke_at(cs.site);
            let Some(&arg) = invoke.args.get(index) else {
                warn!("sink index {} out of range at {:?}", index, cs.site);
                continue;
            };
            let Some(cs_var) = csm.find_cs_var(cs.ctx, arg) else {
                continue;
            };
            let Some(pointer) = pfg.get(Pointer::Var(cs_var)) else {
                continue;
            };
            for cs_obj in pt_data.pts(pointer).iter() {
                if let Some(source) = heap.taint_source(csm.cs_obj_data(cs_obj).obj) {
                    flows.insert(TaintFlow {
                        source,
                        sink: cs.site,
                        index,
                    });
                }
            }
        }
        info!("taint analysis found {} flow(s)", flows.len());
        flows.into_iter().collect()
    }
}

/// The taints within `objs`, re-typed to `ty` with their source preserved.
fn retype_taints(
    csm: &mut CSManager,
    heap: &mut HeapModel,
    objs: &PointsTo,
    ty: TypeId,
) -> PointsTo {
    let mut seeded = PointsTo::new();
    for cs_obj in objs.iter() {
        if let Some(source) = heap.taint_source(csm.cs_obj_data(cs_obj).obj) {
            let retyped = heap.taint_obj(source, ty);
            seeded.insert(csm.cs_obj(csm.empty_ctx(), retyped));
        }
    }
    seeded
}

/// Maps a transfer index (`RESULT`, `BASE`, or an argument position) to the
/// corresponding variable of a call site.
fn index_var(invoke: &Invoke, index: i32) -> Option<VarId> {
    match index {
        config::RESULT => invoke.result,
        config::BASE => invoke.recv,
        i if i >= 0 => invoke.args.get(i as usize).copied(),
        _ => None,
    }
}
