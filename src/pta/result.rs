// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The packaged outcome of a pointer-analysis run: points-to sets, the
//! context-sensitive call graph, and the context-insensitive projections
//! downstream analyses consume.

use std::collections::HashMap;

use super::cs_elems::{CSCallSiteId, CSManager, CSMethodId, CSObjId, Pointer};
use super::heap::{HeapModel, Obj, ObjId};
use super::PointsTo;
use crate::graph::call_graph::CallGraph;
use crate::graph::pfg::{PointerFlowGraph, PointerId};
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::Site;
use crate::pts_set::points_to::{HybridPointsToSet, PointsToSet};
use crate::pts_set::pt_data::PTData;
use crate::taint::TaintFlow;

pub struct PointerAnalysisResult {
    csm: CSManager,
    heap: HeapModel,
    pfg: PointerFlowGraph,
    pt_data: PTData<PointerId, CSObjId>,
    call_graph: CallGraph<CSMethodId, CSCallSiteId>,
    ci_call_graph: CallGraph<MethodId, Site>,
    /// Context-insensitive view: per-variable sets of abstract objects,
    /// merged over variable and heap contexts.
    ci_pts: HashMap<VarId, HybridPointsToSet<ObjId>>,
    /// Reverse of `ci_pts`, in first-discovery order.
    ci_rev: HashMap<ObjId, Vec<VarId>>,
    taint_flows: Option<Vec<TaintFlow>>,
    empty: HybridPointsToSet<ObjId>,
}

impl PointerAnalysisResult {
    pub(crate) fn new(
        csm: CSManager,
        heap: HeapModel,
        pfg: PointerFlowGraph,
        pt_data: PTData<PointerId, CSObjId>,
        call_graph: CallGraph<CSMethodId, CSCallSiteId>,
        taint_flows: Option<Vec<TaintFlow>>,
    ) -> Self {
        let mut ci_call_graph = CallGraph::new();
        for cs_method in call_graph.reachable() {
            ci_call_graph.add_node(csm.cs_method_data(cs_method).method);
        }
        for (kind, cs_site, cs_caller, cs_callee) in call_graph.edges() {
            ci_call_graph.add_edge(
                kind,
                csm.cs_call_site_data(cs_site).site,
                csm.cs_method_data(cs_caller).method,
                csm.cs_method_data(cs_callee).method,
            );
        }

        let mut ci_pts: HashMap<VarId, HybridPointsToSet<ObjId>> = HashMap::new();
        let mut ci_rev: HashMap<ObjId, Vec<VarId>> = HashMap::new();
        for cs_var_id in csm.cs_var_ids() {
            let Some(pointer) = pfg.get(Pointer::Var(cs_var_id)) else {
                continue;
            };
            let var = csm.cs_var_data(cs_var_id).var;
            for cs_obj in pt_data.pts(pointer).iter() {
                let obj = csm.cs_obj_data(cs_obj).obj;
                if ci_pts.entry(var).or_insert_with(HybridPointsToSet::new).insert(obj) {
                    ci_rev.entry(obj).or_default().push(var);
                }
            }
        }

        PointerAnalysisResult {
            csm,
            heap,
            pfg,
            pt_data,
            call_graph,
            ci_call_graph,
            ci_pts,
            ci_rev,
            taint_flows,
            empty: HybridPointsToSet::new(),
        }
    }

    /// The context-sensitive call graph.
    pub fn cs_call_graph(&self) -> &CallGraph<CSMethodId, CSCallSiteId> {
        &self.call_graph
    }

    /// The call graph projected onto methods and sites.
    pub fn call_graph(&self) -> &CallGraph<MethodId, Site> {
        &self.ci_call_graph
    }

    pub fn csm(&self) -> &CSManager {
        &self.csm
    }

    pub fn heap(&self) -> &HeapModel {
        &self.heap
    }

    pub fn obj(&self, id: ObjId) -> &Obj {
        self.heap.obj(id)
    }

    /// The merged points-to set of a variable over all its contexts.
    pub fn pts_of_var(&self, var: VarId) -> &HybridPointsToSet<ObjId> {
        self.ci_pts.get(&var).unwrap_or(&self.empty)
    }

    /// All variables with a non-empty points-to set.
    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.ci_pts.keys().copied()
    }

    /// The variables that may point to `obj`, in discovery order.
    pub fn vars_pointing_to(&self, obj: ObjId) -> &[VarId] {
        self.ci_rev.get(&obj).map_or(&[], Vec::as_slice)
    }

    /// Do `a` and `b` share an abstract object?
    pub fn may_alias(&self, a: VarId, b: VarId) -> bool {
        let pts_a = self.pts_of_var(a);
        self.pts_of_var(b).iter().any(|obj| pts_a.contains(obj))
    }

    /// The points-to set of a context-qualified variable, if interned.
    pub fn pts_of_cs_var(
        &self,
        ctx: super::context::ContextId,
        var: VarId,
    ) -> Option<&PointsTo> {
        let cs_var = self.csm.find_cs_var(ctx, var)?;
        let pointer = self.pfg.get(Pointer::Var(cs_var))?;
        Some(self.pt_data.pts(pointer))
    }

    /// Taint flows, present when the solve ran with a taint configuration.
    pub fn taint_flows(&self) -> Option<&[TaintFlow]> {
        self.taint_flows.as_deref()
    }
}
