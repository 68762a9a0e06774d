// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The context-sensitive, inclusion-based pointer-analysis solver.
//!
//! The solver alternates two drains until neither produces work: the
//! reachable-method queue (whose statement processor creates pointer-flow
//! structure and seeds the worklist) and the `(pointer, points-to)`
//! worklist (whose propagation discovers receiver objects, hence new call
//! edges, hence new reachable methods).

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

use log::*;

use super::context::ContextId;
use super::context_strategy::ContextSelector;
use super::cs_elems::{CSManager, CSMethodId, CSVar, Pointer};
use super::heap::HeapModel;
use super::result::PointerAnalysisResult;
use super::PointsTo;
use crate::graph::call_graph::CallGraph;
use crate::graph::pfg::{PointerFlowGraph, PointerId};
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::{CallKind, Invoke, Site, Stmt, StmtId};
use crate::ir::Program;
use crate::pta::cs_elems::{CSCallSiteId, CSObjId};
use crate::pts_set::points_to::PointsToSet;
use crate::pts_set::pt_data::PTData;
use crate::taint::TaintAnalysis;
use crate::util::chunked_queue;

pub struct PointerAnalysisSolver<'pta> {
    program: &'pta Program,
    selector: Box<dyn ContextSelector>,
    csm: CSManager,
    heap: HeapModel,
    pfg: PointerFlowGraph,
    pt_data: PTData<PointerId, CSObjId>,
    worklist: VecDeque<(PointerId, PointsTo)>,
    call_graph: CallGraph<CSMethodId, CSCallSiteId>,
    /// Methods whose statements have been processed; `add_reachable` is
    /// idempotent through this set.
    reachable: HashSet<CSMethodId>,
    /// Cursor over the call graph's reachable-method queue.
    rf_iter: chunked_queue::IterCopied<CSMethodId>,
    taint: Option<TaintAnalysis>,
}

impl<'pta> PointerAnalysisSolver<'pta> {
    pub fn new(
        program: &'pta Program,
        selector: Box<dyn ContextSelector>,
        taint: Option<TaintAnalysis>,
    ) -> Self {
        let call_graph = CallGraph::new();
        let rf_iter = call_graph.reach_funcs_iter();
        PointerAnalysisSolver {
            program,
            selector,
            csm: CSManager::new(),
            heap: HeapModel::new(),
            pfg: PointerFlowGraph::new(),
            pt_data: PTData::new(),
            worklist: VecDeque::new(),
            call_graph,
            reachable: HashSet::new(),
            rf_iter,
            taint,
        }
    }

    /// Runs the analysis to its fixpoint and returns the result.
    pub fn solve(mut self) -> PointerAnalysisResult {
        let now = Instant::now();
        self.initialize();
        self.analyze();
        info!(
            "pointer analysis completed in {}",
            humantime::format_duration(now.elapsed())
        );
        self.finish()
    }

    /// Seeds reachability with the entry method under the empty context.
    fn initialize(&mut self) {
        let main = self.program.main_method();
        let empty = self.csm.empty_ctx();
        let cs_main = self.csm.cs_method(empty, main);
        self.call_graph.add_node(cs_main);
    }

    /// The main loop: drain newly reachable methods, then worklist entries,
    /// until both are exhausted.
    fn analyze(&mut self) {
        self.process_reachable();
        while let Some((pointer, pts)) = self.worklist.pop_front() {
            self.process_entry(pointer, pts);
            self.process_reachable();
        }
    }

    fn process_reachable(&mut self) {
        while let Some(cs_method) = self.rf_iter.next() {
            self.add_reachable(cs_method);
        }
    }

    /// Scans the statements of a newly reachable method, creating PFG
    /// structure and seeding the worklist. Does not traverse the PFG.
    fn add_reachable(&mut self, cs_method: CSMethodId) {
        if !self.reachable.insert(cs_method) {
            return;
        }
        let data = self.csm.cs_method_data(cs_method);
        debug!(
            "processing {} in {:?}",
            self.program.method_name(data.method),
            self.csm.contexts.get(data.ctx)
        );
        if self.program.method(data.method).body.is_none() {
            return;
        }
        for s in self.program.body(data.method).stmt_ids() {
            self.process_stmt(data.ctx, data.method, s);
        }
    }

    fn process_stmt(&mut self, ctx: ContextId, method: MethodId, s: StmtId) {
        let program = self.program;
        match program.body(method).stmt(s) {
            Stmt::New { lhs, ty } => {
                let site = Site::new(method, s);
                let obj = self.heap.alloc_obj(site, *ty);
                let heap_ctx = self.selector.select_heap(&mut self.csm, ctx, obj);
                let cs_obj = self.csm.cs_obj(heap_ctx, obj);
                let lhs_ptr = self.var_ptr(ctx, *lhs);
                self.worklist.push_back((lhs_ptr, PointsTo::singleton(cs_obj)));
            }
            Stmt::Copy { lhs, rhs } | Stmt::Cast { lhs, rhs, .. } => {
                let src = self.var_ptr(ctx, *rhs);
                let dst = self.var_ptr(ctx, *lhs);
                self.add_pfg_edge(src, dst);
            }
            Stmt::LoadField {
                lhs, base: None, field,
            } => {
                let src = self.pfg.get_or_insert(Pointer::StaticField(*field));
                let dst = self.var_ptr(ctx, *lhs);
                self.add_pfg_edge(src, dst);
            }
            Stmt::StoreField {
                base: None, field, rhs,
            } => {
                let src = self.var_ptr(ctx, *rhs);
                let dst = self.pfg.get_or_insert(Pointer::StaticField(*field));
                self.add_pfg_edge(src, dst);
            }
            Stmt::Invoke(invoke) if invoke.kind == CallKind::Static => {
                self.process_static_call(ctx, method, s, invoke);
            }
            _ => {}
        }
    }

    fn process_static_call(&mut self, ctx: ContextId, caller: MethodId, s: StmtId, invoke: &Invoke) {
        let Some(callee) = self.program.resolve_callee(None, invoke) else {
            debug!("unresolvable static call at {:?}, skipped", Site::new(caller, s));
            return;
        };
        let site = Site::new(caller, s);
        let cs_site = self.csm.cs_call_site(ctx, site);
        let callee_ctx = self.selector.select_static(&mut self.csm, ctx, site, callee);
        let cs_caller = self.csm.cs_method(ctx, caller);
        let cs_callee = self.csm.cs_method(callee_ctx, callee);
        self.add_call_edge(invoke.kind, cs_site, cs_caller, cs_callee, invoke, ctx, callee_ctx);
    }

    /// Adds a call-graph edge; if new, binds arguments to parameters and
    /// returns to the result variable, and fires the taint hook.
    #[allow(clippy::too_many_arguments)]
    fn add_call_edge(
        &mut self,
        kind: CallKind,
        cs_site: CSCallSiteId,
        cs_caller: CSMethodId,
        cs_callee: CSMethodId,
        invoke: &Invoke,
        caller_ctx: ContextId,
        callee_ctx: ContextId,
    ) {
        if !self.call_graph.add_edge(kind, cs_site, cs_caller, cs_callee) {
            return;
        }
        let callee = self.csm.cs_method_data(cs_callee).method;
        let program = self.program;
        // Body-less callees (modeled library methods) still get the edge
        // and the taint hook, just no parameter binding.
        if let Some(body) = &program.method(callee).body {
            for (&arg, &param) in invoke.args.iter().zip(body.params.iter()) {
                let src = self.var_ptr(caller_ctx, arg);
                let dst = self.var_ptr(callee_ctx, param);
                self.add_pfg_edge(src, dst);
            }
            if let Some(result) = invoke.result {
                for &ret in &body.ret_vars {
                    let src = self.var_ptr(callee_ctx, ret);
                    let dst = self.var_ptr(caller_ctx, result);
                    self.add_pfg_edge(src, dst);
                }
            }
        }
        if let Some(taint) = self.taint.as_mut() {
            taint.on_new_call_edge(
                self.program,
                &mut self.csm,
                &mut self.heap,
                &mut self.pfg,
                &self.pt_data,
                &mut self.worklist,
                cs_site,
                callee,
            );
        }
    }

    /// One worklist entry: propagate, then react to the new objects of a
    /// variable pointer (field/array accesses and instance calls on it).
    fn process_entry(&mut self, pointer: PointerId, pts: PointsTo) {
        let delta = self.propagate(pointer, &pts);
        if delta.is_empty() {
            return;
        }
        if let Some(taint) = self.taint.as_mut() {
            taint.on_propagated(
                &mut self.csm,
                &mut self.heap,
                &mut self.worklist,
                pointer,
                &delta,
            );
        }
        let Pointer::Var(cs_var_id) = self.pfg.pointer(pointer) else {
            return;
        };
        let CSVar { ctx, var } = self.csm.cs_var_data(cs_var_id);
        let program = self.program;
        let method = program.var(var).method;

        for cs_obj in delta.iter() {
            for &s in program.var(var).store_fields() {
                let Stmt::StoreField { field, rhs, .. } = program.body(method).stmt(s) else {
                    unreachable!()
                };
                let src = self.var_ptr(ctx, *rhs);
                let dst = self.pfg.get_or_insert(Pointer::InstanceField(cs_obj, *field));
                self.add_pfg_edge(src, dst);
            }
            for &s in program.var(var).load_fields() {
                let Stmt::LoadField { lhs, field, .. } = program.body(method).stmt(s) else {
                    unreachable!()
                };
                let src = self.pfg.get_or_insert(Pointer::InstanceField(cs_obj, *field));
                let dst = self.var_ptr(ctx, *lhs);
                self.add_pfg_edge(src, dst);
            }
            for &s in program.var(var).store_arrays() {
                let Stmt::StoreArray { rhs, .. } = program.body(method).stmt(s) else {
                    unreachable!()
                };
                let src = self.var_ptr(ctx, *rhs);
                let dst = self.pfg.get_or_insert(Pointer::ArrayIndex(cs_obj));
                self.add_pfg_edge(src, dst);
            }
            for &s in program.var(var).load_arrays() {
                let Stmt::LoadArray { lhs, .. } = program.body(method).stmt(s) else {
                    unreachable!()
                };
                let src = self.pfg.get_or_insert(Pointer::ArrayIndex(cs_obj));
                let dst = self.var_ptr(ctx, *lhs);
                self.add_pfg_edge(src, dst);
            }
            for &s in program.var(var).invokes() {
                self.process_call(ctx, method, s, cs_obj);
            }
        }
    }

    /// `Δ := pts \ pt(p); pt(p) ∪= Δ`; successors are enqueued with the
    /// delta only.
    fn propagate(&mut self, pointer: PointerId, pts: &PointsTo) -> PointsTo {
        let delta = self.pt_data.union_delta(pointer, pts);
        if !delta.is_empty() {
            for succ in self.pfg.succs(pointer) {
                self.worklist.push_back((succ, delta.clone()));
            }
        }
        delta
    }

    /// An instance call on `recv`: dispatch on the receiver's class, select
    /// the callee context, seed `this`, then add the call edge. Seeding
    /// `this` first guarantees a method made reachable by this edge already
    /// sees its receiver.
    fn process_call(&mut self, ctx: ContextId, caller: MethodId, s: StmtId, recv: CSObjId) {
        let program = self.program;
        let site = Site::new(caller, s);
        let invoke = program.invoke_at(site);
        let recv_data = self.csm.cs_obj_data(recv);
        let recv_class = program.types().class_of(self.heap.obj(recv_data.obj).ty);
        let Some(callee) = program.resolve_callee(recv_class, invoke) else {
            debug!("unresolvable dispatch at {:?}, skipped", site);
            return;
        };
        let cs_site = self.csm.cs_call_site(ctx, site);
        let callee_ctx =
            self.selector
                .select_instance(&mut self.csm, &self.heap, ctx, site, recv_data, callee);
        if let Some(this) = program.method(callee).body.as_ref().and_then(|b| b.this) {
            let this_ptr = self.var_ptr(callee_ctx, this);
            self.worklist.push_back((this_ptr, PointsTo::singleton(recv)));
        }
        let cs_caller = self.csm.cs_method(ctx, caller);
        let cs_callee = self.csm.cs_method(callee_ctx, callee);
        self.add_call_edge(invoke.kind, cs_site, cs_caller, cs_callee, invoke, ctx, callee_ctx);
    }

    fn var_ptr(&mut self, ctx: ContextId, var: VarId) -> PointerId {
        let cs_var = self.csm.cs_var(ctx, var);
        self.pfg.get_or_insert(Pointer::Var(cs_var))
    }

    /// Adds a PFG edge; if new and the source already points somewhere,
    /// the target is enqueued with the source's current set.
    fn add_pfg_edge(&mut self, src: PointerId, dst: PointerId) {
        if self.pfg.add_edge(src, dst) {
            let pts = self.pt_data.pts(src);
            if !pts.is_empty() {
                let pts = pts.clone();
                self.worklist.push_back((dst, pts));
            }
        }
    }

    /// Packages the fixpoint into a [`PointerAnalysisResult`].
    fn finish(self) -> PointerAnalysisResult {
        info!(
            "reachable (method, context) pairs: {}, call edges: {}, pointers: {}, pfg edges: {}, pts entries: {}",
            self.reachable.len(),
            self.call_graph.num_edges(),
            self.pfg.num_pointers(),
            self.pfg.num_edges(),
            self.pt_data.total_pts_size(),
        );
        let taint_flows = self.taint.as_ref().map(|taint| {
            taint.collect_flows(self.program, &self.csm, &self.heap, &self.pfg, &self.pt_data)
        });
        PointerAnalysisResult::new(
            self.csm,
            self.heap,
            self.pfg,
            self.pt_data,
            self.call_graph,
            taint_flows,
        )
    }
}
