// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Class-hierarchy-analysis call-graph construction.
//!
//! CHA resolves a call site from the declared type alone: virtual calls
//! dispatch at every concrete class in the subclass closure, interface
//! calls additionally traverse sub-interfaces and implementers. The result
//! over-approximates any points-to-based call graph.

use itertools::Itertools;
use log::*;

use crate::graph::call_graph::CallGraph;
use crate::ir::hierarchy::ClassId;
use crate::ir::method::MethodId;
use crate::ir::stmt::{CallKind, Invoke, Site, Stmt};
use crate::ir::Program;

pub const RESULT_ID: &str = "cha";

/// Builds the call graph reachable from `entry` by class-hierarchy
/// analysis.
pub fn build_call_graph(program: &Program, entry: MethodId) -> CallGraph<MethodId, Site> {
    let mut cg: CallGraph<MethodId, Site> = CallGraph::new();
    let mut rf_iter = cg.reach_funcs_iter();
    cg.add_node(entry);

    while let Some(method) = rf_iter.next() {
        if program.method(method).body.is_none() {
            continue;
        }
        let body = program.body(method);
        for s in body.stmt_ids() {
            let Stmt::Invoke(invoke) = body.stmt(s) else {
                continue;
            };
            let site = Site::new(method, s);
            for callee in resolve(program, invoke) {
                cg.add_edge(invoke.kind, site, method, callee);
            }
        }
    }

    info!(
        "CHA call graph: {} reachable methods, {} edges",
        cg.num_funcs(),
        cg.num_edges()
    );
    cg
}

/// Resolves the possible targets of a call site by class hierarchy alone,
/// deduplicated in discovery order. Unresolvable dispatch yields an empty
/// set; the call is skipped.
pub fn resolve(program: &Program, invoke: &Invoke) -> Vec<MethodId> {
    let mut callees = Vec::new();
    match invoke.kind {
        CallKind::Static | CallKind::Special => {
            if let Some(m) = program.dispatch(invoke.declared, invoke.sig) {
                push_unique(&mut callees, m);
            }
        }
        CallKind::Virtual | CallKind::Dynamic => {
            for class in program.hierarchy().subclass_closure(invoke.declared) {
                if let Some(m) = dispatch_at_concrete(program, class, invoke) {
                    push_unique(&mut callees, m);
                }
            }
        }
        CallKind::Interface => {
            for implementer in interface_implementers(program, invoke.declared) {
                for class in program.hierarchy().subclass_closure(implementer) {
                    if let Some(m) = dispatch_at_concrete(program, class, invoke) {
                        push_unique(&mut callees, m);
                    }
                }
            }
        }
    }
    callees
}

fn push_unique(callees: &mut Vec<MethodId>, m: MethodId) {
    if !callees.contains(&m) {
        callees.push(m);
    }
}

fn dispatch_at_concrete(program: &Program, class: ClassId, invoke: &Invoke) -> Option<MethodId> {
    if program.hierarchy().class(class).is_abstract {
        return None;
    }
    program.dispatch(class, invoke.sig)
}

/// All direct implementers of `interface` and of its transitive
/// sub-interfaces, in a deterministic breadth-first order.
fn interface_implementers(program: &Program, interface: ClassId) -> Vec<ClassId> {
    let hierarchy = program.hierarchy();
    let mut interfaces = vec![interface];
    let mut i = 0;
    while i < interfaces.len() {
        let current = interfaces[i];
        i += 1;
        for &sub in hierarchy.direct_subinterfaces(current) {
            if !interfaces.contains(&sub) {
                interfaces.push(sub);
            }
        }
    }
    interfaces
        .into_iter()
        .flat_map(|iface| hierarchy.direct_implementers(iface).iter().copied())
        .unique()
        .collect_vec()
}
