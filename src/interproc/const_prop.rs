// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Alias-aware inter-procedural constant propagation.
//!
//! Extends the intra-procedural transfer with heap value flow: stores feed
//! loads of may-aliased bases (resolved with the pointer-analysis result),
//! static fields feed by field identity, and array accesses compare their
//! index values. A store whose OUT changed wakes every matching load
//! through the solver's worklist.

use std::collections::{BTreeSet, HashMap};

use log::*;

use super::analysis::{InterDataflowAnalysis, SolverView};
use super::solver::{self, InterDataflowResult};
use crate::dataflow::const_prop::transfer_stmt;
use crate::dataflow::lattice::{CPFact, Value};
use crate::graph::icfg::{Icfg, IcfgEdge, IcfgNodeId};
use crate::graph::cfg::CfgNode;
use crate::ir::hierarchy::FieldId;
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::{Site, Stmt};
use crate::ir::Program;
use crate::pta::result::PointerAnalysisResult;
use crate::pts_set::points_to::PointsToSet;

pub const RESULT_ID: &str = "inter-constprop";

pub struct InterConstantPropagation<'a> {
    program: &'a Program,
    icfg: &'a Icfg,
    store_static: HashMap<FieldId, Vec<Site>>,
    load_static: HashMap<FieldId, Vec<Site>>,
    /// Per base variable: the instance stores whose base may alias it.
    store_instance: HashMap<VarId, Vec<Site>>,
    load_instance: HashMap<VarId, Vec<Site>>,
    store_arrays: HashMap<VarId, Vec<Site>>,
    load_arrays: HashMap<VarId, Vec<Site>>,
}

impl<'a> InterConstantPropagation<'a> {
    /// Builds the alias indexes from the pointer-analysis result.
    pub fn new(program: &'a Program, icfg: &'a Icfg, pta: &PointerAnalysisResult) -> Self {
        let mut store_static: HashMap<FieldId, Vec<Site>> = HashMap::new();
        let mut load_static: HashMap<FieldId, Vec<Site>> = HashMap::new();
        for method in pta.call_graph().reachable() {
            if program.method(method).body.is_none() {
                continue;
            }
            let body = program.body(method);
            for s in body.stmt_ids() {
                match body.stmt(s) {
                    Stmt::StoreField {
                        base: None, field, ..
                    } => store_static
                        .entry(*field)
                        .or_default()
                        .push(Site::new(method, s)),
                    Stmt::LoadField {
                        base: None, field, ..
                    } => load_static
                        .entry(*field)
                        .or_default()
                        .push(Site::new(method, s)),
                    _ => {}
                }
            }
        }

        // May-alias merge: variables sharing an object exchange their
        // heap-access statements. The reverse points-to map bounds the
        // pair enumeration by actual sharing.
        let mut store_instance: HashMap<VarId, BTreeSet<Site>> = HashMap::new();
        let mut load_instance: HashMap<VarId, BTreeSet<Site>> = HashMap::new();
        let mut store_arrays: HashMap<VarId, BTreeSet<Site>> = HashMap::new();
        let mut load_arrays: HashMap<VarId, BTreeSet<Site>> = HashMap::new();
        for v in pta.vars() {
            let var = program.var(v);
            let method = var.method;
            let stores: Vec<Site> = var.store_fields().iter().map(|&s| Site::new(method, s)).collect();
            let loads: Vec<Site> = var.load_fields().iter().map(|&s| Site::new(method, s)).collect();
            let astores: Vec<Site> = var.store_arrays().iter().map(|&s| Site::new(method, s)).collect();
            let aloads: Vec<Site> = var.load_arrays().iter().map(|&s| Site::new(method, s)).collect();
            if stores.is_empty() && loads.is_empty() && astores.is_empty() && aloads.is_empty() {
                continue;
            }
            let mut aliased: BTreeSet<VarId> = BTreeSet::new();
            for obj in pta.pts_of_var(v).iter() {
                aliased.extend(pta.vars_pointing_to(obj).iter().copied());
            }
            for b in aliased {
                store_instance.entry(b).or_default().extend(stores.iter().copied());
                load_instance.entry(b).or_default().extend(loads.iter().copied());
                store_arrays.entry(b).or_default().extend(astores.iter().copied());
                load_arrays.entry(b).or_default().extend(aloads.iter().copied());
            }
        }

        let flatten = |map: HashMap<VarId, BTreeSet<Site>>| -> HashMap<VarId, Vec<Site>> {
            map.into_iter()
                .map(|(k, v)| (k, v.into_iter().collect()))
                .collect()
        };

        debug!(
            "alias indexes: {} static store fields, {} aliased bases",
            store_static.len(),
            store_instance.len()
        );
        InterConstantPropagation {
            program,
            icfg,
            store_static,
            load_static,
            store_instance: flatten(store_instance),
            load_instance: flatten(load_instance),
            store_arrays: flatten(store_arrays),
            load_arrays: flatten(load_arrays),
        }
    }

    fn is_int_like(&self, var: VarId) -> bool {
        self.program.types().is_int_like(self.program.var(var).ty)
    }

    fn node_of(&self, site: Site) -> Option<IcfgNodeId> {
        self.icfg.node_of(site.method, CfgNode::Stmt(site.stmt))
    }

    fn push_sites(&self, sites: &[Site], view: &mut SolverView<'_, CPFact>) {
        for &site in sites {
            if let Some(node) = self.node_of(site) {
                view.push(node);
            }
        }
    }

    /// The loads of field `field` whose base may alias `base`.
    fn matching_field_loads(&self, base: VarId, field: FieldId) -> Vec<Site> {
        self.load_instance
            .get(&base)
            .map_or(Vec::new(), |sites| {
                sites
                    .iter()
                    .filter(|&&site| matches!(self.program.stmt(site), Stmt::LoadField { field: f, .. } if *f == field))
                    .copied()
                    .collect()
            })
    }
}

/// Index value comparison for array accesses: an `Undef` index has not
/// produced a value on any path, so it may equal nothing; constants match
/// by equality; everything else may match.
fn indices_may_equal(a: Value, b: Value) -> bool {
    match (a, b) {
        (Value::Undef, _) | (_, Value::Undef) => false,
        (Value::Const(x), Value::Const(y)) => x == y,
        _ => true,
    }
}

impl<'a> InterDataflowAnalysis for InterConstantPropagation<'a> {
    type Fact = CPFact;

    fn boundary_fact(&self, entry: MethodId) -> CPFact {
        let mut fact = CPFact::new();
        for &param in &self.program.body(entry).params {
            if self.is_int_like(param) {
                fact.update(param, Value::Nac);
            }
        }
        fact
    }

    fn initial_fact(&self) -> CPFact {
        CPFact::new()
    }

    fn meet_into(&self, fact: &CPFact, target: &mut CPFact) -> bool {
        target.meet_with(fact)
    }

    fn transfer_edge(&self, edge: &IcfgEdge, out_fact: &CPFact) -> CPFact {
        match edge {
            IcfgEdge::Normal => out_fact.clone(),
            IcfgEdge::CallToReturn { site } => {
                // The result comes through the Return edge; kill it here.
                let mut fact = out_fact.clone();
                if let Some(result) = self.program.invoke_at(*site).result {
                    fact.remove(result);
                }
                fact
            }
            IcfgEdge::Call { site, callee } => {
                let invoke = self.program.invoke_at(*site);
                let body = self.program.body(*callee);
                let mut fact = CPFact::new();
                for (&arg, &param) in invoke.args.iter().zip(body.params.iter()) {
                    if self.is_int_like(param) {
                        fact.update(param, out_fact.get(arg));
                    }
                }
                fact
            }
            IcfgEdge::Return { site, callee } => {
                let invoke = self.program.invoke_at(*site);
                let mut fact = CPFact::new();
                if let Some(result) = invoke.result {
                    if self.is_int_like(result) {
                        let mut value = Value::Undef;
                        for &ret in &self.program.body(*callee).ret_vars {
                            value = value.meet(out_fact.get(ret));
                        }
                        fact.update(result, value);
                    }
                }
                fact
            }
        }
    }

    fn transfer_node(
        &mut self,
        node: IcfgNodeId,
        input: &CPFact,
        view: &mut SolverView<'_, CPFact>,
    ) -> CPFact {
        let icfg_node = self.icfg.node(node);
        let Some(s) = icfg_node.node.stmt() else {
            return input.clone();
        };
        let method = icfg_node.method;
        let stmt = self.program.body(method).stmt(s);

        match stmt {
            // Call nodes: identity; the edge transfers do the binding.
            Stmt::Invoke(_) => input.clone(),
            Stmt::StoreField {
                base: Some(base),
                field,
                rhs,
            } => {
                let changed = input != view.out_fact(node);
                if changed && self.is_int_like(*rhs) {
                    let loads = self.matching_field_loads(*base, *field);
                    self.push_sites(&loads, view);
                }
                input.clone()
            }
            Stmt::StoreField {
                base: None,
                field,
                rhs,
            } => {
                let changed = input != view.out_fact(node);
                if changed && self.is_int_like(*rhs) {
                    if let Some(loads) = self.load_static.get(field) {
                        self.push_sites(loads, view);
                    }
                }
                input.clone()
            }
            Stmt::StoreArray { base, rhs, .. } => {
                let changed = input != view.out_fact(node);
                if changed && self.is_int_like(*rhs) {
                    if let Some(loads) = self.load_arrays.get(base) {
                        self.push_sites(loads, view);
                    }
                }
                input.clone()
            }
            Stmt::LoadField {
                lhs,
                base: Some(base),
                field,
            } => {
                let mut fact = input.clone();
                if self.is_int_like(*lhs) {
                    let mut value = Value::Undef;
                    if let Some(stores) = self.store_instance.get(base) {
                        for &ss in stores {
                            let Stmt::StoreField { field: f, rhs, .. } = self.program.stmt(ss)
                            else {
                                unreachable!()
                            };
                            if f != field {
                                continue;
                            }
                            if let Some(store_node) = self.node_of(ss) {
                                value = value.meet(view.out_fact(store_node).get(*rhs));
                            }
                        }
                    }
                    if value != Value::Undef {
                        fact.update(*lhs, value);
                    }
                }
                fact
            }
            Stmt::LoadField {
                lhs, base: None, field,
            } => {
                let mut fact = input.clone();
                if self.is_int_like(*lhs) {
                    let mut value = Value::Undef;
                    if let Some(stores) = self.store_static.get(field) {
                        for &ss in stores {
                            let Stmt::StoreField { rhs, .. } = self.program.stmt(ss) else {
                                unreachable!()
                            };
                            if let Some(store_node) = self.node_of(ss) {
                                value = value.meet(view.out_fact(store_node).get(*rhs));
                            }
                        }
                    }
                    if value != Value::Undef {
                        fact.update(*lhs, value);
                    }
                }
                fact
            }
            Stmt::LoadArray { lhs, base, index } => {
                let mut fact = input.clone();
                if self.is_int_like(*lhs) {
                    let index_value = input.get(*index);
                    let mut value = Value::Undef;
                    if let Some(stores) = self.store_arrays.get(base) {
                        for &ss in stores {
                            let Stmt::StoreArray { index: si, rhs, .. } = self.program.stmt(ss)
                            else {
                                unreachable!()
                            };
                            if let Some(store_node) = self.node_of(ss) {
                                let store_out = view.out_fact(store_node);
                                if indices_may_equal(index_value, store_out.get(*si)) {
                                    value = value.meet(store_out.get(*rhs));
                                }
                            }
                        }
                    }
                    if value != Value::Undef {
                        fact.update(*lhs, value);
                    }
                }
                fact
            }
            _ => {
                let mut fact = CPFact::new();
                transfer_stmt(self.program, stmt, input, &mut fact);
                fact
            }
        }
    }
}

/// The outcome of an inter-procedural constant propagation run: the ICFG it
/// ran over plus the per-node facts.
pub struct InterCPResult {
    icfg: Icfg,
    facts: InterDataflowResult<CPFact>,
}

impl InterCPResult {
    pub fn icfg(&self) -> &Icfg {
        &self.icfg
    }

    pub fn in_fact_of(&self, site: Site) -> Option<&CPFact> {
        let node = self.icfg.node_of(site.method, CfgNode::Stmt(site.stmt))?;
        Some(self.facts.in_fact(node))
    }

    pub fn out_fact_of(&self, site: Site) -> Option<&CPFact> {
        let node = self.icfg.node_of(site.method, CfgNode::Stmt(site.stmt))?;
        Some(self.facts.out_fact(node))
    }
}

/// Runs the analysis over the pointer-analysis call graph.
pub fn analyze(program: &Program, pta: &PointerAnalysisResult) -> InterCPResult {
    let icfg = Icfg::build(program, pta.call_graph());
    let facts = {
        let mut analysis = InterConstantPropagation::new(program, &icfg, pta);
        solver::solve(&icfg, &mut analysis)
    };
    InterCPResult { icfg, facts }
}
