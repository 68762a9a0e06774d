// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Dumps analysis results: the call graph in DOT form, points-to sets and
//! taint flows as JSON.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::graph::call_graph::CallGraph;
use crate::ir::method::MethodId;
use crate::ir::stmt::Site;
use crate::ir::Program;
use crate::pta::heap::ObjKind;
use crate::pta::result::PointerAnalysisResult;
use crate::pts_set::points_to::PointsToSet;
use crate::taint::TaintFlow;

/// Produces a DOT rendering of a call graph for displaying with Graphviz.
pub fn dump_call_graph(
    program: &Program,
    cg: &CallGraph<MethodId, Site>,
    path: &Path,
) -> Result<()> {
    let mut out = String::from("digraph callgraph {\n");
    for method in cg.reachable() {
        out.push_str(&format!(
            "    \"{}\";\n",
            program.method_name(method)
        ));
    }
    for (kind, site, caller, callee) in cg.edges() {
        out.push_str(&format!(
            "    \"{}\" -> \"{}\" [label=\"{:?} @ {}\"];\n",
            program.method_name(caller),
            program.method_name(callee),
            kind,
            program.site_name(site),
        ));
    }
    out.push_str("}\n");
    write_file(path, out.as_bytes()).with_context(|| format!("dumping call graph to `{}`", path.display()))
}

/// Dumps the context-insensitive points-to view as a JSON object mapping
/// variables to object descriptions.
pub fn dump_pts(program: &Program, pta: &PointerAnalysisResult, path: &Path) -> Result<()> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for var in pta.vars() {
        let objs = pta
            .pts_of_var(var)
            .iter()
            .map(|obj| describe_obj(program, pta, obj))
            .collect();
        map.insert(program.var_name(var), objs);
    }
    let text = serde_json::to_string_pretty(&map)?;
    write_file(path, text.as_bytes()).with_context(|| format!("dumping points-to sets to `{}`", path.display()))
}

fn describe_obj(
    program: &Program,
    pta: &PointerAnalysisResult,
    obj: crate::pta::heap::ObjId,
) -> String {
    let data = pta.obj(obj);
    let ty = program.types().name(data.ty, program.hierarchy());
    match data.kind {
        ObjKind::Alloc { site } => format!("new {} at {}", ty, program.site_name(site)),
        ObjKind::Taint { source } => format!("taint<{}> from {}", ty, program.site_name(source)),
    }
}

/// Dumps taint flows as a JSON array ordered by (source, sink, index).
pub fn dump_taint_flows(program: &Program, flows: &[TaintFlow], path: &Path) -> Result<()> {
    let flows: Vec<_> = flows
        .iter()
        .map(|flow| {
            json!({
                "source": program.site_name(flow.source),
                "sink": program.site_name(flow.sink),
                "index": flow.index,
            })
        })
        .collect();
    let text = serde_json::to_string_pretty(&flows)?;
    write_file(path, text.as_bytes()).with_context(|| format!("dumping taint flows to `{}`", path.display()))
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}
