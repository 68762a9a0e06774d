// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The main routine of `opta`: parse options, load the program document,
//! run the requested analyses in dependency order, dump requested outputs.

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::*;

use opta::builder::call_graph_builder;
use opta::dataflow::const_prop::ConstantPropagation;
use opta::dataflow::dead_code;
use opta::dataflow::lattice::CPFact;
use opta::dataflow::live_vars::LiveVariables;
use opta::dataflow::solver::DataflowResult;
use opta::interproc::const_prop as inter_const_prop;
use opta::ir::analysis_context::AnalysisContext;
use opta::ir::loader;
use opta::ir::method::MethodId;
use opta::ir::stmt::Site;
use opta::pta;
use opta::pta::result::PointerAnalysisResult;
use opta::taint::config::TaintConfig;
use opta::taint::{TaintAnalysis, TaintFlow};
use opta::util::options::AnalysisOptions;
use opta::util::results_dumper;

fn main() {
    if env::var("OPTA_LOG").is_ok() {
        let e = env_logger::Env::new()
            .filter("OPTA_LOG")
            .write_style("OPTA_LOG_STYLE");
        env_logger::init_from_env(e);
    }

    let args: Vec<String> = env::args().skip(1).collect();
    let mut options = AnalysisOptions::default();
    options.parse_from_args(&args);
    info!("options: {:?}", options);

    if let Err(e) = run(options) {
        eprintln!("opta: {:#}", e);
        std::process::exit(1);
    }
}

fn run(options: AnalysisOptions) -> Result<()> {
    let path = options
        .program_path
        .clone()
        .context("no program file given")?;
    let mut program = loader::load_program(Path::new(&path))?;
    if !program.has_main() {
        bail!("the program document declares no main method");
    }

    let wants = |name: &str, options: &AnalysisOptions| options.analyses.iter().any(|a| a == name);
    let taint = match &options.taint_config {
        Some(config_path) => Some(TaintAnalysis::new(TaintConfig::load(
            Path::new(config_path),
            &mut program,
        )?)),
        None => {
            if wants("taint", &options) {
                bail!("taint analysis requires --taint-config");
            }
            None
        }
    };

    let needs_pta = taint.is_some()
        || ["pta", "inter-constprop", "taint"]
            .iter()
            .any(|a| wants(a, &options));

    let mut acx = AnalysisContext::new(program, options);

    if wants("cha", &acx.options) {
        let cg = call_graph_builder::build_call_graph(&acx.program, acx.program.main_method());
        acx.store_result(call_graph_builder::RESULT_ID, cg);
    }

    if needs_pta {
        let result = pta::analyze(&acx.program, &acx.options.pta, taint)?;
        if let Some(flows) = result.taint_flows() {
            acx.store_result(opta::taint::RESULT_ID, flows.to_vec());
        }
        acx.store_result(pta::RESULT_ID, result);
    }

    if wants("constprop", &acx.options) || wants("deadcode", &acx.options) {
        run_intra_analyses(&mut acx);
    }

    if wants("inter-constprop", &acx.options) {
        let result = {
            let pta_result = acx
                .get_result::<PointerAnalysisResult>(pta::RESULT_ID)
                .expect("pointer analysis ran above");
            inter_const_prop::analyze(&acx.program, pta_result)
        };
        acx.store_result(inter_const_prop::RESULT_ID, result);
    }

    dump_outputs(&acx)
}

/// Intra-procedural constant propagation on every concrete method, plus
/// dead-code detection when requested.
fn run_intra_analyses(acx: &mut AnalysisContext) {
    let program = &acx.program;
    let mut const_results: HashMap<MethodId, DataflowResult<CPFact>> = HashMap::new();
    let mut dead: BTreeSet<Site> = BTreeSet::new();
    let run_dead_code = acx.options.analyses.iter().any(|a| a == "deadcode");

    for method in program.method_ids() {
        if program.method(method).body.is_none() {
            continue;
        }
        let const_facts = ConstantPropagation::new(program, method).analyze();
        if run_dead_code {
            let live_facts = LiveVariables::new(program, method).analyze();
            for s in dead_code::find_dead_code(program, method, &const_facts, &live_facts) {
                dead.insert(Site::new(method, s));
            }
        }
        const_results.insert(method, const_facts);
    }

    info!(
        "constant propagation ran on {} method(s)",
        const_results.len()
    );
    acx.store_result(opta::dataflow::const_prop::RESULT_ID, const_results);
    if run_dead_code {
        info!("dead-code detection: {} statement(s)", dead.len());
        for &site in &dead {
            debug!("dead: {}", acx.program.site_name(site));
        }
        acx.store_result(dead_code::RESULT_ID, dead);
    }
}

fn dump_outputs(acx: &AnalysisContext) -> Result<()> {
    if let Some(path) = &acx.options.call_graph_output {
        // Prefer the pointer-analysis call graph; fall back to CHA.
        if let Some(pta_result) = acx.get_result::<PointerAnalysisResult>(pta::RESULT_ID) {
            results_dumper::dump_call_graph(&acx.program, pta_result.call_graph(), Path::new(path))?;
        } else if let Some(cg) = acx.get_result(call_graph_builder::RESULT_ID) {
            results_dumper::dump_call_graph(&acx.program, cg, Path::new(path))?;
        } else {
            warn!("--dump-call-graph given but no call graph was built");
        }
    }
    if let Some(path) = &acx.options.pts_output {
        match acx.get_result::<PointerAnalysisResult>(pta::RESULT_ID) {
            Some(pta_result) => {
                results_dumper::dump_pts(&acx.program, pta_result, Path::new(path))?
            }
            None => warn!("--dump-pts given but the pointer analysis did not run"),
        }
    }
    if let Some(path) = &acx.options.taint_output {
        match acx.get_result::<Vec<TaintFlow>>(opta::taint::RESULT_ID) {
            Some(flows) => results_dumper::dump_taint_flows(&acx.program, flows, Path::new(path))?,
            None => warn!("--dump-taint-flows given but the taint analysis did not run"),
        }
    }
    Ok(())
}
