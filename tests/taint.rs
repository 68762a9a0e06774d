// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Source-to-sink taint tracking through the pointer analysis.

use opta::ir::builder::ProgramBuilder;
use opta::ir::stmt::{Site, Stmt};
use opta::ir::Program;
use opta::pta;
use opta::taint::config::TaintConfig;
use opta::taint::{TaintAnalysis, TaintFlow};

/// `x = source(); y = pass(x); sink(y);` where `pass` does not forward its
/// argument itself, only the configured transfer does.
fn transfer_program() -> Program {
    let mut pb = ProgramBuilder::new();
    let t_class = pb.add_class("T", None);
    let t_ty = pb.class_ty(t_class);
    let s_class = pb.add_class("S", None);

    let source = pb.declare_static_method(s_class, "source", &[], t_ty);
    {
        let mut b = pb.body(source);
        b.ret(None);
        b.finish();
    }
    let pass = pb.declare_static_method(s_class, "pass", &[t_ty], t_ty);
    {
        let mut b = pb.body(pass);
        b.param("p");
        b.ret(None);
        b.finish();
    }
    let sink = pb.declare_static_method(s_class, "sink", &[t_ty], pb.void_ty());
    {
        let mut b = pb.body(sink);
        b.param("q");
        b.ret(None);
        b.finish();
    }

    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let x = b.var("x", t_ty);
    let y = b.var("y", t_ty);
    b.call_static(s_class, "source", vec![], Some(x));
    b.call_static(s_class, "pass", vec![x], Some(y));
    b.call_static(s_class, "sink", vec![y], None);
    b.ret(None);
    b.finish();
    pb.set_main(main);
    pb.finish()
}

const TRANSFER_CONFIG: &str = r#"{
    "sources": [{"method": "<S: T source()>", "type": "T"}],
    "sinks": [{"method": "<S: void sink(T)>", "index": 0}],
    "transfers": [{"method": "<S: T pass(T)>", "from": "arg0", "to": "result", "type": "T"}]
}"#;

fn invoke_sites(program: &Program, method: opta::ir::method::MethodId, callee: &str) -> Vec<Site> {
    let body = program.body(method);
    body.stmt_ids()
        .filter(|&s| {
            matches!(body.stmt(s), Stmt::Invoke(invoke)
                if &*program.hierarchy().sig(invoke.sig).name == callee)
        })
        .map(|s| Site::new(method, s))
        .collect()
}

#[test]
fn source_transfer_sink_yields_exactly_one_flow() {
    let mut program = transfer_program();
    let config = TaintConfig::parse(TRANSFER_CONFIG, &mut program).unwrap();
    let result = pta::analyze(&program, "ci", Some(TaintAnalysis::new(config))).unwrap();

    let main = program.main_method();
    let source_site = invoke_sites(&program, main, "source")[0];
    let sink_site = invoke_sites(&program, main, "sink")[0];
    assert_eq!(
        result.taint_flows().unwrap(),
        &[TaintFlow {
            source: source_site,
            sink: sink_site,
            index: 0,
        }]
    );
}

#[test]
fn without_the_transfer_no_flow_is_reported() {
    let config_text = r#"{
        "sources": [{"method": "<S: T source()>", "type": "T"}],
        "sinks": [{"method": "<S: void sink(T)>", "index": 0}]
    }"#;
    let mut program = transfer_program();
    let config = TaintConfig::parse(config_text, &mut program).unwrap();
    let result = pta::analyze(&program, "ci", Some(TaintAnalysis::new(config))).unwrap();
    assert_eq!(result.taint_flows().unwrap(), &[]);
}

#[test]
fn taint_flows_through_ordinary_value_flow() {
    // sink(id(source())) where `id` really returns its argument: no
    // transfer needed, the pointer analysis carries the taint object.
    let mut pb = ProgramBuilder::new();
    let t_class = pb.add_class("T", None);
    let t_ty = pb.class_ty(t_class);
    let s_class = pb.add_class("S", None);
    let source = pb.declare_static_method(s_class, "source", &[], t_ty);
    {
        let mut b = pb.body(source);
        b.ret(None);
        b.finish();
    }
    let id = pb.declare_static_method(s_class, "id", &[t_ty], t_ty);
    {
        let mut b = pb.body(id);
        let p = b.param("p");
        b.ret(Some(p));
        b.finish();
    }
    let sink = pb.declare_static_method(s_class, "sink", &[t_ty], pb.void_ty());
    {
        let mut b = pb.body(sink);
        b.param("q");
        b.ret(None);
        b.finish();
    }
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    {
        let mut b = pb.body(main);
        let x = b.var("x", t_ty);
        let y = b.var("y", t_ty);
        b.call_static(s_class, "source", vec![], Some(x));
        b.call_static(s_class, "id", vec![x], Some(y));
        b.call_static(s_class, "sink", vec![y], None);
        b.ret(None);
        b.finish();
    }
    pb.set_main(main);
    let mut program = pb.finish();

    let config_text = r#"{
        "sources": [{"method": "<S: T source()>", "type": "T"}],
        "sinks": [{"method": "<S: void sink(T)>", "index": 0}]
    }"#;
    let config = TaintConfig::parse(config_text, &mut program).unwrap();
    let result = pta::analyze(&program, "ci", Some(TaintAnalysis::new(config))).unwrap();
    assert_eq!(result.taint_flows().unwrap().len(), 1);
}

#[test]
fn chained_transfers_keep_the_source_identity() {
    // y = pass(x); z = pass(y); sink(z): two re-typings, one source.
    let mut pb = ProgramBuilder::new();
    let t_class = pb.add_class("T", None);
    let t_ty = pb.class_ty(t_class);
    pb.add_class("U", None);
    let s_class = pb.add_class("S", None);
    let source = pb.declare_static_method(s_class, "source", &[], t_ty);
    {
        let mut b = pb.body(source);
        b.ret(None);
        b.finish();
    }
    let pass = pb.declare_static_method(s_class, "pass", &[t_ty], t_ty);
    {
        let mut b = pb.body(pass);
        b.param("p");
        b.ret(None);
        b.finish();
    }
    let sink = pb.declare_static_method(s_class, "sink", &[t_ty], pb.void_ty());
    {
        let mut b = pb.body(sink);
        b.param("q");
        b.ret(None);
        b.finish();
    }
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    {
        let mut b = pb.body(main);
        let x = b.var("x", t_ty);
        let y = b.var("y", t_ty);
        let z = b.var("z", t_ty);
        b.call_static(s_class, "source", vec![], Some(x));
        b.call_static(s_class, "pass", vec![x], Some(y));
        b.call_static(s_class, "pass", vec![y], Some(z));
        b.call_static(s_class, "sink", vec![z], None);
        b.ret(None);
        b.finish();
    }
    pb.set_main(main);
    let mut program = pb.finish();

    let config_text = r#"{
        "sources": [{"method": "<S: T source()>", "type": "T"}],
        "sinks": [{"method": "<S: void sink(T)>", "index": 0}],
        "transfers": [{"method": "<S: T pass(T)>", "from": "arg0", "to": "result", "type": "U"}]
    }"#;
    let config = TaintConfig::parse(config_text, &mut program).unwrap();
    let result = pta::analyze(&program, "ci", Some(TaintAnalysis::new(config))).unwrap();

    let main_id = program.main_method();
    let source_site = invoke_sites(&program, main_id, "source")[0];
    let flows = result.taint_flows().unwrap();
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].source, source_site);
}

#[test]
fn unresolved_config_signatures_are_errors() {
    let mut program = transfer_program();
    let bad_method = r#"{"sources": [{"method": "<S: T missing()>", "type": "T"}]}"#;
    assert!(TaintConfig::parse(bad_method, &mut program).is_err());

    let bad_type = r#"{"sources": [{"method": "<S: T source()>", "type": "NoSuch"}]}"#;
    assert!(TaintConfig::parse(bad_type, &mut program).is_err());

    let bad_json = "{";
    assert!(TaintConfig::parse(bad_json, &mut program).is_err());

    let bad_index = r#"{
        "sources": [{"method": "<S: T source()>", "type": "T"}],
        "transfers": [{"method": "<S: T pass(T)>", "from": "this", "to": "result", "type": "T"}]
    }"#;
    assert!(TaintConfig::parse(bad_index, &mut program).is_err());
}
