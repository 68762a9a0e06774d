// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Class-hierarchy call-graph construction.

use opta::builder::call_graph_builder::{build_call_graph, resolve};
use opta::ir::builder::ProgramBuilder;
use opta::ir::stmt::{CallKind, Site, Stmt};
use opta::ir::Program;

/// I (interface) <- A (abstract, implements I) <- B <- C; D implements I.
/// B, C and D declare `foo`; B also inherits to C2 (no override).
struct Hierarchy {
    program: Program,
    main: opta::ir::method::MethodId,
    b_foo: opta::ir::method::MethodId,
    c_foo: opta::ir::method::MethodId,
    d_foo: opta::ir::method::MethodId,
}

fn build(call_kind: CallKind, declared_name: &str) -> Hierarchy {
    let mut pb = ProgramBuilder::new();
    let int = pb.int_ty();
    let i = pb.add_interface("I");
    let a = pb.add_abstract_class("A", None);
    pb.implements(a, i);
    let b = pb.add_class("B", Some(a));
    let c = pb.add_class("C", Some(b));
    pb.add_class("C2", Some(b));
    let d = pb.add_class("D", None);
    pb.implements(d, i);
    let main_class = pb.add_class("Main", None);

    pb.declare_abstract_method(i, "foo", &[], int);
    let b_foo = pb.declare_method(b, "foo", &[], int);
    let c_foo = pb.declare_method(c, "foo", &[], int);
    let d_foo = pb.declare_method(d, "foo", &[], int);
    for m in [b_foo, c_foo, d_foo] {
        let mut body = pb.body(m);
        let r = body.var("r", int);
        body.assign_int(r, 1);
        body.ret(Some(r));
        body.finish();
    }

    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    {
        let declared = pb.resolve_type(declared_name).unwrap();
        let declared_class = pb.hierarchy().class_named(declared_name).unwrap();
        let mut body = pb.body(main);
        let recv = body.var("recv", declared);
        let r = body.var("r", int);
        body.invoke(call_kind, declared_class, "foo", Some(recv), vec![], Some(r));
        body.ret(None);
        body.finish();
    }
    pb.set_main(main);
    let program = pb.finish();
    Hierarchy {
        program,
        main,
        b_foo,
        c_foo,
        d_foo,
    }
}

fn callees_of_first_invoke(h: &Hierarchy) -> Vec<opta::ir::method::MethodId> {
    let body = h.program.body(h.main);
    let invoke = body
        .stmt_ids()
        .find_map(|s| body.stmt(s).as_invoke())
        .unwrap();
    resolve(&h.program, invoke)
}

#[test]
fn virtual_calls_dispatch_over_the_subclass_closure() {
    let h = build(CallKind::Virtual, "B");
    // B and C2 dispatch to B.foo (deduplicated), C overrides.
    assert_eq!(callees_of_first_invoke(&h), vec![h.b_foo, h.c_foo]);
}

#[test]
fn interface_calls_reach_all_implementers() {
    let h = build(CallKind::Interface, "I");
    assert_eq!(
        callees_of_first_invoke(&h),
        vec![h.b_foo, h.c_foo, h.d_foo]
    );
}

#[test]
fn special_calls_have_a_single_target() {
    let h = build(CallKind::Special, "C");
    assert_eq!(callees_of_first_invoke(&h), vec![h.c_foo]);
}

#[test]
fn the_graph_closes_over_reachable_methods() {
    let h = build(CallKind::Virtual, "B");
    let cg = build_call_graph(&h.program, h.main);
    let reachable: Vec<_> = cg.reachable().collect();
    assert!(reachable.contains(&h.main));
    assert!(reachable.contains(&h.b_foo));
    assert!(reachable.contains(&h.c_foo));
    assert!(!reachable.contains(&h.d_foo));
    assert_eq!(cg.num_edges(), 2);

    // Edge lookups by call site.
    let body = h.program.body(h.main);
    let site = body
        .stmt_ids()
        .find(|&s| matches!(body.stmt(s), Stmt::Invoke(_)))
        .map(|s| Site::new(h.main, s))
        .unwrap();
    assert_eq!(cg.callees_of(site), vec![h.b_foo, h.c_foo]);
    assert!(cg.has_edge(site, h.b_foo));
}

#[test]
fn unresolvable_dispatch_is_skipped() {
    let mut pb = ProgramBuilder::new();
    let int = pb.int_ty();
    let i = pb.add_interface("I");
    pb.declare_abstract_method(i, "foo", &[], int);
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    {
        let declared = pb.resolve_type("I").unwrap();
        let mut body = pb.body(main);
        let recv = body.var("recv", declared);
        body.invoke(CallKind::Interface, i, "foo", Some(recv), vec![], None);
        body.ret(None);
        body.finish();
    }
    pb.set_main(main);
    let program = pb.finish();

    // No implementers: the call resolves to nothing and main has no
    // outgoing edges.
    let cg = build_call_graph(&program, main);
    assert_eq!(cg.num_edges(), 0);
    assert_eq!(cg.reachable().collect::<Vec<_>>(), vec![main]);
}
