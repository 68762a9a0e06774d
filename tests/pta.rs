// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end pointer-analysis properties: object flow, on-the-fly call
//! graphs, and context-sensitivity precision.

use std::collections::BTreeSet;

use opta::ir::builder::ProgramBuilder;
use opta::ir::method::VarId;
use opta::ir::stmt::{Site, Stmt};
use opta::ir::Program;
use opta::pta;
use opta::pta::heap::ObjKind;
use opta::pta::result::PointerAnalysisResult;
use opta::pts_set::points_to::PointsToSet;

/// The allocation sites a variable may point to.
fn alloc_sites(result: &PointerAnalysisResult, var: VarId) -> BTreeSet<Site> {
    result
        .pts_of_var(var)
        .iter()
        .map(|obj| match result.obj(obj).kind {
            ObjKind::Alloc { site } => site,
            ObjKind::Taint { .. } => panic!("unexpected taint object"),
        })
        .collect()
}

fn site_of_new(program: &Program, method: opta::ir::method::MethodId, lhs: VarId) -> Site {
    let body = program.body(method);
    body.stmt_ids()
        .find(|&s| matches!(body.stmt(s), Stmt::New { lhs: l, .. } if *l == lhs))
        .map(|s| Site::new(method, s))
        .unwrap()
}

#[test]
fn objects_flow_through_copies_and_instance_fields() {
    let mut pb = ProgramBuilder::new();
    let a_class = pb.add_class("A", None);
    let a_ty = pb.class_ty(a_class);
    let f = pb.add_field(a_class, "f", a_ty);
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let a = b.var("a", a_ty);
    let bb = b.var("b", a_ty);
    let v = b.var("v", a_ty);
    let w = b.var("w", a_ty);
    b.new_obj(a, a_ty);
    b.copy(bb, a);
    b.new_obj(v, a_ty);
    b.store_field(a, f, v);
    b.load_field(w, bb, f);
    b.ret(None);
    b.finish();
    pb.set_main(main);
    let program = pb.finish();

    let result = pta::analyze(&program, "ci", None).unwrap();
    let o_a = site_of_new(&program, main, a);
    let o_v = site_of_new(&program, main, v);
    assert_eq!(alloc_sites(&result, a), BTreeSet::from([o_a]));
    assert_eq!(alloc_sites(&result, bb), BTreeSet::from([o_a]));
    // The store through `a` is visible through the aliased load base `b`.
    assert_eq!(alloc_sites(&result, w), BTreeSet::from([o_v]));
    assert!(result.may_alias(a, bb));
    assert!(!result.may_alias(a, v));
}

#[test]
fn instance_calls_bind_this_args_and_returns() {
    let mut pb = ProgramBuilder::new();
    let a_class = pb.add_class("A", None);
    let a_ty = pb.class_ty(a_class);
    let id = pb.declare_method(a_class, "id", &[a_ty], a_ty);
    {
        let mut b = pb.body(id);
        let p = b.param("p");
        b.ret(Some(p));
        b.finish();
    }
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let a = b.var("a", a_ty);
    let v = b.var("v", a_ty);
    let r = b.var("r", a_ty);
    b.new_obj(a, a_ty);
    b.new_obj(v, a_ty);
    let call = b.call_virtual(a, a_class, "id", vec![v], Some(r));
    b.ret(None);
    b.finish();
    pb.set_main(main);
    let program = pb.finish();

    let result = pta::analyze(&program, "ci", None).unwrap();
    let o_a = site_of_new(&program, main, a);
    let o_v = site_of_new(&program, main, v);
    assert_eq!(alloc_sites(&result, r), BTreeSet::from([o_v]));

    let this_var = program.body(id).this.unwrap();
    assert_eq!(alloc_sites(&result, this_var), BTreeSet::from([o_a]));

    // The call graph was built on the fly.
    let cg = result.call_graph();
    assert_eq!(cg.callees_of(Site::new(main, call)), vec![id]);
    assert!(cg.reachable().any(|m| m == id));
}

/// `x1 = id(new A); x2 = id(new A)` with a static identity method.
fn identity_program() -> (Program, VarId, VarId) {
    let mut pb = ProgramBuilder::new();
    let a_class = pb.add_class("A", None);
    let a_ty = pb.class_ty(a_class);
    let id_class = pb.add_class("Id", None);
    let id = pb.declare_static_method(id_class, "id", &[a_ty], a_ty);
    {
        let mut b = pb.body(id);
        let p = b.param("p");
        b.ret(Some(p));
        b.finish();
    }
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let o1 = b.var("o1", a_ty);
    let o2 = b.var("o2", a_ty);
    let x1 = b.var("x1", a_ty);
    let x2 = b.var("x2", a_ty);
    b.new_obj(o1, a_ty);
    b.call_static(id_class, "id", vec![o1], Some(x1));
    b.new_obj(o2, a_ty);
    b.call_static(id_class, "id", vec![o2], Some(x2));
    b.ret(None);
    b.finish();
    pb.set_main(main);
    (pb.finish(), x1, x2)
}

#[test]
fn call_site_sensitivity_separates_identity_calls() {
    let (program, x1, x2) = identity_program();

    let ci = pta::analyze(&program, "ci", None).unwrap();
    assert_eq!(ci.pts_of_var(x1).count(), 2);
    assert_eq!(ci.pts_of_var(x2).count(), 2);

    let one_call = pta::analyze(&program, "1-call", None).unwrap();
    assert_eq!(one_call.pts_of_var(x1).count(), 1);
    assert_eq!(one_call.pts_of_var(x2).count(), 1);
    assert!(!one_call.may_alias(x1, x2));
}

/// Two boxes, two payloads, set/get through `this.f`.
fn container_program() -> (Program, VarId, VarId) {
    let mut pb = ProgramBuilder::new();
    let a_class = pb.add_class("A", None);
    let a_ty = pb.class_ty(a_class);
    let box_class = pb.add_class("Box", None);
    let box_ty = pb.class_ty(box_class);
    let f = pb.add_field(box_class, "f", a_ty);
    let set = pb.declare_method(box_class, "set", &[a_ty], pb.void_ty());
    {
        let mut b = pb.body(set);
        let v = b.param("v");
        let this = b.this();
        b.store_field(this, f, v);
        b.ret(None);
        b.finish();
    }
    let get = pb.declare_method(box_class, "get", &[], a_ty);
    {
        let mut b = pb.body(get);
        let this = b.this();
        let r = b.var("r", a_ty);
        b.load_field(r, this, f);
        b.ret(Some(r));
        b.finish();
    }
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let b1 = b.var("b1", box_ty);
    let b2 = b.var("b2", box_ty);
    let a1 = b.var("a1", a_ty);
    let a2 = b.var("a2", a_ty);
    let r1 = b.var("r1", a_ty);
    let r2 = b.var("r2", a_ty);
    b.new_obj(b1, box_ty);
    b.new_obj(b2, box_ty);
    b.new_obj(a1, a_ty);
    b.new_obj(a2, a_ty);
    b.call_virtual(b1, box_class, "set", vec![a1], None);
    b.call_virtual(b2, box_class, "set", vec![a2], None);
    b.call_virtual(b1, box_class, "get", vec![], Some(r1));
    b.call_virtual(b2, box_class, "get", vec![], Some(r2));
    b.ret(None);
    b.finish();
    pb.set_main(main);
    (pb.finish(), r1, r2)
}

#[test]
fn object_sensitivity_separates_containers() {
    let (program, r1, r2) = container_program();

    let ci = pta::analyze(&program, "ci", None).unwrap();
    assert_eq!(ci.pts_of_var(r1).count(), 2);

    let one_obj = pta::analyze(&program, "1-obj", None).unwrap();
    assert_eq!(one_obj.pts_of_var(r1).count(), 1);
    assert_eq!(one_obj.pts_of_var(r2).count(), 1);
    assert!(!one_obj.may_alias(r1, r2));
}

#[test]
fn static_fields_and_arrays_flow() {
    let mut pb = ProgramBuilder::new();
    let a_class = pb.add_class("A", None);
    let a_ty = pb.class_ty(a_class);
    let arr_ty = pb.array_ty(a_ty);
    let int = pb.int_ty();
    let holder = pb.add_class("Holder", None);
    let g = pb.add_static_field(holder, "g", a_ty);
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let x = b.var("x", a_ty);
    let y = b.var("y", a_ty);
    let arr = b.var("arr", arr_ty);
    let i = b.var("i", int);
    let j = b.var("j", int);
    let z = b.var("z", a_ty);
    b.new_obj(x, a_ty);
    b.store_static(g, x);
    b.load_static(y, g);
    b.new_obj(arr, arr_ty);
    b.assign_int(i, 0);
    b.assign_int(j, 1);
    b.store_array(arr, i, x);
    b.load_array(z, arr, j);
    b.ret(None);
    b.finish();
    pb.set_main(main);
    let program = pb.finish();

    let result = pta::analyze(&program, "ci", None).unwrap();
    let o_x = site_of_new(&program, main, x);
    assert_eq!(alloc_sites(&result, y), BTreeSet::from([o_x]));
    // Array elements are merged per abstract array: the load sees the
    // store regardless of the differing indices.
    assert_eq!(alloc_sites(&result, z), BTreeSet::from([o_x]));
}

/// A static factory returning a fresh object per call.
fn factory_program() -> Program {
    let mut pb = ProgramBuilder::new();
    let a_class = pb.add_class("A", None);
    let a_ty = pb.class_ty(a_class);
    let f_class = pb.add_class("F", None);
    let make = pb.declare_static_method(f_class, "make", &[], a_ty);
    {
        let mut b = pb.body(make);
        let o = b.var("o", a_ty);
        b.new_obj(o, a_ty);
        b.ret(Some(o));
        b.finish();
    }
    let main_class = pb.add_class("Main", None);
    let main = pb.declare_static_method(main_class, "main", &[], pb.void_ty());
    let mut b = pb.body(main);
    let x1 = b.var("x1", a_ty);
    let x2 = b.var("x2", a_ty);
    b.call_static(f_class, "make", vec![], Some(x1));
    b.call_static(f_class, "make", vec![], Some(x2));
    b.ret(None);
    b.finish();
    pb.set_main(main);
    pb.finish()
}

#[test]
fn deeper_call_strings_split_heap_contexts() {
    let program = factory_program();

    // With 1-call the factory's allocation keeps one (empty) heap context;
    // with 2-call the allocation is qualified by the calling site.
    let one_call = pta::analyze(&program, "1-call", None).unwrap();
    assert_eq!(one_call.csm().num_cs_objs(), 1);

    let two_call = pta::analyze(&program, "2-call", None).unwrap();
    assert_eq!(two_call.csm().num_cs_objs(), 2);
}

#[test]
fn type_sensitivity_runs_to_fixpoint() {
    let (program, r1, _) = container_program();
    // 1-type merges the two boxes (same type) but must stay sound.
    let one_type = pta::analyze(&program, "1-type", None).unwrap();
    assert_eq!(one_type.pts_of_var(r1).count(), 2);
}
