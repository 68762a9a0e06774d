// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Intra-procedural constant propagation on small hand-built methods.

use opta::dataflow::const_prop::ConstantPropagation;
use opta::dataflow::lattice::Value;
use opta::graph::cfg::CfgNode;
use opta::ir::builder::ProgramBuilder;
use opta::ir::stmt::{BinaryOp, RelOp};

#[test]
fn straight_line_arithmetic_folds() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[], int);
    let mut b = pb.body(m);
    let x = b.var("x", int);
    let y = b.var("y", int);
    b.assign_int(x, 4);
    let s1 = b.binary(y, BinaryOp::Mul, x, x);
    b.ret(Some(y));
    b.finish();
    let program = pb.finish();

    let result = ConstantPropagation::new(&program, m).analyze();
    let out = result.out_fact(CfgNode::Stmt(s1));
    assert_eq!(out.get(x), Value::Const(4));
    assert_eq!(out.get(y), Value::Const(16));
}

#[test]
fn int_parameters_start_nac() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[int], int);
    let mut b = pb.body(m);
    let p = b.param("p");
    let y = b.var("y", int);
    let s0 = b.binary(y, BinaryOp::Add, p, p);
    b.ret(Some(y));
    b.finish();
    let program = pb.finish();

    let result = ConstantPropagation::new(&program, m).analyze();
    assert_eq!(result.in_fact(CfgNode::Stmt(s0)).get(p), Value::Nac);
    assert_eq!(result.out_fact(CfgNode::Stmt(s0)).get(y), Value::Nac);
}

/// Builds `if (p == 0) x = a else x = b; y = x`, returning the ids needed
/// by the assertions.
fn branch_program(a: i32, b_val: i32) -> (opta::ir::Program, opta::ir::method::MethodId, opta::ir::method::VarId) {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[int], int);
    let mut b = pb.body(m);
    let p = b.param("p");
    let zero = b.var("zero", int);
    let x = b.var("x", int);
    let y = b.var("y", int);
    b.assign_int(zero, 0);
    let cond = b.if_stmt(p, RelOp::Eq, zero);
    b.assign_int(x, a);
    let jump = b.goto();
    let else_branch = b.assign_int(x, b_val);
    b.set_target(cond, else_branch);
    let join = b.copy(y, x);
    b.set_target(jump, join);
    b.ret(Some(y));
    b.finish();
    (pb.finish(), m, y)
}

#[test]
fn unequal_branch_values_meet_to_nac() {
    let (program, m, y) = branch_program(1, 2);
    let result = ConstantPropagation::new(&program, m).analyze();
    let exit = result.in_fact(CfgNode::Exit);
    assert_eq!(exit.get(y), Value::Nac);
}

#[test]
fn equal_branch_values_stay_constant() {
    let (program, m, y) = branch_program(7, 7);
    let result = ConstantPropagation::new(&program, m).analyze();
    let exit = result.in_fact(CfgNode::Exit);
    assert_eq!(exit.get(y), Value::Const(7));
}

#[test]
fn division_by_constant_zero_is_nac() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[], int);
    let mut b = pb.body(m);
    let x = b.var("x", int);
    let zero = b.var("zero", int);
    let z = b.var("z", int);
    b.assign_int(x, 10);
    b.assign_int(zero, 0);
    let s = b.binary(z, BinaryOp::Div, x, zero);
    b.ret(Some(z));
    b.finish();
    let program = pb.finish();

    let result = ConstantPropagation::new(&program, m).analyze();
    assert_eq!(result.out_fact(CfgNode::Stmt(s)).get(z), Value::Nac);
}

#[test]
fn loads_and_call_results_are_nac() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let f = pb.add_static_field(class, "f", int);
    pb.declare_static_method(class, "g", &[], int);
    let m = pb.declare_static_method(class, "m", &[], int);
    {
        let mut b = pb.body(m);
        let x = b.var("x", int);
        let y = b.var("y", int);
        b.load_static(x, f);
        b.call_static(class, "g", vec![], Some(y));
        b.ret(Some(x));
        b.finish();
    }
    let g = pb.method_named(class, "g").unwrap();
    {
        let mut b = pb.body(g);
        let r = b.var("r", int);
        b.assign_int(r, 1);
        b.ret(Some(r));
        b.finish();
    }
    let program = pb.finish();

    let result = ConstantPropagation::new(&program, m).analyze();
    let body = program.body(m);
    let exit = result.in_fact(CfgNode::Exit);
    // Both the field load and the (intra-procedurally opaque) call result
    // are beyond the lattice.
    assert_eq!(exit.get(body.vars[0]), Value::Nac);
    assert_eq!(exit.get(body.vars[1]), Value::Nac);
}
