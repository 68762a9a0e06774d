// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Dead-code scenarios: constant branches, constant switches, and dead
//! assignments.

use std::collections::BTreeSet;

use opta::dataflow::const_prop::ConstantPropagation;
use opta::dataflow::dead_code::find_dead_code;
use opta::dataflow::live_vars::LiveVariables;
use opta::ir::builder::ProgramBuilder;
use opta::ir::method::MethodId;
use opta::ir::stmt::{RelOp, StmtId};
use opta::ir::Program;

fn dead_stmts(program: &Program, method: MethodId) -> BTreeSet<StmtId> {
    let const_facts = ConstantPropagation::new(program, method).analyze();
    let live_facts = LiveVariables::new(program, method).analyze();
    find_dead_code(program, method, &const_facts, &live_facts)
}

#[test]
fn constant_false_branch_is_dead() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[], int);
    let mut b = pb.body(m);
    let a = b.var("a", int);
    let c = b.var("c", int);
    b.assign_int(a, 0); // 0
    let cond = b.if_stmt(a, RelOp::Ne, a); // 1: if (0 != 0), never taken
    b.assign_int(c, 2); // 2: live branch
    let jump = b.goto(); // 3
    let then_branch = b.assign_int(c, 3); // 4: dead
    b.set_target(cond, then_branch);
    let join = b.ret(Some(c)); // 5
    b.set_target(jump, join);
    b.finish();
    let program = pb.finish();

    let dead = dead_stmts(&program, m);
    assert_eq!(dead, BTreeSet::from([then_branch]));
}

#[test]
fn constant_switch_takes_only_the_matching_case() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[], int);
    let mut b = pb.body(m);
    let k = b.var("k", int);
    let x = b.var("x", int);
    b.assign_int(k, 1); // 0
    let switch = b.switch(k); // 1
    let case1 = b.assign_int(x, 10); // 2
    let jump1 = b.goto(); // 3
    let case2 = b.assign_int(x, 20); // 4: dead
    let jump2 = b.goto(); // 5: dead (only reachable through case2)
    let join = b.ret(Some(x)); // 6
    b.set_switch(switch, vec![(1, case1), (2, case2)], join);
    b.set_target(jump1, join);
    b.set_target(jump2, join);
    b.finish();
    let program = pb.finish();

    let dead = dead_stmts(&program, m);
    assert_eq!(dead, BTreeSet::from([case2, jump2]));
}

#[test]
fn constant_switch_falls_back_to_default() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[], int);
    let mut b = pb.body(m);
    let k = b.var("k", int);
    let x = b.var("x", int);
    b.assign_int(k, 9); // 0
    let switch = b.switch(k); // 1
    let case1 = b.assign_int(x, 10); // 2: dead
    let jump1 = b.goto(); // 3: dead
    let default = b.assign_int(x, 0); // 4
    let join = b.ret(Some(x)); // 5
    b.set_switch(switch, vec![(1, case1)], default);
    b.set_target(jump1, join);
    b.finish();
    let program = pb.finish();

    let dead = dead_stmts(&program, m);
    assert_eq!(dead, BTreeSet::from([case1, jump1]));
}

#[test]
fn overwritten_assignment_without_effects_is_dead() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[], int);
    let mut b = pb.body(m);
    let x = b.var("x", int);
    let first = b.assign_int(x, 1); // dead: x is overwritten before use
    b.assign_int(x, 2);
    b.ret(Some(x));
    b.finish();
    let program = pb.finish();

    let dead = dead_stmts(&program, m);
    assert_eq!(dead, BTreeSet::from([first]));
}

#[test]
fn effectful_right_hand_sides_are_kept() {
    let mut pb = ProgramBuilder::new();
    let class = pb.add_class("A", None);
    let int = pb.int_ty();
    let m = pb.declare_static_method(class, "m", &[int], int);
    let mut b = pb.body(m);
    let p = b.param("p");
    let x = b.var("x", int);
    let y = b.var("y", int);
    let zero = b.var("zero", int);
    b.assign_int(zero, 0);
    // x is never used, but `p / zero` may fault, so the statement stays.
    b.binary(x, opta::ir::stmt::BinaryOp::Div, p, zero);
    b.assign_int(y, 3);
    b.ret(Some(y));
    b.finish();
    let program = pb.finish();

    let dead = dead_stmts(&program, m);
    assert!(dead.is_empty());
}
