// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Intra-procedural constant propagation over the integer-shaped variables
//! of one method.

use super::analysis::DataflowAnalysis;
use super::lattice::{CPFact, Value};
use super::solver::{self, DataflowResult};
use crate::graph::cfg::CfgNode;
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::{BinaryOp, RelOp, Stmt};
use crate::ir::Program;

/// The stable id this analysis stores its result under.
pub const RESULT_ID: &str = "constprop";

pub struct ConstantPropagation<'a> {
    program: &'a Program,
    method: MethodId,
}

impl<'a> ConstantPropagation<'a> {
    pub fn new(program: &'a Program, method: MethodId) -> Self {
        ConstantPropagation { program, method }
    }

    /// Runs the analysis on its method to a fixpoint.
    pub fn analyze(&self) -> DataflowResult<CPFact> {
        let cfg = &self.program.body(self.method).cfg;
        solver::solve(cfg, self)
    }
}

impl<'a> DataflowAnalysis for ConstantPropagation<'a> {
    type Fact = CPFact;

    fn is_forward(&self) -> bool {
        true
    }

    /// Integer-shaped parameters (and `this` never, it is a reference) are
    /// unknown at entry, hence `Nac`; everything else starts `Undef`.
    fn boundary_fact(&self) -> CPFact {
        let mut fact = CPFact::new();
        let body = self.program.body(self.method);
        for &param in &body.params {
            if self.program.types().is_int_like(self.program.var(param).ty) {
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

    fn transfer(&self, node: CfgNode, input: &CPFact, out: &mut CPFact) -> bool {
        let stmt = match node.stmt() {
            Some(s) => self.program.body(self.method).stmt(s),
            None => return out.copy_from(input),
        };
        transfer_stmt(self.program, stmt, input, out)
    }
}

/// The statement transfer shared with the inter-procedural variant: kill
/// the defined variable, bind it to the evaluated right-hand side.
pub(crate) fn transfer_stmt(
    program: &Program,
    stmt: &Stmt,
    input: &CPFact,
    out: &mut CPFact,
) -> bool {
    if let Some((lhs, value)) = eval_def(program, stmt, input) {
        let mut new_out = input.clone();
        new_out.update(lhs, value);
        out.copy_from(&new_out)
    } else {
        out.copy_from(input)
    }
}

/// Evaluates the value a statement assigns to an integer-shaped variable.
/// `None` when the statement defines nothing the lattice tracks.
pub(crate) fn eval_def(program: &Program, stmt: &Stmt, input: &CPFact) -> Option<(VarId, Value)> {
    let lhs = stmt.def()?;
    if !program.types().is_int_like(program.var(lhs).ty) {
        return None;
    }
    let value = match stmt {
        Stmt::AssignLiteral { value, .. } => Value::Const(*value),
        Stmt::Copy { rhs, .. } => input.get(*rhs),
        Stmt::Binary { op, x, y, .. } => eval_binary(*op, input.get(*x), input.get(*y)),
        // Loads, casts and call results are beyond what the lattice models.
        _ => Value::Nac,
    };
    Some((lhs, value))
}

/// Two's-complement 32-bit evaluation. Division and remainder by a known
/// zero yield `Nac`; shift counts are masked to five bits.
pub(crate) fn eval_binary(op: BinaryOp, x: Value, y: Value) -> Value {
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && y == Value::Const(0) {
        return Value::Nac;
    }
    match (x, y) {
        (Value::Const(a), Value::Const(b)) => Value::Const(apply_binary(op, a, b)),
        (Value::Nac, _) | (_, Value::Nac) => Value::Nac,
        _ => Value::Undef,
    }
}

fn apply_binary(op: BinaryOp, a: i32, b: i32) -> i32 {
    match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::Div => a.wrapping_div(b),
        BinaryOp::Rem => a.wrapping_rem(b),
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a.wrapping_shl(b as u32 & 31),
        BinaryOp::Shr => a.wrapping_shr(b as u32 & 31),
        BinaryOp::Ushr => ((a as u32) >> (b as u32 & 31)) as i32,
    }
}

/// Evaluates a comparison when both operands are constants.
pub(crate) fn eval_rel(op: RelOp, x: Value, y: Value) -> Option<bool> {
    let (a, b) = (x.const_value()?, y.const_value()?);
    Some(match op {
        RelOp::Eq => a == b,
        RelOp::Ne => a != b,
        RelOp::Lt => a < b,
        RelOp::Le => a <= b,
        RelOp::Gt => a > b,
        RelOp::Ge => a >= b,
    })
}

#[cfg(test)]
mod test {
    use super::{eval_binary, Value};
    use crate::ir::stmt::BinaryOp;

    #[test]
    fn division_by_known_zero_is_nac() {
        assert_eq!(
            eval_binary(BinaryOp::Div, Value::Const(4), Value::Const(0)),
            Value::Nac
        );
        assert_eq!(
            eval_binary(BinaryOp::Rem, Value::Nac, Value::Const(0)),
            Value::Nac
        );
        // A zero divisor wins over a Nac dividend.
        assert_eq!(
            eval_binary(BinaryOp::Div, Value::Nac, Value::Const(2)),
            Value::Nac
        );
    }

    #[test]
    fn arithmetic_wraps() {
        assert_eq!(
            eval_binary(BinaryOp::Add, Value::Const(i32::MAX), Value::Const(1)),
            Value::Const(i32::MIN)
        );
        assert_eq!(
            eval_binary(BinaryOp::Div, Value::Const(i32::MIN), Value::Const(-1)),
            Value::Const(i32::MIN)
        );
    }

    #[test]
    fn shifts_mask_the_count() {
        assert_eq!(
            eval_binary(BinaryOp::Shl, Value::Const(1), Value::Const(33)),
            Value::Const(2)
        );
        assert_eq!(
            eval_binary(BinaryOp::Ushr, Value::Const(-1), Value::Const(1)),
            Value::Const(i32::MAX)
        );
    }

    #[test]
    fn undef_operands_stay_undef() {
        assert_eq!(
            eval_binary(BinaryOp::Add, Value::Undef, Value::Const(1)),
            Value::Undef
        );
        assert_eq!(
            eval_binary(BinaryOp::Add, Value::Undef, Value::Nac),
            Value::Nac
        );
    }
}
