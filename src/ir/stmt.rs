// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Statements of the analyzed IR.

use std::fmt;

use super::hierarchy::{ClassId, FieldId, SigId};
use super::method::{MethodId, VarId};
use super::types::TypeId;
use crate::new_index;

new_index! {
    /// A statement's position inside its method body.
    pub struct StmtId
}

/// A global statement reference. Call sites and allocation sites are `Site`s.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Site {
    pub method: MethodId,
    pub stmt: StmtId,
}

impl Site {
    pub fn new(method: MethodId, stmt: StmtId) -> Self {
        Site { method, stmt }
    }
}

impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Site({:?}, {:?})", self.method, self.stmt)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Ushr,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// How a call site dispatches.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum CallKind {
    Static,
    Special,
    Virtual,
    Interface,
    Dynamic,
}

impl CallKind {
    /// True for the kinds that dispatch on a receiver object.
    pub fn has_receiver(self) -> bool {
        !matches!(self, CallKind::Static)
    }
}

/// A call site: dispatch kind, the statically declared target, receiver,
/// arguments and the optional result variable.
#[derive(Clone, Debug)]
pub struct Invoke {
    pub kind: CallKind,
    /// Receiver variable; `None` for static calls.
    pub recv: Option<VarId>,
    /// The class against which the target is declared.
    pub declared: ClassId,
    /// The subsignature dispatch resolves.
    pub sig: SigId,
    pub args: Vec<VarId>,
    pub result: Option<VarId>,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    /// `x = new T`
    New { lhs: VarId, ty: TypeId },
    /// `x = y`
    Copy { lhs: VarId, rhs: VarId },
    /// `x = (T) y`
    Cast { lhs: VarId, ty: TypeId, rhs: VarId },
    /// `x = c`
    AssignLiteral { lhs: VarId, value: i32 },
    /// `x = y op z`
    Binary {
        lhs: VarId,
        op: BinaryOp,
        x: VarId,
        y: VarId,
    },
    /// `x = base.f` / `x = T.f` (base `None` for static fields)
    LoadField {
        lhs: VarId,
        base: Option<VarId>,
        field: FieldId,
    },
    /// `base.f = y` / `T.f = y`
    StoreField {
        base: Option<VarId>,
        field: FieldId,
        rhs: VarId,
    },
    /// `x = base[i]`
    LoadArray {
        lhs: VarId,
        base: VarId,
        index: VarId,
    },
    /// `base[i] = y`
    StoreArray {
        base: VarId,
        index: VarId,
        rhs: VarId,
    },
    Invoke(Invoke),
    /// `if (x op y) goto target`, falling through otherwise
    If {
        x: VarId,
        op: RelOp,
        y: VarId,
        target: StmtId,
    },
    Goto { target: StmtId },
    /// `switch (key)`: explicit case targets plus a default target
    Switch {
        key: VarId,
        cases: Vec<(i32, StmtId)>,
        default_target: StmtId,
    },
    Return { value: Option<VarId> },
    Nop,
}

impl Stmt {
    /// The variable this statement defines, if any.
    pub fn def(&self) -> Option<VarId> {
        match self {
            Stmt::New { lhs, .. }
            | Stmt::Copy { lhs, .. }
            | Stmt::Cast { lhs, .. }
            | Stmt::AssignLiteral { lhs, .. }
            | Stmt::Binary { lhs, .. }
            | Stmt::LoadField { lhs, .. }
            | Stmt::LoadArray { lhs, .. } => Some(*lhs),
            Stmt::Invoke(invoke) => invoke.result,
            _ => None,
        }
    }

    /// The variables this statement reads.
    pub fn uses(&self) -> Vec<VarId> {
        match self {
            Stmt::New { .. } | Stmt::AssignLiteral { .. } | Stmt::Goto { .. } | Stmt::Nop => {
                Vec::new()
            }
            Stmt::Copy { rhs, .. } | Stmt::Cast { rhs, .. } => vec![*rhs],
            Stmt::Binary { x, y, .. } => vec![*x, *y],
            Stmt::LoadField { base, .. } => base.iter().copied().collect(),
            Stmt::StoreField { base, rhs, .. } => {
                base.iter().copied().chain(std::iter::once(*rhs)).collect()
            }
            Stmt::LoadArray { base, index, .. } => vec![*base, *index],
            Stmt::StoreArray { base, index, rhs } => vec![*base, *index, *rhs],
            Stmt::Invoke(invoke) => invoke
                .recv
                .iter()
                .chain(invoke.args.iter())
                .copied()
                .collect(),
            Stmt::If { x, y, .. } => vec![*x, *y],
            Stmt::Switch { key, .. } => vec![*key],
            Stmt::Return { value } => value.iter().copied().collect(),
        }
    }

    pub fn as_invoke(&self) -> Option<&Invoke> {
        match self {
            Stmt::Invoke(invoke) => Some(invoke),
            _ => None,
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Stmt::Invoke(_))
    }
}
