// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Methods, bodies and variables of the analyzed IR.

use std::rc::Rc;

use super::hierarchy::{ClassId, SigId};
use super::stmt::{Stmt, StmtId};
use super::types::TypeId;
use crate::graph::cfg::ControlFlowGraph;
use crate::new_index;

new_index! {
    /// The unique identifier for each method.
    pub struct MethodId
}

new_index! {
    /// The unique identifier for each variable, global across methods.
    pub struct VarId
}

/// A named location in a method body.
///
/// The `load_fields`/`store_fields`/`load_arrays`/`store_arrays`/`invokes`
/// lists are the precomputed inverted index from a variable to the
/// statements that use it as a base or receiver. The pointer analysis walks
/// these when a variable's points-to set grows.
pub struct Var {
    pub method: MethodId,
    pub name: Rc<str>,
    pub ty: TypeId,
    pub(crate) load_fields: Vec<StmtId>,
    pub(crate) store_fields: Vec<StmtId>,
    pub(crate) load_arrays: Vec<StmtId>,
    pub(crate) store_arrays: Vec<StmtId>,
    pub(crate) invokes: Vec<StmtId>,
}

impl Var {
    pub(crate) fn new(method: MethodId, name: &str, ty: TypeId) -> Self {
        Var {
            method,
            name: Rc::from(name),
            ty,
            load_fields: Vec::new(),
            store_fields: Vec::new(),
            load_arrays: Vec::new(),
            store_arrays: Vec::new(),
            invokes: Vec::new(),
        }
    }

    /// Instance loads `x = v.f` with this variable as base.
    pub fn load_fields(&self) -> &[StmtId] {
        &self.load_fields
    }

    /// Instance stores `v.f = y` with this variable as base.
    pub fn store_fields(&self) -> &[StmtId] {
        &self.store_fields
    }

    pub fn load_arrays(&self) -> &[StmtId] {
        &self.load_arrays
    }

    pub fn store_arrays(&self) -> &[StmtId] {
        &self.store_arrays
    }

    /// Instance invokes with this variable as receiver.
    pub fn invokes(&self) -> &[StmtId] {
        &self.invokes
    }
}

/// The body of a concrete method.
pub struct Body {
    pub this: Option<VarId>,
    pub params: Vec<VarId>,
    pub vars: Vec<VarId>,
    pub stmts: Vec<Stmt>,
    /// Variables returned by the body's `Return` statements, deduplicated.
    pub ret_vars: Vec<VarId>,
    pub cfg: ControlFlowGraph,
}

impl Body {
    #[inline]
    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[crate::util::index::Idx::index(id)]
    }

    pub fn stmt_ids(&self) -> impl Iterator<Item = StmtId> {
        (0..self.stmts.len()).map(crate::util::index::Idx::new)
    }
}

pub struct Method {
    pub class: ClassId,
    pub name: Rc<str>,
    pub sig: SigId,
    pub is_static: bool,
    pub is_abstract: bool,
    pub body: Option<Body>,
}

impl Method {
    /// The body of a concrete method; panics on abstract methods, which the
    /// engines never process.
    pub fn body(&self) -> &Body {
        self.body
            .as_ref()
            .unwrap_or_else(|| panic!("method `{}` has no body", self.name))
    }
}
