// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The analyzed-program model: types, class hierarchy, methods and
//! statements, plus the [`Program`] facade the engines consume.

use self::hierarchy::{ClassHierarchy, ClassId, SigId};
use self::method::{Body, Method, MethodId, Var, VarId};
use self::stmt::{CallKind, Invoke, Site, Stmt};
use self::types::TypeSystem;
use crate::util::index::Idx;

pub mod analysis_context;
pub mod builder;
pub mod hierarchy;
pub mod loader;
pub mod method;
pub mod stmt;
pub mod types;

/// A whole program: the world facade the analyses run against.
pub struct Program {
    pub(crate) types: TypeSystem,
    pub(crate) hierarchy: ClassHierarchy,
    pub(crate) methods: Vec<Method>,
    pub(crate) vars: Vec<Var>,
    pub(crate) main: Option<MethodId>,
}

impl Program {
    #[inline]
    pub fn types(&self) -> &TypeSystem {
        &self.types
    }

    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeSystem {
        &mut self.types
    }

    /// Resolves a spelled type name against the program's classes,
    /// interning array types on demand.
    pub fn resolve_type_name(&mut self, name: &str) -> Option<types::TypeId> {
        self.types.resolve_name(&self.hierarchy, name)
    }

    #[inline]
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    #[inline]
    pub fn method(&self, id: MethodId) -> &Method {
        &self.methods[id.index()]
    }

    #[inline]
    pub fn var(&self, id: VarId) -> &Var {
        &self.vars[id.index()]
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len()).map(MethodId::new)
    }

    pub fn num_methods(&self) -> usize {
        self.methods.len()
    }

    /// The program entry method.
    pub fn main_method(&self) -> MethodId {
        self.main.expect("program has no main method")
    }

    pub fn has_main(&self) -> bool {
        self.main.is_some()
    }

    #[inline]
    pub fn body(&self, method: MethodId) -> &Body {
        self.method(method).body()
    }

    #[inline]
    pub fn stmt(&self, site: Site) -> &Stmt {
        self.body(site.method).stmt(site.stmt)
    }

    /// The invoke at `site`; panics if the site is not a call.
    pub fn invoke_at(&self, site: Site) -> &Invoke {
        self.stmt(site)
            .as_invoke()
            .unwrap_or_else(|| panic!("{:?} is not a call site", site))
    }

    /// Resolves the single dynamic-dispatch target for `sig` starting at
    /// `class`, walking the superclass chain and skipping abstract methods.
    /// Returns `None` when the chain tops out without a match.
    pub fn dispatch(&self, class: ClassId, sig: SigId) -> Option<MethodId> {
        for c in self.hierarchy.supers(class) {
            if let Some(m) = self.hierarchy.declared_method(c, sig) {
                if !self.method(m).is_abstract {
                    return Some(m);
                }
            }
        }
        None
    }

    /// Resolves the callee of `invoke` for a receiver of class `recv_class`
    /// (ignored for static calls). `None` means the dispatch is
    /// unresolvable and the call must be skipped.
    pub fn resolve_callee(&self, recv_class: Option<ClassId>, invoke: &Invoke) -> Option<MethodId> {
        match invoke.kind {
            CallKind::Static | CallKind::Special => self.dispatch(invoke.declared, invoke.sig),
            CallKind::Virtual | CallKind::Interface | CallKind::Dynamic => {
                self.dispatch(recv_class?, invoke.sig)
            }
        }
    }

    /// `Class.method` rendering for logs and dumps.
    pub fn method_name(&self, id: MethodId) -> String {
        let method = self.method(id);
        format!(
            "{}.{}",
            self.hierarchy.class(method.class).name,
            method.name
        )
    }

    /// `Class.method/name` rendering of a variable.
    pub fn var_name(&self, id: VarId) -> String {
        let var = self.var(id);
        format!("{}/{}", self.method_name(var.method), var.name)
    }

    /// `Class.method:index` rendering of a statement site.
    pub fn site_name(&self, site: Site) -> String {
        format!("{}:{}", self.method_name(site.method), site.stmt.index())
    }
}
