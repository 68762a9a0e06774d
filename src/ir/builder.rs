// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Programmatic construction of analyzed programs.
//!
//! The loader and the test suites build programs through this API; the
//! engines only ever see the finished [`Program`].

use super::hierarchy::{ClassId, FieldId, Subsignature};
use super::method::{Body, Method, MethodId, Var, VarId};
use super::stmt::{BinaryOp, CallKind, Invoke, RelOp, Stmt, StmtId};
use super::types::TypeId;
use super::Program;
use crate::graph::cfg::ControlFlowGraph;
use crate::ir::hierarchy::ClassHierarchy;
use crate::ir::types::TypeSystem;
use crate::util::index::Idx;

/// The unpatched branch target of a freshly emitted `If`/`Goto`/`Switch`.
const UNPATCHED: u32 = u32::MAX;

pub struct ProgramBuilder {
    types: TypeSystem,
    hierarchy: ClassHierarchy,
    methods: Vec<Method>,
    vars: Vec<Var>,
    main: Option<MethodId>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        ProgramBuilder {
            types: TypeSystem::new(),
            hierarchy: ClassHierarchy::new(),
            methods: Vec::new(),
            vars: Vec::new(),
            main: None,
        }
    }

    #[inline]
    pub fn types(&mut self) -> &mut TypeSystem {
        &mut self.types
    }

    #[inline]
    pub fn int_ty(&self) -> TypeId {
        self.types.int()
    }

    #[inline]
    pub fn boolean_ty(&self) -> TypeId {
        self.types.boolean()
    }

    #[inline]
    pub fn void_ty(&self) -> TypeId {
        self.types.void()
    }

    pub fn class_ty(&mut self, class: ClassId) -> TypeId {
        self.types.reference(class)
    }

    pub fn array_ty(&mut self, elem: TypeId) -> TypeId {
        self.types.array_of(elem)
    }

    #[inline]
    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    /// Resolves a spelled type name (`int`, `A`, `A[]`, …) against the
    /// classes added so far.
    pub fn resolve_type(&mut self, name: &str) -> Option<TypeId> {
        self.types.resolve_name(&self.hierarchy, name)
    }

    /// Adds a class with explicit flags and no superclass; the loader wires
    /// superclasses up in a second pass.
    pub fn add_class_flags(&mut self, name: &str, is_interface: bool, is_abstract: bool) -> ClassId {
        self.hierarchy.add_class(name, is_interface, is_abstract)
    }

    pub fn set_superclass(&mut self, class: ClassId, superclass: ClassId) {
        self.hierarchy.set_superclass(class, superclass);
    }

    /// Adds a concrete class.
    pub fn add_class(&mut self, name: &str, superclass: Option<ClassId>) -> ClassId {
        let id = self.hierarchy.add_class(name, false, false);
        if let Some(superclass) = superclass {
            self.hierarchy.set_superclass(id, superclass);
        }
        id
    }

    pub fn add_abstract_class(&mut self, name: &str, superclass: Option<ClassId>) -> ClassId {
        let id = self.hierarchy.add_class(name, false, true);
        if let Some(superclass) = superclass {
            self.hierarchy.set_superclass(id, superclass);
        }
        id
    }

    pub fn add_interface(&mut self, name: &str) -> ClassId {
        self.hierarchy.add_class(name, true, true)
    }

    /// Records that `class` implements (or, for interfaces, extends)
    /// `interface`.
    pub fn implements(&mut self, class: ClassId, interface: ClassId) {
        self.hierarchy.add_interface(class, interface);
    }

    pub fn add_field(&mut self, class: ClassId, name: &str, ty: TypeId) -> FieldId {
        self.hierarchy.add_field(class, name, ty, false)
    }

    pub fn add_static_field(&mut self, class: ClassId, name: &str, ty: TypeId) -> FieldId {
        self.hierarchy.add_field(class, name, ty, true)
    }

    fn declare(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
        is_static: bool,
        is_abstract: bool,
    ) -> MethodId {
        let sig = self.hierarchy.intern_sig(Subsignature {
            name: name.into(),
            params: params.to_vec(),
            ret,
        });
        let id = MethodId::new(self.methods.len());
        self.methods.push(Method {
            class,
            name: name.into(),
            sig,
            is_static,
            is_abstract,
            body: None,
        });
        self.hierarchy.declare_method(class, sig, id);
        id
    }

    /// Declares a concrete instance method; fill its body with [`Self::body`].
    pub fn declare_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
    ) -> MethodId {
        self.declare(class, name, params, ret, false, false)
    }

    pub fn declare_static_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
    ) -> MethodId {
        self.declare(class, name, params, ret, true, false)
    }

    pub fn declare_abstract_method(
        &mut self,
        class: ClassId,
        name: &str,
        params: &[TypeId],
        ret: TypeId,
    ) -> MethodId {
        self.declare(class, name, params, ret, false, true)
    }

    /// Starts the body of a previously declared concrete method.
    pub fn body(&mut self, method: MethodId) -> BodyBuilder<'_> {
        assert!(
            !self.methods[method.index()].is_abstract,
            "abstract methods have no body"
        );
        assert!(
            self.methods[method.index()].body.is_none(),
            "body built twice"
        );
        let class = self.methods[method.index()].class;
        let is_static = self.methods[method.index()].is_static;
        let mut builder = BodyBuilder {
            pb: self,
            method,
            this: None,
            params: Vec::new(),
            vars: Vec::new(),
            stmts: Vec::new(),
            next_param: 0,
        };
        if !is_static {
            let ty = builder.pb.types.reference(class);
            builder.this = Some(builder.alloc_var("this", ty));
        }
        builder
    }

    pub fn set_main(&mut self, method: MethodId) {
        self.main = Some(method);
    }

    /// Searches `class` and its superclasses for a declared method named
    /// `name`. Builder-level convenience for spelling call sites.
    pub fn method_named(&self, class: ClassId, name: &str) -> Option<MethodId> {
        for c in self.hierarchy.supers(class) {
            for &m in &self.hierarchy.class(c).declared_order {
                if &*self.methods[m.index()].name == name {
                    return Some(m);
                }
            }
        }
        None
    }

    pub fn finish(self) -> Program {
        Program {
            types: self.types,
            hierarchy: self.hierarchy,
            methods: self.methods,
            vars: self.vars,
            main: self.main,
        }
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Emits the statements of one method body. Branch targets may be patched
/// after emission with [`Self::set_target`] / [`Self::set_switch`].
pub struct BodyBuilder<'a> {
    pb: &'a mut ProgramBuilder,
    method: MethodId,
    this: Option<VarId>,
    params: Vec<VarId>,
    vars: Vec<VarId>,
    stmts: Vec<Stmt>,
    next_param: usize,
}

impl<'a> BodyBuilder<'a> {
    /// Access to the enclosing program builder, e.g. for type lookups while
    /// a body is under construction.
    pub fn builder(&mut self) -> &mut ProgramBuilder {
        self.pb
    }

    fn alloc_var(&mut self, name: &str, ty: TypeId) -> VarId {
        let id = VarId::new(self.pb.vars.len());
        self.pb.vars.push(Var::new(self.method, name, ty));
        self.vars.push(id);
        id
    }

    /// The receiver variable of an instance method.
    pub fn this(&self) -> VarId {
        self.this.expect("static method has no `this`")
    }

    /// Declares the next parameter; types follow the declaration order.
    pub fn param(&mut self, name: &str) -> VarId {
        let sig = self.pb.methods[self.method.index()].sig;
        let ty = self.pb.hierarchy.sig(sig).params[self.next_param];
        self.next_param += 1;
        let id = self.alloc_var(name, ty);
        self.params.push(id);
        id
    }

    pub fn var(&mut self, name: &str, ty: TypeId) -> VarId {
        self.alloc_var(name, ty)
    }

    fn push(&mut self, stmt: Stmt) -> StmtId {
        let id = StmtId::new(self.stmts.len());
        self.stmts.push(stmt);
        id
    }

    pub fn new_obj(&mut self, lhs: VarId, ty: TypeId) -> StmtId {
        self.push(Stmt::New { lhs, ty })
    }

    pub fn copy(&mut self, lhs: VarId, rhs: VarId) -> StmtId {
        self.push(Stmt::Copy { lhs, rhs })
    }

    pub fn cast(&mut self, lhs: VarId, ty: TypeId, rhs: VarId) -> StmtId {
        self.push(Stmt::Cast { lhs, ty, rhs })
    }

    pub fn assign_int(&mut self, lhs: VarId, value: i32) -> StmtId {
        self.push(Stmt::AssignLiteral { lhs, value })
    }

    pub fn binary(&mut self, lhs: VarId, op: BinaryOp, x: VarId, y: VarId) -> StmtId {
        self.push(Stmt::Binary { lhs, op, x, y })
    }

    pub fn load_field(&mut self, lhs: VarId, base: VarId, field: FieldId) -> StmtId {
        self.push(Stmt::LoadField {
            lhs,
            base: Some(base),
            field,
        })
    }

    pub fn load_static(&mut self, lhs: VarId, field: FieldId) -> StmtId {
        self.push(Stmt::LoadField {
            lhs,
            base: None,
            field,
        })
    }

    pub fn store_field(&mut self, base: VarId, field: FieldId, rhs: VarId) -> StmtId {
        self.push(Stmt::StoreField {
            base: Some(base),
            field,
            rhs,
        })
    }

    pub fn store_static(&mut self, field: FieldId, rhs: VarId) -> StmtId {
        self.push(Stmt::StoreField {
            base: None,
            field,
            rhs,
        })
    }

    pub fn load_array(&mut self, lhs: VarId, base: VarId, index: VarId) -> StmtId {
        self.push(Stmt::LoadArray { lhs, base, index })
    }

    pub fn store_array(&mut self, base: VarId, index: VarId, rhs: VarId) -> StmtId {
        self.push(Stmt::StoreArray { base, index, rhs })
    }

    /// Emits a call site. The subsignature is taken from the method named
    /// `name` declared in (or inherited by) `declared`.
    pub fn invoke(
        &mut self,
        kind: CallKind,
        declared: ClassId,
        name: &str,
        recv: Option<VarId>,
        args: Vec<VarId>,
        result: Option<VarId>,
    ) -> StmtId {
        let target = self
            .pb
            .method_named(declared, name)
            .unwrap_or_else(|| panic!("no method `{}` declared for call site", name));
        let sig = self.pb.methods[target.index()].sig;
        self.push(Stmt::Invoke(Invoke {
            kind,
            recv,
            declared,
            sig,
            args,
            result,
        }))
    }

    pub fn call_static(
        &mut self,
        declared: ClassId,
        name: &str,
        args: Vec<VarId>,
        result: Option<VarId>,
    ) -> StmtId {
        self.invoke(CallKind::Static, declared, name, None, args, result)
    }

    pub fn call_virtual(
        &mut self,
        recv: VarId,
        declared: ClassId,
        name: &str,
        args: Vec<VarId>,
        result: Option<VarId>,
    ) -> StmtId {
        self.invoke(CallKind::Virtual, declared, name, Some(recv), args, result)
    }

    pub fn call_interface(
        &mut self,
        recv: VarId,
        declared: ClassId,
        name: &str,
        args: Vec<VarId>,
        result: Option<VarId>,
    ) -> StmtId {
        self.invoke(
            CallKind::Interface,
            declared,
            name,
            Some(recv),
            args,
            result,
        )
    }

    pub fn call_special(
        &mut self,
        recv: VarId,
        declared: ClassId,
        name: &str,
        args: Vec<VarId>,
        result: Option<VarId>,
    ) -> StmtId {
        self.invoke(CallKind::Special, declared, name, Some(recv), args, result)
    }

    /// Emits `if (x op y) goto ?`; patch the target with [`Self::set_target`].
    pub fn if_stmt(&mut self, x: VarId, op: RelOp, y: VarId) -> StmtId {
        self.push(Stmt::If {
            x,
            op,
            y,
            target: StmtId::new(UNPATCHED as usize),
        })
    }

    pub fn goto(&mut self) -> StmtId {
        self.push(Stmt::Goto {
            target: StmtId::new(UNPATCHED as usize),
        })
    }

    pub fn switch(&mut self, key: VarId) -> StmtId {
        self.push(Stmt::Switch {
            key,
            cases: Vec::new(),
            default_target: StmtId::new(UNPATCHED as usize),
        })
    }

    pub fn set_target(&mut self, stmt: StmtId, target: StmtId) {
        match &mut self.stmts[stmt.index()] {
            Stmt::If { target: t, .. } | Stmt::Goto { target: t } => *t = target,
            other => panic!("cannot set branch target of {:?}", other),
        }
    }

    pub fn set_switch(&mut self, stmt: StmtId, cases: Vec<(i32, StmtId)>, default: StmtId) {
        match &mut self.stmts[stmt.index()] {
            Stmt::Switch {
                cases: c,
                default_target,
                ..
            } => {
                *c = cases;
                *default_target = default;
            }
            other => panic!("cannot set switch targets of {:?}", other),
        }
    }

    pub fn ret(&mut self, value: Option<VarId>) -> StmtId {
        self.push(Stmt::Return { value })
    }

    pub fn nop(&mut self) -> StmtId {
        self.push(Stmt::Nop)
    }

    /// The id the next emitted statement will get; handy for branch targets
    /// that point just past an already known block.
    pub fn next_stmt_id(&self) -> StmtId {
        StmtId::new(self.stmts.len())
    }

    /// Seals the body: checks branch targets, derives the return-variable
    /// list and the per-variable statement indexes, and builds the CFG.
    pub fn finish(self) {
        let BodyBuilder {
            pb,
            method,
            this,
            params,
            vars,
            stmts,
            ..
        } = self;

        for (i, stmt) in stmts.iter().enumerate() {
            let check = |target: StmtId| {
                assert!(
                    target.index() < stmts.len(),
                    "unpatched or out-of-range branch target in stmt {}",
                    i
                );
            };
            match stmt {
                Stmt::If { target, .. } | Stmt::Goto { target } => check(*target),
                Stmt::Switch {
                    cases,
                    default_target,
                    ..
                } => {
                    cases.iter().for_each(|(_, t)| check(*t));
                    check(*default_target);
                }
                _ => {}
            }
        }

        let mut ret_vars = Vec::new();
        for stmt in &stmts {
            if let Stmt::Return { value: Some(v) } = stmt {
                if !ret_vars.contains(v) {
                    ret_vars.push(*v);
                }
            }
        }

        // The inverted indexes from base/receiver variables to their
        // relevant statements.
        for (i, stmt) in stmts.iter().enumerate() {
            let sid = StmtId::new(i);
            match stmt {
                Stmt::LoadField {
                    base: Some(base), ..
                } => pb.vars[base.index()].load_fields.push(sid),
                Stmt::StoreField {
                    base: Some(base), ..
                } => pb.vars[base.index()].store_fields.push(sid),
                Stmt::LoadArray { base, .. } => pb.vars[base.index()].load_arrays.push(sid),
                Stmt::StoreArray { base, .. } => pb.vars[base.index()].store_arrays.push(sid),
                Stmt::Invoke(invoke) => {
                    if let Some(recv) = invoke.recv {
                        pb.vars[recv.index()].invokes.push(sid);
                    }
                }
                _ => {}
            }
        }

        let cfg = ControlFlowGraph::build(&stmts);
        pb.methods[method.index()].body = Some(Body {
            this,
            params,
            vars,
            stmts,
            ret_vars,
            cfg,
        });
    }
}
