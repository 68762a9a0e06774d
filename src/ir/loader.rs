// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Loads a program from its JSON document form.
//!
//! The document lists classes with their fields and methods; method bodies
//! are flat statement lists whose branch targets are statement indices.
//! Malformed documents are configuration errors: the loader refuses them
//! with a diagnostic instead of producing a partial program.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;

use super::builder::ProgramBuilder;
use super::hierarchy::ClassId;
use super::method::VarId;
use super::stmt::{BinaryOp, CallKind, RelOp, StmtId};
use super::Program;
use crate::util::index::Idx;

#[derive(Deserialize)]
struct ProgramDoc {
    classes: Vec<ClassDoc>,
    #[serde(default)]
    main: Option<MainDoc>,
}

#[derive(Deserialize)]
struct MainDoc {
    class: String,
    method: String,
}

#[derive(Deserialize)]
struct ClassDoc {
    name: String,
    #[serde(default)]
    superclass: Option<String>,
    #[serde(default)]
    interfaces: Vec<String>,
    #[serde(default)]
    is_interface: bool,
    #[serde(default)]
    is_abstract: bool,
    #[serde(default)]
    fields: Vec<FieldDoc>,
    #[serde(default)]
    methods: Vec<MethodDoc>,
}

#[derive(Deserialize)]
struct FieldDoc {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    is_static: bool,
}

#[derive(Deserialize)]
struct VarDoc {
    name: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
struct MethodDoc {
    name: String,
    #[serde(default)]
    params: Vec<VarDoc>,
    #[serde(rename = "return", default)]
    ret: Option<String>,
    #[serde(default)]
    is_static: bool,
    #[serde(default)]
    is_abstract: bool,
    #[serde(default)]
    vars: Vec<VarDoc>,
    #[serde(default)]
    stmts: Vec<StmtDoc>,
}

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum StmtDoc {
    New {
        lhs: String,
        #[serde(rename = "type")]
        ty: String,
    },
    Copy {
        lhs: String,
        rhs: String,
    },
    Cast {
        lhs: String,
        #[serde(rename = "type")]
        ty: String,
        rhs: String,
    },
    Const {
        lhs: String,
        value: i32,
    },
    Binary {
        lhs: String,
        operator: String,
        x: String,
        y: String,
    },
    LoadField {
        lhs: String,
        #[serde(default)]
        base: Option<String>,
        class: String,
        field: String,
    },
    StoreField {
        #[serde(default)]
        base: Option<String>,
        class: String,
        field: String,
        rhs: String,
    },
    LoadArray {
        lhs: String,
        base: String,
        index: String,
    },
    StoreArray {
        base: String,
        index: String,
        rhs: String,
    },
    Invoke {
        kind: String,
        #[serde(default)]
        recv: Option<String>,
        class: String,
        method: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        result: Option<String>,
    },
    If {
        x: String,
        rel: String,
        y: String,
        target: usize,
    },
    Goto {
        target: usize,
    },
    Switch {
        key: String,
        cases: Vec<CaseDoc>,
        default: usize,
    },
    Return {
        #[serde(default)]
        value: Option<String>,
    },
    Nop,
}

#[derive(Deserialize)]
struct CaseDoc {
    value: i32,
    target: usize,
}

/// Loads a program document from a file.
pub fn load_program(path: &Path) -> Result<Program> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read program file `{}`", path.display()))?;
    parse_program(&text).with_context(|| format!("in program file `{}`", path.display()))
}

/// Parses a program document from its JSON text.
pub fn parse_program(text: &str) -> Result<Program> {
    let doc: ProgramDoc = serde_json::from_str(text).context("malformed program document")?;
    let mut pb = ProgramBuilder::new();

    // Classes first, superclass/interface wiring second, so that forward
    // references between classes resolve.
    let mut class_ids: HashMap<String, ClassId> = HashMap::new();
    for class in &doc.classes {
        let id = pb.add_class_flags(&class.name, class.is_interface, class.is_abstract);
        class_ids.insert(class.name.clone(), id);
    }
    let class_of = |name: &str, class_ids: &HashMap<String, ClassId>| {
        class_ids
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown class `{}`", name))
    };
    for class in &doc.classes {
        let id = class_ids[&class.name];
        if let Some(superclass) = &class.superclass {
            let sup = class_of(superclass, &class_ids)?;
            pb.set_superclass(id, sup);
        }
        for interface in &class.interfaces {
            let iface = class_of(interface, &class_ids)?;
            pb.implements(id, iface);
        }
    }

    // Fields and method declarations.
    for class in &doc.classes {
        let id = class_ids[&class.name];
        for field in &class.fields {
            let ty = pb
                .resolve_type(&field.ty)
                .ok_or_else(|| anyhow!("unknown type `{}` of field {}", field.ty, field.name))?;
            if field.is_static {
                pb.add_static_field(id, &field.name, ty);
            } else {
                pb.add_field(id, &field.name, ty);
            }
        }
        for method in &class.methods {
            let mut params = Vec::new();
            for p in &method.params {
                let ty = pb
                    .resolve_type(&p.ty)
                    .ok_or_else(|| anyhow!("unknown parameter type `{}`", p.ty))?;
                params.push(ty);
            }
            let ret = match &method.ret {
                Some(name) => pb
                    .resolve_type(name)
                    .ok_or_else(|| anyhow!("unknown return type `{}`", name))?,
                None => pb.void_ty(),
            };
            if method.is_abstract {
                pb.declare_abstract_method(id, &method.name, &params, ret);
            } else if method.is_static {
                pb.declare_static_method(id, &method.name, &params, ret);
            } else {
                pb.declare_method(id, &method.name, &params, ret);
            }
        }
    }

    // Bodies.
    for class in &doc.classes {
        let class_id = class_ids[&class.name];
        for method in &class.methods {
            if method.is_abstract {
                continue;
            }
            build_body(&mut pb, class_id, method, &class_ids)
                .with_context(|| format!("in method {}.{}", class.name, method.name))?;
        }
    }

    if let Some(main) = &doc.main {
        let class = class_of(&main.class, &class_ids)?;
        let method = pb
            .method_named(class, &main.method)
            .ok_or_else(|| anyhow!("unknown main method {}.{}", main.class, main.method))?;
        pb.set_main(method);
    }

    Ok(pb.finish())
}

fn build_body(
    pb: &mut ProgramBuilder,
    class: ClassId,
    method: &MethodDoc,
    class_ids: &HashMap<String, ClassId>,
) -> Result<()> {
    let method_id = pb
        .method_named(class, &method.name)
        .expect("method was declared in the previous pass");
    let mut b = pb.body(method_id);

    let mut var_ids: HashMap<String, VarId> = HashMap::new();
    if !method.is_static {
        var_ids.insert("this".to_string(), b.this());
    }
    for p in &method.params {
        var_ids.insert(p.name.clone(), b.param(&p.name));
    }
    for v in &method.vars {
        let ty = b
            .builder()
            .resolve_type(&v.ty)
            .ok_or_else(|| anyhow!("unknown type `{}` of var {}", v.ty, v.name))?;
        var_ids.insert(v.name.clone(), b.var(&v.name, ty));
    }
    let var = |name: &str, var_ids: &HashMap<String, VarId>| {
        var_ids
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown variable `{}`", name))
    };
    let class_of = |name: &str| {
        class_ids
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown class `{}`", name))
    };

    for stmt in &method.stmts {
        match stmt {
            StmtDoc::New { lhs, ty } => {
                let lhs = var(lhs, &var_ids)?;
                let ty = b
                    .builder()
                    .resolve_type(ty)
                    .ok_or_else(|| anyhow!("unknown type `{}`", ty))?;
                b.new_obj(lhs, ty);
            }
            StmtDoc::Copy { lhs, rhs } => {
                let (lhs, rhs) = (var(lhs, &var_ids)?, var(rhs, &var_ids)?);
                b.copy(lhs, rhs);
            }
            StmtDoc::Cast { lhs, ty, rhs } => {
                let (lhs, rhs) = (var(lhs, &var_ids)?, var(rhs, &var_ids)?);
                let ty = b
                    .builder()
                    .resolve_type(ty)
                    .ok_or_else(|| anyhow!("unknown type `{}`", ty))?;
                b.cast(lhs, ty, rhs);
            }
            StmtDoc::Const { lhs, value } => {
                let lhs = var(lhs, &var_ids)?;
                b.assign_int(lhs, *value);
            }
            StmtDoc::Binary { lhs, operator, x, y } => {
                let lhs = var(lhs, &var_ids)?;
                let x = var(x, &var_ids)?;
                let y = var(y, &var_ids)?;
                b.binary(lhs, parse_binary_op(operator)?, x, y);
            }
            StmtDoc::LoadField {
                lhs,
                base,
                class,
                field,
            } => {
                let lhs = var(lhs, &var_ids)?;
                let owner = class_of(class)?;
                let field = b
                    .builder()
                    .hierarchy()
                    .resolve_field(owner, field)
                    .ok_or_else(|| anyhow!("unknown field {}.{}", class, field))?;
                match base {
                    Some(base) => {
                        let base = var(base, &var_ids)?;
                        b.load_field(lhs, base, field);
                    }
                    None => {
                        b.load_static(lhs, field);
                    }
                }
            }
            StmtDoc::StoreField {
                base,
                class,
                field,
                rhs,
            } => {
                let rhs = var(rhs, &var_ids)?;
                let owner = class_of(class)?;
                let field = b
                    .builder()
                    .hierarchy()
                    .resolve_field(owner, field)
                    .ok_or_else(|| anyhow!("unknown field {}.{}", class, field))?;
                match base {
                    Some(base) => {
                        let base = var(base, &var_ids)?;
                        b.store_field(base, field, rhs);
                    }
                    None => {
                        b.store_static(field, rhs);
                    }
                }
            }
            StmtDoc::LoadArray { lhs, base, index } => {
                let lhs = var(lhs, &var_ids)?;
                let base = var(base, &var_ids)?;
                let index = var(index, &var_ids)?;
                b.load_array(lhs, base, index);
            }
            StmtDoc::StoreArray { base, index, rhs } => {
                let base = var(base, &var_ids)?;
                let index = var(index, &var_ids)?;
                let rhs = var(rhs, &var_ids)?;
                b.store_array(base, index, rhs);
            }
            StmtDoc::Invoke {
                kind,
                recv,
                class,
                method,
                args,
                result,
            } => {
                let kind = parse_call_kind(kind)?;
                let declared = class_of(class)?;
                let recv = match recv {
                    Some(r) => Some(var(r, &var_ids)?),
                    None => None,
                };
                if kind.has_receiver() != recv.is_some() {
                    bail!("call kind {:?} disagrees with receiver presence", kind);
                }
                let args = args
                    .iter()
                    .map(|a| var(a, &var_ids))
                    .collect::<Result<Vec<_>>>()?;
                let result = match result {
                    Some(r) => Some(var(r, &var_ids)?),
                    None => None,
                };
                b.invoke(kind, declared, method, recv, args, result);
            }
            StmtDoc::If { x, rel, y, target } => {
                let x = var(x, &var_ids)?;
                let y = var(y, &var_ids)?;
                let id = b.if_stmt(x, parse_rel_op(rel)?, y);
                b.set_target(id, StmtId::new(*target));
            }
            StmtDoc::Goto { target } => {
                let id = b.goto();
                b.set_target(id, StmtId::new(*target));
            }
            StmtDoc::Switch {
                key,
                cases,
                default,
            } => {
                let key = var(key, &var_ids)?;
                let id = b.switch(key);
                let cases = cases
                    .iter()
                    .map(|c| (c.value, StmtId::new(c.target)))
                    .collect();
                b.set_switch(id, cases, StmtId::new(*default));
            }
            StmtDoc::Return { value } => {
                let value = match value {
                    Some(v) => Some(var(v, &var_ids)?),
                    None => None,
                };
                b.ret(value);
            }
            StmtDoc::Nop => {
                b.nop();
            }
        }
    }

    b.finish();
    Ok(())
}

fn parse_binary_op(name: &str) -> Result<BinaryOp> {
    Ok(match name {
        "+" | "add" => BinaryOp::Add,
        "-" | "sub" => BinaryOp::Sub,
        "*" | "mul" => BinaryOp::Mul,
        "/" | "div" => BinaryOp::Div,
        "%" | "rem" => BinaryOp::Rem,
        "&" | "and" => BinaryOp::And,
        "|" | "or" => BinaryOp::Or,
        "^" | "xor" => BinaryOp::Xor,
        "<<" | "shl" => BinaryOp::Shl,
        ">>" | "shr" => BinaryOp::Shr,
        ">>>" | "ushr" => BinaryOp::Ushr,
        _ => bail!("unknown binary operator `{}`", name),
    })
}

fn parse_rel_op(name: &str) -> Result<RelOp> {
    Ok(match name {
        "==" | "eq" => RelOp::Eq,
        "!=" | "ne" => RelOp::Ne,
        "<" | "lt" => RelOp::Lt,
        "<=" | "le" => RelOp::Le,
        ">" | "gt" => RelOp::Gt,
        ">=" | "ge" => RelOp::Ge,
        _ => bail!("unknown relational operator `{}`", name),
    })
}

fn parse_call_kind(name: &str) -> Result<CallKind> {
    Ok(match name {
        "static" => CallKind::Static,
        "special" => CallKind::Special,
        "virtual" => CallKind::Virtual,
        "interface" => CallKind::Interface,
        "dynamic" => CallKind::Dynamic,
        _ => bail!("unknown call kind `{}`", name),
    })
}

#[cfg(test)]
mod test {
    use super::parse_program;

    #[test]
    fn rejects_malformed_documents() {
        assert!(parse_program("{").is_err());
        assert!(parse_program(r#"{"classes": [{"name": "A", "superclass": "B"}]}"#).is_err());
    }

    #[test]
    fn loads_a_small_program() {
        let text = r#"{
            "classes": [{
                "name": "A",
                "fields": [{"name": "f", "type": "int", "is_static": true}],
                "methods": [{
                    "name": "main", "is_static": true,
                    "vars": [{"name": "x", "type": "int"}, {"name": "a", "type": "A"}],
                    "stmts": [
                        {"op": "const", "lhs": "x", "value": 7},
                        {"op": "new", "lhs": "a", "type": "A"},
                        {"op": "storefield", "class": "A", "field": "f", "rhs": "x"},
                        {"op": "return"}
                    ]
                }]
            }],
            "main": {"class": "A", "method": "main"}
        }"#;
        let program = parse_program(text).unwrap();
        assert!(program.has_main());
        let body = program.body(program.main_method());
        assert_eq!(body.stmts.len(), 4);
    }
}
