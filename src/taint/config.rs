// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The on-disk taint configuration: sources, sinks and transfers, with
//! methods spelled as `<Class: ret name(ty0,ty1)>` signatures.
//!
//! Everything is resolved against the program at load time; a signature or
//! type that does not resolve is a configuration error and the analysis
//! refuses to run.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, multispace0};
use nom::combinator::{all_consuming, map, opt, recognize};
use nom::multi::separated_list0;
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;
use serde::Deserialize;

use crate::ir::method::MethodId;
use crate::ir::types::TypeId;
use crate::ir::Program;

/// Transfer index encoding: the receiver of the call.
pub const BASE: i32 = -1;
/// Transfer index encoding: the result of the call.
pub const RESULT: i32 = -2;

/// A resolved taint transfer on some method: values flow from the `from`
/// index to the `to` index, re-typed to `ty`.
#[derive(Copy, Clone, Debug)]
pub struct TaintTransfer {
    pub from: i32,
    pub to: i32,
    pub ty: TypeId,
}

/// The resolved taint configuration.
pub struct TaintConfig {
    pub(crate) sources: HashMap<MethodId, TypeId>,
    pub(crate) sinks: Vec<(MethodId, usize)>,
    pub(crate) transfers: HashMap<MethodId, Vec<TaintTransfer>>,
}

#[derive(Deserialize)]
struct ConfigDoc {
    #[serde(default)]
    sources: Vec<SourceDoc>,
    #[serde(default)]
    sinks: Vec<SinkDoc>,
    #[serde(default)]
    transfers: Vec<TransferDoc>,
}

#[derive(Deserialize)]
struct SourceDoc {
    method: String,
    #[serde(rename = "type")]
    ty: String,
}

#[derive(Deserialize)]
struct SinkDoc {
    method: String,
    index: usize,
}

#[derive(Deserialize)]
struct TransferDoc {
    method: String,
    from: String,
    to: String,
    #[serde(rename = "type")]
    ty: String,
}

impl TaintConfig {
    pub fn load(path: &Path, program: &mut Program) -> Result<TaintConfig> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read taint config `{}`", path.display()))?;
        Self::parse(&text, program)
            .with_context(|| format!("in taint config `{}`", path.display()))
    }

    pub fn parse(text: &str, program: &mut Program) -> Result<TaintConfig> {
        let doc: ConfigDoc = serde_json::from_str(text).context("malformed taint config")?;

        let mut sources = HashMap::new();
        for source in &doc.sources {
            let method = resolve_method(program, &source.method)?;
            let ty = resolve_type(program, &source.ty)?;
            sources.insert(method, ty);
        }

        let mut sinks = Vec::new();
        for sink in &doc.sinks {
            let method = resolve_method(program, &sink.method)?;
            if !sinks.contains(&(method, sink.index)) {
                sinks.push((method, sink.index));
            }
        }

        let mut transfers: HashMap<MethodId, Vec<TaintTransfer>> = HashMap::new();
        for transfer in &doc.transfers {
            let method = resolve_method(program, &transfer.method)?;
            let ty = resolve_type(program, &transfer.ty)?;
            let from = parse_index(&transfer.from)?;
            let to = parse_index(&transfer.to)?;
            transfers.entry(method).or_default().push(TaintTransfer { from, to, ty });
        }

        Ok(TaintConfig {
            sources,
            sinks,
            transfers,
        })
    }
}

/// Parses `base`, `result` or `arg<i>` into the transfer index encoding.
fn parse_index(text: &str) -> Result<i32> {
    match text {
        "base" => Ok(BASE),
        "result" => Ok(RESULT),
        _ => {
            let index = text
                .strip_prefix("arg")
                .and_then(|i| i.parse::<i32>().ok())
                .filter(|&i| i >= 0);
            index.ok_or_else(|| anyhow!("invalid transfer index `{}`", text))
        }
    }
}

fn resolve_type(program: &mut Program, name: &str) -> Result<TypeId> {
    program
        .resolve_type_name(name)
        .ok_or_else(|| anyhow!("unknown type `{}`", name))
}

fn resolve_method(program: &mut Program, signature: &str) -> Result<MethodId> {
    let parsed = parse_signature(signature)
        .ok_or_else(|| anyhow!("malformed method signature `{}`", signature))?;
    let ret = resolve_type(program, parsed.ret)?;
    let params = parsed
        .params
        .iter()
        .map(|p| resolve_type(program, p))
        .collect::<Result<Vec<_>>>()?;

    let hierarchy = program.hierarchy();
    let class = hierarchy
        .class_named(parsed.class)
        .ok_or_else(|| anyhow!("unknown class `{}` in signature", parsed.class))?;
    for c in hierarchy.supers(class) {
        for &m in &hierarchy.class(c).declared_order {
            let method = program.method(m);
            let sig = hierarchy.sig(method.sig);
            if &*method.name == parsed.name && sig.params == params && sig.ret == ret {
                return Ok(m);
            }
        }
    }
    bail!("unresolved method signature `{}`", signature)
}

struct SignatureRef<'a> {
    class: &'a str,
    ret: &'a str,
    name: &'a str,
    params: Vec<&'a str>,
}

fn ident(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || matches!(c, '.' | '_' | '$'))(input)
}

fn type_name(input: &str) -> IResult<&str, &str> {
    recognize(tuple((ident, opt(tag("[]")))))(input)
}

fn signature(input: &str) -> IResult<&str, SignatureRef<'_>> {
    map(
        delimited(
            char('<'),
            tuple((
                ident,
                char(':'),
                preceded(multispace0, type_name),
                preceded(multispace0, ident),
                delimited(
                    char('('),
                    separated_list0(
                        char(','),
                        delimited(multispace0, type_name, multispace0),
                    ),
                    char(')'),
                ),
            )),
            char('>'),
        ),
        |(class, _, ret, name, params)| SignatureRef {
            class,
            ret,
            name,
            params,
        },
    )(input)
}

/// Parses `<Class: ret name(ty0,ty1)>`; `None` on any syntax error.
fn parse_signature(input: &str) -> Option<SignatureRef<'_>> {
    all_consuming(signature)(input.trim()).ok().map(|(_, sig)| sig)
}

#[cfg(test)]
mod test {
    use super::{parse_index, parse_signature, BASE, RESULT};

    #[test]
    fn signatures_parse() {
        let sig = parse_signature("<A: T source()>").unwrap();
        assert_eq!(sig.class, "A");
        assert_eq!(sig.ret, "T");
        assert_eq!(sig.name, "source");
        assert!(sig.params.is_empty());

        let sig = parse_signature("<util.Strings: T concat(T, int[])>").unwrap();
        assert_eq!(sig.class, "util.Strings");
        assert_eq!(sig.params, vec!["T", "int[]"]);

        assert!(parse_signature("<A: T broken(").is_none());
        assert!(parse_signature("A.source()").is_none());
    }

    #[test]
    fn transfer_indices_parse() {
        assert_eq!(parse_index("base").unwrap(), BASE);
        assert_eq!(parse_index("result").unwrap(), RESULT);
        assert_eq!(parse_index("arg0").unwrap(), 0);
        assert_eq!(parse_index("arg3").unwrap(), 3);
        assert!(parse_index("arg-1").is_err());
        assert!(parse_index("this").is_err());
    }
}
