// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Pluggable context selectors: context-insensitive, k-call-site,
//! k-object and k-type sensitivity, all over the same bounded-list
//! context representation.

use anyhow::{bail, Result};

use super::context::{ContextElem, ContextId};
use super::cs_elems::{CSManager, CSObj};
use super::heap::{HeapModel, ObjId};
use crate::ir::method::MethodId;
use crate::ir::stmt::Site;

/// Chooses callee and heap contexts. `select_static` serves calls without
/// a receiver, `select_instance` dispatched instance calls, and
/// `select_heap` the heap context of a new object in a method context.
pub trait ContextSelector {
    fn select_static(
        &self,
        csm: &mut CSManager,
        caller_ctx: ContextId,
        site: Site,
        callee: MethodId,
    ) -> ContextId;

    fn select_instance(
        &self,
        csm: &mut CSManager,
        heap: &HeapModel,
        caller_ctx: ContextId,
        site: Site,
        recv: CSObj,
        callee: MethodId,
    ) -> ContextId;

    fn select_heap(&self, csm: &mut CSManager, method_ctx: ContextId, obj: ObjId) -> ContextId;
}

/// Parses a selector name: `ci`, `1-call`, `2-call`, `1-obj`, `2-obj`,
/// `1-type`, `2-type`.
pub fn selector_for(name: &str) -> Result<Box<dyn ContextSelector>> {
    let selector: Box<dyn ContextSelector> = match name {
        "ci" => Box::new(ContextInsensitive),
        "1-call" => Box::new(KCallSite { k: 1 }),
        "2-call" => Box::new(KCallSite { k: 2 }),
        "1-obj" => Box::new(KObject { k: 1 }),
        "2-obj" => Box::new(KObject { k: 2 }),
        "1-type" => Box::new(KType { k: 1 }),
        "2-type" => Box::new(KType { k: 2 }),
        _ => bail!("unknown context selector `{}`", name),
    };
    Ok(selector)
}

/// Every context is the empty context.
pub struct ContextInsensitive;

impl ContextSelector for ContextInsensitive {
    fn select_static(
        &self,
        csm: &mut CSManager,
        _caller_ctx: ContextId,
        _site: Site,
        _callee: MethodId,
    ) -> ContextId {
        csm.empty_ctx()
    }

    fn select_instance(
        &self,
        csm: &mut CSManager,
        _heap: &HeapModel,
        _caller_ctx: ContextId,
        _site: Site,
        _recv: CSObj,
        _callee: MethodId,
    ) -> ContextId {
        csm.empty_ctx()
    }

    fn select_heap(&self, csm: &mut CSManager, _method_ctx: ContextId, _obj: ObjId) -> ContextId {
        csm.empty_ctx()
    }
}

/// The callee context is the last `k` call sites on the call string.
pub struct KCallSite {
    pub k: usize,
}

impl ContextSelector for KCallSite {
    fn select_static(
        &self,
        csm: &mut CSManager,
        caller_ctx: ContextId,
        site: Site,
        _callee: MethodId,
    ) -> ContextId {
        let ctx = csm
            .contexts
            .get(caller_ctx)
            .append_limited(ContextElem::CallSite(site), self.k);
        csm.contexts.get_id(ctx)
    }

    fn select_instance(
        &self,
        csm: &mut CSManager,
        _heap: &HeapModel,
        caller_ctx: ContextId,
        site: Site,
        _recv: CSObj,
        callee: MethodId,
    ) -> ContextId {
        self.select_static(csm, caller_ctx, site, callee)
    }

    fn select_heap(&self, csm: &mut CSManager, method_ctx: ContextId, _obj: ObjId) -> ContextId {
        let ctx = csm.contexts.get(method_ctx).suffix(self.k - 1);
        csm.contexts.get_id(ctx)
    }
}

/// The callee context is the receiver object qualified by its own heap
/// context, truncated to `k` elements. Static calls keep the caller's
/// context.
pub struct KObject {
    pub k: usize,
}

impl ContextSelector for KObject {
    fn select_static(
        &self,
        _csm: &mut CSManager,
        caller_ctx: ContextId,
        _site: Site,
        _callee: MethodId,
    ) -> ContextId {
        caller_ctx
    }

    fn select_instance(
        &self,
        csm: &mut CSManager,
        _heap: &HeapModel,
        _caller_ctx: ContextId,
        _site: Site,
        recv: CSObj,
        _callee: MethodId,
    ) -> ContextId {
        let ctx = csm
            .contexts
            .get(recv.ctx)
            .append_limited(ContextElem::Object(recv.obj), self.k);
        csm.contexts.get_id(ctx)
    }

    fn select_heap(&self, csm: &mut CSManager, method_ctx: ContextId, _obj: ObjId) -> ContextId {
        let ctx = csm.contexts.get(method_ctx).suffix(self.k - 1);
        csm.contexts.get_id(ctx)
    }
}

/// Like [`KObject`] but abstracts the receiver to its type.
pub struct KType {
    pub k: usize,
}

impl ContextSelector for KType {
    fn select_static(
        &self,
        _csm: &mut CSManager,
        caller_ctx: ContextId,
        _site: Site,
        _callee: MethodId,
    ) -> ContextId {
        caller_ctx
    }

    fn select_instance(
        &self,
        csm: &mut CSManager,
        heap: &HeapModel,
        _caller_ctx: ContextId,
        _site: Site,
        recv: CSObj,
        _callee: MethodId,
    ) -> ContextId {
        let ty = heap.obj(recv.obj).ty;
        let ctx = csm
            .contexts
            .get(recv.ctx)
            .append_limited(ContextElem::Type(ty), self.k);
        csm.contexts.get_id(ctx)
    }

    fn select_heap(&self, csm: &mut CSManager, method_ctx: ContextId, _obj: ObjId) -> ContextId {
        let ctx = csm.contexts.get(method_ctx).suffix(self.k - 1);
        csm.contexts.get_id(ctx)
    }
}

#[cfg(test)]
mod test {
    use super::{selector_for, ContextSelector, KCallSite};
    use crate::ir::method::MethodId;
    use crate::ir::stmt::{Site, StmtId};
    use crate::pta::context::{Context, ContextElem};
    use crate::pta::cs_elems::CSManager;
    use crate::pta::heap::ObjId;
    use crate::util::index::Idx;

    fn site(i: usize) -> Site {
        Site::new(MethodId::new(0), StmtId::new(i))
    }

    #[test]
    fn selector_names_parse() {
        for name in ["ci", "1-call", "2-call", "1-obj", "2-obj", "1-type", "2-type"] {
            assert!(selector_for(name).is_ok(), "{name}");
        }
        assert!(selector_for("3-call").is_err());
    }

    #[test]
    fn call_strings_are_k_limited() {
        let mut csm = CSManager::new();
        let selector = KCallSite { k: 2 };
        let callee = MethodId::new(1);

        let mut ctx = csm.empty_ctx();
        for i in 0..4 {
            ctx = selector.select_static(&mut csm, ctx, site(i), callee);
            assert!(csm.contexts.get(ctx).len() <= 2);
        }
        assert_eq!(
            csm.contexts.get(ctx).elems(),
            &[ContextElem::CallSite(site(2)), ContextElem::CallSite(site(3))]
        );
    }

    #[test]
    fn heap_context_derives_from_the_method_context() {
        let mut csm = CSManager::new();
        let obj = ObjId::new(0);

        let one_call = KCallSite { k: 1 };
        let empty = csm.empty_ctx();
        assert_eq!(one_call.select_heap(&mut csm, empty, obj), empty);

        let two_call = KCallSite { k: 2 };
        let method_ctx = csm
            .contexts
            .get_id(Context::new(vec![
                ContextElem::CallSite(site(0)),
                ContextElem::CallSite(site(1)),
            ]));
        let heap_ctx = two_call.select_heap(&mut csm, method_ctx, obj);
        assert_eq!(
            csm.contexts.get(heap_ctx).elems(),
            &[ContextElem::CallSite(site(1))]
        );
    }
}
