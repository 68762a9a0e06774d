// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Context-sensitive analysis elements and their interning manager.
//!
//! Every descriptor, whether `(context, variable)`, `(heap context,
//! object)`, `(context, call site)` or `(context, method)`, maps to exactly
//! one id, so identity comparison is descriptor equality.

use std::collections::HashMap;
use std::hash::Hash;

use super::context::{ContextCache, ContextId};
use super::heap::ObjId;
use crate::ir::hierarchy::FieldId;
use crate::ir::method::{MethodId, VarId};
use crate::ir::stmt::Site;
use crate::new_index;
use crate::util::index::Idx;

new_index! {
    pub struct CSVarId
}
new_index! {
    pub struct CSObjId
}
new_index! {
    pub struct CSCallSiteId
}
new_index! {
    pub struct CSMethodId
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CSVar {
    pub ctx: ContextId,
    pub var: VarId,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CSObj {
    /// The heap context.
    pub ctx: ContextId,
    pub obj: ObjId,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CSCallSite {
    pub ctx: ContextId,
    pub site: Site,
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct CSMethod {
    pub ctx: ContextId,
    pub method: MethodId,
}

/// A pointer: the node kinds of the pointer-flow graph. Only these carry
/// points-to sets.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Pointer {
    Var(CSVarId),
    InstanceField(CSObjId, FieldId),
    StaticField(FieldId),
    ArrayIndex(CSObjId),
}

struct Interner<K, I> {
    items: Vec<K>,
    map: HashMap<K, I>,
}

impl<K: Copy + Eq + Hash, I: Idx> Interner<K, I> {
    fn new() -> Self {
        Interner {
            items: Vec::new(),
            map: HashMap::new(),
        }
    }

    fn intern(&mut self, item: K) -> I {
        if let Some(&id) = self.map.get(&item) {
            return id;
        }
        let id = I::new(self.items.len());
        self.items.push(item);
        self.map.insert(item, id);
        id
    }

    #[inline]
    fn get(&self, id: I) -> K {
        self.items[id.index()]
    }

    fn find(&self, item: K) -> Option<I> {
        self.map.get(&item).copied()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Interns contexts and all context-sensitive elements.
pub struct CSManager {
    pub contexts: ContextCache,
    cs_vars: Interner<CSVar, CSVarId>,
    cs_objs: Interner<CSObj, CSObjId>,
    cs_call_sites: Interner<CSCallSite, CSCallSiteId>,
    cs_methods: Interner<CSMethod, CSMethodId>,
}

impl CSManager {
    pub fn new() -> Self {
        CSManager {
            contexts: ContextCache::new(),
            cs_vars: Interner::new(),
            cs_objs: Interner::new(),
            cs_call_sites: Interner::new(),
            cs_methods: Interner::new(),
        }
    }

    #[inline]
    pub fn empty_ctx(&self) -> ContextId {
        self.contexts.empty_id()
    }

    pub fn cs_var(&mut self, ctx: ContextId, var: VarId) -> CSVarId {
        self.cs_vars.intern(CSVar { ctx, var })
    }

    pub fn find_cs_var(&self, ctx: ContextId, var: VarId) -> Option<CSVarId> {
        self.cs_vars.find(CSVar { ctx, var })
    }

    #[inline]
    pub fn cs_var_data(&self, id: CSVarId) -> CSVar {
        self.cs_vars.get(id)
    }

    pub fn cs_obj(&mut self, ctx: ContextId, obj: ObjId) -> CSObjId {
        self.cs_objs.intern(CSObj { ctx, obj })
    }

    #[inline]
    pub fn cs_obj_data(&self, id: CSObjId) -> CSObj {
        self.cs_objs.get(id)
    }

    pub fn cs_call_site(&mut self, ctx: ContextId, site: Site) -> CSCallSiteId {
        self.cs_call_sites.intern(CSCallSite { ctx, site })
    }

    #[inline]
    pub fn cs_call_site_data(&self, id: CSCallSiteId) -> CSCallSite {
        self.cs_call_sites.get(id)
    }

    pub fn cs_method(&mut self, ctx: ContextId, method: MethodId) -> CSMethodId {
        self.cs_methods.intern(CSMethod { ctx, method })
    }

    #[inline]
    pub fn cs_method_data(&self, id: CSMethodId) -> CSMethod {
        self.cs_methods.get(id)
    }

    /// All interned context-sensitive variables.
    pub fn cs_var_ids(&self) -> impl Iterator<Item = CSVarId> {
        (0..self.cs_vars.len()).map(CSVarId::new)
    }

    pub fn num_cs_vars(&self) -> usize {
        self.cs_vars.len()
    }

    pub fn num_cs_objs(&self) -> usize {
        self.cs_objs.len()
    }
}

impl Default for CSManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::CSManager;
    use crate::ir::method::VarId;
    use crate::util::index::Idx;

    #[test]
    fn equal_descriptors_intern_to_one_id() {
        let mut csm = CSManager::new();
        let ctx = csm.empty_ctx();
        let a = csm.cs_var(ctx, VarId::new(3));
        let b = csm.cs_var(ctx, VarId::new(3));
        let c = csm.cs_var(ctx, VarId::new(4));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(csm.find_cs_var(ctx, VarId::new(3)), Some(a));
        assert_eq!(csm.find_cs_var(ctx, VarId::new(9)), None);
        assert_eq!(csm.num_cs_vars(), 2);
    }
}
