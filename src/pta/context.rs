// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! Calling contexts: bounded sequences of context elements, value-equal and
//! interned.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result};
use std::rc::Rc;

use super::heap::ObjId;
use crate::ir::stmt::Site;
use crate::ir::types::TypeId;
use crate::new_index;
use crate::util::index::Idx;

new_index! {
    /// The unique identifier for each interned context.
    pub struct ContextId
}

/// One element of a context, as chosen by the active selector.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ContextElem {
    CallSite(Site),
    Object(ObjId),
    Type(TypeId),
}

/// An ordered sequence of context elements, oldest first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Context {
    elems: Vec<ContextElem>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        self.elems.fmt(f)
    }
}

impl Context {
    pub fn empty() -> Self {
        Context { elems: Vec::new() }
    }

    pub fn new(elems: Vec<ContextElem>) -> Self {
        Context { elems }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn elems(&self) -> &[ContextElem] {
        &self.elems
    }

    pub fn last(&self) -> Option<ContextElem> {
        self.elems.last().copied()
    }

    /// Appends `elem`, keeping at most `k` elements by discarding the
    /// oldest ones.
    pub fn append_limited(&self, elem: ContextElem, k: usize) -> Context {
        if k == 0 {
            return Context::empty();
        }
        let keep = (k - 1).min(self.elems.len());
        let mut elems = Vec::with_capacity(keep + 1);
        elems.extend_from_slice(&self.elems[self.elems.len() - keep..]);
        elems.push(elem);
        Context { elems }
    }

    /// The newest `k` elements.
    pub fn suffix(&self, k: usize) -> Context {
        let keep = k.min(self.elems.len());
        Context {
            elems: self.elems[self.elems.len() - keep..].to_vec(),
        }
    }
}

/// Interns contexts; equal element sequences map to one [`ContextId`].
/// The empty context is always id 0.
pub struct ContextCache {
    list: Vec<Rc<Context>>,
    map: HashMap<Rc<Context>, ContextId>,
}

impl ContextCache {
    pub fn new() -> Self {
        let mut cache = ContextCache {
            list: Vec::new(),
            map: HashMap::new(),
        };
        cache.get_id(Context::empty());
        cache
    }

    #[inline]
    pub fn empty_id(&self) -> ContextId {
        ContextId::new(0)
    }

    pub fn get_id(&mut self, context: Context) -> ContextId {
        if let Some(&id) = self.map.get(&context) {
            return id;
        }
        let id = ContextId::new(self.list.len());
        let context = Rc::new(context);
        self.list.push(context.clone());
        self.map.insert(context, id);
        id
    }

    #[inline]
    pub fn get(&self, id: ContextId) -> &Rc<Context> {
        &self.list[id.index()]
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Default for ContextCache {
    fn default() -> Self {
        Self::new()
    }
}
