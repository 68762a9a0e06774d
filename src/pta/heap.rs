// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The heap model: abstract objects interned by their descriptor.
//!
//! The default model is allocation-site based: one abstract object per
//! `New` statement. Taint objects are synthetic: interned by their source
//! call site and current logical type, so re-typing at a taint transfer
//! yields a distinct object that still remembers its source.

use std::collections::HashMap;

use crate::ir::stmt::Site;
use crate::ir::types::TypeId;
use crate::new_index;
use crate::util::index::Idx;

new_index! {
    /// The unique identifier for each abstract object.
    pub struct ObjId
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ObjKind {
    /// An allocation-site object.
    Alloc { site: Site },
    /// A synthetic taint object introduced at a source call.
    Taint { source: Site },
}

#[derive(Copy, Clone, Debug)]
pub struct Obj {
    pub kind: ObjKind,
    pub ty: TypeId,
}

pub struct HeapModel {
    objs: Vec<Obj>,
    alloc_map: HashMap<Site, ObjId>,
    taint_map: HashMap<(Site, TypeId), ObjId>,
}

impl HeapModel {
    pub fn new() -> Self {
        HeapModel {
            objs: Vec::new(),
            alloc_map: HashMap::new(),
            taint_map: HashMap::new(),
        }
    }

    fn intern(&mut self, obj: Obj) -> ObjId {
        let id = ObjId::new(self.objs.len());
        self.objs.push(obj);
        id
    }

    /// The abstract object of an allocation site.
    pub fn alloc_obj(&mut self, site: Site, ty: TypeId) -> ObjId {
        if let Some(&id) = self.alloc_map.get(&site) {
            return id;
        }
        let id = self.intern(Obj {
            kind: ObjKind::Alloc { site },
            ty,
        });
        self.alloc_map.insert(site, id);
        id
    }

    /// The taint object for `source` with logical type `ty`.
    pub fn taint_obj(&mut self, source: Site, ty: TypeId) -> ObjId {
        if let Some(&id) = self.taint_map.get(&(source, ty)) {
            return id;
        }
        let id = self.intern(Obj {
            kind: ObjKind::Taint { source },
            ty,
        });
        self.taint_map.insert((source, ty), id);
        id
    }

    #[inline]
    pub fn obj(&self, id: ObjId) -> &Obj {
        &self.objs[id.index()]
    }

    /// The source call site if `id` is a taint object.
    pub fn taint_source(&self, id: ObjId) -> Option<Site> {
        match self.obj(id).kind {
            ObjKind::Taint { source } => Some(source),
            ObjKind::Alloc { .. } => None,
        }
    }

    pub fn num_objs(&self) -> usize {
        self.objs.len()
    }
}

impl Default for HeapModel {
    fn default() -> Self {
        Self::new()
    }
}
