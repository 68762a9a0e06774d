// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The class hierarchy of the analyzed program: classes, interfaces, fields
//! and interned method subsignatures.

use std::collections::HashMap;
use std::rc::Rc;

use super::method::MethodId;
use super::types::TypeId;
use crate::new_index;
use crate::util::index::Idx;

new_index! {
    /// The unique identifier for each class or interface.
    pub struct ClassId
}

new_index! {
    /// The unique identifier for each field.
    pub struct FieldId
}

new_index! {
    /// The unique identifier for each interned method subsignature.
    pub struct SigId
}

/// A method subsignature: everything dispatch compares, i.e. the method
/// name, parameter types and return type (the declaring class excluded).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Subsignature {
    pub name: Rc<str>,
    pub params: Vec<TypeId>,
    pub ret: TypeId,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub class: ClassId,
    pub name: Rc<str>,
    pub ty: TypeId,
    pub is_static: bool,
}

pub struct Class {
    pub name: Rc<str>,
    pub superclass: Option<ClassId>,
    pub interfaces: Vec<ClassId>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub(crate) declared: HashMap<SigId, MethodId>,
    pub(crate) declared_order: Vec<MethodId>,
    pub(crate) fields: Vec<FieldId>,
}

pub struct ClassHierarchy {
    classes: Vec<Class>,
    class_map: HashMap<Rc<str>, ClassId>,
    fields: Vec<Field>,
    sigs: Vec<Subsignature>,
    sig_map: HashMap<Subsignature, SigId>,
    direct_subclasses: HashMap<ClassId, Vec<ClassId>>,
    direct_subinterfaces: HashMap<ClassId, Vec<ClassId>>,
    direct_implementers: HashMap<ClassId, Vec<ClassId>>,
}

impl ClassHierarchy {
    pub fn new() -> Self {
        ClassHierarchy {
            classes: Vec::new(),
            class_map: HashMap::new(),
            fields: Vec::new(),
            sigs: Vec::new(),
            sig_map: HashMap::new(),
            direct_subclasses: HashMap::new(),
            direct_subinterfaces: HashMap::new(),
            direct_implementers: HashMap::new(),
        }
    }

    pub fn add_class(
        &mut self,
        name: &str,
        is_interface: bool,
        is_abstract: bool,
    ) -> ClassId {
        assert!(
            !self.class_map.contains_key(name),
            "duplicate class `{}`",
            name
        );
        let name: Rc<str> = Rc::from(name);
        let id = ClassId::new(self.classes.len());
        self.classes.push(Class {
            name: name.clone(),
            superclass: None,
            interfaces: Vec::new(),
            is_interface,
            is_abstract,
            declared: HashMap::new(),
            declared_order: Vec::new(),
            fields: Vec::new(),
        });
        self.class_map.insert(name, id);
        id
    }

    pub fn set_superclass(&mut self, class: ClassId, superclass: ClassId) {
        debug_assert!(self.classes[class.index()].superclass.is_none());
        self.classes[class.index()].superclass = Some(superclass);
        self.direct_subclasses
            .entry(superclass)
            .or_default()
            .push(class);
    }

    pub fn add_interface(&mut self, class: ClassId, interface: ClassId) {
        self.classes[class.index()].interfaces.push(interface);
        if self.classes[class.index()].is_interface {
            self.direct_subinterfaces
                .entry(interface)
                .or_default()
                .push(class);
        } else {
            self.direct_implementers
                .entry(interface)
                .or_default()
                .push(class);
        }
    }

    pub fn add_field(&mut self, class: ClassId, name: &str, ty: TypeId, is_static: bool) -> FieldId {
        let id = FieldId::new(self.fields.len());
        self.fields.push(Field {
            class,
            name: Rc::from(name),
            ty,
            is_static,
        });
        self.classes[class.index()].fields.push(id);
        id
    }

    pub(crate) fn declare_method(&mut self, class: ClassId, sig: SigId, method: MethodId) {
        let class = &mut self.classes[class.index()];
        let previous = class.declared.insert(sig, method);
        assert!(previous.is_none(), "duplicate method declaration");
        class.declared_order.push(method);
    }

    pub fn intern_sig(&mut self, sig: Subsignature) -> SigId {
        if let Some(&id) = self.sig_map.get(&sig) {
            return id;
        }
        let id = SigId::new(self.sigs.len());
        self.sigs.push(sig.clone());
        self.sig_map.insert(sig, id);
        id
    }

    #[inline]
    pub fn sig(&self, id: SigId) -> &Subsignature {
        &self.sigs[id.index()]
    }

    #[inline]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id.index()]
    }

    #[inline]
    pub fn field(&self, id: FieldId) -> &Field {
        &self.fields[id.index()]
    }

    pub fn class_named(&self, name: &str) -> Option<ClassId> {
        self.class_map.get(name).copied()
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn class_ids(&self) -> impl Iterator<Item = ClassId> {
        (0..self.classes.len()).map(ClassId::new)
    }

    /// The method `class` itself declares for `sig`, not consulting supers.
    pub fn declared_method(&self, class: ClassId, sig: SigId) -> Option<MethodId> {
        self.class(class).declared.get(&sig).copied()
    }

    /// Looks a field up by name along the superclass chain.
    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        for c in self.supers(class) {
            if let Some(&f) = self
                .class(c)
                .fields
                .iter()
                .find(|&&f| &*self.field(f).name == name)
            {
                return Some(f);
            }
        }
        None
    }

    /// The superclass chain starting at `class` itself.
    pub fn supers(&self, class: ClassId) -> impl Iterator<Item = ClassId> + '_ {
        let mut next = Some(class);
        std::iter::from_fn(move || {
            let current = next?;
            next = self.class(current).superclass;
            Some(current)
        })
    }

    pub fn direct_subclasses(&self, class: ClassId) -> &[ClassId] {
        self.direct_subclasses
            .get(&class)
            .map_or(&[], Vec::as_slice)
    }

    pub fn direct_subinterfaces(&self, interface: ClassId) -> &[ClassId] {
        self.direct_subinterfaces
            .get(&interface)
            .map_or(&[], Vec::as_slice)
    }

    pub fn direct_implementers(&self, interface: ClassId) -> &[ClassId] {
        self.direct_implementers
            .get(&interface)
            .map_or(&[], Vec::as_slice)
    }

    /// All transitive subclasses of `class`, including `class` itself, in a
    /// deterministic breadth-first order.
    pub fn subclass_closure(&self, class: ClassId) -> Vec<ClassId> {
        let mut closure = vec![class];
        let mut i = 0;
        while i < closure.len() {
            let c = closure[i];
            i += 1;
            closure.extend_from_slice(self.direct_subclasses(c));
        }
        closure
    }
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::new()
    }
}
