// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

//! The constant-propagation lattice: `Undef ⊏ Const(c) ⊏ Nac`, and the
//! per-program-point facts mapping variables to lattice values.

use std::collections::HashMap;
use std::fmt;

use crate::ir::method::VarId;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Value {
    /// No observed value; the lattice bottom.
    Undef,
    Const(i32),
    /// Not a constant; the lattice top.
    Nac,
}

impl Value {
    pub fn is_const(self) -> bool {
        matches!(self, Value::Const(_))
    }

    pub fn const_value(self) -> Option<i32> {
        match self {
            Value::Const(c) => Some(c),
            _ => None,
        }
    }

    /// The lattice meet: unequal constants collapse to [`Value::Nac`],
    /// [`Value::Undef`] is the identity.
    pub fn meet(self, other: Value) -> Value {
        match (self, other) {
            (Value::Undef, v) | (v, Value::Undef) => v,
            (Value::Nac, _) | (_, Value::Nac) => Value::Nac,
            (Value::Const(a), Value::Const(b)) => {
                if a == b {
                    Value::Const(a)
                } else {
                    Value::Nac
                }
            }
        }
    }
}

/// A mapping from variables to lattice values; absent variables are
/// [`Value::Undef`]. The map never stores `Undef` explicitly, so facts
/// compare structurally.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CPFact {
    map: HashMap<VarId, Value>,
}

impl CPFact {
    pub fn new() -> Self {
        CPFact {
            map: HashMap::new(),
        }
    }

    pub fn get(&self, var: VarId) -> Value {
        self.map.get(&var).copied().unwrap_or(Value::Undef)
    }

    /// Binds `var` to `value`; returns true if the fact changed.
    pub fn update(&mut self, var: VarId, value: Value) -> bool {
        match value {
            Value::Undef => self.map.remove(&var).is_some(),
            _ => self.map.insert(var, value) != Some(value),
        }
    }

    pub fn remove(&mut self, var: VarId) -> bool {
        self.map.remove(&var).is_some()
    }

    /// Makes `self` a copy of `other`; returns true if `self` changed.
    pub fn copy_from(&mut self, other: &CPFact) -> bool {
        if self == other {
            false
        } else {
            self.map = other.map.clone();
            true
        }
    }

    /// Meets `other` into `self` variable-wise; returns true if `self`
    /// changed.
    pub fn meet_with(&mut self, other: &CPFact) -> bool {
        let mut changed = false;
        for (&var, &value) in &other.map {
            let old = self.get(var);
            changed |= self.update(var, old.meet(value));
        }
        changed
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, Value)> + '_ {
        self.map.iter().map(|(&v, &val)| (v, val))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl fmt::Debug for CPFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.map.iter().collect();
        entries.sort_by_key(|(v, _)| **v);
        f.debug_map().entries(entries).finish()
    }
}
