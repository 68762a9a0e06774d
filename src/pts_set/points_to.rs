// Copyright (c) 2024 <Wei Li>.
//
// This source code is licensed under the GNU license found in the
// LICENSE file in the root directory of this source tree.

use std::fmt;
use std::slice;

use arrayvec::ArrayVec;

use crate::util::bit_set::{BitIter, BitSet};
use crate::util::index::Idx;

const SMALL_CAP: usize = 16;

/// The operations the pointer-analysis engine needs from a points-to set.
pub trait PointsToSet<T> {
    type Iter<'a>: Iterator<Item = T>
    where
        Self: 'a;

    fn new() -> Self;
    fn count(&self) -> usize;
    fn is_empty(&self) -> bool;
    fn contains(&self, elem: T) -> bool;
    fn superset(&self, other: &Self) -> bool;
    /// Adds `elem`; returns true if it was not already present.
    fn insert(&mut self, elem: T) -> bool;
    /// `self = self ∪ other`; returns true if `self` changed.
    fn union(&mut self, other: &Self) -> bool;
    /// `self = self \ other`; returns true if `self` changed.
    fn subtract(&mut self, other: &Self) -> bool;
    fn iter(&self) -> Self::Iter<'_>;
}

/// Hybrid points-to set: an inline array while the set is small, a dense
/// bit set once it grows past [`SMALL_CAP`] elements.
///
/// Small sets iterate in insertion order, large sets in ascending index
/// order; both orders are deterministic, which the solvers rely on.
#[derive(Clone)]
pub struct HybridPointsToSet<T> {
    repr: Repr<T>,
}

#[derive(Clone)]
enum Repr<T> {
    Small(ArrayVec<T, SMALL_CAP>),
    Large(BitSet<T>),
}

impl<T: Idx> HybridPointsToSet<T> {
    /// Creates a set holding a single element.
    pub fn singleton(elem: T) -> Self {
        let mut set = Self::new();
        set.insert(elem);
        set
    }

    fn promote(small: &ArrayVec<T, SMALL_CAP>) -> BitSet<T> {
        let mut large = BitSet::new();
        for &elem in small {
            large.insert(elem);
        }
        large
    }
}

impl<T: Idx> PointsToSet<T> for HybridPointsToSet<T> {
    fn new() -> Self {
        HybridPointsToSet {
            repr: Repr::Small(ArrayVec::new()),
        }
    }

    fn count(&self) -> usize {
        match &self.repr {
            Repr::Small(small) => small.len(),
            Repr::Large(large) => large.count(),
        }
    }

    fn is_empty(&self) -> bool {
        match &self.repr {
            Repr::Small(small) => small.is_empty(),
            Repr::Large(large) => large.is_empty(),
        }
    }

    fn contains(&self, elem: T) -> bool {
        match &self.repr {
            Repr::Small(small) => small.contains(&elem),
            Repr::Large(large) => large.contains(elem),
        }
    }

    fn superset(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Large(this), Repr::Large(that)) => this.superset(that),
            _ => other.iter().all(|elem| self.contains(elem)),
        }
    }

    fn insert(&mut self, elem: T) -> bool {
        match &mut self.repr {
            Repr::Small(small) => {
                if small.contains(&elem) {
                    false
                } else if small.len() < SMALL_CAP {
                    small.push(elem);
                    true
                } else {
                    let mut large = Self::promote(small);
                    large.insert(elem);
                    self.repr = Repr::Large(large);
                    true
                }
            }
            Repr::Large(large) => large.insert(elem),
        }
    }

    fn union(&mut self, other: &Self) -> bool {
        // A small source unions element-wise whatever our representation.
        if let Repr::Small(that) = &other.repr {
            let mut changed = false;
            for &elem in that {
                changed |= self.insert(elem);
            }
            return changed;
        }
        let Repr::Large(that) = &other.repr else {
            unreachable!()
        };
        match &mut self.repr {
            Repr::Large(this) => this.union(that),
            Repr::Small(small) => {
                let mut large = Self::promote(small);
                let changed = large.union(that);
                self.repr = Repr::Large(large);
                changed
            }
        }
    }

    fn subtract(&mut self, other: &Self) -> bool {
        match (&mut self.repr, &other.repr) {
            (Repr::Large(this), Repr::Large(that)) => this.subtract(that),
            (Repr::Large(this), Repr::Small(that)) => {
                let mut changed = false;
                for &elem in that {
                    changed |= this.remove(elem);
                }
                changed
            }
            (Repr::Small(small), _) => {
                let before = small.len();
                small.retain(|&mut elem| !other.contains(elem));
                small.len() != before
            }
        }
    }

    type Iter<'a> = HybridIter<'a, T>;
    fn iter(&self) -> HybridIter<'_, T> {
        match &self.repr {
            Repr::Small(small) => HybridIter::Small(small.iter()),
            Repr::Large(large) => HybridIter::Large(large.iter()),
        }
    }
}

impl<'a, T: Idx> IntoIterator for &'a HybridPointsToSet<T> {
    type Item = T;
    type IntoIter = HybridIter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Idx> fmt::Debug for HybridPointsToSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub enum HybridIter<'a, T: Idx> {
    Small(slice::Iter<'a, T>),
    Large(BitIter<'a, T>),
}

impl<'a, T: Idx> Iterator for HybridIter<'a, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self {
            HybridIter::Small(small) => small.next().copied(),
            HybridIter::Large(large) => large.next(),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use rand::Rng;

    use super::{HybridPointsToSet, PointsToSet, Repr, SMALL_CAP};

    fn random_set(len: usize) -> HashSet<u32> {
        let mut rng = rand::thread_rng();
        let mut set = HashSet::new();
        while set.len() < len {
            set.insert(rng.gen_range(0..500));
        }
        set
    }

    fn hybrid_of(elems: &HashSet<u32>) -> HybridPointsToSet<u32> {
        let mut set = HybridPointsToSet::new();
        for &x in elems {
            set.insert(x);
        }
        set
    }

    #[test]
    fn stays_small_below_capacity() {
        let elems = random_set(SMALL_CAP - 1);
        let set = hybrid_of(&elems);
        assert!(matches!(set.repr, Repr::Small(_)));
        assert_eq!(set.count(), SMALL_CAP - 1);
        assert_eq!(set.iter().collect::<HashSet<_>>(), elems);
    }

    #[test]
    fn promotes_past_capacity() {
        let elems = random_set(SMALL_CAP + 4);
        let set = hybrid_of(&elems);
        assert!(matches!(set.repr, Repr::Large(_)));
        assert_eq!(set.count(), SMALL_CAP + 4);
        assert_eq!(set.iter().collect::<HashSet<_>>(), elems);
    }

    #[test]
    fn union_across_representations() {
        let small_elems = random_set(4);
        let large_elems = random_set(SMALL_CAP + 4);
        let expected: HashSet<_> = small_elems.union(&large_elems).copied().collect();

        let mut a = hybrid_of(&small_elems);
        a.union(&hybrid_of(&large_elems));
        assert_eq!(a.iter().collect::<HashSet<_>>(), expected);
        assert!(a.superset(&hybrid_of(&small_elems)));

        let mut b = hybrid_of(&large_elems);
        b.union(&hybrid_of(&small_elems));
        assert_eq!(b.iter().collect::<HashSet<_>>(), expected);
        assert!(!b.union(&hybrid_of(&small_elems)));
    }

    #[test]
    fn subtract_across_representations() {
        let small_elems = random_set(6);
        let mut large_elems = random_set(SMALL_CAP + 4);
        large_elems.extend(small_elems.iter().take(3));

        let mut a = hybrid_of(&small_elems);
        a.subtract(&hybrid_of(&large_elems));
        let expected: HashSet<_> = small_elems.difference(&large_elems).copied().collect();
        assert_eq!(a.iter().collect::<HashSet<_>>(), expected);

        let mut b = hybrid_of(&large_elems);
        b.subtract(&hybrid_of(&small_elems));
        let expected: HashSet<_> = large_elems.difference(&small_elems).copied().collect();
        assert_eq!(b.iter().collect::<HashSet<_>>(), expected);
    }

    #[test]
    fn insertion_order_is_kept_while_small() {
        let mut set = HybridPointsToSet::<u32>::new();
        for x in [9, 2, 7] {
            set.insert(x);
        }
        set.insert(2);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![9, 2, 7]);
    }
}
