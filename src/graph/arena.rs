// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

//! Storage of objects addressed by their own integer identifier.

use derivative::Derivative;
use std::cmp::Ordering;
use std::collections::HashMap;

/// An object that carries a unique integer identifier.
pub trait Identifiable {
    /// Returns the unique identifier.
    fn id(&self) -> i32;

    /// Set the identifier.
    fn set_id(&mut self, id: i32);
}

/// The `Arena` looks like a `Map<i32, T>` where the key is the id held by
/// the object itself. Lookup, insertion and removal are O(1); iteration
/// follows insertion order, which is the id order after
/// [`renumber_by`](Arena::renumber_by).
#[derive(Debug, Derivative, Clone)]
#[derivative(Default(bound = ""))]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    index: HashMap<i32, usize>,
}

impl<T: Identifiable> Arena<T> {
    /// Creates an empty `Arena`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lintim_core::graph::{Arena, Identifiable};
    /// # #[derive(Debug)] struct Obj(i32);
    /// # impl Identifiable for Obj {
    /// #     fn id(&self) -> i32 { self.0 }
    /// #     fn set_id(&mut self, id: i32) { self.0 = id }
    /// # }
    /// let arena: Arena<Obj> = Arena::new();
    /// assert!(arena.is_empty());
    /// ```
    pub fn new() -> Self {
        Arena {
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the number of objects.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if the arena holds no object.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Inserts an object. The object is handed back if its id is already
    /// used.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lintim_core::graph::{Arena, Identifiable};
    /// # #[derive(Debug, PartialEq)] struct Obj(i32);
    /// # impl Identifiable for Obj {
    /// #     fn id(&self) -> i32 { self.0 }
    /// #     fn set_id(&mut self, id: i32) { self.0 = id }
    /// # }
    /// let mut arena = Arena::new();
    /// assert!(arena.insert(Obj(3)).is_ok());
    /// assert_eq!(Err(Obj(3)), arena.insert(Obj(3)));
    /// assert_eq!(Some(&Obj(3)), arena.get(3));
    /// ```
    pub fn insert(&mut self, object: T) -> Result<(), T> {
        let id = object.id();
        if self.index.contains_key(&id) {
            return Err(object);
        }
        self.index.insert(id, self.slots.len());
        self.slots.push(Some(object));
        Ok(())
    }

    /// Returns `true` if an object has this id.
    pub fn contains(&self, id: i32) -> bool {
        self.index.contains_key(&id)
    }

    /// Access an object by id.
    pub fn get(&self, id: i32) -> Option<&T> {
        self.index
            .get(&id)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    /// Mutable access to an object by id. The id of the object must not be
    /// changed through this reference.
    pub fn get_mut(&mut self, id: i32) -> Option<&mut T> {
        match self.index.get(&id) {
            Some(&slot) => self.slots[slot].as_mut(),
            None => None,
        }
    }

    /// Removes an object and returns it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lintim_core::graph::{Arena, Identifiable};
    /// # #[derive(Debug, PartialEq)] struct Obj(i32);
    /// # impl Identifiable for Obj {
    /// #     fn id(&self) -> i32 { self.0 }
    /// #     fn set_id(&mut self, id: i32) { self.0 = id }
    /// # }
    /// let mut arena = Arena::new();
    /// arena.insert(Obj(1)).unwrap();
    /// arena.insert(Obj(2)).unwrap();
    /// assert_eq!(Some(Obj(1)), arena.remove(1));
    /// assert_eq!(None, arena.remove(1));
    /// assert_eq!(vec![2], arena.ids());
    /// ```
    pub fn remove(&mut self, id: i32) -> Option<T> {
        let slot = self.index.remove(&id)?;
        let object = self.slots[slot].take();
        if self.slots.len() > 2 * self.index.len() + 16 {
            self.compact();
        }
        object
    }

    /// Iterates over the objects.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Iterates over the objects, mutably. Ids must not be changed.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// The ids, in iteration order.
    pub fn ids(&self) -> Vec<i32> {
        self.values().map(Identifiable::id).collect()
    }

    /// The largest id in use.
    pub fn max_id(&self) -> Option<i32> {
        self.index.keys().copied().max()
    }

    /// Sorts the objects with `compare` and gives them the consecutive ids
    /// `1..=len` in that order. Returns the mapping from old to new ids.
    ///
    /// # Examples
    ///
    /// ```
    /// # use lintim_core::graph::{Arena, Identifiable};
    /// # #[derive(Debug, PartialEq)] struct Obj(i32, &'static str);
    /// # impl Identifiable for Obj {
    /// #     fn id(&self) -> i32 { self.0 }
    /// #     fn set_id(&mut self, id: i32) { self.0 = id }
    /// # }
    /// let mut arena = Arena::new();
    /// arena.insert(Obj(10, "b")).unwrap();
    /// arena.insert(Obj(7, "a")).unwrap();
    /// let mapping = arena.renumber_by(|x, y| x.1.cmp(y.1));
    /// assert_eq!(Some(&1), mapping.get(&7));
    /// assert_eq!(Some(&Obj(2, "b")), arena.get(2));
    /// ```
    pub fn renumber_by<F>(&mut self, mut compare: F) -> HashMap<i32, i32>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut objects: Vec<T> = self.slots.drain(..).flatten().collect();
        objects.sort_by(|a, b| compare(a, b));
        self.index.clear();
        let mut mapping = HashMap::with_capacity(objects.len());
        for (position, mut object) in objects.into_iter().enumerate() {
            let new_id = position as i32 + 1;
            mapping.insert(object.id(), new_id);
            object.set_id(new_id);
            self.index.insert(new_id, position);
            self.slots.push(Some(object));
        }
        mapping
    }

    fn compact(&mut self) {
        let objects: Vec<T> = self.slots.drain(..).flatten().collect();
        self.index.clear();
        for (position, object) in objects.into_iter().enumerate() {
            self.index.insert(object.id(), position);
            self.slots.push(Some(object));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq)]
    struct Obj(i32);

    impl Identifiable for Obj {
        fn id(&self) -> i32 {
            self.0
        }
        fn set_id(&mut self, id: i32) {
            self.0 = id
        }
    }

    #[test]
    fn compaction_keeps_lookups() {
        let mut arena = Arena::new();
        for id in 0..100 {
            arena.insert(Obj(id)).unwrap();
        }
        for id in 0..90 {
            arena.remove(id).unwrap();
        }
        assert_eq!(10, arena.len());
        assert!(arena.slots.len() < 100);
        assert_eq!(Some(&Obj(95)), arena.get(95));
        assert_eq!((90..100).collect::<Vec<_>>(), arena.ids());
    }

    #[test]
    fn max_id() {
        let mut arena = Arena::new();
        assert_eq!(None, arena.max_id());
        arena.insert(Obj(4)).unwrap();
        arena.insert(Obj(-2)).unwrap();
        assert_eq!(Some(4), arena.max_id());
    }
}
