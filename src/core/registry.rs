//! Dual-indexed arena shared by the switch store and the driver bank.
//!
//! Entities live once in a backing `Vec`; two indices (board number and
//! stable name) point into it.

use std::collections::HashMap;
use thiserror::Error;

/// Implemented by anything stored in a [`Registry`].
pub trait Entity {
    /// Board-level number of the item.
    fn number(&self) -> u16;

    /// Stable configuration name of the item.
    fn name(&self) -> &str;
}

/// Why an entity was refused by [`Registry::insert`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InsertError {
    #[error("number {0} is already registered")]
    DuplicateNumber(u16),

    #[error("name '{0}' is already registered")]
    DuplicateName(String),
}

/// Arena with O(1) lookup by number and by name.
#[derive(Debug, Clone)]
pub struct Registry<T: Entity> {
    items: Vec<T>,
    by_number: HashMap<u16, usize>,
    by_name: HashMap<String, usize>,
}

impl<T: Entity> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> Registry<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            by_number: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Add an entity. Both its number and its name must be unused.
    pub fn insert(&mut self, item: T) -> Result<(), InsertError> {
        if self.by_number.contains_key(&item.number()) {
            return Err(InsertError::DuplicateNumber(item.number()));
        }
        if self.by_name.contains_key(item.name()) {
            return Err(InsertError::DuplicateName(item.name().to_string()));
        }

        let slot = self.items.len();
        self.by_number.insert(item.number(), slot);
        self.by_name.insert(item.name().to_string(), slot);
        self.items.push(item);
        Ok(())
    }

    pub fn get(&self, number: u16) -> Option<&T> {
        self.by_number.get(&number).map(|&slot| &self.items[slot])
    }

    pub fn get_mut(&mut self, number: u16) -> Option<&mut T> {
        match self.by_number.get(&number) {
            Some(&slot) => Some(&mut self.items[slot]),
            None => None,
        }
    }

    pub fn by_name(&self, name: &str) -> Option<&T> {
        self.by_name.get(name).map(|&slot| &self.items[slot])
    }

    pub fn by_name_mut(&mut self, name: &str) -> Option<&mut T> {
        match self.by_name.get(name) {
            Some(&slot) => Some(&mut self.items[slot]),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entities in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        number: u16,
        name: String,
        hits: u32,
    }

    impl Entity for Item {
        fn number(&self) -> u16 {
            self.number
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    fn item(number: u16, name: &str) -> Item {
        Item {
            number,
            name: name.to_string(),
            hits: 0,
        }
    }

    #[test]
    fn both_indices_resolve_to_the_same_entity() {
        let mut registry = Registry::new();
        registry.insert(item(32, "trough0")).unwrap();
        registry.insert(item(33, "trough1")).unwrap();

        assert_eq!(registry.get(33), registry.by_name("trough1"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn mutation_through_one_index_is_visible_through_the_other() {
        let mut registry = Registry::new();
        registry.insert(item(7, "start")).unwrap();

        registry.by_name_mut("start").unwrap().hits += 1;
        registry.get_mut(7).unwrap().hits += 1;

        assert_eq!(registry.by_name("start").unwrap().hits, 2);
    }

    #[test]
    fn duplicates_are_refused() {
        let mut registry = Registry::new();
        registry.insert(item(1, "a")).unwrap();

        assert_eq!(
            registry.insert(item(1, "b")),
            Err(InsertError::DuplicateNumber(1))
        );
        assert_eq!(
            registry.insert(item(2, "a")),
            Err(InsertError::DuplicateName("a".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insert_errors_name_the_clash() {
        assert_eq!(
            InsertError::DuplicateNumber(9).to_string(),
            "number 9 is already registered"
        );
        assert_eq!(
            InsertError::DuplicateName("trough0".to_string()).to_string(),
            "name 'trough0' is already registered"
        );
    }

    #[test]
    fn unknown_keys_return_none() {
        let registry: Registry<Item> = Registry::new();
        assert!(registry.get(0).is_none());
        assert!(registry.by_name("missing").is_none());
        assert!(registry.is_empty());
    }
}
