//! Keyed, linked orderings over [`Node`] records.
//!
//! A collection is built up through [`MutableCollection`] and then frozen by
//! [`MutableCollection::commit`]. Once frozen it is only ever read; the
//! document derives the next snapshot by cloning, which shares every entry
//! until it is individually replaced.

use std::marker::PhantomData;
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::error::CollectionError;
use crate::key::Key;
use crate::node::Node;

/// Read side of a collection, consumed by widgets.
pub trait Collection<T> {
    /// Number of nodes in the collection.
    fn size(&self) -> usize;

    fn get_item(&self, key: &Key) -> Option<&Node<T>>;

    fn first_key(&self) -> Option<Key>;

    /// The deepest last descendant of the last top-level node.
    fn last_key(&self) -> Option<Key>;

    /// Pre-order successor: first child, else next sibling, else the next
    /// sibling of the nearest ancestor that has one.
    fn key_after(&self, key: &Key) -> Option<Key>;

    /// Pre-order predecessor: the deepest last descendant of the previous
    /// sibling, else the parent.
    fn key_before(&self, key: &Key) -> Option<Key>;

    fn text_value(&self, key: &Key) -> String {
        self.get_item(key)
            .map(|node| node.text_value.clone())
            .unwrap_or_default()
    }

    fn children(&self, key: &Key) -> Children<'_, T, Self>
    where
        Self: Sized,
    {
        let next = self
            .get_item(key)
            .and_then(|node| node.first_child_key.clone());
        Children::new(self, next)
    }

    /// Every key in traversal order, following [`Collection::key_after`].
    fn keys(&self) -> Keys<'_, T, Self>
    where
        Self: Sized,
    {
        Keys {
            collection: self,
            next: self.first_key(),
            _marker: PhantomData,
        }
    }
}

/// Write side of a collection, driven by the document.
pub trait MutableCollection<T>: Collection<T> + Clone + Default {
    fn add_node(&mut self, node: Rc<Node<T>>) -> Result<(), CollectionError>;

    fn remove_node(&mut self, key: &Key) -> Result<(), CollectionError>;

    /// Records the top-level endpoints and freezes the collection for good.
    fn commit(
        &mut self,
        first_key: Option<Key>,
        last_key: Option<Key>,
    ) -> Result<(), CollectionError>;

    fn is_frozen(&self) -> bool;
}

/// Lazily walks a sibling list.
pub struct Children<'a, T, C: ?Sized> {
    collection: &'a C,
    next: Option<Key>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, C: ?Sized> Children<'a, T, C> {
    pub fn new(collection: &'a C, first: Option<Key>) -> Self {
        Self {
            collection,
            next: first,
            _marker: PhantomData,
        }
    }
}

impl<'a, T: 'a, C: Collection<T> + ?Sized> Iterator for Children<'a, T, C> {
    type Item = &'a Node<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next.take()?;
        let node = self.collection.get_item(&key)?;
        self.next = node.next_key.clone();
        Some(node)
    }
}

pub struct Keys<'a, T, C: ?Sized> {
    collection: &'a C,
    next: Option<Key>,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T, C: Collection<T> + ?Sized> Iterator for Keys<'a, T, C> {
    type Item = Key;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next.take()?;
        self.next = self.collection.key_after(&key);
        Some(key)
    }
}

/// The default collection: a key map plus top-level endpoints.
pub struct BaseCollection<T> {
    key_map: HashMap<Key, Rc<Node<T>>>,
    first_key: Option<Key>,
    last_key: Option<Key>,
    frozen: bool,
}

impl<T> BaseCollection<T> {
    pub fn new() -> Self {
        Self {
            key_map: HashMap::default(),
            first_key: None,
            last_key: None,
            frozen: false,
        }
    }

    /// Returns the shared record, for callers that want to keep it.
    pub fn get_node(&self, key: &Key) -> Option<Rc<Node<T>>> {
        self.key_map.get(key).cloned()
    }

    /// Iterates the top-level nodes in order.
    pub fn iter(&self) -> Children<'_, T, Self> {
        Children::new(self, self.first_key.clone())
    }

    fn descend_last<'a>(&'a self, mut node: &'a Node<T>) -> Key {
        while let Some(last) = node
            .last_child_key
            .as_ref()
            .and_then(|key| self.key_map.get(key))
        {
            node = last;
        }
        node.key.clone()
    }

    fn ensure_mutable(&self, operation: &'static str) -> Result<(), CollectionError> {
        if self.frozen {
            return Err(CollectionError::Frozen { operation });
        }
        Ok(())
    }
}

impl<T> Default for BaseCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloning yields an unfrozen collection sharing every node record with
/// `self`. Records are only copied when the clone replaces them.
impl<T> Clone for BaseCollection<T> {
    fn clone(&self) -> Self {
        Self {
            key_map: self.key_map.clone(),
            first_key: self.first_key.clone(),
            last_key: self.last_key.clone(),
            frozen: false,
        }
    }
}

impl<T> Collection<T> for BaseCollection<T> {
    fn size(&self) -> usize {
        self.key_map.len()
    }

    fn get_item(&self, key: &Key) -> Option<&Node<T>> {
        self.key_map.get(key).map(|node| &**node)
    }

    fn first_key(&self) -> Option<Key> {
        self.first_key.clone()
    }

    fn last_key(&self) -> Option<Key> {
        let last = self.key_map.get(self.last_key.as_ref()?)?;
        Some(self.descend_last(last))
    }

    fn key_after(&self, key: &Key) -> Option<Key> {
        let mut node = self.key_map.get(key)?;
        if let Some(child) = &node.first_child_key {
            return Some(child.clone());
        }
        loop {
            if let Some(next) = &node.next_key {
                return Some(next.clone());
            }
            node = self.key_map.get(node.parent_key.as_ref()?)?;
        }
    }

    fn key_before(&self, key: &Key) -> Option<Key> {
        let node = self.key_map.get(key)?;
        if let Some(prev) = node.prev_key.as_ref() {
            return match self.key_map.get(prev) {
                Some(prev_node) => Some(self.descend_last(prev_node)),
                None => Some(prev.clone()),
            };
        }
        node.parent_key.clone()
    }
}

impl<T> MutableCollection<T> for BaseCollection<T> {
    fn add_node(&mut self, node: Rc<Node<T>>) -> Result<(), CollectionError> {
        self.ensure_mutable("add a node")?;
        self.key_map.insert(node.key.clone(), node);
        Ok(())
    }

    fn remove_node(&mut self, key: &Key) -> Result<(), CollectionError> {
        self.ensure_mutable("remove a node")?;
        self.key_map.remove(key);
        Ok(())
    }

    fn commit(
        &mut self,
        first_key: Option<Key>,
        last_key: Option<Key>,
    ) -> Result<(), CollectionError> {
        self.ensure_mutable("commit")?;
        self.first_key = first_key;
        self.last_key = last_key;
        self.frozen = true;
        Ok(())
    }

    fn is_frozen(&self) -> bool {
        self.frozen
    }
}

#[cfg(test)]
#[path = "tests/collection_tests.rs"]
mod tests;
