//! The builder that owns the shadow tree and derives collection snapshots.

use std::borrow::Cow;
use std::mem;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::collection::{BaseCollection, MutableCollection};
use crate::error::CollectionError;
use crate::key::Key;
use crate::node::{Node, ITEM_TYPE};
use crate::shadow::{ElementNode, ElementState, ShadowKind, ShadowNode};
use crate::subscription::{SubscriberRegistry, Subscription};
use crate::transaction::Transaction;
use crate::NodeId;

/// Arena slot of the document root. It never carries a payload.
pub const ROOT: NodeId = 0;

#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// Prefix of the provisional keys handed to new elements.
    pub key_prefix: Cow<'static, str>,
    /// Reject elements whose props carry no explicit id instead of keeping
    /// their provisional key.
    pub require_explicit_keys: bool,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            key_prefix: Cow::Borrowed("collection-node-"),
            require_explicit_keys: false,
        }
    }
}

/// Owns the shadow tree mirroring declarative children and the current
/// collection snapshot derived from it.
///
/// Structural edits (see the shadow tree methods) accumulate inside
/// transactions. [`Document::collection`] derives a fresh snapshot on demand,
/// but never while a transaction is open: readers only see committed shapes.
///
/// Subscribers run synchronously when the outermost transaction closes and
/// must not call back into the document; they should schedule a pull
/// instead.
pub struct Document<T, C = BaseCollection<T>> {
    pub(crate) nodes: Vec<Option<ShadowNode<T>>>, // FUTURE: reuse freed slots once ids are generational.
    collection: Rc<C>,
    next_collection: Option<C>,
    transaction_count: usize,
    pub(crate) dirty: IndexSet<NodeId>,
    pub(crate) mutated: IndexSet<NodeId>,
    pub(crate) collection_mutated: bool,
    notify_pending: bool,
    next_provisional_key: u64,
    subscribers: Rc<SubscriberRegistry>,
    pub(crate) mounted: bool,
    pub(crate) options: DocumentOptions,
}

impl<T: Clone, C: MutableCollection<T>> Default for Document<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, C: MutableCollection<T>> Document<T, C> {
    pub fn new() -> Self {
        Self::with_options(DocumentOptions::default())
    }

    pub fn with_options(options: DocumentOptions) -> Self {
        Self {
            nodes: vec![Some(ShadowNode::root())],
            collection: Rc::new(C::default()),
            next_collection: None,
            transaction_count: 0,
            dirty: IndexSet::new(),
            mutated: IndexSet::new(),
            collection_mutated: false,
            notify_pending: false,
            next_provisional_key: 0,
            subscribers: Rc::new(SubscriberRegistry::default()),
            mounted: true,
            options,
        }
    }

    pub fn root(&self) -> NodeId {
        ROOT
    }

    pub fn options(&self) -> &DocumentOptions {
        &self.options
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Creates a detached element in the provisional state.
    ///
    /// The element opens a transaction that stays open until its first
    /// [`Document::set_props`] call, so no snapshot is derived while its
    /// identity is still unknown.
    pub fn create_element(&mut self, node_type: &str) -> NodeId {
        self.next_provisional_key += 1;
        let key = Key::from(format!(
            "{}{}",
            self.options.key_prefix, self.next_provisional_key
        ));
        let id = self.nodes.len();
        self.nodes
            .push(Some(ShadowNode::element(Node::new(node_type, key))));
        self.start_transaction();
        id
    }

    pub fn start_transaction(&mut self) {
        self.transaction_count += 1;
    }

    pub fn end_transaction(&mut self) {
        if self.transaction_count == 0 {
            log::warn!("end_transaction called without a matching start_transaction");
            return;
        }
        self.transaction_count -= 1;
        if self.transaction_count == 0 {
            self.queue_update();
        }
    }

    /// Opens a scoped transaction; see [`Transaction`].
    pub fn transaction(&mut self) -> Transaction<'_, T, C> {
        Transaction::new(self)
    }

    pub fn transaction_depth(&self) -> usize {
        self.transaction_count
    }

    /// Flags `id` for recomputation on the next pull. Edits to detached
    /// subtrees are tracked but do not notify subscribers.
    pub fn mark_dirty(&mut self, id: NodeId) {
        self.dirty.insert(id);
        if !self.notify_pending && self.is_connected(id) {
            self.notify_pending = true;
        }
    }

    /// Whether a pull would produce a different snapshot.
    pub fn has_pending_updates(&self) -> bool {
        self.collection_mutated || self.dirty.iter().any(|&id| self.is_connected(id))
    }

    /// Notifies subscribers, unless a transaction is open or nothing changed
    /// since the last notification.
    pub fn queue_update(&mut self) {
        if self.transaction_count > 0 || !self.notify_pending {
            return;
        }
        self.notify_pending = false;
        log::trace!(
            "notifying {} subscriber(s) of pending collection changes",
            self.subscribers.len()
        );
        self.subscribers.notify();
    }

    pub fn subscribe(&self, listener: impl Fn() + 'static) -> Subscription {
        let id = self.subscribers.register(Rc::new(listener));
        Subscription::new(&self.subscribers, id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// The last derived snapshot, without folding in pending edits.
    pub fn last_collection(&self) -> Rc<C> {
        Rc::clone(&self.collection)
    }

    /// Returns an up-to-date snapshot.
    ///
    /// While a transaction is open the last good snapshot is returned
    /// unchanged. Otherwise dirty elements have their positional fields
    /// recomputed, mutated elements are written into a clone of the current
    /// snapshot, and that clone is committed and swapped in.
    pub fn collection(&mut self) -> Result<Rc<C>, CollectionError> {
        if self.transaction_count == 0 {
            self.update_collection()?;
        }
        Ok(Rc::clone(&self.collection))
    }

    /// Stops all further mutation and drops every subscriber.
    pub fn unmount(&mut self) {
        if !mem::replace(&mut self.mounted, false) {
            return;
        }
        log::debug!(
            "unmounting document with {} subscriber(s)",
            self.subscribers.len()
        );
        self.subscribers.clear();
    }

    fn update_collection(&mut self) -> Result<(), CollectionError> {
        let dirty = mem::take(&mut self.dirty);
        let mut recomputed = 0usize;
        for id in dirty {
            if self.is_committed_element(id) && self.is_connected(id) {
                self.update_node(id)?;
                recomputed += 1;
            }
        }
        if recomputed > 0 {
            log::trace!("recomputed positional fields of {recomputed} node(s)");
        }

        if self.mutated.is_empty() && !self.collection_mutated {
            return Ok(());
        }

        let mutated = mem::take(&mut self.mutated);
        self.collection_mutated = false;
        let first_key = self.first_child_key(ROOT);
        let last_key = self.last_child_key(ROOT);

        let mut next = match self.next_collection.take() {
            Some(next) => next,
            None => (*self.collection).clone(),
        };
        for id in mutated.iter().copied() {
            if !self.is_connected(id) {
                continue;
            }
            if let Ok(element) = self.element(id) {
                if element.state == ElementState::Committed {
                    next.add_node(Rc::clone(&element.node))?;
                }
            }
        }
        if let Err(err) = next.commit(first_key, last_key) {
            // Keep the staged edits so the next pull retries the commit.
            self.next_collection = Some(next);
            self.collection_mutated = true;
            return Err(err);
        }
        log::debug!(
            "committed collection with {} node(s), {} updated",
            next.size(),
            mutated.len()
        );
        self.collection = Rc::new(next);
        Ok(())
    }

    fn update_node(&mut self, id: NodeId) -> Result<(), CollectionError> {
        let slot = self.slot(id)?;
        let index = slot.index;
        let has_child_nodes = slot.first_child.is_some();
        let parent_key = slot.parent.and_then(|parent| self.key_of(parent));
        let prev_key = slot.prev_sibling.and_then(|prev| self.key_of(prev));
        let next_key = slot.next_sibling.and_then(|next| self.key_of(next));
        let first_child_key = slot.first_child.and_then(|child| self.key_of(child));
        let last_child_key = slot.last_child.and_then(|child| self.key_of(child));
        let level = self.level_of(id);

        let node = self.mutable_node(id)?;
        node.index = index;
        node.level = level;
        node.has_child_nodes = has_child_nodes;
        node.parent_key = parent_key;
        node.prev_key = prev_key;
        node.next_key = next_key;
        node.first_child_key = first_child_key;
        node.last_child_key = last_child_key;
        Ok(())
    }

    /// Registers a connected element and its subtree with the collection in
    /// progress. Provisional elements, and everything below them, wait for
    /// their own first `set_props`.
    pub(crate) fn add_node(&mut self, id: NodeId) -> Result<(), CollectionError> {
        let element = self.element(id)?;
        if element.state != ElementState::Committed {
            return Ok(());
        }
        let node = Rc::clone(&element.node);
        let collection = self.mutable_collection();
        if collection.get_item(&node.key).is_some() {
            log::warn!(
                "element {id} registers key {} already held by another element; replacing it",
                node.key
            );
        }
        collection.add_node(node)?;
        self.collection_mutated = true;
        self.notify_pending = true;
        self.mark_dirty(id);
        for child in self.child_ids(id)? {
            self.add_node(child)?;
        }
        Ok(())
    }

    /// Removes an element's subtree from the collection in progress,
    /// descendants first.
    pub(crate) fn remove_node(&mut self, id: NodeId) -> Result<(), CollectionError> {
        for child in self.child_ids(id)? {
            self.remove_node(child)?;
        }
        let element = self.element(id)?;
        if element.state == ElementState::Committed {
            let key = element.node.key.clone();
            self.mutable_collection().remove_node(&key)?;
            self.collection_mutated = true;
            self.notify_pending = true;
        }
        Ok(())
    }

    fn mutable_collection(&mut self) -> &mut C {
        let current = &self.collection;
        self.next_collection
            .get_or_insert_with(|| C::clone(current))
    }

    /// Copy-on-write access to an element's payload. The record is cloned
    /// only if the committed snapshot still shares it.
    pub(crate) fn mutable_node(&mut self, id: NodeId) -> Result<&mut Node<T>, CollectionError> {
        self.element(id)?;
        self.mutated.insert(id);
        let element = self.element_mut(id)?;
        Ok(Rc::make_mut(&mut element.node))
    }

    pub(crate) fn slot(&self, id: NodeId) -> Result<&ShadowNode<T>, CollectionError> {
        self.nodes
            .get(id)
            .and_then(Option::as_ref)
            .ok_or(CollectionError::MissingNode { id })
    }

    pub(crate) fn slot_mut(&mut self, id: NodeId) -> Result<&mut ShadowNode<T>, CollectionError> {
        self.nodes
            .get_mut(id)
            .and_then(Option::as_mut)
            .ok_or(CollectionError::MissingNode { id })
    }

    pub(crate) fn element(&self, id: NodeId) -> Result<&ElementNode<T>, CollectionError> {
        match &self.slot(id)?.kind {
            ShadowKind::Element(element) => Ok(element),
            ShadowKind::Root => Err(CollectionError::NotAnElement { id }),
        }
    }

    pub(crate) fn element_mut(
        &mut self,
        id: NodeId,
    ) -> Result<&mut ElementNode<T>, CollectionError> {
        match &mut self.slot_mut(id)?.kind {
            ShadowKind::Element(element) => Ok(element),
            ShadowKind::Root => Err(CollectionError::NotAnElement { id }),
        }
    }

    fn is_committed_element(&self, id: NodeId) -> bool {
        self.element(id)
            .is_ok_and(|element| element.state == ElementState::Committed)
    }

    pub(crate) fn key_of(&self, id: NodeId) -> Option<Key> {
        self.element(id).ok().map(|element| element.node.key.clone())
    }

    fn first_child_key(&self, id: NodeId) -> Option<Key> {
        self.slot(id)
            .ok()
            .and_then(|slot| slot.first_child)
            .and_then(|child| self.key_of(child))
    }

    fn last_child_key(&self, id: NodeId) -> Option<Key> {
        self.slot(id)
            .ok()
            .and_then(|slot| slot.last_child)
            .and_then(|child| self.key_of(child))
    }

    /// Children of the root sit at level 0. Below them an `item` is one level
    /// deeper than its parent; sections and other grouping nodes keep their
    /// parent's level.
    fn level_of(&self, id: NodeId) -> usize {
        let mut level = 0;
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if parent == ROOT {
                break;
            }
            if self
                .element(current)
                .is_ok_and(|element| element.node.is_type(ITEM_TYPE))
            {
                level += 1;
            }
            current = parent;
        }
        level
    }

    /// Whether `id` hangs off the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == ROOT {
                return true;
            }
            match self.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/document_tests.rs"]
mod tests;
