//! Shadow tree mechanics.
//!
//! Nodes live in the document's arena and point at each other by
//! [`NodeId`]. Every pointer write marks the written node dirty, so the next
//! pull recomputes the neighbour keys and indices the collection exposes.

use std::fmt::Write as _;
use std::rc::Rc;

use crate::collection::MutableCollection;
use crate::document::{Document, ROOT};
use crate::error::CollectionError;
use crate::node::{ItemProps, Node, RenderFn, Rendered};
use crate::NodeId;

/// Identity of an element: provisional until its props arrive, committed
/// afterwards. The transition happens exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ElementState {
    Provisional,
    Committed,
}

pub(crate) struct ElementNode<T> {
    pub(crate) node: Rc<Node<T>>,
    pub(crate) state: ElementState,
}

pub(crate) enum ShadowKind<T> {
    Root,
    Element(ElementNode<T>),
}

pub(crate) struct ShadowNode<T> {
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: Option<NodeId>,
    pub(crate) last_child: Option<NodeId>,
    pub(crate) prev_sibling: Option<NodeId>,
    pub(crate) next_sibling: Option<NodeId>,
    pub(crate) index: usize,
    pub(crate) kind: ShadowKind<T>,
}

impl<T> ShadowNode<T> {
    pub(crate) fn root() -> Self {
        Self::with_kind(ShadowKind::Root)
    }

    pub(crate) fn element(node: Node<T>) -> Self {
        Self::with_kind(ShadowKind::Element(ElementNode {
            node: Rc::new(node),
            state: ElementState::Provisional,
        }))
    }

    fn with_kind(kind: ShadowKind<T>) -> Self {
        Self {
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
            index: 0,
            kind,
        }
    }
}

#[derive(Clone, Copy)]
enum Link {
    Parent,
    FirstChild,
    LastChild,
    PrevSibling,
    NextSibling,
}

impl<T: Clone, C: MutableCollection<T>> Document<T, C> {
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.slot(id).ok().and_then(|slot| slot.parent)
    }

    pub fn children_of(&self, id: NodeId) -> Result<Vec<NodeId>, CollectionError> {
        self.child_ids(id)
    }

    /// Position among siblings.
    pub fn index_of(&self, id: NodeId) -> Result<usize, CollectionError> {
        Ok(self.slot(id)?.index)
    }

    /// The payload currently staged for an element, committed or not.
    pub fn element_node(&self, id: NodeId) -> Result<&Node<T>, CollectionError> {
        Ok(&self.element(id)?.node)
    }

    pub(crate) fn child_ids(&self, id: NodeId) -> Result<Vec<NodeId>, CollectionError> {
        let mut children = Vec::new();
        let mut next = self.slot(id)?.first_child;
        while let Some(child) = next {
            children.push(child);
            next = self.slot(child)?.next_sibling;
        }
        Ok(children)
    }

    fn link(&self, id: NodeId, link: Link) -> Result<Option<NodeId>, CollectionError> {
        let slot = self.slot(id)?;
        Ok(match link {
            Link::Parent => slot.parent,
            Link::FirstChild => slot.first_child,
            Link::LastChild => slot.last_child,
            Link::PrevSibling => slot.prev_sibling,
            Link::NextSibling => slot.next_sibling,
        })
    }

    fn set_link(
        &mut self,
        id: NodeId,
        link: Link,
        value: Option<NodeId>,
    ) -> Result<(), CollectionError> {
        let slot = self.slot_mut(id)?;
        let target = match link {
            Link::Parent => &mut slot.parent,
            Link::FirstChild => &mut slot.first_child,
            Link::LastChild => &mut slot.last_child,
            Link::PrevSibling => &mut slot.prev_sibling,
            Link::NextSibling => &mut slot.next_sibling,
        };
        *target = value;
        self.mark_dirty(id);
        Ok(())
    }

    fn set_index(&mut self, id: NodeId, index: usize) -> Result<(), CollectionError> {
        self.slot_mut(id)?.index = index;
        self.mark_dirty(id);
        Ok(())
    }

    fn has_set_props(&self, id: NodeId) -> bool {
        matches!(
            self.slot(id).map(|slot| &slot.kind),
            Ok(ShadowKind::Element(ElementNode {
                state: ElementState::Committed,
                ..
            }))
        )
    }

    /// Rejects moves that would detach the root or create a cycle.
    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), CollectionError> {
        self.slot(parent)?;
        self.element(child)?;
        let mut current = Some(parent);
        while let Some(ancestor) = current {
            if ancestor == child {
                return Err(CollectionError::InvalidHierarchy { parent, child });
            }
            current = self.parent_of(ancestor);
        }
        Ok(())
    }

    /// Appends `child` as the last child of `parent`, detaching it from its
    /// previous parent first.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CollectionError> {
        if !self.mounted {
            log::trace!("ignoring append of {child} to {parent} after unmount");
            return Ok(());
        }
        self.check_insertion(parent, child)?;
        let mut tx = self.transaction();
        tx.detach(child)?;

        let last = tx.link(parent, Link::LastChild)?;
        if tx.link(parent, Link::FirstChild)?.is_none() {
            tx.set_link(parent, Link::FirstChild, Some(child))?;
        }
        match last {
            Some(last) => {
                let index = tx.slot(last)?.index + 1;
                tx.set_link(last, Link::NextSibling, Some(child))?;
                tx.set_index(child, index)?;
                tx.set_link(child, Link::PrevSibling, Some(last))?;
            }
            None => {
                tx.set_link(child, Link::PrevSibling, None)?;
                tx.set_index(child, 0)?;
            }
        }
        tx.set_link(child, Link::Parent, Some(parent))?;
        tx.set_link(child, Link::NextSibling, None)?;
        tx.set_link(parent, Link::LastChild, Some(child))?;

        if tx.has_set_props(child) && tx.is_connected(child) {
            tx.add_node(child)?;
        }
        Ok(())
    }

    /// Inserts `child` right before `reference`, shifting the index of
    /// `reference` and every later sibling up by one. Without a reference
    /// this is [`Document::append_child`].
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), CollectionError> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        if !self.mounted {
            log::trace!("ignoring insert of {child} into {parent} after unmount");
            return Ok(());
        }
        if reference == child {
            return Ok(());
        }
        self.check_insertion(parent, child)?;
        if self.parent_of(reference) != Some(parent) {
            return Err(CollectionError::NotAChild {
                parent,
                child: reference,
            });
        }
        let mut tx = self.transaction();
        tx.detach(child)?;

        // Read after detaching: detaching may have shifted the reference.
        let prev = tx.link(reference, Link::PrevSibling)?;
        let index = tx.slot(reference)?.index;
        tx.set_link(child, Link::NextSibling, Some(reference))?;
        tx.set_link(child, Link::PrevSibling, prev)?;
        tx.set_index(child, index)?;

        if tx.link(parent, Link::FirstChild)? == Some(reference) {
            tx.set_link(parent, Link::FirstChild, Some(child))?;
        } else if let Some(prev) = prev {
            tx.set_link(prev, Link::NextSibling, Some(child))?;
        }
        tx.set_link(reference, Link::PrevSibling, Some(child))?;
        tx.set_link(child, Link::Parent, Some(parent))?;

        let mut next = Some(reference);
        while let Some(sibling) = next {
            let slot = tx.slot(sibling)?;
            let (index, following) = (slot.index + 1, slot.next_sibling);
            tx.set_index(sibling, index)?;
            next = following;
        }
        tx.mark_dirty(parent);

        if tx.has_set_props(child) && tx.is_connected(child) {
            tx.add_node(child)?;
        }
        Ok(())
    }

    /// Detaches `child` from `parent` and drops its whole subtree from the
    /// collection. A no-op when `child` is not attached to `parent` or the
    /// document is unmounted.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), CollectionError> {
        if !self.mounted || self.parent_of(child) != Some(parent) {
            log::trace!("ignoring removal of {child}: not a child of {parent}");
            return Ok(());
        }
        let mut tx = self.transaction();
        tx.unlink(parent, child)
    }

    fn detach(&mut self, child: NodeId) -> Result<(), CollectionError> {
        match self.parent_of(child) {
            Some(parent) => self.unlink(parent, child),
            None => Ok(()),
        }
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) -> Result<(), CollectionError> {
        let connected = self.is_connected(parent);
        let (prev, next) = {
            let slot = self.slot(child)?;
            (slot.prev_sibling, slot.next_sibling)
        };

        let mut following = next;
        while let Some(sibling) = following {
            let slot = self.slot(sibling)?;
            let (index, after) = (slot.index.saturating_sub(1), slot.next_sibling);
            self.set_index(sibling, index)?;
            following = after;
        }

        if let Some(next) = next {
            self.set_link(next, Link::PrevSibling, prev)?;
        }
        if let Some(prev) = prev {
            self.set_link(prev, Link::NextSibling, next)?;
        }
        if self.link(parent, Link::FirstChild)? == Some(child) {
            self.set_link(parent, Link::FirstChild, next)?;
        }
        if self.link(parent, Link::LastChild)? == Some(child) {
            self.set_link(parent, Link::LastChild, prev)?;
        }
        self.mark_dirty(parent);

        self.set_link(child, Link::Parent, None)?;
        self.set_link(child, Link::NextSibling, None)?;
        self.set_link(child, Link::PrevSibling, None)?;
        self.set_index(child, 0)?;

        if connected {
            self.remove_node(child)?;
        }
        Ok(())
    }

    /// Applies declarative props to an element.
    ///
    /// The first call fixes the element's key (explicit id, else its
    /// provisional key), registers it with the collection when connected,
    /// and closes the transaction opened by [`Document::create_element`].
    /// Later calls may update everything except the key.
    pub fn set_props(
        &mut self,
        id: NodeId,
        props: ItemProps<T>,
        rendered: Option<Rendered>,
        render: Option<RenderFn<T>>,
    ) -> Result<(), CollectionError> {
        if !self.mounted {
            log::trace!("ignoring props for {id} after unmount");
            return Ok(());
        }
        let element = self.element(id)?;
        let first = element.state == ElementState::Provisional;
        let current_key = element.node.key.clone();

        let text_value = props.resolve_text_value(rendered.as_ref());
        let ItemProps {
            id: explicit_id,
            value,
            props,
            ..
        } = props;
        let key = match explicit_id {
            Some(key) => key,
            None if self.options.require_explicit_keys => {
                return Err(CollectionError::MissingKey {
                    node_type: Rc::clone(&element.node.node_type),
                })
            }
            None => current_key.clone(),
        };
        if !first && key != current_key {
            return Err(CollectionError::KeyChanged {
                from: current_key,
                to: key,
            });
        }

        let mut tx = self.transaction();
        {
            let node = tx.mutable_node(id)?;
            node.key = key;
            node.value = value;
            node.text_value = text_value;
            node.rendered = rendered;
            node.render = render;
            node.props = props;
        }
        tx.mark_dirty(id);

        if first {
            // Neighbours may have captured the provisional key.
            let slot = tx.slot(id)?;
            let related: Vec<NodeId> = [slot.parent, slot.prev_sibling, slot.next_sibling]
                .into_iter()
                .flatten()
                .collect();
            for node in related.into_iter().chain(tx.child_ids(id)?) {
                tx.mark_dirty(node);
            }

            tx.element_mut(id)?.state = ElementState::Committed;
            if tx.is_connected(id) {
                tx.add_node(id)?;
            }
            // Closes the construction transaction; the guard closes ours.
            tx.end_transaction();
        }
        Ok(())
    }

    /// Frees a detached subtree's arena slots. Ids of disposed nodes are
    /// never handed out again.
    pub fn dispose(&mut self, id: NodeId) -> Result<(), CollectionError> {
        if id == ROOT {
            return Err(CollectionError::NotAnElement { id });
        }
        if self.parent_of(id).is_some() {
            return Err(CollectionError::StillAttached { id });
        }
        let provisional = self.element(id)?.state == ElementState::Provisional;
        for child in self.child_ids(id)? {
            self.slot_mut(child)?.parent = None;
            self.dispose(child)?;
        }
        self.nodes[id] = None;
        self.dirty.shift_remove(&id);
        self.mutated.shift_remove(&id);
        if provisional {
            // Its construction transaction can never be closed otherwise.
            self.end_transaction();
        }
        Ok(())
    }

    /// Renders the shadow tree for debugging, one node per line.
    pub fn dump_tree(&self) -> String {
        let mut output = String::new();
        self.dump_node(&mut output, ROOT, 0);
        output
    }

    fn dump_node(&self, output: &mut String, id: NodeId, depth: usize) {
        let indent = "  ".repeat(depth);
        match self.slot(id).map(|slot| &slot.kind) {
            Ok(ShadowKind::Root) => {
                let _ = writeln!(output, "{indent}[{id}] root");
            }
            Ok(ShadowKind::Element(element)) => {
                let marker = match element.state {
                    ElementState::Provisional => " (provisional)",
                    ElementState::Committed => "",
                };
                let _ = writeln!(
                    output,
                    "{indent}[{id}] {} {}{marker}",
                    element.node.node_type, element.node.key
                );
            }
            Err(_) => {
                let _ = writeln!(output, "{indent}[{id}] (missing)");
                return;
            }
        }
        for child in self.child_ids(id).unwrap_or_default() {
            self.dump_node(output, child, depth + 1);
        }
    }
}
