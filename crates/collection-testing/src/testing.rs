use std::cell::Cell;
use std::rc::Rc;

use collection_core::{
    Collection, CollectionError, Document, ItemProps, Key, MutableCollection, NodeId,
    Subscription,
};

/// Creates an element, applies `props` and appends it under `parent`.
pub fn append_element<T, C>(
    document: &mut Document<T, C>,
    parent: NodeId,
    node_type: &str,
    props: ItemProps<T>,
) -> Result<NodeId, CollectionError>
where
    T: Clone,
    C: MutableCollection<T>,
{
    let id = document.create_element(node_type);
    document.set_props(id, props, None, None)?;
    document.append_child(parent, id)?;
    Ok(id)
}

/// Appends an `item` keyed and labelled by `key`.
pub fn append_item<T, C>(
    document: &mut Document<T, C>,
    parent: NodeId,
    key: &str,
) -> Result<NodeId, CollectionError>
where
    T: Clone,
    C: MutableCollection<T>,
{
    append_element(
        document,
        parent,
        "item",
        ItemProps::new().id(key).text_value(key),
    )
}

/// Keys in forward traversal order.
pub fn keys_in_order<T, C: Collection<T>>(collection: &C) -> Vec<String> {
    collection.keys().map(|key| key.to_string()).collect()
}

/// Keys collected from `last_key` backwards through `key_before`.
pub fn keys_in_reverse<T, C: Collection<T>>(collection: &C) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = collection.last_key();
    while let Some(key) = current {
        current = collection.key_before(&key);
        keys.push(key.to_string());
    }
    keys
}

/// Checks that the forward and backward walks visit the same keys and that
/// every record's sibling links point back at it.
pub fn assert_walk_consistent<T, C: Collection<T>>(collection: &C) {
    let forward = keys_in_order::<T, C>(collection);
    let mut backward = keys_in_reverse::<T, C>(collection);
    backward.reverse();
    assert_eq!(forward, backward, "forward and backward walks disagree");

    for key in &forward {
        let key = Key::from(key.as_str());
        let node = collection
            .get_item(&key)
            .unwrap_or_else(|| panic!("walk visited unknown key {key}"));
        if let Some(next) = &node.next_key {
            let next = collection
                .get_item(next)
                .unwrap_or_else(|| panic!("{key} links to unknown next {next}"));
            assert_eq!(next.prev_key.as_ref(), Some(&key), "broken prev link");
            assert_eq!(next.index, node.index + 1, "sibling indices not dense");
        }
        if let Some(parent) = &node.parent_key {
            assert!(
                collection.get_item(parent).is_some(),
                "{key} has unknown parent {parent}"
            );
        }
    }
}

/// Counts change notifications for as long as it is alive.
pub struct NotificationCounter {
    calls: Rc<Cell<usize>>,
    subscription: Subscription,
}

impl NotificationCounter {
    pub fn attach<T, C>(document: &Document<T, C>) -> Self
    where
        T: Clone,
        C: MutableCollection<T>,
    {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let subscription = document.subscribe(move || counter.set(counter.get() + 1));
        Self {
            calls,
            subscription,
        }
    }

    pub fn count(&self) -> usize {
        self.calls.get()
    }

    pub fn is_active(&self) -> bool {
        self.subscription.is_active()
    }

    /// Returns the count and starts over from zero.
    pub fn take(&self) -> usize {
        self.calls.replace(0)
    }
}
