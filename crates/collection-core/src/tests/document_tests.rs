use super::*;
use crate::collection::Collection;
use crate::node::{ItemProps, Rendered};
use std::cell::Cell;

fn item(doc: &mut Document<()>, parent: NodeId, key: &str) -> NodeId {
    element(doc, parent, "item", key)
}

fn element(doc: &mut Document<()>, parent: NodeId, node_type: &str, key: &str) -> NodeId {
    let id = doc.create_element(node_type);
    doc.set_props(id, ItemProps::new().id(key).text_value(key), None, None)
        .unwrap();
    doc.append_child(parent, id).unwrap();
    id
}

fn keys(collection: &BaseCollection<()>) -> Vec<String> {
    collection.keys().map(|key| key.to_string()).collect()
}

fn node<'a>(collection: &'a BaseCollection<()>, key: &str) -> &'a Node<()> {
    collection.get_item(&Key::from(key)).unwrap()
}

fn counter(doc: &Document<()>) -> (Rc<Cell<usize>>, Subscription) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let subscription = doc.subscribe(move || counter.set(counter.get() + 1));
    (calls, subscription)
}

#[test]
fn appended_items_are_walkable_in_order() {
    let mut doc = Document::<()>::new();
    for key in ["a", "b", "c"] {
        item(&mut doc, ROOT, key);
    }
    let collection = doc.collection().unwrap();

    assert_eq!(collection.first_key(), Some(Key::from("a")));
    assert_eq!(collection.key_after(&Key::from("a")), Some(Key::from("b")));
    assert_eq!(collection.key_after(&Key::from("c")), None);
    assert_eq!(collection.last_key(), Some(Key::from("c")));
    assert_eq!(node(&collection, "b").index, 1);
    assert_eq!(node(&collection, "b").prev_key, Some(Key::from("a")));
}

#[test]
fn insert_before_shifts_trailing_indices() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "a");
    item(&mut doc, ROOT, "b");
    let c = item(&mut doc, ROOT, "c");

    let b2 = doc.create_element("item");
    doc.set_props(b2, ItemProps::new().id("b2"), None, None)
        .unwrap();
    doc.insert_before(ROOT, b2, Some(c)).unwrap();

    let collection = doc.collection().unwrap();
    assert_eq!(keys(&collection), ["a", "b", "b2", "c"]);
    assert_eq!(node(&collection, "b2").index, 2);
    assert_eq!(node(&collection, "c").index, 3);
    assert_eq!(node(&collection, "b").next_key, Some(Key::from("b2")));
    assert_eq!(node(&collection, "c").prev_key, Some(Key::from("b2")));
}

#[test]
fn insert_before_first_child_becomes_first_key() {
    let mut doc = Document::<()>::new();
    let a = item(&mut doc, ROOT, "a");
    let z = doc.create_element("item");
    doc.set_props(z, ItemProps::new().id("z"), None, None)
        .unwrap();
    doc.insert_before(ROOT, z, Some(a)).unwrap();

    let collection = doc.collection().unwrap();
    assert_eq!(collection.first_key(), Some(Key::from("z")));
    assert_eq!(node(&collection, "a").index, 1);
}

#[test]
fn insert_without_reference_appends() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "a");
    let b = doc.create_element("item");
    doc.set_props(b, ItemProps::new().id("b"), None, None)
        .unwrap();
    doc.insert_before(ROOT, b, None).unwrap();
    assert_eq!(keys(&doc.collection().unwrap()), ["a", "b"]);
}

#[test]
fn remove_child_relinks_neighbours() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "a");
    let b = item(&mut doc, ROOT, "b");
    item(&mut doc, ROOT, "c");
    doc.remove_child(ROOT, b).unwrap();

    let collection = doc.collection().unwrap();
    assert_eq!(keys(&collection), ["a", "c"]);
    assert!(collection.get_item(&Key::from("b")).is_none());
    assert_eq!(node(&collection, "c").index, 1);
    assert_eq!(node(&collection, "a").next_key, Some(Key::from("c")));
}

#[test]
fn removing_last_remaining_item_empties_collection() {
    let mut doc = Document::<()>::new();
    let a = item(&mut doc, ROOT, "a");
    assert_eq!(doc.collection().unwrap().size(), 1);
    doc.remove_child(ROOT, a).unwrap();

    let collection = doc.collection().unwrap();
    assert_eq!(collection.size(), 0);
    assert_eq!(collection.first_key(), None);
    assert_eq!(collection.last_key(), None);
}

#[test]
fn removing_sole_child_clears_parent_child_keys() {
    let mut doc = Document::<()>::new();
    let parent = item(&mut doc, ROOT, "parent");
    let child = item(&mut doc, parent, "child");
    assert_eq!(
        node(&doc.collection().unwrap(), "parent").first_child_key,
        Some(Key::from("child"))
    );

    doc.remove_child(parent, child).unwrap();
    let collection = doc.collection().unwrap();
    let parent = node(&collection, "parent");
    assert_eq!(parent.first_child_key, None);
    assert_eq!(parent.last_child_key, None);
    assert!(!parent.has_child_nodes);
}

#[test]
fn cascade_removal_drops_every_descendant() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "keep");
    let parent = item(&mut doc, ROOT, "parent");
    let first = item(&mut doc, parent, "first");
    item(&mut doc, first, "grandchild");
    item(&mut doc, parent, "second");
    let before = doc.collection().unwrap().size();

    doc.remove_child(ROOT, parent).unwrap();
    let collection = doc.collection().unwrap();
    assert_eq!(before - collection.size(), 4);
    assert_eq!(keys(&collection), ["keep"]);
}

#[test]
fn nested_items_flatten_in_pre_order() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "a");
    let section = element(&mut doc, ROOT, "section", "s");
    item(&mut doc, section, "s1");
    let s2 = item(&mut doc, section, "s2");
    item(&mut doc, s2, "s2a");
    item(&mut doc, ROOT, "c");

    let collection = doc.collection().unwrap();
    assert_eq!(keys(&collection), ["a", "s", "s1", "s2", "s2a", "c"]);
    assert_eq!(collection.last_key(), Some(Key::from("c")));
    assert_eq!(collection.key_before(&Key::from("c")), Some(Key::from("s2a")));
    assert_eq!(node(&collection, "a").level, 0);
    assert_eq!(node(&collection, "s").level, 0);
    assert_eq!(node(&collection, "s1").level, 1);
    assert_eq!(node(&collection, "s2a").level, 2);
    assert_eq!(node(&collection, "s2a").parent_key, Some(Key::from("s2")));

    let mut walked = Vec::new();
    let mut current = collection.last_key();
    while let Some(key) = current {
        current = collection.key_before(&key);
        walked.push(key.to_string());
    }
    walked.reverse();
    assert_eq!(walked, keys(&collection));
}

#[test]
fn items_under_sections_are_one_level_deeper() {
    let mut doc = Document::<()>::new();
    let section = element(&mut doc, ROOT, "section", "s");
    let s1 = item(&mut doc, section, "s1");
    item(&mut doc, s1, "s1a");
    let top = item(&mut doc, ROOT, "top");
    element(&mut doc, top, "section", "inner");

    let collection = doc.collection().unwrap();
    assert_eq!(node(&collection, "s").level, 0);
    assert_eq!(node(&collection, "s1").level, 1);
    assert_eq!(node(&collection, "s1a").level, 2);
    assert_eq!(node(&collection, "top").level, 0);
    assert_eq!(node(&collection, "inner").level, 0);
}

#[test]
fn levels_follow_a_moved_subtree() {
    let mut doc = Document::<()>::new();
    let section = element(&mut doc, ROOT, "section", "s");
    let moved = item(&mut doc, ROOT, "moved");
    item(&mut doc, moved, "leaf");
    assert_eq!(node(&doc.collection().unwrap(), "leaf").level, 1);

    doc.append_child(section, moved).unwrap();
    let collection = doc.collection().unwrap();
    assert_eq!(node(&collection, "moved").level, 1);
    assert_eq!(node(&collection, "leaf").level, 2);
}

#[test]
fn duplicate_ids_keep_the_latest_registration() {
    let mut doc = Document::<()>::new();
    let first = doc.create_element("item");
    doc.set_props(first, ItemProps::new().id("a").text_value("first"), None, None)
        .unwrap();
    doc.append_child(ROOT, first).unwrap();
    let second = doc.create_element("item");
    doc.set_props(second, ItemProps::new().id("a").text_value("second"), None, None)
        .unwrap();
    doc.append_child(ROOT, second).unwrap();

    let collection = doc.collection().unwrap();
    assert_eq!(collection.size(), 1);
    assert_eq!(collection.text_value(&Key::from("a")), "second");
}

#[test]
fn appending_attached_node_moves_it() {
    let mut doc = Document::<()>::new();
    let left = item(&mut doc, ROOT, "left");
    let right = item(&mut doc, ROOT, "right");
    let moved = item(&mut doc, left, "moved");
    item(&mut doc, left, "stays");

    doc.append_child(right, moved).unwrap();
    let collection = doc.collection().unwrap();
    assert_eq!(keys(&collection), ["left", "stays", "right", "moved"]);
    assert_eq!(node(&collection, "moved").parent_key, Some(Key::from("right")));
    assert_eq!(node(&collection, "stays").index, 0);
    assert_eq!(doc.parent_of(moved), Some(right));
    assert_eq!(doc.children_of(left).unwrap().len(), 1);
}

#[test]
fn snapshots_are_isolated_from_later_edits() {
    let mut doc = Document::<()>::new();
    let a = item(&mut doc, ROOT, "a");
    let before = doc.collection().unwrap();

    item(&mut doc, ROOT, "b");
    doc.set_props(a, ItemProps::new().id("a").text_value("renamed"), None, None)
        .unwrap();
    let after = doc.collection().unwrap();

    assert_eq!(keys(&before), ["a"]);
    assert_eq!(node(&before, "a").next_key, None);
    assert_eq!(before.text_value(&Key::from("a")), "a");
    assert_eq!(keys(&after), ["a", "b"]);
    assert_eq!(after.text_value(&Key::from("a")), "renamed");
    assert!(before.is_frozen());
    assert!(after.is_frozen());
}

#[test]
fn collection_is_stale_while_transaction_is_open() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "a");
    let before = doc.collection().unwrap();

    doc.start_transaction();
    item(&mut doc, ROOT, "b");
    let during = doc.collection().unwrap();
    assert!(Rc::ptr_eq(&before, &during));

    doc.end_transaction();
    assert_eq!(keys(&doc.collection().unwrap()), ["a", "b"]);
}

#[test]
fn pull_without_changes_returns_same_snapshot() {
    let mut doc = Document::<()>::new();
    item(&mut doc, ROOT, "a");
    let first = doc.collection().unwrap();
    let second = doc.collection().unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert!(!doc.has_pending_updates());
}

#[test]
fn batched_edits_notify_once() {
    let mut doc = Document::<()>::new();
    let (calls, _subscription) = counter(&doc);
    {
        let mut tx = doc.transaction();
        for key in ["a", "b", "c"] {
            item(&mut tx, ROOT, key);
        }
        assert_eq!(calls.get(), 0);
    }
    assert_eq!(calls.get(), 1);
    assert_eq!(keys(&doc.collection().unwrap()), ["a", "b", "c"]);
}

#[test]
fn unbatched_edits_notify_per_edit() {
    let mut doc = Document::<()>::new();
    let (calls, _subscription) = counter(&doc);
    for key in ["a", "b", "c"] {
        item(&mut doc, ROOT, key);
    }
    assert_eq!(calls.get(), 3);
}

#[test]
fn nested_transactions_notify_when_outermost_closes() {
    let mut doc = Document::<()>::new();
    let (calls, _subscription) = counter(&doc);
    doc.start_transaction();
    doc.start_transaction();
    item(&mut doc, ROOT, "a");
    doc.end_transaction();
    assert_eq!(calls.get(), 0);
    doc.end_transaction();
    assert_eq!(calls.get(), 1);
}

#[test]
fn transaction_guard_releases_on_error() {
    fn append_missing(doc: &mut Document<()>) -> Result<(), CollectionError> {
        let mut tx = doc.transaction();
        tx.append_child(ROOT, 99)?;
        Ok(())
    }

    let mut doc = Document::<()>::new();
    assert_eq!(
        append_missing(&mut doc),
        Err(CollectionError::MissingNode { id: 99 })
    );
    assert_eq!(doc.transaction_depth(), 0);
}

#[test]
fn dropped_subscription_stops_notifications() {
    let mut doc = Document::<()>::new();
    let (calls, subscription) = counter(&doc);
    item(&mut doc, ROOT, "a");
    drop(subscription);
    item(&mut doc, ROOT, "b");
    assert_eq!(calls.get(), 1);
    assert_eq!(doc.subscriber_count(), 0);
}

#[test]
fn provisional_element_holds_transaction_open() {
    let mut doc = Document::<()>::new();
    let id = doc.create_element("item");
    doc.append_child(ROOT, id).unwrap();
    assert_eq!(doc.transaction_depth(), 1);
    assert_eq!(doc.collection().unwrap().size(), 0);

    doc.set_props(id, ItemProps::new().text_value("Later"), None, None)
        .unwrap();
    assert_eq!(doc.transaction_depth(), 0);
    let collection = doc.collection().unwrap();
    assert_eq!(collection.first_key(), Some(Key::from("collection-node-1")));
    assert_eq!(collection.text_value(&Key::from("collection-node-1")), "Later");
}

#[test]
fn explicit_id_replaces_provisional_key_for_neighbours() {
    let mut doc = Document::<()>::new();
    let a = item(&mut doc, ROOT, "a");
    let late = doc.create_element("item");
    doc.append_child(ROOT, late).unwrap();
    doc.set_props(late, ItemProps::new().id("late"), None, None)
        .unwrap();

    let collection = doc.collection().unwrap();
    assert_eq!(node(&collection, "a").next_key, Some(Key::from("late")));
    assert_eq!(doc.index_of(late).unwrap(), 1);
    assert_eq!(doc.index_of(a).unwrap(), 0);
}

#[test]
fn changing_key_after_first_props_is_rejected() {
    let mut doc = Document::<()>::new();
    let a = item(&mut doc, ROOT, "a");
    let result = doc.set_props(a, ItemProps::new().id("other"), None, None);
    assert_eq!(
        result,
        Err(CollectionError::KeyChanged {
            from: Key::from("a"),
            to: Key::from("other"),
        })
    );
    doc.set_props(a, ItemProps::new().id("a").text_value("same id"), None, None)
        .unwrap();
    assert_eq!(doc.collection().unwrap().text_value(&Key::from("a")), "same id");
}

#[test]
fn provisional_key_survives_later_props_without_id() {
    let mut doc = Document::<()>::new();
    let id = doc.create_element("item");
    doc.append_child(ROOT, id).unwrap();
    doc.set_props(id, ItemProps::new(), None, None).unwrap();
    doc.set_props(id, ItemProps::new().text_value("again"), None, None)
        .unwrap();
    assert_eq!(doc.element_node(id).unwrap().text_value, "again");
}

#[test]
fn strict_documents_require_explicit_ids() {
    let mut doc = Document::<()>::with_options(DocumentOptions {
        require_explicit_keys: true,
        ..DocumentOptions::default()
    });
    let id = doc.create_element("row");
    let result = doc.set_props(id, ItemProps::new(), None, None);
    assert!(matches!(result, Err(CollectionError::MissingKey { .. })));
}

#[test]
fn text_value_falls_back_to_rendered_text() {
    let mut doc = Document::<()>::new();
    let id = doc.create_element("item");
    doc.set_props(
        id,
        ItemProps::new().id("apple"),
        Some(Rendered::from("Apple")),
        None,
    )
    .unwrap();
    doc.append_child(ROOT, id).unwrap();
    let collection = doc.collection().unwrap();
    assert_eq!(collection.text_value(&Key::from("apple")), "Apple");
    assert!(node(&collection, "apple").rendered.is_some());
}

#[test]
fn payload_value_reaches_collection() {
    let mut doc = Document::<u32>::new();
    let id = doc.create_element("item");
    doc.set_props(id, ItemProps::new().id("n").value(7), None, None)
        .unwrap();
    doc.append_child(ROOT, id).unwrap();
    let collection = doc.collection().unwrap();
    assert_eq!(collection.get_item(&Key::from("n")).unwrap().value, Some(7));
}

#[test]
fn detached_subtree_registers_when_connected() {
    let mut doc = Document::<()>::new();
    let parent = doc.create_element("item");
    doc.set_props(parent, ItemProps::new().id("p"), None, None)
        .unwrap();
    let child = doc.create_element("item");
    doc.set_props(child, ItemProps::new().id("c"), None, None)
        .unwrap();
    doc.append_child(parent, child).unwrap();
    assert!(!doc.is_connected(child));
    assert_eq!(doc.collection().unwrap().size(), 0);

    doc.append_child(ROOT, parent).unwrap();
    let collection = doc.collection().unwrap();
    assert_eq!(keys(&collection), ["p", "c"]);
    assert_eq!(node(&collection, "c").level, 1);
}

#[test]
fn cyclic_insertions_are_rejected() {
    let mut doc = Document::<()>::new();
    let parent = item(&mut doc, ROOT, "parent");
    let child = item(&mut doc, parent, "child");
    assert_eq!(
        doc.append_child(child, parent),
        Err(CollectionError::InvalidHierarchy { parent: child, child: parent })
    );
    assert_eq!(
        doc.append_child(parent, ROOT),
        Err(CollectionError::NotAnElement { id: ROOT })
    );
}

#[test]
fn insert_before_foreign_reference_is_rejected() {
    let mut doc = Document::<()>::new();
    let parent = item(&mut doc, ROOT, "parent");
    let stranger = item(&mut doc, ROOT, "stranger");
    let id = doc.create_element("item");
    doc.set_props(id, ItemProps::new().id("new"), None, None)
        .unwrap();
    assert_eq!(
        doc.insert_before(parent, id, Some(stranger)),
        Err(CollectionError::NotAChild {
            parent,
            child: stranger
        })
    );
}

#[test]
fn removing_unattached_child_is_a_no_op() {
    let mut doc = Document::<()>::new();
    let a = item(&mut doc, ROOT, "a");
    let b = item(&mut doc, ROOT, "b");
    doc.remove_child(a, b).unwrap();
    assert_eq!(keys(&doc.collection().unwrap()), ["a", "b"]);
}

#[test]
fn unmount_clears_subscribers_and_ignores_edits() {
    let mut doc = Document::<()>::new();
    let (calls, subscription) = counter(&doc);
    let a = item(&mut doc, ROOT, "a");
    assert_eq!(keys(&doc.collection().unwrap()), ["a"]);
    doc.unmount();

    assert!(!doc.is_mounted());
    assert!(!subscription.is_active());
    doc.remove_child(ROOT, a).unwrap();
    item(&mut doc, ROOT, "b");
    assert_eq!(calls.get(), 1);
    assert_eq!(keys(&doc.collection().unwrap()), ["a"]);
}

#[test]
fn dispose_frees_detached_subtree() {
    let mut doc = Document::<()>::new();
    let parent = item(&mut doc, ROOT, "parent");
    let child = item(&mut doc, parent, "child");
    assert_eq!(
        doc.dispose(parent),
        Err(CollectionError::StillAttached { id: parent })
    );

    doc.remove_child(ROOT, parent).unwrap();
    doc.dispose(parent).unwrap();
    assert_eq!(
        doc.element_node(child).err(),
        Some(CollectionError::MissingNode { id: child })
    );
}

#[test]
fn disposing_provisional_element_releases_its_transaction() {
    let mut doc = Document::<()>::new();
    let id = doc.create_element("item");
    assert_eq!(doc.transaction_depth(), 1);
    doc.dispose(id).unwrap();
    assert_eq!(doc.transaction_depth(), 0);
}

#[test]
fn dump_tree_lists_nodes_with_depth() {
    let mut doc = Document::<()>::new();
    let parent = item(&mut doc, ROOT, "parent");
    item(&mut doc, parent, "child");
    let pending = doc.create_element("item");
    doc.append_child(ROOT, pending).unwrap();

    let dump = doc.dump_tree();
    let lines: Vec<&str> = dump.lines().collect();
    assert_eq!(lines[0], "[0] root");
    assert_eq!(lines[1], "  [1] item parent");
    assert_eq!(lines[2], "    [2] item child");
    assert_eq!(lines[3], "  [3] item collection-node-3 (provisional)");
}
