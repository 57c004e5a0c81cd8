use std::cell::Cell;
use std::rc::Rc;

use collection_core::{
    Collection, CollectionError, Document, ItemProps, MutableCollection, NodeId, Rendered, ROOT,
};
use collection_table::{
    TableCollection, COLUMN_TYPE, ROW_HEADER_PROP, TABLE_BODY_TYPE, TABLE_HEADER_TYPE,
};

fn main() {
    env_logger::init();

    println!("=== Collection Builder Example ===");
    println!("Builds a sectioned list and a table, then edits them in place.");
    println!("Set RUST_LOG=collection_core=trace to follow the commits.");
    println!();

    if let Err(err) = run_list().and_then(|()| run_table()) {
        log::error!("demo failed: {err}");
        std::process::exit(1);
    }
}

fn append<T: Clone, C: MutableCollection<T>>(
    document: &mut Document<T, C>,
    parent: NodeId,
    node_type: &str,
    props: ItemProps<T>,
    rendered: Option<Rendered>,
) -> Result<NodeId, CollectionError> {
    let id = document.create_element(node_type);
    document.set_props(id, props, rendered, None)?;
    document.append_child(parent, id)?;
    Ok(id)
}

fn print_walk<T, C: Collection<T>>(collection: &C) {
    for key in collection.keys() {
        if let Some(node) = collection.get_item(&key) {
            println!(
                "{}{} ({}) {:?}",
                "  ".repeat(node.level),
                node.key,
                node.node_type(),
                node.text_value
            );
        }
    }
}

fn run_list() -> Result<(), CollectionError> {
    let mut document: Document<u32> = Document::new();
    let changes = Rc::new(Cell::new(0));
    let counter = Rc::clone(&changes);
    let _subscription = document.subscribe(move || counter.set(counter.get() + 1));

    let (fruit, apple) = {
        let mut tx = document.transaction();
        let fruit = append(&mut tx, ROOT, "section", ItemProps::new().id("fruit"), None)?;
        let apple = append(
            &mut tx,
            fruit,
            "item",
            ItemProps::new().id("apple").value(3),
            Some(Rendered::from("Apple")),
        )?;
        append(
            &mut tx,
            fruit,
            "item",
            ItemProps::new().id("pear").value(5).aria_label("Pear"),
            None,
        )?;
        let vegetables = append(&mut tx, ROOT, "section", ItemProps::new().id("veg"), None)?;
        append(
            &mut tx,
            vegetables,
            "item",
            ItemProps::new().id("leek").text_value("Leek").value(1),
            None,
        )?;
        (fruit, apple)
    };
    println!("notifications after initial build: {}", changes.get());

    let list = document.collection()?;
    print_walk(&*list);
    println!();

    let cherry = document.create_element("item");
    document.set_props(
        cherry,
        ItemProps::new().id("cherry").text_value("Cherry").value(12),
        None,
        None,
    )?;
    document.insert_before(fruit, cherry, Some(apple))?;
    document.remove_child(ROOT, fruit)?;
    document.append_child(ROOT, fruit)?;

    let edited = document.collection()?;
    println!("after moving fruit to the end ({} notifications):", changes.get());
    print_walk(&*edited);
    println!("first snapshot still holds {} nodes", list.size());
    println!();
    println!("{}", document.dump_tree());

    document.unmount();
    Ok(())
}

fn run_table() -> Result<(), CollectionError> {
    let mut document: Document<(), TableCollection<()>> = Document::new();
    {
        let mut tx = document.transaction();
        let head = append(&mut tx, ROOT, TABLE_HEADER_TYPE, ItemProps::new().id("head"), None)?;
        let name = append(&mut tx, head, COLUMN_TYPE, ItemProps::new().id("name"), None)?;
        for (key, row_header) in [("first", true), ("last", true)] {
            let props = ItemProps::new()
                .id(key)
                .text_value(key)
                .prop(ROW_HEADER_PROP, row_header);
            append(&mut tx, name, COLUMN_TYPE, props, None)?;
        }
        append(&mut tx, head, COLUMN_TYPE, ItemProps::new().id("role"), None)?;

        let body = append(&mut tx, ROOT, TABLE_BODY_TYPE, ItemProps::new().id("body"), None)?;
        for (index, cells) in [["Ada", "Lovelace", "analyst"], ["Alan", "Turing", "cryptanalyst"]]
            .into_iter()
            .enumerate()
        {
            let row = append(&mut tx, body, "item", ItemProps::new().id(format!("row-{index}")), None)?;
            for (column, text) in cells.into_iter().enumerate() {
                let props = ItemProps::new()
                    .id(format!("row-{index}-{column}"))
                    .text_value(text);
                append(&mut tx, row, "cell", props, None)?;
            }
        }
    }

    let table = document.collection()?;
    println!(
        "table with {} column(s), {} row(s), {} header row(s)",
        table.column_count(),
        table.size(),
        table.header_rows().len()
    );
    for row in table.header_rows() {
        let cells: Vec<String> = row
            .cells
            .iter()
            .map(|cell| format!("{}x{}", cell.key, cell.col_span))
            .collect();
        println!("  {}: {}", row.key, cells.join(" | "));
    }
    for row in table.rows() {
        println!("  {} -> {:?}", row.key, table.text_value(&row.key));
    }
    Ok(())
}
