use std::rc::Rc;

use collection_core::{
    BaseCollection, Children, Collection, CollectionError, Key, MutableCollection, Node,
};
use indexmap::IndexSet;

use crate::header_rows::{build_header_rows, HeaderRow};

pub const TABLE_HEADER_TYPE: &str = "tableheader";
pub const TABLE_BODY_TYPE: &str = "tablebody";
pub const COLUMN_TYPE: &str = "column";
/// Boolean prop marking a leaf column whose cells label their row.
pub const ROW_HEADER_PROP: &str = "is_row_header";

/// A collection laid out as a table: the top level holds a `tableheader`
/// with (possibly nested) `column` nodes and a `tablebody` with the rows.
///
/// Column indices are derived when the collection is committed, and only
/// when a column was added or removed since the previous commit. The
/// derived indices are shared between snapshots.
pub struct TableCollection<T> {
    base: BaseCollection<T>,
    head_key: Option<Key>,
    body_key: Option<Key>,
    columns: Rc<Vec<Key>>,
    row_header_column_keys: Rc<IndexSet<Key>>,
    header_rows: Rc<Vec<HeaderRow>>,
    rows: Rc<Vec<Key>>,
    columns_dirty: bool,
}

impl<T> TableCollection<T> {
    pub fn new() -> Self {
        Self {
            base: BaseCollection::new(),
            head_key: None,
            body_key: None,
            columns: Rc::default(),
            row_header_column_keys: Rc::default(),
            header_rows: Rc::default(),
            rows: Rc::default(),
            columns_dirty: true,
        }
    }

    pub fn head_key(&self) -> Option<&Key> {
        self.head_key.as_ref()
    }

    pub fn body_key(&self) -> Option<&Key> {
        self.body_key.as_ref()
    }

    /// Leaf columns in visitation order.
    pub fn columns(&self) -> &[Key] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Node<T>> {
        self.base.get_item(self.columns.get(index)?)
    }

    pub fn row_header_column_keys(&self) -> &IndexSet<Key> {
        &self.row_header_column_keys
    }

    pub fn header_rows(&self) -> &[HeaderRow] {
        &self.header_rows
    }

    pub fn header_row(&self, key: &Key) -> Option<&HeaderRow> {
        self.header_rows.iter().find(|row| &row.key == key)
    }

    /// Body rows, in order.
    pub fn rows(&self) -> impl Iterator<Item = &Node<T>> + '_ {
        self.rows.iter().filter_map(|key| self.base.get_item(key))
    }

    /// The header and body sections; empty until a header was added.
    pub fn iter(&self) -> impl Iterator<Item = &Node<T>> + '_ {
        let sections = match &self.head_key {
            Some(head) => [Some(head), self.body_key.as_ref()],
            None => [None, None],
        };
        sections
            .into_iter()
            .flatten()
            .filter_map(|key| self.base.get_item(key))
    }

    fn update_columns(&mut self) -> Result<(), CollectionError> {
        if !self.columns_dirty {
            return Ok(());
        }

        let mut columns = Vec::new();
        let mut row_headers = IndexSet::new();
        if let Some(head) = &self.head_key {
            for node in self.base.children(head) {
                visit(&self.base, node, &mut columns, &mut row_headers);
            }
        }

        if row_headers.is_empty() && !columns.is_empty() {
            return Err(CollectionError::Configuration {
                reason: "a table must have at least one column marked as a row header",
            });
        }

        let base = &self.base;
        let header_rows = build_header_rows(&columns, |key| {
            let parent = base.get_item(key)?.parent_key.as_ref()?;
            base.get_item(parent)
                .filter(|node| node.is_type(COLUMN_TYPE))
                .map(|node| node.key.clone())
        });

        log::debug!(
            "derived {} column(s), {} row header(s), {} header row(s)",
            columns.len(),
            row_headers.len(),
            header_rows.len()
        );
        self.columns = Rc::new(columns);
        self.row_header_column_keys = Rc::new(row_headers);
        self.header_rows = Rc::new(header_rows);
        self.columns_dirty = false;
        Ok(())
    }
}

fn visit<T>(
    base: &BaseCollection<T>,
    node: &Node<T>,
    columns: &mut Vec<Key>,
    row_headers: &mut IndexSet<Key>,
) {
    if node.is_type(COLUMN_TYPE) && !node.has_child_nodes {
        columns.push(node.key.clone());
        if node.prop_flag(ROW_HEADER_PROP) {
            row_headers.insert(node.key.clone());
        }
    }
    for child in base.children(&node.key) {
        visit(base, child, columns, row_headers);
    }
}

impl<T> Default for TableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for TableCollection<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            head_key: self.head_key.clone(),
            body_key: self.body_key.clone(),
            columns: Rc::clone(&self.columns),
            row_header_column_keys: Rc::clone(&self.row_header_column_keys),
            header_rows: Rc::clone(&self.header_rows),
            rows: Rc::clone(&self.rows),
            columns_dirty: self.columns_dirty,
        }
    }
}

impl<T> Collection<T> for TableCollection<T> {
    /// Number of body rows.
    fn size(&self) -> usize {
        self.rows.len()
    }

    fn get_item(&self, key: &Key) -> Option<&Node<T>> {
        self.base.get_item(key)
    }

    fn first_key(&self) -> Option<Key> {
        self.base
            .get_item(self.body_key.as_ref()?)?
            .first_child_key
            .clone()
    }

    fn last_key(&self) -> Option<Key> {
        self.base
            .get_item(self.body_key.as_ref()?)?
            .last_child_key
            .clone()
    }

    /// Columns only step between their siblings.
    fn key_after(&self, key: &Key) -> Option<Key> {
        let node = self.base.get_item(key)?;
        if node.is_type(COLUMN_TYPE) {
            return node.next_key.clone();
        }
        self.base.key_after(key)
    }

    /// Stepping back from the first row stops at the body instead of
    /// entering the header.
    fn key_before(&self, key: &Key) -> Option<Key> {
        let node = self.base.get_item(key)?;
        if node.is_type(COLUMN_TYPE) {
            return node.prev_key.clone();
        }
        let before = self.base.key_before(key)?;
        if self
            .base
            .get_item(&before)
            .is_some_and(|node| node.is_type(TABLE_BODY_TYPE))
        {
            return None;
        }
        Some(before)
    }

    /// A row without its own text is labelled by its row-header cells.
    fn text_value(&self, key: &Key) -> String {
        let Some(row) = self.base.get_item(key) else {
            return String::new();
        };
        if !row.text_value.is_empty() {
            return row.text_value.clone();
        }

        let mut text = Vec::new();
        for cell in Children::new(&self.base, row.first_child_key.clone()) {
            let is_row_header = self
                .columns
                .get(cell.index)
                .is_some_and(|column| self.row_header_column_keys.contains(column));
            if is_row_header && !cell.text_value.is_empty() {
                text.push(cell.text_value.as_str());
            }
            if text.len() == self.row_header_column_keys.len() {
                break;
            }
        }
        text.join(" ")
    }
}

impl<T> MutableCollection<T> for TableCollection<T> {
    fn add_node(&mut self, node: Rc<Node<T>>) -> Result<(), CollectionError> {
        let key = node.key.clone();
        let node_type = node.node_type().to_owned();
        self.base.add_node(node)?;

        match node_type.as_str() {
            COLUMN_TYPE => self.columns_dirty = true,
            TABLE_HEADER_TYPE => {
                self.head_key = Some(key);
                self.columns_dirty = true;
            }
            TABLE_BODY_TYPE => self.body_key = Some(key),
            _ => {}
        }
        Ok(())
    }

    fn remove_node(&mut self, key: &Key) -> Result<(), CollectionError> {
        let removed_type = self
            .base
            .get_item(key)
            .map(|node| node.node_type().to_owned());
        self.base.remove_node(key)?;

        match removed_type.as_deref() {
            Some(COLUMN_TYPE) => self.columns_dirty = true,
            Some(TABLE_HEADER_TYPE) if self.head_key.as_ref() == Some(key) => {
                self.head_key = None;
                self.columns_dirty = true;
            }
            Some(TABLE_BODY_TYPE) if self.body_key.as_ref() == Some(key) => {
                self.body_key = None;
            }
            _ => {}
        }
        Ok(())
    }

    fn commit(
        &mut self,
        first_key: Option<Key>,
        last_key: Option<Key>,
    ) -> Result<(), CollectionError> {
        if self.base.is_frozen() {
            return Err(CollectionError::Frozen {
                operation: "commit",
            });
        }
        self.update_columns()?;
        self.base.commit(first_key, last_key)?;

        let rows = match &self.body_key {
            Some(body) => self.base.children(body).map(|row| row.key.clone()).collect(),
            None => Vec::new(),
        };
        self.rows = Rc::new(rows);
        Ok(())
    }

    fn is_frozen(&self) -> bool {
        self.base.is_frozen()
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
