use collection_core::collections::map::HashMap;
use collection_core::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCellKind {
    Column,
    /// Filler for the span where no column group sits at this depth.
    Placeholder,
}

/// One cell of a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderCell {
    /// Column key, or `placeholder-<neighbour>` for fillers.
    pub key: Key,
    pub kind: HeaderCellKind,
    /// First leaf column covered by the cell.
    pub col_index: usize,
    pub col_span: usize,
    /// Header row the cell belongs to, top row first.
    pub level: usize,
}

impl HeaderCell {
    fn placeholder(next_to: &Key, col_index: usize, col_span: usize, level: usize) -> Self {
        Self {
            key: Key::from(format!("placeholder-{next_to}")),
            kind: HeaderCellKind::Placeholder,
            col_index,
            col_span,
            level,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == HeaderCellKind::Placeholder
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderRow {
    pub key: Key,
    pub index: usize,
    pub cells: Vec<HeaderCell>,
}

impl HeaderRow {
    /// Sum of the spans of the row's cells.
    pub fn width(&self) -> usize {
        width(&self.cells)
    }
}

fn width(cells: &[HeaderCell]) -> usize {
    cells.iter().map(|cell| cell.col_span).sum()
}

/// Groups leaf columns and their column-group ancestors into header rows.
///
/// Every leaf column gets a stack of itself plus its ancestors. A group shared
/// with an earlier stack widens its span instead; when the later stack is
/// taller, the earlier stack is padded so the group lands on the same row.
/// Rows are then read off the stacks bottom-up, and gaps are filled with
/// placeholders so that every row covers all leaf columns.
pub(crate) fn build_header_rows(
    columns: &[Key],
    group_of: impl Fn(&Key) -> Option<Key>,
) -> Vec<HeaderRow> {
    if columns.is_empty() {
        return Vec::new();
    }

    let mut stacks: Vec<Vec<Option<Key>>> = Vec::with_capacity(columns.len());
    let mut seen: HashMap<Key, (usize, usize)> = HashMap::default();
    let mut spans: HashMap<Key, usize> = HashMap::default();

    for column in columns {
        let current = stacks.len();
        let mut stack = vec![Some(column.clone())];
        let mut group = group_of(column);

        while let Some(key) = group {
            if let Some(&(owner, index)) = seen.get(&key) {
                *spans.entry(key.clone()).or_insert(1) += 1;
                // Ancestors of a shared group are shared as well; only pad
                // while the earlier stack sits lower than this one.
                if index < stack.len() {
                    let owner_stack = &mut stacks[owner];
                    for i in index..stack.len() {
                        owner_stack.insert(i, None);
                    }
                    for (i, entry) in owner_stack.iter().enumerate().skip(stack.len()) {
                        if let Some(shifted) = entry {
                            if let Some(position) = seen.get_mut(shifted) {
                                position.1 = i;
                            }
                        }
                    }
                }
            } else {
                spans.insert(key.clone(), 1);
                stack.push(Some(key.clone()));
                seen.insert(key.clone(), (current, stack.len() - 1));
            }
            group = group_of(&key);
        }

        stacks.push(stack);
    }

    let depth = stacks.iter().map(Vec::len).max().unwrap_or(0);
    let mut rows: Vec<Vec<HeaderCell>> = vec![Vec::new(); depth];

    for (col_index, stack) in stacks.iter().enumerate() {
        for (offset, entry) in stack.iter().enumerate() {
            let Some(key) = entry else { continue };
            let level = depth - 1 - offset;
            let row = &mut rows[level];
            let filled = width(row);
            if filled < col_index {
                row.push(HeaderCell::placeholder(
                    key,
                    filled,
                    col_index - filled,
                    level,
                ));
            }
            row.push(HeaderCell {
                key: key.clone(),
                kind: HeaderCellKind::Column,
                col_index,
                col_span: spans.get(key).copied().unwrap_or(1),
                level,
            });
        }
    }

    for (level, row) in rows.iter_mut().enumerate() {
        let filled = width(row);
        if filled < columns.len() {
            let next_to = row
                .last()
                .map(|cell| cell.key.clone())
                .unwrap_or_else(|| Key::from(format!("row-{level}")));
            row.push(HeaderCell::placeholder(
                &next_to,
                filled,
                columns.len() - filled,
                level,
            ));
        }
    }

    rows.into_iter()
        .enumerate()
        .map(|(index, cells)| HeaderRow {
            key: Key::from(format!("headerrow-{index}")),
            index,
            cells,
        })
        .collect()
}
