//! Tabular collection: a [`collection_core::Collection`] whose header subtree
//! is indexed into leaf columns, row-header columns and header rows.

mod header_rows;
mod table;

pub use header_rows::{HeaderCell, HeaderCellKind, HeaderRow};
pub use table::{
    TableCollection, COLUMN_TYPE, ROW_HEADER_PROP, TABLE_BODY_TYPE, TABLE_HEADER_TYPE,
};
