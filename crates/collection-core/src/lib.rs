#![doc = r"Incremental collection builder: a mutable shadow tree projected into immutable, queryable collection snapshots."]

pub mod collection;
pub mod collections;
pub mod document;
pub mod error;
pub mod key;
pub mod node;
mod shadow;
pub mod subscription;
pub mod transaction;

pub use collection::{BaseCollection, Children, Collection, Keys, MutableCollection};
pub use document::{Document, DocumentOptions, ROOT};
pub use error::CollectionError;
pub use key::Key;
pub use node::{ItemProps, Node, PropValue, Props, RenderFn, Rendered, ITEM_TYPE};
pub use subscription::Subscription;
pub use transaction::Transaction;

/// Index of a node in a document's shadow tree arena.
pub type NodeId = usize;
