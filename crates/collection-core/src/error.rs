use std::fmt;
use std::rc::Rc;

use crate::key::Key;
use crate::NodeId;

/// Invariant violations raised by collections and the document.
///
/// All of these are programming errors on the caller's side. Structural
/// no-ops (removing a detached child, editing after unmount) never produce
/// an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionError {
    Frozen { operation: &'static str },
    KeyChanged { from: Key, to: Key },
    MissingKey { node_type: Rc<str> },
    MissingNode { id: NodeId },
    NotAnElement { id: NodeId },
    NotAChild { parent: NodeId, child: NodeId },
    InvalidHierarchy { parent: NodeId, child: NodeId },
    StillAttached { id: NodeId },
    Configuration { reason: &'static str },
}

impl fmt::Display for CollectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionError::Frozen { operation } => {
                write!(f, "cannot {operation} on a committed collection")
            }
            CollectionError::KeyChanged { from, to } => {
                write!(f, "cannot change the id of an item from {from} to {to}")
            }
            CollectionError::MissingKey { node_type } => {
                write!(f, "could not determine a stable key for {node_type} node")
            }
            CollectionError::MissingNode { id } => write!(f, "shadow node {id} missing"),
            CollectionError::NotAnElement { id } => {
                write!(f, "shadow node {id} is the document root, not an element")
            }
            CollectionError::NotAChild { parent, child } => {
                write!(f, "shadow node {child} is not a child of {parent}")
            }
            CollectionError::InvalidHierarchy { parent, child } => {
                write!(f, "cannot insert shadow node {child} under {parent}")
            }
            CollectionError::StillAttached { id } => {
                write!(f, "shadow node {id} is still attached to a parent")
            }
            CollectionError::Configuration { reason } => f.write_str(reason),
        }
    }
}

impl std::error::Error for CollectionError {}
