//! Immutable item records stored in a collection.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::key::Key;

/// Node type of plain items. Nesting under an item increases the level.
pub const ITEM_TYPE: &str = "item";

/// Loosely typed property value forwarded from the declarative layer.
#[derive(Clone, Debug, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Text(value.to_owned())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Text(value)
    }
}

pub type Props = IndexMap<String, PropValue>;

/// Content produced by the rendering collaborator for an item.
#[derive(Clone)]
pub enum Rendered {
    /// Plain text; doubles as the text value when none is given.
    Text(String),
    /// Anything else. The core never looks inside.
    Opaque(Rc<dyn Any>),
}

impl Rendered {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Rendered::Text(text) => Some(text),
            Rendered::Opaque(_) => None,
        }
    }
}

impl fmt::Debug for Rendered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rendered::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Rendered::Opaque(_) => f.write_str("Opaque(..)"),
        }
    }
}

impl From<&str> for Rendered {
    fn from(value: &str) -> Self {
        Rendered::Text(value.to_owned())
    }
}

impl From<String> for Rendered {
    fn from(value: String) -> Self {
        Rendered::Text(value)
    }
}

/// Re-renders a node from its committed record.
pub type RenderFn<T> = Rc<dyn Fn(&Node<T>) -> Rendered>;

/// One logical item: identity, payload, and position in the committed tree.
///
/// Positional fields (`index`, `level`, `parent_key`, the sibling and child
/// keys) always describe the last committed shape of the shadow tree.
pub struct Node<T> {
    pub node_type: Rc<str>,
    pub key: Key,
    pub value: Option<T>,
    pub level: usize,
    pub has_child_nodes: bool,
    pub rendered: Option<Rendered>,
    pub render: Option<RenderFn<T>>,
    pub text_value: String,
    pub index: usize,
    pub parent_key: Option<Key>,
    pub prev_key: Option<Key>,
    pub next_key: Option<Key>,
    pub first_child_key: Option<Key>,
    pub last_child_key: Option<Key>,
    pub props: Props,
}

impl<T> Node<T> {
    pub fn new(node_type: impl Into<Rc<str>>, key: impl Into<Key>) -> Self {
        Self {
            node_type: node_type.into(),
            key: key.into(),
            value: None,
            level: 0,
            has_child_nodes: false,
            rendered: None,
            render: None,
            text_value: String::new(),
            index: 0,
            parent_key: None,
            prev_key: None,
            next_key: None,
            first_child_key: None,
            last_child_key: None,
            props: Props::new(),
        }
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn is_type(&self, node_type: &str) -> bool {
        &*self.node_type == node_type
    }

    /// Returns `true` when the boolean prop `name` is present and set.
    pub fn prop_flag(&self, name: &str) -> bool {
        self.props
            .get(name)
            .and_then(PropValue::as_bool)
            .unwrap_or(false)
    }
}

// Manual impl: `RenderFn` clones without requiring anything of `T` beyond
// the payload itself.
impl<T: Clone> Clone for Node<T> {
    fn clone(&self) -> Self {
        Self {
            node_type: Rc::clone(&self.node_type),
            key: self.key.clone(),
            value: self.value.clone(),
            level: self.level,
            has_child_nodes: self.has_child_nodes,
            rendered: self.rendered.clone(),
            render: self.render.clone(),
            text_value: self.text_value.clone(),
            index: self.index,
            parent_key: self.parent_key.clone(),
            prev_key: self.prev_key.clone(),
            next_key: self.next_key.clone(),
            first_child_key: self.first_child_key.clone(),
            last_child_key: self.last_child_key.clone(),
            props: self.props.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("node_type", &self.node_type)
            .field("key", &self.key)
            .field("value", &self.value)
            .field("level", &self.level)
            .field("index", &self.index)
            .field("text_value", &self.text_value)
            .field("parent_key", &self.parent_key)
            .field("prev_key", &self.prev_key)
            .field("next_key", &self.next_key)
            .field("first_child_key", &self.first_child_key)
            .field("last_child_key", &self.last_child_key)
            .finish_non_exhaustive()
    }
}

/// Properties supplied for an element by the declarative layer.
#[derive(Clone, Debug)]
pub struct ItemProps<T> {
    /// Explicit stable identity. Falls back to the provisional key.
    pub id: Option<Key>,
    pub value: Option<T>,
    pub text_value: Option<String>,
    pub aria_label: Option<String>,
    pub props: Props,
}

impl<T> Default for ItemProps<T> {
    fn default() -> Self {
        Self {
            id: None,
            value: None,
            text_value: None,
            aria_label: None,
            props: Props::new(),
        }
    }
}

impl<T> ItemProps<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<Key>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn value(mut self, value: T) -> Self {
        self.value = Some(value);
        self
    }

    pub fn text_value(mut self, text: impl Into<String>) -> Self {
        self.text_value = Some(text.into());
        self
    }

    pub fn aria_label(mut self, label: impl Into<String>) -> Self {
        self.aria_label = Some(label.into());
        self
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(name.into(), value.into());
        self
    }

    /// Resolves the text value: explicit text, then plain rendered text,
    /// then the accessibility label. Empty strings do not count.
    pub(crate) fn resolve_text_value(&self, rendered: Option<&Rendered>) -> String {
        self.text_value
            .as_deref()
            .filter(|text| !text.is_empty())
            .or_else(|| {
                rendered
                    .and_then(Rendered::as_text)
                    .filter(|text| !text.is_empty())
            })
            .or_else(|| self.aria_label.as_deref())
            .unwrap_or_default()
            .to_owned()
    }
}
