use std::fmt;
use std::rc::Rc;

/// Stable identity of an item inside a collection.
///
/// Keys are either text (explicit ids, generated provisional keys) or
/// numbers. Cloning a text key only bumps a reference count.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    Text(Rc<str>),
    Number(i64),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Text(text) => Some(text),
            Key::Number(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Text(text) => f.write_str(text),
            Key::Number(number) => write!(f, "{number}"),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::Text(Rc::from(value))
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Key::Text(Rc::from(value))
    }
}

impl From<Rc<str>> for Key {
    fn from(value: Rc<str>) -> Self {
        Key::Text(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Key::Number(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Key::Number(i64::from(value))
    }
}
