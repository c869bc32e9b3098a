//! Core types shared by the compiler and the runtime.
//!
//! - [`Value`] - dynamic value flowing through props, state and lookups
//! - [`Path`] - dotted member path into a [`Value`] tree
//! - [`ItemKey`] - hashable key extracted from a repeated item

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

// =============================================================================
// Value
// =============================================================================

/// A dynamic value.
///
/// Lists and maps are reference counted so that caching a value in a watch's
/// previous-value slot is a pointer copy. Equality short-circuits on pointer
/// identity before falling back to a structural comparison.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Map(Rc<BTreeMap<String, Value>>),
}

impl Value {
    /// Build a list value.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    /// Build a map value.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Map(Rc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Truthiness used by shields, toggles and boolean operators.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Member access. Returns `None` for missing fields and non-maps.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(name),
            _ => None,
        }
    }

    /// Positional access. Returns `None` out of range and for non-lists.
    pub fn at(&self, index: usize) -> Option<&Value> {
        match self {
            Value::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Resolve a path, yielding `Null` when any segment is missing.
    pub fn get_path(&self, path: &Path) -> Value {
        let mut current = self;
        for segment in path.segments() {
            let next = match segment {
                Segment::Field(name) => current.field(name),
                Segment::Index(i) => current.at(*i),
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current.clone()
    }

    /// Write `value` at `path`, creating intermediate maps for missing fields.
    ///
    /// Returns false if the path runs through a scalar or an out-of-range
    /// list index; the tree is left unchanged in that case.
    pub fn set_path(&mut self, path: &Path, value: Value) -> bool {
        match self.slot_mut(path.segments()) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Mutable access to the value at `path`, copying shared lists and maps
    /// on the way down.
    pub fn get_path_mut(&mut self, path: &Path) -> Option<&mut Value> {
        self.slot_mut(path.segments())
    }

    fn slot_mut(&mut self, segments: &[Segment]) -> Option<&mut Value> {
        let Some((first, rest)) = segments.split_first() else {
            return Some(self);
        };
        match first {
            Segment::Field(name) => {
                if self.is_null() {
                    *self = Value::Map(Rc::new(BTreeMap::new()));
                }
                match self {
                    Value::Map(map) => Rc::make_mut(map)
                        .entry(name.clone())
                        .or_default()
                        .slot_mut(rest),
                    _ => None,
                }
            }
            Segment::Index(i) => match self {
                Value::List(items) => Rc::make_mut(items).get_mut(*i)?.slot_mut(rest),
                _ => None,
            },
        }
    }

    /// Text rendering used by text effects and string concatenation.
    pub fn to_text(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.to_string(),
            Value::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Value::Map(_) => "[map]".to_string(),
        }
    }

    /// Length of strings, lists and maps; zero otherwise.
    pub fn len(&self) -> usize {
        match self {
            Value::Str(s) => s.chars().count(),
            Value::List(items) => items.len(),
            Value::Map(map) => map.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            // NaN equals itself.
            (Value::Float(a), Value::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Str(a), Value::Str(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b) || a == b,
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(Rc::new(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// Path
// =============================================================================

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// A member path such as `todos.0.done`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(SmallVec<[Segment; 4]>);

impl Path {
    /// The empty path, addressing the value itself.
    pub fn root() -> Self {
        Path(SmallVec::new())
    }

    /// Parse a dotted path. Purely numeric segments become list indices.
    pub fn parse(source: &str) -> Self {
        Path(
            source
                .split('.')
                .filter(|s| !s.is_empty())
                .map(|s| match s.parse::<usize>() {
                    Ok(i) => Segment::Index(i),
                    Err(_) => Segment::Field(s.to_string()),
                })
                .collect(),
        )
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.0.push(Segment::Field(name.to_string()));
        next
    }

    pub fn index(&self, index: usize) -> Self {
        let mut next = self.clone();
        next.0.push(Segment::Index(index));
        next
    }
}

impl From<&str> for Path {
    fn from(source: &str) -> Self {
        Path::parse(source)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                Segment::Field(name) => f.write_str(name)?,
                Segment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

// =============================================================================
// Item Keys
// =============================================================================

/// Key identifying a repeated item across patches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Bool(bool),
    Int(i64),
    Str(Rc<str>),
}

impl ItemKey {
    /// Scalars make keys; null, floats, lists and maps do not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(ItemKey::Bool(*b)),
            Value::Int(n) => Some(ItemKey::Int(*n)),
            Value::Str(s) => Some(ItemKey::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Bool(b) => write!(f, "{b}"),
            ItemKey::Int(n) => write!(f, "{n}"),
            ItemKey::Str(s) => write!(f, "{s:?}"),
        }
    }
}
