// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dynamically typed field trees.
//!
//! A [`FieldTree`] is the in-memory form of one message: an ordered mapping
//! from field name to a tagged scalar or nested tree. Trees are produced by
//! command mappers and by the decoder, and are always transient — they are
//! validated against a schema descriptor at the codec boundary, never
//! trusted on their own.

use std::fmt;

/// One field value: a tagged union over everything the schema can express.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer scalar (`int32`/`int64`/`uint32` fields).
    Int(i64),
    /// Floating-point scalar (`float`/`double` fields).
    Float(f64),
    /// UTF-8 string scalar.
    Text(String),
    /// Enum member by symbolic name, never by wire code.
    Symbol(String),
    /// Nested message.
    Tree(FieldTree),
}

impl Value {
    /// Convenience constructor for [`Value::Text`].
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Convenience constructor for [`Value::Symbol`].
    pub fn symbol(s: impl Into<String>) -> Self {
        Value::Symbol(s.into())
    }

    /// Short label for error messages ("int", "float", "string", ...).
    pub fn kind_label(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
            Value::Symbol(_) => "enum symbol",
            Value::Tree(_) => "message",
        }
    }
}

/// Ordered `field name → Value` mapping for one message.
///
/// Insertion order is preserved for display purposes; the codec serializes
/// in schema declaration order regardless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldTree {
    entries: Vec<(String, Value)>,
}

impl FieldTree {
    /// Empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fields present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no fields are present.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace a field. A replace keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Builder-style [`FieldTree::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.insert(name, value);
        self
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Iterate fields in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl fmt::Display for FieldTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match value {
                Value::Int(n) => write!(f, "{name}: {n}")?,
                Value::Float(x) => write!(f, "{name}: {x}")?,
                Value::Text(s) => write!(f, "{name}: {s:?}")?,
                Value::Symbol(s) => write!(f, "{name}: {s}")?,
                Value::Tree(t) => write!(f, "{name}: {t}")?,
            }
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_preserves_first_position_on_replace() {
        let mut tree = FieldTree::new();
        tree.insert("a", Value::Int(1));
        tree.insert("b", Value::Int(2));
        tree.insert("a", Value::Int(3));

        let names: Vec<&str> = tree.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(tree.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn display_renders_nested_trees() {
        let tree = FieldTree::new().with(
            "command",
            Value::Tree(FieldTree::new().with("zoomLevel", Value::symbol("ZOOM_X2"))),
        );
        assert_eq!(tree.to_string(), "{command: {zoomLevel: ZOOM_X2}}");
    }
}
