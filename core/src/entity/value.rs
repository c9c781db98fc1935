//! Field values of a decoded entity graph.
//!
//! The [`Value`] enum is the format-agnostic representation every root
//! entity exposes for inspection and editing. Structs are ordered
//! name/value lists so that encoding follows declaration order.

use std::fmt;

/// A node of an entity's field graph.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    String(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
}

/// The shape of a [`Value`], without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Bool,
    I64,
    U64,
    F32,
    String,
    List,
    Map,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I64 => "int",
            Self::U64 => "uint",
            Self::F32 => "float",
            Self::String => "string",
            Self::List => "list",
            Self::Map => "struct",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::I64(_) => ValueKind::I64,
            Self::U64(_) => ValueKind::U64,
            Self::F32(_) => ValueKind::F32,
            Self::String(_) => ValueKind::String,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
        }
    }

    /// Parses user-entered text as a value of the given kind.
    ///
    /// Only scalar kinds can be parsed; lists and structs return `None`.
    /// Strings may optionally be wrapped in double quotes.
    pub fn parse_as(kind: ValueKind, text: &str) -> Option<Value> {
        let trimmed = text.trim();
        match kind {
            ValueKind::Bool => match trimmed {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueKind::I64 => trimmed.parse().ok().map(Value::I64),
            ValueKind::U64 => trimmed.parse().ok().map(Value::U64),
            ValueKind::F32 => trimmed.parse().ok().map(Value::F32),
            ValueKind::String => {
                let unquoted = text
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .unwrap_or(text);
                Some(Value::String(unquoted.to_owned()))
            }
            ValueKind::List | ValueKind::Map => None,
        }
    }

    /// Looks up a struct member by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Map(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Self::Map(fields) => fields
                .iter_mut()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}
