//! Field paths into an entity graph.
//!
//! Paths use dotted member names with bracketed list indices:
//! `name`, `window.title`, `windows[3].controls[0].x`.

use std::fmt;
use std::str::FromStr;

use super::value::Value;
use crate::error::FieldError;

/// One step of a [`FieldPath`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// A parsed path to a single node of an entity graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    pub fn parse(text: &str) -> Result<Self, FieldError> {
        let invalid = |reason: &str| FieldError::InvalidPath {
            path: text.to_owned(),
            reason: reason.to_owned(),
        };

        if text.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = Vec::new();
        for part in text.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if name.is_empty() {
                return Err(invalid("empty member name"));
            }
            if !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(invalid(&format!("invalid member name '{name}'")));
            }
            segments.push(PathSegment::Field(name.to_owned()));

            while !rest.is_empty() {
                let close = rest
                    .find(']')
                    .ok_or_else(|| invalid("unterminated index"))?;
                let index = rest[1..close]
                    .parse::<usize>()
                    .map_err(|_| invalid(&format!("invalid index '{}'", &rest[1..close])))?;
                segments.push(PathSegment::Index(index));
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return Err(invalid("unexpected characters after index"));
                }
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Walks `root` along this path.
    pub fn resolve<'a>(&self, root: &'a Value) -> Result<&'a Value, FieldError> {
        let mut node = root;
        for (depth, segment) in self.segments.iter().enumerate() {
            node = match (segment, node) {
                (PathSegment::Field(name), Value::Map(_)) => node
                    .field(name)
                    .ok_or_else(|| self.missing(depth, &format!("no member '{name}'")))?,
                (PathSegment::Index(i), Value::List(items)) => items.get(*i).ok_or_else(|| {
                    self.missing(
                        depth,
                        &format!("index {i} out of bounds (len {})", items.len()),
                    )
                })?,
                (_, other) => return Err(self.wrong_container(depth, segment, other)),
            };
        }
        Ok(node)
    }

    /// Walks `root` along this path, returning a mutable slot.
    pub fn resolve_mut<'a>(&self, root: &'a mut Value) -> Result<&'a mut Value, FieldError> {
        let mut node = root;
        for (depth, segment) in self.segments.iter().enumerate() {
            node = match segment {
                PathSegment::Field(name) => {
                    if !matches!(node, Value::Map(_)) {
                        return Err(self.wrong_container(depth, segment, node));
                    }
                    node.field_mut(name)
                        .ok_or_else(|| self.missing(depth, &format!("no member '{name}'")))?
                }
                PathSegment::Index(i) => match node {
                    Value::List(items) => {
                        let len = items.len();
                        items.get_mut(*i).ok_or_else(|| {
                            self.missing(depth, &format!("index {i} out of bounds (len {len})"))
                        })?
                    }
                    other => return Err(self.wrong_container(depth, segment, other)),
                },
            };
        }
        Ok(node)
    }

    fn missing(&self, depth: usize, reason: &str) -> FieldError {
        FieldError::InvalidPath {
            path: self.to_string(),
            reason: format!("{reason} at '{}'", self.prefix(depth)),
        }
    }

    fn wrong_container(&self, depth: usize, segment: &PathSegment, node: &Value) -> FieldError {
        let wanted = match segment {
            PathSegment::Field(_) => "struct",
            PathSegment::Index(_) => "list",
        };
        FieldError::InvalidPath {
            path: self.to_string(),
            reason: format!(
                "expected {wanted} before '{}', found {}",
                self.prefix(depth + 1),
                node.kind()
            ),
        }
    }

    fn prefix(&self, len: usize) -> String {
        FieldPath {
            segments: self.segments[..len].to_vec(),
        }
        .to_string()
    }
}

impl FromStr for FieldPath {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if i == 0 => f.write_str(name)?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
