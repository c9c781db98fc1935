//! Schema-driven root entities.
//!
//! A [`Schema`] is a static description of a struct tree. [`RecordEntity`]
//! pairs a schema with a [`Value`] graph and derives decoding, encoding and
//! edit validation from the description, so a new xdat version only needs a
//! new `static` schema plus a factory function.
//!
//! Layout: fields in declaration order, little-endian, no padding. Bools are
//! one byte (0 or 1), strings and arrays carry a `u32` length prefix.

use super::codec::{ByteReader, ByteWriter};
use super::path::{FieldPath, PathSegment};
use super::value::{Value, ValueKind};
use super::XdatEntity;
use crate::error::{DecodeError, EncodeError, FieldError};

/// Binary type of a schema field.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldType {
    Bool,
    UByte,
    Int,
    UInt,
    Float,
    Str,
    Struct(&'static [FieldDef]),
    Array(&'static FieldType),
}

/// A named member of a struct.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

impl FieldDef {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Root description of one entity class.
#[derive(Debug)]
pub struct Schema {
    pub class_name: &'static str,
    pub fields: &'static [FieldDef],
}

impl FieldType {
    pub fn kind(self) -> ValueKind {
        match self {
            Self::Bool => ValueKind::Bool,
            Self::Int => ValueKind::I64,
            Self::UByte | Self::UInt => ValueKind::U64,
            Self::Float => ValueKind::F32,
            Self::Str => ValueKind::String,
            Self::Struct(_) => ValueKind::Map,
            Self::Array(_) => ValueKind::List,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::UByte => "ubyte",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Float => "float",
            Self::Str => "string",
            Self::Struct(_) => "struct",
            Self::Array(_) => "array",
        }
    }

    /// Fewest bytes a value of this type occupies on disk.
    pub fn min_width(self) -> usize {
        match self {
            Self::Bool | Self::UByte => 1,
            Self::Int | Self::UInt | Self::Float | Self::Str | Self::Array(_) => 4,
            Self::Struct(fields) => fields.iter().map(|f| f.ty.min_width()).sum(),
        }
    }

    pub fn default_value(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int => Value::I64(0),
            Self::UByte | Self::UInt => Value::U64(0),
            Self::Float => Value::F32(0.0),
            Self::Str => Value::String(String::new()),
            Self::Struct(fields) => Value::Map(
                fields
                    .iter()
                    .map(|f| (f.name.to_owned(), f.ty.default_value()))
                    .collect(),
            ),
            Self::Array(_) => Value::List(Vec::new()),
        }
    }

    /// Checks that `value` has this type's shape and fits its range.
    pub fn check(self, value: &Value, path: &str) -> Result<(), FieldError> {
        let mismatch = || FieldError::TypeMismatch {
            path: path.to_owned(),
            expected: self.name().to_owned(),
            found: describe(value),
        };
        match (self, value) {
            (Self::Bool, Value::Bool(_))
            | (Self::Float, Value::F32(_))
            | (Self::Str, Value::String(_)) => Ok(()),
            (Self::UByte, Value::U64(v)) if *v <= u64::from(u8::MAX) => Ok(()),
            (Self::UInt, Value::U64(v)) if *v <= u64::from(u32::MAX) => Ok(()),
            (Self::Int, Value::I64(v)) if i32::try_from(*v).is_ok() => Ok(()),
            (Self::Struct(defs), Value::Map(fields)) => {
                if defs.len() != fields.len()
                    || defs.iter().zip(fields).any(|(d, (n, _))| d.name != n.as_str())
                {
                    return Err(mismatch());
                }
                for (def, (name, member)) in defs.iter().zip(fields) {
                    def.ty.check(member, &join(path, name))?;
                }
                Ok(())
            }
            (Self::Array(elem), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    elem.check(item, &format!("{path}[{i}]"))?;
                }
                Ok(())
            }
            _ => Err(mismatch()),
        }
    }

    fn decode(self, r: &mut ByteReader<'_>) -> Result<Value, DecodeError> {
        Ok(match self {
            Self::Bool => Value::Bool(r.read_bool()?),
            Self::UByte => Value::U64(u64::from(r.read_u8()?)),
            Self::Int => Value::I64(i64::from(r.read_i32()?)),
            Self::UInt => Value::U64(u64::from(r.read_u32()?)),
            Self::Float => Value::F32(r.read_f32()?),
            Self::Str => Value::String(r.read_string()?),
            Self::Struct(defs) => Value::Map(
                defs.iter()
                    .map(|d| d.ty.decode(r).map(|v| (d.name.to_owned(), v)))
                    .collect::<Result<_, _>>()?,
            ),
            Self::Array(elem) => {
                let offset = r.offset();
                let count = r.read_u32()? as usize;
                // Zero-width elements are still held to one byte each.
                let needed = count.saturating_mul(elem.min_width().max(1));
                if needed > r.remaining() {
                    return Err(if elem.min_width() == 0 {
                        DecodeError::ImplausibleCount { offset, count }
                    } else {
                        DecodeError::UnexpectedEof {
                            offset: r.offset(),
                            needed: needed - r.remaining(),
                        }
                    });
                }
                let mut items = Vec::with_capacity(count);
                for _ in 0..count {
                    items.push(elem.decode(r)?);
                }
                Value::List(items)
            }
        })
    }

    fn encode(self, value: &Value, w: &mut ByteWriter, path: &str) -> Result<(), EncodeError> {
        match (self, value) {
            (Self::Bool, Value::Bool(v)) => w.write_bool(*v),
            (Self::UByte, Value::U64(v)) => {
                w.write_u8(u8::try_from(*v).map_err(|_| out_of_range(path, v, "ubyte"))?)
            }
            (Self::Int, Value::I64(v)) => {
                w.write_i32(i32::try_from(*v).map_err(|_| out_of_range(path, v, "int"))?)
            }
            (Self::UInt, Value::U64(v)) => {
                w.write_u32(u32::try_from(*v).map_err(|_| out_of_range(path, v, "uint"))?)
            }
            (Self::Float, Value::F32(v)) => w.write_f32(*v),
            (Self::Str, Value::String(s)) => {
                if u32::try_from(s.len()).is_err() {
                    return Err(EncodeError::TooLong {
                        path: path.to_owned(),
                        len: s.len(),
                    });
                }
                w.write_string(s);
            }
            (Self::Struct(defs), Value::Map(fields)) => {
                for def in defs {
                    let member = fields
                        .iter()
                        .find(|(n, _)| n == def.name)
                        .map(|(_, v)| v)
                        .ok_or_else(|| EncodeError::ShapeMismatch {
                            path: join(path, def.name),
                            expected: def.ty.name().to_owned(),
                            found: "nothing".to_owned(),
                        })?;
                    def.ty.encode(member, w, &join(path, def.name))?;
                }
            }
            (Self::Array(elem), Value::List(items)) => {
                let count = u32::try_from(items.len()).map_err(|_| EncodeError::TooLong {
                    path: path.to_owned(),
                    len: items.len(),
                })?;
                w.write_u32(count);
                for (i, item) in items.iter().enumerate() {
                    elem.encode(item, w, &format!("{path}[{i}]"))?;
                }
            }
            _ => {
                return Err(EncodeError::ShapeMismatch {
                    path: path.to_owned(),
                    expected: self.name().to_owned(),
                    found: describe(value),
                });
            }
        }
        Ok(())
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_owned()
    } else {
        format!("{parent}.{name}")
    }
}

fn out_of_range(path: &str, value: impl std::fmt::Display, target: &'static str) -> EncodeError {
    EncodeError::OutOfRange {
        path: path.to_owned(),
        value: value.to_string(),
        target,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::List(_) | Value::Map(_) => value.kind().to_string(),
        scalar => format!("{} {scalar}", scalar.kind()),
    }
}

impl Schema {
    fn root_type(&'static self) -> FieldType {
        FieldType::Struct(self.fields)
    }

    /// Returns the declared type of the node `path` points at.
    ///
    /// List bounds are not checked here; they depend on the live value.
    pub fn type_at(&'static self, path: &FieldPath) -> Result<FieldType, FieldError> {
        let mut ty = self.root_type();
        for segment in path.segments() {
            ty = match (segment, ty) {
                (PathSegment::Field(name), FieldType::Struct(defs)) => defs
                    .iter()
                    .find(|d| d.name == name)
                    .map(|d| d.ty)
                    .ok_or_else(|| FieldError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("{} has no member '{name}'", self.class_name),
                    })?,
                (PathSegment::Index(_), FieldType::Array(elem)) => *elem,
                (_, other) => {
                    return Err(FieldError::InvalidPath {
                        path: path.to_string(),
                        reason: format!("cannot step into {}", other.name()),
                    });
                }
            };
        }
        Ok(ty)
    }
}

/// A root entity whose layout is described by a static [`Schema`].
#[derive(Debug, Clone)]
pub struct RecordEntity {
    schema: &'static Schema,
    root: Value,
}

impl RecordEntity {
    /// Creates an entity with every field at its default value.
    pub fn new(schema: &'static Schema) -> Self {
        Self {
            schema,
            root: schema.root_type().default_value(),
        }
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }
}

impl XdatEntity for RecordEntity {
    fn class_name(&self) -> &str {
        self.schema.class_name
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let mut reader = ByteReader::new(bytes);
        let root = self.schema.root_type().decode(&mut reader)?;
        reader.finish()?;
        self.root = root;
        Ok(())
    }

    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut writer = ByteWriter::new();
        self.schema.root_type().encode(&self.root, &mut writer, "")?;
        Ok(writer.into_bytes())
    }

    fn root(&self) -> &Value {
        &self.root
    }

    fn kind_at(&self, path: &FieldPath) -> Result<ValueKind, FieldError> {
        path.resolve(&self.root)?;
        Ok(self.schema.type_at(path)?.kind())
    }

    fn set(&mut self, path: &FieldPath, value: Value) -> Result<Value, FieldError> {
        let ty = self.schema.type_at(path)?;
        path.resolve(&self.root)?;
        ty.check(&value, &path.to_string())?;
        let slot = path.resolve_mut(&mut self.root)?;
        Ok(std::mem::replace(slot, value))
    }

    fn clone_entity(&self) -> Box<dyn XdatEntity> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static POINT: [FieldDef; 2] = [
        FieldDef::new("x", FieldType::Int),
        FieldDef::new("y", FieldType::Int),
    ];
    static POINT_TYPE: FieldType = FieldType::Struct(&POINT);
    static SHAPE: Schema = Schema {
        class_name: "test.Shape",
        fields: &[
            FieldDef::new("name", FieldType::Str),
            FieldDef::new("closed", FieldType::Bool),
            FieldDef::new("alpha", FieldType::UByte),
            FieldDef::new("scale", FieldType::Float),
            FieldDef::new("points", FieldType::Array(&POINT_TYPE)),
        ],
    };

    fn shape_bytes() -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_string("tri");
        w.write_bool(true);
        w.write_u8(200);
        w.write_f32(0.5);
        w.write_u32(2);
        for (x, y) in [(1, -1), (3, 4)] {
            w.write_i32(x);
            w.write_i32(y);
        }
        w.into_bytes()
    }

    fn path(text: &str) -> FieldPath {
        FieldPath::parse(text).unwrap()
    }

    #[test]
    fn new_entity_has_defaults() {
        let entity = RecordEntity::new(&SHAPE);
        assert_eq!(entity.class_name(), "test.Shape");
        assert_eq!(entity.get(&path("name")).unwrap(), &Value::String(String::new()));
        assert_eq!(entity.get(&path("points")).unwrap(), &Value::List(Vec::new()));
    }

    #[test]
    fn decode_builds_graph_and_encode_is_lossless() {
        let bytes = shape_bytes();
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&bytes).unwrap();

        assert_eq!(entity.get(&path("alpha")).unwrap(), &Value::U64(200));
        assert_eq!(entity.get(&path("points[1].y")).unwrap(), &Value::I64(4));
        assert_eq!(entity.encode().unwrap(), bytes);
    }

    #[test]
    fn decode_rejects_truncated_and_trailing_input() {
        let bytes = shape_bytes();
        let mut entity = RecordEntity::new(&SHAPE);

        assert!(matches!(
            entity.decode(&bytes[..bytes.len() - 1]),
            Err(DecodeError::UnexpectedEof { .. })
        ));

        let mut longer = bytes.clone();
        longer.push(0);
        assert!(matches!(
            entity.decode(&longer),
            Err(DecodeError::TrailingBytes { remaining: 1, .. })
        ));
        // Failed decodes leave the previous graph in place.
        assert_eq!(entity.get(&path("name")).unwrap(), &Value::String(String::new()));
    }

    #[test]
    fn array_count_is_checked_against_input() {
        let mut bytes = shape_bytes();
        // Claim a million points; only two follow.
        let count_at = bytes.len() - 20;
        bytes[count_at..count_at + 4].copy_from_slice(&1_000_000u32.to_le_bytes());
        let mut entity = RecordEntity::new(&SHAPE);

        assert!(matches!(
            entity.decode(&bytes),
            Err(DecodeError::UnexpectedEof { needed, .. }) if needed == 8_000_000 - 16
        ));
    }

    #[test]
    fn zero_width_elements_cannot_inflate_input() {
        static EMPTY_TYPE: FieldType = FieldType::Struct(&[]);
        static BAGS: Schema = Schema {
            class_name: "test.Bags",
            fields: &[FieldDef::new("bags", FieldType::Array(&EMPTY_TYPE))],
        };
        assert_eq!(EMPTY_TYPE.min_width(), 0);
        let mut entity = RecordEntity::new(&BAGS);

        assert_eq!(
            entity.decode(&u32::MAX.to_le_bytes()),
            Err(DecodeError::ImplausibleCount {
                offset: 0,
                count: u32::MAX as usize
            })
        );

        let mut w = ByteWriter::new();
        w.write_u32(3);
        w.write_u8(0);
        w.write_u8(0);
        w.write_u8(0);
        // Three empty elements fit, but the padding bytes are then trailing.
        assert!(matches!(
            entity.decode(&w.into_bytes()),
            Err(DecodeError::TrailingBytes { remaining: 3, .. })
        ));
    }

    #[test]
    fn set_returns_old_value() {
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&shape_bytes()).unwrap();

        let old = entity
            .set(&path("points[0].x"), Value::I64(-7))
            .unwrap();
        assert_eq!(old, Value::I64(1));
        assert_eq!(entity.get(&path("points[0].x")).unwrap(), &Value::I64(-7));
    }

    #[test]
    fn set_rejects_wrong_kind_and_range() {
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&shape_bytes()).unwrap();

        assert!(matches!(
            entity.set(&path("name"), Value::I64(3)),
            Err(FieldError::TypeMismatch { .. })
        ));
        assert!(matches!(
            entity.set(&path("alpha"), Value::U64(256)),
            Err(FieldError::TypeMismatch { .. })
        ));
        assert!(matches!(
            entity.set(&path("points[0].x"), Value::I64(i64::from(i32::MAX) + 1)),
            Err(FieldError::TypeMismatch { .. })
        ));
        assert_eq!(entity.encode().unwrap(), shape_bytes());
    }

    #[test]
    fn set_rejects_unknown_paths() {
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&shape_bytes()).unwrap();

        assert!(matches!(
            entity.set(&path("colour"), Value::Bool(true)),
            Err(FieldError::InvalidPath { .. })
        ));
        assert!(matches!(
            entity.set(&path("points[9].x"), Value::I64(0)),
            Err(FieldError::InvalidPath { .. })
        ));
        assert!(matches!(
            entity.set(&path("name.first"), Value::I64(0)),
            Err(FieldError::InvalidPath { .. })
        ));
    }

    #[test]
    fn set_whole_struct_is_validated() {
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&shape_bytes()).unwrap();

        let point = Value::Map(vec![("x".into(), Value::I64(5)), ("y".into(), Value::I64(6))]);
        entity.set(&path("points[1]"), point).unwrap();
        assert_eq!(entity.get(&path("points[1].x")).unwrap(), &Value::I64(5));

        let bad = Value::Map(vec![("y".into(), Value::I64(5)), ("x".into(), Value::I64(6))]);
        assert!(entity.set(&path("points[1]"), bad).is_err());
    }

    #[test]
    fn kind_at_follows_schema() {
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&shape_bytes()).unwrap();

        assert_eq!(entity.kind_at(&path("alpha")).unwrap(), ValueKind::U64);
        assert_eq!(entity.kind_at(&path("scale")).unwrap(), ValueKind::F32);
        assert_eq!(entity.kind_at(&path("points[0]")).unwrap(), ValueKind::Map);
        assert!(entity.kind_at(&path("points[2]")).is_err());
    }

    #[test]
    fn clone_entity_is_independent() {
        let mut entity = RecordEntity::new(&SHAPE);
        entity.decode(&shape_bytes()).unwrap();
        let snapshot = entity.clone_entity();

        entity.set(&path("closed"), Value::Bool(false)).unwrap();
        assert_eq!(snapshot.get(&path("closed")).unwrap(), &Value::Bool(true));
        assert_eq!(snapshot.encode().unwrap(), shape_bytes());
    }

    #[test]
    fn encode_reports_shape_errors() {
        let err = FieldType::Array(&POINT_TYPE)
            .encode(&Value::List(vec![Value::I64(1)]), &mut ByteWriter::new(), "points")
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::ShapeMismatch {
                path: "points[0]".into(),
                expected: "struct".into(),
                found: "int 1".into(),
            }
        );
    }
}
