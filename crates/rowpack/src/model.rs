// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory dataset snapshot consumed by the writer and produced by the decoder.

use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::DataType;

/// Export tag mask deciding which tables and columns reach a given consumer.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tags(u8);

impl Tags {
    /// Not exported anywhere.
    pub const UNUSED: Self = Self(0);
    /// Exported to servers.
    pub const SERVER: Self = Self(1);
    /// Exported to clients.
    pub const CLIENT: Self = Self(2);
    /// Exported everywhere.
    pub const ALL: Self = Self(3);

    /// Returns the raw bitmask.
    #[must_use]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// True if the two masks share at least one bit.
    #[must_use]
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl Default for Tags {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for Tags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitAnd for Tags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match *self {
            Self::SERVER => "Server",
            Self::CLIENT => "Client",
            Self::ALL => "All",
            _ => "Unused",
        };
        f.write_str(name)
    }
}

/// Error parsing [`Tags`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tags `{0}`")]
pub struct ParseTagsError(pub String);

impl FromStr for Tags {
    type Err = ParseTagsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Unused" => Ok(Self::UNUSED),
            "Server" => Ok(Self::SERVER),
            "Client" => Ok(Self::CLIENT),
            "All" => Ok(Self::ALL),
            other => Err(ParseTagsError(other.to_owned())),
        }
    }
}

/// A single field value. Custom-typed columns carry their textual form as
/// [`FieldValue::String`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// `boolean`
    Bool(bool),
    /// `string`, or the textual value of a custom type.
    String(String),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `int8`
    Int8(i8),
    /// `uint8`
    UInt8(u8),
    /// `int16`
    Int16(i16),
    /// `uint16`
    UInt16(u16),
    /// `int32`
    Int32(i32),
    /// `uint32`
    UInt32(u32),
    /// `int64`
    Int64(i64),
    /// `uint64`
    UInt64(u64),
    /// `datetime`
    DateTime(OffsetDateTime),
    /// `duration`
    Duration(time::Duration),
    /// `guid`
    Guid(Uuid),
}

impl FieldValue {
    /// Short name of the value's variant, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::String(_) => "string",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Int8(_) => "int8",
            Self::UInt8(_) => "uint8",
            Self::Int16(_) => "int16",
            Self::UInt16(_) => "uint16",
            Self::Int32(_) => "int32",
            Self::UInt32(_) => "uint32",
            Self::Int64(_) => "int64",
            Self::UInt64(_) => "uint64",
            Self::DateTime(_) => "datetime",
            Self::Duration(_) => "duration",
            Self::Guid(_) => "guid",
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Column of a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Primitive type name (`int32`, `string`, ...) or custom type path.
    pub data_type: String,
    /// Whether the column participates in the row key.
    pub is_key: bool,
    /// Export tags.
    pub tags: Tags,
}

impl Column {
    /// Creates a non-key column tagged [`Tags::ALL`].
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            is_key: false,
            tags: Tags::ALL,
        }
    }

    /// Creates a key column tagged [`Tags::ALL`].
    pub fn key(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            is_key: true,
            ..Self::new(name, data_type)
        }
    }

    /// Returns the column with different tags.
    pub fn with_tags(self, tags: Tags) -> Self {
        Self { tags, ..self }
    }
}

/// One row: fields aligned 1:1 with the table's columns; `None` is absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Field values in column order.
    pub fields: Vec<Option<FieldValue>>,
}

impl Row {
    /// Creates a row from its fields.
    pub fn new(fields: Vec<Option<FieldValue>>) -> Self {
        Self { fields }
    }
}

/// Named collection of rows over a fixed column schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Table name.
    pub name: String,
    /// Path-like grouping, e.g. `/items/`.
    pub category_path: String,
    /// Content hash, carried as text.
    pub hash_value: String,
    /// Export tags.
    pub tags: Tags,
    /// Column schema.
    pub columns: Vec<Column>,
    /// Rows.
    pub rows: Vec<Row>,
}

/// Snapshot of a whole dataset.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dataset {
    /// Dataset name.
    pub name: String,
    /// Revision identifier.
    pub revision: String,
    /// Tags the dataset was exported for.
    pub tags: Tags,
    /// Hash of the type catalog.
    pub types_hash: String,
    /// Hash of the table catalog.
    pub tables_hash: String,
    /// Tables in export order.
    pub tables: Vec<Table>,
    /// Custom type catalog.
    pub types: Vec<DataType>,
}

impl Dataset {
    /// Returns the part of the dataset visible to `tags`.
    ///
    /// Tables and columns whose tags do not intersect `tags` are dropped along
    /// with the matching row fields; tables left without columns are dropped.
    /// Rows whose field count differs from the column count are kept as they
    /// are.
    /// The type catalog is kept whole.
    pub fn filter_by_tags(&self, tags: Tags) -> Self {
        let tables = self
            .tables
            .iter()
            .filter(|table| table.tags.intersects(tags))
            .filter_map(|table| {
                let keep: Vec<usize> = table
                    .columns
                    .iter()
                    .enumerate()
                    .filter(|(_, column)| column.tags.intersects(tags))
                    .map(|(ix, _)| ix)
                    .collect();
                if keep.is_empty() {
                    return None;
                }
                let columns = keep.iter().map(|ix| table.columns[*ix].clone()).collect();
                let rows = table
                    .rows
                    .iter()
                    .map(|row| {
                        // arity errors belong to the writer
                        if row.fields.len() != table.columns.len() {
                            return row.clone();
                        }
                        Row::new(keep.iter().map(|ix| row.fields[*ix].clone()).collect())
                    })
                    .collect();
                Some(Table {
                    columns,
                    rows,
                    ..table.clone()
                })
            })
            .collect();
        Self {
            tags,
            tables,
            ..self.clone()
        }
    }
}
