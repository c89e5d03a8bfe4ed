// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-field encoding, dispatched on the column's declared type.
//!
//! A column's type name is resolved once into a [`FieldKind`]; the writer
//! then encodes every field of that column through the same kind. Dispatch
//! never looks at the runtime variant of the value except to reject
//! mismatches.
//!
//! | kind | bytes | encoding |
//! |------|-------|----------|
//! | `boolean` | 1 | `0` or `1` |
//! | `string` | 4 | interned string id |
//! | `float` / `double` | 4 / 8 | IEEE-754 |
//! | `int8`..`uint64` | 1..8 | two's complement / unsigned |
//! | `datetime` | 8 | whole seconds since the Unix epoch, truncated toward zero |
//! | `duration` | 8 | signed count of 100 ns ticks |
//! | `guid` | 16 | mixed-endian GUID layout ([`Uuid::to_bytes_le`]) |
//! | custom | 8 | the type's underlying value as `i64` |

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::buffer::PatchBuffer;
use crate::catalog::{ConversionError, TypeCatalog, TypeHandle};
use crate::error::FieldError;
use crate::model::FieldValue;
use crate::strings::{StringId, StringInterner};

/// Number of duration ticks per second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Nanoseconds per duration tick.
pub const NANOS_PER_TICK: i64 = 100;

/// Resolved encoding of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// `boolean`
    Boolean,
    /// `string`
    String,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `int8`
    Int8,
    /// `uint8`
    UInt8,
    /// `int16`
    Int16,
    /// `uint16`
    UInt16,
    /// `int32`
    Int32,
    /// `uint32`
    UInt32,
    /// `int64`
    Int64,
    /// `uint64`
    UInt64,
    /// `datetime`
    DateTime,
    /// `duration`
    Duration,
    /// `guid`
    Guid,
    /// A catalog type.
    Custom(TypeHandle),
}

impl FieldKind {
    /// Resolves a primitive type name, without consulting a catalog.
    pub fn primitive(type_name: &str) -> Option<Self> {
        let kind = match type_name {
            "boolean" => Self::Boolean,
            "string" => Self::String,
            "float" => Self::Float,
            "double" => Self::Double,
            "int8" => Self::Int8,
            "uint8" => Self::UInt8,
            "int16" => Self::Int16,
            "uint16" => Self::UInt16,
            "int32" => Self::Int32,
            "uint32" => Self::UInt32,
            "int64" => Self::Int64,
            "uint64" => Self::UInt64,
            "datetime" => Self::DateTime,
            "duration" => Self::Duration,
            "guid" => Self::Guid,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolves a column type name: primitives first, then the catalog.
    pub fn resolve(type_name: &str, catalog: &TypeCatalog<'_>) -> Option<Self> {
        Self::primitive(type_name).or_else(|| catalog.resolve(type_name).map(Self::Custom))
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn width(self) -> usize {
        match self {
            Self::Boolean | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::UInt16 => 2,
            Self::String | Self::Float | Self::Int32 | Self::UInt32 => 4,
            Self::Double
            | Self::Int64
            | Self::UInt64
            | Self::DateTime
            | Self::Duration
            | Self::Custom(_) => 8,
            Self::Guid => 16,
        }
    }

    /// Encoded size for a type name when the catalog is unavailable. Any
    /// non-primitive name is a custom type and therefore 8 bytes wide.
    #[must_use]
    pub fn width_of_type_name(type_name: &str) -> usize {
        Self::primitive(type_name).map_or(8, Self::width)
    }
}

/// Seconds since the Unix epoch, dropping any sub-second part.
pub fn datetime_to_seconds(value: OffsetDateTime) -> i64 {
    (value - OffsetDateTime::UNIX_EPOCH).whole_seconds()
}

/// Inverse of [`datetime_to_seconds`], in UTC.
pub fn seconds_to_datetime(seconds: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::UNIX_EPOCH.checked_add(Duration::seconds(seconds))
}

/// Why a duration has no exact tick count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TickError {
    /// The tick count does not fit in `i64`.
    #[error("duration does not fit in 64-bit ticks")]
    Overflow,
    /// The duration is not a whole number of ticks.
    #[error("duration carries {remainder_nanos} ns below the 100 ns tick")]
    SubTick {
        /// Nanoseconds left over after whole ticks.
        remainder_nanos: i64,
    },
}

/// Duration as an exact tick count.
#[allow(clippy::cast_possible_truncation)] // remainder is below one tick
pub fn duration_to_ticks(value: Duration) -> Result<i64, TickError> {
    let nanos = value.whole_nanoseconds();
    let per_tick = i128::from(NANOS_PER_TICK);
    let ticks = i64::try_from(nanos / per_tick).map_err(|_| TickError::Overflow)?;
    match nanos % per_tick {
        0 => Ok(ticks),
        remainder => Err(TickError::SubTick {
            remainder_nanos: remainder as i64,
        }),
    }
}

/// Inverse of [`duration_to_ticks`].
#[allow(clippy::cast_possible_truncation)] // remainder is below one second
pub fn ticks_to_duration(ticks: i64) -> Duration {
    let seconds = ticks / TICKS_PER_SECOND;
    let nanos = (ticks % TICKS_PER_SECOND) * NANOS_PER_TICK;
    Duration::new(seconds, nanos as i32)
}

/// Appends one field's bytes. String values are interned into `strings`.
pub(crate) fn encode_field(
    buf: &mut PatchBuffer,
    kind: FieldKind,
    value: &FieldValue,
    strings: &mut StringInterner,
    catalog: &TypeCatalog<'_>,
) -> Result<(), FieldError> {
    match (kind, value) {
        (FieldKind::Boolean, FieldValue::Bool(v)) => buf.put_u8(u8::from(*v)),
        (FieldKind::String, FieldValue::String(v)) => buf.put_string_id(strings.intern(v)),
        (FieldKind::Float, FieldValue::Float(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::Double, FieldValue::Double(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::Int8, FieldValue::Int8(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::UInt8, FieldValue::UInt8(v)) => buf.put_u8(*v),
        (FieldKind::Int16, FieldValue::Int16(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::UInt16, FieldValue::UInt16(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::Int32, FieldValue::Int32(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::UInt32, FieldValue::UInt32(v)) => buf.put_u32(*v),
        (FieldKind::Int64, FieldValue::Int64(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::UInt64, FieldValue::UInt64(v)) => buf.put_slice(&v.to_le_bytes()),
        (FieldKind::DateTime, FieldValue::DateTime(v)) => {
            buf.put_slice(&datetime_to_seconds(*v).to_le_bytes());
        }
        (FieldKind::Duration, FieldValue::Duration(v)) => {
            let ticks = duration_to_ticks(*v)?;
            buf.put_slice(&ticks.to_le_bytes());
        }
        (FieldKind::Guid, FieldValue::Guid(v)) => buf.put_slice(&v.to_bytes_le()),
        (FieldKind::Custom(handle), FieldValue::String(text)) => {
            let value = catalog
                .get(handle)
                .convert_from_str(text)
                .map_err(FieldError::Conversion)?;
            buf.put_slice(&value.to_le_bytes());
        }
        (_, other) => {
            return Err(FieldError::Mismatch {
                found: other.kind_name(),
            })
        }
    }
    Ok(())
}

/// Failures decoding one field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldDecodeError {
    /// Fewer bytes than the kind's width.
    #[error("field needs {needed} bytes, {available} available")]
    Truncated {
        /// Bytes the kind consumes.
        needed: usize,
        /// Bytes left in the row.
        available: usize,
    },
    /// A boolean byte other than 0 or 1.
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),
    /// A string field refers to an id missing from the string table.
    #[error("dangling string id {0}")]
    DanglingString(StringId),
    /// A datetime outside the representable range.
    #[error("datetime {0}s out of range")]
    DateTimeOutOfRange(i64),
    /// A custom value with no textual form.
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Decodes one field from the front of `bytes`, consuming exactly
/// `kind.width()` bytes. `lookup` resolves string ids.
pub fn decode_field<'s, F>(
    kind: FieldKind,
    bytes: &[u8],
    lookup: F,
    catalog: &TypeCatalog<'_>,
) -> Result<FieldValue, FieldDecodeError>
where
    F: Fn(StringId) -> Option<&'s str>,
{
    let width = kind.width();
    let raw = bytes.get(..width).ok_or(FieldDecodeError::Truncated {
        needed: width,
        available: bytes.len(),
    })?;
    let value = match kind {
        FieldKind::Boolean => match raw[0] {
            0 => FieldValue::Bool(false),
            1 => FieldValue::Bool(true),
            other => return Err(FieldDecodeError::InvalidBool(other)),
        },
        FieldKind::String => {
            let id = StringId(u32::from_le_bytes(array(raw)));
            let text = lookup(id).ok_or(FieldDecodeError::DanglingString(id))?;
            FieldValue::String(text.to_owned())
        }
        FieldKind::Float => FieldValue::Float(f32::from_le_bytes(array(raw))),
        FieldKind::Double => FieldValue::Double(f64::from_le_bytes(array(raw))),
        FieldKind::Int8 => FieldValue::Int8(i8::from_le_bytes(array(raw))),
        FieldKind::UInt8 => FieldValue::UInt8(raw[0]),
        FieldKind::Int16 => FieldValue::Int16(i16::from_le_bytes(array(raw))),
        FieldKind::UInt16 => FieldValue::UInt16(u16::from_le_bytes(array(raw))),
        FieldKind::Int32 => FieldValue::Int32(i32::from_le_bytes(array(raw))),
        FieldKind::UInt32 => FieldValue::UInt32(u32::from_le_bytes(array(raw))),
        FieldKind::Int64 => FieldValue::Int64(i64::from_le_bytes(array(raw))),
        FieldKind::UInt64 => FieldValue::UInt64(u64::from_le_bytes(array(raw))),
        FieldKind::DateTime => {
            let seconds = i64::from_le_bytes(array(raw));
            FieldValue::DateTime(
                seconds_to_datetime(seconds).ok_or(FieldDecodeError::DateTimeOutOfRange(seconds))?,
            )
        }
        FieldKind::Duration => {
            FieldValue::Duration(ticks_to_duration(i64::from_le_bytes(array(raw))))
        }
        FieldKind::Guid => FieldValue::Guid(Uuid::from_bytes_le(array(raw))),
        FieldKind::Custom(handle) => {
            let value = i64::from_le_bytes(array(raw));
            FieldValue::String(catalog.get(handle).convert_to_string(value)?)
        }
    };
    Ok(value)
}

/// Copies a slice whose length was checked against the kind width.
fn array<const N: usize>(raw: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[..N]);
    out
}
