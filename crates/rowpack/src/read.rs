// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pack reading primitives and error types.
//!
//! For structured access, see the [`view`](crate::view) module.

use std::io;

use bytemuck::Pod;
use thiserror::Error;

use crate::field::FieldDecodeError;
use crate::model::ParseTagsError;
use crate::strings::{StringBlockError, StringId};

/// Errors that can occur when reading or validating a pack.
#[derive(Debug, Error)]
pub enum ReadError {
    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File is too small to contain a header.
    #[error("file too small: {size} bytes, minimum {minimum}")]
    FileTooSmall {
        /// Actual file size.
        size: usize,
        /// Minimum required size.
        minimum: usize,
    },

    /// Magic value doesn't match [`PACK_MAGIC`](crate::layout::PACK_MAGIC).
    #[error("invalid {section} magic: {actual:#010x}")]
    InvalidMagic {
        /// Which record carried the bad magic.
        section: &'static str,
        /// Value found.
        actual: u32,
    },

    /// Section offset or length would extend past its enclosing region.
    #[error("section {name} out of bounds: offset {offset}, length {length}, region size {size}")]
    SectionOutOfBounds {
        /// Section name for diagnostics.
        name: &'static str,
        /// Section offset.
        offset: u64,
        /// Section length in bytes.
        length: u64,
        /// Size of the enclosing region.
        size: usize,
    },

    /// Table index out of bounds.
    #[error("table index {index} out of bounds, file contains {count} tables")]
    TableIndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// Number of tables in file.
        count: usize,
    },

    /// No table with the requested name.
    #[error("no table named `{name}`")]
    TableNotFound {
        /// Requested name.
        name: String,
    },

    /// Row index out of bounds.
    #[error("table `{table}`: row {row} out of bounds, table has {count} rows")]
    RowIndexOutOfBounds {
        /// Table name.
        table: String,
        /// Requested row.
        row: usize,
        /// Number of rows.
        count: usize,
    },

    /// Column index out of bounds.
    #[error("column {column} out of bounds, table has {count} columns")]
    ColumnIndexOutOfBounds {
        /// Requested column.
        column: usize,
        /// Number of columns.
        count: usize,
    },

    /// A string block could not be parsed.
    #[error("{name} string block: {source}")]
    StringBlock {
        /// Which block.
        name: &'static str,
        /// Parse failure.
        #[source]
        source: StringBlockError,
    },

    /// The global string block does not list ids `0..count` in order.
    #[error("global string block entry {position} has id {id}")]
    NonDenseStrings {
        /// Position of the entry in the block.
        position: usize,
        /// Id found there.
        id: StringId,
    },

    /// The same text appears under two ids.
    #[error("string {id} duplicates {first}")]
    DuplicateString {
        /// Later id.
        id: StringId,
        /// Id of the first occurrence.
        first: StringId,
    },

    /// Id 0 is not the empty string.
    #[error("string {0} must be empty")]
    NonEmptyZeroString(StringId),

    /// A string id has no entry in the global block.
    #[error("{context}: dangling string id {id}")]
    DanglingString {
        /// Where the id was found.
        context: &'static str,
        /// The unresolved id.
        id: StringId,
    },

    /// A table string block entry disagrees with the global block.
    #[error("table `{table}`: string {id} differs from the global string block")]
    StringMismatch {
        /// Table name.
        table: String,
        /// Offending id.
        id: StringId,
    },

    /// Reserved bytes must be zero.
    #[error("non-zero reserved bytes in {field} at index {index}")]
    NonZeroReservedBytes {
        /// The field containing non-zero reserved bytes.
        field: &'static str,
        /// Index of the element with non-zero reserved bytes.
        index: usize,
    },

    /// Sections or records are not laid out where the format requires.
    #[error("{kind} layout violation at index {index}: expected offset {expected}, found {actual}")]
    LayoutViolation {
        /// The kind of element.
        kind: &'static str,
        /// Index of the element.
        index: usize,
        /// Required offset.
        expected: u64,
        /// Offset found.
        actual: u64,
    },

    /// The table index names a different table than the body it points to.
    #[error("table index entry {index} names `{indexed}` but the table is `{actual}`")]
    NameMismatch {
        /// Index entry.
        index: usize,
        /// Name in the index.
        indexed: String,
        /// Name in the table info.
        actual: String,
    },

    /// A key flag other than 0 or 1.
    #[error("table `{table}`, column {column}: invalid key flag {value}")]
    InvalidKeyFlag {
        /// Table name.
        table: String,
        /// Column index.
        column: usize,
        /// Raw flag.
        value: u32,
    },

    /// A row is malformed: it overruns its section, or its directory or
    /// fields are inconsistent with its length.
    #[error("table `{table}`, row {row}: {reason}")]
    MalformedRow {
        /// Table name.
        table: String,
        /// Row index.
        row: usize,
        /// What is wrong.
        reason: String,
    },

    /// A column type that is neither primitive nor in the supplied catalog.
    #[error("table `{table}`, column `{column}`: unsupported field type `{data_type}`")]
    UnsupportedFieldType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Type name.
        data_type: String,
    },

    /// A field could not be decoded.
    #[error("table `{table}`, row {row}, column `{column}`: {source}")]
    Field {
        /// Table name.
        table: String,
        /// Row index.
        row: usize,
        /// Column name.
        column: String,
        /// Decode failure.
        #[source]
        source: FieldDecodeError,
    },

    /// The header tags string is not a known tag name.
    #[error("invalid dataset tags: {0}")]
    InvalidTags(#[from] ParseTagsError),
}

/// Reads one unaligned `Pod` record at `offset`.
///
/// # Errors
///
/// Returns [`ReadError::SectionOutOfBounds`] if the record would extend past
/// the buffer.
pub fn read_pod<T: Pod>(data: &[u8], offset: u64, name: &'static str) -> Result<T, ReadError> {
    let bytes = read_bytes(data, offset, std::mem::size_of::<T>() as u64, name)?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

/// Reads `count` consecutive unaligned `Pod` records starting at `offset`.
///
/// Records inside a pack are not aligned, so they are copied out rather than
/// cast in place.
pub fn read_pods<T: Pod>(
    data: &[u8],
    offset: u64,
    count: u64,
    name: &'static str,
) -> Result<Vec<T>, ReadError> {
    let elem = std::mem::size_of::<T>();
    let bytes = read_bytes(data, offset, count.saturating_mul(elem as u64), name)?;
    Ok(bytes
        .chunks_exact(elem)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

/// Reads a byte slice from a buffer.
///
/// # Errors
///
/// Returns [`ReadError::SectionOutOfBounds`] if the slice would extend past
/// the buffer.
#[allow(clippy::cast_possible_truncation)] // bounds-checked against data.len() first
pub fn read_bytes<'a>(
    data: &'a [u8],
    offset: u64,
    length: u64,
    name: &'static str,
) -> Result<&'a [u8], ReadError> {
    let end = offset.saturating_add(length);
    if end > data.len() as u64 {
        return Err(ReadError::SectionOutOfBounds {
            name,
            offset,
            length,
            size: data.len(),
        });
    }
    Ok(&data[offset as usize..end as usize])
}

/// Reads a little-endian u32 at `offset`.
pub(crate) fn read_u32(data: &[u8], offset: usize, name: &'static str) -> Result<u32, ReadError> {
    read_pod::<u32>(data, offset as u64, name).map(u32::from_le)
}
