// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Table encoding into an isolated, relocatable buffer.
//!
//! A table body only depends on its own content and the type catalog, so
//! bodies can be produced on any thread. String ids inside a body are local
//! to the body's [`StringInterner`] until [`EncodedTable::resolve`] maps them
//! onto the shared table.

use bytemuck::Zeroable;
use tracing::debug;

use crate::buffer::PatchBuffer;
use crate::catalog::TypeCatalog;
use crate::error::WriteError;
use crate::field::FieldKind;
use crate::layout::{ColumnInfo, TableHeader, TableInfo, PACK_MAGIC};
use crate::model::Table;
use crate::row::{write_row, RowError};
use crate::strings::{write_string_block, SharedStringTable, StringInterner};

/// A fully encoded table body awaiting string resolution.
#[derive(Debug)]
pub struct EncodedTable {
    name: String,
    rows: usize,
    buffer: PatchBuffer,
    strings: StringInterner,
}

impl EncodedTable {
    /// Table name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of encoded rows.
    pub fn row_count(&self) -> usize {
        self.rows
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True if the body is empty (never the case for an encoded table).
    pub fn is_empty(&self) -> bool {
        self.buffer.len() == 0
    }

    /// Merges the body's strings into `shared` and returns the body with
    /// every string id rewritten to its global value.
    pub fn resolve(self, shared: &SharedStringTable) -> Vec<u8> {
        let map = shared.merge(&self.strings);
        let mut buffer = self.buffer;
        buffer.remap_strings(&map);
        buffer.into_bytes()
    }
}

/// Encodes `table` into a standalone body.
///
/// # Errors
///
/// Fails on the first column whose type cannot be resolved, the first row
/// with the wrong number of fields, or the first field that cannot be
/// encoded. Nothing partial is returned.
pub fn encode_table(table: &Table, catalog: &TypeCatalog<'_>) -> Result<EncodedTable, WriteError> {
    let kinds = table
        .columns
        .iter()
        .map(|column| {
            FieldKind::resolve(&column.data_type, catalog).ok_or_else(|| {
                WriteError::UnsupportedFieldType {
                    table: table.name.clone(),
                    column: column.name.clone(),
                    data_type: column.data_type.clone(),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let too_large = |section: &'static str| WriteError::SectionTooLarge {
        table: table.name.clone(),
        section,
    };
    let column_count = u32::try_from(table.columns.len()).map_err(|_| too_large("columns"))?;
    let row_count = u32::try_from(table.rows.len()).map_err(|_| too_large("rows"))?;

    let mut buf = PatchBuffer::new();
    let mut strings = StringInterner::new();

    let header_slot = buf.reserve::<TableHeader>();
    let hash = strings.intern(&table.hash_value);
    buf.mark_string_ref(header_slot.pos() + 4);

    let info_off = buf.len();
    let info = TableInfo {
        name_le: strings.intern(&table.name).0.to_le(),
        category_le: strings.intern(&table.category_path).0.to_le(),
        column_count_le: column_count.to_le(),
        row_count_le: row_count.to_le(),
    };
    buf.put_pod(&info);
    buf.mark_string_ref(info_off);
    buf.mark_string_ref(info_off + 4);

    let columns_off = buf.len();
    for column in &table.columns {
        let at = buf.len();
        buf.put_pod(&ColumnInfo {
            name_le: strings.intern(&column.name).0.to_le(),
            data_type_le: strings.intern(&column.data_type).0.to_le(),
            is_key_le: u32::from(column.is_key).to_le(),
        });
        buf.mark_string_ref(at);
        buf.mark_string_ref(at + 4);
    }

    let rows_off = buf.len();
    for (ix, row) in table.rows.iter().enumerate() {
        write_row(&mut buf, row, &kinds, &mut strings, catalog).map_err(|err| match err {
            RowError::Arity { found } => WriteError::RowArityMismatch {
                table: table.name.clone(),
                row: ix,
                expected: kinds.len(),
                found,
            },
            RowError::Field { column, error } => {
                error.into_write_error(&table.name, ix, &table.columns[column])
            }
            RowError::TooLarge => too_large("row"),
        })?;
    }

    let strings_off = buf.len();
    let count = u32::try_from(strings.len()).map_err(|_| too_large("string block"))?;
    write_string_block(buf.bytes_mut(), count, strings.iter())
        .map_err(|_| too_large("string block"))?;
    let mut at = strings_off + 4;
    for (_, text) in strings.iter() {
        buf.mark_string_ref(at);
        at += 8 + text.len();
    }

    let user_off = buf.len();
    buf.put_u8(0);

    buf.patch(
        header_slot,
        &TableHeader {
            magic_le: PACK_MAGIC.to_le(),
            hash_le: hash.0.to_le(),
            info_off_le: (info_off as u64).to_le(),
            columns_off_le: (columns_off as u64).to_le(),
            rows_off_le: (rows_off as u64).to_le(),
            strings_off_le: (strings_off as u64).to_le(),
            user_off_le: (user_off as u64).to_le(),
            ..TableHeader::zeroed()
        },
    );

    debug!(
        table = %table.name,
        rows = table.rows.len(),
        strings = strings.len(),
        string_refs = buf.string_ref_count(),
        bytes = buf.len(),
        "encoded table"
    );

    Ok(EncodedTable {
        name: table.name.clone(),
        rows: table.rows.len(),
        buffer: buf,
        strings,
    })
}
