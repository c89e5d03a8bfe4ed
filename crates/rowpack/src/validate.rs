// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Full structural validation of a pack.
//!
//! [`PackFile::from_bytes`](crate::PackFile::from_bytes) only checks what it
//! needs to build the header and string table. [`validate_pack`] walks every
//! table, column and row.

use rustc_hash::FxHashMap;

use crate::field::FieldKind;
use crate::layout::{ColumnInfo, FileHeader, TableHeader, TableIndexEntry, TableInfo};
use crate::layout::{ROW_LEN_SIZE, ROW_SLOT_SIZE};
use crate::read::{read_u32, ReadError};
use crate::strings::StringId;
use crate::view::{PackFile, RowView, TableView};

/// Fully validates a pack.
///
/// This checks:
/// - the global string block (dense, duplicate-free, id 0 empty)
/// - header reserved bytes and section placement
/// - that tables are contiguous and end at the global string block
/// - every table header, column directory and table string block
/// - every row's slot directory and field packing
///
/// # Errors
///
/// Returns the first violation encountered.
pub fn validate_pack(file: &PackFile) -> Result<(), ReadError> {
    validate_strings(file)?;

    let header = file.header();
    if header.reserved_le != 0 {
        return Err(ReadError::NonZeroReservedBytes {
            field: "file header",
            index: 0,
        });
    }
    expect_offset("table index", 0, FileHeader::SIZE as u64, header.index_off())?;
    let tables_off =
        header.index_off() + file.table_count() as u64 * TableIndexEntry::SIZE as u64;
    expect_offset("tables", 0, tables_off, header.tables_off())?;

    let mut expected = tables_off;
    for (ix, entry) in file.table_index().iter().enumerate() {
        if entry.reserved_le != 0 {
            return Err(ReadError::NonZeroReservedBytes {
                field: "table index",
                index: ix,
            });
        }
        expect_offset("table", ix, expected, entry.offset())?;
        let indexed = file.resolve(entry.name(), "table index name")?;
        let view = file.table(ix)?;
        if indexed != view.name() {
            return Err(ReadError::NameMismatch {
                index: ix,
                indexed: indexed.to_owned(),
                actual: view.name().to_owned(),
            });
        }
        validate_table(file, &view, ix)?;
        expected += view.body().len() as u64;
    }
    expect_offset("string block", 0, expected, header.strings_off())
}

fn validate_strings(file: &PackFile) -> Result<(), ReadError> {
    if file.string(StringId::EMPTY).is_some_and(|s| !s.is_empty()) {
        return Err(ReadError::NonEmptyZeroString(StringId::EMPTY));
    }
    let mut seen: FxHashMap<&str, StringId> = FxHashMap::default();
    for (ix, text) in file.strings().iter().enumerate() {
        let id = StringId(u32::try_from(ix).unwrap_or(u32::MAX));
        if let Some(first) = seen.insert(text, id) {
            return Err(ReadError::DuplicateString { id, first });
        }
    }
    Ok(())
}

fn validate_table(file: &PackFile, view: &TableView<'_>, ix: usize) -> Result<(), ReadError> {
    let header = view.header();
    if header.reserved_le != 0 {
        return Err(ReadError::NonZeroReservedBytes {
            field: "table header",
            index: ix,
        });
    }
    let info_off = TableHeader::SIZE as u64;
    let columns_off = info_off + TableInfo::SIZE as u64;
    let rows_off = columns_off + view.column_count() as u64 * ColumnInfo::SIZE as u64;
    expect_offset("table info", ix, info_off, header.info_off())?;
    expect_offset("column directory", ix, columns_off, header.columns_off())?;
    expect_offset("rows", ix, rows_off, header.rows_off())?;
    if view.body()[view.body().len() - 1] != 0 {
        return Err(ReadError::NonZeroReservedBytes {
            field: "table trailer",
            index: ix,
        });
    }

    for (col, column) in view.columns().iter().enumerate() {
        if column.key_flag > 1 {
            return Err(ReadError::InvalidKeyFlag {
                table: view.name().to_owned(),
                column: col,
                value: column.key_flag,
            });
        }
    }

    let mut rows_end = header.rows_off();
    if let Some(last) = view.row_count().checked_sub(1) {
        let row = view.row(last)?;
        rows_end = (view.row_offset(last).unwrap_or(0) + row.bytes().len()) as u64;
    }
    expect_offset("table string block", ix, rows_end, header.strings_off())?;

    let (entries, used) = view.string_block()?;
    expect_offset(
        "table trailer",
        ix,
        header.strings_off() + used as u64,
        header.user_off(),
    )?;
    for entry in entries {
        if file.string(entry.id) != Some(entry.text) {
            return Err(ReadError::StringMismatch {
                table: view.name().to_owned(),
                id: entry.id,
            });
        }
    }

    let widths: Vec<usize> = view
        .columns()
        .iter()
        .map(|c| FieldKind::width_of_type_name(c.data_type))
        .collect();
    for row in view.rows() {
        validate_row(file, view, &row, &widths)?;
    }
    Ok(())
}

fn validate_row(
    file: &PackFile,
    view: &TableView<'_>,
    row: &RowView<'_>,
    widths: &[usize],
) -> Result<(), ReadError> {
    let malformed = |reason: String| ReadError::MalformedRow {
        table: view.name().to_owned(),
        row: row.index(),
        reason,
    };
    let mut next = widths.len() * ROW_SLOT_SIZE;
    for (col, width) in widths.iter().enumerate() {
        let Some(offset) = row.offset(col)? else {
            continue;
        };
        if offset != next {
            return Err(malformed(format!(
                "column {col}: field at {offset}, expected {next}"
            )));
        }
        let Some(raw) = row.field_bytes(col, *width)? else {
            continue;
        };
        match view.columns()[col].data_type {
            "boolean" if raw[0] > 1 => {
                return Err(malformed(format!(
                    "column {col}: invalid boolean byte {:#04x}",
                    raw[0]
                )));
            }
            "string" => {
                let id = StringId(read_u32(raw, 0, "string field")?);
                file.resolve(id, "string field")?;
            }
            _ => {}
        }
        next += width;
    }
    if next != row.byte_len() {
        return Err(malformed(format!(
            "fields end at {next}, row length is {}",
            row.byte_len()
        )));
    }
    debug_assert!(row.bytes().len() == ROW_LEN_SIZE + next);
    Ok(())
}

fn expect_offset(
    kind: &'static str,
    index: usize,
    expected: u64,
    actual: u64,
) -> Result<(), ReadError> {
    if expected == actual {
        Ok(())
    } else {
        Err(ReadError::LayoutViolation {
            kind,
            index,
            expected,
            actual,
        })
    }
}
