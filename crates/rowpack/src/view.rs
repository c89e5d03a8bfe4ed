// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structured views over pack data.
//!
//! [`PackFile`] owns the bytes and the parsed global string table.
//! [`TableView`] resolves a table's header, schema and row starts once;
//! [`RowView`] then reaches any field through its slot without scanning.
//!
//! ```ignore
//! let file = PackFile::open("game.pack")?;
//! let users = file.table_by_name("Users")?;
//! for row in users.rows() {
//!     let name = row.value(1, FieldKind::String, &catalog)?;
//! }
//! ```

use std::path::Path;

use crate::catalog::TypeCatalog;
use crate::field::{decode_field, FieldKind};
use crate::layout::{
    ColumnInfo, FileHeader, TableHeader, TableIndexEntry, TableInfo, ABSENT_SLOT, PACK_MAGIC,
    ROW_LEN_SIZE, ROW_SLOT_SIZE,
};
use crate::model::{FieldValue, Tags};
use crate::read::{read_bytes, read_pod, read_pods, read_u32, ReadError};
use crate::strings::{read_string_block, StringEntry, StringId};

/// An in-memory pack.
#[derive(Debug)]
pub struct PackFile {
    data: Vec<u8>,
    header: FileHeader,
    index: Vec<TableIndexEntry>,
    strings: Vec<String>,
    tags: Tags,
}

impl PackFile {
    /// Reads a pack from disk.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Io`] if the file cannot be read, or any error
    /// from [`from_bytes`](Self::from_bytes).
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReadError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(data)
    }

    /// Parses the header, table index and global string block.
    ///
    /// Tables are not inspected until requested. Use
    /// [`validate_pack`](crate::validate_pack) for full validation.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ReadError> {
        if data.len() < FileHeader::SIZE {
            return Err(ReadError::FileTooSmall {
                size: data.len(),
                minimum: FileHeader::SIZE,
            });
        }
        let header: FileHeader = read_pod(&data, 0, "header")?;
        if header.magic() != PACK_MAGIC {
            return Err(ReadError::InvalidMagic {
                section: "file",
                actual: header.magic(),
            });
        }

        let index = read_pods::<TableIndexEntry>(
            &data,
            header.index_off(),
            u64::from(header.table_count()),
            "table index",
        )?;

        let block = read_bytes(
            &data,
            header.strings_off(),
            (data.len() as u64).saturating_sub(header.strings_off()),
            "string block",
        )?;
        let (entries, _) = read_string_block(block).map_err(|source| ReadError::StringBlock {
            name: "global",
            source,
        })?;
        let mut strings = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            if entry.id.index() != position {
                return Err(ReadError::NonDenseStrings {
                    position,
                    id: entry.id,
                });
            }
            strings.push(entry.text.to_owned());
        }

        let mut file = Self {
            data,
            header,
            index,
            strings,
            tags: Tags::ALL,
        };
        for (context, id) in [
            ("header name", header.name()),
            ("header revision", header.revision()),
            ("header types hash", header.types_hash()),
            ("header tables hash", header.tables_hash()),
        ] {
            file.resolve(id, context)?;
        }
        file.tags = file.resolve(header.tags(), "header tags")?.parse()?;
        Ok(file)
    }

    /// Returns the file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns the raw pack bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Dataset name.
    pub fn name(&self) -> &str {
        self.text(self.header.name())
    }

    /// Dataset revision.
    pub fn revision(&self) -> &str {
        self.text(self.header.revision())
    }

    /// Tags the dataset was exported for.
    pub fn tags(&self) -> Tags {
        self.tags
    }

    /// Type catalog hash.
    pub fn types_hash(&self) -> &str {
        self.text(self.header.types_hash())
    }

    /// Table catalog hash.
    pub fn tables_hash(&self) -> &str {
        self.text(self.header.tables_hash())
    }

    /// Number of tables.
    pub fn table_count(&self) -> usize {
        self.index.len()
    }

    /// Table index entries in file order.
    pub fn table_index(&self) -> &[TableIndexEntry] {
        &self.index
    }

    /// Text of a global string id.
    pub fn string(&self, id: StringId) -> Option<&str> {
        self.strings.get(id.index()).map(String::as_str)
    }

    /// Number of entries in the global string block.
    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    /// Global strings in id order.
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    /// Returns a view over table `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the index is out of bounds or the table body is
    /// malformed.
    pub fn table(&self, index: usize) -> Result<TableView<'_>, ReadError> {
        let entry = self
            .index
            .get(index)
            .ok_or(ReadError::TableIndexOutOfBounds {
                index,
                count: self.index.len(),
            })?;
        TableView::new(self, entry.offset())
    }

    /// Returns the first table whose index entry carries `name`.
    pub fn table_by_name(&self, name: &str) -> Result<TableView<'_>, ReadError> {
        let ix = self
            .index
            .iter()
            .position(|entry| self.string(entry.name()) == Some(name))
            .ok_or_else(|| ReadError::TableNotFound {
                name: name.to_owned(),
            })?;
        self.table(ix)
    }

    /// Iterates over all tables in file order.
    pub fn tables(&self) -> impl Iterator<Item = Result<TableView<'_>, ReadError>> + '_ {
        (0..self.table_count()).map(|ix| self.table(ix))
    }

    pub(crate) fn resolve(&self, id: StringId, context: &'static str) -> Result<&str, ReadError> {
        self.string(id)
            .ok_or(ReadError::DanglingString { context, id })
    }

    // Header ids are resolved in `from_bytes`.
    fn text(&self, id: StringId) -> &str {
        self.string(id).unwrap_or_default()
    }
}

/// Resolved column directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnView<'a> {
    /// Column name.
    pub name: &'a str,
    /// Declared data-type name.
    pub data_type: &'a str,
    /// Raw key flag.
    pub key_flag: u32,
}

impl ColumnView<'_> {
    /// Whether the column is part of the row key.
    pub fn is_key(&self) -> bool {
        self.key_flag != 0
    }
}

/// View over one table body.
#[derive(Debug, Clone)]
pub struct TableView<'a> {
    file: &'a PackFile,
    offset: u64,
    body: &'a [u8],
    header: TableHeader,
    info: TableInfo,
    name: &'a str,
    columns: Vec<ColumnView<'a>>,
    row_starts: Vec<usize>,
}

impl<'a> TableView<'a> {
    #[allow(clippy::cast_possible_truncation)] // offsets are bounds-checked against `body`
    fn new(file: &'a PackFile, offset: u64) -> Result<Self, ReadError> {
        let data = file.data();
        let header: TableHeader = read_pod(data, offset, "table header")?;
        if header.magic() != PACK_MAGIC {
            return Err(ReadError::InvalidMagic {
                section: "table",
                actual: header.magic(),
            });
        }
        let body = read_bytes(data, offset, header.user_off().saturating_add(1), "table body")?;

        let info: TableInfo = read_pod(body, header.info_off(), "table info")?;
        let name = file.resolve(info.name(), "table name")?;
        file.resolve(info.category(), "table category")?;
        file.resolve(header.hash(), "table hash")?;

        let raw_columns = read_pods::<ColumnInfo>(
            body,
            header.columns_off(),
            u64::from(info.column_count()),
            "column directory",
        )?;
        let columns = raw_columns
            .iter()
            .map(|column| {
                Ok(ColumnView {
                    name: file.resolve(column.name(), "column name")?,
                    data_type: file.resolve(column.data_type(), "column type")?,
                    key_flag: column.key_flag(),
                })
            })
            .collect::<Result<Vec<_>, ReadError>>()?;

        let rows_end = header.strings_off();
        if header.rows_off() > rows_end || rows_end > header.user_off() {
            return Err(ReadError::SectionOutOfBounds {
                name: "rows",
                offset: header.rows_off(),
                length: rows_end.saturating_sub(header.rows_off()),
                size: body.len(),
            });
        }
        let rows_end = rows_end as usize;
        let directory = columns.len() * ROW_SLOT_SIZE;
        let row_count = info.row_count() as usize;
        let section = rows_end - header.rows_off() as usize;
        let smallest_rows = (ROW_LEN_SIZE + directory).saturating_mul(row_count);
        if smallest_rows > section {
            return Err(ReadError::SectionOutOfBounds {
                name: "rows",
                offset: header.rows_off(),
                length: smallest_rows as u64,
                size: section,
            });
        }
        let mut row_starts = Vec::with_capacity(row_count);
        let mut at = header.rows_off() as usize;
        for row in 0..row_count {
            let malformed = |reason: String| ReadError::MalformedRow {
                table: name.to_owned(),
                row,
                reason,
            };
            let len = read_u32(&body[..rows_end], at, "row length")
                .map_err(|_| malformed(format!("length prefix at {at} overruns the row section")))?
                as usize;
            let end = at + ROW_LEN_SIZE + len;
            if end > rows_end {
                return Err(malformed(format!(
                    "{len} bytes at {at} overrun the row section ending at {rows_end}"
                )));
            }
            if len < directory {
                return Err(malformed(format!(
                    "{len} bytes cannot hold a {directory}-byte slot directory"
                )));
            }
            row_starts.push(at);
            at = end;
        }

        Ok(Self {
            file,
            offset,
            body,
            header,
            info,
            name,
            columns,
            row_starts,
        })
    }

    /// Absolute offset of the table body.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Raw table body, from the header through the trailing byte.
    pub fn body(&self) -> &'a [u8] {
        self.body
    }

    /// Table header.
    pub fn header(&self) -> &TableHeader {
        &self.header
    }

    /// Table info record.
    pub fn info(&self) -> &TableInfo {
        &self.info
    }

    /// Table name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Category path.
    pub fn category_path(&self) -> &'a str {
        self.file.text(self.info.category())
    }

    /// Content hash.
    pub fn hash_value(&self) -> &'a str {
        self.file.text(self.header.hash())
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.row_starts.len()
    }

    /// Column directory.
    pub fn columns(&self) -> &[ColumnView<'a>] {
        &self.columns
    }

    /// Resolves column `index`'s declared type against `catalog`.
    pub fn column_kind(
        &self,
        index: usize,
        catalog: &TypeCatalog<'_>,
    ) -> Result<FieldKind, ReadError> {
        let column = self
            .columns
            .get(index)
            .ok_or(ReadError::ColumnIndexOutOfBounds {
                column: index,
                count: self.columns.len(),
            })?;
        FieldKind::resolve(column.data_type, catalog).ok_or_else(|| {
            ReadError::UnsupportedFieldType {
                table: self.name.to_owned(),
                column: column.name.to_owned(),
                data_type: column.data_type.to_owned(),
            }
        })
    }

    /// Row `index`.
    pub fn row(&self, index: usize) -> Result<RowView<'a>, ReadError> {
        let start = *self
            .row_starts
            .get(index)
            .ok_or_else(|| ReadError::RowIndexOutOfBounds {
                table: self.name.to_owned(),
                row: index,
                count: self.row_starts.len(),
            })?;
        let len = read_u32(self.body, start, "row length")? as usize;
        Ok(RowView {
            file: self.file,
            table: self.name,
            index,
            bytes: &self.body[start..start + ROW_LEN_SIZE + len],
            columns: self.columns.len(),
        })
    }

    /// Iterates over rows in order.
    pub fn rows(&self) -> impl Iterator<Item = RowView<'a>> + '_ {
        (0..self.row_count()).filter_map(|ix| self.row(ix).ok())
    }

    /// Byte offset of row `index` within the table body.
    pub fn row_offset(&self, index: usize) -> Option<usize> {
        self.row_starts.get(index).copied()
    }

    /// Entries of the table's own string block.
    pub fn string_entries(&self) -> Result<Vec<StringEntry<'a>>, ReadError> {
        Ok(self.string_block()?.0)
    }

    /// Entries of the table string block and its encoded size.
    pub(crate) fn string_block(&self) -> Result<(Vec<StringEntry<'a>>, usize), ReadError> {
        let block = read_bytes(
            self.body,
            self.header.strings_off(),
            self.header.user_off().saturating_sub(self.header.strings_off()),
            "table string block",
        )?;
        read_string_block(block).map_err(|source| ReadError::StringBlock {
            name: "table",
            source,
        })
    }
}

/// View over one encoded row.
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    file: &'a PackFile,
    table: &'a str,
    index: usize,
    bytes: &'a [u8],
    columns: usize,
}

impl<'a> RowView<'a> {
    /// Row index within its table.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Value of the length prefix: slot directory plus field data.
    pub fn byte_len(&self) -> usize {
        self.bytes.len() - ROW_LEN_SIZE
    }

    /// Raw row bytes, length prefix included.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Raw slot of column `column`.
    pub fn slot(&self, column: usize) -> Result<u32, ReadError> {
        if column >= self.columns {
            return Err(ReadError::ColumnIndexOutOfBounds {
                column,
                count: self.columns,
            });
        }
        read_u32(self.bytes, ROW_LEN_SIZE + column * ROW_SLOT_SIZE, "row slot")
    }

    /// Field offset from the start of the slot directory, or `None` when
    /// the field is absent.
    pub fn offset(&self, column: usize) -> Result<Option<usize>, ReadError> {
        Ok(match self.slot(column)? {
            ABSENT_SLOT => None,
            slot => Some(slot as usize),
        })
    }

    /// Whether column `column` has no value.
    pub fn is_absent(&self, column: usize) -> Result<bool, ReadError> {
        Ok(self.offset(column)?.is_none())
    }

    /// The `width` bytes of a present field.
    pub fn field_bytes(&self, column: usize, width: usize) -> Result<Option<&'a [u8]>, ReadError> {
        let Some(rel) = self.offset(column)? else {
            return Ok(None);
        };
        let start = ROW_LEN_SIZE + rel;
        let directory_end = ROW_LEN_SIZE + self.columns * ROW_SLOT_SIZE;
        if start < directory_end || start + width > self.bytes.len() {
            return Err(ReadError::MalformedRow {
                table: self.table.to_owned(),
                row: self.index,
                reason: format!(
                    "column {column}: {width}-byte field at {rel} outside data region of {} bytes",
                    self.byte_len()
                ),
            });
        }
        Ok(Some(&self.bytes[start..start + width]))
    }

    /// Decodes column `column` as `kind`.
    pub fn value(
        &self,
        column: usize,
        kind: FieldKind,
        catalog: &TypeCatalog<'_>,
    ) -> Result<Option<FieldValue>, ReadError> {
        let Some(raw) = self.field_bytes(column, kind.width())? else {
            return Ok(None);
        };
        let file = self.file;
        decode_field(kind, raw, |id| file.string(id), catalog)
            .map(Some)
            .map_err(|source| ReadError::Field {
                table: self.table.to_owned(),
                row: self.index,
                column: column.to_string(),
                source,
            })
    }
}
