// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-size records of the pack file format.
//!
//! Every structure here is `#[repr(C)]` with no implicit padding and derives
//! `bytemuck::Pod`, so it can be written with [`bytemuck::bytes_of`] and read
//! back with [`bytemuck::pod_read_unaligned`]. Rows are variable-length, so
//! records inside a table are not guaranteed to be aligned; readers must
//! never cast them in place.
//!
//! # Layout
//!
//! ```text
//! FileHeader | TableIndexEntry * table_count | table bodies... | string block
//!
//! table body:
//! TableHeader | TableInfo | ColumnInfo * column_count | rows... | string block | 0u8
//!
//! row:
//! u32 byte_len | u32 slot * column_count | field data
//! ```
//!
//! File header offsets are absolute. Table header offsets are relative to the
//! start of the table body. Row slots are relative to the start of the slot
//! directory, and a slot of `0` marks an absent field.
//!
//! All multi-byte integers are little-endian.

use bytemuck::{Pod, Zeroable};

use crate::strings::StringId;

/// Magic value opening both the file header and every table header.
pub const PACK_MAGIC: u32 = 0x0305_0000;

/// Slot value marking an absent field in a row's offset directory.
pub const ABSENT_SLOT: u32 = 0;

/// Size in bytes of a row's length prefix.
pub const ROW_LEN_SIZE: usize = std::mem::size_of::<u32>();

/// Size in bytes of one offset slot in a row's directory.
pub const ROW_SLOT_SIZE: usize = std::mem::size_of::<u32>();

/// File header (56 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FileHeader {
    /// Must equal [`PACK_MAGIC`].
    pub magic_le: u32,
    /// String id of the dataset revision.
    pub revision_le: u32,
    /// String id of the type catalog hash.
    pub types_hash_le: u32,
    /// String id of the table catalog hash.
    pub tables_hash_le: u32,
    /// String id of the dataset tags, in their string form.
    pub tags_le: u32,
    /// Reserved (must be zero).
    pub reserved_le: u32,
    /// Number of tables (and table index entries).
    pub table_count_le: u32,
    /// String id of the dataset name.
    pub name_le: u32,
    /// Absolute offset of the table index.
    pub index_off_le: u64,
    /// Absolute offset of the first table body.
    pub tables_off_le: u64,
    /// Absolute offset of the global string block.
    pub strings_off_le: u64,
}

const _: () = assert!(std::mem::size_of::<FileHeader>() == 56);

impl FileHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Returns the magic value.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_le(self.magic_le)
    }

    /// Returns the table count.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        u32::from_le(self.table_count_le)
    }

    /// Returns the dataset name id.
    #[must_use]
    pub fn name(&self) -> StringId {
        StringId(u32::from_le(self.name_le))
    }

    /// Returns the dataset revision id.
    #[must_use]
    pub fn revision(&self) -> StringId {
        StringId(u32::from_le(self.revision_le))
    }

    /// Returns the types hash id.
    #[must_use]
    pub fn types_hash(&self) -> StringId {
        StringId(u32::from_le(self.types_hash_le))
    }

    /// Returns the tables hash id.
    #[must_use]
    pub fn tables_hash(&self) -> StringId {
        StringId(u32::from_le(self.tables_hash_le))
    }

    /// Returns the tags id.
    #[must_use]
    pub fn tags(&self) -> StringId {
        StringId(u32::from_le(self.tags_le))
    }

    /// Returns the table index offset.
    #[must_use]
    pub fn index_off(&self) -> u64 {
        u64::from_le(self.index_off_le)
    }

    /// Returns the offset of the first table body.
    #[must_use]
    pub fn tables_off(&self) -> u64 {
        u64::from_le(self.tables_off_le)
    }

    /// Returns the global string block offset.
    #[must_use]
    pub fn strings_off(&self) -> u64 {
        u64::from_le(self.strings_off_le)
    }
}

/// Table index entry (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TableIndexEntry {
    /// String id of the table name.
    pub name_le: u32,
    /// Reserved (must be zero).
    pub reserved_le: u32,
    /// Absolute offset of the table header.
    pub offset_le: u64,
}

const _: () = assert!(std::mem::size_of::<TableIndexEntry>() == 16);

impl TableIndexEntry {
    /// Size of one entry in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Returns the table name id.
    #[must_use]
    pub fn name(&self) -> StringId {
        StringId(u32::from_le(self.name_le))
    }

    /// Returns the absolute table offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from_le(self.offset_le)
    }
}

/// Table header (56 bytes). All offsets are relative to the table start.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TableHeader {
    /// Must equal [`PACK_MAGIC`].
    pub magic_le: u32,
    /// String id of the table content hash.
    pub hash_le: u32,
    /// Reserved (must be zero).
    pub reserved_le: u64,
    /// Offset of the [`TableInfo`] record.
    pub info_off_le: u64,
    /// Offset of the column directory.
    pub columns_off_le: u64,
    /// Offset of the first row.
    pub rows_off_le: u64,
    /// Offset of the table string block.
    pub strings_off_le: u64,
    /// Offset of the trailing reserved byte.
    pub user_off_le: u64,
}

const _: () = assert!(std::mem::size_of::<TableHeader>() == 56);

impl TableHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Returns the magic value.
    #[must_use]
    pub fn magic(&self) -> u32 {
        u32::from_le(self.magic_le)
    }

    /// Returns the content hash id.
    #[must_use]
    pub fn hash(&self) -> StringId {
        StringId(u32::from_le(self.hash_le))
    }

    /// Returns the table info offset.
    #[must_use]
    pub fn info_off(&self) -> u64 {
        u64::from_le(self.info_off_le)
    }

    /// Returns the column directory offset.
    #[must_use]
    pub fn columns_off(&self) -> u64 {
        u64::from_le(self.columns_off_le)
    }

    /// Returns the row section offset.
    #[must_use]
    pub fn rows_off(&self) -> u64 {
        u64::from_le(self.rows_off_le)
    }

    /// Returns the table string block offset.
    #[must_use]
    pub fn strings_off(&self) -> u64 {
        u64::from_le(self.strings_off_le)
    }

    /// Returns the trailing byte offset.
    #[must_use]
    pub fn user_off(&self) -> u64 {
        u64::from_le(self.user_off_le)
    }
}

/// Table info record (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TableInfo {
    /// String id of the table name.
    pub name_le: u32,
    /// String id of the category path.
    pub category_le: u32,
    /// Number of columns.
    pub column_count_le: u32,
    /// Number of rows.
    pub row_count_le: u32,
}

const _: () = assert!(std::mem::size_of::<TableInfo>() == 16);

impl TableInfo {
    /// Size of the record in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Returns the table name id.
    #[must_use]
    pub fn name(&self) -> StringId {
        StringId(u32::from_le(self.name_le))
    }

    /// Returns the category path id.
    #[must_use]
    pub fn category(&self) -> StringId {
        StringId(u32::from_le(self.category_le))
    }

    /// Returns the column count.
    #[must_use]
    pub fn column_count(&self) -> u32 {
        u32::from_le(self.column_count_le)
    }

    /// Returns the row count.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        u32::from_le(self.row_count_le)
    }
}

/// Column directory entry (12 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ColumnInfo {
    /// String id of the column name.
    pub name_le: u32,
    /// String id of the declared data-type name.
    pub data_type_le: u32,
    /// `1` if the column is part of the row key, else `0`.
    pub is_key_le: u32,
}

const _: () = assert!(std::mem::size_of::<ColumnInfo>() == 12);

impl ColumnInfo {
    /// Size of one entry in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Returns the column name id.
    #[must_use]
    pub fn name(&self) -> StringId {
        StringId(u32::from_le(self.name_le))
    }

    /// Returns the data-type name id.
    #[must_use]
    pub fn data_type(&self) -> StringId {
        StringId(u32::from_le(self.data_type_le))
    }

    /// Returns the raw key flag.
    #[must_use]
    pub fn key_flag(&self) -> u32 {
        u32::from_le(self.is_key_le)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn records_have_no_padding() {
        assert_eq!(FileHeader::SIZE, 56);
        assert_eq!(TableIndexEntry::SIZE, 16);
        assert_eq!(TableHeader::SIZE, 56);
        assert_eq!(TableInfo::SIZE, 16);
        assert_eq!(ColumnInfo::SIZE, 12);
    }

    #[test]
    fn header_accessors_decode_little_endian() {
        let header = FileHeader {
            magic_le: PACK_MAGIC.to_le(),
            table_count_le: 3u32.to_le(),
            strings_off_le: 0x1234u64.to_le(),
            ..FileHeader::zeroed()
        };
        let bytes = bytemuck::bytes_of(&header);
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x05, 0x03]);

        let back: FileHeader = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(back.magic(), PACK_MAGIC);
        assert_eq!(back.table_count(), 3);
        assert_eq!(back.strings_off(), 0x1234);
    }
}
