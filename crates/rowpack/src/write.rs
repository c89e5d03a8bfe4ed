// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pack file writer.
//!
//! # Write order
//!
//! 1. Header strings are interned and a zeroed [`FileHeader`] is written.
//! 2. A zeroed [`TableIndexEntry`] is reserved per table.
//! 3. Tables are encoded in windows of `max_in_flight`. Each window is
//!    encoded in parallel and then appended in input order; the table's
//!    strings are merged into the shared table at that point, so ids do not
//!    depend on which worker finished first.
//! 4. The global string block is appended.
//! 5. The header and index are rewritten in place and the cursor is put back
//!    at the end of the pack.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use bytemuck::Zeroable;
use tracing::{debug, info, instrument, warn};

use crate::catalog::TypeCatalog;
use crate::config::WriterOptions;
use crate::error::WriteError;
use crate::layout::{FileHeader, TableIndexEntry, PACK_MAGIC};
use crate::model::{Dataset, Table};
use crate::strings::{write_string_block, SharedStringTable};
use crate::table::{encode_table, EncodedTable};

/// Summary of a completed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    /// Tables written.
    pub tables: usize,
    /// Rows written across all tables.
    pub rows: usize,
    /// Entries in the global string block, including the empty string.
    pub strings: usize,
    /// Bytes written, from the header to the end of the string block.
    pub bytes: u64,
}

/// Serializes `dataset` into `sink` starting at the sink's current position.
///
/// Offsets inside the pack are relative to that starting position. On
/// success the sink is left positioned just past the pack.
///
/// # Errors
///
/// Returns the first table failure in input order, or
/// [`WriteError::StreamWriteFailure`] if the sink rejects a write or seek.
/// On error the sink holds an incomplete pack and must be discarded.
#[instrument(skip_all, fields(dataset = %dataset.name, tables = dataset.tables.len()))]
pub fn serialize<W>(
    sink: &mut W,
    dataset: &Dataset,
    options: &WriterOptions,
) -> Result<PackStats, WriteError>
where
    W: Write + Seek,
{
    let base = sink.stream_position()?;
    let shared = SharedStringTable::new();
    let too_large = |section: &'static str| WriteError::SectionTooLarge {
        table: dataset.name.clone(),
        section,
    };

    let types_hash = shared.intern(&dataset.types_hash);
    let tables_hash = shared.intern(&dataset.tables_hash);
    let tags = shared.intern(&dataset.tags.to_string());
    let revision = shared.intern(&dataset.revision);
    let name = shared.intern(&dataset.name);

    let table_count = u32::try_from(dataset.tables.len()).map_err(|_| too_large("table index"))?;
    sink.write_all(bytemuck::bytes_of(&FileHeader::zeroed()))?;
    let index_off = FileHeader::SIZE as u64;
    for _ in 0..table_count {
        sink.write_all(bytemuck::bytes_of(&TableIndexEntry::zeroed()))?;
    }
    let tables_off = index_off + u64::from(table_count) * TableIndexEntry::SIZE as u64;

    let catalog = TypeCatalog::new(&dataset.types);
    let workers = options.resolved_workers();
    let mut index = Vec::with_capacity(dataset.tables.len());
    let mut cursor = tables_off;
    let mut rows = 0usize;

    for window in dataset.tables.chunks(options.window()) {
        for encoded in encode_window(window, &catalog, workers)? {
            let table_name = shared.intern(encoded.name());
            rows += encoded.row_count();
            let body = encoded.resolve(&shared);
            sink.write_all(&body)?;
            index.push(TableIndexEntry {
                name_le: table_name.0.to_le(),
                reserved_le: 0,
                offset_le: cursor.to_le(),
            });
            cursor += body.len() as u64;
        }
    }

    let strings_off = cursor;
    let strings = shared.into_interner();
    let string_count = u32::try_from(strings.len()).map_err(|_| too_large("string block"))?;
    let mut out = BufWriter::new(&mut *sink);
    cursor += write_string_block(&mut out, string_count, strings.iter())? as u64;
    out.flush()?;
    drop(out);

    let header = FileHeader {
        magic_le: PACK_MAGIC.to_le(),
        revision_le: revision.0.to_le(),
        types_hash_le: types_hash.0.to_le(),
        tables_hash_le: tables_hash.0.to_le(),
        tags_le: tags.0.to_le(),
        reserved_le: 0,
        table_count_le: table_count.to_le(),
        name_le: name.0.to_le(),
        index_off_le: index_off.to_le(),
        tables_off_le: tables_off.to_le(),
        strings_off_le: strings_off.to_le(),
    };
    sink.seek(SeekFrom::Start(base))?;
    sink.write_all(bytemuck::bytes_of(&header))?;
    sink.write_all(bytemuck::cast_slice(index.as_slice()))?;
    sink.seek(SeekFrom::Start(base + cursor))?;
    sink.flush()?;

    let stats = PackStats {
        tables: dataset.tables.len(),
        rows,
        strings: strings.len(),
        bytes: cursor,
    };
    info!(
        tables = stats.tables,
        rows = stats.rows,
        strings = stats.strings,
        bytes = stats.bytes,
        "pack written"
    );
    Ok(stats)
}

/// Serializes `dataset` into a fresh buffer.
pub fn to_bytes(dataset: &Dataset, options: &WriterOptions) -> Result<Vec<u8>, WriteError> {
    let mut cursor = Cursor::new(Vec::new());
    serialize(&mut cursor, dataset, options)?;
    Ok(cursor.into_inner())
}

/// Serializes `dataset` to `path`.
///
/// The pack is first written to a temporary file next to `path` and renamed
/// over it only once complete. If anything fails, the temporary file is
/// removed and `path` is left untouched.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn write_file(
    path: impl AsRef<Path>,
    dataset: &Dataset,
    options: &WriterOptions,
) -> Result<PackStats, WriteError> {
    let path = path.as_ref();
    let tmp = temp_sibling(path);
    let result = write_then_rename(&tmp, path, dataset, options);
    if result.is_err() {
        if let Err(err) = fs::remove_file(&tmp) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(tmp = %tmp.display(), error = %err, "failed to remove temporary pack");
            }
        }
    }
    result
}

fn write_then_rename(
    tmp: &Path,
    path: &Path,
    dataset: &Dataset,
    options: &WriterOptions,
) -> Result<PackStats, WriteError> {
    let mut file = BufWriter::new(File::create(tmp)?);
    let stats = serialize(&mut file, dataset, options)?;
    let file = file.into_inner().map_err(std::io::IntoInnerError::into_error)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)?;
    debug!(path = %path.display(), "pack published");
    Ok(stats)
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<name>.<pid>.<seq>.tmp`, unique per call within the process.
fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map_or_else(|| "pack".into(), std::ffi::OsStr::to_os_string);
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    name.push(format!(".{}.{seq}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Encodes one window of tables, returning them in input order.
///
/// Workers claim table indices from a shared counter. Once any table fails,
/// workers stop claiming new ones; the error reported is the failing table
/// with the lowest index.
fn encode_window(
    tables: &[Table],
    catalog: &TypeCatalog<'_>,
    workers: usize,
) -> Result<Vec<EncodedTable>, WriteError> {
    let workers = workers.min(tables.len());
    if workers <= 1 {
        return tables.iter().map(|t| encode_table(t, catalog)).collect();
    }

    let next = AtomicUsize::new(0);
    let failed = AtomicBool::new(false);
    let slots: Mutex<Vec<Option<Result<EncodedTable, WriteError>>>> =
        Mutex::new((0..tables.len()).map(|_| None).collect());

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let next = &next;
                let failed = &failed;
                let slots = &slots;
                s.spawn(move || loop {
                    if failed.load(Ordering::Relaxed) {
                        break;
                    }
                    let ix = next.fetch_add(1, Ordering::Relaxed);
                    let Some(table) = tables.get(ix) else {
                        break;
                    };
                    let result = encode_table(table, catalog);
                    if result.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    slots.lock().unwrap_or_else(|e| e.into_inner())[ix] = Some(result);
                })
            })
            .collect();

        for handle in handles {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    });

    let slots = slots.into_inner().unwrap_or_else(|e| e.into_inner());
    let mut out = Vec::with_capacity(slots.len());
    let mut first_err = None;
    for slot in slots {
        match slot {
            Some(Ok(table)) if first_err.is_none() => out.push(table),
            Some(Err(err)) if first_err.is_none() => first_err = Some(err),
            _ => {}
        }
    }
    match first_err {
        Some(err) => Err(err),
        None => Ok(out),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Column, FieldValue, Row};

    fn small(name: &str, rows: usize) -> Table {
        Table {
            name: name.into(),
            columns: vec![Column::key("id", "int32")],
            rows: (0..rows)
                .map(|i| Row::new(vec![Some(FieldValue::Int32(i32::try_from(i).unwrap()))]))
                .collect(),
            ..Table::default()
        }
    }

    #[test]
    fn window_results_keep_input_order() {
        let tables: Vec<Table> = (0..12)
            .map(|i| small(&format!("T{i}"), if i % 3 == 0 { 500 } else { 1 }))
            .collect();
        let types = Vec::new();
        let catalog = TypeCatalog::new(&types);
        let encoded = encode_window(&tables, &catalog, 4).unwrap();
        let names: Vec<_> = encoded.iter().map(EncodedTable::name).collect();
        let expected: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn window_reports_lowest_failing_table() {
        let mut tables: Vec<Table> = (0..8).map(|i| small(&format!("T{i}"), 3)).collect();
        tables[5].columns[0].data_type = "nope".into();
        tables[2].rows[1].fields.push(None);
        let types = Vec::new();
        let catalog = TypeCatalog::new(&types);
        let err = encode_window(&tables, &catalog, 4).unwrap_err();
        assert!(matches!(err, WriteError::RowArityMismatch { ref table, .. } if table == "T2"));
    }

    #[test]
    fn header_is_backpatched_and_cursor_left_at_end() {
        let dataset = Dataset {
            name: "demo".into(),
            tables: vec![small("A", 2), small("B", 0)],
            ..Dataset::default()
        };
        let mut cursor = Cursor::new(vec![0xEE; 3]);
        cursor.seek(SeekFrom::End(0)).unwrap();
        let stats = serialize(&mut cursor, &dataset, &WriterOptions::default()).unwrap();
        let bytes = cursor.get_ref();
        assert_eq!(cursor.position(), 3 + stats.bytes);
        assert_eq!(bytes.len() as u64, 3 + stats.bytes);

        let header: FileHeader = bytemuck::pod_read_unaligned(&bytes[3..3 + FileHeader::SIZE]);
        assert_eq!(header.magic(), PACK_MAGIC);
        assert_eq!(header.table_count(), 2);
        assert_eq!(header.index_off(), FileHeader::SIZE as u64);
        assert_eq!(header.tables_off(), FileHeader::SIZE as u64 + 32);
        assert_eq!(stats.rows, 2);
    }

    #[test]
    fn failed_write_file_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pack");
        let mut bad = small("Bad", 1);
        bad.columns[0].data_type = "nope".into();
        let dataset = Dataset {
            tables: vec![bad],
            ..Dataset::default()
        };
        assert!(write_file(&path, &dataset, &WriterOptions::default()).is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn temp_siblings_differ_per_call() {
        let path = Path::new("/data/out.pack");
        let first = temp_sibling(path);
        let second = temp_sibling(path);
        assert_ne!(first, second);
        assert_eq!(first.parent(), path.parent());
        let name = first.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("out.pack."), "{name}");
        assert!(name.ends_with(".tmp"), "{name}");
    }

    #[test]
    fn concurrent_writes_to_one_path_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.pack");
        let datasets: Vec<Dataset> = (0..4)
            .map(|i| Dataset {
                tables: vec![small("T", 50 + i)],
                ..Dataset::default()
            })
            .collect();
        let expected: Vec<Vec<u8>> = datasets
            .iter()
            .map(|d| to_bytes(d, &WriterOptions::sequential()).unwrap())
            .collect();

        std::thread::scope(|s| {
            for dataset in &datasets {
                let path = &path;
                s.spawn(move || {
                    write_file(path, dataset, &WriterOptions::sequential()).unwrap();
                });
            }
        });

        let on_disk = fs::read(&path).unwrap();
        assert!(expected.contains(&on_disk));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
