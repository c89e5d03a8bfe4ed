// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! rowpack: binary export of typed relational datasets.
//!
//! A [`Dataset`] of typed tables is written as one file with a header, a
//! table index, self-contained table bodies and a global string block.
//! Rows carry a per-column offset directory, so any field of any row can be
//! reached without scanning its neighbours.
//!
//! ```ignore
//! let bytes = rowpack::to_bytes(&dataset, &WriterOptions::default())?;
//! let file = rowpack::PackFile::from_bytes(bytes)?;
//! rowpack::validate_pack(&file)?;
//! ```
//!
//! Tables are encoded in parallel into private buffers, each with its own
//! string interner, and appended in input order. The bytes produced for a
//! dataset therefore do not depend on thread scheduling.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod buffer;
mod catalog;
mod config;
mod decode;
mod error;
/// Field codec: per-kind widths and encodings.
pub mod field;
/// On-disk record layouts.
pub mod layout;
mod model;
/// Low-level reading helpers.
pub mod read;
mod row;
/// String interning and string blocks.
pub mod strings;
mod table;
mod validate;
/// Structured read access.
pub mod view;
mod write;

pub use catalog::{ConversionError, DataType, TypeCatalog, TypeHandle, TypeMember};
pub use config::{ConfigError, WriterOptions, DEFAULT_MAX_IN_FLIGHT};
pub use decode::decode;
pub use error::WriteError;
pub use field::{FieldDecodeError, FieldKind, TickError};
pub use model::{Column, Dataset, FieldValue, ParseTagsError, Row, Table, Tags};
pub use read::ReadError;
pub use strings::{SharedStringTable, StringId, StringInterner};
pub use table::{encode_table, EncodedTable};
pub use validate::validate_pack;
pub use view::{ColumnView, PackFile, RowView, TableView};
pub use write::{serialize, to_bytes, write_file, PackStats};
