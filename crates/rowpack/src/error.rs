// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Errors raised while writing a pack.

use std::io;

use thiserror::Error;

use crate::catalog::ConversionError;

/// Errors that abort a pack write.
///
/// Every variant except [`WriteError::StreamWriteFailure`] names the table,
/// and where relevant the row and column, that could not be encoded.
#[derive(Debug, Error)]
pub enum WriteError {
    /// A column's declared type is neither a primitive nor a catalog type.
    #[error("table `{table}`, column `{column}`: unsupported field type `{data_type}`")]
    UnsupportedFieldType {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// The unresolved type name.
        data_type: String,
    },

    /// A custom type rejected the field's text.
    #[error("table `{table}`, row {row}, column `{column}`: {source}")]
    InvalidTypeConversion {
        /// Table name.
        table: String,
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
        /// Underlying conversion failure.
        #[source]
        source: ConversionError,
    },

    /// A field value does not match its column's declared type.
    #[error("table `{table}`, row {row}, column `{column}`: expected {expected} value, found {found}")]
    FieldValueMismatch {
        /// Table name.
        table: String,
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
        /// Declared type name.
        expected: String,
        /// Variant name of the supplied value.
        found: &'static str,
    },

    /// A numeric field cannot be represented in its encoded width.
    #[error("table `{table}`, row {row}, column `{column}`: value out of encodable range")]
    FieldOverflow {
        /// Table name.
        table: String,
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
    },

    /// A duration is finer than the 100 ns tick and cannot be stored exactly.
    #[error(
        "table `{table}`, row {row}, column `{column}`: duration has {remainder_nanos} ns below the 100 ns tick"
    )]
    FieldPrecisionLoss {
        /// Table name.
        table: String,
        /// Zero-based row index.
        row: usize,
        /// Column name.
        column: String,
        /// Nanoseconds left over after whole ticks.
        remainder_nanos: i64,
    },

    /// A row does not have exactly one field per column.
    #[error("table `{table}`, row {row}: {found} fields for {expected} columns")]
    RowArityMismatch {
        /// Table name.
        table: String,
        /// Zero-based row index.
        row: usize,
        /// Column count.
        expected: usize,
        /// Field count.
        found: usize,
    },

    /// A section outgrew its 32-bit size or count field.
    #[error("table `{table}`: {section} exceeds the format's 32-bit limit")]
    SectionTooLarge {
        /// Table name, or the dataset name for file-level sections.
        table: String,
        /// Which section overflowed.
        section: &'static str,
    },

    /// The destination rejected a write or seek.
    #[error("stream write failed: {0}")]
    StreamWriteFailure(#[from] io::Error),
}

/// Failures local to one field, given table/row/column context by the
/// table writer.
#[derive(Debug)]
pub(crate) enum FieldError {
    Mismatch { found: &'static str },
    Conversion(ConversionError),
    Overflow,
    SubTick { remainder_nanos: i64 },
}

impl From<crate::field::TickError> for FieldError {
    fn from(err: crate::field::TickError) -> Self {
        match err {
            crate::field::TickError::Overflow => Self::Overflow,
            crate::field::TickError::SubTick { remainder_nanos } => {
                Self::SubTick { remainder_nanos }
            }
        }
    }
}

impl FieldError {
    pub(crate) fn into_write_error(
        self,
        table: &str,
        row: usize,
        column: &crate::model::Column,
    ) -> WriteError {
        let table = table.to_owned();
        let name = column.name.clone();
        match self {
            Self::Mismatch { found } => WriteError::FieldValueMismatch {
                table,
                row,
                column: name,
                expected: column.data_type.clone(),
                found,
            },
            Self::Conversion(source) => WriteError::InvalidTypeConversion {
                table,
                row,
                column: name,
                source,
            },
            Self::Overflow => WriteError::FieldOverflow {
                table,
                row,
                column: name,
            },
            Self::SubTick { remainder_nanos } => WriteError::FieldPrecisionLoss {
                table,
                row,
                column: name,
                remainder_nanos,
            },
        }
    }
}
