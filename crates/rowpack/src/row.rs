// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Row encoding: length prefix, per-column offset directory, dense field data.

use crate::buffer::PatchBuffer;
use crate::catalog::TypeCatalog;
use crate::error::FieldError;
use crate::field::{encode_field, FieldKind};
use crate::layout::{ROW_LEN_SIZE, ROW_SLOT_SIZE};
use crate::model::Row;
use crate::strings::StringInterner;

/// Failures local to one row.
#[derive(Debug)]
pub(crate) enum RowError {
    Arity { found: usize },
    Field { column: usize, error: FieldError },
    TooLarge,
}

/// Appends one row to `buf`.
///
/// The directory holds, per column, the offset of the field measured from the
/// start of the directory, or `0` when the field is absent. Present fields
/// follow the directory in column order with no padding.
pub(crate) fn write_row(
    buf: &mut PatchBuffer,
    row: &Row,
    kinds: &[FieldKind],
    strings: &mut StringInterner,
    catalog: &TypeCatalog<'_>,
) -> Result<(), RowError> {
    if row.fields.len() != kinds.len() {
        return Err(RowError::Arity {
            found: row.fields.len(),
        });
    }

    let len_pos = buf.reserve_u32s(1);
    let dir_pos = buf.reserve_u32s(kinds.len());
    debug_assert_eq!(dir_pos, len_pos + ROW_LEN_SIZE);

    for (column, (field, kind)) in row.fields.iter().zip(kinds).enumerate() {
        let Some(value) = field else {
            continue;
        };
        let rel = u32::try_from(buf.len() - dir_pos).map_err(|_| RowError::TooLarge)?;
        buf.patch_u32(dir_pos + column * ROW_SLOT_SIZE, rel);
        encode_field(buf, *kind, value, strings, catalog)
            .map_err(|error| RowError::Field { column, error })?;
    }

    let row_len = u32::try_from(buf.len() - dir_pos).map_err(|_| RowError::TooLarge)?;
    buf.patch_u32(len_pos, row_len);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::DataType;
    use crate::model::FieldValue;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes
            .chunks(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn directory_points_past_itself() {
        let types: Vec<DataType> = Vec::new();
        let catalog = TypeCatalog::new(&types);
        let mut strings = StringInterner::new();
        let mut buf = PatchBuffer::new();
        let row = Row::new(vec![
            Some(FieldValue::Int32(7)),
            None,
            Some(FieldValue::String("Ann".into())),
        ]);
        let kinds = [FieldKind::Int32, FieldKind::String, FieldKind::String];
        write_row(&mut buf, &row, &kinds, &mut strings, &catalog).unwrap();

        let w = words(buf.as_bytes());
        // len, 3 slots, int32, string id
        assert_eq!(w, vec![20, 12, 0, 16, 7, 1]);
        assert_eq!(strings.get(crate::strings::StringId(1)), Some("Ann"));
    }

    #[test]
    fn all_absent_row_is_only_a_directory() {
        let types: Vec<DataType> = Vec::new();
        let catalog = TypeCatalog::new(&types);
        let mut strings = StringInterner::new();
        let mut buf = PatchBuffer::new();
        let row = Row::new(vec![None, None]);
        write_row(
            &mut buf,
            &row,
            &[FieldKind::Double, FieldKind::Guid],
            &mut strings,
            &catalog,
        )
        .unwrap();
        assert_eq!(words(buf.as_bytes()), vec![8, 0, 0]);
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let types: Vec<DataType> = Vec::new();
        let catalog = TypeCatalog::new(&types);
        let mut strings = StringInterner::new();
        let mut buf = PatchBuffer::new();
        let row = Row::new(vec![None]);
        let err = write_row(
            &mut buf,
            &row,
            &[FieldKind::Int8, FieldKind::Int8],
            &mut strings,
            &catalog,
        )
        .unwrap_err();
        assert!(matches!(err, RowError::Arity { found: 1 }));
    }
}
