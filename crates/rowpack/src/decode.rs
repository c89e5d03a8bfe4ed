// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rebuilds a [`Dataset`] from pack bytes.

use crate::catalog::{DataType, TypeCatalog};
use crate::model::{Column, Dataset, Row, Table, Tags};
use crate::read::ReadError;
use crate::view::{PackFile, TableView};

/// Decodes a pack produced by [`to_bytes`](crate::to_bytes).
///
/// `types` must be the catalog the pack was written with; custom-typed
/// fields are turned back into their textual form through it. Table and
/// column tags are not stored in a pack and come back as [`Tags::ALL`].
pub fn decode(bytes: &[u8], types: &[DataType]) -> Result<Dataset, ReadError> {
    let file = PackFile::from_bytes(bytes.to_vec())?;
    file.to_dataset(types)
}

impl PackFile {
    /// Rebuilds the whole dataset. See [`decode`].
    pub fn to_dataset(&self, types: &[DataType]) -> Result<Dataset, ReadError> {
        let catalog = TypeCatalog::new(types);
        let tables = self
            .tables()
            .map(|view| decode_table(&view?, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Dataset {
            name: self.name().to_owned(),
            revision: self.revision().to_owned(),
            tags: self.tags(),
            types_hash: self.types_hash().to_owned(),
            tables_hash: self.tables_hash().to_owned(),
            tables,
            types: types.to_vec(),
        })
    }
}

fn decode_table(view: &TableView<'_>, catalog: &TypeCatalog<'_>) -> Result<Table, ReadError> {
    let kinds = (0..view.column_count())
        .map(|ix| view.column_kind(ix, catalog))
        .collect::<Result<Vec<_>, _>>()?;
    let columns = view
        .columns()
        .iter()
        .map(|c| Column {
            name: c.name.to_owned(),
            data_type: c.data_type.to_owned(),
            is_key: c.is_key(),
            tags: Tags::ALL,
        })
        .collect();

    let mut rows = Vec::with_capacity(view.row_count());
    for ix in 0..view.row_count() {
        let row = view.row(ix)?;
        let fields = kinds
            .iter()
            .enumerate()
            .map(|(col, kind)| {
                row.value(col, *kind, catalog).map_err(|err| match err {
                    ReadError::Field { source, .. } => ReadError::Field {
                        table: view.name().to_owned(),
                        row: ix,
                        column: view.columns()[col].name.to_owned(),
                        source,
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(Row::new(fields));
    }

    Ok(Table {
        name: view.name().to_owned(),
        category_path: view.category_path().to_owned(),
        hash_value: view.hash_value().to_owned(),
        tags: Tags::ALL,
        columns,
        rows,
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::WriterOptions;
    use crate::model::FieldValue;
    use crate::write::to_bytes;

    #[test]
    fn decode_restores_header_strings() {
        let dataset = Dataset {
            name: "game".into(),
            revision: "r42".into(),
            tags: Tags::SERVER,
            types_hash: "th".into(),
            tables_hash: "tt".into(),
            ..Dataset::default()
        };
        let bytes = to_bytes(&dataset, &WriterOptions::default()).unwrap();
        assert_eq!(decode(&bytes, &[]).unwrap(), dataset);
    }

    #[test]
    fn unknown_custom_type_fails_decode() {
        let dataset = Dataset {
            tables: vec![Table {
                name: "T".into(),
                columns: vec![Column::new("c", "/Color")],
                rows: vec![Row::new(vec![Some(FieldValue::String("Red".into()))])],
                ..Table::default()
            }],
            types: vec![DataType {
                name: "Color".into(),
                category_path: "/".into(),
                members: vec![crate::catalog::TypeMember::new("Red", 1)],
                ..DataType::default()
            }],
            ..Dataset::default()
        };
        let bytes = to_bytes(&dataset, &WriterOptions::default()).unwrap();
        assert_eq!(decode(&bytes, &dataset.types).unwrap(), dataset);
        assert!(matches!(
            decode(&bytes, &[]),
            Err(ReadError::UnsupportedFieldType { .. })
        ));
    }
}
