// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dataset and table builders for tests.

use rowpack::{Column, DataType, Dataset, FieldValue, Row, Table, Tags};

/// Builder for creating [`Table`] instances in tests.
///
/// # Example
///
/// ```
/// use rowpack::FieldValue;
/// use rowpack_dry_tests::TableBuilder;
///
/// let table = TableBuilder::new("Users")
///     .key("id", "int32")
///     .column("name", "string")
///     .row([Some(FieldValue::Int32(1)), Some("Ann".into())])
///     .build();
///
/// assert_eq!(table.columns.len(), 2);
/// assert_eq!(table.rows.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    /// Create a builder for an empty table in category `/`.
    pub fn new(name: &str) -> Self {
        Self {
            table: Table {
                name: name.to_owned(),
                category_path: "/".to_owned(),
                hash_value: format!("hash-{name}"),
                ..Table::default()
            },
        }
    }

    /// Set the category path.
    pub fn category(mut self, path: &str) -> Self {
        self.table.category_path = path.to_owned();
        self
    }

    /// Set the content hash.
    pub fn hash(mut self, hash: &str) -> Self {
        self.table.hash_value = hash.to_owned();
        self
    }

    /// Set the table tags.
    pub fn tags(mut self, tags: Tags) -> Self {
        self.table.tags = tags;
        self
    }

    /// Add a non-key column.
    pub fn column(mut self, name: &str, data_type: &str) -> Self {
        self.table.columns.push(Column::new(name, data_type));
        self
    }

    /// Add a key column.
    pub fn key(mut self, name: &str, data_type: &str) -> Self {
        self.table.columns.push(Column::key(name, data_type));
        self
    }

    /// Add a column with explicit tags.
    pub fn tagged_column(mut self, name: &str, data_type: &str, tags: Tags) -> Self {
        self.table
            .columns
            .push(Column::new(name, data_type).with_tags(tags));
        self
    }

    /// Add a row.
    pub fn row(mut self, fields: impl IntoIterator<Item = Option<FieldValue>>) -> Self {
        self.table.rows.push(Row::new(fields.into_iter().collect()));
        self
    }

    /// Add `count` rows produced by `make`.
    pub fn rows_with(
        mut self,
        count: usize,
        mut make: impl FnMut(usize) -> Vec<Option<FieldValue>>,
    ) -> Self {
        self.table
            .rows
            .extend((0..count).map(|ix| Row::new(make(ix))));
        self
    }

    /// Build the table.
    pub fn build(self) -> Table {
        self.table
    }
}

/// Builder for creating [`Dataset`] instances in tests.
///
/// # Example
///
/// ```
/// use rowpack_dry_tests::{DatasetBuilder, TableBuilder};
///
/// let dataset = DatasetBuilder::new("game")
///     .revision("r7")
///     .table(TableBuilder::new("Empty").column("x", "int8").build())
///     .build();
///
/// assert_eq!(dataset.revision, "r7");
/// assert_eq!(dataset.tables.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DatasetBuilder {
    dataset: Dataset,
}

impl DatasetBuilder {
    /// Create a builder with placeholder revision and hashes.
    pub fn new(name: &str) -> Self {
        Self {
            dataset: Dataset {
                name: name.to_owned(),
                revision: "1".to_owned(),
                types_hash: "types-hash".to_owned(),
                tables_hash: "tables-hash".to_owned(),
                ..Dataset::default()
            },
        }
    }

    /// Set the revision.
    pub fn revision(mut self, revision: &str) -> Self {
        self.dataset.revision = revision.to_owned();
        self
    }

    /// Set the dataset tags.
    pub fn tags(mut self, tags: Tags) -> Self {
        self.dataset.tags = tags;
        self
    }

    /// Add a custom type.
    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.dataset.types.push(data_type);
        self
    }

    /// Add a table.
    pub fn table(mut self, table: Table) -> Self {
        self.dataset.tables.push(table);
        self
    }

    /// Build the dataset.
    pub fn build(self) -> Dataset {
        self.dataset
    }
}
