// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! End-to-end export scenarios checked through the reader views.

#![allow(missing_docs)]
use rowpack::layout::ABSENT_SLOT;
use rowpack::{
    decode, to_bytes, validate_pack, FieldKind, FieldValue, PackFile, StringId, Tags,
    TypeCatalog, WriterOptions,
};
use rowpack_dry_tests::{comments_dataset, skewed_dataset, users_dataset, TableBuilder};

const WORKER_COUNTS: &[usize] = &[1, 2, 4, 8];

fn count_of(file: &PackFile, text: &str) -> usize {
    file.strings().iter().filter(|s| s.as_str() == text).count()
}

#[test]
fn users_table_layout() {
    let dataset = users_dataset();
    let bytes = to_bytes(&dataset, &WriterOptions::default()).expect("write");
    let file = PackFile::from_bytes(bytes).expect("open");
    validate_pack(&file).expect("valid");

    assert_eq!(file.name(), "accounts");
    assert_eq!(file.table_count(), 1);
    assert_eq!(file.string(file.table_index()[0].name()), Some("Users"));

    let users = file.table_by_name("Users").expect("table");
    assert_eq!(users.row_count(), 2);
    let names: Vec<_> = users.columns().iter().map(|c| c.name).collect();
    assert_eq!(names, ["id", "name", "joined"]);
    assert!(users.columns()[0].is_key());
    assert!(!users.columns()[1].is_key());

    let second = users.row(1).expect("row");
    assert_eq!(second.slot(1).expect("slot"), ABSENT_SLOT);
    assert_ne!(second.slot(2).expect("slot"), ABSENT_SLOT);

    let catalog = TypeCatalog::new(&[]);
    let first = users.row(0).expect("row");
    assert_eq!(
        first.value(1, FieldKind::String, &catalog).expect("value"),
        Some(FieldValue::String("Ann".into()))
    );

    for text in ["Users", "id", "name", "joined", "Ann"] {
        assert_eq!(count_of(&file, text), 1, "{text}");
    }
    assert_eq!(file.string(StringId::EMPTY), Some(""));
}

#[test]
fn shared_text_across_tables_gets_one_id() {
    let dataset = comments_dataset();
    let bytes = to_bytes(&dataset, &WriterOptions::default().with_workers(2)).expect("write");
    let file = PackFile::from_bytes(bytes).expect("open");
    validate_pack(&file).expect("valid");
    assert_eq!(count_of(&file, "n/a"), 1);
    assert_eq!(count_of(&file, "comment"), 1);

    let catalog = TypeCatalog::new(&[]);
    let ids: Vec<_> = ["Alpha", "Beta"]
        .iter()
        .map(|name| {
            let table = file.table_by_name(name).expect("table");
            let raw = table
                .row(0)
                .expect("row")
                .field_bytes(1, FieldKind::String.width())
                .expect("bytes")
                .expect("present");
            assert_eq!(
                table.row(0).expect("row").value(1, FieldKind::String, &catalog).expect("value"),
                Some(FieldValue::String("n/a".into()))
            );
            u32::from_le_bytes(raw.try_into().expect("4 bytes"))
        })
        .collect();
    assert_eq!(ids[0], ids[1]);

    let alpha = file.table_by_name("Alpha").expect("table");
    let local: Vec<_> = alpha
        .string_entries()
        .expect("entries")
        .into_iter()
        .map(|e| e.text)
        .collect();
    assert!(local.contains(&"n/a"));
    assert!(local.contains(&"Alpha"));
}

#[test]
fn output_is_identical_for_any_worker_count_and_window() {
    let dataset = skewed_dataset(23);
    let baseline = to_bytes(&dataset, &WriterOptions::sequential()).expect("write");
    validate_pack(&PackFile::from_bytes(baseline.clone()).expect("open")).expect("valid");

    for &workers in WORKER_COUNTS {
        for window in [1, 3, 16, 64] {
            let options = WriterOptions::default()
                .with_workers(workers)
                .with_max_in_flight(window);
            let bytes = to_bytes(&dataset, &options).expect("write");
            assert!(
                bytes == baseline,
                "output differs for {workers} workers, window {window}"
            );
        }
    }
}

#[test]
fn tables_keep_input_order() {
    let dataset = skewed_dataset(17);
    let bytes = to_bytes(&dataset, &WriterOptions::default().with_workers(8)).expect("write");
    let file = PackFile::from_bytes(bytes.clone()).expect("open");

    let names: Vec<_> = file
        .table_index()
        .iter()
        .map(|entry| file.string(entry.name()).expect("name").to_owned())
        .collect();
    let expected: Vec<_> = dataset.tables.iter().map(|t| t.name.clone()).collect();
    assert_eq!(names, expected);

    let offsets: Vec<_> = file.table_index().iter().map(|e| e.offset()).collect();
    assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(decode(&bytes, &dataset.types).expect("decode"), dataset);
}

#[test]
fn filtered_export_only_carries_visible_columns() {
    let dataset = rowpack_dry_tests::DatasetBuilder::new("tagged")
        .table(
            TableBuilder::new("Items")
                .key("id", "int32")
                .tagged_column("secret", "string", Tags::SERVER)
                .tagged_column("icon", "string", Tags::CLIENT)
                .row([
                    Some(FieldValue::Int32(1)),
                    Some("server-only".into()),
                    Some("sword.png".into()),
                ])
                .build(),
        )
        .table(
            TableBuilder::new("Spawns")
                .tags(Tags::SERVER)
                .column("x", "float")
                .build(),
        )
        .build();

    let client = dataset.filter_by_tags(Tags::CLIENT);
    let bytes = to_bytes(&client, &WriterOptions::default()).expect("write");
    let file = PackFile::from_bytes(bytes).expect("open");
    validate_pack(&file).expect("valid");

    assert_eq!(file.tags(), Tags::CLIENT);
    assert_eq!(file.table_count(), 1);
    assert_eq!(count_of(&file, "server-only"), 0);
    assert_eq!(count_of(&file, "secret"), 0);
    assert_eq!(count_of(&file, "sword.png"), 1);
}
