// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

#![allow(missing_docs)]
use rowpack::{
    decode, to_bytes, FieldKind, FieldValue, PackFile, TypeCatalog, WriteError, WriterOptions,
};
use rowpack_dry_tests::{DatasetBuilder, TableBuilder};
use time::macros::datetime;
use time::Duration;

fn single(kind: &str, value: FieldValue) -> rowpack::Dataset {
    DatasetBuilder::new("t")
        .table(TableBuilder::new("T").column("v", kind).row([Some(value)]).build())
        .build()
}

fn raw_field(dataset: &rowpack::Dataset, width: usize) -> Vec<u8> {
    let bytes = to_bytes(dataset, &WriterOptions::default()).expect("write");
    let file = PackFile::from_bytes(bytes).expect("open");
    let table = file.table(0).expect("table");
    let row = table.row(0).expect("row");
    row.field_bytes(0, width)
        .expect("bytes")
        .expect("present")
        .to_vec()
}

#[test]
fn datetime_drops_sub_second_part() {
    let precise = datetime!(2024-03-10 08:15:30.987_654 UTC);
    let dataset = single("datetime", FieldValue::DateTime(precise));
    let raw = raw_field(&dataset, 8);
    assert_eq!(
        i64::from_le_bytes(raw.try_into().expect("8 bytes")),
        precise.unix_timestamp()
    );

    let decoded = decode(
        &to_bytes(&dataset, &WriterOptions::default()).expect("write"),
        &[],
    )
    .expect("decode");
    assert_eq!(
        decoded.tables[0].rows[0].fields[0],
        Some(FieldValue::DateTime(datetime!(2024-03-10 08:15:30 UTC)))
    );
}

#[test]
fn pre_epoch_datetime_truncates_toward_zero() {
    let dataset = single(
        "datetime",
        FieldValue::DateTime(datetime!(1969-12-31 23:59:58.75 UTC)),
    );
    let raw = raw_field(&dataset, 8);
    assert_eq!(i64::from_le_bytes(raw.try_into().expect("8 bytes")), -1);
}

#[test]
fn duration_is_stored_in_100ns_ticks() {
    let exact = Duration::seconds(1) + Duration::nanoseconds(200);
    let dataset = single("duration", FieldValue::Duration(exact));
    let raw = raw_field(&dataset, 8);
    assert_eq!(i64::from_le_bytes(raw.try_into().expect("8 bytes")), 10_000_002);

    let bytes = to_bytes(&dataset, &WriterOptions::default()).expect("write");
    let file = PackFile::from_bytes(bytes.clone()).expect("open");
    let value = file
        .table(0)
        .expect("table")
        .row(0)
        .expect("row")
        .value(0, FieldKind::Duration, &TypeCatalog::new(&[]))
        .expect("value");
    assert_eq!(value, Some(FieldValue::Duration(exact)));
    assert_eq!(decode(&bytes, &[]).expect("decode"), dataset);
}

#[test]
fn whole_tick_durations_round_trip() {
    for nanos in [0, 100, -100, 9_999_999_900, -86_400_000_000_000] {
        let dataset = single("duration", FieldValue::Duration(Duration::nanoseconds(nanos)));
        let bytes = to_bytes(&dataset, &WriterOptions::default()).expect("write");
        assert_eq!(decode(&bytes, &[]).expect("decode"), dataset, "{nanos} ns");
    }
}

#[test]
fn sub_tick_duration_is_refused() {
    let dataset = single("duration", FieldValue::Duration(Duration::nanoseconds(150)));
    let err = to_bytes(&dataset, &WriterOptions::default()).expect_err("must fail");
    assert!(matches!(
        err,
        WriteError::FieldPrecisionLoss { ref table, row: 0, ref column, remainder_nanos: 50 }
            if table == "T" && column == "v"
    ));
}

#[test]
fn out_of_range_duration_is_an_overflow() {
    let dataset = single("duration", FieldValue::Duration(Duration::MAX));
    let err = to_bytes(&dataset, &WriterOptions::default()).expect_err("must fail");
    assert!(matches!(
        err,
        WriteError::FieldOverflow { ref table, row: 0, ref column } if table == "T" && column == "v"
    ));
}

#[test]
fn guid_bytes_use_mixed_endian_layout() {
    let id = uuid::Uuid::parse_str("00112233-4455-6677-8899-aabbccddeeff").expect("uuid");
    let dataset = single("guid", FieldValue::Guid(id));
    let raw = raw_field(&dataset, 16);
    assert_eq!(&raw[..4], &[0x33u8, 0x22, 0x11, 0x00]);
    assert_eq!(&raw[8..], &[0x88u8, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
}
