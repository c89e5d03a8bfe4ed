// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canned datasets and custom types.

use rowpack::{DataType, Dataset, FieldValue, Table, TypeMember};
use time::macros::datetime;
use time::Duration;
use uuid::Uuid;

use crate::builders::{DatasetBuilder, TableBuilder};

/// Every primitive type name, followed by the two custom type paths used by
/// [`all_kinds_table`].
pub const ALL_KIND_NAMES: [&str; 17] = [
    "boolean",
    "string",
    "float",
    "double",
    "int8",
    "uint8",
    "int16",
    "uint16",
    "int32",
    "uint32",
    "int64",
    "uint64",
    "datetime",
    "duration",
    "guid",
    "/enums/Color",
    "/flags/Access",
];

/// Enum type `/enums/Color` with members Red=0, Green=1, Blue=2.
pub fn color_type() -> DataType {
    DataType {
        name: "Color".to_owned(),
        category_path: "/enums/".to_owned(),
        is_flag: false,
        members: vec![
            TypeMember::new("Red", 0),
            TypeMember::new("Green", 1),
            TypeMember::new("Blue", 2),
        ],
    }
}

/// Flag type `/flags/Access` with members None=0, Read=1, Write=2, Exec=4.
pub fn access_type() -> DataType {
    DataType {
        name: "Access".to_owned(),
        category_path: "/flags/".to_owned(),
        is_flag: true,
        members: vec![
            TypeMember::new("None", 0),
            TypeMember::new("Read", 1),
            TypeMember::new("Write", 2),
            TypeMember::new("Exec", 4),
        ],
    }
}

/// The `Users` table (`id:int32` key, `name:string`, `joined:datetime`)
/// with two rows; row 2 has no name.
pub fn users_dataset() -> Dataset {
    DatasetBuilder::new("accounts")
        .table(
            TableBuilder::new("Users")
                .key("id", "int32")
                .column("name", "string")
                .column("joined", "datetime")
                .row([
                    Some(FieldValue::Int32(1)),
                    Some("Ann".into()),
                    Some(FieldValue::DateTime(datetime!(2024-01-01 0:00 UTC))),
                ])
                .row([
                    Some(FieldValue::Int32(2)),
                    None,
                    Some(FieldValue::DateTime(datetime!(2024-01-02 0:00 UTC))),
                ])
                .build(),
        )
        .build()
}

/// A table with one column per entry of [`ALL_KIND_NAMES`], holding a fully
/// populated row, an all-absent row and a row of extreme values. Values
/// survive a write/decode round trip unchanged.
pub fn all_kinds_table() -> Table {
    let mut builder = TableBuilder::new("Kinds").category("/test/");
    for (ix, name) in ALL_KIND_NAMES.iter().enumerate() {
        let column = format!("c{ix}_{}", name.trim_start_matches('/').replace('/', "_"));
        builder = if ix == 8 {
            builder.key(&column, name)
        } else {
            builder.column(&column, name)
        };
    }
    builder
        .row([
            Some(FieldValue::Bool(true)),
            Some("line one\nline two".into()),
            Some(FieldValue::Float(1.5)),
            Some(FieldValue::Double(-2.25)),
            Some(FieldValue::Int8(-8)),
            Some(FieldValue::UInt8(200)),
            Some(FieldValue::Int16(-1600)),
            Some(FieldValue::UInt16(60000)),
            Some(FieldValue::Int32(1)),
            Some(FieldValue::UInt32(3_000_000_000)),
            Some(FieldValue::Int64(-64)),
            Some(FieldValue::UInt64(1 << 63)),
            Some(FieldValue::DateTime(datetime!(2023-06-15 12:30:45 UTC))),
            Some(FieldValue::Duration(Duration::new(3723, 400))),
            Some(FieldValue::Guid(Uuid::from_u128(
                0x0011_2233_4455_6677_8899_aabb_ccdd_eeff,
            ))),
            Some("Blue".into()),
            Some("Read Write".into()),
        ])
        .row(std::iter::repeat_n(None, ALL_KIND_NAMES.len()))
        .row([
            Some(FieldValue::Bool(false)),
            Some(String::new().into()),
            Some(FieldValue::Float(f32::MIN_POSITIVE)),
            Some(FieldValue::Double(f64::MAX)),
            Some(FieldValue::Int8(i8::MIN)),
            Some(FieldValue::UInt8(u8::MAX)),
            Some(FieldValue::Int16(i16::MIN)),
            Some(FieldValue::UInt16(u16::MAX)),
            Some(FieldValue::Int32(i32::MAX)),
            Some(FieldValue::UInt32(u32::MAX)),
            Some(FieldValue::Int64(i64::MIN)),
            Some(FieldValue::UInt64(u64::MAX)),
            Some(FieldValue::DateTime(datetime!(1960-02-29 23:59:59 UTC))),
            Some(FieldValue::Duration(Duration::new(-5, -100))),
            Some(FieldValue::Guid(Uuid::nil())),
            Some("Red".into()),
            Some("None".into()),
        ])
        .build()
}

/// Two tables that both carry a `comment` column containing `"n/a"`.
pub fn comments_dataset() -> Dataset {
    let table = |name: &str, id: i32| {
        TableBuilder::new(name)
            .key("id", "int32")
            .column("comment", "string")
            .row([Some(FieldValue::Int32(id)), Some("n/a".into())])
            .build()
    };
    DatasetBuilder::new("notes")
        .table(table("Alpha", 1))
        .table(table("Beta", 2))
        .build()
}

/// `count` tables whose row counts vary widely, so that parallel workers
/// finish out of order. Each table repeats strings from its neighbours.
pub fn skewed_dataset(count: usize) -> Dataset {
    let mut builder = DatasetBuilder::new("skewed").data_type(color_type());
    for t in 0..count {
        let rows = if t % 4 == 0 { 400 } else { t % 3 };
        let table = TableBuilder::new(&format!("T{t:03}"))
            .key("id", "int64")
            .column("label", "string")
            .column("color", "/enums/Color")
            .rows_with(rows, |r| {
                vec![
                    Some(FieldValue::Int64(i64::try_from(r).unwrap_or(i64::MAX))),
                    Some(format!("label-{}", (r + t) % 7).into()),
                    (r % 2 == 0).then(|| ["Red", "Green", "Blue"][r % 3].into()),
                ]
            })
            .build();
        builder = builder.table(table);
    }
    builder.build()
}

/// All fixture types, for datasets that mix [`all_kinds_table`] with others.
pub fn fixture_types() -> Vec<DataType> {
    vec![color_type(), access_type()]
}
