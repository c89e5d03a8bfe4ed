// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared fixtures and builders for rowpack tests.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`builders`] - Dataset and table builders
//! - [`fixtures`] - Canned datasets and custom types

pub mod builders;
pub mod fixtures;

pub use builders::{DatasetBuilder, TableBuilder};
pub use fixtures::{
    access_type, all_kinds_table, color_type, comments_dataset, fixture_types, skewed_dataset,
    users_dataset, ALL_KIND_NAMES,
};
