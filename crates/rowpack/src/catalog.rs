// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Custom enum/flag types and the catalog used to resolve column types.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// One named value of a custom type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMember {
    /// Member name as it appears in field text.
    pub name: String,
    /// Underlying value.
    pub value: i64,
}

impl TypeMember {
    /// Creates a member.
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Errors converting between a custom type's text and its value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// The text held no member names.
    #[error("empty value for type `{type_path}`")]
    EmptyText {
        /// Path of the type.
        type_path: String,
    },
    /// A name in the text is not a member of the type.
    #[error("`{member}` is not a member of type `{type_path}`")]
    UnknownMember {
        /// Path of the type.
        type_path: String,
        /// The unrecognised name.
        member: String,
    },
    /// A value cannot be expressed with the type's members.
    #[error("value {value} has no representation in type `{type_path}`")]
    UnknownValue {
        /// Path of the type.
        type_path: String,
        /// The unrepresentable value.
        value: i64,
    },
}

/// A named custom value domain (enum, or flags when `is_flag` is set).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataType {
    /// Type name.
    pub name: String,
    /// Category path, e.g. `/enums/`. Joined with `name` to form the path
    /// columns refer to.
    pub category_path: String,
    /// Whether text may combine several members.
    pub is_flag: bool,
    /// Members in declaration order.
    pub members: Vec<TypeMember>,
}

impl DataType {
    /// Path columns use to refer to this type.
    pub fn path(&self) -> String {
        format!("{}{}", self.category_path, self.name)
    }

    /// Converts field text into the underlying value.
    ///
    /// Enum text is a single member name. Flag text is a whitespace-separated
    /// list of member names whose values are OR-ed together.
    pub fn convert_from_str(&self, text: &str) -> Result<i64, ConversionError> {
        let mut names = text.split_whitespace();
        let first = names.next().ok_or_else(|| ConversionError::EmptyText {
            type_path: self.path(),
        })?;
        let mut value = self.member_value(first)?;
        if self.is_flag {
            for name in names {
                value |= self.member_value(name)?;
            }
        } else if let Some(extra) = names.next() {
            return Err(ConversionError::UnknownMember {
                type_path: self.path(),
                member: format!("{first} {extra}"),
            });
        }
        Ok(value)
    }

    /// Converts an underlying value back into field text.
    pub fn convert_to_string(&self, value: i64) -> Result<String, ConversionError> {
        if let Some(member) = self.members.iter().find(|m| m.value == value) {
            return Ok(member.name.clone());
        }
        if self.is_flag && value != 0 {
            let mut rest = value;
            let mut names = Vec::new();
            for member in &self.members {
                if member.value != 0 && value & member.value == member.value {
                    names.push(member.name.as_str());
                    rest &= !member.value;
                }
            }
            if rest == 0 {
                return Ok(names.join(" "));
            }
        }
        Err(ConversionError::UnknownValue {
            type_path: self.path(),
            value,
        })
    }

    fn member_value(&self, name: &str) -> Result<i64, ConversionError> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value)
            .ok_or_else(|| ConversionError::UnknownMember {
                type_path: self.path(),
                member: name.to_owned(),
            })
    }
}

/// Index of a type inside a [`TypeCatalog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeHandle(usize);

/// Path-indexed view over a dataset's custom types.
#[derive(Debug)]
pub struct TypeCatalog<'a> {
    types: &'a [DataType],
    by_path: FxHashMap<String, TypeHandle>,
}

impl<'a> TypeCatalog<'a> {
    /// Indexes `types` by path. The first type wins on duplicate paths.
    pub fn new(types: &'a [DataType]) -> Self {
        let mut by_path = FxHashMap::default();
        for (ix, ty) in types.iter().enumerate() {
            by_path.entry(ty.path()).or_insert(TypeHandle(ix));
        }
        Self { types, by_path }
    }

    /// Looks up a type by path.
    pub fn resolve(&self, path: &str) -> Option<TypeHandle> {
        self.by_path.get(path).copied()
    }

    /// Returns the type behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` came from a different catalog.
    pub fn get(&self, handle: TypeHandle) -> &'a DataType {
        &self.types[handle.0]
    }

    /// Number of indexed types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// True if the catalog has no types.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn color() -> DataType {
        DataType {
            name: "Color".into(),
            category_path: "/enums/".into(),
            is_flag: false,
            members: vec![
                TypeMember::new("Red", 0),
                TypeMember::new("Green", 1),
                TypeMember::new("Blue", 2),
            ],
        }
    }

    fn access() -> DataType {
        DataType {
            name: "Access".into(),
            category_path: "/flags/".into(),
            is_flag: true,
            members: vec![
                TypeMember::new("None", 0),
                TypeMember::new("Read", 1),
                TypeMember::new("Write", 2),
                TypeMember::new("Exec", 4),
            ],
        }
    }

    #[test]
    fn enum_text_maps_to_member_value() {
        let ty = color();
        assert_eq!(ty.convert_from_str("Blue").unwrap(), 2);
        assert_eq!(ty.convert_to_string(1).unwrap(), "Green");
        assert!(matches!(
            ty.convert_from_str("Purple"),
            Err(ConversionError::UnknownMember { .. })
        ));
        assert!(matches!(
            ty.convert_from_str("Red Blue"),
            Err(ConversionError::UnknownMember { .. })
        ));
        assert!(matches!(
            ty.convert_from_str("  "),
            Err(ConversionError::EmptyText { .. })
        ));
    }

    #[test]
    fn flag_text_combines_members() {
        let ty = access();
        assert_eq!(ty.convert_from_str("Read Exec").unwrap(), 5);
        assert_eq!(ty.convert_to_string(5).unwrap(), "Read Exec");
        assert_eq!(ty.convert_to_string(0).unwrap(), "None");
        assert_eq!(ty.convert_to_string(2).unwrap(), "Write");
        assert!(matches!(
            ty.convert_to_string(8),
            Err(ConversionError::UnknownValue { value: 8, .. })
        ));
    }

    #[test]
    fn catalog_resolves_by_full_path() {
        let types = vec![color(), access()];
        let catalog = TypeCatalog::new(&types);
        let handle = catalog.resolve("/flags/Access").unwrap();
        assert_eq!(catalog.get(handle).name, "Access");
        assert!(catalog.resolve("Access").is_none());
        assert_eq!(catalog.len(), 2);
    }
}
