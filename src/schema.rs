use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TableError;
use crate::value::DataType;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column list. Derived schemas may repeat a name (a column projected
/// twice); lookups resolve to the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Index of `name`, or `UnknownColumn`.
    pub fn resolve(&self, name: &str) -> Result<usize, TableError> {
        self.index_of(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    /// Resolves every name in order, failing on the first one missing.
    pub fn resolve_all(&self, names: &[String]) -> Result<Vec<usize>, TableError> {
        names.iter().map(|name| self.resolve(name)).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// First header name that appears more than once.
    pub fn first_duplicate(&self) -> Option<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .map(|f| f.name.as_str())
            .find(|name| !seen.insert(*name))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .fields
            .iter()
            .map(|field| format!("{}: {}", field.name, field.data_type))
            .collect::<Vec<_>>();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sample() -> Schema {
        Schema::new(vec![
            Field::new("gene", DataType::String),
            Field::new("pos", DataType::Integer),
        ])
    }

    #[test]
    fn resolve_reports_first_missing() {
        let schema = sample();
        let names = vec!["pos".to_string(), "chrom".to_string(), "ref".to_string()];
        let err = schema.resolve_all(&names).unwrap_err();
        assert_matches!(err, TableError::UnknownColumn(name) if name == "chrom");
    }

    #[test]
    fn detects_duplicate_names() {
        let mut schema = sample();
        assert_eq!(schema.first_duplicate(), None);
        schema.fields.push(Field::new("gene", DataType::String));
        assert_eq!(schema.first_duplicate(), Some("gene"));
    }

    #[test]
    fn display_lists_types() {
        assert_eq!(sample().to_string(), "{gene: str, pos: i64}");
    }
}
