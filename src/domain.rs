use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TableError;

/// Single-byte field separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Delimiter(u8);

impl Delimiter {
    pub const TAB: Delimiter = Delimiter(b'\t');
    pub const COMMA: Delimiter = Delimiter(b',');

    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::TAB
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            b'\t' => write!(f, "\\t"),
            byte => write!(f, "{}", byte as char),
        }
    }
}

impl FromStr for Delimiter {
    type Err = TableError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let byte = match value {
            "\\t" | "tab" | "TAB" => b'\t',
            "comma" => b',',
            "semicolon" => b';',
            "pipe" => b'|',
            "space" => b' ',
            other => {
                let mut bytes = other.bytes();
                match (bytes.next(), bytes.next()) {
                    (Some(byte), None) if byte.is_ascii() && byte != b'\n' && byte != b'\r' => {
                        byte
                    }
                    _ => return Err(TableError::InvalidDelimiter(value.to_string())),
                }
            }
        };
        Ok(Self(byte))
    }
}

impl TryFrom<String> for Delimiter {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Delimiter> for String {
    fn from(value: Delimiter) -> Self {
        value.to_string()
    }
}

/// Ordered, comma-separated column names as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnList(Vec<String>);

impl ColumnList {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ColumnList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

impl FromStr for ColumnList {
    type Err = TableError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let columns = value
            .split(',')
            .map(|name| name.trim().to_string())
            .collect::<Vec<_>>();
        if columns.iter().any(|name| name.is_empty()) {
            return Err(TableError::InvalidColumnList(value.to_string()));
        }
        Ok(Self(columns))
    }
}
