use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Printed form of a null cell.
pub const NULL_TOKEN: &str = "NULL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
}

impl DataType {
    /// Narrowest type able to hold both `self` and `other`.
    pub fn widen(self, other: DataType) -> DataType {
        use DataType::*;
        match (self, other) {
            (a, b) if a == b => a,
            (Integer, Float) | (Float, Integer) => Float,
            _ => String,
        }
    }

    /// Narrowest type that parses a single raw cell.
    pub fn infer(raw: &str) -> DataType {
        if parse_bool(raw).is_some() {
            DataType::Boolean
        } else if raw.parse::<i64>().is_ok() {
            DataType::Integer
        } else if parse_float(raw).is_some() {
            DataType::Float
        } else {
            DataType::String
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "bool"),
            DataType::Integer => write!(f, "i64"),
            DataType::Float => write!(f, "f64"),
            DataType::String => write!(f, "str"),
        }
    }
}

/// A single cell.
///
/// Equality and hashing are exact per variant, so `Null == Null` holds and two
/// nulls land in the same group. Floats compare by bit pattern for grouping and
/// by `total_cmp` for ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// Parses `raw` as `data_type`, keeping the original text when it does not fit.
    pub fn parse(raw: &str, data_type: DataType) -> Value {
        let typed = match data_type {
            DataType::Boolean => parse_bool(raw).map(Value::Boolean),
            DataType::Integer => raw.parse::<i64>().ok().map(Value::Integer),
            DataType::Float => parse_float(raw).map(Value::Float),
            DataType::String => None,
        };
        typed.unwrap_or_else(|| Value::String(raw.to_string()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Comparison for filters. Integers and floats compare by numeric value,
    /// so `10` equals `10.0`; everything else follows [`Ord`].
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Less)
            }
            (Value::Float(a), Value::Integer(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Greater)
            }
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
            _ => self.cmp(other),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        i64::try_from(value)
            .map(Value::Integer)
            .unwrap_or(Value::Float(value as f64))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(value) => value.hash(state),
            Value::Integer(value) => value.hash(state),
            Value::Float(value) => value.to_bits().hash(state),
            Value::String(value) => value.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Mixed numerics compare by magnitude; integers sort first on a tie.
            (Value::Integer(a), Value::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Value::Float(a), Value::Integer(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "{NULL_TOKEN}"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) if value.is_finite() && value.abs() >= 1e15 => {
                write!(f, "{value:e}")
            }
            Value::Float(value) if value.is_finite() && value.fract() == 0.0 => {
                write!(f, "{value:.1}")
            }
            Value::Float(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value}"),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    if raw.eq_ignore_ascii_case("true") {
        Some(true)
    } else if raw.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// Rust accepts "inf"/"nan" spellings; a table cell saying "nan" is text, not a float.
fn parse_float(raw: &str) -> Option<f64> {
    let looks_numeric = raw
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'));
    if !looks_numeric {
        return None;
    }
    raw.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn infer_and_widen() {
        assert_eq!(DataType::infer("42"), DataType::Integer);
        assert_eq!(DataType::infer("-4.5e3"), DataType::Float);
        assert_eq!(DataType::infer("True"), DataType::Boolean);
        assert_eq!(DataType::infer("nan"), DataType::String);
        assert_eq!(DataType::infer("rs123"), DataType::String);
        assert_eq!(DataType::Integer.widen(DataType::Float), DataType::Float);
        assert_eq!(DataType::Boolean.widen(DataType::Integer), DataType::String);
    }

    #[test]
    fn parse_falls_back_to_text() {
        assert_eq!(Value::parse("7", DataType::Integer), Value::Integer(7));
        assert_eq!(Value::parse("NA", DataType::Integer), Value::from("NA"));
        assert_eq!(Value::parse("1", DataType::Float), Value::Float(1.0));
    }

    #[test]
    fn nulls_group_together() {
        let set: HashSet<Value> = [Value::Null, Value::Null, Value::Integer(1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn ordering_across_variants() {
        let mut values = vec![
            Value::from("b"),
            Value::Float(1.5),
            Value::Null,
            Value::Integer(2),
            Value::Integer(1),
            Value::Boolean(true),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(1),
                Value::Float(1.5),
                Value::Integer(2),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn compare_treats_mixed_numerics_as_numbers() {
        assert_eq!(Value::Float(10.0).compare(&Value::Integer(10)), Ordering::Equal);
        assert_eq!(Value::Integer(7).compare(&Value::Float(7.5)), Ordering::Less);
        assert_eq!(Value::Float(-0.0).compare(&Value::Integer(0)), Ordering::Equal);
        assert_eq!(Value::from("a").compare(&Value::Integer(1)), Ordering::Greater);
        // Sorting still keeps the two spellings apart.
        assert_eq!(Value::Integer(10).cmp(&Value::Float(10.0)), Ordering::Less);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::Float(0.25).to_string(), "0.25");
        assert_eq!(Value::Integer(-3).to_string(), "-3");
        assert_eq!(Value::Float(1e300).to_string(), "1e300");
        assert_eq!(Value::Float(-2.5e15).to_string(), "-2.5e15");
        assert_eq!(Value::Float(123456789012345.0).to_string(), "123456789012345.0");
    }
}
