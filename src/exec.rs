//! Plan interpreter. Row-wise operations stream; grouping and sorting drain
//! their input on first pull and then replay the buffered result.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::TableError;
use crate::plan::{CompareOp, NullOrdering, PhysicalOp, Predicate, QueryPlan};
use crate::source::{Row, Source};
use crate::value::{NULL_TOKEN, Value};

pub type RowStream<'a> = Box<dyn Iterator<Item = Result<Row, TableError>> + Send + 'a>;

/// Compiles `plan` against the source schema and returns a stream over its
/// output rows. Column errors surface here, before the file is scanned.
pub fn execute<'a>(source: &'a Source, plan: &QueryPlan) -> Result<RowStream<'a>, TableError> {
    let optimized = plan.optimized();
    let physical = optimized.compile(source.schema()?)?;
    tracing::debug!(plan = %optimized, "executing");

    let null_tokens: Arc<[String]> = source.options().null_tokens.clone().into();
    let mut stream: RowStream<'a> = Box::new(source.scan()?);
    for op in physical {
        stream = apply(stream, op, Arc::clone(&null_tokens));
    }
    Ok(stream)
}

/// Number of rows `stream` yields, without keeping them.
pub fn count(mut stream: RowStream<'_>) -> Result<u64, TableError> {
    stream.try_fold(0, |n, row| row.map(|_| n + 1))
}

fn apply<'a>(input: RowStream<'a>, op: PhysicalOp, null_tokens: Arc<[String]>) -> RowStream<'a> {
    match op {
        PhysicalOp::Project(indices) => Box::new(input.map(move |row| {
            row.map(|row| indices.iter().map(|&i| row[i].clone()).collect())
        })),
        PhysicalOp::NormalizeNulls => Box::new(input.map(move |row| {
            row.map(|row| row.into_iter().map(|v| normalize(v, &null_tokens)).collect())
        })),
        PhysicalOp::Filter { column, predicate } => {
            Box::new(input.filter(move |row| match row {
                Ok(row) => matches(&predicate, &row[column]),
                Err(_) => true,
            }))
        }
        PhysicalOp::Limit(n) => Box::new(input.take(n)),
        blocking => Box::new(Blocking {
            input: Some(input),
            op: blocking,
            output: Vec::new().into_iter(),
        }),
    }
}

fn normalize(value: Value, null_tokens: &[String]) -> Value {
    match value {
        Value::String(raw) if null_tokens.iter().any(|token| *token == raw) => Value::Null,
        other => other,
    }
}

fn matches(predicate: &Predicate, cell: &Value) -> bool {
    match predicate {
        Predicate::IsNull(_) => cell.is_null(),
        Predicate::IsNotNull(_) => !cell.is_null(),
        Predicate::Compare { .. } if cell.is_null() => false,
        Predicate::Compare { op, value, .. } => {
            let ordering = cell.compare(value);
            match op {
                CompareOp::Eq => ordering == Ordering::Equal,
                CompareOp::NotEq => ordering != Ordering::Equal,
                CompareOp::Lt => ordering == Ordering::Less,
                CompareOp::LtEq => ordering != Ordering::Greater,
                CompareOp::Gt => ordering == Ordering::Greater,
                CompareOp::GtEq => ordering != Ordering::Less,
            }
        }
    }
}

struct Blocking<'a> {
    input: Option<RowStream<'a>>,
    op: PhysicalOp,
    output: std::vec::IntoIter<Row>,
}

impl Iterator for Blocking<'_> {
    type Item = Result<Row, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(input) = self.input.take() {
            let rows = match &self.op {
                PhysicalOp::Aggregate { keys, counted } => aggregate(input, keys, *counted),
                PhysicalOp::Sort(keys) => sort(input, keys),
                _ => input.collect(),
            };
            match rows {
                Ok(rows) => self.output = rows.into_iter(),
                Err(err) => return Some(Err(err)),
            }
        }
        self.output.next().map(Ok)
    }
}

/// Groups rows by the key columns. Groups come out in first-encounter order.
fn aggregate(input: RowStream<'_>, keys: &[usize], counted: bool) -> Result<Vec<Row>, TableError> {
    let mut index: HashMap<Row, usize> = HashMap::new();
    let mut groups: Vec<(Row, u64)> = Vec::new();
    for row in input {
        let row = row?;
        let key: Row = keys.iter().map(|&i| row[i].clone()).collect();
        match index.get(&key) {
            Some(&slot) => groups[slot].1 += 1,
            None => {
                index.insert(key.clone(), groups.len());
                groups.push((key, 1));
            }
        }
    }
    tracing::debug!(groups = groups.len(), "aggregated");

    Ok(groups
        .into_iter()
        .map(|(mut key, freq)| {
            if counted {
                key.push(Value::from(freq));
            }
            key
        })
        .collect())
}

/// Stable multi-key sort.
fn sort(input: RowStream<'_>, keys: &[(usize, bool, NullOrdering)]) -> Result<Vec<Row>, TableError> {
    let mut rows = input.collect::<Result<Vec<_>, _>>()?;
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|&(idx, descending, nulls)| {
                let ordering = sort_value(&a[idx], nulls).cmp(&sort_value(&b[idx], nulls));
                if descending { ordering.reverse() } else { ordering }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Ok(rows)
}

fn sort_value(value: &Value, nulls: NullOrdering) -> Cow<'_, Value> {
    match (value, nulls) {
        (Value::Null, NullOrdering::Token) => Cow::Owned(Value::from(NULL_TOKEN)),
        _ => Cow::Borrowed(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(rows: Vec<Row>) -> RowStream<'static> {
        Box::new(rows.into_iter().map(Ok::<Row, TableError>))
    }

    fn ints(values: &[i64]) -> Vec<Row> {
        values.iter().map(|&v| vec![Value::Integer(v)]).collect()
    }

    #[test]
    fn aggregate_counts_in_encounter_order() {
        let rows = vec![
            vec![Value::from("b")],
            vec![Value::Null],
            vec![Value::from("b")],
            vec![Value::Null],
            vec![Value::from("a")],
        ];
        let out = aggregate(stream(rows), &[0], true).unwrap();
        assert_eq!(
            out,
            vec![
                vec![Value::from("b"), Value::Integer(2)],
                vec![Value::Null, Value::Integer(2)],
                vec![Value::from("a"), Value::Integer(1)],
            ]
        );
    }

    #[test]
    fn sort_is_stable_and_descending() {
        let rows = vec![
            vec![Value::from("x"), Value::Integer(1)],
            vec![Value::from("y"), Value::Integer(3)],
            vec![Value::from("z"), Value::Integer(1)],
        ];
        let out = sort(stream(rows), &[(1, true, NullOrdering::Lowest)]).unwrap();
        let names: Vec<_> = out.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(names, ["y", "x", "z"]);
    }

    #[test]
    fn null_token_ordering_places_null_among_text() {
        let rows = vec![
            vec![Value::from("zeta")],
            vec![Value::Null],
            vec![Value::from("MYC")],
        ];
        let out = sort(stream(rows), &[(0, false, NullOrdering::Token)]).unwrap();
        assert_eq!(out[0][0], Value::from("MYC"));
        assert_eq!(out[1][0], Value::Null);
        assert_eq!(out[2][0], Value::from("zeta"));
    }

    #[test]
    fn comparisons_never_match_null() {
        let gt = Predicate::gt("x", 1i64);
        assert!(matches(&gt, &Value::Integer(2)));
        assert!(!matches(&gt, &Value::Integer(1)));
        assert!(!matches(&gt, &Value::Null));
        assert!(matches(&Predicate::IsNull("x".into()), &Value::Null));
    }

    #[test]
    fn count_propagates_errors() {
        assert_eq!(count(stream(ints(&[1, 2, 3]))).unwrap(), 3);
        let failing: RowStream<'static> = Box::new(
            vec![
                Ok(vec![Value::Integer(1)]),
                Err(TableError::InvalidPlan("boom".into())),
            ]
            .into_iter(),
        );
        assert!(count(failing).is_err());
    }
}
