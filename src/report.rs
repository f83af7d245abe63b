use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::TableError;
use crate::exec::RowStream;
use crate::plan::{NullOrdering, Predicate, SortKey};
use crate::table::{FREQ_COLUMN, GroupOrder, LogicalTable};
use crate::value::Value;

const COUNT_COLUMN: &str = "count";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub freq: u64,
    pub values: Vec<(String, Value)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DuplicateReport {
    pub input: String,
    pub subset: Vec<String>,
    pub total_rows: u64,
    pub unique_rows: u64,
    /// `None` for an empty table.
    pub duplicate_count: Option<u64>,
    pub duplicate_percent: Option<f64>,
    #[serde(serialize_with = "serialize_seconds")]
    pub elapsed: Duration,
    pub limit: usize,
    pub groups: Vec<DuplicateGroup>,
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(value.as_secs_f64())
}

/// Counts rows, distinct `subset` combinations and the largest duplicate
/// groups (at most `limit` of them, biggest first). Null spellings are
/// normalized before anything is compared.
pub fn duplicate_report(
    table: &LogicalTable,
    subset: Option<&[String]>,
    limit: usize,
) -> Result<DuplicateReport, TableError> {
    let started = Instant::now();
    let normalized = table.normalize_nulls()?;
    let subset = match subset {
        Some(columns) => columns.to_vec(),
        None => normalized.schema()?.names(),
    };
    let projected = normalized.select(subset.iter().cloned())?;
    let unique_plan = projected.distinct(None)?;
    let groups_plan = projected
        .group_count(None, GroupOrder::ByFrequency)?
        .filter(Predicate::gt(FREQ_COLUMN, 1i64))?
        .limit(limit)?;

    tracing::info!(
        input = %table.path(),
        columns = subset.len(),
        "checking for duplicates based on: {}",
        subset.join(", ")
    );

    let total_rows = normalized.count_rows()?;
    let unique_rows = unique_plan.count_rows()?;
    let (duplicate_count, duplicate_percent) = if total_rows == 0 {
        (None, None)
    } else {
        let duplicates = total_rows - unique_rows;
        (
            Some(duplicates),
            Some(duplicates as f64 / total_rows as f64 * 100.0),
        )
    };
    let elapsed = started.elapsed();

    let groups = if duplicate_count.unwrap_or(0) > 0 && limit > 0 {
        groups_plan
            .collect()?
            .rows
            .into_iter()
            .map(|mut row| {
                let freq = match row.pop() {
                    Some(Value::Integer(freq)) => freq as u64,
                    _ => 0,
                };
                DuplicateGroup {
                    freq,
                    values: subset.iter().cloned().zip(row).collect(),
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    Ok(DuplicateReport {
        input: table.path().to_string(),
        subset,
        total_rows,
        unique_rows,
        duplicate_count,
        duplicate_percent,
        elapsed,
        limit,
        groups,
    })
}

/// Flags for [`column_values`]. `sorted` means by count when `counted`,
/// ascending by value otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewMode {
    pub unique: bool,
    pub counted: bool,
    pub sorted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnEntry {
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnValuesResult {
    pub column: String,
    pub entries: Vec<ColumnEntry>,
    /// Sum of all counts; present in counted mode only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
}

/// Planned listing of one column. Nothing is read until [`iter`](Self::iter)
/// or [`collect`](Self::collect); every call runs a fresh scan.
#[derive(Debug, Clone)]
pub struct ColumnValues {
    column: String,
    mode: ViewMode,
    plan: LogicalTable,
}

/// Builds the listing for `column`, failing on an unknown column before any
/// data row is read.
pub fn column_values(
    table: &LogicalTable,
    column: &str,
    mode: ViewMode,
) -> Result<ColumnValues, TableError> {
    let base = table.select([column])?.normalize_nulls()?;
    let by_value = || vec![SortKey::asc(column).nulls(NullOrdering::Token)];

    let plan = if mode.counted {
        let order = if mode.sorted {
            GroupOrder::ByFrequency
        } else {
            GroupOrder::Unspecified
        };
        base.group_count_as(None, COUNT_COLUMN, order)?
    } else if mode.unique {
        let distinct = base.distinct(None)?;
        if mode.sorted { distinct.sort(by_value())? } else { distinct }
    } else if mode.sorted {
        base.sort(by_value())?
    } else {
        base
    };

    Ok(ColumnValues {
        column: column.to_string(),
        mode,
        plan,
    })
}

impl ColumnValues {
    pub fn iter(&self) -> Result<ColumnIter<'_>, TableError> {
        Ok(ColumnIter {
            rows: self.plan.stream()?,
            counted: self.mode.counted,
            total_rows: 0,
        })
    }

    pub fn collect(&self) -> Result<ColumnValuesResult, TableError> {
        let mut iter = self.iter()?;
        let entries = iter.by_ref().collect::<Result<Vec<_>, _>>()?;
        Ok(ColumnValuesResult {
            column: self.column.clone(),
            entries,
            total_rows: iter.total_rows(),
        })
    }
}

pub struct ColumnIter<'a> {
    rows: RowStream<'a>,
    counted: bool,
    total_rows: u64,
}

impl ColumnIter<'_> {
    /// Sum of the counts yielded so far; `None` outside counted mode.
    pub fn total_rows(&self) -> Option<u64> {
        self.counted.then_some(self.total_rows)
    }
}

impl Iterator for ColumnIter<'_> {
    type Item = Result<ColumnEntry, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = match self.rows.next()? {
            Ok(row) => row,
            Err(err) => return Some(Err(err)),
        };
        let mut cells = row.into_iter();
        let value = cells.next().unwrap_or(Value::Null);
        let count = match cells.next() {
            Some(Value::Integer(n)) => Some(n as u64),
            _ => None,
        };
        self.total_rows += count.unwrap_or(0);
        Some(Ok(ColumnEntry { value, count }))
    }
}
