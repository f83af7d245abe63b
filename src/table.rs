use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::config::ScanOptions;
use crate::error::TableError;
use crate::exec::{self, RowStream};
use crate::plan::{NullOrdering, Operation, Predicate, QueryPlan, SortKey};
use crate::schema::Schema;
use crate::source::{Row, Source};
use crate::value::Value;

/// Name of the group-size column added by [`LogicalTable::group_count`].
pub const FREQ_COLUMN: &str = "freq";

/// Row order requested from a grouped table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupOrder {
    /// First-encounter order of the groups.
    #[default]
    Unspecified,
    /// Largest groups first; equal sizes keep encounter order.
    ByFrequency,
    /// Ascending by the grouped values, nulls sorting as `NULL`.
    ByValue,
}

/// Immutable description of a table and the operations recorded against it.
///
/// Every builder returns a new value; nothing touches row data until
/// [`count_rows`](Self::count_rows), [`stream`](Self::stream) or
/// [`collect`](Self::collect) runs the plan. Clones share the source and its
/// cached schema.
#[derive(Debug, Clone)]
pub struct LogicalTable {
    source: Arc<Source>,
    plan: QueryPlan,
    schema: Option<Arc<Schema>>,
}

impl LogicalTable {
    pub fn open(path: impl Into<Utf8PathBuf>, options: ScanOptions) -> Result<Self, TableError> {
        let source = Source::open(path, options)?;
        Ok(Self {
            source: Arc::new(source),
            plan: QueryPlan::new(),
            schema: None,
        })
    }

    pub fn path(&self) -> &Utf8Path {
        self.source.path()
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Output schema of the plan. The first call on a fresh table reads the
    /// header and a sample of rows.
    pub fn schema(&self) -> Result<&Schema, TableError> {
        match &self.schema {
            Some(schema) => Ok(schema),
            None => self.source.schema(),
        }
    }

    fn extend(&self, op: Operation) -> Result<Self, TableError> {
        let (_, output) = op.resolve(self.schema()?)?;
        let mut plan = self.plan.clone();
        plan.push(op);
        Ok(Self {
            source: Arc::clone(&self.source),
            plan,
            schema: Some(Arc::new(output)),
        })
    }

    pub fn select<I, S>(&self, columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extend(Operation::Select(
            columns.into_iter().map(Into::into).collect(),
        ))
    }

    /// Turns every cell spelled as one of the source's null tokens into null.
    pub fn normalize_nulls(&self) -> Result<Self, TableError> {
        self.extend(Operation::NormalizeNulls)
    }

    pub fn filter(&self, predicate: Predicate) -> Result<Self, TableError> {
        self.extend(Operation::Filter(predicate))
    }

    pub fn sort(&self, keys: Vec<SortKey>) -> Result<Self, TableError> {
        self.extend(Operation::Sort(keys))
    }

    pub fn limit(&self, n: usize) -> Result<Self, TableError> {
        self.extend(Operation::Limit(n))
    }

    /// One row per distinct combination of `subset` (all columns when `None`).
    /// Nulls in the same column are equal.
    pub fn distinct(&self, subset: Option<&[String]>) -> Result<Self, TableError> {
        let keys = self.subset_or_all(subset)?;
        self.extend(Operation::Aggregate { keys, count: None })
    }

    /// Groups by `subset` and appends a `freq` column with each group's size.
    pub fn group_count(&self, subset: Option<&[String]>, order: GroupOrder) -> Result<Self, TableError> {
        self.group_count_as(subset, FREQ_COLUMN, order)
    }

    pub fn group_count_as(
        &self,
        subset: Option<&[String]>,
        alias: &str,
        order: GroupOrder,
    ) -> Result<Self, TableError> {
        let keys = self.subset_or_all(subset)?;
        let grouped = self.extend(Operation::Aggregate {
            keys: keys.clone(),
            count: Some(alias.to_string()),
        })?;
        match order {
            GroupOrder::Unspecified => Ok(grouped),
            GroupOrder::ByFrequency => grouped.sort(vec![SortKey::desc(alias)]),
            GroupOrder::ByValue => grouped.sort(
                keys.into_iter()
                    .map(|key| SortKey::asc(key).nulls(NullOrdering::Token))
                    .collect(),
            ),
        }
    }

    fn subset_or_all(&self, subset: Option<&[String]>) -> Result<Vec<String>, TableError> {
        match subset {
            Some(columns) => Ok(columns.to_vec()),
            None => Ok(self.schema()?.names()),
        }
    }

    /// Scans the table once and counts its rows without keeping them.
    pub fn count_rows(&self) -> Result<u64, TableError> {
        exec::count(exec::execute(&self.source, &self.plan.for_counting())?)
    }

    /// Runs the plan and streams its rows. Each call rescans the source.
    pub fn stream(&self) -> Result<RowStream<'_>, TableError> {
        exec::execute(&self.source, &self.plan)
    }

    pub fn collect(&self) -> Result<MaterializedResult, TableError> {
        let schema = self.schema()?.clone();
        let rows = self.stream()?.collect::<Result<Vec<_>, _>>()?;
        Ok(MaterializedResult { schema, rows })
    }
}

/// Finite, in-memory result of running a plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaterializedResult {
    pub schema: Schema,
    pub rows: Vec<Row>,
}

impl MaterializedResult {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row)?.get(idx)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Rows as `(column, value)` pairs in schema order.
    pub fn records(&self) -> impl Iterator<Item = Vec<(&str, &Value)>> + '_ {
        self.rows.iter().map(|row| {
            self.schema
                .fields
                .iter()
                .map(|field| field.name.as_str())
                .zip(row.iter())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn table(content: &str) -> (tempfile::TempDir, LogicalTable) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("t.tsv")).unwrap();
        std::fs::write(&path, content).unwrap();
        let table = LogicalTable::open(path, ScanOptions::default()).unwrap();
        (dir, table)
    }

    #[test]
    fn builders_do_not_touch_the_plan_they_extend() {
        let (_dir, base) = table("a\tb\n1\tx\n");
        let selected = base.select(["b"]).unwrap();
        assert!(base.plan().is_empty());
        assert_eq!(selected.plan().ops().len(), 1);
        assert_eq!(base.schema().unwrap().names(), ["a", "b"]);
        assert_eq!(selected.schema().unwrap().names(), ["b"]);
    }

    #[test]
    fn unknown_column_fails_while_building() {
        let (_dir, base) = table("a\tb\n1\tx\n");
        assert_matches!(base.select(["a", "c", "d"]), Err(TableError::UnknownColumn(c)) if c == "c");
        assert_matches!(base.distinct(Some(["z".to_string()].as_slice())), Err(TableError::UnknownColumn(_)));
    }

    #[test]
    fn group_count_by_value_sorts_keys() {
        let (_dir, base) = table("g\nb\nNA\na\nb\n");
        let grouped = base
            .normalize_nulls()
            .unwrap()
            .group_count(None, GroupOrder::ByValue)
            .unwrap()
            .collect()
            .unwrap();
        let keys: Vec<String> = grouped.rows.iter().map(|r| r[0].to_string()).collect();
        assert_eq!(keys, ["NULL", "a", "b"]);
        assert_eq!(grouped.get(2, "freq"), Some(&Value::Integer(2)));
    }

    #[test]
    fn filter_and_limit_stream_rows() {
        let (_dir, base) = table("n\n1\n5\n7\n9\n");
        let result = base
            .filter(Predicate::gt("n", 4i64))
            .unwrap()
            .limit(2)
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(result.column("n").unwrap(), [&Value::Integer(5), &Value::Integer(7)]);
    }

    #[test]
    fn records_pair_names_with_values() {
        let (_dir, base) = table("a\tb\n1\tx\n");
        let result = base.collect().unwrap();
        let records: Vec<_> = result.records().collect();
        assert_eq!(records[0], vec![("a", &Value::Integer(1)), ("b", &Value::from("x"))]);
    }
}
