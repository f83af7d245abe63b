//! Query plans: an ordered list of operations recorded against a table and
//! interpreted only when a result is requested.

use std::fmt;

use serde::Serialize;

use crate::error::TableError;
use crate::schema::{Field, Schema};
use crate::value::{DataType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    IsNull(String),
    IsNotNull(String),
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Compare { column, .. } => column,
            Predicate::IsNull(column) | Predicate::IsNotNull(column) => column,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { column, op, value } => {
                write!(f, "{column} {} {value}", op.symbol())
            }
            Predicate::IsNull(column) => write!(f, "{column} is null"),
            Predicate::IsNotNull(column) => write!(f, "{column} is not null"),
        }
    }
}

/// Where nulls land when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NullOrdering {
    /// Null is smaller than every value.
    #[default]
    Lowest,
    /// Null sorts as the literal text `NULL`.
    Token,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
    pub nulls: NullOrdering,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
            nulls: NullOrdering::default(),
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            descending: true,
            ..Self::asc(column)
        }
    }

    pub fn nulls(mut self, nulls: NullOrdering) -> Self {
        self.nulls = nulls;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Select(Vec<String>),
    NormalizeNulls,
    /// One row per distinct key combination; `count` names an optional
    /// group-size column appended after the keys.
    Aggregate {
        keys: Vec<String>,
        count: Option<String>,
    },
    Filter(Predicate),
    Sort(Vec<SortKey>),
    Limit(usize),
}

/// Index-resolved form of an [`Operation`], produced against a concrete input schema.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalOp {
    Project(Vec<usize>),
    NormalizeNulls,
    Aggregate { keys: Vec<usize>, counted: bool },
    Filter { column: usize, predicate: Predicate },
    Sort(Vec<(usize, bool, NullOrdering)>),
    Limit(usize),
}

impl Operation {
    /// Validates the operation against `input` and returns its physical form
    /// together with the schema it produces.
    pub fn resolve(&self, input: &Schema) -> Result<(PhysicalOp, Schema), TableError> {
        match self {
            Operation::Select(columns) => {
                if columns.is_empty() {
                    return Err(TableError::InvalidPlan(
                        "select needs at least one column".to_string(),
                    ));
                }
                let indices = input.resolve_all(columns)?;
                let fields = indices.iter().map(|&i| input.fields[i].clone()).collect();
                Ok((PhysicalOp::Project(indices), Schema::new(fields)))
            }
            Operation::NormalizeNulls => Ok((PhysicalOp::NormalizeNulls, input.clone())),
            Operation::Aggregate { keys, count } => {
                if keys.is_empty() {
                    return Err(TableError::InvalidPlan(
                        "grouping needs at least one column".to_string(),
                    ));
                }
                let indices = input.resolve_all(keys)?;
                let mut fields: Vec<Field> =
                    indices.iter().map(|&i| input.fields[i].clone()).collect();
                if let Some(name) = count {
                    if keys.iter().any(|key| key == name) {
                        return Err(TableError::InvalidPlan(format!(
                            "count column '{name}' collides with a grouped column"
                        )));
                    }
                    fields.push(Field::new(name.clone(), DataType::Integer));
                }
                Ok((
                    PhysicalOp::Aggregate {
                        keys: indices,
                        counted: count.is_some(),
                    },
                    Schema::new(fields),
                ))
            }
            Operation::Filter(predicate) => {
                let column = input.resolve(predicate.column())?;
                Ok((
                    PhysicalOp::Filter {
                        column,
                        predicate: predicate.clone(),
                    },
                    input.clone(),
                ))
            }
            Operation::Sort(keys) => {
                let resolved = keys
                    .iter()
                    .map(|key| Ok((input.resolve(&key.column)?, key.descending, key.nulls)))
                    .collect::<Result<Vec<_>, TableError>>()?;
                Ok((PhysicalOp::Sort(resolved), input.clone()))
            }
            Operation::Limit(n) => Ok((PhysicalOp::Limit(*n), input.clone())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryPlan {
    ops: Vec<Operation>,
}

impl QueryPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Output schema of the whole plan over `input`.
    pub fn output_schema(&self, input: &Schema) -> Result<Schema, TableError> {
        self.ops
            .iter()
            .try_fold(input.clone(), |schema, op| op.resolve(&schema).map(|(_, out)| out))
    }

    /// Resolves every operation to its physical form, in order.
    pub fn compile(&self, input: &Schema) -> Result<Vec<PhysicalOp>, TableError> {
        let mut schema = input.clone();
        let mut physical = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            let (resolved, output) = op.resolve(&schema)?;
            physical.push(resolved);
            schema = output;
        }
        Ok(physical)
    }

    /// Plan whose row count equals this plan's: sorts after the last limit
    /// cannot change how many rows come out.
    pub fn for_counting(&self) -> QueryPlan {
        let mut ops = self.ops.clone();
        while matches!(ops.last(), Some(Operation::Sort(_))) {
            ops.pop();
        }
        QueryPlan { ops }
    }

    /// Semantics-preserving rewrites:
    /// - only the first `NormalizeNulls` is kept, later ones see no null spellings;
    /// - adjacent limits merge into the smaller one;
    /// - a filter directly after a select runs before it, since a select never
    ///   drops a column the filter can still name.
    pub fn optimized(&self) -> QueryPlan {
        let mut ops: Vec<Operation> = Vec::with_capacity(self.ops.len());
        let mut normalized = false;
        for op in &self.ops {
            match op {
                Operation::NormalizeNulls if normalized => continue,
                Operation::NormalizeNulls => normalized = true,
                Operation::Limit(n) => {
                    if let Some(Operation::Limit(prev)) = ops.last_mut() {
                        *prev = (*prev).min(*n);
                        continue;
                    }
                }
                Operation::Filter(_) => {
                    if let Some(Operation::Select(_)) = ops.last() {
                        let at = ops.len() - 1;
                        ops.insert(at, op.clone());
                        continue;
                    }
                }
                _ => {}
            }
            ops.push(op.clone());
        }
        QueryPlan { ops }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .ops
            .iter()
            .map(|op| match op {
                Operation::Select(columns) => format!("select({})", columns.join(", ")),
                Operation::NormalizeNulls => "normalize_nulls".to_string(),
                Operation::Aggregate { keys, count } => match count {
                    Some(name) => format!("group_count({} as {name})", keys.join(", ")),
                    None => format!("distinct({})", keys.join(", ")),
                },
                Operation::Filter(predicate) => format!("filter({predicate})"),
                Operation::Sort(keys) => {
                    let keys = keys
                        .iter()
                        .map(|k| format!("{}{}", k.column, if k.descending { " desc" } else { "" }))
                        .collect::<Vec<_>>();
                    format!("sort({})", keys.join(", "))
                }
                Operation::Limit(n) => format!("limit({n})"),
            })
            .collect::<Vec<_>>();
        write!(f, "scan")?;
        for part in parts {
            write!(f, " -> {part}")?;
        }
        Ok(())
    }
}
