use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum TableError {
    #[error("cannot open input {path}: {reason}")]
    #[diagnostic(code(kira_ti::source_unavailable))]
    SourceUnavailable { path: Utf8PathBuf, reason: String },

    #[error("cannot infer schema of {path}: {reason}")]
    #[diagnostic(code(kira_ti::schema))]
    SchemaInference { path: Utf8PathBuf, reason: String },

    #[error("Column '{0}' not found in the input file.")]
    #[diagnostic(
        code(kira_ti::unknown_column),
        help("column names are case-sensitive and must match the header row")
    )]
    UnknownColumn(String),

    #[error("invalid delimiter: {0}")]
    #[diagnostic(help("use a single ASCII character, `\\t`, or one of: tab, comma, semicolon, pipe, space"))]
    InvalidDelimiter(String),

    #[error("invalid column list: {0}")]
    InvalidColumnList(String),

    #[error("invalid query plan: {0}")]
    InvalidPlan(String),

    #[error("failed to read {path} at record {record}: {message}")]
    #[diagnostic(code(kira_ti::scan))]
    Scan {
        path: Utf8PathBuf,
        record: u64,
        message: String,
    },

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}
