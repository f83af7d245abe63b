use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_table_inspector::config::{ConfigLoader, ResolvedConfig};
use kira_table_inspector::domain::{ColumnList, Delimiter};
use kira_table_inspector::error::TableError;
use kira_table_inspector::output::{JsonOutput, OutputMode, TextOutput};
use kira_table_inspector::report::{ViewMode, column_values, duplicate_report};
use kira_table_inspector::table::LogicalTable;

#[derive(Parser)]
#[command(name = "kira-ti")]
#[command(about = "Duplicate checks and column views for large CSV/TSV tables")]
#[command(version, author)]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ./kira-ti.json, then the user config dir)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check for duplicate rows in a CSV/TSV file")]
    Dups(DupsArgs),
    #[command(about = "Extract and print values from a column of a CSV/TSV file")]
    View(ViewArgs),
}

#[derive(Args)]
struct DupsArgs {
    /// Path to the input file
    #[arg(short, long)]
    input: Utf8PathBuf,

    /// Field delimiter
    #[arg(short, long, default_value = "\\t")]
    delimiter: Delimiter,

    /// Comma-separated columns to compare (default: all columns)
    #[arg(long)]
    subset: Option<ColumnList>,

    /// Show the most frequent duplicate rows
    #[arg(long)]
    show: bool,

    /// Maximum number of duplicate rows to show
    #[arg(long)]
    limit: Option<usize>,

    /// Skip lines starting with this prefix
    #[arg(long)]
    comment_prefix: Option<String>,
}

#[derive(Args)]
struct ViewArgs {
    /// Path to the input file
    #[arg(short, long)]
    input: Utf8PathBuf,

    /// Column to extract values from
    #[arg(short, long)]
    column: String,

    /// Field delimiter
    #[arg(short, long, default_value = "\\t")]
    delimiter: Delimiter,

    /// Print only unique values
    #[arg(short, long)]
    unique: bool,

    /// Show counts for each unique value
    #[arg(short = 'n', long)]
    count: bool,

    /// Sort by count with --count, alphabetically otherwise
    #[arg(short, long)]
    sort: bool,

    /// Skip lines starting with this prefix (default: #, empty disables)
    #[arg(long)]
    comment_prefix: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<TableError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TableError) -> u8 {
    match error {
        TableError::SourceUnavailable { .. } | TableError::UnknownColumn(_) => 2,
        TableError::SchemaInference { .. } | TableError::Scan { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Dups(args) => run_dups(args, &config, output_mode),
        Commands::View(args) => run_view(args, &config, output_mode),
    }
}

fn run_dups(args: DupsArgs, config: &ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let DupsArgs {
        input,
        delimiter,
        subset,
        show,
        limit,
        comment_prefix,
    } = args;

    tracing::info!("Checking for duplicates in {input}...");
    let table = LogicalTable::open(input, config.scan_options(delimiter, comment_prefix))?;
    let subset = subset.map(ColumnList::into_vec);
    let limit = limit.unwrap_or(config.limit);
    // Groups cost an extra scan; skip it when nobody will see them.
    let group_limit = match output_mode {
        OutputMode::Text if !show => 0,
        _ => limit,
    };

    let mut report = duplicate_report(&table, subset.as_deref(), group_limit)?;
    report.limit = limit;

    match output_mode {
        OutputMode::Json => check_io(JsonOutput::print_duplicates(&report)),
        OutputMode::Text => {
            let mut stdout = io::stdout().lock();
            check_io(TextOutput::for_stdout().write_duplicates(&mut stdout, &report, show))
        }
    }
}

fn run_view(args: ViewArgs, config: &ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let ViewArgs {
        input,
        column,
        delimiter,
        unique,
        count,
        sort,
        comment_prefix,
    } = args;

    let comment_prefix = comment_prefix.or_else(|| config.view_comment_prefix.clone());
    let table = LogicalTable::open(input, config.scan_options(delimiter, comment_prefix))?;
    let mode = ViewMode {
        unique,
        counted: count,
        sorted: sort,
    };
    let values = column_values(&table, &column, mode)?;

    match output_mode {
        OutputMode::Json => check_io(JsonOutput::print_values(&values.collect()?)),
        OutputMode::Text => {
            let text = TextOutput::for_stdout();
            let mut stdout = BufWriter::new(io::stdout().lock());
            let mut entries = values.iter()?;
            for entry in entries.by_ref() {
                let entry = entry?;
                if let Err(err) = text.write_entry(&mut stdout, &entry) {
                    return check_io(Err(err));
                }
            }
            if let Some(total_rows) = entries.total_rows() {
                check_io(text.write_total(&mut stdout, total_rows))?;
            }
            check_io(stdout.flush())
        }
    }
}

/// `kira-ti view ... | head` closes stdout early; that is not a failure.
fn check_io(result: io::Result<()>) -> miette::Result<()> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.into_diagnostic(),
    }
}
