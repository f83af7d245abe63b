use std::io::{self, Write};

use crossterm::style::{Stylize, style};
use crossterm::tty::IsTty;
use serde::Serialize;

use crate::report::{ColumnEntry, ColumnValuesResult, DuplicateReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct TextOutput {
    styled: bool,
}

impl TextOutput {
    /// Colours only when stdout is a terminal.
    pub fn for_stdout() -> Self {
        Self {
            styled: io::stdout().is_tty(),
        }
    }

    pub fn plain() -> Self {
        Self { styled: false }
    }

    pub fn write_duplicates<W: Write>(
        &self,
        out: &mut W,
        report: &DuplicateReport,
        show: bool,
    ) -> io::Result<()> {
        writeln!(out, "Total rows: {}", report.total_rows)?;
        writeln!(
            out,
            "Unique rows (based on selected columns): {}",
            report.unique_rows
        )?;
        match (report.duplicate_count, report.duplicate_percent) {
            (Some(count), Some(percent)) => {
                writeln!(out, "Duplicate rows: {count} ({percent:.2}% of total)")?
            }
            _ => writeln!(out, "Duplicate rows: undefined (undefined% of total)")?,
        }
        writeln!(
            out,
            "Analysis completed in {:.2} seconds",
            report.elapsed.as_secs_f64()
        )?;

        let duplicates = report.duplicate_count.unwrap_or(0);
        if !show || duplicates == 0 {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "Showing up to {} duplicate rows:", report.limit)?;
        for group in &report.groups {
            let values = group
                .values
                .iter()
                .map(|(column, value)| format!("{column}: {value}"))
                .collect::<Vec<_>>()
                .join(", ");
            let label = format!("Appears {} times:", group.freq);
            if self.styled {
                writeln!(out, "{} {values}", style(label).yellow())?;
            } else {
                writeln!(out, "{label} {values}")?;
            }
        }

        if duplicates > report.limit as u64 {
            let more = format!(
                "... and {} more duplicate patterns",
                duplicates - report.limit as u64
            );
            if self.styled {
                writeln!(out, "{}", style(more).dim())?;
            } else {
                writeln!(out, "{more}")?;
            }
        }
        Ok(())
    }

    /// One line per entry: the value, or `value<TAB>count` in counted mode.
    pub fn write_entry<W: Write>(&self, out: &mut W, entry: &ColumnEntry) -> io::Result<()> {
        match entry.count {
            Some(count) => writeln!(out, "{}\t{count}", entry.value),
            None => writeln!(out, "{}", entry.value),
        }
    }

    pub fn write_total<W: Write>(&self, out: &mut W, total_rows: u64) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "Total rows: {total_rows}")
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_duplicates(report: &DuplicateReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_values(result: &ColumnValuesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
