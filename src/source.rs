//! Delimited-file sources: opening, comment filtering, schema inference and
//! the streaming row scan every query starts from.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};

use camino::{Utf8Path, Utf8PathBuf};
use csv::{ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use once_cell::sync::OnceCell;

use crate::config::ScanOptions;
use crate::error::TableError;
use crate::schema::{Field, Schema};
use crate::value::{DataType, Value};

pub type Row = Vec<Value>;

/// A readable delimited file plus the options it is read with. The schema is
/// inferred on first request and kept for the lifetime of the source.
#[derive(Debug)]
pub struct Source {
    path: Utf8PathBuf,
    options: ScanOptions,
    schema: OnceCell<Schema>,
}

impl Source {
    /// Checks that `path` can be opened. No rows are read.
    pub fn open(path: impl Into<Utf8PathBuf>, options: ScanOptions) -> Result<Self, TableError> {
        let path = path.into();
        let file = File::open(&path).map_err(|err| TableError::SourceUnavailable {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        let metadata = file.metadata().map_err(|err| TableError::SourceUnavailable {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        if metadata.is_dir() {
            return Err(TableError::SourceUnavailable {
                path,
                reason: "is a directory".to_string(),
            });
        }

        Ok(Self {
            path,
            options,
            schema: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub fn schema(&self) -> Result<&Schema, TableError> {
        self.schema.get_or_try_init(|| self.infer_schema())
    }

    /// Streams every data row, typed by the inferred schema.
    pub fn scan(&self) -> Result<RowScanner<'_>, TableError> {
        let schema = self.schema()?;
        let mut reader = self.csv_reader(schema.len() == 1)?;
        let mut header = StringRecord::new();
        // Header was validated during inference; this only advances past it.
        self.read_record(&mut reader, &mut header, 0)?;
        tracing::debug!(path = %self.path, "scan started");

        Ok(RowScanner {
            source: self,
            types: schema.fields.iter().map(|f| f.data_type).collect(),
            reader,
            record: StringRecord::new(),
            rows: 0,
            done: false,
        })
    }

    fn infer_schema(&self) -> Result<Schema, TableError> {
        let mut reader = self.csv_reader(false)?;
        let mut header = StringRecord::new();
        if !self.read_record(&mut reader, &mut header, 0)? {
            return Err(self.schema_error("empty header"));
        }
        if header.iter().all(|name| name.trim().is_empty()) {
            return Err(self.schema_error("empty header"));
        }
        if header.len() == 1 {
            // Blank lines are empty cells in a one-column file.
            reader = self.csv_reader(true)?;
            self.read_record(&mut reader, &mut header, 0)?;
        }

        let mut types: Vec<Option<DataType>> = vec![None; header.len()];
        let mut record = StringRecord::new();
        let mut sampled = 0;
        while sampled < self.options.infer_schema_rows
            && self.read_record(&mut reader, &mut record, sampled as u64 + 1)?
        {
            sampled += 1;
            for (slot, raw) in types.iter_mut().zip(record.iter()) {
                if self.options.is_null_token(raw) {
                    continue;
                }
                let cell = DataType::infer(raw);
                *slot = Some(slot.map_or(cell, |current| current.widen(cell)));
            }
        }

        let schema = Schema::new(
            header
                .iter()
                .zip(types)
                .map(|(name, data_type)| Field::new(name, data_type.unwrap_or(DataType::String)))
                .collect(),
        );
        if let Some(name) = schema.first_duplicate() {
            return Err(self.schema_error(&format!("duplicate column name '{name}'")));
        }
        tracing::debug!(path = %self.path, sampled, schema = %schema, "inferred schema");
        Ok(schema)
    }

    fn schema_error(&self, reason: &str) -> TableError {
        TableError::SchemaInference {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }

    fn csv_reader(&self, keep_blank_lines: bool) -> Result<csv::Reader<Box<dyn Read + Send>>, TableError> {
        let file = File::open(&self.path).map_err(|err| TableError::SourceUnavailable {
            path: self.path.clone(),
            reason: err.to_string(),
        })?;
        let decoded: Box<dyn BufRead + Send> = if self.path.extension() == Some("gz") {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };
        let comment_prefix = self.options.comment_prefix.as_deref().map(str::as_bytes);
        let filtered: Box<dyn Read + Send> = if comment_prefix.is_some() || keep_blank_lines {
            Box::new(LineFilter::new(decoded, comment_prefix, keep_blank_lines))
        } else {
            Box::new(decoded)
        };

        Ok(ReaderBuilder::new()
            .has_headers(false)
            .delimiter(self.options.delimiter.as_byte())
            .flexible(true)
            .from_reader(filtered))
    }

    fn read_record<R: Read>(
        &self,
        reader: &mut csv::Reader<R>,
        record: &mut StringRecord,
        index: u64,
    ) -> Result<bool, TableError> {
        reader
            .read_record(record)
            .map_err(|err| self.scan_error(index, err.to_string()))
    }

    fn scan_error(&self, record: u64, message: String) -> TableError {
        TableError::Scan {
            path: self.path.clone(),
            record,
            message,
        }
    }
}

/// Pull-based iterator over the data rows of a [`Source`].
pub struct RowScanner<'a> {
    source: &'a Source,
    types: Vec<DataType>,
    reader: csv::Reader<Box<dyn Read + Send>>,
    record: StringRecord,
    rows: u64,
    done: bool,
}

impl RowScanner<'_> {
    fn typed_row(&self) -> Result<Row, TableError> {
        if self.record.len() > self.types.len() {
            return Err(self.source.scan_error(
                self.rows + 1,
                format!(
                    "found {} fields, header has {}",
                    self.record.len(),
                    self.types.len()
                ),
            ));
        }

        let options = &self.source.options;
        let mut row = Vec::with_capacity(self.types.len());
        for (idx, data_type) in self.types.iter().enumerate() {
            let value = match self.record.get(idx) {
                // Null spellings stay raw text until normalization.
                Some(raw) if options.is_null_token(raw) => Value::String(raw.to_string()),
                Some(raw) => Value::parse(raw, *data_type),
                None => Value::Null,
            };
            row.push(value);
        }
        Ok(row)
    }
}

impl Iterator for RowScanner<'_> {
    type Item = Result<Row, TableError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self
            .source
            .read_record(&mut self.reader, &mut self.record, self.rows + 1)
        {
            Ok(true) => {
                let row = self.typed_row();
                self.rows += 1;
                if row.is_err() {
                    self.done = true;
                }
                Some(row)
            }
            Ok(false) => {
                self.done = true;
                tracing::debug!(path = %self.source.path, rows = self.rows, "scan finished");
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Line-level rewriting ahead of the csv reader: drops lines starting with
/// the comment prefix and, when asked, turns blank lines into one quoted
/// empty field so the reader does not skip them. Lines that start inside a
/// quoted field pass through untouched.
struct LineFilter<R> {
    inner: R,
    comment_prefix: Option<Vec<u8>>,
    keep_blank_lines: bool,
    in_quotes: bool,
    line: Vec<u8>,
    pos: usize,
}

impl<R: BufRead> LineFilter<R> {
    fn new(inner: R, comment_prefix: Option<&[u8]>, keep_blank_lines: bool) -> Self {
        Self {
            inner,
            comment_prefix: comment_prefix.map(<[u8]>::to_vec),
            keep_blank_lines,
            in_quotes: false,
            line: Vec::new(),
            pos: 0,
        }
    }

    fn rewrite_line(&mut self) {
        if self.in_quotes {
            self.track_quotes();
            return;
        }
        if let Some(prefix) = &self.comment_prefix
            && self.line.starts_with(prefix)
        {
            self.line.clear();
            return;
        }
        if self.keep_blank_lines && matches!(self.line.as_slice(), b"\n" | b"\r\n") {
            self.line.insert(0, b'"');
            self.line.insert(0, b'"');
            return;
        }
        self.track_quotes();
    }

    /// An escaped `""` flips the state twice, so counting quotes is enough.
    fn track_quotes(&mut self) {
        let quotes = self.line.iter().filter(|&&b| b == b'"').count();
        if quotes % 2 == 1 {
            self.in_quotes = !self.in_quotes;
        }
    }
}

impl<R: BufRead> Read for LineFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.line.len() {
            self.line.clear();
            self.pos = 0;
            if self.inner.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(0);
            }
            self.rewrite_line();
        }
        let n = buf.len().min(self.line.len() - self.pos);
        buf[..n].copy_from_slice(&self.line[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::Delimiter;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn line_filter_drops_prefixed_lines() {
        let input = b"# note\na\tb\n#x\t1\n\n1\t2\n";
        let mut filter = LineFilter::new(&input[..], Some(b"#".as_slice()), false);
        let mut out = String::new();
        filter.read_to_string(&mut out).unwrap();
        assert_eq!(out, "a\tb\n\n1\t2\n");
    }

    #[test]
    fn line_filter_leaves_quoted_fields_alone() {
        let input = b"note\n\"a\n\n#b\"\n\nc\n";
        let mut filter = LineFilter::new(&input[..], Some(b"#".as_slice()), true);
        let mut out = String::new();
        filter.read_to_string(&mut out).unwrap();
        assert_eq!(out, "note\n\"a\n\n#b\"\n\"\"\nc\n");
    }

    #[test]
    fn blank_lines_are_empty_cells_in_one_column_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "t.tsv", "x\n1\n\nNA\n2\n");
        let source = Source::open(path, ScanOptions::default()).unwrap();
        assert_eq!(source.schema().unwrap().fields[0].data_type, DataType::Integer);
        let rows = source.scan().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], vec![Value::from("")]);
    }

    #[test]
    fn infers_types_ignoring_null_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "t.tsv", "id\tscore\tname\n1\t0.5\tx\nNA\t\tNone\n3\t2\ty\n");
        let source = Source::open(path, ScanOptions::default()).unwrap();
        let schema = source.schema().unwrap();
        assert_eq!(schema.fields[0].data_type, DataType::Integer);
        assert_eq!(schema.fields[1].data_type, DataType::Float);
        assert_eq!(schema.fields[2].data_type, DataType::String);
    }

    #[test]
    fn scan_keeps_null_spellings_raw_and_pads_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "t.csv", "a,b\n1,NA\n2\n");
        let options = ScanOptions::default().with_delimiter(Delimiter::COMMA);
        let source = Source::open(path, options).unwrap();
        let rows = source.scan().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(rows[0], vec![Value::Integer(1), Value::from("NA")]);
        assert_eq!(rows[1], vec![Value::Integer(2), Value::Null]);
    }

    #[test]
    fn too_many_fields_is_a_scan_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "t.csv", "a,b\n1,2,3\n");
        let options = ScanOptions::default().with_delimiter(Delimiter::COMMA);
        let source = Source::open(path, options).unwrap();
        let result = source.scan().unwrap().collect::<Result<Vec<_>, _>>();
        assert_matches!(result, Err(TableError::Scan { record: 1, .. }));
    }

    #[test]
    fn reads_gzip_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("t.tsv.gz")).unwrap();
        let file = File::create(&path).unwrap();
        let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        encoder.write_all(b"x\n1\n2\n").unwrap();
        encoder.finish().unwrap();

        let source = Source::open(path, ScanOptions::default()).unwrap();
        assert_eq!(source.scan().unwrap().count(), 2);
    }

    #[test]
    fn rejects_empty_and_duplicate_headers() {
        let dir = tempfile::tempdir().unwrap();
        let empty = Source::open(write_file(&dir, "e.tsv", ""), ScanOptions::default()).unwrap();
        assert_matches!(empty.schema(), Err(TableError::SchemaInference { .. }));

        let dup =
            Source::open(write_file(&dir, "d.tsv", "a\tb\ta\n"), ScanOptions::default()).unwrap();
        assert_matches!(
            dup.schema(),
            Err(TableError::SchemaInference { reason, .. }) if reason.contains("'a'")
        );
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = Source::open("/nonexistent/kira-ti.tsv", ScanOptions::default()).unwrap_err();
        assert_matches!(err, TableError::SourceUnavailable { .. });
    }
}
