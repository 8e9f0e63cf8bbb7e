//! BED record source and sink.
//!
//! Reading produces records of schema `chr, start, end[, name, score,
//! strand, field7, ...]`; the number of columns is taken from the first data
//! line. Strands are encoded as `1`/`-1`/`0`, scores as floats (`.` is null).

use crate::config::normalize_end;
use crate::error::{FeatureError, Result};
use crate::record::{strand_from_char, strand_to_char, Record, Value};
use crate::schema::{Schema, STRAND};
use crate::stream::{FeatureStream, RecordIter, RecordSource};
use log::debug;
use memchr::memchr_iter;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Buffer size for BedWriter.
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Split a line on tabs.
#[inline]
fn split_tabs(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut fields = Vec::with_capacity(8);
    let mut last = 0;
    for tab in memchr_iter(b'\t', bytes) {
        fields.push(&line[last..tab]);
        last = tab + 1;
    }
    fields.push(&line[last..]);
    fields
}

#[inline]
fn should_skip_line(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with("track") || line.starts_with("browser")
}

/// Schema for a BED line with `columns` columns.
pub fn bed_schema(columns: usize) -> Schema {
    let mut fields: Vec<String> = Schema::bed6()
        .fields()
        .iter()
        .take(columns.max(3))
        .cloned()
        .collect();
    for n in 7..=columns {
        fields.push(format!("field{}", n));
    }
    // Names are distinct by construction.
    Schema::new(fields).unwrap_or_default()
}

/// A streaming BED reader yielding typed records.
pub struct BedReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: String,
    columns: usize,
    pending: Option<String>,
}

impl BedReader<File> {
    /// Open a BED file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(file))
    }
}

impl<R: Read> BedReader<R> {
    /// Create a BED reader; the column count is detected on first use.
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * 1024, reader),
            line_number: 0,
            buffer: String::with_capacity(1024),
            columns: 0,
            pending: None,
        }
    }

    /// Read ahead to the first data line and return the schema it implies.
    ///
    /// An empty input yields the BED3 schema.
    pub fn detect_schema(&mut self) -> Result<Schema> {
        if self.columns == 0 {
            match self.next_line()? {
                Some(line) => {
                    self.columns = split_tabs(&line).len().max(3);
                    self.pending = Some(line);
                }
                None => self.columns = 3,
            }
        }
        Ok(bed_schema(self.columns))
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_line(&mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_end_matches(['\n', '\r']);
            if should_skip_line(line.trim()) {
                continue;
            }
            return Ok(Some(line.to_string()));
        }
    }

    /// Read the next BED record.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        self.detect_schema()?;
        let line = match self.pending.take() {
            Some(line) => line,
            None => match self.next_line()? {
                Some(line) => line,
                None => return Ok(None),
            },
        };
        self.parse_line(&line).map(Some)
    }

    fn parse_line(&self, line: &str) -> Result<Record> {
        let fields = split_tabs(line);
        if fields.len() < self.columns {
            return Err(FeatureError::Parse {
                line: self.line_number,
                message: format!("Expected {} fields, got {}", self.columns, fields.len()),
            });
        }

        let start = self.parse_position(fields[1], "start")?;
        let end = self.parse_position(fields[2], "end")?;
        if start > end {
            return Err(FeatureError::Parse {
                line: self.line_number,
                message: format!("Start ({}) > end ({})", start, end),
            });
        }

        let mut values = Vec::with_capacity(self.columns);
        values.push(Value::from(fields[0]));
        values.push(Value::Int(start));
        values.push(Value::Int(normalize_end(start, end)));
        for (n, raw) in fields.iter().enumerate().take(self.columns).skip(3) {
            values.push(match n {
                4 => parse_score(raw),
                5 => strand_from_char(raw.chars().next().unwrap_or('.')),
                _ => Value::from(*raw),
            });
        }
        Ok(Record::new(values))
    }

    fn parse_position(&self, s: &str, field_name: &str) -> Result<i64> {
        s.trim()
            .parse::<u64>()
            .map(|v| v as i64)
            .map_err(|_| FeatureError::Parse {
                line: self.line_number,
                message: format!("Invalid {} position: '{}'", field_name, s),
            })
    }

    /// Get an iterator over all records.
    pub fn records(self) -> BedRecordIter<R> {
        BedRecordIter { reader: self }
    }
}

fn parse_score(raw: &str) -> Value {
    match raw.trim() {
        "" | "." => Value::Null,
        s => s
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::from(s)),
    }
}

/// Iterator over BED records.
pub struct BedRecordIter<R: Read> {
    reader: BedReader<R>,
}

impl<R: Read> Iterator for BedRecordIter<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// A BED file as a resettable record source.
#[derive(Debug, Clone)]
pub struct BedSource {
    path: PathBuf,
    schema: Schema,
}

impl BedSource {
    /// Open `path` once to detect its columns.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let schema = BedReader::from_path(&path)?.detect_schema()?;
        debug!("BED source {} has fields {}", path.display(), schema);
        Ok(Self { path, schema })
    }
}

impl RecordSource for BedSource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self) -> Result<RecordIter> {
        let mut reader = BedReader::from_path(&self.path)?;
        reader.columns = self.schema.len();
        Ok(Box::new(reader.records()))
    }

    fn describe(&self) -> String {
        format!("BED file {}", self.path.display())
    }
}

/// Resettable stream over a BED file.
pub fn read_stream<P: AsRef<Path>>(path: P) -> Result<FeatureStream> {
    FeatureStream::from_source(Rc::new(BedSource::from_path(path)?))
}

/// Single-pass stream over any reader (e.g. stdin).
pub fn reader_stream<R: Read + 'static>(reader: R) -> Result<FeatureStream> {
    let mut reader = BedReader::new(reader);
    let schema = reader.detect_schema()?;
    Ok(FeatureStream::new(schema, reader.records()))
}

/// Parse BED text into a resettable in-memory stream (useful for testing).
pub fn parse_stream(content: &str) -> Result<FeatureStream> {
    let mut reader = BedReader::new(content.as_bytes());
    let schema = reader.detect_schema()?;
    let records = reader.records().collect::<Result<Vec<_>>>()?;
    FeatureStream::from_records(schema, records)
}

/// Tab-separated record writer.
///
/// Ints are formatted with itoa, floats with ryu, tuples comma-joined and
/// nulls as `.`. A `strand` field holding integers is written as `+`/`-`/`.`.
pub struct BedWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
}

impl<W: Write> BedWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, output)
    }

    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    #[inline]
    fn write_value(&mut self, value: &Value) -> io::Result<()> {
        match value {
            Value::Int(v) => self.writer.write_all(self.itoa_buf.format(*v).as_bytes()),
            Value::Float(v) => self.writer.write_all(self.ryu_buf.format(*v).as_bytes()),
            Value::Text(s) => self.writer.write_all(s.as_bytes()),
            other => self.writer.write_all(other.render().as_bytes()),
        }
    }

    /// Write one record followed by a newline.
    pub fn write_record(&mut self, record: &Record, strand_idx: Option<usize>) -> Result<()> {
        for (i, value) in record.values().iter().enumerate() {
            if i > 0 {
                self.writer.write_all(b"\t")?;
            }
            if Some(i) == strand_idx {
                let mut buf = [0u8; 4];
                self.writer
                    .write_all(strand_to_char(value).encode_utf8(&mut buf).as_bytes())?;
            } else {
                self.write_value(value)?;
            }
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Drain a stream into the writer, returning the number of records written.
    pub fn write_stream(&mut self, stream: FeatureStream) -> Result<usize> {
        let strand_idx = stream.schema().position(STRAND);
        let mut written = 0;
        for record in stream {
            self.write_record(&record?, strand_idx)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
