//! Lazy feature streams.
//!
//! A [`FeatureStream`] pairs a [`Schema`] with a boxed iterator of
//! `Result<Record>`. Streams are single pass; a stream created from a
//! [`RecordSource`] keeps a handle to it and can be reset, which re-opens the
//! source from scratch. Streams produced by an operator have no source.

use crate::error::{FeatureError, Result};
use crate::record::Record;
use crate::schema::Schema;
use log::debug;
use std::fmt;
use std::rc::Rc;

/// Boxed record producer.
pub type RecordIter = Box<dyn Iterator<Item = Result<Record>>>;

/// A collaborator able to produce records of a fixed schema, any number of times.
pub trait RecordSource {
    /// Schema of the records produced by [`open`](RecordSource::open).
    fn schema(&self) -> &Schema;

    /// Start producing records from the beginning.
    fn open(&self) -> Result<RecordIter>;

    /// Short description used in log messages.
    fn describe(&self) -> String {
        "record source".to_string()
    }
}

/// Records already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    schema: Schema,
    records: Rc<Vec<Record>>,
}

impl MemorySource {
    /// Wrap records, checking each has the arity of `schema`.
    pub fn new(schema: Schema, records: Vec<Record>) -> Result<Self> {
        if let Some(bad) = records.iter().find(|r| r.len() != schema.len()) {
            return Err(FeatureError::Arity {
                expected: schema.len(),
                found: bad.len(),
            });
        }
        Ok(Self {
            schema,
            records: Rc::new(records),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSource for MemorySource {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn open(&self) -> Result<RecordIter> {
        let records = Rc::clone(&self.records);
        Ok(Box::new(
            (0..records.len()).map(move |i| Ok(records[i].clone())),
        ))
    }

    fn describe(&self) -> String {
        format!("{} in-memory records", self.records.len())
    }
}

/// Stops after the first error so a failed stage yields nothing further.
struct StopOnError {
    inner: RecordIter,
    failed: bool,
}

impl Iterator for StopOnError {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.inner.next();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}

/// A schema plus a lazy, single-consumer sequence of records.
pub struct FeatureStream {
    schema: Schema,
    records: RecordIter,
    origin: Option<Rc<dyn RecordSource>>,
}

impl FeatureStream {
    /// Stream over an arbitrary producer. The result cannot be reset.
    pub fn new<I>(schema: Schema, records: I) -> Self
    where
        I: Iterator<Item = Result<Record>> + 'static,
    {
        Self {
            schema,
            records: Box::new(StopOnError {
                inner: Box::new(records),
                failed: false,
            }),
            origin: None,
        }
    }

    /// Resettable stream over in-memory records.
    pub fn from_records(schema: Schema, records: Vec<Record>) -> Result<Self> {
        Self::from_source(Rc::new(MemorySource::new(schema, records)?))
    }

    /// Resettable stream opened from a source collaborator.
    pub fn from_source(source: Rc<dyn RecordSource>) -> Result<Self> {
        let records = source.open()?;
        let mut stream = Self::new(source.schema().clone(), records);
        stream.origin = Some(source);
        Ok(stream)
    }

    /// Convenience for tests and callers holding plain field names.
    pub fn from_rows<S: AsRef<str>>(fields: &[S], records: Vec<Record>) -> Result<Self> {
        let schema = Schema::new(fields.iter().map(|f| f.as_ref().to_string()))?;
        Self::from_records(schema, records)
    }

    #[inline]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    #[inline]
    pub fn fields(&self) -> &[String] {
        self.schema.fields()
    }

    #[inline]
    pub fn is_resettable(&self) -> bool {
        self.origin.is_some()
    }

    /// Restart from the first record by re-opening the originating source.
    pub fn reset(&mut self) -> Result<()> {
        let source = self.origin.as_ref().ok_or(FeatureError::NotResettable)?;
        debug!("resetting stream from {}", source.describe());
        self.records = Box::new(StopOnError {
            inner: source.open()?,
            failed: false,
        });
        Ok(())
    }

    /// Split into schema and producer, dropping any replay descriptor.
    pub fn into_parts(self) -> (Schema, RecordIter) {
        (self.schema, self.records)
    }

    /// Derived stream applying `f` to each record under a new schema.
    pub fn map_records<F>(self, schema: Schema, mut f: F) -> FeatureStream
    where
        F: FnMut(Record) -> Result<Record> + 'static,
    {
        let records = self.records;
        FeatureStream::new(schema, records.map(move |r| r.and_then(&mut f)))
    }

    /// Derived stream keeping records for which `keep` returns `Ok(true)`.
    pub fn filter_records<F>(self, mut keep: F) -> FeatureStream
    where
        F: FnMut(&Record) -> Result<bool> + 'static,
    {
        let (schema, records) = self.into_parts();
        FeatureStream::new(
            schema,
            records.filter_map(move |r| match r {
                Ok(rec) => match keep(&rec) {
                    Ok(true) => Some(Ok(rec)),
                    Ok(false) => None,
                    Err(e) => Some(Err(e)),
                },
                Err(e) => Some(Err(e)),
            }),
        )
    }

    /// Pull every remaining record, stopping at the first error.
    pub fn collect_records(self) -> Result<Vec<Record>> {
        self.records.collect()
    }
}

impl Iterator for FeatureStream {
    type Item = Result<Record>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.records.next()
    }
}

impl fmt::Debug for FeatureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureStream")
            .field("schema", &self.schema)
            .field("resettable", &self.origin.is_some())
            .finish()
    }
}
