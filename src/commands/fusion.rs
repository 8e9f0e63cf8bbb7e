//! Fusion of overlapping features.
//!
//! Walks a coordinate-ordered stream keeping a single accumulated feature.
//! Each incoming feature that starts strictly before the accumulator's end
//! (same chromosome, and same strand when stranded) is folded into it:
//! `end` becomes the maximum of both ends and every other field is combined
//! by its [`Aggregation`](super::aggregate::Aggregation). Otherwise the
//! accumulator is emitted and replaced.
//!
//! Intervals that merely touch (`next.start == acc.end`) are not fused.
//!
//! # Memory Complexity
//!
//! O(1): only the accumulator is held.

use super::aggregate::{AggregateRegistry, Aggregation, FieldAggregator};
use super::ordered::{Ordered, StreamTransform};
use super::projection::reorder;
use crate::error::{FeatureError, Result};
use crate::record::{Record, Value};
use crate::schema::{CHR, END, START, STRAND};
use crate::stream::{FeatureStream, RecordIter};
use crate::validation::validated;
use log::debug;

/// Fusion command configuration.
#[derive(Debug, Clone, Default)]
pub struct FusionCommand {
    /// Only fuse features on the same strand
    pub stranded: bool,
    registry: AggregateRegistry,
}

impl FusionCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strand(mut self, stranded: bool) -> Self {
        self.stranded = stranded;
        self
    }

    /// Override how one field is combined.
    pub fn with_aggregate(mut self, field: impl Into<String>, aggregation: Aggregation) -> Self {
        self.registry.set(field, aggregation);
        self
    }

    pub fn with_registry(mut self, registry: AggregateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Fuse one stream, keeping its field order.
    pub fn run(&self, stream: FeatureStream) -> Result<FeatureStream> {
        Ordered::new(self.clone()).apply(stream)
    }

    fn fuse(&self, stream: FeatureStream) -> Result<FeatureStream> {
        let stream = reorder(stream, &[START, END], false)?;
        let schema = stream.schema().clone();
        let strand_idx = match (self.stranded, schema.position(STRAND)) {
            (true, None) => {
                return Err(FeatureError::Schema(format!(
                    "stranded fusion needs a '{}' field (have {})",
                    STRAND, schema
                )))
            }
            (true, idx) => idx,
            (false, _) => None,
        };
        let aggregator = self.registry.resolve(&schema.fields()[2..]);
        debug!("fusion over {} (stranded: {})", schema, self.stranded);

        let stream = validated(stream)?;
        let chr_idx = schema.position(CHR);
        let (schema, records) = stream.into_parts();
        Ok(FeatureStream::new(
            schema,
            FusionIter {
                records,
                acc: None,
                aggregator,
                chr_idx,
                strand_idx,
                read: 0,
                written: 0,
            },
        ))
    }
}

impl StreamTransform for FusionCommand {
    fn transform(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        inputs.into_iter().map(|s| self.fuse(s)).collect()
    }
}

/// Fuse overlapping features of `stream`.
pub fn fusion(stream: FeatureStream, registry: AggregateRegistry, stranded: bool) -> Result<FeatureStream> {
    FusionCommand::new()
        .with_registry(registry)
        .with_strand(stranded)
        .run(stream)
}

enum Step {
    Fused(Record),
    Disjoint(Record, Record),
}

struct FusionIter {
    records: RecordIter,
    acc: Option<Record>,
    aggregator: FieldAggregator,
    chr_idx: Option<usize>,
    strand_idx: Option<usize>,
    read: usize,
    written: usize,
}

impl FusionIter {
    fn same_field(idx: Option<usize>, a: &Record, b: &Record) -> bool {
        idx.map_or(true, |i| a.values()[i] == b.values()[i])
    }

    /// Fold `next` into `acc` if they overlap, else hand both back.
    fn try_fuse(&self, acc: Record, next: Record) -> Result<Step> {
        let acc_end = acc.coord(1, END)?;
        let next_start = next.coord(0, START)?;
        let overlaps = next_start < acc_end
            && Self::same_field(self.chr_idx, &acc, &next)
            && Self::same_field(self.strand_idx, &acc, &next);
        if !overlaps {
            return Ok(Step::Disjoint(acc, next));
        }

        let end = acc_end.max(next.coord(1, END)?);
        let rest = self.aggregator.combine(&acc.values()[2..], &next.values()[2..])?;
        let mut values = Vec::with_capacity(acc.len());
        values.push(acc.values()[0].clone());
        values.push(Value::Int(end));
        values.extend(rest);
        Ok(Step::Fused(Record::new(values)))
    }

    fn emit(&mut self, record: Record) -> Option<Result<Record>> {
        self.written += 1;
        Some(Ok(record))
    }
}

impl Iterator for FusionIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = match self.records.next() {
                Some(Ok(r)) => r,
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    let last = self.acc.take()?;
                    self.written += 1;
                    debug!("fusion: {} features in, {} out", self.read, self.written);
                    return Some(Ok(last));
                }
            };
            self.read += 1;
            let Some(acc) = self.acc.take() else {
                self.acc = Some(next);
                continue;
            };
            match self.try_fuse(acc, next) {
                Ok(Step::Fused(fused)) => self.acc = Some(fused),
                Ok(Step::Disjoint(done, next)) => {
                    self.acc = Some(next);
                    return self.emit(done);
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
