//! Cobbling: cutting overlapping features into disjoint fragments.
//!
//! Where features overlap, the overlap becomes its own fragment whose fields
//! are the aggregation of every covering feature; the uncovered parts keep
//! the fields of their single source. Genome browsers that cannot draw
//! overlapping quantitative features (e.g. both DNA strands at once) need
//! this.
//!
//! # Algorithm
//!
//! A list of pending fragments is kept, ordered left to right. Each
//! incoming feature `x` is tested against the pending fragments leftmost
//! first. An intersection with fragment `y` replaces `y` by one to three
//! fragments and may leave a `rest` of `x` beyond `y.end`, which carries on
//! against the following fragments and is appended if it survives the scan.
//! Fragments that no later feature can reach (ending at or before the
//! incoming start, or compatible with an incoming feature that cut nothing)
//! are retired, and emitted in start order once every fragment still pending
//! starts at or after them. With `stranded`, fragments of the two strands
//! share the pending list without cutting each other.
//!
//! With `scored`, each fragment remembers its sources' lengths and scores.
//! At flush its score becomes `sum(score_i * len(fragment) / len(source_i))`,
//! so a feature's score is shared among its fragments in proportion to their
//! lengths.
//!
//! # Requirements
//!
//! Input MUST be sorted by chromosome, then by start position.

use super::aggregate::{AggregateRegistry, Aggregation, FieldAggregator};
use super::ordered::{Ordered, StreamTransform};
use super::projection::reorder;
use crate::error::{FeatureError, Result};
use crate::record::{Record, Value};
use crate::schema::{CHR, END, SCORE, START, STRAND};
use crate::stream::{FeatureStream, RecordIter};
use crate::validation::validated;
use log::{debug, trace};
use std::collections::VecDeque;

/// Cobble command configuration.
#[derive(Debug, Clone, Default)]
pub struct CobbleCommand {
    /// Only cut features of the same strand against each other
    pub stranded: bool,
    /// Share each source score among its fragments by length
    pub scored: bool,
    registry: AggregateRegistry,
}

impl CobbleCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strand(mut self, stranded: bool) -> Self {
        self.stranded = stranded;
        self
    }

    pub fn with_scored(mut self, scored: bool) -> Self {
        self.scored = scored;
        self
    }

    /// Override how one field is combined on overlaps.
    pub fn with_aggregate(mut self, field: impl Into<String>, aggregation: Aggregation) -> Self {
        self.registry.set(field, aggregation);
        self
    }

    pub fn with_registry(mut self, registry: AggregateRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Cobble one stream, keeping its field order.
    pub fn run(&self, stream: FeatureStream) -> Result<FeatureStream> {
        Ordered::new(self.clone()).apply(stream)
    }

    fn cobble(&self, stream: FeatureStream) -> Result<FeatureStream> {
        let leading: &[&str] = if self.scored {
            &[START, END, SCORE]
        } else {
            &[START, END]
        };
        if self.scored && !stream.schema().contains(SCORE) {
            return Err(FeatureError::Schema(format!(
                "scored cobble needs a '{}' field (have {})",
                SCORE,
                stream.schema()
            )));
        }
        let stream = reorder(stream, leading, false)?;
        let schema = stream.schema().clone();
        let fields = &schema.fields()[2..];

        let strand_idx = if self.stranded {
            let idx = fields.iter().position(|f| f == STRAND).ok_or_else(|| {
                FeatureError::Schema(format!(
                    "stranded cobble needs a '{}' field (have {})",
                    STRAND, schema
                ))
            })?;
            Some(idx)
        } else {
            None
        };
        let chr_idx = fields.iter().position(|f| f == CHR);

        let registry = if self.scored {
            // Placeholder while cutting; recomputed from the sources at flush.
            self.registry.clone().with(SCORE, Aggregation::First)
        } else {
            self.registry.clone()
        };
        let aggregator = registry.resolve(fields);
        debug!(
            "cobble over {} (stranded: {}, scored: {})",
            schema, self.stranded, self.scored
        );

        let stream = validated(stream)?;
        let (schema, records) = stream.into_parts();
        Ok(FeatureStream::new(
            schema,
            CobbleIter {
                records,
                aggregator,
                chr_idx,
                strand_idx,
                scored: self.scored,
                pending: Vec::new(),
                finished: Vec::new(),
                ready: VecDeque::new(),
                next_id: 0,
                done: false,
            },
        ))
    }
}

impl StreamTransform for CobbleCommand {
    fn transform(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        inputs.into_iter().map(|s| self.cobble(s)).collect()
    }
}

/// Cobble `stream` with the given aggregation rules.
pub fn cobble(
    stream: FeatureStream,
    registry: AggregateRegistry,
    stranded: bool,
    scored: bool,
) -> Result<FeatureStream> {
    CobbleCommand::new()
        .with_registry(registry)
        .with_strand(stranded)
        .with_scored(scored)
        .run(stream)
}

/// An input feature contributing to a fragment.
#[derive(Debug, Clone, Copy)]
struct Source {
    id: usize,
    len: i64,
    score: f64,
}

#[derive(Debug, Clone)]
struct Fragment {
    start: i64,
    end: i64,
    /// Every non-coordinate field, in schema order.
    fields: Vec<Value>,
    sources: Vec<Source>,
}

impl Fragment {
    fn span(&self, start: i64, end: i64) -> Fragment {
        Fragment {
            start,
            end,
            fields: self.fields.clone(),
            sources: self.sources.clone(),
        }
    }

    fn ids(&self) -> Vec<usize> {
        self.sources.iter().map(|s| s.id).collect()
    }
}

/// Result of cutting a pending fragment by an incoming one.
struct Cut {
    replace: Vec<Fragment>,
    rest: Option<Fragment>,
}

struct CobbleIter {
    records: RecordIter,
    aggregator: FieldAggregator,
    chr_idx: Option<usize>,
    strand_idx: Option<usize>,
    scored: bool,
    pending: Vec<Fragment>,
    /// Retired fragments waiting for their turn in start order.
    finished: Vec<Fragment>,
    ready: VecDeque<Record>,
    next_id: usize,
    done: bool,
}

impl CobbleIter {
    fn fragment(&mut self, record: Record) -> Result<Fragment> {
        let start = record.coord(0, START)?;
        let end = record.coord(1, END)?;
        let fields = record.values()[2..].to_vec();
        let score = if self.scored {
            fields[0].as_f64().ok_or_else(|| {
                FeatureError::type_error(SCORE, format!("cannot share a {} score", fields[0].type_name()))
            })?
        } else {
            0.0
        };
        let id = self.next_id;
        self.next_id += 1;
        Ok(Fragment {
            start,
            end,
            fields,
            sources: vec![Source {
                id,
                len: end - start,
                score,
            }],
        })
    }

    fn compatible(&self, a: &Fragment, b: &Fragment) -> bool {
        let same = |idx: Option<usize>| idx.map_or(true, |i| a.fields[i] == b.fields[i]);
        same(self.chr_idx) && same(self.strand_idx)
    }

    /// Cut pending fragment `a` by incoming `b`, or `None` if disjoint.
    fn intersect(&self, a: &Fragment, b: &Fragment) -> Result<Option<Cut>> {
        if !(b.start < a.end && a.start < b.end) {
            return Ok(None);
        }
        let both = Fragment {
            start: 0,
            end: 0,
            fields: self.aggregator.combine(&a.fields, &b.fields)?,
            sources: a.sources.iter().chain(b.sources.iter()).copied().collect(),
        };
        let (a0, a1, b0, b1) = (a.start, a.end, b.start, b.end);

        let mut rest = None;
        let replace = if b1 < a1 {
            if b0 == a0 {
                vec![both.span(b0, b1), a.span(b1, a1)]
            } else if b0 < a0 {
                vec![b.span(b0, a0), both.span(a0, b1), a.span(b1, a1)]
            } else {
                vec![a.span(a0, b0), both.span(b0, b1), a.span(b1, a1)]
            }
        } else if b1 == a1 {
            if b0 == a0 {
                vec![both.span(a0, a1)]
            } else if b0 < a0 {
                vec![b.span(b0, a0), both.span(a0, b1)]
            } else {
                vec![a.span(a0, b0), both.span(b0, b1)]
            }
        } else {
            rest = Some(b.span(a1, b1));
            if b0 == a0 {
                vec![both.span(a0, a1)]
            } else if b0 < a0 {
                vec![b.span(b0, a0), both.span(a0, a1)]
            } else {
                vec![a.span(a0, b0), both.span(b0, a1)]
            }
        };
        Ok(Some(Cut { replace, rest }))
    }

    fn push(&mut self, record: Record) -> Result<()> {
        let x = self.fragment(record)?;
        let start = x.start;
        let new_chrom = match (self.chr_idx, self.pending.first()) {
            (Some(ci), Some(first)) => first.fields[ci] != x.fields[ci],
            _ => false,
        };
        if new_chrom {
            self.finish();
        }

        let mut incoming = Some(x);
        let mut intersected = false;
        let mut i = 0;
        while i < self.pending.len() {
            let Some(x) = incoming.as_ref() else { break };
            if !self.compatible(&self.pending[i], x) {
                i += 1;
                continue;
            }
            match self.intersect(&self.pending[i], x)? {
                Some(cut) => {
                    intersected = true;
                    let k = cut.replace.len();
                    self.pending.splice(i..=i, cut.replace);
                    i += k;
                    incoming = cut.rest;
                }
                None => i += 1,
            }
        }

        match (intersected, incoming) {
            (false, Some(x)) => {
                self.retire(start, Some(&x));
                self.pending.push(x);
            }
            (true, Some(rest)) => {
                self.retire(start, None);
                self.pending.push(rest);
            }
            (_, None) => self.retire(start, None),
        }
        self.release(false);
        Ok(())
    }

    /// Move out of `pending` the fragments ending at or before `start`, and
    /// those compatible with `unmatched`, a feature that cut nothing.
    fn retire(&mut self, start: i64, unmatched: Option<&Fragment>) {
        let pending = std::mem::take(&mut self.pending);
        let (done, keep): (Vec<Fragment>, Vec<Fragment>) = pending.into_iter().partition(|y| {
            y.end <= start || unmatched.map_or(false, |x| self.compatible(y, x))
        });
        self.pending = keep;
        self.finished.extend(done);
    }

    /// Emit retired fragments that start no later than anything still pending
    /// (all of them if `everything`).
    fn release(&mut self, everything: bool) {
        if self.finished.is_empty() {
            return;
        }
        self.finished.sort_by_key(|f| (f.start, f.end));
        let floor = self.pending.iter().map(|f| f.start).min();
        let n = match (everything, floor) {
            (false, Some(floor)) => self.finished.partition_point(|f| f.start <= floor),
            _ => self.finished.len(),
        };
        if n == 0 {
            return;
        }
        debug!("cobble: flushing {} fragments", n);
        let done: Vec<Fragment> = self.finished.drain(..n).collect();
        for frag in done {
            self.emit(frag);
        }
    }

    /// Retire and emit everything.
    fn finish(&mut self) {
        self.finished.append(&mut self.pending);
        self.release(true);
    }

    fn emit(&mut self, frag: Fragment) {
        trace!(
            "fragment {}-{} from sources {:?}",
            frag.start,
            frag.end,
            frag.ids()
        );
        let mut values = Vec::with_capacity(frag.fields.len() + 2);
        values.push(Value::Int(frag.start));
        values.push(Value::Int(frag.end));
        values.extend(frag.fields);
        if self.scored {
            let len = (frag.end - frag.start) as f64;
            let share = frag
                .sources
                .iter()
                .fold(0.0, |acc, s| acc + s.score * len / s.len as f64);
            values[2] = Value::Float(share);
        }
        self.ready.push_back(Record::new(values));
    }
}

impl Iterator for CobbleIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(r) = self.ready.pop_front() {
                return Some(Ok(r));
            }
            if self.done {
                return None;
            }
            match self.records.next() {
                Some(Ok(record)) => {
                    if let Err(e) = self.push(record) {
                        self.done = true;
                        return Some(Err(e));
                    }
                }
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.finish();
                    self.done = true;
                }
            }
        }
    }
}
