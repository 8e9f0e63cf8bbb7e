//! Sort command implementation.
//!
//! Records are ordered by a list of key fields (default `chr`, `start`,
//! `end`). When a chromosome order is given, `chr` values are replaced by
//! their rank before comparison: ranked chromosomes come first, in the given
//! order, and unknown chromosomes follow in their natural order.
//!
//! Keys are pre-computed once per record to avoid repeated hash lookups
//! during comparison. Ties keep input order (stable sort).

use crate::error::Result;
use crate::genome::Genome;
use crate::record::{Record, Value};
use crate::schema::{CHR, END, START};
use crate::stream::FeatureStream;
use log::debug;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// Sort command configuration.
#[derive(Debug, Clone)]
pub struct SortCommand {
    /// Key fields, most significant first
    pub fields: Vec<String>,
    /// Reverse the final order
    pub reverse: bool,
    /// Chromosome name -> rank
    chrom_order: Option<FxHashMap<String, i64>>,
}

impl Default for SortCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SortCommand {
    pub fn new() -> Self {
        Self {
            fields: vec![CHR.to_string(), START.to_string(), END.to_string()],
            reverse: false,
            chrom_order: None,
        }
    }

    pub fn with_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Rank chromosomes in the given order. Unknown chromosomes sort after
    /// all known ones.
    pub fn with_chrom_order<S: AsRef<str>>(mut self, order: &[S]) -> Self {
        let ranks = order
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_ref().to_string(), i as i64))
            .collect();
        self.chrom_order = Some(ranks);
        self
    }

    /// Chromosomes will be sorted in the order they appear in the genome file.
    pub fn with_genome(self, genome: &Genome) -> Self {
        self.with_chrom_order(&genome.chrom_order())
    }

    pub fn with_reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    /// Materialize and sort the stream. The result can be reset.
    pub fn run(&self, stream: FeatureStream) -> Result<FeatureStream> {
        let schema = stream.schema().clone();
        let key_idx: Vec<(usize, bool)> = self
            .fields
            .iter()
            .filter_map(|f| schema.position(f).map(|i| (i, f == CHR)))
            .collect();

        let records = stream.collect_records()?;
        debug!(
            "sorting {} records on {:?} (reverse: {})",
            records.len(),
            self.fields,
            self.reverse
        );

        let mut keyed: Vec<(Vec<Value>, Record)> = records
            .into_iter()
            .map(|r| (self.sort_key(&r, &key_idx), r))
            .collect();
        keyed.sort_by(|a, b| compare_keys(&a.0, &b.0));
        if self.reverse {
            keyed.reverse();
        }

        FeatureStream::from_records(schema, keyed.into_iter().map(|(_, r)| r).collect())
    }

    fn sort_key(&self, record: &Record, key_idx: &[(usize, bool)]) -> Vec<Value> {
        key_idx
            .iter()
            .map(|&(i, is_chrom)| {
                let v = &record.values()[i];
                if !is_chrom {
                    return v.clone();
                }
                match (&self.chrom_order, v.as_str()) {
                    (Some(order), Some(name)) => match order.get(name) {
                        Some(&rank) => Value::Int(rank),
                        None => v.clone(),
                    },
                    _ => v.clone(),
                }
            })
            .collect()
    }
}

#[inline]
fn compare_keys(a: &[Value], b: &[Value]) -> Ordering {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| x.sort_cmp(y))
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

/// Sort `stream` on `fields`, ranking `chr` by `chrom_order` if given.
pub fn sorted_stream<S: AsRef<str>>(
    stream: FeatureStream,
    fields: &[S],
    chrom_order: Option<&[String]>,
    reverse: bool,
) -> Result<FeatureStream> {
    let mut cmd = SortCommand::new().with_reverse(reverse);
    if !fields.is_empty() {
        cmd = cmd.with_fields(fields);
    }
    if let Some(order) = chrom_order {
        cmd = cmd.with_chrom_order(order);
    }
    cmd.run(stream)
}
