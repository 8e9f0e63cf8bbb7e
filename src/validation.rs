//! Coordinate-order validation.
//!
//! Fusion, cobble and unroll assume input ordered by `(chr, start)`. They do
//! not check it themselves; when [`config::is_validate_order`] is set they
//! wrap their input with [`validated`], which reports the first record out of
//! order as [`FeatureError::OrderViolation`].
//!
//! Any consistent chromosome order is accepted: records of one chromosome
//! must be contiguous and positions non-decreasing within it.

use crate::config;
use crate::error::{FeatureError, Result};
use crate::record::{Record, Value};
use crate::schema::{CHR, START};
use crate::stream::FeatureStream;
use rustc_hash::FxHashSet;

/// Inline validator fed one `(chrom, start)` pair per record.
#[derive(Debug, Default)]
pub struct OrderValidator {
    prev_chrom: Option<String>,
    prev_start: i64,
    seen_chroms: FxHashSet<String>,
    record_count: usize,
}

impl OrderValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that this record keeps the order established so far.
    #[inline]
    pub fn validate(&mut self, chrom: Option<&str>, start: i64) -> Result<()> {
        self.record_count += 1;
        let chrom = chrom.unwrap_or("");

        if let Some(ref pc) = self.prev_chrom {
            if chrom != pc {
                if self.seen_chroms.contains(chrom) {
                    return Err(FeatureError::OrderViolation {
                        record: self.record_count,
                        message: format!(
                            "chromosome '{}' was seen earlier (chromosomes must be contiguous)",
                            chrom
                        ),
                    });
                }
                self.seen_chroms.insert(pc.clone());
            } else if start < self.prev_start {
                return Err(FeatureError::OrderViolation {
                    record: self.record_count,
                    message: format!(
                        "start {} comes after {} on '{}'",
                        start, self.prev_start, chrom
                    ),
                });
            }
        }

        if self.prev_chrom.as_deref() != Some(chrom) {
            self.prev_chrom = Some(chrom.to_string());
        }
        self.prev_start = start;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }
}

fn chrom_key(record: &Record, idx: Option<usize>) -> Option<String> {
    idx.and_then(|i| record.get(i)).map(Value::render)
}

/// Wrap `stream` with an order check if validation is enabled.
pub fn validated(stream: FeatureStream) -> Result<FeatureStream> {
    if !config::is_validate_order() {
        return Ok(stream);
    }
    let start_idx = stream.schema().index_of(START)?;
    let chr_idx = stream.schema().position(CHR);
    let mut validator = OrderValidator::new();
    Ok(stream.filter_records(move |rec| {
        let start = rec.coord(start_idx, START)?;
        let chrom = chrom_key(rec, chr_idx);
        validator.validate(chrom.as_deref(), start)?;
        Ok(true)
    }))
}

/// Consume `stream`, returning an error at the first out-of-order record.
pub fn verify_sorted(stream: FeatureStream) -> Result<()> {
    let start_idx = stream.schema().index_of(START)?;
    let chr_idx = stream.schema().position(CHR);
    let mut validator = OrderValidator::new();
    for rec in stream {
        let rec = rec?;
        let chrom = chrom_key(&rec, chr_idx);
        validator.validate(chrom.as_deref(), rec.coord(start_idx, START)?)?;
    }
    Ok(())
}
