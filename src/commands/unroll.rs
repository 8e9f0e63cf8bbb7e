//! Per-base expansion of features over regions.
//!
//! For every base of every region one record is produced: the requested
//! fields of the feature covering that base, or a zero record where no
//! feature does. Each region of `[start, end)` yields exactly `end - start`
//! records.
//!
//! A single cursor over the input is shared by all regions, so the input
//! must be ordered like the regions. A feature running past the end of a
//! region stays available to the next one.

use crate::error::{FeatureError, Result};
use crate::record::{Record, Value};
use crate::schema::{CHR, END, SCORE, START};
use crate::stream::{FeatureStream, RecordIter};
use crate::validation::validated;
use log::debug;
use std::iter::Peekable;

/// One region to expand, `[start, end)`, optionally on a chromosome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: Option<String>,
    pub start: i64,
    pub end: i64,
}

impl Region {
    pub fn new(start: i64, end: i64) -> Self {
        Self {
            chrom: None,
            start,
            end,
        }
    }

    pub fn on(chrom: impl Into<String>, start: i64, end: i64) -> Self {
        Self {
            chrom: Some(chrom.into()),
            start,
            end,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        (self.end - self.start).max(0) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where the regions come from.
pub enum Regions {
    Single(i64, i64),
    List(Vec<Region>),
    /// A stream with `start`, `end` and optionally `chr` fields.
    Stream(FeatureStream),
}

impl Regions {
    fn materialize(self) -> Result<Vec<Region>> {
        match self {
            Regions::Single(start, end) => Ok(vec![Region::new(start, end)]),
            Regions::List(list) => Ok(list),
            Regions::Stream(stream) => {
                let schema = stream.schema();
                let start_idx = schema.index_of(START)?;
                let end_idx = schema.index_of(END)?;
                let chr_idx = schema.position(CHR);
                stream
                    .map(|r| {
                        let r = r?;
                        Ok(Region {
                            chrom: chr_idx.map(|i| r.values()[i].render()),
                            start: r.coord(start_idx, START)?,
                            end: r.coord(end_idx, END)?,
                        })
                    })
                    .collect()
            }
        }
    }
}

impl From<(i64, i64)> for Regions {
    fn from((start, end): (i64, i64)) -> Self {
        Regions::Single(start, end)
    }
}

impl From<Vec<Region>> for Regions {
    fn from(list: Vec<Region>) -> Self {
        Regions::List(list)
    }
}

impl From<FeatureStream> for Regions {
    fn from(stream: FeatureStream) -> Self {
        Regions::Stream(stream)
    }
}

/// Unroll command configuration.
#[derive(Debug, Clone)]
pub struct UnrollCommand {
    /// Fields reported first for each base
    pub fields: Vec<String>,
}

impl Default for UnrollCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl UnrollCommand {
    pub fn new() -> Self {
        Self {
            fields: vec![SCORE.to_string()],
        }
    }

    pub fn with_fields<S: AsRef<str>>(mut self, fields: &[S]) -> Self {
        self.fields = fields.iter().map(|f| f.as_ref().to_string()).collect();
        self
    }

    /// Expand `stream` over `regions`.
    ///
    /// The output holds the requested fields followed by every other
    /// non-coordinate field (`chr` is dropped too when regions carry
    /// chromosomes).
    pub fn run(&self, stream: FeatureStream, regions: impl Into<Regions>) -> Result<FeatureStream> {
        let regions = regions.into().materialize()?;
        let with_chrom = match regions.first() {
            Some(r) => r.chrom.is_some(),
            None => false,
        };
        if regions.iter().any(|r| r.chrom.is_some() != with_chrom) {
            return Err(FeatureError::Schema(
                "regions must all have a chromosome or none".to_string(),
            ));
        }

        let schema = stream.schema();
        let start_idx = schema.index_of(START)?;
        let end_idx = schema.index_of(END)?;
        let chr_idx = if with_chrom {
            Some(schema.index_of(CHR)?)
        } else {
            None
        };
        let mut out_idx = schema.indices_of(&self.fields)?;
        for i in 0..schema.len() {
            if i != start_idx && i != end_idx && Some(i) != chr_idx && !out_idx.contains(&i) {
                out_idx.push(i);
            }
        }
        let out_schema = schema.project(&out_idx)?;
        debug!(
            "unroll over {} regions into {} (by chromosome: {})",
            regions.len(),
            out_schema,
            with_chrom
        );

        let stream = validated(stream)?;
        let (_, records) = stream.into_parts();
        let iter = UnrollIter {
            cursor: records.peekable(),
            regions,
            region: 0,
            pos: None,
            start_idx,
            end_idx,
            chr_idx,
            out_idx,
            requested: self.fields.len(),
            sentinel: None,
        };
        Ok(FeatureStream::new(out_schema, iter))
    }
}

/// Expand `stream` over `regions`, reporting `fields` first.
pub fn unroll<S: AsRef<str>>(stream: FeatureStream, regions: impl Into<Regions>, fields: &[S]) -> Result<FeatureStream> {
    UnrollCommand::new().with_fields(fields).run(stream, regions)
}

/// What the cursor holds for the current base.
enum Cover {
    Feature(Record),
    Nothing,
}

struct UnrollIter {
    cursor: Peekable<RecordIter>,
    regions: Vec<Region>,
    region: usize,
    /// Scan position inside the current region.
    pos: Option<i64>,
    start_idx: usize,
    end_idx: usize,
    chr_idx: Option<usize>,
    out_idx: Vec<usize>,
    requested: usize,
    sentinel: Option<Record>,
}

fn same_chrom(value: &Value, chrom: &str) -> bool {
    match value {
        Value::Text(s) => s == chrom,
        other => other.render() == chrom,
    }
}

impl UnrollIter {
    /// Zero record shaped like the first feature of the input.
    fn init_sentinel(&mut self) -> Result<()> {
        let values = match self.cursor.peek() {
            Some(Ok(first)) => self
                .out_idx
                .iter()
                .map(|&i| first.values()[i].zero_like())
                .collect(),
            Some(Err(_)) => {
                return match self.cursor.next() {
                    Some(Err(e)) => Err(e),
                    _ => Ok(()),
                }
            }
            None => (0..self.out_idx.len())
                .map(|n| if n < self.requested { Value::Int(0) } else { Value::Null })
                .collect(),
        };
        self.sentinel = Some(Record::new(values));
        Ok(())
    }

    /// Advance the cursor to the feature relevant at `pos`.
    fn cover(&mut self, pos: i64) -> Result<Cover> {
        let region_chrom = self.regions[self.region].chrom.clone();
        let later = &self.regions[self.region + 1..];
        loop {
            let skip = match self.cursor.peek() {
                None => return Ok(Cover::Nothing),
                Some(Err(_)) => match self.cursor.next() {
                    Some(Err(e)) => return Err(e),
                    _ => continue,
                },
                Some(Ok(x)) => {
                    let other_chrom = match (self.chr_idx, region_chrom.as_deref()) {
                        (Some(ci), Some(chrom)) if !same_chrom(&x.values()[ci], chrom) => Some(&x.values()[ci]),
                        _ => None,
                    };
                    match other_chrom {
                        // Its region is still ahead: zero-fill until then.
                        Some(c) if later.iter().filter_map(|r| r.chrom.as_deref()).any(|r| same_chrom(c, r)) => {
                            return Ok(Cover::Nothing)
                        }
                        Some(_) => true,
                        None => x.coord(self.end_idx, END)? <= pos,
                    }
                }
            };
            if !skip {
                break;
            }
            self.cursor.next();
        }
        match self.cursor.peek() {
            Some(Ok(x)) => {
                if x.coord(self.start_idx, START)? <= pos {
                    Ok(Cover::Feature(x.project(&self.out_idx)))
                } else {
                    Ok(Cover::Nothing)
                }
            }
            _ => Ok(Cover::Nothing),
        }
    }
}

impl Iterator for UnrollIter {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sentinel.is_none() {
            if let Err(e) = self.init_sentinel() {
                self.region = self.regions.len();
                return Some(Err(e));
            }
        }
        loop {
            let region = self.regions.get(self.region)?;
            let pos = *self.pos.get_or_insert(region.start);
            if pos >= region.end {
                self.region += 1;
                self.pos = None;
                continue;
            }
            self.pos = Some(pos + 1);
            return match self.cover(pos) {
                Ok(Cover::Feature(r)) => Some(Ok(r)),
                Ok(Cover::Nothing) => self.sentinel.clone().map(Ok),
                Err(e) => {
                    self.region = self.regions.len();
                    Some(Err(e))
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rec;

    #[test]
    fn test_unroll_single_region() {
        let s = FeatureStream::from_rows(
            &["start", "end", "score", "name"],
            vec![rec![10, 12, 0.5, "a"], rec![14, 15, 1.2, "b"]],
        )
        .unwrap();
        let res = unroll(s, (9, 16), &["score"]).unwrap();
        assert_eq!(res.fields(), &["score", "name"]);
        let zero = rec![0.0, Value::Null];
        assert_eq!(
            res.collect_records().unwrap(),
            vec![
                zero.clone(),
                rec![0.5, "a"],
                rec![0.5, "a"],
                zero.clone(),
                zero.clone(),
                rec![1.2, "b"],
                zero,
            ]
        );
    }

    #[test]
    fn test_unroll_exact_cover() {
        let s = FeatureStream::from_rows(
            &["start", "end", "score"],
            vec![rec![0, 1, 5], rec![1, 2, 9], rec![2, 3, 11]],
        )
        .unwrap();
        let res = UnrollCommand::new().run(s, (0, 3)).unwrap();
        assert_eq!(res.collect_records().unwrap(), vec![rec![5], rec![9], rec![11]]);
    }

    #[test]
    fn test_unroll_feature_spans_regions() {
        let s = FeatureStream::from_rows(&["start", "end", "score"], vec![rec![2, 8, 3]]).unwrap();
        let regions = vec![Region::new(0, 4), Region::new(4, 6)];
        let res = unroll(s, regions, &["score"]).unwrap();
        assert_eq!(
            res.collect_records().unwrap(),
            vec![rec![0], rec![0], rec![3], rec![3], rec![3], rec![3]]
        );
    }

    #[test]
    fn test_unroll_by_chromosome() {
        let s = FeatureStream::from_rows(
            &["chr", "start", "end", "score"],
            vec![
                rec!["chr1", 1, 3, 1],
                rec!["chr2", 0, 2, 2],
                rec!["chr3", 0, 1, 3],
            ],
        )
        .unwrap();
        // chr2 has no region and is skipped; chr3 waits for its region.
        let regions = vec![Region::on("chr1", 0, 3), Region::on("chr3", 0, 2)];
        let res = unroll(s, regions, &["score"]).unwrap();
        assert_eq!(res.fields(), &["score"]);
        assert_eq!(
            res.collect_records().unwrap(),
            vec![rec![0], rec![1], rec![1], rec![3], rec![0]]
        );
    }

    #[test]
    fn test_unroll_later_chromosome_zero_fills() {
        let s = FeatureStream::from_rows(
            &["chr", "start", "end", "score"],
            vec![rec!["chr2", 0, 2, 2]],
        )
        .unwrap();
        let regions = vec![Region::on("chr1", 0, 2), Region::on("chr2", 0, 2)];
        let res = unroll(s, regions, &["score"]).unwrap();
        assert_eq!(
            res.collect_records().unwrap(),
            vec![rec![0], rec![0], rec![2], rec![2]]
        );
    }

    #[test]
    fn test_unroll_region_stream() {
        let s = FeatureStream::from_rows(&["start", "end", "score"], vec![rec![5, 7, 1.5]]).unwrap();
        let regions = FeatureStream::from_rows(&["start", "end"], vec![rec![4, 6], rec![6, 8]]).unwrap();
        let res = unroll(s, regions, &["score"]).unwrap();
        assert_eq!(
            res.collect_records().unwrap(),
            vec![rec![0.0], rec![1.5], rec![1.5], rec![0.0]]
        );
    }

    #[test]
    fn test_unroll_empty_stream() {
        let s = FeatureStream::from_rows(&["start", "end", "score", "name"], vec![]).unwrap();
        let res = unroll(s, (0, 2), &["score"]).unwrap();
        assert_eq!(
            res.collect_records().unwrap(),
            vec![rec![0, Value::Null], rec![0, Value::Null]]
        );
    }

    #[test]
    fn test_unroll_missing_field() {
        let s = FeatureStream::from_rows(&["start", "end"], vec![]).unwrap();
        assert!(matches!(unroll(s, (0, 2), &["score"]), Err(FeatureError::Schema(_))));
    }

    #[test]
    fn test_unroll_mixed_regions_rejected() {
        let s = FeatureStream::from_rows(&["chr", "start", "end", "score"], vec![]).unwrap();
        let regions = vec![Region::on("chr1", 0, 2), Region::new(0, 2)];
        assert!(unroll(s, regions, &["score"]).is_err());
    }
}
