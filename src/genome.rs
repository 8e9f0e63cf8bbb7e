//! Chromosome metadata: sizes, canonical ordering and alias tables.
//!
//! `.genome` files are tab-delimited `chrom\tsize`. Alias files are
//! tab-delimited `name\tid\taccession.version\tsynonym,synonym,...` where
//! every column after the name is optional (empty or `.` means absent).

use crate::error::{FeatureError, Result};
use crate::record::Value;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Chromosome sizes, preserving the order of the input file.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    sizes: FxHashMap<String, u64>,
    order: Vec<String>,
}

impl Genome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a genome file from a path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    /// Parse `chrom\tsize` lines from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut genome = Genome::new();
        for (line_num, line_result) in BufReader::new(reader).lines().enumerate() {
            let line = line_result?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(FeatureError::Parse {
                    line: line_num + 1,
                    message: "Genome file requires two columns: chrom and size".to_string(),
                });
            }
            let size: u64 = fields[1].parse().map_err(|_| FeatureError::Parse {
                line: line_num + 1,
                message: format!("Invalid chromosome size: {}", fields[1]),
            })?;
            genome.insert(fields[0].to_string(), size);
        }
        Ok(genome)
    }

    #[inline]
    pub fn chrom_size(&self, chrom: &str) -> Option<u64> {
        self.sizes.get(chrom).copied()
    }

    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.sizes.contains_key(chrom)
    }

    /// Chromosome names in file order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Owned copy of the canonical ordering, as taken by the sort engine.
    pub fn chrom_order(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a chromosome size (appends to the order if new).
    pub fn insert(&mut self, chrom: String, size: u64) {
        if !self.sizes.contains_key(&chrom) {
            self.order.push(chrom.clone());
        }
        self.sizes.insert(chrom, size);
    }
}

/// Everything known about one chromosome's identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChromInfo {
    pub name: String,
    pub id: Option<i64>,
    pub accession: Option<String>,
    pub version: Option<u32>,
    pub synonyms: Vec<String>,
}

impl ChromInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_accession(mut self, accession: impl Into<String>, version: u32) -> Self {
        self.accession = Some(accession.into());
        self.version = Some(version);
        self
    }

    pub fn with_synonyms<S: Into<String>>(mut self, synonyms: impl IntoIterator<Item = S>) -> Self {
        self.synonyms.extend(synonyms.into_iter().map(Into::into));
        self
    }
}

/// Many-to-one table from chromosome identifiers to canonical names.
#[derive(Debug, Clone, Default)]
pub struct ChromTable {
    by_text: FxHashMap<String, String>,
    by_id: FxHashMap<i64, String>,
    order: Vec<String>,
}

impl ChromTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from chromosome descriptions, registering for each:
    /// the name itself, the name without its `chr` prefix, the numeric id,
    /// `accession.version`, `id_accession.version` and every synonym.
    pub fn from_infos<I: IntoIterator<Item = ChromInfo>>(infos: I) -> Self {
        let mut table = ChromTable::new();
        for info in infos {
            table.add(info);
        }
        table
    }

    pub fn add(&mut self, info: ChromInfo) {
        let name = info.name.clone();
        if !self.order.contains(&name) {
            self.order.push(name.clone());
        }
        self.alias(&name, &name);
        if let Some(short) = name.strip_prefix("chr") {
            if !short.is_empty() {
                self.alias(short, &name);
            }
        }
        if let Some(id) = info.id {
            self.by_id.insert(id, name.clone());
            self.alias(&id.to_string(), &name);
        }
        if let (Some(acc), Some(ver)) = (&info.accession, info.version) {
            let acc_ver = format!("{}.{}", acc, ver);
            if let Some(id) = info.id {
                self.alias(&format!("{}_{}", id, acc_ver), &name);
            }
            self.alias(&acc_ver, &name);
        }
        for syn in &info.synonyms {
            let syn = syn.trim();
            if !syn.is_empty() {
                self.alias(syn, &name);
            }
        }
    }

    /// Register one extra alias for a canonical name.
    pub fn alias(&mut self, alias: &str, canonical: &str) {
        self.by_text.insert(alias.to_string(), canonical.to_string());
    }

    /// Load an alias file (see module docs).
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut table = ChromTable::new();
        for (line_num, line_result) in BufReader::new(reader).lines().enumerate() {
            let line = line_result?;
            let line = line.trim_end();
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split('\t').collect();
            let present = |i: usize| cols.get(i).map(|s| s.trim()).filter(|s| !s.is_empty() && *s != ".");

            let mut info = ChromInfo::new(cols[0].trim());
            if let Some(id) = present(1) {
                info.id = Some(id.parse().map_err(|_| FeatureError::Parse {
                    line: line_num + 1,
                    message: format!("Invalid chromosome id: {}", id),
                })?);
            }
            if let Some(acc) = present(2) {
                let (accession, version) = acc.rsplit_once('.').ok_or_else(|| FeatureError::Parse {
                    line: line_num + 1,
                    message: format!("Expected accession.version, got {}", acc),
                })?;
                let version = version.parse().map_err(|_| FeatureError::Parse {
                    line: line_num + 1,
                    message: format!("Invalid accession version: {}", version),
                })?;
                info = info.with_accession(accession, version);
            }
            if let Some(syns) = present(3) {
                info = info.with_synonyms(syns.split(','));
            }
            table.add(info);
        }
        Ok(table)
    }

    /// Canonical name for an identifier value, if known.
    pub fn resolve(&self, value: &Value) -> Option<&str> {
        match value {
            Value::Int(id) => self.by_id.get(id).map(String::as_str),
            Value::Text(s) => self.by_text.get(s).map(String::as_str),
            _ => None,
        }
    }

    /// Canonical names in insertion order.
    pub fn chrom_order(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
