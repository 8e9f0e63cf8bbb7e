//! Field schemas: ordered, unique field names resolved to offsets once per stage.

use crate::error::{FeatureError, Result};
use std::fmt;

pub const CHR: &str = "chr";
pub const START: &str = "start";
pub const END: &str = "end";
pub const NAME: &str = "name";
pub const SCORE: &str = "score";
pub const STRAND: &str = "strand";

/// Ordered list of unique field names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    /// Create a schema, rejecting duplicate names.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        for (i, f) in fields.iter().enumerate() {
            if fields[..i].contains(f) {
                return Err(FeatureError::Schema(format!("duplicate field '{}'", f)));
            }
        }
        Ok(Self { fields })
    }

    /// The usual BED6 layout.
    pub fn bed6() -> Self {
        Self {
            fields: [CHR, START, END, NAME, SCORE, STRAND]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[inline]
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    #[inline]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    #[inline]
    pub fn position(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// Offset of `field`, or a schema error naming the available fields.
    pub fn index_of(&self, field: &str) -> Result<usize> {
        self.position(field)
            .ok_or_else(|| FeatureError::missing_field(field, &self.fields))
    }

    /// Offsets of several distinct fields, in the order requested.
    pub fn indices_of<S: AsRef<str>>(&self, fields: &[S]) -> Result<Vec<usize>> {
        let mut out = Vec::with_capacity(fields.len());
        for f in fields {
            let i = self.index_of(f.as_ref())?;
            if out.contains(&i) {
                return Err(FeatureError::Schema(format!(
                    "field '{}' requested twice",
                    f.as_ref()
                )));
            }
            out.push(i);
        }
        Ok(out)
    }

    /// Schema made of the fields at `indices`, which must not repeat.
    pub fn project(&self, indices: &[usize]) -> Result<Schema> {
        Schema::new(indices.iter().map(|&i| self.fields[i].clone()))
    }

    /// Append new fields, rejecting names already present.
    pub fn extended<S: AsRef<str>>(&self, extra: &[S]) -> Result<Schema> {
        let mut fields = self.fields.clone();
        fields.extend(extra.iter().map(|s| s.as_ref().to_string()));
        Schema::new(fields)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.fields.join(", "))
    }
}
