//! Core record types: scalar field values and fixed-arity records.

use crate::error::{FeatureError, Result};
use std::cmp::Ordering;
use std::fmt;

/// One field value of a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    /// Compound field built by grouping several values.
    Tuple(Vec<Value>),
    Null,
}

impl Value {
    #[inline]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the value; ints are widened to floats.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Tuple(_) => "tuple",
            Value::Null => "null",
        }
    }

    /// The "nothing here" value of the same numeric type: `0`, `0.0`, or null.
    pub fn zero_like(&self) -> Value {
        match self {
            Value::Int(_) => Value::Int(0),
            Value::Float(_) => Value::Float(0.0),
            _ => Value::Null,
        }
    }

    /// Total order used for sorting.
    ///
    /// Null sorts first, then numbers (ints and floats compared numerically),
    /// then text, then tuples (lexicographically by member).
    pub fn sort_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Tuple(a), Value::Tuple(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.sort_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) if a.is_numeric() && b.is_numeric() => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
            Value::Tuple(_) => 3,
        }
    }

    /// Write the textual form of the value into `out`.
    pub fn write_text(&self, out: &mut String) {
        match self {
            Value::Int(v) => out.push_str(itoa::Buffer::new().format(*v)),
            Value::Float(v) => out.push_str(ryu::Buffer::new().format(*v)),
            Value::Text(s) => out.push_str(s),
            Value::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.write_text(out);
                }
            }
            Value::Null => out.push('.'),
        }
    }

    /// Textual form of the value (floats keep a decimal point: `10.0`).
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Tuple(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Strand encoding used throughout: `+` is `1`, `-` is `-1`, anything else `0`.
pub fn strand_from_char(c: char) -> Value {
    match c {
        '+' => Value::Int(1),
        '-' => Value::Int(-1),
        _ => Value::Int(0),
    }
}

/// Inverse of [`strand_from_char`]; non-integer values render as `.`.
pub fn strand_to_char(v: &Value) -> char {
    match v.as_int() {
        Some(s) if s > 0 => '+',
        Some(s) if s < 0 => '-',
        _ => match v.as_str() {
            Some("+") => '+',
            Some("-") => '-',
            _ => '.',
        },
    }
}

/// A feature: a fixed-arity tuple of values co-indexed with a schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record(Vec<Value>);

impl Record {
    #[inline]
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.0
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    #[inline]
    pub fn into_values(self) -> Vec<Value> {
        self.0
    }

    /// Integer coordinate stored at `idx`.
    #[inline]
    pub fn coord(&self, idx: usize, field: &str) -> Result<i64> {
        match self.0.get(idx) {
            Some(Value::Int(v)) => Ok(*v),
            Some(other) => Err(FeatureError::type_error(
                field,
                format!("expected an integer coordinate, found {}", other.type_name()),
            )),
            None => Err(FeatureError::Arity {
                expected: idx + 1,
                found: self.0.len(),
            }),
        }
    }

    /// New record holding the values at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> Record {
        Record(indices.iter().map(|&i| self.0[i].clone()).collect())
    }
}

impl From<Vec<Value>> for Record {
    fn from(values: Vec<Value>) -> Self {
        Record(values)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

/// Build a [`Record`] from a list of values convertible into [`Value`].
///
/// ```
/// use gfstream::rec;
/// let r = rec!["chr1", 10, 20, 0.5];
/// assert_eq!(r.len(), 4);
/// ```
#[macro_export]
macro_rules! rec {
    ($($v:expr),* $(,)?) => {
        $crate::record::Record::new(vec![$($crate::record::Value::from($v)),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_sort_order() {
        assert_eq!(Value::Null.sort_cmp(&Value::Int(-5)), Ordering::Less);
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(1.5)), Ordering::Greater);
        assert_eq!(Value::Int(2).sort_cmp(&Value::Float(2.0)), Ordering::Equal);
        assert_eq!(Value::Int(99).sort_cmp(&Value::from("a")), Ordering::Less);
        assert_eq!(
            Value::from("chr10").sort_cmp(&Value::from("chr2")),
            Ordering::Less
        );
    }

    #[test]
    fn test_render() {
        assert_eq!(Value::Float(10.0).render(), "10.0");
        assert_eq!(Value::Float(0.5).render(), "0.5");
        assert_eq!(Value::Int(-3).render(), "-3");
        assert_eq!(Value::Null.render(), ".");
        assert_eq!(
            Value::Tuple(vec![Value::Float(1.2), Value::from("b")]).render(),
            "1.2,b"
        );
    }

    #[test]
    fn test_coord() {
        let r = rec!["chr1", 10, 20.5];
        assert_eq!(r.coord(1, "start").unwrap(), 10);
        assert!(matches!(
            r.coord(2, "end"),
            Err(FeatureError::AggregationType { .. })
        ));
        assert!(matches!(r.coord(7, "end"), Err(FeatureError::Arity { .. })));
    }

    #[test]
    fn test_strand_roundtrip() {
        for c in ['+', '-', '.'] {
            assert_eq!(strand_to_char(&strand_from_char(c)), c);
        }
    }

    #[test]
    fn test_zero_like() {
        assert_eq!(Value::Float(3.5).zero_like(), Value::Float(0.0));
        assert_eq!(Value::Int(7).zero_like(), Value::Int(0));
        assert_eq!(Value::from("x").zero_like(), Value::Null);
    }
}
