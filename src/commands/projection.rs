//! Schema-aware field projections.
//!
//! Every function here resolves its field names against the input schema up
//! front (so a missing field is reported immediately) and returns a new lazy
//! stream. Per-record work never looks a name up again.

use crate::error::{FeatureError, Result};
use crate::genome::ChromTable;
use crate::record::{Record, Value};
use crate::schema::{Schema, CHR, END, NAME, START};
use crate::stream::FeatureStream;
use log::{debug, warn};
use std::fmt;
use std::rc::Rc;

/// Move `fields` to the front of the schema (or to the back if `last`).
///
/// The remaining fields keep their relative order. The stream is returned
/// untouched when the fields are already in place.
pub fn reorder<S: AsRef<str>>(stream: FeatureStream, fields: &[S], last: bool) -> Result<FeatureStream> {
    let schema = stream.schema();
    let wanted = schema.indices_of(fields)?;

    let in_place = if last {
        let offset = schema.len() - wanted.len();
        wanted.iter().enumerate().all(|(n, &i)| i == offset + n)
    } else {
        wanted.iter().enumerate().all(|(n, &i)| i == n)
    };
    if in_place {
        return Ok(stream);
    }

    let rest = (0..schema.len()).filter(|i| !wanted.contains(i));
    let order: Vec<usize> = if last {
        rest.chain(wanted.iter().copied()).collect()
    } else {
        wanted.iter().copied().chain(rest).collect()
    };
    let out_schema = schema.project(&order)?;
    Ok(stream.map_records(out_schema, move |r| Ok(r.project(&order))))
}

/// A condition on one field's value.
#[derive(Clone)]
pub enum Predicate {
    Equals(Value),
    In(Vec<Value>),
    Matches(Rc<dyn Fn(&Value) -> bool>),
}

impl Predicate {
    #[inline]
    pub fn test(&self, value: &Value) -> bool {
        match self {
            Predicate::Equals(v) => v == value,
            Predicate::In(vs) => vs.contains(value),
            Predicate::Matches(f) => f(value),
        }
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Equals(v) => write!(f, "Equals({:?})", v),
            Predicate::In(vs) => write!(f, "In({:?})", vs),
            Predicate::Matches(_) => write!(f, "Matches(..)"),
        }
    }
}

/// Conjunction of per-field predicates.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    rules: Vec<(String, Predicate)>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.rules.push((field.into(), Predicate::Equals(value.into())));
        self
    }

    pub fn one_of<V: Into<Value>>(mut self, field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.rules.push((field.into(), Predicate::In(values)));
        self
    }

    pub fn matching<F>(mut self, field: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        self.rules.push((field.into(), Predicate::Matches(Rc::new(f))));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Keep only `fields` (in that order; all fields if `None`) of the records
/// matching every rule of `selection`.
pub fn select<S: AsRef<str>>(
    stream: FeatureStream,
    fields: Option<&[S]>,
    selection: Selection,
) -> Result<FeatureStream> {
    let schema = stream.schema().clone();
    let keep: Vec<usize> = match fields {
        Some(f) if !f.is_empty() => schema.indices_of(f)?,
        _ => (0..schema.len()).collect(),
    };
    let rules: Vec<(usize, Predicate)> = selection
        .rules
        .into_iter()
        .map(|(f, p)| schema.index_of(&f).map(|i| (i, p)))
        .collect::<Result<_>>()?;

    let out_schema = schema.project(&keep)?;
    let identity = keep.len() == schema.len() && keep.iter().enumerate().all(|(n, &i)| n == i);
    let filtered = if rules.is_empty() {
        stream
    } else {
        stream.filter_records(move |r| Ok(rules.iter().all(|(i, p)| p.test(&r.values()[*i]))))
    };
    if identity {
        return Ok(filtered);
    }
    Ok(filtered.map_records(out_schema, move |r| Ok(r.project(&keep))))
}

/// Append copies of `field` under each of `new_names`.
pub fn duplicate<S: AsRef<str>>(stream: FeatureStream, field: &str, new_names: &[S]) -> Result<FeatureStream> {
    let idx = stream.schema().index_of(field)?;
    let out_schema = stream.schema().extended(new_names)?;
    let copies = new_names.len();
    Ok(stream.map_records(out_schema, move |r| {
        let mut values = r.into_values();
        let v = values[idx].clone();
        values.extend(std::iter::repeat(v).take(copies));
        Ok(Record::new(values))
    }))
}

/// Replace `infields` by a single `outfield`.
///
/// The new value is the `separator`-joined text of the input values, or a
/// tuple of them when `as_group` is set. If `outfield` is one of the
/// untouched fields it is overwritten in place, otherwise it is appended.
pub fn concat_fields<S: AsRef<str>>(
    stream: FeatureStream,
    infields: &[S],
    outfield: &str,
    separator: &str,
    as_group: bool,
) -> Result<FeatureStream> {
    let schema = stream.schema();
    let in_idx = schema.indices_of(infields)?;
    let kept: Vec<usize> = (0..schema.len()).filter(|i| !in_idx.contains(i)).collect();

    let mut out_fields: Vec<String> = kept.iter().map(|&i| schema.fields()[i].clone()).collect();
    let out_pos = match out_fields.iter().position(|f| f == outfield) {
        Some(p) => p,
        None => {
            out_fields.push(outfield.to_string());
            out_fields.len() - 1
        }
    };
    let out_schema = Schema::new(out_fields)?;
    let separator = separator.to_string();

    Ok(stream.map_records(out_schema, move |r| {
        let joined = if as_group {
            Value::Tuple(in_idx.iter().map(|&i| r.values()[i].clone()).collect())
        } else {
            let mut text = String::new();
            for (n, &i) in in_idx.iter().enumerate() {
                if n > 0 {
                    text.push_str(&separator);
                }
                r.values()[i].write_text(&mut text);
            }
            Value::Text(text)
        };
        let mut values: Vec<Value> = kept.iter().map(|&i| r.values()[i].clone()).collect();
        if out_pos == values.len() {
            values.push(joined);
        } else {
            values[out_pos] = joined;
        }
        Ok(Record::new(values))
    }))
}

/// How [`split_field`] interprets the tokens of the input field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitMode {
    /// The n-th token goes to the n-th output field.
    Positional,
    /// Tokens are `key<sep>value` pairs; outputs take the value of their key.
    KeyValue(String),
}

/// Split `infield` into `outfields`; the inverse of [`concat_fields`].
///
/// Text is split on `separator`; a tuple value is split into its members.
/// Output fields already in the schema are overwritten in place, others are
/// appended. Unless `strip_input` is set, `infield` is removed. With
/// `strip_input` it is kept, holding the key/value tokens that were not
/// extracted (positional mode consumes everything and leaves it empty).
///
/// Positional mode fails with an arity error on a record with more tokens
/// than `outfields`; missing tokens are null. In key/value mode, quotes
/// around values are removed and absent keys give empty text.
pub fn split_field<S: AsRef<str>>(
    stream: FeatureStream,
    infield: &str,
    outfields: &[S],
    separator: &str,
    mode: SplitMode,
    strip_input: bool,
) -> Result<FeatureStream> {
    let schema = stream.schema();
    let in_idx = schema.index_of(infield)?;
    let outfields: Vec<String> = outfields.iter().map(|f| f.as_ref().to_string()).collect();
    let drop_input = !strip_input && !outfields.iter().any(|f| f == infield);

    let mut base: Vec<String> = schema.fields().to_vec();
    if drop_input {
        base.remove(in_idx);
    }
    let added: Vec<String> = outfields.iter().filter(|f| !base.contains(f)).cloned().collect();
    base.extend(added.iter().cloned());
    let out_schema = Schema::new(base)?;
    let out_idx = out_schema.indices_of(&outfields)?;
    let residual_idx = if strip_input { Some(in_idx) } else { None };
    let separator = separator.to_string();
    let n_added = added.len();

    Ok(stream.map_records(out_schema, move |r| {
        let mut values = r.into_values();
        let source = if drop_input {
            values.remove(in_idx)
        } else {
            values[in_idx].clone()
        };
        values.extend(std::iter::repeat(Value::Null).take(n_added));

        let tokens: Vec<String> = match &source {
            Value::Tuple(items) => items.iter().map(Value::render).collect(),
            Value::Null => Vec::new(),
            other => other.render().split(separator.as_str()).map(str::to_string).collect(),
        };

        match &mode {
            SplitMode::Positional => {
                if tokens.len() > out_idx.len() {
                    return Err(FeatureError::Arity {
                        expected: out_idx.len(),
                        found: tokens.len(),
                    });
                }
                if let Some(i) = residual_idx {
                    values[i] = Value::Text(String::new());
                }
                for &i in &out_idx {
                    values[i] = Value::Null;
                }
                for (token, &i) in tokens.into_iter().zip(out_idx.iter()) {
                    values[i] = Value::Text(token);
                }
            }
            SplitMode::KeyValue(kv_sep) => {
                let pairs: Vec<(String, String)> = tokens
                    .iter()
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .map(|t| match t.split_once(kv_sep.as_str()) {
                        Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
                        None => (t.to_string(), String::new()),
                    })
                    .collect();
                if let Some(i) = residual_idx {
                    let rest: Vec<String> = pairs
                        .iter()
                        .filter(|(k, _)| !outfields.contains(k))
                        .map(|(k, v)| format!("{}{}{}", k, kv_sep, v))
                        .collect();
                    values[i] = Value::Text(rest.join(&separator));
                }
                // An output named like the input field takes precedence over the residual.
                for (f, &i) in outfields.iter().zip(out_idx.iter()) {
                    let v = pairs
                        .iter()
                        .find(|(k, _)| k == f)
                        .map(|(_, v)| v.trim_matches('"').to_string())
                        .unwrap_or_default();
                    values[i] = Value::Text(v);
                }
            }
        }
        Ok(Record::new(values))
    }))
}

/// Rewrite the `chr` field through an alias table.
///
/// Unresolved identifiers are dropped, or passed through unchanged when
/// `keep_unrecognized` is set. A stream without `chr` is returned as is.
pub fn map_chromosomes(stream: FeatureStream, table: &ChromTable, keep_unrecognized: bool) -> Result<FeatureStream> {
    let Some(ci) = stream.schema().position(CHR) else {
        debug!("map_chromosomes: no '{}' field, stream left unchanged", CHR);
        return Ok(stream);
    };
    let table = table.clone();
    let (schema, records) = stream.into_parts();
    let mut warned = false;
    Ok(FeatureStream::new(
        schema,
        records.filter_map(move |r| {
            let r = match r {
                Ok(r) => r,
                Err(e) => return Some(Err(e)),
            };
            match table.resolve(&r.values()[ci]) {
                Some(name) => {
                    let mut values = r.into_values();
                    values[ci] = Value::from(name);
                    Some(Ok(Record::new(values)))
                }
                None => {
                    if !warned {
                        warn!(
                            "unknown chromosome '{}' ({})",
                            r.values()[ci].render(),
                            if keep_unrecognized { "kept as is" } else { "records dropped" }
                        );
                        warned = true;
                    }
                    keep_unrecognized.then_some(Ok(r))
                }
            }
        }),
    ))
}

/// Keep records whose `fields` all pass the threshold.
///
/// Values must be `>= threshold` (`>` if `strict`), or `<=` (`<`) when
/// `lower` is set. A non-numeric value is a type error.
pub fn score_threshold<S: AsRef<str>>(
    stream: FeatureStream,
    threshold: f64,
    fields: &[S],
    lower: bool,
    strict: bool,
) -> Result<FeatureStream> {
    let idx = stream.schema().indices_of(fields)?;
    let names: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
    let sign = if lower { -1.0 } else { 1.0 };
    Ok(stream.filter_records(move |r| {
        for (&i, name) in idx.iter().zip(names.iter()) {
            let v = r.values()[i].as_f64().ok_or_else(|| {
                FeatureError::type_error(
                    name,
                    format!("cannot threshold a {} value", r.values()[i].type_name()),
                )
            })?;
            let pass = if strict {
                sign * v > sign * threshold
            } else {
                sign * v >= sign * threshold
            };
            if !pass {
                return Ok(false);
            }
        }
        Ok(true)
    }))
}

/// Per-field value transformation.
pub type FieldFn = Box<dyn Fn(&Value) -> Value>;

/// Apply a function to each of the named fields.
pub fn apply(stream: FeatureStream, transforms: Vec<(String, FieldFn)>) -> Result<FeatureStream> {
    let bound: Vec<(usize, FieldFn)> = transforms
        .into_iter()
        .map(|(f, func)| stream.schema().index_of(&f).map(|i| (i, func)))
        .collect::<Result<_>>()?;
    let schema = stream.schema().clone();
    Ok(stream.map_records(schema, move |r| {
        let mut values = r.into_values();
        for (i, func) in &bound {
            values[*i] = func(&values[*i]);
        }
        Ok(Record::new(values))
    }))
}

/// Append a `name` field of the form `chr:start-end`.
pub fn add_name_field(stream: FeatureStream) -> Result<FeatureStream> {
    let idx = stream.schema().indices_of(&[CHR, START, END])?;
    let out_schema = stream.schema().extended(&[NAME])?;
    Ok(stream.map_records(out_schema, move |r| {
        let name = format!(
            "{}:{}-{}",
            r.values()[idx[0]],
            r.values()[idx[1]],
            r.values()[idx[2]]
        );
        let mut values = r.into_values();
        values.push(Value::Text(name));
        Ok(Record::new(values))
    }))
}

/// `n` independent, resettable copies of the remaining records.
///
/// Loads the whole stream in memory.
pub fn copy(stream: FeatureStream, n: usize) -> Result<Vec<FeatureStream>> {
    let schema = stream.schema().clone();
    let records = stream.collect_records()?;
    (0..n)
        .map(|_| FeatureStream::from_records(schema.clone(), records.clone()))
        .collect()
}
