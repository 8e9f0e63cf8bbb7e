//! Aggregation of non-coordinate fields when features are fused or cobbled.
//!
//! Every field of a merged feature is computed by an [`Aggregation`] applied
//! to the values being merged. Operators always call it pairwise
//! (`[accumulated, incoming]`), so every rule must be reducible that way.

use crate::error::{FeatureError, Result};
use crate::record::Value;
use crate::schema::{CHR, STRAND};
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// User-supplied reducer.
pub type AggregateFn = Rc<dyn Fn(&[Value]) -> Result<Value>>;

/// Rule for merging the values of one field.
#[derive(Clone)]
pub enum Aggregation {
    /// Sum numbers, join text with `|`, concatenate tuples.
    Generic,
    Sum,
    Min,
    Max,
    /// Join the textual forms with a separator.
    Join(String),
    /// Concatenate into one tuple.
    Concat,
    /// The common value if all agree, else the neutral value (`0`, `0.0`, `.`).
    Consensus,
    First,
    Last,
    Custom(AggregateFn),
}

impl fmt::Debug for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Generic => write!(f, "Generic"),
            Aggregation::Sum => write!(f, "Sum"),
            Aggregation::Min => write!(f, "Min"),
            Aggregation::Max => write!(f, "Max"),
            Aggregation::Join(sep) => write!(f, "Join({:?})", sep),
            Aggregation::Concat => write!(f, "Concat"),
            Aggregation::Consensus => write!(f, "Consensus"),
            Aggregation::First => write!(f, "First"),
            Aggregation::Last => write!(f, "Last"),
            Aggregation::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

impl Aggregation {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "generic" => Some(Aggregation::Generic),
            "sum" => Some(Aggregation::Sum),
            "min" => Some(Aggregation::Min),
            "max" => Some(Aggregation::Max),
            "collapse" => Some(Aggregation::Join(",".to_string())),
            "concat" => Some(Aggregation::Concat),
            "consensus" => Some(Aggregation::Consensus),
            "first" => Some(Aggregation::First),
            "last" => Some(Aggregation::Last),
            _ => None,
        }
    }

    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Aggregation::Custom(Rc::new(f))
    }

    /// Reduce `values` of `field` to one value.
    pub fn apply(&self, field: &str, values: &[Value]) -> Result<Value> {
        let Some(first) = values.first() else {
            return Ok(Value::Null);
        };
        match self {
            Aggregation::Generic => generic(field, values),
            Aggregation::Sum => sum(field, non_null(values)),
            Aggregation::Min => extreme(field, values, std::cmp::Ordering::Less),
            Aggregation::Max => extreme(field, values, std::cmp::Ordering::Greater),
            Aggregation::Join(sep) => Ok(Value::Text(
                non_null(values)
                    .map(Value::render)
                    .collect::<Vec<_>>()
                    .join(sep),
            )),
            Aggregation::Concat => {
                let mut out = Vec::new();
                for v in non_null(values) {
                    match v {
                        Value::Tuple(items) => out.extend(items.iter().cloned()),
                        other => out.push(other.clone()),
                    }
                }
                Ok(Value::Tuple(out))
            }
            Aggregation::Consensus => {
                if values[1..].iter().all(|v| v == first) {
                    Ok(first.clone())
                } else {
                    Ok(neutral(first))
                }
            }
            Aggregation::First => Ok(first.clone()),
            Aggregation::Last => Ok(values[values.len() - 1].clone()),
            Aggregation::Custom(f) => f(values),
        }
    }
}

fn non_null(values: &[Value]) -> impl Iterator<Item = &Value> + Clone {
    values.iter().filter(|v| !v.is_null())
}

fn neutral(like: &Value) -> Value {
    match like {
        Value::Int(_) => Value::Int(0),
        Value::Float(_) => Value::Float(0.0),
        Value::Text(_) => Value::from("."),
        _ => Value::Null,
    }
}

fn sum<'a>(field: &str, values: impl Iterator<Item = &'a Value> + Clone) -> Result<Value> {
    let mut int_total: i64 = 0;
    let mut float_total: f64 = 0.0;
    let mut any_float = false;
    let mut any = false;
    for v in values {
        any = true;
        match v {
            Value::Int(i) => {
                int_total = int_total.saturating_add(*i);
                float_total += *i as f64;
            }
            Value::Float(f) => {
                any_float = true;
                float_total += f;
            }
            other => {
                return Err(FeatureError::type_error(
                    field,
                    format!("cannot sum {} values", other.type_name()),
                ))
            }
        }
    }
    Ok(match (any, any_float) {
        (false, _) => Value::Null,
        (true, true) => Value::Float(float_total),
        (true, false) => Value::Int(int_total),
    })
}

fn extreme(field: &str, values: &[Value], wanted: std::cmp::Ordering) -> Result<Value> {
    let mut best: Option<&Value> = None;
    for v in non_null(values) {
        if let Some(b) = best {
            if std::mem::discriminant(b) != std::mem::discriminant(v)
                && !(b.is_numeric() && v.is_numeric())
            {
                return Err(FeatureError::type_error(
                    field,
                    format!("cannot compare {} with {}", b.type_name(), v.type_name()),
                ));
            }
            if v.sort_cmp(b) == wanted {
                best = Some(v);
            }
        } else {
            best = Some(v);
        }
    }
    Ok(best.cloned().unwrap_or(Value::Null))
}

fn generic(field: &str, values: &[Value]) -> Result<Value> {
    let mut present = non_null(values);
    let Some(first) = present.clone().next() else {
        return Ok(Value::Null);
    };
    if present.clone().count() == 1 {
        return Ok(first.clone());
    }
    match first {
        Value::Int(_) | Value::Float(_) => sum(field, present),
        Value::Text(_) => {
            let mut parts = Vec::with_capacity(values.len());
            for v in present.by_ref() {
                match v {
                    Value::Text(s) => parts.push(s.as_str()),
                    other => return Err(mismatch(field, first, other)),
                }
            }
            Ok(Value::Text(parts.join("|")))
        }
        Value::Tuple(_) => {
            let mut out = Vec::new();
            for v in present.by_ref() {
                match v {
                    Value::Tuple(items) => out.extend(items.iter().cloned()),
                    other => return Err(mismatch(field, first, other)),
                }
            }
            Ok(Value::Tuple(out))
        }
        Value::Null => Ok(Value::Null),
    }
}

fn mismatch(field: &str, a: &Value, b: &Value) -> FeatureError {
    FeatureError::type_error(
        field,
        format!("cannot merge {} with {}", a.type_name(), b.type_name()),
    )
}

/// Mapping from field name to aggregation rule.
///
/// Defaults: `strand` uses [`Aggregation::Consensus`], `chr` uses
/// [`Aggregation::First`], everything else [`Aggregation::Generic`].
#[derive(Debug, Clone)]
pub struct AggregateRegistry {
    rules: FxHashMap<String, Aggregation>,
}

impl Default for AggregateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AggregateRegistry {
    pub fn new() -> Self {
        let mut rules = FxHashMap::default();
        rules.insert(STRAND.to_string(), Aggregation::Consensus);
        rules.insert(CHR.to_string(), Aggregation::First);
        Self { rules }
    }

    /// Override the rule for one field.
    pub fn with(mut self, field: impl Into<String>, aggregation: Aggregation) -> Self {
        self.set(field, aggregation);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, aggregation: Aggregation) {
        self.rules.insert(field.into(), aggregation);
    }

    pub fn get(&self, field: &str) -> Aggregation {
        self.rules.get(field).cloned().unwrap_or(Aggregation::Generic)
    }

    /// Resolve rules for a list of fields once, for use per record.
    pub fn resolve<S: AsRef<str>>(&self, fields: &[S]) -> FieldAggregator {
        FieldAggregator {
            rules: fields
                .iter()
                .map(|f| (f.as_ref().to_string(), self.get(f.as_ref())))
                .collect(),
        }
    }
}

/// Aggregation rules bound to a fixed run of fields.
#[derive(Debug, Clone)]
pub struct FieldAggregator {
    rules: Vec<(String, Aggregation)>,
}

impl FieldAggregator {
    /// Merge two co-indexed value slices field by field.
    pub fn combine(&self, a: &[Value], b: &[Value]) -> Result<Vec<Value>> {
        self.rules
            .iter()
            .zip(a.iter().zip(b.iter()))
            .map(|((field, agg), (x, y))| agg.apply(field, &[x.clone(), y.clone()]))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn g(values: &[Value]) -> Result<Value> {
        Aggregation::Generic.apply("f", values)
    }

    #[test]
    fn test_generic_numbers() {
        assert_eq!(g(&[Value::Int(2), Value::Int(3)]).unwrap(), Value::Int(5));
        assert_eq!(
            g(&[Value::Int(2), Value::Float(0.5)]).unwrap(),
            Value::Float(2.5)
        );
    }

    #[test]
    fn test_generic_text_and_tuples() {
        assert_eq!(
            g(&[Value::from("A"), Value::from("B")]).unwrap(),
            Value::from("A|B")
        );
        let t = g(&[
            Value::Tuple(vec![Value::Int(1)]),
            Value::Tuple(vec![Value::Int(2), Value::Int(3)]),
        ])
        .unwrap();
        assert_eq!(t, Value::Tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));
    }

    #[test]
    fn test_generic_nulls() {
        assert_eq!(g(&[Value::Null, Value::Null]).unwrap(), Value::Null);
        assert_eq!(g(&[Value::Null, Value::from("x")]).unwrap(), Value::from("x"));
    }

    #[test]
    fn test_generic_type_mismatch() {
        let err = g(&[Value::from("A"), Value::Int(1)]).unwrap_err();
        assert!(matches!(err, FeatureError::AggregationType { .. }));
    }

    #[test]
    fn test_consensus() {
        let c = Aggregation::Consensus;
        assert_eq!(c.apply("strand", &[Value::Int(-1), Value::Int(-1)]).unwrap(), Value::Int(-1));
        assert_eq!(c.apply("strand", &[Value::Int(1), Value::Int(-1)]).unwrap(), Value::Int(0));
        assert_eq!(
            c.apply("strand", &[Value::from("+"), Value::from("-")]).unwrap(),
            Value::from(".")
        );
    }

    #[test]
    fn test_min_max_join() {
        let vals = [Value::Float(2.5), Value::Int(1)];
        assert_eq!(Aggregation::Min.apply("s", &vals).unwrap(), Value::Int(1));
        assert_eq!(Aggregation::Max.apply("s", &vals).unwrap(), Value::Float(2.5));
        assert_eq!(
            Aggregation::Join(";".into()).apply("s", &vals).unwrap(),
            Value::from("2.5;1")
        );
        assert!(Aggregation::Max
            .apply("s", &[Value::Int(1), Value::from("a")])
            .is_err());
    }

    #[test]
    fn test_registry_defaults_and_overrides() {
        let reg = AggregateRegistry::new().with("name", Aggregation::First);
        assert!(matches!(reg.get("strand"), Aggregation::Consensus));
        assert!(matches!(reg.get("chr"), Aggregation::First));
        assert!(matches!(reg.get("name"), Aggregation::First));
        assert!(matches!(reg.get("score"), Aggregation::Generic));

        let agg = reg.resolve(&["name", "strand"]);
        let merged = agg
            .combine(
                &[Value::from("A"), Value::Int(1)],
                &[Value::from("B"), Value::Int(1)],
            )
            .unwrap();
        assert_eq!(merged, vec![Value::from("A"), Value::Int(1)]);
    }

    #[test]
    fn test_custom() {
        let longest = Aggregation::custom(|vals| {
            Ok(vals
                .iter()
                .max_by_key(|v| v.render().len())
                .cloned()
                .unwrap_or(Value::Null))
        });
        assert_eq!(
            longest.apply("name", &[Value::from("ab"), Value::from("abc")]).unwrap(),
            Value::from("abc")
        );
    }

    #[test]
    fn test_parse() {
        assert!(matches!(Aggregation::parse("SUM"), Some(Aggregation::Sum)));
        assert!(matches!(Aggregation::parse("collapse"), Some(Aggregation::Join(_))));
        assert!(Aggregation::parse("median").is_none());
    }
}
