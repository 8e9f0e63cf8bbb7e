//! Field-order preservation around stream transforms.
//!
//! Interval operators move `start` and `end` to the front of the schema to
//! simplify their inner loops. [`Ordered`] wraps such an operator and puts
//! the caller's original field order back on every output.

use crate::commands::projection::reorder;
use crate::error::Result;
use crate::stream::FeatureStream;
use log::trace;

/// An operator consuming and producing one or more streams.
pub trait StreamTransform {
    fn transform(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>>;
}

impl<F> StreamTransform for F
where
    F: Fn(Vec<FeatureStream>) -> Result<Vec<FeatureStream>>,
{
    fn transform(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        self(inputs)
    }
}

/// Wrapper restoring the input field order on the outputs of `T`.
///
/// For a single output, the reference order is the first input's fields
/// restricted to those present in every input. For several outputs, output
/// `n` is restored against input `min(n, inputs - 1)`. In each case the
/// reference fields still present in the output are moved to the front, in
/// reference order; fields created by the operator follow.
#[derive(Debug, Clone)]
pub struct Ordered<T> {
    inner: T,
}

impl<T: StreamTransform> Ordered<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Run on a single stream and return the single output.
    pub fn apply(&self, stream: FeatureStream) -> Result<FeatureStream> {
        let mut outputs = self.transform(vec![stream])?;
        match outputs.len() {
            1 => Ok(outputs.remove(0)),
            n => Err(crate::error::FeatureError::Arity {
                expected: 1,
                found: n,
            }),
        }
    }
}

impl<T: StreamTransform> StreamTransform for Ordered<T> {
    fn transform(&self, inputs: Vec<FeatureStream>) -> Result<Vec<FeatureStream>> {
        let original: Vec<Vec<String>> = inputs.iter().map(|s| s.fields().to_vec()).collect();
        let outputs = self.inner.transform(inputs)?;

        if outputs.len() == 1 {
            let common: Vec<&String> = original
                .first()
                .map(|first| {
                    first
                        .iter()
                        .filter(|f| original[1..].iter().all(|o| o.contains(f)))
                        .collect()
                })
                .unwrap_or_default();
            let restored = outputs
                .into_iter()
                .map(|out| restore(out, &common))
                .collect::<Result<Vec<_>>>()?;
            return Ok(restored);
        }

        let last = original.len().saturating_sub(1);
        outputs
            .into_iter()
            .enumerate()
            .map(|(n, out)| match original.get(n.min(last)) {
                Some(reference) => restore(out, &reference.iter().collect::<Vec<_>>()),
                None => Ok(out),
            })
            .collect()
    }
}

fn restore(stream: FeatureStream, reference: &[&String]) -> Result<FeatureStream> {
    let wanted: Vec<&str> = reference
        .iter()
        .filter(|f| stream.schema().contains(f))
        .map(|f| f.as_str())
        .collect();
    trace!("restoring field order {:?} over {}", wanted, stream.schema());
    reorder(stream, &wanted, false)
}
