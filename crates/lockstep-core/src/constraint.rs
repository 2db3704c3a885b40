//! Field constraints used by `Transaction::randomize`.
//!
//! A constraint with an empty support (no positive weight, inverted range)
//! does not panic; `pick` reports `RandomizeError::Unsatisfiable` and the
//! generator applies the run's failure policy.

use std::fmt;

use rand::distributions::uniform::SampleUniform;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::transaction::RandomizeError;

/// Weighted discrete choice over the values of an enumerated field.
///
/// `WeightedChoice::new("op", [(Op::Write, 50), (Op::Read, 50)])` draws a
/// write or a read with equal probability.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    field: &'static str,
    values: Vec<T>,
    index: Option<WeightedIndex<u32>>,
}

impl<T: Clone> WeightedChoice<T> {
    pub fn new(field: &'static str, weighted: impl IntoIterator<Item = (T, u32)>) -> Self {
        let (values, weights): (Vec<T>, Vec<u32>) = weighted.into_iter().unzip();
        let index = WeightedIndex::new(&weights).ok();
        Self {
            field,
            values,
            index,
        }
    }

    /// Draw one value.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<T, RandomizeError> {
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| RandomizeError::Unsatisfiable {
                field: self.field.to_string(),
                reason: "no value has a positive weight".to_string(),
            })?;
        Ok(self.values[index.sample(rng)].clone())
    }
}

/// Inclusive integer range for a numeric field.
#[derive(Debug, Clone, Copy)]
pub struct IntRange<T> {
    field: &'static str,
    min: T,
    max: T,
}

impl<T> IntRange<T>
where
    T: SampleUniform + PartialOrd + Copy + fmt::Display,
{
    pub const fn new(field: &'static str, min: T, max: T) -> Self {
        Self { field, min, max }
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<T, RandomizeError> {
        if self.min > self.max {
            return Err(RandomizeError::Unsatisfiable {
                field: self.field.to_string(),
                reason: format!("empty range {}..={}", self.min, self.max),
            });
        }
        Ok(rng.gen_range(self.min..=self.max))
    }
}
