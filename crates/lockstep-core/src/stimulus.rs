use std::collections::VecDeque;
use std::marker::PhantomData;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::transaction::{RandomizeError, Transaction};

/// Where the generator gets its transactions from.
///
/// Abstracted behind a trait so we can:
/// - Randomize fresh transactions for ordinary runs
/// - Replay a fixed script for directed tests
pub trait StimulusSource<T>: Send + 'static {
    fn next_item(&mut self) -> Result<T, RandomizeError>;
}

/// Randomizes a default-constructed transaction per item.
#[derive(Debug)]
pub struct RandomStimulus<T> {
    rng: ChaCha8Rng,
    _item: PhantomData<fn() -> T>,
}

impl<T> RandomStimulus<T> {
    /// Same seed, same item sequence.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            _item: PhantomData,
        }
    }
}

impl<T: Transaction> StimulusSource<T> for RandomStimulus<T> {
    fn next_item(&mut self) -> Result<T, RandomizeError> {
        let mut item = T::default();
        item.randomize(&mut self.rng)?;
        Ok(item)
    }
}

/// Replays a fixed sequence, then reports exhaustion.
#[derive(Debug, Clone)]
pub struct ScriptedStimulus<T> {
    items: VecDeque<T>,
    produced: u64,
}

impl<T> ScriptedStimulus<T> {
    pub fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: items.into_iter().collect(),
            produced: 0,
        }
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }
}

impl<T: Transaction> StimulusSource<T> for ScriptedStimulus<T> {
    fn next_item(&mut self) -> Result<T, RandomizeError> {
        let item = self.items.pop_front().ok_or(RandomizeError::Exhausted {
            produced: self.produced,
        })?;
        self.produced += 1;
        Ok(item)
    }
}
