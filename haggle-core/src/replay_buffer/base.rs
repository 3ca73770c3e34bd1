//! Ring implementation of the replay buffer.
use super::{BatchBase, ReplayBufferConfig, Transition, TransitionBatch};
use crate::error::HaggleError;
use anyhow::Result;
use log::trace;

/// A bounded ring store of [`Transition`]s with uniform index sampling.
///
/// Insertion is O(1); once `capacity` records are stored, each push
/// overwrites the oldest record. Sampling is split in two so a roster of
/// buffers can share one index set:
///
/// - [`make_index`](Self::make_index) draws indices uniformly at random,
///   with replacement, over the stored entries;
/// - [`sample_index`](Self::sample_index) reads any buffer at a given index
///   set, preserving the input order.
///
/// # Type Parameters
///
/// * `O` - Observation row storage.
/// * `A` - Action row storage.
pub struct ReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    capacity: usize,

    /// Next insertion index.
    i: usize,

    /// Current number of stored transitions.
    size: usize,

    obs: O,
    act: A,
    next_obs: O,
    reward: Vec<f32>,
    done: Vec<i8>,

    rng: fastrand::Rng,
}

impl<O, A> ReplayBuffer<O, A>
where
    O: BatchBase,
    A: BatchBase,
{
    /// Builds an empty buffer from the configuration.
    pub fn build(config: &ReplayBufferConfig) -> Self {
        let capacity = config.capacity;

        Self {
            capacity,
            i: 0,
            size: 0,
            obs: O::new(capacity),
            act: A::new(capacity),
            next_obs: O::new(capacity),
            reward: vec![0.; capacity],
            done: vec![0; capacity],
            rng: fastrand::Rng::with_seed(config.seed),
        }
    }

    /// Appends a transition, overwriting the oldest record at capacity.
    pub fn push(&mut self, tr: Transition<O, A>) {
        trace!("push transition at slot {}", self.i);
        self.obs.push(self.i, tr.obs);
        self.act.push(self.i, tr.act);
        self.next_obs.push(self.i, tr.next_obs);
        self.reward[self.i] = tr.reward;
        self.done[self.i] = tr.done as i8;

        self.i = (self.i + 1) % self.capacity;
        if self.size < self.capacity {
            self.size += 1;
        }
    }

    /// Draws `batch_size` indices uniformly at random, with replacement,
    /// over the stored entries.
    ///
    /// The returned set is valid for any roster buffer of equal occupancy,
    /// which is what keeps joint samples temporally aligned.
    pub fn make_index(&mut self, batch_size: usize) -> Result<Vec<usize>> {
        if self.size == 0 {
            return Err(HaggleError::EmptyBuffer.into());
        }
        Ok((0..batch_size)
            .map(|_| self.rng.usize(..self.size))
            .collect())
    }

    /// Returns the transitions at `ixs` as parallel sequences, preserving
    /// the input order.
    ///
    /// Indices never wrap: an index beyond the stored entries fails fast
    /// with [`HaggleError::IndexOutOfRange`].
    pub fn sample_index(&self, ixs: &[usize]) -> Result<TransitionBatch<O, A>> {
        if self.size == 0 {
            return Err(HaggleError::EmptyBuffer.into());
        }
        if let Some(&ix) = ixs.iter().find(|&&ix| ix >= self.size) {
            return Err(HaggleError::IndexOutOfRange { ix, len: self.size }.into());
        }

        Ok(TransitionBatch {
            obs: self.obs.sample(ixs),
            act: self.act.sample(ixs),
            next_obs: self.next_obs.sample(ixs),
            reward: ixs.iter().map(|&ix| self.reward[ix]).collect(),
            done: ixs.iter().map(|&ix| self.done[ix]).collect(),
        })
    }

    /// Draws and reads a fresh uniform batch in one call.
    pub fn batch(&mut self, size: usize) -> Result<TransitionBatch<O, A>> {
        let ixs = self.make_index(size)?;
        self.sample_index(&ixs)
    }

    /// Returns the current number of stored transitions.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true when no transitions are stored.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
