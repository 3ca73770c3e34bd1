//! Storage trait and transition types for the replay buffer.

/// Row storage for observations or actions.
///
/// Implementations own a fixed-capacity block of rows and support writing at
/// an index and gathering rows at a list of indices. The crate keeps this
/// abstract so that backends can store rows in whatever form their tensors
/// take; a plain `Vec` implementation is provided for untyped rows.
pub trait BatchBase {
    /// Creates storage for `capacity` rows.
    fn new(capacity: usize) -> Self;

    /// Writes the rows of `data` starting at index `ix`.
    ///
    /// The caller guarantees `ix` plus the number of rows fits within the
    /// capacity; the ring arithmetic lives in the buffer, not here.
    fn push(&mut self, ix: usize, data: Self);

    /// Returns the rows at `ixs`, in the order given.
    fn sample(&self, ixs: &[usize]) -> Self;
}

impl<T: Clone + Default> BatchBase for Vec<T> {
    fn new(capacity: usize) -> Self {
        vec![T::default(); capacity]
    }

    fn push(&mut self, ix: usize, data: Self) {
        for (j, row) in data.into_iter().enumerate() {
            self[ix + j] = row;
        }
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        ixs.iter().map(|ix| self[*ix].clone()).collect()
    }
}

/// One environment step of one agent.
///
/// Immutable once stored; the owning buffer overwrites it in place only when
/// capacity is exceeded.
#[derive(Debug, Clone)]
pub struct Transition<O, A> {
    /// Observation at the start of the step.
    pub obs: O,

    /// Action taken.
    pub act: A,

    /// Observation after the step.
    pub next_obs: O,

    /// Reward received.
    pub reward: f32,

    /// Whether the episode ended with this step.
    pub done: bool,
}

/// A batch of transitions as five parallel, equally ordered sequences.
#[derive(Debug, Clone)]
pub struct TransitionBatch<O, A> {
    /// Observations.
    pub obs: O,

    /// Actions.
    pub act: A,

    /// Next observations.
    pub next_obs: O,

    /// Rewards.
    pub reward: Vec<f32>,

    /// Episode-end flags, one per row (0 or 1).
    pub done: Vec<i8>,
}

impl<O, A> TransitionBatch<O, A> {
    /// Decomposes the batch into `(obs, act, next_obs, reward, done)`.
    pub fn unpack(self) -> (O, A, O, Vec<f32>, Vec<i8>) {
        (self.obs, self.act, self.next_obs, self.reward, self.done)
    }

    /// Returns the number of rows.
    pub fn len(&self) -> usize {
        self.reward.len()
    }

    /// Returns true when the batch holds no rows.
    pub fn is_empty(&self) -> bool {
        self.reward.is_empty()
    }
}
