//! Interface between per-agent trainers and the external driving loop.
use crate::record::Record;
use anyhow::Result;
use std::path::Path;

/// A per-agent trainer as seen by the external driving loop.
///
/// The driving loop owns the environment and a roster of trainers. Once per
/// environment step it queries each trainer for an action, feeds the
/// resulting transition back through [`experience`](Self::experience), and
/// then runs the update cycle: [`preupdate`](Self::preupdate) on every
/// trainer, followed by [`update`](Self::update) on every trainer, strictly
/// serialized. Each trainer mutates only its own parameters and its own
/// buffer; the roster is read through the read-only [`Peer`](Self::Peer)
/// views, so no locking is required.
pub trait AgentTrainer {
    /// Observation as supplied by the environment.
    type Obs;

    /// Action vector as consumed by the environment.
    type Act;

    /// Read-only view of another trainer in the roster, exposing exactly
    /// what a joint update needs: buffer sampling at shared indices and
    /// target-policy queries.
    type Peer: ?Sized;

    /// Returns the trainer's name, used in logs.
    fn name(&self) -> &str;

    /// Selects an action for the observation. Forward-only; no side
    /// effects.
    fn action(&self, obs: &Self::Obs) -> Result<Self::Act>;

    /// Appends one transition to the trainer's private replay buffer.
    ///
    /// `done` marks the end of an episode inside the environment; `terminal`
    /// marks an externally truncated episode (step limit). Only `done`
    /// participates in bootstrapping.
    fn experience(
        &mut self,
        obs: Self::Obs,
        act: Self::Act,
        reward: f32,
        next_obs: Self::Obs,
        done: bool,
        terminal: bool,
    ) -> Result<()>;

    /// Clears the transient sample-index state of the previous update
    /// cycle. Call once per roster-wide cycle, before [`update`](Self::update).
    fn preupdate(&mut self);

    /// Runs one gated update cycle at driver step `t`.
    ///
    /// `peers` holds the read-only views of every *other* trainer, in roster
    /// order with this trainer's slot omitted. Returns `Ok(None)` while the
    /// warm-up gate is unsatisfied or `t` is off the update period;
    /// otherwise returns the diagnostics of the completed step.
    fn update(&mut self, peers: &[&Self::Peer], t: usize) -> Result<Option<Record>>;

    /// Saves the trainer's parameters under the given directory.
    fn save<T: AsRef<Path>>(&self, path: T) -> Result<()>;

    /// Loads the trainer's parameters from the given directory.
    fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()>;
}
