//! Bounded ring store of environment transitions with index-aligned
//! sampling.
//!
//! Every agent in a roster owns a private [`ReplayBuffer`], but the buffers
//! are sampled with a *shared* index set: one agent draws indices with
//! [`ReplayBuffer::make_index`] and every buffer in the roster is then read
//! at those same indices with [`ReplayBuffer::sample_index`]. Because all
//! buffers receive one transition per environment step, equal indices refer
//! to the same instant, which keeps the joint (observation, action) tuples
//! used by centralized critics temporally aligned.
mod base;
mod batch;
mod config;
pub use base::ReplayBuffer;
pub use batch::{BatchBase, Transition, TransitionBatch};
pub use config::ReplayBufferConfig;
