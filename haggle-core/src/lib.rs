#![warn(missing_docs)]
//! Core abstractions for training negotiating agents with multi-agent
//! reinforcement learning.
//!
//! This crate is backend-agnostic: it knows nothing about tensors or
//! automatic differentiation. It provides the pieces every trainer backend
//! shares:
//!
//! - [`ReplayBuffer`], a bounded ring store of environment transitions that
//!   supports sampling at an externally supplied index set, so that a roster
//!   of agents can draw temporally aligned joint samples from their private
//!   buffers.
//! - [`AgentTrainer`], the interface a per-agent trainer exposes to the
//!   external driving loop (action selection, experience collection and the
//!   gated update cycle).
//! - [`record::Record`], the diagnostics map an update cycle returns.
//! - [`HaggleError`], the error taxonomy shared across the workspace.
//!
//! Environment dynamics are out of scope. The driving loop owns the
//! environment, feeds each trainer an observation vector and a scalar reward
//! per step, and applies the action vectors the trainers return.
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::AgentTrainer;
pub use error::HaggleError;
pub use replay_buffer::{BatchBase, ReplayBuffer, ReplayBufferConfig, Transition, TransitionBatch};
