//! Interfaces of the neural networks used by the trainer.
//!
//! Networks do not own their variables; they are built over a
//! [`VarBuilder`] whose backing `VarMap` is owned by the actor/critic
//! wrappers in [`crate::maddpg`]. Parameter sets are therefore explicit
//! objects handed around by the owner, never looked up from a global graph.
use candle_core::Tensor;
use candle_nn::VarBuilder;

/// A policy network mapping a batch of observations to the flat parameters
/// of an action distribution.
///
/// The interpretation of the parameter vector is decided by the
/// [`ActionSpace`](crate::space::ActionSpace) the actor was built for:
/// logits for a discrete space, mean and log-std halves for a continuous
/// one.
pub trait ActorModel {
    /// Configuration from which the network is constructed.
    type Config;

    /// Builds the network, registering its variables with `vb`.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// Returns distribution parameters of shape `[batch, param_dim]`.
    fn forward(&self, obs: &Tensor) -> Tensor;
}

/// A value network mapping a batch of (observation, action) rows to one
/// scalar value per row.
///
/// For a centralized critic the inputs are the joint observation and joint
/// action of the whole roster; in local mode they are the owning agent's
/// own slices. The two inputs are concatenated inside the model.
pub trait CriticModel {
    /// Configuration from which the network is constructed.
    type Config;

    /// Builds the network, registering its variables with `vb`.
    fn build(vb: VarBuilder, config: Self::Config) -> Self;

    /// Returns values of shape `[batch, 1]`.
    fn forward(&self, obs: &Tensor, act: &Tensor) -> Tensor;
}
