//! MADDPG agent trainer.
//!
//! Each agent owns an online/target actor pair, an online/target critic
//! pair and a private replay buffer. Critics are centralized: during an
//! update they see the joint observation and joint action of the whole
//! roster, sampled from every agent's buffer at one shared index set. The
//! [`Roster`] coordinator serializes the per-agent update cycles and lends
//! each trainer read-only [`Peer`] views of the others.
mod actor;
mod base;
mod config;
mod critic;
mod roster;
pub use actor::{Actor, ActorConfig};
pub use base::{Maddpg, Peer, PeerSample};
pub use config::MaddpgConfig;
pub use critic::{Critic, CriticConfig};
pub use roster::Roster;
