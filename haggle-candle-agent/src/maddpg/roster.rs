//! Roster coordinator for a set of MADDPG trainers.
use super::{Maddpg, Peer};
use crate::{
    model::{ActorModel, CriticModel},
    util::OutDim,
};
use anyhow::{ensure, Result};
use haggle_core::{record::Record, AgentTrainer};
use ndarray::Array1;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// Owns a roster of [`Maddpg`] trainers and serializes their update
/// cycles.
///
/// The trainers share environment transitions but never gradients: during
/// agent `i`'s update the other agents are visible only through their
/// read-only [`Peer`] views. All cycles run on the caller's thread, one
/// agent after another.
pub struct Roster<P, Q>
where
    P: ActorModel + 'static,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel + 'static,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    agents: Vec<Maddpg<P, Q>>,
}

impl<P, Q> Roster<P, Q>
where
    P: ActorModel + 'static,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel + 'static,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Wraps the trainers. Each trainer must sit at the slot it was
    /// configured for, and all must agree on the roster size.
    pub fn new(agents: Vec<Maddpg<P, Q>>) -> Result<Self> {
        for (i, agent) in agents.iter().enumerate() {
            ensure!(
                agent.agent_index() == i,
                "trainer {} configured for slot {} placed at slot {}",
                agent.name(),
                agent.agent_index(),
                i
            );
            ensure!(
                agent.n_agents() == agents.len(),
                "trainer {} built for a roster of {}, got {}",
                agent.name(),
                agent.n_agents(),
                agents.len()
            );
        }
        Ok(Self { agents })
    }

    /// Number of agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns true when the roster holds no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Returns the trainer at the given slot.
    pub fn get(&self, i: usize) -> Option<&Maddpg<P, Q>> {
        self.agents.get(i)
    }

    /// Queries every agent's policy on its own observation.
    pub fn actions(&self, obs_n: &[Array1<f32>]) -> Result<Vec<Array1<f32>>> {
        ensure!(
            obs_n.len() == self.agents.len(),
            "got {} observations for {} agents",
            obs_n.len(),
            self.agents.len()
        );
        self.agents
            .iter()
            .zip(obs_n.iter())
            .map(|(agent, obs)| agent.action(obs))
            .collect()
    }

    /// Feeds one environment step into every agent's private buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn experience(
        &mut self,
        obs_n: Vec<Array1<f32>>,
        act_n: Vec<Array1<f32>>,
        reward_n: &[f32],
        next_obs_n: Vec<Array1<f32>>,
        done_n: &[bool],
        terminal: bool,
    ) -> Result<()> {
        ensure!(
            obs_n.len() == self.agents.len()
                && act_n.len() == self.agents.len()
                && reward_n.len() == self.agents.len()
                && next_obs_n.len() == self.agents.len()
                && done_n.len() == self.agents.len(),
            "step data does not cover the roster of {}",
            self.agents.len()
        );
        for (i, ((obs, act), next_obs)) in obs_n.into_iter().zip(act_n).zip(next_obs_n).enumerate()
        {
            self.agents[i].experience(obs, act, reward_n[i], next_obs, done_n[i], terminal)?;
        }
        Ok(())
    }

    /// Runs one update cycle over the whole roster at driver step `t`.
    ///
    /// Clears every agent's transient sample index first, then updates the
    /// agents one after another, lending each the read-only views of the
    /// rest. Returns one diagnostics slot per agent; `None` where the
    /// agent's gates kept it idle.
    pub fn update(&mut self, t: usize) -> Result<Vec<Option<Record>>> {
        for agent in self.agents.iter_mut() {
            agent.preupdate();
        }

        let n = self.agents.len();
        let mut records = Vec::with_capacity(n);
        for i in 0..n {
            let (left, rest) = self.agents.split_at_mut(i);
            let (me, right) = rest.split_first_mut().unwrap();
            let peers: Vec<&dyn Peer> = left
                .iter()
                .map(|agent| agent as &dyn Peer)
                .chain(right.iter().map(|agent| agent as &dyn Peer))
                .collect();
            records.push(me.update(&peers, t)?);
        }
        Ok(records)
    }
}
