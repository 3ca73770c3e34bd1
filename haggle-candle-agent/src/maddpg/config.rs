//! Configuration of the MADDPG agent.
use super::{ActorConfig, CriticConfig};
use crate::{
    model::{ActorModel, CriticModel},
    space::ActionSpace,
    util::OutDim,
    Device,
};
use anyhow::Result;
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fmt::Debug,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Maddpg`](super::Maddpg).
///
/// `obs_dims` and `act_spaces` describe the whole roster, in roster order;
/// `agent_index` selects this agent's slot. The two lists must have equal
/// length.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct MaddpgConfig<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Name of the agent, used in logs.
    pub name: String,

    /// This agent's slot in the roster.
    pub agent_index: usize,

    /// Observation dimension of every agent, in roster order.
    pub obs_dims: Vec<usize>,

    /// Action space of every agent, in roster order.
    pub act_spaces: Vec<ActionSpace>,

    /// Configuration of the actor.
    pub actor_config: ActorConfig<P::Config>,

    /// Configuration of the critic.
    pub critic_config: CriticConfig<Q::Config>,

    /// Discount factor.
    pub gamma: f64,

    /// Decay of the target networks: `target = polyak * target +
    /// (1 - polyak) * online` after every training step.
    pub polyak: f64,

    /// Batch size for training.
    pub batch_size: usize,

    /// Maximum episode length; together with `batch_size` it defines the
    /// warm-up occupancy `batch_size * max_episode_len` the buffer must
    /// reach before training starts.
    pub max_episode_len: usize,

    /// Update period: `update` trains only when `t % n_steps == 0`.
    pub n_steps: usize,

    /// Number of Monte-Carlo draws averaged into the bootstrap target.
    /// Target actors may be stochastic; averaging reduces the variance of
    /// the bootstrap target.
    pub num_bootstrap: usize,

    /// Weight of the actor loss term penalizing the magnitude of the raw
    /// distribution parameters.
    pub actor_reg: f64,

    /// Global gradient-norm clip applied to both actor and critic steps.
    pub max_grad_norm: f64,

    /// Capacity of the private replay buffer.
    pub buffer_capacity: usize,

    /// Seed of the buffer's index-sampling RNG.
    pub seed: u64,

    /// If `true`, the critic sees only this agent's own observation and
    /// action instead of the joint roster tuple.
    pub local_q: bool,

    /// Device for the actor/critic networks.
    pub device: Option<Device>,
}

impl<P, Q> Clone for MaddpgConfig<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            agent_index: self.agent_index,
            obs_dims: self.obs_dims.clone(),
            act_spaces: self.act_spaces.clone(),
            actor_config: self.actor_config.clone(),
            critic_config: self.critic_config.clone(),
            gamma: self.gamma,
            polyak: self.polyak,
            batch_size: self.batch_size,
            max_episode_len: self.max_episode_len,
            n_steps: self.n_steps,
            num_bootstrap: self.num_bootstrap,
            actor_reg: self.actor_reg,
            max_grad_norm: self.max_grad_norm,
            buffer_capacity: self.buffer_capacity,
            seed: self.seed,
            local_q: self.local_q,
            device: self.device,
        }
    }
}

impl<P, Q> Default for MaddpgConfig<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn default() -> Self {
        Self {
            name: "agent".into(),
            agent_index: 0,
            obs_dims: vec![],
            act_spaces: vec![],
            actor_config: Default::default(),
            critic_config: Default::default(),
            gamma: 0.95,
            polyak: 0.99,
            batch_size: 1024,
            max_episode_len: 25,
            n_steps: 100,
            num_bootstrap: 10,
            actor_reg: 1e-3,
            max_grad_norm: 0.5,
            buffer_capacity: 1_000_000,
            seed: 42,
            local_q: false,
            device: None,
        }
    }
}

impl<P, Q> MaddpgConfig<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Sets the name of the agent.
    pub fn name(mut self, v: impl Into<String>) -> Self {
        self.name = v.into();
        self
    }

    /// Sets this agent's slot in the roster.
    pub fn agent_index(mut self, v: usize) -> Self {
        self.agent_index = v;
        self
    }

    /// Sets the observation dimensions of the roster.
    pub fn obs_dims(mut self, v: Vec<usize>) -> Self {
        self.obs_dims = v;
        self
    }

    /// Sets the action spaces of the roster.
    pub fn act_spaces(mut self, v: Vec<ActionSpace>) -> Self {
        self.act_spaces = v;
        self
    }

    /// Sets the configuration of the actor.
    pub fn actor_config(mut self, v: ActorConfig<P::Config>) -> Self {
        self.actor_config = v;
        self
    }

    /// Sets the configuration of the critic.
    pub fn critic_config(mut self, v: CriticConfig<Q::Config>) -> Self {
        self.critic_config = v;
        self
    }

    /// Sets the discount factor.
    pub fn gamma(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Sets the decay of the target networks.
    pub fn polyak(mut self, v: f64) -> Self {
        self.polyak = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the maximum episode length.
    pub fn max_episode_len(mut self, v: usize) -> Self {
        self.max_episode_len = v;
        self
    }

    /// Sets the update period.
    pub fn n_steps(mut self, v: usize) -> Self {
        self.n_steps = v;
        self
    }

    /// Sets the number of Monte-Carlo draws of the bootstrap target.
    pub fn num_bootstrap(mut self, v: usize) -> Self {
        self.num_bootstrap = v;
        self
    }

    /// Sets the actor regularization weight.
    pub fn actor_reg(mut self, v: f64) -> Self {
        self.actor_reg = v;
        self
    }

    /// Sets the global gradient-norm clip.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Sets the capacity of the replay buffer.
    pub fn buffer_capacity(mut self, v: usize) -> Self {
        self.buffer_capacity = v;
        self
    }

    /// Sets the seed of the buffer's index-sampling RNG.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Restricts the critic to this agent's own observation and action.
    pub fn local_q(mut self, v: bool) -> Self {
        self.local_q = v;
        self
    }

    /// Sets the device.
    pub fn device(mut self, device: candle_core::Device) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Constructs [`MaddpgConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path_ = path.as_ref().to_owned();
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        info!("Load config of MADDPG agent from {}", path_.to_str().unwrap());
        Ok(b)
    }

    /// Saves [`MaddpgConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path_ = path.as_ref().to_owned();
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        info!("Save config of MADDPG agent into {}", path_.to_str().unwrap());
        Ok(())
    }
}
