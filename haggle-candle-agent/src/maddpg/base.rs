//! MADDPG agent trainer.
use super::{Actor, Critic, MaddpgConfig};
use crate::{
    model::{ActorModel, CriticModel},
    space::ActionSpace,
    tensor_batch::TensorBatch,
    util::{self, OutDim},
};
use anyhow::{ensure, Context, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use haggle_core::{
    record::{Record, RecordValue},
    AgentTrainer, HaggleError, ReplayBuffer, ReplayBufferConfig, Transition,
};
use log::{debug, trace};
use ndarray::Array1;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, fs, path::Path};

/// Read-only view of a roster member, as seen by another member's update
/// cycle.
///
/// A joint update needs exactly two things from every other agent: its
/// buffer read at the shared index set, and its target policy queried on
/// next observations. Nothing else is exposed, so an update can never
/// mutate a peer.
pub trait Peer {
    /// Reads the peer's buffer at the given indices.
    fn sample_at(&self, ixs: &[usize]) -> Result<PeerSample>;

    /// Queries the peer's target actor on a batch of next observations.
    fn target_action(&self, next_obs: &Tensor) -> Result<Tensor>;
}

/// One roster slot of a joint sample.
pub struct PeerSample {
    /// Observations, shape `[batch, obs_dim]`.
    pub obs: Tensor,

    /// Stored actions, shape `[batch, act_dim]`.
    pub act: Tensor,

    /// Next observations, shape `[batch, obs_dim]`.
    pub next_obs: Tensor,
}

/// MADDPG agent trainer.
///
/// Owns one online/target actor pair, one online/target critic pair and a
/// private replay buffer. The trainer warms up until its buffer holds
/// `batch_size * max_episode_len` transitions, then trains once every
/// `n_steps` driver steps; off-gate calls to [`update`](Self::update)
/// return `Ok(None)`.
///
/// Target parameters are advanced only by Polyak averaging after the online
/// step of the same network, never by gradients. A NaN or Inf loss is not
/// detected; once parameters are corrupted the damage propagates into
/// subsequent steps, and through target-policy queries into the bootstrap
/// targets of the rest of the roster.
pub struct Maddpg<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    name: String,
    agent_index: usize,
    n_agents: usize,
    space: ActionSpace,

    pi: Actor<P>,
    pi_tgt: Actor<P>,
    q: Critic<Q>,
    q_tgt: Critic<Q>,

    buffer: ReplayBuffer<TensorBatch, TensorBatch>,

    // Index set of the running update cycle; cleared by preupdate.
    sample_ixs: Option<Vec<usize>>,

    warmup_len: usize,
    gamma: f64,
    polyak: f64,
    batch_size: usize,
    n_steps: usize,
    num_bootstrap: usize,
    actor_reg: f64,
    max_grad_norm: f64,
    local_q: bool,
    device: Device,
}

impl<P, Q> Debug for Maddpg<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Maddpg")
            .field("name", &self.name)
            .field("agent_index", &self.agent_index)
            .field("n_agents", &self.n_agents)
            .field("space", &self.space)
            .field("warmup_len", &self.warmup_len)
            .field("gamma", &self.gamma)
            .field("polyak", &self.polyak)
            .field("batch_size", &self.batch_size)
            .field("n_steps", &self.n_steps)
            .field("num_bootstrap", &self.num_bootstrap)
            .field("actor_reg", &self.actor_reg)
            .field("max_grad_norm", &self.max_grad_norm)
            .field("local_q", &self.local_q)
            .finish_non_exhaustive()
    }
}

impl<P, Q> Maddpg<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    /// Constructs the trainer from its configuration.
    pub fn build(config: MaddpgConfig<P, Q>) -> Result<Self> {
        if config.obs_dims.len() != config.act_spaces.len() {
            return Err(HaggleError::RosterMismatch {
                obs: config.obs_dims.len(),
                act: config.act_spaces.len(),
            }
            .into());
        }
        let n_agents = config.obs_dims.len();
        ensure!(
            config.agent_index < n_agents,
            "agent_index {} outside roster of {}",
            config.agent_index,
            n_agents
        );
        ensure!(config.n_steps > 0, "n_steps must be positive");
        ensure!(config.num_bootstrap > 0, "num_bootstrap must be positive");

        let device: Device = config
            .device
            .context("No device is given for the MADDPG agent")?
            .into();
        let space = config.act_spaces[config.agent_index];

        let actor_config = config.actor_config.out_dim(space.param_dim());
        let pi = Actor::build(actor_config.clone(), &device)?;
        let pi_tgt = Actor::build(actor_config, &device)?;
        let q = Critic::build(config.critic_config.clone(), &device)?;
        let q_tgt = Critic::build(config.critic_config, &device)?;

        let buffer = ReplayBuffer::build(
            &ReplayBufferConfig::default()
                .capacity(config.buffer_capacity)
                .seed(config.seed),
        );

        Ok(Self {
            name: config.name,
            agent_index: config.agent_index,
            n_agents,
            space,
            pi,
            pi_tgt,
            q,
            q_tgt,
            buffer,
            sample_ixs: None,
            warmup_len: config.batch_size * config.max_episode_len,
            gamma: config.gamma,
            polyak: config.polyak,
            batch_size: config.batch_size,
            n_steps: config.n_steps,
            num_bootstrap: config.num_bootstrap,
            actor_reg: config.actor_reg,
            max_grad_norm: config.max_grad_norm,
            local_q: config.local_q,
            device,
        })
    }

    /// This agent's slot in the roster.
    pub fn agent_index(&self) -> usize {
        self.agent_index
    }

    /// Size of the roster the trainer was built for.
    pub fn n_agents(&self) -> usize {
        self.n_agents
    }

    /// Index set drawn by the running update cycle, if any.
    pub fn sample_indices(&self) -> Option<&[usize]> {
        self.sample_ixs.as_deref()
    }

    /// Roster slot `j` as a read-only view, resolving this agent's own slot
    /// to itself.
    fn slot<'a>(&'a self, peers: &[&'a dyn Peer], j: usize) -> &'a dyn Peer {
        if j == self.agent_index {
            self
        } else if j < self.agent_index {
            peers[j]
        } else {
            peers[j - 1]
        }
    }

    /// One critic step: mean-squared error of the online critic against a
    /// precomputed bootstrap target, clipped gradients, own parameters
    /// only.
    fn q_train(&mut self, obs: &Tensor, act: &Tensor, target: &Tensor) -> Result<f32> {
        let pred = self.q.forward(obs, act).squeeze(D::Minus1)?;
        let loss = mse(&pred, target)?;
        self.q.step_clip(&loss, self.max_grad_norm)?;
        Ok(loss.to_scalar::<f32>()?)
    }

    /// One actor step: the stored joint actions with this agent's slot
    /// replaced by a fresh reparameterized draw from the current policy,
    /// pushed through the (fixed) online critic. Clipped gradients, own
    /// parameters only.
    fn p_train(&mut self, obs_n: &[Tensor], act_n: &[Tensor]) -> Result<f32> {
        let params = self.pi.forward(&obs_n[self.agent_index]);
        let sampled = self.space.sample(&params)?;

        let (q_obs, q_act) = if self.local_q {
            (obs_n[self.agent_index].clone(), sampled)
        } else {
            let mut act_input = act_n.to_vec();
            act_input[self.agent_index] = sampled;
            (
                Tensor::cat(obs_n, D::Minus1)?,
                Tensor::cat(&act_input, D::Minus1)?,
            )
        };

        let q = self.q.forward(&q_obs, &q_act).squeeze(D::Minus1)?;
        let pg_loss = q.mean_all()?.neg()?;
        let p_reg = params.powf(2.0)?.mean_all()?;
        let loss = (pg_loss + (p_reg * self.actor_reg)?)?;
        self.pi.step_clip(&loss, self.max_grad_norm)?;
        Ok(loss.to_scalar::<f32>()?)
    }
}

impl<P, Q> Peer for Maddpg<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    fn sample_at(&self, ixs: &[usize]) -> Result<PeerSample> {
        let batch = self.buffer.sample_index(ixs)?;
        Ok(PeerSample {
            obs: batch.obs.into(),
            act: batch.act.into(),
            next_obs: batch.next_obs.into(),
        })
    }

    fn target_action(&self, next_obs: &Tensor) -> Result<Tensor> {
        let params = self.pi_tgt.forward(next_obs);
        self.space.sample(&params)
    }
}

impl<P, Q> AgentTrainer for Maddpg<P, Q>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q: CriticModel,
    Q::Config: DeserializeOwned + Serialize + Debug + PartialEq + Clone,
{
    type Obs = Array1<f32>;
    type Act = Array1<f32>;
    type Peer = dyn Peer;

    fn name(&self) -> &str {
        &self.name
    }

    fn action(&self, obs: &Self::Obs) -> Result<Self::Act> {
        let obs = util::array_to_tensor::<f32, f32>(obs, true)?.to_device(&self.device)?;
        let params = self.pi.forward(&obs);
        let act = self.space.sample(&params)?;
        util::tensor_to_array(&act)
    }

    fn experience(
        &mut self,
        obs: Self::Obs,
        act: Self::Act,
        reward: f32,
        next_obs: Self::Obs,
        done: bool,
        terminal: bool,
    ) -> Result<()> {
        trace!(
            "{}: experience, reward = {}, done = {}, terminal = {}",
            self.name,
            reward,
            done,
            terminal
        );
        let obs = util::array_to_tensor::<f32, f32>(&obs, true)?.to_device(&self.device)?;
        let act = util::array_to_tensor::<f32, f32>(&act, true)?.to_device(&self.device)?;
        let next_obs =
            util::array_to_tensor::<f32, f32>(&next_obs, true)?.to_device(&self.device)?;

        self.buffer.push(Transition {
            obs: TensorBatch::from_tensor(obs),
            act: TensorBatch::from_tensor(act),
            next_obs: TensorBatch::from_tensor(next_obs),
            reward,
            done,
        });
        Ok(())
    }

    fn preupdate(&mut self) {
        self.sample_ixs = None;
    }

    fn update(&mut self, peers: &[&Self::Peer], t: usize) -> Result<Option<Record>> {
        if self.buffer.len() < self.warmup_len {
            return Ok(None);
        }
        if t % self.n_steps != 0 {
            return Ok(None);
        }
        if peers.len() + 1 != self.n_agents {
            return Err(HaggleError::PeerCount {
                expected: self.n_agents - 1,
                got: peers.len(),
            }
            .into());
        }

        debug!("update {} at step {}", self.name, t);

        // One index set, shared by every buffer in the roster.
        let ixs = self.buffer.make_index(self.batch_size)?;
        self.sample_ixs = Some(ixs.clone());

        let own = self.buffer.sample_index(&ixs)?;
        let reward = util::reward(&own.reward, &self.device)?;
        let not_done = util::not_done(&own.done, &self.device)?;

        let mut obs_n = Vec::with_capacity(self.n_agents);
        let mut act_n = Vec::with_capacity(self.n_agents);
        let mut next_obs_n = Vec::with_capacity(self.n_agents);
        for j in 0..self.n_agents {
            let slot = if j == self.agent_index {
                PeerSample {
                    obs: own.obs.clone().into(),
                    act: own.act.clone().into(),
                    next_obs: own.next_obs.clone().into(),
                }
            } else {
                self.slot(peers, j).sample_at(&ixs)?
            };
            obs_n.push(slot.obs);
            act_n.push(slot.act);
            next_obs_n.push(slot.next_obs);
        }

        // Bootstrap target, Monte-Carlo averaged over num_bootstrap draws
        // of the (possibly stochastic) target policies.
        let mut target_q_sum: Option<Tensor> = None;
        let mut target_q_next: Option<Tensor> = None;
        for _ in 0..self.num_bootstrap {
            let next_act_n = (0..self.n_agents)
                .map(|j| self.slot(peers, j).target_action(&next_obs_n[j]))
                .collect::<Result<Vec<_>>>()?;

            let (q_obs, q_act) = if self.local_q {
                (
                    next_obs_n[self.agent_index].clone(),
                    next_act_n[self.agent_index].clone(),
                )
            } else {
                (
                    Tensor::cat(&next_obs_n, D::Minus1)?,
                    Tensor::cat(&next_act_n, D::Minus1)?,
                )
            };
            let q_next = self.q_tgt.forward(&q_obs, &q_act).squeeze(D::Minus1)?;

            let draw = (&reward + ((&not_done * &q_next)? * self.gamma)?)?;
            target_q_sum = Some(match target_q_sum {
                None => draw,
                Some(acc) => (acc + draw)?,
            });
            target_q_next = Some(q_next);
        }
        let target_q = (target_q_sum.unwrap() / self.num_bootstrap as f64)?.detach();
        // The diagnostics report the last draw of q_next, not the average.
        let target_q_next = target_q_next.unwrap();

        let (q_obs, q_act) = if self.local_q {
            (
                obs_n[self.agent_index].clone(),
                act_n[self.agent_index].clone(),
            )
        } else {
            (
                Tensor::cat(&obs_n, D::Minus1)?,
                Tensor::cat(&act_n, D::Minus1)?,
            )
        };
        let loss_critic = self.q_train(&q_obs, &q_act, &target_q)?;
        let loss_actor = self.p_train(&obs_n, &act_n)?;

        util::track(self.pi_tgt.varmap(), self.pi.varmap(), self.polyak)?;
        util::track(self.q_tgt.varmap(), self.q.varmap(), self.polyak)?;

        Ok(Some(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic)),
            ("loss_actor", RecordValue::Scalar(loss_actor)),
            (
                "target_q_mean",
                RecordValue::Scalar(target_q.mean_all()?.to_vec0::<f32>()?),
            ),
            (
                "reward_mean",
                RecordValue::Scalar(reward.mean_all()?.to_vec0::<f32>()?),
            ),
            (
                "target_q_next_mean",
                RecordValue::Scalar(target_q_next.mean_all()?.to_vec0::<f32>()?),
            ),
            ("target_q_std", RecordValue::Scalar(util::std(&target_q))),
        ])))
    }

    fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        fs::create_dir_all(&path)?;
        self.pi
            .save(path.as_ref().join("actor.safetensors").as_path())?;
        self.pi_tgt
            .save(path.as_ref().join("actor_tgt.safetensors").as_path())?;
        self.q
            .save(path.as_ref().join("critic.safetensors").as_path())?;
        self.q_tgt
            .save(path.as_ref().join("critic_tgt.safetensors").as_path())?;
        Ok(())
    }

    fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.pi
            .load(path.as_ref().join("actor.safetensors").as_path())?;
        self.pi_tgt
            .load(path.as_ref().join("actor_tgt.safetensors").as_path())?;
        self.q
            .load(path.as_ref().join("critic.safetensors").as_path())?;
        self.q_tgt
            .load(path.as_ref().join("critic_tgt.safetensors").as_path())?;
        Ok(())
    }
}
