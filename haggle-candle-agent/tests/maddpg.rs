//! End-to-end behavior of the MADDPG trainer and its roster coordinator.
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::VarBuilder;
use haggle_candle_agent::{
    maddpg::{ActorConfig, CriticConfig, Maddpg, MaddpgConfig, Peer, Roster},
    mlp::{Mlp, MlpConfig},
    model::{ActorModel, CriticModel},
    space::ActionSpace,
    util::OutDim,
};
use haggle_core::{AgentTrainer, HaggleError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Constant-output policy network: mean fixed by the configuration, log-std
/// small enough that sampling collapses to the mean in f32.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StubActorConfig {
    out_dim: usize,
    mean: f32,
}

impl OutDim for StubActorConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, v: usize) {
        self.out_dim = v;
    }
}

struct StubActor {
    config: StubActorConfig,
}

impl ActorModel for StubActor {
    type Config = StubActorConfig;

    fn build(_vb: VarBuilder, config: Self::Config) -> Self {
        Self { config }
    }

    fn forward(&self, obs: &Tensor) -> Tensor {
        let batch = obs.dims()[0];
        let dim = self.config.out_dim / 2;
        let mean = Tensor::full(self.config.mean, (batch, dim), obs.device()).unwrap();
        let lstd = Tensor::full(-60f32, (batch, dim), obs.device()).unwrap();
        Tensor::cat(&[mean, lstd], D::Minus1).unwrap()
    }
}

/// Constant-output value network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StubCriticConfig {
    value: f32,
}

struct StubCritic {
    config: StubCriticConfig,
}

impl CriticModel for StubCritic {
    type Config = StubCriticConfig;

    fn build(_vb: VarBuilder, config: Self::Config) -> Self {
        Self { config }
    }

    fn forward(&self, obs: &Tensor, _act: &Tensor) -> Tensor {
        let batch = obs.dims()[0];
        Tensor::full(self.config.value, (batch, 1), obs.device()).unwrap()
    }
}

const OBS_DIM: usize = 3;
const REWARD: f32 = 0.5;
const Q_STUB: f32 = 2.0;
const GAMMA: f64 = 0.9;

fn stub_config(n_agents: usize, agent_index: usize) -> MaddpgConfig<StubActor, StubCritic> {
    MaddpgConfig::default()
        .name(format!("agent_{}", agent_index))
        .agent_index(agent_index)
        .obs_dims(vec![OBS_DIM; n_agents])
        .act_spaces(vec![ActionSpace::Continuous(1); n_agents])
        .actor_config(ActorConfig::default().net_config(StubActorConfig {
            out_dim: 2,
            mean: 0.25,
        }))
        .critic_config(CriticConfig::default().q_config(StubCriticConfig { value: Q_STUB }))
        .gamma(GAMMA)
        .batch_size(4)
        .max_episode_len(2)
        .n_steps(2)
        .buffer_capacity(64)
        .device(Device::Cpu)
}

fn stub_roster(n_agents: usize) -> Roster<StubActor, StubCritic> {
    let agents = (0..n_agents)
        .map(|i| Maddpg::build(stub_config(n_agents, i)).unwrap())
        .collect();
    Roster::new(agents).unwrap()
}

/// Pushes one synthetic step with constant reward into every buffer.
fn push_step(roster: &mut Roster<StubActor, StubCritic>) {
    let n = roster.len();
    let obs_n = vec![Array1::<f32>::zeros(OBS_DIM); n];
    let act_n = roster.actions(&obs_n).unwrap();
    let next_obs_n = vec![Array1::<f32>::zeros(OBS_DIM); n];
    roster
        .experience(
            obs_n,
            act_n,
            &vec![REWARD; n],
            next_obs_n,
            &vec![false; n],
            false,
        )
        .unwrap();
}

#[test]
fn update_is_gated_by_warmup_and_period() -> Result<()> {
    init();
    let mut roster = stub_roster(3);

    // Warm-up threshold is batch_size * max_episode_len = 8.
    for _ in 0..7 {
        push_step(&mut roster);
    }
    assert!(roster.update(0)?.iter().all(|r| r.is_none()));

    push_step(&mut roster);
    assert!(roster.update(1)?.iter().all(|r| r.is_none()));
    assert!(roster.update(2)?.iter().all(|r| r.is_some()));

    Ok(())
}

#[test]
fn bootstrap_target_matches_stub_arithmetic() -> Result<()> {
    init();
    let mut roster = stub_roster(3);
    for _ in 0..8 {
        push_step(&mut roster);
    }

    let records = roster.update(2)?;
    let expected_target = REWARD + GAMMA as f32 * Q_STUB;

    for record in records {
        let record = record.expect("roster past warm-up must train");

        assert!((record.get_scalar("reward_mean")? - REWARD).abs() < 1e-6);
        assert!((record.get_scalar("target_q_mean")? - expected_target).abs() < 1e-5);
        assert!((record.get_scalar("target_q_next_mean")? - Q_STUB).abs() < 1e-6);
        // The stub policies are deterministic, so all bootstrap draws agree
        // and the target has no spread.
        assert!(record.get_scalar("target_q_std")?.abs() < 1e-6);
        // Constant critic against the constant target.
        let expected_loss = (expected_target - Q_STUB).powi(2);
        assert!((record.get_scalar("loss_critic")? - expected_loss).abs() < 1e-4);
    }

    Ok(())
}

#[test]
fn local_q_mode_trains_on_own_slices() -> Result<()> {
    init();
    let mut agent = Maddpg::build(stub_config(1, 0).local_q(true)).unwrap();

    for _ in 0..8 {
        agent.experience(
            Array1::zeros(OBS_DIM),
            Array1::zeros(1),
            REWARD,
            Array1::zeros(OBS_DIM),
            false,
            false,
        )?;
    }

    let peers: Vec<&dyn Peer> = Vec::new();
    let record = agent.update(&peers, 0)?.expect("agent past warm-up");
    let expected_target = REWARD + GAMMA as f32 * Q_STUB;
    assert!((record.get_scalar("target_q_mean")? - expected_target).abs() < 1e-5);

    Ok(())
}

#[test]
fn preupdate_clears_the_sample_index() -> Result<()> {
    init();
    let mut agent = Maddpg::build(stub_config(1, 0)).unwrap();

    for _ in 0..8 {
        agent.experience(
            Array1::zeros(OBS_DIM),
            Array1::zeros(1),
            REWARD,
            Array1::zeros(OBS_DIM),
            false,
            false,
        )?;
    }
    assert!(agent.sample_indices().is_none());

    let peers: Vec<&dyn Peer> = Vec::new();
    agent.update(&peers, 0)?.expect("agent past warm-up");
    let ixs = agent.sample_indices().expect("update keeps its index set");
    assert_eq!(ixs.len(), 4);

    agent.preupdate();
    assert!(agent.sample_indices().is_none());

    Ok(())
}

#[test]
fn mismatched_space_lists_fail_at_build() {
    init();
    let config = stub_config(3, 0).obs_dims(vec![OBS_DIM; 2]);
    let err = Maddpg::build(config).unwrap_err();
    match err.downcast_ref::<HaggleError>() {
        Some(HaggleError::RosterMismatch { obs: 2, act: 3 }) => {}
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn wrong_peer_count_is_rejected() -> Result<()> {
    init();
    let mut agent = Maddpg::build(stub_config(3, 0)).unwrap();

    for _ in 0..8 {
        agent.experience(
            Array1::zeros(OBS_DIM),
            Array1::zeros(1),
            REWARD,
            Array1::zeros(OBS_DIM),
            false,
            false,
        )?;
    }

    let peers: Vec<&dyn Peer> = Vec::new();
    let err = agent.update(&peers, 0).unwrap_err();
    match err.downcast_ref::<HaggleError>() {
        Some(HaggleError::PeerCount {
            expected: 2,
            got: 0,
        }) => {}
        other => panic!("unexpected error: {:?}", other),
    }

    Ok(())
}

fn mlp_config(n_agents: usize, agent_index: usize) -> MaddpgConfig<Mlp, Mlp> {
    let obs_dim = 4;
    let n_actions = 2;
    let joint_dim = n_agents * (obs_dim + n_actions);
    MaddpgConfig::default()
        .name(format!("agent_{}", agent_index))
        .agent_index(agent_index)
        .obs_dims(vec![obs_dim; n_agents])
        .act_spaces(vec![ActionSpace::Discrete(n_actions); n_agents])
        .actor_config(
            ActorConfig::default().net_config(MlpConfig::new(obs_dim, vec![8], n_actions, false)),
        )
        .critic_config(
            CriticConfig::default().q_config(MlpConfig::new(joint_dim, vec![8], 1, false)),
        )
        .gamma(0.95)
        .batch_size(4)
        .max_episode_len(1)
        .n_steps(1)
        .buffer_capacity(32)
        .device(Device::Cpu)
}

#[test]
fn discrete_mlp_roster_trains_end_to_end() -> Result<()> {
    init();
    let agents = (0..2).map(|i| Maddpg::build(mlp_config(2, i)).unwrap()).collect();
    let mut roster: Roster<Mlp, Mlp> = Roster::new(agents)?;

    for step in 0..4 {
        let obs_n = vec![Array1::from_elem(4, step as f32 * 0.1); 2];
        let act_n = roster.actions(&obs_n)?;
        for act in &act_n {
            assert_eq!(act.len(), 2);
            assert!((act.sum() - 1.0).abs() < 1e-5);
        }
        let next_obs_n = vec![Array1::from_elem(4, (step + 1) as f32 * 0.1); 2];
        roster.experience(obs_n, act_n, &[0.1, -0.1], next_obs_n, &[false, false], false)?;
    }

    let records = roster.update(0)?;
    for record in records {
        let record = record.expect("roster past warm-up must train");
        assert!(record.get_scalar("loss_critic")?.is_finite());
        assert!(record.get_scalar("loss_actor")?.is_finite());
    }

    Ok(())
}

#[test]
fn save_and_load_roundtrip() -> Result<()> {
    init();
    let dir = tempdir::TempDir::new("maddpg")?;
    let path = dir.path().join("agent_0");

    let mut agent = Maddpg::build(mlp_config(1, 0)).unwrap();
    agent.save(&path)?;

    let obs = Array1::from_elem(4, 0.3);
    let act = agent.action(&obs)?;
    assert_eq!(act.len(), 2);

    agent.load(&path)?;
    Ok(())
}
