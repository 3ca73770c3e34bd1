//! Actor of the MADDPG agent.
use crate::{
    model::ActorModel,
    opt::{Optimizer, OptimizerConfig},
    util::OutDim,
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Actor`].
pub struct ActorConfig<P: OutDim> {
    net_config: Option<P>,
    opt_config: OptimizerConfig,
}

impl<P: OutDim> Default for ActorConfig<P> {
    fn default() -> Self {
        Self {
            net_config: None,
            opt_config: OptimizerConfig::default(),
        }
    }
}

impl<P> ActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets the configuration of the policy network.
    pub fn net_config(mut self, v: P) -> Self {
        self.net_config = Some(v);
        self
    }

    /// Sets the output dimension of the policy network.
    pub fn out_dim(mut self, v: usize) -> Self {
        match &mut self.net_config {
            None => {}
            Some(net_config) => net_config.set_out_dim(v),
        };
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`ActorConfig`] from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Policy network with its own parameter set and optimizer.
///
/// The trainer keeps two instances per agent: the online copy, trained each
/// step, and the target copy, advanced only by Polyak averaging of the
/// online parameters. The parameter set is owned here and handed out
/// through [`varmap`](Self::varmap); nothing is looked up by name from a
/// global graph.
pub struct Actor<P>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    varmap: VarMap,

    // Width of the flat distribution-parameter vector.
    out_dim: usize,

    net: P,
    opt: Optimizer,
}

impl<P> Actor<P>
where
    P: ActorModel,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Actor`].
    pub fn build(config: ActorConfig<P::Config>, device: &Device) -> Result<Actor<P>> {
        let net_config = config.net_config.context("net_config is not set.")?;
        let out_dim = net_config.get_out_dim();
        let varmap = VarMap::new();
        let net = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            P::build(vb, net_config)
        };
        let opt = config.opt_config.build(varmap.all_vars())?;

        Ok(Self {
            varmap,
            out_dim,
            net,
            opt,
        })
    }

    /// Outputs flat distribution parameters given a batch of observations.
    pub fn forward(&self, obs: &Tensor) -> Tensor {
        let params = self.net.forward(obs);
        debug_assert_eq!(params.dims()[1], self.out_dim);
        params
    }

    /// Applies one gradient step with global gradient-norm clipping.
    pub fn step_clip(&mut self, loss: &Tensor, max_norm: f64) -> Result<()> {
        self.opt.backward_step_clip(loss, &self.varmap, max_norm)
    }

    /// Returns the parameter set of this network.
    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Saves the parameters into a safetensors file.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save actor to {:?}", path.as_ref());
        Ok(())
    }

    /// Loads the parameters from a safetensors file.
    pub fn load<T: AsRef<Path>>(&mut self, path: T) -> Result<()> {
        self.varmap.load(&path)?;
        info!("Load actor from {:?}", path.as_ref());
        Ok(())
    }
}
