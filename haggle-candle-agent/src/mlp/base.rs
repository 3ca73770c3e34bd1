use super::{mlp_forward, MlpConfig};
use crate::model::{ActorModel, CriticModel};
use anyhow::Result;
use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, VarBuilder};

/// Returns a vector of linear modules from [`MlpConfig`].
fn create_linear_layers(prefix: &str, vs: VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let mut in_out_pairs: Vec<(usize, usize)> = (0..config.units.len() - 1)
        .map(|i| (config.units[i], config.units[i + 1]))
        .collect();
    in_out_pairs.insert(0, (config.in_dim, config.units[0]));
    in_out_pairs.push((*config.units.last().unwrap(), config.out_dim));
    let vs = vs.pp(prefix);

    Ok(in_out_pairs
        .iter()
        .enumerate()
        .map(|(i, &(in_dim, out_dim))| linear(in_dim, out_dim, vs.pp(format!("ln{}", i))).unwrap())
        .collect())
}

/// Multilayer perceptron with ReLU activation functions.
///
/// Serves as both a policy network (observation to flat distribution
/// parameters) and a value network (concatenated observation and action to
/// one value per row).
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
}

fn _build(vs: VarBuilder, config: MlpConfig) -> Mlp {
    let device = vs.device().clone();
    let layers = create_linear_layers("mlp", vs, &config).unwrap();

    Mlp {
        config,
        device,
        layers,
    }
}

impl ActorModel for Mlp {
    type Config = MlpConfig;

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }

    fn forward(&self, obs: &Tensor) -> Tensor {
        let xs = obs.to_device(&self.device).unwrap();
        let xs = mlp_forward(xs, &self.layers);

        match self.config.activation_out {
            false => xs,
            true => xs.relu().unwrap(),
        }
    }
}

impl CriticModel for Mlp {
    type Config = MlpConfig;

    fn build(vs: VarBuilder, config: Self::Config) -> Self {
        _build(vs, config)
    }

    fn forward(&self, obs: &Tensor, act: &Tensor) -> Tensor {
        let obs: Tensor = obs.to_device(&self.device).unwrap();
        let act: Tensor = act.to_device(&self.device).unwrap();
        let input = Tensor::cat(&[obs, act], D::Minus1)
            .unwrap()
            .to_device(&self.device)
            .unwrap();
        let xs = mlp_forward(input, &self.layers);

        match self.config.activation_out {
            false => xs,
            true => xs.relu().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn forward_shapes() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(6, vec![32, 32], 4, false);
        let mlp = <Mlp as ActorModel>::build(vb, config);

        let obs = Tensor::zeros((3, 6), DType::F32, &Device::Cpu).unwrap();
        let out = ActorModel::forward(&mlp, &obs);
        assert_eq!(out.dims(), [3, 4]);
    }

    #[test]
    fn two_input_forward_concatenates() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let config = MlpConfig::new(10, vec![16], 1, false);
        let mlp = <Mlp as CriticModel>::build(vb, config);

        let obs = Tensor::zeros((5, 7), DType::F32, &Device::Cpu).unwrap();
        let act = Tensor::zeros((5, 3), DType::F32, &Device::Cpu).unwrap();
        let out = CriticModel::forward(&mlp, &obs, &act);
        assert_eq!(out.dims(), [5, 1]);
    }
}
