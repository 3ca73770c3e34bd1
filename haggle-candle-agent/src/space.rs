//! Action spaces and their distribution adapters.
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::ops::softmax;
use serde::{Deserialize, Serialize};

/// Keeps log-std in a numerically safe band before exponentiation.
const MIN_LSTD: f64 = -20.0;
const MAX_LSTD: f64 = 2.0;

/// Guards the double logarithm of the Gumbel transform.
const GUMBEL_EPS: f64 = 1e-20;

/// An agent's action space, resolved once at construction.
///
/// Each variant carries its own sampling rule over the flat parameter
/// vector an [`ActorModel`](crate::model::ActorModel) emits. Both rules are
/// reparameterized draws, differentiable with respect to the parameters, so
/// an actor loss can be backpropagated through a sampled action:
///
/// - `Discrete(n)` - parameters are `n` logits; sampling applies the
///   Gumbel-softmax relaxation and yields a soft one-hot row of width `n`.
/// - `Continuous(dim)` - parameters are mean and log-std halves of width
///   `dim` each; sampling yields `mean + exp(lstd) * z` with standard
///   normal noise `z`.
#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum ActionSpace {
    /// `n` mutually exclusive choices.
    Discrete(usize),

    /// A real-valued vector of the given dimension.
    Continuous(usize),
}

impl ActionSpace {
    /// Width of the flat parameter vector the actor must emit.
    pub fn param_dim(&self) -> usize {
        match self {
            Self::Discrete(n) => *n,
            Self::Continuous(dim) => 2 * dim,
        }
    }

    /// Width of the action vector fed to the environment and the critics.
    pub fn act_dim(&self) -> usize {
        match self {
            Self::Discrete(n) => *n,
            Self::Continuous(dim) => *dim,
        }
    }

    /// Draws one action per row of `params` (shape `[batch, param_dim]`),
    /// differentiably. Returns shape `[batch, act_dim]`.
    pub fn sample(&self, params: &Tensor) -> Result<Tensor> {
        match self {
            Self::Discrete(_) => {
                let u = Tensor::rand(0f32, 1f32, params.dims(), params.device())?;
                let g = (((u + GUMBEL_EPS)?.log()?.neg()? + GUMBEL_EPS)?.log()?.neg())?;
                Ok(softmax(&(params + &g)?, D::Minus1)?)
            }
            Self::Continuous(dim) => {
                let mean = params.narrow(D::Minus1, 0, *dim)?;
                let lstd = params.narrow(D::Minus1, *dim, *dim)?;
                let std = lstd.clamp(MIN_LSTD, MAX_LSTD)?.exp()?;
                let z = Tensor::randn(0f32, 1f32, mean.dims(), params.device())?;
                Ok(((std * z)? + mean)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ActionSpace;
    use candle_core::{Device, Tensor};

    #[test]
    fn dims_per_variant() {
        assert_eq!(ActionSpace::Discrete(5).param_dim(), 5);
        assert_eq!(ActionSpace::Discrete(5).act_dim(), 5);
        assert_eq!(ActionSpace::Continuous(3).param_dim(), 6);
        assert_eq!(ActionSpace::Continuous(3).act_dim(), 3);
    }

    #[test]
    fn discrete_sample_is_a_soft_one_hot() {
        let space = ActionSpace::Discrete(4);
        let logits = Tensor::zeros((8, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
        let act = space.sample(&logits).unwrap();
        assert_eq!(act.dims(), [8, 4]);

        let sums: Vec<f32> = act
            .sum(candle_core::D::Minus1)
            .unwrap()
            .to_vec1()
            .unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn continuous_sample_collapses_to_mean_at_tiny_std() {
        let space = ActionSpace::Continuous(2);
        let params =
            Tensor::from_slice(&[1.0f32, -2.0, -60.0, -60.0], (1, 4), &Device::Cpu).unwrap();
        let act = space.sample(&params).unwrap();
        assert_eq!(act.dims(), [1, 2]);

        let row: Vec<f32> = act.squeeze(0).unwrap().to_vec1().unwrap();
        assert!((row[0] - 1.0).abs() < 1e-6);
        assert!((row[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn yaml_roundtrip() {
        let spaces = vec![ActionSpace::Discrete(7), ActionSpace::Continuous(2)];
        let s = serde_yaml::to_string(&spaces).unwrap();
        let back: Vec<ActionSpace> = serde_yaml::from_str(&s).unwrap();
        assert_eq!(back, spaces);
    }
}
