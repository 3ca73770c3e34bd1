//! Optimizers.
use anyhow::Result;
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW, VarMap};
use candle_optimisers::adam::{Adam, ParamsAdam};
use serde::{Deserialize, Serialize};

/// Configuration of the optimizer training a single network.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// AdamW optimizer.
    AdamW {
        /// Learning rate.
        lr: f64,
        #[serde(default = "default_beta1")]
        beta1: f64,
        #[serde(default = "default_beta2")]
        beta2: f64,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_weight_decay")]
        weight_decay: f64,
    },

    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
    },
}

fn default_beta1() -> f64 {
    ParamsAdamW::default().beta1
}

fn default_beta2() -> f64 {
    ParamsAdamW::default().beta2
}

fn default_eps() -> f64 {
    ParamsAdamW::default().eps
}

fn default_weight_decay() -> f64 {
    ParamsAdamW::default().weight_decay
}

impl OptimizerConfig {
    /// Constructs the optimizer over the given variables.
    pub fn build(&self, vars: Vec<Var>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => {
                let params = ParamsAdamW {
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    weight_decay: *weight_decay,
                };
                let opt = AdamW::new(vars, params)?;
                Ok(Optimizer::AdamW(opt))
            }
            OptimizerConfig::Adam { lr } => {
                let params = ParamsAdam {
                    lr: *lr,
                    ..ParamsAdam::default()
                };
                let opt = Adam::new(vars, params)?;
                Ok(Optimizer::Adam(opt))
            }
        }
    }

    /// Overrides the learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::AdamW {
                lr: _,
                beta1,
                beta2,
                eps,
                weight_decay,
            } => Self::AdamW {
                lr,
                beta1,
                beta2,
                eps,
                weight_decay,
            },
            Self::Adam { lr: _ } => Self::Adam { lr },
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        let params = ParamsAdamW::default();
        Self::AdamW {
            lr: params.lr,
            beta1: params.beta1,
            beta2: params.beta2,
            eps: params.eps,
            weight_decay: params.weight_decay,
        }
    }
}

/// Computes gradients of `loss` and rescales them so their global norm over
/// the variables of `varmap` does not exceed `max_norm`.
pub fn clip_grads(loss: &Tensor, varmap: &VarMap, max_norm: f64) -> Result<GradStore> {
    let mut grads = loss.backward()?;
    let all_vars = varmap.all_vars();
    let mut var_ids = vec![];
    let mut total_norm_squared = 0f32;

    for var in all_vars.iter() {
        if let Some(grad) = grads.get_id(var.id()) {
            var_ids.push(var.id());
            total_norm_squared += grad.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }

    let total_norm = total_norm_squared.sqrt();
    if total_norm > max_norm as f32 {
        let clip_coef = max_norm / (total_norm as f64 + 1e-6);
        for var_id in var_ids {
            let var = all_vars.iter().find(|v| v.id() == var_id).unwrap();
            let clipped = (grads.get_id(var_id).unwrap() * clip_coef)?;
            grads.insert(var.as_tensor(), clipped);
        }
    }

    Ok(grads)
}

/// Optimizers.
///
/// This is a thin wrapper over the candle optimizer implementations.
pub enum Optimizer {
    /// AdamW optimizer.
    AdamW(AdamW),

    /// Adam optimizer.
    Adam(Adam),
}

impl Optimizer {
    /// Applies a backward pass and one optimization step.
    pub fn backward_step(&mut self, loss: &Tensor) -> Result<()> {
        match self {
            Self::AdamW(opt) => Ok(opt.backward_step(loss)?),
            Self::Adam(opt) => Ok(opt.backward_step(loss)?),
        }
    }

    /// Applies a backward pass with global gradient-norm clipping over
    /// `varmap`, then one optimization step.
    pub fn backward_step_clip(
        &mut self,
        loss: &Tensor,
        varmap: &VarMap,
        max_norm: f64,
    ) -> Result<()> {
        let grads = clip_grads(loss, varmap, max_norm)?;
        self.step(&grads)
    }

    /// Applies one optimization step for precomputed gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::AdamW(opt) => Ok(opt.step(grads)?),
            Self::Adam(opt) => Ok(opt.step(grads)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::clip_grads;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{Init, VarMap};

    #[test]
    fn clipped_norm_is_bounded() -> anyhow::Result<()> {
        let varmap = VarMap::new();
        let w = varmap.get((3,), "w", Init::Const(1.0), DType::F32, &Device::Cpu)?;

        let coef = Tensor::from_slice(&[3.0f32, 4.0, 0.0], (3,), &Device::Cpu)?;
        let loss = (&w * &coef)?.sum_all()?;

        // Unclipped gradient is [3, 4, 0], norm 5.
        let grads = clip_grads(&loss, &varmap, 0.5)?;
        let vars = varmap.all_vars();
        let g = grads.get_id(vars[0].id()).unwrap();
        let norm = g.sqr()?.sum_all()?.to_scalar::<f32>()?.sqrt();
        assert!((norm - 0.5).abs() < 1e-4);

        Ok(())
    }

    #[test]
    fn small_gradients_pass_through() -> anyhow::Result<()> {
        let varmap = VarMap::new();
        let w = varmap.get((2,), "w", Init::Const(1.0), DType::F32, &Device::Cpu)?;

        let coef = Tensor::from_slice(&[0.1f32, 0.2], (2,), &Device::Cpu)?;
        let loss = (&w * &coef)?.sum_all()?;

        let grads = clip_grads(&loss, &varmap, 0.5)?;
        let vars = varmap.all_vars();
        let g: Vec<f32> = grads.get_id(vars[0].id()).unwrap().to_vec1()?;
        assert!((g[0] - 0.1).abs() < 1e-6);
        assert!((g[1] - 0.2).abs() < 1e-6);

        Ok(())
    }
}
