//! Utilities.
use anyhow::Result;
use candle_core::{Device, Tensor, WithDType};
use candle_nn::VarMap;
use log::trace;
use ndarray::Array1;
use num_traits::AsPrimitive;
use std::convert::TryFrom;

/// Advances target variables toward their online counterparts.
///
/// Variables are matched by name, so the pairing is deterministic
/// regardless of creation order.
///
/// dest = polyak * dest + (1.0 - polyak) * src
///
/// With `polyak = 1.0` the targets are frozen; with `polyak = 0.0` one call
/// makes them equal to the online variables.
pub fn track(dest: &VarMap, src: &VarMap, polyak: f64) -> Result<()> {
    trace!("track, polyak = {}", polyak);
    let dest = dest.data().lock().unwrap();
    let src = src.data().lock().unwrap();

    dest.iter().for_each(|(k_dest, v_dest)| {
        let v_src = src.get(k_dest).unwrap();
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = ((polyak * t_dest).unwrap() + (1.0 - polyak) * t_src).unwrap();
        v_dest.set(&t_dest).unwrap();
    });

    Ok(())
}

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Returns the standard deviation of a tensor.
pub fn std(t: &Tensor) -> f32 {
    t.broadcast_sub(&t.mean_all().unwrap())
        .unwrap()
        .powf(2f64)
        .unwrap()
        .mean_all()
        .unwrap()
        .sqrt()
        .unwrap()
        .to_vec0::<f32>()
        .unwrap()
}

/// Converts a 1-d array into a tensor, optionally prepending a batch
/// dimension of one.
pub fn array_to_tensor<T1, T2>(a: &Array1<T1>, add_batch_dim: bool) -> Result<Tensor>
where
    T1: AsPrimitive<T2>,
    T2: WithDType,
{
    let v = a.iter().map(|e| e.as_()).collect::<Vec<T2>>();
    let t: Tensor = TryFrom::<Vec<T2>>::try_from(v)?;

    match add_batch_dim {
        true => Ok(t.unsqueeze(0)?),
        false => Ok(t),
    }
}

/// Converts a tensor into a 1-d array, flattening any batch dimension.
pub fn tensor_to_array<T>(t: &Tensor) -> Result<Array1<T>>
where
    T: WithDType,
{
    let v: Vec<T> = t.flatten_all()?.to_vec1()?;
    Ok(Array1::from(v))
}

/// Returns `1 - done` as an f32 mask tensor.
pub fn not_done(done: &[i8], device: &Device) -> Result<Tensor> {
    let batch_size = done.len();
    let mask = done.iter().map(|e| 1f32 - *e as f32).collect::<Vec<_>>();
    Ok(Tensor::from_slice(&mask[..], (batch_size,), device)?)
}

/// Returns the rewards as a tensor.
pub fn reward(reward: &[f32], device: &Device) -> Result<Tensor> {
    let batch_size = reward.len();
    Ok(Tensor::from_slice(reward, (batch_size,), device)?)
}
