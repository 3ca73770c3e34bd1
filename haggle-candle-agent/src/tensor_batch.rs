use candle_core::{Device, Tensor};
use haggle_core::BatchBase;

/// Replay-buffer row storage backed by a [`Tensor`].
///
/// The backing tensor of shape `[capacity, row_dims...]` is allocated
/// lazily from the first pushed row, so the buffer needs no up-front
/// knowledge of row shapes.
///
/// [`Tensor`]: https://docs.rs/candle-core/0.8.4/candle_core/struct.Tensor.html
#[derive(Clone, Debug)]
pub struct TensorBatch {
    buf: Option<Tensor>,
    capacity: usize,
}

impl TensorBatch {
    /// Wraps an existing tensor; its leading dimension becomes the
    /// capacity.
    pub fn from_tensor(t: Tensor) -> Self {
        let capacity = t.dims()[0] as _;
        Self {
            buf: Some(t),
            capacity,
        }
    }

    /// Moves the storage to the given device.
    pub fn to(&mut self, device: &Device) -> candle_core::Result<()> {
        if let Some(buf) = &self.buf {
            self.buf = Some(buf.to_device(device)?);
        }
        Ok(())
    }
}

impl BatchBase for TensorBatch {
    fn new(capacity: usize) -> Self {
        Self {
            buf: None,
            capacity,
        }
    }

    /// Writes the rows of `data` at `index`.
    ///
    /// On the first push the backing tensor is initialized with the shape
    /// `[capacity, data.dims()[1..]]`. The owning buffer keeps `index` plus
    /// the row count within capacity.
    fn push(&mut self, index: usize, data: Self) {
        let data = match data.buf {
            Some(data) => data,
            None => return,
        };
        if data.dims()[0] == 0 {
            return;
        }

        if self.buf.is_none() {
            let mut shape = data.dims().to_vec();
            shape[0] = self.capacity;
            let dtype = data.dtype();
            let device = data.device().clone();
            self.buf = Some(Tensor::zeros(shape, dtype, &device).unwrap());
        }

        self.buf
            .as_mut()
            .unwrap()
            .slice_set(&data, 0, index)
            .unwrap();
    }

    fn sample(&self, ixs: &[usize]) -> Self {
        let capacity = ixs.len();
        let ixs = {
            let device = self.buf.as_ref().unwrap().device();
            let ixs = ixs.iter().map(|x| *x as u32).collect();
            Tensor::from_vec(ixs, (capacity,), device).unwrap()
        };
        let buf = Some(self.buf.as_ref().unwrap().index_select(&ixs, 0).unwrap());
        Self { buf, capacity }
    }
}

impl From<TensorBatch> for Tensor {
    fn from(b: TensorBatch) -> Self {
        b.buf.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::TensorBatch;
    use candle_core::{Device, Tensor};
    use haggle_core::BatchBase;

    fn row(values: &[f32]) -> TensorBatch {
        let t = Tensor::from_slice(values, (1, values.len()), &Device::Cpu).unwrap();
        TensorBatch::from_tensor(t)
    }

    #[test]
    fn push_then_sample_returns_rows_in_order() {
        let mut batch = TensorBatch::new(4);
        batch.push(0, row(&[0.0, 0.5]));
        batch.push(1, row(&[1.0, 1.5]));
        batch.push(2, row(&[2.0, 2.5]));

        let picked: Tensor = batch.sample(&[2, 0, 0]).into();
        assert_eq!(picked.dims(), [3, 2]);
        let rows: Vec<Vec<f32>> = picked.to_vec2().unwrap();
        assert_eq!(rows[0], vec![2.0, 2.5]);
        assert_eq!(rows[1], vec![0.0, 0.5]);
        assert_eq!(rows[2], vec![0.0, 0.5]);
    }

    #[test]
    fn overwrite_replaces_a_row_in_place() {
        let mut batch = TensorBatch::new(2);
        batch.push(0, row(&[1.0]));
        batch.push(1, row(&[2.0]));
        batch.push(0, row(&[9.0]));

        let all: Tensor = batch.sample(&[0, 1]).into();
        let rows: Vec<Vec<f32>> = all.to_vec2().unwrap();
        assert_eq!(rows[0], vec![9.0]);
        assert_eq!(rows[1], vec![2.0]);
    }
}
