use ndarray::{linalg, prelude::*};

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer.
///
/// The layer doesn't own its parameters, it receives a slice of `(dim.0 + 1) * dim.1`
/// values laid out as the row-major `(dim.0, dim.1)` weight matrix followed by the
/// `dim.1` biases.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The input and output dimensions of the layer.
    /// * `act_fn` - An optional activation function applied to the output.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        let zeros = Array2::zeros((0, 0));

        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: zeros.clone(),
            z: zeros,
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the input and output dimensions of this layer.
    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Computes the layer's output without keeping any metadata for a later backward pass.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `x` - The input batch, one sample per row.
    ///
    /// # Returns
    /// The activated output or an error if the shapes don't match.
    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut a = self.affine(params, x)?;

        if let Some(act_fn) = &self.act_fn {
            a.mapv_inplace(|z| act_fn.f(z));
        }

        Ok(a)
    }

    /// Computes the layer's output, saving the input and pre-activation values for `backward`.
    ///
    /// The saved buffers are only reallocated when the batch size changes.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(x)?;
        let (w, b) = self.view_params(params)?;
        let shape = (x.nrows(), self.dim.1);

        if self.z.dim() != shape {
            self.z = Array2::zeros(shape);
        }
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut self.z);
        self.z += &b;

        if self.x.dim() == x.dim() {
            self.x.assign(&x);
        } else {
            self.x = x.to_owned();
        }

        let a = match &self.act_fn {
            Some(act_fn) => self.z.mapv(|z| act_fn.f(z)),
            None => self.z.clone(),
        };

        Ok(a)
    }

    /// Writes this layer's gradient into `grad` and propagates the delta backwards.
    ///
    /// # Arguments
    /// * `params` - This layer's parameter slice.
    /// * `grad` - This layer's gradient slice, gets overwritten.
    /// * `d` - The derivative of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The derivative of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::ShapeMismatch {
                what: "dense delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        let mut dx = Array2::zeros((d.nrows(), self.dim.0));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut dx);
        Ok(dx)
    }

    fn affine(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(x)?;
        let (w, b) = self.view_params(params)?;

        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;
        Ok(z)
    }

    fn check_input(&self, x: ArrayView2<f32>) -> Result<()> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::ShapeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        Ok(())
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw).map_err(|_| self.mismatch(w_size))?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw).map_err(|_| self.mismatch(w_size))?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let (w_raw, b_raw) = params.split_at(w_size);
        let w = ArrayView2::from_shape(self.dim, w_raw).map_err(|_| self.mismatch(w_size))?;
        let b = ArrayView1::from_shape(self.dim.1, b_raw).map_err(|_| self.mismatch(w_size))?;
        Ok((w, b))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::ShapeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }

    fn mismatch(&self, got: usize) -> MlErr {
        MlErr::ShapeMismatch {
            what: "dense weights",
            got,
            expected: self.dim.0 * self.dim.1,
        }
    }
}
