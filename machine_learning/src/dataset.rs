use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis, s};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// An in-memory dataset. Each row holds the `x_size` features of a sample followed by its
/// `y_size` targets.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    data: Array2<f32>,
    x_size: usize,
}

impl Dataset {
    /// Creates a new `Dataset` from row-major samples.
    ///
    /// # Arguments
    /// * `data` - The samples, `x_size + y_size` values per row.
    /// * `x_size` - The amount of features per sample.
    /// * `y_size` - The amount of targets per sample.
    ///
    /// # Returns
    /// The dataset or an error if `data` can't be split evenly into rows.
    pub fn new(data: Vec<f32>, x_size: usize, y_size: usize) -> Result<Self> {
        let width = x_size + y_size;

        if x_size == 0 || y_size == 0 {
            return Err(MlErr::InvalidInput("a dataset needs features and targets"));
        }

        if data.len() % width != 0 {
            return Err(MlErr::ShapeMismatch {
                what: "dataset values",
                got: data.len() % width,
                expected: 0,
            });
        }

        let len = data.len() / width;
        let data = Array2::from_shape_vec((len, width), data).map_err(|_| MlErr::ShapeMismatch {
            what: "dataset values",
            got: len * width,
            expected: len * width,
        })?;

        Ok(Self { data, x_size })
    }

    /// Creates a new `Dataset` joining a feature matrix and a target matrix.
    pub fn from_arrays(x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::ShapeMismatch {
                what: "dataset targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        if x.ncols() == 0 || y.ncols() == 0 {
            return Err(MlErr::InvalidInput("a dataset needs features and targets"));
        }

        let data = ndarray::concatenate(Axis(1), &[x, y]).map_err(|_| {
            MlErr::InvalidInput("features and targets can't be joined")
        })?;

        Ok(Self {
            data,
            x_size: x.ncols(),
        })
    }

    /// Returns the amount of samples.
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x_size(&self) -> usize {
        self.x_size
    }

    pub fn y_size(&self) -> usize {
        self.data.ncols() - self.x_size
    }

    /// A view of every sample's features.
    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., ..self.x_size])
    }

    /// A view of every sample's targets.
    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., self.x_size..])
    }

    /// A view of the full rows.
    pub fn rows(&self) -> ArrayView2<'_, f32> {
        self.data.view()
    }

    /// Shuffles the samples in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        self.data = self.data.select(Axis(0), &order);
    }

    /// Returns a new dataset holding the samples at `indices`, in that order.
    ///
    /// # Returns
    /// The subset or an error if an index is out of bounds.
    pub fn select(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(MlErr::ShapeMismatch {
                what: "dataset index",
                got: bad,
                expected: self.len(),
            });
        }

        Ok(Self {
            data: self.data.select(Axis(0), indices),
            x_size: self.x_size,
        })
    }

    /// Iterates the samples in consecutive batches of at most `batch_size` rows.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let x_size = self.x_size;

        self.data
            .axis_chunks_iter(Axis(0), batch_size.get())
            .map(move |chunk| chunk.split_at(Axis(1), x_size))
    }
}
