//! Batch folding: many samples stacked into one block matrix for a single
//! matrix multiplication, and back.
//!
//! A batch matrix holds one flattened sample per column (or per row, see
//! [`SampleAxis`]). [`BatchFolder::fold`] runs a [`SampleTransform`] on each
//! sample and stacks the resulting `[rows, cols]` blocks vertically, giving a
//! `[rows * batch, cols]` block matrix. [`BatchFolder::unfold`] runs the
//! backward transform on each block slice and writes the samples back.
//!
//! ```rust
//! use winpack::{BatchFolder, Reshape, Tensor};
//!
//! // Two samples of length 4, one per column.
//! let batch = Tensor::try_from_slice(&[1.0f32, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0], &[4, 2]).unwrap();
//! let folder = BatchFolder::default();
//! let block = folder.fold(&batch, &Reshape::new(2, 2)).unwrap();
//! assert_eq!(block.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
//! assert_eq!(folder.unfold(&block, &Reshape::new(2, 2)).unwrap(), batch);
//! ```

use crate::error::{PackError, PackResult};
use crate::packer::WindowPacker;
use crate::scalars::Element;
use crate::tensor::Tensor;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Per-sample transform between a flat sample and a `[rows, cols]` block.
pub trait SampleTransform<T>: Sync {
    /// Elements in one flattened sample.
    fn sample_len(&self) -> usize;

    /// `[rows, cols]` of the block produced for one sample.
    fn block_shape(&self) -> [usize; 2];

    /// Sample to block. Every element of `block` is written.
    fn forward(&self, sample: &[T], block: &mut [T]) -> PackResult<()>;

    /// Block to sample. Every element of `sample` is written.
    fn backward(&self, block: &[T], sample: &mut [T]) -> PackResult<()>;
}

impl<T: Element> SampleTransform<T> for WindowPacker {
    fn sample_len(&self) -> usize {
        self.geometry().input_len()
    }

    fn block_shape(&self) -> [usize; 2] {
        self.geometry().matrix_shape()
    }

    fn forward(&self, sample: &[T], block: &mut [T]) -> PackResult<()> {
        self.pack_into(sample, block)
    }

    fn backward(&self, block: &[T], sample: &mut [T]) -> PackResult<()> {
        self.unpack_into(block, sample)
    }
}

/// Reinterprets a sample as a `[rows, cols]` block without moving values.
///
/// Used for the layer outputs and their gradients, which are already laid
/// out window-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reshape {
    pub rows: usize,
    pub cols: usize,
}

impl Reshape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

fn copy_checked<T: Copy>(src: &[T], dst: &mut [T]) -> PackResult<()> {
    if src.len() != dst.len() {
        return Err(PackError::LengthMismatch {
            expected: dst.len(),
            got: src.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

impl<T: Copy + Send + Sync> SampleTransform<T> for Reshape {
    fn sample_len(&self) -> usize {
        self.rows * self.cols
    }

    fn block_shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    fn forward(&self, sample: &[T], block: &mut [T]) -> PackResult<()> {
        copy_checked(sample, block)
    }

    fn backward(&self, block: &[T], sample: &mut [T]) -> PackResult<()> {
        copy_checked(block, sample)
    }
}

/// Where samples live in a batch matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleAxis {
    /// `[sample_len, batch]`, one sample per column.
    #[default]
    Columns,
    /// `[batch, sample_len]`, one sample per row.
    Rows,
}

/// Folds batches into block matrices and unfolds them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchFolder {
    pub axis: SampleAxis,
}

impl BatchFolder {
    pub fn new(axis: SampleAxis) -> Self {
        Self { axis }
    }

    /// Number of samples in `batch`.
    pub fn batch_size<T>(&self, batch: &Tensor<T>) -> PackResult<usize> {
        let (rows, cols) = batch.matrix_dims()?;
        Ok(match self.axis {
            SampleAxis::Columns => cols,
            SampleAxis::Rows => rows,
        })
    }

    fn batch_shape(&self, sample_len: usize, n: usize) -> [usize; 2] {
        match self.axis {
            SampleAxis::Columns => [sample_len, n],
            SampleAxis::Rows => [n, sample_len],
        }
    }

    /// Validates both matrices and returns the batch size.
    fn check<T, S: SampleTransform<T> + ?Sized>(
        &self,
        batch: &Tensor<T>,
        block: &Tensor<T>,
        transform: &S,
    ) -> PackResult<usize> {
        let n = self.batch_size(batch)?;
        let expected = self.batch_shape(transform.sample_len(), n);
        if batch.shape() != expected {
            return Err(PackError::shape_mismatch(&expected, batch.shape()));
        }
        let [rows, cols] = transform.block_shape();
        if block.shape() != [rows * n, cols] {
            return Err(PackError::shape_mismatch(&[rows * n, cols], block.shape()));
        }
        Ok(n)
    }

    fn gather<'a, T: Copy>(
        &self,
        batch: &'a Tensor<T>,
        j: usize,
        scratch: &'a mut [T],
    ) -> PackResult<&'a [T]> {
        match self.axis {
            SampleAxis::Columns => {
                batch.copy_column_into(j, scratch)?;
                Ok(scratch)
            }
            SampleAxis::Rows => batch
                .row(j)
                .ok_or_else(|| PackError::shape_mismatch(&[j + 1], batch.shape())),
        }
    }

    fn scatter<T: Copy>(&self, batch: &mut Tensor<T>, j: usize, sample: &[T]) -> PackResult<()> {
        match self.axis {
            SampleAxis::Columns => batch.set_column(j, sample),
            SampleAxis::Rows => {
                let shape = batch.shape().to_vec();
                let row = batch
                    .row_mut(j)
                    .ok_or_else(|| PackError::shape_mismatch(&[j + 1], &shape))?;
                copy_checked(sample, row)
            }
        }
    }

    /// Runs `transform.forward` on every sample of `batch`, writing sample
    /// `j` into rows `j * rows .. (j + 1) * rows` of `block`.
    pub fn fold_into<T: Element, S: SampleTransform<T> + ?Sized>(
        &self,
        batch: &Tensor<T>,
        block: &mut Tensor<T>,
        transform: &S,
    ) -> PackResult<()> {
        let n = self.check(batch, block, transform)?;
        tracing::trace!(batch = n, block = ?block.shape(), axis = ?self.axis, "fold");

        let [rows, cols] = transform.block_shape();
        let mut scratch = vec![T::ZERO; transform.sample_len()];
        for (j, slice) in block.as_mut_slice().chunks_mut(rows * cols).enumerate() {
            let sample = self.gather(batch, j, &mut scratch)?;
            transform.forward(sample, slice)?;
        }
        Ok(())
    }

    /// Allocating form of [`fold_into`](Self::fold_into).
    pub fn fold<T: Element, S: SampleTransform<T> + ?Sized>(
        &self,
        batch: &Tensor<T>,
        transform: &S,
    ) -> PackResult<Tensor<T>> {
        let n = self.batch_size(batch)?;
        let [rows, cols] = transform.block_shape();
        let mut block = Tensor::zeros(&[rows * n, cols])?;
        self.fold_into(batch, &mut block, transform)?;
        Ok(block)
    }

    /// Runs `transform.backward` on every block slice, writing the result
    /// into sample `j` of `batch`.
    pub fn unfold_into<T: Element, S: SampleTransform<T> + ?Sized>(
        &self,
        batch: &mut Tensor<T>,
        block: &Tensor<T>,
        transform: &S,
    ) -> PackResult<()> {
        let n = self.check(batch, block, transform)?;
        tracing::trace!(batch = n, block = ?block.shape(), axis = ?self.axis, "unfold");

        let [rows, cols] = transform.block_shape();
        let mut sample = vec![T::ZERO; transform.sample_len()];
        for (j, slice) in block.as_slice().chunks(rows * cols).enumerate() {
            transform.backward(slice, &mut sample)?;
            self.scatter(batch, j, &sample)?;
        }
        Ok(())
    }

    /// Allocating form of [`unfold_into`](Self::unfold_into). The batch size
    /// is `block_rows / rows`.
    pub fn unfold<T: Element, S: SampleTransform<T> + ?Sized>(
        &self,
        block: &Tensor<T>,
        transform: &S,
    ) -> PackResult<Tensor<T>> {
        let (block_rows, block_cols) = block.matrix_dims()?;
        let [rows, cols] = transform.block_shape();
        if rows == 0 || block_cols != cols || block_rows % rows != 0 {
            let n = block_rows.div_ceil(rows.max(1));
            return Err(PackError::shape_mismatch(&[rows * n, cols], block.shape()));
        }
        let shape = self.batch_shape(transform.sample_len(), block_rows / rows);
        let mut batch = Tensor::zeros(&shape)?;
        self.unfold_into(&mut batch, block, transform)?;
        Ok(batch)
    }
}

#[cfg(feature = "parallel")]
impl BatchFolder {
    /// [`fold_into`](Self::fold_into) with one rayon task per sample.
    pub fn fold_into_parallel<T: Element, S: SampleTransform<T> + ?Sized>(
        &self,
        batch: &Tensor<T>,
        block: &mut Tensor<T>,
        transform: &S,
    ) -> PackResult<()> {
        let n = self.check(batch, block, transform)?;
        tracing::trace!(batch = n, block = ?block.shape(), axis = ?self.axis, "parallel fold");

        let [rows, cols] = transform.block_shape();
        let sample_len = transform.sample_len();
        block
            .as_mut_slice()
            .par_chunks_mut(rows * cols)
            .enumerate()
            .try_for_each(|(j, slice)| {
                let mut scratch = vec![T::ZERO; sample_len];
                let sample = self.gather(batch, j, &mut scratch)?;
                transform.forward(sample, slice)
            })
    }

    /// [`unfold_into`](Self::unfold_into) with one rayon task per sample.
    /// Each task writes its own buffer; samples are scattered afterwards.
    pub fn unfold_into_parallel<T: Element, S: SampleTransform<T> + ?Sized>(
        &self,
        batch: &mut Tensor<T>,
        block: &Tensor<T>,
        transform: &S,
    ) -> PackResult<()> {
        let n = self.check(batch, block, transform)?;
        tracing::trace!(batch = n, block = ?block.shape(), axis = ?self.axis, "parallel unfold");

        let [rows, cols] = transform.block_shape();
        let sample_len = transform.sample_len();
        let samples = block
            .as_slice()
            .par_chunks(rows * cols)
            .map(|slice| {
                let mut sample = vec![T::ZERO; sample_len];
                transform.backward(slice, &mut sample)?;
                Ok(sample)
            })
            .collect::<PackResult<Vec<_>>>()?;
        for (j, sample) in samples.iter().enumerate() {
            self.scatter(batch, j, sample)?;
        }
        Ok(())
    }
}
