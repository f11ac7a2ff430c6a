//! Axis picking: moving one sample axis out to the matrix columns.
//!
//! Data is a batch matrix `[prod(shape), B]` with one sample of `shape` per
//! column. Viewing it as `[pre, A, post, B]` with `A = shape[axis]`,
//! [`AxisPicker::pick`] swaps `A` and `B` and returns `[pre * B * post, A]`:
//! every column now holds one index of the picked axis across all samples and
//! remaining positions. That is the layout a per-channel statistic (batch
//! normalization) wants. The swap is its own inverse, so picking the result
//! again with the recorded shape restores the original.
//!
//! ```rust
//! use winpack::{AxisPicker, Tensor};
//!
//! // Two samples of shape [2, 2], one per column.
//! let data = Tensor::try_from_slice(&[1.0f32, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0], &[4, 2]).unwrap();
//! let mut picker = AxisPicker::try_new(&[2, 2], -1).unwrap();
//! let picked = picker.pick(&data).unwrap();
//! assert_eq!(picked.as_slice(), &[1.0, 2.0, 5.0, 6.0, 3.0, 4.0, 7.0, 8.0]);
//! assert_eq!(picker.shape(), &[2, 2]);
//! assert_eq!(picker.pick(&picked).unwrap(), data);
//! ```

use crate::error::{PackError, PackResult, ShapeDescriptor};
use crate::index::MAX_RANK;
use crate::scalars::Element;
use crate::tensor::Tensor;

/// `[pre, lanes, post, batch]` view of a batch matrix.
#[derive(Debug, Clone, Copy)]
struct Layout {
    pre: usize,
    lanes: usize,
    post: usize,
    batch: usize,
}

impl Layout {
    /// Flat index of `(p, a, q, b)` in the unpicked matrix.
    #[inline]
    fn source(&self, p: usize, a: usize, q: usize, b: usize) -> usize {
        ((p * self.lanes + a) * self.post + q) * self.batch + b
    }

    /// Rows of the picked matrix.
    fn picked_rows(&self) -> usize {
        self.pre * self.batch * self.post
    }

    /// Visits `(source, lane, position)` in picked order, where `position`
    /// is the row of the picked matrix.
    fn for_each(&self, mut visit: impl FnMut(usize, usize, usize)) {
        let mut position = 0;
        for p in 0..self.pre {
            for b in 0..self.batch {
                for q in 0..self.post {
                    for a in 0..self.lanes {
                        visit(self.source(p, a, q, b), a, position);
                    }
                    position += 1;
                }
            }
        }
    }
}

/// Moves one axis of column-stacked samples to the matrix columns and back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisPicker {
    shape: Vec<usize>,
    axis: usize,
}

impl AxisPicker {
    /// Picker for samples of `sample_shape`. Negative `axis` counts from the
    /// end (`-1` is the last axis).
    pub fn try_new(sample_shape: &[usize], axis: isize) -> PackResult<Self> {
        let rank = sample_shape.len();
        if rank > MAX_RANK {
            return Err(PackError::TooManyRanks { got: rank });
        }
        if sample_shape.iter().any(|&d| d == 0) {
            return Err(PackError::InvalidShape {
                shape: ShapeDescriptor::from_slice(sample_shape),
                reason: "zero-sized dimension",
            });
        }
        let signed_rank = rank as isize;
        if rank == 0 || axis < -signed_rank || axis >= signed_rank {
            return Err(PackError::AxisOutOfRange { axis, rank });
        }
        Ok(Self {
            shape: sample_shape.to_vec(),
            axis: axis.rem_euclid(signed_rank) as usize,
        })
    }

    /// Normalized axis index.
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Sample shape currently recorded. After a [`pick`](Self::pick) the
    /// picked axis holds the batch size it was called with.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Extent of the picked axis.
    pub fn lane_count(&self) -> usize {
        self.shape[self.axis]
    }

    fn layout(&self, rows: usize, cols: usize) -> PackResult<Layout> {
        let sample_len: usize = self.shape.iter().product();
        if rows != sample_len {
            return Err(PackError::shape_mismatch(&[sample_len, cols], &[rows, cols]));
        }
        Ok(Layout {
            pre: self.shape[..self.axis].iter().product(),
            lanes: self.shape[self.axis],
            post: self.shape[self.axis + 1..].iter().product(),
            batch: cols,
        })
    }

    /// Gathers `[pre, A, post, B]` into `[pre * B * post, A]` and records
    /// `B` as the new extent of the picked axis.
    pub fn pick<T: Element>(&mut self, data: &Tensor<T>) -> PackResult<Tensor<T>> {
        let (rows, cols) = data.matrix_dims()?;
        let layout = self.layout(rows, cols)?;
        let mut out = Tensor::zeros(&[layout.picked_rows(), layout.lanes])?;
        self.pick_into(data.as_slice(), cols, out.as_mut_slice())?;
        Ok(out)
    }

    /// Slice form of [`pick`](Self::pick); `input` is row-major with `cols`
    /// columns.
    pub fn pick_into<T: Element>(&mut self, input: &[T], cols: usize, out: &mut [T]) -> PackResult<()> {
        let sample_len: usize = self.shape.iter().product();
        if cols == 0 || input.len() != sample_len * cols {
            return Err(PackError::LengthMismatch {
                expected: sample_len * cols.max(1),
                got: input.len(),
            });
        }
        if out.len() != input.len() {
            return Err(PackError::LengthMismatch {
                expected: input.len(),
                got: out.len(),
            });
        }
        let layout = self.layout(sample_len, cols)?;
        tracing::trace!(axis = self.axis, shape = ?self.shape, batch = cols, "pick");

        let mut dst = 0;
        layout.for_each(|src, _, _| {
            out[dst] = input[src];
            dst += 1;
        });
        self.shape[self.axis] = cols;
        Ok(())
    }

    /// Gathers into `[A, pre * B * post]`: one row per index of the picked
    /// axis. Does not change the recorded shape.
    pub fn pick_rows<T: Element>(&self, data: &Tensor<T>) -> PackResult<Tensor<T>> {
        let (rows, cols) = data.matrix_dims()?;
        let layout = self.layout(rows, cols)?;
        let width = layout.picked_rows();
        let mut out = Tensor::zeros(&[layout.lanes, width])?;
        let input = data.as_slice();
        let lanes = out.as_mut_slice();
        layout.for_each(|src, a, position| lanes[a * width + position] = input[src]);
        Ok(out)
    }

    /// Inverse of [`pick_rows`](Self::pick_rows).
    pub fn restore_rows<T: Element>(&self, lanes: &Tensor<T>) -> PackResult<Tensor<T>> {
        let (rows, width) = lanes.matrix_dims()?;
        let spread = self.shape.iter().product::<usize>() / self.lane_count();
        if rows != self.lane_count() || width % spread != 0 {
            let batch = width.div_ceil(spread);
            return Err(PackError::shape_mismatch(
                &[self.lane_count(), spread * batch],
                lanes.shape(),
            ));
        }
        let batch = width / spread;
        let layout = self.layout(self.shape.iter().product(), batch)?;
        let mut out = Tensor::zeros(&[layout.pre * layout.lanes * layout.post, batch])?;
        let input = lanes.as_slice();
        let data = out.as_mut_slice();
        layout.for_each(|src, a, position| data[src] = input[a * width + position]);
        Ok(out)
    }

    /// Applies `f(lane_index, lane)` to every lane of the picked axis, in
    /// place. Each lane holds every value sharing that axis index, across
    /// all samples.
    pub fn map_lanes<T: Element>(
        &self,
        data: &mut Tensor<T>,
        mut f: impl FnMut(usize, &mut [T]),
    ) -> PackResult<()> {
        let mut lanes = self.pick_rows(data)?;
        let width = lanes.matrix_dims()?.1;
        for (a, lane) in lanes.as_mut_slice().chunks_mut(width).enumerate() {
            f(a, lane);
        }
        let restored = self.restore_rows(&lanes)?;
        data.as_mut_slice().copy_from_slice(restored.as_slice());
        Ok(())
    }
}
