//! N-dimensional row-major tensor.
//!
//! This module provides:
//!
//! - [`Tensor`]: owned, contiguous, row-major array with a fixed shape
//! - Matrix helpers (rows, columns) for the 2D window and batch matrices
//!
//! # Example
//!
//! ```rust
//! use winpack::Tensor;
//!
//! let data: Vec<f32> = (1..=6).map(|v| v as f32).collect();
//! let t = Tensor::try_from_slice(&data, &[2, 3]).unwrap();
//! assert_eq!(t.row(1), Some(&[4.0, 5.0, 6.0][..]));
//! ```

use crate::error::{PackError, PackResult, ShapeDescriptor};
use crate::index::{flat_index, MAX_RANK};
use crate::scalars::Element;

// region: Tensor

/// Owned N-dimensional array, last dimension fastest-varying.
///
/// The shape is fixed at creation; only the values are mutable. Reshaping
/// consumes the tensor and hands back one with the same buffer.
#[derive(Clone, PartialEq)]
pub struct Tensor<T> {
    /// Flat row-major data buffer.
    data: Vec<T>,
    /// Shape dimensions.
    shape: [usize; MAX_RANK],
    /// Number of dimensions.
    ndim: usize,
}

impl<T: core::fmt::Debug> core::fmt::Debug for Tensor<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &&self.shape[..self.ndim])
            .field("data", &self.data)
            .finish()
    }
}

/// Validates a shape and returns its element count.
fn checked_len(shape: &[usize]) -> PackResult<usize> {
    if shape.len() > MAX_RANK {
        return Err(PackError::TooManyRanks { got: shape.len() });
    }
    if shape.iter().any(|&d| d == 0) {
        return Err(PackError::InvalidShape {
            shape: ShapeDescriptor::from_slice(shape),
            reason: "zero-sized dimension",
        });
    }
    Ok(shape.iter().product())
}

fn shape_array(shape: &[usize]) -> [usize; MAX_RANK] {
    let mut arr = [0usize; MAX_RANK];
    arr[..shape.len()].copy_from_slice(shape);
    arr
}

impl<T: Element> Tensor<T> {
    /// Creates a new Tensor filled with a value.
    ///
    /// Returns `Err` if the shape has a zero-sized dimension or too many ranks.
    pub fn try_new(shape: &[usize], value: T) -> PackResult<Self> {
        let total = checked_len(shape)?;
        Ok(Self {
            data: vec![value; total],
            shape: shape_array(shape),
            ndim: shape.len(),
        })
    }

    /// Creates a zero-filled Tensor.
    pub fn zeros(shape: &[usize]) -> PackResult<Self> {
        Self::try_new(shape, T::ZERO)
    }

    /// Creates a Tensor from existing slice data.
    ///
    /// Returns `Err` if shape doesn't match data length.
    pub fn try_from_slice(data: &[T], shape: &[usize]) -> PackResult<Self> {
        Self::try_from_vec(data.to_vec(), shape)
    }

    /// Wraps an existing buffer without copying.
    pub fn try_from_vec(data: Vec<T>, shape: &[usize]) -> PackResult<Self> {
        let total = checked_len(shape)?;
        if data.len() != total {
            return Err(PackError::shape_mismatch(shape, &[data.len()]));
        }
        Ok(Self {
            data,
            shape: shape_array(shape),
            ndim: shape.len(),
        })
    }

    /// Same buffer, new shape of equal element count.
    pub fn try_reshape(self, new_shape: &[usize]) -> PackResult<Self> {
        let total = checked_len(new_shape)?;
        if total != self.data.len() {
            return Err(PackError::shape_mismatch(new_shape, self.shape()));
        }
        Ok(Self {
            data: self.data,
            shape: shape_array(new_shape),
            ndim: new_shape.len(),
        })
    }

    /// Overwrites every element with `value`.
    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }
}

impl<T> Tensor<T> {
    /// Returns the shape of the array.
    pub fn shape(&self) -> &[usize] {
        &self.shape[..self.ndim]
    }

    /// Returns the number of dimensions.
    pub fn ndim(&self) -> usize {
        self.ndim
    }

    /// Returns the total number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying data as a slice.
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Returns the underlying data as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consumes the tensor, returning its flat buffer.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Element at a multi-dimensional position.
    pub fn get(&self, pos: &[usize]) -> Option<&T> {
        if pos.len() != self.ndim || pos.iter().zip(self.shape()).any(|(&p, &s)| p >= s) {
            return None;
        }
        self.data.get(flat_index(pos, self.shape()))
    }

    /// `(rows, cols)` of a 2D tensor.
    pub fn matrix_dims(&self) -> PackResult<(usize, usize)> {
        if self.ndim != 2 {
            return Err(PackError::DimensionMismatch {
                expected: 2,
                got: self.ndim,
            });
        }
        Ok((self.shape[0], self.shape[1]))
    }

    /// Returns a row of a 2D array.
    pub fn row(&self, i: usize) -> Option<&[T]> {
        let (rows, cols) = self.matrix_dims().ok()?;
        if i >= rows {
            return None;
        }
        let start = i * cols;
        Some(&self.data[start..start + cols])
    }

    /// Returns a mutable row of a 2D array.
    pub fn row_mut(&mut self, i: usize) -> Option<&mut [T]> {
        let (rows, cols) = self.matrix_dims().ok()?;
        if i >= rows {
            return None;
        }
        let start = i * cols;
        Some(&mut self.data[start..start + cols])
    }
}

impl<T: Copy> Tensor<T> {
    /// Copies column `j` of a 2D array into `dest` (length = rows).
    pub fn copy_column_into(&self, j: usize, dest: &mut [T]) -> PackResult<()> {
        let (rows, cols) = self.matrix_dims()?;
        if j >= cols {
            return Err(PackError::shape_mismatch(&[rows, j + 1], self.shape()));
        }
        if dest.len() != rows {
            return Err(PackError::LengthMismatch {
                expected: rows,
                got: dest.len(),
            });
        }
        for (r, d) in dest.iter_mut().enumerate() {
            *d = self.data[r * cols + j];
        }
        Ok(())
    }

    /// Overwrites column `j` of a 2D array with `src` (length = rows).
    pub fn set_column(&mut self, j: usize, src: &[T]) -> PackResult<()> {
        let (rows, cols) = self.matrix_dims()?;
        if j >= cols {
            return Err(PackError::shape_mismatch(&[rows, j + 1], self.shape()));
        }
        if src.len() != rows {
            return Err(PackError::LengthMismatch {
                expected: rows,
                got: src.len(),
            });
        }
        for (r, &s) in src.iter().enumerate() {
            self.data[r * cols + j] = s;
        }
        Ok(())
    }
}

// endregion: Tensor

// region: Tests


// endregion: Tests
