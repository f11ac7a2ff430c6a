//! Error types shared by the geometry, packing, batching and picking modules.
//!
//! Configuration problems (kernel larger than the input, mismatched ranks,
//! zero extents) are reported once, when a [`WindowGeometry`] or an
//! [`AxisPicker`] is built. Everything reported later is a buffer or shape
//! contract violation by the caller.
//!
//! [`WindowGeometry`]: crate::geometry::WindowGeometry
//! [`AxisPicker`]: crate::picker::AxisPicker

use crate::index::MAX_RANK;

/// Fixed-size shape descriptor for error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeDescriptor {
    dims: [usize; MAX_RANK],
    ndim: usize,
}

impl ShapeDescriptor {
    /// Create from a slice (truncates if > MAX_RANK).
    pub fn from_slice(shape: &[usize]) -> Self {
        let mut dims = [0usize; MAX_RANK];
        let ndim = shape.len().min(MAX_RANK);
        dims[..ndim].copy_from_slice(&shape[..ndim]);
        Self { dims, ndim }
    }

    /// Return as a slice.
    pub fn as_slice(&self) -> &[usize] {
        &self.dims[..self.ndim]
    }
}

impl core::fmt::Display for ShapeDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[")?;
        for (i, &d) in self.as_slice().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

/// Error type for window packing and layout operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PackError {
    /// Kernel does not fit the input under a non-covering padding policy.
    #[error("kernel {kernel} exceeds input size {size} along dimension {dim}")]
    KernelTooLarge { dim: usize, size: usize, kernel: usize },
    /// Spatial shape, kernel and stride lists disagree in length.
    #[error("rank mismatch: {spatial} spatial dims, {kernel} kernel dims, {stride} stride dims")]
    RankMismatch {
        spatial: usize,
        kernel: usize,
        stride: usize,
    },
    /// A size, kernel, stride or channel count of zero.
    #[error("{what} must be positive along dimension {dim}")]
    ZeroExtent { dim: usize, what: &'static str },
    /// Too many dimensions (exceeds MAX_RANK).
    #[error("too many ranks: {got}")]
    TooManyRanks { got: usize },
    /// Shape rejected at construction.
    #[error("invalid shape {shape}: {reason}")]
    InvalidShape {
        shape: ShapeDescriptor,
        reason: &'static str,
    },
    /// Shape mismatch between a buffer and what the operation expects.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch {
        expected: ShapeDescriptor,
        got: ShapeDescriptor,
    },
    /// Flat buffer of the wrong length.
    #[error("length mismatch: expected {expected} elements, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    /// Window matrix whose row count disagrees with the precomputed geometry.
    #[error("window matrix has {got} rows, geometry produces {expected} windows")]
    WindowCountMismatch { expected: usize, got: usize },
    /// Expected a specific number of dimensions.
    #[error("expected {expected} dimensions, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Axis index outside `-rank..rank`.
    #[error("axis {axis} out of range for rank {rank}")]
    AxisOutOfRange { axis: isize, rank: usize },
}

impl PackError {
    pub(crate) fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        PackError::ShapeMismatch {
            expected: ShapeDescriptor::from_slice(expected),
            got: ShapeDescriptor::from_slice(got),
        }
    }
}

/// Result alias used across the crate.
pub type PackResult<T> = Result<T, PackError>;
