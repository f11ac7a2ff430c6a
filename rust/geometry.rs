//! Window geometry: per-dimension padding and window-count arithmetic.
//!
//! A [`WindowGeometry`] is computed once from a layer's static configuration
//! and then shared, read-only, by every pack and unpack call.
//!
//! # Padding policies
//!
//! | Policy | Window count              | Padding                              |
//! |--------|---------------------------|--------------------------------------|
//! | None   | `(size - k) / s + 1`      | none, trailing remainder dropped     |
//! | Fit    | None, plus one if needed  | minimal, `left = pad / 2`, right gets the rest |
//! | All    | `ceil(size / s)`          | `k / 2` on both sides                |
//!
//! A kernel spanning the whole dimension (`k == size`) always yields exactly
//! one unpadded window, whatever the policy and stride. The channel
//! dimension is modeled that way: it is an explicit `channels` count, never
//! slid over.

use crate::error::{PackError, PackResult};
use crate::index::MAX_RANK;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the spatial extent is padded before windows are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PaddingPolicy {
    /// No padding; a misaligned trailing remainder is not covered.
    #[default]
    None,
    /// Minimal padding so an integral number of windows covers the input.
    Fit,
    /// Symmetric half-kernel padding ("same" style).
    All,
}

/// Geometry of one spatial dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimGeometry {
    /// Input extent.
    pub size: usize,
    /// Window extent.
    pub kernel: usize,
    /// Distance between consecutive window starts.
    pub stride: usize,
    /// Zero cells logically prepended.
    pub pad_left: usize,
    /// Zero cells logically appended.
    pub pad_right: usize,
    /// Number of window positions.
    pub windows: usize,
}

impl DimGeometry {
    /// Computes the geometry of dimension `dim` (used for error reporting).
    pub(crate) fn compute(
        dim: usize,
        size: usize,
        kernel: usize,
        stride: usize,
        policy: PaddingPolicy,
    ) -> PackResult<Self> {
        for (value, what) in [(size, "size"), (kernel, "kernel"), (stride, "stride")] {
            if value == 0 {
                return Err(PackError::ZeroExtent { dim, what });
            }
        }
        if kernel == size {
            return Ok(Self::full(size).with_stride(stride));
        }

        let unpadded = Self {
            size,
            kernel,
            stride,
            pad_left: 0,
            pad_right: 0,
            windows: 0,
        };
        match policy {
            PaddingPolicy::None | PaddingPolicy::Fit if kernel > size => {
                Err(PackError::KernelTooLarge { dim, size, kernel })
            }
            PaddingPolicy::None => Ok(Self {
                windows: (size - kernel) / stride + 1,
                ..unpadded
            }),
            PaddingPolicy::Fit => {
                let mut windows = (size - kernel) / stride + 1;
                let covered = (windows - 1) * stride + kernel;
                if covered == size {
                    return Ok(Self { windows, ..unpadded });
                }
                windows += 1;
                let pad = (windows - 1) * stride + kernel - size;
                Ok(Self {
                    pad_left: pad / 2,
                    pad_right: pad - pad / 2,
                    windows,
                    ..unpadded
                })
            }
            PaddingPolicy::All => Ok(Self {
                pad_left: kernel / 2,
                pad_right: kernel / 2,
                windows: size.div_ceil(stride),
                ..unpadded
            }),
        }
    }

    /// A dimension consumed whole by a single window.
    pub fn full(size: usize) -> Self {
        Self {
            size,
            kernel: size,
            stride: size,
            pad_left: 0,
            pad_right: 0,
            windows: 1,
        }
    }

    fn with_stride(self, stride: usize) -> Self {
        Self { stride, ..self }
    }

    /// Extent of the logically padded dimension.
    pub fn padded(&self) -> usize {
        self.pad_left + self.size + self.pad_right
    }

    /// Padded-coordinate start of window `index`.
    #[inline]
    pub fn start(&self, index: usize) -> usize {
        index * self.stride
    }

    /// Input cells past the end of the last window. Always zero under
    /// [`PaddingPolicy::Fit`].
    pub fn dropped(&self) -> usize {
        let reach = (self.windows - 1) * self.stride + self.kernel;
        (self.pad_left + self.size).saturating_sub(reach)
    }
}

/// Full window geometry: spatial dimensions plus an explicit channel count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowGeometry {
    dims: Vec<DimGeometry>,
    channels: usize,
    policy: PaddingPolicy,
}

impl WindowGeometry {
    /// Builds the geometry for an input of `spatial` dims and `channels`
    /// channels, slid over by `kernel` with `stride`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use winpack::{PaddingPolicy, WindowGeometry};
    ///
    /// let geometry = WindowGeometry::try_new(&[4, 3], 2, &[2, 2], &[2, 2], PaddingPolicy::Fit).unwrap();
    /// assert_eq!(geometry.window_counts(), vec![2, 2]);
    /// assert_eq!(geometry.matrix_shape(), [4, 8]);
    /// ```
    pub fn try_new(
        spatial: &[usize],
        channels: usize,
        kernel: &[usize],
        stride: &[usize],
        policy: PaddingPolicy,
    ) -> PackResult<Self> {
        if kernel.len() != spatial.len() || stride.len() != spatial.len() {
            return Err(PackError::RankMismatch {
                spatial: spatial.len(),
                kernel: kernel.len(),
                stride: stride.len(),
            });
        }
        if spatial.len() + 1 > MAX_RANK {
            return Err(PackError::TooManyRanks {
                got: spatial.len() + 1,
            });
        }
        if channels == 0 {
            return Err(PackError::ZeroExtent {
                dim: spatial.len(),
                what: "channel count",
            });
        }

        let dims = spatial
            .iter()
            .zip(kernel)
            .zip(stride)
            .enumerate()
            .map(|(dim, ((&size, &k), &s))| DimGeometry::compute(dim, size, k, s, policy))
            .collect::<PackResult<Vec<_>>>()?;

        let geometry = Self {
            dims,
            channels,
            policy,
        };
        tracing::debug!(
            input = ?geometry.input_shape(),
            windows = ?geometry.window_counts(),
            volume = geometry.window_volume(),
            ?policy,
            "window geometry ready"
        );
        if geometry.dims.iter().any(|d| d.dropped() > 0) {
            tracing::debug!(
                dropped = ?geometry.dropped_cells(),
                "trailing remainder not covered by any window"
            );
        }
        Ok(geometry)
    }

    /// Same as [`try_new`](Self::try_new), taking the channel count from the
    /// last entry of `input_shape`.
    pub fn from_input_shape(
        input_shape: &[usize],
        kernel: &[usize],
        stride: &[usize],
        policy: PaddingPolicy,
    ) -> PackResult<Self> {
        match input_shape.split_last() {
            Some((&channels, spatial)) => Self::try_new(spatial, channels, kernel, stride, policy),
            None => Err(PackError::DimensionMismatch {
                expected: 1,
                got: 0,
            }),
        }
    }

    /// Per spatial dimension geometry.
    pub fn dims(&self) -> &[DimGeometry] {
        &self.dims
    }

    /// Channel count, packed whole into every window.
    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn policy(&self) -> PaddingPolicy {
        self.policy
    }

    pub fn spatial_rank(&self) -> usize {
        self.dims.len()
    }

    /// Spatial sizes followed by the channel count.
    pub fn input_shape(&self) -> Vec<usize> {
        self.collect_with_channels(|d| d.size)
    }

    pub fn input_len(&self) -> usize {
        self.input_shape().iter().product()
    }

    /// Shape of the logically padded input.
    pub fn padded_shape(&self) -> Vec<usize> {
        self.collect_with_channels(|d| d.padded())
    }

    /// Window positions along each spatial dimension.
    pub fn window_counts(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.windows).collect()
    }

    /// Rows of the window matrix.
    pub fn window_count(&self) -> usize {
        self.dims.iter().map(|d| d.windows).product()
    }

    /// Kernel extents followed by the channel count.
    pub fn kernel_shape(&self) -> Vec<usize> {
        self.collect_with_channels(|d| d.kernel)
    }

    /// Columns of the window matrix.
    pub fn window_volume(&self) -> usize {
        self.dims.iter().map(|d| d.kernel).product::<usize>() * self.channels
    }

    /// `[rows, cols]` of the window matrix.
    pub fn matrix_shape(&self) -> [usize; 2] {
        [self.window_count(), self.window_volume()]
    }

    /// Shape of a convolution output computed from this geometry with
    /// `out_channels` kernels: window counts, then the output channel count.
    pub fn output_shape(&self, out_channels: usize) -> Vec<usize> {
        let mut shape = self.window_counts();
        shape.push(out_channels);
        shape
    }

    /// Trailing cells left uncovered per spatial dimension.
    pub fn dropped_cells(&self) -> Vec<usize> {
        self.dims.iter().map(|d| d.dropped()).collect()
    }

    fn collect_with_channels(&self, f: impl Fn(&DimGeometry) -> usize) -> Vec<usize> {
        let mut shape: Vec<usize> = self.dims.iter().map(f).collect();
        shape.push(self.channels);
        shape
    }
}

/// Window configuration as a layer stores it.
///
/// Stride defaults to one along every dimension, padding to
/// [`PaddingPolicy::None`].
///
/// ```rust
/// use winpack::{PaddingPolicy, WindowSpec};
///
/// let spec = WindowSpec::new(&[3, 3]).with_stride(&[2, 2]).with_padding(PaddingPolicy::All);
/// let geometry = spec.geometry(&[5, 5, 8]).unwrap();
/// assert_eq!(geometry.window_counts(), vec![3, 3]);
/// assert_eq!(geometry.window_volume(), 72);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WindowSpec {
    pub kernel: Vec<usize>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub stride: Option<Vec<usize>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub padding: PaddingPolicy,
}

impl WindowSpec {
    pub fn new(kernel: &[usize]) -> Self {
        Self {
            kernel: kernel.to_vec(),
            stride: None,
            padding: PaddingPolicy::None,
        }
    }

    pub fn with_stride(mut self, stride: &[usize]) -> Self {
        self.stride = Some(stride.to_vec());
        self
    }

    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    /// Geometry for `input_shape` (spatial dims, then channels).
    pub fn geometry(&self, input_shape: &[usize]) -> PackResult<WindowGeometry> {
        let stride = self
            .stride
            .clone()
            .unwrap_or_else(|| vec![1; self.kernel.len()]);
        WindowGeometry::from_input_shape(input_shape, &self.kernel, &stride, self.padding)
    }
}
