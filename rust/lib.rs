//! # winpack - N-Dimensional Sliding-Window Tensor Packing
//!
//! * Generalized im2col / col2im over any number of spatial dimensions.
//! * Three padding policies: `None`, `Fit` and `All`.
//! * Batch folding, so a whole batch of windows feeds a single GEMM call.
//! * Axis picking for per-channel statistics such as batch normalization.
//! * Handles f64 double-, f32 single-, and f16 / bf16 half-precision elements.
//!
//! ## Pipeline
//!
//! * [`WindowGeometry`] computes padding and window counts once per layer.
//! * [`WindowPacker`] packs an input into a window matrix, one window per row,
//!   and scatters gradients back.
//! * [`BatchFolder`] stacks the per-sample matrices of a batch into one block
//!   and unstacks the results.
//! * [`AxisPicker`] moves one sample axis out to the columns and back.
//!
//! # Example
//!
//! ```rust
//! use winpack::{BatchFolder, PaddingPolicy, Tensor, WindowPacker, WindowSpec};
//!
//! let spec = WindowSpec::new(&[2, 2]).with_stride(&[2, 2]).with_padding(PaddingPolicy::Fit);
//! let packer = WindowPacker::new(spec.geometry(&[4, 3, 2]).unwrap());
//!
//! let input: Vec<f32> = (1..=24).map(|v| v as f32).collect();
//! let input = Tensor::try_from_vec(input, &[4, 3, 2]).unwrap();
//! let matrix = packer.pack(&input).unwrap();
//! assert_eq!(matrix.shape(), &[4, 8]);
//! assert_eq!(matrix.row(1), Some(&[5.0, 6.0, 0.0, 0.0, 11.0, 12.0, 0.0, 0.0][..]));
//!
//! // Disjoint windows: unpacking restores the input.
//! assert_eq!(packer.unpack(&matrix).unwrap(), input);
//!
//! // A batch of three samples, one per column, folded into a [12, 8] block.
//! let batch = Tensor::<f32>::try_new(&[24, 3], 1.0).unwrap();
//! let block = BatchFolder::default().fold(&batch, &packer).unwrap();
//! assert_eq!(block.shape(), &[12, 8]);
//! ```
//!
//! # Features
//!
//! * `parallel`: rayon-backed per-sample fold and unfold.
//! * `serde`: `Serialize` / `Deserialize` for [`WindowSpec`] and [`PaddingPolicy`].
//!
//! Geometry construction and batch folding log through `tracing`; install a
//! subscriber to see the events.

pub mod batch;
pub mod error;
pub mod geometry;
pub mod index;
pub mod packer;
pub mod picker;
pub mod scalars;
pub mod tensor;

pub use batch::{BatchFolder, Reshape, SampleAxis, SampleTransform};
pub use error::{PackError, PackResult, ShapeDescriptor};
pub use geometry::{DimGeometry, PaddingPolicy, WindowGeometry, WindowSpec};
pub use packer::WindowPacker;
pub use picker::AxisPicker;
pub use scalars::{bf16, f16, Element};
pub use tensor::Tensor;
