//! Scalar element types accepted by the packer.
//!
//! - `f32`, `f64`: native single and double precision
//! - [`f16`]: IEEE 754 half precision, from the `half` crate
//! - [`bf16`]: brain floating point, from the `half` crate
//!
//! Packing only moves values around, so any [`Element`] packs bit-exactly.
//! Unpacking accumulates overlapping windows with [`Element::accumulate`];
//! the half-precision types accumulate through `f32` and round once per add.

pub use half::{bf16, f16};

/// A scalar that can be stored in a [`Tensor`](crate::tensor::Tensor) and
/// accumulated by col2im.
pub trait Element: Copy + Default + PartialEq + core::fmt::Debug + Send + Sync + 'static {
    /// Additive identity, also the value read from the padding border.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// In-place addition: `*self += other`.
    fn accumulate(&mut self, other: Self);

    /// Widening conversion, used for comparisons in tests and benches.
    fn to_f64(self) -> f64;

    /// Narrowing conversion, rounding to nearest.
    fn from_f64(value: f64) -> Self;
}

impl Element for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Element for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[inline(always)]
    fn accumulate(&mut self, other: Self) {
        *self += other;
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value
    }
}

impl Element for f16 {
    const ZERO: Self = f16::ZERO;
    const ONE: Self = f16::ONE;

    #[inline(always)]
    fn accumulate(&mut self, other: Self) {
        *self = f16::from_f32(self.to_f32() + other.to_f32());
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        f16::from_f64(value)
    }
}

impl Element for bf16 {
    const ZERO: Self = bf16::ZERO;
    const ONE: Self = bf16::ONE;

    #[inline(always)]
    fn accumulate(&mut self, other: Self) {
        *self = bf16::from_f32(self.to_f32() + other.to_f32());
    }

    #[inline(always)]
    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        bf16::from_f64(value)
    }
}
