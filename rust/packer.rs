//! Window packing (im2col) and unpacking (col2im).
//!
//! [`WindowPacker::pack`] gathers every window of the logically padded input
//! into one row of the window matrix, row-major over window positions.
//! Columns are row-major over kernel positions with channels fastest.
//! [`WindowPacker::unpack`] is its adjoint: every row is scattered back and
//! summed into the cells it came from, so overlapping windows accumulate and
//! contributions landing in the padding border are discarded.
//!
//! No padded copy of the input is ever materialized. Both directions walk the
//! same sequence of contiguous runs along the innermost spatial dimension.
//!
//! ```rust
//! use winpack::{PaddingPolicy, Tensor, WindowGeometry, WindowPacker};
//!
//! let geometry = WindowGeometry::from_input_shape(&[4, 1], &[3], &[1], PaddingPolicy::All).unwrap();
//! let packer = WindowPacker::new(geometry);
//! let input = Tensor::try_from_slice(&[1.0f32, 2.0, 3.0, 4.0], &[4, 1]).unwrap();
//! let matrix = packer.pack(&input).unwrap();
//! assert_eq!(matrix.shape(), &[4, 3]);
//! assert_eq!(matrix.row(0), Some(&[0.0, 1.0, 2.0][..]));
//! assert_eq!(matrix.row(3), Some(&[3.0, 4.0, 0.0][..]));
//! ```

use crate::error::{PackError, PackResult};
use crate::geometry::{DimGeometry, WindowGeometry};
use crate::index::{row_major_strides, Odometer};
use crate::scalars::Element;
use crate::tensor::Tensor;

/// One contiguous stretch of a window row, in elements.
///
/// `head` padding zeros, then `valid` values read from `src` in the input,
/// then `tail` padding zeros, starting at flat offset `col` of the matrix.
#[derive(Debug, Clone, Copy)]
struct Run {
    col: usize,
    src: usize,
    head: usize,
    valid: usize,
    tail: usize,
}

/// Clips window `index` of `dim` against the unpadded input.
///
/// Returns `(head, first, valid)`: padding cells before the input, the first
/// input coordinate touched and the number of input cells touched.
fn clip(dim: &DimGeometry, index: usize) -> (usize, usize, usize) {
    let start = dim.start(index);
    let lo = start.max(dim.pad_left);
    let hi = (start + dim.kernel).min(dim.pad_left + dim.size);
    if lo >= hi {
        return (dim.kernel, 0, 0);
    }
    (lo - start, lo - dim.pad_left, hi - lo)
}

/// Packs and unpacks tensors of one fixed geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowPacker {
    geometry: WindowGeometry,
}

impl WindowPacker {
    pub fn new(geometry: WindowGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &WindowGeometry {
        &self.geometry
    }

    /// Visits every run of the window matrix in row-major order.
    fn for_each_run(&self, mut visit: impl FnMut(Run)) {
        let geometry = &self.geometry;
        let channels = geometry.channels();
        let Some((inner, outer)) = geometry.dims().split_last() else {
            // No spatial dims: the single window is the whole input.
            visit(Run {
                col: 0,
                src: 0,
                head: 0,
                valid: channels,
                tail: 0,
            });
            return;
        };

        let strides = row_major_strides(&geometry.input_shape());
        let last = outer.len();
        let run_len = inner.kernel * channels;
        let outer_kernel: Vec<usize> = outer.iter().map(|d| d.kernel).collect();

        let mut windows = Odometer::new(&geometry.window_counts());
        let mut offsets = Odometer::new(&outer_kernel);
        let mut col = 0usize;
        while let Some(window) = windows.next_position() {
            let (head, first, valid) = clip(inner, window[last]);
            offsets.reset();
            while let Some(offset) = offsets.next_position() {
                let mut src = first * strides[last];
                let mut inside = valid > 0;
                for (d, dim) in outer.iter().enumerate() {
                    let p = dim.start(window[d]) + offset[d];
                    if p < dim.pad_left || p >= dim.pad_left + dim.size {
                        inside = false;
                        break;
                    }
                    src += (p - dim.pad_left) * strides[d];
                }

                let run = if inside {
                    Run {
                        col,
                        src,
                        head: head * channels,
                        valid: valid * channels,
                        tail: run_len - (head + valid) * channels,
                    }
                } else {
                    Run {
                        col,
                        src: 0,
                        head: run_len,
                        valid: 0,
                        tail: 0,
                    }
                };
                visit(run);
                col += run_len;
            }
        }
    }

    /// Packs `input` into a `[window_count, window_volume]` matrix.
    ///
    /// `input` must have the geometry's input shape, or be its flat rank-1
    /// equivalent.
    pub fn pack<T: Element>(&self, input: &Tensor<T>) -> PackResult<Tensor<T>> {
        let expected = self.geometry.input_shape();
        let flat = input.ndim() == 1 && input.len() == self.geometry.input_len();
        if input.shape() != expected.as_slice() && !flat {
            return Err(PackError::shape_mismatch(&expected, input.shape()));
        }
        let [rows, cols] = self.geometry.matrix_shape();
        let mut matrix = Tensor::zeros(&[rows, cols])?;
        self.pack_into(input.as_slice(), matrix.as_mut_slice())?;
        Ok(matrix)
    }

    /// Slice form of [`pack`](Self::pack). Every element of `out` is written.
    pub fn pack_into<T: Element>(&self, input: &[T], out: &mut [T]) -> PackResult<()> {
        self.check_lengths(input.len(), out.len())?;
        self.for_each_run(|run| {
            let dst = &mut out[run.col..run.col + run.head + run.valid + run.tail];
            let (head, rest) = dst.split_at_mut(run.head);
            let (body, tail) = rest.split_at_mut(run.valid);
            head.fill(T::ZERO);
            body.copy_from_slice(&input[run.src..run.src + run.valid]);
            tail.fill(T::ZERO);
        });
        Ok(())
    }

    /// Scatters a window matrix back to an input-shaped gradient.
    pub fn unpack<T: Element>(&self, matrix: &Tensor<T>) -> PackResult<Tensor<T>> {
        let (rows, cols) = matrix.matrix_dims()?;
        let [window_count, volume] = self.geometry.matrix_shape();
        if rows != window_count {
            return Err(PackError::WindowCountMismatch {
                expected: window_count,
                got: rows,
            });
        }
        if cols != volume {
            return Err(PackError::shape_mismatch(&[window_count, volume], matrix.shape()));
        }
        let mut grad = Tensor::zeros(&self.geometry.input_shape())?;
        self.unpack_into(matrix.as_slice(), grad.as_mut_slice())?;
        Ok(grad)
    }

    /// Slice form of [`unpack`](Self::unpack). `grad` is overwritten, not
    /// accumulated into.
    pub fn unpack_into<T: Element>(&self, matrix: &[T], grad: &mut [T]) -> PackResult<()> {
        self.check_lengths(grad.len(), matrix.len())?;
        grad.fill(T::ZERO);
        self.for_each_run(|run| {
            let src = &matrix[run.col + run.head..run.col + run.head + run.valid];
            for (g, &v) in grad[run.src..run.src + run.valid].iter_mut().zip(src) {
                g.accumulate(v);
            }
        });
        Ok(())
    }

    /// Number of windows touching each input cell.
    pub fn coverage<T: Element>(&self) -> PackResult<Tensor<T>> {
        let [rows, cols] = self.geometry.matrix_shape();
        let ones = vec![T::ONE; rows * cols];
        let mut counts = Tensor::zeros(&self.geometry.input_shape())?;
        self.unpack_into(&ones, counts.as_mut_slice())?;
        Ok(counts)
    }

    fn check_lengths(&self, input_len: usize, matrix_len: usize) -> PackResult<()> {
        let expected_input = self.geometry.input_len();
        if input_len != expected_input {
            return Err(PackError::LengthMismatch {
                expected: expected_input,
                got: input_len,
            });
        }
        let [rows, cols] = self.geometry.matrix_shape();
        if matrix_len != rows * cols {
            return Err(PackError::LengthMismatch {
                expected: rows * cols,
                got: matrix_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PaddingPolicy;
    use crate::scalars::f16;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn packer(shape: &[usize], kernel: &[usize], stride: &[usize], policy: PaddingPolicy) -> WindowPacker {
        WindowPacker::new(WindowGeometry::from_input_shape(shape, kernel, stride, policy).unwrap())
    }

    fn counting(shape: &[usize]) -> Tensor<f32> {
        let len: usize = shape.iter().product();
        let data: Vec<f32> = (1..=len).map(|v| v as f32).collect();
        Tensor::try_from_vec(data, shape).unwrap()
    }

    #[test]
    fn pack_overlapping_windows() {
        let packer = packer(&[4, 3, 2], &[2, 2], &[1, 1], PaddingPolicy::Fit);
        let matrix = packer.pack(&counting(&[4, 3, 2])).unwrap();
        assert_eq!(matrix.shape(), &[6, 8]);

        let expected: [[f32; 8]; 6] = [
            [1., 2., 3., 4., 7., 8., 9., 10.],
            [3., 4., 5., 6., 9., 10., 11., 12.],
            [7., 8., 9., 10., 13., 14., 15., 16.],
            [9., 10., 11., 12., 15., 16., 17., 18.],
            [13., 14., 15., 16., 19., 20., 21., 22.],
            [15., 16., 17., 18., 21., 22., 23., 24.],
        ];
        for (i, row) in expected.iter().enumerate() {
            assert_eq!(matrix.row(i), Some(&row[..]), "row {}", i);
        }

        let grad = packer.unpack(&matrix).unwrap();
        assert_eq!(grad.shape(), &[4, 3, 2]);
        let expected: [f32; 24] = [
            1., 2., 6., 8., 5., 6., 14., 16., 36., 40., 22., 24., 26., 28., 60., 64., 34., 36.,
            19., 20., 42., 44., 23., 24.,
        ];
        assert_eq!(grad.as_slice(), &expected);
    }

    #[test]
    fn pack_fit_padding_on_the_right() {
        let packer = packer(&[4, 3, 2], &[2, 2], &[2, 2], PaddingPolicy::Fit);
        let input = counting(&[4, 3, 2]);
        let matrix = packer.pack(&input).unwrap();
        assert_eq!(matrix.shape(), &[4, 8]);

        let expected: [[f32; 8]; 4] = [
            [1., 2., 3., 4., 7., 8., 9., 10.],
            [5., 6., 0., 0., 11., 12., 0., 0.],
            [13., 14., 15., 16., 19., 20., 21., 22.],
            [17., 18., 0., 0., 23., 24., 0., 0.],
        ];
        for (i, row) in expected.iter().enumerate() {
            assert_eq!(matrix.row(i), Some(&row[..]), "row {}", i);
        }
        assert_eq!(packer.unpack(&matrix).unwrap(), input);
    }

    #[test]
    fn pack_all_padding_both_sides() {
        let packer = packer(&[4, 1], &[3], &[1], PaddingPolicy::All);
        let matrix = packer.pack(&counting(&[4, 1])).unwrap();
        assert_eq!(
            matrix.as_slice(),
            &[0., 1., 2., 1., 2., 3., 2., 3., 4., 3., 4., 0.]
        );
        let grad = packer.unpack(&matrix).unwrap();
        assert_eq!(grad.as_slice(), &[2., 6., 9., 8.]);
    }

    #[test]
    fn pack_accepts_flat_input() {
        let packer = packer(&[4, 3, 2], &[2, 2], &[1, 1], PaddingPolicy::None);
        let shaped = packer.pack(&counting(&[4, 3, 2])).unwrap();
        let flat = packer.pack(&counting(&[24])).unwrap();
        assert_eq!(shaped, flat);
    }

    #[test]
    fn pack_rank_zero_spatial() {
        let packer = packer(&[3], &[], &[], PaddingPolicy::Fit);
        let matrix = packer.pack(&counting(&[3])).unwrap();
        assert_eq!(matrix.shape(), &[1, 3]);
        assert_eq!(matrix.as_slice(), &[1., 2., 3.]);
        assert_eq!(packer.unpack(&matrix).unwrap().as_slice(), &[1., 2., 3.]);
    }

    #[test]
    fn full_extent_kernel_is_single_row() {
        let input = counting(&[3, 2, 2]);
        for policy in [PaddingPolicy::None, PaddingPolicy::Fit, PaddingPolicy::All] {
            for stride in 1..4 {
                let packer = packer(&[3, 2, 2], &[3, 2], &[stride, stride], policy);
                let matrix = packer.pack(&input).unwrap();
                assert_eq!(matrix.shape(), &[1, 12]);
                assert_eq!(matrix.as_slice(), input.as_slice());
                assert_eq!(packer.unpack(&matrix).unwrap(), input);
            }
        }
    }

    #[test]
    fn none_remainder_is_never_read() {
        // Windows cover cells 0..4; cell 4 is dropped.
        let packer = packer(&[5, 1], &[2], &[2], PaddingPolicy::None);
        assert_eq!(packer.geometry().dropped_cells(), vec![1]);

        let input = Tensor::try_from_slice(&[1.0f32, 2.0, 3.0, 4.0, 99.0], &[5, 1]).unwrap();
        let matrix = packer.pack(&input).unwrap();
        assert_eq!(matrix.as_slice(), &[1., 2., 3., 4.]);
        assert!(!matrix.as_slice().contains(&99.0));

        let grad = packer.unpack(&matrix).unwrap();
        assert_eq!(grad.as_slice(), &[1., 2., 3., 4., 0.]);
    }

    fn analytic_coverage(geometry: &WindowGeometry) -> Vec<f64> {
        let per_dim: Vec<Vec<usize>> = geometry
            .dims()
            .iter()
            .map(|d| {
                (0..d.size)
                    .map(|i| {
                        let p = i + d.pad_left;
                        (0..d.windows)
                            .filter(|&w| d.start(w) <= p && p < d.start(w) + d.kernel)
                            .count()
                    })
                    .collect()
            })
            .collect();

        let spatial: Vec<usize> = geometry.dims().iter().map(|d| d.size).collect();
        let mut cells = Odometer::new(&spatial);
        let mut out = Vec::new();
        while let Some(pos) = cells.next_position() {
            let count: usize = pos.iter().enumerate().map(|(d, &i)| per_dim[d][i]).product();
            out.extend(std::iter::repeat(count as f64).take(geometry.channels()));
        }
        out
    }

    #[test]
    fn coverage_matches_window_counts() {
        let kernels: [[usize; 2]; 4] = [[1, 1], [2, 3], [3, 2], [5, 4]];
        let strides: [[usize; 2]; 4] = [[1, 1], [2, 1], [3, 2], [1, 3]];
        for policy in [PaddingPolicy::None, PaddingPolicy::Fit, PaddingPolicy::All] {
            for kernel in &kernels {
                for stride in &strides {
                    let packer = packer(&[5, 4, 2], kernel, stride, policy);
                    let coverage = packer.coverage::<f64>().unwrap();
                    assert_eq!(
                        coverage.as_slice(),
                        analytic_coverage(packer.geometry()).as_slice(),
                        "kernel {:?}, stride {:?}, {:?}",
                        kernel,
                        stride,
                        policy
                    );
                }
            }
        }
    }

    #[test]
    fn disjoint_tiling_roundtrip() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let rank = rng.gen_range(1..=3);
            let kernel: Vec<usize> = (0..rank).map(|_| rng.gen_range(1..=3)).collect();
            let mut shape: Vec<usize> = kernel.iter().map(|&k| k * rng.gen_range(1..=3)).collect();
            shape.push(rng.gen_range(1..=3));

            let packer = packer(&shape, &kernel, &kernel, PaddingPolicy::None);
            let len: usize = shape.iter().product();
            let data: Vec<f32> = (0..len).map(|_| rng.gen()).collect();
            let input = Tensor::try_from_vec(data, &shape).unwrap();

            let matrix = packer.pack(&input).unwrap();
            assert_eq!(packer.unpack(&matrix).unwrap(), input, "shape {:?}", shape);
        }
    }

    #[test]
    fn half_precision_packs_like_f32() {
        let packer = packer(&[4, 3, 2], &[2, 2], &[2, 2], PaddingPolicy::Fit);
        let input = counting(&[4, 3, 2]);
        let half: Vec<f16> = input.as_slice().iter().map(|&v| f16::from_f32(v)).collect();
        let half = Tensor::try_from_vec(half, &[4, 3, 2]).unwrap();

        let expected = packer.pack(&input).unwrap();
        let packed = packer.pack(&half).unwrap();
        assert_eq!(packed.shape(), expected.shape());
        for (h, f) in packed.as_slice().iter().zip(expected.as_slice()) {
            assert_eq!(h.to_f32(), *f);
        }
    }

    #[test]
    fn pack_errors() {
        let packer = packer(&[4, 3, 2], &[2, 2], &[1, 1], PaddingPolicy::Fit);
        assert!(matches!(
            packer.pack(&counting(&[3, 4, 2])),
            Err(PackError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            packer.pack(&counting(&[23])),
            Err(PackError::ShapeMismatch { .. })
        ));

        let mut out = vec![0.0f32; 48];
        assert_eq!(
            packer.pack_into(&[0.0f32; 20], &mut out),
            Err(PackError::LengthMismatch {
                expected: 24,
                got: 20
            })
        );
        let mut short = vec![0.0f32; 40];
        assert_eq!(
            packer.pack_into(&[0.0f32; 24], &mut short),
            Err(PackError::LengthMismatch {
                expected: 48,
                got: 40
            })
        );
    }

    #[test]
    fn unpack_errors() {
        let packer = packer(&[4, 3, 2], &[2, 2], &[1, 1], PaddingPolicy::Fit);
        assert_eq!(
            packer.unpack(&Tensor::<f32>::zeros(&[5, 8]).unwrap()),
            Err(PackError::WindowCountMismatch {
                expected: 6,
                got: 5
            })
        );
        assert_eq!(
            packer.unpack(&Tensor::<f32>::zeros(&[6, 7]).unwrap()),
            Err(PackError::shape_mismatch(&[6, 8], &[6, 7]))
        );
        assert_eq!(
            packer.unpack(&Tensor::<f32>::zeros(&[48]).unwrap()),
            Err(PackError::DimensionMismatch {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn unpack_into_overwrites() {
        let packer = packer(&[4, 1], &[2], &[2], PaddingPolicy::None);
        let mut grad = vec![5.0f32; 4];
        packer.unpack_into(&[1.0, 2.0, 3.0, 4.0], &mut grad).unwrap();
        assert_eq!(grad, [1.0, 2.0, 3.0, 4.0]);
    }
}
