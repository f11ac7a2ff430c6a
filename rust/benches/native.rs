#![allow(unused)]
use rand::Rng;
use winpack::index::{flat_index, Odometer};
use winpack::{Tensor, WindowGeometry};

pub(crate) fn generate_random_tensor(shape: &[usize]) -> Tensor<f32> {
    let len: usize = shape.iter().product();
    let data: Vec<f32> = (0..len).map(|_| rand::thread_rng().gen()).collect();
    Tensor::try_from_vec(data, shape).unwrap()
}

/// Element-by-element im2col: one bounds check and one index computation per
/// matrix cell.
pub(crate) fn pack_cpu(geometry: &WindowGeometry, input: &[f32], out: &mut [f32]) {
    let input_shape = geometry.input_shape();
    let kernel_shape = geometry.kernel_shape();
    let dims = geometry.dims();
    let mut coord = vec![0usize; input_shape.len()];
    let mut cell = 0;

    let mut windows = Odometer::new(&geometry.window_counts());
    while let Some(window) = windows.next_position() {
        let mut offsets = Odometer::new(&kernel_shape);
        while let Some(offset) = offsets.next_position() {
            let mut inside = true;
            for (d, dim) in dims.iter().enumerate() {
                let p = dim.start(window[d]) + offset[d];
                inside &= p >= dim.pad_left && p < dim.pad_left + dim.size;
                coord[d] = p.wrapping_sub(dim.pad_left);
            }
            coord[dims.len()] = offset[dims.len()];
            out[cell] = if inside {
                input[flat_index(&coord, &input_shape)]
            } else {
                0.0
            };
            cell += 1;
        }
    }
}
