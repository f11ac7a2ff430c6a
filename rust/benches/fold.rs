use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use winpack::{AxisPicker, BatchFolder, PaddingPolicy, Reshape, WindowPacker, WindowSpec};

mod native;

const SAMPLE_SHAPE: [usize; 3] = [28, 28, 8];

pub fn fold_benchmark(c: &mut Criterion) {
    let spec = WindowSpec::new(&[3, 3]).with_padding(PaddingPolicy::All);
    let packer = WindowPacker::new(spec.geometry(&SAMPLE_SHAPE).unwrap());
    let folder = BatchFolder::default();
    let sample_len: usize = SAMPLE_SHAPE.iter().product();

    let mut group = c.benchmark_group("Fold 28x28x8");
    for batch in [1usize, 8, 32] {
        let input = native::generate_random_tensor(&[sample_len, batch]);
        group.bench_with_input(BenchmarkId::new("fold", batch), &batch, |b, _| {
            b.iter(|| folder.fold(&input, &packer).unwrap())
        });

        let block = folder.fold(&input, &packer).unwrap();
        group.bench_with_input(BenchmarkId::new("unfold", batch), &batch, |b, _| {
            b.iter(|| folder.unfold(&block, &packer).unwrap())
        });

        let [rows, _] = packer.geometry().matrix_shape();
        let outputs = native::generate_random_tensor(&[rows * 16, batch]);
        group.bench_with_input(BenchmarkId::new("fold outputs", batch), &batch, |b, _| {
            b.iter(|| folder.fold(&outputs, &Reshape::new(rows, 16)).unwrap())
        });
    }
    group.finish();
}

pub fn pick_benchmark(c: &mut Criterion) {
    let sample_len: usize = SAMPLE_SHAPE.iter().product();
    let input = native::generate_random_tensor(&[sample_len, 32]);

    let mut group = c.benchmark_group("Pick 28x28x8 x32");
    for axis in [0isize, -1] {
        let picker = AxisPicker::try_new(&SAMPLE_SHAPE, axis).unwrap();
        group.bench_with_input(BenchmarkId::new("pick_rows", axis), &axis, |b, _| {
            b.iter(|| picker.pick_rows(&input).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, fold_benchmark, pick_benchmark);
criterion_main!(benches);
