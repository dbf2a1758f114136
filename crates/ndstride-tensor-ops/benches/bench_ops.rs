use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use ndstride_tensor::{Order, Tensor};
use ndstride_tensor_ops::{op::Sum, ExecutionStrategy, TensorOps};
use std::hint::black_box;

fn bench_elementwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("elementwise");
    let a = Tensor::<f32>::seq([512, 512]).unwrap();
    let b = a.t();
    let row = Tensor::<f32>::seq([512]).unwrap();

    group.bench_function("add_dense", |bench| {
        bench.iter(|| black_box(a.add(&a.copy(Order::C).unwrap()).unwrap()))
    });
    group.bench_function("add_transposed", |bench| {
        bench.iter(|| black_box(a.add(&b).unwrap()))
    });
    group.bench_function("add_row_broadcast", |bench| {
        bench.iter(|| black_box(a.add(&row).unwrap()))
    });
    for (name, strategy) in [
        ("serial", ExecutionStrategy::Serial),
        ("parallel", ExecutionStrategy::Parallel),
    ] {
        group.bench_function(format!("mul_scalar_{name}"), |bench| {
            bench.iter_batched(
                || a.copy(Order::C).unwrap(),
                |mut t| t.scalar_inplace(ndstride_tensor_ops::op::Mul, 2.0, strategy).unwrap(),
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("reduce");
    let t = Tensor::<f64>::seq([1024, 256]).unwrap();
    let tt = t.t();

    group.bench_function("sum", |bench| bench.iter(|| black_box(t.sum().unwrap())));
    group.bench_function("mean", |bench| bench.iter(|| black_box(t.mean().unwrap())));
    for (name, strategy) in [
        ("serial", ExecutionStrategy::Serial),
        ("parallel", ExecutionStrategy::Parallel),
    ] {
        group.bench_function(format!("sum_axis_{name}"), |bench| {
            bench.iter(|| black_box(tt.reduce_axis(&Sum, 1, false, strategy).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_elementwise, bench_reduce);
criterion_main!(benches);
