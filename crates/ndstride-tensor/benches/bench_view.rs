use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use ndstride_tensor::{Order, Tensor};
use std::hint::black_box;

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal");
    let t = Tensor::<f32>::seq([512, 512]).unwrap();
    let tt = t.t();

    for (name, order) in [("c", Order::C), ("f", Order::F), ("s", Order::S)] {
        group.bench_function(format!("dense_to_vec_{name}"), |b| {
            b.iter(|| black_box(t.to_vec(order)))
        });
        group.bench_function(format!("transposed_to_vec_{name}"), |b| {
            b.iter(|| black_box(tt.to_vec(order)))
        });
    }

    group.bench_function("ptr_iter_strided", |b| {
        let view = t.sel(Order::C, 1, &[0, 3, 6, 9, 12]).unwrap();
        b.iter(|| black_box(view.ptr_iter(Order::C).sum::<usize>()))
    });
    group.finish();
}

fn bench_views(c: &mut Criterion) {
    let mut group = c.benchmark_group("views");
    let t = Tensor::<f64>::seq([64, 64, 16]).unwrap();

    group.bench_function("permute", |b| {
        b.iter(|| black_box(t.permute(&[2, 0, 1]).unwrap()))
    });
    group.bench_function("narrow_all", |b| {
        b.iter(|| black_box(t.narrow_all(false, &[1, 2, 0], &[33, 34, 8]).unwrap()))
    });
    group.bench_function("sel_gather", |b| {
        b.iter(|| black_box(t.sel(Order::C, 0, &[5, 1, 9, 2]).unwrap()))
    });
    group.bench_function("copy_to_transposed", |b| {
        let src = t.permute(&[2, 1, 0]).unwrap();
        b.iter_batched(
            || Tensor::<f64>::zeros([16, 64, 64]).unwrap(),
            |mut dst| src.copy_to(&mut dst).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.bench_function("sort_axis", |b| {
        b.iter_batched(
            || t.flip(2).unwrap().copy(Order::C).unwrap(),
            |mut dst| dst.sort_inplace(2, true).unwrap(),
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

criterion_group!(benches, bench_traversal, bench_views);
criterion_main!(benches);
