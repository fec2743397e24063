//! Fixed-rank, rank-agnostic, automatic and cache-blocked traversal.
//!
//! Run with: cargo bench --bench kernel_bench

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::time::Duration;
use strided_dispatch::{
    col_major_strides, map, ops, Capabilities, DynView, DynViewMut, StridedView, StridedViewMut,
    Traversal,
};

fn bench_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary_traversal");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    let shapes: [&[usize]; 3] = [&[1 << 16], &[256, 256], &[32, 32, 32, 8]];
    for shape in shapes {
        let n: usize = shape.iter().product();
        group.throughput(Throughput::Elements(n as u64));
        let rank = shape.len();
        let label = format!("{shape:?}");

        let mut rng = StdRng::seed_from_u64(42);
        let a: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
        let b: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
        let mut out = vec![0.0; n];

        // `a` is read column-major so the loop nests see mixed layouts.
        let a_strides = col_major_strides(shape);
        let av = StridedView::new(&a, shape, &a_strides, 0).unwrap();
        let bv = StridedView::contiguous(&b, shape).unwrap();
        let mut ov = StridedViewMut::contiguous(&mut out, shape).unwrap();

        for (name, traversal) in [
            ("fixed", Traversal::Fixed(rank)),
            ("nd", Traversal::Nd),
            ("auto", Traversal::Auto),
            ("blocked", Traversal::Blocked),
        ] {
            group.bench_with_input(BenchmarkId::new(name, &label), &traversal, |bench, &t| {
                bench.iter(|| map::binary_with(t, &av, &bv, &mut ov, |x: f64, y: f64| x * y + 1.0).unwrap())
            });
        }
    }
    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_add");
    group.sample_size(20);

    let n = 1 << 16;
    group.throughput(Throughput::Elements(n as u64));
    let mut rng = StdRng::seed_from_u64(1);
    let a: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
    let b: Vec<f64> = (0..n).map(|_| rng.gen()).collect();
    let mut out = vec![0.0f64; n];

    for (name, caps) in [
        ("probed", Capabilities::probe()),
        ("portable", Capabilities::portable()),
    ] {
        let table = ops::add(&caps).unwrap();
        group.bench_function(name, |bench| {
            bench.iter(|| {
                table
                    .call(
                        &[DynView::from_slice(&a[..]), DynView::from_slice(&b[..])],
                        &mut [DynViewMut::from_slice(&mut out[..])],
                    )
                    .unwrap()
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_traversal, bench_dispatch);
criterion_main!(benches);
