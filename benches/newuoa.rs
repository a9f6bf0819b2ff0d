use criterion::{criterion_group, criterion_main, Criterion};
use newuoa::testing::*;

fn rosenbrock(c: &mut Criterion) {
    let f = Rosenbrock::new(2);

    c.bench_function("rosenbrock 2", |b| {
        b.iter(|| {
            let minimum = minimize(&f, vec![-1.2, 1.0], 0.5, 1e-6, 500);
            assert!(!minimum.status().is_failure());
        })
    });
}

fn trid(c: &mut Criterion) {
    let f = Trid::new(5);

    c.bench_function("trid 5", |b| {
        b.iter(|| {
            let minimum = minimize(&f, vec![0.0; 5], 1.0, 1e-8, 500);
            assert!(!minimum.status().is_failure());
        })
    });
}

fn powell_singular(c: &mut Criterion) {
    let f = PowellSingular::new(4);

    c.bench_function("powell singular 4", |b| {
        b.iter(|| {
            let minimum = minimize(&f, vec![3.0, -1.0, 0.0, 1.0], 1.0, 1e-6, 2000);
            assert!(!minimum.status().is_failure());
        })
    });
}

criterion_group!(benches, rosenbrock, trid, powell_singular);
criterion_main!(benches);
