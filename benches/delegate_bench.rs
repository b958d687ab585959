use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fixed_delegate_map::Delegate;
use std::cell::RefCell;
use std::time::Duration;

type Op = fn(u64, u64) -> u64;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn mix(a: u64, b: u64) -> u64 {
    a.rotate_left(5) ^ b
}

struct Acc {
    total: u64,
}

impl Acc {
    fn feed(&mut self, a: u64, b: u64) -> u64 {
        self.total = self.total.wrapping_add(mix(a, b));
        self.total
    }
}

fn inputs() -> Vec<(u64, u64)> {
    let mut r = lcg(42);
    (0..10_000).map(|_| (r.next().unwrap_or(0), r.next().unwrap_or(1))).collect()
}

fn bench_invoke(c: &mut Criterion) {
    let xs = inputs();

    c.bench_function("delegate::direct_call_10k", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for &(x, y) in &xs {
                acc ^= mix(black_box(x), y);
            }
            black_box(acc)
        })
    });

    c.bench_function("delegate::fn_item_10k", |b| {
        let mut d = Delegate::<Op>::from_fn(mix);
        b.iter(|| {
            let mut acc = 0u64;
            for &(x, y) in &xs {
                acc ^= d.call((black_box(x), y)).unwrap_or(0);
            }
            black_box(acc)
        })
    });

    c.bench_function("delegate::fn_ptr_10k", |b| {
        let mut d = Delegate::<Op>::from_fn_ptr(mix);
        b.iter(|| {
            let mut acc = 0u64;
            for &(x, y) in &xs {
                acc ^= d.call((black_box(x), y)).unwrap_or(0);
            }
            black_box(acc)
        })
    });

    c.bench_function("delegate::closure_10k", |b| {
        let salt = 0x9e37_79b9_u64;
        let mut d = Delegate::<Op>::from_closure(move |x: u64, y: u64| mix(x, y) ^ salt);
        b.iter(|| {
            let mut acc = 0u64;
            for &(x, y) in &xs {
                acc ^= d.call((black_box(x), y)).unwrap_or(0);
            }
            black_box(acc)
        })
    });

    c.bench_function("delegate::method_10k", |b| {
        let target = RefCell::new(Acc { total: 0 });
        let mut d = Delegate::<Op>::from_method(&target, Acc::feed);
        b.iter(|| {
            for &(x, y) in &xs {
                black_box(d.call((black_box(x), y)).unwrap_or(0));
            }
        })
    });

    // Heap baseline for comparison.
    c.bench_function("delegate::boxed_dyn_10k", |b| {
        let salt = 0x9e37_79b9_u64;
        let mut f: Box<dyn FnMut(u64, u64) -> u64> = Box::new(move |x, y| mix(x, y) ^ salt);
        b.iter(|| {
            let mut acc = 0u64;
            for &(x, y) in &xs {
                acc ^= f(black_box(x), y);
            }
            black_box(acc)
        })
    });
}

fn bench_bind(c: &mut Criterion) {
    c.bench_function("delegate::rebind_closure_10k", |b| {
        let mut d = Delegate::<Op>::new();
        b.iter(|| {
            for salt in 0..10_000u64 {
                d.set_closure(move |x: u64, y: u64| mix(x, y) ^ salt);
            }
            black_box(d.is_bound())
        })
    });

    c.bench_function("delegate::clone_and_compare_10k", |b| {
        let d = Delegate::<Op>::from_fn_ptr(mix);
        b.iter(|| {
            let mut same = 0usize;
            for _ in 0..10_000 {
                let copy = black_box(d.clone());
                same += usize::from(copy == d);
            }
            black_box(same)
        })
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(20)
        .measurement_time(Duration::from_secs(3))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_delegate;
    config = bench_config();
    targets = bench_invoke, bench_bind
}
criterion_main!(benches_delegate);
