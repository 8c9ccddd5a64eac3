//! Benchmarks for range selector drags
//!
//! A drag emits one interval per pointer move, so `update_drag` runs at
//! pointer-event rate while the user scrubs.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gifcut::timeline::{format_time, DragKind, RangeSelector};

fn bench_update_drag(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_drag");

    for kind in [DragKind::Start, DragKind::End, DragKind::Range] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{kind:?}")),
            &kind,
            |b, &kind| {
                let mut selector = RangeSelector::new(120.0, 1000.0);
                selector.begin_drag(kind, 0.0);
                let mut x = 0.0;
                b.iter(|| {
                    x = (x + 7.0) % 1000.0;
                    black_box(selector.update_drag(black_box(x)))
                });
            },
        );
    }

    group.finish();
}

fn bench_drag_with_listener(c: &mut Criterion) {
    c.bench_function("update_drag_with_listener", |b| {
        let mut selector = RangeSelector::new(120.0, 1000.0);
        let mut emitted = 0u64;
        selector.on_change(move |iv| {
            emitted += 1;
            black_box((iv, emitted));
        });
        selector.begin_drag(DragKind::Range, 500.0);
        let mut x = 0.0;
        b.iter(|| {
            x = (x + 13.0) % 1000.0;
            black_box(selector.update_drag(black_box(x)))
        });
    });
}

fn bench_format_time(c: &mut Criterion) {
    c.bench_function("format_time", |b| {
        b.iter(|| format_time(black_box(3725.5)))
    });
}

criterion_group!(
    benches,
    bench_update_drag,
    bench_drag_with_listener,
    bench_format_time
);
criterion_main!(benches);
