//! Criterion benchmarks for the hook-to-dispatch hand-off.
//!
//! `EventQueue::enqueue` runs inside the OS hook callback, where every
//! microsecond is input latency, and `drain` runs on the dispatch thread.
//!
//! Run with:
//! ```bash
//! cargo bench --package iohook --bench queue_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use iohook::EventQueue;
use iohook_core::{normalize, Event, NativeEvent, NativeKind, Platform};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn motion(x: i32) -> Event {
    normalize(&NativeEvent::new(
        Platform::Windows,
        x as u64,
        0,
        NativeKind::Motion { x, y: 0 },
    ))
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_enqueue(c: &mut Criterion) {
    let queue = EventQueue::new();
    let event = motion(1);

    c.bench_function("enqueue_single", |b| {
        b.iter(|| {
            queue.enqueue(black_box(event));
            // Keep the queue from growing across iterations.
            queue.drain().for_each(drop);
        })
    });
}

fn bench_enqueue_then_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_then_drain");

    for burst in [1usize, 16, 256] {
        let events: Vec<Event> = (0..burst as i32).map(motion).collect();
        group.bench_with_input(BenchmarkId::from_parameter(burst), &events, |b, events| {
            let queue = EventQueue::new();
            b.iter(|| {
                for event in events {
                    queue.enqueue(*event);
                }
                black_box(queue.drain().count())
            })
        });
    }

    group.finish();
}

fn bench_cross_thread(c: &mut Criterion) {
    use std::sync::Arc;

    c.bench_function("cross_thread_burst_256", |b| {
        b.iter(|| {
            let queue = Arc::new(EventQueue::new());
            let producer = {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for x in 0..256 {
                        queue.enqueue(motion(x));
                    }
                })
            };
            let mut seen = 0;
            while seen < 256 {
                seen += queue.drain().count();
            }
            let _ = producer.join();
            black_box(seen)
        })
    });
}

criterion_group!(
    benches,
    bench_enqueue,
    bench_enqueue_then_drain,
    bench_cross_thread
);
criterion_main!(benches);
