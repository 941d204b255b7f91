//! Criterion benchmarks for the normalizer hot path.
//!
//! Every captured occurrence passes through `normalize` on the hook thread,
//! so this measures the per-event cost a backend pays before enqueueing.
//!
//! Run with:
//! ```bash
//! cargo bench --package iohook-core --bench normalize_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use iohook_core::{
    normalize, KeyMapper, NativeButton, NativeEvent, NativeKey, NativeKind, NativeWheel, Platform,
    WheelAxis,
};

// ── Fixtures ──────────────────────────────────────────────────────────────────

fn key_down(platform: Platform, code: u32) -> NativeEvent {
    NativeEvent::new(
        platform,
        1_000,
        0,
        NativeKind::KeyDown(NativeKey {
            code,
            scan_code: 0x1E,
            extended: false,
        }),
    )
}

/// A burst mixing every kind of occurrence a user produces while typing and
/// pointing.
fn mixed_burst(platform: Platform) -> Vec<NativeEvent> {
    let button = NativeButton {
        button: 1,
        clicks: 1,
        x: 640,
        y: 480,
    };
    let wheel = NativeWheel {
        axis: WheelAxis::Vertical,
        delta: 120,
        amount: 3,
        page: false,
        x: 640,
        y: 480,
    };
    let kinds = [
        NativeKind::Motion { x: 10, y: 10 },
        NativeKind::ButtonDown(button),
        NativeKind::ButtonUp(button),
        NativeKind::ButtonClick(button),
        NativeKind::Wheel(wheel),
        NativeKind::KeyTyped(
            NativeKey {
                code: 0x41,
                scan_code: 0x1E,
                extended: false,
            },
            'a',
        ),
    ];
    kinds
        .iter()
        .map(|&kind| NativeEvent::new(platform, 1_000, 0x0002_0000, kind))
        .collect()
}

// ── Benchmarks ────────────────────────────────────────────────────────────────

fn bench_key_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("keymap");

    group.bench_function("windows_vk", |b| {
        b.iter(|| KeyMapper::from_windows_vk(black_box(0x41), black_box(0x1E), false))
    });
    group.bench_function("x11_keysym", |b| {
        b.iter(|| KeyMapper::from_x11_keysym(black_box(0xFFE1)))
    });
    group.bench_function("macos_keycode", |b| {
        b.iter(|| KeyMapper::from_macos_keycode(black_box(0x7E)))
    });

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for platform in [Platform::Windows, Platform::X11, Platform::Quartz] {
        let single = key_down(platform, 0x41);
        group.bench_with_input(
            BenchmarkId::new("key_down", format!("{platform:?}")),
            &single,
            |b, native| b.iter(|| normalize(black_box(native))),
        );

        let burst = mixed_burst(platform);
        group.bench_with_input(
            BenchmarkId::new("mixed_burst", format!("{platform:?}")),
            &burst,
            |b, events| {
                b.iter(|| {
                    events
                        .iter()
                        .map(|native| normalize(black_box(native)))
                        .count()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_key_tables, bench_normalize);
criterion_main!(benches);
