use criterion::{criterion_group, criterion_main, Criterion};
use stimkit_core::catalog;
use stimkit_render::SkiaRenderer;
use stimkit_timing::HighPrecisionTimer;

/// Worst case for the dirty-rect pipeline: a switching display flips the
/// whole field every frame.
fn bench_switching_frames(c: &mut Criterion) {
    let mut display = catalog::black_switching().expect("catalog display");
    display.create((1280, 720)).expect("create");

    let mut renderer = SkiaRenderer::new(1280, 720, None);
    let mut buffer = vec![0u8; 1280 * 720 * 4];
    let mut timer = HighPrecisionTimer::new();
    let mut field_on = false;

    c.bench_function("switching_frame_flip", |b| {
        b.iter(|| {
            field_on = !field_on;
            renderer
                .render_frame(Some(&display), field_on, &mut buffer, &mut timer)
                .expect("render")
        })
    });
}

criterion_group!(benches, bench_switching_frames);
criterion_main!(benches);
