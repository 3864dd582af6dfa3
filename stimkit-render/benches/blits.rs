use criterion::{criterion_group, criterion_main, Criterion};
use stimkit_core::catalog;
use stimkit_render::SkiaRenderer;
use stimkit_timing::HighPrecisionTimer;

fn bench_fill_screen(c: &mut Criterion) {
    let mut display = catalog::fill_screen().expect("catalog display");
    display.create((1280, 720)).expect("create");

    let mut renderer = SkiaRenderer::new(1280, 720, None);
    let mut buffer = vec![0u8; 1280 * 720 * 4];
    let mut timer = HighPrecisionTimer::new();

    c.bench_function("fill_screen_frame", |b| {
        b.iter(|| {
            renderer
                .render_frame(Some(&display), true, &mut buffer, &mut timer)
                .expect("render")
        })
    });
}

criterion_group!(benches, bench_fill_screen);
criterion_main!(benches);
