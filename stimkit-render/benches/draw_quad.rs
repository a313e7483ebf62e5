use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use stimkit_core::Rect;
use stimkit_render::shader::{QUAD_FRAGMENT_SHADER, QUAD_VERTEX_SHADER};
use stimkit_render::{Graphics, QuadDraw, SoftwareGraphics, TextureDesc};

fn harness(tex_w: u32, tex_h: u32) -> (SoftwareGraphics, QuadDraw) {
    let mut gpu = SoftwareGraphics::new(1280, 720).unwrap();
    let program = gpu
        .create_program(QUAD_VERTEX_SHADER, QUAD_FRAGMENT_SHADER)
        .unwrap();
    let vertex_array = gpu.create_vertex_array().unwrap();
    let rgba: Vec<u8> = [200u8, 80, 40, 200]
        .into_iter()
        .cycle()
        .take((tex_w * tex_h * 4) as usize)
        .collect();
    let texture = gpu
        .create_texture(&TextureDesc::for_size(tex_w, tex_h), &rgba)
        .unwrap();
    let draw = QuadDraw {
        program,
        vertex_array,
        texture,
        dest: Rect::from_xywh(440.0, 210.0, 400.0, 300.0),
        opacity: 0.8,
    };
    (gpu, draw)
}

pub fn bench_draw_quad(c: &mut Criterion) {
    let mut g = c.benchmark_group("draw_quad");
    g.sample_size(60);

    g.bench_function("blended_pot_mipmapped", |b| {
        b.iter_batched(
            || harness(512, 512),
            |(mut gpu, draw)| {
                gpu.set_blending(true);
                let _ = gpu.draw_quad(black_box(&draw));
                gpu.set_blending(false);
            },
            BatchSize::LargeInput,
        )
    });

    g.bench_function("opaque_npot", |b| {
        b.iter_batched(
            || harness(400, 300),
            |(mut gpu, draw)| {
                let _ = gpu.draw_quad(black_box(&draw));
            },
            BatchSize::LargeInput,
        )
    });

    g.finish();
}

criterion_group!(benches, bench_draw_quad);
criterion_main!(benches);
