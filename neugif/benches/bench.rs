use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use neugif::{lzw::LzwEncoder, ColorQuantizer, EncoderConfig, FrameOptions, GifEncoder};
use rand::{rngs::StdRng, Rng, SeedableRng};

const SIZES: [(usize, usize); 3] = [(64, 64), (320, 240), (640, 480)];

/// Smooth gradient with some noise on top, closer to photos than pure noise.
fn frame(width: usize, height: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut pixels = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        for x in 0..width {
            let jitter: u8 = rng.gen_range(0..16);
            pixels.extend_from_slice(&[
                ((x * 255 / width) as u8).saturating_add(jitter),
                ((y * 255 / height) as u8).saturating_add(jitter),
                (((x + y) * 127 / (width + height)) as u8).saturating_add(jitter),
            ]);
        }
    }
    pixels
}

fn quantize(c: &mut Criterion) {
    let mut group = c.benchmark_group("quantize");

    for (width, height) in SIZES {
        let pixels = frame(width, height, 1);
        let name = format!("{width}x{height}");
        group.throughput(Throughput::Elements((width * height) as u64));

        for sample_factor in [1, 10, 20] {
            group.bench_with_input(
                BenchmarkId::new(format!("train sf{sample_factor}"), &name),
                &pixels,
                |b, pixels| b.iter(|| ColorQuantizer::train(pixels, sample_factor)),
            );
        }

        let quantizer = ColorQuantizer::train(&pixels, 10);
        group.bench_with_input(BenchmarkId::new("index", &name), &pixels, |b, pixels| {
            let mut indices = Vec::with_capacity(width * height);
            b.iter(|| {
                indices.clear();
                quantizer.index_pixels(pixels, &mut indices);
            })
        });
    }
}

fn lzw(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzw");

    for (width, height) in SIZES {
        let pixels = frame(width, height, 2);
        let quantizer = ColorQuantizer::train(&pixels, 10);
        let mut indices = Vec::with_capacity(width * height);
        quantizer.index_pixels(&pixels, &mut indices);

        group.throughput(Throughput::Bytes(indices.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("encode", format!("{width}x{height}")),
            &indices,
            |b, indices| {
                let mut encoder = LzwEncoder::new();
                let mut out = Vec::with_capacity(indices.len());
                b.iter(|| {
                    out.clear();
                    encoder.encode(indices, 8, &mut out);
                })
            },
        );
    }
}

fn encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    group.sample_size(10);

    for (width, height) in SIZES {
        let frames: Vec<Vec<u8>> = (0..4).map(|seed| frame(width, height, seed)).collect();
        group.throughput(Throughput::Elements((width * height * frames.len()) as u64));

        group.bench_with_input(
            BenchmarkId::new("4 frames", format!("{width}x{height}")),
            &frames,
            |b, frames| {
                b.iter(|| {
                    let mut encoder = GifEncoder::new();
                    encoder
                        .start(EncoderConfig::new(width as u16, height as u16))
                        .unwrap();
                    for frame in frames {
                        encoder.add_frame(frame, FrameOptions::new(4, 10)).unwrap();
                    }
                    encoder.finish().unwrap()
                })
            },
        );
    }
}

criterion_group!(benches, quantize, lzw, encode);
criterion_main!(benches);
