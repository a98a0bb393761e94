use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rif_core::{Frame, GrayImage};
use rif_descriptor::{CellConfig, ExtractorConfig, Quantize3x3, Quantize5x5, RifExtractor};

fn create_benchmark_image(width: usize, height: usize) -> GrayImage {
    let mut img = GrayImage::new(width, height, 1);
    for y in 0..height {
        for x in 0..width {
            let (bx, by) = ((x / 7) as u32, (y / 7) as u32);
            let h = bx.wrapping_mul(73_856_093) ^ by.wrapping_mul(19_349_663);
            img.set(x, y, 0, ((h ^ (h >> 11)) % 190) as u8 + 30);
        }
    }
    img
}

fn bench_describe(c: &mut Criterion) {
    let mut group = c.benchmark_group("describe");
    let img = create_benchmark_image(128, 128);
    let frame = Frame::new(64.0, 64.0, 0.0, 1.0);

    for name in CellConfig::PRESET_NAMES {
        let cells = CellConfig::from_name(name).unwrap();
        let config = ExtractorConfig { cells, ..ExtractorConfig::tracking() };

        let rif5 = RifExtractor::<Quantize5x5>::new(config.clone()).unwrap();
        group.bench_with_input(BenchmarkId::new("5x5", name), &frame, |b, frame| {
            b.iter(|| black_box(rif5.describe(black_box(&img), frame)))
        });

        let rif3 = RifExtractor::<Quantize3x3>::new(config).unwrap();
        group.bench_with_input(BenchmarkId::new("3x3", name), &frame, |b, frame| {
            b.iter(|| black_box(rif3.describe(black_box(&img), frame)))
        });
    }
    group.finish();
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract");
    group.sample_size(20);

    let img = create_benchmark_image(320, 240);
    let tracking = RifExtractor::<Quantize5x5>::new(ExtractorConfig::tracking()).unwrap();
    group.bench_function("tracking_320x240", |b| {
        b.iter(|| black_box(tracking.extract_store(black_box(&img), 0).unwrap()))
    });

    let database = RifExtractor::<Quantize5x5>::new(ExtractorConfig::database()).unwrap();
    group.bench_function("database_320x240", |b| {
        b.iter(|| black_box(database.extract_store(black_box(&img), 0).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_describe, bench_extract);
criterion_main!(benches);
