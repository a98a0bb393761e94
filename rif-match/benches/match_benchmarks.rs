use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use rif_core::Frame;
use rif_match::{AffineModel, BruteForce, FastKl, FeatureHash, Ransac, RansacConfig, L1};

fn random_descriptors(rng: &mut Xoshiro256PlusPlus, count: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..count)
        .map(|_| {
            let raw: Vec<f32> = (0..dim).map(|_| rng.gen_range(0.01f32..1.0)).collect();
            let sum: f32 = raw.iter().sum();
            raw.into_iter().map(|v| v / sum).collect()
        })
        .collect()
}

fn bench_knn(c: &mut Criterion) {
    let mut group = c.benchmark_group("knn");
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
    let query = random_descriptors(&mut rng, 1, 100).remove(0);

    for size in [1_000usize, 10_000] {
        let db = random_descriptors(&mut rng, size, 100);
        group.bench_with_input(BenchmarkId::new("l1_f32", size), &db, |b, db| {
            let search = BruteForce::new(L1);
            b.iter(|| black_box(search.find_nn(2, black_box(&query), db)))
        });
        group.bench_with_input(BenchmarkId::new("fast_kl", size), &db, |b, db| {
            let search = BruteForce::new(FastKl);
            b.iter(|| black_box(search.find_nn(2, black_box(&query), db)))
        });

        let quantized: Vec<Vec<u8>> = db
            .iter()
            .map(|d| d.iter().map(|&v| (255.0 * v) as u8).collect())
            .collect();
        let q: Vec<u8> = query.iter().map(|&v| (255.0 * v) as u8).collect();
        group.bench_with_input(BenchmarkId::new("l1_u8", size), &quantized, |b, db| {
            let search = BruteForce::new(L1);
            b.iter(|| black_box(search.find_nn(2, black_box(&q), db)))
        });
    }
    group.finish();
}

fn bench_ransac(c: &mut Criterion) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);
    let truth = AffineModel::from_rotation(0.2, 5.0, -3.0);
    let pairs: Vec<_> = (0..200)
        .map(|i| {
            let src = (rng.gen_range(0.0f32..320.0), rng.gen_range(0.0f32..240.0));
            let dst = if i % 4 == 0 {
                (rng.gen_range(0.0f32..320.0), rng.gen_range(0.0f32..240.0))
            } else {
                truth.transform(src.0, src.1)
            };
            (src, dst)
        })
        .collect();

    c.bench_function("ransac_200_pairs", |b| {
        b.iter(|| {
            let mut ransac = Ransac::new(RansacConfig::default());
            black_box(ransac.estimate(black_box(&pairs)))
        })
    });
}

fn bench_feature_hash(c: &mut Criterion) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
    let frames: Vec<Frame> = (0..100)
        .map(|_| Frame::new(rng.gen_range(0.0..160.0), rng.gen_range(0.0..120.0), 0.0, 1.0))
        .collect();

    c.bench_function("feature_hash_build_160x120", |b| {
        b.iter(|| black_box(FeatureHash::new(160, 120, 8, black_box(&frames)).unwrap()))
    });
}

criterion_group!(benches, bench_knn, bench_ransac, bench_feature_hash);
criterion_main!(benches);
