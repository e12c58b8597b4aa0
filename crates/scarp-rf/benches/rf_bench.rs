//! Criterion benchmarks for scarp-rf: forest training and batch prediction.

use criterion::{Criterion, criterion_group, criterion_main};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use scarp_rf::{OobMode, RandomForestConfig, SplitMethod};

/// Incident/background rows over six bands; bands 0 and 3 carry the signal.
fn make_landslides(n_samples: usize, seed: u64) -> (Vec<Vec<f64>>, Vec<bool>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let features: Vec<Vec<f64>> = (0..n_samples)
        .map(|i| {
            (0..6)
                .map(|b| {
                    let shift = if i % 2 == 1 && (b == 0 || b == 3) { 0.4 } else { 0.0 };
                    shift + rng.r#gen::<f64>() * 0.6
                })
                .collect()
        })
        .collect();
    let labels = (0..n_samples).map(|i| i % 2 == 1).collect();
    let names = ["slope", "drainDen", "elev", "clay", "landcover", "soiltex"]
        .map(String::from)
        .to_vec();
    (features, labels, names)
}

fn bench_rf_train(c: &mut Criterion) {
    let (features, labels, names) = make_landslides(1000, 42);
    let exact = RandomForestConfig::new(50).unwrap().with_oob_mode(OobMode::Disabled);
    let extra = exact.clone().with_split_method(SplitMethod::ExtraTrees);

    c.bench_function("rf_train_1000x6_50trees_exact", |b| {
        b.iter(|| exact.fit(&features, &labels, &names).unwrap());
    });
    c.bench_function("rf_train_1000x6_50trees_extra", |b| {
        b.iter(|| extra.fit(&features, &labels, &names).unwrap());
    });
}

fn bench_rf_probability_batch(c: &mut Criterion) {
    let (features, labels, names) = make_landslides(1000, 42);
    let forest = RandomForestConfig::new(50)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap()
        .into_forest();
    // one 100x100 raster worth of pixels
    let (pixels, _, _) = make_landslides(10_000, 7);

    c.bench_function("rf_probability_10000px_50trees", |b| {
        b.iter(|| forest.probability_batch(&pixels).unwrap());
    });
}

criterion_group!(benches, bench_rf_train, bench_rf_probability_batch);
criterion_main!(benches);
