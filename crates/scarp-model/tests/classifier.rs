//! Classifier pipeline: factor stack → training set → forest → rasters.

use geo::polygon;
use scarp_model::{ClassifierConfig, FeatureStack, ModelError, TrainingSet, apply, train};
use scarp_raster::{Crs, FactorKind, FactorLayer, FactorSet, GridSpec, Raster};
use scarp_rf::RandomForest;
use scarp_validate::{Incident, PointSet, StudyArea, SyntheticConfig};
use tempfile::TempDir;

const CELL: f64 = 1000.0;
const N: usize = 30;

fn grid() -> GridSpec {
    GridSpec::new(N, N, 0.0, N as f64 * CELL, CELL, Crs::Projected { epsg: 32645 }).unwrap()
}

/// Slope and clay rise eastwards; the other bands are a fixed checker noise.
fn factors() -> FactorSet {
    let spec = grid();
    let layers = FactorKind::CLASSIFIER_BANDS
        .iter()
        .map(|&kind| {
            let raster = Raster::from_fn(spec, |r, c| match kind {
                FactorKind::Slope | FactorKind::Clay => c as f64 / (N - 1) as f64,
                _ => ((r * 7 + c * 13) % 10) as f64 / 9.0,
            });
            FactorLayer::from_normalized(kind, raster).unwrap()
        })
        .collect();
    FactorSet::from_layers(layers).unwrap()
}

/// 120 incidents on the six easternmost columns.
fn incidents() -> PointSet {
    PointSet::observed(
        (0..120)
            .map(|i| Incident {
                id: format!("ls-{i}"),
                lon: (24.5 + (i % 6) as f64) * CELL,
                lat: (0.5 + ((i / 6) % N) as f64) * CELL,
                deaths: 0,
                injured: 0,
                missing: 0,
                affected: 0,
                infrastructure_destroyed: 0,
                year: None,
            })
            .collect(),
    )
}

fn negatives(count: usize) -> PointSet {
    let side = N as f64 * CELL;
    let area = StudyArea::new(polygon![
        (x: 0.0, y: 0.0),
        (x: side, y: 0.0),
        (x: side, y: side),
        (x: 0.0, y: side),
    ])
    .unwrap();
    area.generate(&SyntheticConfig::new(count).unwrap())
}

fn training_set() -> (FeatureStack, TrainingSet) {
    let stack = FeatureStack::from_factors(&factors()).unwrap();
    let set = TrainingSet::from_points(&stack, &incidents(), &negatives(240));
    (stack, set)
}

#[test]
fn trains_and_evaluates_on_held_out_records() {
    let (_, set) = training_set();
    assert_eq!(set.dropped(), 0);
    assert_eq!(set.n_positive(), 120);

    let trained = train(&set, &ClassifierConfig::default()).unwrap();
    let eval = &trained.evaluation;
    assert_eq!(eval.train_records + eval.validation_records, set.len());
    assert_eq!(eval.confusion.total(), eval.validation_records);
    assert!(eval.metrics.accuracy > 0.75, "accuracy {}", eval.metrics.accuracy);
    assert!(eval.oob.is_some());
    assert_eq!(trained.forest.n_trees(), 50);

    let importances = &eval.importances;
    assert_eq!(importances.len(), 6);
    assert!(importances.iter().all(|f| f.importance >= 0.0));
    assert!(importances.windows(2).all(|w| w[0].importance >= w[1].importance));
    assert!(["slope", "clay"].contains(&importances[0].name.as_str()));
}

#[test]
fn probability_surface_follows_the_signal() {
    let (stack, set) = training_set();
    let trained = train(&set, &ClassifierConfig::default()).unwrap();
    let out = apply(&trained.forest, &stack).unwrap();

    assert!(out.probability.valid_values().all(|p| (0.0..=1.0).contains(&p)));
    assert!(out.labels.valid_values().all(|v| v == 0.0 || v == 1.0));
    assert_eq!(out.probability.valid_count(), N * N);

    let column_mean = |cols: std::ops::Range<usize>| {
        let mut sum = 0.0;
        let mut n = 0.0;
        for r in 0..N {
            for c in cols.clone() {
                sum += out.probability.get(r, c).unwrap();
                n += 1.0;
            }
        }
        sum / n
    };
    assert!(column_mean(24..N) > column_mean(0..12) + 0.3);
}

#[test]
fn same_seed_same_model() {
    let (stack, set) = training_set();
    let config = ClassifierConfig::default().with_n_trees(20).unwrap();
    let a = train(&set, &config).unwrap();
    let b = train(&set, &config).unwrap();
    assert_eq!(a.evaluation, b.evaluation);
    let pa = apply(&a.forest, &stack).unwrap().probability;
    let pb = apply(&b.forest, &stack).unwrap().probability;
    assert_eq!(pa.data().len(), pb.data().len());
    assert!(pa.data().iter().zip(pb.data()).all(|(x, y)| x == y));
}

#[test]
fn saved_model_reapplies_identically() {
    let (stack, set) = training_set();
    let trained = train(&set, &ClassifierConfig::default().with_n_trees(10).unwrap()).unwrap();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("landslide.model");
    trained.forest.save(&path).unwrap();
    let loaded = RandomForest::load(&path).unwrap();

    let before = apply(&trained.forest, &stack).unwrap().probability;
    let after = apply(&loaded, &stack).unwrap().probability;
    assert!(before.data().iter().zip(after.data()).all(|(x, y)| x == y));
}

#[test]
fn masked_stack_leaves_unpopulated_pixels_unclassified() {
    let (stack, set) = training_set();
    let trained = train(&set, &ClassifierConfig::default().with_n_trees(10).unwrap()).unwrap();
    let pop = Raster::from_fn(grid(), |r, _| if r < N / 2 { 10.0 } else { 0.0 });
    let mask = scarp_raster::PopulationMask::from_counts(&pop, &grid()).unwrap();
    let out = apply(&trained.forest, &stack.masked(&mask).unwrap()).unwrap();
    assert_eq!(out.probability.valid_count(), N * N / 2);
    assert_eq!(out.labels.get(N - 1, 0), None);
}

#[test]
fn incidents_only_cannot_train() {
    let stack = FeatureStack::from_factors(&factors()).unwrap();
    let set = TrainingSet::from_points(&stack, &incidents(), &PointSet::synthetic(vec![]));
    let err = train(&set, &ClassifierConfig::default()).unwrap_err();
    assert!(matches!(err, ModelError::SingleClass { .. }));
}
