//! Accuracy regression tests for scarp-rf.
//!
//! A deterministic incident/background dataset over the six susceptibility
//! bands guards against algorithmic changes that degrade the forest.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use scarp_rf::{OobMode, RandomForestConfig, SplitMethod};

const BANDS: [&str; 6] = ["slope", "drainDen", "elev", "clay", "landcover", "soiltex"];

/// 400 samples, alternating background/incident.
///
/// Incidents sit on steep, clay-rich ground (bands 0 and 3 shifted up by 0.4);
/// the other four bands are uniform noise for both classes.
fn make_landslides() -> (Vec<Vec<f64>>, Vec<bool>, Vec<String>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut features = Vec::with_capacity(400);
    let mut labels = Vec::with_capacity(400);
    for i in 0..400 {
        let incident = i % 2 == 1;
        let row: Vec<f64> = (0..BANDS.len())
            .map(|b| {
                let noise = rng.r#gen::<f64>() * 0.6;
                if incident && (b == 0 || b == 3) { noise + 0.4 } else { noise }
            })
            .collect();
        features.push(row);
        labels.push(incident);
    }
    (features, labels, BANDS.iter().map(|s| s.to_string()).collect())
}

fn accuracy(predictions: &[bool], labels: &[bool]) -> f64 {
    let correct = predictions.iter().zip(labels).filter(|(p, l)| p == l).count();
    correct as f64 / labels.len() as f64
}

// ---------------------------------------------------------------------------
// a) held-out accuracy
// ---------------------------------------------------------------------------

/// Train on the first 300 samples, evaluate on the last 100.
#[test]
fn held_out_accuracy_above_threshold() {
    let (features, labels, names) = make_landslides();
    let (train_x, test_x) = features.split_at(300);
    let (train_y, test_y) = labels.split_at(300);
    let result = RandomForestConfig::new(50)
        .unwrap()
        .fit(train_x, train_y, &names)
        .unwrap();
    let predictions = result.forest().predict_batch(test_x).unwrap();
    let acc = accuracy(&predictions, test_y);
    assert!(acc > 0.8, "held-out accuracy {acc} <= 0.8");
}

// ---------------------------------------------------------------------------
// b) OOB accuracy
// ---------------------------------------------------------------------------

#[test]
fn oob_accuracy_above_threshold() {
    let (features, labels, names) = make_landslides();
    let result = RandomForestConfig::new(100)
        .unwrap()
        .with_oob_mode(OobMode::Enabled)
        .fit(&features, &labels, &names)
        .unwrap();
    let oob = result.oob_score().expect("OOB score must be computed when enabled");
    assert!(oob.accuracy > 0.8, "oob accuracy {} <= 0.8", oob.accuracy);
    assert_eq!(
        oob.true_positive + oob.false_positive + oob.false_negative + oob.true_negative,
        oob.n_oob_samples
    );
}

// ---------------------------------------------------------------------------
// c) informative bands rank first
// ---------------------------------------------------------------------------

#[test]
fn slope_and_clay_lead_importance() {
    let (features, labels, names) = make_landslides();
    let result = RandomForestConfig::new(100)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap();
    let mut top2: Vec<&str> = result
        .importances()
        .iter()
        .take(2)
        .map(|f| f.name.as_str())
        .collect();
    top2.sort_unstable();
    assert_eq!(top2, ["clay", "slope"]);
}

// ---------------------------------------------------------------------------
// d) determinism
// ---------------------------------------------------------------------------

#[test]
fn same_seed_same_probabilities() {
    let (features, labels, names) = make_landslides();
    for method in [SplitMethod::Exact, SplitMethod::ExtraTrees] {
        let config = RandomForestConfig::new(30)
            .unwrap()
            .with_split_method(method)
            .with_seed(7);
        let a = config.fit(&features, &labels, &names).unwrap();
        let b = config.fit(&features, &labels, &names).unwrap();
        assert_eq!(
            a.forest().probability_batch(&features).unwrap(),
            b.forest().probability_batch(&features).unwrap(),
            "{method:?} is not reproducible"
        );
    }
}

// ---------------------------------------------------------------------------
// e) training-set fit
// ---------------------------------------------------------------------------

#[test]
fn training_accuracy_above_threshold() {
    let (features, labels, names) = make_landslides();
    let result = RandomForestConfig::new(100)
        .unwrap()
        .fit(&features, &labels, &names)
        .unwrap();
    let acc = accuracy(&result.forest().predict_batch(&features).unwrap(), &labels);
    assert!(acc > 0.95, "training accuracy {acc} <= 0.95");
}
