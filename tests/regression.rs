use bldpop::{
    config::{MissingFeaturePolicy, TrainConfig},
    regression::{Predictor, TrainedModel, Trainer},
    types::{ID_COLUMN, TARGET_COLUMN},
    PipelineError,
};
use polars::{frame::DataFrame, prelude::Column};

/// `n` buildings whose population is linear in footprint area, plus two weaker features.
fn synthetic(n: usize) -> DataFrame {
    let area: Vec<f64> = (0..n).map(|i| 60.0 + 7.5 * ((i * 37) % n) as f64).collect();
    let levels: Vec<f64> = (0..n).map(|i| 1.0 + (i % 4) as f64).collect();
    let pois: Vec<f64> = (0..n).map(|i| ((i * 13) % 9) as f64).collect();
    // Small deterministic noise around 0.05 people per square metre.
    let population: Vec<f64> = area.iter().enumerate()
        .map(|(i, a)| 0.05 * a + ((i * 7) % 5) as f64 * 0.1 - 0.2)
        .collect();

    DataFrame::new(vec![
        Column::new(ID_COLUMN.into(), (0..n).map(|i| format!("b{i:03}")).collect::<Vec<_>>()),
        Column::new("bld_area_m2".into(), area),
        Column::new("levels".into(), levels),
        Column::new("pois_within_100m".into(), pois),
        Column::new(TARGET_COLUMN.into(), population),
    ]).unwrap()
}

#[test]
fn linear_area_signal_is_learned() {
    let model = Trainer::new(TrainConfig::default()).fit(&synthetic(100)).unwrap();
    let test = model.metrics.test.unwrap();
    assert_eq!(test.samples, 20);
    assert_eq!(model.metrics.train.samples, 80);
    assert!(test.r2 > 0.8, "test R2 {}", test.r2);
    assert_eq!(model.importances[0].feature, "bld_area_m2");
}

#[test]
fn training_is_reproducible() {
    let config = TrainConfig { n_trees: 20, ..Default::default() };
    let a = Trainer::new(config.clone()).fit(&synthetic(60)).unwrap();
    let b = Trainer::new(config).fit(&synthetic(60)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn prediction_ignores_column_order() {
    let table = synthetic(50);
    let model = Trainer::new(TrainConfig { n_trees: 20, ..Default::default() }).fit(&table).unwrap();

    let shuffled = table.select([TARGET_COLUMN, "pois_within_100m", ID_COLUMN, "levels", "bld_area_m2"]).unwrap();
    let predictor = Predictor::default();
    assert_eq!(predictor.predict(&model, &table).unwrap(), predictor.predict(&model, &shuffled).unwrap());
}

#[test]
fn missing_feature_is_a_mismatch_unless_zero_filled() {
    let table = synthetic(40);
    let model = Trainer::new(TrainConfig { n_trees: 10, ..Default::default() }).fit(&table).unwrap();
    let partial = table.drop("levels").unwrap();

    let err = Predictor::new(MissingFeaturePolicy::Fail).predict(&model, &partial).unwrap_err();
    assert_eq!(
        err.downcast_ref::<PipelineError>(),
        Some(&PipelineError::FeatureMismatch { missing: vec!["levels".into()] }),
    );

    let filled = Predictor::new(MissingFeaturePolicy::ZeroFill).predict(&model, &partial).unwrap();
    assert_eq!(filled.len(), 40);
    assert!(filled.iter().all(|v| v.is_finite()));
}

#[test]
fn all_targets_missing_is_an_empty_training_set() {
    let mut table = synthetic(10);
    table.with_column(Column::new(TARGET_COLUMN.into(), vec![None::<f64>; 10])).unwrap();

    let err = Trainer::new(TrainConfig::default()).fit(&table).unwrap_err();
    assert_eq!(err.downcast_ref::<PipelineError>(), Some(&PipelineError::EmptyTrainingSet));
}

#[test]
fn saved_model_predicts_identically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    let table = synthetic(30);
    let model = Trainer::new(TrainConfig { n_trees: 10, ..Default::default() }).fit(&table).unwrap();
    model.save(&path, false).unwrap();

    let loaded = TrainedModel::load(&path).unwrap();
    let predictor = Predictor::default();
    assert_eq!(predictor.predict(&model, &table).unwrap(), predictor.predict(&loaded, &table).unwrap());
}
