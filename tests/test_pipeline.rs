mod common;

use mlproject::TrainingPipeline;
use mlproject::data::loader::load_file;
use mlproject::models::{
    DecisionTreeRegressor, Estimator, LinearRegression, ParamGrid, ParamValue, Regressor,
    RidgeRegression,
};
use mlproject::trainer::{ModelRegistry, split_features_target};
use mlproject::transformation::Preprocessor;
use mlproject::utils::load_object;

fn small_registry() -> ModelRegistry {
    ModelRegistry::new()
        .register("Linear Regression", LinearRegression::default(), ParamGrid::new())
        .register(
            "Ridge",
            RidgeRegression::default(),
            ParamGrid::from([(
                "alpha".to_string(),
                vec![ParamValue::Float(0.1), ParamValue::Float(10.0)],
            )]),
        )
        .register(
            "Decision Tree",
            DecisionTreeRegressor::default(),
            ParamGrid::from([("max_depth".to_string(), vec![ParamValue::Int(4)])]),
        )
}

#[test]
fn trains_and_persists_a_model() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::project(dir.path(), 400);
    config.n_jobs = Some(2);

    let outcome = TrainingPipeline::new(config)
        .with_registry(small_registry())
        .run()
        .unwrap();

    assert!(outcome.r2_score() > 0.6, "r2 = {}", outcome.r2_score());
    assert_eq!(outcome.training.report.len(), 3);
    assert_eq!(outcome.training.model_path, dir.path().join("artifacts/model.json"));
    assert_eq!(outcome.preprocessor_path, dir.path().join("artifacts/preprocessor.json"));

    let preprocessor: Preprocessor = load_object(&outcome.preprocessor_path).unwrap();
    let model: Estimator = load_object(&outcome.training.model_path).unwrap();
    assert!(model.is_fitted());

    // the reloaded artifacts reproduce the reported score
    let test = load_file(&outcome.test_path).unwrap();
    let arr = preprocessor.transform_with_target(&test).unwrap();
    let (x, y) = split_features_target(&arr).unwrap();
    let score = model.score(&x, &y).unwrap();
    assert!((score - outcome.r2_score()).abs() < 1e-9);
}

#[test]
fn unreachable_threshold_fails_without_saving() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::project(dir.path(), 200);
    config.min_model_score = 1.5;

    let err = TrainingPipeline::new(config)
        .with_registry(small_registry())
        .run()
        .unwrap_err();

    assert!(err.to_string().contains("No best model found"));
    assert!(!dir.path().join("artifacts/model.json").exists());
    assert!(dir.path().join("artifacts/preprocessor.json").exists());
}
