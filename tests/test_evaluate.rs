use std::collections::BTreeMap;

use mlproject::models::{
    DecisionTreeRegressor, Estimator, LinearRegression, ParamGrid, ParamValue, Regressor,
    RidgeRegression,
};
use mlproject::utils::evaluate_models;
use ndarray::{Array1, Array2};

fn linear_data(n: usize, offset: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 2), |(i, j)| {
        let t = (i + offset) as f64;
        if j == 0 { t * 0.1 } else { (t * 0.37).sin() }
    });
    let y = x.column(0).mapv(|v| 2.0 * v + 1.0) + x.column(1).mapv(|v| -3.0 * v);
    (x, y)
}

fn candidates() -> BTreeMap<String, Estimator> {
    let mut models = BTreeMap::new();
    models.insert("Linear Regression".to_string(), LinearRegression::default().into());
    models.insert("Ridge".to_string(), RidgeRegression::default().into());
    models
}

#[test]
fn reports_one_score_per_model() {
    let (x_train, y_train) = linear_data(60, 0);
    let (x_test, y_test) = linear_data(20, 60);
    let models = candidates();
    let mut params = BTreeMap::new();
    params.insert("Linear Regression".to_string(), ParamGrid::new());
    params.insert(
        "Ridge".to_string(),
        ParamGrid::from([(
            "alpha".to_string(),
            vec![ParamValue::Float(0.01), ParamValue::Float(1.0)],
        )]),
    );

    let evaluation = evaluate_models(&x_train, &y_train, &x_test, &y_test, &models, &params).unwrap();

    assert_eq!(evaluation.report.len(), 2);
    assert!(evaluation.report["Linear Regression"] > 0.999);
    assert!(evaluation.report["Ridge"] <= 1.0);
    assert!(evaluation.fitted.values().all(|m| m.is_fitted()));
    assert_eq!(evaluation.best().unwrap().0, "Linear Regression");
    // caller's estimators stay untouched
    assert!(models.values().all(|m| !m.is_fitted()));
}

#[test]
fn poor_models_score_below_one() {
    let (x_train, y_train) = linear_data(60, 0);
    let (x_test, y_test) = linear_data(20, 60);
    let mut models = BTreeMap::new();
    models.insert("stump".to_string(), Estimator::from(DecisionTreeRegressor::default()));
    let params = BTreeMap::from([(
        "stump".to_string(),
        ParamGrid::from([("max_depth".to_string(), vec![ParamValue::Int(1)])]),
    )]);

    let evaluation = evaluate_models(&x_train, &y_train, &x_test, &y_test, &models, &params).unwrap();
    assert!(evaluation.report["stump"] < 0.9);
}

#[test]
fn missing_grid_fails_before_fitting() {
    let (x, y) = linear_data(30, 0);
    let models = candidates();
    let params = BTreeMap::from([("Linear Regression".to_string(), ParamGrid::new())]);

    let err = evaluate_models(&x, &y, &x, &y, &models, &params).unwrap_err();
    assert!(format!("{err}").contains("Ridge"));
}

#[test]
fn invalid_parameter_aborts_evaluation() {
    let (x, y) = linear_data(30, 0);
    let models = candidates();
    let params = BTreeMap::from([
        ("Linear Regression".to_string(), ParamGrid::new()),
        (
            "Ridge".to_string(),
            ParamGrid::from([("depth".to_string(), vec![ParamValue::Int(3)])]),
        ),
    ]);

    assert!(evaluate_models(&x, &y, &x, &y, &models, &params).is_err());
}
