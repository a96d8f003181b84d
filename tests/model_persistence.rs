//! Model Persistence Tests
//!
//! Train, save and reload per-sensor isolation forests in a temporary model
//! directory; corrupt or outdated files must trigger a retrain rather than a
//! startup failure.

use std::fs;
use std::path::Path;

use sensor_risk::config::ModelsConfig;
use sensor_risk::model::model_path;
use sensor_risk::{
    EngineConfig, IsolationForest, ModelBank, ModelError, OutlierModel, ProfileRegistry,
    RiskEngine, ScoreSource,
};

/// Small forests keep these tests quick.
fn models_config(dir: &Path) -> ModelsConfig {
    ModelsConfig {
        dir: dir.to_path_buf(),
        n_estimators: 20,
        max_samples: 64,
        training_samples: 500,
        ..ModelsConfig::default()
    }
}

#[test]
fn train_all_writes_one_file_per_sensor_type() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = models_config(dir.path());
    let registry = ProfileRegistry::builtin();

    let bank = ModelBank::train_all(&registry, &cfg).unwrap();
    assert_eq!(bank.len(), 3);
    for sensor_type in registry.sensor_types() {
        assert!(bank.contains(sensor_type));
        assert!(model_path(dir.path(), sensor_type).exists());
    }
}

#[test]
fn saved_forest_loads_back_identically() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = models_config(dir.path());
    let registry = ProfileRegistry::builtin();
    ModelBank::train_all(&registry, &cfg).unwrap();

    let path = model_path(dir.path(), "temperature");
    let forest = IsolationForest::load(&path).unwrap();
    assert_eq!(forest.sensor_type(), "temperature");

    let resaved = dir.path().join("copy.json");
    forest.save(&resaved).unwrap();
    let reloaded = IsolationForest::load(&resaved).unwrap();
    assert_eq!(forest, reloaded);

    for v in [20.0, 52.0, 95.0] {
        let a = forest.evaluate(v).unwrap();
        let b = reloaded.evaluate(v).unwrap();
        assert_eq!(a, b);
        assert!(a.score.is_finite());
    }
}

#[test]
fn trained_forest_ranks_extremes_below_the_band_centre() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = models_config(dir.path());
    ModelBank::train_all(&ProfileRegistry::builtin(), &cfg).unwrap();

    let forest = IsolationForest::load(&model_path(dir.path(), "temperature")).unwrap();
    let centre = forest.decision_function(52.0).unwrap();
    let extreme = forest.decision_function(150.0).unwrap();
    assert!(extreme < centre, "extreme {extreme} should score below centre {centre}");
}

#[test]
fn corrupt_model_file_is_retrained() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = models_config(dir.path());
    let path = model_path(dir.path(), "pressure");
    fs::write(&path, "{ this is not a model").unwrap();
    assert!(matches!(IsolationForest::load(&path), Err(ModelError::Serialization(_))));

    let bank = ModelBank::load_or_train(&ProfileRegistry::builtin(), &cfg);
    assert!(bank.contains("pressure"));
    // Retrained model was persisted over the corrupt file
    assert!(IsolationForest::load(&path).is_ok());
}

#[test]
fn schema_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = models_config(dir.path());
    ModelBank::train_all(&ProfileRegistry::builtin(), &cfg).unwrap();

    let path = model_path(dir.path(), "vibration");
    let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["schema_version"] = serde_json::json!(99);
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    assert!(matches!(
        IsolationForest::load(&path),
        Err(ModelError::SchemaMismatch(99, 1))
    ));
}

#[test]
fn dangling_tree_index_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = models_config(dir.path());
    ModelBank::train_all(&ProfileRegistry::builtin(), &cfg).unwrap();

    let path = model_path(dir.path(), "temperature");
    let mut json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    json["trees"][0]["nodes"][0] = serde_json::json!({
        "kind": "split",
        "threshold": 50.0,
        "left": 100_000,
        "right": 100_001
    });
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    assert!(matches!(IsolationForest::load(&path), Err(ModelError::Corrupt(_))));
}

#[test]
fn disabled_models_yield_an_empty_bank() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ModelsConfig {
        enabled: false,
        ..models_config(dir.path())
    };
    let bank = ModelBank::load_or_train(&ProfileRegistry::builtin(), &cfg);
    assert!(bank.is_empty());
    assert!(!model_path(dir.path(), "temperature").exists());
}

#[test]
fn engine_from_config_scores_with_models() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = EngineConfig::default();
    config.models = models_config(dir.path());

    let engine = RiskEngine::from_config(config).unwrap();
    assert_eq!(engine.models().len(), 3);

    let r = engine.predict_value("machine-001", "temperature", 52.0);
    assert_eq!(r.source, ScoreSource::Model);
    assert!((0.0..=100.0).contains(&r.risk_probability));

    // Unsupported types never reach the model bank
    let r = engine.predict_value("machine-001", "humidity", 40.0);
    assert_eq!(r.source, ScoreSource::Unsupported);
}
