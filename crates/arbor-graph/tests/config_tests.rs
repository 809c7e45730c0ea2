use arbor_graph::{AncestorCacheConfig, GraphComputeConfig, GraphComputeService, GraphError};
use arbor_model::Collection;
use arbor_test_utils::{setup_chain_store, unit_graph};
use std::io::Write;

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
batch_size = 1
worker_threads = 1
collections = ["unit"]

[cache]
max_capacity = 16
time_to_idle_secs = 5
"#
    )
    .unwrap();

    let config = GraphComputeConfig::from_path(file.path()).unwrap();
    assert_eq!(config.batch_size, 1);
    assert_eq!(
        config.cache,
        AncestorCacheConfig {
            max_capacity: 16,
            time_to_idle_secs: 5,
        }
    );

    let store = setup_chain_store(3);
    let report = GraphComputeService::new(store.clone(), config)
        .unwrap()
        .build_graph()
        .unwrap()
        .completed()
        .unwrap();
    assert_eq!(report.units.computed, 3);
    assert_eq!(report.units.batches, 3);
    assert_eq!(report.object_groups.batches, 0);
    assert_eq!(unit_graph(&store, "u2").max_depth, 3);
}

#[test]
fn test_missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GraphComputeConfig::from_path(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, GraphError::Config(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_unknown_collection_is_rejected() {
    let err = GraphComputeConfig::from_toml_str(r#"collections = ["dossier"]"#).unwrap_err();
    assert!(matches!(err, GraphError::Config(_)));
}

#[test]
fn test_empty_collection_list_is_rejected() {
    let err = GraphComputeConfig::from_toml_str("collections = []").unwrap_err();
    assert!(matches!(err, GraphError::Config(msg) if msg.contains("collections")));
    let config = GraphComputeConfig::default().with_collections(vec![Collection::ObjectGroup]);
    assert!(config.validate().is_ok());
}
