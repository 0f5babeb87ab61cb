//! Integration test: artifact bundle persistence

use hepascreen::data::RawTable;
use hepascreen::error::ScreeningError;
use hepascreen::pipeline::{ArtifactBundle, ArtifactStore, Pipeline, COLUMNS_FILE, SCALER_FILE};

fn trained_bundle() -> ArtifactBundle {
    let table = RawTable::from_strs(
        &["JK", "Umur", "Demam", "Urin Gelap", "Kategori Diagnosis"],
        &[
            &["L", "30", "ya", "ya", "Hepatitis Akut"],
            &["P", "34", "ya", "ya", "Hepatitis Akut"],
            &["L", "29", "ya", "tidak", "Hepatitis Akut"],
            &["P", "60", "tidak", "tidak", "Hepatitis Kronis"],
            &["L", "66", "tidak", "ya", "Hepatitis Kronis"],
        ],
    )
    .unwrap();
    Pipeline::default().train(&table, true).unwrap().0
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let bundle = trained_bundle();

    store.save(&bundle).unwrap();
    assert_eq!(store.current_id().unwrap().as_deref(), Some(bundle.id()));

    let loaded = store.load_current().unwrap();
    assert_eq!(loaded, bundle);
}

#[test]
fn test_empty_store_is_not_ready() {
    let dir = tempfile::tempdir().unwrap();
    let err = ArtifactStore::new(dir.path()).load_current().unwrap_err();
    match err {
        ScreeningError::ArtifactsNotReady { missing } => assert!(missing.len() >= 4),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_missing_artifact_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let bundle = trained_bundle();
    let path = store.save(&bundle).unwrap();

    std::fs::remove_file(path.join(SCALER_FILE)).unwrap();

    let err = store.load(bundle.id()).unwrap_err();
    match err {
        ScreeningError::ArtifactsNotReady { missing } => assert_eq!(missing, vec![SCALER_FILE.to_string()]),
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn test_retraining_replaces_current_and_keeps_previous() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());

    let first = trained_bundle();
    let second = trained_bundle();
    assert_ne!(first.id(), second.id());

    store.save(&first).unwrap();
    store.save(&second).unwrap();

    assert_eq!(store.current_id().unwrap().as_deref(), Some(second.id()));
    assert_eq!(store.load(first.id()).unwrap(), first);
    assert_eq!(store.list().unwrap().len(), 2);
}

#[test]
fn test_failed_save_leaves_no_partial_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let first = trained_bundle();
    store.save(&first).unwrap();

    // A non-empty directory already sitting at the target makes the final rename fail
    let second = trained_bundle();
    let blocked = store.bundle_dir(second.id());
    std::fs::create_dir_all(&blocked).unwrap();
    std::fs::write(blocked.join("stray"), b"x").unwrap();

    assert!(store.save(&second).is_err());
    assert_eq!(store.current_id().unwrap().as_deref(), Some(first.id()));

    let leftovers: Vec<String> = std::fs::read_dir(dir.path().join("bundles"))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty(), "{:?}", leftovers);
    assert_eq!(store.load_current().unwrap(), first);
}

#[test]
fn test_old_bundles_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path()).with_retention(2);

    let bundles: Vec<ArtifactBundle> = (0..3).map(|_| trained_bundle()).collect();
    for bundle in &bundles {
        store.save(bundle).unwrap();
    }

    let mut expected = vec![bundles[1].id().to_string(), bundles[2].id().to_string()];
    expected.sort();
    assert_eq!(store.list().unwrap(), expected);
    assert_eq!(store.current_id().unwrap().as_deref(), Some(bundles[2].id()));
    assert!(!store.bundle_dir(bundles[0].id()).exists());
}

#[test]
fn test_corrupt_schema_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let bundle = trained_bundle();
    let path = store.save(&bundle).unwrap();

    std::fs::write(path.join(COLUMNS_FILE), br#"["JK"]"#).unwrap();

    let err = store.load(bundle.id()).unwrap_err();
    assert!(matches!(err, ScreeningError::SerializationError(_)), "{:?}", err);
}

#[test]
fn test_manifest_describes_training_run() {
    let bundle = trained_bundle();
    let manifest = &bundle.manifest;

    assert_eq!(manifest.n_rows, 5);
    assert!(manifest.rebalanced);
    assert_eq!(manifest.classes, vec!["Hepatitis Akut", "Hepatitis Kronis"]);
    assert_eq!(manifest.columns, vec!["JK", "Umur", "Demam", "Urin Gelap"]);
    assert_eq!(manifest.layout.affirmative_token, "ya");
    assert_eq!(manifest.layout.target_column, "Kategori Diagnosis");
}
