use tokio_util::sync::CancellationToken;

use super::fixtures::{PrintersConfig, TestConfig};
use super::test_store;
use crate::{ConfigError, Loader};

#[test]
fn test_loader_load_and_save() {
    let store = test_store();
    let cancel = CancellationToken::new();
    let loader = Loader::<TestConfig>::new(store.clone(), "test");
    assert_eq!(loader.module(), "test");

    let (cfg, version) = loader.load_with_version(&cancel).unwrap();
    assert_eq!(version, 0);
    assert_eq!(cfg.timeout, 30);

    let mut cfg = TestConfig {
        api_key: "k".into(),
        endpoint: "https://loader.example.com".into(),
        timeout: 45,
        ..Default::default()
    };
    let saved = loader.save(&cancel, &mut cfg, false).unwrap();

    let (loaded, version) = loader.clone().load_with_version(&cancel).unwrap();
    assert_eq!(version, saved);
    assert_eq!(loaded, cfg);
    assert_eq!(loader.load(&cancel).unwrap().endpoint, "https://loader.example.com");
}

#[test]
fn test_loader_type_mismatch() {
    let store = test_store();
    let cancel = CancellationToken::new();

    let loader = Loader::<PrintersConfig>::new(store, "test");
    let err = loader.load(&cancel).unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { .. }));

    let err = loader
        .save(&cancel, &mut PrintersConfig::default(), false)
        .unwrap_err();
    assert!(matches!(err, ConfigError::TypeMismatch { .. }));
}
