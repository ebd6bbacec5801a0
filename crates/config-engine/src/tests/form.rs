use tokio_util::sync::CancellationToken;

use super::fixtures::{PrinterConfig, PrintersConfig, TestConfig};
use super::test_store;
use crate::{ConfigError, FormData};

#[test]
fn test_form_data_lookup() {
    let mut form = FormData::from_pairs([("a", "1"), ("a", "2")]);
    form.insert("b", "x");
    assert_eq!(form.value("a"), "1");
    assert_eq!(form.value("b"), "x");
    assert_eq!(form.value("missing"), "");
    assert!(!form.is_empty());
}

#[test]
fn test_parse_regular_fields() {
    let store = test_store();
    let form = FormData::from_pairs([
        ("api_key", "new-key"),
        ("endpoint", "https://form.example.com"),
        ("timeout", ""),
        ("enabled", "on"),
        ("log_level", "warn"),
        ("notes", "line one\nline two"),
    ]);

    let cfg = store
        .parse_form("test", &form)
        .unwrap()
        .downcast::<TestConfig>()
        .unwrap();
    assert_eq!(cfg.api_key, "new-key");
    assert_eq!(cfg.endpoint, "https://form.example.com");
    assert_eq!(cfg.timeout, 30);
    assert!(cfg.enabled);
    assert_eq!(cfg.log_level, "warn");
    assert_eq!(cfg.notes, "line one\nline two");
}

#[test]
fn test_parse_bad_integer_and_missing_checkbox() {
    let store = test_store();
    let form = FormData::from_pairs([("timeout", "soon")]);

    let cfg = store
        .parse_form("test", &form)
        .unwrap()
        .downcast::<TestConfig>()
        .unwrap();
    assert_eq!(cfg.timeout, 0);
    assert!(!cfg.enabled);
}

#[test]
fn test_parse_out_of_range_integer_uses_default() {
    let store = test_store();
    let form = FormData::from_pairs([("timeout", "5000000000")]);

    let cfg = store
        .parse_form("test", &form)
        .unwrap()
        .downcast::<TestConfig>()
        .unwrap();
    assert_eq!(cfg.timeout, 30);
}

#[test]
fn test_parse_indexed_array_items() {
    let store = test_store();
    let form = FormData::from_pairs([
        ("printers[2][name]", "Printer C"),
        ("printers[2][serial]", "SN003"),
        ("printers[0][name]", "Printer A"),
        ("printers[0][host]", "10.0.0.1"),
        ("printers[0][access_code]", "AAA"),
        ("printers[0][serial]", "SN001"),
        ("printers[x][name]", "ignored"),
        ("poll_interval_secs", "12"),
    ]);

    let cfg = store
        .parse_form("printers", &form)
        .unwrap()
        .downcast::<PrintersConfig>()
        .unwrap();
    assert_eq!(cfg.poll_interval_secs, 12);
    assert_eq!(
        cfg.printers,
        vec![
            PrinterConfig::new("Printer A", "10.0.0.1", "AAA", "SN001"),
            PrinterConfig::new("Printer C", "", "", "SN003"),
        ]
    );
}

#[test]
fn test_parse_without_items_yields_empty_list() {
    let store = test_store();
    let cfg = store
        .parse_form("printers", &FormData::new())
        .unwrap()
        .downcast::<PrintersConfig>()
        .unwrap();
    assert!(cfg.printers.is_empty());
    assert_eq!(cfg.poll_interval_secs, 5);
}

#[test]
fn test_parse_urlencoded_body() {
    let store = test_store();
    let form = FormData::from_urlencoded(
        b"printers%5B1%5D%5Bname%5D=Front+Desk&printers%5B1%5D%5Bserial%5D=SN%2F7&poll_interval_secs=3",
    );

    let cfg = store
        .parse_form("printers", &form)
        .unwrap()
        .downcast::<PrintersConfig>()
        .unwrap();
    assert_eq!(cfg.poll_interval_secs, 3);
    assert_eq!(cfg.printers.len(), 1);
    assert_eq!(cfg.printers[0].name, "Front Desk");
    assert_eq!(cfg.printers[0].serial, "SN/7");
}

#[test]
fn test_parse_unknown_module() {
    let store = test_store();
    let err = store.parse_form("nope", &FormData::new()).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownModule(_)));
}

#[test]
fn test_form_submission_keeps_stored_secret() {
    let store = test_store();
    let cancel = CancellationToken::new();
    let first = FormData::from_pairs([("api_key", "original"), ("endpoint", "a")]);
    let mut cfg = store.parse_form("test", &first).unwrap();
    store.save(&cancel, "test", &mut cfg, true).unwrap();

    let second = FormData::from_pairs([("api_key", ""), ("endpoint", "b")]);
    let mut cfg = store.parse_form("test", &second).unwrap();
    store.save(&cancel, "test", &mut cfg, true).unwrap();

    let (loaded, _) = store.load(&cancel, "test").unwrap();
    let loaded = loaded.downcast::<TestConfig>().unwrap();
    assert_eq!(loaded.api_key, "original");
    assert_eq!(loaded.endpoint, "b");
    assert_eq!(loaded.timeout, 30);
}
