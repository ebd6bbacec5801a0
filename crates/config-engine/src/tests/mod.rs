use std::sync::Arc;

use config_db::Database;

use crate::{Registry, Store};

mod fixtures;

mod form;
mod loader;

fn test_db() -> Database {
    let db = Database::open_in_memory().expect("Failed to create test DB");
    db.migrate(fixtures::TEST_TABLES)
        .expect("Failed to create config tables");
    db
}

fn test_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register(fixtures::test_spec()).unwrap();
    registry.register(fixtures::printers_spec()).unwrap();
    registry
}

fn test_store() -> Store {
    Store::new(test_db(), Arc::new(test_registry()))
}
