//! Loading and saving module records against their single-row tables.

use std::any::{Any, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use config_db::{Database, StoredRow};
use rusqlite::types::Value as SqlValue;
use tokio_util::sync::CancellationToken;

use crate::error::{ConfigError, ConfigResult};
use crate::registry::Registry;
use crate::schema::{ConfigRecord, RecordType};
use crate::spec::ParsedSpec;
use crate::value::Value;

/// A record of whatever type its module registered.
pub struct AnyConfig {
    inner: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl AnyConfig {
    pub(crate) fn new(record_type: &RecordType) -> Self {
        Self {
            inner: record_type.new_record(),
            type_name: record_type.type_name(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Take the concrete record out.
    pub fn downcast<T: ConfigRecord>(self) -> ConfigResult<T> {
        let actual = self.type_name;
        self.inner
            .downcast::<T>()
            .map(|boxed| *boxed)
            .map_err(|_| ConfigError::TypeMismatch {
                expected: type_name::<T>(),
                actual,
            })
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut()
    }

    pub fn as_any(&self) -> &dyn Any {
        &*self.inner
    }

    pub fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut *self.inner
    }
}

impl fmt::Debug for AnyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AnyConfig").field(&self.type_name).finish()
    }
}

/// A loaded record with its row metadata.
#[derive(Debug)]
pub struct Snapshot {
    pub config: AnyConfig,
    /// Row version; 0 when nothing has been saved yet.
    pub version: i64,
    pub created: Option<DateTime<Utc>>,
}

/// Reads and writes module records through the registry's compiled specs.
#[derive(Clone)]
pub struct Store {
    db: Database,
    registry: Arc<Registry>,
}

impl Store {
    pub fn new(db: Database, registry: Arc<Registry>) -> Self {
        Self { db, registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Load a module's current record and version.
    pub fn load(
        &self,
        cancel: &CancellationToken,
        module: &str,
    ) -> ConfigResult<(AnyConfig, i64)> {
        let snapshot = self.load_snapshot(cancel, module)?;
        Ok((snapshot.config, snapshot.version))
    }

    /// Load a module's current record along with its version and timestamp.
    /// With no stored row the record carries its declared defaults.
    pub fn load_snapshot(
        &self,
        cancel: &CancellationToken,
        module: &str,
    ) -> ConfigResult<Snapshot> {
        let spec = self.registry.require(module)?;
        let record_type = spec.record_type()?;
        let row = self
            .db
            .latest_row(cancel, &spec.table_name())
            .map_err(ConfigError::from_db)?;

        let mut config = AnyConfig::new(record_type);
        let Some(row) = row else {
            apply_defaults(&spec, config.as_any_mut());
            tracing::debug!(module, "No stored config; using defaults");
            return Ok(Snapshot {
                config,
                version: 0,
                created: None,
            });
        };

        populate(&spec, config.as_any_mut(), &row);
        tracing::debug!(module, version = row.version, "Config loaded");
        Ok(Snapshot {
            config,
            version: row.version,
            created: row.created,
        })
    }

    /// Persist `config` as the module's only row and return its new version.
    ///
    /// `config` is either the registered record type or an [`AnyConfig`]
    /// wrapping it. With `preserve_secrets`, empty secrets keep their stored
    /// values and new keyed array items missing a secret are dropped.
    pub fn save<C: Any>(
        &self,
        cancel: &CancellationToken,
        module: &str,
        config: &mut C,
        preserve_secrets: bool,
    ) -> ConfigResult<i64> {
        let config: &mut dyn Any = config;
        if let Some(wrapped) = config.downcast_mut::<AnyConfig>() {
            let actual = wrapped.type_name;
            return self.save_record(cancel, module, wrapped.as_any_mut(), actual, preserve_secrets);
        }
        self.save_record(cancel, module, config, type_name::<C>(), preserve_secrets)
    }

    pub(crate) fn save_record(
        &self,
        cancel: &CancellationToken,
        module: &str,
        record: &mut dyn Any,
        actual: &'static str,
        preserve_secrets: bool,
    ) -> ConfigResult<i64> {
        let spec = self.registry.require(module)?;
        let record_type = spec.record_type()?;
        if (*record).type_id() != record_type.type_id() {
            return Err(ConfigError::TypeMismatch {
                expected: record_type.type_name(),
                actual,
            });
        }

        if preserve_secrets {
            let existing = self.load_existing(cancel, &spec, record_type)?;
            let existing = existing.as_deref().map(|e| e as &dyn Any);
            if let Some(existing) = existing {
                merge_secrets(&spec, record, existing);
            }
            drop_incomplete_items(&spec, record, existing);
        }

        record_type
            .validate(&*record)
            .map_err(ConfigError::Validation)?;

        let (columns, values) = insert_params(&spec, &*record)?;
        let version = self
            .db
            .replace_row(cancel, &spec.table_name(), &columns, values)
            .map_err(ConfigError::from_db)?;
        tracing::debug!(module, version, "Config saved");
        Ok(version)
    }

    fn load_existing(
        &self,
        cancel: &CancellationToken,
        spec: &ParsedSpec,
        record_type: &RecordType,
    ) -> ConfigResult<Option<Box<dyn Any + Send + Sync>>> {
        let Some(row) = self
            .db
            .latest_row(cancel, &spec.table_name())
            .map_err(ConfigError::from_db)?
        else {
            return Ok(None);
        };
        let mut existing = record_type.new_record();
        populate(spec, &mut *existing, &row);
        Ok(Some(existing))
    }
}

fn apply_defaults(spec: &ParsedSpec, record: &mut dyn Any) {
    for field in spec.fields() {
        let Some(value) = field.default_value() else {
            continue;
        };
        if !field.assign(record, value) {
            tracing::warn!(
                module = %spec.module(),
                field = %field.name,
                default = %field.default,
                "Declared default out of range; leaving the field empty"
            );
        }
    }
}

fn populate(spec: &ParsedSpec, record: &mut dyn Any, row: &StoredRow) {
    for field in spec.fields() {
        let Some(value) = row
            .get(&field.json_name)
            .and_then(|raw| Value::from_sql(field.kind, raw))
        else {
            continue;
        };
        if !field.assign_or_default(record, value.clone()) {
            tracing::warn!(
                module = %spec.module(),
                field = %field.name,
                value = %value,
                "Stored value out of range; using the field default"
            );
        }
    }

    for af in &spec.array_fields {
        let raw = match row.get(&af.column()).or_else(|| row.get(&af.json_name)) {
            Some(SqlValue::Text(text)) => text.as_str(),
            Some(SqlValue::Blob(bytes)) => match std::str::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => continue,
            },
            _ => continue,
        };
        if raw.is_empty() {
            continue;
        }
        if let Err(e) = af.decode_json(record, raw) {
            tracing::warn!(
                module = %spec.module(),
                array = %af.name,
                error = %e,
                "Malformed array JSON; leaving it empty"
            );
        }
    }
}

/// Copy stored secrets into empty secret fields of `record`.
fn merge_secrets(spec: &ParsedSpec, record: &mut dyn Any, existing: &dyn Any) {
    for field in spec.fields().filter(|f| f.secret) {
        if !field.is_zero_in(record) {
            continue;
        }
        // Read back through the same accessor, so the value always fits.
        if let Some(value) = field.value(existing).filter(|v| !v.is_zero()) {
            field.assign(record, value);
        }
    }

    for af in spec.array_fields.iter().filter(|af| !af.key_field.is_empty()) {
        let mut old_by_key = HashMap::new();
        for idx in 0..af.len(existing) {
            if let Some(key) = af.item(existing, idx).and_then(|item| af.key_of(item)) {
                old_by_key.insert(key, idx);
            }
        }

        for idx in 0..af.len(record) {
            let Some(key) = af.item(record, idx).and_then(|item| af.key_of(item)) else {
                continue;
            };
            let Some(old) = old_by_key.get(&key).and_then(|&o| af.item(existing, o)) else {
                continue;
            };
            let Some(item) = af.item_mut(record, idx) else {
                continue;
            };
            for field in af.fields.iter().filter(|f| f.secret) {
                if !field.is_zero_in(item) {
                    continue;
                }
                if let Some(value) = field.value(old).filter(|v| !v.is_zero()) {
                    field.assign(item, value);
                }
            }
        }
    }
}

/// Drop keyed array items that are new (no stored item shares their key)
/// and are missing any secret.
fn drop_incomplete_items(spec: &ParsedSpec, record: &mut dyn Any, existing: Option<&dyn Any>) {
    for af in spec
        .array_fields
        .iter()
        .filter(|af| !af.key_field.is_empty() && af.has_secrets())
    {
        let existing_keys: HashSet<String> = existing
            .map(|old| {
                (0..af.len(old))
                    .filter_map(|idx| af.item(old, idx))
                    .filter_map(|item| af.key_of(item))
                    .collect()
            })
            .unwrap_or_default();

        let before = af.len(record);
        af.retain(record, &mut |item: &dyn Any| {
            let key = af.key_of(item).unwrap_or_default();
            existing_keys.contains(&key)
                || af
                    .fields
                    .iter()
                    .filter(|f| f.secret)
                    .all(|f| !f.is_zero_in(item))
        });

        let dropped = before - af.len(record);
        if dropped > 0 {
            tracing::warn!(
                module = %spec.module(),
                array = %af.name,
                dropped,
                "Dropped new array items with empty secrets"
            );
        }
    }
}

fn insert_params(
    spec: &ParsedSpec,
    record: &dyn Any,
) -> ConfigResult<(Vec<String>, Vec<SqlValue>)> {
    let mut columns = Vec::new();
    let mut values = Vec::new();

    for field in spec.fields() {
        let value = field
            .value(record)
            .unwrap_or_else(|| Value::zero(field.kind));
        columns.push(field.json_name.clone());
        values.push(value.into_sql());
    }

    for af in &spec.array_fields {
        let encoded = serde_json::to_string(&af.encode_json(record))?;
        columns.push(af.column());
        values.push(SqlValue::Text(encoded));
    }

    Ok((columns, values))
}
