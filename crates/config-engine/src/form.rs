//! Building records from submitted HTML forms.
//!
//! Top-level fields are read from their persistence name; array items from
//! `name[INDEX][sub]` keys. Indices need not be contiguous and are applied
//! in ascending order.

use std::collections::{BTreeSet, HashMap};

use url::form_urlencoded;

use crate::error::ConfigResult;
use crate::spec::ArrayField;
use crate::store::{AnyConfig, Store};
use crate::value::Value;

/// Decoded form values. A key may carry several values; lookups see the first.
#[derive(Debug, Clone, Default)]
pub struct FormData {
    values: HashMap<String, Vec<String>>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        pairs.into_iter().collect()
    }

    /// Decode an `application/x-www-form-urlencoded` body.
    pub fn from_urlencoded(body: &[u8]) -> Self {
        form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.entry(key.into()).or_default().push(value.into());
    }

    /// First value for `key`, or `""` when absent.
    pub fn value(&self, key: &str) -> &str {
        self.values
            .get(key)
            .and_then(|vals| vals.first())
            .map_or("", String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut form = Self::new();
        for (k, v) in iter {
            form.insert(k, v);
        }
        form
    }
}

impl Store {
    /// Build a new record for `module` from submitted form values.
    pub fn parse_form(&self, module: &str, form: &FormData) -> ConfigResult<AnyConfig> {
        let spec = self.registry().require(module)?;
        let mut config = AnyConfig::new(spec.record_type()?);
        let record = config.as_any_mut();

        for field in spec.fields() {
            let raw = form.value(&field.json_name);
            let Some(value) = Value::from_form(field.kind, raw, &field.default) else {
                continue;
            };
            if !field.assign_or_default(record, value) {
                tracing::warn!(
                    module,
                    field = %field.json_name,
                    value = raw,
                    "Submitted value out of range; using the field default"
                );
            }
        }

        for af in &spec.array_fields {
            for index in form_indices(form, af) {
                let Some(item) = af.push_default(record) else {
                    break;
                };
                let prefix = format!("{}[{index}]", af.json_name);
                for field in &af.fields {
                    let raw = form.value(&format!("{prefix}[{}]", field.json_name));
                    let Some(value) = Value::from_form(field.kind, raw, &field.default) else {
                        continue;
                    };
                    if !field.assign_or_default(item, value) {
                        tracing::warn!(
                            module,
                            field = %format!("{prefix}[{}]", field.json_name),
                            value = raw,
                            "Submitted value out of range; using the field default"
                        );
                    }
                }
            }
        }

        tracing::debug!(module, "Config form parsed");
        Ok(config)
    }
}

/// Item indices present in the form for `af`, ascending.
fn form_indices(form: &FormData, af: &ArrayField) -> BTreeSet<u64> {
    form.keys()
        .filter_map(|key| af.index_pattern.captures(key))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .collect()
}
