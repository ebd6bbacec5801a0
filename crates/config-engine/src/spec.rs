//! Module specifications and their compiled form.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{Accessor, ConfigRecord, ListAccess, RecordType};
use crate::value::{Value, ValueKind};

/// What a module declares about its configuration page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Spec {
    pub module: String,
    pub title: String,
    pub description: String,
    /// Record type backing the page; `None` for info-only pages.
    #[serde(skip)]
    pub record: Option<RecordType>,
    pub sections: Vec<SectionDef>,
    pub array_fields: Vec<ArrayFieldDef>,
    /// Static text shown on read-only pages.
    pub info_content: String,
    pub read_only: bool,
    pub dev_only: bool,
    pub category: String,
    pub order: i32,
}

impl Spec {
    pub fn new<T: ConfigRecord>(module: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            title: title.into(),
            record: Some(RecordType::of::<T>()),
            ..Default::default()
        }
    }

    /// A read-only page with no backing record.
    pub fn info_page(
        module: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            title: title.into(),
            info_content: content.into(),
            read_only: true,
            ..Default::default()
        }
    }
}

/// Layout hint grouping fields under a titled section.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SectionDef {
    pub name: String,
    pub title: String,
    pub description: String,
    /// Explicit field order by declared name. Empty means "fields tagged
    /// with this section, in declaration order".
    pub fields: Vec<String>,
}

/// Override for an array field's annotation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ArrayFieldDef {
    pub field_name: String,
    pub label: String,
    pub item_label: String,
    pub help: String,
    pub key_field: String,
    pub min_items: usize,
    pub max_items: usize,
}

/// Display kind of a field in the admin form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Password,
    Number,
    Textarea,
    Select,
    Bool,
}

impl FieldType {
    pub(crate) fn for_kind(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => Self::Text,
            ValueKind::Integer => Self::Number,
            ValueKind::Boolean => Self::Bool,
        }
    }

    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "password" => Some(Self::Password),
            "number" => Some(Self::Number),
            "textarea" => Some(Self::Textarea),
            "select" => Some(Self::Select),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

/// A compiled leaf setting.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    /// Column name and form key.
    #[serde(rename = "key")]
    pub json_name: String,
    pub label: String,
    pub help: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub kind: ValueKind,
    pub secret: bool,
    pub required: bool,
    pub default: String,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub placeholder: String,
    pub rows: Option<u32>,
    pub options: Vec<FieldOption>,
    pub section: String,
    #[serde(skip)]
    pub(crate) access: Accessor,
}

impl Field {
    /// Read this field from `record`. `None` when the record is of another type.
    pub fn value(&self, record: &dyn Any) -> Option<Value> {
        self.access.get(record)
    }

    /// Store `value` into `record`. `false` when the value does not fit the
    /// field's native type (an `i64` outside an `i32`/`u16` field's range).
    pub(crate) fn assign(&self, record: &mut dyn Any, value: Value) -> bool {
        self.access.set(record, value)
    }

    /// Like [`assign`](Self::assign), but a value that does not fit is
    /// replaced by the declared default. Returns whether `value` itself fit.
    pub(crate) fn assign_or_default(&self, record: &mut dyn Any, value: Value) -> bool {
        if self.assign(record, value) {
            return true;
        }
        if let Some(default) = self.default_value() {
            self.assign(record, default);
        }
        false
    }

    pub(crate) fn default_value(&self) -> Option<Value> {
        if self.default.is_empty() {
            return None;
        }
        Value::parse_default(self.kind, &self.default)
    }

    pub(crate) fn is_zero_in(&self, record: &dyn Any) -> bool {
        self.value(record).is_none_or(|v| v.is_zero())
    }
}

/// A titled group of fields.
#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub title: String,
    pub description: String,
    pub fields: Vec<Field>,
}

/// A compiled repeated sub-group.
#[derive(Clone, Serialize)]
pub struct ArrayField {
    pub name: String,
    #[serde(rename = "key")]
    pub json_name: String,
    pub label: String,
    pub item_label: String,
    pub help: String,
    pub key_field: String,
    pub min_items: usize,
    pub max_items: usize,
    pub fields: Vec<Field>,
    #[serde(skip)]
    pub(crate) list: Arc<dyn ListAccess>,
    #[serde(skip)]
    pub(crate) index_pattern: Regex,
}

impl ArrayField {
    /// Column holding the JSON-encoded items.
    pub fn column(&self) -> String {
        format!("{}_json", self.json_name)
    }

    pub fn len(&self, record: &dyn Any) -> usize {
        self.list.len(record)
    }

    pub fn has_secrets(&self) -> bool {
        self.fields.iter().any(|f| f.secret)
    }

    pub(crate) fn item<'a>(&self, record: &'a dyn Any, index: usize) -> Option<&'a dyn Any> {
        self.list.item(record, index)
    }

    pub(crate) fn item_mut<'a>(
        &self,
        record: &'a mut dyn Any,
        index: usize,
    ) -> Option<&'a mut dyn Any> {
        self.list.item_mut(record, index)
    }

    pub(crate) fn push_default<'a>(&self, record: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        self.list.push_default(record)
    }

    pub(crate) fn retain(&self, record: &mut dyn Any, keep: &mut dyn FnMut(&dyn Any) -> bool) {
        self.list.retain(record, keep)
    }

    /// Stringified key sub-field of `item`; `None` when no key is configured
    /// or the key names no sub-field.
    pub(crate) fn key_of(&self, item: &dyn Any) -> Option<String> {
        if self.key_field.is_empty() {
            return None;
        }
        self.fields
            .iter()
            .find(|f| f.name == self.key_field)
            .and_then(|f| f.value(item))
            .map(|v| v.to_string())
    }

    /// Items as a JSON list of objects keyed by sub-field persistence name.
    pub fn encode_json(&self, record: &dyn Any) -> JsonValue {
        let items = (0..self.len(record))
            .filter_map(|idx| self.item(record, idx))
            .map(|item| {
                let obj: Map<String, JsonValue> = self
                    .fields
                    .iter()
                    .filter_map(|f| f.value(item).map(|v| (f.json_name.clone(), v.to_json())))
                    .collect();
                JsonValue::Object(obj)
            })
            .collect();
        JsonValue::Array(items)
    }

    /// Replace the record's items with those encoded in `raw`. The record is
    /// left untouched when `raw` is not a JSON list of objects.
    pub(crate) fn decode_json(&self, record: &mut dyn Any, raw: &str) -> ConfigResult<()> {
        let entries: Vec<Map<String, JsonValue>> = serde_json::from_str(raw)?;
        self.list.clear(record);
        for entry in &entries {
            let Some(item) = self.push_default(record) else {
                break;
            };
            for field in &self.fields {
                let Some(value) = entry
                    .get(&field.json_name)
                    .and_then(|v| Value::from_json(field.kind, v))
                else {
                    continue;
                };
                if !field.assign_or_default(item, value.clone()) {
                    tracing::warn!(
                        array = %self.name,
                        field = %field.name,
                        value = %value,
                        "Stored item value out of range; using the field default"
                    );
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ArrayField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayField")
            .field("name", &self.name)
            .field("json_name", &self.json_name)
            .field("key_field", &self.key_field)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

/// Immutable compiled form of a [`Spec`].
#[derive(Debug, Clone, Serialize)]
pub struct ParsedSpec {
    pub spec: Spec,
    pub sections: Vec<Section>,
    pub array_fields: Vec<ArrayField>,
}

impl ParsedSpec {
    pub fn module(&self) -> &str {
        &self.spec.module
    }

    pub fn table_name(&self) -> String {
        format!("{}_config", self.spec.module)
    }

    /// Every top-level field, in section order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.sections.iter().flat_map(|s| s.fields.iter())
    }

    /// Look up a top-level field by declared name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields().find(|f| f.name == name)
    }

    pub fn array_field(&self, name: &str) -> Option<&ArrayField> {
        self.array_fields.iter().find(|af| af.name == name)
    }

    pub fn record_type(&self) -> ConfigResult<&RecordType> {
        self.spec.record.as_ref().ok_or_else(|| {
            ConfigError::InvalidSpec(format!("module {} has no config record", self.module()))
        })
    }

    /// Display string of a field's current value; empty for unknown fields.
    pub fn string_value(&self, record: &dyn Any, field: &str) -> String {
        self.field(field)
            .and_then(|f| f.value(record))
            .map(|v| v.to_string())
            .unwrap_or_default()
    }

    /// Whether a field holds a non-zero value.
    pub fn has_value(&self, record: &dyn Any, field: &str) -> bool {
        self.field(field)
            .and_then(|f| f.value(record))
            .is_some_and(|v| !v.is_zero())
    }
}
