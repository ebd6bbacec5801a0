//! Compile a [`Spec`] and its record schema into a [`ParsedSpec`].

use std::collections::HashSet;

use regex::Regex;

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{ArrayDecl, Decl, LeafDecl};
use crate::spec::{
    ArrayField, ArrayFieldDef, Field, FieldOption, FieldType, ParsedSpec, Section, SectionDef, Spec,
};

const DEFAULT_ITEM_LABEL: &str = "Item";

pub(crate) fn compile(spec: Spec) -> ConfigResult<ParsedSpec> {
    validate_module_name(&spec.module)?;

    let Some(record) = spec.record else {
        return Ok(ParsedSpec {
            spec,
            sections: Vec::new(),
            array_fields: Vec::new(),
        });
    };

    let mut fields = Vec::new();
    let mut array_fields = Vec::new();
    for decl in record.describe() {
        match decl {
            Decl::Leaf(leaf) => fields.push(compile_field(&leaf)),
            Decl::Array(array) => array_fields.push(compile_array(&array, &spec.array_fields)?),
        }
    }

    check_columns(&spec.module, &fields, &array_fields)?;
    let sections = group_sections(&spec.module, fields, &spec.sections);

    Ok(ParsedSpec {
        spec,
        sections,
        array_fields,
    })
}

/// Module names end up in table names, so only identifier characters pass.
fn validate_module_name(module: &str) -> ConfigResult<()> {
    if module.is_empty() {
        return Err(ConfigError::InvalidSpec("module name is empty".into()));
    }
    if !module
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(ConfigError::InvalidSpec(format!(
            "module name {module:?} may only contain letters, digits and '_'"
        )));
    }
    Ok(())
}

fn compile_field(decl: &LeafDecl) -> Field {
    let mut field = Field {
        name: decl.name.to_string(),
        json_name: decl.name.to_lowercase(),
        label: String::new(),
        help: String::new(),
        field_type: FieldType::for_kind(decl.kind),
        kind: decl.kind,
        secret: false,
        required: false,
        default: String::new(),
        min: None,
        max: None,
        placeholder: String::new(),
        rows: None,
        options: Vec::new(),
        section: String::new(),
        access: decl.access.clone(),
    };
    apply_field_annotation(&mut field, decl.tag);
    if field.secret {
        field.field_type = FieldType::Password;
    }
    if field.label.is_empty() {
        field.label = split_camel_case(&field.name);
    }
    field
}

fn apply_field_annotation(field: &mut Field, tag: &str) {
    for part in split_annotation(tag) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        let Some((key, value)) = part.split_once('=') else {
            match part {
                "secret" => {
                    field.secret = true;
                    field.field_type = FieldType::Password;
                }
                "required" => field.required = true,
                "multiline" => field.field_type = FieldType::Textarea,
                _ => {}
            }
            continue;
        };

        match key {
            "label" => field.label = value.to_string(),
            "help" => field.help = value.to_string(),
            "type" => {
                if let Some(kind) = FieldType::parse(value) {
                    field.field_type = kind;
                }
            }
            "default" => field.default = value.to_string(),
            "min" => field.min = value.parse().ok().or(field.min),
            "max" => field.max = value.parse().ok().or(field.max),
            "placeholder" => field.placeholder = value.to_string(),
            "rows" => field.rows = value.parse().ok().or(field.rows),
            "options" => field.options.extend(value.split('|').map(|opt| FieldOption {
                value: opt.to_string(),
                label: opt.to_string(),
            })),
            "section" => field.section = value.to_string(),
            "column" if !value.is_empty() => field.json_name = value.to_string(),
            _ => {}
        }
    }
}

fn compile_array(decl: &ArrayDecl, defs: &[ArrayFieldDef]) -> ConfigResult<ArrayField> {
    let mut label = String::new();
    let mut item_label = DEFAULT_ITEM_LABEL.to_string();
    let mut help = String::new();
    let mut key_field = String::new();
    let mut min_items = 0;
    let mut max_items = 0;
    let mut json_name = decl.name.to_lowercase();

    for part in split_annotation(decl.tag) {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "label" => label = value.to_string(),
            "item" => item_label = value.to_string(),
            "help" => help = value.to_string(),
            "key" => key_field = value.to_string(),
            "min" => min_items = value.parse().unwrap_or(min_items),
            "max" => max_items = value.parse().unwrap_or(max_items),
            "column" if !value.is_empty() => json_name = value.to_string(),
            _ => {}
        }
    }

    if let Some(def) = defs.iter().find(|d| d.field_name == decl.name) {
        if !def.label.is_empty() {
            label = def.label.clone();
        }
        if !def.item_label.is_empty() {
            item_label = def.item_label.clone();
        }
        if !def.help.is_empty() {
            help = def.help.clone();
        }
        if !def.key_field.is_empty() {
            key_field = def.key_field.clone();
        }
        min_items = def.min_items;
        max_items = def.max_items;
    }

    if label.is_empty() {
        label = split_camel_case(decl.name);
    }

    let fields: Vec<Field> = decl.items.iter().map(compile_field).collect();
    let mut seen = HashSet::new();
    for field in &fields {
        if !seen.insert(field.json_name.as_str()) {
            return Err(ConfigError::InvalidSpec(format!(
                "array {}: duplicate column {}",
                decl.name, field.json_name
            )));
        }
    }
    if !key_field.is_empty() && !fields.iter().any(|f| f.name == key_field) {
        tracing::warn!(
            array = decl.name,
            key = %key_field,
            "Array key names no item field; items will never match"
        );
    }

    let index_pattern = Regex::new(&format!(r"^{}\[(\d+)\]", regex::escape(&json_name)))
        .map_err(|e| ConfigError::InvalidSpec(format!("array {}: {e}", decl.name)))?;

    Ok(ArrayField {
        name: decl.name.to_string(),
        json_name,
        label,
        item_label,
        help,
        key_field,
        min_items,
        max_items,
        fields,
        list: decl.list.clone(),
        index_pattern,
    })
}

fn check_columns(module: &str, fields: &[Field], arrays: &[ArrayField]) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    let columns = fields
        .iter()
        .map(|f| f.json_name.clone())
        .chain(arrays.iter().map(ArrayField::column));
    for column in columns {
        if matches!(column.as_str(), "version" | "created") {
            return Err(ConfigError::InvalidSpec(format!(
                "module {module}: column {column} is reserved"
            )));
        }
        if !seen.insert(column.clone()) {
            return Err(ConfigError::InvalidSpec(format!(
                "module {module}: duplicate column {column}"
            )));
        }
    }
    Ok(())
}

/// Split an annotation on commas that are not inside parentheses.
pub(crate) fn split_annotation(tag: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, c) in tag.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&tag[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < tag.len() {
        parts.push(&tag[start..]);
    }
    parts
}

/// `SyncIntervalHours` -> `Sync Interval Hours`. Every capital after the
/// first character gets a space, so `APIKey` becomes `A P I Key`.
pub(crate) fn split_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, c) in name.char_indices() {
        if idx > 0 && c.is_ascii_uppercase() {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

fn group_sections(module: &str, fields: Vec<Field>, defs: &[SectionDef]) -> Vec<Section> {
    if fields.is_empty() {
        return Vec::new();
    }
    if defs.is_empty() {
        return vec![unnamed_section(fields)];
    }

    // Explicit lists take precedence over section tags.
    let listed: HashSet<&str> = defs
        .iter()
        .flat_map(|d| d.fields.iter().map(String::as_str))
        .collect();

    let mut placed = HashSet::new();
    let mut sections = Vec::new();
    for def in defs {
        let members: Vec<Field> = if def.fields.is_empty() {
            fields
                .iter()
                .filter(|f| f.section == def.name && !listed.contains(f.name.as_str()))
                .filter(|f| placed.insert(f.name.clone()))
                .cloned()
                .collect()
        } else {
            def.fields
                .iter()
                .filter_map(|name| fields.iter().find(|f| &f.name == name))
                .filter(|f| placed.insert(f.name.clone()))
                .cloned()
                .collect()
        };
        if !members.is_empty() {
            sections.push(Section {
                name: def.name.clone(),
                title: def.title.clone(),
                description: def.description.clone(),
                fields: members,
            });
        }
    }

    let leftovers: Vec<Field> = fields
        .into_iter()
        .filter(|f| !placed.contains(&f.name))
        .collect();
    for field in leftovers.iter().filter(|f| !f.section.is_empty()) {
        tracing::warn!(
            module,
            field = %field.name,
            section = %field.section,
            "Field names an undeclared section; showing it in the default section"
        );
    }
    if !leftovers.is_empty() {
        sections.insert(0, unnamed_section(leftovers));
    }
    sections
}

fn unnamed_section(fields: Vec<Field>) -> Section {
    Section {
        name: String::new(),
        title: String::new(),
        description: String::new(),
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_annotation_respects_parentheses() {
        assert_eq!(
            split_annotation("label=Timeout (seconds, max 300),min=1"),
            vec!["label=Timeout (seconds, max 300)", "min=1"]
        );
        assert_eq!(split_annotation("secret,,required"), vec!["secret", "", "required"]);
        assert!(split_annotation("").is_empty());
    }

    #[test]
    fn test_split_annotation_tolerates_unbalanced_close() {
        assert_eq!(split_annotation("a),b"), vec!["a)", "b"]);
    }

    #[test]
    fn test_split_camel_case() {
        assert_eq!(split_camel_case("SyncIntervalHours"), "Sync Interval Hours");
        assert_eq!(split_camel_case("APIKey"), "A P I Key");
        assert_eq!(split_camel_case("Name"), "Name");
        assert_eq!(split_camel_case(""), "");
    }

    #[test]
    fn test_module_name_validation() {
        assert!(validate_module_name("printer_fleet2").is_ok());
        assert!(validate_module_name("").is_err());
        assert!(validate_module_name("drop table").is_err());
        assert!(validate_module_name("a;b").is_err());
    }
}
