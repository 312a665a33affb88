// ABOUTME: Server-computed form state: per-field value, validity and visibility keyed by path
// ABOUTME: Resolves schema paths to field definitions and validates submitted values against them

use crate::config::{Config, FieldConfig, FieldKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Schema path segment between a rich-text field and one of its block slugs
pub const BLOCKS_SCHEMA_SEGMENT: &str =
    "lexical_internal_feature.blocks.lexical_blocks.lexical_blocks";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Snapshot of a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    #[serde(default)]
    pub initial_value: Value,
    pub passes_condition: bool,
    pub valid: bool,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Field path -> field snapshot; ordered so responses are stable
pub type FormState = BTreeMap<String, FieldState>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
}

/// Body of a form-state request; carries either raw `data` or a previous `formState`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_state: Option<FormState>,
    pub operation: Operation,
    pub schema_path: String,
}

/// Where field values come from when building a form state
#[derive(Debug, Clone, Copy)]
pub enum FormStateSource<'a> {
    /// Document data; values become both the initial and the current value
    Data(&'a Map<String, Value>),
    /// A previous snapshot; current values are re-validated, initial values kept
    Previous(&'a FormState),
}

/// Schema path -> field definitions, built once from the config
#[derive(Debug, Clone, Default)]
pub struct FieldSchemaMap {
    entries: HashMap<String, Vec<FieldConfig>>,
}

impl FieldSchemaMap {
    pub fn from_config(config: &Config) -> Self {
        let mut map = Self::default();
        for collection in &config.collections {
            map.insert_fields(&collection.slug, &collection.fields);
        }
        for global in &config.globals {
            map.insert_fields(&global.slug, &global.fields);
        }
        map
    }

    fn insert_fields(&mut self, prefix: &str, fields: &[FieldConfig]) {
        self.entries.insert(prefix.to_string(), fields.to_vec());
        for field in fields {
            let field_path = format!("{}.{}", prefix, field.name);
            self.entries
                .insert(field_path.clone(), vec![field.clone()]);
            if field.kind == FieldKind::RichText {
                for block in &field.blocks {
                    let block_path =
                        format!("{}.{}.{}", field_path, BLOCKS_SCHEMA_SEGMENT, block.slug);
                    self.insert_fields(&block_path, &block.fields);
                }
            }
        }
    }

    pub fn get(&self, schema_path: &str) -> Option<&[FieldConfig]> {
        self.entries.get(schema_path).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Answer a form-state request; `None` when the schema path is unknown.
    /// A previous form state wins over `data`.
    pub fn form_state_for(&self, request: &FormStateRequest) -> Option<FormState> {
        let fields = self.get(&request.schema_path)?;
        let empty = Map::new();
        let source = match (&request.form_state, &request.data) {
            (Some(previous), _) => FormStateSource::Previous(previous),
            (None, Some(data)) => FormStateSource::Data(data),
            (None, None) => FormStateSource::Data(&empty),
        };
        Some(build_form_state(fields, source))
    }
}

/// Compute the form state for `fields` from `source`
pub fn build_form_state(fields: &[FieldConfig], source: FormStateSource<'_>) -> FormState {
    let resolved: Vec<(&FieldConfig, Value, Value)> = fields
        .iter()
        .map(|field| {
            let (initial, value) = match source {
                FormStateSource::Data(data) => {
                    let value = data
                        .get(&field.name)
                        .cloned()
                        .or_else(|| field.default_value.clone())
                        .unwrap_or(Value::Null);
                    (value.clone(), value)
                }
                FormStateSource::Previous(previous) => match previous.get(&field.name) {
                    Some(state) => (state.initial_value.clone(), state.value.clone()),
                    None => {
                        let value = field.default_value.clone().unwrap_or(Value::Null);
                        (value.clone(), value)
                    }
                },
            };
            (field, initial, value)
        })
        .collect();

    let siblings: HashMap<&str, &Value> = resolved
        .iter()
        .map(|(field, _, value)| (field.name.as_str(), value))
        .collect();

    resolved
        .iter()
        .map(|(field, initial_value, value)| {
            let passes_condition = field.condition.as_ref().map_or(true, |condition| {
                siblings
                    .get(condition.field.as_str())
                    .is_some_and(|sibling| **sibling == condition.equals)
            });
            let error_message = if passes_condition {
                validate_field(field, value).err()
            } else {
                None
            };
            (
                field.name.clone(),
                FieldState {
                    initial_value: initial_value.clone(),
                    passes_condition,
                    valid: error_message.is_none(),
                    value: value.clone(),
                    error_message,
                },
            )
        })
        .collect()
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Text shown for a stored value in a form control; null renders empty
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Validate one value against its field definition
pub fn validate_field(field: &FieldConfig, value: &Value) -> Result<(), String> {
    if is_empty_value(value) {
        if field.required && field.kind != FieldKind::Checkbox {
            return Err("This field is required.".to_string());
        }
        return Ok(());
    }

    match field.kind {
        FieldKind::Text | FieldKind::Textarea => {
            let text = value
                .as_str()
                .ok_or_else(|| "This field must be text.".to_string())?;
            let len = text.chars().count();
            if let Some(min) = field.min_length {
                if len < min {
                    return Err(format!("This value must be at least {} characters.", min));
                }
            }
            if let Some(max) = field.max_length {
                if len > max {
                    return Err(format!("This value must be at most {} characters.", max));
                }
            }
            Ok(())
        }
        FieldKind::Email => match value.as_str() {
            Some(email) if is_valid_email(email) => Ok(()),
            _ => Err("Please enter a valid email address.".to_string()),
        },
        FieldKind::Number => {
            let number = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }
            .ok_or_else(|| "This field must be a number.".to_string())?;
            if let Some(min) = field.min {
                if number < min {
                    return Err(format!("This value must be at least {}.", min));
                }
            }
            if let Some(max) = field.max {
                if number > max {
                    return Err(format!("This value must be at most {}.", max));
                }
            }
            Ok(())
        }
        FieldKind::Checkbox => match value {
            Value::Bool(checked) => {
                if field.required && !checked {
                    Err("This field is required.".to_string())
                } else {
                    Ok(())
                }
            }
            _ => Err("This field must be true or false.".to_string()),
        },
        FieldKind::Select => match value.as_str() {
            Some(option) if field.options.iter().any(|o| o == option) => Ok(()),
            _ => Err("This field has an invalid selection.".to_string()),
        },
        FieldKind::RichText => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldCondition;
    use serde_json::json;

    fn field(name: &str, kind: FieldKind) -> FieldConfig {
        FieldConfig {
            name: name.to_string(),
            kind,
            label: None,
            required: false,
            default_value: None,
            min_length: None,
            max_length: None,
            min: None,
            max: None,
            options: Vec::new(),
            condition: None,
            blocks: Vec::new(),
        }
    }

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_text_missing_is_invalid() {
        let mut title = field("title", FieldKind::Text);
        title.required = true;
        let state = build_form_state(&[title], FormStateSource::Data(&Map::new()));
        let title_state = &state["title"];
        assert!(!title_state.valid);
        assert!(title_state.passes_condition);
        assert_eq!(title_state.value, Value::Null);
        assert_eq!(
            title_state.error_message.as_deref(),
            Some("This field is required.")
        );
    }

    #[test]
    fn test_data_source_sets_initial_and_current_value() {
        let state = build_form_state(
            &[field("title", FieldKind::Text)],
            FormStateSource::Data(&data(json!({"title": "Hello"}))),
        );
        assert_eq!(state["title"].initial_value, json!("Hello"));
        assert_eq!(state["title"].value, json!("Hello"));
        assert!(state["title"].valid);
    }

    #[test]
    fn test_default_value_used_when_data_missing() {
        let mut count = field("count", FieldKind::Number);
        count.default_value = Some(json!(3));
        let state = build_form_state(&[count], FormStateSource::Data(&Map::new()));
        assert_eq!(state["count"].value, json!(3));
    }

    #[test]
    fn test_previous_source_keeps_initial_value() {
        let mut previous = FormState::new();
        previous.insert(
            "title".to_string(),
            FieldState {
                initial_value: json!("Before"),
                passes_condition: true,
                valid: true,
                value: json!(""),
                error_message: None,
            },
        );
        let mut title = field("title", FieldKind::Text);
        title.required = true;
        let state = build_form_state(&[title], FormStateSource::Previous(&previous));
        assert_eq!(state["title"].initial_value, json!("Before"));
        assert_eq!(state["title"].value, json!(""));
        assert!(!state["title"].valid);
    }

    #[test]
    fn test_unknown_keys_in_previous_state_are_dropped() {
        let mut previous = FormState::new();
        previous.insert(
            "blockName".to_string(),
            FieldState {
                initial_value: json!(""),
                passes_condition: true,
                valid: true,
                value: json!("Intro"),
                error_message: None,
            },
        );
        let state = build_form_state(
            &[field("title", FieldKind::Text)],
            FormStateSource::Previous(&previous),
        );
        assert!(!state.contains_key("blockName"));
        assert!(state.contains_key("title"));
    }

    #[test]
    fn test_condition_hides_and_skips_validation() {
        let kind = {
            let mut f = field("kind", FieldKind::Select);
            f.options = vec!["link".to_string(), "text".to_string()];
            f
        };
        let url = {
            let mut f = field("url", FieldKind::Text);
            f.required = true;
            f.condition = Some(FieldCondition {
                field: "kind".to_string(),
                equals: json!("link"),
            });
            f
        };
        let fields = vec![kind, url];

        let hidden = build_form_state(&fields, FormStateSource::Data(&data(json!({"kind": "text"}))));
        assert!(!hidden["url"].passes_condition);
        assert!(hidden["url"].valid);

        let shown = build_form_state(&fields, FormStateSource::Data(&data(json!({"kind": "link"}))));
        assert!(shown["url"].passes_condition);
        assert!(!shown["url"].valid);
    }

    #[test]
    fn test_identical_data_yields_identical_keys() {
        let fields = vec![
            field("title", FieldKind::Text),
            field("count", FieldKind::Number),
            field("published", FieldKind::Checkbox),
        ];
        let input = data(json!({"title": "A", "count": 2}));
        let first = build_form_state(&fields, FormStateSource::Data(&input));
        let second = build_form_state(&fields, FormStateSource::Data(&input));
        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            second.keys().collect::<Vec<_>>()
        );
        assert_eq!(first, second);
    }

    #[test]
    fn test_form_state_for_prefers_previous_state() {
        let mut config = Config::default();
        config.collections.push(crate::config::CollectionConfig {
            slug: "posts".to_string(),
            labels: Default::default(),
            auth: None,
            hidden: false,
            fields: vec![field("title", FieldKind::Text)],
        });
        let map = FieldSchemaMap::from_config(&config);

        let mut previous = FormState::new();
        previous.insert(
            "title".to_string(),
            FieldState {
                initial_value: json!("Old"),
                passes_condition: true,
                valid: true,
                value: json!("New"),
                error_message: None,
            },
        );
        let request = FormStateRequest {
            id: None,
            data: Some(data(json!({"title": "Ignored"}))),
            form_state: Some(previous),
            operation: Operation::Update,
            schema_path: "posts".to_string(),
        };
        let state = map.form_state_for(&request).unwrap();
        assert_eq!(state["title"].value, json!("New"));
        assert_eq!(state["title"].initial_value, json!("Old"));

        let unknown = FormStateRequest {
            schema_path: "missing".to_string(),
            ..request
        };
        assert!(map.form_state_for(&unknown).is_none());
    }

    #[test]
    fn test_validate_text_length() {
        let mut f = field("slug", FieldKind::Text);
        f.min_length = Some(3);
        f.max_length = Some(5);
        assert!(validate_field(&f, &json!("ab")).is_err());
        assert!(validate_field(&f, &json!("abcd")).is_ok());
        assert!(validate_field(&f, &json!("abcdef")).is_err());
        assert!(validate_field(&f, &json!(12)).is_err());
    }

    #[test]
    fn test_validate_number_bounds_and_strings() {
        let mut f = field("rating", FieldKind::Number);
        f.min = Some(1.0);
        f.max = Some(5.0);
        assert!(validate_field(&f, &json!(3)).is_ok());
        assert!(validate_field(&f, &json!("4.5")).is_ok());
        assert!(validate_field(&f, &json!(0)).is_err());
        assert!(validate_field(&f, &json!(6)).is_err());
        assert!(validate_field(&f, &json!("many")).is_err());
    }

    #[test]
    fn test_validate_email() {
        let f = field("email", FieldKind::Email);
        assert!(validate_field(&f, &json!("dev@example.com")).is_ok());
        assert!(validate_field(&f, &json!("not-an-email")).is_err());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&Value::Null), "");
        assert_eq!(display_value(&json!("Be water")), "Be water");
        assert_eq!(display_value(&json!(42)), "42");
        assert_eq!(display_value(&json!(true)), "true");
    }

    #[test]
    fn test_validate_select_and_checkbox() {
        let mut select = field("color", FieldKind::Select);
        select.options = vec!["red".to_string()];
        assert!(validate_field(&select, &json!("red")).is_ok());
        assert!(validate_field(&select, &json!("blue")).is_err());

        let mut checkbox = field("agree", FieldKind::Checkbox);
        assert!(validate_field(&checkbox, &json!(false)).is_ok());
        assert!(validate_field(&checkbox, &json!("yes")).is_err());
        checkbox.required = true;
        assert!(validate_field(&checkbox, &json!(false)).is_err());
        assert!(validate_field(&checkbox, &json!(true)).is_ok());
    }

    #[test]
    fn test_schema_map_exposes_block_fields() {
        let config = Config::from_toml_str(
            r#"
[[collections]]
slug = "users"
auth = {}

[[collections]]
slug = "posts"

[[collections.fields]]
name = "title"
type = "text"

[[collections.fields]]
name = "content"
type = "richText"

[[collections.fields.blocks]]
slug = "quote"

[[collections.fields.blocks.fields]]
name = "text"
type = "text"
"#,
        )
        .unwrap();
        let map = FieldSchemaMap::from_config(&config);

        assert_eq!(map.get("posts").map(<[_]>::len), Some(2));
        assert_eq!(map.get("posts.title").map(<[_]>::len), Some(1));
        let block_path = format!("posts.content.{}.quote", BLOCKS_SCHEMA_SEGMENT);
        let block_fields = map.get(&block_path).unwrap();
        assert_eq!(block_fields[0].name, "text");
        assert!(map.get("posts.content.unknown").is_none());
    }

    #[test]
    fn test_request_wire_format() {
        let request = FormStateRequest {
            id: Some("doc-1".to_string()),
            data: Some(data(json!({"text": "hi"}))),
            form_state: None,
            operation: Operation::Update,
            schema_path: "posts.content".to_string(),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["operation"], json!("update"));
        assert_eq!(encoded["schemaPath"], json!("posts.content"));
        assert!(encoded.get("formState").is_none());
    }
}
