//! Explicit schema validation for untyped JSON values.
//!
//! Plugins receive their per-plugin configuration as a raw
//! `serde_json::Value`; a `Schema` describes the expected shape and
//! `validate` reports every violation instead of stopping at the first.

use regex::Regex;
use serde_json::Value;

#[derive(Debug)]
pub struct Schema {
    fields: Vec<Field>,
    deny_unknown: bool,
}

#[derive(Debug)]
pub struct Field {
    name: String,
    required: bool,
    kind: FieldKind,
}

#[derive(Debug)]
pub enum FieldKind {
    String {
        min_len: Option<usize>,
        max_len: Option<usize>,
        pattern: Option<Regex>,
    },
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    Boolean,
    StringArray,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            deny_unknown: false,
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Reject keys not described by any field rule.
    pub fn deny_unknown(mut self) -> Self {
        self.deny_unknown = true;
        self
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Field {
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            kind: FieldKind::String {
                min_len: None,
                max_len: None,
                pattern: None,
            },
        }
    }

    pub fn integer(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            kind: FieldKind::Integer {
                min: None,
                max: None,
            },
        }
    }

    pub fn boolean(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            kind: FieldKind::Boolean,
        }
    }

    pub fn string_array(name: &str) -> Self {
        Self {
            name: name.to_string(),
            required: false,
            kind: FieldKind::StringArray,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn min_len(mut self, len: usize) -> Self {
        if let FieldKind::String { min_len, .. } = &mut self.kind {
            *min_len = Some(len);
        }
        self
    }

    pub fn max_len(mut self, len: usize) -> Self {
        if let FieldKind::String { max_len, .. } = &mut self.kind {
            *max_len = Some(len);
        }
        self
    }

    pub fn pattern(mut self, re: Regex) -> Self {
        if let FieldKind::String { pattern, .. } = &mut self.kind {
            *pattern = Some(re);
        }
        self
    }

    pub fn min(mut self, value: i64) -> Self {
        if let FieldKind::Integer { min, .. } = &mut self.kind {
            *min = Some(value);
        }
        self
    }

    pub fn max(mut self, value: i64) -> Self {
        if let FieldKind::Integer { max, .. } = &mut self.kind {
            *max = Some(value);
        }
        self
    }
}

pub fn validate(schema: &Schema, data: &Value) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let object = match data {
        // An absent config validates against a schema with no required fields
        Value::Null => {
            for field in &schema.fields {
                if field.required {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: "is required".to_string(),
                    });
                }
            }
            return if errors.is_empty() { Ok(()) } else { Err(errors) };
        }
        Value::Object(map) => map,
        other => {
            return Err(vec![ValidationError {
                field: "$".to_string(),
                message: format!("expected an object, got {}", type_name(other)),
            }]);
        }
    };

    for field in &schema.fields {
        match object.get(&field.name) {
            None | Some(Value::Null) => {
                if field.required {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: "is required".to_string(),
                    });
                }
            }
            Some(value) => check_field(field, value, &mut errors),
        }
    }

    if schema.deny_unknown {
        for key in object.keys() {
            if !schema.fields.iter().any(|f| &f.name == key) {
                errors.push(ValidationError {
                    field: key.clone(),
                    message: "unknown field".to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_field(field: &Field, value: &Value, errors: &mut Vec<ValidationError>) {
    match &field.kind {
        FieldKind::String {
            min_len,
            max_len,
            pattern,
        } => {
            let Some(s) = value.as_str() else {
                errors.push(type_error(field, "a string", value));
                return;
            };
            if let Some(min) = min_len {
                if s.chars().count() < *min {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: format!("must be at least {min} characters"),
                    });
                }
            }
            if let Some(max) = max_len {
                if s.chars().count() > *max {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: format!("must be at most {max} characters"),
                    });
                }
            }
            if let Some(re) = pattern {
                if !re.is_match(s) {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: format!("must match pattern {}", re.as_str()),
                    });
                }
            }
        }
        FieldKind::Integer { min, max } => {
            let Some(n) = value.as_i64() else {
                errors.push(type_error(field, "an integer", value));
                return;
            };
            if let Some(min) = min {
                if n < *min {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: format!("must be >= {min}"),
                    });
                }
            }
            if let Some(max) = max {
                if n > *max {
                    errors.push(ValidationError {
                        field: field.name.clone(),
                        message: format!("must be <= {max}"),
                    });
                }
            }
        }
        FieldKind::Boolean => {
            if !value.is_boolean() {
                errors.push(type_error(field, "a boolean", value));
            }
        }
        FieldKind::StringArray => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !item.is_string() {
                        errors.push(ValidationError {
                            field: format!("{}[{}]", field.name, i),
                            message: format!("expected a string, got {}", type_name(item)),
                        });
                    }
                }
            }
            None => errors.push(type_error(field, "an array of strings", value)),
        },
    }
}

fn type_error(field: &Field, expected: &str, value: &Value) -> ValidationError {
    ValidationError {
        field: field.name.clone(),
        message: format!("expected {expected}, got {}", type_name(value)),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new()
            .field(Field::string("key").required().min_len(4))
            .field(Field::integer("maxRequests").min(1).max(10_000))
            .field(Field::boolean("enabled"))
            .field(Field::string_array("exempt"))
    }

    #[test]
    fn test_valid_object_passes() {
        let data = json!({
            "key": "secret-token",
            "maxRequests": 50,
            "enabled": true,
            "exempt": ["/health"]
        });
        assert!(validate(&schema(), &data).is_ok());
    }

    #[test]
    fn test_missing_required_field() {
        let errors = validate(&schema(), &json!({})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "key");
        assert_eq!(errors[0].message, "is required");
    }

    #[test]
    fn test_null_value_counts_as_missing() {
        let errors = validate(&schema(), &json!({ "key": null })).unwrap_err();
        assert_eq!(errors[0].field, "key");
    }

    #[test]
    fn test_string_length_and_integer_bounds() {
        let errors = validate(
            &schema(),
            &json!({ "key": "abc", "maxRequests": 0 }),
        )
        .unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.field == "key"));
        assert!(errors.iter().any(|e| e.field == "maxRequests"));
    }

    #[test]
    fn test_pattern_rule() {
        let schema = Schema::new()
            .field(Field::string("path").required().pattern(Regex::new(r"^/").unwrap()));

        assert!(validate(&schema, &json!({ "path": "/metrics" })).is_ok());
        let errors = validate(&schema, &json!({ "path": "metrics" })).unwrap_err();
        assert_eq!(errors[0].field, "path");
    }

    #[test]
    fn test_wrong_types_reported() {
        let errors = validate(
            &schema(),
            &json!({ "key": 42, "enabled": "yes", "exempt": [1] }),
        )
        .unwrap_err();
        assert!(errors.iter().any(|e| e.field == "key"));
        assert!(errors.iter().any(|e| e.field == "enabled"));
        assert!(errors.iter().any(|e| e.field == "exempt[0]"));
    }

    #[test]
    fn test_deny_unknown_keys() {
        let schema = Schema::new().field(Field::string("key")).deny_unknown();
        let errors = validate(&schema, &json!({ "kye": "typo" })).unwrap_err();
        assert_eq!(errors[0].field, "kye");
        assert_eq!(errors[0].message, "unknown field");
    }

    #[test]
    fn test_null_config_with_no_required_fields() {
        let schema = Schema::new().field(Field::integer("maxRequests"));
        assert!(validate(&schema, &Value::Null).is_ok());
    }

    #[test]
    fn test_non_object_rejected() {
        let errors = validate(&schema(), &json!([1, 2, 3])).unwrap_err();
        assert_eq!(errors[0].field, "$");
    }
}
