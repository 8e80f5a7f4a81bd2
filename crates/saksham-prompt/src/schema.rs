//! Declared shapes for flow inputs and outputs.
//!
//! The same declaration is sent to the provider as the expected answer shape
//! and used locally to check what comes back.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    /// A string of the form `data:<mime>;base64,<payload>`.
    DataUri,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
    pub optional: bool,
    pub nullable: bool,
    /// Inclusive numeric bounds.
    pub range: Option<(f64, f64)>,
}

impl FieldSpec {
    pub fn string(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            kind: FieldKind::String,
            description,
            optional: false,
            nullable: false,
            range: None,
        }
    }

    pub fn number(name: &'static str, description: &'static str) -> Self {
        Self {
            kind: FieldKind::Number,
            ..Self::string(name, description)
        }
    }

    pub fn data_uri(name: &'static str, description: &'static str) -> Self {
        Self {
            kind: FieldKind::DataUri,
            ..Self::string(name, description)
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }

    fn to_json_schema(&self) -> Value {
        let mut prop = json!({
            "type": match self.kind {
                FieldKind::Number => "number",
                FieldKind::String | FieldKind::DataUri => "string",
            },
            "description": self.description,
        });
        if self.nullable {
            prop["nullable"] = json!(true);
        }
        if let Some((min, max)) = self.range {
            prop["minimum"] = json!(min);
            prop["maximum"] = json!(max);
        }
        prop
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ObjectSchema {
    pub fields: Vec<FieldSpec>,
}

impl ObjectSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// JSON-schema object description, field order preserved.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            properties.insert(field.name.to_string(), field.to_json_schema());
        }
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check a JSON value against the schema, collecting every violation.
    /// Unknown extra fields are ignored.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<SchemaViolation>> {
        let object = match value.as_object() {
            Some(object) => object,
            None => {
                return Err(vec![SchemaViolation {
                    field: "$".to_string(),
                    message: "expected a JSON object".to_string(),
                }])
            }
        };

        let mut violations = Vec::new();
        let mut violation = |field: &FieldSpec, message: String| {
            violations.push(SchemaViolation {
                field: field.name.to_string(),
                message,
            })
        };

        for field in &self.fields {
            match object.get(field.name) {
                None if field.optional => {}
                None => violation(field, "is required".to_string()),
                Some(Value::Null) if field.nullable || field.optional => {}
                Some(Value::Null) => violation(field, "must not be null".to_string()),
                Some(value) => match field.kind {
                    FieldKind::String => {
                        if !value.is_string() {
                            violation(field, "expected a string".to_string());
                        }
                    }
                    FieldKind::DataUri => match value.as_str() {
                        Some(s) if saksham_common::DataUri::parse(s).is_ok() => {}
                        Some(_) => violation(field, "expected a base64 data URI".to_string()),
                        None => violation(field, "expected a string".to_string()),
                    },
                    FieldKind::Number => match value.as_f64() {
                        Some(n) => {
                            if let Some((min, max)) = field.range {
                                if !(min..=max).contains(&n) {
                                    violation(
                                        field,
                                        format!("{} is outside [{}, {}]", n, min, max),
                                    );
                                }
                            }
                        }
                        None => violation(field, "expected a number".to_string()),
                    },
                },
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
