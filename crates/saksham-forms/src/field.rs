use crate::Upload;
use serde::Serialize;
use std::collections::BTreeMap;

/// A constraint on one field. Each carries the message shown when it fails.
#[derive(Debug, Clone)]
pub enum Rule {
    MinLength { min: usize, message: &'static str },
    SingleFile { message: &'static str },
    MimePrefix { prefix: &'static str, message: &'static str },
    MaxBytes { max: u64, message: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    LongText,
    OptionalText,
    File,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: &'static str,
    pub label: &'static str,
    pub placeholder: &'static str,
    pub kind: FieldKind,
    /// Accepted content types hint for file pickers, e.g. `image/*`.
    pub accept: Option<&'static str>,
    pub rules: Vec<Rule>,
}

impl FieldDef {
    pub fn text(name: &'static str, label: &'static str, placeholder: &'static str) -> Self {
        Self {
            name,
            label,
            placeholder,
            kind: FieldKind::Text,
            accept: None,
            rules: Vec::new(),
        }
    }

    pub fn long_text(name: &'static str, label: &'static str, placeholder: &'static str) -> Self {
        Self {
            kind: FieldKind::LongText,
            ..Self::text(name, label, placeholder)
        }
    }

    pub fn optional_text(name: &'static str, label: &'static str, placeholder: &'static str) -> Self {
        Self {
            kind: FieldKind::OptionalText,
            ..Self::text(name, label, placeholder)
        }
    }

    pub fn file(name: &'static str, label: &'static str) -> Self {
        Self {
            kind: FieldKind::File,
            ..Self::text(name, label, "")
        }
    }

    pub fn accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }

    pub fn min_length(mut self, min: usize, message: &'static str) -> Self {
        self.rules.push(Rule::MinLength { min, message });
        self
    }

    pub fn single_file(mut self, message: &'static str) -> Self {
        self.rules.push(Rule::SingleFile { message });
        self
    }

    pub fn mime_prefix(mut self, prefix: &'static str, message: &'static str) -> Self {
        self.rules.push(Rule::MimePrefix { prefix, message });
        self
    }

    pub fn max_bytes(mut self, max: u64, message: &'static str) -> Self {
        self.rules.push(Rule::MaxBytes { max, message });
        self
    }
}

/// A value as the user entered it, before any checks.
#[derive(Debug, Clone)]
pub enum RawValue {
    Text(String),
    Files(Vec<Upload>),
}

#[derive(Debug, Clone, Default)]
pub struct RawForm {
    values: BTreeMap<String, RawValue>,
}

impl RawForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.insert(name, RawValue::Text(value.into()));
        self
    }

    pub fn file(mut self, name: &str, upload: Upload) -> Self {
        self.add_file(name, upload);
        self
    }

    pub fn insert(&mut self, name: &str, value: RawValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Append a file to a file field, keeping any already selected.
    pub fn add_file(&mut self, name: &str, upload: Upload) {
        match self.values.get_mut(name) {
            Some(RawValue::Files(files)) => files.push(upload),
            _ => {
                self.values
                    .insert(name.to_string(), RawValue::Files(vec![upload]));
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&RawValue> {
        self.values.get(name)
    }

    fn text_value(&self, name: &str) -> &str {
        match self.values.get(name) {
            Some(RawValue::Text(text)) => text.as_str(),
            _ => "",
        }
    }

    fn files(&self, name: &str) -> &[Upload] {
        match self.values.get(name) {
            Some(RawValue::Files(files)) => files.as_slice(),
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub Vec<FieldError>);

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.iter().find(|e| e.field == field).map(|e| e.message)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

/// Field values that passed every rule.
#[derive(Debug, Clone, Default)]
pub struct ValidatedForm {
    texts: BTreeMap<&'static str, String>,
    files: BTreeMap<&'static str, Upload>,
}

impl ValidatedForm {
    pub fn text(&self, name: &str) -> String {
        self.texts.get(name).cloned().unwrap_or_default()
    }

    /// `None` when the optional field was left blank.
    pub fn optional_text(&self, name: &str) -> Option<String> {
        self.texts.get(name).cloned()
    }

    pub fn file(&self, name: &str) -> Option<&Upload> {
        self.files.get(name)
    }
}

fn first_failure(rules: &[Rule], text: &str, files: &[Upload]) -> Option<&'static str> {
    for rule in rules {
        let failed = match rule {
            Rule::MinLength { min, .. } => text.chars().count() < *min,
            Rule::SingleFile { .. } => files.len() != 1,
            Rule::MimePrefix { prefix, .. } => !files
                .first()
                .is_some_and(|f| f.content_type.starts_with(prefix)),
            Rule::MaxBytes { max, .. } => !files.first().is_some_and(|f| f.size <= *max),
        };
        if failed {
            return Some(match rule {
                Rule::MinLength { message, .. }
                | Rule::SingleFile { message }
                | Rule::MimePrefix { message, .. }
                | Rule::MaxBytes { message, .. } => *message,
            });
        }
    }
    None
}

/// Check every field. Either all fields pass and the values are returned, or
/// nothing is accepted and each failing field reports its first failed rule.
pub fn validate(fields: &[FieldDef], raw: &RawForm) -> Result<ValidatedForm, FieldErrors> {
    let mut errors = Vec::new();
    let mut validated = ValidatedForm::default();

    for field in fields {
        let text = raw.text_value(field.name);
        let files = raw.files(field.name);

        if let Some(message) = first_failure(&field.rules, text, files) {
            errors.push(FieldError {
                field: field.name,
                message,
            });
            continue;
        }

        match field.kind {
            FieldKind::Text | FieldKind::LongText => {
                validated.texts.insert(field.name, text.to_string());
            }
            FieldKind::OptionalText => {
                if !text.trim().is_empty() {
                    validated.texts.insert(field.name, text.to_string());
                }
            }
            FieldKind::File => {
                if let Some(upload) = files.first() {
                    validated.files.insert(field.name, upload.clone());
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(validated)
    } else {
        Err(FieldErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields() -> Vec<FieldDef> {
        vec![
            FieldDef::text("crop", "Crop Name", "").min_length(2, "Crop name is required."),
            FieldDef::optional_text("note", "Note", ""),
            FieldDef::file("photo", "Photo")
                .single_file("Image is required.")
                .mime_prefix("image/", "Must be an image file.")
                .max_bytes(10, "Too big."),
        ]
    }

    #[test]
    fn test_accepts_valid_form() {
        let raw = RawForm::new()
            .text("crop", "Rice")
            .text("note", "   ")
            .file("photo", Upload::from_bytes("a.png", "image/png", vec![0; 10]));
        let validated = validate(&fields(), &raw).unwrap();
        assert_eq!(validated.text("crop"), "Rice");
        assert_eq!(validated.optional_text("note"), None);
        assert_eq!(validated.file("photo").unwrap().file_name, "a.png");
    }

    #[test]
    fn test_never_partially_accepts() {
        let raw = RawForm::new()
            .text("crop", "Rice")
            .file("photo", Upload::from_bytes("a.txt", "text/plain", vec![0; 3]));
        let errors = validate(&fields(), &raw).unwrap_err();
        assert_eq!(
            errors.0,
            vec![FieldError {
                field: "photo",
                message: "Must be an image file."
            }]
        );
    }

    #[test]
    fn test_reports_first_failing_rule_per_field() {
        let errors = validate(&fields(), &RawForm::new()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.get("crop"), Some("Crop name is required."));
        assert_eq!(errors.get("photo"), Some("Image is required."));
        assert_eq!(errors.get("note"), None);
    }

    #[test]
    fn test_min_length_counts_characters() {
        let raw = RawForm::new()
            .text("crop", "धान")
            .file("photo", Upload::from_bytes("a.png", "image/png", vec![]));
        assert!(validate(&fields(), &raw).is_ok());

        let raw = RawForm::new()
            .text("crop", "ध")
            .file("photo", Upload::from_bytes("a.png", "image/png", vec![]));
        assert!(validate(&fields(), &raw).is_err());
    }

    #[test]
    fn test_more_than_one_file_is_rejected() {
        let raw = RawForm::new()
            .text("crop", "Rice")
            .file("photo", Upload::from_bytes("a.png", "image/png", vec![]))
            .file("photo", Upload::from_bytes("b.png", "image/png", vec![]));
        let errors = validate(&fields(), &raw).unwrap_err();
        assert_eq!(errors.get("photo"), Some("Image is required."));
    }

    #[test]
    fn test_size_ceiling() {
        let raw = RawForm::new()
            .text("crop", "Rice")
            .file("photo", Upload::from_bytes("a.png", "image/png", vec![0; 11]));
        let errors = validate(&fields(), &raw).unwrap_err();
        assert_eq!(errors.get("photo"), Some("Too big."));
    }
}
