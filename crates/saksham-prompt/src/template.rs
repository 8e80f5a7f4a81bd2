//! Natural-language prompt templates with named placeholders.
//!
//! `{{{field}}}` or `{{field}}` is replaced by the text value of `field`;
//! `{{media url=field}}` embeds the data URI in `field` as an inline media part.

use saksham_common::{DataUri, DataUriError};
use saksham_llm::Part;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template '{template}': unclosed tag at byte {offset}")]
    UnclosedTag { template: String, offset: usize },

    #[error("template '{template}': unsupported tag '{tag}'")]
    UnsupportedTag { template: String, tag: String },

    #[error("template '{template}': media field '{field}' has no value")]
    MissingMedia { template: String, field: String },

    #[error("template '{template}': field '{field}' is not a valid data URI: {source}")]
    InvalidMedia {
        template: String,
        field: String,
        #[source]
        source: DataUriError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
    Media(String),
}

/// A value bound to a placeholder name.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptValue {
    Text(String),
    /// A `data:` URI string, decoded only when the template embeds it.
    DataUri(String),
}

pub type PromptValues = BTreeMap<&'static str, PromptValue>;

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    name: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template once; rendering never re-parses.
    pub fn parse(name: &str, source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut rest = source;
        let mut consumed = 0;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }

            let triple = rest[start..].starts_with("{{{");
            let (open, close) = if triple { ("{{{", "}}}") } else { ("{{", "}}") };
            let body_start = start + open.len();
            let body_len = rest[body_start..]
                .find(close)
                .ok_or_else(|| TemplateError::UnclosedTag {
                    template: name.to_string(),
                    offset: consumed + start,
                })?;

            let tag = rest[body_start..body_start + body_len].trim();
            segments.push(parse_tag(name, tag, triple)?);

            let advance = body_start + body_len + close.len();
            consumed += advance;
            rest = &rest[advance..];
        }

        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            name: name.to_string(),
            segments,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field names referenced by the template, in order of first appearance.
    pub fn placeholders(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for segment in &self.segments {
            if let Segment::Field(name) | Segment::Media(name) = segment {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Substitute `values` into the template.
    ///
    /// Text placeholders without a value render as empty text, matching how an
    /// absent optional field reads in the prompt. Media placeholders must be bound.
    pub fn render(&self, values: &PromptValues) -> Result<Vec<Part>, TemplateError> {
        let mut parts = Vec::new();
        let mut text = String::new();

        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => text.push_str(literal),
                Segment::Field(field) => match values.get(field.as_str()) {
                    Some(PromptValue::Text(value)) | Some(PromptValue::DataUri(value)) => {
                        text.push_str(value)
                    }
                    None => {}
                },
                Segment::Media(field) => {
                    let raw = match values.get(field.as_str()) {
                        Some(PromptValue::DataUri(raw)) | Some(PromptValue::Text(raw)) => raw,
                        None => {
                            return Err(TemplateError::MissingMedia {
                                template: self.name.clone(),
                                field: field.clone(),
                            })
                        }
                    };
                    let media =
                        DataUri::parse(raw).map_err(|source| TemplateError::InvalidMedia {
                            template: self.name.clone(),
                            field: field.clone(),
                            source,
                        })?;

                    if !text.is_empty() {
                        parts.push(Part::Text(std::mem::take(&mut text)));
                    }
                    parts.push(Part::Media {
                        mime_type: media.mime_type.clone(),
                        data: media.base64_payload(),
                    });
                }
            }
        }

        if !text.is_empty() {
            parts.push(Part::Text(text));
        }

        debug!("Rendered template '{}' into {} part(s)", self.name, parts.len());
        Ok(parts)
    }
}

fn parse_tag(template: &str, tag: &str, triple: bool) -> Result<Segment, TemplateError> {
    let unsupported = || TemplateError::UnsupportedTag {
        template: template.to_string(),
        tag: tag.to_string(),
    };

    if !triple {
        if let Some(args) = tag.strip_prefix("media ") {
            let field = args.trim().strip_prefix("url=").ok_or_else(unsupported)?;
            return if is_identifier(field) {
                Ok(Segment::Media(field.to_string()))
            } else {
                Err(unsupported())
            };
        }
    }

    if is_identifier(tag) {
        Ok(Segment::Field(tag.to_string()))
    } else {
        Err(unsupported())
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}
