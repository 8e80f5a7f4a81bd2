mod schema;
mod template;

pub use schema::{FieldKind, FieldSpec, ObjectSchema, SchemaViolation};
pub use template::{PromptTemplate, PromptValue, PromptValues, TemplateError};
