use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// A required field is absent or empty.
    #[error("`{0}` is required and cannot be empty")]
    MissingField(String),
    /// Two flows share the same `(flow_name, entity_name)` identity.
    #[error("duplicate entity `{entity_name}` in flow `{flow_name}`")]
    DuplicateEntity {
        flow_name: String,
        entity_name: String,
    },
    /// A file-backed component is missing its path.
    #[error("`{0}.path` must be set")]
    MissingPath(&'static str),
}

impl ValidationError {
    pub(crate) fn invalid(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}
