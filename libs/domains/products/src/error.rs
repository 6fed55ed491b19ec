use serde::Serialize;
use strum::{Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

use crate::models::ProductId;

/// Kind of a single field-level violation
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViolationKind {
    /// A required field is absent
    MissingField,
    /// A required text field is present but blank
    EmptyField,
    /// A field is present but has the wrong type
    TypeMismatch,
    /// A numeric field is negative
    RangeViolation,
    /// A text field exceeds its configured length
    TooLong,
    /// The image URL is not an absolute http(s) URL on an accepted host
    InvalidUrl,
    /// An image reference lacks one or more of its sub-fields
    PartialImageRef,
    /// An update payload touches a system-assigned field
    ImmutableFieldModification,
    /// A key that the schema does not know about (strict policy only)
    UnknownField,
    /// A product id that is not 24 hex digits
    InvalidIdentifier,
}

/// A single field-level problem found in a candidate input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Violation {
    /// Path of the offending field, e.g. `price` or `imagery.url`
    pub field: String,
    pub kind: ViolationKind,
    /// Human-readable explanation
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Aggregated validation failure. Always holds at least one violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationFailed {
    pub violations: Vec<Violation>,
}

impl ValidationFailed {
    /// Turns a collected list into a failure, or `None` when nothing was found.
    pub fn from_violations(violations: Vec<Violation>) -> Option<Self> {
        if violations.is_empty() {
            None
        } else {
            Some(Self { violations })
        }
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether a violation of `kind` was reported for `field`
    pub fn has(&self, field: &str, kind: ViolationKind) -> bool {
        self.violations
            .iter()
            .any(|v| v.field == field && v.kind == kind)
    }

    /// Violations of a given kind, in the order they were found
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

impl std::fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} violation(s)", self.violations.len())?;
        for v in &self.violations {
            write!(f, "; {} ({}): {}", v.field, v.kind, v.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailed {}

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Validation failed: {0}")]
    Validation(ValidationFailed),

    /// The caller handed over something that is not a structured mapping at all
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Product not found: {0}")]
    NotFound(ProductId),

    #[error("Update timestamp would regress for product {0}")]
    TimestampRegression(ProductId),

    #[error("Repository error: {0}")]
    Repository(String),

    #[error("Image store error: {0}")]
    ImageStore(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

impl From<ValidationFailed> for ProductError {
    fn from(failed: ValidationFailed) -> Self {
        ProductError::Validation(failed)
    }
}

impl ProductError {
    /// The violations carried by a validation failure, if this is one
    pub fn violations(&self) -> Option<&ValidationFailed> {
        match self {
            ProductError::Validation(failed) => Some(failed),
            _ => None,
        }
    }
}
