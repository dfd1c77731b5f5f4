//! Error handling module for the device wizard
//!
//! Two layers, both built on thiserror:
//! - [`WizardError`] covers document decoding and whole-document validation.
//! - [`EditError`] covers rejected edits in an [`crate::session::EditorSession`].
//!   Its `Display` text doubles as the status line shown to the operator.

use thiserror::Error;

use crate::types::TemplateKind;

/// Main error type for the device wizard
#[derive(Error, Debug)]
pub enum WizardError {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document shape errors (not an object, missing devices, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration that failed validation
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for wizard operations
pub type Result<T> = std::result::Result<T, WizardError>;

impl WizardError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// An edit the session refused to apply
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// A bounded list is already full
    #[error("{what} limit reached")]
    LimitReached { what: &'static str, limit: usize },

    /// The operation targets a template the device does not carry
    #[error("Device template is not {}", .expected.label())]
    TemplateMismatch {
        expected: TemplateKind,
        found: Option<TemplateKind>,
    },

    /// No device or scenario is selected, or the target index does not exist
    #[error("Nothing selected")]
    NoSelection,

    /// A load or save request is still outstanding
    #[error("Busy")]
    Busy,

    /// Save was requested while validation errors remain
    #[error("Fix {0} validation error(s) before saving")]
    Invalid(usize),
}
