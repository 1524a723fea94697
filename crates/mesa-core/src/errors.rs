//! Structured error types shared across MESA crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`MesaError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the MESA engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum MesaError {
    /// Habitat and deme graph structural errors.
    #[error("domain error: {0}")]
    Domain(ErrorInfo),
    /// Observed dissimilarity data errors.
    #[error("data error: {0}")]
    Data(ErrorInfo),
    /// Run configuration errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Numerical linear algebra errors.
    #[error("numeric error: {0}")]
    Numeric(ErrorInfo),
    /// Checkpoint integrity errors.
    #[error("checkpoint error: {0}")]
    Checkpoint(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl MesaError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            MesaError::Domain(info)
            | MesaError::Data(info)
            | MesaError::Config(info)
            | MesaError::Numeric(info)
            | MesaError::Checkpoint(info)
            | MesaError::Serde(info) => info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context_and_hint() {
        let err = MesaError::Data(
            ErrorInfo::new("asymmetric-matrix", "dissimilarity matrix is not symmetric")
                .with_context("row", "3")
                .with_context("col", "7")
                .with_hint("check the input parser"),
        );
        let rendered = err.to_string();
        assert!(rendered.contains("asymmetric-matrix"));
        assert!(rendered.contains("row=3"));
        assert!(rendered.contains("hint: check the input parser"));
    }

    #[test]
    fn error_payload_round_trips_through_json() {
        let err = MesaError::Config(ErrorInfo::new("bad-df-bounds", "df lower bound too small"));
        let encoded = serde_json::to_string(&err).expect("serialize");
        let decoded: MesaError = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(err, decoded);
    }
}
