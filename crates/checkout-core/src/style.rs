//! Style Validation
//!
//! Validates the button/installment style object before a session is created.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Style configuration supplied by the host page
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleConfig {
    /// Installment display options
    #[serde(default)]
    pub installments: Option<InstallmentsStyle>,
}

/// Installment options inside a style
///
/// The term is kept as a raw JSON value: hosts routinely pass strings or
/// floats here and each shape gets its own error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentsStyle {
    #[serde(default)]
    pub display: Option<bool>,

    #[serde(default)]
    pub fixed_installments: Option<bool>,

    #[serde(default)]
    pub fixed_installments_term: Option<Value>,
}

impl StyleConfig {
    /// Style with installments displayed at a fixed term
    pub fn fixed_installments(term: impl Into<Value>) -> Self {
        Self {
            installments: Some(InstallmentsStyle {
                display: Some(true),
                fixed_installments: Some(true),
                fixed_installments_term: Some(term.into()),
            }),
        }
    }

    /// Parse from an arbitrary JSON value
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// Validate a style object.
///
/// When `installments.display` is falsy nothing else is inspected, even if the
/// remaining installment fields are malformed.
pub fn validate_style(style: Option<&StyleConfig>) -> Result<(), ConfigError> {
    let style = style.ok_or(ConfigError::MissingStyle)?;

    let Some(installments) = &style.installments else {
        return Ok(());
    };

    if !installments.display.unwrap_or(false) {
        return Ok(());
    }

    if !installments.fixed_installments.unwrap_or(false) {
        return Ok(());
    }

    let term = match &installments.fixed_installments_term {
        None | Some(Value::Null) => return Err(ConfigError::MissingTerm),
        Some(term) => term,
    };

    let Value::Number(number) = term else {
        return Err(ConfigError::TermNotNumeric(term.to_string()));
    };

    if let Some(n) = number.as_i64() {
        return if n >= 1 {
            Ok(())
        } else {
            Err(ConfigError::TermOutOfRange(number.to_string()))
        };
    }

    if number.as_u64().is_some() {
        return Ok(());
    }

    match number.as_f64() {
        Some(f) if f.fract() != 0.0 || !f.is_finite() => {
            Err(ConfigError::TermNotInteger(number.to_string()))
        }
        Some(f) if f >= 1.0 => Ok(()),
        _ => Err(ConfigError::TermOutOfRange(number.to_string())),
    }
}
