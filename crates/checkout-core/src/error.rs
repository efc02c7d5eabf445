//! Error Types

use thiserror::Error;

/// Result type alias for checkout operations
pub type Result<T> = std::result::Result<T, CheckoutError>;

/// Style / installment configuration errors
///
/// Each variant carries its own wording so callers can branch on the
/// failure class without parsing messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No style object was supplied at all
    #[error("Expected style to be set")]
    MissingStyle,

    /// `fixedInstallments` requested without a term
    #[error("Expected style.installments.fixedInstallmentsTerm to be set when fixedInstallments is true")]
    MissingTerm,

    /// Term supplied but not a number
    #[error("Expected style.installments.fixedInstallmentsTerm to be a number, got {0}")]
    TermNotNumeric(String),

    /// Term is numeric but has a fractional part
    #[error("Expected style.installments.fixedInstallmentsTerm to be an integer, got {0}")]
    TermNotInteger(String),

    /// Term is an integer below 1
    #[error("Expected style.installments.fixedInstallmentsTerm to be 1 or greater, got {0}")]
    TermOutOfRange(String),
}

impl ConfigError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::MissingStyle => "MISSING_STYLE",
            ConfigError::MissingTerm => "MISSING_TERM",
            ConfigError::TermNotNumeric(_) => "TERM_NOT_NUMERIC",
            ConfigError::TermNotInteger(_) => "TERM_NOT_INTEGER",
            ConfigError::TermOutOfRange(_) => "TERM_OUT_OF_RANGE",
        }
    }
}

/// Checkout session error types
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Invalid session configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No URLs are registered for the requested environment
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    /// Payment identifier provider failed or produced an unusable token
    #[error("URL resolution failed: {0}")]
    UrlResolution(String),

    /// A user-supplied lifecycle callback failed
    #[error("{callback} callback failed: {message}")]
    Callback {
        callback: &'static str,
        message: String,
    },

    /// Closing the remote surface failed
    #[error("Surface close failed: {0}")]
    Surface(String),

    /// Redirect could not be performed
    #[error("Navigation error: {0}")]
    Navigation(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl CheckoutError {
    /// Build a callback error from whatever the user callback returned
    pub fn callback(callback: &'static str, err: &anyhow::Error) -> Self {
        CheckoutError::Callback {
            callback,
            message: format!("{:#}", err),
        }
    }

    /// Check if error is retryable
    ///
    /// Session start errors are never retried; only a failed surface close
    /// may succeed on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Surface(_))
    }

    /// Whether this error prevents the remote surface from rendering
    pub fn is_fatal_to_session_start(&self) -> bool {
        matches!(
            self,
            CheckoutError::Config(_)
                | CheckoutError::UnknownEnvironment(_)
                | CheckoutError::UrlResolution(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Config(err) => format!("Invalid checkout configuration: {}", err),
            CheckoutError::UnknownEnvironment(env) => {
                format!("Checkout is not available for environment '{}'.", env)
            }
            CheckoutError::UrlResolution(_) => {
                "Unable to start checkout. Please try again.".into()
            }
            CheckoutError::Callback { .. } => "Checkout could not be completed.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for CheckoutError {
    fn from(err: anyhow::Error) -> Self {
        CheckoutError::Other(err.to_string())
    }
}
