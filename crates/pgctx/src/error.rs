//! Error types for pgctx

use std::time::Duration;
use thiserror::Error;

/// Result type alias for pgctx operations
pub type CtxResult<T> = Result<T, CtxError>;

/// Error types for profile loading, query construction, execution and shaping
#[derive(Debug, Error)]
pub enum CtxError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// No context profile registered under the requested name
    #[error("Context profile '{0}' not found")]
    ProfileNotFound(String),

    /// Root record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// No template matches the requested context and name
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Entity name has no catalog registration
    #[error("Entity type '{0}' not found")]
    EntityNotFound(String),

    /// Include path names a navigation the source entity does not have
    #[error("Navigation '{navigation}' not found on '{entity}'")]
    NavigationNotFound { entity: String, navigation: String },

    /// Identifier or operator failed the SQL whitelist
    #[error("Security error: {0}")]
    Security(String),

    /// Custom join tree failed structural validation
    #[error("Invalid custom joins: {}", .0.join("; "))]
    InvalidJoins(Vec<String>),

    /// Profile or query construction error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Root entity cannot be handled by the graph loader
    #[error("Entity type '{0}' not supported")]
    UnsupportedEntity(String),

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Caller cancelled the in-flight query
    #[error("Query cancelled")]
    Cancelled,

    /// Template or document rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl CtxError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a security error
    pub fn security(message: impl Into<String>) -> Self {
        Self::Security(message.into())
    }

    /// Check if this error means "the requested thing does not exist"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::TemplateNotFound(_)
                | Self::ProfileNotFound(_)
                | Self::EntityNotFound(_)
                | Self::NavigationNotFound { .. }
        )
    }

    /// Check if this is an identifier/operator whitelist failure
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if the caller cancelled the operation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Message safe to show at a system boundary.
    ///
    /// Never includes generated SQL, driver detail or the offending identifier.
    pub fn public_message(&self) -> String {
        match self {
            Self::ProfileNotFound(name) => format!("context profile '{name}' not found"),
            Self::NotFound(_) => "record not found".to_string(),
            Self::TemplateNotFound(_) => "template not found".to_string(),
            Self::EntityNotFound(_) | Self::NavigationNotFound { .. } => {
                "requested data is not available".to_string()
            }
            Self::Security(_) => "profile contains a rejected identifier or operator".to_string(),
            Self::InvalidJoins(errors) => errors.join("; "),
            Self::Validation(_) | Self::UnsupportedEntity(_) => {
                "profile configuration is invalid".to_string()
            }
            Self::Timeout(_) => "query timed out".to_string(),
            Self::Cancelled => "request cancelled".to_string(),
            Self::Render(_) => "rendering failed".to_string(),
            _ => "internal error".to_string(),
        }
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for CtxError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

impl From<serde_json::Error> for CtxError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
