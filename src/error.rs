//! Error types for the policy decision engine

use thiserror::Error;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed `ServicePolicies` at construction time (e.g. tag policies
    /// present without a service definition). Construction fails outright;
    /// no partially-built engine is ever returned.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, AuthzError>;
