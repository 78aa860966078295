//! Error types for version resolution

use crate::compat::NegotiationPolicy;
use crate::version::{ApiVersion, VersionParseError};
use http::StatusCode;
use thiserror::Error;

/// Result type alias for versioning operations
pub type Result<T, E = VersioningError> = std::result::Result<T, E>;

/// Errors raised while extracting, validating or negotiating an API version
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VersioningError {
    /// A version token was malformed, or a strict strategy rejected the request
    #[error("invalid version format '{input}': {reason}")]
    Format {
        /// The offending input
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// A required strategy found no candidate in the request
    #[error("required version not found by {strategy} strategy (checked: {})", checked.join(", "))]
    MissingRequired {
        /// Name of the strategy that required a version
        strategy: String,
        /// Header / parameter names that were checked
        checked: Vec<String>,
    },

    /// The requested version is not registered and no fallback was allowed
    #[error("version {requested} is not supported. Available versions: {}", join_versions(available))]
    Unsupported {
        /// Version parsed from the request
        requested: ApiVersion,
        /// All registered versions, sorted
        available: Vec<ApiVersion>,
    },

    /// Negotiation was attempted but produced no candidate
    #[error(
        "could not negotiate version {requested} using {policy} policy. Available versions: {}",
        join_versions(available)
    )]
    Negotiation {
        /// Version parsed from the request
        requested: ApiVersion,
        /// Versions that were considered
        available: Vec<ApiVersion>,
        /// Policy used for negotiation
        policy: NegotiationPolicy,
    },

    /// A handler is already registered for the same method, path and version
    #[error("version conflict: {method} {path} already has a handler for version {version}")]
    Conflict {
        /// HTTP method
        method: String,
        /// Route path
        path: String,
        /// Duplicated version
        version: ApiVersion,
    },

    /// Metadata update on a version that was never registered
    #[error("version {0} is not registered")]
    NotRegistered(ApiVersion),

    /// Nothing was extracted from the request and no default version is configured
    #[error("no version specified in request and no default version configured")]
    NoVersion,

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

fn join_versions(versions: &[ApiVersion]) -> String {
    versions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl VersioningError {
    /// Create a format error
    pub fn format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Format {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Format { .. } => "INVALID_VERSION",
            Self::MissingRequired { .. } => "MISSING_REQUIRED_VERSION",
            Self::Unsupported { .. } => "UNSUPPORTED_VERSION",
            Self::Negotiation { .. } => "NEGOTIATION_FAILED",
            Self::Conflict { .. } => "VERSION_CONFLICT",
            Self::NotRegistered(_) => "VERSION_NOT_REGISTERED",
            Self::NoVersion => "NO_VERSION",
            Self::Config(_) => "CONFIGURATION_ERROR",
        }
    }

    /// HTTP status a host should answer with when this error reaches the client
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Format { .. }
            | Self::MissingRequired { .. }
            | Self::Unsupported { .. }
            | Self::Negotiation { .. }
            | Self::NoVersion => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::NotRegistered(_) => StatusCode::NOT_FOUND,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether this is a malformed-input error
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }

    /// Versions attached for diagnostics, if any
    pub fn available_versions(&self) -> &[ApiVersion] {
        match self {
            Self::Unsupported { available, .. } | Self::Negotiation { available, .. } => available,
            _ => &[],
        }
    }
}

impl From<VersionParseError> for VersioningError {
    fn from(err: VersionParseError) -> Self {
        let reason = err.to_string();
        match err {
            VersionParseError::Empty => Self::format("", reason),
            VersionParseError::TooLong(_) => Self::format("<truncated>", reason),
            VersionParseError::InvalidNumber(input)
            | VersionParseError::InvalidFormat(input)
            | VersionParseError::InvalidIdentifier(input) => Self::format(input, reason),
        }
    }
}
