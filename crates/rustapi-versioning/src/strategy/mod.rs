//! Version extraction strategies
//!
//! Provides different strategies for extracting a raw version token from
//! requests. Every strategy implements [`ExtractionStrategy`]; the
//! [`CompositeStrategy`] holds several of them and tries each in priority order.

mod accept;
mod composite;
mod header;
mod path;
mod query;

pub use accept::AcceptHeaderStrategy;
pub use composite::CompositeStrategy;
pub use header::HeaderStrategy;
pub use path::PathSegmentStrategy;
pub use query::QueryParameterStrategy;

use crate::error::Result;
use crate::request::VersionRequest;
use crate::version::{ApiVersion, PathFormat};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priority used when a strategy does not set one
pub const DEFAULT_PRIORITY: i32 = 100;

/// A mechanism that pulls a raw version token out of a request
///
/// Returning `Ok(None)` means "no candidate here" and is not an error.
/// Tokens are returned unparsed; the resolver turns them into [`ApiVersion`]s.
pub trait ExtractionStrategy: Send + Sync + fmt::Debug {
    /// Short name used in logs and diagnostics
    fn name(&self) -> &str;

    /// Where in the request this strategy looks
    fn source(&self) -> VersionSource;

    /// Extract a raw version token
    fn extract(&self, request: &VersionRequest) -> Result<Option<String>>;

    /// Extract a token together with the strategy that produced it
    fn extract_detailed(&self, request: &VersionRequest) -> Result<Option<ExtractedToken>> {
        Ok(self.extract(request)?.map(|raw| ExtractedToken {
            raw,
            source: self.source(),
            strategy: self.name().to_string(),
        }))
    }

    /// Request headers this strategy reads
    fn header_names(&self) -> Vec<String> {
        Vec::new()
    }

    /// Render `version` into a route path; identity for non-path strategies
    fn format_route_path(&self, path: &str, _version: &ApiVersion) -> String {
        path.to_string()
    }

    /// Every physical path under which `version` of `path` may be served
    fn alternative_paths(&self, path: &str, version: &ApiVersion) -> Vec<String> {
        vec![self.format_route_path(path, version)]
    }

    /// Lower values are tried earlier
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Whether a missing candidate is an error
    fn required(&self) -> bool {
        false
    }

    /// Disabled strategies are skipped by the composite
    fn enabled(&self) -> bool {
        true
    }

    /// Summary for introspection
    fn describe(&self) -> StrategyDescription {
        StrategyDescription {
            name: self.name().to_string(),
            source: self.source(),
            priority: self.priority(),
            required: self.required(),
            enabled: self.enabled(),
        }
    }
}

/// Source from which a version was taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    /// Extracted from URL path
    Path,
    /// Extracted from HTTP header
    Header,
    /// Extracted from query parameter
    Query,
    /// Extracted from Accept header
    Accept,
    /// Several sources were combined
    Composite,
    /// Default version was used
    Default,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Path => "path",
            Self::Header => "header",
            Self::Query => "query",
            Self::Accept => "accept",
            Self::Composite => "composite",
            Self::Default => "default",
        };
        f.write_str(name)
    }
}

/// Raw token returned by a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedToken {
    /// Unparsed version text
    pub raw: String,
    /// Where it was found
    pub source: VersionSource,
    /// Name of the strategy that found it
    pub strategy: String,
}

/// Introspection view of a configured strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyDescription {
    /// Strategy name
    pub name: String,
    /// Where it looks
    pub source: VersionSource,
    /// Priority (lower first)
    pub priority: i32,
    /// Whether absence is an error
    pub required: bool,
    /// Whether the strategy participates
    pub enabled: bool,
}

/// Serializable description of a strategy, as found in configuration
///
/// ```json
/// { "type": "header", "name": "X-API-Version", "priority": 10 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    /// Mechanism and its options
    #[serde(flatten)]
    pub kind: StrategyKind,
    /// Lower values are tried earlier
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// Whether a missing candidate is an error
    #[serde(default)]
    pub required: bool,
    /// Whether the strategy participates
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Extraction mechanism with its options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyKind {
    /// Extract version from URL path (e.g., /v1/users)
    Path {
        /// Segment prefix before the number
        #[serde(default = "default_path_prefix")]
        prefix: String,
        /// Leading path segment such as `api`
        #[serde(default)]
        api_prefix: Option<String>,
        /// Reject paths without a version segment
        #[serde(default)]
        strict: bool,
        /// Granularity used for route paths
        #[serde(default)]
        format: PathFormat,
    },

    /// Extract version from HTTP header
    ///
    /// Example: X-API-Version: 1.0
    Header {
        /// Header name to read version from
        #[serde(default = "default_header_name")]
        name: String,
        /// Alternate header names, tried in order
        #[serde(default)]
        fallbacks: Vec<String>,
    },

    /// Extract version from query parameter
    ///
    /// Example: ?version=1.0 or ?api-version=1.0
    Query {
        /// Query parameter name
        #[serde(default = "default_query_param")]
        param: String,
        /// Alternate parameter names, tried in order
        #[serde(default)]
        fallbacks: Vec<String>,
        /// Compare parameter names exactly
        #[serde(default)]
        case_sensitive: bool,
    },

    /// Extract version from Accept header media type
    ///
    /// Example: Accept: application/vnd.api.v1+json
    Accept {
        /// Media type pattern with `{version}` placeholder
        #[serde(default = "default_accept_pattern")]
        pattern: String,
        /// Media type parameter carrying the version, e.g. `version`
        #[serde(default = "default_accept_parameter")]
        parameter: Option<String>,
    },
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

fn default_path_prefix() -> String {
    path::DEFAULT_PREFIX.to_string()
}

fn default_header_name() -> String {
    header::DEFAULT_HEADER.to_string()
}

fn default_query_param() -> String {
    query::DEFAULT_PARAM.to_string()
}

fn default_accept_pattern() -> String {
    accept::DEFAULT_PATTERN.to_string()
}

fn default_accept_parameter() -> Option<String> {
    Some(accept::DEFAULT_PARAMETER.to_string())
}

impl StrategySpec {
    fn with_kind(kind: StrategyKind) -> Self {
        Self {
            kind,
            priority: DEFAULT_PRIORITY,
            required: false,
            enabled: true,
        }
    }

    /// Path strategy with prefix `v`
    pub fn path() -> Self {
        Self::with_kind(StrategyKind::Path {
            prefix: default_path_prefix(),
            api_prefix: None,
            strict: false,
            format: PathFormat::default(),
        })
    }

    /// Header strategy reading `X-API-Version`
    pub fn header() -> Self {
        Self::header_with_name(header::DEFAULT_HEADER)
    }

    /// Header strategy with custom header name
    pub fn header_with_name(name: impl Into<String>) -> Self {
        Self::with_kind(StrategyKind::Header {
            name: name.into(),
            fallbacks: Vec::new(),
        })
    }

    /// Add an alternate header or parameter name; other kinds ignore it
    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        match &mut self.kind {
            StrategyKind::Header { fallbacks, .. } | StrategyKind::Query { fallbacks, .. } => {
                fallbacks.push(name.into())
            }
            _ => {}
        }
        self
    }

    /// Query strategy reading `version`
    pub fn query() -> Self {
        Self::query_with_param(query::DEFAULT_PARAM)
    }

    /// Query strategy with custom parameter name
    pub fn query_with_param(param: impl Into<String>) -> Self {
        Self::with_kind(StrategyKind::Query {
            param: param.into(),
            fallbacks: Vec::new(),
            case_sensitive: false,
        })
    }

    /// Accept header strategy with the default vendor pattern
    pub fn accept() -> Self {
        Self::with_kind(StrategyKind::Accept {
            pattern: default_accept_pattern(),
            parameter: default_accept_parameter(),
        })
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Enable or disable
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Instantiate the strategy
    pub fn build(&self) -> Box<dyn ExtractionStrategy> {
        match &self.kind {
            StrategyKind::Path {
                prefix,
                api_prefix,
                strict,
                format,
            } => {
                let mut strategy = PathSegmentStrategy::new()
                    .with_prefix(prefix.clone())
                    .strict(*strict)
                    .with_format(*format);
                if let Some(api_prefix) = api_prefix {
                    strategy = strategy.with_api_prefix(api_prefix.clone());
                }
                Box::new(
                    strategy
                        .with_priority(self.priority)
                        .with_required(self.required)
                        .with_enabled(self.enabled),
                )
            }
            StrategyKind::Header { name, fallbacks } => Box::new(
                HeaderStrategy::new(name.clone())
                    .with_fallbacks(fallbacks.iter().cloned())
                    .with_priority(self.priority)
                    .with_required(self.required)
                    .with_enabled(self.enabled),
            ),
            StrategyKind::Query {
                param,
                fallbacks,
                case_sensitive,
            } => Box::new(
                QueryParameterStrategy::new(param.clone())
                    .with_fallbacks(fallbacks.iter().cloned())
                    .case_sensitive(*case_sensitive)
                    .with_priority(self.priority)
                    .with_required(self.required)
                    .with_enabled(self.enabled),
            ),
            StrategyKind::Accept { pattern, parameter } => Box::new(
                AcceptHeaderStrategy::new()
                    .with_pattern(pattern.clone())
                    .with_parameter(parameter.clone())
                    .with_priority(self.priority)
                    .with_required(self.required)
                    .with_enabled(self.enabled),
            ),
        }
    }
}

impl Default for StrategySpec {
    fn default() -> Self {
        Self::path()
    }
}

/// Options every concrete strategy carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StrategySettings {
    pub priority: i32,
    pub required: bool,
    pub enabled: bool,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            required: false,
            enabled: true,
        }
    }
}

/// Split a `{version}` placeholder pattern into its surrounding text
pub(crate) fn split_pattern(pattern: &str) -> Option<(&str, &str)> {
    pattern.split_once("{version}")
}

/// Trimmed, non-empty value
pub(crate) fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_from_json() {
        let spec: StrategySpec =
            serde_json::from_str(r#"{"type":"header","name":"Api-Version","priority":5}"#)
                .unwrap();
        assert_eq!(spec.priority, 5);
        assert!(spec.enabled);
        assert!(!spec.required);
        assert_eq!(
            spec.kind,
            StrategyKind::Header {
                name: "Api-Version".to_string(),
                fallbacks: vec![],
            }
        );
    }

    #[test]
    fn test_spec_defaults() {
        let spec: StrategySpec = serde_json::from_str(r#"{"type":"path"}"#).unwrap();
        assert_eq!(spec, StrategySpec::path());

        let spec: StrategySpec = serde_json::from_str(r#"{"type":"accept"}"#).unwrap();
        assert_eq!(spec, StrategySpec::accept());
    }

    #[test]
    fn test_spec_build() {
        let strategy = StrategySpec::query_with_param("api-version")
            .with_priority(20)
            .required()
            .build();

        assert_eq!(strategy.name(), "query");
        assert_eq!(strategy.source(), VersionSource::Query);
        assert_eq!(strategy.priority(), 20);
        assert!(strategy.required());

        let req = VersionRequest::get("/x?api-version=3");
        assert_eq!(strategy.extract(&req).unwrap(), Some("3".to_string()));
    }

    #[test]
    fn test_default_extract_detailed() {
        let strategy = StrategySpec::header().build();
        let req = VersionRequest::get("/").header("X-API-Version", "2");
        let token = strategy.extract_detailed(&req).unwrap().unwrap();
        assert_eq!(token.raw, "2");
        assert_eq!(token.source, VersionSource::Header);
        assert_eq!(token.strategy, "header");
    }

    #[test]
    fn test_describe() {
        let strategy = StrategySpec::path().with_priority(1).build();
        let description = strategy.describe();
        assert_eq!(description.name, "path");
        assert_eq!(description.priority, 1);
        assert!(description.enabled);
    }
}
