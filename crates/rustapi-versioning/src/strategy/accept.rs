//! Accept header strategy
//!
//! Two forms are recognised:
//! - vendor media types: `application/vnd.api.v2+json`
//! - media type parameters: `application/json;version=2.0`

use super::{non_empty, split_pattern, ExtractionStrategy, StrategySettings, VersionSource};
use crate::error::{Result, VersioningError};
use crate::request::VersionRequest;
use http::header::ACCEPT;

pub(crate) const DEFAULT_PATTERN: &str = "application/vnd.api.v{version}+json";
pub(crate) const DEFAULT_PARAMETER: &str = "version";

/// Reads the version from the `Accept` header
///
/// Vendor media types matching the pattern win over media type parameters.
#[derive(Debug, Clone)]
pub struct AcceptHeaderStrategy {
    pattern: String,
    parameter: Option<String>,
    settings: StrategySettings,
}

impl AcceptHeaderStrategy {
    /// Create a strategy with the default vendor pattern and `version` parameter
    pub fn new() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            parameter: Some(DEFAULT_PARAMETER.to_string()),
            settings: StrategySettings::default(),
        }
    }

    /// Set the vendor pattern; it must contain `{version}`
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Set the media type parameter name, or `None` to ignore parameters
    pub fn with_parameter(mut self, parameter: Option<String>) -> Self {
        self.parameter = parameter;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.settings.priority = priority;
        self
    }

    /// Fail with `MissingRequired` when no version is present
    pub fn with_required(mut self, required: bool) -> Self {
        self.settings.required = required;
        self
    }

    /// Enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    fn from_pattern(&self, accept: &str) -> Option<String> {
        let (before, after) = split_pattern(&self.pattern)?;

        accept.split(',').map(str::trim).find_map(|media_range| {
            let media_type = media_range.split(';').next().unwrap_or(media_range).trim();
            let start = media_type.find(before)?;
            let remaining = &media_type[start + before.len()..];

            let end = if after.is_empty() {
                remaining.len()
            } else {
                remaining.find(after)?
            };

            let token = &remaining[..end];
            token
                .starts_with(|c: char| c.is_ascii_digit())
                .then(|| token.to_string())
        })
    }

    fn from_parameter(&self, accept: &str) -> Option<String> {
        let parameter = self.parameter.as_deref()?;

        accept.split(',').find_map(|media_range| {
            media_range.split(';').skip(1).find_map(|param| {
                let (name, value) = param.split_once('=')?;
                if !name.trim().eq_ignore_ascii_case(parameter) {
                    return None;
                }
                non_empty(value.trim().trim_matches('"'))
            })
        })
    }
}

impl Default for AcceptHeaderStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for AcceptHeaderStrategy {
    fn name(&self) -> &str {
        "accept"
    }

    fn source(&self) -> VersionSource {
        VersionSource::Accept
    }

    fn extract(&self, request: &VersionRequest) -> Result<Option<String>> {
        let found = request
            .header_str(ACCEPT.as_str())
            .and_then(|accept| self.from_pattern(accept).or_else(|| self.from_parameter(accept)));

        match found {
            Some(value) => Ok(Some(value)),
            None if self.settings.required => Err(VersioningError::MissingRequired {
                strategy: self.name().to_string(),
                checked: vec![ACCEPT.as_str().to_string()],
            }),
            None => Ok(None),
        }
    }

    fn header_names(&self) -> Vec<String> {
        vec![ACCEPT.as_str().to_string()]
    }

    fn priority(&self) -> i32 {
        self.settings.priority
    }

    fn required(&self) -> bool {
        self.settings.required
    }

    fn enabled(&self) -> bool {
        self.settings.enabled
    }
}
