//! Query parameter strategy (`?version=1.0`)

use super::{non_empty, ExtractionStrategy, StrategySettings, VersionSource};
use crate::error::{Result, VersioningError};
use crate::request::VersionRequest;

pub(crate) const DEFAULT_PARAM: &str = "version";

/// Reads the version from a query parameter, then from fallback parameters
#[derive(Debug, Clone)]
pub struct QueryParameterStrategy {
    param: String,
    fallbacks: Vec<String>,
    case_sensitive: bool,
    settings: StrategySettings,
}

impl QueryParameterStrategy {
    /// Create a strategy reading `param`
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            fallbacks: Vec::new(),
            case_sensitive: false,
            settings: StrategySettings::default(),
        }
    }

    /// Add an alternate parameter name
    pub fn with_fallback(mut self, param: impl Into<String>) -> Self {
        self.fallbacks.push(param.into());
        self
    }

    /// Add several alternate parameter names
    pub fn with_fallbacks<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks.extend(params.into_iter().map(Into::into));
        self
    }

    /// Compare parameter names exactly (default: ignore ASCII case)
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.settings.priority = priority;
        self
    }

    /// Fail with `MissingRequired` when no parameter is present
    pub fn with_required(mut self, required: bool) -> Self {
        self.settings.required = required;
        self
    }

    /// Enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    /// Primary parameter name
    pub fn param_name(&self) -> &str {
        &self.param
    }

    fn checked_params(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.param.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

impl Default for QueryParameterStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_PARAM)
    }
}

impl ExtractionStrategy for QueryParameterStrategy {
    fn name(&self) -> &str {
        "query"
    }

    fn source(&self) -> VersionSource {
        VersionSource::Query
    }

    fn extract(&self, request: &VersionRequest) -> Result<Option<String>> {
        let found = self.checked_params().find_map(|param| {
            request
                .query_value(param, self.case_sensitive)
                .and_then(non_empty)
        });

        match found {
            Some(value) => Ok(Some(value)),
            None if self.settings.required => Err(VersioningError::MissingRequired {
                strategy: self.name().to_string(),
                checked: self.checked_params().map(str::to_string).collect(),
            }),
            None => Ok(None),
        }
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
