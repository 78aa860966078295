//! HTTP header strategy (`X-API-Version: 2.0`)

use super::{non_empty, ExtractionStrategy, StrategySettings, VersionSource};
use crate::error::{Result, VersioningError};
use crate::request::VersionRequest;

pub(crate) const DEFAULT_HEADER: &str = "X-API-Version";

/// Reads the version from a header, then from fallback headers in order
///
/// Header names are matched case-insensitively. Blank values count as absent.
#[derive(Debug, Clone)]
pub struct HeaderStrategy {
    name: String,
    fallbacks: Vec<String>,
    settings: StrategySettings,
}

impl HeaderStrategy {
    /// Create a strategy reading `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fallbacks: Vec::new(),
            settings: StrategySettings::default(),
        }
    }

    /// Add an alternate header name
    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        self.fallbacks.push(name.into());
        self
    }

    /// Add several alternate header names
    pub fn with_fallbacks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallbacks.extend(names.into_iter().map(Into::into));
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.settings.priority = priority;
        self
    }

    /// Fail with `MissingRequired` when no header is present
    pub fn with_required(mut self, required: bool) -> Self {
        self.settings.required = required;
        self
    }

    /// Enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    /// Primary header name
    pub fn header_name(&self) -> &str {
        &self.name
    }

    /// Primary header followed by fallbacks
    pub fn checked_headers(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

impl Default for HeaderStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_HEADER)
    }
}

impl ExtractionStrategy for HeaderStrategy {
    fn name(&self) -> &str {
        "header"
    }

    fn source(&self) -> VersionSource {
        VersionSource::Header
    }

    fn extract(&self, request: &VersionRequest) -> Result<Option<String>> {
        let found = self
            .checked_headers()
            .find_map(|name| request.header_str(name).and_then(non_empty));

        match found {
            Some(value) => Ok(Some(value)),
            None if self.settings.required => Err(VersioningError::MissingRequired {
                strategy: self.name().to_string(),
                checked: self.checked_headers().map(str::to_string).collect(),
            }),
            None => Ok(None),
        }
    }

    fn header_names(&self) -> Vec<String> {
        self.checked_headers().map(str::to_string).collect()
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_header() {
        let strategy = HeaderStrategy::default();
        let req = VersionRequest::get("/").header("x-api-version", "2.0");

        assert_eq!(strategy.extract(&req).unwrap(), Some("2.0".to_string()));
    }

    #[test]
    fn test_fallback_order() {
        let strategy = HeaderStrategy::new("X-API-Version")
            .with_fallbacks(["API-Version", "X-Version"]);

        let req = VersionRequest::get("/")
            .header("X-Version", "3")
            .header("API-Version", "2");
        assert_eq!(strategy.extract(&req).unwrap(), Some("2".to_string()));

        let req = req.header("X-API-Version", "1");
        assert_eq!(strategy.extract(&req).unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_blank_value_is_absent() {
        let strategy = HeaderStrategy::default().with_fallback("Api-Version");
        let req = VersionRequest::get("/")
            .header("X-API-Version", "   ")
            .header("Api-Version", " 1.1 ");

        assert_eq!(strategy.extract(&req).unwrap(), Some("1.1".to_string()));
    }

    #[test]
    fn test_missing_optional() {
        let strategy = HeaderStrategy::default();
        assert_eq!(strategy.extract(&VersionRequest::get("/")).unwrap(), None);
    }

    #[test]
    fn test_missing_required() {
        let strategy = HeaderStrategy::default()
            .with_fallback("Api-Version")
            .with_required(true);

        match strategy.extract(&VersionRequest::get("/")) {
            Err(VersioningError::MissingRequired { strategy, checked }) => {
                assert_eq!(strategy, "header");
                assert_eq!(checked, vec!["X-API-Version", "Api-Version"]);
            }
            other => panic!("expected MissingRequired, got {:?}", other),
        }
    }
}
