//! Composite strategy trying several strategies in priority order

use super::{ExtractedToken, ExtractionStrategy, StrategyDescription, VersionSource};
use crate::error::Result;
use crate::request::VersionRequest;
use crate::version::ApiVersion;
use tracing::debug;

/// Tries each enabled sub-strategy in ascending priority and returns the
/// first token found
///
/// Format errors from optional sub-strategies are treated as "no candidate".
/// Errors from required sub-strategies, and every other error, propagate.
#[derive(Debug, Default)]
pub struct CompositeStrategy {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl CompositeStrategy {
    /// Create a composite; strategies are sorted by priority
    ///
    /// Strategies with equal priority keep their given order.
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        let mut composite = Self { strategies };
        composite.sort();
        composite
    }

    /// Add a strategy
    pub fn add(&mut self, strategy: Box<dyn ExtractionStrategy>) {
        self.strategies.push(strategy);
        self.sort();
    }

    /// Builder form of [`CompositeStrategy::add`]
    pub fn with(mut self, strategy: impl ExtractionStrategy + 'static) -> Self {
        self.add(Box::new(strategy));
        self
    }

    /// Remove every sub-strategy called `name`; returns whether any was removed
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.strategies.len();
        self.strategies.retain(|s| s.name() != name);
        self.strategies.len() != before
    }

    /// Sub-strategies in the order they are tried
    pub fn strategies(&self) -> &[Box<dyn ExtractionStrategy>] {
        &self.strategies
    }

    /// Descriptions of every sub-strategy, in try order
    pub fn describe_all(&self) -> Vec<StrategyDescription> {
        self.strategies.iter().map(|s| s.describe()).collect()
    }

    fn sort(&mut self) {
        self.strategies.sort_by_key(|s| s.priority());
    }

    /// Highest-priority enabled strategy that reads the version from the path
    fn path_strategy(&self) -> Option<&dyn ExtractionStrategy> {
        self.strategies
            .iter()
            .find(|s| s.enabled() && s.source() == VersionSource::Path)
            .map(|s| s.as_ref())
    }
}

impl ExtractionStrategy for CompositeStrategy {
    fn name(&self) -> &str {
        "composite"
    }

    fn source(&self) -> VersionSource {
        VersionSource::Composite
    }

    fn extract(&self, request: &VersionRequest) -> Result<Option<String>> {
        Ok(self.extract_detailed(request)?.map(|token| token.raw))
    }

    /// Reports the sub-strategy that produced the token
    fn extract_detailed(&self, request: &VersionRequest) -> Result<Option<ExtractedToken>> {
        for strategy in self.strategies.iter().filter(|s| s.enabled()) {
            match strategy.extract_detailed(request) {
                Ok(Some(token)) => {
                    debug!(strategy = token.strategy.as_str(), raw = %token.raw, "Version token extracted");
                    return Ok(Some(token));
                }
                Ok(None) => continue,
                Err(err) if err.is_format() && !strategy.required() => {
                    debug!(strategy = strategy.name(), error = %err, "Ignoring malformed version source");
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Union of the headers read by every sub-strategy, disabled ones included
    fn header_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.strategies.iter().flat_map(|s| s.header_names()) {
            if !names.iter().any(|known| known.eq_ignore_ascii_case(&name)) {
                names.push(name);
            }
        }
        names
    }

    /// Delegates to the first enabled path strategy; identity when there is none
    fn format_route_path(&self, path: &str, version: &ApiVersion) -> String {
        match self.path_strategy() {
            Some(strategy) => strategy.format_route_path(path, version),
            None => path.to_string(),
        }
    }

    fn alternative_paths(&self, path: &str, version: &ApiVersion) -> Vec<String> {
        match self.path_strategy() {
            Some(strategy) => strategy.alternative_paths(path, version),
            None => vec![path.to_string()],
        }
    }

    /// Priority of the earliest sub-strategy
    fn priority(&self) -> i32 {
        self.strategies
            .first()
            .map(|s| s.priority())
            .unwrap_or(super::DEFAULT_PRIORITY)
    }

    /// Required if any enabled sub-strategy is
    fn required(&self) -> bool {
        self.strategies.iter().any(|s| s.enabled() && s.required())
    }

    fn enabled(&self) -> bool {
        self.strategies.iter().any(|s| s.enabled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersioningError;
    use crate::strategy::{
        AcceptHeaderStrategy, HeaderStrategy, PathSegmentStrategy, QueryParameterStrategy,
    };

    #[test]
    fn test_lower_priority_number_wins() {
        let composite = CompositeStrategy::default()
            .with(QueryParameterStrategy::default().with_priority(20))
            .with(HeaderStrategy::default().with_priority(10));

        let req = VersionRequest::get("/x?version=1.0").header("X-API-Version", "2.0");
        let token = composite.extract_detailed(&req).unwrap().unwrap();

        assert_eq!(token.raw, "2.0");
        assert_eq!(token.strategy, "header");
        assert_eq!(token.source, VersionSource::Header);
    }

    #[test]
    fn test_falls_through_to_next() {
        let composite = CompositeStrategy::new(vec![
            Box::new(PathSegmentStrategy::new().with_priority(1)),
            Box::new(HeaderStrategy::default().with_priority(2)),
        ]);

        let req = VersionRequest::get("/users").header("X-API-Version", "3");
        assert_eq!(composite.extract(&req).unwrap(), Some("3".to_string()));
        assert_eq!(composite.extract(&VersionRequest::get("/users")).unwrap(), None);
    }

    #[test]
    fn test_disabled_skipped() {
        let composite = CompositeStrategy::default()
            .with(HeaderStrategy::default().with_priority(1).with_enabled(false))
            .with(QueryParameterStrategy::default().with_priority(2));

        let req = VersionRequest::get("/x?version=5").header("X-API-Version", "4");
        assert_eq!(composite.extract(&req).unwrap(), Some("5".to_string()));
    }

    #[test]
    fn test_optional_format_error_swallowed() {
        let composite = CompositeStrategy::default()
            .with(PathSegmentStrategy::new().strict(true).with_priority(1))
            .with(HeaderStrategy::default().with_priority(2));

        let req = VersionRequest::get("/users").header("X-API-Version", "2");
        assert_eq!(composite.extract(&req).unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_required_format_error_propagates() {
        let composite = CompositeStrategy::default()
            .with(
                PathSegmentStrategy::new()
                    .strict(true)
                    .with_required(true)
                    .with_priority(1),
            )
            .with(HeaderStrategy::default().with_priority(2));

        let req = VersionRequest::get("/users").header("X-API-Version", "2");
        assert!(composite.extract(&req).unwrap_err().is_format());
    }

    #[test]
    fn test_missing_required_propagates() {
        let composite = CompositeStrategy::default()
            .with(HeaderStrategy::default().with_required(true).with_priority(1))
            .with(QueryParameterStrategy::default().with_priority(2));

        let err = composite
            .extract(&VersionRequest::get("/x?version=1"))
            .unwrap_err();
        assert!(matches!(err, VersioningError::MissingRequired { .. }));
    }

    #[test]
    fn test_route_path_uses_first_enabled() {
        let composite = CompositeStrategy::default()
            .with(HeaderStrategy::default().with_priority(1).with_enabled(false))
            .with(PathSegmentStrategy::new().with_priority(2));

        assert_eq!(
            composite.format_route_path("/users", &ApiVersion::new(2, 1, 0)),
            "/v2.1/users"
        );
    }

    #[test]
    fn test_route_path_skips_non_path_strategies() {
        let composite = CompositeStrategy::default()
            .with(HeaderStrategy::default().with_priority(10))
            .with(PathSegmentStrategy::new().with_priority(20));
        let version = ApiVersion::new(2, 0, 0);

        assert_eq!(composite.format_route_path("/users", &version), "/v2.0/users");
        assert!(composite
            .alternative_paths("/users", &version)
            .contains(&"/v2/users".to_string()));
    }

    #[test]
    fn test_route_path_identity_without_path_strategy() {
        let composite = CompositeStrategy::default()
            .with(HeaderStrategy::default())
            .with(QueryParameterStrategy::default())
            .with(PathSegmentStrategy::new().with_enabled(false));
        let version = ApiVersion::new(2, 0, 0);

        assert_eq!(composite.format_route_path("/users", &version), "/users");
        assert_eq!(
            composite.alternative_paths("/users", &version),
            vec!["/users".to_string()]
        );
    }

    #[test]
    fn test_header_names_union() {
        let composite = CompositeStrategy::default()
            .with(HeaderStrategy::new("Api-Version").with_fallback("X-API-Version"))
            .with(HeaderStrategy::default().with_priority(5))
            .with(AcceptHeaderStrategy::default())
            .with(QueryParameterStrategy::default());

        let names = composite.header_names();
        assert_eq!(names.len(), 3);
        assert!(names.iter().any(|n| n == "Api-Version"));
        assert!(names.iter().any(|n| n.eq_ignore_ascii_case("x-api-version")));
        assert!(names.iter().any(|n| n == "accept"));
    }

    #[test]
    fn test_remove() {
        let mut composite = CompositeStrategy::default()
            .with(HeaderStrategy::default())
            .with(QueryParameterStrategy::default());

        assert!(composite.remove("header"));
        assert!(!composite.remove("header"));
        assert_eq!(composite.strategies().len(), 1);
        assert_eq!(composite.describe_all()[0].name, "query");
    }
}
