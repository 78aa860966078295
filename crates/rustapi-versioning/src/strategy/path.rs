//! URL path segment strategy (`/v1/users`, `/api/v2.1/posts`)

use super::{ExtractionStrategy, StrategySettings, VersionSource};
use crate::error::{Result, VersioningError};
use crate::request::VersionRequest;
use crate::version::{ApiVersion, PathFormat};

pub(crate) const DEFAULT_PREFIX: &str = "v";

/// Reads the version from a path segment such as `v1.2`
///
/// The segment is `prefix` followed by a dotted numeric token. It must be the
/// first path segment, or the one right after the configured API prefix.
#[derive(Debug, Clone)]
pub struct PathSegmentStrategy {
    prefix: String,
    api_prefix: Vec<String>,
    strict: bool,
    format: PathFormat,
    settings: StrategySettings,
}

impl PathSegmentStrategy {
    /// Create a strategy matching `/v{version}/...`
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            api_prefix: Vec::new(),
            strict: false,
            format: PathFormat::default(),
            settings: StrategySettings::default(),
        }
    }

    /// Set the segment prefix
    ///
    /// A prefix containing `/` such as `api/v` is split: the leading segments
    /// become the API prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let mut segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
        match segments.pop() {
            Some(last) => {
                if !segments.is_empty() {
                    self.api_prefix = segments.into_iter().map(str::to_string).collect();
                }
                self.prefix = last.to_string();
            }
            None => self.prefix = String::new(),
        }
        self
    }

    /// Set the leading API prefix, e.g. `api` or `/api/public`
    pub fn with_api_prefix(mut self, api_prefix: impl Into<String>) -> Self {
        self.api_prefix = api_prefix
            .into()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    /// Reject paths that carry no version segment
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set the granularity used by [`ExtractionStrategy::format_route_path`]
    pub fn with_format(mut self, format: PathFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.settings.priority = priority;
        self
    }

    /// Fail with `MissingRequired` when the path has no version
    pub fn with_required(mut self, required: bool) -> Self {
        self.settings.required = required;
        self
    }

    /// Enable or disable
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.settings.enabled = enabled;
        self
    }

    /// Whether strict mode is on
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Path segment for `version`, e.g. `v1.2`
    pub fn version_segment(&self, version: &ApiVersion) -> String {
        format!("{}{}", self.prefix, version.format_core(self.format))
    }

    /// Raw version token of `path`, if it is versioned
    fn match_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());

        for expected in &self.api_prefix {
            if segments.next()? != expected {
                return None;
            }
        }

        let token = segments.next()?.strip_prefix(self.prefix.as_str())?;
        let well_formed = token.starts_with(|c: char| c.is_ascii_digit())
            && token.chars().all(|c| c.is_ascii_digit() || c == '.');
        well_formed.then_some(token)
    }

    fn join(&self, segment: &str, path: &str) -> String {
        let mut out = String::new();
        for part in &self.api_prefix {
            out.push('/');
            out.push_str(part);
        }
        out.push('/');
        out.push_str(segment);

        let rest = path.trim_start_matches('/');
        if !rest.is_empty() {
            out.push('/');
            out.push_str(rest);
        }
        out
    }

    fn describe_pattern(&self) -> String {
        let mut pattern = String::new();
        for part in &self.api_prefix {
            pattern.push('/');
            pattern.push_str(part);
        }
        pattern.push('/');
        pattern.push_str(&self.prefix);
        pattern.push_str("{version}");
        pattern
    }
}

impl Default for PathSegmentStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionStrategy for PathSegmentStrategy {
    fn name(&self) -> &str {
        "path"
    }

    fn source(&self) -> VersionSource {
        VersionSource::Path
    }

    fn extract(&self, request: &VersionRequest) -> Result<Option<String>> {
        let path = request.path();
        if let Some(token) = self.match_path(path) {
            return Ok(Some(token.to_string()));
        }

        if self.strict {
            return Err(VersioningError::format(
                path,
                format!(
                    "path does not match required version pattern {}",
                    self.describe_pattern()
                ),
            ));
        }
        if self.settings.required {
            return Err(VersioningError::MissingRequired {
                strategy: self.name().to_string(),
                checked: vec![self.describe_pattern()],
            });
        }
        Ok(None)
    }

    /// Prefix `path` with the version segment
    ///
    /// Already-versioned paths are returned unchanged.
    fn format_route_path(&self, path: &str, version: &ApiVersion) -> String {
        if self.match_path(path).is_some() {
            return path.to_string();
        }
        self.join(&self.version_segment(version), path)
    }

    /// `/v1/x`, `/v1.0/x` and `/v1.0.0/x`, without duplicates
    fn alternative_paths(&self, path: &str, version: &ApiVersion) -> Vec<String> {
        let mut paths: Vec<String> = Vec::with_capacity(3);
        for format in [
            PathFormat::MajorOnly,
            PathFormat::MajorMinor,
            PathFormat::Semantic,
        ] {
            let segment = format!("{}{}", self.prefix, version.format_core(format));
            let candidate = self.join(&segment, path);
            if !paths.contains(&candidate) {
                paths.push(candidate);
            }
        }
        paths
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
