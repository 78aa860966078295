//! API Version type and parsing
//!
//! Provides semantic versioning support for API versions, including
//! pre-release and build metadata.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use thiserror::Error;

/// Longest version token accepted by the parser
pub const MAX_VERSION_LEN: usize = 100;

/// API version using semantic versioning
///
/// Supports formats like:
/// - `1`, `v1` (major only, minor and patch default to 0)
/// - `1.2`, `v1.2` (major.minor, patch defaults to 0)
/// - `1.2.3`, `1.2.3-beta.1`, `1.2.3-rc.1+build.5`
///
/// Equality, hashing and ordering ignore `build` but not `prerelease`.
#[derive(Debug, Clone, Default)]
pub struct ApiVersion {
    /// Major version number
    pub major: u32,
    /// Minor version number (defaults to 0)
    pub minor: u32,
    /// Patch version number (defaults to 0)
    pub patch: u32,
    /// Pre-release identifiers, e.g. `alpha.1`
    pub prerelease: Option<String>,
    /// Build metadata, e.g. `20240101`
    pub build: Option<String>,
}

impl ApiVersion {
    /// Create a new version
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
        }
    }

    /// Create a version with only major number
    pub fn major(major: u32) -> Self {
        Self::new(major, 0, 0)
    }

    /// Create version 1.0.0
    pub fn v1() -> Self {
        Self::new(1, 0, 0)
    }

    /// Create version 2.0.0
    pub fn v2() -> Self {
        Self::new(2, 0, 0)
    }

    /// Create version 3.0.0
    pub fn v3() -> Self {
        Self::new(3, 0, 0)
    }

    /// Attach pre-release identifiers
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Attach build metadata
    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Parse a version string
    pub fn parse(input: &str) -> Result<Self, VersionParseError> {
        input.parse()
    }

    /// Whether this is a pre-release version
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }

    /// Check if this version can serve a client expecting `other`
    ///
    /// Structural rule only: same major version and `self >= other`.
    pub fn is_compatible_with(&self, other: &ApiVersion) -> bool {
        self.major == other.major && self >= other
    }

    /// Next major version (`2.3.4` -> `3.0.0`)
    pub fn bump_major(&self) -> Self {
        Self::new(self.major.saturating_add(1), 0, 0)
    }

    /// Next minor version (`2.3.4` -> `2.4.0`)
    pub fn bump_minor(&self) -> Self {
        Self::new(self.major, self.minor.saturating_add(1), 0)
    }

    /// Next patch version (`2.3.4` -> `2.3.5`)
    pub fn bump_patch(&self) -> Self {
        Self::new(self.major, self.minor, self.patch.saturating_add(1))
    }

    /// Whether this version lies in `range`
    pub fn satisfies(&self, range: &VersionRange) -> bool {
        range.contains(self)
    }

    /// Render the numeric core using the given granularity
    pub fn format_core(&self, format: PathFormat) -> String {
        match format {
            PathFormat::MajorOnly => self.major.to_string(),
            PathFormat::MajorMinor => format!("{}.{}", self.major, self.minor),
            PathFormat::Semantic => format!("{}.{}.{}", self.major, self.minor, self.patch),
            PathFormat::Auto => {
                if self.minor == 0 && self.patch == 0 {
                    self.major.to_string()
                } else if self.patch == 0 {
                    format!("{}.{}", self.major, self.minor)
                } else {
                    format!("{}.{}.{}", self.major, self.minor, self.patch)
                }
            }
        }
    }

    /// Format as path segment (e.g., "v1", "v1.2")
    pub fn as_path_segment(&self) -> String {
        format!("v{}", self.format_core(PathFormat::Auto))
    }
}

/// Granularity used when rendering a version into a route path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathFormat {
    /// `v1`
    MajorOnly,
    /// `v1.2`
    #[default]
    MajorMinor,
    /// `v1.2.3`
    Semantic,
    /// Shortest form that loses nothing: `v1`, `v1.2` or `v1.2.3`
    Auto,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl FromStr for ApiVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(VersionParseError::Empty);
        }
        if s.len() > MAX_VERSION_LEN {
            return Err(VersionParseError::TooLong(s.len()));
        }

        // Remove optional 'v' prefix
        let body = s
            .strip_prefix('v')
            .or_else(|| s.strip_prefix('V'))
            .unwrap_or(s);

        let (rest, build) = match body.split_once('+') {
            Some((rest, build)) => (rest, Some(build)),
            None => (body, None),
        };
        let (core, prerelease) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        if let Some(build) = build {
            validate_identifiers(build, false).map_err(|_| {
                VersionParseError::InvalidIdentifier(s.to_string())
            })?;
        }
        if let Some(pre) = prerelease {
            validate_identifiers(pre, true).map_err(|_| {
                VersionParseError::InvalidIdentifier(s.to_string())
            })?;
        }

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() > 3 {
            return Err(VersionParseError::InvalidFormat(s.to_string()));
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            *slot = parse_component(part).ok_or_else(|| {
                VersionParseError::InvalidNumber(s.to_string())
            })?;
        }

        Ok(ApiVersion {
            major: numbers[0],
            minor: numbers[1],
            patch: numbers[2],
            prerelease: prerelease.map(str::to_string),
            build: build.map(str::to_string),
        })
    }
}

/// Non-negative integer without leading zeros
fn parse_component(part: &str) -> Option<u32> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if part.len() > 1 && part.starts_with('0') {
        return None;
    }
    part.parse().ok()
}

fn validate_identifiers(input: &str, reject_leading_zero: bool) -> Result<(), ()> {
    for ident in input.split('.') {
        if ident.is_empty()
            || !ident
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        {
            return Err(());
        }
        let numeric = ident.bytes().all(|b| b.is_ascii_digit());
        if reject_leading_zero && numeric && ident.len() > 1 && ident.starts_with('0') {
            return Err(());
        }
    }
    Ok(())
}

/// Compare dot-separated pre-release identifiers.
///
/// Numeric identifiers compare as integers and rank below alphanumeric ones;
/// alphanumeric identifiers compare lexicographically; a shorter list that is a
/// prefix of a longer one ranks lower.
fn compare_prerelease(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
                    (Ok(nx), Ok(ny)) => nx.cmp(&ny).then_with(|| x.cmp(y)),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => x.cmp(y),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl PartialEq for ApiVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ApiVersion {}

impl Hash for ApiVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.prerelease.hash(state);
    }
}

impl PartialOrd for ApiVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ApiVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => compare_prerelease(a, b),
            })
    }
}

impl Serialize for ApiVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ApiVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Set of versions between two inclusive bounds, minus explicit exclusions
///
/// A missing bound is open. Written as `[1.0.0, 2.0.0]`, `[1.0.0, *]` or
/// `[*, *] !1.5.0`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRange {
    /// Minimum version (inclusive)
    pub min: Option<ApiVersion>,
    /// Maximum version (inclusive)
    pub max: Option<ApiVersion>,
    /// Versions inside the bounds that are still rejected
    pub excluded: Vec<ApiVersion>,
}

impl VersionRange {
    /// Range with no bounds
    pub fn any() -> Self {
        Self::default()
    }

    /// Every `major.x.y` release
    pub fn major(major: u32) -> Self {
        Self::between(
            ApiVersion::new(major, 0, 0),
            ApiVersion::new(major, u32::MAX, u32::MAX),
        )
    }

    /// `version` and everything above it
    pub fn at_least(version: ApiVersion) -> Self {
        Self {
            min: Some(version),
            ..Self::default()
        }
    }

    /// `version` and everything below it
    pub fn at_most(version: ApiVersion) -> Self {
        Self {
            max: Some(version),
            ..Self::default()
        }
    }

    /// Both bounds inclusive; empty when `min > max`
    pub fn between(min: ApiVersion, max: ApiVersion) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            excluded: Vec::new(),
        }
    }

    /// Exactly one version
    pub fn exact(version: ApiVersion) -> Self {
        Self::between(version.clone(), version)
    }

    /// Reject `version` even when it lies within the bounds
    pub fn excluding(mut self, version: ApiVersion) -> Self {
        if !self.excluded.contains(&version) {
            self.excluded.push(version);
        }
        self
    }

    /// Whether no version can satisfy the bounds
    pub fn is_empty(&self) -> bool {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) => min > max || (min == max && self.excluded.contains(min)),
            _ => false,
        }
    }

    pub fn contains(&self, version: &ApiVersion) -> bool {
        if self.excluded.contains(version) {
            return false;
        }
        if self.min.as_ref().is_some_and(|min| version < min) {
            return false;
        }
        !self.max.as_ref().is_some_and(|max| version > max)
    }

    /// Whether some version satisfies both ranges
    ///
    /// Exclusions only matter when the overlap is a single version.
    pub fn intersects(&self, other: &VersionRange) -> bool {
        let low = match (&self.min, &other.min) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.as_ref().or(b.as_ref()),
        };
        let high = match (&self.max, &other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.as_ref().or(b.as_ref()),
        };

        match (low, high) {
            (Some(low), Some(high)) if low > high => false,
            (Some(low), Some(high)) if low == high => self.contains(low) && other.contains(low),
            _ => true,
        }
    }

    /// Versions from `versions` inside the range, in their given order
    pub fn filter<'a, I>(&self, versions: I) -> Vec<ApiVersion>
    where
        I: IntoIterator<Item = &'a ApiVersion>,
    {
        versions
            .into_iter()
            .filter(|v| self.contains(v))
            .cloned()
            .collect()
    }

    /// Highest version from `versions` inside the range
    pub fn best_match<'a, I>(&self, versions: I) -> Option<ApiVersion>
    where
        I: IntoIterator<Item = &'a ApiVersion>,
    {
        versions.into_iter().filter(|v| self.contains(v)).max().cloned()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: &Option<ApiVersion>| b.as_ref().map_or("*".to_string(), ToString::to_string);
        write!(f, "[{}, {}]", bound(&self.min), bound(&self.max))?;
        for version in &self.excluded {
            write!(f, " !{}", version)?;
        }
        Ok(())
    }
}

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    /// Empty version string
    #[error("empty version string")]
    Empty,
    /// Input exceeds [`MAX_VERSION_LEN`]
    #[error("version string too long: {0} characters")]
    TooLong(usize),
    /// Invalid number in version string
    #[error("invalid number in version '{0}'")]
    InvalidNumber(String),
    /// Invalid version format
    #[error("invalid version format '{0}'")]
    InvalidFormat(String),
    /// Invalid pre-release or build identifier
    #[error("invalid pre-release or build identifier in '{0}'")]
    InvalidIdentifier(String),
}
