//! Per-version metadata: lifecycle, stability and deprecation details

use crate::version::ApiVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a version is in its life
///
/// `Sunset` is never stored; it is derived from the deprecation flag and the
/// sunset timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// Served normally
    Active,
    /// Served, with deprecation headers
    Deprecated,
    /// Deprecated and past its sunset date
    Sunset,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => f.write_str("active"),
            Self::Deprecated => f.write_str("deprecated"),
            Self::Sunset => f.write_str("sunset"),
        }
    }
}

/// Release maturity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    #[default]
    Stable,
    Beta,
    Alpha,
}

/// Severity of a deprecation notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    Info,
    #[default]
    Warning,
    Critical,
}

impl fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => f.write_str("info"),
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// Deprecation details attached to a version
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeprecationInfo {
    /// Notice severity
    #[serde(default)]
    pub warning_level: WarningLevel,
    /// What clients should move to, e.g. `/v2/users` or `2.0.0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Link to a migration guide
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide: Option<String>,
    /// Why the version is going away
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Overrides the generated notice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DeprecationInfo {
    /// Create deprecation details with default severity
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the severity
    pub fn with_warning_level(mut self, level: WarningLevel) -> Self {
        self.warning_level = level;
        self
    }

    /// Set the replacement
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// Set the migration guide link
    pub fn with_migration_guide(mut self, guide: impl Into<String>) -> Self {
        self.migration_guide = Some(guide.into());
        self
    }

    /// Set the reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Set a fixed notice
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Human readable notice for the `X-Deprecation-Notice` header
    pub fn notice(&self, sunset_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }

        let mut parts = vec!["This version is deprecated".to_string()];
        if let Some(sunset) = sunset_at {
            let days = (sunset - now).num_days();
            if now >= sunset {
                parts[0].push_str(" and has reached its sunset date");
            } else if days == 0 {
                parts[0].push_str(" and will be sunset today");
            } else if days == 1 {
                parts[0].push_str(" and will be sunset tomorrow");
            } else {
                parts[0].push_str(&format!(" and will be sunset in {} days", days));
            }
        }
        if let Some(replacement) = &self.replacement {
            parts.push(format!("Please use {} instead", replacement));
        }
        if let Some(reason) = &self.reason {
            parts.push(format!("Reason: {}", reason));
        }

        format!("{}.", parts.join(". "))
    }
}

/// Metadata the registry keeps for one version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// The version described
    pub version: ApiVersion,
    /// Whether the version is deprecated
    #[serde(default)]
    pub deprecated: bool,
    /// When a deprecated version stops being served
    #[serde(default)]
    pub sunset_at: Option<DateTime<Utc>>,
    /// Release maturity
    #[serde(default)]
    pub stability: Stability,
    /// Release date
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
    /// Short description
    #[serde(default)]
    pub description: Option<String>,
    /// Changelog link
    #[serde(default)]
    pub changelog_url: Option<String>,
    /// Documentation link
    #[serde(default)]
    pub documentation_url: Option<String>,
    /// Deprecation details
    #[serde(default)]
    pub deprecation: Option<DeprecationInfo>,
}

impl VersionRecord {
    /// Active, stable record
    pub fn new(version: ApiVersion) -> Self {
        Self {
            version,
            deprecated: false,
            sunset_at: None,
            stability: Stability::Stable,
            release_date: None,
            description: None,
            changelog_url: None,
            documentation_url: None,
            deprecation: None,
        }
    }

    /// Mark as deprecated
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Mark as deprecated with details
    pub fn deprecated_with(mut self, info: DeprecationInfo) -> Self {
        self.deprecated = true;
        self.deprecation = Some(info);
        self
    }

    /// Set the sunset timestamp
    pub fn with_sunset(mut self, at: DateTime<Utc>) -> Self {
        self.sunset_at = Some(at);
        self
    }

    /// Set the stability
    pub fn with_stability(mut self, stability: Stability) -> Self {
        self.stability = stability;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the release date
    pub fn with_release_date(mut self, date: DateTime<Utc>) -> Self {
        self.release_date = Some(date);
        self
    }

    /// Lifecycle at `now`
    pub fn lifecycle_at(&self, now: DateTime<Utc>) -> Lifecycle {
        match (self.deprecated, self.sunset_at) {
            (false, _) => Lifecycle::Active,
            (true, Some(sunset)) if now >= sunset => Lifecycle::Sunset,
            (true, _) => Lifecycle::Deprecated,
        }
    }

    /// Lifecycle now
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle_at(Utc::now())
    }

    /// Serializable summary at `now`
    pub fn info_at(&self, now: DateTime<Utc>) -> VersionInfo {
        let lifecycle = self.lifecycle_at(now);
        let deprecation = self.deprecated.then(|| {
            let details = self.deprecation.clone().unwrap_or_default();
            DeprecationSummary {
                warning_level: details.warning_level,
                is_sunset: lifecycle == Lifecycle::Sunset,
                sunset_date: self.sunset_at,
                days_until_sunset: self
                    .sunset_at
                    .map(|sunset| (sunset - now).num_days().max(0)),
                notice: details.notice(self.sunset_at, now),
                replacement: details.replacement,
                migration_guide: details.migration_guide,
                reason: details.reason,
            }
        });

        VersionInfo {
            version: self.version.clone(),
            lifecycle,
            is_deprecated: self.deprecated,
            stability: self.stability,
            release_date: self.release_date,
            description: self.description.clone(),
            changelog_url: self.changelog_url.clone(),
            documentation_url: self.documentation_url.clone(),
            deprecation,
        }
    }
}

/// Serializable view of a [`VersionRecord`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionInfo {
    pub version: ApiVersion,
    pub lifecycle: Lifecycle,
    pub is_deprecated: bool,
    pub stability: Stability,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecation: Option<DeprecationSummary>,
}

/// Deprecation part of [`VersionInfo`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeprecationSummary {
    pub warning_level: WarningLevel,
    pub is_sunset: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sunset_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_until_sunset: Option<i64>,
    pub notice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_guide: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
