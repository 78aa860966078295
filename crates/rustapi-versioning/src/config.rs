//! Resolver configuration
//!
//! [`VersioningConfig`] can be built in code, deserialized from JSON, or (with
//! the `config` feature) overlaid with `RUSTAPI_VERSIONING_*` environment
//! variables.
//!
//! ```rust
//! use rustapi_versioning::{ApiVersion, NegotiationPolicy, StrategySpec, VersioningConfig};
//!
//! let config = VersioningConfig::builder()
//!     .default_version(ApiVersion::v1())
//!     .strategy(StrategySpec::header().with_priority(10))
//!     .strategy(StrategySpec::query().with_priority(20))
//!     .negotiation_policy(NegotiationPolicy::LatestCompatible)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.strategies.len(), 2);
//! ```

use crate::cache::{CacheConfig, PoolConfig};
use crate::compat::{CompatibilityMatrix, NegotiationPolicy};
use crate::error::{Result, VersioningError};
use crate::strategy::StrategySpec;
use crate::version::ApiVersion;
use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by `from_env`
pub const ENV_PREFIX: &str = "RUSTAPI_VERSIONING_";

/// Everything the resolver needs besides the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersioningConfig {
    /// Version used when the request carries none
    pub default_version: Option<ApiVersion>,
    /// Extraction strategies, tried by ascending priority
    pub strategies: Vec<StrategySpec>,
    /// Policy used when the requested version is not registered
    pub negotiation_policy: NegotiationPolicy,
    /// Rules consulted during negotiation
    pub compatibility_matrix: CompatibilityMatrix,
    /// Negotiate a substitute for unsupported versions
    pub auto_fallback: bool,
    /// Reject unsupported versions outright
    pub strict_matching: bool,
    /// Serve `default_version` when negotiation finds nothing
    pub fallback_to_default: bool,
    /// Emit `API-Version` on resolved responses
    pub include_version_headers: bool,
    /// Emit deprecation and sunset headers on resolved responses
    pub deprecation_warnings: bool,
    /// Resolution cache pools
    pub cache: CacheConfig,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            default_version: Some(ApiVersion::v1()),
            strategies: vec![StrategySpec::path()],
            negotiation_policy: NegotiationPolicy::ClosestCompatible,
            compatibility_matrix: CompatibilityMatrix::new(),
            auto_fallback: true,
            strict_matching: false,
            fallback_to_default: true,
            include_version_headers: true,
            deprecation_warnings: true,
            cache: CacheConfig::default(),
        }
    }
}

impl VersioningConfig {
    /// Start a builder from the defaults
    pub fn builder() -> VersioningConfigBuilder {
        VersioningConfigBuilder::new()
    }

    /// Production preset: unsupported versions are rejected
    pub fn strict() -> Self {
        Self {
            strict_matching: true,
            auto_fallback: false,
            fallback_to_default: false,
            ..Self::default()
        }
    }

    /// Development preset: always try to serve something
    pub fn permissive() -> Self {
        Self {
            strict_matching: false,
            auto_fallback: true,
            fallback_to_default: true,
            deprecation_warnings: false,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| VersioningError::Config(format!("invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| VersioningError::Config(e.to_string()))
    }

    /// Whether an unsupported version should fail without negotiation
    pub fn rejects_unsupported(&self) -> bool {
        self.strict_matching || !self.auto_fallback
    }

    /// Check settings that would make the resolver unusable
    pub fn validate(&self) -> Result<()> {
        if self.strategies.is_empty() {
            return Err(VersioningError::Config(
                "at least one versioning strategy must be specified".to_string(),
            ));
        }

        if !self.strategies.iter().any(|s| s.enabled) {
            return Err(VersioningError::Config(
                "at least one versioning strategy must be enabled".to_string(),
            ));
        }

        if self.cache.enabled {
            let pools = [
                ("version", &self.cache.version),
                ("route", &self.cache.route),
                ("fingerprint", &self.cache.fingerprint),
            ];
            for (name, pool) in pools {
                if pool.enabled && pool.capacity == 0 {
                    return Err(VersioningError::Config(format!(
                        "cache pool '{}' is enabled with zero capacity",
                        name
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(feature = "config")]
mod env {
    use super::*;
    use std::str::FromStr;

    /// Scalar settings that may come from the environment
    #[derive(Debug, Default, Deserialize)]
    struct EnvOverrides {
        default_version: Option<String>,
        negotiation_policy: Option<String>,
        auto_fallback: Option<bool>,
        strict_matching: Option<bool>,
        fallback_to_default: Option<bool>,
        include_version_headers: Option<bool>,
        deprecation_warnings: Option<bool>,
        cache_enabled: Option<bool>,
    }

    fn parse_policy(value: &str) -> Result<NegotiationPolicy> {
        serde_json::from_value(serde_json::Value::String(value.trim().to_ascii_lowercase()))
            .map_err(|_| VersioningError::Config(format!("unknown negotiation policy '{}'", value)))
    }

    impl VersioningConfig {
        /// Defaults overlaid with `RUSTAPI_VERSIONING_*` variables
        ///
        /// Recognized: `DEFAULT_VERSION` (`none` clears it), `NEGOTIATION_POLICY`,
        /// `AUTO_FALLBACK`, `STRICT_MATCHING`, `FALLBACK_TO_DEFAULT`,
        /// `INCLUDE_VERSION_HEADERS`, `DEPRECATION_WARNINGS`, `CACHE_ENABLED`.
        pub fn from_env() -> Result<Self> {
            Self::default().with_env()
        }

        /// Overlay `RUSTAPI_VERSIONING_*` variables onto this configuration
        pub fn with_env(self) -> Result<Self> {
            self.with_vars(std::env::vars())
        }

        /// Same as [`VersioningConfig::with_env`], reading `vars` instead of the process environment
        pub fn with_vars<I>(mut self, vars: I) -> Result<Self>
        where
            I: IntoIterator<Item = (String, String)>,
        {
            let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX)
                .from_iter(vars)
                .map_err(|e| VersioningError::Config(e.to_string()))?;

            if let Some(raw) = overrides.default_version {
                self.default_version = if raw.trim().eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(ApiVersion::from_str(raw.trim())?)
                };
            }
            if let Some(raw) = overrides.negotiation_policy {
                self.negotiation_policy = parse_policy(&raw)?;
            }
            if let Some(value) = overrides.auto_fallback {
                self.auto_fallback = value;
            }
            if let Some(value) = overrides.strict_matching {
                self.strict_matching = value;
            }
            if let Some(value) = overrides.fallback_to_default {
                self.fallback_to_default = value;
            }
            if let Some(value) = overrides.include_version_headers {
                self.include_version_headers = value;
            }
            if let Some(value) = overrides.deprecation_warnings {
                self.deprecation_warnings = value;
            }
            if let Some(value) = overrides.cache_enabled {
                self.cache.enabled = value;
            }

            self.validate()?;
            Ok(self)
        }
    }

}

/// Fluent construction of a [`VersioningConfig`]
#[derive(Debug, Clone)]
pub struct VersioningConfigBuilder {
    config: VersioningConfig,
    strategies: Vec<StrategySpec>,
}

impl VersioningConfigBuilder {
    /// Start from [`VersioningConfig::default`]
    ///
    /// The default path strategy is replaced as soon as any strategy is added.
    pub fn new() -> Self {
        Self {
            config: VersioningConfig::default(),
            strategies: Vec::new(),
        }
    }

    /// Version used when the request carries none
    pub fn default_version(mut self, version: ApiVersion) -> Self {
        self.config.default_version = Some(version);
        self
    }

    /// Fail requests that carry no version
    pub fn no_default_version(mut self) -> Self {
        self.config.default_version = None;
        self
    }

    /// Add an extraction strategy
    pub fn strategy(mut self, strategy: StrategySpec) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Add several extraction strategies
    pub fn strategies(mut self, strategies: impl IntoIterator<Item = StrategySpec>) -> Self {
        self.strategies.extend(strategies);
        self
    }

    /// Negotiation policy
    pub fn negotiation_policy(mut self, policy: NegotiationPolicy) -> Self {
        self.config.negotiation_policy = policy;
        self
    }

    /// Compatibility rules
    pub fn compatibility_matrix(mut self, matrix: CompatibilityMatrix) -> Self {
        self.config.compatibility_matrix = matrix;
        self
    }

    /// Negotiate a substitute for unsupported versions
    pub fn auto_fallback(mut self, enabled: bool) -> Self {
        self.config.auto_fallback = enabled;
        self
    }

    /// Reject unsupported versions outright
    pub fn strict_matching(mut self, enabled: bool) -> Self {
        self.config.strict_matching = enabled;
        self
    }

    /// Serve the default version when negotiation finds nothing
    pub fn fallback_to_default(mut self, enabled: bool) -> Self {
        self.config.fallback_to_default = enabled;
        self
    }

    /// Emit `API-Version` on resolved responses
    pub fn include_version_headers(mut self, enabled: bool) -> Self {
        self.config.include_version_headers = enabled;
        self
    }

    /// Emit deprecation headers on resolved responses
    pub fn deprecation_warnings(mut self, enabled: bool) -> Self {
        self.config.deprecation_warnings = enabled;
        self
    }

    /// Cache settings
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Disable every cache pool
    pub fn without_cache(mut self) -> Self {
        self.config.cache = CacheConfig::disabled();
        self
    }

    /// Version pool settings
    pub fn version_cache(mut self, pool: PoolConfig) -> Self {
        self.config.cache.version = pool;
        self
    }

    /// Validate and return the configuration
    pub fn build(mut self) -> Result<VersioningConfig> {
        if !self.strategies.is_empty() {
            self.config.strategies = self.strategies;
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for VersioningConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
