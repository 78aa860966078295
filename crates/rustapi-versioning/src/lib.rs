//! API version resolution for RustAPI
//!
//! This crate decides, for every incoming request, which API version should
//! handle it:
//!
//! - Version parsing, ordering and bumping ([`ApiVersion`])
//! - Extraction strategies for path, header, query and `Accept` ([`ExtractionStrategy`])
//! - Compatibility rules and negotiation policies ([`CompatibilityMatrix`], [`Negotiator`])
//! - A registry of supported versions with deprecation and sunset metadata ([`VersionRegistry`])
//! - LRU + TTL caching of resolutions ([`ResolutionCache`])
//!
//! # Example
//!
//! ```rust
//! use rustapi_versioning::{
//!     ApiVersion, StrategySpec, VersionRequest, VersionResolver, VersioningConfig,
//! };
//!
//! let config = VersioningConfig::builder()
//!     .strategy(StrategySpec::header().with_priority(10))
//!     .strategy(StrategySpec::query().with_priority(20))
//!     .default_version(ApiVersion::v1())
//!     .build()
//!     .unwrap();
//!
//! let resolver = VersionResolver::with_versions(
//!     config,
//!     [ApiVersion::v1(), ApiVersion::new(1, 1, 0), ApiVersion::v2()],
//! )
//! .unwrap();
//!
//! let request = VersionRequest::get("/users").header("X-API-Version", "1.5");
//! let resolved = resolver.resolve(&request).unwrap();
//!
//! assert_eq!(resolved.version, ApiVersion::new(1, 1, 0));
//! assert!(resolved.negotiated);
//! ```

pub mod cache;
pub mod compat;
pub mod config;
pub mod error;
pub mod record;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod routes;
pub mod strategy;
pub mod version;

#[cfg(test)]
mod tests;

pub use cache::{
    CacheConfig, CachePool, CacheStats, CachedResolution, CleanupReport, LruCache, PoolConfig,
    PoolStats, ResolutionCache,
};
pub use compat::{
    version_distance, CompatibilityMatrix, CompatibilityRule, NegotiationPolicy,
    NegotiationReport, Negotiator,
};
pub use config::{VersioningConfig, VersioningConfigBuilder};
pub use error::{Result, VersioningError};
pub use record::{
    DeprecationInfo, DeprecationSummary, Lifecycle, Stability, VersionInfo, VersionRecord,
    WarningLevel,
};
pub use registry::{RegistryStatistics, VersionRegistry};
pub use request::VersionRequest;
pub use resolver::{ResolvedVersion, VersionResolver};
pub use routes::{RouteCatalog, RouteKey};
pub use strategy::{
    AcceptHeaderStrategy, CompositeStrategy, ExtractedToken, ExtractionStrategy, HeaderStrategy,
    PathSegmentStrategy, QueryParameterStrategy, StrategyDescription, StrategyKind, StrategySpec,
    VersionSource,
};
pub use version::{ApiVersion, PathFormat, VersionParseError, VersionRange};
