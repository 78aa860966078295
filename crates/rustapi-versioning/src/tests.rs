//! Scenario tests for version resolution
//!
//! These tests exercise the pieces together:
//! - strategies configured from serialized specs
//! - negotiation through the registry for every policy
//! - resolution under concurrent access

#[cfg(test)]
mod tests {
    use crate::*;
    use std::sync::Arc;
    use std::thread;

    fn v(s: &str) -> ApiVersion {
        s.parse().unwrap()
    }

    fn all_strategies() -> VersioningConfig {
        VersioningConfig::builder()
            .strategy(StrategySpec::header().with_priority(10))
            .strategy(StrategySpec::query().with_priority(20))
            .strategy(StrategySpec::accept().with_priority(30))
            .strategy(StrategySpec::path().with_priority(40))
            .no_default_version()
            .build()
            .unwrap()
    }

    #[test]
    fn test_each_source_resolves() {
        let resolver =
            VersionResolver::with_versions(all_strategies(), [v("1.0"), v("2.0"), v("3.0")])
                .unwrap();

        let cases = [
            (
                VersionRequest::get("/users").header("X-API-Version", "1"),
                v("1.0"),
                VersionSource::Header,
            ),
            (
                VersionRequest::get("/users?version=2"),
                v("2.0"),
                VersionSource::Query,
            ),
            (
                VersionRequest::get("/users").header("Accept", "application/vnd.api.v3+json"),
                v("3.0"),
                VersionSource::Accept,
            ),
            (VersionRequest::get("/v2/users"), v("2.0"), VersionSource::Path),
        ];

        for (request, expected, source) in cases {
            let resolved = resolver.resolve(&request).unwrap();
            assert_eq!(resolved.version, expected, "request: {:?}", request);
            assert_eq!(resolved.source, source);
        }

        assert_eq!(
            resolver.resolve(&VersionRequest::get("/users")).unwrap_err(),
            VersioningError::NoVersion
        );
    }

    #[test]
    fn test_priority_order_across_sources() {
        let resolver =
            VersionResolver::with_versions(all_strategies(), [v("1.0"), v("2.0"), v("3.0")])
                .unwrap();

        let request = VersionRequest::get("/v3/users?version=2").header("X-API-Version", "1");
        assert_eq!(resolver.resolve(&request).unwrap().version, v("1.0"));

        let request = VersionRequest::get("/v3/users?version=2");
        assert_eq!(resolver.resolve(&request).unwrap().version, v("2.0"));

        let descriptions = resolver.strategies();
        let priorities: Vec<i32> = descriptions.iter().map(|d| d.priority).collect();
        assert_eq!(priorities, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_strategies_from_json() {
        let config = VersioningConfig::from_json(
            r#"{
                "default_version": null,
                "strategies": [
                    {"type": "query", "param": "api-version", "fallbacks": ["v"], "priority": 1},
                    {"type": "path", "api_prefix": "api", "strict": true, "priority": 2}
                ]
            }"#,
        )
        .unwrap();
        let resolver = VersionResolver::with_versions(config, [v("1.0"), v("2.0")]).unwrap();

        let resolved = resolver
            .resolve(&VersionRequest::get("/anything?v=2"))
            .unwrap();
        assert_eq!(resolved.version, v("2.0"));
        assert_eq!(resolved.strategy.as_deref(), Some("query"));

        let resolved = resolver.resolve(&VersionRequest::get("/api/v1/users")).unwrap();
        assert_eq!(resolved.version, v("1.0"));

        // the strict path strategy is optional inside the composite
        assert_eq!(
            resolver.resolve(&VersionRequest::get("/users")).unwrap_err(),
            VersioningError::NoVersion
        );
    }

    #[test]
    fn test_required_strategy() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header().required().with_priority(1))
            .strategy(StrategySpec::query().with_priority(2))
            .build()
            .unwrap();
        let resolver = VersionResolver::with_versions(config, [v("1.0")]).unwrap();

        let err = resolver
            .resolve(&VersionRequest::get("/users?version=1"))
            .unwrap_err();
        assert!(matches!(err, VersioningError::MissingRequired { ref strategy, .. } if strategy == "header"));
        assert_eq!(err.error_code(), "MISSING_REQUIRED_VERSION");
    }

    #[test]
    fn test_policies_through_registry() {
        let registry = VersionRegistry::new();
        for raw in ["1.0", "1.2", "1.4", "2.0"] {
            registry.register(v(raw));
        }
        let requested = v("1.3");

        let expectations = [
            (NegotiationPolicy::Exact, None),
            // 1.2 and 1.4 tie at distance 10
            (NegotiationPolicy::ClosestCompatible, Some(v("1.2"))),
            (NegotiationPolicy::LatestCompatible, Some(v("1.4"))),
            (NegotiationPolicy::ClosestHigher, Some(v("1.4"))),
            (NegotiationPolicy::ClosestLower, Some(v("1.2"))),
        ];

        for (policy, expected) in expectations {
            assert_eq!(registry.negotiate(&requested, policy), expected, "{}", policy);
        }
    }

    #[test]
    fn test_lifecycle_reverts_are_allowed() {
        let registry = VersionRegistry::new();
        registry.register(v("1.0"));
        registry
            .deprecate(
                &v("1.0"),
                DeprecationInfo::new(),
                Some(chrono::Utc::now() - chrono::Duration::hours(1)),
            )
            .unwrap();
        assert!(registry.is_sunset(&v("1.0")));

        registry
            .update(&v("1.0"), |record| {
                record.deprecated = false;
                record.sunset_at = None;
            })
            .unwrap();
        assert_eq!(registry.lifecycle_of(&v("1.0")), Some(Lifecycle::Active));

        assert_eq!(
            registry.update(&v("4.0"), |_| {}).unwrap_err(),
            VersioningError::NotRegistered(v("4.0"))
        );
    }

    #[test]
    fn test_concurrent_resolution() {
        let config = VersioningConfig::builder()
            .strategy(StrategySpec::header())
            .build()
            .unwrap();
        let resolver = Arc::new(
            VersionResolver::with_versions(config, [v("1.0"), v("1.1"), v("2.0")]).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let resolver = Arc::clone(&resolver);
                thread::spawn(move || {
                    for i in 0..100 {
                        let raw = ["1.0", "1.5", "2.0", "2.3"][(t + i) % 4];
                        let request = VersionRequest::get("/users").header("X-API-Version", raw);
                        let resolved = resolver.resolve(&request).unwrap();
                        let expected = match raw {
                            "1.0" => "1.0",
                            "1.5" => "1.1",
                            _ => "2.0",
                        };
                        assert_eq!(resolved.version, expected.parse::<ApiVersion>().unwrap());

                        if i == 50 && t == 0 {
                            resolver.register("3.0".parse().unwrap());
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let stats = resolver.cache_stats();
        assert!(stats.version.hits > 0);
        assert!(stats.version.size <= 4);
    }

    #[test]
    fn test_upgrade_path_through_registry() {
        let registry = VersionRegistry::new();
        for raw in ["1.0", "2.0", "3.0"] {
            registry.register(v(raw));
        }
        registry.add_rule(CompatibilityRule::new(v("1.0"), v("2.0")).unwrap());
        registry.add_rule(CompatibilityRule::new(v("2.0"), v("3.0")).unwrap());

        assert_eq!(
            registry.find_upgrade_path(&v("1.0"), &v("3.0")),
            Some(vec![v("1.0"), v("2.0"), v("3.0")])
        );
    }
}
