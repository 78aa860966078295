//! Compatibility rules and version negotiation
//!
//! [`CompatibilityMatrix`] decides whether one version can serve clients of
//! another. [`Negotiator`] uses it to pick a substitute when the requested
//! version is not available.

use crate::error::{Result, VersioningError};
use crate::version::ApiVersion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::fmt;

/// Compatibility between an ordered pair of versions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityRule {
    /// Source version
    pub from: ApiVersion,
    /// Target version
    pub to: ApiVersion,
    /// Whether `to` can serve clients of `from`
    pub compatible: bool,
    /// Whether payloads must be transformed between the two
    pub transformation_required: bool,
    /// Human readable breaking changes, in order
    pub breaking_changes: Vec<String>,
    /// Free-form migration notes
    pub migration_notes: Option<String>,
}

impl CompatibilityRule {
    /// Create a rule marking `from -> to` compatible
    ///
    /// Fails when both ends are the same version.
    pub fn new(from: ApiVersion, to: ApiVersion) -> Result<Self> {
        if from == to {
            return Err(VersioningError::Config(format!(
                "compatibility rule endpoints must differ (got {} -> {})",
                from, to
            )));
        }
        Ok(Self {
            from,
            to,
            compatible: true,
            transformation_required: false,
            breaking_changes: Vec::new(),
            migration_notes: None,
        })
    }

    /// Set the compatible flag
    pub fn compatible(mut self, compatible: bool) -> Self {
        self.compatible = compatible;
        self
    }

    /// Mark the pair as needing payload transformation
    pub fn with_transformation(mut self) -> Self {
        self.transformation_required = true;
        self
    }

    /// Append a breaking change
    pub fn with_breaking_change(mut self, change: impl Into<String>) -> Self {
        self.breaking_changes.push(change.into());
        self
    }

    /// Set migration notes
    pub fn with_migration_notes(mut self, notes: impl Into<String>) -> Self {
        self.migration_notes = Some(notes.into());
        self
    }
}

/// Rule graph over known versions
///
/// Lookups check the exact ordered pair, then the reverse pair, then fall
/// back to "same major and not older".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixDocument", into = "MatrixDocument")]
pub struct CompatibilityMatrix {
    versions: BTreeSet<ApiVersion>,
    rules: BTreeMap<(ApiVersion, ApiVersion), CompatibilityRule>,
}

impl CompatibilityMatrix {
    /// Create an empty matrix
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a known version without rules
    pub fn add_version(&mut self, version: ApiVersion) {
        self.versions.insert(version);
    }

    /// Insert or replace the rule for its ordered pair
    ///
    /// Both endpoints become known versions.
    pub fn add_rule(&mut self, rule: CompatibilityRule) {
        self.versions.insert(rule.from.clone());
        self.versions.insert(rule.to.clone());
        self.rules
            .insert((rule.from.clone(), rule.to.clone()), rule);
    }

    /// Declare `a` and `b` compatible in both directions
    pub fn add_bidirectional(&mut self, a: ApiVersion, b: ApiVersion) -> Result<()> {
        self.add_rule(CompatibilityRule::new(a.clone(), b.clone())?);
        self.add_rule(CompatibilityRule::new(b, a)?);
        Ok(())
    }

    /// Builder form of [`CompatibilityMatrix::add_rule`]
    pub fn with_rule(mut self, rule: CompatibilityRule) -> Self {
        self.add_rule(rule);
        self
    }

    /// Rule stored for the exact ordered pair
    pub fn rule(&self, from: &ApiVersion, to: &ApiVersion) -> Option<&CompatibilityRule> {
        self.rules.get(&(from.clone(), to.clone()))
    }

    /// Whether `to` can serve clients of `from`
    pub fn is_compatible(&self, from: &ApiVersion, to: &ApiVersion) -> bool {
        if from == to {
            return true;
        }
        if let Some(rule) = self.rule(from, to) {
            return rule.compatible;
        }
        if let Some(rule) = self.rule(to, from) {
            return rule.compatible;
        }
        from.major == to.major && from <= to
    }

    /// Compatible in at least one direction
    pub fn is_compatible_either_way(&self, a: &ApiVersion, b: &ApiVersion) -> bool {
        self.is_compatible(a, b) || self.is_compatible(b, a)
    }

    /// Known versions compatible with `version` (itself included), sorted
    pub fn compatible_versions(&self, version: &ApiVersion) -> Vec<ApiVersion> {
        self.versions
            .iter()
            .filter(|other| self.is_compatible(version, other))
            .cloned()
            .collect()
    }

    /// Transformation flag of the exact pair rule
    pub fn requires_transformation(&self, from: &ApiVersion, to: &ApiVersion) -> bool {
        from != to
            && self
                .rule(from, to)
                .map(|r| r.transformation_required)
                .unwrap_or(false)
    }

    /// Breaking changes of the exact pair rule
    pub fn breaking_changes(&self, from: &ApiVersion, to: &ApiVersion) -> Vec<String> {
        self.rule(from, to)
            .map(|r| r.breaking_changes.clone())
            .unwrap_or_default()
    }

    /// Migration notes of the exact pair rule
    pub fn migration_notes(&self, from: &ApiVersion, to: &ApiVersion) -> Option<String> {
        self.rule(from, to).and_then(|r| r.migration_notes.clone())
    }

    /// Shortest chain of compatible hops from `from` to `to`, both ends included
    ///
    /// Intermediate hops are taken from the known versions in ascending order,
    /// so the result is deterministic.
    pub fn find_upgrade_path(&self, from: &ApiVersion, to: &ApiVersion) -> Option<Vec<ApiVersion>> {
        if from == to {
            return Some(vec![from.clone()]);
        }

        let mut queue = VecDeque::from([vec![from.clone()]]);
        let mut visited: HashSet<ApiVersion> = HashSet::from([from.clone()]);

        while let Some(path) = queue.pop_front() {
            let current = path.last()?;

            if self.is_compatible(current, to) {
                let mut complete = path.clone();
                complete.push(to.clone());
                return Some(complete);
            }

            for next in &self.versions {
                if next == current || visited.contains(next) || !self.is_compatible(current, next) {
                    continue;
                }
                visited.insert(next.clone());
                let mut extended = path.clone();
                extended.push(next.clone());
                queue.push_back(extended);
            }
        }

        None
    }

    /// Every known version, sorted
    pub fn all_versions(&self) -> Vec<ApiVersion> {
        self.versions.iter().cloned().collect()
    }

    /// Every stored rule, ordered by pair
    pub fn rules(&self) -> impl Iterator<Item = &CompatibilityRule> {
        self.rules.values()
    }

    /// Number of stored rules
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

/// Serialized shape: `{"versions": [...], "rules": {"1.0.0 -> 1.1.0": {...}}}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MatrixDocument {
    #[serde(default)]
    versions: Vec<ApiVersion>,
    #[serde(default)]
    rules: BTreeMap<String, RuleDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleDocument {
    #[serde(default = "default_compatible", alias = "is_compatible")]
    compatible: bool,
    #[serde(default)]
    transformation_required: bool,
    #[serde(default)]
    breaking_changes: Vec<String>,
    #[serde(default)]
    migration_notes: Option<String>,
}

fn default_compatible() -> bool {
    true
}

const RULE_KEY_SEPARATOR: &str = " -> ";

impl From<CompatibilityMatrix> for MatrixDocument {
    fn from(matrix: CompatibilityMatrix) -> Self {
        let rules = matrix
            .rules
            .into_values()
            .map(|rule| {
                (
                    format!("{}{}{}", rule.from, RULE_KEY_SEPARATOR, rule.to),
                    RuleDocument {
                        compatible: rule.compatible,
                        transformation_required: rule.transformation_required,
                        breaking_changes: rule.breaking_changes,
                        migration_notes: rule.migration_notes,
                    },
                )
            })
            .collect();

        Self {
            versions: matrix.versions.into_iter().collect(),
            rules,
        }
    }
}

impl TryFrom<MatrixDocument> for CompatibilityMatrix {
    type Error = VersioningError;

    fn try_from(doc: MatrixDocument) -> Result<Self> {
        let mut matrix = CompatibilityMatrix::new();
        for version in doc.versions {
            matrix.add_version(version);
        }

        for (key, rule) in doc.rules {
            let (from, to) = key.split_once(RULE_KEY_SEPARATOR).ok_or_else(|| {
                VersioningError::Config(format!(
                    "invalid rule key '{}', expected 'FROM -> TO'",
                    key
                ))
            })?;

            let mut built = CompatibilityRule::new(from.trim().parse()?, to.trim().parse()?)?
                .compatible(rule.compatible);
            built.transformation_required = rule.transformation_required;
            built.breaking_changes = rule.breaking_changes;
            built.migration_notes = rule.migration_notes;
            matrix.add_rule(built);
        }

        Ok(matrix)
    }
}

/// How to choose a substitute for an unavailable version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationPolicy {
    /// Only the requested version itself
    Exact,
    /// Smallest weighted distance; ties go to the smallest version
    #[default]
    ClosestCompatible,
    /// Highest compatible version
    LatestCompatible,
    /// Lowest compatible version not older than the request
    ClosestHigher,
    /// Highest compatible version not newer than the request
    ClosestLower,
}

impl fmt::Display for NegotiationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::ClosestCompatible => "closest_compatible",
            Self::LatestCompatible => "latest_compatible",
            Self::ClosestHigher => "closest_higher",
            Self::ClosestLower => "closest_lower",
        };
        f.write_str(name)
    }
}

/// Weighted distance: `|Δmajor|*1000 + |Δminor|*10 + |Δpatch|`
pub fn version_distance(a: &ApiVersion, b: &ApiVersion) -> u64 {
    u64::from(a.major.abs_diff(b.major)) * 1000
        + u64::from(a.minor.abs_diff(b.minor)) * 10
        + u64::from(a.patch.abs_diff(b.patch))
}

/// Picks the version to serve for a request
#[derive(Debug, Clone, Copy)]
pub struct Negotiator<'a> {
    matrix: &'a CompatibilityMatrix,
}

impl<'a> Negotiator<'a> {
    /// Create a negotiator over `matrix`
    pub fn new(matrix: &'a CompatibilityMatrix) -> Self {
        Self { matrix }
    }

    /// Choose a version from `available` for a client asking for `requested`
    ///
    /// Apart from [`NegotiationPolicy::Exact`], only versions related to
    /// `requested` through the matrix (in either direction) are considered.
    /// Checking only `requested -> candidate` would drop older minors of the
    /// same major, so a request above every registered minor (1.5 against
    /// 1.0 and 1.1) would find no candidate at all.
    pub fn negotiate(
        &self,
        requested: &ApiVersion,
        available: &[ApiVersion],
        policy: NegotiationPolicy,
    ) -> Option<ApiVersion> {
        if policy == NegotiationPolicy::Exact {
            return available.iter().find(|v| *v == requested).cloned();
        }

        let compatible: Vec<&ApiVersion> = available
            .iter()
            .filter(|v| self.matrix.is_compatible_either_way(requested, v))
            .collect();

        let chosen = match policy {
            NegotiationPolicy::Exact => None,
            NegotiationPolicy::ClosestCompatible => compatible.into_iter().min_by(|a, b| {
                version_distance(requested, a)
                    .cmp(&version_distance(requested, b))
                    .then_with(|| a.cmp(b))
            }),
            NegotiationPolicy::LatestCompatible => compatible.into_iter().max(),
            NegotiationPolicy::ClosestHigher => {
                compatible.into_iter().filter(|v| *v >= requested).min()
            }
            NegotiationPolicy::ClosestLower => {
                compatible.into_iter().filter(|v| *v <= requested).max()
            }
        };

        chosen.cloned()
    }

    /// Describe how `negotiated` relates to `requested`
    pub fn report(&self, requested: &ApiVersion, negotiated: &ApiVersion) -> NegotiationReport {
        let exact_match = requested == negotiated;
        NegotiationReport {
            requested: requested.clone(),
            negotiated: negotiated.clone(),
            exact_match,
            compatible: self.matrix.is_compatible(requested, negotiated),
            transformation_required: self.matrix.requires_transformation(requested, negotiated),
            breaking_changes: if exact_match {
                Vec::new()
            } else {
                self.matrix.breaking_changes(requested, negotiated)
            },
            migration_notes: if exact_match {
                None
            } else {
                self.matrix.migration_notes(requested, negotiated)
            },
        }
    }
}

/// Outcome of a negotiation, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NegotiationReport {
    /// Version the client asked for
    pub requested: ApiVersion,
    /// Version chosen
    pub negotiated: ApiVersion,
    /// Whether no substitution happened
    pub exact_match: bool,
    /// Matrix verdict for `requested -> negotiated`
    pub compatible: bool,
    /// Whether payloads need transformation
    pub transformation_required: bool,
    /// Breaking changes between the two
    pub breaking_changes: Vec<String>,
    /// Migration notes between the two
    pub migration_notes: Option<String>,
}
