// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Core Scan Types
 * Scan job configuration, family identifiers and asset metadata
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::families::FamiliesConfig;

/// Identifies one scan family. The total ordering among families is fixed
/// by the dependency rules in the family manager, not by this enum's
/// declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FamilyType {
    Sbom,
    Vulnerabilities,
    Secrets,
    Rootkits,
    Malware,
    Misconfiguration,
    Exploits,
}

impl FamilyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyType::Sbom => "sbom",
            FamilyType::Vulnerabilities => "vulnerabilities",
            FamilyType::Secrets => "secrets",
            FamilyType::Rootkits => "rootkits",
            FamilyType::Malware => "malware",
            FamilyType::Misconfiguration => "misconfiguration",
            FamilyType::Exploits => "exploits",
        }
    }
}

impl std::fmt::Display for FamilyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::High => write!(f, "HIGH"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::Low => write!(f, "LOW"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// Immutable description of one target asset scan job. Produced by the
/// external scheduler; read-only to both the provider lifecycle and the
/// family manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanJobConfig {
    /// Identifier of the scan result this job reports into. Scanner
    /// resource names are derived from it so that lifecycle operations
    /// stay idempotent across restarts.
    pub scan_result_id: String,

    /// The target asset being scanned.
    pub target: VmInfo,

    /// Which families run and with what parameters.
    pub families: FamiliesConfig,

    /// Overall job timeout.
    #[serde(default = "default_job_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_job_timeout_secs() -> u64 {
    3600
}

impl ScanJobConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Metadata for one discovered cloud VM.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmInfo {
    /// Opaque provider instance id, e.g. a full Azure resource id.
    pub instance_id: String,
    pub location: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub launch_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// A single key/value asset tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Scope selectors for target discovery. Both selectors use AND logic:
/// an asset matches only if it carries ALL of the listed tags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanScope {
    /// Resource groups to search; empty means all resource groups.
    #[serde(default)]
    pub resource_groups: Vec<String>,

    /// Include an asset only if it carries all of these tags.
    /// Empty selector includes everything.
    #[serde(default)]
    pub instance_tag_selector: Vec<Tag>,

    /// Exclude an asset if it carries all of these tags.
    /// Empty selector excludes nothing.
    #[serde(default)]
    pub instance_tag_exclusion: Vec<Tag>,
}

/// AND logic - the asset must carry every selector tag (key and value)
/// to match. An empty selector matches unconditionally.
fn has_all_tags(asset_tags: &[Tag], selector: &[Tag]) -> bool {
    if selector.is_empty() {
        return true;
    }
    if asset_tags.is_empty() {
        return false;
    }
    selector.iter().all(|wanted| {
        asset_tags
            .iter()
            .any(|t| t.key == wanted.key && t.value == wanted.value)
    })
}

impl ScanScope {
    /// Include only if the asset carries ALL inclusion tags. An empty
    /// inclusion selector includes everything.
    pub fn includes(&self, asset_tags: &[Tag]) -> bool {
        has_all_tags(asset_tags, &self.instance_tag_selector)
    }

    /// Exclude only if the asset carries ALL exclusion tags. An empty
    /// exclusion selector excludes nothing.
    pub fn excludes(&self, asset_tags: &[Tag]) -> bool {
        if self.instance_tag_exclusion.is_empty() {
            return false;
        }
        has_all_tags(asset_tags, &self.instance_tag_exclusion)
    }

    pub fn matches(&self, asset_tags: &[Tag]) -> bool {
        self.includes(asset_tags) && !self.excludes(asset_tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Vec<Tag> {
        pairs.iter().map(|(k, v)| Tag::new(*k, *v)).collect()
    }

    #[test]
    fn include_requires_all_selector_tags() {
        let scope = ScanScope {
            instance_tag_selector: tags(&[("env", "prod")]),
            ..Default::default()
        };

        assert!(scope.includes(&tags(&[("env", "prod"), ("team", "x")])));
        assert!(!scope.includes(&tags(&[("team", "x")])));
        assert!(!scope.includes(&tags(&[("env", "staging")])));
    }

    #[test]
    fn exclude_requires_all_selector_tags() {
        let scope = ScanScope {
            instance_tag_exclusion: tags(&[("env", "prod")]),
            ..Default::default()
        };

        assert!(scope.excludes(&tags(&[("env", "prod"), ("team", "x")])));
        // Asset missing the env tag entirely is not excluded.
        assert!(!scope.excludes(&tags(&[("team", "x")])));
    }

    #[test]
    fn empty_selectors_match_everything_and_exclude_nothing() {
        let scope = ScanScope::default();
        assert!(scope.includes(&[]));
        assert!(!scope.excludes(&tags(&[("env", "prod")])));
        assert!(scope.matches(&tags(&[("any", "thing")])));
    }

    #[test]
    fn multi_tag_selector_is_logical_and() {
        let scope = ScanScope {
            instance_tag_selector: tags(&[("env", "prod"), ("team", "x")]),
            ..Default::default()
        };

        assert!(scope.includes(&tags(&[("env", "prod"), ("team", "x"), ("extra", "y")])));
        assert!(!scope.includes(&tags(&[("env", "prod")])));
    }
}
