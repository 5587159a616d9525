// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Vulnerabilities Family
 * Matches the target's package inventory against an advisory database
 *
 * Consumes the SBOM family's package list when one was produced earlier in
 * the run; otherwise degrades to collecting the inventory itself.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::errors::{ScanError, ScanResult};
use crate::families::results::ResultsStore;
use crate::families::sbom::{collect_packages, Package};
use crate::types::{FamilyType, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilitiesConfig {
    #[serde(default)]
    pub enabled: bool,

    /// JSON advisory database; no findings are produced without one.
    #[serde(default)]
    pub advisory_db: Option<PathBuf>,
}

/// One advisory record from the database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advisory {
    pub id: String,
    pub package: String,
    /// Exact affected version, or "*" for all versions.
    pub affected_version: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityFinding {
    pub id: String,
    pub package: String,
    pub version: String,
    pub severity: Severity,
    pub summary: String,
    #[serde(default)]
    pub fixed_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilitiesResult {
    pub findings: Vec<VulnerabilityFinding>,
    /// Whether the package inventory came from the SBOM family or from a
    /// direct file system scan.
    pub used_sbom_input: bool,
}

#[derive(Debug, Clone)]
pub struct VulnerabilitiesFamily {
    input_root: PathBuf,
    config: VulnerabilitiesConfig,
}

impl VulnerabilitiesFamily {
    pub fn new(input_root: PathBuf, config: VulnerabilitiesConfig) -> Self {
        Self { input_root, config }
    }

    pub fn family_type(&self) -> FamilyType {
        FamilyType::Vulnerabilities
    }

    pub async fn run(&self, results: &ResultsStore) -> ScanResult<VulnerabilitiesResult> {
        // Prefer the SBOM family's inventory. The SBOM family may be
        // disabled or may have failed; scan independently in that case.
        let (packages, used_sbom_input): (Vec<Package>, bool) = match results.sbom() {
            Some(sbom) => {
                debug!(count = sbom.packages.len(), "Using package inventory from SBOM family");
                (sbom.packages.clone(), true)
            }
            None => {
                debug!("No SBOM result available, collecting package inventory directly");
                (collect_packages(&self.input_root, true)?, false)
            }
        };

        let advisories = self.load_advisories()?;
        info!(
            packages = packages.len(),
            advisories = advisories.len(),
            "Matching packages against advisory database"
        );

        let mut findings = Vec::new();
        for pkg in &packages {
            for advisory in advisories.iter().filter(|a| a.package == pkg.name) {
                if advisory.affected_version == "*" || advisory.affected_version == pkg.version {
                    findings.push(VulnerabilityFinding {
                        id: advisory.id.clone(),
                        package: pkg.name.clone(),
                        version: pkg.version.clone(),
                        severity: advisory.severity,
                        summary: advisory.summary.clone(),
                        fixed_version: advisory.fixed_version.clone(),
                    });
                }
            }
        }

        Ok(VulnerabilitiesResult {
            findings,
            used_sbom_input,
        })
    }

    fn load_advisories(&self) -> ScanResult<Vec<Advisory>> {
        let Some(path) = &self.config.advisory_db else {
            debug!("No advisory database configured");
            return Ok(Vec::new());
        };

        let contents = std::fs::read_to_string(path).map_err(|e| ScanError::Family {
            family: FamilyType::Vulnerabilities,
            reason: format!("failed to read advisory database {}: {e}", path.display()),
        })?;

        serde_json::from_str(&contents).map_err(|e| ScanError::Family {
            family: FamilyType::Vulnerabilities,
            reason: format!("failed to parse advisory database {}: {e}", path.display()),
        })
    }
}
