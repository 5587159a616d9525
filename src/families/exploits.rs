// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Exploits Family
 * Enriches vulnerability findings with known public exploits
 *
 * Consumes the vulnerabilities family's findings when they were produced
 * earlier in the run; with no vulnerability input the enrichment is empty
 * rather than an error.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::errors::{ScanError, ScanResult};
use crate::families::results::ResultsStore;
use crate::types::FamilyType;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ExploitsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// JSON object mapping vulnerability ids to exploit records.
    #[serde(default)]
    pub exploit_db: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploitRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploitFinding {
    pub vulnerability_id: String,
    pub exploit: ExploitRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExploitsResult {
    pub findings: Vec<ExploitFinding>,
    /// Whether vulnerability findings were available as input.
    pub used_vulnerabilities_input: bool,
}

#[derive(Debug, Clone)]
pub struct ExploitsFamily {
    config: ExploitsConfig,
}

impl ExploitsFamily {
    pub fn new(config: ExploitsConfig) -> Self {
        Self { config }
    }

    pub fn family_type(&self) -> FamilyType {
        FamilyType::Exploits
    }

    pub async fn run(&self, results: &ResultsStore) -> ScanResult<ExploitsResult> {
        // The vulnerabilities family may be disabled or may have failed;
        // enrichment simply has nothing to work on then.
        let Some(vulnerabilities) = results.vulnerabilities() else {
            debug!("No vulnerability results available, nothing to enrich");
            return Ok(ExploitsResult {
                findings: Vec::new(),
                used_vulnerabilities_input: false,
            });
        };

        let index = self.load_exploit_index()?;
        info!(
            vulnerabilities = vulnerabilities.findings.len(),
            indexed = index.len(),
            "Enriching vulnerabilities with known exploits"
        );

        let mut findings = Vec::new();
        for finding in &vulnerabilities.findings {
            if let Some(exploits) = index.get(&finding.id) {
                for exploit in exploits {
                    findings.push(ExploitFinding {
                        vulnerability_id: finding.id.clone(),
                        exploit: exploit.clone(),
                    });
                }
            }
        }

        Ok(ExploitsResult {
            findings,
            used_vulnerabilities_input: true,
        })
    }

    fn load_exploit_index(&self) -> ScanResult<HashMap<String, Vec<ExploitRecord>>> {
        let Some(path) = &self.config.exploit_db else {
            debug!("No exploit database configured");
            return Ok(HashMap::new());
        };

        let contents = std::fs::read_to_string(path).map_err(|e| ScanError::Family {
            family: FamilyType::Exploits,
            reason: format!("failed to read exploit database {}: {e}", path.display()),
        })?;

        serde_json::from_str(&contents).map_err(|e| ScanError::Family {
            family: FamilyType::Exploits,
            reason: format!("failed to parse exploit database {}: {e}", path.display()),
        })
    }
}
