// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Rootkits Family
 * Known rootkit artifact detection on the mounted target volume
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::errors::{ScanError, ScanResult};
use crate::types::FamilyType;

/// Artifact paths installed by known rootkit families. Relative to the
/// mounted volume root.
const KNOWN_ARTIFACTS: &[(&str, &str)] = &[
    ("usr/bin/bsd-port", "Ebury"),
    ("usr/include/gpm2.h", "Adore-ng"),
    ("dev/.lib", "Romanian rootkit"),
    ("usr/lib/libx.so", "Diamorphine userland component"),
    ("etc/rc.d/init.d/rc.modules", "Knark"),
    ("usr/share/.zk", "ZK rootkit"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootkitsConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Flag a populated ld.so.preload as a suspected userland hook.
    #[serde(default = "default_true")]
    pub check_preload_hooks: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RootkitsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            check_preload_hooks: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootkitFinding {
    pub rootkit_name: String,
    pub path: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootkitsResult {
    pub findings: Vec<RootkitFinding>,
}

#[derive(Debug, Clone)]
pub struct RootkitsFamily {
    input_root: PathBuf,
    config: RootkitsConfig,
}

impl RootkitsFamily {
    pub fn new(input_root: PathBuf, config: RootkitsConfig) -> Self {
        Self { input_root, config }
    }

    pub fn family_type(&self) -> FamilyType {
        FamilyType::Rootkits
    }

    pub async fn run(&self) -> ScanResult<RootkitsResult> {
        if !self.input_root.is_dir() {
            return Err(ScanError::Family {
                family: FamilyType::Rootkits,
                reason: format!("input root {} is not a directory", self.input_root.display()),
            });
        }

        info!(root = %self.input_root.display(), "Checking for rootkit artifacts");

        let mut findings = Vec::new();

        for (artifact, name) in KNOWN_ARTIFACTS {
            let candidate = self.input_root.join(artifact);
            if candidate.exists() {
                findings.push(RootkitFinding {
                    rootkit_name: (*name).to_string(),
                    path: (*artifact).to_string(),
                    kind: "known-artifact".to_string(),
                });
            }
        }

        // A populated ld.so.preload is a common userland rootkit hook.
        if self.config.check_preload_hooks {
            let preload = self.input_root.join("etc/ld.so.preload");
            if let Ok(contents) = std::fs::read_to_string(&preload) {
                if !contents.trim().is_empty() {
                    findings.push(RootkitFinding {
                        rootkit_name: "unknown".to_string(),
                        path: "etc/ld.so.preload".to_string(),
                        kind: "preload-hook".to_string(),
                    });
                }
            }
        }

        Ok(RootkitsResult { findings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn clean_volume_yields_no_findings() {
        let dir = tempfile::tempdir().unwrap();
        let family = RootkitsFamily::new(dir.path().to_path_buf(), RootkitsConfig::default());
        let result = family.run().await.unwrap();
        assert!(result.findings.is_empty());
    }

    #[tokio::test]
    async fn detects_known_artifact_and_preload_hook() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("usr/bin")).unwrap();
        std::fs::write(dir.path().join("usr/bin/bsd-port"), b"x").unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        std::fs::write(dir.path().join("etc/ld.so.preload"), "/lib/evil.so\n").unwrap();

        let family = RootkitsFamily::new(dir.path().to_path_buf(), RootkitsConfig::default());
        let result = family.run().await.unwrap();

        assert_eq!(result.findings.len(), 2);
        assert!(result.findings.iter().any(|f| f.rootkit_name == "Ebury"));
        assert!(result.findings.iter().any(|f| f.kind == "preload-hook"));
    }
}
