// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Misconfiguration Family
 * Host hardening checks on the mounted target volume
 *
 * Checks:
 * - sshd permitting root login or password authentication
 * - accounts with empty password hashes in etc/shadow
 * - world-writable files under etc/
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use crate::errors::{ScanError, ScanResult};
use crate::types::{FamilyType, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MisconfigurationConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconfigurationFinding {
    pub check_id: String,
    pub path: String,
    pub description: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconfigurationResult {
    pub findings: Vec<MisconfigurationFinding>,
}

#[derive(Debug, Clone)]
pub struct MisconfigurationFamily {
    input_root: PathBuf,
}

impl MisconfigurationFamily {
    pub fn new(input_root: PathBuf, _config: MisconfigurationConfig) -> Self {
        Self { input_root }
    }

    pub fn family_type(&self) -> FamilyType {
        FamilyType::Misconfiguration
    }

    pub async fn run(&self) -> ScanResult<MisconfigurationResult> {
        if !self.input_root.is_dir() {
            return Err(ScanError::Family {
                family: FamilyType::Misconfiguration,
                reason: format!("input root {} is not a directory", self.input_root.display()),
            });
        }

        info!(root = %self.input_root.display(), "Running host misconfiguration checks");

        let mut findings = Vec::new();
        self.check_sshd(&mut findings);
        self.check_shadow(&mut findings);
        self.check_world_writable_etc(&mut findings);

        Ok(MisconfigurationResult { findings })
    }

    fn check_sshd(&self, findings: &mut Vec<MisconfigurationFinding>) {
        let path = self.input_root.join("etc/ssh/sshd_config");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return;
        };

        for line in contents.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            let lowered = line.to_ascii_lowercase();
            if lowered.starts_with("permitrootlogin") && lowered.ends_with("yes") {
                findings.push(MisconfigurationFinding {
                    check_id: "sshd-permit-root-login".to_string(),
                    path: "etc/ssh/sshd_config".to_string(),
                    description: "sshd permits direct root login".to_string(),
                    severity: Severity::High,
                });
            }
            if lowered.starts_with("passwordauthentication") && lowered.ends_with("yes") {
                findings.push(MisconfigurationFinding {
                    check_id: "sshd-password-auth".to_string(),
                    path: "etc/ssh/sshd_config".to_string(),
                    description: "sshd permits password authentication".to_string(),
                    severity: Severity::Medium,
                });
            }
        }
    }

    fn check_shadow(&self, findings: &mut Vec<MisconfigurationFinding>) {
        let path = self.input_root.join("etc/shadow");
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return;
        };

        for line in contents.lines() {
            let mut fields = line.split(':');
            let (Some(user), Some(hash)) = (fields.next(), fields.next()) else {
                continue;
            };
            if hash.is_empty() {
                findings.push(MisconfigurationFinding {
                    check_id: "empty-password-hash".to_string(),
                    path: "etc/shadow".to_string(),
                    description: format!("account '{user}' has an empty password"),
                    severity: Severity::Critical,
                });
            }
        }
    }

    fn check_world_writable_etc(&self, findings: &mut Vec<MisconfigurationFinding>) {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let etc = self.input_root.join("etc");
            let Ok(entries) = std::fs::read_dir(&etc) else {
                return;
            };

            for entry in entries.flatten() {
                let Ok(metadata) = entry.metadata() else {
                    continue;
                };
                if metadata.is_file() && metadata.permissions().mode() & 0o002 != 0 {
                    let rel = format!("etc/{}", entry.file_name().to_string_lossy());
                    findings.push(MisconfigurationFinding {
                        check_id: "world-writable-etc".to_string(),
                        path: rel,
                        description: "configuration file is world-writable".to_string(),
                        severity: Severity::Medium,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_permissive_sshd_and_empty_shadow_password() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("etc/ssh")).unwrap();
        std::fs::write(
            dir.path().join("etc/ssh/sshd_config"),
            "# comment\nPermitRootLogin yes\nPasswordAuthentication no\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("etc/shadow"),
            "root:$6$salt$hash:19000:0:99999:7:::\nbackup::19000:0:99999:7:::\n",
        )
        .unwrap();

        let family = MisconfigurationFamily::new(
            dir.path().to_path_buf(),
            MisconfigurationConfig::default(),
        );
        let result = family.run().await.unwrap();

        let ids: Vec<&str> = result.findings.iter().map(|f| f.check_id.as_str()).collect();
        assert!(ids.contains(&"sshd-permit-root-login"));
        assert!(ids.contains(&"empty-password-hash"));
        assert!(!ids.contains(&"sshd-password-auth"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn flags_world_writable_files_in_etc() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("etc")).unwrap();
        let loose = dir.path().join("etc/loose.conf");
        std::fs::write(&loose, "x").unwrap();
        std::fs::set_permissions(&loose, std::fs::Permissions::from_mode(0o666)).unwrap();

        let family = MisconfigurationFamily::new(
            dir.path().to_path_buf(),
            MisconfigurationConfig::default(),
        );
        let result = family.run().await.unwrap();
        assert!(result
            .findings
            .iter()
            .any(|f| f.check_id == "world-writable-etc" && f.path == "etc/loose.conf"));
    }
}
