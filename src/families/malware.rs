// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Malware Family
 * Hash-based malware detection on the mounted target volume
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::errors::{ScanError, ScanResult};
use crate::families::walk_regular_files;
use crate::types::FamilyType;

const DEFAULT_MAX_FILE_SIZE: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalwareConfig {
    #[serde(default)]
    pub enabled: bool,

    /// JSON object mapping lowercase hex sha256 digests to signature
    /// names. Without a database the family hashes files but finds
    /// nothing.
    #[serde(default)]
    pub signature_db: Option<PathBuf>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_max_file_size() -> u64 {
    DEFAULT_MAX_FILE_SIZE
}

impl Default for MalwareConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            signature_db: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalwareFinding {
    pub signature_name: String,
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MalwareResult {
    pub findings: Vec<MalwareFinding>,
    pub files_hashed: usize,
}

#[derive(Debug, Clone)]
pub struct MalwareFamily {
    input_root: PathBuf,
    config: MalwareConfig,
}

impl MalwareFamily {
    pub fn new(input_root: PathBuf, config: MalwareConfig) -> Self {
        Self { input_root, config }
    }

    pub fn family_type(&self) -> FamilyType {
        FamilyType::Malware
    }

    pub async fn run(&self) -> ScanResult<MalwareResult> {
        if !self.input_root.is_dir() {
            return Err(ScanError::Family {
                family: FamilyType::Malware,
                reason: format!("input root {} is not a directory", self.input_root.display()),
            });
        }

        let signatures = self.load_signatures()?;
        info!(
            root = %self.input_root.display(),
            signatures = signatures.len(),
            "Hashing files against malware signatures"
        );

        let mut findings = Vec::new();
        let mut files_hashed = 0;

        for path in walk_regular_files(&self.input_root, 50_000) {
            let Ok(metadata) = std::fs::metadata(&path) else {
                continue;
            };
            if metadata.len() > self.config.max_file_size {
                continue;
            }
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };

            let digest = hex_digest(&bytes);
            files_hashed += 1;

            if let Some(name) = signatures.get(&digest) {
                let rel = path.strip_prefix(&self.input_root).unwrap_or(&path);
                findings.push(MalwareFinding {
                    signature_name: name.clone(),
                    path: rel.display().to_string(),
                    sha256: digest,
                });
            }
        }

        debug!(
            files = files_hashed,
            findings = findings.len(),
            "Malware scan finished"
        );

        Ok(MalwareResult {
            findings,
            files_hashed,
        })
    }

    fn load_signatures(&self) -> ScanResult<HashMap<String, String>> {
        let Some(path) = &self.config.signature_db else {
            debug!("No malware signature database configured");
            return Ok(HashMap::new());
        };

        let contents = std::fs::read_to_string(path).map_err(|e| ScanError::Family {
            family: FamilyType::Malware,
            reason: format!("failed to read signature database {}: {e}", path.display()),
        })?;

        serde_json::from_str(&contents).map_err(|e| ScanError::Family {
            family: FamilyType::Malware,
            reason: format!("failed to parse signature database {}: {e}", path.display()),
        })
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flags_file_matching_signature() {
        let dir = tempfile::tempdir().unwrap();
        let payload = b"malicious payload";
        std::fs::write(dir.path().join("dropper.sh"), payload).unwrap();
        std::fs::write(dir.path().join("benign.txt"), b"hello").unwrap();

        let digest = hex_digest(payload);
        let db = dir.path().join("signatures.json");
        std::fs::write(&db, format!(r#"{{"{digest}":"Test.Dropper"}}"#)).unwrap();

        let family = MalwareFamily::new(
            dir.path().to_path_buf(),
            MalwareConfig {
                enabled: true,
                signature_db: Some(db),
                max_file_size: DEFAULT_MAX_FILE_SIZE,
            },
        );

        let result = family.run().await.unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].signature_name, "Test.Dropper");
        assert_eq!(result.findings[0].path, "dropper.sh");
        assert!(result.files_hashed >= 2);
    }

    #[tokio::test]
    async fn no_database_means_no_findings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("file"), b"data").unwrap();

        let family = MalwareFamily::new(dir.path().to_path_buf(), MalwareConfig::default());
        let result = family.run().await.unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.files_hashed, 1);
    }
}
