// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - SBOM Family
 * Package inventory of the mounted target volume
 *
 * Collects from:
 * - dpkg status database (OS packages)
 * - Cargo.lock (Rust crates)
 * - package.json (Node dependencies)
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{ScanError, ScanResult};
use crate::families::walk_regular_files;
use crate::types::FamilyType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SbomConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Also parse application lockfiles found on the volume, not just the
    /// OS package database.
    #[serde(default = "default_true")]
    pub parse_lockfiles: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SbomConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            parse_lockfiles: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub version: String,
    pub package_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SbomResult {
    pub packages: Vec<Package>,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct SbomFamily {
    input_root: PathBuf,
    config: SbomConfig,
}

impl SbomFamily {
    pub fn new(input_root: PathBuf, config: SbomConfig) -> Self {
        Self { input_root, config }
    }

    pub fn family_type(&self) -> FamilyType {
        FamilyType::Sbom
    }

    pub async fn run(&self) -> ScanResult<SbomResult> {
        info!(root = %self.input_root.display(), "Collecting package inventory");

        let packages = collect_packages(&self.input_root, self.config.parse_lockfiles)?;
        debug!(count = packages.len(), "Package collection finished");

        Ok(SbomResult {
            packages,
            source: self.input_root.display().to_string(),
        })
    }
}

/// Collect the package inventory of a mounted volume. Also used by the
/// vulnerabilities family when it has to scan without an SBOM result.
pub(crate) fn collect_packages(root: &Path, parse_lockfiles: bool) -> ScanResult<Vec<Package>> {
    if !root.is_dir() {
        return Err(ScanError::Family {
            family: FamilyType::Sbom,
            reason: format!("input root {} is not a directory", root.display()),
        });
    }

    let mut packages = Vec::new();

    let dpkg_status = root.join("var/lib/dpkg/status");
    if dpkg_status.is_file() {
        if let Ok(contents) = std::fs::read_to_string(&dpkg_status) {
            packages.extend(parse_dpkg_status(&contents));
        }
    }

    if parse_lockfiles {
        for path in walk_regular_files(root, 50_000) {
            match path.file_name().and_then(|n| n.to_str()) {
                Some("Cargo.lock") => {
                    if let Ok(contents) = std::fs::read_to_string(&path) {
                        packages.extend(parse_cargo_lock(&contents));
                    }
                }
                Some("package.json") => {
                    if let Ok(contents) = std::fs::read_to_string(&path) {
                        packages.extend(parse_package_json(&contents));
                    }
                }
                _ => {}
            }
        }
    }

    packages.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
    packages.dedup();
    Ok(packages)
}

fn parse_dpkg_status(contents: &str) -> Vec<Package> {
    let mut packages = Vec::new();
    let mut name: Option<&str> = None;

    for line in contents.lines() {
        if let Some(rest) = line.strip_prefix("Package: ") {
            name = Some(rest.trim());
        } else if let Some(rest) = line.strip_prefix("Version: ") {
            if let Some(name) = name.take() {
                packages.push(Package {
                    name: name.to_string(),
                    version: rest.trim().to_string(),
                    package_type: "deb".to_string(),
                });
            }
        } else if line.is_empty() {
            name = None;
        }
    }

    packages
}

fn parse_cargo_lock(contents: &str) -> Vec<Package> {
    let mut packages = Vec::new();
    let mut in_package = false;
    let mut name: Option<String> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line == "[[package]]" {
            in_package = true;
            name = None;
        } else if line.starts_with('[') {
            in_package = false;
        } else if in_package {
            if let Some(rest) = line.strip_prefix("name = ") {
                name = Some(rest.trim_matches('"').to_string());
            } else if let Some(rest) = line.strip_prefix("version = ") {
                if let Some(name) = name.take() {
                    packages.push(Package {
                        name,
                        version: rest.trim_matches('"').to_string(),
                        package_type: "cargo".to_string(),
                    });
                }
            }
        }
    }

    packages
}

fn parse_package_json(contents: &str) -> Vec<Package> {
    let Ok(doc) = serde_json::from_str::<serde_json::Value>(contents) else {
        return Vec::new();
    };

    let mut packages = Vec::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(deps) = doc.get(section).and_then(|d| d.as_object()) {
            for (name, version) in deps {
                packages.push(Package {
                    name: name.clone(),
                    // Version ranges are kept as declared; exact resolution
                    // would need the lockfile.
                    version: version.as_str().unwrap_or("").trim_start_matches('^').to_string(),
                    package_type: "npm".to_string(),
                });
            }
        }
    }

    packages
}
