// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Family Manager
 * Ordered, cancellable execution of scan families with result aggregation
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{NotificationPhase, ScanError, ScanResult};
use crate::types::FamilyType;

pub mod exploits;
pub mod malware;
pub mod misconfiguration;
pub mod results;
pub mod rootkits;
pub mod sbom;
pub mod secrets;
pub mod vulnerabilities;

pub use results::{FamilyOutput, ResultsStore};

pub use exploits::ExploitsConfig;
pub use malware::MalwareConfig;
pub use misconfiguration::MisconfigurationConfig;
pub use rootkits::RootkitsConfig;
pub use sbom::SbomConfig;
pub use secrets::SecretsConfig;
pub use vulnerabilities::VulnerabilitiesConfig;

use exploits::ExploitsFamily;
use malware::MalwareFamily;
use misconfiguration::MisconfigurationFamily;
use rootkits::RootkitsFamily;
use sbom::SbomFamily;
use secrets::SecretsFamily;
use vulnerabilities::VulnerabilitiesFamily;

/// Which families run and with what parameters. Part of the immutable
/// scan job configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FamiliesConfig {
    /// Mount point of the attached target volume.
    pub input_root: PathBuf,

    #[serde(default)]
    pub sbom: SbomConfig,
    #[serde(default)]
    pub vulnerabilities: VulnerabilitiesConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub rootkits: RootkitsConfig,
    #[serde(default)]
    pub malware: MalwareConfig,
    #[serde(default)]
    pub misconfiguration: MisconfigurationConfig,
    #[serde(default)]
    pub exploits: ExploitsConfig,
}

/// One scan family. A closed set: the dependency ordering in the manager
/// relies on the members being known at compile time.
#[derive(Debug, Clone)]
pub enum Family {
    Sbom(SbomFamily),
    Vulnerabilities(VulnerabilitiesFamily),
    Secrets(SecretsFamily),
    Rootkits(RootkitsFamily),
    Malware(MalwareFamily),
    Misconfiguration(MisconfigurationFamily),
    Exploits(ExploitsFamily),
}

impl Family {
    pub fn family_type(&self) -> FamilyType {
        match self {
            Family::Sbom(f) => f.family_type(),
            Family::Vulnerabilities(f) => f.family_type(),
            Family::Secrets(f) => f.family_type(),
            Family::Rootkits(f) => f.family_type(),
            Family::Malware(f) => f.family_type(),
            Family::Misconfiguration(f) => f.family_type(),
            Family::Exploits(f) => f.family_type(),
        }
    }

    /// Run the family against the results accumulated so far. Families
    /// with upstream dependencies read from the store; the rest ignore it.
    pub async fn run(&self, results: &ResultsStore) -> ScanResult<FamilyOutput> {
        match self {
            Family::Sbom(f) => f.run().await.map(FamilyOutput::Sbom),
            Family::Vulnerabilities(f) => {
                f.run(results).await.map(FamilyOutput::Vulnerabilities)
            }
            Family::Secrets(f) => f.run().await.map(FamilyOutput::Secrets),
            Family::Rootkits(f) => f.run().await.map(FamilyOutput::Rootkits),
            Family::Malware(f) => f.run().await.map(FamilyOutput::Malware),
            Family::Misconfiguration(f) => {
                f.run().await.map(FamilyOutput::Misconfiguration)
            }
            Family::Exploits(f) => f.run(results).await.map(FamilyOutput::Exploits),
        }
    }
}

/// Outcome of one family's attempt, delivered to the notifier.
#[derive(Debug)]
pub struct FamilyResult {
    pub family_type: FamilyType,
    pub result: ScanResult<FamilyOutput>,
}

/// Caller-supplied progress hooks. Called synchronously by the manager;
/// failures are collected but never abort the run.
#[async_trait::async_trait]
pub trait FamilyNotifier: Send + Sync {
    async fn family_started(&self, family: FamilyType) -> anyhow::Result<()>;
    async fn family_finished(&self, result: FamilyResult) -> anyhow::Result<()>;
}

/// Runs the enabled families of one scan job in dependency order.
///
/// Holds no cross-run state; construct one manager per run.
pub struct FamilyManager {
    families: Vec<Family>,
}

impl FamilyManager {
    pub fn new(config: &FamiliesConfig) -> Self {
        let root = &config.input_root;
        let mut families = Vec::new();

        // Analyzers.
        // SBOM MUST come before vulnerabilities.
        if config.sbom.enabled {
            families.push(Family::Sbom(SbomFamily::new(
                root.clone(),
                config.sbom.clone(),
            )));
        }

        // Scanners.
        // Vulnerabilities MUST be after SBOM to support the case it is
        // configured to use the output from SBOM.
        if config.vulnerabilities.enabled {
            families.push(Family::Vulnerabilities(VulnerabilitiesFamily::new(
                root.clone(),
                config.vulnerabilities.clone(),
            )));
        }
        if config.secrets.enabled {
            families.push(Family::Secrets(SecretsFamily::new(
                root.clone(),
                config.secrets.clone(),
            )));
        }
        if config.rootkits.enabled {
            families.push(Family::Rootkits(RootkitsFamily::new(
                root.clone(),
                config.rootkits.clone(),
            )));
        }
        if config.malware.enabled {
            families.push(Family::Malware(MalwareFamily::new(
                root.clone(),
                config.malware.clone(),
            )));
        }
        if config.misconfiguration.enabled {
            families.push(Family::Misconfiguration(MisconfigurationFamily::new(
                root.clone(),
                config.misconfiguration.clone(),
            )));
        }

        // Enrichers.
        // Exploits MUST be after Vulnerabilities to support the case it is
        // configured to use the output from Vulnerabilities.
        if config.exploits.enabled {
            families.push(Family::Exploits(ExploitsFamily::new(
                config.exploits.clone(),
            )));
        }

        Self { families }
    }

    /// The families that will run, in order.
    pub fn family_types(&self) -> Vec<FamilyType> {
        self.families.iter().map(Family::family_type).collect()
    }

    /// Run every enabled family once, in order. Returns all collected
    /// errors; an empty vec means full success.
    ///
    /// Each family runs as its own task raced against cancellation. A
    /// cancelled family is abandoned (its task is drained on a detached
    /// task) and reported as aborted; the loop still visits the remaining
    /// families, which abort immediately under the same cancelled token.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        notifier: &dyn FamilyNotifier,
    ) -> Vec<ScanError> {
        let mut one_or_more_family_failed = false;
        let mut errors: Vec<ScanError> = Vec::new();
        let mut family_results = ResultsStore::new();

        for family in &self.families {
            let family_type = family.family_type();

            if let Err(err) = notifier.family_started(family_type).await {
                errors.push(ScanError::Notification {
                    phase: NotificationPhase::Started,
                    reason: err.to_string(),
                });
                // A skipped family never ran, which counts as a failed
                // run for the aggregate verdict.
                one_or_more_family_failed = true;
                continue;
            }

            let task_family = family.clone();
            let results_so_far = family_results.clone();
            let mut handle =
                tokio::spawn(async move { task_family.run(&results_so_far).await });

            tokio::select! {
                _ = cancel.cancelled() => {
                    // Drain the abandoned task off the main flow so its
                    // eventual completion (or panic) is still observed.
                    tokio::spawn(async move {
                        let _ = handle.await;
                    });
                    one_or_more_family_failed = true;
                    if let Err(err) = notifier
                        .family_finished(FamilyResult {
                            family_type,
                            result: Err(ScanError::Aborted { family: family_type }),
                        })
                        .await
                    {
                        errors.push(ScanError::Notification {
                            phase: NotificationPhase::Finished,
                            reason: err.to_string(),
                        });
                    }
                }
                joined = &mut handle => {
                    let result = match joined {
                        Ok(Ok(output)) => {
                            debug!(family = %family_type, "Family completed");
                            // Results become visible to later families only
                            // after a successful join.
                            family_results.set(output.clone());
                            Ok(output)
                        }
                        Ok(Err(err)) => {
                            warn!(family = %family_type, error = %err, "Family failed");
                            one_or_more_family_failed = true;
                            Err(err)
                        }
                        Err(join_err) => {
                            warn!(family = %family_type, error = %join_err, "Family task panicked");
                            one_or_more_family_failed = true;
                            Err(ScanError::Family {
                                family: family_type,
                                reason: format!("family task panicked: {join_err}"),
                            })
                        }
                    };

                    if let Err(err) = notifier
                        .family_finished(FamilyResult { family_type, result })
                        .await
                    {
                        errors.push(ScanError::Notification {
                            phase: NotificationPhase::Finished,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        if one_or_more_family_failed {
            errors.push(ScanError::OneOrMoreFamilyFailed);
        }
        errors
    }
}

/// Depth-first listing of regular files under a root, capped at `limit`
/// entries. Pseudo-filesystem mount points are skipped; on a snapshot
/// volume they would only appear as empty directories anyway.
pub(crate) fn walk_regular_files(root: &Path, limit: usize) -> Vec<PathBuf> {
    const SKIP_DIRS: &[&str] = &["proc", "sys", "dev", "run"];

    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        if files.len() >= limit {
            break;
        }
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            if files.len() >= limit {
                break;
            }
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                let is_top_level_skip = path.parent() == Some(root)
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| SKIP_DIRS.contains(&n));
                if !is_top_level_skip {
                    stack.push(path);
                }
            } else if file_type.is_file() {
                files.push(path);
            }
        }
    }

    files
}
