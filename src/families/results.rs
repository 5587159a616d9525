// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Family Results Store
 * Per-run, type-keyed aggregate of completed family results
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::Serialize;

use crate::families::exploits::ExploitsResult;
use crate::families::malware::MalwareResult;
use crate::families::misconfiguration::MisconfigurationResult;
use crate::families::rootkits::RootkitsResult;
use crate::families::sbom::SbomResult;
use crate::families::secrets::SecretsResult;
use crate::families::vulnerabilities::VulnerabilitiesResult;
use crate::types::FamilyType;

/// Typed output of one successful family run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "familyType", rename_all = "lowercase")]
pub enum FamilyOutput {
    Sbom(SbomResult),
    Vulnerabilities(VulnerabilitiesResult),
    Secrets(SecretsResult),
    Rootkits(RootkitsResult),
    Malware(MalwareResult),
    Misconfiguration(MisconfigurationResult),
    Exploits(ExploitsResult),
}

impl FamilyOutput {
    pub fn family_type(&self) -> FamilyType {
        match self {
            FamilyOutput::Sbom(_) => FamilyType::Sbom,
            FamilyOutput::Vulnerabilities(_) => FamilyType::Vulnerabilities,
            FamilyOutput::Secrets(_) => FamilyType::Secrets,
            FamilyOutput::Rootkits(_) => FamilyType::Rootkits,
            FamilyOutput::Malware(_) => FamilyType::Malware,
            FamilyOutput::Misconfiguration(_) => FamilyType::Misconfiguration,
            FamilyOutput::Exploits(_) => FamilyType::Exploits,
        }
    }
}

/// Append-only aggregate of successful family results for a single run.
///
/// The manager is the only writer; each family task receives a snapshot
/// taken at launch, so a result becomes visible to later families strictly
/// after the producing family has joined successfully.
#[derive(Debug, Clone, Default)]
pub struct ResultsStore {
    sbom: Option<SbomResult>,
    vulnerabilities: Option<VulnerabilitiesResult>,
    secrets: Option<SecretsResult>,
    rootkits: Option<RootkitsResult>,
    malware: Option<MalwareResult>,
    misconfiguration: Option<MisconfigurationResult>,
    exploits: Option<ExploitsResult>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a family's output, keyed by its type. Each family contributes
    /// at most one result per run.
    pub fn set(&mut self, output: FamilyOutput) {
        match output {
            FamilyOutput::Sbom(r) => self.sbom = Some(r),
            FamilyOutput::Vulnerabilities(r) => self.vulnerabilities = Some(r),
            FamilyOutput::Secrets(r) => self.secrets = Some(r),
            FamilyOutput::Rootkits(r) => self.rootkits = Some(r),
            FamilyOutput::Malware(r) => self.malware = Some(r),
            FamilyOutput::Misconfiguration(r) => self.misconfiguration = Some(r),
            FamilyOutput::Exploits(r) => self.exploits = Some(r),
        }
    }

    pub fn sbom(&self) -> Option<&SbomResult> {
        self.sbom.as_ref()
    }

    pub fn vulnerabilities(&self) -> Option<&VulnerabilitiesResult> {
        self.vulnerabilities.as_ref()
    }

    pub fn secrets(&self) -> Option<&SecretsResult> {
        self.secrets.as_ref()
    }

    pub fn rootkits(&self) -> Option<&RootkitsResult> {
        self.rootkits.as_ref()
    }

    pub fn malware(&self) -> Option<&MalwareResult> {
        self.malware.as_ref()
    }

    pub fn misconfiguration(&self) -> Option<&MisconfigurationResult> {
        self.misconfiguration.as_ref()
    }

    pub fn exploits(&self) -> Option<&ExploitsResult> {
        self.exploits.as_ref()
    }
}
