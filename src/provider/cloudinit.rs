// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scanner Cloud-Init
 * Builds the user-data document booting a scanner VM into a scan
 *
 * The scan job is written verbatim to disk on first boot and the
 * scanner binary is started against it. The document is plain text
 * here; base64 encoding happens where the VM spec is assembled.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::errors::{ScanError, ScanResult};
use crate::types::ScanJobConfig;

const JOB_CONFIG_PATH: &str = "/etc/haukka/scan.json";

/// Render the `#cloud-config` document for one scan job.
pub fn generate_user_data(job: &ScanJobConfig) -> ScanResult<String> {
    let job_json = serde_json::to_string_pretty(job)
        .map_err(|e| ScanError::Configuration(format!("scan job not serializable: {e}")))?;

    // YAML block scalar, so every line of the JSON payload needs the
    // same leading indent.
    let indented: String = job_json
        .lines()
        .map(|line| format!("      {line}\n"))
        .collect();

    Ok(format!(
        "#cloud-config\n\
         write_files:\n\
         \x20 - path: {JOB_CONFIG_PATH}\n\
         \x20   permissions: \"0600\"\n\
         \x20   content: |\n\
         {indented}\
         runcmd:\n\
         \x20 - [haukka, scan, {JOB_CONFIG_PATH}]\n"
    ))
}
