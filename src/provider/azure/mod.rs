// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Azure Scanner Provider
 * Target discovery and the ephemeral scanner VM state machine
 *
 * All lifecycle entry points are idempotent: every call re-observes
 * current cloud state and advances at most one step, so a poll loop
 * driving them converges no matter where a previous run stopped.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod api;
mod common;
pub mod resources;
mod scanner_vm;
mod snapshot;

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::AzureConfig;
use crate::errors::{ScanError, ScanResult};
use crate::types::{ScanJobConfig, ScanScope, Tag, VmInfo};

use api::ComputeApi;
use resources::VirtualMachine;

/// Tag marking resources this scanner created, so discovery never
/// offers our own scanner VMs up as targets.
pub const MANAGED_BY_TAG_KEY: &str = "managed-by";
pub const MANAGED_BY_TAG_VALUE: &str = "haukka";

/// Tag linking a scanner resource back to the scan result it serves.
pub const SCAN_RESULT_TAG_KEY: &str = "haukka-scan-result-id";

// Azure VM resource ids have the fixed shape
// /subscriptions/{id}/resourceGroups/{rg}/providers/Microsoft.Compute/virtualMachines/{name}
// which splits on '/' into exactly nine parts.
const INSTANCE_ID_PARTS: usize = 9;
const INSTANCE_ID_RESOURCE_GROUP_INDEX: usize = 4;
const INSTANCE_ID_VM_NAME_INDEX: usize = 8;

/// Split a full Azure VM resource id into (resource group, VM name).
/// A malformed id can never become valid by waiting, so this is fatal.
pub fn parse_instance_id(instance_id: &str) -> ScanResult<(&str, &str)> {
    let parts: Vec<&str> = instance_id.split('/').collect();
    if parts.len() != INSTANCE_ID_PARTS {
        return Err(ScanError::Fatal(format!(
            "invalid instance id {instance_id:?}: expected {INSTANCE_ID_PARTS} '/'-separated parts, got {}",
            parts.len()
        )));
    }
    Ok((
        parts[INSTANCE_ID_RESOURCE_GROUP_INDEX],
        parts[INSTANCE_ID_VM_NAME_INDEX],
    ))
}

fn scanner_vm_name(job: &ScanJobConfig) -> String {
    format!("haukka-scanner-{}", job.scan_result_id)
}

fn snapshot_name(job: &ScanJobConfig) -> String {
    format!("haukka-snapshot-{}", job.scan_result_id)
}

fn snapshot_copy_name(job: &ScanJobConfig) -> String {
    format!("haukka-snapshot-{}-copy", job.scan_result_id)
}

fn target_disk_name(job: &ScanJobConfig) -> String {
    format!("haukka-disk-{}", job.scan_result_id)
}

fn nic_name(job: &ScanJobConfig) -> String {
    format!("haukka-nic-{}", job.scan_result_id)
}

/// Azure scanner provider. Holds the compute API boundary and the
/// scanner-side configuration; all state lives in the cloud.
pub struct AzureClient {
    api: Arc<dyn ComputeApi>,
    config: AzureConfig,
}

impl AzureClient {
    pub fn new(api: Arc<dyn ComputeApi>, config: AzureConfig) -> Self {
        Self { api, config }
    }

    /// Advance the scanner setup pipeline for one job as far as the
    /// cloud allows right now.
    ///
    /// Returns the scanner VM once every resource is terminal. Until
    /// then each call returns a retryable error with a wait hint; the
    /// caller polls via [`crate::retry::poll_until_ready`]. The step
    /// order is fixed: snapshot needs the target, the disk needs the
    /// snapshot, the VM needs the interface, the attach needs both.
    pub async fn ensure_scanner(&self, job: &ScanJobConfig) -> ScanResult<VirtualMachine> {
        let (target_group, target_name) = parse_instance_id(&job.target.instance_id)?;

        let target_vm = self
            .api
            .get_vm(target_group, target_name)
            .await?
            .ok_or_else(|| {
                ScanError::Fatal(format!(
                    "target vm {target_name} no longer exists in {target_group}"
                ))
            })?;

        let snapshot = self.ensure_snapshot_for_root_volume(job, &target_vm).await?;
        let disk = self.ensure_disk_from_snapshot(job, &snapshot).await?;
        let interface = self.ensure_network_interface(job).await?;
        let vm = self.ensure_scanner_vm(job, &interface).await?;
        self.ensure_disk_attached(job, &vm, &disk).await?;

        info!(scanner = %vm.name, target = %target_name, "scanner vm ready");
        Ok(vm)
    }

    /// Tear down everything [`Self::ensure_scanner`] created, VM first
    /// so the scan disk detaches before its own delete. Resources that
    /// are already gone count as deleted, so re-running after a partial
    /// teardown finishes the job.
    pub async fn remove_scanner(&self, job: &ScanJobConfig) -> ScanResult<()> {
        self.ensure_scanner_vm_deleted(job).await?;
        self.ensure_network_interface_deleted(job).await?;
        self.ensure_target_disk_deleted(job).await?;
        self.ensure_snapshot_copy_deleted(job).await?;
        self.ensure_snapshot_deleted(job).await?;
        info!(scan_result_id = %job.scan_result_id, "scanner resources removed");
        Ok(())
    }

    /// List VMs in scope and filter them down to scan targets.
    pub async fn discover_targets(&self, scope: &ScanScope) -> ScanResult<Vec<VmInfo>> {
        let mut vms = Vec::new();
        if scope.resource_groups.is_empty() {
            vms.extend(self.api.list_vms(None).await?);
        } else {
            for group in &scope.resource_groups {
                vms.extend(self.api.list_vms(Some(group)).await?);
            }
        }

        let mut targets = Vec::new();
        for vm in vms {
            if vm.tags.get(MANAGED_BY_TAG_KEY).map(String::as_str) == Some(MANAGED_BY_TAG_VALUE) {
                debug!(vm = %vm.name, "skipping scanner-managed vm");
                continue;
            }
            let info = vm_info_from_vm(&vm);
            if scope.matches(&info.tags) {
                targets.push(info);
            }
        }
        Ok(targets)
    }
}

fn vm_info_from_vm(vm: &VirtualMachine) -> VmInfo {
    let image = vm
        .properties
        .storage_profile
        .image_reference
        .as_ref()
        .map(|r| format!("{}/{}/{}/{}", r.publisher, r.offer, r.sku, r.version))
        .unwrap_or_default();

    let platform = vm
        .properties
        .storage_profile
        .os_disk
        .as_ref()
        .and_then(|d| d.os_type.as_ref())
        .map(|t| t.to_lowercase())
        .unwrap_or_default();

    let mut tags: Vec<Tag> = vm
        .tags
        .iter()
        .map(|(k, v)| Tag::new(k.clone(), v.clone()))
        .collect();
    tags.sort_by(|a, b| a.key.cmp(&b.key));

    VmInfo {
        instance_id: vm.id.clone(),
        location: vm.location.clone(),
        image,
        platform,
        launch_time: vm.properties.time_created,
        tags,
    }
}
