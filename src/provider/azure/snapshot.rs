// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Snapshot and Disk Lifecycle
 * Root-volume snapshot, optional cross-region copy, scan disk
 *
 * Every step here follows the same contract: observe current state,
 * issue at most one long-running operation, and either return the
 * terminal resource or a retryable error carrying a wait hint. Steps
 * never block on completion themselves.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use tracing::info;

use crate::errors::{ScanError, ScanResult};
use crate::provider::azure::common::{
    ensure_deleted, DISK_CREATE_ESTIMATE, DISK_DELETE_ESTIMATE, SNAPSHOT_COPY_ESTIMATE,
    SNAPSHOT_CREATE_ESTIMATE, SNAPSHOT_DELETE_ESTIMATE,
};
use crate::provider::azure::resources::{
    provisioning_succeeded, CreationData, Disk, DiskProperties, Snapshot, SnapshotProperties,
    VirtualMachine,
};
use crate::provider::azure::AzureClient;
use crate::types::ScanJobConfig;

impl AzureClient {
    /// Snapshot of the target VM's root volume, created next to the
    /// target (snapshots must share the source disk's region).
    pub(super) async fn ensure_snapshot_for_root_volume(
        &self,
        job: &ScanJobConfig,
        target_vm: &VirtualMachine,
    ) -> ScanResult<Snapshot> {
        let name = super::snapshot_name(job);
        let resource_group = &self.config.scanner_resource_group;

        match self.api.get_snapshot(resource_group, &name).await? {
            Some(snapshot)
                if provisioning_succeeded(snapshot.properties.provisioning_state.as_ref()) =>
            {
                Ok(snapshot)
            }
            Some(_) => Err(ScanError::retryable(
                SNAPSHOT_CREATE_ESTIMATE,
                format!("snapshot {name} is still provisioning"),
            )),
            None => {
                let source_disk_id = target_vm
                    .properties
                    .storage_profile
                    .os_disk
                    .as_ref()
                    .and_then(|disk| disk.managed_disk.as_ref())
                    .and_then(|managed| managed.id.clone())
                    .ok_or_else(|| {
                        ScanError::Fatal(format!(
                            "target vm {} has no managed os disk to snapshot",
                            target_vm.name
                        ))
                    })?;

                let snapshot = Snapshot {
                    location: target_vm.location.clone(),
                    properties: SnapshotProperties {
                        creation_data: Some(CreationData {
                            create_option: "Copy".into(),
                            source_resource_id: Some(source_disk_id),
                        }),
                        incremental: true,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                self.api
                    .begin_create_snapshot(resource_group, &name, &snapshot)
                    .await?;
                info!(snapshot = %name, "root volume snapshot create issued");
                Err(ScanError::retryable(
                    SNAPSHOT_CREATE_ESTIMATE,
                    format!("snapshot {name} was just created"),
                ))
            }
        }
    }

    /// Managed disk the scanner VM mounts, restored from the root
    /// volume snapshot in the scanner's region. When the target lives
    /// in a different region the snapshot is copied over first.
    pub(super) async fn ensure_disk_from_snapshot(
        &self,
        job: &ScanJobConfig,
        snapshot: &Snapshot,
    ) -> ScanResult<Disk> {
        if snapshot.location == self.config.scanner_location {
            self.ensure_disk_restored(job, &snapshot.id).await
        } else {
            let copy = self.ensure_snapshot_copy(job, snapshot).await?;
            self.ensure_disk_restored(job, &copy.id).await
        }
    }

    /// Incremental copy of the snapshot into the scanner's region.
    async fn ensure_snapshot_copy(
        &self,
        job: &ScanJobConfig,
        snapshot: &Snapshot,
    ) -> ScanResult<Snapshot> {
        let name = super::snapshot_copy_name(job);
        let resource_group = &self.config.scanner_resource_group;

        match self.api.get_snapshot(resource_group, &name).await? {
            Some(copy)
                if provisioning_succeeded(copy.properties.provisioning_state.as_ref()) =>
            {
                Ok(copy)
            }
            Some(_) => Err(ScanError::retryable(
                SNAPSHOT_COPY_ESTIMATE,
                format!("snapshot copy {name} is still provisioning"),
            )),
            None => {
                let copy = Snapshot {
                    location: self.config.scanner_location.clone(),
                    properties: SnapshotProperties {
                        creation_data: Some(CreationData {
                            create_option: "CopyStart".into(),
                            source_resource_id: Some(snapshot.id.clone()),
                        }),
                        incremental: true,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                self.api
                    .begin_create_snapshot(resource_group, &name, &copy)
                    .await?;
                info!(snapshot = %name, "cross-region snapshot copy issued");
                Err(ScanError::retryable(
                    SNAPSHOT_COPY_ESTIMATE,
                    format!("snapshot copy {name} was just created"),
                ))
            }
        }
    }

    async fn ensure_disk_restored(
        &self,
        job: &ScanJobConfig,
        source_snapshot_id: &str,
    ) -> ScanResult<Disk> {
        let name = super::target_disk_name(job);
        let resource_group = &self.config.scanner_resource_group;

        match self.api.get_disk(resource_group, &name).await? {
            Some(disk)
                if provisioning_succeeded(disk.properties.provisioning_state.as_ref()) =>
            {
                Ok(disk)
            }
            Some(_) => Err(ScanError::retryable(
                DISK_CREATE_ESTIMATE,
                format!("disk {name} is still provisioning"),
            )),
            None => {
                let disk = Disk {
                    location: self.config.scanner_location.clone(),
                    properties: DiskProperties {
                        creation_data: Some(CreationData {
                            create_option: "Copy".into(),
                            source_resource_id: Some(source_snapshot_id.to_string()),
                        }),
                        ..Default::default()
                    },
                    ..Default::default()
                };
                self.api
                    .begin_create_disk(resource_group, &name, &disk)
                    .await?;
                info!(disk = %name, "scan disk restore issued");
                Err(ScanError::retryable(
                    DISK_CREATE_ESTIMATE,
                    format!("disk {name} was just created"),
                ))
            }
        }
    }

    pub(super) async fn ensure_snapshot_deleted(&self, job: &ScanJobConfig) -> ScanResult<()> {
        let name = super::snapshot_name(job);
        let resource_group = &self.config.scanner_resource_group;
        ensure_deleted(
            "root volume snapshot",
            async {
                Ok(self
                    .api
                    .get_snapshot(resource_group, &name)
                    .await?
                    .is_some())
            },
            self.api.begin_delete_snapshot(resource_group, &name),
            SNAPSHOT_DELETE_ESTIMATE,
        )
        .await
    }

    pub(super) async fn ensure_snapshot_copy_deleted(&self, job: &ScanJobConfig) -> ScanResult<()> {
        let name = super::snapshot_copy_name(job);
        let resource_group = &self.config.scanner_resource_group;
        ensure_deleted(
            "snapshot copy",
            async {
                Ok(self
                    .api
                    .get_snapshot(resource_group, &name)
                    .await?
                    .is_some())
            },
            self.api.begin_delete_snapshot(resource_group, &name),
            SNAPSHOT_DELETE_ESTIMATE,
        )
        .await
    }

    pub(super) async fn ensure_target_disk_deleted(&self, job: &ScanJobConfig) -> ScanResult<()> {
        let name = super::target_disk_name(job);
        let resource_group = &self.config.scanner_resource_group;
        ensure_deleted(
            "scan disk",
            async { Ok(self.api.get_disk(resource_group, &name).await?.is_some()) },
            self.api.begin_delete_disk(resource_group, &name),
            DISK_DELETE_ESTIMATE,
        )
        .await
    }
}
