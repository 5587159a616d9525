// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scanner VM Lifecycle
 * Network interface, ephemeral scanner VM, scan disk attachment
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::info;

use crate::errors::{ScanError, ScanResult};
use crate::provider::azure::common::{
    ensure_deleted, DISK_ATTACH_ESTIMATE, NIC_CREATE_ESTIMATE, NIC_DELETE_ESTIMATE,
    VM_CREATE_ESTIMATE, VM_DELETE_ESTIMATE,
};
use crate::provider::azure::resources::{
    provisioning_succeeded, DataDisk, Disk, HardwareProfile, ImageReference, IpConfiguration,
    IpConfigurationProperties, LinuxConfiguration, ManagedDiskParameters, NetworkInterface,
    NetworkInterfaceProperties, NetworkInterfaceReference, NetworkProfile, OsDisk, OsProfile,
    SshConfiguration, SshPublicKey, SubnetReference, VirtualMachine, VirtualMachineProperties,
    DISK_STATE_ATTACHED,
};
use crate::provider::azure::{
    AzureClient, MANAGED_BY_TAG_KEY, MANAGED_BY_TAG_VALUE, SCAN_RESULT_TAG_KEY,
};
use crate::provider::cloudinit;
use crate::types::ScanJobConfig;

const SCANNER_ADMIN_USER: &str = "haukka";

impl AzureClient {
    pub(super) async fn ensure_network_interface(
        &self,
        job: &ScanJobConfig,
    ) -> ScanResult<NetworkInterface> {
        let name = super::nic_name(job);
        let resource_group = &self.config.scanner_resource_group;

        match self.api.get_interface(resource_group, &name).await? {
            Some(interface)
                if provisioning_succeeded(interface.properties.provisioning_state.as_ref()) =>
            {
                Ok(interface)
            }
            Some(_) => Err(ScanError::retryable(
                NIC_CREATE_ESTIMATE,
                format!("network interface {name} is still provisioning"),
            )),
            None => {
                let interface = NetworkInterface {
                    location: self.config.scanner_location.clone(),
                    properties: NetworkInterfaceProperties {
                        ip_configurations: vec![IpConfiguration {
                            name: "ipconfig1".into(),
                            properties: IpConfigurationProperties {
                                subnet: Some(SubnetReference {
                                    id: self.config.scanner_subnet_id.clone(),
                                }),
                            },
                        }],
                        ..Default::default()
                    },
                    ..Default::default()
                };
                self.api
                    .begin_create_interface(resource_group, &name, &interface)
                    .await?;
                info!(interface = %name, "scanner network interface create issued");
                Err(ScanError::retryable(
                    NIC_CREATE_ESTIMATE,
                    format!("network interface {name} was just created"),
                ))
            }
        }
    }

    pub(super) async fn ensure_scanner_vm(
        &self,
        job: &ScanJobConfig,
        interface: &NetworkInterface,
    ) -> ScanResult<VirtualMachine> {
        let name = super::scanner_vm_name(job);
        let resource_group = &self.config.scanner_resource_group;

        match self.api.get_vm(resource_group, &name).await? {
            Some(vm) if provisioning_succeeded(vm.properties.provisioning_state.as_ref()) => {
                // A VM under our name owned by another scan result means
                // two jobs were scheduled for the same id; waiting would
                // never untangle that.
                if vm.tags.get(SCAN_RESULT_TAG_KEY) != Some(&job.scan_result_id) {
                    return Err(ScanError::Conflict {
                        existing_id: vm.id.clone(),
                    });
                }
                Ok(vm)
            }
            Some(_) => Err(ScanError::retryable(
                VM_CREATE_ESTIMATE,
                format!("scanner vm {name} is still provisioning"),
            )),
            None => {
                let vm = self.scanner_vm_spec(job, &name, interface)?;
                self.api
                    .begin_create_or_update_vm(resource_group, &name, &vm)
                    .await?;
                info!(vm = %name, "scanner vm create issued");
                Err(ScanError::retryable(
                    VM_CREATE_ESTIMATE,
                    format!("scanner vm {name} was just created"),
                ))
            }
        }
    }

    fn scanner_vm_spec(
        &self,
        job: &ScanJobConfig,
        name: &str,
        interface: &NetworkInterface,
    ) -> ScanResult<VirtualMachine> {
        let user_data = BASE64.encode(cloudinit::generate_user_data(job)?);

        let ssh = if self.config.scanner_public_key.is_empty() {
            None
        } else {
            Some(SshConfiguration {
                public_keys: vec![SshPublicKey {
                    path: format!("/home/{SCANNER_ADMIN_USER}/.ssh/authorized_keys"),
                    key_data: self.config.scanner_public_key.clone(),
                }],
            })
        };

        let mut tags = std::collections::HashMap::new();
        tags.insert(MANAGED_BY_TAG_KEY.to_string(), MANAGED_BY_TAG_VALUE.to_string());
        tags.insert(SCAN_RESULT_TAG_KEY.to_string(), job.scan_result_id.clone());

        Ok(VirtualMachine {
            location: self.config.scanner_location.clone(),
            tags,
            properties: VirtualMachineProperties {
                hardware_profile: Some(HardwareProfile {
                    vm_size: self.config.scanner_vm_size.clone(),
                }),
                storage_profile: crate::provider::azure::resources::StorageProfile {
                    image_reference: Some(ImageReference {
                        publisher: self.config.scanner_image_publisher.clone(),
                        offer: self.config.scanner_image_offer.clone(),
                        sku: self.config.scanner_image_sku.clone(),
                        version: self.config.scanner_image_version.clone(),
                    }),
                    // The OS disk dies with the VM so teardown only has
                    // the scan disk left to clean up.
                    os_disk: Some(OsDisk {
                        create_option: Some("FromImage".into()),
                        delete_option: Some("Delete".into()),
                        ..Default::default()
                    }),
                    data_disks: Vec::new(),
                },
                os_profile: Some(OsProfile {
                    computer_name: name.to_string(),
                    admin_username: SCANNER_ADMIN_USER.into(),
                    linux_configuration: Some(LinuxConfiguration {
                        disable_password_authentication: true,
                        ssh,
                    }),
                }),
                network_profile: Some(NetworkProfile {
                    network_interfaces: vec![NetworkInterfaceReference {
                        id: interface.id.clone(),
                    }],
                }),
                user_data: Some(user_data),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    /// Attach the scan disk at LUN 0 and wait (via retryable errors)
    /// until the platform reports it attached.
    pub(super) async fn ensure_disk_attached(
        &self,
        job: &ScanJobConfig,
        vm: &VirtualMachine,
        disk: &Disk,
    ) -> ScanResult<()> {
        let resource_group = &self.config.scanner_resource_group;

        let already_requested = vm
            .properties
            .storage_profile
            .data_disks
            .iter()
            .any(|d| d.managed_disk.id.as_deref() == Some(disk.id.as_str()));

        if !already_requested {
            let mut updated = vm.clone();
            updated.properties.storage_profile.data_disks = vec![DataDisk {
                name: disk.name.clone(),
                lun: 0,
                create_option: "Attach".into(),
                managed_disk: ManagedDiskParameters {
                    id: Some(disk.id.clone()),
                    ..Default::default()
                },
            }];
            self.api
                .begin_create_or_update_vm(resource_group, &vm.name, &updated)
                .await?;
            info!(vm = %vm.name, disk = %disk.name, "scan disk attach issued");
            return Err(ScanError::retryable(
                DISK_ATTACH_ESTIMATE,
                format!("disk {} attach to {} was just issued", disk.name, vm.name),
            ));
        }

        let current = self
            .api
            .get_disk(resource_group, &disk.name)
            .await?
            .ok_or_else(|| {
                ScanError::Fatal(format!("scan disk {} disappeared during attach", disk.name))
            })?;
        if current.properties.disk_state.as_deref() == Some(DISK_STATE_ATTACHED) {
            Ok(())
        } else {
            Err(ScanError::retryable(
                DISK_ATTACH_ESTIMATE,
                format!("disk {} is not attached yet", disk.name),
            ))
        }
    }

    pub(super) async fn ensure_scanner_vm_deleted(&self, job: &ScanJobConfig) -> ScanResult<()> {
        let name = super::scanner_vm_name(job);
        let resource_group = &self.config.scanner_resource_group;
        ensure_deleted(
            "scanner vm",
            async { Ok(self.api.get_vm(resource_group, &name).await?.is_some()) },
            self.api.begin_delete_vm(resource_group, &name),
            VM_DELETE_ESTIMATE,
        )
        .await
    }

    pub(super) async fn ensure_network_interface_deleted(
        &self,
        job: &ScanJobConfig,
    ) -> ScanResult<()> {
        let name = super::nic_name(job);
        let resource_group = &self.config.scanner_resource_group;
        ensure_deleted(
            "scanner network interface",
            async {
                Ok(self
                    .api
                    .get_interface(resource_group, &name)
                    .await?
                    .is_some())
            },
            self.api.begin_delete_interface(resource_group, &name),
            NIC_DELETE_ESTIMATE,
        )
        .await
    }
}
