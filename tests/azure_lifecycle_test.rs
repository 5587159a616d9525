// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Azure Lifecycle Integration Tests
 * Drives the scanner VM state machine against an in-memory cloud
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use haukka_scanner::config::AzureConfig;
use haukka_scanner::errors::ScanResult;
use haukka_scanner::families::FamiliesConfig;
use haukka_scanner::provider::azure::resources::{
    Disk, ManagedDiskParameters, NetworkInterface, OsDisk, Snapshot, VirtualMachine,
    DISK_STATE_ATTACHED, PROVISIONING_STATE_SUCCEEDED,
};
use haukka_scanner::provider::{AzureClient, ComputeApi};
use haukka_scanner::types::{ScanJobConfig, ScanScope, Tag, VmInfo};

const SUBSCRIPTION: &str = "sub-1";
const SCANNER_GROUP: &str = "rg-scan";
const SCANNER_LOCATION: &str = "westeurope";

/// In-memory cloud. Created resources start in a pending state;
/// [`FakeCompute::settle`] plays the role of time passing and flips
/// everything to its terminal state.
#[derive(Default)]
struct FakeState {
    vms: HashMap<String, VirtualMachine>,
    snapshots: HashMap<String, Snapshot>,
    disks: HashMap<String, Disk>,
    nics: HashMap<String, NetworkInterface>,
    create_calls: HashMap<String, usize>,
}

#[derive(Default)]
struct FakeCompute {
    state: Mutex<FakeState>,
}

fn key(resource_group: &str, name: &str) -> String {
    format!("{resource_group}/{name}")
}

fn resource_id(resource_group: &str, kind: &str, name: &str) -> String {
    format!(
        "/subscriptions/{SUBSCRIPTION}/resourceGroups/{resource_group}/providers/Microsoft.Compute/{kind}/{name}"
    )
}

impl FakeCompute {
    /// Flip every pending resource to terminal and attach any disk a VM
    /// has requested.
    fn settle(&self) {
        let mut state = self.state.lock().unwrap();
        let attached: Vec<String> = state
            .vms
            .values()
            .flat_map(|vm| vm.properties.storage_profile.data_disks.iter())
            .filter_map(|d| d.managed_disk.id.clone())
            .collect();

        for vm in state.vms.values_mut() {
            vm.properties.provisioning_state = Some(PROVISIONING_STATE_SUCCEEDED.into());
        }
        for snapshot in state.snapshots.values_mut() {
            snapshot.properties.provisioning_state = Some(PROVISIONING_STATE_SUCCEEDED.into());
        }
        for nic in state.nics.values_mut() {
            nic.properties.provisioning_state = Some(PROVISIONING_STATE_SUCCEEDED.into());
        }
        for disk in state.disks.values_mut() {
            disk.properties.provisioning_state = Some(PROVISIONING_STATE_SUCCEEDED.into());
            if attached.contains(&disk.id) {
                disk.properties.disk_state = Some(DISK_STATE_ATTACHED.into());
            }
        }
    }

    fn create_calls(&self, resource_group: &str, name: &str) -> usize {
        *self
            .state
            .lock()
            .unwrap()
            .create_calls
            .get(&key(resource_group, name))
            .unwrap_or(&0)
    }

    fn snapshot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .unwrap()
            .snapshots
            .values()
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    fn is_empty(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.vms.is_empty()
            && state.snapshots.is_empty()
            && state.disks.is_empty()
            && state.nics.is_empty()
    }

    fn insert_vm(&self, resource_group: &str, vm: VirtualMachine) {
        self.state
            .lock()
            .unwrap()
            .vms
            .insert(key(resource_group, &vm.name), vm);
    }
}

#[async_trait]
impl ComputeApi for FakeCompute {
    async fn get_vm(&self, resource_group: &str, name: &str) -> ScanResult<Option<VirtualMachine>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .vms
            .get(&key(resource_group, name))
            .cloned())
    }

    async fn begin_create_or_update_vm(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        let k = key(resource_group, name);
        *state.create_calls.entry(k.clone()).or_insert(0) += 1;

        let mut stored = vm.clone();
        stored.id = resource_id(resource_group, "virtualMachines", name);
        stored.name = name.to_string();
        // An update to an existing terminal VM stays terminal; a fresh
        // create has to provision first.
        stored.properties.provisioning_state = match state.vms.get(&k) {
            Some(existing) => existing.properties.provisioning_state.clone(),
            None => Some("Creating".into()),
        };
        state.vms.insert(k, stored);
        Ok(())
    }

    async fn begin_delete_vm(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        self.state
            .lock()
            .unwrap()
            .vms
            .remove(&key(resource_group, name));
        Ok(())
    }

    async fn list_vms(&self, resource_group: Option<&str>) -> ScanResult<Vec<VirtualMachine>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .vms
            .iter()
            .filter(|(k, _)| match resource_group {
                Some(rg) => k.starts_with(&format!("{rg}/")),
                None => true,
            })
            .map(|(_, vm)| vm.clone())
            .collect())
    }

    async fn get_snapshot(&self, resource_group: &str, name: &str) -> ScanResult<Option<Snapshot>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .snapshots
            .get(&key(resource_group, name))
            .cloned())
    }

    async fn begin_create_snapshot(
        &self,
        resource_group: &str,
        name: &str,
        snapshot: &Snapshot,
    ) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        let k = key(resource_group, name);
        *state.create_calls.entry(k.clone()).or_insert(0) += 1;

        let mut stored = snapshot.clone();
        stored.id = resource_id(resource_group, "snapshots", name);
        stored.name = name.to_string();
        stored.properties.provisioning_state = Some("Creating".into());
        state.snapshots.insert(k, stored);
        Ok(())
    }

    async fn begin_delete_snapshot(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .remove(&key(resource_group, name));
        Ok(())
    }

    async fn get_disk(&self, resource_group: &str, name: &str) -> ScanResult<Option<Disk>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .disks
            .get(&key(resource_group, name))
            .cloned())
    }

    async fn begin_create_disk(
        &self,
        resource_group: &str,
        name: &str,
        disk: &Disk,
    ) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        let k = key(resource_group, name);
        *state.create_calls.entry(k.clone()).or_insert(0) += 1;

        let mut stored = disk.clone();
        stored.id = resource_id(resource_group, "disks", name);
        stored.name = name.to_string();
        stored.properties.provisioning_state = Some("Creating".into());
        state.disks.insert(k, stored);
        Ok(())
    }

    async fn begin_delete_disk(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        self.state
            .lock()
            .unwrap()
            .disks
            .remove(&key(resource_group, name));
        Ok(())
    }

    async fn get_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ScanResult<Option<NetworkInterface>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .nics
            .get(&key(resource_group, name))
            .cloned())
    }

    async fn begin_create_interface(
        &self,
        resource_group: &str,
        name: &str,
        interface: &NetworkInterface,
    ) -> ScanResult<()> {
        let mut state = self.state.lock().unwrap();
        let k = key(resource_group, name);
        *state.create_calls.entry(k.clone()).or_insert(0) += 1;

        let mut stored = interface.clone();
        stored.id = resource_id(resource_group, "networkInterfaces", name);
        stored.name = name.to_string();
        stored.properties.provisioning_state = Some("Creating".into());
        state.nics.insert(k, stored);
        Ok(())
    }

    async fn begin_delete_interface(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        self.state
            .lock()
            .unwrap()
            .nics
            .remove(&key(resource_group, name));
        Ok(())
    }
}

fn scanner_config() -> AzureConfig {
    AzureConfig {
        subscription_id: SUBSCRIPTION.into(),
        scanner_resource_group: SCANNER_GROUP.into(),
        scanner_location: SCANNER_LOCATION.into(),
        scanner_vm_size: "Standard_D2s_v3".into(),
        scanner_image_publisher: "canonical".into(),
        scanner_image_offer: "0001-com-ubuntu-server-jammy".into(),
        scanner_image_sku: "22_04-lts-gen2".into(),
        scanner_image_version: "latest".into(),
        scanner_public_key: String::new(),
        scanner_subnet_id: format!(
            "/subscriptions/{SUBSCRIPTION}/resourceGroups/{SCANNER_GROUP}/providers/Microsoft.Network/virtualNetworks/scanners/subnets/default"
        ),
        arm_endpoint: "https://management.azure.com".into(),
    }
}

fn target_vm(resource_group: &str, name: &str, location: &str) -> VirtualMachine {
    let mut vm = VirtualMachine {
        id: resource_id(resource_group, "virtualMachines", name),
        name: name.into(),
        location: location.into(),
        ..Default::default()
    };
    vm.properties.provisioning_state = Some(PROVISIONING_STATE_SUCCEEDED.into());
    vm.properties.storage_profile.os_disk = Some(OsDisk {
        name: format!("{name}-osdisk"),
        os_type: Some("Linux".into()),
        managed_disk: Some(ManagedDiskParameters {
            id: Some(resource_id(resource_group, "disks", &format!("{name}-osdisk"))),
            ..Default::default()
        }),
        ..Default::default()
    });
    vm
}

fn job(scan_result_id: &str, target: &VirtualMachine) -> ScanJobConfig {
    ScanJobConfig {
        scan_result_id: scan_result_id.into(),
        target: VmInfo {
            instance_id: target.id.clone(),
            location: target.location.clone(),
            image: String::new(),
            platform: "linux".into(),
            launch_time: None,
            tags: Vec::new(),
        },
        families: FamiliesConfig::default(),
        timeout_secs: 3600,
    }
}

/// Poll the setup pipeline the way the production retry loop does,
/// letting the fake cloud settle between attempts.
async fn drive_setup(
    client: &AzureClient,
    fake: &FakeCompute,
    job: &ScanJobConfig,
) -> VirtualMachine {
    for _ in 0..32 {
        match client.ensure_scanner(job).await {
            Ok(vm) => return vm,
            Err(err) if err.is_retryable() => fake.settle(),
            Err(err) => panic!("fatal error during setup: {err}"),
        }
    }
    panic!("setup did not converge");
}

async fn drive_teardown(client: &AzureClient, job: &ScanJobConfig) {
    for _ in 0..32 {
        match client.remove_scanner(job).await {
            Ok(()) => return,
            Err(err) if err.is_retryable() => continue,
            Err(err) => panic!("fatal error during teardown: {err}"),
        }
    }
    panic!("teardown did not converge");
}

#[tokio::test]
async fn setup_converges_and_is_idempotent() {
    let fake = Arc::new(FakeCompute::default());
    fake.insert_vm("rg-prod", target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-1", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let vm = drive_setup(&client, &fake, &job).await;
    assert_eq!(vm.name, "haukka-scanner-sr-1");

    // One create per resource; the VM sees a second create-or-update
    // for the disk attach.
    assert_eq!(fake.create_calls(SCANNER_GROUP, "haukka-snapshot-sr-1"), 1);
    assert_eq!(fake.create_calls(SCANNER_GROUP, "haukka-disk-sr-1"), 1);
    assert_eq!(fake.create_calls(SCANNER_GROUP, "haukka-nic-sr-1"), 1);
    assert_eq!(fake.create_calls(SCANNER_GROUP, "haukka-scanner-sr-1"), 2);

    // Re-running against terminal state observes, never re-creates.
    let again = client.ensure_scanner(&job).await.unwrap();
    assert_eq!(again.name, "haukka-scanner-sr-1");
    assert_eq!(fake.create_calls(SCANNER_GROUP, "haukka-scanner-sr-1"), 2);
    assert_eq!(fake.create_calls(SCANNER_GROUP, "haukka-snapshot-sr-1"), 1);
}

#[tokio::test]
async fn pending_resources_surface_as_retryable_with_wait_hint() {
    let fake = Arc::new(FakeCompute::default());
    fake.insert_vm("rg-prod", target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-1", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let err = client.ensure_scanner(&job).await.unwrap_err();
    assert!(err.is_retryable());
    assert!(err.retry_delay().is_some());
}

#[tokio::test]
async fn malformed_instance_id_is_fatal() {
    let fake = Arc::new(FakeCompute::default());
    let client = AzureClient::new(fake.clone(), scanner_config());

    let mut bad_job = job("sr-1", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));
    bad_job.target.instance_id = "not/a/real/resource/id".into();

    let err = client.ensure_scanner(&bad_job).await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn missing_target_vm_is_fatal() {
    let fake = Arc::new(FakeCompute::default());
    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-1", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let err = client.ensure_scanner(&job).await.unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn scanner_vm_owned_by_another_scan_result_is_a_conflict() {
    let fake = Arc::new(FakeCompute::default());
    fake.insert_vm("rg-prod", target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    // A terminal VM squatting on our derived name, tagged for a
    // different scan result.
    let mut squatter = target_vm(SCANNER_GROUP, "haukka-scanner-sr-1", SCANNER_LOCATION);
    squatter
        .tags
        .insert("haukka-scan-result-id".into(), "sr-other".into());
    fake.insert_vm(SCANNER_GROUP, squatter);

    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-1", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let err = loop {
        match client.ensure_scanner(&job).await {
            Ok(vm) => panic!("setup must not succeed, got {}", vm.name),
            Err(err) if err.is_retryable() => fake.settle(),
            Err(err) => break err,
        }
    };
    assert!(matches!(
        err,
        haukka_scanner::errors::ScanError::Conflict { .. }
    ));
}

#[tokio::test]
async fn cross_region_target_goes_through_a_snapshot_copy() {
    let fake = Arc::new(FakeCompute::default());
    fake.insert_vm("rg-prod", target_vm("rg-prod", "db-01", "northeurope"));

    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-2", &target_vm("rg-prod", "db-01", "northeurope"));

    drive_setup(&client, &fake, &job).await;
    assert_eq!(
        fake.snapshot_names(),
        vec!["haukka-snapshot-sr-2", "haukka-snapshot-sr-2-copy"]
    );
}

#[tokio::test]
async fn teardown_removes_everything_and_tolerates_reruns() {
    let fake = Arc::new(FakeCompute::default());
    fake.insert_vm("rg-prod", target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-1", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    drive_setup(&client, &fake, &job).await;
    // Teardown must not touch the target.
    drive_teardown(&client, &job).await;

    let state = fake.state.lock().unwrap();
    assert_eq!(state.vms.len(), 1);
    assert!(state.vms.contains_key("rg-prod/web-01"));
    drop(state);

    // Deleting what is already gone is a no-op success.
    assert!(client.remove_scanner(&job).await.is_ok());
}

#[tokio::test]
async fn teardown_of_nothing_succeeds() {
    let fake = Arc::new(FakeCompute::default());
    let client = AzureClient::new(fake.clone(), scanner_config());
    let job = job("sr-9", &target_vm("rg-prod", "web-01", SCANNER_LOCATION));

    assert!(client.remove_scanner(&job).await.is_ok());
    assert!(fake.is_empty());
}

#[tokio::test]
async fn discovery_applies_tag_scope_and_skips_scanner_vms() {
    let fake = Arc::new(FakeCompute::default());

    let mut prod = target_vm("rg-prod", "web-01", SCANNER_LOCATION);
    prod.tags.insert("env".into(), "prod".into());
    fake.insert_vm("rg-prod", prod);

    let mut staging = target_vm("rg-prod", "web-02", SCANNER_LOCATION);
    staging.tags.insert("env".into(), "staging".into());
    fake.insert_vm("rg-prod", staging);

    let mut scanner = target_vm(SCANNER_GROUP, "haukka-scanner-sr-1", SCANNER_LOCATION);
    scanner.tags.insert("managed-by".into(), "haukka".into());
    scanner.tags.insert("env".into(), "prod".into());
    fake.insert_vm(SCANNER_GROUP, scanner);

    let client = AzureClient::new(fake.clone(), scanner_config());
    let scope = ScanScope {
        resource_groups: Vec::new(),
        instance_tag_selector: vec![Tag::new("env", "prod")],
        instance_tag_exclusion: Vec::new(),
    };

    let targets = client.discover_targets(&scope).await.unwrap();
    assert_eq!(targets.len(), 1);
    assert!(targets[0].instance_id.ends_with("/web-01"));
}
