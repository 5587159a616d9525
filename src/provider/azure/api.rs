// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Azure Compute API
 * Trait boundary over ARM plus the thin REST implementation
 *
 * Every `get_*` returns `Ok(None)` for 404 so the lifecycle code can
 * distinguish "absent" from "broken" without string-matching errors.
 * `begin_*` calls only issue the long-running operation; completion is
 * observed by polling the resource state, never by blocking here.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ScanError, ScanResult};
use crate::provider::azure::resources::{Disk, NetworkInterface, Snapshot, VirtualMachine};

const COMPUTE_API_VERSION: &str = "2023-09-01";
const NETWORK_API_VERSION: &str = "2023-06-01";

/// Narrow view of the Azure control plane used by the scanner lifecycle.
///
/// The production implementation is [`ArmClient`]; tests substitute an
/// in-memory fake to drive the state machine without the cloud.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn get_vm(&self, resource_group: &str, name: &str) -> ScanResult<Option<VirtualMachine>>;
    async fn begin_create_or_update_vm(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ScanResult<()>;
    async fn begin_delete_vm(&self, resource_group: &str, name: &str) -> ScanResult<()>;
    /// `None` lists every VM in the subscription.
    async fn list_vms(&self, resource_group: Option<&str>) -> ScanResult<Vec<VirtualMachine>>;

    async fn get_snapshot(&self, resource_group: &str, name: &str) -> ScanResult<Option<Snapshot>>;
    async fn begin_create_snapshot(
        &self,
        resource_group: &str,
        name: &str,
        snapshot: &Snapshot,
    ) -> ScanResult<()>;
    async fn begin_delete_snapshot(&self, resource_group: &str, name: &str) -> ScanResult<()>;

    async fn get_disk(&self, resource_group: &str, name: &str) -> ScanResult<Option<Disk>>;
    async fn begin_create_disk(
        &self,
        resource_group: &str,
        name: &str,
        disk: &Disk,
    ) -> ScanResult<()>;
    async fn begin_delete_disk(&self, resource_group: &str, name: &str) -> ScanResult<()>;

    async fn get_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ScanResult<Option<NetworkInterface>>;
    async fn begin_create_interface(
        &self,
        resource_group: &str,
        name: &str,
        interface: &NetworkInterface,
    ) -> ScanResult<()>;
    async fn begin_delete_interface(&self, resource_group: &str, name: &str) -> ScanResult<()>;
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

/// Thin ARM REST client. No retry logic lives here; transient failures
/// surface as retryable [`ScanError`]s and the caller's poll loop deals
/// with them.
pub struct ArmClient {
    http: Client,
    endpoint: String,
    subscription_id: String,
    access_token: String,
}

impl ArmClient {
    pub fn new(endpoint: &str, subscription_id: &str, access_token: &str) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn resource_url(
        &self,
        resource_group: &str,
        provider: &str,
        resource_type: &str,
        name: &str,
        api_version: &str,
    ) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}?api-version={}",
            self.endpoint, self.subscription_id, resource_group, provider, resource_type, name,
            api_version,
        )
    }

    fn collection_url(
        &self,
        resource_group: &str,
        provider: &str,
        resource_type: &str,
        api_version: &str,
    ) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/{}/{}?api-version={}",
            self.endpoint, self.subscription_id, resource_group, provider, resource_type,
            api_version,
        )
    }

    async fn get_resource<T: DeserializeOwned>(&self, url: &str) -> ScanResult<Option<T>> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<T>().await?)),
            status => Err(arm_error("GET", url, status, response.text().await)),
        }
    }

    async fn put_resource<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> ScanResult<()> {
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            debug!(url, %status, "issued ARM create/update");
            return Ok(());
        }
        Err(arm_error("PUT", url, status, response.text().await))
    }

    async fn delete_resource(&self, url: &str) -> ScanResult<()> {
        let response = self
            .http
            .request(Method::DELETE, url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let status = response.status();
        // 204 means the resource was already gone, which is the outcome
        // the caller wanted anyway.
        if status.is_success() || status == StatusCode::NOT_FOUND {
            debug!(url, %status, "issued ARM delete");
            return Ok(());
        }
        Err(arm_error("DELETE", url, status, response.text().await))
    }
}

fn arm_error(
    method: &str,
    url: &str,
    status: StatusCode,
    body: Result<String, reqwest::Error>,
) -> ScanError {
    let detail = body.unwrap_or_else(|_| String::from("<unreadable body>"));
    let message = format!("{method} {url} returned {status}: {detail}");
    // Throttling and server-side hiccups are worth another attempt;
    // anything else from ARM is treated as unrecoverable.
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ScanError::retryable(std::time::Duration::from_secs(30), message)
    } else {
        ScanError::Fatal(message)
    }
}

const COMPUTE_PROVIDER: &str = "Microsoft.Compute";
const NETWORK_PROVIDER: &str = "Microsoft.Network";

#[async_trait]
impl ComputeApi for ArmClient {
    async fn get_vm(&self, resource_group: &str, name: &str) -> ScanResult<Option<VirtualMachine>> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "virtualMachines",
            name,
            COMPUTE_API_VERSION,
        );
        self.get_resource(&url).await
    }

    async fn begin_create_or_update_vm(
        &self,
        resource_group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "virtualMachines",
            name,
            COMPUTE_API_VERSION,
        );
        self.put_resource(&url, vm).await
    }

    async fn begin_delete_vm(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "virtualMachines",
            name,
            COMPUTE_API_VERSION,
        );
        self.delete_resource(&url).await
    }

    async fn list_vms(&self, resource_group: Option<&str>) -> ScanResult<Vec<VirtualMachine>> {
        let url = match resource_group {
            Some(rg) => self.collection_url(
                rg,
                COMPUTE_PROVIDER,
                "virtualMachines",
                COMPUTE_API_VERSION,
            ),
            None => format!(
                "{}/subscriptions/{}/providers/{}/virtualMachines?api-version={}",
                self.endpoint, self.subscription_id, COMPUTE_PROVIDER, COMPUTE_API_VERSION,
            ),
        };
        let response: Option<ListResponse<VirtualMachine>> = self.get_resource(&url).await?;
        Ok(response.map(|r| r.value).unwrap_or_default())
    }

    async fn get_snapshot(&self, resource_group: &str, name: &str) -> ScanResult<Option<Snapshot>> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "snapshots",
            name,
            COMPUTE_API_VERSION,
        );
        self.get_resource(&url).await
    }

    async fn begin_create_snapshot(
        &self,
        resource_group: &str,
        name: &str,
        snapshot: &Snapshot,
    ) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "snapshots",
            name,
            COMPUTE_API_VERSION,
        );
        self.put_resource(&url, snapshot).await
    }

    async fn begin_delete_snapshot(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "snapshots",
            name,
            COMPUTE_API_VERSION,
        );
        self.delete_resource(&url).await
    }

    async fn get_disk(&self, resource_group: &str, name: &str) -> ScanResult<Option<Disk>> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "disks",
            name,
            COMPUTE_API_VERSION,
        );
        self.get_resource(&url).await
    }

    async fn begin_create_disk(
        &self,
        resource_group: &str,
        name: &str,
        disk: &Disk,
    ) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "disks",
            name,
            COMPUTE_API_VERSION,
        );
        self.put_resource(&url, disk).await
    }

    async fn begin_delete_disk(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            COMPUTE_PROVIDER,
            "disks",
            name,
            COMPUTE_API_VERSION,
        );
        self.delete_resource(&url).await
    }

    async fn get_interface(
        &self,
        resource_group: &str,
        name: &str,
    ) -> ScanResult<Option<NetworkInterface>> {
        let url = self.resource_url(
            resource_group,
            NETWORK_PROVIDER,
            "networkInterfaces",
            name,
            NETWORK_API_VERSION,
        );
        self.get_resource(&url).await
    }

    async fn begin_create_interface(
        &self,
        resource_group: &str,
        name: &str,
        interface: &NetworkInterface,
    ) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            NETWORK_PROVIDER,
            "networkInterfaces",
            name,
            NETWORK_API_VERSION,
        );
        self.put_resource(&url, interface).await
    }

    async fn begin_delete_interface(&self, resource_group: &str, name: &str) -> ScanResult<()> {
        let url = self.resource_url(
            resource_group,
            NETWORK_PROVIDER,
            "networkInterfaces",
            name,
            NETWORK_API_VERSION,
        );
        self.delete_resource(&url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_vm_maps_not_found_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ArmClient::new(&server.uri(), "sub-1", "token");
        let vm = client.get_vm("rg-scan", "missing-vm").await.unwrap();
        assert!(vm.is_none());
    }

    #[tokio::test]
    async fn get_vm_parses_resource_body() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "id": "/subscriptions/sub-1/resourceGroups/rg-scan/providers/Microsoft.Compute/virtualMachines/vm-1",
            "name": "vm-1",
            "location": "westeurope",
            "properties": { "provisioningState": "Succeeded" }
        });
        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/sub-1/resourceGroups/rg-scan/providers/Microsoft.Compute/virtualMachines/vm-1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = ArmClient::new(&server.uri(), "sub-1", "token");
        let vm = client.get_vm("rg-scan", "vm-1").await.unwrap().unwrap();
        assert_eq!(vm.name, "vm-1");
        assert_eq!(
            vm.properties.provisioning_state.as_deref(),
            Some("Succeeded")
        );
    }

    #[tokio::test]
    async fn throttling_is_retryable_and_client_errors_are_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = ArmClient::new(&server.uri(), "sub-1", "token");
        let err = client.begin_delete_vm("rg-scan", "vm-1").await.unwrap_err();
        assert!(err.is_retryable());

        server.reset().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let err = client.begin_delete_vm("rg-scan", "vm-1").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn delete_treats_missing_resource_as_done() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ArmClient::new(&server.uri(), "sub-1", "token");
        assert!(client.begin_delete_disk("rg-scan", "gone").await.is_ok());
    }
}
