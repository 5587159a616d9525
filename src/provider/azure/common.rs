// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Azure Lifecycle Common
 * Wait estimates and the shared idempotent-delete step
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::errors::{ScanError, ScanResult};

// Rough times to terminal state, used as the wait hint on retryable
// errors so pollers don't hammer ARM while a long-running operation is
// in flight. Measured against westeurope, rounded up.
pub const VM_CREATE_ESTIMATE: Duration = Duration::from_secs(120);
pub const VM_DELETE_ESTIMATE: Duration = Duration::from_secs(120);
pub const DISK_CREATE_ESTIMATE: Duration = Duration::from_secs(120);
pub const DISK_ATTACH_ESTIMATE: Duration = Duration::from_secs(120);
pub const DISK_DELETE_ESTIMATE: Duration = Duration::from_secs(60);
pub const SNAPSHOT_CREATE_ESTIMATE: Duration = Duration::from_secs(120);
pub const SNAPSHOT_COPY_ESTIMATE: Duration = Duration::from_secs(240);
pub const SNAPSHOT_DELETE_ESTIMATE: Duration = Duration::from_secs(60);
pub const NIC_CREATE_ESTIMATE: Duration = Duration::from_secs(30);
pub const NIC_DELETE_ESTIMATE: Duration = Duration::from_secs(30);

/// One idempotent teardown step. Absent means done; present means the
/// delete is (re-)issued and the caller is told to come back later.
///
/// The `begin_delete` future is only awaited when the resource still
/// exists, so constructing it up front costs nothing.
pub(super) async fn ensure_deleted<E, D>(
    resource: &str,
    exists: E,
    begin_delete: D,
    estimate: Duration,
) -> ScanResult<()>
where
    E: Future<Output = ScanResult<bool>>,
    D: Future<Output = ScanResult<()>>,
{
    if !exists.await? {
        debug!(resource, "already deleted, nothing to do");
        return Ok(());
    }
    begin_delete.await?;
    Err(ScanError::retryable(
        estimate,
        format!("{resource} delete issued, waiting for completion"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_resource_is_success() {
        let result = ensure_deleted(
            "test disk",
            async { Ok(false) },
            async { panic!("delete must not be issued") },
            DISK_DELETE_ESTIMATE,
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn present_resource_issues_delete_and_retries() {
        let result = ensure_deleted(
            "test disk",
            async { Ok(true) },
            async { Ok(()) },
            DISK_DELETE_ESTIMATE,
        )
        .await;
        let err = result.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.retry_delay(), Some(DISK_DELETE_ESTIMATE));
    }

    #[tokio::test]
    async fn lookup_failure_propagates() {
        let result = ensure_deleted(
            "test disk",
            async { Err(ScanError::Fatal("lookup exploded".into())) },
            async { Ok(()) },
            DISK_DELETE_ESTIMATE,
        )
        .await;
        assert!(!result.unwrap_err().is_retryable());
    }
}
