// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scan Error Types
 * Error taxonomy for family runs and cloud resource lifecycle
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary - Enterprise Edition
 */

use std::time::Duration;
use thiserror::Error;

use crate::types::FamilyType;

/// Main scanner error type covering both the family pipeline and the
/// cloud resource lifecycle.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The resource is not ready yet; call again after the estimated wait.
    /// This is control flow for the lifecycle poll loop, not a failure.
    #[error("not ready, retry in {estimated_wait:?}: {reason}")]
    Retryable {
        estimated_wait: Duration,
        reason: String,
    },

    /// A condition that will never resolve by retrying (malformed input,
    /// permanent API rejection). Stops the pipeline immediately.
    #[error("fatal: {0}")]
    Fatal(String),

    /// A family run was abandoned because the run context was cancelled.
    /// Distinct from the family's own error.
    #[error("failed to run family {family}: aborted")]
    Aborted { family: FamilyType },

    /// A caller-supplied notification hook failed. Never the family's own
    /// fault; recorded but does not stop sibling families.
    #[error("family {phase} notification failed: {reason}")]
    Notification {
        phase: NotificationPhase,
        reason: String,
    },

    /// A family's own run failed.
    #[error("family {family} failed: {reason}")]
    Family { family: FamilyType, reason: String },

    /// Duplicate target+scan pairing. Surfaced to callers as a structured
    /// "already exists" condition carrying the existing result id.
    #[error("scan result already exists for this target and scan: {existing_id}")]
    Conflict { existing_id: String },

    /// Aggregate marker appended once when any family in a run failed.
    #[error("at least one family failed to run")]
    OneOrMoreFamilyFailed,

    /// Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cloud API transport errors that could not be classified further.
    #[error("cloud API error: {0}")]
    CloudApi(String),
}

/// Which notifier hook failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPhase {
    Started,
    Finished,
}

impl std::fmt::Display for NotificationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationPhase::Started => write!(f, "started"),
            NotificationPhase::Finished => write!(f, "finished"),
        }
    }
}

impl ScanError {
    /// Build a retryable error with an estimated wait hint.
    pub fn retryable(estimated_wait: Duration, reason: impl Into<String>) -> Self {
        ScanError::Retryable {
            estimated_wait,
            reason: reason.into(),
        }
    }

    /// Build a fatal error.
    pub fn fatal(reason: impl Into<String>) -> Self {
        ScanError::Fatal(reason.into())
    }

    /// Check if the error signals "not ready yet, poll again".
    pub fn is_retryable(&self) -> bool {
        matches!(self, ScanError::Retryable { .. })
    }

    /// Get the suggested wait before the next poll, if any.
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            ScanError::Retryable { estimated_wait, .. } => Some(*estimated_wait),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // Transient transport condition; the poll loop may probe again.
            ScanError::Retryable {
                estimated_wait: Duration::from_secs(10),
                reason: format!("cloud API request timed out: {err}"),
            }
        } else {
            ScanError::CloudApi(err.to_string())
        }
    }
}

/// Result type for scanner operations
pub type ScanResult<T> = Result<T, ScanError>;
