// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Haukka
 * Cloud VM security scanner: family orchestration plus the ephemeral
 * Azure scanner VM lifecycle that feeds it
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod config;
pub mod errors;
pub mod families;
pub mod provider;
pub mod retry;
pub mod types;

pub use config::AppConfig;
pub use errors::{ScanError, ScanResult};
pub use families::{FamiliesConfig, FamilyManager, FamilyNotifier, FamilyResult, ResultsStore};
pub use provider::AzureClient;
pub use types::{FamilyType, ScanJobConfig, ScanScope, Severity, Tag, VmInfo};
