// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Cloud Providers
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

pub mod azure;
pub mod cloudinit;

pub use azure::{api::ArmClient, api::ComputeApi, AzureClient};
