// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Scanner Configuration
 * Environment-driven configuration with validation
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use anyhow::Result;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub azure: AzureConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Azure provider configuration. The scanner pool lives in one resource
/// group and location; targets may live anywhere in the subscription.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AzureConfig {
    #[validate(length(min = 1))]
    pub subscription_id: String,

    #[validate(length(min = 1))]
    pub scanner_resource_group: String,

    #[validate(length(min = 1))]
    pub scanner_location: String,

    #[validate(length(min = 1))]
    pub scanner_vm_size: String,

    #[validate(length(min = 1))]
    pub scanner_image_publisher: String,

    #[validate(length(min = 1))]
    pub scanner_image_offer: String,

    #[validate(length(min = 1))]
    pub scanner_image_sku: String,

    #[validate(length(min = 1))]
    pub scanner_image_version: String,

    /// SSH public key installed on scanner VMs; empty disables key auth.
    #[serde(default)]
    pub scanner_public_key: String,

    /// Subnet the scanner network interfaces are placed in.
    #[validate(length(min = 1))]
    pub scanner_subnet_id: String,

    /// ARM endpoint; overridable for testing against a local mock.
    #[serde(default = "default_arm_endpoint")]
    pub arm_endpoint: String,
}

fn default_arm_endpoint() -> String {
    "https://management.azure.com".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            azure: AzureConfig::from_env()?,
            observability: ObservabilityConfig::from_env(),
        };

        config.validate()?;
        Ok(config)
    }
}

impl ObservabilityConfig {
    /// Infallible on purpose: logging setup must not depend on the
    /// cloud configuration being valid.
    pub fn from_env() -> Self {
        Self {
            log_level: env_or("LOG_LEVEL", "info"),
        }
    }
}

impl AzureConfig {
    pub fn from_env() -> Result<Self> {
        let config = Self {
            subscription_id: env_or("AZURE_SUBSCRIPTION_ID", ""),
            scanner_resource_group: env_or("AZURE_SCANNER_RESOURCE_GROUP", ""),
            scanner_location: env_or("AZURE_SCANNER_LOCATION", ""),
            scanner_vm_size: env_or("AZURE_SCANNER_VM_SIZE", "Standard_D2s_v3"),
            scanner_image_publisher: env_or("AZURE_SCANNER_IMAGE_PUBLISHER", "Canonical"),
            scanner_image_offer: env_or(
                "AZURE_SCANNER_IMAGE_OFFER",
                "0001-com-ubuntu-server-jammy",
            ),
            scanner_image_sku: env_or("AZURE_SCANNER_IMAGE_SKU", "22_04-lts-gen2"),
            scanner_image_version: env_or("AZURE_SCANNER_IMAGE_VERSION", "latest"),
            scanner_public_key: env_or("AZURE_SCANNER_PUBLIC_KEY", ""),
            scanner_subnet_id: env_or("AZURE_SCANNER_SUBNET_ID", ""),
            arm_endpoint: env_or("AZURE_ARM_ENDPOINT", &default_arm_endpoint()),
        };

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("invalid azure configuration: {e}"))?;
        Ok(config)
    }
}
