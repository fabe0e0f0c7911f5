//! Asset transfer seams for the appearance pipeline
//!
//! Wearable and texture downloads plus baked texture uploads go through the
//! traits in this module so the bake orchestrator never depends on a concrete
//! HTTP capability or UDP transfer implementation.

use crate::appearance::textures::DecodedTexture;
use crate::appearance::wearable_asset::WearableAsset;
use crate::networking::NetworkResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

pub mod types;

pub use types::TransferStats;

/// Asset types that flow through the appearance system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AssetType {
    Texture = 0,
    Clothing = 5,
    Bodypart = 13,
}

impl AssetType {
    /// Check if this asset type is a wearable
    pub fn is_wearable(&self) -> bool {
        matches!(self, AssetType::Clothing | AssetType::Bodypart)
    }
}

impl TryFrom<u8> for AssetType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AssetType::Texture),
            5 => Ok(AssetType::Clothing),
            13 => Ok(AssetType::Bodypart),
            other => Err(other),
        }
    }
}

/// Downloads and decodes the assets a bake pass consumes
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Download a wearable asset and decode it
    async fn fetch_wearable_asset(
        &self,
        asset_id: Uuid,
        asset_type: AssetType,
        timeout: Duration,
    ) -> NetworkResult<WearableAsset>;

    /// Download a texture and decode it to RGBA pixels
    async fn fetch_texture(&self, asset_id: Uuid, timeout: Duration) -> NetworkResult<DecodedTexture>;
}

/// Uploads composited bake output and returns the new asset id
#[async_trait]
pub trait BakeUploader: Send + Sync {
    async fn upload_baked_texture(&self, data: Bytes, timeout: Duration) -> NetworkResult<Uuid>;
}
