//! Network-facing seams of the appearance subsystem
//!
//! The packet layer, capability HTTP clients and circuit handling live outside
//! this crate. Everything the appearance pipeline needs from them is expressed
//! here as a small set of async traits plus the message payloads exchanged
//! through them.

pub mod assets;
pub mod messages;

pub use assets::{AssetFetcher, AssetType, BakeUploader};
pub use messages::{AppearanceMessage, CachedTextureReply, CachedTextureRequest};

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

// Error types
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },

    #[error("Asset not found: {asset_id}")]
    AssetNotFound { asset_id: Uuid },

    #[error("Message decode failed: {reason}")]
    Decode { reason: String },

    #[error("Message encode failed: {reason}")]
    Encode { reason: String },

    #[error("Upload failed: {reason}")]
    Upload { reason: String },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("{reason}")]
    Other { reason: String },
}

pub type NetworkResult<T> = Result<T, NetworkError>;

impl NetworkError {
    pub fn timeout(operation: impl Into<String>) -> Self {
        NetworkError::Timeout { operation: operation.into() }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, NetworkError::Timeout { .. })
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Transport { reason: err.to_string() }
    }
}

impl From<bincode::Error> for NetworkError {
    fn from(err: bincode::Error) -> Self {
        NetworkError::Decode { reason: err.to_string() }
    }
}

/// Request/reply transport used for cache checks and appearance updates.
///
/// Implementations usually sit on top of the simulator circuit. A reply is
/// matched to its request by the correlation id the caller picks.
#[async_trait]
pub trait AppearanceTransport: Send + Sync {
    /// Send a payload tagged with `correlation_id`
    async fn send_request(&self, correlation_id: u32, payload: Bytes) -> NetworkResult<()>;

    /// Wait for the reply tagged with `correlation_id`, or fail with
    /// [`NetworkError::Timeout`] once `timeout` has elapsed.
    async fn await_reply(&self, correlation_id: u32, timeout: Duration) -> NetworkResult<Bytes>;
}
