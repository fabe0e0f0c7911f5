use crate::appearance::types::{AvatarTextureIndex, BakeType};
use crate::networking::{NetworkError, NetworkResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// One bake layer entry of a cache check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTextureEntry {
    pub bake: BakeType,
    pub cache_id: Uuid,
}

/// Ask the simulator whether bakes with these hashes are already cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTextureRequest {
    pub serial_num: u32,
    pub entries: Vec<CachedTextureEntry>,
}

/// One bake layer entry of a cache check reply; nil texture means a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTextureResult {
    pub bake: BakeType,
    pub texture_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTextureReply {
    pub serial_num: u32,
    pub entries: Vec<CachedTextureResult>,
}

/// Outbound appearance declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSetAppearance {
    pub serial_num: u32,
    pub agent_size: [f32; 3],
    /// Quantized visual parameters in table order
    pub visual_params: Vec<u8>,
    /// Sparse texture entry: only non-empty slots are present
    pub texture_entry: BTreeMap<AvatarTextureIndex, Uuid>,
    /// One cache id per bake layer
    pub cache_ids: Vec<CachedTextureEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppearanceMessage {
    CachedTextureRequest(CachedTextureRequest),
    CachedTextureReply(CachedTextureReply),
    AgentSetAppearance(AgentSetAppearance),
}

impl AppearanceMessage {
    pub fn encode(&self) -> NetworkResult<Bytes> {
        let data = bincode::serialize(self)
            .map_err(|e| NetworkError::Encode { reason: e.to_string() })?;
        Ok(Bytes::from(data))
    }

    pub fn decode(data: &[u8]) -> NetworkResult<Self> {
        Ok(bincode::deserialize(data)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            AppearanceMessage::CachedTextureRequest(_) => "AgentCachedTexture",
            AppearanceMessage::CachedTextureReply(_) => "AgentCachedTextureResponse",
            AppearanceMessage::AgentSetAppearance(_) => "AgentSetAppearance",
        }
    }
}
