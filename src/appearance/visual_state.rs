//! Assembles the outbound appearance declaration

use crate::appearance::cache_hash::all_hashes;
use crate::appearance::types::{AvatarTextureIndex, WearableType};
use crate::appearance::visual_params::{ids, VisualParamTable};
use crate::appearance::wearables::WearableMap;
use crate::networking::messages::{AgentSetAppearance, CachedTextureEntry};
use glam::Vec3;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Texture slots carrying the client identification texture
const CLIENT_TAG_SLOTS: [usize; 3] = [0, 5, 6];

/// Avatar height in meters from raw (unquantized) shape parameters
pub fn agent_height(value: impl Fn(u32) -> f32) -> f32 {
    1.706
        + 0.1918 * value(ids::LEG_LENGTH)
        + 0.0375 * value(ids::HIP_LENGTH)
        + 0.12022 * value(ids::HEIGHT)
        + 0.01117 * value(ids::HEAD_SIZE)
        + 0.038 * value(ids::NECK_LENGTH)
        + 0.08 * value(ids::HEEL_HEIGHT)
        + 0.07 * value(ids::PLATFORM_HEIGHT)
}

/// Builds `AgentSetAppearance` messages from the worn set and texture slots
#[derive(Debug, Clone)]
pub struct AgentVisualStateBuilder {
    params: Arc<VisualParamTable>,
    client_tag_texture: Option<Uuid>,
}

impl AgentVisualStateBuilder {
    /// Create a builder over `params`, tagging slots 0, 5 and 6 when `client_tag_texture` is set
    pub fn new(params: Arc<VisualParamTable>, client_tag_texture: Option<Uuid>) -> Self {
        Self { params, client_tag_texture }
    }

    /// Value of `param_id`: the first worn wearable defining it, else the table default
    pub fn param_value(&self, param_id: u32, wearables: &WearableMap) -> f32 {
        wearables
            .values()
            .filter_map(|item| item.asset.as_ref())
            .find_map(|asset| asset.params.get(&param_id).copied())
            .or_else(|| self.params.get(param_id).map(|p| p.default))
            .unwrap_or(0.0)
    }

    /// Quantized appearance parameters in table order.
    /// Physics parameters are only included while a physics wearable is worn.
    pub fn visual_params(&self, wearables: &WearableMap) -> Vec<u8> {
        let include_physics = wearables.contains_key(&WearableType::Physics);
        self.params
            .appearance_params(include_physics)
            .map(|param| param.quantize(self.param_value(param.id, wearables)))
            .collect()
    }

    /// Sparse texture entry with the client tag applied
    pub fn texture_entry(&self, texture_ids: &BTreeMap<AvatarTextureIndex, Uuid>) -> BTreeMap<AvatarTextureIndex, Uuid> {
        let mut entry: BTreeMap<AvatarTextureIndex, Uuid> = texture_ids
            .iter()
            .filter(|(_, id)| !id.is_nil())
            .map(|(slot, id)| (*slot, *id))
            .collect();
        if let Some(tag) = self.client_tag_texture {
            for slot in CLIENT_TAG_SLOTS.iter().filter_map(|i| AvatarTextureIndex::from_index(*i)) {
                entry.insert(slot, tag);
            }
        }
        entry
    }

    /// Avatar bounding size; only the height depends on the shape
    pub fn agent_size(&self, wearables: &WearableMap) -> Vec3 {
        let height = agent_height(|id| self.param_value(id, wearables));
        Vec3::new(0.45, 0.6, height)
    }

    /// Full appearance declaration with cache ids recomputed from `wearables`
    pub fn build(
        &self,
        serial_num: u32,
        wearables: &WearableMap,
        texture_ids: &BTreeMap<AvatarTextureIndex, Uuid>,
    ) -> AgentSetAppearance {
        let visual_params = self.visual_params(wearables);
        let texture_entry = self.texture_entry(texture_ids);
        let cache_ids = all_hashes(wearables)
            .into_iter()
            .map(|(bake, cache_id)| CachedTextureEntry { bake, cache_id })
            .collect();
        let agent_size = self.agent_size(wearables);

        debug!(
            "📤 Appearance #{}: {} params, {} textures, height {:.3}",
            serial_num,
            visual_params.len(),
            texture_entry.len(),
            agent_size.z
        );

        AgentSetAppearance {
            serial_num,
            agent_size: agent_size.to_array(),
            visual_params,
            texture_entry,
            cache_ids,
        }
    }
}
