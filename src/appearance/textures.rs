//! Per-slot texture state of the avatar
//!
//! All 45 slots sit behind one lock and are addressed by
//! [`AvatarTextureIndex`]; nothing outside this module touches the array.

use crate::appearance::compositor::BakeInput;
use crate::appearance::types::{AvatarTextureIndex, BakeType, Color4, AVATAR_TEXTURE_COUNT, DEFAULT_AVATAR_TEXTURE};
use crate::appearance::visual_params::VisualAlphaParam;
use image::RgbaImage;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Decoded pixels of a downloaded texture
pub type DecodedTexture = Arc<RgbaImage>;

/// Alpha masks keyed by mask identity, valued by mask weight
pub type AlphaMaskSet = BTreeMap<VisualAlphaParam, f32>;

#[derive(Debug, Clone, PartialEq)]
pub struct TextureSlotState {
    pub asset_id: Option<Uuid>,
    pub texture: Option<DecodedTexture>,
    pub alpha_masks: AlphaMaskSet,
    pub tint: Color4,
}

impl Default for TextureSlotState {
    fn default() -> Self {
        Self {
            asset_id: None,
            texture: None,
            alpha_masks: AlphaMaskSet::new(),
            tint: Color4::WHITE,
        }
    }
}

/// Map the grid's blank texture and nil to "no texture"
pub fn normalize_texture_id(texture_id: Uuid) -> Option<Uuid> {
    if texture_id.is_nil() || texture_id == DEFAULT_AVATAR_TEXTURE {
        None
    } else {
        Some(texture_id)
    }
}

#[derive(Debug)]
pub struct TextureSlots {
    slots: RwLock<Vec<TextureSlotState>>,
}

impl Default for TextureSlots {
    fn default() -> Self {
        Self::new()
    }
}

impl TextureSlots {
    /// All slots empty, untinted
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(vec![TextureSlotState::default(); AVATAR_TEXTURE_COUNT]),
        }
    }

    /// Copy of one slot's state
    pub async fn get(&self, slot: AvatarTextureIndex) -> TextureSlotState {
        self.slots.read().await[slot.index()].clone()
    }

    /// Texture id shown in `slot`, if any
    pub async fn asset_id(&self, slot: AvatarTextureIndex) -> Option<Uuid> {
        self.slots.read().await[slot.index()].asset_id
    }

    /// Point a slot at a texture. Decoded pixels are dropped only when the id changes.
    pub async fn set_asset_id(&self, slot: AvatarTextureIndex, texture_id: Uuid) -> bool {
        let texture_id = normalize_texture_id(texture_id);
        let mut slots = self.slots.write().await;
        let state = &mut slots[slot.index()];
        if state.asset_id == texture_id {
            return false;
        }
        state.asset_id = texture_id;
        state.texture = None;
        true
    }

    /// Apply a wearable's resolved layer to a slot
    pub async fn apply_layer(&self, slot: AvatarTextureIndex, texture_id: Uuid, alpha_masks: AlphaMaskSet, tint: Color4) {
        let texture_id = normalize_texture_id(texture_id);
        let mut slots = self.slots.write().await;
        let state = &mut slots[slot.index()];
        if state.asset_id != texture_id {
            state.asset_id = texture_id;
            state.texture = None;
        }
        state.alpha_masks = alpha_masks;
        state.tint = tint;
    }

    /// Store decoded pixels in every slot showing `asset_id`
    pub async fn set_texture(&self, asset_id: Uuid, texture: DecodedTexture) -> usize {
        let mut slots = self.slots.write().await;
        let mut updated = 0;
        for state in slots.iter_mut().filter(|s| s.asset_id == Some(asset_id)) {
            state.texture = Some(Arc::clone(&texture));
            updated += 1;
        }
        updated
    }

    /// Output texture of a bake layer
    pub async fn baked_texture(&self, bake: BakeType) -> Option<Uuid> {
        self.asset_id(bake.baked_texture()).await
    }

    /// Record the output texture of a bake layer
    pub async fn set_baked_texture(&self, bake: BakeType, texture_id: Uuid) {
        self.set_asset_id(bake.baked_texture(), texture_id).await;
    }

    /// Empty the output slot of a bake layer, pixels included
    pub async fn clear_baked_texture(&self, bake: BakeType) {
        let mut slots = self.slots.write().await;
        slots[bake.baked_texture().index()] = TextureSlotState::default();
    }

    /// Forget everything non-baked slots learned from the previous run
    pub async fn reset_unbaked(&self) {
        let mut slots = self.slots.write().await;
        for slot in AvatarTextureIndex::ALL.iter().filter(|s| !s.is_baked()) {
            slots[slot.index()] = TextureSlotState::default();
        }
    }

    /// Drop decoded pixels of non-baked slots; returns how many buffers were freed
    pub async fn free_unbaked_textures(&self) -> usize {
        let mut slots = self.slots.write().await;
        let mut freed = 0;
        for slot in AvatarTextureIndex::ALL.iter().filter(|s| !s.is_baked()) {
            if slots[slot.index()].texture.take().is_some() {
                freed += 1;
            }
        }
        debug!("🧹 Freed {} decoded texture buffers", freed);
        freed
    }

    /// Distinct input textures of `bake` that have an id but no pixels yet
    pub async fn missing_textures(&self, bake: BakeType) -> BTreeSet<Uuid> {
        let slots = self.slots.read().await;
        bake.input_textures()
            .iter()
            .map(|slot| &slots[slot.index()])
            .filter(|state| state.texture.is_none())
            .filter_map(|state| state.asset_id)
            .collect()
    }

    /// Ordered compositor inputs for `bake`
    pub async fn bake_inputs(&self, bake: BakeType) -> Vec<BakeInput> {
        let slots = self.slots.read().await;
        bake.input_textures()
            .iter()
            .map(|slot| {
                let state = &slots[slot.index()];
                BakeInput {
                    slot: *slot,
                    texture_id: state.asset_id,
                    pixels: state.texture.clone(),
                    alpha_masks: state.alpha_masks.clone(),
                    tint: state.tint,
                }
            })
            .collect()
    }

    /// Non-empty slots with their texture ids
    pub async fn texture_ids(&self) -> BTreeMap<AvatarTextureIndex, Uuid> {
        let slots = self.slots.read().await;
        AvatarTextureIndex::ALL
            .iter()
            .filter_map(|slot| slots[slot.index()].asset_id.map(|id| (*slot, id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels() -> DecodedTexture {
        Arc::new(RgbaImage::new(2, 2))
    }

    #[tokio::test]
    async fn test_default_texture_is_empty() {
        let slots = TextureSlots::new();
        assert!(!slots.set_asset_id(AvatarTextureIndex::UpperShirt, DEFAULT_AVATAR_TEXTURE).await);
        assert_eq!(slots.asset_id(AvatarTextureIndex::UpperShirt).await, None);
    }

    #[tokio::test]
    async fn test_same_id_keeps_pixels() {
        let slots = TextureSlots::new();
        let id = Uuid::new_v4();
        slots.set_asset_id(AvatarTextureIndex::UpperShirt, id).await;
        assert_eq!(slots.set_texture(id, pixels()).await, 1);

        assert!(!slots.set_asset_id(AvatarTextureIndex::UpperShirt, id).await);
        assert!(slots.get(AvatarTextureIndex::UpperShirt).await.texture.is_some());

        assert!(slots.set_asset_id(AvatarTextureIndex::UpperShirt, Uuid::new_v4()).await);
        assert!(slots.get(AvatarTextureIndex::UpperShirt).await.texture.is_none());
    }

    #[tokio::test]
    async fn test_missing_textures_are_distinct() {
        let slots = TextureSlots::new();
        let shared = Uuid::new_v4();
        slots.set_asset_id(AvatarTextureIndex::UpperShirt, shared).await;
        slots.set_asset_id(AvatarTextureIndex::UpperJacket, shared).await;
        slots.set_asset_id(AvatarTextureIndex::UpperGloves, Uuid::new_v4()).await;

        assert_eq!(slots.missing_textures(BakeType::UpperBody).await.len(), 2);
        slots.set_texture(shared, pixels()).await;
        assert_eq!(slots.missing_textures(BakeType::UpperBody).await.len(), 1);
    }

    #[tokio::test]
    async fn test_free_keeps_baked_slots() {
        let slots = TextureSlots::new();
        let input = Uuid::new_v4();
        let baked = Uuid::new_v4();
        slots.set_asset_id(AvatarTextureIndex::LowerPants, input).await;
        slots.set_baked_texture(BakeType::LowerBody, baked).await;
        slots.set_texture(input, pixels()).await;
        slots.set_texture(baked, pixels()).await;

        assert_eq!(slots.free_unbaked_textures().await, 1);
        assert!(slots.get(AvatarTextureIndex::LowerBaked).await.texture.is_some());
        assert_eq!(slots.asset_id(AvatarTextureIndex::LowerPants).await, Some(input));

        slots.reset_unbaked().await;
        assert_eq!(slots.asset_id(AvatarTextureIndex::LowerPants).await, None);
        assert_eq!(slots.baked_texture(BakeType::LowerBody).await, Some(baked));
    }
}
