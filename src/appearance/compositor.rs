//! Seam to the image compositor that merges input layers into one bake

use crate::appearance::textures::{AlphaMaskSet, DecodedTexture};
use crate::appearance::types::{AvatarTextureIndex, BakeType, Color4};
use crate::appearance::AppearanceResult;
use bytes::Bytes;

/// One input layer handed to the compositor, bottom layer first
#[derive(Debug, Clone)]
pub struct BakeInput {
    pub slot: AvatarTextureIndex,
    pub texture_id: Option<uuid::Uuid>,
    /// `None` when the texture is absent or failed to download; treat as transparent
    pub pixels: Option<DecodedTexture>,
    pub alpha_masks: AlphaMaskSet,
    pub tint: Color4,
}

impl BakeInput {
    /// True when the slot names a texture whose pixels never arrived
    pub fn is_degraded(&self) -> bool {
        self.texture_id.is_some() && self.pixels.is_none()
    }
}

/// Opaque baker. Runs on a blocking thread, so implementations may be CPU heavy.
pub trait Compositor: Send + Sync {
    fn bake(&self, bake: BakeType, inputs: &[BakeInput]) -> AppearanceResult<Bytes>;
}
