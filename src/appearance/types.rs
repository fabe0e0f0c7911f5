//! Core appearance identities: wearable slots, texture slots and bake layers
//!
//! The numeric values of every enum here are protocol values and must not be
//! reordered.

use crate::appearance::wearable_asset::WearableAsset;
use crate::networking::AssetType;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Texture id the grid uses for "no texture"; normalized to empty on read
pub const DEFAULT_AVATAR_TEXTURE: Uuid = Uuid::from_u128(0xc228d1cf_4b5d_4ba8_84f4_899a0796aa97);

/// Wearable slot an item occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WearableType {
    Shape = 0,
    Skin = 1,
    Hair = 2,
    Eyes = 3,
    Shirt = 4,
    Pants = 5,
    Shoes = 6,
    Socks = 7,
    Jacket = 8,
    Gloves = 9,
    Undershirt = 10,
    Underpants = 11,
    Skirt = 12,
    Alpha = 13,
    Tattoo = 14,
    Physics = 15,
    Universal = 16,
}

impl WearableType {
    pub const ALL: [WearableType; 17] = [
        WearableType::Shape,
        WearableType::Skin,
        WearableType::Hair,
        WearableType::Eyes,
        WearableType::Shirt,
        WearableType::Pants,
        WearableType::Shoes,
        WearableType::Socks,
        WearableType::Jacket,
        WearableType::Gloves,
        WearableType::Undershirt,
        WearableType::Underpants,
        WearableType::Skirt,
        WearableType::Alpha,
        WearableType::Tattoo,
        WearableType::Physics,
        WearableType::Universal,
    ];

    pub const BODYPARTS: [WearableType; 4] =
        [WearableType::Shape, WearableType::Skin, WearableType::Hair, WearableType::Eyes];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn is_bodypart(&self) -> bool {
        Self::BODYPARTS.contains(self)
    }

    /// Asset category items in this slot must carry
    pub fn asset_type(&self) -> AssetType {
        if self.is_bodypart() {
            AssetType::Bodypart
        } else {
            AssetType::Clothing
        }
    }
}

impl std::fmt::Display for WearableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A worn inventory item
#[derive(Debug, Clone)]
pub struct WearableItem {
    pub item_id: Uuid,
    pub asset_id: Uuid,
    pub asset_type: AssetType,
    pub wearable_type: WearableType,
    /// Decoded asset, filled in once downloaded
    pub asset: Option<Arc<WearableAsset>>,
}

impl WearableItem {
    pub fn new(item_id: Uuid, asset_id: Uuid, wearable_type: WearableType) -> Self {
        Self {
            item_id,
            asset_id,
            asset_type: wearable_type.asset_type(),
            wearable_type,
            asset: None,
        }
    }

    pub fn with_asset(mut self, asset: WearableAsset) -> Self {
        self.asset = Some(Arc::new(asset));
        self
    }

    pub fn is_bodypart(&self) -> bool {
        self.asset_type == AssetType::Bodypart
    }
}

/// Per-face texture slots of the avatar mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AvatarTextureIndex {
    HeadBodypaint = 0,
    UpperShirt = 1,
    LowerPants = 2,
    EyesIris = 3,
    Hair = 4,
    UpperBodypaint = 5,
    LowerBodypaint = 6,
    LowerShoes = 7,
    HeadBaked = 8,
    UpperBaked = 9,
    LowerBaked = 10,
    EyesBaked = 11,
    LowerSocks = 12,
    UpperJacket = 13,
    LowerJacket = 14,
    UpperGloves = 15,
    UpperUndershirt = 16,
    LowerUnderpants = 17,
    Skirt = 18,
    SkirtBaked = 19,
    HairBaked = 20,
    LowerAlpha = 21,
    UpperAlpha = 22,
    HeadAlpha = 23,
    EyesAlpha = 24,
    HairAlpha = 25,
    HeadTattoo = 26,
    UpperTattoo = 27,
    LowerTattoo = 28,
    HeadUniversalTattoo = 29,
    UpperUniversalTattoo = 30,
    LowerUniversalTattoo = 31,
    SkirtTattoo = 32,
    HairTattoo = 33,
    EyesTattoo = 34,
    LeftArmTattoo = 35,
    LeftLegTattoo = 36,
    Aux1Tattoo = 37,
    Aux2Tattoo = 38,
    Aux3Tattoo = 39,
    LeftArmBaked = 40,
    LeftLegBaked = 41,
    Aux1Baked = 42,
    Aux2Baked = 43,
    Aux3Baked = 44,
}

pub const AVATAR_TEXTURE_COUNT: usize = 45;

impl AvatarTextureIndex {
    pub const ALL: [AvatarTextureIndex; AVATAR_TEXTURE_COUNT] = {
        use AvatarTextureIndex::*;
        [
            HeadBodypaint, UpperShirt, LowerPants, EyesIris, Hair, UpperBodypaint, LowerBodypaint,
            LowerShoes, HeadBaked, UpperBaked, LowerBaked, EyesBaked, LowerSocks, UpperJacket,
            LowerJacket, UpperGloves, UpperUndershirt, LowerUnderpants, Skirt, SkirtBaked,
            HairBaked, LowerAlpha, UpperAlpha, HeadAlpha, EyesAlpha, HairAlpha, HeadTattoo,
            UpperTattoo, LowerTattoo, HeadUniversalTattoo, UpperUniversalTattoo,
            LowerUniversalTattoo, SkirtTattoo, HairTattoo, EyesTattoo, LeftArmTattoo,
            LeftLegTattoo, Aux1Tattoo, Aux2Tattoo, Aux3Tattoo, LeftArmBaked, LeftLegBaked,
            Aux1Baked, Aux2Baked, Aux3Baked,
        ]
    };

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Bake layer whose output lands in this slot, if this is a baked slot
    pub fn baked_layer(&self) -> Option<BakeType> {
        BakeType::ALL.into_iter().find(|bake| bake.baked_texture() == *self)
    }

    pub fn is_baked(&self) -> bool {
        self.baked_layer().is_some()
    }

    /// Bake layer this input slot contributes to
    pub fn owning_layer(&self) -> Option<BakeType> {
        BakeType::ALL.into_iter().find(|bake| bake.input_textures().contains(self))
    }
}

/// Composited output layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BakeType {
    Head = 0,
    UpperBody = 1,
    LowerBody = 2,
    Eyes = 3,
    Skirt = 4,
    Hair = 5,
    LeftArm = 6,
    LeftLeg = 7,
    Aux1 = 8,
    Aux2 = 9,
    Aux3 = 10,
}

pub const BAKED_TEXTURE_COUNT: usize = 11;

impl BakeType {
    pub const ALL: [BakeType; BAKED_TEXTURE_COUNT] = [
        BakeType::Head,
        BakeType::UpperBody,
        BakeType::LowerBody,
        BakeType::Eyes,
        BakeType::Skirt,
        BakeType::Hair,
        BakeType::LeftArm,
        BakeType::LeftLeg,
        BakeType::Aux1,
        BakeType::Aux2,
        BakeType::Aux3,
    ];

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Output texture slot of this layer
    pub fn baked_texture(&self) -> AvatarTextureIndex {
        use AvatarTextureIndex as T;
        match self {
            BakeType::Head => T::HeadBaked,
            BakeType::UpperBody => T::UpperBaked,
            BakeType::LowerBody => T::LowerBaked,
            BakeType::Eyes => T::EyesBaked,
            BakeType::Skirt => T::SkirtBaked,
            BakeType::Hair => T::HairBaked,
            BakeType::LeftArm => T::LeftArmBaked,
            BakeType::LeftLeg => T::LeftLegBaked,
            BakeType::Aux1 => T::Aux1Baked,
            BakeType::Aux2 => T::Aux2Baked,
            BakeType::Aux3 => T::Aux3Baked,
        }
    }

    /// Ordered input texture slots composited into this layer, bottom first
    pub fn input_textures(&self) -> &'static [AvatarTextureIndex] {
        use AvatarTextureIndex as T;
        match self {
            BakeType::Head => &[T::HeadBodypaint, T::HeadTattoo, T::HeadUniversalTattoo, T::HeadAlpha],
            BakeType::UpperBody => &[
                T::UpperBodypaint,
                T::UpperTattoo,
                T::UpperUniversalTattoo,
                T::UpperGloves,
                T::UpperUndershirt,
                T::UpperShirt,
                T::UpperJacket,
                T::UpperAlpha,
            ],
            BakeType::LowerBody => &[
                T::LowerBodypaint,
                T::LowerTattoo,
                T::LowerUniversalTattoo,
                T::LowerUnderpants,
                T::LowerSocks,
                T::LowerShoes,
                T::LowerPants,
                T::LowerJacket,
                T::LowerAlpha,
            ],
            BakeType::Eyes => &[T::EyesIris, T::EyesTattoo, T::EyesAlpha],
            BakeType::Skirt => &[T::Skirt, T::SkirtTattoo],
            BakeType::Hair => &[T::Hair, T::HairTattoo, T::HairAlpha],
            BakeType::LeftArm => &[T::LeftArmTattoo],
            BakeType::LeftLeg => &[T::LeftLegTattoo],
            BakeType::Aux1 => &[T::Aux1Tattoo],
            BakeType::Aux2 => &[T::Aux2Tattoo],
            BakeType::Aux3 => &[T::Aux3Tattoo],
        }
    }

    /// Wearable slots whose asset ids feed this layer's cache hash
    pub fn contributing_wearables(&self) -> &'static [WearableType] {
        use WearableType as W;
        match self {
            BakeType::Head => &[W::Shape, W::Skin, W::Tattoo, W::Hair, W::Alpha, W::Universal],
            BakeType::UpperBody => &[
                W::Shape,
                W::Skin,
                W::Tattoo,
                W::Shirt,
                W::Jacket,
                W::Gloves,
                W::Undershirt,
                W::Alpha,
                W::Universal,
            ],
            BakeType::LowerBody => &[
                W::Shape,
                W::Skin,
                W::Tattoo,
                W::Pants,
                W::Shoes,
                W::Socks,
                W::Jacket,
                W::Underpants,
                W::Alpha,
                W::Universal,
            ],
            BakeType::Eyes => &[W::Eyes, W::Universal],
            BakeType::Skirt => &[W::Skirt, W::Universal],
            BakeType::Hair => &[W::Hair, W::Alpha, W::Universal],
            BakeType::LeftArm | BakeType::LeftLeg => &[W::Shape, W::Skin, W::Tattoo, W::Universal],
            BakeType::Aux1 | BakeType::Aux2 | BakeType::Aux3 => &[W::Universal],
        }
    }

    /// Per-layer constant folded into the cache hash
    pub fn magic_hash(&self) -> Uuid {
        let value = match self {
            BakeType::Head => 0x18ded8d6_bcfc_e415_8539_944c0f5ea7a6,
            BakeType::UpperBody => 0x338c29e3_3024_4dbb_998d_7c04cf4fa88f,
            BakeType::LowerBody => 0x91b4a2c7_1b1a_ba16_9a16_1f8f8dcc1c3f,
            BakeType::Eyes => 0xb2cf28af_b840_1071_3c6a_78085d8128b5,
            BakeType::Skirt => 0xea800387_ea1a_14e0_56cb_24f2022f969a,
            BakeType::Hair => 0x0af1ef7c_ad24_11dd_8790_001f5bf833e8,
            BakeType::LeftArm => 0x7a1c5e02_4b6e_4d0f_9c1e_33f2c8a7d501,
            BakeType::LeftLeg => 0x5e93b1d4_08a2_4f7c_b6d3_91c04e7a2f12,
            BakeType::Aux1 => 0xc4d62f8a_71e3_4b95_8a0c_2d5f9e31b623,
            BakeType::Aux2 => 0x2b8f4e71_c93d_4a06_95e2_7fa1d3c64b34,
            BakeType::Aux3 => 0x9e07a3c5_5d18_4c2b_a7f4_6b3e82d19c45,
        };
        Uuid::from_u128(value)
    }
}

impl std::fmt::Display for BakeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// RGBA color with float components
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color4 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color4 {
    pub const TRANSPARENT: Color4 = Color4 { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
    pub const WHITE: Color4 = Color4 { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Build from 0-255 components
    pub fn from_bytes(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::new(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a as f32 / 255.0)
    }

    pub fn add(self, other: Color4) -> Self {
        Self::new(self.r + other.r, self.g + other.g, self.b + other.b, self.a + other.a)
    }

    pub fn multiply(self, other: Color4) -> Self {
        Self::new(self.r * other.r, self.g * other.g, self.b * other.b, self.a * other.a)
    }

    pub fn lerp(self, other: Color4, t: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }

    pub fn approx_eq(&self, other: &Color4, epsilon: f32) -> bool {
        (self.r - other.r).abs() <= epsilon
            && (self.g - other.g).abs() <= epsilon
            && (self.b - other.b).abs() <= epsilon
            && (self.a - other.a).abs() <= epsilon
    }
}
