//! Turns a wearable's visual parameters into tinted, masked texture layers

use crate::appearance::textures::{AlphaMaskSet, TextureSlots};
use crate::appearance::types::{AvatarTextureIndex, Color4, WearableItem, WearableType};
use crate::appearance::visual_params::{ColorOperation, VisualColorParam, VisualParamTable};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Mask weight used in place of an exact zero so the mask still applies
const MIN_ALPHA_WEIGHT: f32 = 0.01;

/// A color parameter together with the value a wearable gave it
#[derive(Debug, Clone, PartialEq)]
pub struct ColorParamInfo {
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub color: VisualColorParam,
}

impl ColorParamInfo {
    /// Color of this parameter alone at its current value
    pub fn color_at_value(&self) -> Color4 {
        let colors = &self.color.colors;
        match colors.len() {
            0 => Color4::TRANSPARENT,
            1 => colors[0],
            n => {
                let step = (self.max - self.min) / (n - 1) as f32;
                if step <= 0.0 {
                    return colors[0];
                }
                let position = ((self.value - self.min) / step).max(0.0);
                let index = (position.floor() as usize).min(n - 2);
                let fraction = (position - index as f32).clamp(0.0, 1.0);
                colors[index].lerp(colors[index + 1], fraction)
            }
        }
    }
}

/// Fold color parameters, in discovery order, into one tint
pub fn color_from_params(params: &[ColorParamInfo]) -> Color4 {
    params.iter().fold(Color4::TRANSPARENT, |result, param| {
        let color = param.color_at_value();
        match param.color.operation {
            ColorOperation::Add => result.add(color),
            ColorOperation::Multiply => result.multiply(color),
            ColorOperation::Blend => result.lerp(color, param.value),
        }
    })
}

/// Which color parameters a wearable type may tint its textures with
fn color_param_allowed(wearable: WearableType, param_id: u32) -> bool {
    match wearable {
        WearableType::Tattoo => matches!(param_id, 1062..=1064),
        WearableType::Hair => matches!(param_id, 112..=115),
        WearableType::Skin => matches!(param_id, 108 | 110 | 111),
        WearableType::Jacket => matches!(param_id, 809..=811),
        _ => true,
    }
}

/// Resolved content of one texture slot
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedLayer {
    pub slot: AvatarTextureIndex,
    pub texture_id: Uuid,
    pub alpha_masks: AlphaMaskSet,
    pub tint: Color4,
}

#[derive(Debug, Clone)]
pub struct TextureLayerResolver {
    params: Arc<VisualParamTable>,
}

impl TextureLayerResolver {
    pub fn new(params: Arc<VisualParamTable>) -> Self {
        Self { params }
    }

    /// Layers a wearable paints. Empty when its asset has not been decoded.
    pub fn resolve(&self, item: &WearableItem) -> Vec<ResolvedLayer> {
        let Some(asset) = item.asset.as_ref() else {
            return Vec::new();
        };

        let mut color_params = Vec::new();
        let mut alpha_masks = AlphaMaskSet::new();

        for (&param_id, &value) in &asset.params {
            let Some(param) = self.params.get(param_id) else {
                continue;
            };

            if let Some(color) = &param.color {
                if color_param_allowed(item.wearable_type, param_id) {
                    color_params.push(ColorParamInfo {
                        value,
                        min: param.min,
                        max: param.max,
                        color: color.clone(),
                    });
                }
            }

            let weight = if value == 0.0 { MIN_ALPHA_WEIGHT } else { value };
            if let Some(alpha) = &param.alpha {
                alpha_masks.insert(alpha.clone(), weight);
            }
            for driven in param.drivers.iter().filter_map(|id| self.params.get(*id)) {
                if let Some(alpha) = &driven.alpha {
                    alpha_masks.insert(alpha.clone(), weight);
                }
            }
        }

        let tint = if color_params.is_empty() {
            Color4::WHITE
        } else {
            color_from_params(&color_params)
        };

        debug!(
            "🎨 Resolved {} {}: {} textures, {} color params, {} alpha masks",
            item.wearable_type,
            item.asset_id,
            asset.textures.len(),
            color_params.len(),
            alpha_masks.len()
        );

        asset
            .textures
            .iter()
            .map(|(slot, texture_id)| ResolvedLayer {
                slot: *slot,
                texture_id: *texture_id,
                alpha_masks: alpha_masks.clone(),
                tint,
            })
            .collect()
    }

    /// Resolve `items` and write the result into `slots`
    pub async fn apply<'a>(&self, items: impl IntoIterator<Item = &'a WearableItem>, slots: &TextureSlots) -> usize {
        let mut applied = 0;
        for item in items {
            for layer in self.resolve(item) {
                slots.apply_layer(layer.slot, layer.texture_id, layer.alpha_masks, layer.tint).await;
                applied += 1;
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appearance::wearable_asset::WearableAsset;

    const EPSILON: f32 = 1e-5;

    fn two_color(value: f32, operation: ColorOperation) -> ColorParamInfo {
        ColorParamInfo {
            value,
            min: 0.0,
            max: 2.0,
            color: VisualColorParam {
                operation,
                colors: vec![Color4::new(0.0, 0.2, 0.4, 1.0), Color4::new(1.0, 0.6, 0.0, 1.0)],
            },
        }
    }

    #[test]
    fn test_single_color_ignores_value() {
        let expected = Color4::new(0.3, 0.4, 0.5, 1.0);
        for value in [-10.0, 0.0, 0.5, 1.0, 99.0] {
            let param = ColorParamInfo {
                value,
                min: 0.0,
                max: 1.0,
                color: VisualColorParam { operation: ColorOperation::Add, colors: vec![expected] },
            };
            assert_eq!(param.color_at_value(), expected);
        }
    }

    #[test]
    fn test_two_color_boundaries() {
        let at_min = two_color(0.0, ColorOperation::Add).color_at_value();
        let at_max = two_color(2.0, ColorOperation::Add).color_at_value();
        let at_mid = two_color(1.0, ColorOperation::Add).color_at_value();

        assert!(at_min.approx_eq(&Color4::new(0.0, 0.2, 0.4, 1.0), EPSILON));
        assert!(at_max.approx_eq(&Color4::new(1.0, 0.6, 0.0, 1.0), EPSILON));
        assert!(at_mid.approx_eq(&Color4::new(0.5, 0.4, 0.2, 1.0), EPSILON));
    }

    #[test]
    fn test_value_beyond_max_clamps_to_last_entry() {
        let color = two_color(5.0, ColorOperation::Add).color_at_value();
        assert!(color.approx_eq(&Color4::new(1.0, 0.6, 0.0, 1.0), EPSILON));
    }

    #[test]
    fn test_operations_combine_in_order() {
        let white = VisualColorParam { operation: ColorOperation::Add, colors: vec![Color4::WHITE] };
        let half = VisualColorParam {
            operation: ColorOperation::Multiply,
            colors: vec![Color4::new(0.5, 0.5, 0.5, 1.0)],
        };
        let red = VisualColorParam {
            operation: ColorOperation::Blend,
            colors: vec![Color4::new(1.0, 0.0, 0.0, 1.0)],
        };
        let params = vec![
            ColorParamInfo { value: 1.0, min: 0.0, max: 1.0, color: white },
            ColorParamInfo { value: 1.0, min: 0.0, max: 1.0, color: half },
            ColorParamInfo { value: 0.5, min: 0.0, max: 1.0, color: red },
        ];
        let result = color_from_params(&params);
        assert!(result.approx_eq(&Color4::new(0.75, 0.25, 0.25, 1.0), EPSILON));
    }

    #[test]
    fn test_tattoo_only_uses_its_color_params() {
        let resolver = TextureLayerResolver::new(Arc::new(VisualParamTable::builtin()));
        let texture = Uuid::new_v4();
        let asset = WearableAsset::new(WearableType::Tattoo)
            .with_param(1062, 1.0)
            .with_param(1063, 1.0)
            .with_param(1064, 1.0)
            .with_param(1065, 1.0)
            .with_texture(AvatarTextureIndex::UpperTattoo, texture);
        let item = WearableItem::new(Uuid::new_v4(), Uuid::new_v4(), WearableType::Tattoo).with_asset(asset);

        let layers = resolver.resolve(&item);
        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].slot, AvatarTextureIndex::UpperTattoo);
        // 1065 is a blend toward white and would have lifted the tint if it were used
        assert!(layers[0].tint.approx_eq(&Color4::TRANSPARENT, EPSILON));
    }

    #[test]
    fn test_zero_alpha_value_uses_minimum_weight() {
        let resolver = TextureLayerResolver::new(Arc::new(VisualParamTable::builtin()));
        let asset = WearableAsset::new(WearableType::Shirt)
            .with_param(600, 0.0)
            .with_texture(AvatarTextureIndex::UpperShirt, Uuid::new_v4());
        let item = WearableItem::new(Uuid::new_v4(), Uuid::new_v4(), WearableType::Shirt).with_asset(asset);

        let layers = resolver.resolve(&item);
        let (mask, weight) = layers[0].alpha_masks.iter().next().unwrap();
        assert_eq!(mask.tga_file, "shirt_sleeve_alpha.tga");
        assert_eq!(*weight, MIN_ALPHA_WEIGHT);
        assert_eq!(layers[0].tint, Color4::WHITE);
    }

    #[test]
    fn test_undecoded_wearable_resolves_to_nothing() {
        let resolver = TextureLayerResolver::new(Arc::new(VisualParamTable::builtin()));
        let item = WearableItem::new(Uuid::new_v4(), Uuid::new_v4(), WearableType::Pants);
        assert!(resolver.resolve(&item).is_empty());
    }

    #[tokio::test]
    async fn test_apply_writes_slots() {
        let resolver = TextureLayerResolver::new(Arc::new(VisualParamTable::builtin()));
        let texture = Uuid::new_v4();
        let asset = WearableAsset::new(WearableType::Pants)
            .with_param(615, 0.5)
            .with_texture(AvatarTextureIndex::LowerPants, texture);
        let item = WearableItem::new(Uuid::new_v4(), Uuid::new_v4(), WearableType::Pants).with_asset(asset);
        let slots = TextureSlots::new();

        assert_eq!(resolver.apply([&item], &slots).await, 1);
        let state = slots.get(AvatarTextureIndex::LowerPants).await;
        assert_eq!(state.asset_id, Some(texture));
        assert_eq!(state.alpha_masks.values().copied().collect::<Vec<_>>(), vec![0.5]);
    }
}
