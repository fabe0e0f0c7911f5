//! Global visual parameter definitions
//!
//! Every wearable stores only the parameters it overrides; everything else
//! falls back to the defaults in this table. The built-in table carries the
//! parameters this crate refers to by id. A complete avatar definition can be
//! loaded from JSON with [`VisualParamTable::from_json`].

use crate::appearance::types::{Color4, WearableType};
use crate::appearance::{AppearanceError, AppearanceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// How a color parameter combines with the running tint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorOperation {
    Add,
    Multiply,
    Blend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualColorParam {
    pub operation: ColorOperation,
    pub colors: Vec<Color4>,
}

/// Alpha mask a parameter applies to its wearable's textures
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VisualAlphaParam {
    pub tga_file: String,
    #[serde(default)]
    pub skip_if_zero: bool,
    #[serde(default)]
    pub multiply_blend: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualParam {
    pub id: u32,
    pub name: String,
    /// 0 means the parameter is sent in the appearance vector
    pub group: u8,
    pub wearable: WearableType,
    pub min: f32,
    pub max: f32,
    pub default: f32,
    #[serde(default)]
    pub color: Option<VisualColorParam>,
    #[serde(default)]
    pub alpha: Option<VisualAlphaParam>,
    /// Driven sub-parameters
    #[serde(default)]
    pub drivers: Vec<u32>,
}

impl VisualParam {
    fn new(id: u32, name: &str, group: u8, wearable: WearableType, min: f32, max: f32, default: f32) -> Self {
        Self {
            id,
            name: name.to_string(),
            group,
            wearable,
            min,
            max,
            default,
            color: None,
            alpha: None,
            drivers: Vec::new(),
        }
    }

    fn with_color(mut self, operation: ColorOperation, colors: &[[u8; 4]]) -> Self {
        self.color = Some(VisualColorParam {
            operation,
            colors: colors.iter().map(|c| Color4::from_bytes(c[0], c[1], c[2], c[3])).collect(),
        });
        self
    }

    fn with_alpha(mut self, tga_file: &str, skip_if_zero: bool) -> Self {
        self.alpha = Some(VisualAlphaParam {
            tga_file: tga_file.to_string(),
            skip_if_zero,
            multiply_blend: false,
        });
        self
    }

    fn with_drivers(mut self, drivers: &[u32]) -> Self {
        self.drivers = drivers.to_vec();
        self
    }

    /// Quantize a value into one byte across `[min, max]`
    pub fn quantize(&self, value: f32) -> u8 {
        let range = self.max - self.min;
        if range <= 0.0 {
            return 0;
        }
        let normalized = (value.clamp(self.min, self.max) - self.min) / range;
        (normalized * u8::MAX as f32).floor() as u8
    }
}

/// Visual parameter ids used by the agent size formula
pub mod ids {
    pub const HEIGHT: u32 = 33;
    pub const HEEL_HEIGHT: u32 = 198;
    pub const PLATFORM_HEIGHT: u32 = 503;
    pub const HEAD_SIZE: u32 = 682;
    pub const LEG_LENGTH: u32 = 692;
    pub const NECK_LENGTH: u32 = 756;
    pub const HIP_LENGTH: u32 = 842;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualParamTable {
    params: BTreeMap<u32, VisualParam>,
}

impl VisualParamTable {
    pub fn new(params: impl IntoIterator<Item = VisualParam>) -> Self {
        Self {
            params: params.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Parse a table from a JSON array of parameter definitions
    pub fn from_json(json: &str) -> AppearanceResult<Self> {
        let params: Vec<VisualParam> = serde_json::from_str(json)
            .map_err(|e| AppearanceError::Config { reason: format!("visual param table: {}", e) })?;
        Ok(Self::new(params))
    }

    pub fn load(path: &Path) -> AppearanceResult<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| AppearanceError::Config { reason: format!("{}: {}", path.display(), e) })?;
        Self::from_json(&json)
    }

    pub fn get(&self, id: u32) -> Option<&VisualParam> {
        self.params.get(&id)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Group 0 parameters in id order, physics ones only when requested
    pub fn appearance_params(&self, include_physics: bool) -> impl Iterator<Item = &VisualParam> {
        self.params
            .values()
            .filter(move |p| p.group == 0 && (include_physics || p.wearable != WearableType::Physics))
    }

    /// Built-in core table
    pub fn builtin() -> Self {
        use ColorOperation::*;
        use WearableType as W;

        Self::new(vec![
            // shape
            VisualParam::new(ids::HEIGHT, "Height", 0, W::Shape, -2.3, 2.0, -2.3),
            VisualParam::new(ids::HEAD_SIZE, "Head Size", 0, W::Shape, 0.0, 1.0, 0.5),
            VisualParam::new(ids::LEG_LENGTH, "Leg Length", 0, W::Shape, -1.0, 1.0, 0.0),
            VisualParam::new(ids::NECK_LENGTH, "Neck Length", 0, W::Shape, -1.0, 1.0, 0.0),
            VisualParam::new(ids::HIP_LENGTH, "Hip Length", 0, W::Shape, -1.0, 1.0, -1.0),
            // skin
            VisualParam::new(108, "Rainbow Color", 0, W::Skin, 0.0, 1.0, 0.0).with_color(
                Add,
                &[[0, 0, 0, 255], [255, 0, 255, 255], [255, 0, 0, 255], [255, 255, 0, 255], [0, 255, 0, 255], [0, 255, 255, 255], [0, 0, 255, 255], [255, 0, 255, 255]],
            ),
            VisualParam::new(110, "Red Skin", 0, W::Skin, 0.0, 0.1, 0.0)
                .with_color(Add, &[[0, 0, 0, 255], [255, 0, 0, 255]]),
            VisualParam::new(111, "Pigment", 0, W::Skin, 0.0, 1.0, 0.5)
                .with_color(Add, &[[252, 215, 200, 255], [240, 177, 112, 255], [90, 40, 16, 255], [29, 9, 6, 255]]),
            // hair
            VisualParam::new(112, "Rainbow Color", 0, W::Hair, 0.0, 1.0, 0.0).with_color(
                Add,
                &[[0, 0, 0, 255], [255, 0, 255, 255], [255, 0, 0, 255], [255, 255, 0, 255], [0, 255, 0, 255], [0, 255, 255, 255], [0, 0, 255, 255], [255, 0, 255, 255]],
            ),
            VisualParam::new(113, "Red Hair", 0, W::Hair, 0.0, 1.0, 0.0)
                .with_color(Add, &[[0, 0, 0, 255], [118, 47, 19, 255]]),
            VisualParam::new(114, "Blonde Hair", 0, W::Hair, 0.0, 1.0, 0.5)
                .with_color(Add, &[[0, 0, 0, 255], [22, 6, 6, 255], [29, 9, 6, 255], [45, 21, 11, 255], [78, 39, 11, 255], [90, 53, 16, 255], [136, 92, 21, 255], [150, 106, 33, 255], [198, 156, 74, 255], [233, 192, 103, 255], [238, 205, 136, 255]]),
            VisualParam::new(115, "White Hair", 0, W::Hair, 0.0, 1.0, 0.0)
                .with_color(Blend, &[[255, 255, 255, 255]]),
            // eyes
            VisualParam::new(99, "Eye Color", 0, W::Eyes, 0.0, 1.0, 0.0)
                .with_color(Add, &[[50, 25, 5, 255], [109, 55, 15, 255], [150, 93, 49, 255], [152, 118, 25, 255], [95, 179, 107, 255], [87, 192, 191, 255], [95, 172, 179, 255], [128, 128, 128, 255], [0, 0, 0, 255], [255, 255, 0, 255], [0, 255, 0, 255], [0, 255, 255, 255], [0, 0, 255, 255], [255, 0, 255, 255], [255, 0, 0, 255]]),
            // shirt
            VisualParam::new(600, "Sleeve Length", 0, W::Shirt, 0.0, 0.85, 0.7).with_drivers(&[1029]),
            VisualParam::new(1029, "Sleeve Length Cloth", 1, W::Shirt, 0.0, 0.85, 0.7)
                .with_alpha("shirt_sleeve_alpha.tga", false),
            VisualParam::new(803, "Shirt Red", 0, W::Shirt, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[0, 255, 255, 255], [255, 255, 255, 255]]),
            VisualParam::new(804, "Shirt Green", 0, W::Shirt, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[255, 0, 255, 255], [255, 255, 255, 255]]),
            VisualParam::new(805, "Shirt Blue", 0, W::Shirt, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[255, 255, 0, 255], [255, 255, 255, 255]]),
            // pants
            VisualParam::new(615, "Pants Length", 0, W::Pants, 0.0, 1.0, 0.8).with_drivers(&[1047]),
            VisualParam::new(1047, "Pants Length Cloth", 1, W::Pants, 0.0, 1.0, 0.8)
                .with_alpha("pants_length_alpha.tga", false),
            // shoes
            VisualParam::new(ids::HEEL_HEIGHT, "Heel Height", 0, W::Shoes, 0.0, 1.0, 0.0),
            VisualParam::new(ids::PLATFORM_HEIGHT, "Platform Height", 0, W::Shoes, 0.0, 1.0, 0.0),
            // jacket
            VisualParam::new(809, "Jacket Red", 0, W::Jacket, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[0, 255, 255, 255], [255, 255, 255, 255]]),
            VisualParam::new(810, "Jacket Green", 0, W::Jacket, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[255, 0, 255, 255], [255, 255, 255, 255]]),
            VisualParam::new(811, "Jacket Blue", 0, W::Jacket, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[255, 255, 0, 255], [255, 255, 255, 255]]),
            VisualParam::new(834, "Jacket Fabric Color", 0, W::Jacket, 0.0, 1.0, 0.0)
                .with_color(Blend, &[[128, 128, 128, 255]]),
            // skirt
            VisualParam::new(858, "Skirt Length", 0, W::Skirt, 0.01, 1.0, 0.4)
                .with_alpha("skirt_length_alpha.tga", false),
            // tattoo
            VisualParam::new(1062, "Tattoo Red", 0, W::Tattoo, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[0, 255, 255, 255], [255, 255, 255, 255]]),
            VisualParam::new(1063, "Tattoo Green", 0, W::Tattoo, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[255, 0, 255, 255], [255, 255, 255, 255]]),
            VisualParam::new(1064, "Tattoo Blue", 0, W::Tattoo, 0.0, 1.0, 1.0)
                .with_color(Multiply, &[[255, 255, 0, 255], [255, 255, 255, 255]]),
            VisualParam::new(1065, "Tattoo Glow", 0, W::Tattoo, 0.0, 1.0, 0.0)
                .with_color(Blend, &[[255, 255, 255, 255]]),
            // physics
            VisualParam::new(10000, "Breast Physics Mass", 0, W::Physics, 0.1, 1.0, 0.1),
            VisualParam::new(10001, "Breast Physics Gravity", 0, W::Physics, 0.0, 30.0, 0.0),
            VisualParam::new(10002, "Breast Physics Drag", 0, W::Physics, 0.0, 10.0, 1.0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_range() {
        let table = VisualParamTable::builtin();
        let height = table.get(ids::HEIGHT).unwrap();
        assert_eq!(height.quantize(-2.3), 0);
        assert_eq!(height.quantize(2.0), 255);
        assert_eq!(height.quantize(50.0), 255);
        assert_eq!(height.quantize(-50.0), 0);
    }

    #[test]
    fn test_physics_params_are_optional() {
        let table = VisualParamTable::builtin();
        let with = table.appearance_params(true).count();
        let without = table.appearance_params(false).count();
        assert_eq!(with - without, 3);
        assert!(table.appearance_params(true).all(|p| p.group == 0));
    }

    #[test]
    fn test_table_from_json() {
        let json = r#"[
            {"id": 7, "name": "Test", "group": 0, "wearable": "Shirt", "min": 0.0, "max": 1.0, "default": 0.5,
             "color": {"operation": "Blend", "colors": [{"r": 1.0, "g": 0.0, "b": 0.0, "a": 1.0}]}}
        ]"#;
        let table = VisualParamTable::from_json(json).unwrap();
        let param = table.get(7).unwrap();
        assert_eq!(param.wearable, WearableType::Shirt);
        assert_eq!(param.color.as_ref().unwrap().operation, ColorOperation::Blend);
        assert!(param.drivers.is_empty());

        assert!(matches!(VisualParamTable::from_json("{"), Err(AppearanceError::Config { .. })));
    }
}
