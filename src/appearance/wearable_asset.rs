//! Decoded wearable assets and the `LLWearable` text format

use crate::appearance::types::{AvatarTextureIndex, WearableType};
use crate::appearance::{AppearanceError, AppearanceResult};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Decoded body part or clothing asset
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WearableAsset {
    pub name: String,
    pub wearable_type: Option<WearableType>,
    /// Visual parameter overrides by id
    pub params: BTreeMap<u32, f32>,
    /// Textures this wearable paints, by avatar texture slot
    pub textures: BTreeMap<AvatarTextureIndex, Uuid>,
}

impl WearableAsset {
    pub fn new(wearable_type: WearableType) -> Self {
        Self {
            wearable_type: Some(wearable_type),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, id: u32, value: f32) -> Self {
        self.params.insert(id, value);
        self
    }

    pub fn with_texture(mut self, slot: AvatarTextureIndex, texture_id: Uuid) -> Self {
        self.textures.insert(slot, texture_id);
        self
    }

    /// Decode the textual wearable format:
    ///
    /// ```text
    /// LLWearable version 22
    /// <name>
    /// ...permissions and sale_info blocks...
    /// type 4
    /// parameters 2
    /// 781 0
    /// 800 .89
    /// textures 1
    /// 1 5748decc-f629-461c-9a36-a35a221fe21f
    /// ```
    pub fn decode(data: &str) -> AppearanceResult<Self> {
        let mut lines = data.lines().map(str::trim);

        let header = lines.next().unwrap_or_default();
        if !header.starts_with("LLWearable version") {
            return Err(invalid(format!("bad header {:?}", header)));
        }

        let mut asset = WearableAsset {
            name: lines.next().unwrap_or_default().to_string(),
            ..Default::default()
        };

        let mut depth = 0usize;
        while let Some(line) = lines.next() {
            // skip permissions/sale_info blocks
            if line == "{" {
                depth += 1;
                continue;
            }
            if line == "}" {
                depth = depth.saturating_sub(1);
                continue;
            }
            if depth > 0 || line.is_empty() {
                continue;
            }

            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some("type"), Some(value)) => {
                    let index: u8 = value.parse().map_err(|_| invalid(format!("bad type {:?}", value)))?;
                    asset.wearable_type = Some(
                        WearableType::from_index(index).ok_or_else(|| invalid(format!("unknown type {}", index)))?,
                    );
                }
                (Some("parameters"), Some(count)) => {
                    for _ in 0..parse_count(count)? {
                        let entry = lines.next().ok_or_else(|| invalid("truncated parameters"))?;
                        let (id, value) = split_pair(entry)?;
                        let id: u32 = id.parse().map_err(|_| invalid(format!("bad param id {:?}", id)))?;
                        let value: f32 = value.parse().map_err(|_| invalid(format!("bad param value {:?}", value)))?;
                        asset.params.insert(id, value);
                    }
                }
                (Some("textures"), Some(count)) => {
                    for _ in 0..parse_count(count)? {
                        let entry = lines.next().ok_or_else(|| invalid("truncated textures"))?;
                        let (index, texture) = split_pair(entry)?;
                        let slot = index
                            .parse::<usize>()
                            .ok()
                            .and_then(AvatarTextureIndex::from_index)
                            .ok_or_else(|| invalid(format!("bad texture index {:?}", index)))?;
                        let texture_id = Uuid::parse_str(texture)
                            .map_err(|e| invalid(format!("bad texture id {:?}: {}", texture, e)))?;
                        asset.textures.insert(slot, texture_id);
                    }
                }
                _ => {}
            }
        }

        if asset.wearable_type.is_none() {
            return Err(invalid("missing type"));
        }
        Ok(asset)
    }
}

fn invalid(reason: impl Into<String>) -> AppearanceError {
    AppearanceError::InvalidWearable { reason: reason.into() }
}

fn parse_count(value: &str) -> AppearanceResult<usize> {
    value.parse().map_err(|_| invalid(format!("bad count {:?}", value)))
}

fn split_pair(line: &str) -> AppearanceResult<(&str, &str)> {
    let mut fields = line.split_whitespace();
    match (fields.next(), fields.next()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(invalid(format!("malformed entry {:?}", line))),
    }
}
