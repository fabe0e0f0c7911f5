//! Avatar appearance baking
//!
//! Worn wearables are resolved into per-slot texture layers, checked against
//! the server's bake cache, composited into the eleven baked textures and
//! uploaded, after which the agent's appearance is declared to the simulator.

pub mod cache_hash;
pub mod compositor;
pub mod controller;
pub mod layers;
pub mod orchestrator;
pub mod state_machine;
pub mod textures;
pub mod types;
pub mod visual_params;
pub mod visual_state;
pub mod wearable_asset;
pub mod wearables;

pub use cache_hash::{compute_hash, compute_hashes, CacheCheckResult, CacheHashNegotiator};
pub use compositor::{BakeInput, Compositor};
pub use controller::{AppearanceRunController, InventorySource};
pub use layers::{color_from_params, ColorParamInfo, TextureLayerResolver};
pub use orchestrator::{BakeOrchestrator, Collaborators, LayerOutcome, RunOptions, RunOutcome, RunReport};
pub use state_machine::{BakeState, BakeStateMachine};
pub use textures::{DecodedTexture, TextureSlots};
pub use types::{AvatarTextureIndex, BakeType, Color4, WearableItem, WearableType};
pub use visual_params::{VisualParam, VisualParamTable};
pub use visual_state::{agent_height, AgentVisualStateBuilder};
pub use wearable_asset::WearableAsset;
pub use wearables::{WearableMap, WearableStore};

use crate::networking::NetworkError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppearanceError {
    #[error("An appearance run is already in progress")]
    RunInProgress,

    #[error("Appearance run cancelled")]
    Cancelled,

    #[error("Current wearables unavailable: {reason}")]
    WearablesUnavailable { reason: String },

    #[error("Body part {slot} cannot be removed")]
    BodypartRemoval { slot: WearableType },

    #[error("Item worn in {slot} is not the one being removed")]
    ItemMismatch { slot: WearableType },

    #[error("Invalid wearable: {reason}")]
    InvalidWearable { reason: String },

    #[error("Baking {layer} failed: {reason}")]
    Bake { layer: BakeType, reason: String },

    #[error("Invalid bake state transition from {from} to {to}")]
    InvalidTransition { from: BakeState, to: BakeState },

    #[error("Configuration error: {reason}")]
    Config { reason: String },

    #[error(transparent)]
    Network(#[from] NetworkError),
}

pub type AppearanceResult<T> = Result<T, AppearanceError>;

impl AppearanceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppearanceError::Cancelled)
    }
}
