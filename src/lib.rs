// SLV-Appearance: avatar appearance baking for Second Life clients

pub mod appearance;
pub mod config;
pub mod networking;
pub mod utils;
pub mod world;

// Re-export commonly used types for convenience
pub use appearance::{
    AppearanceError, AppearanceResult, AppearanceRunController, BakeOrchestrator, Collaborators, RunOutcome,
    RunReport,
};
pub use config::{load_settings, AppearanceSettings};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
