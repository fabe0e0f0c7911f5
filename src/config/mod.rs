pub mod settings;
pub mod concurrency;

// Re-export commonly used types
pub use settings::{
    AppearanceSettings, ConcurrencySettings, TimeoutSettings,
    load_settings, load_settings_from, save_settings, save_settings_to,
};
pub use concurrency::{parallel_for, CancelSource, CancelToken};
