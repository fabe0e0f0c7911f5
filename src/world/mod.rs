pub mod events;

// Re-export all event types for easier access
pub use events::*;
