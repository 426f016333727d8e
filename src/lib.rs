// Soundscape - rule-driven adaptive background music for game clients
//
// This is the library crate: pack catalog, condition evaluator, playback
// selector and the virtual resource provider. The binary crate (main.rs)
// inspects a pack root from the command line.

pub mod catalog;
pub mod config;
pub mod evaluator;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod selector;
pub mod session;

// Re-export commonly used types for convenience
pub use catalog::{CatalogError, DiscoveryReport, PackCatalog};
pub use config::ConfigManager;
pub use events::CatalogChange;
pub use models::{ResourceKey, Settings, TrackDefinition, WorldStateSnapshot};
pub use provider::VirtualResourceProvider;
pub use selector::{AudioHost, PlaybackSelector, SelectorState};
pub use session::MusicSession;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
