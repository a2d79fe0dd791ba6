//! Settings store: schema, persistence and derived views.
use std::path::PathBuf;
use thiserror::Error;

pub mod error_log;
pub mod paths;
pub mod schema;
pub mod store;

pub use paths::{SettingsPaths, discover_game_root};
pub use schema::{RegionSetting, SettingKind, SettingSpec, SettingValue, SettingsSchema};
pub use store::{
    LoadOutcome, RegionSettings, SettingsDocument, SettingsStore, StreetWeightOutcome,
    StreetWeightRejection, WorldsChange, WorldsOp,
};

/// Errors raised by the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings encoding failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("settings encoding failed: {0}")]
    Encoding(String),
    #[error("no directory with both mods and saves above {0}")]
    GameRootNotFound(PathBuf),
    #[error("settings key {0} is not a toggle")]
    NotToggle(String),
}
