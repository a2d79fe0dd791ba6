//! Locating the game root and the files the settings store owns.
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use super::SettingsError;

pub const MOD_NAME: &str = "RegionKeeper";
pub const MOD_FOLDER: &str = "RegionKeeper";

/// How many ancestors are searched for the game root.
pub const MAX_ASCEND: usize = 10;

/// Ascend from `start` looking for a directory that holds both a `mods` and
/// a `saves` entry, compared case-insensitively.
///
/// # Errors
///
/// Returns [`SettingsError::GameRootNotFound`] when no ancestor within
/// [`MAX_ASCEND`] levels qualifies.
pub fn discover_game_root(start: &Path) -> Result<PathBuf, SettingsError> {
    for candidate in start.ancestors().take(MAX_ASCEND + 1) {
        if is_game_root(candidate) {
            log::debug!("game root found at {}", candidate.display());
            return Ok(candidate.to_path_buf());
        }
    }
    Err(SettingsError::GameRootNotFound(start.to_path_buf()))
}

fn is_game_root(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    let mut has_mods = false;
    let mut has_saves = false;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_ascii_lowercase();
        has_mods |= name == "mods";
        has_saves |= name == "saves";
    }
    has_mods && has_saves
}

/// File locations derived from the game root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPaths {
    game_root: PathBuf,
    mod_folder: String,
    mod_name: String,
}

impl SettingsPaths {
    #[must_use]
    pub fn new(game_root: impl Into<PathBuf>) -> Self {
        Self {
            game_root: game_root.into(),
            mod_folder: MOD_FOLDER.to_string(),
            mod_name: MOD_NAME.to_string(),
        }
    }

    /// Discover the game root upward from `start`.
    ///
    /// # Errors
    ///
    /// Returns an error when no game root is found.
    pub fn discover(start: &Path) -> Result<Self, SettingsError> {
        discover_game_root(start).map(Self::new)
    }

    #[must_use]
    pub fn with_mod_name(mut self, folder: &str, name: &str) -> Self {
        self.mod_folder = folder.to_string();
        self.mod_name = name.to_string();
        self
    }

    #[must_use]
    pub fn game_root(&self) -> &Path {
        &self.game_root
    }

    #[must_use]
    pub fn mod_name(&self) -> &str {
        &self.mod_name
    }

    /// `<game-root>/saves/<ModFolder>`
    #[must_use]
    pub fn settings_dir(&self) -> PathBuf {
        self.game_root.join("saves").join(&self.mod_folder)
    }

    /// `<game-root>/saves/<ModFolder>/<ModName>_Settings.cfg`
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.settings_dir()
            .join(format!("{}_Settings.cfg", self.mod_name))
    }

    /// `<game-root>/<ModName>_Exception.log`
    #[must_use]
    pub fn exception_log(&self) -> PathBuf {
        self.game_root
            .join(format!("{}_Exception.log", self.mod_name))
    }

    /// Sibling of the settings file carrying a timestamp suffix. Adds a
    /// counter when a backup with the same second already exists.
    #[must_use]
    pub fn backup_file(&self, at: DateTime<Local>) -> PathBuf {
        let stamp = at.format("%Y-%m-%d_%H-%M-%S");
        let dir = self.settings_dir();
        let mut candidate = dir.join(format!("{}_Settings_{stamp}.cfg", self.mod_name));
        let mut counter = 1;
        while candidate.exists() {
            candidate = dir.join(format!("{}_Settings_{stamp}_{counter}.cfg", self.mod_name));
            counter += 1;
        }
        candidate
    }

    /// Create the mod folder under `saves` when it is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn ensure_dir(&self) -> Result<(), SettingsError> {
        let dir = self.settings_dir();
        fs::create_dir_all(&dir).map_err(|source| SettingsError::Io { path: dir, source })
    }
}
