//! Persisted settings document with schema repair and derived views.
use chrono::Local;
use serde::Serialize;
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use super::SettingsError;
use super::error_log::write_exception_log;
use super::paths::SettingsPaths;
use super::schema::{
    BIDIRECTIONAL_TOGGLE, DEFAULT_SOFT_FILTER_VALUE, HIGH_SCHOOL_TOGGLE, RegionSetting,
    SAVE_ACROSS_GALLERY_TOGGLE, SOFT_FILTER_VALUE, SettingKind, SettingValue, SettingsSchema,
};
use crate::exemption::GalleryLoadBehavior;
use crate::notifications::NotificationType;
use crate::region::{CreationStreets, Region};
use crate::registry::RegionRegistry;

pub type SettingsDocument = BTreeMap<String, SettingValue>;

/// What `load` found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No file existed; defaults were written.
    Created,
    /// The file could not be read or parsed; defaults were written over it.
    Replaced { reason: String },
    /// The file was read; listed keys were repaired, dropped or filled in.
    Loaded {
        repaired: Vec<String>,
        dropped: Vec<String>,
        missing: Vec<String>,
    },
}

impl LoadOutcome {
    #[must_use]
    pub fn rewrote_file(&self) -> bool {
        match self {
            Self::Created | Self::Replaced { .. } => true,
            Self::Loaded {
                repaired,
                dropped,
                missing,
            } => !(repaired.is_empty() && dropped.is_empty() && missing.is_empty()),
        }
    }
}

/// Typed per-region view of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSettings {
    pub soft: bool,
    pub worlds: Vec<String>,
    pub tourists: Option<bool>,
    pub street_weights: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldsOp {
    Allow,
    Disallow,
}

/// Result of a worlds-list change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldsChange {
    pub source_changed: bool,
    pub mirrored: bool,
}

/// Why a street weight change was refused.
#[derive(Debug, Clone, PartialEq)]
pub enum StreetWeightRejection {
    NotMultiStreet,
    UnknownStreet,
    InvalidWeight,
    AllZero,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreetWeightOutcome {
    Stored,
    ResetToDefault,
    Rejected(StreetWeightRejection),
}

#[derive(Debug, Clone)]
struct RegionKeys {
    name: String,
    base: String,
    has_tourists: bool,
    streets: Option<CreationStreets>,
}

#[derive(Debug, Default)]
struct DerivedViews {
    allowed: BTreeMap<String, BTreeSet<String>>,
    soft: BTreeSet<String>,
    tourists_enabled: BTreeSet<String>,
}

/// Owns the settings document and the only handle on the settings file.
#[derive(Debug)]
pub struct SettingsStore {
    paths: SettingsPaths,
    schema: SettingsSchema,
    regions: Vec<RegionKeys>,
    document: SettingsDocument,
    game_version: String,
    derived: OnceCell<DerivedViews>,
}

impl SettingsStore {
    /// Build an in-memory store holding the defaults. Nothing touches disk
    /// until [`SettingsStore::load`] or a mutation.
    #[must_use]
    pub fn new(paths: SettingsPaths, registry: &RegionRegistry) -> Self {
        let schema = SettingsSchema::build(registry);
        let document = schema.default_document();
        let regions = registry
            .available()
            .iter()
            .map(|r| RegionKeys {
                name: r.name.clone(),
                base: r.settings_base(),
                has_tourists: r.has_tourists,
                streets: r.streets.clone(),
            })
            .collect();
        Self {
            paths,
            schema,
            regions,
            document,
            game_version: String::from("unknown"),
            derived: OnceCell::new(),
        }
    }

    /// Build a store and load it from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be written.
    pub fn open(paths: SettingsPaths, registry: &RegionRegistry) -> Result<Self, SettingsError> {
        let mut store = Self::new(paths, registry);
        store.load()?;
        Ok(store)
    }

    #[must_use]
    pub fn with_game_version(mut self, version: &str) -> Self {
        self.game_version = version.to_string();
        self
    }

    #[must_use]
    pub const fn paths(&self) -> &SettingsPaths {
        &self.paths
    }

    #[must_use]
    pub const fn schema(&self) -> &SettingsSchema {
        &self.schema
    }

    #[must_use]
    pub const fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// Read the settings file, repairing whatever does not fit the schema.
    ///
    /// # Errors
    ///
    /// Returns an error only when a rewrite of the file fails.
    pub fn load(&mut self) -> Result<LoadOutcome, SettingsError> {
        self.document = self.schema.default_document();
        self.invalidate();
        self.paths.ensure_dir()?;

        let path = self.paths.settings_file();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                log::info!("no settings at {}, writing defaults", path.display());
                self.save()?;
                return Ok(LoadOutcome::Created);
            }
            Err(err) => return self.replace_with_defaults(err.to_string()),
        };
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(err) => return self.replace_with_defaults(err.to_string()),
        };
        let Value::Object(entries) = parsed else {
            return self.replace_with_defaults("settings root is not an object".to_string());
        };

        let mut repaired = Vec::new();
        let mut dropped = Vec::new();
        for (key, raw_value) in &entries {
            if !self.schema.contains(key) {
                log::warn!("dropping unknown settings key {key}");
                dropped.push(key.clone());
                continue;
            }
            match self.schema.validate(key, raw_value) {
                Some(value) => {
                    if value.to_json() != *raw_value {
                        log::warn!("settings key {key} normalized from {raw_value}");
                        repaired.push(key.clone());
                    }
                    self.document.insert(key.clone(), value);
                }
                None => {
                    log::warn!("settings key {key} had invalid value {raw_value}, restoring default");
                    repaired.push(key.clone());
                }
            }
        }
        let missing: Vec<String> = self
            .schema
            .keys()
            .filter(|key| !entries.contains_key(*key))
            .map(str::to_string)
            .collect();

        let outcome = LoadOutcome::Loaded {
            repaired,
            dropped,
            missing,
        };
        if outcome.rewrote_file() {
            self.save()?;
        }
        Ok(outcome)
    }

    fn replace_with_defaults(&mut self, reason: String) -> Result<LoadOutcome, SettingsError> {
        log::warn!("settings file unreadable ({reason}), writing defaults");
        self.document = self.schema.default_document();
        self.invalidate();
        self.save()?;
        Ok(LoadOutcome::Replaced { reason })
    }

    /// Write the document to disk via a temp file and rename.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be written. The exception log is
    /// written first.
    pub fn save(&self) -> Result<(), SettingsError> {
        self.write_document().inspect_err(|err| {
            write_exception_log(&self.paths.exception_log(), &self.game_version, err);
        })
    }

    fn write_document(&self) -> Result<(), SettingsError> {
        self.paths.ensure_dir()?;
        let path = self.paths.settings_file();
        let body = render_document(&self.document)?;
        let tmp = path.with_extension("cfg.tmp");
        fs::write(&tmp, body).map_err(|source| SettingsError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| SettingsError::Io { path, source })
    }

    fn invalidate(&mut self) {
        self.derived = OnceCell::new();
    }

    /// Copy of the stored value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<SettingValue> {
        self.document.get(key).cloned()
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.document.get(key).and_then(SettingValue::as_bool)
    }

    #[must_use]
    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.document.get(key).and_then(SettingValue::as_float)
    }

    #[must_use]
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.document
            .get(key)
            .and_then(SettingValue::as_list)
            .map(<[String]>::to_vec)
    }

    #[must_use]
    pub fn get_region(&self, region: &Region) -> RegionSettings {
        RegionSettings {
            soft: self
                .get_bool(&RegionSetting::Soft.key_for(region))
                .unwrap_or(false),
            worlds: self
                .get_list(&RegionSetting::Worlds.key_for(region))
                .unwrap_or_default(),
            tourists: self.get_bool(&RegionSetting::TouristsToggle.key_for(region)),
            street_weights: self
                .document
                .get(&RegionSetting::StreetWeights.key_for(region))
                .and_then(SettingValue::as_map)
                .cloned(),
        }
    }

    #[must_use]
    pub fn get_notification(&self, kind: NotificationType) -> bool {
        self.get_bool(&kind.settings_key()).unwrap_or(true)
    }

    /// Store a value when it fits the schema. Returns `Ok(false)` and leaves
    /// the document untouched when it does not.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings file cannot be written.
    pub fn update(&mut self, key: &str, value: SettingValue) -> Result<bool, SettingsError> {
        let Some(valid) = self.schema.validate_value(key, &value) else {
            log::warn!("rejected settings update {key} = {value:?}");
            return Ok(false);
        };
        self.document.insert(key.to_string(), valid);
        self.invalidate();
        self.save()?;
        Ok(true)
    }

    /// Flip a boolean key, or set it to `new` when given. Returns the new value.
    ///
    /// # Errors
    ///
    /// Returns an error for keys that are not booleans, or when the file
    /// cannot be written.
    pub fn toggle(&mut self, key: &str, new: Option<bool>) -> Result<bool, SettingsError> {
        let is_bool = self
            .schema
            .spec(key)
            .is_some_and(|spec| spec.kind == SettingKind::Bool);
        if !is_bool {
            return Err(SettingsError::NotToggle(key.to_string()));
        }
        let value = new.unwrap_or_else(|| !self.get_bool(key).unwrap_or(false));
        self.document
            .insert(key.to_string(), SettingValue::Bool(value));
        self.invalidate();
        self.save()?;
        Ok(value)
    }

    /// [`SettingsStore::update`] for a per-region key.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings file cannot be written.
    pub fn update_region(
        &mut self,
        region: &Region,
        setting: RegionSetting,
        value: SettingValue,
    ) -> Result<bool, SettingsError> {
        self.update(&setting.key_for(region), value)
    }

    /// Add or remove `target` from `source`'s worlds list, mirroring the
    /// change onto `target` when bidirectional mode is on. One write.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings file cannot be written.
    pub fn alter_worlds_list(
        &mut self,
        source: &Region,
        target: &Region,
        op: WorldsOp,
    ) -> Result<WorldsChange, SettingsError> {
        if source.name == target.name {
            return Ok(WorldsChange {
                source_changed: false,
                mirrored: false,
            });
        }
        let source_changed = self.apply_worlds_op(source, &target.name, op);
        let mirrored = self.bidirectional() && self.apply_worlds_op(target, &source.name, op);
        if source_changed || mirrored {
            self.invalidate();
            self.save()?;
        }
        Ok(WorldsChange {
            source_changed,
            mirrored,
        })
    }

    fn apply_worlds_op(&mut self, owner: &Region, other: &str, op: WorldsOp) -> bool {
        let key = RegionSetting::Worlds.key_for(owner);
        let mut worlds = self.get_list(&key).unwrap_or_default();
        let present = worlds.iter().any(|w| w == other);
        match (op, present) {
            (WorldsOp::Allow, false) => worlds.push(other.to_string()),
            (WorldsOp::Disallow, true) => worlds.retain(|w| w != other),
            _ => return false,
        }
        self.document.insert(key, SettingValue::List(worlds));
        true
    }

    /// Change one street's creation weight.
    ///
    /// Weights equal to the tuned default are removed from the overrides.
    /// Changes that would leave every street at zero are refused.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings file cannot be written.
    pub fn set_street_weight(
        &mut self,
        region: &Region,
        street: &str,
        weight: f64,
    ) -> Result<StreetWeightOutcome, SettingsError> {
        let Some(streets) = region.streets.as_ref().filter(|s| s.is_multi_street()) else {
            return Ok(StreetWeightOutcome::Rejected(
                StreetWeightRejection::NotMultiStreet,
            ));
        };
        let Some(default) = streets.default_weight(street) else {
            return Ok(StreetWeightOutcome::Rejected(
                StreetWeightRejection::UnknownStreet,
            ));
        };
        if !weight.is_finite() || weight < 0.0 {
            return Ok(StreetWeightOutcome::Rejected(
                StreetWeightRejection::InvalidWeight,
            ));
        }

        let key = RegionSetting::StreetWeights.key_for(region);
        let mut overrides = self
            .document
            .get(&key)
            .and_then(SettingValue::as_map)
            .cloned()
            .unwrap_or_default();
        let reset = (weight - default).abs() < f64::EPSILON;
        if reset {
            overrides.remove(street);
        } else {
            overrides.insert(street.to_string(), weight);
        }
        if CreationStreets::validate_weights(&streets.effective_weights(&overrides)).is_err() {
            return Ok(StreetWeightOutcome::Rejected(StreetWeightRejection::AllZero));
        }

        self.document.insert(key, SettingValue::Map(overrides));
        self.invalidate();
        self.save()?;
        Ok(if reset {
            StreetWeightOutcome::ResetToDefault
        } else {
            StreetWeightOutcome::Stored
        })
    }

    /// Restore defaults, optionally copying the current file aside first.
    /// Returns the backup path when one was written.
    ///
    /// # Errors
    ///
    /// Returns an error when the defaults cannot be written.
    pub fn reset(&mut self, backup: bool) -> Result<Option<PathBuf>, SettingsError> {
        let backup_path = if backup { self.write_backup() } else { None };
        self.document = self.schema.default_document();
        self.invalidate();
        self.save()?;
        Ok(backup_path)
    }

    fn write_backup(&self) -> Option<PathBuf> {
        let source = self.paths.settings_file();
        let target = self.paths.backup_file(Local::now());
        match fs::copy(&source, &target) {
            Ok(_) => {
                log::info!("settings backed up to {}", target.display());
                Some(target)
            }
            Err(err) => {
                log::warn!("settings backup to {} failed: {err}", target.display());
                None
            }
        }
    }

    fn derived(&self) -> &DerivedViews {
        self.derived.get_or_init(|| {
            let mut views = DerivedViews::default();
            for region in &self.regions {
                let worlds = self
                    .document
                    .get(&format!("{}_{}", region.base, RegionSetting::Worlds.suffix()))
                    .and_then(SettingValue::as_list)
                    .unwrap_or_default();
                let mut allowed: BTreeSet<String> = worlds.iter().cloned().collect();
                allowed.insert(region.name.clone());
                views.allowed.insert(region.name.clone(), allowed);

                let soft_key = format!("{}_{}", region.base, RegionSetting::Soft.suffix());
                if self.get_bool(&soft_key).unwrap_or(false) {
                    views.soft.insert(region.name.clone());
                }
                let tourist_key =
                    format!("{}_{}", region.base, RegionSetting::TouristsToggle.suffix());
                if region.has_tourists && self.get_bool(&tourist_key).unwrap_or(false) {
                    views.tourists_enabled.insert(region.name.clone());
                }
            }
            views
        })
    }

    /// Regions whose residents may be drawn into `region`: the region itself
    /// plus its worlds list.
    #[must_use]
    pub fn allowed_home_regions(&self, region: &Region) -> BTreeSet<String> {
        self.derived()
            .allowed
            .get(&region.name)
            .cloned()
            .unwrap_or_else(|| BTreeSet::from([region.name.clone()]))
    }

    #[must_use]
    pub fn soft_regions(&self) -> BTreeSet<String> {
        self.derived().soft.clone()
    }

    #[must_use]
    pub fn tourist_regions_enabled(&self) -> BTreeSet<String> {
        self.derived().tourists_enabled.clone()
    }

    /// Tuned street weights with this document's overrides applied.
    #[must_use]
    pub fn effective_street_weights(&self, region: &Region) -> Option<BTreeMap<String, f64>> {
        let keys = self.regions.iter().find(|r| r.name == region.name)?;
        let streets = keys.streets.as_ref()?;
        let overrides = self
            .get_region(region)
            .street_weights
            .unwrap_or_default();
        Some(streets.effective_weights(&overrides))
    }

    #[must_use]
    pub fn bidirectional(&self) -> bool {
        self.get_bool(BIDIRECTIONAL_TOGGLE).unwrap_or(false)
    }

    #[must_use]
    pub fn high_school(&self) -> bool {
        self.get_bool(HIGH_SCHOOL_TOGGLE).unwrap_or(false)
    }

    #[must_use]
    pub fn soft_filter_value(&self) -> f64 {
        self.get_float(SOFT_FILTER_VALUE)
            .unwrap_or(DEFAULT_SOFT_FILTER_VALUE)
    }

    #[must_use]
    pub fn gallery_load_behavior(&self) -> GalleryLoadBehavior {
        GalleryLoadBehavior::from_save_across_gallery(
            self.get_bool(SAVE_ACROSS_GALLERY_TOGGLE).unwrap_or(true),
        )
    }
}

/// Serialize with four-space indentation.
///
/// # Errors
///
/// Returns an error if the document cannot be encoded.
pub fn render_document(document: &SettingsDocument) -> Result<String, SettingsError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer)?;
    String::from_utf8(buffer).map_err(|err| SettingsError::Encoding(err.to_string()))
}
