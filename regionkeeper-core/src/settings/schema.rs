//! Default settings schema derived from the region registry.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::notifications::NotificationType;
use crate::region::{CreationStreets, Region};
use crate::registry::RegionRegistry;

pub const BIDIRECTIONAL_TOGGLE: &str = "bidirectional_toggle";
pub const HIGH_SCHOOL_TOGGLE: &str = "high_school_toggle";
pub const SOFT_FILTER_VALUE: &str = "soft_filter_value";
pub const SAVE_ACROSS_GALLERY_TOGGLE: &str = "save_across_gallery_toggle";

pub const DEFAULT_SOFT_FILTER_VALUE: f64 = 0.1;

/// A single settings value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Float(f64),
    List(Vec<String>),
    Map(BTreeMap<String, f64>),
}

impl SettingValue {
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&BTreeMap<String, f64>> {
        match self {
            Self::Map(values) => Some(values),
            _ => None,
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Per-region setting suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RegionSetting {
    Soft,
    Worlds,
    TouristsToggle,
    StreetWeights,
}

impl RegionSetting {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Soft => "Soft",
            Self::Worlds => "Worlds",
            Self::TouristsToggle => "TouristsToggle",
            Self::StreetWeights => "StreetWeights",
        }
    }

    #[must_use]
    pub fn key_for(self, region: &Region) -> String {
        format!("{}_{}", region.settings_base(), self.suffix())
    }
}

/// Numeric bound, open or closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Open(f64),
    Closed(f64),
}

impl Bound {
    fn admits_above(self, value: f64) -> bool {
        match self {
            Self::Open(limit) => value > limit,
            Self::Closed(limit) => value >= limit,
        }
    }

    fn admits_below(self, value: f64) -> bool {
        match self {
            Self::Open(limit) => value < limit,
            Self::Closed(limit) => value <= limit,
        }
    }
}

/// Shape and constraints of a settings key.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
    Bool,
    Float { min: Bound, max: Bound },
    /// Names of other available regions.
    RegionList { owner: String },
    /// Overrides keyed by street name.
    StreetWeights { streets: CreationStreets },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingSpec {
    pub key: String,
    pub kind: SettingKind,
    pub default: SettingValue,
}

/// The complete keyspace for one registry.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSchema {
    specs: BTreeMap<String, SettingSpec>,
    region_names: BTreeSet<String>,
}

impl SettingsSchema {
    #[must_use]
    pub fn build(registry: &RegionRegistry) -> Self {
        let mut schema = Self {
            specs: BTreeMap::new(),
            region_names: registry
                .available()
                .iter()
                .map(|r| r.name.clone())
                .collect(),
        };

        for region in registry.available() {
            schema.insert(
                RegionSetting::Soft.key_for(region),
                SettingKind::Bool,
                SettingValue::Bool(false),
            );
            schema.insert(
                RegionSetting::Worlds.key_for(region),
                SettingKind::RegionList {
                    owner: region.name.clone(),
                },
                SettingValue::List(Vec::new()),
            );
            if region.has_tourists {
                schema.insert(
                    RegionSetting::TouristsToggle.key_for(region),
                    SettingKind::Bool,
                    SettingValue::Bool(true),
                );
            }
            if let Some(streets) = region.streets.as_ref().filter(|s| s.is_multi_street()) {
                schema.insert(
                    RegionSetting::StreetWeights.key_for(region),
                    SettingKind::StreetWeights {
                        streets: streets.clone(),
                    },
                    SettingValue::Map(BTreeMap::new()),
                );
            }
        }

        schema.insert(
            BIDIRECTIONAL_TOGGLE.to_string(),
            SettingKind::Bool,
            SettingValue::Bool(false),
        );
        schema.insert(
            HIGH_SCHOOL_TOGGLE.to_string(),
            SettingKind::Bool,
            SettingValue::Bool(false),
        );
        schema.insert(
            SOFT_FILTER_VALUE.to_string(),
            SettingKind::Float {
                min: Bound::Open(0.0),
                max: Bound::Open(1.0),
            },
            SettingValue::Float(DEFAULT_SOFT_FILTER_VALUE),
        );
        schema.insert(
            SAVE_ACROSS_GALLERY_TOGGLE.to_string(),
            SettingKind::Bool,
            SettingValue::Bool(true),
        );

        for kind in NotificationType::ALL {
            schema.insert(kind.settings_key(), SettingKind::Bool, SettingValue::Bool(true));
        }
        schema
    }

    fn insert(&mut self, key: String, kind: SettingKind, default: SettingValue) {
        self.specs.insert(
            key.clone(),
            SettingSpec { key, kind, default },
        );
    }

    #[must_use]
    pub fn spec(&self, key: &str) -> Option<&SettingSpec> {
        self.specs.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.specs.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.specs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    #[must_use]
    pub fn default_document(&self) -> BTreeMap<String, SettingValue> {
        self.specs
            .iter()
            .map(|(key, spec)| (key.clone(), spec.default.clone()))
            .collect()
    }

    /// Check a raw JSON value against the key's spec and return the typed
    /// value when it fits. `None` means the key is unknown or the value is
    /// out of domain.
    #[must_use]
    pub fn validate(&self, key: &str, raw: &Value) -> Option<SettingValue> {
        let spec = self.specs.get(key)?;
        match &spec.kind {
            SettingKind::Bool => raw.as_bool().map(SettingValue::Bool),
            SettingKind::Float { min, max } => {
                let value = raw.as_f64()?;
                (value.is_finite() && min.admits_above(value) && max.admits_below(value))
                    .then_some(SettingValue::Float(value))
            }
            SettingKind::RegionList { owner } => {
                let items = raw.as_array()?;
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str()?;
                    if name == owner || !self.region_names.contains(name) {
                        return None;
                    }
                    if !names.iter().any(|n: &String| n == name) {
                        names.push(name.to_string());
                    }
                }
                Some(SettingValue::List(names))
            }
            SettingKind::StreetWeights { streets } => {
                let object = raw.as_object()?;
                let mut overrides = BTreeMap::new();
                for (street, weight) in object {
                    let weight = weight.as_f64()?;
                    if !streets.has_street(street) || !weight.is_finite() || weight < 0.0 {
                        return None;
                    }
                    overrides.insert(street.clone(), weight);
                }
                CreationStreets::validate_weights(&streets.effective_weights(&overrides)).ok()?;
                Some(SettingValue::Map(overrides))
            }
        }
    }

    /// Validate an already-typed value.
    #[must_use]
    pub fn validate_value(&self, key: &str, value: &SettingValue) -> Option<SettingValue> {
        self.validate(key, &value.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::InstalledPacks;
    use serde_json::json;

    fn schema() -> SettingsSchema {
        let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
        SettingsSchema::build(&registry)
    }

    #[test]
    fn schema_covers_region_global_and_notification_keys() {
        let schema = schema();
        assert!(schema.contains("WillowCreek_Soft"));
        assert!(schema.contains("WillowCreek_Worlds"));
        assert!(schema.contains("WillowCreek_StreetWeights"));
        assert!(!schema.contains("WillowCreek_TouristsToggle"));
        assert!(schema.contains("Sulani_TouristsToggle"));
        assert!(!schema.contains("Newcrest_StreetWeights"));
        assert!(schema.contains(BIDIRECTIONAL_TOGGLE));
        assert!(schema.contains("ShowSettingsResetNotification"));
    }

    #[test]
    fn booleans_are_strict() {
        let schema = schema();
        assert_eq!(
            schema.validate(BIDIRECTIONAL_TOGGLE, &json!(true)),
            Some(SettingValue::Bool(true))
        );
        assert_eq!(schema.validate(BIDIRECTIONAL_TOGGLE, &json!(1)), None);
        assert_eq!(schema.validate(BIDIRECTIONAL_TOGGLE, &json!("true")), None);
    }

    #[test]
    fn soft_value_bounds_are_open() {
        let schema = schema();
        assert_eq!(schema.validate(SOFT_FILTER_VALUE, &json!(0.0)), None);
        assert_eq!(schema.validate(SOFT_FILTER_VALUE, &json!(1.0)), None);
        assert_eq!(schema.validate(SOFT_FILTER_VALUE, &json!(true)), None);
        assert_eq!(
            schema.validate(SOFT_FILTER_VALUE, &json!(0.5)),
            Some(SettingValue::Float(0.5))
        );
    }

    #[test]
    fn worlds_lists_must_name_other_available_regions() {
        let schema = schema();
        let key = "WillowCreek_Worlds";
        assert_eq!(
            schema.validate(key, &json!(["OASIS_SPRINGS", "OASIS_SPRINGS"])),
            Some(SettingValue::List(vec!["OASIS_SPRINGS".to_string()]))
        );
        assert_eq!(schema.validate(key, &json!(["WILLOW_CREEK"])), None);
        assert_eq!(schema.validate(key, &json!(["ATLANTIS"])), None);
        assert_eq!(schema.validate(key, &json!("OASIS_SPRINGS")), None);
        assert_eq!(schema.validate(key, &json!([3])), None);
    }

    #[test]
    fn street_weights_reject_unknown_negative_and_all_zero() {
        let schema = schema();
        let key = "WillowCreek_StreetWeights";
        assert!(schema.validate(key, &json!({"Foundry Cove": 2.0})).is_some());
        assert_eq!(schema.validate(key, &json!({"Nowhere": 1.0})), None);
        assert_eq!(schema.validate(key, &json!({"Foundry Cove": -1.0})), None);
        assert_eq!(
            schema.validate(
                key,
                &json!({"Foundry Cove": 0.0, "Sage Estates": 0.0, "Pinecrest Pinnacle": 0.0})
            ),
            None
        );
    }

    #[test]
    fn unknown_keys_never_validate() {
        assert_eq!(schema().validate("Mystery_Key", &json!(true)), None);
    }
}
