//! Region descriptors: bit index, icons, creation streets and local fixups.
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::packs::PackRequirement;
use crate::sim::{SimHandle, TraitId};

/// Identifier of a street inside a region's world.
pub type StreetId = u64;

/// Category of world a region lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorldType {
    Base,
    #[default]
    Residential,
    Vacation,
    Hidden,
}

/// A street that freshly created townies can be placed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub id: StreetId,
    pub name: String,
}

/// A street entry in a weighted creation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedStreet {
    pub id: StreetId,
    pub name: String,
    pub weight: f64,
}

/// Errors raised by creation-street policies.
#[derive(Debug, Error, PartialEq)]
pub enum StreetPolicyError {
    #[error("street weights are empty")]
    Empty,
    #[error("street {street} has negative or non-finite weight {weight}")]
    InvalidWeight { street: String, weight: f64 },
    #[error("every street weight is zero")]
    AllZero,
    #[error("unknown street {0}")]
    UnknownStreet(String),
    #[error("unknown region {0}")]
    UnknownRegion(String),
}

/// Where newly generated Sims for a region are housed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStreets {
    Single(Street),
    Weighted(Vec<WeightedStreet>),
}

impl CreationStreets {
    #[must_use]
    pub const fn is_multi_street(&self) -> bool {
        matches!(self, Self::Weighted(_))
    }

    /// Names of every street the policy can yield.
    #[must_use]
    pub fn street_names(&self) -> Vec<&str> {
        match self {
            Self::Single(street) => vec![street.name.as_str()],
            Self::Weighted(streets) => streets.iter().map(|s| s.name.as_str()).collect(),
        }
    }

    #[must_use]
    pub fn has_street(&self, name: &str) -> bool {
        self.street_names().contains(&name)
    }

    /// Tuned weight of the named street, `None` when the policy has no such street.
    #[must_use]
    pub fn default_weight(&self, name: &str) -> Option<f64> {
        match self {
            Self::Single(street) => (street.name == name).then_some(1.0),
            Self::Weighted(streets) => streets.iter().find(|s| s.name == name).map(|s| s.weight),
        }
    }

    /// Tuned weights keyed by street name.
    #[must_use]
    pub fn default_weights(&self) -> BTreeMap<String, f64> {
        match self {
            Self::Single(street) => BTreeMap::from([(street.name.clone(), 1.0)]),
            Self::Weighted(streets) => streets
                .iter()
                .map(|s| (s.name.clone(), s.weight))
                .collect(),
        }
    }

    /// Tuned weights with per-street overrides laid on top.
    #[must_use]
    pub fn effective_weights(&self, overrides: &BTreeMap<String, f64>) -> BTreeMap<String, f64> {
        let mut weights = self.default_weights();
        for (name, weight) in overrides {
            if let Some(slot) = weights.get_mut(name) {
                *slot = *weight;
            }
        }
        weights
    }

    /// Check that a weight map can be drawn from.
    ///
    /// # Errors
    ///
    /// Returns an error for empty maps, negative or non-finite weights, or
    /// maps where every weight is zero.
    pub fn validate_weights(weights: &BTreeMap<String, f64>) -> Result<(), StreetPolicyError> {
        if weights.is_empty() {
            return Err(StreetPolicyError::Empty);
        }
        for (street, weight) in weights {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(StreetPolicyError::InvalidWeight {
                    street: street.clone(),
                    weight: *weight,
                });
            }
        }
        if weights.values().all(|w| *w == 0.0) {
            return Err(StreetPolicyError::AllZero);
        }
        Ok(())
    }

    /// Draw a street, honouring any weight overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when the effective weights cannot be drawn from.
    pub fn pick<R: Rng + ?Sized>(
        &self,
        overrides: &BTreeMap<String, f64>,
        rng: &mut R,
    ) -> Result<Street, StreetPolicyError> {
        let streets = match self {
            Self::Single(street) => return Ok(street.clone()),
            Self::Weighted(streets) => streets,
        };
        let weights = self.effective_weights(overrides);
        Self::validate_weights(&weights)?;
        let ordered: Vec<f64> = streets
            .iter()
            .map(|s| weights.get(&s.name).copied().unwrap_or(0.0))
            .collect();
        let index = WeightedIndex::new(&ordered).map_err(|_| StreetPolicyError::AllZero)?;
        let chosen = &streets[index.sample(rng)];
        Ok(Street {
            id: chosen.id,
            name: chosen.name.clone(),
        })
    }
}

/// Icon resource keys by display size.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IconSet {
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

impl IconSet {
    /// Largest icon available, falling back to smaller sizes.
    #[must_use]
    pub fn best(&self) -> Option<&str> {
        self.large
            .as_deref()
            .or(self.medium.as_deref())
            .or(self.small.as_deref())
    }
}

/// Traits granted to Sims who call the region home.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalFixup {
    #[serde(default)]
    pub traits: SmallVec<[TraitId; 4]>,
}

/// Tuned information for one region entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RegionInfo {
    pub region_name: String,
    #[serde(default)]
    pub pack: PackRequirement,
    #[serde(default)]
    pub streets: Option<CreationStreets>,
    #[serde(default)]
    pub icons: IconSet,
    #[serde(default)]
    pub fixup: Option<LocalFixup>,
    #[serde(default)]
    pub has_tourists: bool,
    #[serde(default)]
    pub bit: Option<u32>,
    #[serde(default)]
    pub world_type: WorldType,
    #[serde(default)]
    pub region_ref: Option<u64>,
}

/// One `(name, id, info)` entry from region tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionTuning {
    pub name: String,
    pub id: u32,
    pub info: RegionInfo,
}

/// A finalized region descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    pub name: String,
    pub id: u32,
    pub region_name: String,
    pub pack: PackRequirement,
    pub streets: Option<CreationStreets>,
    pub icons: IconSet,
    pub fixup: Option<LocalFixup>,
    pub has_tourists: bool,
    pub raw_bit_index: u32,
    pub world_type: WorldType,
    pub region_ref: Option<u64>,
}

impl Region {
    pub(crate) fn from_tuning(entry: RegionTuning, raw_bit_index: u32) -> Self {
        let RegionTuning { name, id, info } = entry;
        Self {
            name: name.trim().to_ascii_uppercase(),
            id,
            region_name: info.region_name,
            pack: info.pack,
            streets: info.streets,
            icons: info.icons,
            fixup: info.fixup,
            has_tourists: info.has_tourists,
            raw_bit_index,
            world_type: info.world_type,
            region_ref: info.region_ref,
        }
    }

    /// Single-bit mask for this region inside the exemption bitset.
    #[must_use]
    pub const fn bit_value(&self) -> u64 {
        1u64 << self.raw_bit_index
    }

    /// `WILLOW_CREEK` becomes `WillowCreek`; prefix for per-region settings keys.
    #[must_use]
    pub fn settings_base(&self) -> String {
        self.name
            .split('_')
            .filter(|part| !part.is_empty())
            .map(capitalize)
            .collect()
    }

    /// `WILLOW_CREEK` becomes `willow_creek`.
    #[must_use]
    pub fn pretty_name(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// `WILLOW_CREEK` becomes `Willow Creek`.
    #[must_use]
    pub fn desc(&self) -> String {
        self.name
            .split('_')
            .filter(|part| !part.is_empty())
            .map(capitalize)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn is_multi_street(&self) -> bool {
        self.streets
            .as_ref()
            .is_some_and(CreationStreets::is_multi_street)
    }

    /// Swap local traits on a Sim whose home region changed from `previous` to `self`.
    ///
    /// Passing `self` as `previous` only revokes this region's traits, which is
    /// how unassignment clears them.
    pub fn apply_local_fixup<S: SimHandle + ?Sized>(&self, sim: &mut S, previous: Option<&Region>) {
        if let Some(old) = previous.and_then(|r| r.fixup.as_ref()) {
            for trait_id in &old.traits {
                sim.remove_trait(*trait_id);
            }
        }
        if previous.is_some_and(|r| r.id == self.id) {
            return;
        }
        if let Some(fixup) = &self.fixup {
            for trait_id in &fixup.traits {
                sim.add_trait(*trait_id);
            }
        }
    }
}

fn capitalize(part: &str) -> String {
    let lower = part.to_ascii_lowercase();
    let mut chars = lower.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_ascii_uppercase().to_string() + chars.as_str()
    })
}
