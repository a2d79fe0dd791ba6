//! Region registry built once from tuning and read-only afterwards.
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::packs::PackRuntime;
use crate::region::{Region, RegionTuning};

/// Highest raw bit index the exemption bitset can hold.
pub const MAX_RAW_BIT: u32 = 63;

/// Errors raised while finalizing the registry. All of them abort loading.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("regions {first} and {second} share bit index {bit}")]
    DuplicateBit {
        bit: u32,
        first: String,
        second: String,
    },
    #[error("region {name} bit index {bit} exceeds {MAX_RAW_BIT}")]
    BitOutOfRange { name: String, bit: u32 },
    #[error("region name {0} is declared twice")]
    DuplicateName(String),
    #[error("region tuning is invalid: {0}")]
    Parse(String),
}

/// Collects region tuning entries before the registry is finalized.
#[derive(Debug, Clone, Default)]
pub struct RegionRegistryBuilder {
    entries: Vec<RegionTuning>,
}

impl RegionRegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entries(entries: Vec<RegionTuning>) -> Self {
        Self { entries }
    }

    /// Parse a JSON list of region tuning entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a list of region entries.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let entries: Vec<RegionTuning> =
            serde_json::from_str(json).map_err(|err| RegistryError::Parse(err.to_string()))?;
        Ok(Self { entries })
    }

    #[must_use]
    pub fn push(mut self, entry: RegionTuning) -> Self {
        self.entries.push(entry);
        self
    }

    /// Assign bit indices and freeze the region set for the given pack mix.
    ///
    /// Entries whose packs are missing are skipped before any bit is
    /// assigned, so implicit bits stay contiguous over the installed content.
    /// Stuff-pack entries without an explicit bit are skipped as well and do
    /// not advance the counter.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names, duplicate bits among available
    /// regions, or bits past 63.
    pub fn finalize<P: PackRuntime + ?Sized>(
        self,
        runtime: &P,
    ) -> Result<RegionRegistry, RegistryError> {
        let mut available = Vec::with_capacity(self.entries.len());
        let mut previous: Option<u32> = None;
        let mut names = BTreeMap::new();
        let mut owners: BTreeMap<u32, String> = BTreeMap::new();

        for entry in &self.entries {
            let name = entry.name.trim().to_ascii_uppercase();
            if names.insert(name.clone(), entry.id).is_some() {
                return Err(RegistryError::DuplicateName(name));
            }
            if !entry.info.pack.is_satisfied(runtime) {
                log::debug!("region {name} skipped: pack {:?} missing", entry.info.pack);
                continue;
            }
            let bit = match (entry.info.bit, entry.info.pack.kind().bit_offset()) {
                (Some(explicit), _) => explicit,
                (None, Some(offset)) => previous.map_or(0, |prev| prev + offset),
                (None, None) => {
                    log::debug!("region {name} skipped: stuff pack without a bit index");
                    continue;
                }
            };
            if bit > MAX_RAW_BIT {
                return Err(RegistryError::BitOutOfRange { name, bit });
            }
            if let Some(first) = owners.insert(bit, name.clone()) {
                return Err(RegistryError::DuplicateBit {
                    bit,
                    first,
                    second: name,
                });
            }
            previous = Some(bit);
            available.push(Region::from_tuning(entry.clone(), bit));
        }

        log::info!(
            "region registry finalized: {} available of {} declared",
            available.len(),
            self.entries.len()
        );
        Ok(RegionRegistry {
            declared: self.entries,
            available,
        })
    }
}

/// The frozen set of regions known to the mod.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionRegistry {
    declared: Vec<RegionTuning>,
    available: Vec<Region>,
}

impl RegionRegistry {
    /// Region tuning shipped with the mod.
    #[must_use]
    pub fn default_tuning() -> &'static [RegionTuning] {
        static TUNING: OnceLock<Vec<RegionTuning>> = OnceLock::new();
        TUNING.get_or_init(|| {
            serde_json::from_str(include_str!("../data/regions.json"))
                .expect("valid embedded region tuning")
        })
    }

    /// Build the registry from the shipped tuning.
    ///
    /// # Errors
    ///
    /// Returns an error if the shipped tuning violates a registry invariant.
    pub fn with_defaults<P: PackRuntime + ?Sized>(runtime: &P) -> Result<Self, RegistryError> {
        RegionRegistryBuilder::with_entries(Self::default_tuning().to_vec()).finalize(runtime)
    }

    /// Every declared region entry, including ones whose packs are missing.
    #[must_use]
    pub fn all(&self) -> &[RegionTuning] {
        &self.declared
    }

    /// Regions usable with the installed packs.
    #[must_use]
    pub fn available(&self) -> &[Region] {
        &self.available
    }

    /// Look up an available region by symbol. Accepts `willow_creek`,
    /// `WILLOW_CREEK` or `Willow Creek`.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Region> {
        let wanted = normalize_name(name);
        self.available.iter().find(|r| r.name == wanted)
    }

    #[must_use]
    pub fn by_id(&self, id: u32) -> Option<&Region> {
        self.available.iter().find(|r| r.id == id)
    }

    /// Look up by host region tuning reference.
    #[must_use]
    pub fn by_region_ref(&self, region_ref: u64) -> Option<&Region> {
        self.available
            .iter()
            .find(|r| r.region_ref == Some(region_ref))
    }

    #[must_use]
    pub fn by_settings_base(&self, base: &str) -> Option<&Region> {
        self.available.iter().find(|r| r.settings_base() == base)
    }

    /// Union of every available region's bit; upper bound for the exemption bitset.
    #[must_use]
    pub fn max_bit_value(&self) -> u64 {
        self.available.iter().fold(0, |acc, r| acc | r.bit_value())
    }

    #[must_use]
    pub fn tourist_regions(&self) -> Vec<&Region> {
        self.available.iter().filter(|r| r.has_tourists).collect()
    }

    #[must_use]
    pub fn multi_street_regions(&self) -> Vec<&Region> {
        self.available
            .iter()
            .filter(|r| r.is_multi_street())
            .collect()
    }

    /// Regions whose bits are set in `bits`.
    #[must_use]
    pub fn regions_in_bits(&self, bits: u64) -> Vec<&Region> {
        self.available
            .iter()
            .filter(|r| bits & r.bit_value() != 0)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.available.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::{InstalledPacks, PackRequirement};
    use crate::region::{RegionInfo, WorldType};

    fn entry(name: &str, id: u32, pack: &str, bit: Option<u32>) -> RegionTuning {
        RegionTuning {
            name: name.to_string(),
            id,
            info: RegionInfo {
                region_name: name.to_string(),
                pack: PackRequirement::single(pack),
                streets: None,
                icons: Default::default(),
                fixup: None,
                has_tourists: false,
                bit,
                world_type: WorldType::Residential,
                region_ref: Some(u64::from(id) * 1000),
            },
        }
    }

    #[test]
    fn missing_packs_do_not_advance_the_counter() {
        let entries = vec![
            entry("OASIS_SPRINGS", 1, "BASE_GAME", None),
            entry("WILLOW_CREEK", 2, "BASE_GAME", None),
            entry("WINDENBURG", 3, "EP02", None),
            entry("SAN_MYSHUNO", 4, "EP03", None),
        ];
        let partial = RegionRegistryBuilder::with_entries(entries.clone())
            .finalize(&InstalledPacks::from_codes(["EP03"]))
            .unwrap();
        assert_eq!(partial.len(), 3);
        assert!(partial.by_name("windenburg").is_none());
        assert_eq!(partial.by_name("SAN_MYSHUNO").unwrap().raw_bit_index, 2);
        assert_eq!(partial.max_bit_value(), 0b111);
        assert_eq!(partial.all().len(), 4);

        let full = RegionRegistryBuilder::with_entries(entries)
            .finalize(&InstalledPacks::all())
            .unwrap();
        assert_eq!(full.by_name("Windenburg").unwrap().raw_bit_index, 2);
        assert_eq!(full.by_name("San Myshuno").unwrap().raw_bit_index, 3);
        assert_eq!(full.max_bit_value(), 0b1111);
    }

    #[test]
    fn explicit_bits_reset_the_counter() {
        let registry = RegionRegistryBuilder::new()
            .push(entry("A", 1, "BASE_GAME", None))
            .push(entry("B", 2, "EP01", Some(10)))
            .push(entry("C", 3, "EP02", None))
            .finalize(&InstalledPacks::all())
            .unwrap();
        assert_eq!(registry.by_name("C").unwrap().raw_bit_index, 11);
    }

    #[test]
    fn duplicate_bits_are_fatal() {
        let err = RegionRegistryBuilder::new()
            .push(entry("A", 1, "BASE_GAME", Some(2)))
            .push(entry("B", 2, "EP01", Some(2)))
            .finalize(&InstalledPacks::all())
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateBit { bit: 2, .. }));
    }

    #[test]
    fn duplicate_bits_on_missing_packs_are_dropped() {
        let registry = RegionRegistryBuilder::new()
            .push(entry("A", 1, "BASE_GAME", Some(2)))
            .push(entry("B", 2, "EP01", Some(2)))
            .finalize(&InstalledPacks::base_only())
            .unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn stuff_pack_regions_without_bits_are_skipped() {
        let registry = RegionRegistryBuilder::new()
            .push(entry("OASIS_SPRINGS", 1, "BASE_GAME", None))
            .push(entry("TINY_TOWN", 2, "SP13", None))
            .push(entry("WILLOW_CREEK", 3, "BASE_GAME", None))
            .finalize(&InstalledPacks::all())
            .unwrap();
        assert!(registry.by_name("TINY_TOWN").is_none());
        assert_eq!(registry.by_name("WILLOW_CREEK").unwrap().raw_bit_index, 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn stuff_pack_regions_with_bits_are_kept() {
        let registry = RegionRegistryBuilder::new()
            .push(entry("OASIS_SPRINGS", 1, "BASE_GAME", None))
            .push(entry("TINY_TOWN", 2, "SP13", Some(20)))
            .finalize(&InstalledPacks::all())
            .unwrap();
        assert_eq!(registry.by_name("TINY_TOWN").unwrap().raw_bit_index, 20);
    }

    #[test]
    fn lookups_only_see_available_regions() {
        let registry = RegionRegistryBuilder::new()
            .push(entry("A", 1, "BASE_GAME", None))
            .push(entry("B", 2, "EP01", None))
            .finalize(&InstalledPacks::base_only())
            .unwrap();
        assert!(registry.by_id(1).is_some());
        assert!(registry.by_id(2).is_none());
        assert!(registry.by_region_ref(1000).is_some());
        assert!(registry.by_region_ref(2000).is_none());
        assert_eq!(registry.regions_in_bits(0b11).len(), 1);
    }

    #[test]
    fn shipped_tuning_finalizes_with_every_pack() {
        let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
        assert!(registry.by_name("WILLOW_CREEK").is_some());
        assert_eq!(registry.by_name("WILLOW_CREEK").unwrap().bit_value(), 2);
        assert!(!registry.tourist_regions().is_empty());
        assert!(!registry.multi_street_regions().is_empty());
    }
}
