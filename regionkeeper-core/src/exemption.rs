//! Per-Sim region exemption bitset.
//!
//! Bit `i` of the statistic is set when the Sim may be pulled into the region
//! whose raw bit index is `i`, regardless of that region's restrictions.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::registry::RegionRegistry;
use crate::region::Region;
use crate::sim::Statistic;

/// What happens to the statistic when a Sim is imported from the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GalleryLoadBehavior {
    /// Value travels with the Sim.
    Keep,
    /// Value is reset to zero on import.
    Clear,
}

impl GalleryLoadBehavior {
    #[must_use]
    pub const fn from_save_across_gallery(save_across_gallery: bool) -> Self {
        if save_across_gallery {
            Self::Keep
        } else {
            Self::Clear
        }
    }
}

/// Integer statistic backing the bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExemptionStat {
    value: u64,
    max_value: u64,
}

impl ExemptionStat {
    #[must_use]
    pub const fn new(max_value: u64) -> Self {
        Self {
            value: 0,
            max_value,
        }
    }

    /// Raise or lower the ceiling; bits above the new ceiling are dropped.
    pub const fn set_max_value(&mut self, max_value: u64) {
        self.max_value = max_value;
        self.value &= max_value;
    }
}

impl Statistic for ExemptionStat {
    fn get_value(&self) -> u64 {
        self.value
    }

    fn set_value(&mut self, value: u64) {
        self.value = value & self.max_value;
    }

    fn min_value(&self) -> u64 {
        0
    }

    fn max_value(&self) -> u64 {
        self.max_value
    }
}

/// Apply the gallery policy to a freshly imported Sim's statistic.
pub fn on_gallery_import(stat: &mut dyn Statistic, behavior: GalleryLoadBehavior) {
    if behavior == GalleryLoadBehavior::Clear {
        stat.set_value(stat.min_value());
    }
}

/// Read-only view over a Sim's exemption bits.
pub struct ExemptionView<'a> {
    bits: u64,
    registry: &'a RegionRegistry,
}

impl<'a> ExemptionView<'a> {
    #[must_use]
    pub const fn new(bits: u64, registry: &'a RegionRegistry) -> Self {
        Self { bits, registry }
    }

    #[must_use]
    pub const fn bits(&self) -> u64 {
        self.bits
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub const fn is_allowed(&self, region: &Region) -> bool {
        self.bits & region.bit_value() != 0
    }

    #[must_use]
    pub fn allowed_regions(&self) -> BTreeSet<&'a str> {
        self.registry
            .available()
            .iter()
            .filter(|r| self.is_allowed(r))
            .map(|r| r.name.as_str())
            .collect()
    }

    #[must_use]
    pub fn disallowed_regions(&self) -> BTreeSet<&'a str> {
        self.registry
            .available()
            .iter()
            .filter(|r| !self.is_allowed(r))
            .map(|r| r.name.as_str())
            .collect()
    }
}

/// Mutable bitset over a Sim's exemption statistic. The only way the value
/// is changed.
pub struct RegionExemptions<'a> {
    stat: &'a mut dyn Statistic,
    registry: &'a RegionRegistry,
}

impl<'a> RegionExemptions<'a> {
    pub fn new(stat: &'a mut dyn Statistic, registry: &'a RegionRegistry) -> Self {
        Self { stat, registry }
    }

    #[must_use]
    pub fn get_value(&self) -> u64 {
        self.stat.get_value()
    }

    #[must_use]
    pub fn view(&self) -> ExemptionView<'a> {
        ExemptionView::new(self.stat.get_value(), self.registry)
    }

    #[must_use]
    pub fn is_allowed(&self, region: &Region) -> bool {
        self.view().is_allowed(region)
    }

    #[must_use]
    pub fn allowed_regions(&self) -> BTreeSet<&'a str> {
        self.view().allowed_regions()
    }

    #[must_use]
    pub fn disallowed_regions(&self) -> BTreeSet<&'a str> {
        self.view().disallowed_regions()
    }

    /// Set the region's bit. Returns false when it was already set.
    pub fn allow(&mut self, region: &Region) -> bool {
        let current = self.stat.get_value();
        if current & region.bit_value() != 0 {
            return false;
        }
        self.stat.set_value(current | region.bit_value());
        true
    }

    /// Clear the region's bit. Returns false when it was already clear.
    pub fn disallow(&mut self, region: &Region) -> bool {
        let current = self.stat.get_value();
        if current & region.bit_value() == 0 {
            return false;
        }
        self.stat.set_value(current & !region.bit_value());
        true
    }

    pub fn allow_all(&mut self) {
        self.stat.set_value(self.registry.max_bit_value());
    }

    pub fn disallow_all(&mut self) {
        self.stat.set_value(self.stat.min_value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::InstalledPacks;

    fn registry() -> RegionRegistry {
        RegionRegistry::with_defaults(&InstalledPacks::base_only()).unwrap()
    }

    #[test]
    fn allow_and_disallow_flip_single_bits() {
        let registry = registry();
        let willow = registry.by_name("WILLOW_CREEK").unwrap();
        let oasis = registry.by_name("OASIS_SPRINGS").unwrap();
        let mut stat = ExemptionStat::new(registry.max_bit_value());
        let mut bits = RegionExemptions::new(&mut stat, &registry);

        assert!(bits.allow(willow));
        assert!(!bits.allow(willow));
        assert_eq!(bits.get_value() & 2, 2);
        assert!(bits.is_allowed(willow));
        assert!(!bits.is_allowed(oasis));
        assert!(bits.allowed_regions().contains("WILLOW_CREEK"));
        assert!(bits.disallowed_regions().contains("OASIS_SPRINGS"));

        assert!(bits.disallow(willow));
        assert!(!bits.disallow(willow));
        assert_eq!(bits.get_value(), 0);
    }

    #[test]
    fn allow_all_sets_every_available_bit() {
        let registry = registry();
        let mut stat = ExemptionStat::new(registry.max_bit_value());
        let mut bits = RegionExemptions::new(&mut stat, &registry);
        bits.allow_all();
        assert_eq!(bits.get_value(), registry.max_bit_value());
        assert!(bits.disallowed_regions().is_empty());
        bits.disallow_all();
        assert_eq!(bits.get_value(), 0);
    }

    #[test]
    fn values_are_clamped_to_the_ceiling() {
        let mut stat = ExemptionStat::new(0b0111);
        stat.set_value(0b1111);
        assert_eq!(stat.get_value(), 0b0111);
        stat.set_max_value(0b0011);
        assert_eq!(stat.get_value(), 0b0011);
    }

    #[test]
    fn gallery_policy_clears_or_keeps() {
        let mut stat = ExemptionStat::new(0b11);
        stat.set_value(0b01);
        on_gallery_import(&mut stat, GalleryLoadBehavior::Keep);
        assert_eq!(stat.get_value(), 0b01);
        on_gallery_import(&mut stat, GalleryLoadBehavior::Clear);
        assert_eq!(stat.get_value(), 0);
        assert_eq!(
            GalleryLoadBehavior::from_save_across_gallery(false),
            GalleryLoadBehavior::Clear
        );
    }
}
