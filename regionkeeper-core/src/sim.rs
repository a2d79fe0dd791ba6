//! Host-facing Sim abstraction and the stock serde-backed record.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::exemption::ExemptionStat;

/// Identifier of a host trait.
pub type TraitId = u64;

/// Region id used by the host for "no home region".
pub const NO_REGION: u32 = 0;

/// Host statistic surface used by the exemption bitset.
pub trait Statistic {
    fn get_value(&self) -> u64;
    fn set_value(&mut self, value: u64);
    fn min_value(&self) -> u64;
    fn max_value(&self) -> u64;
}

/// What the core needs from a host Sim.
pub trait SimHandle {
    fn sim_id(&self) -> u64;
    fn first_name(&self) -> &str;
    fn last_name(&self) -> &str;
    fn home_region_id(&self) -> u32;
    fn set_home_region_id(&mut self, region_id: u32);
    fn add_trait(&mut self, trait_id: TraitId) -> bool;
    fn remove_trait(&mut self, trait_id: TraitId) -> bool;
    fn has_trait(&self, trait_id: TraitId) -> bool;

    /// Exemption statistic if the Sim already carries one.
    fn exemption(&self) -> Option<&dyn Statistic>;

    /// Exemption statistic, created on first access with the given upper bound.
    fn exemption_mut(&mut self, max_value: u64) -> &mut dyn Statistic;
}

/// Plain Sim record used by rosters and tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRecord {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub region_id: u32,
    #[serde(default)]
    pub traits: BTreeSet<TraitId>,
    #[serde(default)]
    pub exemption: Option<ExemptionStat>,
}

impl SimRecord {
    #[must_use]
    pub fn new(id: u64, first_name: &str, last_name: &str) -> Self {
        Self {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            region_id: NO_REGION,
            traits: BTreeSet::new(),
            exemption: None,
        }
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl SimHandle for SimRecord {
    fn sim_id(&self) -> u64 {
        self.id
    }

    fn first_name(&self) -> &str {
        &self.first_name
    }

    fn last_name(&self) -> &str {
        &self.last_name
    }

    fn home_region_id(&self) -> u32 {
        self.region_id
    }

    fn set_home_region_id(&mut self, region_id: u32) {
        self.region_id = region_id;
    }

    fn add_trait(&mut self, trait_id: TraitId) -> bool {
        self.traits.insert(trait_id)
    }

    fn remove_trait(&mut self, trait_id: TraitId) -> bool {
        self.traits.remove(&trait_id)
    }

    fn has_trait(&self, trait_id: TraitId) -> bool {
        self.traits.contains(&trait_id)
    }

    fn exemption(&self) -> Option<&dyn Statistic> {
        self.exemption.as_ref().map(|stat| stat as &dyn Statistic)
    }

    fn exemption_mut(&mut self, max_value: u64) -> &mut dyn Statistic {
        let stat = self
            .exemption
            .get_or_insert_with(|| ExemptionStat::new(max_value));
        stat.set_max_value(max_value);
        stat
    }
}

/// A roster of Sims, keyed by position; used by the CLI's JSON roster file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimRoster(pub Vec<SimRecord>);

impl SimRoster {
    /// Load a roster from JSON text.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is not a list of Sim records.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[must_use]
    pub fn get(&self, sim_id: u64) -> Option<&SimRecord> {
        self.0.iter().find(|sim| sim.id == sim_id)
    }

    pub fn get_mut(&mut self, sim_id: u64) -> Option<&mut SimRecord> {
        self.0.iter_mut().find(|sim| sim.id == sim_id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SimRecord> {
        self.0.iter()
    }
}
