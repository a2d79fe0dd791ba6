use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::packs::{PackRequirement, PackRuntime};
use crate::tuning::TuningId;

const DEFAULT_INJECTION_DATA: &str = include_str!("../../data/injection.json");

/// Copy selected template fields onto jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForcedReplacement {
    pub template: TuningId,
    #[serde(default)]
    pub jobs: Vec<TuningId>,
    /// Fields to overwrite; empty means `no_show_action`.
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub requires: Option<PackRequirement>,
}

impl ForcedReplacement {
    pub const DEFAULT_FIELD: &'static str = "no_show_action";

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        let default = self.fields.is_empty().then_some(Self::DEFAULT_FIELD);
        self.fields.iter().map(String::as_str).chain(default)
    }
}

/// Swap the filter on a set of jobs, optionally applying a template first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterReplacement {
    pub filter: TuningId,
    #[serde(default)]
    pub jobs: Vec<TuningId>,
    #[serde(default)]
    pub template: Option<TuningId>,
    #[serde(default)]
    pub requires: Option<PackRequirement>,
}

/// Per-species invite-over situations for a set of venues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VenueOverride {
    #[serde(default)]
    pub venues: Vec<TuningId>,
    #[serde(default)]
    pub invite_over: BTreeMap<String, TuningId>,
    #[serde(default)]
    pub requires: Option<PackRequirement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateMode {
    #[default]
    Replace,
    Combine,
}

/// New sub-filter list (and optionally leader) for aggregate filters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateOverride {
    #[serde(default)]
    pub targets: Vec<TuningId>,
    #[serde(default)]
    pub filters: Vec<TuningId>,
    #[serde(default)]
    pub mode: AggregateMode,
    #[serde(default)]
    pub leader: Option<TuningId>,
    #[serde(default)]
    pub requires: Option<PackRequirement>,
}

/// Everything the injection pass reads besides the live settings.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InjectionTuning {
    pub main_filter_term: TuningId,
    pub soft_filter_term: TuningId,
    #[serde(default)]
    pub soft_jobs: Vec<TuningId>,
    #[serde(default)]
    pub high_school_jobs: Vec<TuningId>,
    /// Region name to the tourist jobs softened while its toggle is on.
    #[serde(default)]
    pub tourist_jobs: BTreeMap<String, Vec<TuningId>>,
    #[serde(default)]
    pub forced_replacements: Vec<ForcedReplacement>,
    #[serde(default)]
    pub filter_replacements: Vec<FilterReplacement>,
    #[serde(default)]
    pub filter_fixups: Vec<FilterReplacement>,
    #[serde(default)]
    pub bypass_tags: BTreeSet<String>,
    #[serde(default)]
    pub bypass_jobs: Vec<TuningId>,
    /// Discovered jobs that still get the main term.
    #[serde(default)]
    pub second_chance_jobs: Vec<TuningId>,
    #[serde(default)]
    pub filters_to_bypass: Vec<TuningId>,
    #[serde(default)]
    pub venue_overrides: Vec<VenueOverride>,
    #[serde(default)]
    pub aggregate_overrides: Vec<AggregateOverride>,
    #[serde(default)]
    pub add_region_filters: Vec<TuningId>,
}

impl InjectionTuning {
    #[must_use]
    pub fn load_from_static() -> Self {
        serde_json::from_str(DEFAULT_INJECTION_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn default_tuning() -> &'static Self {
        static TUNING: OnceLock<InjectionTuning> = OnceLock::new();
        TUNING.get_or_init(Self::load_from_static)
    }

    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into injection tuning.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

pub(crate) fn requirement_met<P: PackRuntime + ?Sized>(
    requires: Option<&PackRequirement>,
    packs: &P,
) -> bool {
    requires.is_none_or(|req| req.is_satisfied(packs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::InstalledPacks;

    #[test]
    fn embedded_tuning_parses() {
        let parsed: InjectionTuning = serde_json::from_str(DEFAULT_INJECTION_DATA).unwrap();
        assert_ne!(parsed.main_filter_term, 0);
        assert_ne!(parsed.soft_filter_term, parsed.main_filter_term);
        assert_eq!(InjectionTuning::default_tuning(), &parsed);
    }

    #[test]
    fn forced_replacement_defaults_to_no_show_action() {
        let entry: ForcedReplacement =
            serde_json::from_str(r#"{"template": 4, "jobs": [1, 2]}"#).unwrap();
        assert_eq!(entry.field_names().collect::<Vec<_>>(), vec!["no_show_action"]);

        let explicit: ForcedReplacement =
            serde_json::from_str(r#"{"template": 4, "fields": ["uniform"]}"#).unwrap();
        assert_eq!(explicit.field_names().collect::<Vec<_>>(), vec!["uniform"]);
    }

    #[test]
    fn pack_requirements_gate_entries() {
        let packs = InstalledPacks::base_only();
        assert!(requirement_met(None, &packs));
        let requirement = PackRequirement::single("EP07");
        assert!(!requirement_met(Some(&requirement), &packs));
        assert!(requirement_met(Some(&requirement), &InstalledPacks::all()));
    }
}
