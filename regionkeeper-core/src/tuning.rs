//! Host tuning model mutated by the injection engine.
//!
//! The host exposes its tuning as objects addressed by 64-bit ids. Here they
//! are plain serde records so a snapshot can be loaded, mutated and written
//! back. Every lookup returns `Option`: a reference into a missing pack
//! simply resolves to nothing.
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::injection::InjectionError;
use crate::scoring::RegionFilterTerm;

pub type TuningId = u64;

/// A scoring contributor inside a Sim filter or a job's location terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterTerm {
    /// The mod's exemption-aware region term.
    HomeRegion(RegionFilterTerm),
    /// The host's own "lives in region" term.
    LivesInRegion {
        #[serde(default)]
        regions: Vec<String>,
        #[serde(default)]
        invert: bool,
        #[serde(default)]
        minimum_filter_score: f32,
    },
    /// Any other host term, kept opaque.
    Host {
        name: String,
        #[serde(default)]
        minimum_filter_score: f32,
    },
}

impl FilterTerm {
    /// Neutral "lives in region" term: current region, not inverted.
    #[must_use]
    pub const fn neutral_lives_in_region() -> Self {
        Self::LivesInRegion {
            regions: Vec::new(),
            invert: false,
            minimum_filter_score: 0.0,
        }
    }

    /// Copy of this term with its minimum score replaced.
    #[must_use]
    pub fn with_minimum_score(&self, score: f32) -> Self {
        match self {
            Self::HomeRegion(term) => Self::HomeRegion(term.softened(score)),
            Self::LivesInRegion {
                regions, invert, ..
            } => Self::LivesInRegion {
                regions: regions.clone(),
                invert: *invert,
                minimum_filter_score: score,
            },
            Self::Host { name, .. } => Self::Host {
                name: name.clone(),
                minimum_filter_score: score,
            },
        }
    }

    #[must_use]
    pub const fn is_home_region(&self) -> bool {
        matches!(self, Self::HomeRegion(_))
    }

    #[must_use]
    pub const fn is_lives_in_region(&self) -> bool {
        matches!(self, Self::LivesInRegion { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SituationJob {
    pub id: TuningId,
    pub name: String,
    #[serde(default)]
    pub filter: Option<TuningId>,
    /// Present only on jobs whose tuning declares the field.
    #[serde(default)]
    pub location_based_filter_terms: Option<Vec<FilterTerm>>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl SituationJob {
    /// Append `term` unless an identical one is already present. Returns
    /// whether the term was added.
    pub fn splice_location_term(&mut self, term: &FilterTerm) -> bool {
        let Some(terms) = self.location_based_filter_terms.as_mut() else {
            return false;
        };
        if terms.contains(term) {
            return false;
        }
        terms.push(term.clone());
        true
    }

    #[must_use]
    pub fn location_term_count(&self) -> usize {
        self.location_based_filter_terms
            .as_ref()
            .map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateFilter {
    #[serde(default)]
    pub filters: Vec<TuningId>,
    #[serde(default)]
    pub leader: Option<TuningId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimFilter {
    pub id: TuningId,
    pub name: String,
    #[serde(default)]
    pub filter_terms: Vec<FilterTerm>,
    #[serde(default)]
    pub aggregate: Option<AggregateFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SituationPhase {
    #[serde(default)]
    pub job_ids: Vec<TuningId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Situation {
    pub id: TuningId,
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub invite_only: bool,
    #[serde(default)]
    pub implies_greeted_status: bool,
    #[serde(default)]
    pub phases: Vec<SituationPhase>,
}

impl Situation {
    pub fn job_ids(&self) -> impl Iterator<Item = TuningId> + '_ {
        self.phases.iter().flat_map(|phase| phase.job_ids.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Venue {
    pub id: TuningId,
    pub name: String,
    /// Species name to the situation used when Sims are invited over.
    #[serde(default)]
    pub invite_over: BTreeMap<String, TuningId>,
}

/// A bundle of tunable field values copied onto jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTemplate {
    pub id: TuningId,
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

/// Serialized form: plain lists of each tuning type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TuningSnapshot {
    #[serde(default)]
    pub jobs: Vec<SituationJob>,
    #[serde(default)]
    pub filters: Vec<SimFilter>,
    #[serde(default)]
    pub situations: Vec<Situation>,
    #[serde(default)]
    pub venues: Vec<Venue>,
    #[serde(default)]
    pub templates: Vec<FieldTemplate>,
    #[serde(default)]
    pub filter_terms: BTreeMap<String, FilterTerm>,
}

/// Tuning indexed by id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TuningCatalog {
    jobs: BTreeMap<TuningId, SituationJob>,
    filters: BTreeMap<TuningId, SimFilter>,
    situations: BTreeMap<TuningId, Situation>,
    venues: BTreeMap<TuningId, Venue>,
    templates: BTreeMap<TuningId, FieldTemplate>,
    filter_terms: BTreeMap<TuningId, FilterTerm>,
}

impl From<TuningSnapshot> for TuningCatalog {
    fn from(snapshot: TuningSnapshot) -> Self {
        Self {
            jobs: snapshot.jobs.into_iter().map(|j| (j.id, j)).collect(),
            filters: snapshot.filters.into_iter().map(|f| (f.id, f)).collect(),
            situations: snapshot.situations.into_iter().map(|s| (s.id, s)).collect(),
            venues: snapshot.venues.into_iter().map(|v| (v.id, v)).collect(),
            templates: snapshot.templates.into_iter().map(|t| (t.id, t)).collect(),
            filter_terms: snapshot
                .filter_terms
                .into_iter()
                .filter_map(|(id, term)| id.parse().ok().map(|id| (id, term)))
                .collect(),
        }
    }
}

impl TuningCatalog {
    /// Parse a tuning snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON does not describe a snapshot.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<TuningSnapshot>(json).map(Self::from)
    }

    #[must_use]
    pub fn to_snapshot(&self) -> TuningSnapshot {
        TuningSnapshot {
            jobs: self.jobs.values().cloned().collect(),
            filters: self.filters.values().cloned().collect(),
            situations: self.situations.values().cloned().collect(),
            venues: self.venues.values().cloned().collect(),
            templates: self.templates.values().cloned().collect(),
            filter_terms: self
                .filter_terms
                .iter()
                .map(|(id, term)| (id.to_string(), term.clone()))
                .collect(),
        }
    }

    pub fn insert_job(&mut self, job: SituationJob) {
        self.jobs.insert(job.id, job);
    }

    pub fn insert_filter(&mut self, filter: SimFilter) {
        self.filters.insert(filter.id, filter);
    }

    pub fn insert_situation(&mut self, situation: Situation) {
        self.situations.insert(situation.id, situation);
    }

    pub fn insert_venue(&mut self, venue: Venue) {
        self.venues.insert(venue.id, venue);
    }

    pub fn insert_template(&mut self, template: FieldTemplate) {
        self.templates.insert(template.id, template);
    }

    pub fn insert_filter_term(&mut self, id: TuningId, term: FilterTerm) {
        self.filter_terms.insert(id, term);
    }

    #[must_use]
    pub fn job(&self, id: TuningId) -> Option<&SituationJob> {
        self.jobs.get(&id)
    }

    pub fn job_mut(&mut self, id: TuningId) -> Option<&mut SituationJob> {
        self.jobs.get_mut(&id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &SituationJob> {
        self.jobs.values()
    }

    pub fn jobs_mut(&mut self) -> impl Iterator<Item = &mut SituationJob> {
        self.jobs.values_mut()
    }

    #[must_use]
    pub fn filter(&self, id: TuningId) -> Option<&SimFilter> {
        self.filters.get(&id)
    }

    pub fn filter_mut(&mut self, id: TuningId) -> Option<&mut SimFilter> {
        self.filters.get_mut(&id)
    }

    pub fn situations(&self) -> impl Iterator<Item = &Situation> {
        self.situations.values()
    }

    #[must_use]
    pub fn situation(&self, id: TuningId) -> Option<&Situation> {
        self.situations.get(&id)
    }

    #[must_use]
    pub fn venue(&self, id: TuningId) -> Option<&Venue> {
        self.venues.get(&id)
    }

    pub fn venue_mut(&mut self, id: TuningId) -> Option<&mut Venue> {
        self.venues.get_mut(&id)
    }

    #[must_use]
    pub fn template(&self, id: TuningId) -> Option<&FieldTemplate> {
        self.templates.get(&id)
    }

    #[must_use]
    pub fn filter_term(&self, id: TuningId) -> Option<&FilterTerm> {
        self.filter_terms.get(&id)
    }

    /// Copy a template's fields onto a job. Returns false if either is missing.
    pub fn apply_template(&mut self, template_id: TuningId, job_id: TuningId) -> bool {
        let Some(fields) = self.templates.get(&template_id).map(|t| t.fields.clone()) else {
            return false;
        };
        let Some(job) = self.jobs.get_mut(&job_id) else {
            return false;
        };
        job.fields.extend(fields);
        true
    }

    /// Total number of location-based terms across every job.
    #[must_use]
    pub fn location_term_total(&self) -> usize {
        self.jobs.values().map(SituationJob::location_term_count).sum()
    }
}

/// Callback run once when tuning has finished loading.
pub type LoadCallback<'a> = Box<dyn FnOnce(&mut TuningCatalog) -> Result<(), InjectionError> + 'a>;

/// Owns the tuning and the load-complete subscriptions for it.
pub struct TuningManager<'a> {
    catalog: TuningCatalog,
    callbacks: Vec<LoadCallback<'a>>,
    loaded: bool,
}

impl<'a> TuningManager<'a> {
    #[must_use]
    pub fn new(catalog: TuningCatalog) -> Self {
        Self {
            catalog,
            callbacks: Vec::new(),
            loaded: false,
        }
    }

    /// Subscribe to the load-complete signal. Callbacks run in registration order.
    pub fn on_load_complete(&mut self, callback: LoadCallback<'a>) {
        self.callbacks.push(callback);
    }

    /// Signal that tuning is loaded, running and dropping every subscriber.
    /// Later signals find no subscribers.
    ///
    /// # Errors
    ///
    /// Returns the first subscriber error; remaining subscribers are dropped
    /// without running, matching an aborted load.
    pub fn load_complete(&mut self) -> Result<(), InjectionError> {
        self.loaded = true;
        for callback in std::mem::take(&mut self.callbacks) {
            callback(&mut self.catalog)?;
        }
        Ok(())
    }

    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub const fn catalog(&self) -> &TuningCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn into_catalog(self) -> TuningCatalog {
        self.catalog
    }
}
