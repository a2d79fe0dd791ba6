//! Individual injection steps. Each one reads the tuning config and the pass
//! state, mutates the catalog, and tallies into the report.
use std::collections::{BTreeMap, BTreeSet};

use super::config::{AggregateMode, FilterReplacement, requirement_met};
use super::engine::{InjectionContext, InjectionReport};
use super::hooks::CompiledHook;
use super::{InjectionError, InjectionStep, InjectionTuning};
use crate::tuning::{FilterTerm, TuningCatalog, TuningId};

/// State threaded from one step to the next.
#[derive(Debug, Default)]
pub(super) struct PassState {
    pub main_term: Option<FilterTerm>,
    pub soft_term: Option<FilterTerm>,
    pub bypass_jobs: BTreeSet<TuningId>,
    pub bypass_filters: BTreeSet<TuningId>,
}

pub(super) struct Pass<'p, 'c> {
    pub tuning: &'p InjectionTuning,
    pub hooks: &'p [CompiledHook],
    pub ctx: &'p InjectionContext<'c>,
    pub state: &'p mut PassState,
    pub report: &'p mut InjectionReport,
}

impl Pass<'_, '_> {
    pub fn run_step(
        &mut self,
        step: InjectionStep,
        catalog: &mut TuningCatalog,
    ) -> Result<(), InjectionError> {
        match step {
            InjectionStep::ResolveFilterTerms => self.resolve_filter_terms(catalog),
            InjectionStep::BypassDiscovery => {
                self.discover_bypass(catalog);
                Ok(())
            }
            InjectionStep::SoftFilterSplice => self.splice_soft(catalog),
            InjectionStep::ForcedReplacement => {
                self.force_replacements(catalog);
                Ok(())
            }
            InjectionStep::FilterReplacement => {
                let entries = &self.tuning.filter_replacements;
                let replaced =
                    replace_filters(entries, false, step, catalog, self.ctx, self.report);
                self.report.filter_replacements += replaced;
                Ok(())
            }
            InjectionStep::FilterFixup => {
                let entries = &self.tuning.filter_fixups;
                let fixed = replace_filters(entries, true, step, catalog, self.ctx, self.report);
                self.report.filter_fixups += fixed;
                Ok(())
            }
            InjectionStep::MainFilterSplice => self.splice_main(catalog),
            InjectionStep::VenueOverride => {
                self.override_venues(catalog);
                Ok(())
            }
            InjectionStep::AggregateFilterOverride => {
                self.override_aggregates(catalog);
                Ok(())
            }
            InjectionStep::AddRegionInjection => {
                self.add_region_terms(catalog);
                Ok(())
            }
        }
    }

    fn resolve_filter_terms(&mut self, catalog: &TuningCatalog) -> Result<(), InjectionError> {
        let main = catalog
            .filter_term(self.tuning.main_filter_term)
            .cloned()
            .ok_or(InjectionError::DependentTuningMissing {
                what: "main filter term",
                id: self.tuning.main_filter_term,
            })?;
        let soft = catalog
            .filter_term(self.tuning.soft_filter_term)
            .ok_or(InjectionError::DependentTuningMissing {
                what: "soft filter term",
                id: self.tuning.soft_filter_term,
            })?;
        #[allow(clippy::cast_possible_truncation)]
        let soft_value = self.ctx.settings.soft_filter_value() as f32;
        self.state.soft_term = Some(soft.with_minimum_score(soft_value));
        self.state.main_term = Some(main);
        Ok(())
    }

    fn discover_bypass(&mut self, catalog: &TuningCatalog) {
        let mut bypass: BTreeSet<TuningId> = self.tuning.bypass_jobs.iter().copied().collect();
        for hook in self.hooks {
            bypass.extend(hook.hook.bypass_jobs.iter().copied());
            bypass.extend(catalog.jobs().filter(|job| hook.matches(job)).map(|job| job.id));
        }

        let second_chance: BTreeSet<TuningId> =
            self.tuning.second_chance_jobs.iter().copied().collect();
        for situation in catalog.situations() {
            let worthy = situation.invite_only
                || situation.implies_greeted_status
                || !situation.tags.is_disjoint(&self.tuning.bypass_tags);
            if !worthy {
                continue;
            }
            log::debug!("situation {} bypasses its jobs", situation.name);
            bypass.extend(situation.job_ids().filter(|id| !second_chance.contains(id)));
        }

        self.state.bypass_filters = self
            .tuning
            .filters_to_bypass
            .iter()
            .chain(self.hooks.iter().flat_map(|h| h.hook.bypass_filters.iter()))
            .copied()
            .collect();
        self.report.bypassed_jobs = bypass.len();
        self.state.bypass_jobs = bypass;
    }

    fn soft_list(&self) -> BTreeSet<TuningId> {
        let settings = self.ctx.settings;
        let mut soft: BTreeSet<TuningId> = self.tuning.soft_jobs.iter().copied().collect();
        if settings.high_school() {
            soft.extend(self.tuning.high_school_jobs.iter().copied());
        }
        let tourists = settings.tourist_regions_enabled();
        for (region, jobs) in &self.tuning.tourist_jobs {
            if tourists.contains(region) {
                soft.extend(jobs.iter().copied());
            }
        }
        soft.extend(self.hooks.iter().flat_map(|h| h.hook.soft_jobs.iter().copied()));
        soft
    }

    fn splice_soft(&mut self, catalog: &mut TuningCatalog) -> Result<(), InjectionError> {
        let step = InjectionStep::SoftFilterSplice.name();
        let term = self
            .state
            .soft_term
            .clone()
            .ok_or(InjectionError::Unresolved { step })?;
        for id in self.soft_list() {
            if self.state.bypass_jobs.contains(&id) {
                log::debug!("soft job {id} is bypassed");
                continue;
            }
            let Some(job) = catalog.job_mut(id) else {
                self.report.skip(step, "job", id);
                continue;
            };
            if job.splice_location_term(&term) {
                self.report.soft_spliced += 1;
            }
        }
        Ok(())
    }

    fn force_replacements(&mut self, catalog: &mut TuningCatalog) {
        let step = InjectionStep::ForcedReplacement.name();
        for entry in &self.tuning.forced_replacements {
            if !requirement_met(entry.requires.as_ref(), self.ctx.packs) {
                log::debug!("forced replacement from template {} is pack gated", entry.template);
                continue;
            }
            let Some(template) = catalog.template(entry.template).cloned() else {
                self.report.skip(step, "template", entry.template);
                continue;
            };
            for &job_id in &entry.jobs {
                let Some(job) = catalog.job_mut(job_id) else {
                    self.report.skip(step, "job", job_id);
                    continue;
                };
                for field in entry.field_names() {
                    if let Some(value) = template.fields.get(field) {
                        job.fields.insert(field.to_string(), value.clone());
                    }
                }
                self.report.forced_replacements += 1;
            }
        }
    }

    fn splice_main(&mut self, catalog: &mut TuningCatalog) -> Result<(), InjectionError> {
        let step = InjectionStep::MainFilterSplice.name();
        let term = self
            .state
            .main_term
            .as_ref()
            .ok_or(InjectionError::Unresolved { step })?;
        for job in catalog.jobs_mut() {
            if self.state.bypass_jobs.contains(&job.id) {
                continue;
            }
            if job
                .filter
                .is_some_and(|filter| self.state.bypass_filters.contains(&filter))
            {
                continue;
            }
            if job.splice_location_term(term) {
                self.report.main_spliced += 1;
            }
        }
        Ok(())
    }

    fn override_venues(&mut self, catalog: &mut TuningCatalog) {
        let step = InjectionStep::VenueOverride.name();
        for entry in &self.tuning.venue_overrides {
            if !requirement_met(entry.requires.as_ref(), self.ctx.packs) {
                continue;
            }
            let mut mapping = BTreeMap::new();
            for (species, &situation) in &entry.invite_over {
                if catalog.situation(situation).is_some() {
                    mapping.insert(species.clone(), situation);
                } else {
                    self.report.skip(step, "situation", situation);
                }
            }
            for &venue_id in &entry.venues {
                let Some(venue) = catalog.venue_mut(venue_id) else {
                    self.report.skip(step, "venue", venue_id);
                    continue;
                };
                venue.invite_over.extend(mapping.clone());
                self.report.venues_overridden += 1;
            }
        }
    }

    fn override_aggregates(&mut self, catalog: &mut TuningCatalog) {
        let step = InjectionStep::AggregateFilterOverride.name();
        for entry in &self.tuning.aggregate_overrides {
            if !requirement_met(entry.requires.as_ref(), self.ctx.packs) {
                continue;
            }
            let mut filters = Vec::with_capacity(entry.filters.len());
            for &id in &entry.filters {
                if catalog.filter(id).is_some() {
                    filters.push(id);
                } else {
                    self.report.skip(step, "filter", id);
                }
            }
            let leader = match entry.leader {
                Some(id) if catalog.filter(id).is_none() => {
                    self.report.skip(step, "leader", id);
                    None
                }
                other => other,
            };
            for &target in &entry.targets {
                let Some(aggregate) = catalog
                    .filter_mut(target)
                    .and_then(|filter| filter.aggregate.as_mut())
                else {
                    self.report.skip(step, "aggregate filter", target);
                    continue;
                };
                match entry.mode {
                    AggregateMode::Replace => aggregate.filters.clone_from(&filters),
                    AggregateMode::Combine => {
                        for id in &filters {
                            if !aggregate.filters.contains(id) {
                                aggregate.filters.push(*id);
                            }
                        }
                    }
                }
                if leader.is_some() {
                    aggregate.leader = leader;
                }
                self.report.aggregates_overridden += 1;
            }
        }
    }

    fn add_region_terms(&mut self, catalog: &mut TuningCatalog) {
        let step = InjectionStep::AddRegionInjection.name();
        let term = FilterTerm::neutral_lives_in_region();
        for &id in &self.tuning.add_region_filters {
            let Some(filter) = catalog.filter_mut(id) else {
                self.report.skip(step, "filter", id);
                continue;
            };
            if !filter.filter_terms.contains(&term) {
                filter.filter_terms.push(term.clone());
                self.report.add_region_filters += 1;
            }
        }
    }
}

/// Shared by filter replacement and filter fixup. Fixups restore template
/// fields before the swap, so an entry without a resolvable template is
/// skipped entirely.
fn replace_filters(
    entries: &[FilterReplacement],
    require_template: bool,
    step: InjectionStep,
    catalog: &mut TuningCatalog,
    ctx: &InjectionContext<'_>,
    report: &mut InjectionReport,
) -> usize {
    let step = step.name();
    let mut replaced = 0;
    for entry in entries {
        if !requirement_met(entry.requires.as_ref(), ctx.packs) {
            continue;
        }
        if catalog.filter(entry.filter).is_none() {
            report.skip(step, "filter", entry.filter);
            continue;
        }
        match entry.template {
            Some(template) if catalog.template(template).is_none() => {
                report.skip(step, "template", template);
                continue;
            }
            None if require_template => {
                log::warn!("{step} for filter {} has no template", entry.filter);
                continue;
            }
            _ => {}
        }
        for &job_id in &entry.jobs {
            if catalog.job(job_id).is_none() {
                report.skip(step, "job", job_id);
                continue;
            }
            if let Some(template) = entry.template {
                catalog.apply_template(template, job_id);
            }
            if let Some(job) = catalog.job_mut(job_id) {
                job.filter = Some(entry.filter);
                replaced += 1;
            }
        }
    }
    replaced
}
