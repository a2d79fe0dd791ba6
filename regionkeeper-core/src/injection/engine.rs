use serde::Serialize;

use super::hooks::{CompiledHook, DEFAULT_STEPS, HookSpec, InjectionHook};
use super::passes::{Pass, PassState};
use super::{InjectionError, InjectionTuning};
use crate::packs::PackRuntime;
use crate::settings::SettingsStore;
use crate::tuning::{TuningCatalog, TuningId, TuningManager};

/// Live state the pass reads: settings toggles and the installed pack mix.
#[derive(Clone, Copy)]
pub struct InjectionContext<'a> {
    pub settings: &'a SettingsStore,
    pub packs: &'a dyn PackRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedReference {
    pub step: &'static str,
    pub kind: &'static str,
    pub id: TuningId,
}

/// Tally of one injection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectionReport {
    pub main_spliced: usize,
    pub soft_spliced: usize,
    pub bypassed_jobs: usize,
    pub forced_replacements: usize,
    pub filter_replacements: usize,
    pub filter_fixups: usize,
    pub venues_overridden: usize,
    pub aggregates_overridden: usize,
    pub add_region_filters: usize,
    pub skipped: Vec<SkippedReference>,
    /// Safe steps that raised and were skipped.
    pub failed_steps: Vec<String>,
}

impl InjectionReport {
    pub(super) fn skip(&mut self, step: &'static str, kind: &'static str, id: TuningId) {
        log::debug!("{step}: {kind} {id} is not loaded, skipping");
        self.skipped.push(SkippedReference { step, kind, id });
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "main={} soft={} bypassed={} forced={} replaced={} fixups={} venues={} aggregates={} add_region={} skipped={} failed={}",
            self.main_spliced,
            self.soft_spliced,
            self.bypassed_jobs,
            self.forced_replacements,
            self.filter_replacements,
            self.filter_fixups,
            self.venues_overridden,
            self.aggregates_overridden,
            self.add_region_filters,
            self.skipped.len(),
            self.failed_steps.len()
        )
    }
}

/// Runs the ordered injection steps once per tuning load.
#[derive(Debug, Clone)]
pub struct InjectionEngine {
    tuning: InjectionTuning,
    hooks: Vec<CompiledHook>,
    steps: Vec<HookSpec>,
    report: Option<InjectionReport>,
}

impl Default for InjectionEngine {
    fn default() -> Self {
        Self::new(InjectionTuning::default_tuning().clone())
    }
}

impl InjectionEngine {
    #[must_use]
    pub fn new(tuning: InjectionTuning) -> Self {
        Self {
            tuning,
            hooks: Vec::new(),
            steps: DEFAULT_STEPS.to_vec(),
            report: None,
        }
    }

    #[must_use]
    pub const fn tuning(&self) -> &InjectionTuning {
        &self.tuning
    }

    #[must_use]
    pub fn steps(&self) -> &[HookSpec] {
        &self.steps
    }

    #[must_use]
    pub fn hooks(&self) -> &[CompiledHook] {
        &self.hooks
    }

    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.report.is_some()
    }

    #[must_use]
    pub const fn report(&self) -> Option<&InjectionReport> {
        self.report.as_ref()
    }

    /// Register a third-party hook. Must happen before the pass runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass already ran or the hook's name search
    /// does not compile.
    pub fn register_hook(&mut self, hook: InjectionHook) -> Result<(), InjectionError> {
        if self.is_applied() {
            return Err(InjectionError::LateHook(hook.name));
        }
        log::debug!("registered injection hook {}", hook.name);
        self.hooks.push(CompiledHook::compile(hook)?);
        Ok(())
    }

    /// Run every step in order over `catalog`. A second call is a no-op that
    /// returns the first report.
    ///
    /// # Errors
    ///
    /// Returns the error of any non-safe step, which aborts the load. Safe
    /// steps log their error and the pass continues.
    pub fn run(
        &mut self,
        catalog: &mut TuningCatalog,
        ctx: &InjectionContext<'_>,
    ) -> Result<InjectionReport, InjectionError> {
        if let Some(report) = &self.report {
            log::debug!("injection already applied");
            return Ok(report.clone());
        }

        let mut state = PassState::default();
        let mut report = InjectionReport::default();
        let mut pass = Pass {
            tuning: &self.tuning,
            hooks: &self.hooks,
            ctx,
            state: &mut state,
            report: &mut report,
        };
        for spec in &self.steps {
            let name = spec.step.name();
            match pass.run_step(spec.step, catalog) {
                Ok(()) => log::trace!("injection step {name} done"),
                Err(err) if spec.safe => {
                    log::error!("injection step {name} failed: {err}");
                    pass.report.failed_steps.push(name.to_string());
                }
                Err(err) => {
                    log::error!("injection step {name} aborted tuning load: {err}");
                    return Err(err);
                }
            }
        }

        log::info!("region filter injection: {}", report.render());
        self.report = Some(report.clone());
        Ok(report)
    }

    /// Subscribe the pass to the manager's load-complete signal.
    pub fn subscribe<'a>(&'a mut self, manager: &mut TuningManager<'a>, ctx: InjectionContext<'a>) {
        manager.on_load_complete(Box::new(move |catalog: &mut TuningCatalog| {
            self.run(catalog, &ctx).map(|_| ())
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::InstalledPacks;
    use crate::registry::RegionRegistry;
    use crate::scoring::RegionFilterTerm;
    use crate::settings::SettingsPaths;
    use crate::tuning::{FilterTerm, SituationJob};
    use std::collections::BTreeMap;

    const MAIN: TuningId = 900;
    const SOFT: TuningId = 901;

    fn settings() -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
        let store = SettingsStore::new(SettingsPaths::new(dir.path()), &registry);
        (dir, store)
    }

    fn job(id: TuningId) -> SituationJob {
        SituationJob {
            id,
            name: format!("job_{id}"),
            filter: None,
            location_based_filter_terms: Some(Vec::new()),
            fields: BTreeMap::new(),
        }
    }

    fn catalog() -> TuningCatalog {
        let mut catalog = TuningCatalog::default();
        catalog.insert_filter_term(MAIN, FilterTerm::HomeRegion(RegionFilterTerm::default()));
        catalog.insert_filter_term(SOFT, FilterTerm::HomeRegion(RegionFilterTerm::default()));
        for id in 1..=3 {
            catalog.insert_job(job(id));
        }
        catalog
    }

    fn tuning() -> InjectionTuning {
        InjectionTuning {
            main_filter_term: MAIN,
            soft_filter_term: SOFT,
            soft_jobs: vec![1, 2],
            bypass_jobs: vec![2],
            ..InjectionTuning::default()
        }
    }

    #[test]
    fn soft_jobs_get_both_terms_unless_bypassed() {
        let (_dir, store) = settings();
        let packs = InstalledPacks::all();
        let ctx = InjectionContext {
            settings: &store,
            packs: &packs,
        };
        let mut catalog = catalog();
        let report = InjectionEngine::new(tuning()).run(&mut catalog, &ctx).unwrap();

        assert_eq!(catalog.job(1).unwrap().location_term_count(), 2);
        assert_eq!(catalog.job(2).unwrap().location_term_count(), 0);
        assert_eq!(catalog.job(3).unwrap().location_term_count(), 1);
        assert_eq!(report.soft_spliced, 1);
        assert_eq!(report.main_spliced, 2);
        assert_eq!(report.bypassed_jobs, 1);
    }

    #[test]
    fn soft_term_takes_the_configured_soft_value() {
        let (_dir, store) = settings();
        let packs = InstalledPacks::all();
        let ctx = InjectionContext {
            settings: &store,
            packs: &packs,
        };
        let mut catalog = catalog();
        InjectionEngine::new(tuning()).run(&mut catalog, &ctx).unwrap();
        let terms = catalog.job(1).unwrap().location_based_filter_terms.clone().unwrap();
        let scores: Vec<f32> = terms
            .iter()
            .filter_map(|term| match term {
                FilterTerm::HomeRegion(t) => Some(t.minimum_filter_score),
                _ => None,
            })
            .collect();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().any(|s| (s - 0.1).abs() < 1e-6));
        assert!(scores.iter().any(|s| s.abs() < f32::EPSILON));
    }

    #[test]
    fn missing_main_term_aborts() {
        let (_dir, store) = settings();
        let packs = InstalledPacks::all();
        let ctx = InjectionContext {
            settings: &store,
            packs: &packs,
        };
        let mut catalog = TuningCatalog::default();
        catalog.insert_job(job(1));
        let err = InjectionEngine::new(tuning()).run(&mut catalog, &ctx).unwrap_err();
        assert_eq!(
            err,
            InjectionError::DependentTuningMissing {
                what: "main filter term",
                id: MAIN
            }
        );
        assert_eq!(catalog.job(1).unwrap().location_term_count(), 0);
    }

    #[test]
    fn second_run_is_a_no_op() {
        let (_dir, store) = settings();
        let packs = InstalledPacks::all();
        let ctx = InjectionContext {
            settings: &store,
            packs: &packs,
        };
        let mut catalog = catalog();
        let mut engine = InjectionEngine::new(tuning());
        let first = engine.run(&mut catalog, &ctx).unwrap();
        let before = catalog.location_term_total();
        let second = engine.run(&mut catalog, &ctx).unwrap();
        assert_eq!(first, second);
        assert_eq!(catalog.location_term_total(), before);
        assert!(engine.register_hook(InjectionHook::default()).is_err());
    }

    #[test]
    fn subscription_runs_on_load_complete() {
        let (_dir, store) = settings();
        let packs = InstalledPacks::all();
        let ctx = InjectionContext {
            settings: &store,
            packs: &packs,
        };
        let mut engine = InjectionEngine::new(tuning());
        let mut manager = TuningManager::new(catalog());
        engine.subscribe(&mut manager, ctx);
        manager.load_complete().unwrap();
        assert_eq!(manager.catalog().location_term_total(), 3);
        drop(manager);
        assert!(engine.is_applied());
    }

    #[test]
    fn report_renders_counts() {
        let report = InjectionReport {
            main_spliced: 4,
            soft_spliced: 2,
            ..InjectionReport::default()
        };
        assert!(report.render().starts_with("main=4 soft=2 bypassed=0"));
    }
}
