//! RegionKeeper core
//!
//! Region-aware Sim selection for a life-simulation host: the region
//! registry, the persisted settings store, per-Sim exemption bits and the
//! scoring filter that honours them, the one-shot tuning injection pass, and
//! the command surface. Host-agnostic; the host is reached through the traits
//! in [`packs`], [`sim`] and [`commands`].

pub mod commands;
pub mod exemption;
pub mod injection;
pub mod notifications;
pub mod packs;
pub mod region;
pub mod registry;
pub mod scoring;
pub mod settings;
pub mod sim;
pub mod tuning;

use anyhow::Context;
use rand::Rng;

// Re-export commonly used types
pub use commands::{
    Affordance, Command, CommandFacade, CommandOutcome, GlobalToggle, PlainRenderer, TextRenderer,
    affordance_hash, affordance_name, hash64,
};
pub use exemption::{
    ExemptionStat, ExemptionView, GalleryLoadBehavior, RegionExemptions, on_gallery_import,
};
pub use injection::{
    InjectionContext, InjectionEngine, InjectionError, InjectionHook, InjectionReport,
    InjectionTuning, NameSearch,
};
pub use notifications::NotificationType;
pub use packs::{InstalledPacks, Pack, PackKind, PackRequirement, PackRuntime};
pub use region::{CreationStreets, Region, RegionTuning, Street, StreetPolicyError, WorldType};
pub use registry::{RegionRegistry, RegionRegistryBuilder, RegistryError};
pub use scoring::{
    LivesInRegionScorer, RegionFilterTerm, ScoreTracker, ScoringEnv, SettingsRegionScorer,
};
pub use settings::{
    LoadOutcome, RegionSetting, SettingValue, SettingsError, SettingsPaths, SettingsStore,
    WorldsOp,
};
pub use sim::{SimHandle, SimRecord, SimRoster, Statistic};
pub use tuning::{TuningCatalog, TuningManager, TuningSnapshot};

/// Owns the registry, the settings store and the injection engine for one
/// running game.
#[derive(Debug)]
pub struct RegionKeeper {
    registry: RegionRegistry,
    settings: SettingsStore,
    injection: InjectionEngine,
    tracker: ScoreTracker,
}

impl RegionKeeper {
    /// Finalize the shipped region roster for `packs` and load settings from
    /// under `paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be finalized or the settings
    /// file cannot be written.
    pub fn start<P: PackRuntime + ?Sized>(
        paths: SettingsPaths,
        packs: &P,
    ) -> Result<Self, anyhow::Error> {
        let registry =
            RegionRegistry::with_defaults(packs).context("finalizing region registry")?;
        let settings = SettingsStore::open(paths, &registry).context("loading settings")?;
        Ok(Self::from_parts(registry, settings, InjectionEngine::default()))
    }

    #[must_use]
    pub fn from_parts(
        registry: RegionRegistry,
        settings: SettingsStore,
        injection: InjectionEngine,
    ) -> Self {
        Self {
            registry,
            settings,
            injection,
            tracker: ScoreTracker::default(),
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub const fn settings_mut(&mut self) -> &mut SettingsStore {
        &mut self.settings
    }

    pub const fn injection_mut(&mut self) -> &mut InjectionEngine {
        &mut self.injection
    }

    #[must_use]
    pub const fn tracker(&self) -> &ScoreTracker {
        &self.tracker
    }

    pub const fn tracker_mut(&mut self) -> &mut ScoreTracker {
        &mut self.tracker
    }

    /// Command surface bound to this keeper's registry and settings.
    pub fn commands<'a>(&'a mut self, renderer: &'a dyn TextRenderer) -> CommandFacade<'a> {
        CommandFacade::new(&self.registry, &mut self.settings, renderer)
    }

    /// Run the injection pass over freshly loaded tuning.
    ///
    /// # Errors
    ///
    /// Returns an error if a pivotal injection step fails.
    pub fn inject(
        &mut self,
        catalog: &mut TuningCatalog,
        packs: &dyn PackRuntime,
    ) -> Result<InjectionReport, InjectionError> {
        let ctx = InjectionContext {
            settings: &self.settings,
            packs,
        };
        self.injection.run(catalog, &ctx)
    }

    /// Evaluate a region filter term for `sim`, using the settings-backed
    /// base scorer and recording into the tracker when it is enabled.
    pub fn score(
        &mut self,
        term: &RegionFilterTerm,
        sim: &dyn SimHandle,
        current_region: Option<&str>,
    ) -> f32 {
        let scorer = SettingsRegionScorer::new(&self.registry, &self.settings);
        let env = ScoringEnv {
            registry: &self.registry,
            scorer: &scorer,
            current_region: current_region.and_then(|name| self.registry.by_name(name)),
        };
        term.calculate_score(sim, &env, Some(&mut self.tracker))
    }

    /// Draw a creation street for `region`, honouring the settings overrides.
    ///
    /// # Errors
    ///
    /// Returns an error when the region is unknown or has no drawable street.
    pub fn pick_street<R: Rng + ?Sized>(
        &self,
        region: &str,
        rng: &mut R,
    ) -> Result<Street, StreetPolicyError> {
        let region = self
            .registry
            .by_name(region)
            .ok_or_else(|| StreetPolicyError::UnknownRegion(region.to_string()))?;
        let streets = region.streets.as_ref().ok_or(StreetPolicyError::Empty)?;
        let overrides = self
            .settings
            .get_region(region)
            .street_weights
            .unwrap_or_default();
        streets.pick(&overrides, rng)
    }

    /// Apply the gallery policy to a Sim arriving from the gallery.
    pub fn import_from_gallery(&self, sim: &mut dyn SimHandle) {
        if sim.exemption().is_none() {
            return;
        }
        let behavior = self.settings.gallery_load_behavior();
        on_gallery_import(sim.exemption_mut(self.registry.max_bit_value()), behavior);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn keeper() -> (tempfile::TempDir, RegionKeeper) {
        let dir = tempfile::tempdir().unwrap();
        let keeper = RegionKeeper::start(SettingsPaths::new(dir.path()), &InstalledPacks::all())
            .unwrap();
        (dir, keeper)
    }

    #[test]
    fn start_writes_default_settings() {
        let (dir, keeper) = keeper();
        assert!(keeper.settings().paths().settings_file().exists());
        assert!(dir.path().join("saves").exists());
        assert!(!keeper.settings().bidirectional());
    }

    #[test]
    fn worlds_list_lets_neighbours_score() {
        let (_dir, mut keeper) = keeper();
        let mut sim = SimRecord::new(3, "Johnny", "Zest");
        let oasis = keeper.registry().by_name("OASIS_SPRINGS").unwrap().id;
        sim.set_home_region_id(oasis);
        let term = RegionFilterTerm::default();
        assert!(keeper.score(&term, &sim, Some("WILLOW_CREEK")).abs() < f32::EPSILON);

        let outcome = keeper.commands(&PlainRenderer).execute(
            &Command::AlterWorlds {
                source: "WILLOW_CREEK".to_string(),
                target: "OASIS_SPRINGS".to_string(),
                op: WorldsOp::Allow,
            },
            None,
        );
        assert!(outcome.success);
        assert!((keeper.score(&term, &sim, Some("WILLOW_CREEK")) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn street_draws_skip_zero_weight_streets() {
        let (_dir, mut keeper) = keeper();
        let willow = keeper.registry().by_name("WILLOW_CREEK").unwrap().clone();
        keeper
            .settings_mut()
            .set_street_weight(&willow, "Foundry Cove", 0.0)
            .unwrap();
        keeper
            .settings_mut()
            .set_street_weight(&willow, "Sage Estates", 0.0)
            .unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        for _ in 0..20 {
            let street = keeper.pick_street("WILLOW_CREEK", &mut rng).unwrap();
            assert_eq!(street.name, "Pinecrest Pinnacle");
        }
        assert_eq!(
            keeper.pick_street("ATLANTIS", &mut rng),
            Err(StreetPolicyError::UnknownRegion("ATLANTIS".to_string()))
        );
    }

    #[test]
    fn gallery_import_clears_bits_when_not_saved_across() {
        let (_dir, mut keeper) = keeper();
        let mut sim = SimRecord::new(9, "Geoffrey", "Landgraab");
        let max = keeper.registry().max_bit_value();
        sim.exemption_mut(max).set_value(2);

        keeper.import_from_gallery(&mut sim);
        assert_eq!(sim.exemption().unwrap().get_value(), 2);

        keeper
            .settings_mut()
            .toggle(settings::schema::SAVE_ACROSS_GALLERY_TOGGLE, Some(false))
            .unwrap();
        keeper.import_from_gallery(&mut sim);
        assert_eq!(sim.exemption().unwrap().get_value(), 0);
    }
}
