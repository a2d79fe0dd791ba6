//! Home-region filter term and the exemption-aware scoring it performs.
use serde::{Deserialize, Serialize};

use crate::exemption::ExemptionView;
use crate::region::Region;
use crate::registry::RegionRegistry;
use crate::settings::SettingsStore;
use crate::sim::{SimHandle, Statistic};

/// The host's unmodified "lives in region" scoring.
pub trait LivesInRegionScorer {
    /// Score in `[0, 1]` for `sim` living in any of `regions`.
    fn base_score(&self, sim: &dyn SimHandle, regions: &[&Region]) -> f32;
}

/// Base scoring backed by the settings store: a Sim scores 1 when their home
/// region is in the allowed set (the region plus its worlds list) of any
/// requested region.
pub struct SettingsRegionScorer<'a> {
    registry: &'a RegionRegistry,
    settings: &'a SettingsStore,
}

impl<'a> SettingsRegionScorer<'a> {
    #[must_use]
    pub const fn new(registry: &'a RegionRegistry, settings: &'a SettingsStore) -> Self {
        Self { registry, settings }
    }
}

impl LivesInRegionScorer for SettingsRegionScorer<'_> {
    fn base_score(&self, sim: &dyn SimHandle, regions: &[&Region]) -> f32 {
        let Some(home) = self.registry.by_id(sim.home_region_id()) else {
            return 0.0;
        };
        let lives_here = regions
            .iter()
            .any(|region| self.settings.allowed_home_regions(region).contains(&home.name));
        if lives_here { 1.0 } else { 0.0 }
    }
}

/// Filter term attached to situation jobs by the injection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFilterTerm {
    #[serde(default)]
    pub invert: bool,
    #[serde(default)]
    pub minimum_filter_score: f32,
    /// Region names to test; empty means the region currently being played.
    #[serde(default)]
    pub regions: Vec<String>,
}

impl Default for RegionFilterTerm {
    fn default() -> Self {
        Self {
            invert: false,
            minimum_filter_score: 0.0,
            regions: Vec::new(),
        }
    }
}

/// Everything a score evaluation reads.
pub struct ScoringEnv<'a> {
    pub registry: &'a RegionRegistry,
    pub scorer: &'a dyn LivesInRegionScorer,
    pub current_region: Option<&'a Region>,
}

impl RegionFilterTerm {
    /// A soft copy of this term whose minimum score is `soft_value`.
    #[must_use]
    pub fn softened(&self, soft_value: f32) -> Self {
        Self {
            minimum_filter_score: soft_value,
            ..self.clone()
        }
    }

    fn target_regions<'a>(&self, env: &ScoringEnv<'a>) -> Vec<&'a Region> {
        let configured: Vec<&Region> = self
            .regions
            .iter()
            .filter_map(|name| env.registry.by_name(name))
            .collect();
        if configured.is_empty() {
            env.current_region.into_iter().collect()
        } else {
            configured
        }
    }

    /// Score `sim` against this term.
    ///
    /// Exemption bits can only raise the host's score, never lower it.
    pub fn calculate_score(
        &self,
        sim: &dyn SimHandle,
        env: &ScoringEnv<'_>,
        tracker: Option<&mut ScoreTracker>,
    ) -> f32 {
        let regions = self.target_regions(env);
        let base = env.scorer.base_score(sim, &regions).clamp(0.0, 1.0);
        let bits = sim.exemption().map_or(0, Statistic::get_value);

        let score = if bits == 0 {
            base
        } else {
            let view = ExemptionView::new(bits, env.registry);
            let exempt = regions.iter().any(|region| view.is_allowed(region));
            if let Some(tracker) = tracker {
                tracker.record(sim, base, &regions, exempt);
            }
            if exempt { 1.0 } else { base }
        };

        if self.invert { 1.0 - score } else { score }
    }
}

/// One recorded evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedScore {
    pub first_name: String,
    pub last_name: String,
    pub base_score: f32,
    pub regions: Vec<String>,
    pub exempt: bool,
}

impl TrackedScore {
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{} {}: base={:.2} regions=[{}] exempt={}",
            self.first_name,
            self.last_name,
            self.base_score,
            self.regions.join(", "),
            self.exempt
        )
    }
}

/// Debug record of exemption-bearing evaluations. Unbounded until reset.
#[derive(Debug, Clone, Default)]
pub struct ScoreTracker {
    enabled: bool,
    entries: Vec<TrackedScore>,
}

impl ScoreTracker {
    #[must_use]
    pub const fn enabled() -> Self {
        Self {
            enabled: true,
            entries: Vec::new(),
        }
    }

    pub const fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn record(&mut self, sim: &dyn SimHandle, base_score: f32, regions: &[&Region], exempt: bool) {
        if !self.enabled {
            return;
        }
        self.entries.push(TrackedScore {
            first_name: sim.first_name().to_string(),
            last_name: sim.last_name().to_string(),
            base_score,
            regions: regions.iter().map(|r| r.name.clone()).collect(),
            exempt,
        });
    }

    #[must_use]
    pub fn entries(&self) -> &[TrackedScore] {
        &self.entries
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::InstalledPacks;
    use crate::sim::SimRecord;

    struct FixedScorer(f32);

    impl LivesInRegionScorer for FixedScorer {
        fn base_score(&self, _sim: &dyn SimHandle, _regions: &[&Region]) -> f32 {
            self.0
        }
    }

    fn registry() -> RegionRegistry {
        RegionRegistry::with_defaults(&InstalledPacks::base_only()).unwrap()
    }

    fn sim_with_bits(registry: &RegionRegistry, bits: u64) -> SimRecord {
        let mut sim = SimRecord::new(1, "Nancy", "Landgraab");
        if bits != 0 {
            sim.exemption_mut(registry.max_bit_value()).set_value(bits);
        }
        sim
    }

    #[test]
    fn no_bits_returns_base_score() {
        let registry = registry();
        let scorer = FixedScorer(0.25);
        let env = ScoringEnv {
            registry: &registry,
            scorer: &scorer,
            current_region: registry.by_name("WILLOW_CREEK"),
        };
        let sim = sim_with_bits(&registry, 0);
        let term = RegionFilterTerm::default();
        assert!((term.calculate_score(&sim, &env, None) - 0.25).abs() < f32::EPSILON);
    }

    #[test]
    fn exemption_lifts_score_to_one() {
        let registry = registry();
        let scorer = FixedScorer(0.0);
        let env = ScoringEnv {
            registry: &registry,
            scorer: &scorer,
            current_region: None,
        };
        let willow = registry.by_name("WILLOW_CREEK").unwrap();
        let sim = sim_with_bits(&registry, willow.bit_value());
        let term = RegionFilterTerm {
            regions: vec!["WILLOW_CREEK".to_string()],
            ..RegionFilterTerm::default()
        };
        assert!((term.calculate_score(&sim, &env, None) - 1.0).abs() < f32::EPSILON);

        let inverse = RegionFilterTerm {
            invert: true,
            ..term
        };
        assert!(inverse.calculate_score(&sim, &env, None).abs() < f32::EPSILON);
    }

    #[test]
    fn other_region_bits_do_not_exempt() {
        let registry = registry();
        let scorer = FixedScorer(0.0);
        let willow = registry.by_name("WILLOW_CREEK").unwrap();
        let oasis = registry.by_name("OASIS_SPRINGS").unwrap();
        let env = ScoringEnv {
            registry: &registry,
            scorer: &scorer,
            current_region: Some(willow),
        };
        let sim = sim_with_bits(&registry, oasis.bit_value());
        let mut tracker = ScoreTracker::enabled();
        let score = RegionFilterTerm::default().calculate_score(&sim, &env, Some(&mut tracker));
        assert!(score.abs() < f32::EPSILON);
        assert_eq!(tracker.entries().len(), 1);
        assert_eq!(tracker.entries()[0].regions, vec!["WILLOW_CREEK".to_string()]);
        assert!(!tracker.entries()[0].exempt);
        assert!(tracker.entries()[0].render().starts_with("Nancy Landgraab: base=0.00"));
        tracker.reset();
        assert!(tracker.entries().is_empty());
    }

    #[test]
    fn disabled_tracker_records_nothing() {
        let registry = registry();
        let scorer = FixedScorer(1.0);
        let willow = registry.by_name("WILLOW_CREEK").unwrap();
        let env = ScoringEnv {
            registry: &registry,
            scorer: &scorer,
            current_region: Some(willow),
        };
        let sim = sim_with_bits(&registry, willow.bit_value());
        let mut tracker = ScoreTracker::default();
        RegionFilterTerm::default().calculate_score(&sim, &env, Some(&mut tracker));
        assert!(tracker.entries().is_empty());
    }

    #[test]
    fn softened_term_keeps_regions() {
        let term = RegionFilterTerm {
            regions: vec!["SULANI".to_string()],
            ..RegionFilterTerm::default()
        };
        let soft = term.softened(0.1);
        assert!((soft.minimum_filter_score - 0.1).abs() < f32::EPSILON);
        assert_eq!(soft.regions, term.regions);
    }
}
