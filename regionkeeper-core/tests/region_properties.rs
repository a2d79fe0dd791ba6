use regionkeeper_core::exemption::RegionExemptions;
use regionkeeper_core::scoring::{LivesInRegionScorer, RegionFilterTerm, ScoringEnv};
use regionkeeper_core::{
    InstalledPacks, PackKind, Region, RegionRegistry, SimHandle, SimRecord, Statistic,
};

struct FixedScorer(f32);

impl LivesInRegionScorer for FixedScorer {
    fn base_score(&self, _sim: &dyn SimHandle, _regions: &[&Region]) -> f32 {
        self.0
    }
}

fn pack_mixes() -> Vec<InstalledPacks> {
    vec![
        InstalledPacks::base_only(),
        InstalledPacks::from_codes(["EP01", "EP07", "GP06"]),
        InstalledPacks::from_codes(["EP04", "EP06", "EP11", "EP18", "GP12"]),
        InstalledPacks::all(),
    ]
}

#[test]
fn available_regions_fit_under_max_bit_value() {
    for packs in pack_mixes() {
        let registry = RegionRegistry::with_defaults(&packs).unwrap();
        assert!(!registry.is_empty());
        for region in registry.available() {
            assert!(region.bit_value() <= registry.max_bit_value(), "{}", region.name);
            assert_eq!(registry.by_name(&region.name).map(|r| r.id), Some(region.id));
        }
    }
}

#[test]
fn region_bits_never_overlap() {
    let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
    let regions = registry.available();
    for (i, a) in regions.iter().enumerate() {
        for b in &regions[i + 1..] {
            assert_eq!(a.bit_value() & b.bit_value(), 0, "{} vs {}", a.name, b.name);
        }
    }
}

#[test]
fn implicit_bits_stay_contiguous_per_pack_mix() {
    for packs in pack_mixes() {
        let registry = RegionRegistry::with_defaults(&packs).unwrap();
        let implicit: Vec<u32> = registry
            .available()
            .iter()
            .map(|r| r.raw_bit_index)
            .filter(|bit| *bit < 40)
            .collect();
        let expected: Vec<u32> = (0..implicit.len() as u32).collect();
        assert_eq!(implicit, expected);
    }
}

#[test]
fn explicit_bits_are_stable_across_pack_mixes() {
    let everything = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
    assert_eq!(everything.by_name("BATUU").unwrap().raw_bit_index, 42);
    let partial =
        RegionRegistry::with_defaults(&InstalledPacks::from_codes(["GP09"])).unwrap();
    assert_eq!(partial.by_name("BATUU").unwrap().raw_bit_index, 42);
}

#[test]
fn missing_packs_hide_regions() {
    let registry = RegionRegistry::with_defaults(&InstalledPacks::base_only()).unwrap();
    assert!(registry.by_name("SULANI").is_none());
    assert!(registry.by_name("WILLOW_CREEK").is_some());
    assert!(registry.by_name("NEWCREST").is_some());
    assert!(registry.all().iter().any(|r| r.name == "SULANI"));
    assert!(
        registry
            .available()
            .iter()
            .all(|r| matches!(r.pack.kind(), PackKind::Base | PackKind::Free))
    );
}

#[test]
fn stuff_pack_region_without_bit_is_skipped() {
    let json = r#"[
        {"name": "OASIS_SPRINGS", "id": 1, "info": {"region_name": "Oasis Springs"}},
        {"name": "PLAYGROUND", "id": 2, "info": {"region_name": "Playground", "pack": ["SP01"]}},
        {"name": "WILLOW_CREEK", "id": 3, "info": {"region_name": "Willow Creek"}}
    ]"#;
    let registry = regionkeeper_core::RegionRegistryBuilder::from_json(json)
        .unwrap()
        .finalize(&InstalledPacks::all())
        .unwrap();
    assert!(registry.by_name("PLAYGROUND").is_none());
    assert_eq!(registry.all().len(), 3);
    assert_eq!(registry.by_name("WILLOW_CREEK").unwrap().raw_bit_index, 1);
}

#[test]
fn exemption_bit_forces_a_match() {
    let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
    let willow = registry.by_name("WILLOW_CREEK").unwrap();
    assert_eq!(willow.bit_value(), 2);

    let mut sim = SimRecord::new(11, "Bella", "Goth");
    RegionExemptions::new(sim.exemption_mut(registry.max_bit_value()), &registry).allow(willow);
    assert_eq!(sim.exemption().unwrap().get_value() & 2, 2);

    let term = RegionFilterTerm {
        regions: vec!["WILLOW_CREEK".to_string()],
        ..RegionFilterTerm::default()
    };
    for base in [0.0, 0.3, 1.0] {
        let scorer = FixedScorer(base);
        let env = ScoringEnv {
            registry: &registry,
            scorer: &scorer,
            current_region: None,
        };
        assert!((term.calculate_score(&sim, &env, None) - 1.0).abs() < f32::EPSILON);
    }
}

#[test]
fn cleared_bit_falls_back_to_base_score() {
    let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
    let willow = registry.by_name("WILLOW_CREEK").unwrap();
    let oasis = registry.by_name("OASIS_SPRINGS").unwrap();
    let mut sim = SimRecord::new(12, "Mortimer", "Goth");
    {
        let mut exemptions =
            RegionExemptions::new(sim.exemption_mut(registry.max_bit_value()), &registry);
        exemptions.allow(willow);
        exemptions.allow(oasis);
        exemptions.disallow(willow);
        assert!(!exemptions.is_allowed(willow));
        assert!(exemptions.allowed_regions().contains("OASIS_SPRINGS"));
        assert!(exemptions.disallowed_regions().contains("WILLOW_CREEK"));
    }

    let scorer = FixedScorer(0.0);
    let env = ScoringEnv {
        registry: &registry,
        scorer: &scorer,
        current_region: Some(willow),
    };
    let term = RegionFilterTerm::default();
    assert!(term.calculate_score(&sim, &env, None).abs() < f32::EPSILON);
}

#[test]
fn allow_all_sets_every_available_bit() {
    let registry = RegionRegistry::with_defaults(&InstalledPacks::base_only()).unwrap();
    let mut sim = SimRecord::new(13, "Cassandra", "Goth");
    let mut exemptions =
        RegionExemptions::new(sim.exemption_mut(registry.max_bit_value()), &registry);
    exemptions.allow_all();
    assert_eq!(exemptions.get_value(), registry.max_bit_value());
    assert!(exemptions.disallowed_regions().is_empty());
    exemptions.disallow_all();
    assert_eq!(exemptions.get_value(), 0);
}
