//! Console and interaction commands. Each operation is a [`Command`] value
//! dispatched through [`CommandFacade::execute`]; host-generated affordances
//! are addressed by name hashes derived from the same values.
use std::fmt;
use std::path::Path;

use crate::exemption::RegionExemptions;
use crate::notifications::NotificationType;
use crate::region::Region;
use crate::registry::RegionRegistry;
use crate::settings::schema::{
    BIDIRECTIONAL_TOGGLE, HIGH_SCHOOL_TOGGLE, SAVE_ACROSS_GALLERY_TOGGLE, SOFT_FILTER_VALUE,
};
use crate::settings::{
    RegionSetting, SettingValue, SettingsStore, StreetWeightOutcome, StreetWeightRejection,
    WorldsOp,
};
use crate::sim::{NO_REGION, SimHandle};

/// Prefix shared by every generated affordance name.
pub const AFFORDANCE_PREFIX: &str = "regionkeeper";

/// Host-owned localized strings, addressed by opaque tokens.
pub trait TextRenderer {
    fn render(&self, token: &str, args: &[&str]) -> String;
}

/// Message tokens understood by [`PlainRenderer`].
pub mod tokens {
    pub const REGION_ASSIGNED: &str = "region_assigned";
    pub const REGION_UNASSIGNED: &str = "region_unassigned";
    pub const NOT_ASSIGNED: &str = "not_assigned";
    pub const EXEMPTION_ALLOWED: &str = "exemption_allowed";
    pub const EXEMPTION_DISALLOWED: &str = "exemption_disallowed";
    pub const EXEMPTION_UNCHANGED: &str = "exemption_unchanged";
    pub const EXEMPTION_ALL: &str = "exemption_all";
    pub const EXEMPTION_NONE: &str = "exemption_none";
    pub const SOFT_TOGGLED: &str = "soft_toggled";
    pub const TOURISTS_TOGGLED: &str = "tourists_toggled";
    pub const NO_TOURISTS: &str = "no_tourists";
    pub const WORLDS_ALLOWED: &str = "worlds_allowed";
    pub const WORLDS_DISALLOWED: &str = "worlds_disallowed";
    pub const WORLDS_MIRRORED: &str = "worlds_mirrored";
    pub const WORLDS_UNCHANGED: &str = "worlds_unchanged";
    pub const STREET_WEIGHT_SET: &str = "street_weight_set";
    pub const STREET_WEIGHT_DEFAULT: &str = "street_weight_default";
    pub const STREET_WEIGHT_REJECTED: &str = "street_weight_rejected";
    pub const SOFT_VALUE_SET: &str = "soft_value_set";
    pub const SOFT_VALUE_REJECTED: &str = "soft_value_rejected";
    pub const TOGGLE_SET: &str = "toggle_set";
    pub const RESET_DONE: &str = "reset_done";
    pub const RESET_BACKED_UP: &str = "reset_backed_up";
    pub const UNKNOWN_REGION: &str = "unknown_region";
    pub const NO_SIM: &str = "no_sim";
    pub const SETTINGS_FAILED: &str = "settings_failed";
}

/// English rendering with `{0}`, `{1}`... placeholders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainRenderer;

impl PlainRenderer {
    fn template(token: &str) -> Option<&'static str> {
        use tokens::*;
        let template = match token {
            REGION_ASSIGNED => "{0} now lives in {1}.",
            REGION_UNASSIGNED => "{0} no longer lives in {1}.",
            NOT_ASSIGNED => "{0} has no home region.",
            EXEMPTION_ALLOWED => "{0} may now be drawn into {1}.",
            EXEMPTION_DISALLOWED => "{0} is no longer exempt in {1}.",
            EXEMPTION_UNCHANGED => "{0} was already {1} in {2}.",
            EXEMPTION_ALL => "{0} is exempt in every region.",
            EXEMPTION_NONE => "{0} has no region exemptions.",
            SOFT_TOGGLED => "Soft filter for {0} is now {1}.",
            TOURISTS_TOGGLED => "Tourists in {0} are now {1}.",
            NO_TOURISTS => "{0} has no tourists.",
            WORLDS_ALLOWED => "{0} now draws residents from {1}.",
            WORLDS_DISALLOWED => "{0} no longer draws residents from {1}.",
            WORLDS_MIRRORED => "{0} and {1} now share residents both ways.",
            WORLDS_UNCHANGED => "Worlds list for {0} already matches.",
            STREET_WEIGHT_SET => "{0} in {1} now weighs {2}.",
            STREET_WEIGHT_DEFAULT => "{0} in {1} is back to its default weight.",
            STREET_WEIGHT_REJECTED => "Cannot weigh {0} in {1}: {2}.",
            SOFT_VALUE_SET => "Soft filter value is now {0}.",
            SOFT_VALUE_REJECTED => "Soft filter value {0} must be between 0 and 1.",
            TOGGLE_SET => "{0} is now {1}.",
            RESET_DONE => "Settings reset to defaults.",
            RESET_BACKED_UP => "Settings reset to defaults; backup at {0}.",
            UNKNOWN_REGION => "Unknown region {0}.",
            NO_SIM => "This command needs a Sim.",
            SETTINGS_FAILED => "Settings could not be saved: {0}.",
            _ => return None,
        };
        Some(template)
    }
}

impl TextRenderer for PlainRenderer {
    fn render(&self, token: &str, args: &[&str]) -> String {
        let Some(template) = Self::template(token) else {
            return if args.is_empty() {
                token.to_string()
            } else {
                format!("{token}: {}", args.join(", "))
            };
        };
        args.iter()
            .enumerate()
            .fold(template.to_string(), |text, (i, arg)| {
                text.replace(&format!("{{{i}}}"), arg)
            })
    }
}

/// Result of one command: a success flag and one human-readable line.
/// `notification` is set when the host should also surface the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub success: bool,
    pub message: String,
    pub notification: Option<NotificationType>,
}

impl CommandOutcome {
    #[must_use]
    pub const fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
            notification: None,
        }
    }

    #[must_use]
    pub const fn failed(message: String) -> Self {
        Self {
            success: false,
            message,
            notification: None,
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Global boolean settings exposed as commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalToggle {
    Bidirectional,
    HighSchool,
    SaveAcrossGallery,
}

impl GlobalToggle {
    pub const ALL: [Self; 3] = [Self::Bidirectional, Self::HighSchool, Self::SaveAcrossGallery];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Bidirectional => BIDIRECTIONAL_TOGGLE,
            Self::HighSchool => HIGH_SCHOOL_TOGGLE,
            Self::SaveAcrossGallery => SAVE_ACROSS_GALLERY_TOGGLE,
        }
    }

    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Bidirectional => "bidirectional",
            Self::HighSchool => "high_school",
            Self::SaveAcrossGallery => "save_across_gallery",
        }
    }
}

/// Every console and interaction operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AssignRegion { region: String },
    UnassignRegion,
    Allow { region: String },
    Disallow { region: String },
    AllowAll,
    DisallowAll,
    ToggleSoft { region: String, value: Option<bool> },
    ToggleTourists { region: String, value: Option<bool> },
    AlterWorlds { source: String, target: String, op: WorldsOp },
    SetStreetWeight { region: String, street: String, weight: f64 },
    SetSoftValue { value: f64 },
    Toggle { toggle: GlobalToggle, value: Option<bool> },
    ToggleNotification { kind: NotificationType, value: Option<bool> },
    Reset { backup: bool },
}

/// Name and hash of a generated affordance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affordance {
    pub name: String,
    pub hash: u64,
}

impl Command {
    #[must_use]
    pub const fn needs_sim(&self) -> bool {
        matches!(
            self,
            Self::AssignRegion { .. }
                | Self::UnassignRegion
                | Self::Allow { .. }
                | Self::Disallow { .. }
                | Self::AllowAll
                | Self::DisallowAll
        )
    }

    /// The generated affordance for this command, if the host exposes one.
    /// Suffixes are a region pretty name, a street name, or `on`/`off`.
    #[must_use]
    pub fn affordance(&self, registry: &RegionRegistry) -> Option<Affordance> {
        let on_off = |value: &Option<bool>| value.map(|v| if v { "on" } else { "off" });
        let (base, suffix) = match self {
            Self::AssignRegion { region } => ("move_to".to_string(), pretty(registry, region)?),
            Self::Allow { region } => ("allow".to_string(), pretty(registry, region)?),
            Self::Disallow { region } => ("disallow".to_string(), pretty(registry, region)?),
            Self::ToggleSoft { region, value } => (
                format!("soft_{}", pretty(registry, region)?),
                on_off(value)?.to_string(),
            ),
            Self::ToggleTourists { region, value } => (
                format!("tourists_{}", pretty(registry, region)?),
                on_off(value)?.to_string(),
            ),
            Self::SetStreetWeight { street, .. } => ("street_weight".to_string(), street.clone()),
            Self::Toggle { toggle, value } => {
                (toggle.slug().to_string(), on_off(value)?.to_string())
            }
            Self::ToggleNotification { kind, value } => (
                format!("notification_{}", kind.name().to_ascii_lowercase()),
                on_off(value)?.to_string(),
            ),
            _ => return None,
        };
        let base = format!("{AFFORDANCE_PREFIX}_{base}");
        Some(Affordance {
            name: affordance_name(&base, &suffix),
            hash: affordance_hash(&base, &suffix),
        })
    }
}

fn pretty(registry: &RegionRegistry, region: &str) -> Option<String> {
    registry.by_name(region).map(Region::pretty_name)
}

#[must_use]
pub fn affordance_name(base: &str, suffix: &str) -> String {
    format!("{base}_{suffix}")
}

#[must_use]
pub fn affordance_hash(base: &str, suffix: &str) -> u64 {
    hash64(&affordance_name(base, suffix))
}

/// 64-bit FNV-1 over the lowercased name with the high bit set, the shape
/// the host expects for generated instance ids.
#[must_use]
pub fn hash64(name: &str) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;
    let mut hash = FNV_OFFSET;
    for b in name.to_lowercase().bytes() {
        hash = hash.wrapping_mul(FNV_PRIME) ^ u64::from(b);
    }
    hash | (1 << 63)
}

const fn on_off_word(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// Executes commands against the registry, the settings store and an
/// optional target Sim. Never returns an error: failures come back as an
/// unsuccessful [`CommandOutcome`].
pub struct CommandFacade<'a> {
    registry: &'a RegionRegistry,
    settings: &'a mut SettingsStore,
    renderer: &'a dyn TextRenderer,
}

impl<'a> CommandFacade<'a> {
    pub fn new(
        registry: &'a RegionRegistry,
        settings: &'a mut SettingsStore,
        renderer: &'a dyn TextRenderer,
    ) -> Self {
        Self {
            registry,
            settings,
            renderer,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &SettingsStore {
        self.settings
    }

    pub fn execute(&mut self, command: &Command, sim: Option<&mut dyn SimHandle>) -> CommandOutcome {
        let outcome = match (command, sim) {
            (cmd, None) if cmd.needs_sim() => self.fail(tokens::NO_SIM, &[]),
            (Command::AssignRegion { region }, Some(sim)) => self.assign(sim, region),
            (Command::UnassignRegion, Some(sim)) => self.unassign(sim),
            (Command::Allow { region }, Some(sim)) => self.exempt(sim, region, true),
            (Command::Disallow { region }, Some(sim)) => self.exempt(sim, region, false),
            (Command::AllowAll, Some(sim)) => self.exempt_all(sim, true),
            (Command::DisallowAll, Some(sim)) => self.exempt_all(sim, false),
            (Command::ToggleSoft { region, value }, _) => self.toggle_soft(region, *value),
            (Command::ToggleTourists { region, value }, _) => self.toggle_tourists(region, *value),
            (Command::AlterWorlds { source, target, op }, _) => {
                self.alter_worlds(source, target, *op)
            }
            (
                Command::SetStreetWeight {
                    region,
                    street,
                    weight,
                },
                _,
            ) => self.street_weight(region, street, *weight),
            (Command::SetSoftValue { value }, _) => self.soft_value(*value),
            (Command::Toggle { toggle, value }, _) => self.global_toggle(*toggle, *value),
            (Command::ToggleNotification { kind, value }, _) => {
                self.notification_toggle(*kind, *value)
            }
            (Command::Reset { backup }, _) => self.reset(*backup),
            (_, None) => self.fail(tokens::NO_SIM, &[]),
        };
        log::debug!("{command:?} -> {}", outcome.message);
        outcome
    }

    fn say(&self, token: &str, args: &[&str], kind: NotificationType) -> CommandOutcome {
        let mut outcome = CommandOutcome::ok(self.renderer.render(token, args));
        if self.settings.get_notification(kind) {
            outcome.notification = Some(kind);
        }
        outcome
    }

    fn fail(&self, token: &str, args: &[&str]) -> CommandOutcome {
        CommandOutcome::failed(self.renderer.render(token, args))
    }

    fn settings_failed(&self, err: &dyn fmt::Display) -> CommandOutcome {
        log::error!("settings write failed: {err}");
        self.fail(tokens::SETTINGS_FAILED, &[&err.to_string()])
    }

    fn region(&self, name: &str) -> Result<&'a Region, CommandOutcome> {
        self.registry
            .by_name(name)
            .ok_or_else(|| self.fail(tokens::UNKNOWN_REGION, &[name]))
    }

    fn assign(&self, sim: &mut dyn SimHandle, region: &str) -> CommandOutcome {
        let region = match self.region(region) {
            Ok(region) => region,
            Err(outcome) => return outcome,
        };
        let previous = self.registry.by_id(sim.home_region_id());
        sim.set_home_region_id(region.id);
        region.apply_local_fixup(sim, previous);
        let name = full_name(sim);
        self.say(
            tokens::REGION_ASSIGNED,
            &[&name, &region.desc()],
            NotificationType::RegionAssigned,
        )
    }

    fn unassign(&self, sim: &mut dyn SimHandle) -> CommandOutcome {
        let name = full_name(sim);
        let previous = self.registry.by_id(sim.home_region_id());
        if sim.home_region_id() == NO_REGION {
            return self.fail(tokens::NOT_ASSIGNED, &[&name]);
        }
        sim.set_home_region_id(NO_REGION);
        let Some(previous) = previous else {
            return self.say(
                tokens::REGION_UNASSIGNED,
                &[&name, "an unknown region"],
                NotificationType::RegionUnassigned,
            );
        };
        previous.apply_local_fixup(sim, Some(previous));
        self.say(
            tokens::REGION_UNASSIGNED,
            &[&name, &previous.desc()],
            NotificationType::RegionUnassigned,
        )
    }

    fn exempt(&self, sim: &mut dyn SimHandle, region: &str, allow: bool) -> CommandOutcome {
        let region = match self.region(region) {
            Ok(region) => region,
            Err(outcome) => return outcome,
        };
        let name = full_name(sim);
        let stat = sim.exemption_mut(self.registry.max_bit_value());
        let mut exemptions = RegionExemptions::new(stat, self.registry);
        let changed = if allow {
            exemptions.allow(region)
        } else {
            exemptions.disallow(region)
        };
        let desc = region.desc();
        if !changed {
            let state = if allow { "allowed" } else { "disallowed" };
            return self.say(
                tokens::EXEMPTION_UNCHANGED,
                &[&name, state, &desc],
                NotificationType::ExemptionChanged,
            );
        }
        let token = if allow {
            tokens::EXEMPTION_ALLOWED
        } else {
            tokens::EXEMPTION_DISALLOWED
        };
        self.say(token, &[&name, &desc], NotificationType::ExemptionChanged)
    }

    fn exempt_all(&self, sim: &mut dyn SimHandle, allow: bool) -> CommandOutcome {
        let name = full_name(sim);
        let stat = sim.exemption_mut(self.registry.max_bit_value());
        let mut exemptions = RegionExemptions::new(stat, self.registry);
        let token = if allow {
            exemptions.allow_all();
            tokens::EXEMPTION_ALL
        } else {
            exemptions.disallow_all();
            tokens::EXEMPTION_NONE
        };
        self.say(token, &[&name], NotificationType::ExemptionChanged)
    }

    fn toggle_soft(&mut self, region: &str, value: Option<bool>) -> CommandOutcome {
        let region = match self.region(region) {
            Ok(region) => region,
            Err(outcome) => return outcome,
        };
        match self.settings.toggle(&RegionSetting::Soft.key_for(region), value) {
            Ok(now) => self.say(
                tokens::SOFT_TOGGLED,
                &[&region.desc(), on_off_word(now)],
                NotificationType::SoftFilterToggled,
            ),
            Err(err) => self.settings_failed(&err),
        }
    }

    fn toggle_tourists(&mut self, region: &str, value: Option<bool>) -> CommandOutcome {
        let region = match self.region(region) {
            Ok(region) => region,
            Err(outcome) => return outcome,
        };
        if !region.has_tourists {
            return self.fail(tokens::NO_TOURISTS, &[&region.desc()]);
        }
        let key = RegionSetting::TouristsToggle.key_for(region);
        match self.settings.toggle(&key, value) {
            Ok(now) => self.say(
                tokens::TOURISTS_TOGGLED,
                &[&region.desc(), on_off_word(now)],
                NotificationType::TouristsToggled,
            ),
            Err(err) => self.settings_failed(&err),
        }
    }

    fn alter_worlds(&mut self, source: &str, target: &str, op: WorldsOp) -> CommandOutcome {
        let (source, target) = match (self.region(source), self.region(target)) {
            (Ok(source), Ok(target)) => (source, target),
            (Err(outcome), _) | (_, Err(outcome)) => return outcome,
        };
        let change = match self.settings.alter_worlds_list(source, target, op) {
            Ok(change) => change,
            Err(err) => return self.settings_failed(&err),
        };
        let (src, tgt) = (source.desc(), target.desc());
        let token = match (change.source_changed, change.mirrored, op) {
            (false, false, _) => tokens::WORLDS_UNCHANGED,
            (_, true, WorldsOp::Allow) => tokens::WORLDS_MIRRORED,
            (_, _, WorldsOp::Allow) => tokens::WORLDS_ALLOWED,
            (_, _, WorldsOp::Disallow) => tokens::WORLDS_DISALLOWED,
        };
        self.say(token, &[&src, &tgt], NotificationType::WorldsListChanged)
    }

    fn street_weight(&mut self, region: &str, street: &str, weight: f64) -> CommandOutcome {
        let region = match self.region(region) {
            Ok(region) => region,
            Err(outcome) => return outcome,
        };
        let desc = region.desc();
        match self.settings.set_street_weight(region, street, weight) {
            Ok(StreetWeightOutcome::Stored) => self.say(
                tokens::STREET_WEIGHT_SET,
                &[street, &desc, &weight.to_string()],
                NotificationType::StreetWeightsChanged,
            ),
            Ok(StreetWeightOutcome::ResetToDefault) => self.say(
                tokens::STREET_WEIGHT_DEFAULT,
                &[street, &desc],
                NotificationType::StreetWeightsChanged,
            ),
            Ok(StreetWeightOutcome::Rejected(reason)) => {
                let reason = match reason {
                    StreetWeightRejection::NotMultiStreet => "it has a single street",
                    StreetWeightRejection::UnknownStreet => "no such street",
                    StreetWeightRejection::InvalidWeight => "weights must be zero or more",
                    StreetWeightRejection::AllZero => "at least one street must keep a weight",
                };
                self.fail(tokens::STREET_WEIGHT_REJECTED, &[street, &desc, reason])
            }
            Err(err) => self.settings_failed(&err),
        }
    }

    fn soft_value(&mut self, value: f64) -> CommandOutcome {
        match self
            .settings
            .update(SOFT_FILTER_VALUE, SettingValue::Float(value))
        {
            Ok(true) => self.say(
                tokens::SOFT_VALUE_SET,
                &[&value.to_string()],
                NotificationType::GlobalToggle,
            ),
            Ok(false) => self.fail(tokens::SOFT_VALUE_REJECTED, &[&value.to_string()]),
            Err(err) => self.settings_failed(&err),
        }
    }

    fn global_toggle(&mut self, toggle: GlobalToggle, value: Option<bool>) -> CommandOutcome {
        match self.settings.toggle(toggle.key(), value) {
            Ok(now) => self.say(
                tokens::TOGGLE_SET,
                &[toggle.key(), on_off_word(now)],
                NotificationType::GlobalToggle,
            ),
            Err(err) => self.settings_failed(&err),
        }
    }

    fn notification_toggle(
        &mut self,
        kind: NotificationType,
        value: Option<bool>,
    ) -> CommandOutcome {
        let key = kind.settings_key();
        match self.settings.toggle(&key, value) {
            Ok(now) => self.say(
                tokens::TOGGLE_SET,
                &[&key, on_off_word(now)],
                NotificationType::GlobalToggle,
            ),
            Err(err) => self.settings_failed(&err),
        }
    }

    fn reset(&mut self, backup: bool) -> CommandOutcome {
        match self.settings.reset(backup) {
            Ok(Some(path)) => self.say(
                tokens::RESET_BACKED_UP,
                &[&display_path(&path)],
                NotificationType::SettingsReset,
            ),
            Ok(None) => self.say(tokens::RESET_DONE, &[], NotificationType::SettingsReset),
            Err(err) => self.settings_failed(&err),
        }
    }
}

fn full_name(sim: &dyn SimHandle) -> String {
    format!("{} {}", sim.first_name(), sim.last_name())
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packs::InstalledPacks;
    use crate::settings::SettingsPaths;
    use crate::sim::{SimRecord, Statistic};

    fn setup() -> (tempfile::TempDir, RegionRegistry, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let registry = RegionRegistry::with_defaults(&InstalledPacks::all()).unwrap();
        let mut store = SettingsStore::new(SettingsPaths::new(dir.path()), &registry);
        store.load().unwrap();
        (dir, registry, store)
    }

    #[test]
    fn plain_renderer_fills_placeholders() {
        let line = PlainRenderer.render(tokens::REGION_ASSIGNED, &["Bella Goth", "Willow Creek"]);
        assert_eq!(line, "Bella Goth now lives in Willow Creek.");
        assert_eq!(PlainRenderer.render("mystery", &["a"]), "mystery: a");
    }

    #[test]
    fn hash64_is_case_insensitive_and_high_bit_set() {
        let a = affordance_hash("regionkeeper_move_to", "willow_creek");
        let b = affordance_hash("RegionKeeper_Move_To", "Willow_Creek");
        assert_eq!(a, b);
        assert_ne!(a & (1 << 63), 0);
        assert_ne!(a, affordance_hash("regionkeeper_move_to", "oasis_springs"));
    }

    #[test]
    fn affordances_cover_regions_streets_and_toggles() {
        let (_dir, registry, _store) = setup();
        let assign = Command::AssignRegion {
            region: "Willow Creek".to_string(),
        };
        let affordance = assign.affordance(&registry).unwrap();
        assert_eq!(affordance.name, "regionkeeper_move_to_willow_creek");
        assert_eq!(affordance.hash, hash64(&affordance.name));

        let toggle = Command::Toggle {
            toggle: GlobalToggle::Bidirectional,
            value: Some(true),
        };
        assert_eq!(
            toggle.affordance(&registry).unwrap().name,
            "regionkeeper_bidirectional_on"
        );
        let flip = Command::Toggle {
            toggle: GlobalToggle::Bidirectional,
            value: None,
        };
        assert!(flip.affordance(&registry).is_none());
        assert!(Command::Reset { backup: false }.affordance(&registry).is_none());
    }

    #[test]
    fn assign_swaps_region_traits() {
        let (_dir, registry, mut store) = setup();
        let mut facade = CommandFacade::new(&registry, &mut store, &PlainRenderer);
        let mut sim = SimRecord::new(7, "Bella", "Goth");
        let hollow = registry.by_name("FORGOTTEN_HOLLOW").unwrap();
        let sulani = registry.by_name("SULANI").unwrap();

        let outcome = facade.execute(
            &Command::AssignRegion {
                region: "FORGOTTEN_HOLLOW".to_string(),
            },
            Some(&mut sim),
        );
        assert!(outcome.success);
        assert_eq!(outcome.notification, Some(NotificationType::RegionAssigned));
        assert_eq!(sim.home_region_id(), hollow.id);
        let hollow_trait = hollow.fixup.as_ref().unwrap().traits[0];
        assert!(sim.has_trait(hollow_trait));

        facade.execute(
            &Command::AssignRegion {
                region: "SULANI".to_string(),
            },
            Some(&mut sim),
        );
        assert!(!sim.has_trait(hollow_trait));
        assert!(sim.has_trait(sulani.fixup.as_ref().unwrap().traits[0]));

        let outcome = facade.execute(&Command::UnassignRegion, Some(&mut sim));
        assert!(outcome.success);
        assert_eq!(sim.home_region_id(), NO_REGION);
        assert!(sim.traits.is_empty());
        assert!(!facade.execute(&Command::UnassignRegion, Some(&mut sim)).success);
    }

    #[test]
    fn sim_commands_without_a_sim_fail() {
        let (_dir, registry, mut store) = setup();
        let mut facade = CommandFacade::new(&registry, &mut store, &PlainRenderer);
        let outcome = facade.execute(&Command::AllowAll, None);
        assert!(!outcome.success);
        assert_eq!(outcome.message, "This command needs a Sim.");
    }

    #[test]
    fn exemptions_round_trip_through_commands() {
        let (_dir, registry, mut store) = setup();
        let mut facade = CommandFacade::new(&registry, &mut store, &PlainRenderer);
        let mut sim = SimRecord::new(1, "Don", "Lothario");
        let willow = registry.by_name("WILLOW_CREEK").unwrap();

        let allow = Command::Allow {
            region: "WILLOW_CREEK".to_string(),
        };
        assert!(facade.execute(&allow, Some(&mut sim)).success);
        assert_eq!(sim.exemption().unwrap().get_value(), willow.bit_value());
        let again = facade.execute(&allow, Some(&mut sim));
        assert!(again.message.contains("already allowed"));

        facade.execute(&Command::AllowAll, Some(&mut sim));
        assert_eq!(sim.exemption().unwrap().get_value(), registry.max_bit_value());
        facade.execute(&Command::DisallowAll, Some(&mut sim));
        assert_eq!(sim.exemption().unwrap().get_value(), 0);
    }

    #[test]
    fn notifications_follow_their_toggles() {
        let (_dir, registry, mut store) = setup();
        let mut facade = CommandFacade::new(&registry, &mut store, &PlainRenderer);
        let off = facade.execute(
            &Command::ToggleNotification {
                kind: NotificationType::SoftFilterToggled,
                value: Some(false),
            },
            None,
        );
        assert!(off.success);

        let soft = facade.execute(
            &Command::ToggleSoft {
                region: "WILLOW_CREEK".to_string(),
                value: None,
            },
            None,
        );
        assert!(soft.success);
        assert_eq!(soft.message, "Soft filter for Willow Creek is now on.");
        assert_eq!(soft.notification, None);
    }

    #[test]
    fn invalid_input_leaves_state_unchanged() {
        let (_dir, registry, mut store) = setup();
        let mut facade = CommandFacade::new(&registry, &mut store, &PlainRenderer);
        assert!(
            !facade
                .execute(&Command::SetSoftValue { value: 1.5 }, None)
                .success
        );
        assert!(
            !facade
                .execute(
                    &Command::ToggleTourists {
                        region: "WILLOW_CREEK".to_string(),
                        value: None,
                    },
                    None
                )
                .success
        );
        assert!(
            !facade
                .execute(
                    &Command::ToggleSoft {
                        region: "ATLANTIS".to_string(),
                        value: None,
                    },
                    None
                )
                .success
        );
        assert!((facade.settings().soft_filter_value() - 0.1).abs() < f64::EPSILON);
    }
}
