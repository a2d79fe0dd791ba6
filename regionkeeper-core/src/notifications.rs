//! Notification kinds the mod can show, each with its own settings toggle.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NotificationType {
    RegionAssigned,
    RegionUnassigned,
    ExemptionChanged,
    SoftFilterToggled,
    TouristsToggled,
    WorldsListChanged,
    StreetWeightsChanged,
    GlobalToggle,
    SettingsReset,
}

impl NotificationType {
    pub const ALL: [Self; 9] = [
        Self::RegionAssigned,
        Self::RegionUnassigned,
        Self::ExemptionChanged,
        Self::SoftFilterToggled,
        Self::TouristsToggled,
        Self::WorldsListChanged,
        Self::StreetWeightsChanged,
        Self::GlobalToggle,
        Self::SettingsReset,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RegionAssigned => "RegionAssigned",
            Self::RegionUnassigned => "RegionUnassigned",
            Self::ExemptionChanged => "ExemptionChanged",
            Self::SoftFilterToggled => "SoftFilterToggled",
            Self::TouristsToggled => "TouristsToggled",
            Self::WorldsListChanged => "WorldsListChanged",
            Self::StreetWeightsChanged => "StreetWeightsChanged",
            Self::GlobalToggle => "GlobalToggle",
            Self::SettingsReset => "SettingsReset",
        }
    }

    /// Settings key holding the show/hide toggle, e.g. `ShowRegionAssignedNotification`.
    #[must_use]
    pub fn settings_key(self) -> String {
        format!("Show{}Notification", self.name())
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| format!("unknown notification type {s}"))
    }
}
