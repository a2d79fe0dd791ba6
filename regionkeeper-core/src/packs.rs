//! Content packs and the runtime check for which ones are installed.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Broad class of a content pack, derived from its code prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackKind {
    Base,
    Free,
    Game,
    Expansion,
    Stuff,
}

impl PackKind {
    /// Bit offset applied after the previous region when no explicit bit is tuned.
    ///
    /// Stuff-pack regions without an explicit bit are skipped and do not
    /// advance the counter.
    #[must_use]
    pub const fn bit_offset(self) -> Option<u32> {
        match self {
            Self::Base | Self::Free | Self::Game | Self::Expansion => Some(1),
            Self::Stuff => None,
        }
    }
}

/// Content pack code such as `BASE_GAME`, `EP01` or `GP06`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pack(pub String);

impl Pack {
    pub const BASE_GAME: &'static str = "BASE_GAME";

    #[must_use]
    pub fn new(code: &str) -> Self {
        Self(code.trim().to_ascii_uppercase())
    }

    #[must_use]
    pub fn base_game() -> Self {
        Self(Self::BASE_GAME.to_string())
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Classify the pack by its code prefix. Unknown prefixes are treated as base content.
    #[must_use]
    pub fn kind(&self) -> PackKind {
        let code = self.0.as_str();
        if code.starts_with("EP") {
            PackKind::Expansion
        } else if code.starts_with("GP") {
            PackKind::Game
        } else if code.starts_with("SP") {
            PackKind::Stuff
        } else if code.starts_with("FP") {
            PackKind::Free
        } else {
            PackKind::Base
        }
    }
}

impl fmt::Display for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Packs a piece of content needs before it can be used.
///
/// An empty requirement is always satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackRequirement(pub Vec<Pack>);

impl PackRequirement {
    #[must_use]
    pub fn single(code: &str) -> Self {
        Self(vec![Pack::new(code)])
    }

    #[must_use]
    pub fn is_satisfied<P: PackRuntime + ?Sized>(&self, runtime: &P) -> bool {
        self.0.iter().all(|pack| runtime.is_installed(pack))
    }

    /// Class of the primary pack, used for bit assignment.
    #[must_use]
    pub fn kind(&self) -> PackKind {
        self.0.first().map_or(PackKind::Base, Pack::kind)
    }
}

/// Host view of which packs are present in the running game.
pub trait PackRuntime {
    fn is_installed(&self, pack: &Pack) -> bool;
}

/// Set-backed pack runtime. Base and free content is always installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPacks {
    packs: BTreeSet<Pack>,
    #[serde(default)]
    everything: bool,
}

impl InstalledPacks {
    /// Runtime with only the base game.
    #[must_use]
    pub fn base_only() -> Self {
        Self::default()
    }

    /// Runtime that reports every pack as installed.
    #[must_use]
    pub fn all() -> Self {
        Self {
            packs: BTreeSet::new(),
            everything: true,
        }
    }

    #[must_use]
    pub fn from_codes<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let packs = codes
            .into_iter()
            .map(|code| Pack::new(code.as_ref()))
            .filter(|pack| !pack.0.is_empty())
            .collect();
        Self {
            packs,
            everything: false,
        }
    }

    pub fn install(&mut self, code: &str) {
        self.packs.insert(Pack::new(code));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pack> {
        self.packs.iter()
    }
}

impl PackRuntime for InstalledPacks {
    fn is_installed(&self, pack: &Pack) -> bool {
        self.everything
            || matches!(pack.kind(), PackKind::Base | PackKind::Free)
            || self.packs.contains(pack)
    }
}
