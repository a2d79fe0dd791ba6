//! Third-party injection hooks and the ordered list of built-in steps.
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::InjectionError;
use crate::tuning::{SituationJob, TuningId};

/// Search over situation job names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSearch {
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(String),
}

/// A declarative contribution from another mod: jobs and filters it wants
/// left alone, jobs it wants softened, and an optional name search whose
/// matches are bypassed too.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InjectionHook {
    pub name: String,
    #[serde(default)]
    pub bypass_jobs: Vec<TuningId>,
    #[serde(default)]
    pub bypass_filters: Vec<TuningId>,
    #[serde(default)]
    pub soft_jobs: Vec<TuningId>,
    #[serde(default)]
    pub search: Option<NameSearch>,
}

/// A hook with its search compiled.
#[derive(Debug, Clone)]
pub struct CompiledHook {
    pub hook: InjectionHook,
    matcher: Option<Matcher>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(Regex),
}

impl CompiledHook {
    /// Compile the hook's name search.
    ///
    /// # Errors
    ///
    /// Returns an error when the regex does not compile.
    pub fn compile(hook: InjectionHook) -> Result<Self, InjectionError> {
        let matcher = match &hook.search {
            None => None,
            Some(NameSearch::Prefix(p)) => Some(Matcher::Prefix(p.to_ascii_lowercase())),
            Some(NameSearch::Suffix(s)) => Some(Matcher::Suffix(s.to_ascii_lowercase())),
            Some(NameSearch::Contains(c)) => Some(Matcher::Contains(c.to_ascii_lowercase())),
            Some(NameSearch::Regex(pattern)) => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|err| InjectionError::InvalidSearch {
                        hook: hook.name.clone(),
                        reason: err.to_string(),
                    })?;
                Some(Matcher::Regex(regex))
            }
        };
        Ok(Self { hook, matcher })
    }

    #[must_use]
    pub fn matches(&self, job: &SituationJob) -> bool {
        let name = job.name.to_ascii_lowercase();
        match &self.matcher {
            None => false,
            Some(Matcher::Prefix(p)) => name.starts_with(p.as_str()),
            Some(Matcher::Suffix(s)) => name.ends_with(s.as_str()),
            Some(Matcher::Contains(c)) => name.contains(c.as_str()),
            Some(Matcher::Regex(regex)) => regex.is_match(&job.name),
        }
    }
}

/// Built-in injection steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionStep {
    ResolveFilterTerms,
    BypassDiscovery,
    SoftFilterSplice,
    ForcedReplacement,
    FilterReplacement,
    FilterFixup,
    MainFilterSplice,
    VenueOverride,
    AggregateFilterOverride,
    AddRegionInjection,
}

impl InjectionStep {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ResolveFilterTerms => "resolve_filter_terms",
            Self::BypassDiscovery => "bypass_discovery",
            Self::SoftFilterSplice => "soft_filter_splice",
            Self::ForcedReplacement => "forced_replacement",
            Self::FilterReplacement => "filter_replacement",
            Self::FilterFixup => "filter_fixup",
            Self::MainFilterSplice => "main_filter_splice",
            Self::VenueOverride => "venue_override",
            Self::AggregateFilterOverride => "aggregate_filter_override",
            Self::AddRegionInjection => "add_region_injection",
        }
    }
}

/// A step plus whether its failure is swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookSpec {
    pub step: InjectionStep,
    pub safe: bool,
}

impl HookSpec {
    const fn safe(step: InjectionStep) -> Self {
        Self { step, safe: true }
    }

    const fn pivotal(step: InjectionStep) -> Self {
        Self { step, safe: false }
    }
}

/// Step order. Bypass discovery and the soft splice both precede the main splice.
pub const DEFAULT_STEPS: [HookSpec; 10] = [
    HookSpec::pivotal(InjectionStep::ResolveFilterTerms),
    HookSpec::safe(InjectionStep::BypassDiscovery),
    HookSpec::safe(InjectionStep::SoftFilterSplice),
    HookSpec::safe(InjectionStep::ForcedReplacement),
    HookSpec::safe(InjectionStep::FilterReplacement),
    HookSpec::safe(InjectionStep::FilterFixup),
    HookSpec::safe(InjectionStep::MainFilterSplice),
    HookSpec::safe(InjectionStep::VenueOverride),
    HookSpec::safe(InjectionStep::AggregateFilterOverride),
    HookSpec::safe(InjectionStep::AddRegionInjection),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn job(name: &str) -> SituationJob {
        SituationJob {
            id: 1,
            name: name.to_string(),
            filter: None,
            location_based_filter_terms: Some(Vec::new()),
            fields: BTreeMap::new(),
        }
    }

    fn hook(search: NameSearch) -> CompiledHook {
        CompiledHook::compile(InjectionHook {
            name: "test".to_string(),
            search: Some(search),
            ..InjectionHook::default()
        })
        .unwrap()
    }

    #[test]
    fn plain_searches_ignore_case() {
        let target = job("situation_job_Wedding_Guest");
        assert!(hook(NameSearch::Prefix("SITUATION_job".to_string())).matches(&target));
        assert!(hook(NameSearch::Suffix("guest".to_string())).matches(&target));
        assert!(hook(NameSearch::Contains("wedding".to_string())).matches(&target));
        assert!(!hook(NameSearch::Contains("funeral".to_string())).matches(&target));
    }

    #[test]
    fn regex_search_compiles_and_matches() {
        let compiled = hook(NameSearch::Regex(r"^mymod_.*_(guest|host)$".to_string()));
        assert!(compiled.matches(&job("MyMod_Party_Guest")));
        assert!(!compiled.matches(&job("MyMod_Party_Bartender")));
    }

    #[test]
    fn bad_regex_is_reported_with_hook_name() {
        let err = CompiledHook::compile(InjectionHook {
            name: "broken".to_string(),
            search: Some(NameSearch::Regex("(".to_string())),
            ..InjectionHook::default()
        })
        .unwrap_err();
        assert!(matches!(err, InjectionError::InvalidSearch { ref hook, .. } if hook == "broken"));
    }

    #[test]
    fn hooks_without_search_match_nothing() {
        let compiled = CompiledHook::compile(InjectionHook::default()).unwrap();
        assert!(!compiled.matches(&job("anything")));
    }

    #[test]
    fn resolve_step_is_the_only_pivotal_one() {
        let pivotal: Vec<_> = DEFAULT_STEPS.iter().filter(|s| !s.safe).collect();
        assert_eq!(pivotal.len(), 1);
        assert_eq!(pivotal[0].step, InjectionStep::ResolveFilterTerms);
    }
}
