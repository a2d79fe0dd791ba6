//! One-shot post-load pass that splices region filter terms into tuning.
use thiserror::Error;

use crate::tuning::TuningId;

pub mod config;
pub mod engine;
pub mod hooks;
mod passes;

pub use config::{
    AggregateMode, AggregateOverride, FilterReplacement, ForcedReplacement, InjectionTuning,
    VenueOverride,
};
pub use engine::{InjectionContext, InjectionEngine, InjectionReport, SkippedReference};
pub use hooks::{CompiledHook, DEFAULT_STEPS, HookSpec, InjectionHook, InjectionStep, NameSearch};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InjectionError {
    /// A tuning reference the pass cannot run without.
    #[error("dependent tuning missing: {what} {id}")]
    DependentTuningMissing { what: &'static str, id: TuningId },
    #[error("step {step} ran before the filter terms were resolved")]
    Unresolved { step: &'static str },
    #[error("hook {hook} has an invalid name search: {reason}")]
    InvalidSearch { hook: String, reason: String },
    #[error("hook {hook} failed: {reason}")]
    HookFailed { hook: String, reason: String },
    #[error("hook {0} registered after injection already ran")]
    LateHook(String),
}
