// Wizard flows
//
// A flow is the static half of a wizard: its ordered step registry, its form
// data type and one validator per step. The engine is generic over this trait,
// so the project-creation wizard and the API-request wizard share every bit of
// navigation, validation bookkeeping, draft and execution logic.

pub mod api_request;
pub mod project;

use crate::models::steps::StepDescriptor;
use crate::models::validation::StepValidationResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Uniform validator signature. Validators are pure: same data, same result.
pub type StepValidator<D> = fn(&D) -> StepValidationResult;

pub trait WizardFlow: Send + Sync + 'static {
    type Step: Copy
        + Eq
        + Hash
        + Debug
        + Display
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    type Data: Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    /// Stable flow name, recorded in drafts and results.
    const NAME: &'static str;

    /// Ordered step registry. The first entry must be unconditional.
    fn steps() -> Vec<StepDescriptor<Self::Step, Self::Data>>;

    /// Validator for a step. Implementations match exhaustively on the step enum.
    fn validator(step: Self::Step) -> StepValidator<Self::Data>;

    /// Enforce structural invariants after an edit (e.g. add/remove optional
    /// sections). Default: nothing to do.
    fn normalize(_data: &mut Self::Data) {}

    /// Human title used when a draft is saved without one.
    fn draft_title(data: &Self::Data) -> Option<String>;

    /// Flow-specific summary attached to an execution result.
    fn summarize(data: &Self::Data) -> serde_json::Value {
        serde_json::to_value(data).unwrap_or(serde_json::Value::Null)
    }

    /// Name used to build the resource URL of a created project.
    fn resource_name(data: &Self::Data) -> Option<String> {
        Self::draft_title(data)
    }
}
