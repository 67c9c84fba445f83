// Store state snapshot and change events
//
// NOTE: The store is the only writer. Callers read cloned snapshots and learn
// about changes by subscribing to `StoreEvent`s.

use super::draft::DraftState;
use super::execution::{ExecutionState, ExecutionStatus};
use super::navigation::NavigationState;
use super::validation::ValidationState;
use serde::Serialize;
use std::hash::Hash;

/// Full read-only copy of the store, taken under one lock.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot<S: Eq + Hash, D> {
    pub form_data: D,
    pub navigation: NavigationState<S>,
    pub validation: ValidationState<S>,
    pub draft: DraftState,
    pub execution: ExecutionState,
}

/// Change notifications broadcast by the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StoreEvent<S> {
    FormChanged { section: String, revision: u64 },
    FormReset,
    StepChanged { from: S, to: S },
    StepValidated { step: S, valid: bool },
    GlobalValidationChanged { valid: bool, can_proceed: bool },
    AutoSaveToggled { enabled: bool },
    DraftSaved { id: String, automatic: bool },
    DraftSaveFailed { message: String, automatic: bool },
    DraftLoaded { id: String },
    DraftDeleted { id: String },
    DraftsRefreshed { count: usize },
    ExecutionStatusChanged { status: ExecutionStatus },
    ExecutionProgress { percent: u8, message: String },
}
