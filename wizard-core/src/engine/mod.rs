// Wizard store
//
// `WizardStore<F>` owns every piece of wizard state for one flow: form data,
// navigation, validation, draft bookkeeping and execution. It is the only
// mutator; callers read cloned snapshots and subscribe to `StoreEvent`s.
//
// State sits behind a std mutex that is never held across an `.await`.
// Background work (auto-save timers, execution progress) holds a weak
// reference and upgrades it when it fires.

mod autosave;
pub mod execution;
mod navigation;
mod persistence;
mod validation;

pub use execution::{ExecutionBackend, ExecutionRequest, ProgressEmitter, ProgressSink, SimulatedBackend};

use crate::config::AutoSaveSettings;
use crate::drafts::DraftManager;
use crate::error::WizardError;
use crate::flows::WizardFlow;
use crate::models::draft::DraftState;
use crate::models::execution::{ExecutionState, ExecutionStatus};
use crate::models::navigation::NavigationState;
use crate::models::state::{StoreEvent, WizardSnapshot};
use crate::models::steps::{StepDefinition, StepDescriptor};
use crate::models::validation::ValidationState;
use autosave::AutoSaveTimers;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

const EVENT_CAPACITY: usize = 256;

pub struct WizardStore<F: WizardFlow> {
    shared: Arc<Shared<F>>,
}

impl<F: WizardFlow> Clone for WizardStore<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

struct Shared<F: WizardFlow> {
    state: Mutex<StoreState<F>>,
    drafts: Arc<dyn DraftManager>,
    backend: Arc<dyn ExecutionBackend>,
    events: broadcast::Sender<StoreEvent<F::Step>>,
    auto_save: AutoSaveSettings,
}

struct StoreState<F: WizardFlow> {
    steps: Vec<StepDescriptor<F::Step, F::Data>>,
    form_data: F::Data,
    navigation: NavigationState<F::Step>,
    validation: ValidationState<F::Step>,
    draft: DraftState,
    execution: ExecutionState,
    /// Bumped on every form mutation; lets saves detect edits made while in flight.
    revision: u64,
    /// Revision captured by the last successful save.
    saved_revision: u64,
    timers: AutoSaveTimers,
    cancel: Option<CancellationToken>,
}

impl<F: WizardFlow> StoreState<F> {
    fn new(auto_save: &AutoSaveSettings) -> Self {
        let steps = F::steps();
        assert!(!steps.is_empty(), "wizard flow {} declares no steps", F::NAME);

        let mut form_data = F::Data::default();
        F::normalize(&mut form_data);
        let first = steps[0].id;
        let visible = steps.iter().filter(|d| d.is_visible(&form_data)).count();

        Self {
            steps,
            form_data,
            navigation: NavigationState::new(first, visible),
            validation: ValidationState::default(),
            draft: DraftState::new(auto_save.enabled, auto_save.interval_ms),
            execution: ExecutionState::default(),
            revision: 0,
            saved_revision: 0,
            timers: AutoSaveTimers::default(),
            cancel: None,
        }
    }

    fn has_section(&self, section: &str) -> bool {
        self.steps.iter().any(|d| d.section == section)
    }

    /// Install edited form data and run everything an edit implies:
    /// normalization, validation of the edited section, visibility
    /// reconciliation and global aggregation.
    fn commit_edit(&mut self, section: &str, mut data: F::Data) -> Vec<StoreEvent<F::Step>> {
        let visible_before = self.visible_ids();

        F::normalize(&mut data);
        self.form_data = data;
        self.revision += 1;
        self.validation.is_dirty = true;

        let mut events = vec![StoreEvent::FormChanged {
            section: section.to_string(),
            revision: self.revision,
        }];

        let mut targets: Vec<F::Step> = self
            .steps
            .iter()
            .filter(|d| d.section == section)
            .map(|d| d.id)
            .collect();

        // A step that just reappeared carries a result computed against older data.
        for step in self.visible_ids() {
            if !visible_before.contains(&step)
                && self.validation.step_validation.contains_key(&step)
                && !targets.contains(&step)
            {
                targets.push(step);
            }
        }

        for step in targets {
            let result = self.run_step_validation(step);
            events.push(StoreEvent::StepValidated {
                step,
                valid: result.valid,
            });
        }

        if let Some(moved) = self.reconcile_navigation() {
            events.push(moved);
        }
        events.push(self.update_global_validation());
        events
    }

    fn step_definitions(&self) -> Vec<StepDefinition<F::Step>> {
        let mut number = 0;
        self.steps
            .iter()
            .map(|d| {
                let visible = d.is_visible(&self.form_data);
                if visible {
                    number += 1;
                }
                StepDefinition {
                    id: d.id,
                    number: visible.then_some(number),
                    title: d.title.to_string(),
                    subtitle: d.subtitle.to_string(),
                    icon: d.icon.to_string(),
                    section: d.section.to_string(),
                    required: d.required,
                    conditional: d.is_conditional(),
                    completed: self.navigation.is_completed(d.id),
                    valid: self
                        .validation
                        .step_validation
                        .get(&d.id)
                        .map_or(false, |r| r.valid),
                }
            })
            .collect()
    }
}

impl<F: WizardFlow> WizardStore<F> {
    pub fn new(
        drafts: Arc<dyn DraftManager>,
        backend: Arc<dyn ExecutionBackend>,
        auto_save: AutoSaveSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = StoreState::new(&auto_save);
        info!(
            "[PHASE: store] [STEP: init] Wizard store created (flow={}, steps={}, auto_save={}, debounce_ms={}, interval_ms={})",
            F::NAME,
            state.steps.len(),
            auto_save.enabled,
            auto_save.debounce_ms,
            auto_save.interval_ms
        );
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                drafts,
                backend,
                events,
                auto_save,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState<F>> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, events: Vec<StoreEvent<F::Step>>) {
        for event in events {
            // No subscribers is fine.
            let _ = self.shared.events.send(event);
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent<F::Step>> {
        self.shared.events.subscribe()
    }

    pub fn flow_name(&self) -> &'static str {
        F::NAME
    }

    // =========================
    // Read-only views
    // =========================

    pub fn form_data(&self) -> F::Data {
        self.lock().form_data.clone()
    }

    pub fn navigation(&self) -> NavigationState<F::Step> {
        self.lock().navigation.clone()
    }

    pub fn validation(&self) -> ValidationState<F::Step> {
        self.lock().validation.clone()
    }

    pub fn draft(&self) -> DraftState {
        self.lock().draft.clone()
    }

    pub fn execution(&self) -> ExecutionState {
        self.lock().execution.clone()
    }

    pub fn snapshot(&self) -> WizardSnapshot<F::Step, F::Data> {
        let st = self.lock();
        WizardSnapshot {
            form_data: st.form_data.clone(),
            navigation: st.navigation.clone(),
            validation: st.validation.clone(),
            draft: st.draft.clone(),
            execution: st.execution.clone(),
        }
    }

    /// Every registered step, hidden ones included (with `number: None`).
    pub fn steps(&self) -> Vec<StepDefinition<F::Step>> {
        self.lock().step_definitions()
    }

    pub fn revision(&self) -> u64 {
        self.lock().revision
    }

    // =========================
    // Form mutation
    // =========================

    /// Shallow-merge `patch` into one form section: keys present in the patch
    /// overwrite, others are kept. A non-object patch replaces the section.
    pub fn update_form_data(&self, section: &str, patch: Value) -> Result<(), WizardError> {
        let events = {
            let mut st = self.lock();
            if !st.has_section(section) {
                warn!(
                    "[PHASE: store] [STEP: update] Ignoring update for unknown section '{}' (flow={})",
                    section,
                    F::NAME
                );
                return Err(WizardError::UnknownSection(section.to_string()));
            }
            let data = merge_section::<F>(&st.form_data, section, patch)?;
            st.commit_edit(section, data)
        };
        debug!("[PHASE: store] [STEP: update] Section '{}' updated", section);
        self.emit(events);
        self.schedule_auto_save();
        Ok(())
    }

    /// Typed alternative to `update_form_data`: edit the form data in place.
    /// `section` names the section being edited so the right steps revalidate.
    pub fn update_form_data_with<R>(
        &self,
        section: &str,
        edit: impl FnOnce(&mut F::Data) -> R,
    ) -> Result<R, WizardError> {
        let (events, out) = {
            let mut st = self.lock();
            if !st.has_section(section) {
                warn!(
                    "[PHASE: store] [STEP: update] Ignoring update for unknown section '{}' (flow={})",
                    section,
                    F::NAME
                );
                return Err(WizardError::UnknownSection(section.to_string()));
            }
            let mut data = st.form_data.clone();
            let out = edit(&mut data);
            (st.commit_edit(section, data), out)
        };
        self.emit(events);
        self.schedule_auto_save();
        Ok(out)
    }

    /// Back to a blank form on the first step. Completed steps, validation
    /// results and the current draft association are cleared; the list of
    /// stored drafts is kept.
    pub fn reset_form(&self) {
        let events = {
            let mut st = self.lock();
            st.timers.cancel_all();

            let mut form_data = F::Data::default();
            F::normalize(&mut form_data);
            let first = st.steps[0].id;
            let visible = st.steps.iter().filter(|d| d.is_visible(&form_data)).count();

            st.form_data = form_data;
            st.navigation = NavigationState::new(first, visible);
            st.validation = ValidationState::default();
            st.revision += 1;
            st.saved_revision = st.revision;
            st.draft.has_draft = false;
            st.draft.current_draft_id = None;
            st.draft.save_error = None;
            if !st.execution.status.is_running() {
                st.execution = ExecutionState::default();
            }
            vec![StoreEvent::FormReset]
        };
        info!("[PHASE: store] [STEP: reset] Form reset (flow={})", F::NAME);
        self.emit(events);
    }

    pub fn can_execute_project(&self) -> bool {
        self.lock().execution_readiness().is_ok()
    }
}

/// JSON-level shallow merge of one section, then back to typed data.
fn merge_section<F: WizardFlow>(
    current: &F::Data,
    section: &str,
    patch: Value,
) -> Result<F::Data, WizardError> {
    let invalid = |source| WizardError::InvalidSectionData {
        section: section.to_string(),
        source,
    };

    let mut doc = serde_json::to_value(current).map_err(invalid)?;
    if let Value::Object(map) = &mut doc {
        let existing = map.remove(section).unwrap_or(Value::Null);
        map.insert(section.to_string(), shallow_merge(existing, patch));
    }
    serde_json::from_value(doc).map_err(invalid)
}

/// `Object.assign`-style merge: object onto object overwrites per key,
/// anything else replaces.
pub(crate) fn shallow_merge(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (k, v) in patch {
                base.insert(k, v);
            }
            Value::Object(base)
        }
        (_, patch) => patch,
    }
}

impl<F: WizardFlow> StoreState<F> {
    fn execution_readiness(&self) -> Result<(), String> {
        if self.execution.status != ExecutionStatus::Idle {
            return Err(format!(
                "execution is {:?}; clear the previous result first",
                self.execution.status
            ));
        }
        if !self.validation.global_validation.can_proceed {
            let missing: Vec<String> = self
                .visible_descriptors()
                .into_iter()
                .filter(|d| d.required && !self.navigation.is_completed(d.id))
                .map(|d| d.id.to_string())
                .collect();
            return Err(format!("incomplete steps: {}", missing.join(", ")));
        }
        Ok(())
    }
}
