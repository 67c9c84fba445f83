// Validation bookkeeping
//
// Validators themselves are pure functions owned by the flow. This module
// records their results, maintains the completed-step set and derives the
// global result. Only visible steps count towards totals.

use super::{StoreState, WizardStore};
use crate::flows::WizardFlow;
use crate::models::state::StoreEvent;
use crate::models::validation::{GlobalValidationResult, StepValidationResult};
use log::debug;

impl<F: WizardFlow> StoreState<F> {
    /// Validate one step against the current data and record the result.
    /// Hidden steps pass without running their validator and are never marked
    /// completed.
    pub(super) fn run_step_validation(&mut self, step: F::Step) -> StepValidationResult {
        let visible = self.is_visible(step);
        let result = if visible {
            F::validator(step)(&self.form_data)
        } else {
            StepValidationResult::pass()
        };

        if visible && result.valid && self.navigation.mark_completed(step) {
            debug!(
                "[PHASE: validation] [STEP: {}] Step completed for the first time",
                step
            );
        }
        self.validation
            .step_validation
            .insert(step, result.clone());
        result
    }

    pub(super) fn update_global_validation(&mut self) -> StoreEvent<F::Step> {
        let (can_proceed, total_errors, total_warnings) = {
            let visible = self.visible_descriptors();
            let can_proceed = visible
                .iter()
                .filter(|d| d.required)
                .all(|d| self.navigation.is_completed(d.id));
            let (errors, warnings) = visible
                .iter()
                .filter_map(|d| self.validation.step_validation.get(&d.id))
                .fold((0, 0), |(e, w), r| (e + r.errors.len(), w + r.warnings.len()));
            (can_proceed, errors, warnings)
        };

        self.validation.global_validation = GlobalValidationResult {
            valid: can_proceed && total_errors == 0,
            completed_steps: self.navigation.completed_steps.clone(),
            total_errors,
            total_warnings,
            can_proceed,
        };
        StoreEvent::GlobalValidationChanged {
            valid: self.validation.global_validation.valid,
            can_proceed,
        }
    }

    /// Validate every visible step. Returns the global `valid` flag.
    pub(super) fn validate_all_visible(&mut self) -> (bool, Vec<StoreEvent<F::Step>>) {
        let mut events = Vec::new();
        for step in self.visible_ids() {
            let result = self.run_step_validation(step);
            events.push(StoreEvent::StepValidated {
                step,
                valid: result.valid,
            });
        }
        events.push(self.update_global_validation());
        (self.validation.global_validation.valid, events)
    }
}

impl<F: WizardFlow> WizardStore<F> {
    pub fn validate_step(&self, step: F::Step) -> StepValidationResult {
        let (result, events) = {
            let mut st = self.lock();
            let result = st.run_step_validation(step);
            let global = st.update_global_validation();
            let events = vec![
                StoreEvent::StepValidated {
                    step,
                    valid: result.valid,
                },
                global,
            ];
            (result, events)
        };
        self.emit(events);
        result
    }

    pub fn validate_current_step(&self) -> StepValidationResult {
        let step = self.current_step();
        self.validate_step(step)
    }

    /// Validate every visible step and return whether the whole form is valid.
    pub fn validate_form(&self) -> bool {
        let (valid, events) = self.lock().validate_all_visible();
        self.emit(events);
        valid
    }

    /// Global `valid` flag as of the last validation.
    pub fn is_form_valid(&self) -> bool {
        self.lock().validation.global_validation.valid
    }
}
