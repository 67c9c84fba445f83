// Navigation controller
//
// The effective sequence is the registry filtered by visibility. Every move is
// made by position in that sequence.

use super::{StoreState, WizardStore};
use crate::flows::WizardFlow;
use crate::models::state::StoreEvent;
use crate::models::steps::{StepDefinition, StepDescriptor};
use log::{info, warn};

impl<F: WizardFlow> StoreState<F> {
    pub(super) fn visible_descriptors(&self) -> Vec<&StepDescriptor<F::Step, F::Data>> {
        self.steps
            .iter()
            .filter(|d| d.is_visible(&self.form_data))
            .collect()
    }

    pub(super) fn visible_ids(&self) -> Vec<F::Step> {
        self.visible_descriptors().iter().map(|d| d.id).collect()
    }

    pub(super) fn is_visible(&self, step: F::Step) -> bool {
        self.steps
            .iter()
            .any(|d| d.id == step && d.is_visible(&self.form_data))
    }

    pub(super) fn current_position(&self, visible: &[F::Step]) -> usize {
        visible
            .iter()
            .position(|s| *s == self.navigation.current_step)
            .unwrap_or(0)
    }

    pub(super) fn can_navigate_to(&self, step: F::Step) -> bool {
        let visible = self.visible_descriptors();
        let Some(target) = visible.iter().position(|d| d.id == step) else {
            return false;
        };
        let current = visible
            .iter()
            .position(|d| d.id == self.navigation.current_step)
            .unwrap_or(0);
        if target <= current {
            return true;
        }
        visible[..target]
            .iter()
            .all(|d| !d.required || self.navigation.is_completed(d.id))
    }

    pub(super) fn refresh_navigation_flags(&mut self) {
        let visible = self.visible_ids();
        let pos = self.current_position(&visible);
        self.navigation.total_steps = visible.len();
        self.navigation.can_navigate_back = pos > 0;
        self.navigation.can_navigate_forward = pos + 1 < visible.len();
    }

    /// Keep `current_step` on a visible step. When an edit hides it, fall back
    /// to the nearest visible step before it in registry order.
    pub(super) fn reconcile_navigation(&mut self) -> Option<StoreEvent<F::Step>> {
        let from = self.navigation.current_step;
        let mut event = None;

        if !self.is_visible(from) {
            let idx = self
                .steps
                .iter()
                .position(|d| d.id == from)
                .unwrap_or(0);
            let to = self.steps[..idx]
                .iter()
                .rev()
                .find(|d| d.is_visible(&self.form_data))
                .map(|d| d.id)
                .unwrap_or(self.steps[0].id);
            info!(
                "[PHASE: navigation] [STEP: reconcile] Current step {} is no longer visible, moving to {}",
                from, to
            );
            self.navigation.current_step = to;
            event = Some(StoreEvent::StepChanged { from, to });
        }

        self.refresh_navigation_flags();
        event
    }

    fn move_to(&mut self, to: F::Step) -> Option<StoreEvent<F::Step>> {
        let from = self.navigation.current_step;
        self.navigation.current_step = to;
        self.refresh_navigation_flags();
        (from != to).then_some(StoreEvent::StepChanged { from, to })
    }
}

impl<F: WizardFlow> WizardStore<F> {
    /// Steps currently part of the sequence, numbered by position.
    pub fn visible_steps(&self) -> Vec<StepDefinition<F::Step>> {
        self.lock()
            .step_definitions()
            .into_iter()
            .filter(|d| d.number.is_some())
            .collect()
    }

    pub fn current_step(&self) -> F::Step {
        self.lock().navigation.current_step
    }

    /// Position of the current step within the visible steps (0-based).
    pub fn current_step_index(&self) -> usize {
        let st = self.lock();
        let visible = st.visible_ids();
        st.current_position(&visible)
    }

    /// Hidden steps are never reachable. Earlier (or the same) steps always
    /// are. A later step is reachable once every required visible step before
    /// it has been completed.
    pub fn can_navigate_to_step(&self, step: F::Step) -> bool {
        self.lock().can_navigate_to(step)
    }

    pub fn go_to_step(&self, step: F::Step) -> bool {
        let event = {
            let mut st = self.lock();
            if !st.is_visible(step) {
                warn!(
                    "[PHASE: navigation] [STEP: go_to] Step {} is not visible; staying on {}",
                    step, st.navigation.current_step
                );
                return false;
            }
            if !st.can_navigate_to(step) {
                warn!(
                    "[PHASE: navigation] [STEP: go_to] Step {} is locked until earlier required steps are complete",
                    step
                );
                return false;
            }
            st.move_to(step)
        };
        self.emit(event.into_iter().collect());
        true
    }

    /// Validate the current step, then advance one visible position.
    pub fn next_step(&self) -> bool {
        let (moved, events) = {
            let mut st = self.lock();
            let current = st.navigation.current_step;
            let result = st.run_step_validation(current);
            let mut events = vec![
                StoreEvent::StepValidated {
                    step: current,
                    valid: result.valid,
                },
                st.update_global_validation(),
            ];

            let visible = st.visible_ids();
            let pos = st.current_position(&visible);
            match visible.get(pos + 1).copied() {
                None => {
                    warn!(
                        "[PHASE: navigation] [STEP: next] Already on the last step ({})",
                        current
                    );
                    (false, events)
                }
                Some(target) if !st.can_navigate_to(target) => {
                    warn!(
                        "[PHASE: navigation] [STEP: next] Cannot leave {} (errors={})",
                        current,
                        result.errors.len()
                    );
                    (false, events)
                }
                Some(target) => {
                    events.extend(st.move_to(target));
                    (true, events)
                }
            }
        };
        self.emit(events);
        moved
    }

    pub fn previous_step(&self) -> bool {
        let event = {
            let mut st = self.lock();
            let visible = st.visible_ids();
            let pos = st.current_position(&visible);
            if pos == 0 {
                warn!(
                    "[PHASE: navigation] [STEP: previous] Already on the first step ({})",
                    st.navigation.current_step
                );
                return false;
            }
            st.move_to(visible[pos - 1])
        };
        self.emit(event.into_iter().collect());
        true
    }
}
