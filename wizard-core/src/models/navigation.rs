use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState<S> {
    pub current_step: S,
    /// Insertion-ordered; a step is never removed once added (except by a form reset).
    pub completed_steps: Vec<S>,
    /// Number of currently visible steps.
    pub total_steps: usize,
    pub can_navigate_back: bool,
    pub can_navigate_forward: bool,
}

impl<S: Copy + PartialEq> NavigationState<S> {
    pub fn new(first_step: S, total_steps: usize) -> Self {
        Self {
            current_step: first_step,
            completed_steps: Vec::new(),
            total_steps,
            can_navigate_back: false,
            can_navigate_forward: total_steps > 1,
        }
    }

    pub fn is_completed(&self, step: S) -> bool {
        self.completed_steps.contains(&step)
    }

    /// Returns true when the step was newly added.
    pub fn mark_completed(&mut self, step: S) -> bool {
        if self.is_completed(step) {
            return false;
        }
        self.completed_steps.push(step);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_completed_keeps_a_set() {
        let mut nav = NavigationState::new(1u8, 3);
        assert!(nav.mark_completed(2));
        assert!(nav.mark_completed(1));
        assert!(!nav.mark_completed(2));
        assert_eq!(nav.completed_steps, vec![2, 1]);
    }

    #[test]
    fn single_step_flow_cannot_move_forward() {
        let nav = NavigationState::new(1u8, 1);
        assert!(!nav.can_navigate_back);
        assert!(!nav.can_navigate_forward);
    }
}
