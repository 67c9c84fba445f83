// Step registry types
//
// A flow declares its steps once, in order. Conditional steps carry a visibility
// predicate evaluated against the current form data; there is no numeric id
// arithmetic anywhere, the sequence is always "registry order filtered by
// visibility".

use serde::Serialize;

/// Predicate deciding whether a conditional step is part of the visible sequence.
pub type VisibilityPredicate<D> = fn(&D) -> bool;

/// Static declaration of one wizard step.
#[derive(Debug, Clone)]
pub struct StepDescriptor<S, D> {
    pub id: S,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub icon: &'static str,
    /// Name of the form data section this step collects (serde field name).
    pub section: &'static str,
    pub required: bool,
    pub visible_when: Option<VisibilityPredicate<D>>,
}

impl<S: Copy, D> StepDescriptor<S, D> {
    pub fn new(
        id: S,
        title: &'static str,
        subtitle: &'static str,
        icon: &'static str,
        section: &'static str,
    ) -> Self {
        Self {
            id,
            title,
            subtitle,
            icon,
            section,
            required: true,
            visible_when: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn visible_when(mut self, predicate: VisibilityPredicate<D>) -> Self {
        self.visible_when = Some(predicate);
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.visible_when.is_some()
    }

    pub fn is_visible(&self, data: &D) -> bool {
        self.visible_when.map_or(true, |visible| visible(data))
    }
}

/// Runtime view of a step, as handed to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition<S> {
    pub id: S,
    /// 1-based position among the currently visible steps; `None` while hidden.
    pub number: Option<usize>,
    pub title: String,
    pub subtitle: String,
    pub icon: String,
    pub section: String,
    pub required: bool,
    pub conditional: bool,
    pub completed: bool,
    pub valid: bool,
}
