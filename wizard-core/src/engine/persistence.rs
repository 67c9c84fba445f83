// Draft orchestration
//
// The store decides when and what to save; the `DraftManager` decides how.
// Manual operations return their errors. Auto-saves only record them in
// `DraftState`.

use super::{shallow_merge, WizardStore};
use crate::drafts::codec;
use crate::error::{DraftError, WizardError};
use crate::flows::WizardFlow;
use crate::models::draft::{
    DraftMetadata, DraftNavigation, DraftSnapshot, ExportFormat, LoadDraftOptions,
    SaveDraftOptions, SaveStatus,
};
use crate::models::state::StoreEvent;
use chrono::Utc;
use log::{info, warn};
use serde_json::Value;

impl<F: WizardFlow> WizardStore<F> {
    /// Save the current form now. Overwrites the current draft when there is
    /// one. Errors propagate to the caller.
    pub async fn save_draft_to_storage(
        &self,
        title: Option<&str>,
        description: Option<&str>,
    ) -> Result<String, WizardError> {
        self.persist(title, description, false).await
    }

    /// Shared save path for manual and automatic saves. Only one save runs at
    /// a time; the snapshot is taken atomically when the save starts.
    pub(super) async fn persist(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        automatic: bool,
    ) -> Result<String, WizardError> {
        let (snapshot, options, revision) = {
            let mut st = self.lock();
            if st.draft.saving {
                return Err(WizardError::SaveInProgress);
            }

            let form_data = serde_json::to_value(&st.form_data).map_err(DraftError::from)?;
            let current_step =
                serde_json::to_value(st.navigation.current_step).map_err(DraftError::from)?;
            let snapshot = DraftSnapshot {
                flow: F::NAME.to_string(),
                form_data,
                navigation: DraftNavigation {
                    current_step,
                    total_steps: st.navigation.total_steps,
                },
            };
            let options = SaveDraftOptions {
                title: title
                    .map(str::to_string)
                    .or_else(|| F::draft_title(&st.form_data))
                    .unwrap_or_default(),
                description: description.unwrap_or_default().to_string(),
                draft_id: st.draft.current_draft_id.clone(),
            };

            if !automatic {
                // This save covers whatever the timers were waiting for.
                st.timers.cancel_all();
            }
            st.draft.saving = true;
            st.draft.save_status = SaveStatus::Saving;
            st.draft.save_error = None;
            (snapshot, options, st.revision)
        };

        let outcome = self.shared.drafts.save_draft(snapshot, options).await;

        let (events, follow_up) = {
            let mut st = self.lock();
            st.draft.saving = false;
            let event = match &outcome {
                Ok(id) => {
                    st.draft.has_draft = true;
                    st.draft.last_saved = Some(Utc::now());
                    st.draft.save_status = SaveStatus::Saved;
                    st.draft.current_draft_id = Some(id.clone());
                    st.saved_revision = st.saved_revision.max(revision);
                    if st.revision == revision {
                        st.validation.is_dirty = false;
                    }
                    StoreEvent::DraftSaved {
                        id: id.clone(),
                        automatic,
                    }
                }
                Err(e) => {
                    st.draft.save_status = SaveStatus::Error;
                    st.draft.save_error = Some(e.to_string());
                    StoreEvent::DraftSaveFailed {
                        message: e.to_string(),
                        automatic,
                    }
                }
            };
            let follow_up = st.draft.auto_save_enabled
                && (std::mem::take(&mut st.timers.pending) || st.revision != revision)
                && !st.timers.is_armed();
            (vec![event], follow_up)
        };

        match &outcome {
            Ok(id) => info!(
                "[PHASE: drafts] [STEP: save] Draft {} saved (automatic={}, revision={})",
                id, automatic, revision
            ),
            Err(e) => warn!(
                "[PHASE: drafts] [STEP: save] Draft save failed (automatic={}): {}",
                automatic, e
            ),
        }
        self.emit(events);

        if follow_up {
            self.schedule_auto_save();
        }
        if outcome.is_ok() {
            if let Err(e) = self.refresh_drafts().await {
                warn!(
                    "[PHASE: drafts] [STEP: list] Could not refresh draft list after save: {}",
                    e
                );
            }
        }
        outcome.map_err(WizardError::from)
    }

    /// Load a stored draft into the store.
    ///
    /// With `merge_with_current`, each section of the draft is laid over the
    /// current section key by key; otherwise the draft's form data replaces
    /// the form entirely. Restored form data also drops the completed-step
    /// set. The current step and every visible step before it are
    /// re-validated afterwards; later results are dropped.
    pub async fn load_draft(&self, id: &str, options: LoadDraftOptions) -> Result<(), WizardError> {
        let draft = self.shared.drafts.load_draft(id).await?;
        if draft.metadata.flow != F::NAME {
            return Err(WizardError::FlowMismatch {
                expected: F::NAME.to_string(),
                found: draft.metadata.flow,
            });
        }
        codec::check_version(draft.metadata.version)?;

        let restored_step: Option<F::Step> = if options.restore_step_position {
            match serde_json::from_value(draft.navigation.current_step.clone()) {
                Ok(step) => Some(step),
                Err(e) => {
                    warn!(
                        "[PHASE: drafts] [STEP: load] Draft {} has an unknown step {}: {}",
                        id, draft.navigation.current_step, e
                    );
                    None
                }
            }
        } else {
            None
        };

        let events = {
            let mut st = self.lock();

            if options.restore_form_data {
                let mut data: F::Data = if options.merge_with_current {
                    let mut doc = serde_json::to_value(&st.form_data).map_err(DraftError::from)?;
                    if let (Value::Object(current), Value::Object(loaded)) =
                        (&mut doc, draft.form_data.clone())
                    {
                        for (section, value) in loaded {
                            let base = current.remove(&section).unwrap_or(Value::Null);
                            current.insert(section, shallow_merge(base, value));
                        }
                    }
                    serde_json::from_value(doc).map_err(|e| {
                        DraftError::InvalidFormat(format!("draft {} does not fit the form: {}", id, e))
                    })?
                } else {
                    serde_json::from_value(draft.form_data.clone()).map_err(|e| {
                        DraftError::InvalidFormat(format!("draft {} does not fit the form: {}", id, e))
                    })?
                };
                F::normalize(&mut data);
                st.form_data = data;
                st.revision += 1;
                // Completion earned by the previous data is rebuilt below.
                st.navigation.completed_steps.clear();
            }

            let mut events = vec![StoreEvent::DraftLoaded { id: id.to_string() }];

            if let Some(step) = restored_step {
                if st.is_visible(step) {
                    let from = st.navigation.current_step;
                    st.navigation.current_step = step;
                    if from != step {
                        events.push(StoreEvent::StepChanged { from, to: step });
                    }
                } else {
                    warn!(
                        "[PHASE: drafts] [STEP: load] Saved step {} is hidden for the loaded data; keeping {}",
                        step, st.navigation.current_step
                    );
                }
            }
            events.extend(st.reconcile_navigation());

            // Results computed against the previous data are not trusted.
            st.validation.step_validation.clear();
            let visible = st.visible_ids();
            let pos = st.current_position(&visible);
            for step in visible.into_iter().take(pos + 1) {
                let result = st.run_step_validation(step);
                events.push(StoreEvent::StepValidated {
                    step,
                    valid: result.valid,
                });
            }
            events.push(st.update_global_validation());

            st.timers.cancel_all();
            st.saved_revision = st.revision;
            st.validation.is_dirty = false;
            st.draft.has_draft = true;
            st.draft.current_draft_id = Some(draft.metadata.id.clone());
            st.draft.last_saved = Some(draft.metadata.updated_at);
            st.draft.save_error = None;
            events
        };

        info!(
            "[PHASE: drafts] [STEP: load] Draft {} loaded (merge={}, restore_step={})",
            id, options.merge_with_current, options.restore_step_position
        );
        self.emit(events);
        Ok(())
    }

    pub async fn delete_draft(&self, id: &str) -> Result<(), WizardError> {
        self.shared.drafts.delete_draft(id).await?;
        {
            let mut st = self.lock();
            st.draft.available_drafts.retain(|m| m.id != id);
            if st.draft.current_draft_id.as_deref() == Some(id) {
                st.draft.current_draft_id = None;
                st.draft.has_draft = false;
            }
        }
        info!("[PHASE: drafts] [STEP: delete] Draft {} deleted", id);
        self.emit(vec![StoreEvent::DraftDeleted { id: id.to_string() }]);
        if let Err(e) = self.refresh_drafts().await {
            warn!(
                "[PHASE: drafts] [STEP: list] Could not refresh draft list after delete: {}",
                e
            );
        }
        Ok(())
    }

    /// Reload the draft list and storage usage into `DraftState`.
    pub async fn refresh_drafts(&self) -> Result<Vec<DraftMetadata>, WizardError> {
        let list = self.shared.drafts.draft_metadata().await?;
        let info = self.shared.drafts.storage_info().await?;
        {
            let mut st = self.lock();
            st.draft.available_drafts = list.clone();
            st.draft.storage_info = Some(info);
        }
        self.emit(vec![StoreEvent::DraftsRefreshed { count: list.len() }]);
        Ok(list)
    }

    pub async fn export_draft(&self, id: &str, format: ExportFormat) -> Result<String, WizardError> {
        Ok(self.shared.drafts.export_draft(id, format).await?)
    }

    /// Import an exported draft as a new stored draft. The form is not touched;
    /// call `load_draft` with the returned id to open it.
    pub async fn import_draft(&self, data: &str, format: ExportFormat) -> Result<String, WizardError> {
        let id = self.shared.drafts.import_draft(data, format).await?;
        if let Err(e) = self.refresh_drafts().await {
            warn!(
                "[PHASE: drafts] [STEP: list] Could not refresh draft list after import: {}",
                e
            );
        }
        Ok(id)
    }
}
