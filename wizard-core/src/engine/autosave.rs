// Auto-save scheduler
//
// Two named timers per edit burst:
//   - debounce: restarted on every edit, fires after the quiet period;
//   - fallback: armed by the first edit of a burst and never restarted, so
//     continuous typing still gets saved every `interval_ms`.
// Whichever fires first disarms the other. A firing timer removes its own
// handle under the state lock before saving, so a later edit can never abort
// a save in progress.

use super::{Shared, WizardStore};
use crate::flows::WizardFlow;
use crate::models::state::StoreEvent;
use log::{debug, info, warn};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TimerKind {
    Debounce,
    Fallback,
}

#[derive(Debug, Default)]
pub(super) struct AutoSaveTimers {
    debounce: Option<(u64, JoinHandle<()>)>,
    fallback: Option<(u64, JoinHandle<()>)>,
    next_id: u64,
    /// A timer fired while a save was running.
    pub(super) pending: bool,
}

impl AutoSaveTimers {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub(super) fn is_armed(&self) -> bool {
        self.debounce.is_some() || self.fallback.is_some()
    }

    pub(super) fn cancel_all(&mut self) {
        if let Some((_, h)) = self.debounce.take() {
            h.abort();
        }
        if let Some((_, h)) = self.fallback.take() {
            h.abort();
        }
        self.pending = false;
    }

    /// Claim a firing timer. Returns false when it was superseded or cancelled
    /// in the meantime. On success the other timer is disarmed.
    fn claim(&mut self, kind: TimerKind, id: u64) -> bool {
        let (own, other) = match kind {
            TimerKind::Debounce => (&mut self.debounce, &mut self.fallback),
            TimerKind::Fallback => (&mut self.fallback, &mut self.debounce),
        };
        match own {
            Some((current, _)) if *current == id => {}
            _ => return false,
        }
        // Dropping our own handle detaches it; the task keeps running.
        own.take();
        if let Some((_, h)) = other.take() {
            h.abort();
        }
        true
    }
}

fn spawn_timer<F: WizardFlow>(
    rt: &Handle,
    shared: Weak<Shared<F>>,
    kind: TimerKind,
    id: u64,
    delay: Duration,
) -> JoinHandle<()> {
    rt.spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        WizardStore { shared }.on_timer_fired(kind, id).await;
    })
}

impl<F: WizardFlow> WizardStore<F> {
    /// Arm the debounce timer (restarting it) and, if this is the first edit
    /// of a burst, the fallback timer.
    pub(super) fn schedule_auto_save(&self) {
        let settings = &self.shared.auto_save;
        let rt = match Handle::try_current() {
            Ok(rt) => rt,
            Err(_) => {
                if self.lock().draft.auto_save_enabled {
                    warn!("[PHASE: drafts] [STEP: autosave] No async runtime available; auto-save not scheduled");
                }
                return;
            }
        };

        let mut st = self.lock();
        if !st.draft.auto_save_enabled {
            return;
        }

        let id = st.timers.next_id();
        if let Some((_, h)) = st.timers.debounce.take() {
            h.abort();
        }
        let weak = Arc::downgrade(&self.shared);
        st.timers.debounce = Some((
            id,
            spawn_timer(&rt, weak.clone(), TimerKind::Debounce, id, settings.debounce()),
        ));

        if st.timers.fallback.is_none() {
            let id = st.timers.next_id();
            st.timers.fallback = Some((
                id,
                spawn_timer(&rt, weak, TimerKind::Fallback, id, settings.interval()),
            ));
            debug!(
                "[PHASE: drafts] [STEP: autosave] Burst started (debounce_ms={}, interval_ms={})",
                settings.debounce_ms, settings.interval_ms
            );
        }
    }

    async fn on_timer_fired(&self, kind: TimerKind, id: u64) {
        let proceed = {
            let mut st = self.lock();
            if !st.timers.claim(kind, id) {
                return;
            }
            if !st.draft.auto_save_enabled {
                return;
            }
            if st.draft.saving {
                // Picked up once the running save finishes.
                st.timers.pending = true;
                false
            } else {
                true
            }
        };
        if !proceed {
            debug!(
                "[PHASE: drafts] [STEP: autosave] {:?} timer fired during a save; follow-up queued",
                kind
            );
            return;
        }

        debug!("[PHASE: drafts] [STEP: autosave] {:?} timer fired", kind);
        if let Err(e) = self.persist(None, None, true).await {
            // Recorded in DraftState by `persist`; nothing to propagate.
            warn!("[PHASE: drafts] [STEP: autosave] Auto-save failed: {}", e);
        }
    }

    pub fn enable_auto_save(&self) {
        let dirty = {
            let mut st = self.lock();
            if st.draft.auto_save_enabled {
                return;
            }
            st.draft.auto_save_enabled = true;
            st.revision != st.saved_revision
        };
        info!("[PHASE: drafts] [STEP: autosave] Auto-save enabled");
        self.emit(vec![StoreEvent::AutoSaveToggled { enabled: true }]);
        if dirty {
            self.schedule_auto_save();
        }
    }

    pub fn disable_auto_save(&self) {
        {
            let mut st = self.lock();
            if !st.draft.auto_save_enabled {
                return;
            }
            st.draft.auto_save_enabled = false;
            st.timers.cancel_all();
        }
        info!("[PHASE: drafts] [STEP: autosave] Auto-save disabled");
        self.emit(vec![StoreEvent::AutoSaveToggled { enabled: false }]);
    }

    /// True while a debounce or fallback timer is waiting to fire.
    pub fn auto_save_pending(&self) -> bool {
        self.lock().timers.is_armed()
    }
}
