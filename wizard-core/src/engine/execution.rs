// Execution controller
//
// idle -> preparing -> executing -> success | error | cancelled
//
// Each run gets its own CancellationToken. The progress sink drops writes once
// the token is cancelled, and the store checks the token under the same lock
// that `cancel_execution` takes, so nothing is written after a cancel.

use super::WizardStore;
use crate::config::ExecutionSettings;
use crate::error::{ExecutionError, WizardError};
use crate::flows::WizardFlow;
use crate::models::execution::{
    ExecutionFailure, ExecutionLogEntry, ExecutionOptions, ExecutionState, ExecutionStatus,
    LogStatus, ProgressPayload, ProjectCreationResult, ResultMetadata,
};
use crate::models::state::StoreEvent;
use crate::utils::validation::slugify;
use async_trait::async_trait;
use chrono::Utc;
use log::{error, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;

pub type ProgressEmitter = Arc<dyn Fn(ProgressPayload) + Send + Sync>;

/// What a backend needs to create the resource.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub flow: String,
    pub correlation_id: String,
    /// Human name of the resource, used for its URL slug.
    pub resource_name: Option<String>,
    pub summary: serde_json::Value,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Progress channel handed to a backend. Reports after cancellation are dropped.
#[derive(Clone)]
pub struct ProgressSink {
    correlation_id: String,
    cancel: CancellationToken,
    emit: ProgressEmitter,
    started: Instant,
}

impl ProgressSink {
    pub fn new(correlation_id: String, cancel: CancellationToken, emit: ProgressEmitter) -> Self {
        Self {
            correlation_id,
            cancel,
            emit,
            started: Instant::now(),
        }
    }

    pub fn report(&self, step: &str, percent: u8, message: impl Into<String>) {
        if self.cancel.is_cancelled() {
            return;
        }
        (self.emit)(ProgressPayload {
            correlation_id: self.correlation_id.clone(),
            step: step.to_string(),
            percent: percent.min(100),
            message: message.into(),
            elapsed_ms: Some(self.started.elapsed().as_millis()),
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_cancel(&self) -> Result<(), ExecutionError> {
        if self.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        Ok(())
    }
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(
        &self,
        request: ExecutionRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ProjectCreationResult, ExecutionError>;
}

/// Stand-in backend: ticks progress up to 100% and fabricates the created
/// resource.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    tick_delay: Duration,
    increment: u8,
    base_url: String,
}

impl SimulatedBackend {
    pub fn new(tick_delay: Duration, increment: u8, base_url: impl Into<String>) -> Self {
        Self {
            tick_delay,
            increment: increment.clamp(1, 100),
            base_url: base_url.into(),
        }
    }

    pub fn from_settings(settings: &ExecutionSettings) -> Self {
        Self::new(
            Duration::from_millis(settings.tick_delay_ms),
            settings.progress_increment,
            settings.base_url.clone(),
        )
    }
}

fn phase_for(percent: u8) -> (&'static str, &'static str) {
    match percent {
        0..=24 => ("validate", "Validating configuration"),
        25..=59 => ("provision", "Provisioning resources"),
        60..=89 => ("configure", "Configuring access"),
        _ => ("finalize", "Finalizing project"),
    }
}

fn log_entry(step: &str, status: LogStatus, message: impl Into<String>) -> ExecutionLogEntry {
    ExecutionLogEntry {
        step: step.to_string(),
        status,
        message: message.into(),
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl ExecutionBackend for SimulatedBackend {
    async fn execute(
        &self,
        request: ExecutionRequest,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<ProjectCreationResult, ExecutionError> {
        let started = Instant::now();
        let mut log = Vec::new();
        let mut percent: u8 = 0;
        let mut phase = phase_for(0);
        log.push(log_entry(phase.0, LogStatus::Started, phase.1));

        while percent < 100 {
            tokio::select! {
                _ = cancel.cancelled() => {
                    warn!(
                        "[PHASE: execution] [STEP: {}] Simulated run cancelled at {}% (correlation_id={})",
                        phase.0, percent, request.correlation_id
                    );
                    return Err(ExecutionError::Cancelled);
                }
                _ = sleep(self.tick_delay) => {}
            }

            percent = percent.saturating_add(self.increment).min(100);
            let next = phase_for(percent);
            if next.0 != phase.0 {
                log.push(log_entry(phase.0, LogStatus::Completed, format!("{} done", phase.1)));
                log.push(log_entry(next.0, LogStatus::Started, next.1));
                phase = next;
            }
            progress.report(phase.0, percent, format!("{} ({}%)", phase.1, percent));
        }
        log.push(log_entry(phase.0, LogStatus::Completed, format!("{} done", phase.1)));

        let slug = request
            .resource_name
            .as_deref()
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "project".to_string());
        let project_id = uuid::Uuid::new_v4().to_string();

        Ok(ProjectCreationResult {
            url: format!("{}/projects/{}", self.base_url.trim_end_matches('/'), slug),
            project_id,
            status: "created".to_string(),
            metadata: ResultMetadata {
                flow: request.flow,
                correlation_id: request.correlation_id,
                created_at: Utc::now(),
                duration_ms: started.elapsed().as_millis(),
                attempts: request.attempt,
                execution_log: log,
                summary: request.summary,
            },
        })
    }
}

impl<F: WizardFlow> WizardStore<F> {
    /// Progress writer bound to one run: drops reports once the run is
    /// cancelled or no longer executing, and never lets progress go backwards.
    fn progress_emitter(&self, token: CancellationToken) -> ProgressEmitter {
        let weak = Arc::downgrade(&self.shared);
        Arc::new(move |p: ProgressPayload| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let store = WizardStore { shared };
            let event = {
                let mut st = store.lock();
                if token.is_cancelled() || st.execution.status != ExecutionStatus::Executing {
                    return;
                }
                st.execution.progress = st.execution.progress.max(p.percent.min(100));
                st.execution.message = p.message.clone();
                StoreEvent::ExecutionProgress {
                    percent: st.execution.progress,
                    message: p.message,
                }
            };
            store.emit(vec![event]);
        })
    }

    /// Record a terminal error unless the run was cancelled meanwhile.
    fn fail_execution(&self, token: &CancellationToken, message: String, transient: bool) {
        let event = {
            let mut st = self.lock();
            if token.is_cancelled() {
                return;
            }
            st.execution.status = ExecutionStatus::Error;
            st.execution.message = message.clone();
            st.execution.error = Some(ExecutionFailure {
                message,
                transient,
                at: Utc::now(),
            });
            st.cancel = None;
            StoreEvent::ExecutionStatusChanged {
                status: ExecutionStatus::Error,
            }
        };
        self.emit(vec![event]);
    }

    pub async fn execute_project(
        &self,
        options: ExecutionOptions,
    ) -> Result<ProjectCreationResult, WizardError> {
        let token = CancellationToken::new();
        let correlation_id = uuid::Uuid::new_v4().to_string();

        {
            let mut st = self.lock();
            if let Err(reason) = st.execution_readiness() {
                warn!(
                    "[PHASE: execution] [STEP: guard] Refusing to execute {}: {}",
                    F::NAME,
                    reason
                );
                return Err(WizardError::NotReady(reason));
            }
            st.execution = ExecutionState {
                status: ExecutionStatus::Preparing,
                progress: 0,
                message: "Preparing".to_string(),
                result: None,
                error: None,
            };
            st.cancel = Some(token.clone());
        }
        self.emit(vec![StoreEvent::ExecutionStatusChanged {
            status: ExecutionStatus::Preparing,
        }]);
        info!(
            "[PHASE: execution] [STEP: prepare] Starting {} execution (correlation_id={}, validate={}, retry_attempts={})",
            F::NAME, correlation_id, options.validate_before_execution, options.retry_attempts
        );

        if options.validate_before_execution && !self.validate_form() {
            let errors = self.lock().validation.global_validation.total_errors;
            self.fail_execution(
                &token,
                format!("Form validation failed with {} error(s)", errors),
                false,
            );
            if token.is_cancelled() {
                return Err(WizardError::Cancelled);
            }
            return Err(WizardError::ValidationFailed { errors });
        }

        let (resource_name, summary) = {
            let mut st = self.lock();
            if token.is_cancelled() {
                return Err(WizardError::Cancelled);
            }
            st.execution.status = ExecutionStatus::Executing;
            st.execution.message = "Creating project".to_string();
            (F::resource_name(&st.form_data), F::summarize(&st.form_data))
        };
        self.emit(vec![StoreEvent::ExecutionStatusChanged {
            status: ExecutionStatus::Executing,
        }]);

        let sink = ProgressSink::new(
            correlation_id.clone(),
            token.clone(),
            self.progress_emitter(token.clone()),
        );
        let attempts = Arc::new(AtomicU32::new(0));
        let backend = Arc::clone(&self.shared.backend);

        let strategy = ExponentialBackoff::from_millis(2)
            .factor((options.retry_delay_ms / 2).max(1))
            .max_delay(Duration::from_secs(30))
            .map(jitter)
            .take(options.retry_attempts as usize);

        let action = || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            let request = ExecutionRequest {
                flow: F::NAME.to_string(),
                correlation_id: correlation_id.clone(),
                resource_name: resource_name.clone(),
                summary: summary.clone(),
                attempt,
            };
            let backend = Arc::clone(&backend);
            let sink = sink.clone();
            let token = token.clone();
            async move {
                if attempt > 1 {
                    info!(
                        "[PHASE: execution] [STEP: retry] Attempt {} (correlation_id={})",
                        attempt, request.correlation_id
                    );
                }
                backend.execute(request, sink, token).await
            }
        };
        let retry_token = token.clone();
        let retry = RetryIf::start(strategy, action, |e: &ExecutionError| {
            e.is_transient() && !retry_token.is_cancelled()
        });

        let outcome = tokio::select! {
            r = retry => r,
            _ = token.cancelled() => Err(ExecutionError::Cancelled),
        };

        match outcome {
            Ok(mut result) => {
                result.metadata.attempts = attempts.load(Ordering::SeqCst);
                let event = {
                    let mut st = self.lock();
                    if token.is_cancelled() {
                        return Err(WizardError::Cancelled);
                    }
                    st.execution.status = ExecutionStatus::Success;
                    st.execution.progress = 100;
                    st.execution.message = "Project created".to_string();
                    st.execution.result = Some(result.clone());
                    st.cancel = None;
                    StoreEvent::ExecutionStatusChanged {
                        status: ExecutionStatus::Success,
                    }
                };
                info!(
                    "[PHASE: execution] [STEP: complete] {} created (project_id={}, url={}, attempts={})",
                    F::NAME, result.project_id, result.url, result.metadata.attempts
                );
                self.emit(vec![event]);
                Ok(result)
            }
            Err(ExecutionError::Cancelled) => {
                // Normally already recorded by `cancel_execution`.
                let event = {
                    let mut st = self.lock();
                    if st.execution.status.is_running() {
                        st.execution.status = ExecutionStatus::Cancelled;
                        st.execution.message = "Execution cancelled".to_string();
                        st.cancel = None;
                        Some(StoreEvent::ExecutionStatusChanged {
                            status: ExecutionStatus::Cancelled,
                        })
                    } else {
                        None
                    }
                };
                self.emit(event.into_iter().collect());
                Err(WizardError::Cancelled)
            }
            Err(e) => {
                error!(
                    "[PHASE: execution] [STEP: failed] {} failed after {} attempt(s): {}",
                    F::NAME,
                    attempts.load(Ordering::SeqCst),
                    e
                );
                self.fail_execution(&token, e.to_string(), e.is_transient());
                Err(e.into())
            }
        }
    }

    /// Cancel the running execution. Returns false when nothing is running.
    pub fn cancel_execution(&self) -> bool {
        let event = {
            let mut st = self.lock();
            if !st.execution.status.is_running() {
                warn!(
                    "[PHASE: execution] [STEP: cancel] Nothing to cancel (status={:?})",
                    st.execution.status
                );
                return false;
            }
            if let Some(token) = st.cancel.take() {
                token.cancel();
            }
            st.execution.status = ExecutionStatus::Cancelled;
            st.execution.message = "Execution cancelled".to_string();
            StoreEvent::ExecutionStatusChanged {
                status: ExecutionStatus::Cancelled,
            }
        };
        info!("[PHASE: execution] [STEP: cancel] Execution cancelled");
        self.emit(vec![event]);
        true
    }

    /// Back to idle from a terminal state. Refused while running.
    pub fn clear_execution_result(&self) -> bool {
        let event = {
            let mut st = self.lock();
            match st.execution.status {
                ExecutionStatus::Idle => return false,
                s if s.is_running() => {
                    warn!("[PHASE: execution] [STEP: clear] Cannot clear while {:?}", s);
                    return false;
                }
                _ => {}
            }
            st.execution = ExecutionState::default();
            st.cancel = None;
            StoreEvent::ExecutionStatusChanged {
                status: ExecutionStatus::Idle,
            }
        };
        self.emit(vec![event]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            flow: "project-creation".to_string(),
            correlation_id: "corr-1".to_string(),
            resource_name: Some("My Project".to_string()),
            summary: serde_json::json!({ "name": "My Project" }),
            attempt: 1,
        }
    }

    fn recording_sink(token: CancellationToken) -> (ProgressSink, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in = Arc::clone(&seen);
        let emit: ProgressEmitter = Arc::new(move |p: ProgressPayload| {
            seen_in.lock().unwrap().push(p.percent);
        });
        (ProgressSink::new("corr-1".to_string(), token, emit), seen)
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_backend_reaches_100_and_builds_url() {
        let backend = SimulatedBackend::new(Duration::from_millis(200), 10, "https://projects.example.com/");
        let token = CancellationToken::new();
        let (sink, seen) = recording_sink(token.clone());

        let result = backend.execute(request(), sink, token).await.unwrap();
        assert_eq!(result.url, "https://projects.example.com/projects/my-project");
        assert_eq!(result.status, "created");
        assert!(uuid::Uuid::parse_str(&result.project_id).is_ok());

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 10);
        assert_eq!(seen.last(), Some(&100));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));

        let log = &result.metadata.execution_log;
        assert_eq!(log.first().map(|e| e.status), Some(LogStatus::Started));
        assert_eq!(log.last().map(|e| e.status), Some(LogStatus::Completed));
        assert_eq!(log.last().map(|e| e.step.as_str()), Some("finalize"));
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_backend_stops_on_cancel() {
        let backend = SimulatedBackend::new(Duration::from_millis(200), 10, "https://x");
        let token = CancellationToken::new();
        let (sink, seen) = recording_sink(token.clone());

        let canceller = token.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(450)).await;
            canceller.cancel();
        });

        let err = backend.execute(request(), sink, token).await.unwrap_err();
        assert_eq!(err, ExecutionError::Cancelled);
        assert_eq!(seen.lock().unwrap().as_slice(), &[10, 20]);
    }

    #[test]
    fn sink_drops_reports_after_cancel() {
        let token = CancellationToken::new();
        let (sink, seen) = recording_sink(token.clone());
        sink.report("a", 10, "x");
        token.cancel();
        sink.report("a", 20, "y");
        assert_eq!(seen.lock().unwrap().as_slice(), &[10]);
        assert_eq!(sink.check_cancel(), Err(ExecutionError::Cancelled));
    }

    #[test]
    fn zero_increment_is_clamped() {
        let backend = SimulatedBackend::new(Duration::from_millis(1), 0, "https://x");
        assert_eq!(backend.increment, 1);
    }
}
