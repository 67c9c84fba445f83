// Command-line runners
//
// Async bodies behind the `--wizard-smoke` and draft maintenance flags. They
// return errors instead of exiting; `lib.rs` turns those into exit codes.

use crate::config::{AutoSaveSettings, WizardSettings};
use crate::drafts::{DraftManager, FileDraftManager, InMemoryDraftManager};
use crate::engine::{SimulatedBackend, WizardStore};
use crate::error::WizardError;
use crate::flows::api_request::ApiRequestFlow;
use crate::flows::project::{sample_form_data, ProjectCreationFlow, ProjectStep};
use crate::flows::WizardFlow;
use crate::models::draft::{ExportFormat, LoadDraftOptions};
use crate::models::execution::{ExecutionOptions, ExecutionStatus};
use crate::models::state::StoreEvent;
use crate::utils::logging::redact_json;
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{sleep, timeout, Duration};

const SMOKE_TRANSCRIPT: &str = "wizard_smoke_transcript.log";
const TRANSCRIPT_WRITE_CHECK: &str = "transcript_write";

/// Transcript lines go to the transcript file and stdout.
struct Transcript {
    file: std::fs::File,
    failures: Vec<String>,
}

impl Transcript {
    fn create(path: &Path) -> Result<Self> {
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create transcript {:?}", path))?;
        Ok(Self {
            file,
            failures: Vec::new(),
        })
    }

    fn line(&mut self, msg: impl AsRef<str>) {
        let msg = format!("{}\n", msg.as_ref());
        if let Err(e) = self.file.write_all(msg.as_bytes()) {
            warn!(
                "[PHASE: smoke] [STEP: transcript] Failed to write transcript line: {}",
                e
            );
            // A truncated transcript must not read as a pass.
            if !self.failures.iter().any(|f| f == TRANSCRIPT_WRITE_CHECK) {
                self.failures.push(TRANSCRIPT_WRITE_CHECK.to_string());
            }
        }
        print!("{}", msg);
    }

    fn check(&mut self, name: &str, ok: bool) {
        self.line(format!("{}={}", name, if ok { "PASS" } else { "FAIL" }));
        if !ok {
            self.failures.push(name.to_string());
        }
    }
}

fn section_of<F: WizardFlow>(store: &WizardStore<F>, step: F::Step) -> Result<String> {
    store
        .steps()
        .into_iter()
        .find(|d| d.id == step)
        .map(|d| d.section)
        .ok_or_else(|| anyhow!("Step {} is not registered", step))
}

/// Drive both flows end to end against scratch storage and the simulated
/// backend, recording every check in the transcript.
pub async fn wizard_smoke(settings: WizardSettings, log_dir: PathBuf) -> Result<()> {
    let started = Instant::now();
    let transcript_path = log_dir.join(SMOKE_TRANSCRIPT);
    let mut t = Transcript::create(&transcript_path)?;

    t.line("=== Wizard Smoke ===");
    t.line(format!("Started: {}", chrono::Utc::now()));
    t.line("");

    // Scratch folder so the user's own drafts are never touched.
    let drafts_dir = log_dir.join("smoke-drafts");
    if drafts_dir.exists() {
        std::fs::remove_dir_all(&drafts_dir)
            .with_context(|| format!("Failed to clear {:?}", drafts_dir))?;
    }
    std::fs::create_dir_all(&drafts_dir)
        .with_context(|| format!("Failed to create {:?}", drafts_dir))?;
    let quota = (settings.drafts.max_storage_bytes > 0).then_some(settings.drafts.max_storage_bytes);
    let drafts = Arc::new(FileDraftManager::new(
        &drafts_dir,
        settings.drafts.compress,
        quota,
    ));
    let backend = Arc::new(SimulatedBackend::from_settings(&settings.execution));
    let auto_save = AutoSaveSettings {
        enabled: false,
        ..settings.auto_save.clone()
    };
    t.line(format!(
        "drafts_dir={:?} compress={} tick_delay_ms={} progress_increment={}",
        drafts_dir,
        settings.drafts.compress,
        settings.execution.tick_delay_ms,
        settings.execution.progress_increment
    ));
    t.line("");

    let store: WizardStore<ProjectCreationFlow> =
        WizardStore::new(drafts, backend.clone(), auto_save.clone());

    project_navigation(&mut t, &store)?;
    project_conditional_step(&mut t, &store)?;
    project_drafts(&mut t, &store).await?;
    project_execution(&mut t, &store, &settings).await?;
    project_cancellation(&mut t, &store, &settings).await?;
    api_request(&mut t, backend, auto_save).await?;

    t.line("");
    t.line("=== Summary ===");
    t.line(format!("elapsed_ms={}", started.elapsed().as_millis()));
    if t.failures.is_empty() {
        t.line("========================================");
        t.line("WIZARD SMOKE PASSED");
        t.line("========================================");
        t.line("ExitCode=0");
        info!(
            "[PHASE: smoke] [STEP: complete] Wizard smoke passed (transcript={:?})",
            transcript_path
        );
        Ok(())
    } else {
        t.line(format!("failed_checks={}", t.failures.join(",")));
        t.line("========================================");
        t.line("WIZARD SMOKE FAILED");
        t.line("========================================");
        t.line("ExitCode=1");
        error!(
            "[PHASE: smoke] [STEP: complete] Wizard smoke failed: {}",
            t.failures.join(", ")
        );
        Err(anyhow!("{} smoke check(s) failed", t.failures.len()))
    }
}

fn project_navigation(t: &mut Transcript, store: &WizardStore<ProjectCreationFlow>) -> Result<()> {
    t.line("--- Project creation: navigation ---");
    t.check("blank_form_blocks_next", !store.next_step());
    t.check(
        "review_locked_initially",
        !store.can_navigate_to_step(ProjectStep::Review),
    );

    let sample = serde_json::to_value(sample_form_data())?;
    let mut visited = Vec::new();
    loop {
        let current = store.current_step();
        visited.push(current.to_string());
        let section = section_of(store, current)?;
        let patch = sample
            .get(&section)
            .cloned()
            .ok_or_else(|| anyhow!("Sample data has no section '{}'", section))?;
        store.update_form_data(&section, patch)?;
        if !store.next_step() {
            break;
        }
    }
    t.line(format!("visited_steps={}", visited.join(",")));
    t.check("reached_last_step", store.current_step() == ProjectStep::Review);

    let global = store.validation().global_validation;
    t.line(format!(
        "completed_steps={} total_errors={} total_warnings={}",
        global.completed_steps.len(),
        global.total_errors,
        global.total_warnings
    ));
    t.check("form_can_proceed", global.can_proceed);
    t.check("form_valid", global.valid);
    Ok(())
}

fn project_conditional_step(
    t: &mut Transcript,
    store: &WizardStore<ProjectCreationFlow>,
) -> Result<()> {
    t.line("");
    t.line("--- Project creation: conditional step ---");
    let before = store.visible_steps().len();

    store.update_form_data("databaseSelection", json!({ "createNewDatabase": true }))?;
    let shown = store.visible_steps();
    let number = shown
        .iter()
        .find(|d| d.id == ProjectStep::NewDatabase)
        .and_then(|d| d.number);
    t.line(format!(
        "visible_steps before={} after_toggle={} new_database_number={:?}",
        before,
        shown.len(),
        number
    ));
    t.check(
        "new_database_shown",
        shown.len() == before + 1 && number == Some(4),
    );
    t.check("new_database_blocks_execution", !store.can_execute_project());

    store.update_form_data("databaseSelection", json!({ "createNewDatabase": false }))?;
    t.check(
        "new_database_hidden_again",
        store.visible_steps().len() == before && store.form_data().new_database.is_none(),
    );
    t.check("ready_to_execute", store.can_execute_project());
    Ok(())
}

async fn project_drafts(t: &mut Transcript, store: &WizardStore<ProjectCreationFlow>) -> Result<()> {
    t.line("");
    t.line("--- Project creation: drafts ---");
    let id = store
        .save_draft_to_storage(Some("Smoke draft"), Some("Created by --wizard-smoke"))
        .await?;
    t.line(format!("saved_draft_id={}", id));

    let exported = store.export_draft(&id, ExportFormat::Compressed).await?;
    t.line(format!("exported_bytes={}", exported.len()));
    let imported = store
        .import_draft(&exported, ExportFormat::Compressed)
        .await?;
    t.line(format!("imported_draft_id={}", imported));

    let expected = store.form_data();
    let step = store.current_step();
    store.reset_form();
    t.check("reset_clears_form", store.form_data() != expected);
    store
        .load_draft(&imported, LoadDraftOptions::default())
        .await?;
    t.check("draft_round_trip_form", store.form_data() == expected);
    t.check("draft_round_trip_step", store.current_step() == step);

    if let Some(info) = store.draft().storage_info {
        t.line(format!(
            "storage drafts={} used_bytes={} quota_bytes={:?}",
            info.draft_count, info.used_bytes, info.quota_bytes
        ));
    }
    t.line(format!(
        "form_snapshot={}",
        redact_json(&serde_json::to_value(store.form_data())?)
    ));
    Ok(())
}

async fn project_execution(
    t: &mut Transcript,
    store: &WizardStore<ProjectCreationFlow>,
    settings: &WizardSettings,
) -> Result<()> {
    t.line("");
    t.line("--- Project creation: execution ---");

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")
            .map_err(|e| anyhow!("Invalid progress template: {}", e))?
            .progress_chars("=> "),
    );

    let mut events = store.subscribe();
    let watcher = {
        let bar = bar.clone();
        tokio::spawn(async move {
            let mut percents = Vec::new();
            loop {
                match events.recv().await {
                    Ok(StoreEvent::ExecutionProgress { percent, message }) => {
                        bar.set_position(u64::from(percent));
                        bar.set_message(message);
                        percents.push(percent);
                    }
                    Ok(StoreEvent::ExecutionStatusChanged { status }) if status.is_terminal() => {
                        break
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(n)) => {
                        warn!("[PHASE: smoke] [STEP: execute] Progress watcher skipped {} events", n)
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            percents
        })
    };

    let options = ExecutionOptions {
        validate_before_execution: true,
        retry_attempts: settings.execution.retry_attempts,
        retry_delay_ms: settings.execution.retry_delay_ms,
    };
    let outcome = store.execute_project(options).await;
    // A refused run emits no terminal event; don't wait on the watcher forever.
    let percents = match timeout(Duration::from_secs(2), watcher).await {
        Ok(Ok(p)) => p,
        _ => Vec::new(),
    };

    match &outcome {
        Ok(result) => {
            bar.finish_with_message("done");
            t.line(format!("project_id={}", result.project_id));
            t.line(format!("url={}", result.url));
            t.line(format!(
                "attempts={} duration_ms={} log_entries={}",
                result.metadata.attempts,
                result.metadata.duration_ms,
                result.metadata.execution_log.len()
            ));
        }
        Err(e) => {
            bar.abandon_with_message(e.to_string());
            t.line(format!("execution_error={}", e));
        }
    }

    let state = store.execution();
    t.line(format!("progress_events={}", percents.len()));
    t.check("execution_succeeded", state.status == ExecutionStatus::Success);
    t.check("progress_complete", state.progress == 100);
    t.check(
        "progress_monotonic",
        percents.windows(2).all(|w| w[0] <= w[1]),
    );
    t.check("second_run_refused", !store.can_execute_project());
    t.check("clear_result", store.clear_execution_result());
    Ok(())
}

async fn project_cancellation(
    t: &mut Transcript,
    store: &WizardStore<ProjectCreationFlow>,
    settings: &WizardSettings,
) -> Result<()> {
    t.line("");
    t.line("--- Project creation: cancellation ---");
    let tick = settings.execution.tick_delay_ms;
    if tick < 20 {
        t.line(format!("cancellation=SKIPPED (tick_delay_ms={} too small)", tick));
        return Ok(());
    }

    let runner = store.clone();
    let handle = tokio::spawn(async move {
        runner
            .execute_project(ExecutionOptions {
                validate_before_execution: false,
                ..ExecutionOptions::default()
            })
            .await
    });
    sleep(Duration::from_millis(tick * 2 + tick / 2)).await;

    t.check("cancel_accepted", store.cancel_execution());
    let frozen = store.execution();
    sleep(Duration::from_millis(tick * 3)).await;
    let after = store.execution();
    t.line(format!("progress_at_cancel={} progress_after={}", frozen.progress, after.progress));
    t.check(
        "cancel_freezes_progress",
        after.progress == frozen.progress && after.status == ExecutionStatus::Cancelled,
    );

    let joined = handle.await.context("Cancelled execution task panicked")?;
    t.check(
        "cancel_reported",
        matches!(joined, Err(WizardError::Cancelled)),
    );
    store.clear_execution_result();
    Ok(())
}

async fn api_request(
    t: &mut Transcript,
    backend: Arc<SimulatedBackend>,
    auto_save: AutoSaveSettings,
) -> Result<()> {
    t.line("");
    t.line("--- API request ---");
    let store: WizardStore<ApiRequestFlow> =
        WizardStore::new(Arc::new(InMemoryDraftManager::new()), backend, auto_save);

    let patches = [
        (
            "requestDetails",
            json!({
                "apiName": "Customer Lookup",
                "description": "Read-only customer profile lookups",
                "justification": "Support portal needs customer profiles during calls",
            }),
        ),
        (
            "endpoint",
            json!({ "method": "GET", "baseUrl": "https://api.example.com", "path": "/v1/customers" }),
        ),
        (
            "access",
            json!({ "consumers": ["A123456"], "rateLimitPerMinute": 600, "authScheme": "oauth2" }),
        ),
        ("review", json!({ "confirmed": true })),
    ];
    for (section, patch) in patches {
        store.update_form_data(section, patch)?;
        store.next_step();
    }
    t.line(format!("current_step={}", store.current_step()));
    t.check(
        "api_request_can_proceed",
        store.validation().global_validation.can_proceed,
    );

    match store.execute_project(ExecutionOptions::default()).await {
        Ok(result) => t.line(format!("api_request_url={}", result.url)),
        Err(e) => t.line(format!("api_request_error={}", e)),
    }
    t.check(
        "api_request_executed",
        store.execution().status == ExecutionStatus::Success,
    );
    Ok(())
}

// =========================
// Draft maintenance
// =========================

fn open_drafts(settings: &WizardSettings) -> Result<FileDraftManager> {
    FileDraftManager::from_settings(&settings.drafts).context("Failed to open draft storage")
}

pub async fn list_drafts(settings: WizardSettings) -> Result<()> {
    let drafts = open_drafts(&settings)?;
    let list = drafts.draft_metadata().await?;
    let info = drafts.storage_info().await?;

    let quota = info
        .quota_bytes
        .map(|q| format!(" of {}", q))
        .unwrap_or_default();
    println!(
        "{} draft(s) in {:?} ({} bytes used{})",
        info.draft_count,
        drafts.dir(),
        info.used_bytes,
        quota
    );
    for m in &list {
        println!(
            "{}  {}  {:<16}  {}",
            m.id,
            m.updated_at.format("%Y-%m-%d %H:%M:%S"),
            m.flow,
            m.title
        );
    }
    Ok(())
}

pub async fn export_draft(settings: WizardSettings, id: &str, format: ExportFormat) -> Result<()> {
    let drafts = open_drafts(&settings)?;
    let data = drafts
        .export_draft(id, format)
        .await
        .with_context(|| format!("Failed to export draft {}", id))?;
    println!("{}", data);
    Ok(())
}

pub async fn import_draft(
    settings: WizardSettings,
    path: PathBuf,
    format: Option<ExportFormat>,
) -> Result<()> {
    let format = format.unwrap_or_else(|| {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ExportFormat::Json,
            _ => ExportFormat::Compressed,
        }
    });
    let data = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;

    let drafts = open_drafts(&settings)?;
    let id = drafts
        .import_draft(data.trim(), format)
        .await
        .with_context(|| format!("Failed to import {:?}", path))?;
    info!(
        "[PHASE: cli] [STEP: import] Imported {:?} ({:?}) as draft {}",
        path, format, id
    );
    println!("{}", id);
    Ok(())
}

pub async fn delete_draft(settings: WizardSettings, id: &str) -> Result<()> {
    let drafts = open_drafts(&settings)?;
    drafts
        .delete_draft(id)
        .await
        .with_context(|| format!("Failed to delete draft {}", id))?;
    println!("Deleted draft {}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_settings(dir: &Path) -> WizardSettings {
        let mut settings = WizardSettings::default();
        settings.drafts.directory = Some(dir.join("drafts"));
        settings.execution.tick_delay_ms = 25;
        settings.execution.progress_increment = 25;
        settings
    }

    #[test]
    fn failed_transcript_write_counts_as_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(SMOKE_TRANSCRIPT);
        std::fs::write(&path, "").unwrap();
        // Read-only handle: every write fails.
        let mut t = Transcript {
            file: std::fs::File::open(&path).unwrap(),
            failures: Vec::new(),
        };
        t.line("first");
        t.check("some_check", true);
        assert_eq!(t.failures, vec![TRANSCRIPT_WRITE_CHECK.to_string()]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn smoke_passes_and_writes_transcript() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = scratch_settings(tmp.path());
        wizard_smoke(settings, tmp.path().to_path_buf())
            .await
            .unwrap();

        let transcript = std::fs::read_to_string(tmp.path().join(SMOKE_TRANSCRIPT)).unwrap();
        assert!(transcript.contains("WIZARD SMOKE PASSED"), "{}", transcript);
        assert!(!transcript.contains("=FAIL"), "{}", transcript);
        assert!(transcript.contains("cancel_freezes_progress=PASS"));
        // Credentials never reach the transcript.
        assert!(!transcript.contains("vault://kv/analytics/db"));
    }

    #[tokio::test]
    async fn import_then_delete_from_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = scratch_settings(tmp.path());

        let source = InMemoryDraftManager::new();
        let id = source
            .save_draft(
                crate::models::draft::DraftSnapshot {
                    flow: "project-creation".to_string(),
                    form_data: json!({ "generalInfo": { "name": "Exported" } }),
                    navigation: crate::models::draft::DraftNavigation {
                        current_step: json!("general-info"),
                        total_steps: 9,
                    },
                },
                Default::default(),
            )
            .await
            .unwrap();
        let exported = source.export_draft(&id, ExportFormat::Json).await.unwrap();
        let path = tmp.path().join("exported.json");
        std::fs::write(&path, format!("{}\n", exported)).unwrap();

        import_draft(settings.clone(), path, None).await.unwrap();
        let drafts = open_drafts(&settings).unwrap();
        let list = drafts.draft_metadata().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_ne!(list[0].id, id);

        delete_draft(settings.clone(), &list[0].id).await.unwrap();
        assert!(drafts.draft_metadata().await.unwrap().is_empty());
        assert!(delete_draft(settings, "missing").await.is_err());
    }
}
