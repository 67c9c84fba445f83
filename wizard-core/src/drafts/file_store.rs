// File-backed draft storage
//
// One file per draft: `<id>.draft.json`, or `<id>.draft.zip` when compression
// is enabled. Writes go to a temp file first and are renamed into place.

use super::{build_draft, codec, sort_metadata, validate_draft_id, DraftManager};
use crate::config::DraftSettings;
use crate::error::DraftError;
use crate::models::draft::{Draft, DraftMetadata, DraftSnapshot, SaveDraftOptions, StorageInfo};
use crate::utils::path_resolver;
use async_trait::async_trait;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};

const JSON_EXT: &str = ".draft.json";
const ZIP_EXT: &str = ".draft.zip";
const WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct FileDraftManager {
    dir: PathBuf,
    compress: bool,
    quota_bytes: Option<u64>,
}

impl FileDraftManager {
    pub fn new(dir: impl Into<PathBuf>, compress: bool, quota_bytes: Option<u64>) -> Self {
        Self {
            dir: dir.into(),
            compress,
            quota_bytes,
        }
    }

    /// Build from settings, creating the drafts folder if needed.
    pub fn from_settings(settings: &DraftSettings) -> Result<Self, DraftError> {
        let dir = path_resolver::resolve_drafts_folder(settings.directory.as_deref())
            .map_err(|e| DraftError::Backend(e.to_string()))?;
        let quota = (settings.max_storage_bytes > 0).then_some(settings.max_storage_bytes);
        Ok(Self::new(dir, settings.compress, quota))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn json_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, JSON_EXT))
    }

    fn zip_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", id, ZIP_EXT))
    }

    fn encode(&self, draft: &Draft) -> Result<Vec<u8>, DraftError> {
        let json = serde_json::to_vec_pretty(draft)?;
        if self.compress {
            codec::zip_entry(&json)
        } else {
            Ok(json)
        }
    }

    async fn read_draft(&self, id: &str) -> Result<Draft, DraftError> {
        validate_draft_id(id)?;
        let json_path = self.json_path(id);
        let zip_path = self.zip_path(id);

        // Either extension may be present if compression was toggled between runs.
        let bytes = if tokio::fs::try_exists(&zip_path).await? {
            codec::unzip_entry(&tokio::fs::read(&zip_path).await?)?
        } else if tokio::fs::try_exists(&json_path).await? {
            tokio::fs::read(&json_path).await?
        } else {
            return Err(DraftError::NotFound(id.to_string()));
        };

        let draft: Draft = serde_json::from_slice(&bytes)?;
        codec::check_version(draft.metadata.version)?;
        Ok(draft)
    }

    /// Draft files currently on disk with their sizes.
    async fn list_files(&self) -> Result<Vec<(String, PathBuf, u64)>, DraftError> {
        let mut out = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            let id = name
                .strip_suffix(JSON_EXT)
                .or_else(|| name.strip_suffix(ZIP_EXT));
            if let Some(id) = id {
                let len = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                out.push((id.to_string(), entry.path(), len));
            }
        }
        Ok(out)
    }

    async fn check_quota(&self, id: &str, required: u64) -> Result<(), DraftError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let used: u64 = self
            .list_files()
            .await?
            .into_iter()
            .filter(|(file_id, _, _)| file_id != id)
            .map(|(_, _, len)| len)
            .sum();
        let available = quota.saturating_sub(used);
        if required > available {
            warn!(
                "[PHASE: drafts] [STEP: save] Quota exceeded for draft {} (required={}, available={}, quota={})",
                id, required, available, quota
            );
            return Err(DraftError::QuotaExceeded {
                required,
                available,
            });
        }
        Ok(())
    }

    async fn write_draft(&self, draft: &Draft) -> Result<(), DraftError> {
        let id = &draft.metadata.id;
        validate_draft_id(id)?;
        let bytes = self.encode(draft)?;
        self.check_quota(id, bytes.len() as u64).await?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let (target, stale) = if self.compress {
            (self.zip_path(id), self.json_path(id))
        } else {
            (self.json_path(id), self.zip_path(id))
        };
        let tmp = self.dir.join(format!(".{}.tmp", id));
        write_file_with_retries(&tmp, &bytes, "draft").await?;
        tokio::fs::rename(&tmp, &target).await?;

        match tokio::fs::remove_file(&stale).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "[PHASE: drafts] [STEP: save] Could not remove stale draft file {:?}: {}",
                stale, e
            ),
        }
        Ok(())
    }
}

async fn write_file_with_retries(path: &Path, bytes: &[u8], label: &str) -> Result<(), DraftError> {
    let mut last_err: Option<std::io::Error> = None;
    for attempt in 1..=WRITE_ATTEMPTS {
        let started = Instant::now();
        match timeout(Duration::from_secs(10), tokio::fs::write(path, bytes)).await {
            Ok(Ok(())) => {
                info!(
                    "[PHASE: drafts] [STEP: fs] {} write ok (attempt={}, path={:?}, bytes={}, duration_ms={})",
                    label,
                    attempt,
                    path,
                    bytes.len(),
                    started.elapsed().as_millis()
                );
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!(
                    "[PHASE: drafts] [STEP: fs] {} write failed (attempt={}, path={:?}, error={:?})",
                    label, attempt, path, e
                );
                last_err = Some(e);
            }
            Err(_) => {
                warn!(
                    "[PHASE: drafts] [STEP: fs] {} write timed out (attempt={}, path={:?})",
                    label, attempt, path
                );
                last_err = Some(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "write timed out",
                ));
            }
        }
        if attempt < WRITE_ATTEMPTS {
            sleep(Duration::from_millis(50 * 2u64.pow(attempt - 1))).await;
        }
    }
    Err(last_err
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "write failed"))
        .into())
}

#[async_trait]
impl DraftManager for FileDraftManager {
    async fn save_draft(
        &self,
        snapshot: DraftSnapshot,
        options: SaveDraftOptions,
    ) -> Result<String, DraftError> {
        let existing = match options.draft_id.as_deref() {
            Some(id) => match self.read_draft(id).await {
                Ok(d) => Some(d.metadata),
                Err(DraftError::NotFound(_)) => None,
                Err(e) => {
                    warn!(
                        "[PHASE: drafts] [STEP: save] Existing draft {} unreadable, overwriting: {}",
                        id, e
                    );
                    None
                }
            },
            None => None,
        };
        let draft = build_draft(existing.as_ref(), snapshot, options)?;
        self.write_draft(&draft).await?;
        info!(
            "[PHASE: drafts] [STEP: save] Draft {} saved (title={:?}, compressed={})",
            draft.metadata.id, draft.metadata.title, self.compress
        );
        Ok(draft.metadata.id)
    }

    async fn load_draft(&self, id: &str) -> Result<Draft, DraftError> {
        let draft = self.read_draft(id).await?;
        info!("[PHASE: drafts] [STEP: load] Draft {} loaded", id);
        Ok(draft)
    }

    async fn delete_draft(&self, id: &str) -> Result<(), DraftError> {
        validate_draft_id(id)?;
        let mut removed = false;
        for path in [self.json_path(id), self.zip_path(id)] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if !removed {
            return Err(DraftError::NotFound(id.to_string()));
        }
        info!("[PHASE: drafts] [STEP: delete] Draft {} deleted", id);
        Ok(())
    }

    async fn draft_metadata(&self) -> Result<Vec<DraftMetadata>, DraftError> {
        let mut list = Vec::new();
        for (id, path, _) in self.list_files().await? {
            match self.read_draft(&id).await {
                Ok(d) => list.push(d.metadata),
                Err(e) => warn!(
                    "[PHASE: drafts] [STEP: list] Skipping unreadable draft {:?}: {}",
                    path, e
                ),
            }
        }
        // Both extensions present for one id would list it twice.
        sort_metadata(&mut list);
        list.dedup_by(|a, b| a.id == b.id);
        Ok(list)
    }

    async fn storage_info(&self) -> Result<StorageInfo, DraftError> {
        let files = self.list_files().await?;
        Ok(StorageInfo {
            draft_count: files.len(),
            used_bytes: files.iter().map(|(_, _, len)| len).sum(),
            quota_bytes: self.quota_bytes,
            compressed: self.compress,
            location: Some(self.dir.clone()),
        })
    }

    async fn put_draft(&self, draft: Draft) -> Result<(), DraftError> {
        self.write_draft(&draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::draft::{DraftNavigation, ExportFormat};
    use serde_json::json;

    fn snapshot(name: &str) -> DraftSnapshot {
        DraftSnapshot {
            flow: "project-creation".to_string(),
            form_data: json!({ "generalInfo": { "name": name, "tags": [] } }),
            navigation: DraftNavigation {
                current_step: json!("database-selection"),
                total_steps: 9,
            },
        }
    }

    #[tokio::test]
    async fn json_drafts_round_trip_on_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FileDraftManager::new(tmp.path(), false, None);
        let id = mgr
            .save_draft(
                snapshot("Alpha"),
                SaveDraftOptions {
                    title: "Alpha".to_string(),
                    ..SaveDraftOptions::default()
                },
            )
            .await
            .unwrap();

        assert!(tmp.path().join(format!("{}{}", id, JSON_EXT)).is_file());
        let draft = mgr.load_draft(&id).await.unwrap();
        assert_eq!(draft.form_data, snapshot("Alpha").form_data);
        assert_eq!(draft.navigation.current_step, json!("database-selection"));

        let listed = mgr.draft_metadata().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Alpha");
    }

    #[tokio::test]
    async fn compressed_drafts_are_zip_files() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FileDraftManager::new(tmp.path(), true, None);
        let id = mgr
            .save_draft(snapshot("Beta"), SaveDraftOptions::default())
            .await
            .unwrap();
        let path = tmp.path().join(format!("{}{}", id, ZIP_EXT));
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], b"PK");
        assert_eq!(
            mgr.load_draft(&id).await.unwrap().form_data,
            snapshot("Beta").form_data
        );
        assert!(mgr.storage_info().await.unwrap().compressed);
    }

    #[tokio::test]
    async fn toggling_compression_replaces_the_old_file() {
        let tmp = tempfile::tempdir().unwrap();
        let plain = FileDraftManager::new(tmp.path(), false, None);
        let id = plain
            .save_draft(snapshot("Gamma"), SaveDraftOptions::default())
            .await
            .unwrap();

        let zipped = FileDraftManager::new(tmp.path(), true, None);
        zipped
            .save_draft(
                snapshot("Gamma 2"),
                SaveDraftOptions {
                    draft_id: Some(id.clone()),
                    ..SaveDraftOptions::default()
                },
            )
            .await
            .unwrap();

        assert!(!tmp.path().join(format!("{}{}", id, JSON_EXT)).exists());
        let info = zipped.storage_info().await.unwrap();
        assert_eq!(info.draft_count, 1);
        assert_eq!(
            plain.load_draft(&id).await.unwrap().form_data["generalInfo"]["name"],
            "Gamma 2"
        );
    }

    #[tokio::test]
    async fn quota_is_enforced_per_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FileDraftManager::new(tmp.path(), false, Some(700));
        mgr.save_draft(snapshot("One"), SaveDraftOptions::default())
            .await
            .unwrap();
        let err = mgr
            .save_draft(snapshot("Two"), SaveDraftOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DraftError::QuotaExceeded { .. }), "{:?}", err);
        assert_eq!(mgr.storage_info().await.unwrap().draft_count, 1);
    }

    #[tokio::test]
    async fn delete_removes_file_and_reports_missing() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FileDraftManager::new(tmp.path(), false, None);
        let id = mgr
            .save_draft(snapshot("Delta"), SaveDraftOptions::default())
            .await
            .unwrap();
        mgr.delete_draft(&id).await.unwrap();
        assert!(mgr.draft_metadata().await.unwrap().is_empty());
        assert!(matches!(
            mgr.delete_draft(&id).await,
            Err(DraftError::NotFound(_))
        ));
        assert!(matches!(
            mgr.load_draft("../escape").await,
            Err(DraftError::InvalidFormat(_))
        ));
    }

    #[tokio::test]
    async fn unreadable_files_are_skipped_when_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FileDraftManager::new(tmp.path(), false, None);
        mgr.save_draft(snapshot("Ok"), SaveDraftOptions::default())
            .await
            .unwrap();
        std::fs::write(tmp.path().join(format!("broken{}", JSON_EXT)), b"{not json").unwrap();
        let listed = mgr.draft_metadata().await.unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn import_into_file_store_gets_new_id() {
        let tmp = tempfile::tempdir().unwrap();
        let mgr = FileDraftManager::new(tmp.path(), false, None);
        let id = mgr
            .save_draft(snapshot("Export me"), SaveDraftOptions::default())
            .await
            .unwrap();
        let exported = mgr.export_draft(&id, ExportFormat::Compressed).await.unwrap();
        let new_id = mgr
            .import_draft(&exported, ExportFormat::Compressed)
            .await
            .unwrap();
        assert_ne!(id, new_id);
        assert_eq!(mgr.draft_metadata().await.unwrap().len(), 2);
    }

    #[test]
    fn from_settings_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("drafts");
        let settings = DraftSettings {
            directory: Some(dir.clone()),
            compress: false,
            max_storage_bytes: 0,
        };
        let mgr = FileDraftManager::from_settings(&settings).unwrap();
        assert_eq!(mgr.dir(), dir.as_path());
        assert!(dir.is_dir());
        assert_eq!(mgr.quota_bytes, None);
    }
}
