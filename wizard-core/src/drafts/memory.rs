use super::{build_draft, sort_metadata, validate_draft_id, DraftManager};
use crate::error::DraftError;
use crate::models::draft::{Draft, DraftMetadata, DraftSnapshot, SaveDraftOptions, StorageInfo};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Map-backed draft storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryDraftManager {
    drafts: Mutex<HashMap<String, Draft>>,
    quota_bytes: Option<u64>,
}

impl InMemoryDraftManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            drafts: Mutex::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub async fn len(&self) -> usize {
        self.drafts.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.lock().await.is_empty()
    }

    fn size_of(draft: &Draft) -> Result<u64, DraftError> {
        Ok(serde_json::to_vec(draft)?.len() as u64)
    }

    fn check_quota(
        &self,
        drafts: &HashMap<String, Draft>,
        incoming: &Draft,
    ) -> Result<(), DraftError> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let mut used = 0u64;
        for (id, d) in drafts {
            if *id != incoming.metadata.id {
                used += Self::size_of(d)?;
            }
        }
        let required = Self::size_of(incoming)?;
        let available = quota.saturating_sub(used);
        if required > available {
            return Err(DraftError::QuotaExceeded {
                required,
                available,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DraftManager for InMemoryDraftManager {
    async fn save_draft(
        &self,
        snapshot: DraftSnapshot,
        options: SaveDraftOptions,
    ) -> Result<String, DraftError> {
        let mut drafts = self.drafts.lock().await;
        let existing = options
            .draft_id
            .as_ref()
            .and_then(|id| drafts.get(id))
            .map(|d| d.metadata.clone());
        let draft = build_draft(existing.as_ref(), snapshot, options)?;
        self.check_quota(&drafts, &draft)?;
        let id = draft.metadata.id.clone();
        debug!("[PHASE: drafts] [STEP: save] In-memory draft {} stored", id);
        drafts.insert(id.clone(), draft);
        Ok(id)
    }

    async fn load_draft(&self, id: &str) -> Result<Draft, DraftError> {
        self.drafts
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| DraftError::NotFound(id.to_string()))
    }

    async fn delete_draft(&self, id: &str) -> Result<(), DraftError> {
        self.drafts
            .lock()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| DraftError::NotFound(id.to_string()))
    }

    async fn draft_metadata(&self) -> Result<Vec<DraftMetadata>, DraftError> {
        let mut list: Vec<DraftMetadata> = self
            .drafts
            .lock()
            .await
            .values()
            .map(|d| d.metadata.clone())
            .collect();
        sort_metadata(&mut list);
        Ok(list)
    }

    async fn storage_info(&self) -> Result<StorageInfo, DraftError> {
        let drafts = self.drafts.lock().await;
        let mut used_bytes = 0;
        for d in drafts.values() {
            used_bytes += Self::size_of(d)?;
        }
        Ok(StorageInfo {
            draft_count: drafts.len(),
            used_bytes,
            quota_bytes: self.quota_bytes,
            compressed: false,
            location: None,
        })
    }

    async fn put_draft(&self, draft: Draft) -> Result<(), DraftError> {
        validate_draft_id(&draft.metadata.id)?;
        let mut drafts = self.drafts.lock().await;
        self.check_quota(&drafts, &draft)?;
        drafts.insert(draft.metadata.id.clone(), draft);
        Ok(())
    }
}
