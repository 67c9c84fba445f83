// Draft storage
//
// `DraftManager` is the persistence seam used by the store. Two implementations
// ship with the crate: a directory of draft files and an in-memory map.

pub mod codec;
pub mod file_store;
pub mod memory;

pub use file_store::FileDraftManager;
pub use memory::InMemoryDraftManager;

use crate::error::DraftError;
use crate::models::draft::{
    Draft, DraftMetadata, DraftSnapshot, ExportFormat, SaveDraftOptions, StorageInfo,
    DRAFT_FORMAT_VERSION,
};
use async_trait::async_trait;
use chrono::Utc;
use log::info;

pub const UNTITLED_DRAFT: &str = "Untitled draft";

#[async_trait]
pub trait DraftManager: Send + Sync {
    /// Persist a snapshot. Overwrites `options.draft_id` when given, otherwise
    /// creates a new draft. Returns the draft id.
    async fn save_draft(
        &self,
        snapshot: DraftSnapshot,
        options: SaveDraftOptions,
    ) -> Result<String, DraftError>;

    async fn load_draft(&self, id: &str) -> Result<Draft, DraftError>;

    async fn delete_draft(&self, id: &str) -> Result<(), DraftError>;

    /// Metadata of every stored draft, most recently updated first.
    async fn draft_metadata(&self) -> Result<Vec<DraftMetadata>, DraftError>;

    async fn storage_info(&self) -> Result<StorageInfo, DraftError>;

    /// Store a complete draft as-is (id and timestamps included).
    async fn put_draft(&self, draft: Draft) -> Result<(), DraftError>;

    async fn export_draft(&self, id: &str, format: ExportFormat) -> Result<String, DraftError> {
        let draft = self.load_draft(id).await?;
        let exported = codec::encode(&draft, format)?;
        info!(
            "[PHASE: drafts] [STEP: export] Exported draft {} ({:?}, {} bytes)",
            id,
            format,
            exported.len()
        );
        Ok(exported)
    }

    /// Verify and store an exported draft under a fresh id.
    async fn import_draft(&self, data: &str, format: ExportFormat) -> Result<String, DraftError> {
        let mut draft = codec::decode(data, format)?;
        let original_id = std::mem::replace(&mut draft.metadata.id, new_draft_id());
        draft.metadata.updated_at = Utc::now();
        draft.metadata.version = DRAFT_FORMAT_VERSION;
        let id = draft.metadata.id.clone();
        self.put_draft(draft).await?;
        info!(
            "[PHASE: drafts] [STEP: import] Imported draft {} as {}",
            original_id, id
        );
        Ok(id)
    }
}

pub fn new_draft_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Draft ids become file names; keep them to a safe alphabet.
pub fn validate_draft_id(id: &str) -> Result<(), DraftError> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(DraftError::InvalidFormat(format!("invalid draft id '{}'", id)))
    }
}

/// Build the stored draft for a save, carrying over creation time and title of
/// the draft being overwritten.
pub(crate) fn build_draft(
    existing: Option<&DraftMetadata>,
    snapshot: DraftSnapshot,
    options: SaveDraftOptions,
) -> Result<Draft, DraftError> {
    let id = match options.draft_id {
        Some(id) => {
            validate_draft_id(&id)?;
            id
        }
        None => new_draft_id(),
    };
    let now = Utc::now();

    let title = if !options.title.trim().is_empty() {
        options.title.trim().to_string()
    } else {
        existing
            .map(|m| m.title.clone())
            .unwrap_or_else(|| UNTITLED_DRAFT.to_string())
    };
    let description = if options.description.trim().is_empty() {
        existing.map(|m| m.description.clone()).unwrap_or_default()
    } else {
        options.description.trim().to_string()
    };

    Ok(Draft {
        metadata: DraftMetadata {
            id,
            created_at: existing.map(|m| m.created_at).unwrap_or(now),
            updated_at: now,
            title,
            description,
            version: DRAFT_FORMAT_VERSION,
            flow: snapshot.flow,
        },
        form_data: snapshot.form_data,
        navigation: snapshot.navigation,
    })
}

/// Most recently updated first.
pub(crate) fn sort_metadata(list: &mut [DraftMetadata]) {
    list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::draft::DraftNavigation;
    use serde_json::json;

    fn snapshot() -> DraftSnapshot {
        DraftSnapshot {
            flow: "project-creation".to_string(),
            form_data: json!({ "generalInfo": { "name": "Alpha" } }),
            navigation: DraftNavigation {
                current_step: json!("general-info"),
                total_steps: 9,
            },
        }
    }

    #[test]
    fn draft_ids_must_be_file_safe() {
        assert!(validate_draft_id("0b8c6c1e-1f0e-4a43-9c1c-1b2a3c4d5e6f").is_ok());
        assert!(validate_draft_id("draft_1").is_ok());
        assert!(validate_draft_id("").is_err());
        assert!(validate_draft_id("../etc/passwd").is_err());
        assert!(validate_draft_id("a/b").is_err());
    }

    #[test]
    fn overwrite_keeps_creation_time_and_title() {
        let first = build_draft(
            None,
            snapshot(),
            SaveDraftOptions {
                title: "Alpha".to_string(),
                ..SaveDraftOptions::default()
            },
        )
        .unwrap();
        let second = build_draft(
            Some(&first.metadata),
            snapshot(),
            SaveDraftOptions {
                draft_id: Some(first.metadata.id.clone()),
                ..SaveDraftOptions::default()
            },
        )
        .unwrap();
        assert_eq!(second.metadata.id, first.metadata.id);
        assert_eq!(second.metadata.created_at, first.metadata.created_at);
        assert_eq!(second.metadata.title, "Alpha");
        assert!(second.metadata.updated_at >= first.metadata.updated_at);
    }

    #[test]
    fn new_draft_without_title_is_untitled() {
        let draft = build_draft(None, snapshot(), SaveDraftOptions::default()).unwrap();
        assert_eq!(draft.metadata.title, UNTITLED_DRAFT);
        assert_eq!(draft.metadata.version, DRAFT_FORMAT_VERSION);
        assert_eq!(draft.metadata.flow, "project-creation");
    }
}
