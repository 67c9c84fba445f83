// Draft models
//
// Drafts are flow-agnostic on disk: form data and the current step are stored as
// JSON values, the flow name in the metadata says how to read them back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Current on-disk draft format version.
pub const DRAFT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftMetadata {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub version: u32,
    /// Name of the wizard flow that produced the draft.
    pub flow: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftNavigation {
    pub current_step: serde_json::Value,
    pub total_steps: usize,
}

/// Everything the store hands to a manager on save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub flow: String,
    pub form_data: serde_json::Value,
    pub navigation: DraftNavigation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub metadata: DraftMetadata,
    pub form_data: serde_json::Value,
    pub navigation: DraftNavigation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveDraftOptions {
    pub title: String,
    pub description: String,
    /// Overwrite this draft instead of creating a new one.
    pub draft_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadDraftOptions {
    pub restore_form_data: bool,
    pub restore_step_position: bool,
    pub merge_with_current: bool,
}

impl Default for LoadDraftOptions {
    fn default() -> Self {
        Self {
            restore_form_data: true,
            restore_step_position: true,
            merge_with_current: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Pretty-printed JSON envelope.
    Json,
    /// Base64 of a deflate-compressed zip container holding the JSON envelope.
    Compressed,
}

impl ExportFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compressed" | "zip" | "base64" => Some(Self::Compressed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub draft_count: usize,
    pub used_bytes: u64,
    /// `None` when the backend has no quota.
    pub quota_bytes: Option<u64>,
    pub compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftState {
    pub has_draft: bool,
    pub last_saved: Option<DateTime<Utc>>,
    pub auto_save_enabled: bool,
    /// Fallback auto-save interval in milliseconds.
    pub auto_save_interval: u64,
    pub saving: bool,
    pub save_status: SaveStatus,
    pub save_error: Option<String>,
    pub current_draft_id: Option<String>,
    pub available_drafts: Vec<DraftMetadata>,
    pub storage_info: Option<StorageInfo>,
}

impl DraftState {
    pub fn new(auto_save_enabled: bool, auto_save_interval: u64) -> Self {
        Self {
            has_draft: false,
            last_saved: None,
            auto_save_enabled,
            auto_save_interval,
            saving: false,
            save_status: SaveStatus::Idle,
            save_error: None,
            current_draft_id: None,
            available_drafts: Vec::new(),
            storage_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_format_parse_accepts_aliases() {
        assert_eq!(ExportFormat::parse("JSON"), Some(ExportFormat::Json));
        assert_eq!(ExportFormat::parse(" zip "), Some(ExportFormat::Compressed));
        assert_eq!(ExportFormat::parse("yaml"), None);
    }

    #[test]
    fn default_load_options_replace_and_restore() {
        let opts = LoadDraftOptions::default();
        assert!(opts.restore_form_data);
        assert!(opts.restore_step_position);
        assert!(!opts.merge_with_current);
    }

    #[test]
    fn draft_metadata_uses_camel_case() {
        let now = Utc::now();
        let meta = DraftMetadata {
            id: "d1".to_string(),
            created_at: now,
            updated_at: now,
            title: "T".to_string(),
            description: String::new(),
            version: DRAFT_FORMAT_VERSION,
            flow: "project".to_string(),
        };
        let value = serde_json::to_value(&meta).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
    }
}
