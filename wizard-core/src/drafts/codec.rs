// Draft export/import codec
//
// Exported drafts travel inside an envelope that records the format version and
// a SHA-256 of the draft payload. The compressed form is base64 of a zip
// container holding the JSON envelope.

use crate::error::DraftError;
use crate::models::draft::{Draft, ExportFormat, DRAFT_FORMAT_VERSION};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};

/// Entry name used inside zip containers (exports and compressed draft files).
pub const ARCHIVE_ENTRY: &str = "draft.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEnvelope {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    /// Lowercase hex SHA-256 of the serialized `draft`.
    pub checksum: String,
    pub draft: Draft,
}

pub fn checksum(draft: &Draft) -> Result<String, DraftError> {
    let bytes = serde_json::to_vec(draft)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

pub fn encode(draft: &Draft, format: ExportFormat) -> Result<String, DraftError> {
    let envelope = ExportEnvelope {
        format_version: DRAFT_FORMAT_VERSION,
        exported_at: Utc::now(),
        checksum: checksum(draft)?,
        draft: draft.clone(),
    };
    let json = serde_json::to_string_pretty(&envelope)?;
    match format {
        ExportFormat::Json => Ok(json),
        ExportFormat::Compressed => {
            let bytes = zip_entry(json.as_bytes())?;
            Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

/// Decode and verify an exported draft.
pub fn decode(data: &str, format: ExportFormat) -> Result<Draft, DraftError> {
    let json = match format {
        ExportFormat::Json => data.to_string(),
        ExportFormat::Compressed => {
            let bytes = base64::engine::general_purpose::STANDARD.decode(data.trim())?;
            let raw = unzip_entry(&bytes)?;
            String::from_utf8(raw)
                .map_err(|e| DraftError::InvalidFormat(format!("export is not UTF-8: {}", e)))?
        }
    };

    let envelope: ExportEnvelope = serde_json::from_str(&json)?;
    check_version(envelope.format_version)?;
    check_version(envelope.draft.metadata.version)?;

    let actual = checksum(&envelope.draft)?;
    if !actual.eq_ignore_ascii_case(envelope.checksum.trim()) {
        return Err(DraftError::ChecksumMismatch {
            expected: envelope.checksum,
            actual,
        });
    }
    Ok(envelope.draft)
}

pub fn check_version(found: u32) -> Result<(), DraftError> {
    if found > DRAFT_FORMAT_VERSION {
        return Err(DraftError::UnsupportedVersion {
            found,
            supported: DRAFT_FORMAT_VERSION,
        });
    }
    Ok(())
}

/// Wrap `payload` into a single-entry, deflate-compressed zip.
pub fn zip_entry(payload: &[u8]) -> Result<Vec<u8>, DraftError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    writer.start_file(ARCHIVE_ENTRY, options)?;
    writer.write_all(payload)?;
    Ok(writer.finish()?.into_inner())
}

pub fn unzip_entry(bytes: &[u8]) -> Result<Vec<u8>, DraftError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut entry = archive.by_name(ARCHIVE_ENTRY)?;
    let mut out = Vec::new();
    entry.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::draft::{DraftMetadata, DraftNavigation};
    use serde_json::json;

    fn sample_draft() -> Draft {
        let now = Utc::now();
        Draft {
            metadata: DraftMetadata {
                id: "d-1".to_string(),
                created_at: now,
                updated_at: now,
                title: "My Project".to_string(),
                description: String::new(),
                version: DRAFT_FORMAT_VERSION,
                flow: "project-creation".to_string(),
            },
            form_data: json!({ "generalInfo": { "name": "My Project" } }),
            navigation: DraftNavigation {
                current_step: json!("setup-type"),
                total_steps: 9,
            },
        }
    }

    #[test]
    fn json_export_decodes_to_same_draft() {
        let draft = sample_draft();
        let exported = encode(&draft, ExportFormat::Json).unwrap();
        assert!(exported.contains("\"checksum\""));
        assert_eq!(decode(&exported, ExportFormat::Json).unwrap(), draft);
    }

    #[test]
    fn compressed_export_is_base64_zip() {
        let draft = sample_draft();
        let exported = encode(&draft, ExportFormat::Compressed).unwrap();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&exported)
            .unwrap();
        // Local file header magic.
        assert_eq!(&bytes[..4], b"PK\x03\x04");
        assert_eq!(decode(&exported, ExportFormat::Compressed).unwrap(), draft);
    }

    #[test]
    fn tampered_payload_fails_checksum() {
        let exported = encode(&sample_draft(), ExportFormat::Json).unwrap();
        let tampered = exported.replace("My Project", "Not My Project");
        match decode(&tampered, ExportFormat::Json) {
            Err(DraftError::ChecksumMismatch { .. }) => {}
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
    }

    #[test]
    fn newer_format_version_is_rejected() {
        let mut draft = sample_draft();
        draft.metadata.version = DRAFT_FORMAT_VERSION + 1;
        let exported = encode(&draft, ExportFormat::Json).unwrap();
        assert!(matches!(
            decode(&exported, ExportFormat::Json),
            Err(DraftError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn garbage_input_is_an_error_not_a_panic() {
        assert!(decode("not json", ExportFormat::Json).is_err());
        assert!(matches!(
            decode("%%%", ExportFormat::Compressed),
            Err(DraftError::Decode(_))
        ));
        let not_zip = base64::engine::general_purpose::STANDARD.encode(b"hello");
        assert!(matches!(
            decode(&not_zip, ExportFormat::Compressed),
            Err(DraftError::Archive(_))
        ));
    }
}
