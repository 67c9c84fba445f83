use anyhow::Result;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "project-wizard";

/// Resolve the per-user data folder (absolute path)
pub fn resolve_data_folder() -> PathBuf {
    // Prefer the platform data dir (~/.local/share, %LOCALAPPDATA%, ...)
    if let Some(dir) = dirs::data_local_dir() {
        return dir.join(APP_DIR);
    }

    // Fallback: current working directory
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(format!(".{}", APP_DIR))
}

/// Resolve the drafts folder, creating it if needed.
pub fn resolve_drafts_folder(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| resolve_data_folder().join("drafts"));
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create drafts folder {:?}: {}", dir, e))?;
    Ok(dir)
}

/// Resolve the log folder, creating it if needed.
pub fn resolve_log_folder(configured: Option<&Path>) -> Result<PathBuf> {
    let dir = configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| resolve_data_folder().join("logs"));
    std::fs::create_dir_all(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to create log folder {:?}: {}", dir, e))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_folders_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let drafts = tmp.path().join("a").join("drafts");
        let resolved = resolve_drafts_folder(Some(&drafts)).unwrap();
        assert_eq!(resolved, drafts);
        assert!(drafts.is_dir());

        let logs = tmp.path().join("logs");
        assert_eq!(resolve_log_folder(Some(&logs)).unwrap(), logs);
        assert!(logs.is_dir());
    }

    #[test]
    fn data_folder_is_app_scoped() {
        let dir = resolve_data_folder();
        assert!(dir.to_string_lossy().contains(APP_DIR));
    }
}
