// Layered settings
//
// Precedence (lowest first): built-in defaults, optional TOML file, environment
// variables prefixed `PROJECT_WIZARD` with `__` between nested keys, e.g.
// `PROJECT_WIZARD_AUTO_SAVE__DEBOUNCE_MS=500`.

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_PREFIX: &str = "PROJECT_WIZARD";
pub const CONFIG_PATH_ENV: &str = "PROJECT_WIZARD_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "project-wizard.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WizardSettings {
    pub auto_save: AutoSaveSettings,
    pub drafts: DraftSettings,
    pub execution: ExecutionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveSettings {
    pub enabled: bool,
    /// Quiet period after the last edit before a save fires.
    pub debounce_ms: u64,
    /// Upper bound on staleness while edits keep resetting the debounce.
    pub interval_ms: u64,
}

impl Default for AutoSaveSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 2_000,
            interval_ms: 30_000,
        }
    }
}

impl AutoSaveSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftSettings {
    /// Defaults to `<data dir>/project-wizard/drafts`.
    pub directory: Option<PathBuf>,
    pub compress: bool,
    /// 0 disables the quota.
    pub max_storage_bytes: u64,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            directory: None,
            compress: false,
            max_storage_bytes: 5 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSettings {
    pub tick_delay_ms: u64,
    pub progress_increment: u8,
    pub base_url: String,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            tick_delay_ms: 200,
            progress_increment: 10,
            base_url: "https://projects.example.com".to_string(),
            retry_attempts: 0,
            retry_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `error` | `warn` | `info` | `debug` | `trace`
    pub level: String,
    pub stdout: bool,
    /// Defaults to `<data dir>/project-wizard/logs`.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            stdout: false,
            directory: None,
        }
    }
}

impl LoggingSettings {
    pub fn level_filter(&self) -> log::LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" | "warning" => log::LevelFilter::Warn,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }
}

impl WizardSettings {
    /// Load settings from `path` (or `$PROJECT_WIZARD_CONFIG`, or
    /// `./project-wizard.toml` when present) layered with the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let mut builder = Config::builder();
        match explicit {
            Some(p) => {
                builder = builder.add_source(File::from(p).format(FileFormat::Toml).required(true));
            }
            None => {
                builder = builder.add_source(
                    File::with_name(DEFAULT_CONFIG_FILE)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Load from a TOML string only (no environment). Used by tests and `--print-config`.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let s = WizardSettings::default();
        assert!(s.auto_save.enabled);
        assert_eq!(s.auto_save.debounce(), Duration::from_secs(2));
        assert_eq!(s.auto_save.interval(), Duration::from_secs(30));
        assert_eq!(s.execution.progress_increment, 10);
        assert_eq!(s.logging.level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn toml_overrides_only_given_keys() {
        let s = WizardSettings::from_toml_str(
            r#"
            [auto_save]
            debounce_ms = 500

            [drafts]
            compress = true
            "#,
        )
        .unwrap();
        assert_eq!(s.auto_save.debounce_ms, 500);
        assert_eq!(s.auto_save.interval_ms, 30_000);
        assert!(s.drafts.compress);
        assert_eq!(s.drafts.max_storage_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn load_reads_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wizard.toml");
        std::fs::write(&path, "[execution]\ntick_delay_ms = 5\nretry_attempts = 2\n").unwrap();
        let s = WizardSettings::load(Some(&path)).unwrap();
        assert_eq!(s.execution.tick_delay_ms, 5);
        assert_eq!(s.execution.retry_attempts, 2);
    }

    #[test]
    fn load_fails_for_missing_explicit_file() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(WizardSettings::load(Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn settings_render_back_to_toml() {
        let rendered = WizardSettings::default().to_toml_string().unwrap();
        let parsed = WizardSettings::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed, WizardSettings::default());
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let logging = LoggingSettings {
            level: "chatty".to_string(),
            ..LoggingSettings::default()
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }
}
