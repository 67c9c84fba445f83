// Logging utilities
// Structured logging with JSON and human-readable formats
//
// Log lines use the `[PHASE: ...] [STEP: ...]` prefix convention; the
// formatters below lift those tags into dedicated fields.

use log::Level;
use serde_json::json;
use std::collections::HashMap;

/// Mask a webhook URL. Hooks usually embed their secret in the path or query,
/// so only scheme and host survive.
pub fn mask_webhook_url(raw: &str) -> String {
    let s = raw.trim();
    if s.is_empty() {
        return String::new();
    }
    match url::Url::parse(s) {
        Ok(u) => match u.host_str() {
            Some(host) if u.path() == "/" && u.query().is_none() => {
                format!("{}://{}/", u.scheme(), host)
            }
            Some(host) => format!("{}://{}/***", u.scheme(), host),
            None => "***".to_string(),
        },
        Err(_) => "***".to_string(),
    }
}

/// Replace values of secret-looking keys inside a JSON document, recursively.
/// Used before form data is written to logs or transcripts.
pub fn redact_json(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let norm = k.to_ascii_lowercase();
                let redacted = if is_secret_key(&norm) {
                    match v {
                        serde_json::Value::String(s) if s.is_empty() => json!(""),
                        serde_json::Value::Null => serde_json::Value::Null,
                        _ => json!("***"),
                    }
                } else if norm.contains("webhook") {
                    match v {
                        serde_json::Value::String(s) => json!(mask_webhook_url(s)),
                        other => redact_json(other),
                    }
                } else {
                    redact_json(v)
                };
                out.insert(k.clone(), redacted);
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(redact_json).collect())
        }
        other => other.clone(),
    }
}

fn is_secret_key(normalized_key: &str) -> bool {
    normalized_key == "password"
        || normalized_key == "pwd"
        || normalized_key.contains("secret")
        || normalized_key.contains("token")
}

/// Parse phase and step from log message
/// Extracts [PHASE: ...] and [STEP: ...] patterns
pub fn parse_log_metadata(message: &str) -> (Option<String>, Option<String>, String) {
    let mut phase = None;
    let mut step = None;
    let mut cleaned_message = message.to_string();

    if let Some(start) = message.find("[PHASE:") {
        if let Some(end) = message[start..].find(']') {
            let phase_str = &message[start + 7..start + end].trim();
            phase = Some(phase_str.to_string());
            cleaned_message = format!("{} {}", &message[..start], &message[start + end + 1..])
                .trim()
                .to_string();
        }
    }

    if let Some(start) = cleaned_message.find("[STEP:") {
        if let Some(end) = cleaned_message[start..].find(']') {
            let step_str = &cleaned_message[start + 6..start + end].trim();
            step = Some(step_str.to_string());
            cleaned_message = format!(
                "{} {}",
                &cleaned_message[..start],
                &cleaned_message[start + end + 1..]
            )
            .trim()
            .to_string();
        }
    }

    (phase, step, cleaned_message)
}

/// Format log entry as JSON for structured logging
pub fn format_json_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
    details: Option<&HashMap<String, serde_json::Value>>,
) -> String {
    let mut log_entry = json!({
        "timestamp": timestamp,
        "level": level.as_str(),
        "target": target,
        "message": message,
    });

    if let Some(phase) = phase {
        log_entry["phase"] = json!(phase);
    }

    if let Some(step) = step {
        log_entry["step"] = json!(step);
    }

    if let Some(details) = details {
        log_entry["details"] = json!(details);
    }

    serde_json::to_string(&log_entry).unwrap_or_else(|_| "{}".to_string())
}

/// Format log entry as human-readable text
pub fn format_human_readable_log(
    timestamp: &str,
    level: Level,
    target: &str,
    message: &str,
    phase: Option<&str>,
    step: Option<&str>,
) -> String {
    let mut log_line = format!("[{}] [{}]", timestamp, level.as_str());

    if let Some(phase) = phase {
        log_line.push_str(&format!(" [PHASE: {}]", phase));
    }

    if let Some(step) = step {
        log_line.push_str(&format!(" [STEP: {}]", step));
    }

    log_line.push_str(&format!(" [{}] {}", target, message));
    log_line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_url_keeps_host_only() {
        let masked = mask_webhook_url("https://hooks.example.com/services/T000/B000/XXXX?x=1");
        assert_eq!(masked, "https://hooks.example.com/***");
        assert!(!masked.contains("XXXX"));
        assert_eq!(mask_webhook_url("not a url"), "***");
        assert_eq!(mask_webhook_url(""), "");
    }

    #[test]
    fn redact_json_hides_passwords_and_secrets() {
        let doc = json!({
            "databaseAuth": {
                "username": "svc_app",
                "password": "hunter2hunter2",
                "secretReference": "vault://kv/app"
            },
            "notifications": { "webhookUrl": "https://hooks.example.com/abc/def" },
            "list": [{ "apiToken": "t" }]
        });
        let out = redact_json(&doc);
        assert_eq!(out["databaseAuth"]["username"], "svc_app");
        assert_eq!(out["databaseAuth"]["password"], "***");
        assert_eq!(out["databaseAuth"]["secretReference"], "***");
        assert_eq!(
            out["notifications"]["webhookUrl"],
            "https://hooks.example.com/***"
        );
        assert_eq!(out["list"][0]["apiToken"], "***");
        assert!(!out.to_string().contains("hunter2"));
    }

    #[test]
    fn redact_json_keeps_empty_secret_empty() {
        let out = redact_json(&json!({ "password": "" }));
        assert_eq!(out["password"], "");
    }

    #[test]
    fn parse_log_metadata_extracts_phase_and_step() {
        let (phase, step, msg) =
            parse_log_metadata("[PHASE: drafts] [STEP: auto_save] Saved draft d-1");
        assert_eq!(phase.as_deref(), Some("drafts"));
        assert_eq!(step.as_deref(), Some("auto_save"));
        assert_eq!(msg, "Saved draft d-1");
    }

    #[test]
    fn parse_log_metadata_without_tags_is_passthrough() {
        let (phase, step, msg) = parse_log_metadata("plain message");
        assert!(phase.is_none());
        assert!(step.is_none());
        assert_eq!(msg, "plain message");
    }

    #[test]
    fn format_json_log_includes_optional_fields() {
        let line = format_json_log(
            "2026-01-01T00:00:00Z",
            Level::Info,
            "project_wizard",
            "hello",
            Some("navigation"),
            Some("go_to_step"),
            None,
        );
        let v: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(v["level"], "INFO");
        assert_eq!(v["phase"], "navigation");
        assert_eq!(v["step"], "go_to_step");
        assert!(v.get("details").is_none());
    }

    #[test]
    fn human_readable_log_layout() {
        let line = format_human_readable_log(
            "2026-01-01 00:00:00.000",
            Level::Warn,
            "t",
            "m",
            Some("p"),
            None,
        );
        assert_eq!(line, "[2026-01-01 00:00:00.000] [WARN] [PHASE: p] [t] m");
    }
}
