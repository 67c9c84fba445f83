// Field-level validation helpers shared by the flow validators.
//
// Each helper either answers a yes/no question or returns a user-facing message
// describing the first problem found. None of them log or allocate regexes more
// than once.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

// Owner ids are one letter followed by six digits (e.g. A123456).
static OWNER_ID_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][0-9]{6}$").expect("owner id regex should compile"));

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
        .expect("email regex should compile")
});

static REPOSITORY_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]{0,99}$").expect("repository regex should compile")
});

static PROJECT_NAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _\-.]*$").expect("project name regex should compile")
});

static IDENTIFIER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile"));

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

pub fn is_valid_owner_id(value: &str) -> bool {
    OWNER_ID_REGEX.is_match(value.trim())
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value.trim())
}

pub fn is_valid_repository_name(value: &str) -> bool {
    let v = value.trim();
    REPOSITORY_NAME_REGEX.is_match(v) && !v.ends_with(".git")
}

pub fn is_valid_project_name(value: &str) -> bool {
    PROJECT_NAME_REGEX.is_match(value.trim())
}

/// Schema and other SQL identifiers (unquoted).
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_REGEX.is_match(value.trim())
}

/// Validate an absolute http(s) URL. Returns the parsed URL so callers can
/// inspect scheme or host.
pub fn parse_http_url(value: &str) -> Result<Url, String> {
    let url = Url::parse(value.trim()).map_err(|e| format!("Invalid URL: {}", e))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("Unsupported URL scheme '{}'", other)),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("URL must include a host".to_string());
    }
    Ok(url)
}

/// Validate database name (SQL Server)
pub fn validate_sql_server_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Database name cannot be empty".to_string());
    }

    if name.len() > 128 {
        return Err("Database name cannot exceed 128 characters".to_string());
    }

    if name.starts_with(' ') || name.ends_with(' ') {
        return Err("Database name cannot start or end with spaces".to_string());
    }

    let invalid_chars = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    if name.chars().any(|c| invalid_chars.contains(&c)) {
        return Err("Database name contains invalid characters".to_string());
    }

    Ok(())
}

/// Validate database name (PostgreSQL)
pub fn validate_postgres_database_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Database name cannot be empty".to_string());
    }

    if name.len() > 63 {
        return Err("Database name cannot exceed 63 characters".to_string());
    }

    if name.contains('\0') {
        return Err("Database name cannot contain null bytes".to_string());
    }

    Ok(())
}

/// Engine-aware database name check. Unknown engines get the stricter
/// PostgreSQL length limit.
pub fn validate_database_name(engine: &str, name: &str) -> Result<(), String> {
    match engine.trim().to_ascii_lowercase().as_str() {
        "sqlserver" | "mssql" => validate_sql_server_database_name(name),
        _ => validate_postgres_database_name(name),
    }
}

/// Lowercase, dash-separated form of a name, suitable for URLs.
pub fn slugify(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut last_dash = true;
    for c in value.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// First value that appears more than once (case-insensitive, trimmed).
pub fn first_duplicate<'a, I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = std::collections::HashSet::new();
    for v in values {
        let key = v.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        if !seen.insert(key.clone()) {
            return Some(v.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_id_requires_letter_and_six_digits() {
        assert!(is_valid_owner_id("A123456"));
        assert!(is_valid_owner_id(" z000001 "));
        assert!(!is_valid_owner_id("123456"));
        assert!(!is_valid_owner_id("AB12345"));
        assert!(!is_valid_owner_id("A1234567"));
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("team@example.com"));
        assert!(!is_valid_email("team@example"));
        assert!(!is_valid_email("not an email"));
    }

    #[test]
    fn repository_name_rules() {
        assert!(is_valid_repository_name("payments-service"));
        assert!(is_valid_repository_name("svc.v2"));
        assert!(!is_valid_repository_name("-leading-dash"));
        assert!(!is_valid_repository_name("has space"));
        assert!(!is_valid_repository_name("repo.git"));
    }

    #[test]
    fn parse_http_url_rejects_other_schemes() {
        assert!(parse_http_url("https://hooks.example.com/x").is_ok());
        assert!(parse_http_url("ftp://example.com").is_err());
        assert!(parse_http_url("example.com").is_err());
    }

    #[test]
    fn database_names_follow_engine_limits() {
        let long_63 = "a".repeat(64);
        assert!(validate_database_name("postgres", &long_63).is_err());
        assert!(validate_database_name("sqlserver", &long_63).is_ok());
        assert!(validate_database_name("sqlserver", "bad|name").is_err());
        assert!(validate_database_name("postgres", "").is_err());
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("My Project"), "my-project");
        assert_eq!(slugify("  Payments -- API v2! "), "payments-api-v2");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn first_duplicate_is_case_insensitive() {
        assert_eq!(
            first_duplicate(["dev", "Prod", "prod"].iter().copied()),
            Some("prod".to_string())
        );
        assert_eq!(first_duplicate(["a", "b"].iter().copied()), None);
    }
}
