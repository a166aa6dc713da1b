//! Table and JSON output formatting for CLI commands.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tabled::{Table, Tabled};

use tokenward_entity::session::Session;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Session display row
#[derive(Debug, Serialize, Tabled)]
pub struct SessionRow {
    /// Session ID
    pub id: String,
    /// User ID
    pub user_id: String,
    /// Device
    pub device: String,
    /// Platform
    pub platform: String,
    /// IP Address
    pub ip: String,
    /// Created
    pub created: String,
    /// Expires
    pub expires: String,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
        Self {
            id: s.id.to_string(),
            user_id: s.user_id.to_string(),
            device: or_dash(&s.device_info.device_name),
            platform: or_dash(&s.device_info.platform),
            ip: or_dash(&s.device_info.ip),
            created: format_time(s.created_at),
            expires: format_time(s.expires_at),
        }
    }
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
            println!("{json}");
        }
    }
}

/// Print a single item in the selected format
pub fn print_item<T: Serialize + std::fmt::Debug>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{item:#?}"),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(item).unwrap_or_else(|_| "{}".to_string());
            println!("{json}");
        }
    }
}

/// Print one session with its device details
pub fn print_session(session: &Session, format: OutputFormat) {
    if format == OutputFormat::Json {
        print_item(session, format);
        return;
    }
    let row = SessionRow::from(session);
    let info = &session.device_info;
    let or_dash = |v: &Option<String>| v.as_deref().unwrap_or("-").to_string();

    print_kv("Session", &row.id);
    print_kv("User", &row.user_id);
    print_kv("Device", &row.device);
    print_kv("Model", &or_dash(&info.device_model));
    print_kv("Platform", &row.platform);
    print_kv("Browser", &or_dash(&info.browser));
    print_kv("OS", &or_dash(&info.os));
    print_kv("IP", &row.ip);
    print_kv("Created", &row.created);
    print_kv("Updated", &format_time(session.updated_at));
    print_kv("Expires", &row.expires);
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    eprintln!("⚠ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<12} {}", format!("{key}:"), value);
}

/// RFC 3339 rendering of an instant
pub fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// RFC 3339 rendering of a Unix-seconds claim
pub fn format_unix(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(format_time)
        .unwrap_or_else(|| format!("{secs} (out of range)"))
}

/// RFC 3339 rendering of a Unix-milliseconds instant
pub fn format_unix_millis(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| format!("{millis} (out of range)"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_unix() {
        assert_eq!(format_unix(1_700_000_000), "2023-11-14T22:13:20Z");
        assert!(format_unix(i64::MAX).contains("out of range"));
    }

    #[test]
    fn test_format_unix_millis() {
        assert_eq!(
            format_unix_millis(1_700_000_000_250),
            "2023-11-14T22:13:20.250Z"
        );
    }
}
