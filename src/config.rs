use std::net::SocketAddr;
use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "TabbyCare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A dose is classified missed once it is this far past its scheduled time.
pub const DEFAULT_GRACE_MINUTES: i64 = 120;

/// Dispatch sweep period.
pub const DISPATCH_INTERVAL_SECS: u64 = 60;

/// Missed-dose detector period.
pub const MISSED_CHECK_INTERVAL_SECS: u64 = 60 * 60;

/// Weekly summary fires on this weekday at this local hour.
pub const WEEKLY_SUMMARY_WEEKDAY: chrono::Weekday = chrono::Weekday::Mon;
pub const WEEKLY_SUMMARY_HOUR: u32 = 9;

/// Trailing window for the weekly summary email.
pub const WEEKLY_SUMMARY_DAYS: i64 = 7;

/// Default trailing window for ad hoc adherence queries.
pub const DEFAULT_ADHERENCE_DAYS: i64 = 30;

/// Longest regimen accepted, in days. Drug-resistant TB courses run up to 24 months.
pub const MAX_REGIMEN_DAYS: i64 = 731;

/// Default page size for `GET /notifications`.
pub const DEFAULT_NOTIFICATION_LIMIT: u32 = 50;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_APP_URL: &str = "http://localhost:5173";
const DEFAULT_EMAIL_FROM: &str = "TabbyCare <noreply@tabbycare.app>";

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "tabbycare=info,tabbycare_lib=info,tower_http=warn"
}

/// Get the application data directory
/// ~/TabbyCare/ on all platforms
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default database location
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("tabbycare.db")
}

/// Outbound email provider settings. `endpoint = None` means log-only delivery.
#[derive(Debug, Clone, Default)]
pub struct EmailConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
    pub timeout_secs: u64,
}

/// Runtime configuration, read from `TABBYCARE_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub grace_minutes: i64,
    pub app_url: String,
    pub email: EmailConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment in production, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("TABBYCARE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);

        let bind_raw = lookup("TABBYCARE_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "TABBYCARE_BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let grace_minutes = match lookup("TABBYCARE_GRACE_MINUTES") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(v) if v > 0 => v,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "TABBYCARE_GRACE_MINUTES",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_GRACE_MINUTES,
        };

        let email = EmailConfig {
            endpoint: lookup("TABBYCARE_EMAIL_ENDPOINT").filter(|s| !s.trim().is_empty()),
            api_key: lookup("TABBYCARE_EMAIL_API_KEY"),
            from: lookup("TABBYCARE_EMAIL_FROM").unwrap_or_else(|| DEFAULT_EMAIL_FROM.into()),
            timeout_secs: 15,
        };

        Ok(Self {
            db_path,
            bind_addr,
            grace_minutes,
            app_url: lookup("TABBYCARE_APP_URL").unwrap_or_else(|| DEFAULT_APP_URL.into()),
            email,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            grace_minutes: DEFAULT_GRACE_MINUTES,
            app_url: DEFAULT_APP_URL.into(),
            email: EmailConfig {
                from: DEFAULT_EMAIL_FROM.into(),
                timeout_secs: 15,
                ..EmailConfig::default()
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_empty() {
        let config = AppConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.grace_minutes, 120);
        assert_eq!(config.bind_addr.port(), 5000);
        assert!(config.email.endpoint.is_none());
        assert!(config.db_path.ends_with("tabbycare.db"));
    }

    #[test]
    fn overrides_are_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("TABBYCARE_BIND_ADDR", "0.0.0.0:8080"),
            ("TABBYCARE_GRACE_MINUTES", "90"),
            ("TABBYCARE_EMAIL_ENDPOINT", "https://mail.example/send"),
            ("TABBYCARE_DB_PATH", "/tmp/tc.db"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.grace_minutes, 90);
        assert_eq!(config.email.endpoint.as_deref(), Some("https://mail.example/send"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/tc.db"));
    }

    #[test]
    fn blank_email_endpoint_means_log_only() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("TABBYCARE_EMAIL_ENDPOINT", "  ")])).unwrap();
        assert!(config.email.endpoint.is_none());
    }

    #[test]
    fn invalid_bind_addr_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("TABBYCARE_BIND_ADDR", "nope")]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: "TABBYCARE_BIND_ADDR", .. })));
    }

    #[test]
    fn non_positive_grace_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("TABBYCARE_GRACE_MINUTES", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn app_name_is_tabbycare() {
        assert_eq!(APP_NAME, "TabbyCare");
    }
}
