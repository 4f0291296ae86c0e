use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::batch::BatchConfig;
use crate::error::TrackerError;
use crate::time_utils::TimezoneHandler;

/// Directory under `$HOME` holding subtrack's state files.
pub const CONFIG_DIR_NAME: &str = ".subtrack";

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Subscription cost, staleness and expiry report
#[derive(Parser, Debug, Clone)]
#[command(
    name = "subtrack",
    about = "Subscription cost, staleness and expiry report",
    version
)]
pub struct Settings {
    /// Subscription data: a JSON/JSONL file or a directory of them
    #[arg(long, env = "SUBTRACK_DATA")]
    pub data: Option<PathBuf>,

    /// Days without use before a subscription is stale
    #[arg(long, default_value = "7", value_parser = clap::value_parser!(u32).range(1..=3650))]
    pub stale_days: u32,

    /// Days ahead to look for upcoming due dates
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(0..=3650))]
    pub expiry_days: u32,

    /// Timezone for displayed dates (auto-detected if not specified)
    #[arg(long, default_value = "auto")]
    pub timezone: String,

    /// Currency symbol used in the text report
    #[arg(long, default_value = "₹")]
    pub currency: String,

    /// Report format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Only analyse subscriptions owned by this user id
    #[arg(long)]
    pub user: Option<String>,

    /// Evaluate as of this instant (RFC 3339) instead of the current time
    #[arg(long, value_parser = parse_instant)]
    pub now: Option<DateTime<Utc>>,

    /// Also send near-expiry alerts to the notification sink
    #[arg(long)]
    pub notify_expiry: bool,

    /// Suppress repeat notifications for the same subscription within N hours (0 = off)
    #[arg(long, default_value = "0", value_parser = parse_cooldown_hours)]
    pub cooldown_hours: f64,

    /// Append notifications as JSON lines to this file
    #[arg(long)]
    pub outbox: Option<PathBuf>,

    /// Re-run the batch every N seconds until interrupted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub watch: Option<u64>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

/// Longest accepted cooldown: one year.
const MAX_COOLDOWN_HOURS: f64 = 24.0 * 366.0;

fn parse_cooldown_hours(s: &str) -> Result<f64, String> {
    let hours: f64 = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if !(0.0..=MAX_COOLDOWN_HOURS).contains(&hours) {
        return Err(format!("cooldown must be between 0 and {MAX_COOLDOWN_HOURS} hours"));
    }
    Ok(hours)
}

fn parse_instant(s: &str) -> Result<DateTime<Utc>, TrackerError> {
    TimezoneHandler::default()
        .parse_timestamp(s)
        .ok_or_else(|| TrackerError::TimestampParse(s.to_string()))
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used parameters saved to `~/.subtrack/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl LastUsedParams {
    /// Default path: `~/.subtrack/last_used.json`.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// The config path rooted at `base_dir`.
    pub fn config_path_in(base_dir: &Path) -> PathBuf {
        base_dir.join(CONFIG_DIR_NAME).join("last_used.json")
    }

    /// Load persisted params; `Default` when the file is absent or unreadable.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &Path) -> Result<(), std::io::Error> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments, merge persisted values for anything not
    /// given explicitly, resolve `"auto"` values, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] with explicit arguments and
    /// config path.
    pub fn load_with_last_used_impl(args: Vec<std::ffi::OsString>, config_path: &Path) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "failed to clear saved configuration");
            }
            return Self::resolve_auto_values(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins; `user`, `now` and `watch` are per-invocation only.
        if !is_arg_explicitly_set(&matches, "data") && settings.data.is_none() {
            settings.data = last.data;
        }
        if !is_arg_explicitly_set(&matches, "stale_days") {
            if let Some(v) = last.stale_days {
                settings.stale_days = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "expiry_days") {
            if let Some(v) = last.expiry_days {
                settings.expiry_days = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "timezone") {
            if let Some(v) = last.timezone {
                settings.timezone = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "currency") {
            if let Some(v) = last.currency {
                settings.currency = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "format") {
            if let Some(v) = last.format {
                settings.format = v;
            }
        }

        settings = Self::resolve_auto_values(settings);

        if let Err(e) = LastUsedParams::from(&settings).save_to(config_path) {
            tracing::warn!(error = %e, path = %config_path.display(), "failed to persist settings");
        }

        settings
    }

    /// Resolve `"auto"` sentinels and apply `--debug`.
    fn resolve_auto_values(mut settings: Settings) -> Settings {
        if settings.timezone == "auto" {
            settings.timezone = crate::time_utils::get_system_timezone();
        }
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    /// Reject values clap cannot check on its own.
    pub fn validate(&self) -> crate::error::Result<()> {
        if !TimezoneHandler::validate_timezone(&self.timezone) {
            return Err(TrackerError::Config(format!(
                "unknown timezone '{}'",
                self.timezone
            )));
        }
        if self.currency.trim().is_empty() {
            return Err(TrackerError::Config("currency symbol is empty".to_string()));
        }
        Ok(())
    }

    /// Core-facing configuration derived from the CLI values.
    pub fn batch_config(&self) -> BatchConfig {
        BatchConfig {
            stale_after_days: self.stale_days,
            expiry_window_days: self.expiry_days,
            timezone: self.timezone.clone(),
        }
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            data: s.data.clone(),
            stale_days: Some(s.stale_days),
            expiry_days: Some(s.expiry_days),
            timezone: Some(s.timezone.clone()),
            currency: Some(s.currency.clone()),
            format: Some(s.format.clone()),
        }
    }
}

/// `true` when `name` was supplied on the command line itself, not through a
/// default value or environment variable.
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn args(list: &[&str]) -> Vec<std::ffi::OsString> {
        std::iter::once("subtrack")
            .chain(list.iter().copied())
            .map(Into::into)
            .collect()
    }

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["subtrack"]);
        assert!(settings.data.is_none() || std::env::var_os("SUBTRACK_DATA").is_some());
        assert_eq!(settings.stale_days, 7);
        assert_eq!(settings.expiry_days, 3);
        assert_eq!(settings.timezone, "auto");
        assert_eq!(settings.currency, "₹");
        assert_eq!(settings.format, "text");
        assert!(settings.user.is_none());
        assert!(settings.now.is_none());
        assert!(!settings.notify_expiry);
        assert_eq!(settings.cooldown_hours, 0.0);
        assert!(settings.watch.is_none());
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_parse_now_override() {
        let settings = Settings::parse_from(["subtrack", "--now", "2024-01-25T00:00:00Z"]);
        assert_eq!(
            settings.now,
            Some(Utc.with_ymd_and_hms(2024, 1, 25, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_settings_rejects_bad_now() {
        assert!(Settings::try_parse_from(["subtrack", "--now", "yesterday"]).is_err());
    }

    #[test]
    fn test_settings_rejects_zero_stale_days() {
        assert!(Settings::try_parse_from(["subtrack", "--stale-days", "0"]).is_err());
    }

    #[test]
    fn test_settings_cooldown_bounds() {
        let settings = Settings::parse_from(["subtrack", "--cooldown-hours", "12.5"]);
        assert_eq!(settings.cooldown_hours, 12.5);
        assert!(Settings::try_parse_from(["subtrack", "--cooldown-hours", "-1"]).is_err());
        assert!(Settings::try_parse_from(["subtrack", "--cooldown-hours", "NaN"]).is_err());
        assert!(Settings::try_parse_from(["subtrack", "--cooldown-hours", "1e30"]).is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_timezone() {
        let settings = Settings::parse_from(["subtrack", "--timezone", "Mars/Olympus"]);
        assert!(matches!(settings.validate(), Err(TrackerError::Config(_))));

        let settings = Settings::parse_from(["subtrack", "--timezone", "Asia/Kolkata"]);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_settings_rejects_unknown_format() {
        assert!(Settings::try_parse_from(["subtrack", "--format", "xml"]).is_err());
    }

    #[test]
    fn test_batch_config_from_settings() {
        let settings = Settings::parse_from([
            "subtrack",
            "--stale-days",
            "14",
            "--expiry-days",
            "5",
            "--timezone",
            "Asia/Kolkata",
        ]);
        let config = settings.batch_config();
        assert_eq!(config.stale_after_days, 14);
        assert_eq!(config.expiry_window_days, 5);
        assert_eq!(config.timezone, "Asia/Kolkata");
    }

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            data: Some(PathBuf::from("/srv/subs.json")),
            stale_days: Some(10),
            expiry_days: Some(2),
            timezone: Some("Europe/Berlin".to_string()),
            currency: Some("€".to_string()),
            format: Some("json".to_string()),
        };
        params.save_to(&path).expect("save");
        assert_eq!(LastUsedParams::load_from(&path), params);
    }

    #[test]
    fn test_last_used_params_default_when_missing_or_corrupt() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(LastUsedParams::load_from(&path), LastUsedParams::default());
    }

    #[test]
    fn test_load_with_last_used_merges_persisted_values() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            stale_days: Some(30),
            timezone: Some("UTC".to_string()),
            currency: Some("$".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(args(&[]), &config_path);
        assert_eq!(settings.stale_days, 30);
        assert_eq!(settings.currency, "$");
        assert_eq!(settings.timezone, "UTC");
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            stale_days: Some(30),
            timezone: Some("UTC".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(args(&["--stale-days", "5"]), &config_path);
        assert_eq!(settings.stale_days, 5);
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            args(&["--expiry-days", "9", "--timezone", "UTC"]),
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.expiry_days, Some(9));
        assert_eq!(loaded.timezone, Some("UTC".to_string()));
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            currency: Some("£".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(args(&["--clear"]), &config_path);
        assert!(!config_path.exists());
        assert_eq!(settings.currency, "₹");
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            args(&["--debug", "--timezone", "UTC"]),
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_auto_timezone_is_resolved() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(args(&[]), &tmp_config_path(&tmp));
        assert_ne!(settings.timezone, "auto");
        assert!(!settings.timezone.is_empty());
    }
}
