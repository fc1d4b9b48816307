use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dedup::PhoneNormalizer;
use crate::submission::FormProfile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub target: TargetConfig,
    #[serde(default)]
    pub timings: TimingsConfig,
    #[serde(default)]
    pub job: JobConfig,
    #[serde(default)]
    pub phone: PhoneNormalizer,
    #[serde(default)]
    pub webdriver: WebDriverConfig,
    /// Replaces the built-in form profile when present.
    #[serde(default)]
    pub form: Option<FormProfile>,
}

impl Config {
    /// Minimal configuration for a target URL, everything else defaulted.
    pub fn for_target(url: impl Into<String>) -> Self {
        Self {
            version: "1.0".to_string(),
            target: TargetConfig {
                url: url.into(),
                probe: String::new(),
                reload_per_record: true,
            },
            timings: TimingsConfig::default(),
            job: JobConfig::default(),
            phone: PhoneNormalizer::default(),
            webdriver: WebDriverConfig::default(),
            form: None,
        }
    }

    pub fn form_profile(&self) -> FormProfile {
        self.form.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub url: String,
    /// Text expected in the page title or body once the form has loaded.
    /// Empty accepts any page that opened.
    #[serde(default)]
    pub probe: String,
    #[serde(default = "default_true")]
    pub reload_per_record: bool,
}

fn default_true() -> bool {
    true
}

/// Settle delays in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingsConfig {
    #[serde(default = "default_page_load_settle")]
    pub page_load_settle: u64,
    #[serde(default = "default_field_settle")]
    pub field_settle: u64,
    #[serde(default = "default_address_settle")]
    pub address_settle: u64,
    #[serde(default = "default_submit_settle")]
    pub submit_settle: u64,
    #[serde(default = "default_inter_record")]
    pub inter_record: u64,
}

fn default_page_load_settle() -> u64 {
    3000
}

fn default_field_settle() -> u64 {
    500
}

fn default_address_settle() -> u64 {
    2000
}

fn default_submit_settle() -> u64 {
    3000
}

fn default_inter_record() -> u64 {
    2000
}

impl Default for TimingsConfig {
    fn default() -> Self {
        Self {
            page_load_settle: default_page_load_settle(),
            field_settle: default_field_settle(),
            address_settle: default_address_settle(),
            submit_settle: default_submit_settle(),
            inter_record: default_inter_record(),
        }
    }
}

impl TimingsConfig {
    /// All delays zero; used by dry runs and tests.
    pub fn immediate() -> Self {
        Self {
            page_load_settle: 0,
            field_settle: 0,
            address_settle: 0,
            submit_settle: 0,
            inter_record: 0,
        }
    }

    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_settle)
    }

    pub fn field(&self) -> Duration {
        Duration::from_millis(self.field_settle)
    }

    pub fn address(&self) -> Duration {
        Duration::from_millis(self.address_settle)
    }

    pub fn submit(&self) -> Duration {
        Duration::from_millis(self.submit_settle)
    }

    pub fn between_records(&self) -> Duration {
        Duration::from_millis(self.inter_record)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    /// Keep the previous job's log lines when a new job starts.
    #[serde(default)]
    pub retain_log_on_restart: bool,
    /// Skip records whose phone repeats within the batch without contacting
    /// the target.
    #[serde(default)]
    pub skip_repeated_phones: bool,
    /// Press Enter in the address field when no suggestion list appears.
    #[serde(default = "default_true")]
    pub confirm_address_with_enter: bool,
}

fn default_log_capacity() -> usize {
    100
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            retain_log_on_restart: false,
            skip_repeated_phones: false,
            confirm_address_with_enter: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverConfig {
    #[serde(default = "default_webdriver_url")]
    pub url: String,
    /// chromedriver executable to spawn; when unset (and `CHROMEDRIVER_PATH`
    /// is unset) a driver is expected to be listening at `url` already.
    #[serde(default)]
    pub driver_path: Option<PathBuf>,
    #[serde(default)]
    pub chrome_binary: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_window_size")]
    pub window_size: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

fn default_window_size() -> String {
    "1920,1080".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_startup_timeout() -> u64 {
    20
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            driver_path: None,
            chrome_binary: None,
            headless: true,
            window_size: default_window_size(),
            user_agent: default_user_agent(),
            extra_args: Vec::new(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"version": "1.0", "target": {"url": "https://example.com/form"}}"#,
        )
        .unwrap();

        assert!(config.target.reload_per_record);
        assert_eq!(config.timings, TimingsConfig::default());
        assert_eq!(config.timings.inter_record, 2000);
        assert_eq!(config.job.log_capacity, 100);
        assert!(config.job.confirm_address_with_enter);
        assert!(!config.job.skip_repeated_phones);
        assert_eq!(config.phone.country_code, "55");
        assert_eq!(config.webdriver.url, "http://localhost:9515");
        assert_eq!(config.webdriver.window_size, "1920,1080");
        assert!(config.form.is_none());
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "version": "1.0",
                "target": {"url": "https://example.com", "probe": "Cadastro"},
                "timings": {"inter_record": 0},
                "phone": {"country_code": "351"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.target.probe, "Cadastro");
        assert_eq!(config.timings.inter_record, 0);
        assert_eq!(config.timings.submit_settle, 3000);
        assert_eq!(config.phone.country_code, "351");
        assert_eq!(config.phone.national_length, 11);
    }
}
