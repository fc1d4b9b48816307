//! Chrome launch settings for WebDriver sessions.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::config::WebDriverConfig;

/// Environment variable pointing at the Chrome binary.
pub const CHROME_BIN_ENV: &str = "GOOGLE_CHROME_BIN";
/// Environment variable pointing at the chromedriver executable.
pub const CHROMEDRIVER_ENV: &str = "CHROMEDRIVER_PATH";

/// Install locations probed when no binary is configured.
pub const CHROME_CANDIDATES: [&str; 4] = [
    "/usr/bin/google-chrome",
    "/usr/bin/chromium-browser",
    "/usr/bin/chromium",
    "/opt/google/chrome/google-chrome",
];

const BASE_ARGS: [&str; 9] = [
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-images",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChromeLaunch {
    pub binary: Option<PathBuf>,
    pub args: Vec<String>,
}

impl ChromeLaunch {
    pub fn from_config(config: &WebDriverConfig) -> Self {
        let mut args = Vec::new();
        if config.headless {
            args.push("--headless".to_string());
        }
        args.extend(BASE_ARGS.iter().map(|a| a.to_string()));
        args.push(format!("--window-size={}", config.window_size));
        if !config.user_agent.is_empty() {
            args.push(format!("--user-agent={}", config.user_agent));
        }
        args.extend(config.extra_args.iter().cloned());

        Self {
            binary: resolve_chrome_binary(config.chrome_binary.as_deref()),
            args,
        }
    }

    /// W3C `capabilities` body for a new-session request.
    pub fn capabilities(&self) -> Value {
        let mut chrome_options = json!({ "args": self.args });
        if let Some(binary) = &self.binary {
            chrome_options["binary"] = json!(binary.display().to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": chrome_options,
                }
            }
        })
    }
}

/// Configured path, then `GOOGLE_CHROME_BIN`, then well-known install paths.
/// Only existing files are returned.
pub fn resolve_chrome_binary(configured: Option<&Path>) -> Option<PathBuf> {
    let from_env = std::env::var_os(CHROME_BIN_ENV).map(PathBuf::from);
    configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(from_env)
        .chain(CHROME_CANDIDATES.iter().map(PathBuf::from))
        .find(|p| p.is_file())
}

/// Configured driver path, then `CHROMEDRIVER_PATH` when it exists.
pub fn resolve_driver(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(path.to_path_buf());
    }
    std::env::var_os(CHROMEDRIVER_ENV)
        .map(PathBuf::from)
        .filter(|p| p.is_file())
}
