//! W3C WebDriver client over HTTP (chromedriver or any compatible endpoint).

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::process::{Child, Command};

use crate::config::WebDriverConfig;
use crate::error::SessionError;
use crate::sanitize;

use super::browser::{resolve_driver, ChromeLaunch, CHROME_CANDIDATES};
use super::locator::{Locator, Query};
use super::session::{AutomationSession, ElementHandle, Key, SessionFactory};

/// Key under which W3C drivers return element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(250);

const PAGE_TEXT_SCRIPT: &str = "return document.body ? document.body.innerText : '';";

fn create_http_client() -> Result<Client, SessionError> {
    Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| SessionError::Unavailable(format!("Failed to create HTTP client: {}", e)))
}

pub struct WebDriverSession {
    client: Client,
    base_url: String,
    session_id: Option<String>,
    driver: Option<Child>,
}

impl WebDriverSession {
    /// Starts (or connects to) a driver and opens a new browser session.
    pub async fn start(config: &WebDriverConfig) -> Result<Self, SessionError> {
        let client = create_http_client()?;
        let base_url = config.url.trim_end_matches('/').to_string();
        let launch = ChromeLaunch::from_config(config);

        let driver = match resolve_driver(config.driver_path.as_deref()) {
            Some(path) => {
                if launch.binary.is_none() {
                    return Err(SessionError::DriverLaunch(format!(
                        "Chrome not found (checked configured path, $GOOGLE_CHROME_BIN, {})",
                        CHROME_CANDIDATES.join(", ")
                    )));
                }
                Some(spawn_driver(&path, &base_url)?)
            }
            None => None,
        };

        let mut session = Self {
            client,
            base_url,
            session_id: None,
            driver,
        };

        let timeout = Duration::from_secs(config.startup_timeout_secs);
        if let Err(e) = session.wait_until_ready(timeout).await {
            session.shutdown_driver().await;
            return Err(e);
        }

        let created = session
            .send(Method::POST, "/session", Some(launch.capabilities()))
            .await;
        let value = match created {
            Ok(value) => value,
            Err(e) => {
                session.shutdown_driver().await;
                return Err(e);
            }
        };

        let Some(id) = value["sessionId"].as_str() else {
            session.shutdown_driver().await;
            return Err(SessionError::Protocol {
                command: "new session".to_string(),
                message: "response carried no sessionId".to_string(),
            });
        };
        info!(
            "WebDriver session {} started at {}",
            id,
            sanitize::redact_url(&session.base_url)
        );
        session.session_id = Some(id.to_string());
        Ok(session)
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), SessionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.send(Method::GET, "/status", None).await {
                Ok(value) if value["ready"].as_bool().unwrap_or(true) => return Ok(()),
                Ok(_) => debug!("WebDriver endpoint reachable but not ready yet"),
                Err(e) if tokio::time::Instant::now() >= deadline => {
                    return Err(SessionError::Unavailable(format!(
                        "WebDriver endpoint {} not ready after {:?}: {}",
                        sanitize::redact_url(&self.base_url),
                        timeout,
                        e
                    )))
                }
                Err(e) => debug!("WebDriver endpoint not reachable yet: {}", e),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::Unavailable(format!(
                    "WebDriver endpoint {} not ready after {:?}",
                    sanitize::redact_url(&self.base_url),
                    timeout
                )));
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }

    async fn send(
        &self,
        method: Method,
        command: &str,
        body: Option<Value>,
    ) -> Result<Value, SessionError> {
        let url = format!("{}{}", self.base_url, command);
        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() {
            return Err(protocol_error(command, &payload));
        }
        Ok(payload.get("value").cloned().unwrap_or(Value::Null))
    }

    async fn session_command(
        &self,
        method: Method,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, SessionError> {
        let id = self.session_id.as_deref().ok_or(SessionError::Closed)?;
        self.send(method, &format!("/session/{}{}", id, suffix), body)
            .await
    }

    async fn element_command(
        &self,
        method: Method,
        element: &ElementHandle,
        suffix: &str,
        body: Option<Value>,
    ) -> Result<Value, SessionError> {
        self.session_command(
            method,
            &format!("/element/{}{}", element.id(), suffix),
            body,
        )
        .await
    }

    async fn shutdown_driver(&mut self) {
        if let Some(mut child) = self.driver.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to stop chromedriver: {}", e);
            }
        }
    }
}

#[async_trait]
impl AutomationSession for WebDriverSession {
    async fn open(&mut self, url: &str) -> Result<(), SessionError> {
        self.session_command(Method::POST, "/url", Some(json!({ "url": url })))
            .await
            .map(|_| ())
    }

    async fn page_title(&mut self) -> Result<String, SessionError> {
        let value = self.session_command(Method::GET, "/title", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_text(&mut self) -> Result<String, SessionError> {
        let value = self
            .session_command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": PAGE_TEXT_SCRIPT, "args": [] })),
            )
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn find_elements(
        &mut self,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError> {
        let (using, value) = match locator.to_query() {
            Query::Css(css) => ("css selector", css),
            Query::XPath(xpath) => ("xpath", xpath),
        };
        let found = self
            .session_command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        Ok(parse_elements(&found))
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, SessionError> {
        match self
            .element_command(Method::GET, element, "/displayed", None)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) if is_detached(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool, SessionError> {
        match self
            .element_command(Method::GET, element, "/enabled", None)
            .await
        {
            Ok(value) => Ok(value.as_bool().unwrap_or(false)),
            Err(e) if is_detached(&e) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String, SessionError> {
        let value = self
            .element_command(Method::GET, element, "/text", None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        self.element_command(Method::POST, element, "/clear", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn type_text(
        &mut self,
        element: &ElementHandle,
        text: &str,
    ) -> Result<(), SessionError> {
        self.element_command(Method::POST, element, "/value", Some(json!({ "text": text })))
            .await
            .map(|_| ())
    }

    async fn press_key(&mut self, element: &ElementHandle, key: Key) -> Result<(), SessionError> {
        self.type_text(element, key.code()).await
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        self.element_command(Method::POST, element, "/click", Some(json!({})))
            .await
            .map(|_| ())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        let result = match self.session_id.take() {
            Some(id) => self
                .send(Method::DELETE, &format!("/session/{}", id), None)
                .await
                .map(|_| ()),
            None => Ok(()),
        };
        self.shutdown_driver().await;
        result
    }
}

/// Opens WebDriver sessions with the configured browser settings.
pub struct WebDriverFactory {
    config: WebDriverConfig,
}

impl WebDriverFactory {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn create(&self) -> Result<Box<dyn AutomationSession>, SessionError> {
        let session = WebDriverSession::start(&self.config).await?;
        Ok(Box::new(session))
    }

    fn describe(&self) -> String {
        format!("WebDriver at {}", sanitize::redact_url(&self.config.url))
    }
}

fn spawn_driver(path: &Path, base_url: &str) -> Result<Child, SessionError> {
    let port = reqwest::Url::parse(base_url)
        .ok()
        .and_then(|u| u.port_or_known_default())
        .ok_or_else(|| {
            SessionError::DriverLaunch(format!("cannot derive a port from '{}'", base_url))
        })?;

    info!(
        "Starting chromedriver {} on port {}",
        sanitize::redact_path(path),
        port
    );
    Command::new(path)
        .arg(format!("--port={}", port))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SessionError::DriverLaunch(format!("{}: {}", path.display(), e)))
}

fn parse_elements(value: &Value) -> Vec<ElementHandle> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item[ELEMENT_KEY].as_str())
                .map(|id| ElementHandle(id.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn protocol_error(command: &str, payload: &Value) -> SessionError {
    let error = payload["value"]["error"].as_str().unwrap_or("unknown error");
    let message = payload["value"]["message"].as_str().unwrap_or_default();
    SessionError::Protocol {
        command: command.to_string(),
        message: format!("{}: {}", error, message),
    }
}

/// Element went away between lookup and use (page re-rendered).
fn is_detached(error: &SessionError) -> bool {
    matches!(
        error,
        SessionError::Protocol { message, .. }
            if message.starts_with("stale element reference")
                || message.starts_with("no such element")
    )
}
