use async_trait::async_trait;

use crate::error::SessionError;

use super::locator::Locator;

/// Opaque reference to an element on the current page. Only valid until the
/// next navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
}

impl Key {
    /// WebDriver key code point.
    pub fn code(&self) -> &'static str {
        match self {
            Key::Enter => "\u{E007}",
        }
    }
}

/// The browser-automation capability the engine drives.
///
/// One session is exclusively owned by one job; implementations need not be
/// safe for concurrent use.
#[async_trait]
pub trait AutomationSession: Send {
    async fn open(&mut self, url: &str) -> Result<(), SessionError>;

    async fn page_title(&mut self) -> Result<String, SessionError>;

    /// Rendered text of the whole page.
    async fn page_text(&mut self) -> Result<String, SessionError>;

    async fn find_elements(&mut self, locator: &Locator)
        -> Result<Vec<ElementHandle>, SessionError>;

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, SessionError>;

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool, SessionError>;

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String, SessionError>;

    async fn clear(&mut self, element: &ElementHandle) -> Result<(), SessionError>;

    async fn type_text(&mut self, element: &ElementHandle, text: &str)
        -> Result<(), SessionError>;

    async fn press_key(&mut self, element: &ElementHandle, key: Key) -> Result<(), SessionError>;

    async fn click(&mut self, element: &ElementHandle) -> Result<(), SessionError>;

    /// Releases the session. Safe to call more than once.
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Creates a fresh session for each job.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn AutomationSession>, SessionError>;

    /// Short description for log lines.
    fn describe(&self) -> String;
}

/// Checks that the loaded page mentions `expected` in its title or body
/// (case-insensitive). An empty expectation accepts any page.
pub async fn probe(
    session: &mut dyn AutomationSession,
    expected: &str,
) -> Result<bool, SessionError> {
    let expected = expected.trim().to_lowercase();
    if expected.is_empty() {
        return Ok(true);
    }
    if session.page_title().await?.to_lowercase().contains(&expected) {
        return Ok(true);
    }
    Ok(session.page_text().await?.to_lowercase().contains(&expected))
}

/// Clears an input and types a value into it.
pub async fn fill(
    session: &mut dyn AutomationSession,
    element: &ElementHandle,
    value: &str,
) -> Result<(), SessionError> {
    session.clear(element).await?;
    session.type_text(element, value).await
}
