//! Locator descriptors and the fallback lookup over them.
//!
//! A field carries an ordered list of locators; the first one that yields an
//! element that is visible and enabled wins. Lists are plain data so a form
//! profile can be swapped in from configuration.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::SessionError;

use super::session::{AutomationSession, ElementHandle};

/// Describes how to find one element on the target page.
///
/// Matching on attribute values is case-insensitive substring matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// Raw CSS selector.
    Css(String),
    /// Raw XPath expression.
    Xpath(String),
    /// `<input>` with the given `type` attribute.
    InputType(String),
    Placeholder(String),
    Name(String),
    Id(String),
    AriaLabel(String),
    /// Button (or submit input) whose label contains the text.
    ButtonText(String),
    /// Any element whose own text contains the text.
    Text(String),
}

/// Query understood by a WebDriver `find elements` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZÁÀÂÃÉÊÍÓÔÕÚÇ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyzáàâãéêíóôõúç";

impl Locator {
    pub fn value(&self) -> &str {
        match self {
            Locator::Css(v)
            | Locator::Xpath(v)
            | Locator::InputType(v)
            | Locator::Placeholder(v)
            | Locator::Name(v)
            | Locator::Id(v)
            | Locator::AriaLabel(v)
            | Locator::ButtonText(v)
            | Locator::Text(v) => v,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Locator::Css(_) => "css",
            Locator::Xpath(_) => "xpath",
            Locator::InputType(_) => "input_type",
            Locator::Placeholder(_) => "placeholder",
            Locator::Name(_) => "name",
            Locator::Id(_) => "id",
            Locator::AriaLabel(_) => "aria_label",
            Locator::ButtonText(_) => "button_text",
            Locator::Text(_) => "text",
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.value().trim().is_empty() {
            return Err(format!("{} locator has an empty value", self.kind()));
        }
        Ok(())
    }

    /// Translates the descriptor into a CSS selector or XPath expression.
    pub fn to_query(&self) -> Query {
        match self {
            Locator::Css(css) => Query::Css(css.clone()),
            Locator::Xpath(xpath) => Query::XPath(xpath.clone()),
            Locator::InputType(t) => Query::Css(format!("input[type='{}' i]", css_escape(t))),
            Locator::Placeholder(p) => {
                let p = css_escape(p);
                Query::Css(format!(
                    "input[placeholder*='{p}' i], textarea[placeholder*='{p}' i]"
                ))
            }
            Locator::Name(n) => {
                let n = css_escape(n);
                Query::Css(format!(
                    "input[name*='{n}' i], select[name*='{n}' i], textarea[name*='{n}' i]"
                ))
            }
            Locator::Id(id) => Query::Css(format!("[id*='{}' i]", css_escape(id))),
            Locator::AriaLabel(label) => {
                Query::Css(format!("[aria-label*='{}' i]", css_escape(label)))
            }
            Locator::ButtonText(text) => {
                let needle = xpath_literal(&text.to_lowercase());
                Query::XPath(format!(
                    "//button[contains({}, {needle})] | //input[(@type='submit' or @type='button') and contains({}, {needle})]",
                    lowercase_xpath("normalize-space(.)"),
                    lowercase_xpath("@value"),
                ))
            }
            Locator::Text(text) => {
                let needle = xpath_literal(&text.to_lowercase());
                Query::XPath(format!(
                    "//*[contains({}, {needle})]",
                    lowercase_xpath("normalize-space(.)"),
                ))
            }
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.kind(), self.value())
    }
}

fn lowercase_xpath(expr: &str) -> String {
    format!("translate({}, '{}', '{}')", expr, UPPER, LOWER)
}

fn css_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Quotes a string as an XPath literal, falling back to `concat()` when it
/// contains both quote kinds.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

/// Tries locators in order and returns the first element that is visible and
/// enabled. `Ok(None)` means every locator came up empty.
pub async fn try_locate(
    session: &mut dyn AutomationSession,
    locators: &[Locator],
) -> Result<Option<ElementHandle>, SessionError> {
    scan(session, locators, true).await
}

/// Like [`try_locate`] but only requires visibility (indicators, suggestion
/// entries).
pub async fn find_visible(
    session: &mut dyn AutomationSession,
    locators: &[Locator],
) -> Result<Option<ElementHandle>, SessionError> {
    scan(session, locators, false).await
}

/// Text of every visible element matched by any of the locators.
pub async fn visible_texts(
    session: &mut dyn AutomationSession,
    locators: &[Locator],
) -> Result<Vec<String>, SessionError> {
    let mut texts = Vec::new();
    for locator in locators {
        for element in session.find_elements(locator).await? {
            if session.is_visible(&element).await? {
                let text = session.element_text(&element).await?;
                if !text.trim().is_empty() {
                    texts.push(text.trim().to_string());
                }
            }
        }
    }
    Ok(texts)
}

async fn scan(
    session: &mut dyn AutomationSession,
    locators: &[Locator],
    require_enabled: bool,
) -> Result<Option<ElementHandle>, SessionError> {
    for (locator_index, locator) in locators.iter().enumerate() {
        for element in session.find_elements(locator).await? {
            if !session.is_visible(&element).await? {
                continue;
            }
            if require_enabled && !session.is_enabled(&element).await? {
                continue;
            }
            debug!("Located element via locator #{} ({})", locator_index, locator);
            return Ok(Some(element));
        }
    }
    Ok(None)
}
