//! Browser automation capability: session trait, locators, and the two
//! implementations (W3C WebDriver and the in-memory simulated form).

pub mod browser;
pub mod locator;
pub mod session;
pub mod simulated;
pub mod webdriver;

pub use browser::ChromeLaunch;
pub use locator::{find_visible, try_locate, visible_texts, Locator, Query};
pub use session::{fill, probe, AutomationSession, ElementHandle, Key, SessionFactory};
pub use simulated::{SimulatedOptions, SimulatedTarget, SubmittedLead};
pub use webdriver::{WebDriverFactory, WebDriverSession};
