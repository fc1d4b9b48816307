//! In-memory lead registration form implementing [`AutomationSession`].
//!
//! Used by `--dry-run` and by tests. The form mimics the usual target: a
//! phone input that flags already-registered numbers as soon as they are
//! typed, an address input with a suggestion list, complement, name and
//! e-mail inputs, a submit button and success/error banners.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use log::warn;

use crate::dedup::PhoneNormalizer;
use crate::error::SessionError;
use crate::mapper::CanonicalField;

use super::locator::Locator;
use super::session::{AutomationSession, ElementHandle, Key, SessionFactory};

pub const DEFAULT_TITLE: &str = "Cadastro de Leads";
pub const DEFAULT_DUPLICATE_MESSAGE: &str = "Telefone já cadastrado";
pub const SUCCESS_MESSAGE: &str = "Lead cadastrado com sucesso!";
pub const REQUIRED_MESSAGE: &str = "Preencha os campos obrigatórios";
pub const REJECTED_MESSAGE: &str = "Erro ao salvar o cadastro";

const SUGGESTIONS: [&str; 2] = ["Sugestão 1", "Sugestão 2"];

/// Behaviour switches for the simulated form.
#[derive(Debug, Clone)]
pub struct SimulatedOptions {
    pub title: String,
    /// `create()` fails, as when no browser can be started.
    pub fail_session: bool,
    /// `open()` fails, as when the target is unreachable.
    pub fail_open: bool,
    /// Form inputs that are not rendered at all.
    pub missing_fields: BTreeSet<CanonicalField>,
    /// Inputs rendered but disabled.
    pub disabled_fields: BTreeSet<CanonicalField>,
    pub has_submit: bool,
    /// Show a success banner after a successful submit. When false the form
    /// simply resets without confirmation.
    pub explicit_success: bool,
    pub address_suggestions: bool,
    pub duplicate_message: String,
    /// Phones the target already knows about.
    pub registered_phones: Vec<String>,
    /// Every submit shows an error banner.
    pub reject_submit: bool,
    /// Once this many leads were accepted, the next navigation crashes the
    /// browser and every later call fails.
    pub crash_after_submissions: Option<usize>,
}

impl Default for SimulatedOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            fail_session: false,
            fail_open: false,
            missing_fields: BTreeSet::new(),
            disabled_fields: BTreeSet::new(),
            has_submit: true,
            explicit_success: true,
            address_suggestions: true,
            duplicate_message: DEFAULT_DUPLICATE_MESSAGE.to_string(),
            registered_phones: Vec::new(),
            reject_submit: false,
            crash_after_submissions: None,
        }
    }
}

/// A lead accepted by the simulated form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedLead {
    pub phone: String,
    pub address: String,
    pub complement: String,
    pub owner_name: String,
    pub email: String,
    /// The address came from the suggestion list rather than raw typing.
    pub address_from_suggestion: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Banner {
    None,
    Success,
    Error(String),
}

#[derive(Default)]
struct Inputs {
    phone: String,
    address: String,
    complement: String,
    owner_name: String,
    email: String,
    address_from_suggestion: bool,
}

impl Inputs {
    fn get_mut(&mut self, field: CanonicalField) -> Option<&mut String> {
        match field {
            CanonicalField::Phone => Some(&mut self.phone),
            CanonicalField::Address => Some(&mut self.address),
            CanonicalField::Complement => Some(&mut self.complement),
            CanonicalField::OwnerName => Some(&mut self.owner_name),
            CanonicalField::Email => Some(&mut self.email),
            CanonicalField::HouseNumber => None,
        }
    }

    fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::Phone => &self.phone,
            CanonicalField::Address => &self.address,
            CanonicalField::Complement => &self.complement,
            CanonicalField::OwnerName => &self.owner_name,
            CanonicalField::Email => &self.email,
            CanonicalField::HouseNumber => "",
        }
    }
}

struct FormState {
    options: SimulatedOptions,
    normalizer: PhoneNormalizer,
    loaded: bool,
    crashed: bool,
    inputs: Inputs,
    suggestions_visible: bool,
    banner: Banner,
    registered: BTreeSet<String>,
    submissions: Vec<SubmittedLead>,
    opens: usize,
    sessions_created: usize,
    sessions_closed: usize,
}

type SubmitHook = Arc<dyn Fn(usize) + Send + Sync>;

/// Shared target; every session created from it sees the same registrations.
#[derive(Clone)]
pub struct SimulatedTarget {
    state: Arc<Mutex<FormState>>,
    on_submit: Arc<Mutex<Option<SubmitHook>>>,
}

impl SimulatedTarget {
    pub fn new() -> Self {
        Self::with_options(SimulatedOptions::default())
    }

    pub fn with_options(options: SimulatedOptions) -> Self {
        let normalizer = PhoneNormalizer::default();
        let registered = options
            .registered_phones
            .iter()
            .map(|p| normalizer.normalize(p))
            .collect();
        Self {
            state: Arc::new(Mutex::new(FormState {
                options,
                normalizer,
                loaded: false,
                crashed: false,
                inputs: Inputs::default(),
                suggestions_visible: false,
                banner: Banner::None,
                registered,
                submissions: Vec::new(),
                opens: 0,
                sessions_created: 0,
                sessions_closed: 0,
            })),
            on_submit: Arc::new(Mutex::new(None)),
        }
    }

    /// Called with the running submission count after each accepted submit.
    pub fn on_submit<F>(&self, hook: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let mut slot = self.on_submit.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::new(hook));
    }

    pub fn submissions(&self) -> Vec<SubmittedLead> {
        self.state().submissions.clone()
    }

    pub fn opens(&self) -> usize {
        self.state().opens
    }

    pub fn sessions_created(&self) -> usize {
        self.state().sessions_created
    }

    pub fn sessions_closed(&self) -> usize {
        self.state().sessions_closed
    }

    fn state(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Simulated form state lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for SimulatedTarget {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionFactory for SimulatedTarget {
    async fn create(&self) -> Result<Box<dyn AutomationSession>, SessionError> {
        let mut state = self.state();
        if state.options.fail_session {
            return Err(SessionError::Unavailable(
                "simulated browser failed to start".to_string(),
            ));
        }
        state.sessions_created += 1;
        drop(state);
        Ok(Box::new(SimulatedSession {
            target: self.clone(),
            closed: false,
        }))
    }

    fn describe(&self) -> String {
        "simulated form".to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Input(CanonicalField),
    Suggestion(usize),
    Submit,
    ErrorBanner,
    SuccessBanner,
}

impl ElementKind {
    fn id(&self) -> String {
        match self {
            ElementKind::Input(field) => format!("input-{}", field.as_str()),
            ElementKind::Suggestion(i) => format!("suggestion-{}", i),
            ElementKind::Submit => "submit".to_string(),
            ElementKind::ErrorBanner => "error".to_string(),
            ElementKind::SuccessBanner => "success".to_string(),
        }
    }
}

/// Static attributes of a rendered element, matched against locators.
struct ElementAttrs {
    tag: &'static str,
    input_type: &'static str,
    placeholder: &'static str,
    name: &'static str,
    aria_label: &'static str,
    selectors: &'static [&'static str],
}

fn attrs(kind: ElementKind) -> ElementAttrs {
    let input = |input_type: &'static str, placeholder: &'static str, name: &'static str| ElementAttrs {
        tag: "input",
        input_type,
        placeholder,
        name,
        aria_label: "",
        selectors: &[],
    };
    match kind {
        ElementKind::Input(CanonicalField::Phone) => input("tel", "Telefone", "telefone"),
        ElementKind::Input(CanonicalField::Address) => ElementAttrs {
            aria_label: "Endereço",
            ..input("text", "Endereço", "endereco")
        },
        ElementKind::Input(CanonicalField::Complement) => {
            input("text", "Complemento", "complemento")
        }
        ElementKind::Input(CanonicalField::OwnerName) => input("text", "Nome completo", "nome"),
        ElementKind::Input(CanonicalField::Email) => input("email", "E-mail", "email"),
        ElementKind::Input(CanonicalField::HouseNumber) => input("text", "", ""),
        ElementKind::Suggestion(_) => ElementAttrs {
            tag: "div",
            selectors: &[".pac-item"],
            ..input("", "", "")
        },
        ElementKind::Submit => ElementAttrs {
            tag: "button",
            input_type: "submit",
            selectors: &["button[type='submit']"],
            ..input("", "", "")
        },
        ElementKind::ErrorBanner => ElementAttrs {
            tag: "div",
            selectors: &[".error-message", "[role='alert']"],
            ..input("", "", "")
        },
        ElementKind::SuccessBanner => ElementAttrs {
            tag: "div",
            selectors: &[".alert-success"],
            ..input("", "", "")
        },
    }
}

impl FormState {
    fn rendered(&self) -> Vec<ElementKind> {
        if !self.loaded {
            return Vec::new();
        }
        let mut elements: Vec<ElementKind> = [
            CanonicalField::Phone,
            CanonicalField::Address,
            CanonicalField::Complement,
            CanonicalField::OwnerName,
            CanonicalField::Email,
        ]
        .into_iter()
        .filter(|f| !self.options.missing_fields.contains(f))
        .map(ElementKind::Input)
        .collect();
        elements.extend((0..SUGGESTIONS.len()).map(ElementKind::Suggestion));
        if self.options.has_submit {
            elements.push(ElementKind::Submit);
        }
        elements.push(ElementKind::ErrorBanner);
        elements.push(ElementKind::SuccessBanner);
        elements
    }

    fn resolve(&self, handle: &ElementHandle) -> Option<ElementKind> {
        self.rendered().into_iter().find(|k| k.id() == handle.id())
    }

    fn text_of(&self, kind: ElementKind) -> String {
        match kind {
            ElementKind::Input(field) => self.inputs.get(field).to_string(),
            ElementKind::Suggestion(i) => {
                format!("{} - {}", self.inputs.address, SUGGESTIONS[i])
            }
            ElementKind::Submit => "Cadastrar".to_string(),
            ElementKind::ErrorBanner => match &self.banner {
                Banner::Error(message) => message.clone(),
                _ => String::new(),
            },
            ElementKind::SuccessBanner => match self.banner {
                Banner::Success => SUCCESS_MESSAGE.to_string(),
                _ => String::new(),
            },
        }
    }

    fn visible(&self, kind: ElementKind) -> bool {
        match kind {
            ElementKind::Input(_) | ElementKind::Submit => true,
            ElementKind::Suggestion(_) => self.suggestions_visible,
            ElementKind::ErrorBanner => matches!(self.banner, Banner::Error(_)),
            ElementKind::SuccessBanner => self.banner == Banner::Success,
        }
    }

    fn matches(&self, kind: ElementKind, locator: &Locator) -> bool {
        let a = attrs(kind);
        let contains = |haystack: &str, needle: &str| {
            !haystack.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
        };
        match locator {
            Locator::Css(sel) | Locator::Xpath(sel) => a.selectors.contains(&sel.as_str()),
            Locator::InputType(t) => a.tag == "input" && a.input_type.eq_ignore_ascii_case(t),
            Locator::Placeholder(p) => contains(a.placeholder, p),
            Locator::Name(n) => contains(a.name, n),
            Locator::Id(id) => contains(&kind.id(), id),
            Locator::AriaLabel(label) => contains(a.aria_label, label),
            Locator::ButtonText(text) => a.tag == "button" && contains(&self.text_of(kind), text),
            Locator::Text(text) => {
                !matches!(kind, ElementKind::Input(_)) && contains(&self.text_of(kind), text)
            }
        }
    }

    fn check_phone(&mut self) {
        let normalized = self.normalizer.normalize(&self.inputs.phone);
        if !normalized.is_empty() && self.registered.contains(&normalized) {
            self.banner = Banner::Error(self.options.duplicate_message.clone());
        } else if matches!(self.banner, Banner::Error(_)) {
            self.banner = Banner::None;
        }
    }

    /// Returns the submission count when a lead was accepted.
    fn submit(&mut self) -> Option<usize> {
        if self.options.reject_submit {
            self.banner = Banner::Error(REJECTED_MESSAGE.to_string());
            return None;
        }
        if self.inputs.phone.trim().is_empty() || self.inputs.owner_name.trim().is_empty() {
            self.banner = Banner::Error(REQUIRED_MESSAGE.to_string());
            return None;
        }
        let normalized = self.normalizer.normalize(&self.inputs.phone);
        if self.registered.contains(&normalized) {
            self.banner = Banner::Error(self.options.duplicate_message.clone());
            return None;
        }

        let inputs = std::mem::take(&mut self.inputs);
        self.registered.insert(normalized);
        self.submissions.push(SubmittedLead {
            phone: inputs.phone,
            address: inputs.address,
            complement: inputs.complement,
            owner_name: inputs.owner_name,
            email: inputs.email,
            address_from_suggestion: inputs.address_from_suggestion,
        });
        self.suggestions_visible = false;
        self.banner = if self.options.explicit_success {
            Banner::Success
        } else {
            Banner::None
        };
        Some(self.submissions.len())
    }
}

pub struct SimulatedSession {
    target: SimulatedTarget,
    closed: bool,
}

impl SimulatedSession {
    fn live(&self) -> Result<MutexGuard<'_, FormState>, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let state = self.target.state();
        if state.crashed {
            return Err(SessionError::Unavailable(
                "simulated browser crashed".to_string(),
            ));
        }
        Ok(state)
    }

    fn element(
        &self,
        handle: &ElementHandle,
    ) -> Result<(MutexGuard<'_, FormState>, ElementKind), SessionError> {
        let state = self.live()?;
        match state.resolve(handle) {
            Some(kind) => Ok((state, kind)),
            None => Err(SessionError::Protocol {
                command: "element".to_string(),
                message: format!("no such element: {}", handle.id()),
            }),
        }
    }
}

#[async_trait]
impl AutomationSession for SimulatedSession {
    async fn open(&mut self, _url: &str) -> Result<(), SessionError> {
        let mut state = self.live()?;
        if state.options.fail_open {
            return Err(SessionError::Unavailable(
                "simulated target unreachable".to_string(),
            ));
        }
        if let Some(limit) = state.options.crash_after_submissions {
            if state.submissions.len() >= limit {
                state.crashed = true;
                return Err(SessionError::Unavailable(
                    "simulated browser crashed".to_string(),
                ));
            }
        }
        state.loaded = true;
        state.opens += 1;
        state.inputs = Inputs::default();
        state.suggestions_visible = false;
        state.banner = Banner::None;
        Ok(())
    }

    async fn page_title(&mut self) -> Result<String, SessionError> {
        let state = self.live()?;
        Ok(if state.loaded {
            state.options.title.clone()
        } else {
            String::new()
        })
    }

    async fn page_text(&mut self) -> Result<String, SessionError> {
        let state = self.live()?;
        if !state.loaded {
            return Ok(String::new());
        }
        let mut lines = vec![state.options.title.clone()];
        for kind in state.rendered() {
            if state.visible(kind) && !matches!(kind, ElementKind::Input(_)) {
                lines.push(state.text_of(kind));
            }
        }
        Ok(lines.join("\n"))
    }

    async fn find_elements(
        &mut self,
        locator: &Locator,
    ) -> Result<Vec<ElementHandle>, SessionError> {
        let state = self.live()?;
        Ok(state
            .rendered()
            .into_iter()
            .filter(|kind| state.matches(*kind, locator))
            .map(|kind| ElementHandle(kind.id()))
            .collect())
    }

    async fn is_visible(&mut self, element: &ElementHandle) -> Result<bool, SessionError> {
        let state = self.live()?;
        Ok(state.resolve(element).is_some_and(|kind| state.visible(kind)))
    }

    async fn is_enabled(&mut self, element: &ElementHandle) -> Result<bool, SessionError> {
        let (state, kind) = self.element(element)?;
        Ok(match kind {
            ElementKind::Input(field) => !state.options.disabled_fields.contains(&field),
            _ => true,
        })
    }

    async fn element_text(&mut self, element: &ElementHandle) -> Result<String, SessionError> {
        let (state, kind) = self.element(element)?;
        Ok(state.text_of(kind))
    }

    async fn clear(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        let (mut state, kind) = self.element(element)?;
        if let ElementKind::Input(field) = kind {
            if let Some(value) = state.inputs.get_mut(field) {
                value.clear();
            }
            if field == CanonicalField::Address {
                state.inputs.address_from_suggestion = false;
                state.suggestions_visible = false;
            }
        }
        Ok(())
    }

    async fn type_text(
        &mut self,
        element: &ElementHandle,
        text: &str,
    ) -> Result<(), SessionError> {
        let (mut state, kind) = self.element(element)?;
        let ElementKind::Input(field) = kind else {
            return Ok(());
        };
        if state.options.disabled_fields.contains(&field) {
            return Err(SessionError::Protocol {
                command: "value".to_string(),
                message: "element not interactable".to_string(),
            });
        }

        if text == Key::Enter.code() {
            if field == CanonicalField::Address {
                state.suggestions_visible = false;
            }
            return Ok(());
        }

        if let Some(value) = state.inputs.get_mut(field) {
            value.push_str(text);
        }
        match field {
            CanonicalField::Phone => state.check_phone(),
            CanonicalField::Address => {
                state.suggestions_visible =
                    state.options.address_suggestions && !state.inputs.address.is_empty();
            }
            _ => {}
        }
        Ok(())
    }

    async fn press_key(&mut self, element: &ElementHandle, key: Key) -> Result<(), SessionError> {
        self.type_text(element, key.code()).await
    }

    async fn click(&mut self, element: &ElementHandle) -> Result<(), SessionError> {
        let accepted = {
            let (mut state, kind) = self.element(element)?;
            match kind {
                ElementKind::Suggestion(i) if state.suggestions_visible => {
                    let chosen = state.text_of(ElementKind::Suggestion(i));
                    state.inputs.address = chosen;
                    state.inputs.address_from_suggestion = true;
                    state.suggestions_visible = false;
                    None
                }
                ElementKind::Submit => state.submit(),
                _ => None,
            }
        };

        // The hook runs without the state lock so it may call back into the
        // target or the job controller.
        if let Some(count) = accepted {
            let hook = self
                .target
                .on_submit
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(hook) = hook {
                hook(count);
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut state = self.target.state();
        state.loaded = false;
        state.sessions_closed += 1;
        Ok(())
    }
}
