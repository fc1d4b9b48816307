use serde::{Deserialize, Serialize};

use crate::automation::Locator;
use crate::mapper::{fold_text, CanonicalField};

/// Where each piece of a lead goes on the target form, and how the form
/// reports the result. Every list is tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormProfile {
    #[serde(default = "default_address")]
    pub address: Vec<Locator>,
    #[serde(default = "default_complement")]
    pub complement: Vec<Locator>,
    #[serde(default = "default_owner_name")]
    pub owner_name: Vec<Locator>,
    #[serde(default = "default_phone")]
    pub phone: Vec<Locator>,
    #[serde(default = "default_email")]
    pub email: Vec<Locator>,
    #[serde(default = "default_submit")]
    pub submit: Vec<Locator>,
    #[serde(default = "default_address_suggestions")]
    pub address_suggestions: Vec<Locator>,
    #[serde(default = "default_success_indicators")]
    pub success_indicators: Vec<Locator>,
    #[serde(default = "default_error_indicators")]
    pub error_indicators: Vec<Locator>,
    /// Messages meaning the phone is already registered on the target.
    #[serde(default = "default_duplicate_phrases")]
    pub duplicate_phrases: Vec<String>,
    /// Written before the complement value, or alone when the lead has none.
    #[serde(default = "default_complement_prefix")]
    pub complement_prefix: String,
}

fn css(s: &str) -> Locator {
    Locator::Css(s.to_string())
}

fn placeholder(s: &str) -> Locator {
    Locator::Placeholder(s.to_string())
}

fn name(s: &str) -> Locator {
    Locator::Name(s.to_string())
}

fn id(s: &str) -> Locator {
    Locator::Id(s.to_string())
}

fn default_address() -> Vec<Locator> {
    vec![
        placeholder("endereço"),
        placeholder("endereco"),
        placeholder("address"),
        name("endereco"),
        name("address"),
        id("address"),
        Locator::AriaLabel("endereço".to_string()),
    ]
}

fn default_complement() -> Vec<Locator> {
    vec![
        placeholder("complemento"),
        placeholder("apartamento"),
        name("complemento"),
        name("complement"),
        id("complement"),
    ]
}

fn default_owner_name() -> Vec<Locator> {
    vec![
        placeholder("nome"),
        placeholder("name"),
        name("nome"),
        name("name"),
        id("name"),
        Locator::AriaLabel("nome".to_string()),
    ]
}

fn default_phone() -> Vec<Locator> {
    vec![
        Locator::InputType("tel".to_string()),
        placeholder("telefone"),
        placeholder("celular"),
        name("telefone"),
        name("celular"),
        name("phone"),
        id("phone"),
    ]
}

fn default_email() -> Vec<Locator> {
    vec![
        Locator::InputType("email".to_string()),
        placeholder("e-mail"),
        placeholder("email"),
        name("email"),
    ]
}

fn default_submit() -> Vec<Locator> {
    vec![
        css("button[type='submit']"),
        Locator::ButtonText("cadastrar".to_string()),
        Locator::ButtonText("salvar".to_string()),
        Locator::ButtonText("enviar".to_string()),
        css("input[type='submit']"),
    ]
}

fn default_address_suggestions() -> Vec<Locator> {
    vec![
        css(".pac-item"),
        css("[role='option']"),
        css(".autocomplete-suggestion"),
    ]
}

fn default_success_indicators() -> Vec<Locator> {
    vec![
        css(".alert-success"),
        css(".toast-success"),
        css(".success-message"),
        Locator::Text("cadastrado com sucesso".to_string()),
    ]
}

fn default_error_indicators() -> Vec<Locator> {
    vec![
        css(".error-message"),
        css(".alert-danger"),
        css(".invalid-feedback"),
        css(".toast-error"),
        css("[role='alert']"),
    ]
}

fn default_duplicate_phrases() -> Vec<String> {
    [
        "já cadastrado",
        "já existe",
        "já registrado",
        "already registered",
        "already exists",
        "duplicado",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_complement_prefix() -> String {
    "Apartamento".to_string()
}

impl Default for FormProfile {
    fn default() -> Self {
        Self {
            address: default_address(),
            complement: default_complement(),
            owner_name: default_owner_name(),
            phone: default_phone(),
            email: default_email(),
            submit: default_submit(),
            address_suggestions: default_address_suggestions(),
            success_indicators: default_success_indicators(),
            error_indicators: default_error_indicators(),
            duplicate_phrases: default_duplicate_phrases(),
            complement_prefix: default_complement_prefix(),
        }
    }
}

impl FormProfile {
    /// Locator list for a record field. The house number has no input of its
    /// own: it is typed together with the address.
    pub fn locators_for(&self, field: CanonicalField) -> &[Locator] {
        match field {
            CanonicalField::Address => &self.address,
            CanonicalField::HouseNumber => &[],
            CanonicalField::Complement => &self.complement,
            CanonicalField::OwnerName => &self.owner_name,
            CanonicalField::Phone => &self.phone,
            CanonicalField::Email => &self.email,
        }
    }

    /// Whether a message announces an already-registered phone. Comparison
    /// ignores case and accents.
    pub fn is_duplicate_message(&self, message: &str) -> bool {
        let message = fold_text(message);
        self.duplicate_phrases
            .iter()
            .map(|p| fold_text(p))
            .any(|p| !p.is_empty() && message.contains(&p))
    }

    /// Value typed into the complement input.
    pub fn complement_value(&self, complement: &str) -> String {
        if complement.is_empty() {
            self.complement_prefix.clone()
        } else {
            format!("{} {}", self.complement_prefix, complement)
        }
    }
}
