use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Fixed schema every uploaded spreadsheet is mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Address,
    HouseNumber,
    Complement,
    OwnerName,
    Phone,
    Email,
}

impl CanonicalField {
    /// All canonical fields in mapping order.
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::Address,
        CanonicalField::HouseNumber,
        CanonicalField::Complement,
        CanonicalField::OwnerName,
        CanonicalField::Phone,
        CanonicalField::Email,
    ];

    /// Fields a row must carry to become a record.
    pub const REQUIRED: [CanonicalField; 3] = [
        CanonicalField::OwnerName,
        CanonicalField::Address,
        CanonicalField::Phone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Address => "address",
            CanonicalField::HouseNumber => "houseNumber",
            CanonicalField::Complement => "complement",
            CanonicalField::OwnerName => "ownerName",
            CanonicalField::Phone => "phone",
            CanonicalField::Email => "email",
        }
    }

    /// Accepted header synonyms, already folded (lowercase, no diacritics).
    ///
    /// Order matters only for readability; matching is per header, left to right.
    pub fn synonyms(&self) -> &'static [&'static str] {
        match self {
            CanonicalField::Address => &["endereco", "address", "logradouro", "rua", "street"],
            CanonicalField::HouseNumber => &["numero", "number", "num", "nro", "no.", "nº", "n°"],
            CanonicalField::Complement => &["complemento", "complement", "apartamento", "apto"],
            CanonicalField::OwnerName => &[
                "nome",
                "name",
                "proprietario",
                "owner",
                "cliente",
                "responsavel",
            ],
            CanonicalField::Phone => &[
                "telefone", "celular", "phone", "whatsapp", "fone", "mobile", "tel",
            ],
            CanonicalField::Email => &["e-mail", "email", "mail", "correio"],
        }
    }

    /// Whether a record cannot be meaningfully submitted without this field.
    pub fn is_required_for_submission(&self) -> bool {
        matches!(self, CanonicalField::Phone | CanonicalField::OwnerName)
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Folds text for header comparison: strips line breaks and diacritics,
/// lowercases and trims.
pub fn fold_text(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
        .nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .trim()
        .to_string()
}
