use serde::{Deserialize, Serialize};
use std::fmt;

/// Language requested for recognition
///
/// `Auto` expands to the configured language order; anything else is a
/// locale code passed through to the providers (`en`, `ml`, `en-IN`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LanguageHint {
    #[default]
    Auto,
    Locale(String),
}

impl LanguageHint {
    /// Languages to attempt, in order
    pub fn candidates(&self, auto_order: &[String]) -> Vec<String> {
        match self {
            LanguageHint::Auto => auto_order.to_vec(),
            LanguageHint::Locale(code) => vec![code.clone()],
        }
    }
}

impl From<String> for LanguageHint {
    fn from(value: String) -> Self {
        LanguageHint::from(value.as_str())
    }
}

impl From<&str> for LanguageHint {
    fn from(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("auto") {
            LanguageHint::Auto
        } else {
            LanguageHint::Locale(value.to_ascii_lowercase())
        }
    }
}

impl From<LanguageHint> for String {
    fn from(hint: LanguageHint) -> Self {
        hint.to_string()
    }
}

impl fmt::Display for LanguageHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageHint::Auto => write!(f, "auto"),
            LanguageHint::Locale(code) => write!(f, "{}", code),
        }
    }
}

/// Malayalam Unicode block
const MALAYALAM: std::ops::RangeInclusive<char> = '\u{0D00}'..='\u{0D7F}';

/// Guess the language of a text from its script
///
/// Returns `Some("ml")` when Malayalam characters are present and `None`
/// for everything else (Latin text is ambiguous).
pub fn detect_script_language(text: &str) -> Option<&'static str> {
    text.chars().any(|c| MALAYALAM.contains(&c)).then_some("ml")
}

/// Primary subtag of a locale code (`en-IN` -> `en`)
pub fn base_language(code: &str) -> &str {
    code.split(['-', '_']).next().unwrap_or(code)
}
