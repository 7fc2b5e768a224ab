//! crates/readwithme_core/src/languages.rs
//!
//! The languages a reading guide can be shown in.

use crate::ports::{PortError, PortResult};

/// Language every source guide is generated in.
pub const SOURCE_LANGUAGE: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub label: &'static str,
    pub native: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "en", label: "English", native: "English" },
    Language { code: "te", label: "Telugu", native: "తెలుగు" },
    Language { code: "hi", label: "Hindi", native: "हिन्दी" },
    Language { code: "ta", label: "Tamil", native: "தமிழ்" },
    Language { code: "mr", label: "Marathi", native: "मराठी" },
];

/// Looks up a supported language. Unknown codes are rejected instead of being
/// passed through to a generation prompt.
pub fn lookup(code: &str) -> PortResult<&'static Language> {
    let code = code.trim();
    SUPPORTED_LANGUAGES
        .iter()
        .find(|lang| lang.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| PortError::Validation(format!("Unsupported language code '{}'", code)))
}

pub fn is_source(code: &str) -> bool {
    code.trim().eq_ignore_ascii_case(SOURCE_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_supported_languages() {
        assert_eq!(lookup("hi").unwrap().label, "Hindi");
        assert_eq!(lookup("TA").unwrap().label, "Tamil");
        assert!(is_source("en"));
        assert!(!is_source("mr"));
    }

    #[test]
    fn rejects_unknown_codes() {
        assert!(matches!(lookup("fr"), Err(PortError::Validation(_))));
        assert!(matches!(lookup(""), Err(PortError::Validation(_))));
    }
}
