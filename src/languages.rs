//! Supported speech languages.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

const LANGUAGES: &[Language] = &[
    Language { code: "en", name: "English" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "it", name: "Italian" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "ru", name: "Russian" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "zh", name: "Chinese" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "hi", name: "Hindi" },
];

pub fn all() -> &'static [Language] {
    LANGUAGES
}

pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code.eq_ignore_ascii_case(code))
}

/// Human-readable name, or the code itself for languages outside the table.
pub fn display_name(code: &str) -> &str {
    find(code).map_or(code, |l| l.name)
}

/// Language tag understood by the speech endpoint.
pub fn tts_code(code: &str) -> &str {
    match code {
        "zh" => "zh-CN",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find("ES").map(|l| l.name), Some("Spanish"));
        assert!(find("xx").is_none());
    }

    #[test]
    fn unknown_codes_display_as_themselves() {
        assert_eq!(display_name("ja"), "Japanese");
        assert_eq!(display_name("tlh"), "tlh");
    }

    #[test]
    fn chinese_uses_regional_tag() {
        assert_eq!(tts_code("zh"), "zh-CN");
        assert_eq!(tts_code("fr"), "fr");
    }
}
