use serde::Serialize;

/// Language code used whenever a request does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Meta option accepted at the edges; never sent to the dictionary.
pub const ALL_LANGUAGES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LanguageOption {
    pub code: &'static str,
    pub label: &'static str,
}

/// Languages offered in the search form. Codes match the Free Dictionary API.
pub const LANGUAGE_OPTIONS: &[LanguageOption] = &[
    LanguageOption { code: "en", label: "English" },
    LanguageOption { code: "hi", label: "Hindi" },
    LanguageOption { code: "sa", label: "Sanskrit" },
    LanguageOption { code: "ta", label: "Tamil" },
    LanguageOption { code: "es", label: "Spanish" },
    LanguageOption { code: "fr", label: "French" },
    LanguageOption { code: "de", label: "German" },
    LanguageOption { code: ALL_LANGUAGES, label: "All languages (advanced)" },
];

/// Tags that double as a language hint when listing words.
const LANGUAGE_TAGS: &[(&str, &str)] = &[
    ("english", "en"),
    ("hindi", "hi"),
    ("sanskrit", "sa"),
    ("tamil", "ta"),
    ("french", "fr"),
    ("german", "de"),
    ("spanish", "es"),
];

/// Human-readable label for a language code, or the code itself when unmapped.
pub fn language_label(code: &str) -> &str {
    LANGUAGE_OPTIONS
        .iter()
        .find(|option| option.code == code)
        .map(|option| option.label)
        .unwrap_or(code)
}

/// Maps a requested language onto the code actually sent to the dictionary.
///
/// Blank input and the `all` option both collapse to [`DEFAULT_LANGUAGE`];
/// there is no multi-language lookup behind the `all` label.
pub fn resolve_language(code: &str) -> &str {
    let code = code.trim();
    if code.is_empty() || code == ALL_LANGUAGES {
        DEFAULT_LANGUAGE
    } else {
        code
    }
}

/// Guesses a word's language from its tags. First language-name tag wins.
pub fn language_from_tags<S: AsRef<str>>(tags: &[S]) -> &'static str {
    tags.iter()
        .find_map(|tag| {
            LANGUAGE_TAGS
                .iter()
                .find(|(name, _)| *name == tag.as_ref())
                .map(|(_, code)| *code)
        })
        .unwrap_or(DEFAULT_LANGUAGE)
}
