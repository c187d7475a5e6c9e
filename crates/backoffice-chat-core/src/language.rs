/// Dictation languages offered to the user: English plus the Nordic languages
pub const SUPPORTED_LANGUAGES: &[(&str, &str)] = &[
    ("en-US", "English (US)"),
    ("en-GB", "English (UK)"),
    ("nb-NO", "Norwegian Bokmål"),
    ("nn-NO", "Norwegian Nynorsk"),
    ("sv-SE", "Swedish"),
    ("da-DK", "Danish"),
    ("fi-FI", "Finnish"),
    ("is-IS", "Icelandic"),
];

pub const FALLBACK_LANGUAGE: &str = "en-US";

pub fn is_supported(tag: &str) -> bool {
    SUPPORTED_LANGUAGES.iter().any(|(code, _)| *code == tag)
}

pub fn display_name(tag: &str) -> Option<&'static str> {
    SUPPORTED_LANGUAGES
        .iter()
        .find(|(code, _)| *code == tag)
        .map(|(_, name)| *name)
}

/// Pick the dictation language for a locale tag such as `sv-SE` or `nb`.
///
/// Exact match first, then the first supported language sharing the primary
/// subtag, then American English.
pub fn default_language(locale: &str) -> &'static str {
    if let Some((code, _)) = SUPPORTED_LANGUAGES.iter().find(|(code, _)| *code == locale) {
        return *code;
    }

    let prefix = locale.split('-').next().unwrap_or_default();
    if !prefix.is_empty() {
        let wanted = format!("{}-", prefix);
        if let Some((code, _)) = SUPPORTED_LANGUAGES
            .iter()
            .find(|(code, _)| code.starts_with(&wanted))
        {
            return *code;
        }
    }

    FALLBACK_LANGUAGE
}

/// Runtime locale from `LC_ALL`, `LC_MESSAGES` or `LANG`, as a BCP 47 tag
pub fn system_locale() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find_map(|value| normalize_posix_locale(&value))
}

/// `nb_NO.UTF-8` -> `nb-NO`; `C` and `POSIX` carry no language
pub fn normalize_posix_locale(value: &str) -> Option<String> {
    let tag = value
        .split(|c: char| c == '.' || c == '@')
        .next()
        .unwrap_or_default()
        .trim()
        .replace('_', "-");

    if tag.is_empty() || tag == "C" || tag == "POSIX" {
        None
    } else {
        Some(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert_eq!(default_language("nn-NO"), "nn-NO");
        assert_eq!(default_language("en-GB"), "en-GB");
    }

    #[test]
    fn test_primary_subtag_match() {
        assert_eq!(default_language("sv-FI"), "sv-SE");
        assert_eq!(default_language("da"), "da-DK");
        assert_eq!(default_language("en-AU"), "en-US");
    }

    #[test]
    fn test_fallback() {
        assert_eq!(default_language("de-DE"), "en-US");
        assert_eq!(default_language(""), "en-US");
    }

    #[test]
    fn test_normalize_posix_locale() {
        assert_eq!(normalize_posix_locale("nb_NO.UTF-8").as_deref(), Some("nb-NO"));
        assert_eq!(normalize_posix_locale("is_IS@euro").as_deref(), Some("is-IS"));
        assert_eq!(normalize_posix_locale("C"), None);
        assert_eq!(normalize_posix_locale("POSIX.UTF-8"), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("fi-FI"), Some("Finnish"));
        assert_eq!(display_name("xx-XX"), None);
        assert!(is_supported("is-IS"));
    }
}
