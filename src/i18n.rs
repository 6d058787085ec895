//! Localized user-facing text.
//!
//! Messages live in `locales/<lang>/main.ftl`. Lookups fall back to en-US
//! when the active language has no translation.

use fluent_templates::fluent_bundle::FluentValue;
use fluent_templates::{static_loader, Loader};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

static_loader! {
    static LOCALES = {
        locales: "locales",
        fallback_language: "en-US",
        customise: |bundle| bundle.set_use_isolating(false),
    };
}

/// Look up a message without arguments.
pub fn text(langid: &LanguageIdentifier, key: &str) -> String {
    LOCALES.lookup(langid, key)
}

/// Look up a message, substituting named string arguments.
pub fn text_with(langid: &LanguageIdentifier, key: &str, values: &[(&'static str, &str)]) -> String {
    let mut args = HashMap::new();
    for (name, value) in values {
        args.insert(*name, FluentValue::from(*value));
    }
    LOCALES.lookup_with_args(langid, key, &args)
}

/// Language for the current process, taken from the usual locale variables.
pub fn resolve_language() -> LanguageIdentifier {
    for key in ["LC_ALL", "LC_MESSAGES", "LANG"] {
        if let Ok(value) = std::env::var(key) {
            if let Some(lang) = normalize_lang(value) {
                if let Ok(langid) = lang.parse::<LanguageIdentifier>() {
                    return langid;
                }
            }
        }
    }
    english()
}

/// The fallback language.
pub fn english() -> LanguageIdentifier {
    unic_langid::langid!("en-US")
}

fn normalize_lang(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    let value = value.split('.').next().unwrap_or(value);
    let value = value.split('@').next().unwrap_or(value);
    let value = value.replace('_', "-");
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::{english, normalize_lang, text, text_with};
    use unic_langid::langid;

    #[test]
    fn normalize_lang_trims_and_normalizes() {
        assert_eq!(
            normalize_lang("en_US.UTF-8".to_string()),
            Some("en-US".to_string())
        );
        assert_eq!(
            normalize_lang("zh_CN.UTF-8@pinyin".to_string()),
            Some("zh-CN".to_string())
        );
        assert_eq!(normalize_lang("".to_string()), None);
    }

    #[test]
    fn text_with_substitutes_without_isolation_marks() {
        let message = text_with(&english(), "export-saved", &[("path", "/tmp/cookies.txt")]);
        assert_eq!(message, "Saved to /tmp/cookies.txt");
    }

    #[test]
    fn chinese_messages_are_available() {
        let message = text(&langid!("zh-CN"), "dialog-done-title");
        assert_eq!(message, "完成");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        let message = text(&langid!("de-DE"), "button-ok");
        assert_eq!(message, "OK");
    }
}
