//! Translation catalog backed by the `locales/*.yml` files.

use rust_i18n::t;

/// Languages with a catalog file.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "fa"];

/// Language used when a recipient has no (supported) preference.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Renders localized strings. Never fails: unresolvable keys render as the key.
pub trait Catalog: Send + Sync {
    /// Render `key` in `lang`, substituting `%{name}` placeholders from `data`.
    fn render(&self, lang: &str, key: &str, data: &[(&str, &str)]) -> String;
}

/// Reduce a language tag to its base code: `"fa-IR"` becomes `"fa"`.
pub fn normalize_language(code: &str) -> String {
    let base = code
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if base.is_empty() {
        DEFAULT_LANGUAGE.to_string()
    } else {
        base
    }
}

pub fn is_supported_language(code: &str) -> bool {
    let normalized = normalize_language(code);
    SUPPORTED_LANGUAGES.contains(&normalized.as_str())
}

/// Map a client language tag onto a supported language, else the default.
pub fn detect_language(code: &str) -> &'static str {
    let normalized = normalize_language(code);
    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|lang| *lang == normalized)
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Replace every `%{name}` occurrence with its value from `data`.
fn interpolate(template: &str, data: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in data {
        let placeholder = format!("%{{{name}}}");
        if out.contains(&placeholder) {
            out = out.replace(&placeholder, value);
        }
    }
    out
}

/// [`Catalog`] over the compiled-in rust-i18n translations.
#[derive(Debug, Clone)]
pub struct RustI18nCatalog {
    default_language: &'static str,
}

impl RustI18nCatalog {
    pub fn new(default_language: &str) -> Self {
        Self {
            default_language: detect_language(default_language),
        }
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<String> {
        let text = t!(key, locale = lang);
        // rust-i18n echoes the (possibly locale-qualified) key when nothing matches.
        let missing = text == key || text == format!("{lang}.{key}");
        (!missing).then(|| text.into_owned())
    }
}

impl Default for RustI18nCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl Catalog for RustI18nCatalog {
    fn render(&self, lang: &str, key: &str, data: &[(&str, &str)]) -> String {
        let lang = if is_supported_language(lang) {
            detect_language(lang)
        } else {
            self.default_language
        };

        let template = self
            .lookup(lang, key)
            .or_else(|| self.lookup(self.default_language, key));

        match template {
            Some(template) => interpolate(&template, data),
            None => key.to_string(),
        }
    }
}
