use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::schema::ALL_LANGUAGES;
use crate::units::{sort_by_language, TextUnit};

/// Produces the ordered `(text, lang)` units for a word.
pub trait TranslationSource {
    fn translate(&self, text: &str, languages: &[String]) -> Result<Vec<TextUnit>>;
}

/// Local catalog loaded from `translations.json`:
/// `{ "hello": { "en": "Hello", "es": "Hola" } }`.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    words: BTreeMap<String, BTreeMap<String, String>>,
}

impl JsonCatalog {
    /// A missing file is an empty catalog; every word then falls back to
    /// itself in English.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "no translation catalog");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read translations {}", path.display()))?;
        let catalog = Self::from_json(&contents)
            .with_context(|| format!("failed to parse translations {}", path.display()))?;
        info!(words = catalog.words.len(), "loaded translation catalog");
        Ok(catalog)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let words = serde_json::from_str(contents)?;
        Ok(Self { words })
    }
}

/// `"Hello!"` → `"hello"`.
pub fn lookup_key(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(['!', '.'])
        .to_owned()
}

impl TranslationSource for JsonCatalog {
    fn translate(&self, text: &str, languages: &[String]) -> Result<Vec<TextUnit>> {
        let Some(entries) = self.words.get(&lookup_key(text)) else {
            debug!(text, "word not in catalog, using it as English");
            return Ok(vec![TextUnit::new(text, "en")]);
        };

        let mut units = if languages.is_empty() || languages.iter().any(|lang| lang == ALL_LANGUAGES) {
            entries
                .iter()
                .map(|(lang, translated)| TextUnit::new(translated.as_str(), lang.as_str()))
                .collect::<Vec<_>>()
        } else {
            let english = entries.get("en").map_or(text, String::as_str);
            let mut units = vec![TextUnit::new(english, "en")];
            for lang in languages.iter().filter(|lang| lang.as_str() != "en") {
                match entries.get(lang) {
                    Some(translated) => units.push(TextUnit::new(translated.as_str(), lang.as_str())),
                    None => debug!(text, lang = %lang, "no catalog entry for language"),
                }
            }
            units
        };

        sort_by_language(&mut units);
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CATALOG: &str = r#"{
        "hello": { "fr": "Bonjour", "en": "Hello", "ja": "こんにちは", "es": "Hola", "nl": "Hallo" }
    }"#;

    fn langs(units: &[TextUnit]) -> Vec<&str> {
        units.iter().map(|unit| unit.lang.as_str()).collect()
    }

    #[test]
    fn all_languages_sorted_by_priority() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let units = catalog.translate("Hello!", &["all".to_owned()]).unwrap();
        assert_eq!(langs(&units), vec!["en", "es", "fr", "ja", "nl"]);
    }

    #[test]
    fn explicit_list_adds_english_and_skips_missing() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let requested = vec!["nl".to_owned(), "en".to_owned(), "sw".to_owned(), "es".to_owned()];
        let units = catalog.translate("hello", &requested).unwrap();
        assert_eq!(langs(&units), vec!["en", "es", "nl"]);
        assert_eq!(units[0].text, "Hello");
    }

    #[test]
    fn unknown_word_is_itself_in_english() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let units = catalog.translate("Gracias", &["all".to_owned()]).unwrap();
        assert_eq!(units, vec![TextUnit::new("Gracias", "en")]);
    }

    #[test]
    fn missing_file_is_empty_catalog() {
        let dir = tempdir().unwrap();
        let catalog = JsonCatalog::load(&dir.path().join("translations.json")).unwrap();
        let units = catalog.translate("hello", &["all".to_owned()]).unwrap();
        assert_eq!(units, vec![TextUnit::new("hello", "en")]);
    }

    #[test]
    fn lookup_key_strips_trailing_punctuation() {
        assert_eq!(lookup_key("  Love. "), "love");
        assert_eq!(lookup_key("HELLO!!"), "hello");
    }
}
