use std::collections::HashSet;

use serde::Serialize;

use crate::tables::{country_for_lang, region_for_country, PRIORITY_LANGS, REGION_ORDER};

/// Language code for caller-supplied literal strings.
pub const UNDETERMINED_LANG: &str = "und";

/// One string to render and the language it is written in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TextUnit {
    pub text: String,
    pub lang: String,
}

impl TextUnit {
    pub fn new(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            lang: lang.into(),
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::new(text, UNDETERMINED_LANG)
    }

    /// Identity used for de-duplication: trimmed, lowercased text.
    pub fn dedup_key(&self) -> String {
        self.text.trim().to_lowercase()
    }
}

/// Drop units whose text matches an earlier unit case-insensitively after
/// trimming. First occurrence wins; order is preserved.
pub fn dedup_units(units: Vec<TextUnit>) -> Vec<TextUnit> {
    let mut seen = HashSet::with_capacity(units.len());
    units
        .into_iter()
        .filter(|unit| seen.insert(unit.dedup_key()))
        .collect()
}

/// Split a comma-separated literal list into `und` units, dropping blanks.
pub fn parse_text_array(raw: &str) -> Vec<TextUnit> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(TextUnit::literal)
        .collect()
}

/// Total order key `(priority_index, region_index, lang_code)`. Codes absent
/// from a list sort after every listed code.
pub fn lang_sort_key(lang: &str) -> (usize, usize, String) {
    let priority = PRIORITY_LANGS
        .iter()
        .position(|candidate| *candidate == lang)
        .unwrap_or(PRIORITY_LANGS.len());

    let country = country_for_lang(lang).unwrap_or("global");
    let region = region_for_country(country).unwrap_or("Global");
    let region_index = REGION_ORDER
        .iter()
        .position(|candidate| *candidate == region)
        .unwrap_or(REGION_ORDER.len());

    (priority, region_index, lang.to_owned())
}

pub fn sort_by_language(units: &mut [TextUnit]) {
    units.sort_by_cached_key(|unit| lang_sort_key(&unit.lang));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_is_case_and_whitespace_insensitive() {
        let units = vec![
            TextUnit::new("Hello", "en"),
            TextUnit::new("HELLO ", "en"),
            TextUnit::new("Hola", "es"),
        ];
        let deduped = dedup_units(units);
        assert_eq!(
            deduped,
            vec![TextUnit::new("Hello", "en"), TextUnit::new("Hola", "es")]
        );
    }

    #[test]
    fn dedup_ignores_language_when_text_matches() {
        let deduped = dedup_units(vec![
            TextUnit::new("Amor", "es"),
            TextUnit::new("amor", "pt"),
        ]);
        assert_eq!(deduped, vec![TextUnit::new("Amor", "es")]);
    }

    #[test]
    fn dedup_lowercases_non_ascii() {
        let deduped = dedup_units(vec![
            TextUnit::new("ПРИВЕТ", "ru"),
            TextUnit::new("привет", "uk"),
        ]);
        assert_eq!(deduped.len(), 1);
    }

    #[test]
    fn text_array_trims_and_skips_blanks() {
        let units = parse_text_array("你好, Hola,, Hello ,");
        let texts = units.iter().map(|unit| unit.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, vec!["你好", "Hola", "Hello"]);
        assert!(units.iter().all(|unit| unit.lang == UNDETERMINED_LANG));
    }

    #[test]
    fn priority_languages_sort_first_then_region_then_code() {
        let mut units = vec![
            TextUnit::new("Halo", "id"),
            TextUnit::new("Hallo", "nl"),
            TextUnit::new("Hola", "es"),
            TextUnit::new("Hello", "en"),
            TextUnit::new("Salut", "zz"),
            TextUnit::new("Hej", "sv"),
        ];
        sort_by_language(&mut units);
        let langs = units.iter().map(|unit| unit.lang.as_str()).collect::<Vec<_>>();
        assert_eq!(langs, vec!["en", "es", "nl", "sv", "id", "zz"]);
    }

    #[test]
    fn unknown_language_key_is_past_every_list() {
        let (priority, region, code) = lang_sort_key("xx");
        assert_eq!(priority, PRIORITY_LANGS.len());
        assert_eq!(region, REGION_ORDER.iter().position(|r| *r == "Global").unwrap());
        assert_eq!(code, "xx");
    }
}
