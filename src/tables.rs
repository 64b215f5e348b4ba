//! Static lookup tables: language → country, language → font, script
//! ranges, and the ordering lists used to sort languages.
//!
//! Everything here is immutable process-lifetime data. Lookups are linear
//! scans over small `const` slices.

/// ISO 639 language code → country folder name.
pub const LANG_TO_COUNTRY: &[(&str, &str)] = &[
    ("en", "united_states"),
    ("es", "spain"),
    ("fr", "france"),
    ("de", "germany"),
    ("it", "italy"),
    ("pt", "brazil"),
    ("ru", "russia"),
    ("ja", "japan"),
    ("ko", "south_korea"),
    ("zh", "china"),
    ("hi", "india"),
    ("ar", "saudi_arabia"),
    ("bn", "bangladesh"),
    ("pa", "india"),
    ("jv", "indonesia"),
    ("te", "india"),
    ("vi", "vietnam"),
    ("mr", "india"),
    ("ta", "india"),
    ("tr", "turkey"),
    ("ur", "pakistan"),
    ("pl", "poland"),
    ("uk", "ukraine"),
    ("nl", "netherlands"),
    ("el", "greece"),
    ("th", "thailand"),
    ("sv", "sweden"),
    ("da", "denmark"),
    ("fi", "finland"),
    ("no", "norway"),
    ("he", "israel"),
    ("id", "indonesia"),
    ("ms", "malaysia"),
    ("hu", "hungary"),
    ("cs", "czech_republic"),
    ("ro", "romania"),
    ("sk", "slovakia"),
    ("bg", "bulgaria"),
    ("hr", "croatia"),
    ("sr", "serbia"),
    ("sl", "slovenia"),
    ("et", "estonia"),
    ("lv", "latvia"),
    ("lt", "lithuania"),
    ("fa", "iran"),
    ("sw", "kenya"),
    ("tl", "philippines"),
    ("is", "iceland"),
    ("ga", "ireland"),
    ("cy", "united_kingdom"),
    ("gd", "united_kingdom"),
    ("lb", "luxembourg"),
    ("mt", "malta"),
    ("sq", "albania"),
    ("hy", "armenia"),
    ("az", "azerbaijan"),
    ("ka", "georgia"),
    ("kk", "kazakhstan"),
    ("ky", "kyrgyzstan"),
    ("tg", "tajikistan"),
    ("tk", "turkmenistan"),
    ("uz", "uzbekistan"),
    ("mn", "mongolia"),
    ("bo", "china"),
    ("my", "myanmar"),
    ("km", "cambodia"),
    ("lo", "laos"),
    ("ml", "india"),
    ("kn", "india"),
    ("si", "sri_lanka"),
    ("ne", "nepal"),
    ("ps", "afghanistan"),
    ("ku", "iraq"),
    ("am", "ethiopia"),
    ("yo", "nigeria"),
    ("ig", "nigeria"),
    ("zu", "south_africa"),
    ("xh", "south_africa"),
    ("af", "south_africa"),
    ("mi", "new_zealand"),
    ("haw", "united_states"),
    ("sm", "samoa"),
    ("to", "tonga"),
    ("fj", "fiji"),
    ("eo", "global"),
    ("ca", "spain"),
    ("gl", "spain"),
    ("eu", "spain"),
    ("oc", "france"),
    ("br", "france"),
    ("co", "france"),
    ("fy", "netherlands"),
    ("hsb", "germany"),
    ("csb", "poland"),
    ("tt", "russia"),
    ("ba", "russia"),
    ("ce", "russia"),
    ("cv", "russia"),
    ("udm", "russia"),
    ("mhr", "russia"),
    ("sah", "russia"),
    ("gn", "paraguay"),
    ("qu", "peru"),
    ("ay", "bolivia"),
    ("nah", "mexico"),
    ("yua", "mexico"),
];

/// Language code → dedicated font file (relative to the fonts directory).
pub const FONT_MAP: &[(&str, &str)] = &[
    ("zh", "NotoSansSC-Regular.otf"),
    ("ja", "NotoSansJP-Regular.otf"),
    ("ko", "NotoSansKR-Regular.otf"),
    ("my", "NotoSansMyanmar-Regular.ttf"),
    ("hi", "NotoSansDevanagari-Regular.ttf"),
    ("mr", "NotoSansDevanagari-Regular.ttf"),
    ("ne", "NotoSansDevanagari-Regular.ttf"),
    ("ar", "NotoSansArabic-Regular.ttf"),
    ("ur", "NotoSansArabic-Regular.ttf"),
    ("fa", "NotoSansArabic-Regular.ttf"),
    ("ps", "NotoSansArabic-Regular.ttf"),
    ("bn", "NotoSansBengali-Regular.ttf"),
    ("gu", "NotoSansGujarati-Regular.ttf"),
    ("th", "NotoSansThai-Regular.ttf"),
    ("he", "NotoSansHebrew-Regular.ttf"),
    ("ta", "NotoSansTamil-Regular.ttf"),
    ("te", "NotoSansTelugu-Regular.ttf"),
    ("pa", "NotoSansGurmukhi-Regular.ttf"),
    ("kn", "NotoSansKannada-Regular.ttf"),
    ("ml", "NotoSansMalayalam-Regular.ttf"),
    ("si", "NotoSansSinhala-Regular.ttf"),
    ("km", "NotoSansKhmer-Regular.ttf"),
    ("lo", "NotoSansLao-Regular.ttf"),
    ("am", "NotoSansEthiopic-Regular.ttf"),
    ("hy", "NotoSansArmenian-Regular.ttf"),
    ("ka", "NotoSansGeorgian-Regular.ttf"),
    ("bo", "NotoSerifTibetan-Regular.ttf"),
];

/// A contiguous Unicode block and the font that covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptRange {
    pub script: &'static str,
    pub start: u32,
    pub end: u32,
    pub font_file: &'static str,
}

impl ScriptRange {
    pub fn contains(&self, ch: char) -> bool {
        let code = ch as u32;
        self.start <= code && code <= self.end
    }
}

const fn script(
    script: &'static str,
    start: u32,
    end: u32,
    font_file: &'static str,
) -> ScriptRange {
    ScriptRange {
        script,
        start,
        end,
        font_file,
    }
}

/// Ordered script table. Order is precedence: the first range containing a
/// scanned codepoint decides the font.
pub const SCRIPT_RANGES: &[ScriptRange] = &[
    script("Arabic", 0x0600, 0x06FF, "NotoSansArabic-Regular.ttf"),
    script("Devanagari", 0x0900, 0x097F, "NotoSansDevanagari-Regular.ttf"),
    script("Gujarati", 0x0A80, 0x0AFF, "NotoSansGujarati-Regular.ttf"),
    script("Bengali", 0x0980, 0x09FF, "NotoSansBengali-Regular.ttf"),
    script("Gurmukhi", 0x0A00, 0x0A7F, "NotoSansGurmukhi-Regular.ttf"),
    script("Tamil", 0x0B80, 0x0BFF, "NotoSansTamil-Regular.ttf"),
    script("Telugu", 0x0C00, 0x0C7F, "NotoSansTelugu-Regular.ttf"),
    script("Kannada", 0x0C80, 0x0CFF, "NotoSansKannada-Regular.ttf"),
    script("Malayalam", 0x0D00, 0x0D7F, "NotoSansMalayalam-Regular.ttf"),
    script("Sinhala", 0x0D80, 0x0DFF, "NotoSansSinhala-Regular.ttf"),
    script("Thai", 0x0E00, 0x0E7F, "NotoSansThai-Regular.ttf"),
    script("Lao", 0x0E80, 0x0EFF, "NotoSansLao-Regular.ttf"),
    script("Tibetan", 0x0F00, 0x0FFF, "NotoSerifTibetan-Regular.ttf"),
    script("Myanmar", 0x1000, 0x109F, "NotoSansMyanmar-Regular.ttf"),
    script("Georgian", 0x10A0, 0x10FF, "NotoSansGeorgian-Regular.ttf"),
    script("Ethiopic", 0x1200, 0x137F, "NotoSansEthiopic-Regular.ttf"),
    script("Hebrew", 0x0590, 0x05FF, "NotoSansHebrew-Regular.ttf"),
    script("Armenian", 0x0530, 0x058F, "NotoSansArmenian-Regular.ttf"),
    script("Khmer", 0x1780, 0x17FF, "NotoSansKhmer-Regular.ttf"),
    script("CJK", 0x4E00, 0x9FFF, "NotoSansSC-Regular.otf"),
    script("Kana", 0x3040, 0x30FF, "NotoSansJP-Regular.otf"),
    script("Hangul", 0xAC00, 0xD7AF, "NotoSansKR-Regular.otf"),
];

/// Broad-coverage generic font. Only used for text inside [`SAFE_RANGES`].
pub const BROAD_GENERIC_FONT: &str = "NotoSans-Regular.ttf";

/// Generic fallbacks in order of preference.
pub const GENERIC_FONTS: &[&str] = &[BROAD_GENERIC_FONT, "arial.ttf"];

/// Codepoints the broad generic font renders without tofu: Latin, Greek,
/// Cyrillic, Vietnamese extensions, punctuation and symbols, CJK
/// punctuation, fullwidth forms.
pub const SAFE_RANGES: &[(u32, u32)] = &[
    (0x0000, 0x052F),
    (0x1E00, 0x1EFF),
    (0x2000, 0x2BFF),
    (0x3000, 0x303F),
    (0xFF00, 0xFFEF),
];

/// Explicit language precedence used when sorting multi-language output.
pub const PRIORITY_LANGS: &[&str] = &["en", "es", "fr", "de", "pt", "it", "zh", "ja", "ko", "hi", "ar", "ru"];

/// Region precedence used after [`PRIORITY_LANGS`].
pub const REGION_ORDER: &[&str] = &[
    "North America",
    "Latin America",
    "Europe",
    "Middle East",
    "Africa",
    "South Asia",
    "East Asia",
    "Southeast Asia",
    "Central Asia",
    "Oceania",
    "Global",
];

/// Country folder → region name.
pub const COUNTRY_TO_REGION: &[(&str, &str)] = &[
    ("united_states", "North America"),
    ("mexico", "Latin America"),
    ("brazil", "Latin America"),
    ("paraguay", "Latin America"),
    ("peru", "Latin America"),
    ("bolivia", "Latin America"),
    ("spain", "Europe"),
    ("france", "Europe"),
    ("germany", "Europe"),
    ("italy", "Europe"),
    ("russia", "Europe"),
    ("poland", "Europe"),
    ("ukraine", "Europe"),
    ("netherlands", "Europe"),
    ("greece", "Europe"),
    ("sweden", "Europe"),
    ("denmark", "Europe"),
    ("finland", "Europe"),
    ("norway", "Europe"),
    ("hungary", "Europe"),
    ("czech_republic", "Europe"),
    ("romania", "Europe"),
    ("slovakia", "Europe"),
    ("bulgaria", "Europe"),
    ("croatia", "Europe"),
    ("serbia", "Europe"),
    ("slovenia", "Europe"),
    ("estonia", "Europe"),
    ("latvia", "Europe"),
    ("lithuania", "Europe"),
    ("iceland", "Europe"),
    ("ireland", "Europe"),
    ("united_kingdom", "Europe"),
    ("luxembourg", "Europe"),
    ("malta", "Europe"),
    ("albania", "Europe"),
    ("armenia", "Europe"),
    ("georgia", "Europe"),
    ("azerbaijan", "Europe"),
    ("turkey", "Middle East"),
    ("saudi_arabia", "Middle East"),
    ("israel", "Middle East"),
    ("iran", "Middle East"),
    ("iraq", "Middle East"),
    ("afghanistan", "Middle East"),
    ("kenya", "Africa"),
    ("ethiopia", "Africa"),
    ("nigeria", "Africa"),
    ("south_africa", "Africa"),
    ("india", "South Asia"),
    ("pakistan", "South Asia"),
    ("bangladesh", "South Asia"),
    ("nepal", "South Asia"),
    ("sri_lanka", "South Asia"),
    ("china", "East Asia"),
    ("japan", "East Asia"),
    ("south_korea", "East Asia"),
    ("mongolia", "East Asia"),
    ("vietnam", "Southeast Asia"),
    ("thailand", "Southeast Asia"),
    ("indonesia", "Southeast Asia"),
    ("malaysia", "Southeast Asia"),
    ("philippines", "Southeast Asia"),
    ("myanmar", "Southeast Asia"),
    ("cambodia", "Southeast Asia"),
    ("laos", "Southeast Asia"),
    ("kazakhstan", "Central Asia"),
    ("kyrgyzstan", "Central Asia"),
    ("tajikistan", "Central Asia"),
    ("turkmenistan", "Central Asia"),
    ("uzbekistan", "Central Asia"),
    ("new_zealand", "Oceania"),
    ("samoa", "Oceania"),
    ("tonga", "Oceania"),
    ("fiji", "Oceania"),
];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, value)| *value)
}

pub fn country_for_lang(lang: &str) -> Option<&'static str> {
    lookup(LANG_TO_COUNTRY, lang)
}

pub fn font_file_for_lang(lang: &str) -> Option<&'static str> {
    lookup(FONT_MAP, lang)
}

pub fn region_for_country(country: &str) -> Option<&'static str> {
    lookup(COUNTRY_TO_REGION, country)
}

pub fn is_safe_for_broad_font(ch: char) -> bool {
    let code = ch as u32;
    SAFE_RANGES
        .iter()
        .any(|&(start, end)| start <= code && code <= end)
}

/// `"united_states"` → `"United States"`.
pub fn display_country(country: &str) -> String {
    country
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
