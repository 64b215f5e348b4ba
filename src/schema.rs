use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::color::{ColorMode, Rgb};
use crate::error_codes::{CodedError, ErrorCode};

pub const DEFAULT_DELAY_MS: u32 = 100;
pub const ALL_LANGUAGES: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl Default for FrameSize {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
        }
    }
}

/// Base frame delay and the extra time the focused frame dwells for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DelaySpec {
    pub base_ms: u32,
    pub dwell_ms: u32,
}

impl Default for DelaySpec {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_DELAY_MS,
            dwell_ms: 0,
        }
    }
}

impl DelaySpec {
    /// Number of copies of the focused frame in the dwell expansion.
    pub fn dwell_count(&self) -> usize {
        if self.base_ms == 0 {
            return 0;
        }
        (self.dwell_ms / self.base_ms) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pacing {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    Bounce,
}

impl FromStr for Pacing {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(Self::Linear),
            "ease-in" | "ease_in" => Ok(Self::EaseIn),
            "ease-out" | "ease_out" => Ok(Self::EaseOut),
            "bounce" => Ok(Self::Bounce),
            other => Err(anyhow!(CodedError::new(
                ErrorCode::InvalidPacing,
                format!("unknown pacing '{other}', expected linear, ease-in, ease-out or bounce")
            ))),
        }
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Linear => "linear",
            Self::EaseIn => "ease-in",
            Self::EaseOut => "ease-out",
            Self::Bounce => "bounce",
        };
        f.write_str(label)
    }
}

/// Every rendering knob. Loaded from YAML with CLI flags layered on top.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RenderSettings {
    #[serde(default, deserialize_with = "deserialize_size")]
    pub size: FrameSize,
    /// Defaults to a quarter of the frame height.
    #[serde(default)]
    pub font_size: Option<u32>,
    #[serde(default = "default_font_color", deserialize_with = "deserialize_rgb")]
    pub font_color: Rgb,
    #[serde(default = "default_background_color", deserialize_with = "deserialize_rgb")]
    pub background_color: Rgb,
    #[serde(default, deserialize_with = "deserialize_delay")]
    pub delay: DelaySpec,
    #[serde(default)]
    pub pacing: Pacing,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
    #[serde(default)]
    pub smart_color: bool,
    #[serde(default)]
    pub flag_colors: bool,
    #[serde(default)]
    pub rainbow: bool,
    #[serde(default)]
    pub background_images: bool,
    #[serde(default)]
    pub show_labels: bool,
    #[serde(default = "default_languages", deserialize_with = "deserialize_languages")]
    pub languages: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            size: FrameSize::default(),
            font_size: None,
            font_color: default_font_color(),
            background_color: default_background_color(),
            delay: DelaySpec::default(),
            pacing: Pacing::default(),
            font_path: None,
            smart_color: false,
            flag_colors: false,
            rainbow: false,
            background_images: false,
            show_labels: false,
            languages: default_languages(),
            seed: None,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<()> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(anyhow!(CodedError::new(
                ErrorCode::InvalidSize,
                format!(
                    "frame size must be positive, got {}x{}",
                    self.size.width, self.size.height
                )
            )));
        }
        if self.delay.base_ms == 0 {
            return Err(anyhow!(CodedError::new(
                ErrorCode::InvalidDelay,
                "base delay must be > 0 ms"
            )));
        }
        if self.font_size == Some(0) {
            return Err(anyhow!(CodedError::new(
                ErrorCode::InvalidSettings,
                "font size must be > 0"
            )));
        }
        if self.languages.is_empty() {
            return Err(anyhow!(CodedError::new(
                ErrorCode::InvalidSettings,
                "language list cannot be empty"
            )));
        }
        Ok(())
    }

    pub fn base_font_size(&self) -> u32 {
        self.font_size.unwrap_or((self.size.height / 4).max(1))
    }

    pub fn wants_all_languages(&self) -> bool {
        self.languages.iter().any(|lang| lang == ALL_LANGUAGES)
    }

    /// Photographic backgrounds or smart color: text needs a stroke.
    pub fn high_contrast(&self) -> bool {
        self.background_images || self.smart_color
    }

    /// Decorative modes measure and draw one character at a time.
    pub fn char_by_char(&self) -> bool {
        self.rainbow || self.flag_colors
    }

    /// Rainbow beats flag bands, which beat contrast, which beats fixed.
    /// Flag stripes are filled in per unit by the caller.
    pub fn color_mode(&self, flag: impl FnOnce() -> Vec<Rgb>) -> ColorMode {
        if self.rainbow {
            ColorMode::Rainbow
        } else if self.flag_colors {
            ColorMode::FlagBand(flag())
        } else if self.high_contrast() {
            ColorMode::Contrast
        } else {
            ColorMode::Fixed(self.font_color)
        }
    }
}

pub fn load_settings(path: &Path) -> Result<RenderSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    let settings: RenderSettings = serde_yaml::from_str(&contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!(CodedError::new(
            ErrorCode::InvalidSettings,
            format!(
                "failed to parse yaml in {} at {}: {}",
                path.display(),
                location,
                error
            )
        ))
    })?;
    Ok(settings)
}

fn default_font_color() -> Rgb {
    Rgb::WHITE
}

fn default_background_color() -> Rgb {
    Rgb::BLACK
}

fn default_languages() -> Vec<String> {
    vec![ALL_LANGUAGES.to_owned()]
}

/// `"R,G,B"`; each component is clamped to 0..=255.
pub fn parse_rgb(raw: &str) -> Result<Rgb> {
    let parts = split_ints(raw).ok_or_else(|| invalid_rgb(raw))?;
    let [r, g, b] = parts[..] else {
        return Err(invalid_rgb(raw));
    };
    Ok(clamp_rgb(r, g, b))
}

fn clamp_rgb(r: i64, g: i64, b: i64) -> Rgb {
    let clamp = |value: i64| value.clamp(0, 255) as u8;
    Rgb::new(clamp(r), clamp(g), clamp(b))
}

fn invalid_rgb(raw: &str) -> anyhow::Error {
    anyhow!(CodedError::new(
        ErrorCode::InvalidRgb,
        format!("expected color as R,G,B, got '{raw}'")
    )
    .with_details(json!({ "provided": raw })))
}

/// `"W,H"` with both sides positive.
pub fn parse_size(raw: &str) -> Result<FrameSize> {
    let invalid = || {
        anyhow!(CodedError::new(
            ErrorCode::InvalidSize,
            format!("expected size as W,H with positive integers, got '{raw}'")
        )
        .with_details(json!({ "provided": raw })))
    };
    let parts = split_ints(raw).ok_or_else(invalid)?;
    let [width, height] = parts[..] else {
        return Err(invalid());
    };
    let width = u32::try_from(width).map_err(|_| invalid())?;
    let height = u32::try_from(height).map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok(FrameSize { width, height })
}

/// `"100"` or `"sine:<dwell_ms>,<base_ms>"`.
pub fn parse_delay(raw: &str) -> Result<DelaySpec> {
    let invalid = || {
        anyhow!(CodedError::new(
            ErrorCode::InvalidDelay,
            format!("expected delay as <ms> or sine:<dwell_ms>,<base_ms>, got '{raw}'")
        )
        .with_details(json!({ "provided": raw })))
    };
    let trimmed = raw.trim();
    let spec = match trimmed.strip_prefix("sine:") {
        Some(rest) => {
            let parts = split_ints(rest).ok_or_else(invalid)?;
            let [dwell, base] = parts[..] else {
                return Err(invalid());
            };
            DelaySpec {
                base_ms: u32::try_from(base).map_err(|_| invalid())?,
                dwell_ms: u32::try_from(dwell).map_err(|_| invalid())?,
            }
        }
        None => DelaySpec {
            base_ms: trimmed.parse::<u32>().map_err(|_| invalid())?,
            dwell_ms: 0,
        },
    };
    if spec.base_ms == 0 {
        return Err(invalid());
    }
    Ok(spec)
}

/// Flattens repeated and comma-separated language values; blanks dropped.
pub fn parse_languages<S: AsRef<str>>(values: &[S]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_owned)
        .collect()
}

fn split_ints(raw: &str) -> Option<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<i64>().ok())
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrInts {
    Text(String),
    Ints(Vec<i64>),
    Int(i64),
}

fn deserialize_rgb<'de, D>(deserializer: D) -> std::result::Result<Rgb, D::Error>
where
    D: Deserializer<'de>,
{
    match TextOrInts::deserialize(deserializer)? {
        TextOrInts::Text(raw) => parse_rgb(&raw).map_err(|error| D::Error::custom(format!("{error:#}"))),
        TextOrInts::Ints(parts) => match parts[..] {
            [r, g, b] => Ok(clamp_rgb(r, g, b)),
            _ => Err(D::Error::custom("color must have exactly three components")),
        },
        TextOrInts::Int(_) => Err(D::Error::custom("color must be \"R,G,B\" or [R, G, B]")),
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<FrameSize, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match TextOrInts::deserialize(deserializer)? {
        TextOrInts::Text(raw) => raw,
        TextOrInts::Ints(parts) => parts
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(","),
        TextOrInts::Int(_) => return Err(D::Error::custom("size must be \"W,H\" or [W, H]")),
    };
    parse_size(&raw).map_err(|error| D::Error::custom(format!("{error:#}")))
}

fn deserialize_delay<'de, D>(deserializer: D) -> std::result::Result<DelaySpec, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match TextOrInts::deserialize(deserializer)? {
        TextOrInts::Text(raw) => raw,
        TextOrInts::Int(ms) => ms.to_string(),
        TextOrInts::Ints(_) => {
            return Err(D::Error::custom(
                "delay must be milliseconds or \"sine:<dwell_ms>,<base_ms>\"",
            ))
        }
    };
    parse_delay(&raw).map_err(|error| D::Error::custom(format!("{error:#}")))
}

fn deserialize_languages<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    let values = match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    };
    Ok(parse_languages(&values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_codes::find_coded_error;

    fn code_of(error: &anyhow::Error) -> ErrorCode {
        find_coded_error(error).expect("coded error").code
    }

    #[test]
    fn rgb_components_are_clamped() {
        assert_eq!(parse_rgb("300, -4, 12").unwrap(), Rgb::new(255, 0, 12));
        assert_eq!(code_of(&parse_rgb("1,2").unwrap_err()), ErrorCode::InvalidRgb);
        assert_eq!(code_of(&parse_rgb("red").unwrap_err()), ErrorCode::InvalidRgb);
    }

    #[test]
    fn size_rejects_zero_and_garbage() {
        assert_eq!(
            parse_size("640,360").unwrap(),
            FrameSize {
                width: 640,
                height: 360
            }
        );
        for raw in ["0,10", "10", "a,b", "-5,5"] {
            assert_eq!(code_of(&parse_size(raw).unwrap_err()), ErrorCode::InvalidSize, "{raw}");
        }
    }

    #[test]
    fn sine_delay_sets_dwell_and_base() {
        let spec = parse_delay("sine:500,100").unwrap();
        assert_eq!(
            spec,
            DelaySpec {
                base_ms: 100,
                dwell_ms: 500
            }
        );
        assert_eq!(spec.dwell_count(), 5);
        assert_eq!(parse_delay("80").unwrap().dwell_count(), 0);
        assert_eq!(code_of(&parse_delay("sine:500").unwrap_err()), ErrorCode::InvalidDelay);
        assert_eq!(code_of(&parse_delay("0").unwrap_err()), ErrorCode::InvalidDelay);
    }

    #[test]
    fn languages_accept_repeats_and_commas() {
        let langs = parse_languages(&["es,fr", " de ", ""][..]);
        assert_eq!(langs, vec!["es", "fr", "de"]);
    }

    #[test]
    fn yaml_settings_use_string_syntaxes_and_defaults() {
        let settings: RenderSettings = serde_yaml::from_str(
            r#"
size: "320,180"
font_color: [10, 20, 300]
delay: "sine:300,100"
pacing: ease-out
languages: "es, fr"
"#,
        )
        .unwrap();
        assert_eq!(settings.size.width, 320);
        assert_eq!(settings.font_color, Rgb::new(10, 20, 255));
        assert_eq!(settings.background_color, Rgb::BLACK);
        assert_eq!(settings.delay.dwell_count(), 3);
        assert_eq!(settings.pacing, Pacing::EaseOut);
        assert_eq!(settings.languages, vec!["es", "fr"]);
        assert_eq!(settings.base_font_size(), 45);
        settings.validate().unwrap();
    }

    #[test]
    fn unknown_yaml_fields_are_rejected() {
        let parsed = serde_yaml::from_str::<RenderSettings>("sizee: \"1,1\"\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn defaults_match_the_classic_tool() {
        let settings = RenderSettings::default();
        assert_eq!(settings.base_font_size(), 64);
        assert_eq!(settings.delay, DelaySpec::default());
        assert!(settings.wants_all_languages());
        assert_eq!(settings.color_mode(Vec::new), ColorMode::Fixed(Rgb::WHITE));
        settings.validate().unwrap();
    }

    #[test]
    fn color_mode_precedence() {
        let mut settings = RenderSettings {
            background_images: true,
            ..RenderSettings::default()
        };
        assert_eq!(settings.color_mode(Vec::new), ColorMode::Contrast);
        settings.flag_colors = true;
        assert_eq!(
            settings.color_mode(|| vec![Rgb::BLACK]),
            ColorMode::FlagBand(vec![Rgb::BLACK])
        );
        settings.rainbow = true;
        assert_eq!(settings.color_mode(Vec::new), ColorMode::Rainbow);
    }

    #[test]
    fn validate_rejects_zero_font_size() {
        let settings = RenderSettings {
            font_size: Some(0),
            ..RenderSettings::default()
        };
        assert_eq!(code_of(&settings.validate().unwrap_err()), ErrorCode::InvalidSettings);
    }
}
