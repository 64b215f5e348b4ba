use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tempfile::{tempdir, TempDir};
use worldwide::assets::AssetRoot;
use worldwide::color::{ColorModeKind, Rgb};
use worldwide::compositor::Frame;
use worldwide::encoding::FrameSink;
use worldwide::font_assets::{load_font, FontCache, FontResolver};
use worldwide::pipeline::{GenerateError, GenerationRun};
use worldwide::schema::{parse_delay, RenderSettings};
use worldwide::sequence::FrameTiming;
use worldwide::text_measure::{fit_to_width, fit_unit, measure, MIN_FONT_SIZE};
use worldwide::units::TextUnit;

const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

fn system_font() -> Option<PathBuf> {
    SYSTEM_FONTS
        .iter()
        .map(PathBuf::from)
        .find(|path| path.is_file())
}

/// Asset root whose only font is a Latin system font installed as the broad
/// generic font, which the resolver refuses for text outside its coverage.
fn latin_assets() -> Option<TempDir> {
    let Some(font) = system_font() else {
        eprintln!("skipping: no Latin system font found");
        return None;
    };
    let dir = tempdir().unwrap();
    let fonts = dir.path().join("fonts");
    fs::create_dir_all(&fonts).unwrap();
    fs::copy(font, fonts.join("NotoSans-Regular.ttf")).unwrap();
    Some(dir)
}

#[derive(Default)]
struct RecordingSink {
    calls: usize,
    frames: Vec<Frame>,
    timing: Option<FrameTiming>,
}

impl FrameSink for RecordingSink {
    fn label(&self) -> &'static str {
        "recording"
    }

    fn write(&mut self, frames: &[Frame], timing: &FrameTiming, loop_forever: bool) -> Result<()> {
        assert!(loop_forever);
        self.calls += 1;
        self.frames = frames.to_vec();
        self.timing = Some(timing.clone());
        Ok(())
    }
}

fn literals(texts: &[&str]) -> Vec<TextUnit> {
    texts.iter().map(|text| TextUnit::literal(*text)).collect()
}

fn small_settings() -> RenderSettings {
    let mut settings = RenderSettings::default();
    settings.size.width = 160;
    settings.size.height = 96;
    settings.font_color = Rgb::WHITE;
    settings.background_color = Rgb::BLACK;
    settings
}

#[test]
fn three_literals_render_three_frames_with_uniform_timing() {
    let Some(dir) = latin_assets() else { return };
    let assets = AssetRoot::new(dir.path());
    let mut run = GenerationRun::new(small_settings(), &assets).unwrap();
    let mut sink = RecordingSink::default();

    let report = run
        .generate(&literals(&["Hola", "Hello", "Bonjour"]), &mut sink)
        .unwrap();

    assert_eq!(sink.calls, 1);
    assert_eq!(sink.frames.len(), 3);
    assert_eq!(sink.timing, Some(FrameTiming::Uniform(100)));
    assert_eq!(report.output_frames, 3);
    assert!(report.skipped.is_empty());
    for frame in &sink.frames {
        assert_eq!((frame.width(), frame.height()), (160, 96));
        let lit = frame
            .as_raw()
            .chunks_exact(4)
            .filter(|pixel| pixel[0] > 128)
            .count();
        assert!(lit > 0, "frame should contain white text pixels");
    }
}

#[test]
fn dwell_expansion_lengths_through_the_pipeline() {
    let Some(dir) = latin_assets() else { return };
    let assets = AssetRoot::new(dir.path());

    for (texts, delay, expected) in [
        (&["One"][..], "sine:500,100", 5),
        (&["One", "Two"][..], "sine:500,100", 12),
        (&["One", "Two", "Six"][..], "sine:200,100", 12),
    ] {
        let mut settings = small_settings();
        settings.delay = parse_delay(delay).unwrap();
        let mut run = GenerationRun::new(settings, &assets).unwrap();
        let mut sink = RecordingSink::default();
        run.generate(&literals(texts), &mut sink).unwrap();

        assert_eq!(sink.frames.len(), expected, "{texts:?} with {delay}");
        assert_eq!(sink.timing, Some(FrameTiming::Uniform(100)));
        if texts.len() == 1 {
            assert!(sink.frames.iter().all(|frame| frame.shares_pixels(&sink.frames[0])));
        }
    }
}

#[test]
fn unrenderable_units_are_skipped_and_all_skipped_is_empty_result() {
    let Some(dir) = latin_assets() else { return };
    let assets = AssetRoot::new(dir.path());
    let mut run = GenerationRun::new(small_settings(), &assets).unwrap();
    let mut sink = RecordingSink::default();

    // Only a Latin font on disk and no CJK font: the ideographs cannot render.
    let report = run
        .generate(&literals(&["你好", "Hello"]), &mut sink)
        .unwrap();
    assert_eq!(report.skipped, vec![TextUnit::literal("你好")]);
    assert_eq!(sink.frames.len(), 1);

    let mut run = GenerationRun::new(small_settings(), &assets).unwrap();
    let mut sink = RecordingSink::default();
    let error = run.generate(&literals(&["你好"]), &mut sink).unwrap_err();
    assert_eq!(
        error.downcast_ref::<GenerateError>(),
        Some(&GenerateError::EmptyResult)
    );
    assert_eq!(sink.calls, 0);
}

#[test]
fn analysis_memoizes_one_config_per_unit() {
    let Some(dir) = latin_assets() else { return };
    let assets = AssetRoot::new(dir.path());
    let mut run = GenerationRun::new(small_settings(), &assets).unwrap();
    let units = literals(&["Hello"]);
    run.analyze(&units).unwrap();
    let first = run.config_for(&units[0]).cloned().unwrap();
    run.analyze(&units).unwrap();
    assert_eq!(run.config_for(&units[0]), Some(&first));
    assert!(first.ink_width > 0.0);
    assert!(first.font_size <= small_settings().base_font_size());
}

#[test]
fn fit_never_leaves_base_and_floor_bounds() {
    let Some(path) = system_font() else { return };
    let font = load_font(&path).unwrap();
    let long = "Supercalifragilisticexpialidocious and then some more words";

    let (size, measurement) = fit_to_width(&font, long, 64, 40, false);
    assert_eq!(size, MIN_FONT_SIZE, "oversized text stops at the floor");
    assert!(measurement.width > 40.0 * 0.9);

    let (size, measurement) = fit_to_width(&font, "Hi", 48, 400, false);
    assert_eq!(size, 48, "fitting text keeps its base size");
    assert!(measurement.width <= 400.0 * 0.9);

    let (size, _) = fit_to_width(&font, long, 9, 10, false);
    assert_eq!(size, MIN_FONT_SIZE);

    let (size, _) = fit_to_width(&font, long, 6, 10, false);
    assert_eq!(size, 6, "a base below the floor is never raised");
}

#[test]
fn per_character_measurement_spans_first_to_last_glyph() {
    let Some(path) = system_font() else { return };
    let font = load_font(&path).unwrap();
    let whole = measure(&font, "Hello", 40.0, false);
    let per_char = measure(&font, "Hello", 40.0, true);
    assert!(whole.width > 0.0 && per_char.width > 0.0);
    assert!((whole.width - per_char.width).abs() < 40.0 * 0.5);
    assert!(per_char.bottom > per_char.top);
}

#[test]
fn fit_unit_marks_missing_fonts_unrenderable() {
    let dir = tempdir().unwrap();
    let resolver = FontResolver::new(dir.path());
    let mut fonts = FontCache::new();
    let config = fit_unit(
        &resolver,
        &mut fonts,
        &TextUnit::new("Hola", "es"),
        None,
        64,
        256,
        false,
    )
    .unwrap();
    assert!(!config.is_renderable());
    assert_eq!(config.ink_width, 0.0);
    assert!(fonts.is_empty());
}

#[test]
fn labels_and_photo_backgrounds_record_identities() {
    let Some(dir) = latin_assets() else { return };
    write_photo(&dir.path().join("images/spain/plaza.png"));
    let assets = AssetRoot::new(dir.path());
    let mut settings = small_settings();
    settings.background_images = true;
    settings.show_labels = true;
    settings.seed = Some(11);

    let mut run = GenerationRun::new(settings, &assets).unwrap();
    let mut sink = RecordingSink::default();
    let units = vec![TextUnit::new("Hola", "es"), TextUnit::new("Hello", "en")];
    let report = run.generate(&units, &mut sink).unwrap();

    assert_eq!(sink.frames.len(), 2);
    let identities = report
        .rendered
        .iter()
        .filter_map(|rendered| rendered.background.clone())
        .collect::<Vec<_>>();
    assert_eq!(identities.len(), 2);
    assert!(identities[0].ends_with("plaza.png"));
    assert!(identities[1].starts_with("solid:#"));
    assert_eq!(run.used_images().len(), 2);
}

fn pixels(frame: &Frame) -> impl Iterator<Item = (u32, [u8; 3])> + '_ {
    let width = frame.width();
    frame
        .as_raw()
        .chunks_exact(4)
        .enumerate()
        .map(move |(index, pixel)| (index as u32 % width, [pixel[0], pixel[1], pixel[2]]))
}

/// Leftmost and rightmost columns that differ from the background.
fn ink_columns(frame: &Frame, background: [u8; 3]) -> (u32, u32) {
    pixels(frame)
        .filter(|(_, rgb)| *rgb != background)
        .fold((u32::MAX, 0), |(left, right), (x, _)| (left.min(x), right.max(x)))
}

#[test]
fn smart_color_draws_dark_text_on_white_and_a_visible_stroke() {
    let Some(dir) = latin_assets() else { return };
    let assets = AssetRoot::new(dir.path());

    let mut settings = small_settings();
    settings.smart_color = true;
    settings.background_color = Rgb::WHITE;
    let mut run = GenerationRun::new(settings, &assets).unwrap();
    let mut sink = RecordingSink::default();
    let report = run.generate(&literals(&["Hello"]), &mut sink).unwrap();
    assert_eq!(report.rendered[0].color_mode, ColorModeKind::Contrast);
    let dark = pixels(&sink.frames[0])
        .filter(|(_, [r, g, b])| u32::from(*r) + u32::from(*g) + u32::from(*b) < 200)
        .count();
    assert!(dark > 0, "white background should get dark text");

    // Mid-light blue: dark text again, so the outline is white and shows.
    let mut settings = small_settings();
    settings.smart_color = true;
    settings.background_color = Rgb::new(90, 160, 220);
    let mut run = GenerationRun::new(settings, &assets).unwrap();
    let mut sink = RecordingSink::default();
    run.generate(&literals(&["Hello"]), &mut sink).unwrap();
    let stroke = pixels(&sink.frames[0])
        .filter(|(_, rgb)| rgb.iter().all(|channel| *channel > 240))
        .count();
    assert!(stroke > 0, "contrast text should carry its outline");
}

#[test]
fn flag_bands_run_first_to_last_color_across_the_word() {
    let Some(dir) = latin_assets() else { return };
    fs::write(
        dir.path().join("flag_colors.json"),
        r##"{ "France": ["#0000FF", "#FFFFFF", "#FF0000"] }"##,
    )
    .unwrap();
    let assets = AssetRoot::new(dir.path());
    let mut settings = small_settings();
    settings.flag_colors = true;
    let mut run = GenerationRun::new(settings, &assets).unwrap();
    let mut sink = RecordingSink::default();
    let report = run
        .generate(&[TextUnit::new("Bonjour", "fr")], &mut sink)
        .unwrap();
    assert_eq!(report.rendered[0].color_mode, ColorModeKind::FlagBand);

    let frame = &sink.frames[0];
    let (left, right) = ink_columns(frame, [0, 0, 0]);
    assert!(right > left);
    let third = (right - left) / 3;
    let blueish = |[r, g, b]: [u8; 3]| b > 150 && r < 100 && g < 100;
    let reddish = |[r, g, b]: [u8; 3]| r > 150 && g < 100 && b < 100;
    let left_third = pixels(frame)
        .filter(|(x, _)| *x <= left + third)
        .map(|(_, rgb)| rgb)
        .collect::<Vec<_>>();
    let right_third = pixels(frame)
        .filter(|(x, _)| *x >= right - third)
        .map(|(_, rgb)| rgb)
        .collect::<Vec<_>>();
    assert!(left_third.iter().any(|rgb| blueish(*rgb)));
    assert!(!left_third.iter().any(|rgb| reddish(*rgb)));
    assert!(right_third.iter().any(|rgb| reddish(*rgb)));
    assert!(!right_third.iter().any(|rgb| blueish(*rgb)));
}

#[test]
fn rainbow_gives_each_frame_its_own_color() {
    let Some(dir) = latin_assets() else { return };
    let assets = AssetRoot::new(dir.path());
    let mut settings = small_settings();
    settings.rainbow = true;
    let mut run = GenerationRun::new(settings, &assets).unwrap();
    let mut sink = RecordingSink::default();
    let report = run
        .generate(&literals(&["Hola", "Hello", "Bonjour"]), &mut sink)
        .unwrap();
    assert!(report
        .rendered
        .iter()
        .all(|rendered| rendered.color_mode == ColorModeKind::Rainbow));

    // Glyph interiors are fully covered, so the brightest pixel is the fill.
    let fills = sink
        .frames
        .iter()
        .map(|frame| {
            pixels(frame)
                .map(|(_, rgb)| rgb)
                .max_by_key(|[r, g, b]| u32::from(*r) + u32::from(*g) + u32::from(*b))
                .unwrap()
        })
        .collect::<Vec<_>>();
    assert_eq!(fills.len(), 3);
    assert_ne!(fills[0], fills[1]);
    assert_ne!(fills[1], fills[2]);
    assert_ne!(fills[0], fills[2]);
}

fn write_photo(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut state = 7_u32;
    let image = image::RgbImage::from_fn(80, 60, |_, _| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let v = (state >> 24) as u8;
        image::Rgb([v, v / 2, 255 - v])
    });
    image.save(path).unwrap();
}
