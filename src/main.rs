use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use worldwide::assets::AssetRoot;
use worldwide::encoding::sink_for_output;
use worldwide::error_codes::{find_coded_error, CodedError};
use worldwide::pipeline::{collect_units, GenerateError, GenerationRun, RenderInput};
use worldwide::schema::{
    load_settings, parse_delay, parse_languages, parse_rgb, parse_size, Pacing, RenderSettings,
};
use worldwide::translations::JsonCatalog;
use worldwide::units::TextUnit;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WORLDWIDE_GIT_HASH"), ")");

#[derive(Debug, Parser)]
#[command(name = "worldwide")]
#[command(version = VERSION)]
#[command(about = "Render a word across languages and scripts into an animated image")]
struct Cli {
    /// Log level filter; RUST_LOG takes precedence when set.
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: String,
    /// Print failures as a JSON envelope on stderr.
    #[arg(long = "json-errors", global = true)]
    json_errors: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render frames and write a GIF or PNG sequence.
    Render {
        #[command(flatten)]
        input: InputArgs,
        #[command(flatten)]
        style: StyleArgs,
        #[arg(short = 'o', long = "output", default_value = "output.gif")]
        output: PathBuf,
        /// Print the generation report as JSON on stdout.
        #[arg(long)]
        json: bool,
    },
    /// Show the font each unit resolves to, without rendering.
    Fonts {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long = "font-path")]
        font_path: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Args)]
struct InputArgs {
    /// Word to look up in the translation catalog.
    #[arg(long)]
    text: Option<String>,
    /// Comma-separated literal strings, rendered as given.
    #[arg(long = "text-array")]
    text_array: Option<String>,
    /// Language codes, repeated or comma-separated; `all` for every entry.
    #[arg(long = "languages", num_args = 1..)]
    languages: Vec<String>,
    /// Asset root holding fonts/, images/, flag_colors.json, translations.json.
    #[arg(long = "assets", default_value = "assets")]
    assets: PathBuf,
    /// YAML settings file; flags override its values.
    #[arg(long = "config")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct StyleArgs {
    /// Frame size as W,H.
    #[arg(long)]
    size: Option<String>,
    #[arg(long = "font-size")]
    font_size: Option<u32>,
    /// Text color as R,G,B.
    #[arg(long = "font-color")]
    font_color: Option<String>,
    /// Preferred font for scripts without a dedicated font.
    #[arg(long = "font-path")]
    font_path: Option<PathBuf>,
    /// Background color as R,G,B.
    #[arg(long = "background-color")]
    background_color: Option<String>,
    /// Frame delay in ms, or sine:<dwell_ms>,<base_ms>.
    #[arg(long)]
    delay: Option<String>,
    /// linear, ease-in, ease-out or bounce.
    #[arg(long)]
    pacing: Option<String>,
    #[arg(long = "smart-color")]
    smart_color: bool,
    #[arg(long = "flag-colors")]
    flag_colors: bool,
    #[arg(long)]
    rainbow: bool,
    #[arg(long = "background-images", alias = "use-icons")]
    background_images: bool,
    #[arg(long = "show-labels")]
    show_labels: bool,
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report_error(&error, cli.json_errors),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Render {
            input,
            style,
            output,
            json,
        } => run_render(&input, &style, &output, json),
        Commands::Fonts {
            input,
            font_path,
            json,
        } => run_fonts(&input, font_path, json),
    }
}

fn run_render(input: &InputArgs, style: &StyleArgs, output: &Path, json: bool) -> Result<()> {
    let settings = build_settings(input, Some(style))?;
    let assets = AssetRoot::new(&input.assets);
    let (render_input, units) = load_units(input, &assets, &settings)?;

    let mut sink = sink_for_output(output)?;
    let mut run = GenerationRun::new(settings, &assets)?.with_word_context(render_input.word_context());
    let report = run.generate(&units, sink.as_mut())?;

    if json {
        let stdout = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{stdout}");
    } else {
        println!(
            "Wrote {} ({} frames from {} units, {} skipped)",
            output.display(),
            report.output_frames,
            report.rendered.len(),
            report.skipped.len()
        );
    }
    Ok(())
}

fn run_fonts(input: &InputArgs, font_path: Option<PathBuf>, json: bool) -> Result<()> {
    let mut settings = build_settings(input, None)?;
    if font_path.is_some() {
        settings.font_path = font_path;
    }
    let assets = AssetRoot::new(&input.assets);
    let (_, units) = load_units(input, &assets, &settings)?;

    let mut run = GenerationRun::new(settings, &assets)?;
    let entries = run.audit(&units);
    if json {
        let stdout = serde_json::to_string_pretty(&entries).context("failed to encode font audit")?;
        println!("{stdout}");
        return Ok(());
    }
    for entry in &entries {
        match &entry.font {
            Some(font) => {
                let missing = if entry.missing_codepoints.is_empty() {
                    String::new()
                } else {
                    format!(" missing {}", entry.missing_codepoints.join(" "))
                };
                println!(
                    "{} ({}): {} [{}]{}",
                    entry.text,
                    entry.lang,
                    font,
                    entry.source.as_deref().unwrap_or("?"),
                    missing
                );
            }
            None => println!("{} ({}): unrenderable", entry.text, entry.lang),
        }
    }
    Ok(())
}

fn load_units(
    input: &InputArgs,
    assets: &AssetRoot,
    settings: &RenderSettings,
) -> Result<(RenderInput, Vec<TextUnit>)> {
    let render_input = RenderInput {
        text: input.text.clone(),
        text_array: input.text_array.clone(),
    };
    let catalog = if render_input.word_context().is_some() {
        JsonCatalog::load(&assets.translations_path())?
    } else {
        JsonCatalog::default()
    };
    let units = collect_units(&render_input, &catalog, &settings.languages)?;
    info!(units = units.len(), "collected text units");
    Ok((render_input, units))
}

/// Settings file (or defaults) with command-line flags layered on top.
fn build_settings(input: &InputArgs, style: Option<&StyleArgs>) -> Result<RenderSettings> {
    let mut settings = match &input.config {
        Some(path) => load_settings(path)?,
        None => RenderSettings::default(),
    };

    if !input.languages.is_empty() {
        settings.languages = parse_languages(&input.languages);
    }

    if let Some(style) = style {
        if let Some(raw) = &style.size {
            settings.size = parse_size(raw)?;
        }
        if let Some(font_size) = style.font_size {
            settings.font_size = Some(font_size);
        }
        if let Some(raw) = &style.font_color {
            settings.font_color = parse_rgb(raw)?;
        }
        if let Some(path) = &style.font_path {
            settings.font_path = Some(path.clone());
        }
        if let Some(raw) = &style.background_color {
            settings.background_color = parse_rgb(raw)?;
        }
        if let Some(raw) = &style.delay {
            settings.delay = parse_delay(raw)?;
        }
        if let Some(raw) = &style.pacing {
            settings.pacing = raw.parse::<Pacing>()?;
        }
        settings.smart_color |= style.smart_color;
        settings.flag_colors |= style.flag_colors;
        settings.rainbow |= style.rainbow;
        settings.background_images |= style.background_images;
        settings.show_labels |= style.show_labels;
        if style.seed.is_some() {
            settings.seed = style.seed;
        }
    }

    settings.validate()?;
    Ok(settings)
}

fn report_error(error: &anyhow::Error, json_errors: bool) -> ExitCode {
    let coded = error
        .downcast_ref::<GenerateError>()
        .map(|failure| CodedError::from(*failure))
        .or_else(|| find_coded_error(error).cloned())
        .unwrap_or_else(|| CodedError::internal(error));

    match serde_json::to_string(&coded.envelope()) {
        Ok(json) if json_errors => eprintln!("{json}"),
        _ => eprintln!("error: {error:#}"),
    }
    ExitCode::from(coded.code.exit_status())
}
