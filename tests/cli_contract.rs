use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn run_worldwide(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_worldwide"))
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("worldwide command should run")
}

fn stderr_envelope(output: &Output) -> Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no json envelope in stderr: {stderr}"));
    serde_json::from_str(line).expect("envelope should parse")
}

fn system_font() -> Option<PathBuf> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        "/Library/Fonts/Arial.ttf",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|path| path.is_file())
}

#[test]
fn version_includes_build_hash_slot() {
    let dir = tempdir().unwrap();
    let output = run_worldwide(dir.path(), &["--version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains('('), "version should carry the git hash: {stdout}");
}

#[test]
fn missing_input_is_a_usage_error_with_code() {
    let dir = tempdir().unwrap();
    let output = run_worldwide(dir.path(), &["--json-errors", "render"]);
    assert_eq!(output.status.code(), Some(2));
    let envelope = stderr_envelope(&output);
    assert_eq!(envelope["ok"], Value::Bool(false));
    assert_eq!(envelope["error"]["code"], "NO_INPUT");
}

#[test]
fn malformed_flags_report_stable_codes() {
    let dir = tempdir().unwrap();
    for (flag, value, code) in [
        ("--size", "256", "INVALID_SIZE"),
        ("--font-color", "1,2", "INVALID_RGB"),
        ("--delay", "sine:300", "INVALID_DELAY"),
        ("--pacing", "wobble", "INVALID_PACING"),
    ] {
        let output = run_worldwide(
            dir.path(),
            &["--json-errors", "render", "--text-array", "Hola", flag, value],
        );
        assert_eq!(output.status.code(), Some(2), "{flag} {value}");
        assert_eq!(stderr_envelope(&output)["error"]["code"], code, "{flag} {value}");
    }
}

#[test]
fn unknown_settings_field_is_rejected() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("settings.yaml"), "size: \"64,64\"\nfont_colour: \"1,2,3\"\n").unwrap();
    let output = run_worldwide(
        dir.path(),
        &["--json-errors", "render", "--text-array", "Hola", "--config", "settings.yaml"],
    );
    assert_eq!(output.status.code(), Some(2));
    assert_eq!(stderr_envelope(&output)["error"]["code"], "INVALID_SETTINGS");
}

#[test]
fn nothing_renderable_writes_nothing() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("assets/fonts")).unwrap();
    let output = run_worldwide(
        dir.path(),
        &["--json-errors", "render", "--text-array", "Hola,Hello", "-o", "out.gif"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(stderr_envelope(&output)["error"]["code"], "EMPTY_RESULT");
    assert!(!dir.path().join("out.gif").exists());
}

#[test]
fn font_audit_reports_unrenderable_units() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("assets/fonts")).unwrap();
    let output = run_worldwide(dir.path(), &["fonts", "--text-array", "Hola,你好", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let entries: Value = serde_json::from_slice(&output.stdout).expect("audit json");
    let entries = entries.as_array().expect("audit is a list");
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry["font"].is_null()));
}

#[test]
fn render_writes_gif_and_png_sequence() {
    let Some(font) = system_font() else {
        eprintln!("skipping: no Latin system font found");
        return;
    };
    let dir = tempdir().unwrap();
    let fonts = dir.path().join("assets/fonts");
    fs::create_dir_all(&fonts).unwrap();
    fs::copy(font, fonts.join("NotoSans-Regular.ttf")).unwrap();
    fs::write(
        dir.path().join("assets/translations.json"),
        r#"{ "hello": { "en": "Hello", "es": "Hola", "fr": "Bonjour" } }"#,
    )
    .unwrap();

    let output = run_worldwide(
        dir.path(),
        &[
            "render", "--text", "Hello!", "--size", "96,64", "--delay", "sine:200,100", "-o",
            "hello.gif",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let bytes = fs::read(dir.path().join("hello.gif")).unwrap();
    assert_eq!(&bytes[..6], b"GIF89a");

    let output = run_worldwide(
        dir.path(),
        &[
            "render", "--text", "hello", "--languages", "es", "--pacing", "ease-in", "--json",
            "-o", "frames",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: Value = serde_json::from_slice(&output.stdout).expect("report json");
    assert_eq!(report["output_frames"], 2);
    assert_eq!(report["timing"]["kind"], "per_frame");
    assert!(dir.path().join("frames/frame_0001.png").is_file());
    assert!(dir.path().join("frames/timing.json").is_file());
}
