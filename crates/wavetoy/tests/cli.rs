use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const SHADER: &str = "\
// bars
void mainImage(out vec4 fragColor, in vec2 fragCoord) {
    vec2 uv = fragCoord / iResolution.xy;
    float level = texture(iChannel0, vec2(uv.x, 0.25)).x;
    fragColor = vec4(vec3(step(uv.y, level)), 1.0);
}
";

fn wavetoy(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_wavetoy"))
        .args(args)
        .env("WAVETOY_CONFIG_DIR", config_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("run wavetoy")
}

#[test]
fn transpile_prints_vulkan_source_with_preserved_body() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("bars.frag");
    fs::write(&shader, SHADER).unwrap();

    let output = wavetoy(dir.path(), &["transpile", shader.to_str().unwrap()]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("#version 450"));
    assert!(stdout.contains("#define HW_PERFORMANCE 0"));
    assert!(stdout.contains("void main() {"));
    assert!(!stdout.contains("mainImage"));
    assert!(stdout.contains("    float level = texture(iChannel0, vec2(uv.x, 0.25)).x;\n"));
}

#[test]
fn transpile_json_reports_uniforms_and_line_map() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("bars.frag");
    fs::write(&shader, SHADER).unwrap();

    let output = wavetoy(
        dir.path(),
        &[
            "transpile",
            shader.to_str().unwrap(),
            "--dialect",
            "opengl",
            "--high-performance",
            "--json",
        ],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["dialect"], "opengl");
    assert_eq!(report["entry_point"], "synthesized");
    let uniforms: Vec<&str> = report["uniforms"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|value| value.as_str())
        .collect();
    assert!(uniforms.contains(&"iResolution"));
    assert!(uniforms.contains(&"iChannel0"));
    let preamble = report["line_map"]["preamble_lines"].as_u64().unwrap();
    assert_eq!(report["line_map"]["first_user_line"].as_u64().unwrap(), preamble + 1);
}

#[test]
fn strict_transpile_rejects_malformed_parameters() {
    let dir = TempDir::new().unwrap();
    let shader = dir.path().join("broken.frag");
    fs::write(
        &shader,
        "void mainImage(out vec4 fragColor, vec2) {\n    fragColor = vec4(0.0);\n}\n",
    )
    .unwrap();

    let lenient = wavetoy(dir.path(), &["transpile", shader.to_str().unwrap()]);
    assert!(lenient.status.success());

    let strict = wavetoy(dir.path(), &["transpile", shader.to_str().unwrap(), "--strict"]);
    assert!(!strict.status.success());
    let stderr = String::from_utf8_lossy(&strict.stderr);
    assert!(stderr.contains("vec2"), "{stderr}");
}

fn write_silence(path: &Path) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for _ in 0..22_050 * 2 {
        writer.write_sample(0_i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn analyze_prints_json_frame() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("silence.wav");
    write_silence(&path);

    let output = wavetoy(dir.path(), &["analyze", path.to_str().unwrap(), "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["sample_rate"], 22_050);
    assert_eq!(report["bins"], 512);
    assert!(report["spectrum"]
        .as_array()
        .unwrap()
        .iter()
        .all(|level| level.as_f64() == Some(0.0)));
    assert!(report["waveform"]
        .as_array()
        .unwrap()
        .iter()
        .all(|sample| sample.as_f64() == Some(0.5)));
}

#[test]
fn analyze_rejects_inverted_decibel_range() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("silence.wav");
    write_silence(&path);

    let output = wavetoy(
        dir.path(),
        &["analyze", path.to_str().unwrap(), "--db-min", "10", "--db-max", "-10"],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid audio analyzer settings"), "{stderr}");
}

#[test]
fn malformed_config_only_affects_commands_that_read_it() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("config.toml"), "[audio]\ndecay = \"later\"\n").unwrap();
    let shader = dir.path().join("bars.frag");
    fs::write(&shader, SHADER).unwrap();
    let audio = dir.path().join("silence.wav");
    write_silence(&audio);

    let transpiled = wavetoy(dir.path(), &["transpile", shader.to_str().unwrap()]);
    assert!(transpiled.status.success(), "{}", String::from_utf8_lossy(&transpiled.stderr));

    let analyzed = wavetoy(dir.path(), &["analyze", audio.to_str().unwrap()]);
    assert!(!analyzed.status.success());
    assert!(String::from_utf8_lossy(&analyzed.stderr).contains("config.toml"));
}
