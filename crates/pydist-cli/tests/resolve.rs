use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use assert_cmd::Command;

fn write_wheel(path: &Path, name: &str, version: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    writer.start_file(format!("{name}-{version}.dist-info/METADATA"), options)?;
    writer.write_all(format!("Name: {name}\nVersion: {version}\n\n").as_bytes())?;
    writer.finish()?;
    Ok(())
}

#[test]
fn resolve_prints_the_distribution() -> Result<()> {
    if which::which("python3").is_err() && which::which("python").is_err() {
        eprintln!("skipping resolve_prints_the_distribution (no python interpreter)");
        return Ok(());
    }

    let links = tempfile::tempdir()?;
    let cache = tempfile::tempdir()?;
    write_wheel(&links.path().join("demo-1.0-py3-none-any.whl"), "demo", "1.0")?;

    let output = Command::cargo_bin("pydist")?
        .args([
            "resolve",
            "demo==1.0",
            "--find-links",
            &links.path().display().to_string(),
            "--cache",
            &cache.path().display().to_string(),
        ])
        .output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("demo 1.0"), "stdout: {stdout}");
    Ok(())
}

#[test]
fn resolve_fails_when_every_candidate_is_exhausted() -> Result<()> {
    if which::which("python3").is_err() && which::which("python").is_err() {
        eprintln!("skipping resolve_fails_when_every_candidate_is_exhausted (no python interpreter)");
        return Ok(());
    }

    let links = tempfile::tempdir()?;
    let cache = tempfile::tempdir()?;

    let output = Command::cargo_bin("pydist")?
        .args([
            "resolve",
            "demo==1.0",
            "--find-links",
            &links.path().display().to_string(),
            "--cache",
            &cache.path().display().to_string(),
        ])
        .output()?;
    assert!(!output.status.success());
    Ok(())
}
