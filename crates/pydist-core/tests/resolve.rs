//! End-to-end resolution over a local find-links directory.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use pydist_core::{
    default_translator, register_finders, DirectoryCrawler, Interpreter, Obtainer, Translate,
    WheelTranslator,
};
use pydist_domain::{Package, Target};

fn metadata_body(name: &str, version: &str) -> String {
    format!("Metadata-Version: 1.1\nName: {name}\nVersion: {version}\n\nBody.\n")
}

fn write_wheel(path: &Path, name: &str, version: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    writer.start_file(format!("{name}-{version}.dist-info/METADATA"), options)?;
    writer.write_all(metadata_body(name, version).as_bytes())?;
    writer.finish()?;
    Ok(())
}

fn write_egg(path: &Path, name: &str, version: &str) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    writer.start_file("EGG-INFO/PKG-INFO", options)?;
    writer.write_all(metadata_body(name, version).as_bytes())?;
    writer.finish()?;
    Ok(())
}

fn write_sdist(path: &Path, name: &str, version: &str) -> Result<()> {
    let file = File::create(path)?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let setup = format!(
        "from setuptools import setup\nsetup(name='{name}', version='{version}', py_modules=[])\n"
    );
    let mut header = tar::Header::new_gnu();
    header.set_size(setup.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, format!("{name}-{version}/setup.py"), setup.as_bytes())?;
    builder.into_inner()?.finish()?;
    Ok(())
}

#[test]
fn obtains_and_translates_the_best_candidate() -> Result<()> {
    register_finders();
    let links = tempfile::tempdir()?;
    let cache = tempfile::tempdir()?;
    write_wheel(
        &links.path().join("psutil-0.6.1-cp26-none-macosx_10_4_x86_64.whl"),
        "psutil",
        "0.6.1",
    )?;
    write_egg(&links.path().join("psutil-0.6.1-py2.6.egg"), "psutil", "0.6.1")?;
    write_sdist(&links.path().join("psutil-0.6.1.tar.gz"), "psutil", "0.6.1")?;

    let target = Target::new("CPython", (2, 6), "macosx-10.4-x86_64")?;
    let obtainer = Obtainer::new(DirectoryCrawler::new(links.path()));
    let requirement = "psutil==0.6.1".parse().unwrap();

    let candidates: Vec<Package> = obtainer.iter(&requirement)?.collect();
    let kinds: Vec<&str> = candidates
        .iter()
        .map(|package| package.filename().rsplit('.').next().unwrap())
        .collect();
    assert_eq!(kinds, vec!["whl", "egg", "gz"]);

    let translator = WheelTranslator::new(cache.path(), target);
    let dist = translator
        .translate(&candidates[0])
        .expect("the wheel is compatible and local");
    assert_eq!(dist.name, "psutil");
    assert_eq!(dist.version.to_string(), "0.6.1");
    assert!(dist.location.starts_with(cache.path()));
    Ok(())
}

#[test]
fn builds_a_source_archive_and_round_trips_the_package() -> Result<()> {
    if std::env::var("PYDIST_BUILD_TESTS").ok().as_deref() != Some("1") {
        eprintln!("skipping builds_a_source_archive_and_round_trips_the_package (PYDIST_BUILD_TESTS!=1)");
        return Ok(());
    }

    register_finders();
    let links = tempfile::tempdir()?;
    let cache = tempfile::tempdir()?;
    write_sdist(&links.path().join("demo-1.0.tar.gz"), "demo", "1.0")?;

    let interpreter = Interpreter::discover()?;
    let translator = default_translator(cache.path(), interpreter, None);
    let source =
        Package::from_location(&links.path().join("demo-1.0.tar.gz").display().to_string())
            .expect("source package");

    let dist = translator.translate(&source).expect("build should succeed");
    assert_eq!(dist.name, "demo");
    assert_eq!(dist.version.to_string(), "1.0");

    // the built artifact must recognize as a package with the same identity
    let built = Package::from_location(&dist.location.display().to_string())
        .expect("built artifact should parse");
    assert_eq!(built.name(), source.name());
    assert_eq!(built.version(), source.version());
    Ok(())
}
