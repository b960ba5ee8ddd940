//! Expose prebuilt archives and installed trees as distributions.
//!
//! The adapters parse embedded metadata in place, without an install step:
//! standard archives keep it in a `<name>-<version>.dist-info` directory
//! derived from the filename, legacy archives at a fixed `EGG-INFO` root
//! (possibly with further legacy archives bundled one level deep), and
//! unpacked trees in an `EGG-INFO`/`*.egg-info` directory on disk.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::str::FromStr;
use std::sync::OnceLock;

use pep440_rs::Version;
use tracing::debug;
use zip::ZipArchive;

use pydist_domain::Distribution;

type Finder = fn(&Path) -> Vec<Distribution>;

static FINDERS: OnceLock<Vec<Finder>> = OnceLock::new();

/// Install the default adapter chain. Idempotent; collaborators call this
/// once at process start, before relying on archive-backed distributions.
pub fn register_finders() {
    FINDERS.get_or_init(|| vec![find_wheel_in_zip, find_eggs_in_zip, find_egg_on_path]);
}

/// Every distribution the registered adapters can see at `path`. Empty when
/// nothing matches, or when [`register_finders`] was never called.
pub fn find_distributions(path: &Path) -> Vec<Distribution> {
    let Some(finders) = FINDERS.get() else {
        debug!("no finders registered; call register_finders() at process start");
        return Vec::new();
    };
    let mut found = Vec::new();
    for finder in finders {
        found.extend(finder(path));
    }
    found
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Normalize an embedded-archive path for comparison: unify separators, drop
/// empty and `.` trailing elements. Zips in the wild disagree on both.
fn normalized_path(path: &str) -> String {
    let mut parts: Vec<&str> = path.split(['/', '\\']).collect();
    while let Some(last) = parts.last() {
        if last.is_empty() || *last == "." {
            parts.pop();
        } else {
            break;
        }
    }
    parts.join("/")
}

fn read_zip_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, wanted: &str) -> Option<String> {
    let wanted = normalized_path(wanted);
    let name = archive
        .file_names()
        .find(|name| normalized_path(name) == wanted)
        .map(str::to_string)?;
    let mut entry = archive.by_name(&name).ok()?;
    let mut contents = String::new();
    entry.read_to_string(&mut contents).ok()?;
    Some(contents)
}

/// RFC-822 style metadata headers; only `Name` and `Version` matter here, and
/// the version must be orderable.
fn parse_metadata(contents: &str) -> Option<(String, Version)> {
    let mut name = None;
    let mut version = None;
    for line in contents.lines() {
        if line.trim().is_empty() {
            break; // headers end at the first blank line
        }
        if let Some(value) = line.strip_prefix("Name:") {
            name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Version:") {
            version = Some(value.trim().to_string());
        }
    }
    let version = Version::from_str(&version?).ok()?;
    Some((name?, version))
}

fn manifest_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Standard archives: metadata lives in `<name>-<version>.dist-info`, the
/// prefix being the stem minus its three tag fields.
fn find_wheel_in_zip(path: &Path) -> Vec<Distribution> {
    if !has_extension(path, "whl") {
        return Vec::new();
    }
    let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
        return Vec::new();
    };
    let fields: Vec<&str> = stem.split('-').collect();
    if fields.len() < 5 {
        return Vec::new();
    }
    let prefix = fields[..fields.len() - 3].join("-");
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let Ok(mut archive) = ZipArchive::new(file) else {
        return Vec::new();
    };
    let Some(contents) = read_zip_entry(&mut archive, &format!("{prefix}.dist-info/METADATA"))
    else {
        return Vec::new();
    };
    let Some((name, version)) = parse_metadata(&contents) else {
        return Vec::new();
    };
    vec![Distribution {
        location: path.to_path_buf(),
        name,
        version,
        files: Vec::new(),
    }]
}

fn egg_from_zip<R: Read + Seek>(archive: &mut ZipArchive<R>, location: &Path) -> Option<Distribution> {
    let contents = read_zip_entry(archive, "EGG-INFO/PKG-INFO")?;
    let (name, version) = parse_metadata(&contents)?;
    let files = read_zip_entry(archive, "EGG-INFO/installed-files.txt")
        .map(|contents| manifest_lines(&contents))
        .unwrap_or_default();
    Some(Distribution {
        location: location.to_path_buf(),
        name,
        version,
        files,
    })
}

/// Legacy archives: metadata at the fixed `EGG-INFO` root. A legacy archive
/// may bundle further legacy archives; exactly one level of nesting is
/// supported, which covers the one bundling layout seen in practice.
fn find_eggs_in_zip(path: &Path) -> Vec<Distribution> {
    if !has_extension(path, "egg") {
        return Vec::new();
    }
    let Ok(file) = File::open(path) else {
        return Vec::new();
    };
    let Ok(mut archive) = ZipArchive::new(file) else {
        return Vec::new();
    };
    let mut found = Vec::new();
    found.extend(egg_from_zip(&mut archive, path));

    let nested_names: Vec<String> = archive
        .file_names()
        .filter(|name| {
            let normalized = normalized_path(name);
            !normalized.contains('/') && normalized.to_ascii_lowercase().ends_with(".egg")
        })
        .map(str::to_string)
        .collect();
    for nested_name in nested_names {
        let Ok(mut entry) = archive.by_name(&nested_name) else {
            continue;
        };
        let mut bytes = Vec::new();
        if entry.read_to_end(&mut bytes).is_err() {
            continue;
        }
        drop(entry);
        let Ok(mut nested) = ZipArchive::new(Cursor::new(bytes)) else {
            continue;
        };
        found.extend(egg_from_zip(&mut nested, &path.join(&nested_name)));
    }
    found
}

/// Unpacked legacy trees and install trees: `PKG-INFO` under `EGG-INFO` or a
/// `*.egg-info` directory, with the install manifest beside it when present.
fn find_egg_on_path(path: &Path) -> Vec<Distribution> {
    if !path.is_dir() {
        return Vec::new();
    }
    let mut candidates = vec![path.join("EGG-INFO")];
    if let Ok(entries) = fs::read_dir(path) {
        for entry in entries.flatten() {
            let entry_path = entry.path();
            if entry_path.is_dir()
                && entry_path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("egg-info"))
            {
                candidates.push(entry_path);
            }
        }
    }
    for metadata_dir in candidates {
        let Ok(contents) = fs::read_to_string(metadata_dir.join("PKG-INFO")) else {
            continue;
        };
        let Some((name, version)) = parse_metadata(&contents) else {
            continue;
        };
        let files = fs::read_to_string(metadata_dir.join("installed-files.txt"))
            .map(|contents| manifest_lines(&contents))
            .unwrap_or_default();
        return vec![Distribution {
            location: path.to_path_buf(),
            name,
            version,
            files,
        }];
    }
    Vec::new()
}
