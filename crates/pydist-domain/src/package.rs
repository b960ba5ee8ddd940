//! The candidate package model: three archive grammars behind one type.
//!
//! Kind dispatch happens by filename, not by explicit tagging: each variant's
//! parser either accepts the location outright or refuses it so the next
//! grammar in the registry can try. An unrecognized location is a valid
//! "not a package" answer, never an error.

use std::str::FromStr;

use pep440_rs::Version;
use pep508_rs::Requirement;

use crate::requirement::{normalize_name, requirement_name, version_allowed};
use crate::tags::{Tag, Target};

/// The candidate kinds, in the order their grammars are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PackageKind {
    Source,
    Egg,
    Wheel,
}

/// Container formats a source archive may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    Tar,
    TarGz,
    TarBz2,
    Zip,
}

/// Source extensions, longest first so `.tar.gz` wins over `.tar`.
const SOURCE_EXTENSIONS: &[(&str, ArchiveKind)] = &[
    (".tar.gz", ArchiveKind::TarGz),
    (".tar.bz2", ArchiveKind::TarBz2),
    (".tgz", ArchiveKind::TarGz),
    (".tar", ArchiveKind::Tar),
    (".zip", ArchiveKind::Zip),
];

/// The last path segment of a location, query/fragment stripped.
pub fn location_basename(location: &str) -> &str {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or(location);
    path.rsplit('/').next().unwrap_or(path)
}

/// Strip `extension` (with leading dot, matched case-insensitively) from a
/// filename, returning the stem.
fn strip_extension<'a>(filename: &'a str, extension: &str) -> Option<&'a str> {
    let lower = filename.to_ascii_lowercase();
    let suffix = format!(".{extension}");
    if lower.ends_with(&suffix) {
        Some(&filename[..filename.len() - suffix.len()])
    } else {
        None
    }
}

/// How version-like one `-`-fragment is: the number of its `.`-segments that
/// start with a digit.
fn version_likeness(fragment: &str) -> usize {
    fragment
        .split('.')
        .filter(|segment| segment.chars().next().is_some_and(|ch| ch.is_ascii_digit()))
        .count()
}

/// Split a source stem into name and version fragments.
///
/// The fragment with the most version-like `.`-segments starts the version;
/// the first maximal fragment wins ties.
///
///   pysolr-2.1.0-beta           -> (pysolr, 2.1.0-beta)
///   cElementTree-1.0.5-20051216 -> (cElementTree, 1.0.5-20051216)
///   django-plugin-2-2.3         -> (django-plugin-2, 2.3)
fn split_stem(stem: &str) -> (String, String) {
    let fragments: Vec<&str> = stem.split('-').collect();
    if fragments.len() == 1 {
        return (stem.to_string(), String::new());
    }
    let mut max_index = 0;
    let mut max_score = version_likeness(fragments[0]);
    for (index, fragment) in fragments.iter().enumerate().skip(1) {
        let score = version_likeness(fragment);
        if score > max_score {
            max_index = index;
            max_score = score;
        }
    }
    (
        fragments[..max_index].join("-"),
        fragments[max_index..].join("-"),
    )
}

/// A buildable source archive. Always compatible: it has no binary identity
/// until the installer gives it one.
#[derive(Clone, Debug, PartialEq)]
pub struct SourcePackage {
    location: String,
    filename: String,
    archive: ArchiveKind,
    name: String,
    raw_version: String,
    version: Version,
}

impl SourcePackage {
    pub fn parse(location: &str) -> Option<Self> {
        let filename = location_basename(location);
        let lower = filename.to_ascii_lowercase();
        let (extension, archive) = SOURCE_EXTENSIONS
            .iter()
            .find(|(extension, _)| lower.ends_with(extension))?;
        let stem = &filename[..filename.len() - extension.len()];
        let (name, raw_version) = split_stem(stem);
        if name.is_empty() {
            return None;
        }
        // A stem without an orderable version cannot be ranked; refuse it.
        let version = Version::from_str(&raw_version).ok()?;
        Some(Self {
            location: location.to_string(),
            filename: filename.to_string(),
            archive: *archive,
            name: normalize_name(&name),
            raw_version,
            version,
        })
    }

    pub fn archive_kind(&self) -> ArchiveKind {
        self.archive
    }
}

/// A legacy prebuilt archive: `name-version-py{X.Y}[-platform].egg`.
#[derive(Clone, Debug, PartialEq)]
pub struct EggPackage {
    location: String,
    filename: String,
    name: String,
    raw_version: String,
    version: Version,
    py_version: String,
    platform: Option<String>,
}

impl EggPackage {
    pub fn parse(location: &str) -> Option<Self> {
        let filename = location_basename(location);
        let stem = strip_extension(filename, "egg")?;
        let mut fields = stem.splitn(4, '-');
        let name = fields.next()?;
        let raw_version = fields.next()?;
        let py_field = fields.next()?;
        // The platform is the remainder and may itself contain dashes.
        let platform = fields.next().map(str::to_string);
        let py_version = py_field.strip_prefix("py")?;
        if name.is_empty() || raw_version.is_empty() || py_version.is_empty() {
            return None;
        }
        let version = Version::from_str(raw_version).ok()?;
        Some(Self {
            location: location.to_string(),
            filename: filename.to_string(),
            name: normalize_name(name),
            raw_version: raw_version.to_string(),
            version,
            py_version: py_version.to_string(),
            platform,
        })
    }

    /// The `X.Y` interpreter version the archive was built for.
    pub fn py_version(&self) -> &str {
        &self.py_version
    }

    /// The platform the archive was built on; `None` means pure.
    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    pub fn compatible(&self, target: &Target) -> bool {
        if self.py_version != target.python_version() {
            return false;
        }
        match &self.platform {
            None => true,
            Some(platform) => target.platform_compatible(platform),
        }
    }
}

/// A standard prebuilt archive: `name-version-pytag-abitag-archtag.whl`,
/// where each tag field is a `.`-separated list forming a cross-product of
/// supported triples.
#[derive(Clone, Debug, PartialEq)]
pub struct WheelPackage {
    location: String,
    filename: String,
    name: String,
    raw_version: String,
    version: Version,
    py_tag: String,
    abi_tag: String,
    arch_tag: String,
    supported: Vec<Tag>,
}

impl WheelPackage {
    pub fn parse(location: &str) -> Option<Self> {
        let filename = location_basename(location);
        let stem = strip_extension(filename, "whl")?;
        let fields: Vec<&str> = stem.split('-').collect();
        let [name, raw_version, py_tag, abi_tag, arch_tag] = fields.as_slice() else {
            return None;
        };
        if name.is_empty() || raw_version.is_empty() {
            return None;
        }
        // Wheel stems spell `-` as `_` in the name and version fields.
        let raw_version = raw_version.replace('_', "-");
        let version = Version::from_str(&raw_version).ok()?;
        let supported = cross_product(py_tag, abi_tag, arch_tag);
        Some(Self {
            location: location.to_string(),
            filename: filename.to_string(),
            name: normalize_name(name),
            raw_version,
            version,
            py_tag: py_tag.to_string(),
            abi_tag: abi_tag.to_string(),
            arch_tag: arch_tag.to_string(),
            supported,
        })
    }

    /// The advertised tag cross-product.
    pub fn supported(&self) -> &[Tag] {
        &self.supported
    }

    pub fn compatible(&self, target: &Target) -> bool {
        self.supported.iter().any(|tag| target.supports(tag))
    }
}

fn cross_product(py_tag: &str, abi_tag: &str, arch_tag: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    for py in py_tag.split('.') {
        for abi in abi_tag.split('.') {
            for arch in arch_tag.split('.') {
                tags.push(Tag::new(py, abi, arch));
            }
        }
    }
    tags
}

/// A recognized candidate archive of one of the three kinds.
#[derive(Clone, Debug, PartialEq)]
pub enum Package {
    Source(SourcePackage),
    Egg(EggPackage),
    Wheel(WheelPackage),
}

type PackageParser = fn(&str) -> Option<Package>;

fn parse_source(location: &str) -> Option<Package> {
    SourcePackage::parse(location).map(Package::Source)
}

fn parse_egg(location: &str) -> Option<Package> {
    EggPackage::parse(location).map(Package::Egg)
}

fn parse_wheel(location: &str) -> Option<Package> {
    WheelPackage::parse(location).map(Package::Wheel)
}

/// Variant grammars in registration order; the first to accept a location
/// wins. The grammars are disjoint by extension, so order is cosmetic.
const PARSERS: &[PackageParser] = &[parse_source, parse_egg, parse_wheel];

impl Package {
    /// Recognize a candidate location, or decline it.
    pub fn from_location(location: &str) -> Option<Package> {
        PARSERS.iter().find_map(|parse| parse(location))
    }

    pub fn kind(&self) -> PackageKind {
        match self {
            Package::Source(_) => PackageKind::Source,
            Package::Egg(_) => PackageKind::Egg,
            Package::Wheel(_) => PackageKind::Wheel,
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Package::Source(package) => &package.location,
            Package::Egg(package) => &package.location,
            Package::Wheel(package) => &package.location,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Package::Source(package) => &package.filename,
            Package::Egg(package) => &package.filename,
            Package::Wheel(package) => &package.filename,
        }
    }

    /// The normalized project name.
    pub fn name(&self) -> &str {
        match self {
            Package::Source(package) => &package.name,
            Package::Egg(package) => &package.name,
            Package::Wheel(package) => &package.name,
        }
    }

    pub fn raw_version(&self) -> &str {
        match self {
            Package::Source(package) => &package.raw_version,
            Package::Egg(package) => &package.raw_version,
            Package::Wheel(package) => &package.raw_version,
        }
    }

    pub fn version(&self) -> &Version {
        match self {
            Package::Source(package) => &package.version,
            Package::Egg(package) => &package.version,
            Package::Wheel(package) => &package.version,
        }
    }

    /// Whether this candidate's name and version satisfy `requirement`.
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        requirement_name(requirement) == self.name() && version_allowed(requirement, self.version())
    }

    /// Whether this candidate can run under `target`. Source archives always
    /// can, once built.
    pub fn compatible(&self, target: &Target) -> bool {
        match self {
            Package::Source(_) => true,
            Package::Egg(package) => package.compatible(target),
            Package::Wheel(package) => package.compatible(target),
        }
    }
}
