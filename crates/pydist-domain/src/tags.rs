//! Compatibility tag prediction for binary artifacts.
//!
//! Predicts the ordered tag set an interpreter/platform pair supports, without
//! requiring that interpreter to exist on this machine. The prediction is an
//! approximation of the manifest a live interpreter would report; it is close
//! enough to decide whether a prebuilt artifact may be used.

use std::collections::HashSet;
use std::fmt;

use anyhow::{bail, Result};

/// A `(python, abi, platform)` compatibility triple.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tag {
    pub python: String,
    pub abi: String,
    pub platform: String,
}

impl Tag {
    pub fn new(
        python: impl Into<String>,
        abi: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            python: python.into(),
            abi: abi.into(),
            platform: platform.into(),
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

/// Interpreter families with a known short implementation code. Anything else
/// supports no predictable binary tags.
fn implementation_code(implementation: &str) -> Option<&'static str> {
    match implementation {
        "CPython" => Some("cp"),
        "Jython" => Some("jy"),
        "PyPy" => Some("pp"),
        "IronPython" => Some("ip"),
        _ => None,
    }
}

/// macOS arch tokens that historically shipped multi-arch binaries and the
/// scalar arches each one can run.
const MACOSX_PLATFORM_COMPATIBILITY: &[(&str, &[&str])] = &[
    ("i386", &["i386"]),
    ("ppc", &["ppc"]),
    ("x86_64", &["x86_64"]),
    ("ppc64", &["ppc64"]),
    ("fat", &["i386", "ppc"]),
    ("intel", &["i386", "x86_64"]),
    ("fat3", &["i386", "ppc", "x86_64"]),
    ("fat64", &["ppc64", "x86_64"]),
    ("universal", &["i386", "ppc", "ppc64", "x86_64"]),
];

fn is_macosx_platform(platform: &str) -> bool {
    platform.starts_with("macosx")
}

/// Split `macosx-{major}.{minor}-{arch}` into its parts. Anything that does
/// not match that shape is a caller error, not a skippable candidate.
fn parse_macosx_platform(platform: &str) -> Result<(u64, u64, &str)> {
    let parsed = platform.strip_prefix("macosx-").and_then(|rest| {
        let (version, arch) = rest.split_once('-')?;
        let (major, minor) = version.split_once('.')?;
        if arch.is_empty() {
            return None;
        }
        Some((major.parse().ok()?, minor.parse().ok()?, arch))
    });
    match parsed {
        Some(parts) => Ok(parts),
        None => bail!("malformed macosx platform string: {platform}"),
    }
}

fn expand_macosx(platform: &str) -> Result<Vec<String>> {
    let (major, minor, arch) = parse_macosx_platform(platform)?;
    let family = MACOSX_PLATFORM_COMPATIBILITY
        .iter()
        .find(|(token, _)| *token == arch)
        .map(|(_, family)| *family)
        .unwrap_or_default();
    let mut arches = vec![arch];
    for candidate in family {
        if *candidate != arch {
            arches.push(*candidate);
        }
    }
    let mut expanded = Vec::new();
    for minor in (0..=minor).rev() {
        for arch in &arches {
            expanded.push(format!("macosx-{major}.{minor}-{arch}"));
        }
    }
    Ok(expanded)
}

/// Expand a platform string into its binary-compatible family, newest first.
/// Only the macOS family fans out; every other platform is its own family.
pub fn platform_family(platform: &str) -> Result<Vec<String>> {
    if is_macosx_platform(platform) {
        expand_macosx(platform)
    } else {
        Ok(vec![platform.to_string()])
    }
}

/// Platform strings become tags with `.` and `-` folded to `_`.
fn platform_tag(platform: &str) -> String {
    platform.replace(['.', '-'], "_")
}

/// Predict the ordered tag sequence for an interpreter family, version, and
/// platform, most specific first: implementation-specific ABI triples, then
/// generic `py`/implementation triples over every platform plus `any`, major
/// version first and minors descending to zero.
pub fn supported_tags(
    implementation: &str,
    version: (u64, u64),
    platform: &str,
) -> Result<Vec<Tag>> {
    let Some(code) = implementation_code(implementation) else {
        return Ok(Vec::new());
    };
    let (major, minor) = version;
    let version_tag = format!("{major}{minor}");

    // Predicted ABIs for compiled extensions. Only CPython 3+ has a naming
    // scheme stable enough to guess.
    let mut abis = Vec::new();
    if code == "cp" && major >= 3 {
        abis.push(format!("cp{version_tag}m"));
        abis.push("abi3".to_string());
    }

    let platforms: Vec<String> = platform_family(platform)?
        .iter()
        .map(|platform| platform_tag(platform))
        .collect();

    let mut tags = Vec::new();
    for platform in &platforms {
        for abi in &abis {
            tags.push(Tag::new(format!("{code}{version_tag}"), abi, platform));
        }
    }

    let mut generic_platforms = platforms;
    generic_platforms.push("any".to_string());
    for platform in &generic_platforms {
        for prefix in ["py", code] {
            tags.push(Tag::new(format!("{prefix}{major}"), "none", platform));
            for minor in (0..=minor).rev() {
                tags.push(Tag::new(format!("{prefix}{major}{minor}"), "none", platform));
            }
        }
    }
    Ok(tags)
}

/// The interpreter/platform pair compatibility is evaluated against. The
/// supported-tag sequence and platform family are computed once, eagerly, so a
/// malformed platform string is rejected at construction.
#[derive(Clone, Debug)]
pub struct Target {
    implementation: String,
    version: (u64, u64),
    platform: String,
    family: Vec<String>,
    supported: Vec<Tag>,
    supported_index: HashSet<Tag>,
}

impl Target {
    pub fn new(implementation: &str, version: (u64, u64), platform: &str) -> Result<Self> {
        let supported = supported_tags(implementation, version, platform)?;
        let supported_index = supported.iter().cloned().collect();
        Ok(Self {
            implementation: implementation.to_string(),
            version,
            platform: platform.to_string(),
            family: platform_family(platform)?,
            supported,
            supported_index,
        })
    }

    pub fn implementation(&self) -> &str {
        &self.implementation
    }

    pub fn version(&self) -> (u64, u64) {
        self.version
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// `"{major}.{minor}"`, the form legacy archives carry in their filename.
    pub fn python_version(&self) -> String {
        format!("{}.{}", self.version.0, self.version.1)
    }

    /// The predicted tag sequence, most specific first.
    pub fn supported(&self) -> &[Tag] {
        &self.supported
    }

    pub fn supports(&self, tag: &Tag) -> bool {
        self.supported_index.contains(tag)
    }

    /// Whether `platform` names this target's platform or a member of its
    /// binary-compatibility family (untranslated spelling, as archives carry).
    pub fn platform_compatible(&self, platform: &str) -> bool {
        self.family.iter().any(|member| member == platform)
    }
}
