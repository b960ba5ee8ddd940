//! Requirement satisfaction helpers on top of the PEP 440/508 crates.

use std::str::FromStr;

use pep440_rs::{Version, VersionSpecifiers};
use pep508_rs::{Requirement, VersionOrUrl};

/// Canonical form of a distribution name: lowercased, with `_` and `.` folded
/// to `-`. All name comparisons in pydist go through this.
pub fn normalize_name(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}

/// The normalized project name a requirement refers to.
pub fn requirement_name(requirement: &Requirement) -> String {
    normalize_name(&requirement.name.to_string())
}

/// Whether `version` lies within the requirement's constraint.
///
/// A requirement without a version clause admits every version; a requirement
/// pinned to a URL admits none (it names an artifact, not a version range).
pub fn version_allowed(requirement: &Requirement, version: &Version) -> bool {
    match &requirement.version_or_url {
        None => true,
        Some(VersionOrUrl::VersionSpecifier(specifiers)) => {
            VersionSpecifiers::from_str(&specifiers.to_string())
                .map(|specifiers| specifiers.contains(version))
                .unwrap_or(false)
        }
        Some(VersionOrUrl::Url(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(spec: &str) -> Requirement {
        Requirement::from_str(spec).expect("well-formed requirement")
    }

    fn version(value: &str) -> Version {
        Version::from_str(value).expect("well-formed version")
    }

    #[test]
    fn normalizes_separators_and_case() {
        assert_eq!(normalize_name("Django"), "django");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("backports_abc"), "backports-abc");
    }

    #[test]
    fn bare_requirement_admits_every_version() {
        let req = requirement("psutil");
        assert!(version_allowed(&req, &version("0.4.0")));
        assert!(version_allowed(&req, &version("9.9")));
    }

    #[test]
    fn pinned_requirement_admits_only_the_pin() {
        let req = requirement("psutil==0.6.1");
        assert!(version_allowed(&req, &version("0.6.1")));
        assert!(!version_allowed(&req, &version("0.6.0")));
    }

    #[test]
    fn range_requirement_respects_bounds() {
        let req = requirement("psutil>=0.5.0");
        assert!(!version_allowed(&req, &version("0.4.1")));
        assert!(version_allowed(&req, &version("0.5.0")));
        assert!(version_allowed(&req, &version("0.6.0")));
    }
}
