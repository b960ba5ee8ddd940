//! Discover, filter, and order candidate packages for a requirement.

use anyhow::Result;
use pep440_rs::Version;
use pep508_rs::Requirement;
use tracing::debug;

use pydist_domain::{requirement_name, Package, PackageKind};

use crate::core::crawl::Crawl;

/// Prebuilt artifacts outrank source archives at equal version.
pub const DEFAULT_PRECEDENCE: &[PackageKind] =
    &[PackageKind::Wheel, PackageKind::Egg, PackageKind::Source];

/// Ranks and orders the candidates a discovery source yields.
pub struct Obtainer<C> {
    crawler: C,
    precedence: Vec<PackageKind>,
}

impl<C: Crawl> Obtainer<C> {
    pub fn new(crawler: C) -> Self {
        Self::with_precedence(crawler, DEFAULT_PRECEDENCE.to_vec())
    }

    pub fn with_precedence(crawler: C, precedence: Vec<PackageKind>) -> Self {
        Self {
            crawler,
            precedence,
        }
    }

    /// The sort key: version first, then kind rank within `precedence`
    /// (later-listed kinds rank lower; a kind absent from the tuple gets the
    /// sentinel rank −1, below every listed kind). Version dominating kind is
    /// a documented policy choice: a newer release always wins, and kind only
    /// breaks ties among equal versions.
    pub fn package_precedence(
        package: &Package,
        precedence: &[PackageKind],
    ) -> (Version, i64) {
        let rank = precedence
            .iter()
            .rev()
            .position(|kind| *kind == package.kind())
            .map_or(-1, |rank| rank as i64);
        (package.version().clone(), rank)
    }

    fn iter_unordered(&self, requirement: &Requirement) -> Result<Vec<Package>> {
        let links = self.crawler.crawl(&requirement_name(requirement))?;
        Ok(links
            .iter()
            .filter_map(|link| Package::from_location(link))
            .filter(|package| package.satisfies(requirement))
            .collect())
    }

    /// Candidates for `requirement`, highest precedence first. The sequence
    /// is finite and consumed once; every call issues a fresh discovery
    /// query.
    pub fn iter(&self, requirement: &Requirement) -> Result<impl Iterator<Item = Package>> {
        let mut packages = self.iter_unordered(requirement)?;
        packages.sort_by(|a, b| {
            Self::package_precedence(b, &self.precedence)
                .cmp(&Self::package_precedence(a, &self.precedence))
        });
        debug!(
            requirement = %requirement,
            candidates = packages.len(),
            "obtained candidates"
        );
        Ok(packages.into_iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crawl::StaticCrawler;
    use std::str::FromStr;

    fn requirement(spec: &str) -> Requirement {
        Requirement::from_str(spec).unwrap()
    }

    fn names(obtainer: &Obtainer<StaticCrawler>, spec: &str) -> Vec<String> {
        obtainer
            .iter(&requirement(spec))
            .unwrap()
            .map(|package| package.filename().to_string())
            .collect()
    }

    #[test]
    fn default_precedence_ranks_wheel_over_egg_over_source() {
        let source = Package::from_location("psutil-0.6.1.tar.gz").unwrap();
        let egg = Package::from_location("psutil-0.6.1-py2.6.egg").unwrap();
        let whl =
            Package::from_location("psutil-0.6.1-cp26-none-macosx_10_4_x86_64.whl").unwrap();

        let rank = |package| Obtainer::<StaticCrawler>::package_precedence(package, DEFAULT_PRECEDENCE);
        assert!(rank(&whl) > rank(&egg));
        assert!(rank(&egg) > rank(&source));
        assert!(rank(&whl) > rank(&source));
    }

    #[test]
    fn custom_precedence_ranks_missing_kinds_at_the_sentinel() {
        let source = Package::from_location("psutil-0.6.1.tar.gz").unwrap();
        let egg = Package::from_location("psutil-0.6.1-py2.6.egg").unwrap();
        let whl =
            Package::from_location("psutil-0.6.1-cp26-none-macosx_10_4_x86_64.whl").unwrap();

        let precedence = [PackageKind::Egg, PackageKind::Wheel];
        let rank = |package| Obtainer::<StaticCrawler>::package_precedence(package, &precedence);
        assert_eq!(rank(&source), (source.version().clone(), -1));
        assert!(rank(&whl) > rank(&source));
        assert!(rank(&egg) > rank(&whl));
    }

    #[test]
    fn version_dominates_kind_rank() {
        let newer_source = Package::from_location("psutil-0.7.0.tar.gz").unwrap();
        let older_wheel =
            Package::from_location("psutil-0.6.1-cp26-none-macosx_10_4_x86_64.whl").unwrap();
        let rank =
            |package| Obtainer::<StaticCrawler>::package_precedence(package, DEFAULT_PRECEDENCE);
        assert!(rank(&newer_source) > rank(&older_wheel));
    }

    #[test]
    fn iter_orders_equal_versions_by_kind() {
        let links = [
            "psutil-0.6.1.tar.gz",
            "psutil-0.6.1-py2.6.egg",
            "psutil-0.6.1-cp26-none-macosx_10_4_x86_64.whl",
        ];
        // discovery order must not matter
        for rotation in 0..links.len() {
            let mut rotated = links.to_vec();
            rotated.rotate_left(rotation);
            let obtainer = Obtainer::new(StaticCrawler::new(rotated));
            assert_eq!(
                names(&obtainer, "psutil==0.6.1"),
                vec![
                    "psutil-0.6.1-cp26-none-macosx_10_4_x86_64.whl",
                    "psutil-0.6.1-py2.6.egg",
                    "psutil-0.6.1.tar.gz",
                ]
            );
        }
    }

    #[test]
    fn iter_filters_by_requirement_and_orders_versions_descending() {
        let versions = ["0.4.0", "0.4.1", "0.5.0", "0.6.0"];
        let links: Vec<String> = versions
            .iter()
            .map(|version| format!("http://www.example.com/foo/bar/psutil-{version}.tar.gz"))
            .collect();
        let obtainer = Obtainer::new(StaticCrawler::new(links.clone()));

        for version in versions {
            let spec = format!("psutil=={version}");
            let found: Vec<Package> = obtainer.iter(&requirement(&spec)).unwrap().collect();
            assert_eq!(found.len(), 1, "version {version}");
            assert_eq!(found[0].raw_version(), version);
        }

        assert_eq!(
            names(&obtainer, "psutil>=0.5.0"),
            vec!["psutil-0.6.0.tar.gz", "psutil-0.5.0.tar.gz"]
        );

        assert_eq!(
            names(&obtainer, "psutil"),
            vec![
                "psutil-0.6.0.tar.gz",
                "psutil-0.5.0.tar.gz",
                "psutil-0.4.1.tar.gz",
                "psutil-0.4.0.tar.gz",
            ]
        );
    }

    #[test]
    fn unrecognized_links_and_other_projects_are_discarded() {
        let obtainer = Obtainer::new(StaticCrawler::new([
            "psutil-0.6.1.tar.gz",
            "README.txt",
            "other-0.6.1.tar.gz",
        ]));
        assert_eq!(names(&obtainer, "psutil"), vec!["psutil-0.6.1.tar.gz"]);
    }
}
