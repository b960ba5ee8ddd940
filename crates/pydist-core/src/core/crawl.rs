//! Candidate discovery sources.

use std::path::PathBuf;

use anyhow::Result;
use walkdir::WalkDir;

/// A discovery source: raw location strings that may be relevant to a
/// project. The obtainer recognizes and filters them; crawlers only list.
pub trait Crawl {
    fn crawl(&self, project: &str) -> Result<Vec<String>>;
}

/// Find-links style discovery: every file directly under the configured
/// directories is a candidate location.
#[derive(Clone, Debug)]
pub struct DirectoryCrawler {
    roots: Vec<PathBuf>,
}

impl DirectoryCrawler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    pub fn with_roots(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }
}

impl Crawl for DirectoryCrawler {
    fn crawl(&self, _project: &str) -> Result<Vec<String>> {
        let mut links = Vec::new();
        for root in &self.roots {
            for entry in WalkDir::new(root).max_depth(1) {
                let entry = entry?;
                if entry.file_type().is_file() {
                    links.push(entry.path().display().to_string());
                }
            }
        }
        links.sort();
        Ok(links)
    }
}

/// A fixed set of links: static indexes and tests.
#[derive(Clone, Debug)]
pub struct StaticCrawler {
    links: Vec<String>,
}

impl StaticCrawler {
    pub fn new(links: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            links: links.into_iter().map(Into::into).collect(),
        }
    }
}

impl Crawl for StaticCrawler {
    fn crawl(&self, _project: &str) -> Result<Vec<String>> {
        Ok(self.links.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn directory_crawler_lists_files_only() -> Result<()> {
        let temp = tempfile::tempdir()?;
        fs::write(temp.path().join("a-1.0.tar.gz"), b"a")?;
        fs::write(temp.path().join("b-1.0.whl"), b"b")?;
        fs::create_dir(temp.path().join("subdir"))?;

        let links = DirectoryCrawler::new(temp.path()).crawl("anything")?;
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|link| link.ends_with(".tar.gz") || link.ends_with(".whl")));
        Ok(())
    }

    #[test]
    fn static_crawler_returns_its_links() -> Result<()> {
        let crawler = StaticCrawler::new(["one", "two"]);
        assert_eq!(crawler.crawl("x")?, vec!["one".to_string(), "two".to_string()]);
        Ok(())
    }
}
