//! The end product of translation: a local artifact with parsed metadata.

use std::path::PathBuf;

use pep440_rs::Version;

/// A resolved, installable distribution. Immutable once produced; only the
/// translator pipeline and the archive finders construct these.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
    /// Local path of the artifact (archive file or unpacked tree).
    pub location: PathBuf,
    /// Project name as recorded in the artifact's metadata.
    pub name: String,
    pub version: Version,
    /// Relative paths installed by this distribution, when the layout records
    /// them; empty otherwise.
    pub files: Vec<String>,
}
