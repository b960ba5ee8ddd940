//! Materialize candidate locations as local files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use pydist_domain::location_basename;

pub(crate) const USER_AGENT: &str = concat!("pydist/", env!("CARGO_PKG_VERSION"));
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Why a location could not be materialized locally.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The unreadable-link condition: the origin cannot be read (network
    /// error, bad status, missing file, corrupt archive).
    #[error("unreadable link {location}: {reason}")]
    Unreadable { location: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FetchError {
    pub(crate) fn unreadable(location: &str, reason: impl ToString) -> Self {
        FetchError::Unreadable {
            location: location.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The fetch collaborator: place `location` under `dest_dir` (named by origin
/// basename) and return the local path.
pub trait Fetch {
    fn fetch(
        &self,
        location: &str,
        dest_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<PathBuf, FetchError>;
}

/// Blocking fetcher for `http(s)` URLs, `file` URLs, and plain local paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fetcher;

impl Fetch for Fetcher {
    fn fetch(
        &self,
        location: &str,
        dest_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<PathBuf, FetchError> {
        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                fetch_http(&url, location, dest_dir, timeout)
            }
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|()| FetchError::unreadable(location, "not a file path"))?;
                copy_local(&path, location, dest_dir)
            }
            // Not a URL at all: treat it as a filesystem path.
            _ => copy_local(Path::new(location), location, dest_dir),
        }
    }
}

fn fetch_http(
    url: &Url,
    location: &str,
    dest_dir: &Path,
    timeout: Option<Duration>,
) -> Result<PathBuf, FetchError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout.unwrap_or(HTTP_TIMEOUT))
        .build()
        .map_err(|err| FetchError::unreadable(location, err))?;
    let mut response = client
        .get(url.as_str())
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|err| FetchError::unreadable(location, err))?;

    fs::create_dir_all(dest_dir)?;
    let mut tmp = NamedTempFile::new_in(dest_dir)?;
    io::copy(&mut response, tmp.as_file_mut())
        .map_err(|err| FetchError::unreadable(location, err))?;
    let dest = dest_dir.join(location_basename(location));
    tmp.persist(&dest).map_err(|err| FetchError::Io(err.error))?;
    debug!(location, dest = %dest.display(), "fetched");
    Ok(dest)
}

fn copy_local(path: &Path, location: &str, dest_dir: &Path) -> Result<PathBuf, FetchError> {
    if !path.is_file() {
        return Err(FetchError::unreadable(location, "no such file"));
    }
    let file_name = path
        .file_name()
        .ok_or_else(|| FetchError::unreadable(location, "no filename"))?;
    fs::create_dir_all(dest_dir)?;
    let dest = dest_dir.join(file_name);
    // fetching a file already at its destination must not truncate it
    if dest != path {
        fs::copy(path, &dest)?;
    }
    Ok(dest)
}
