//! Environment-first configuration for the shared install cache.

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where the install cache lives and which setting produced the answer.
#[derive(Clone, Debug)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

/// Resolve the shared install cache root.
///
/// `PYDIST_CACHE_PATH` wins when set; otherwise the platform cache directory
/// is used. The directory is created if missing. Concurrent processes sharing
/// one cache root are not supported; give each run its own root instead.
pub fn resolve_cache_root() -> Result<CacheLocation> {
    let location = if let Some(override_path) = env::var_os("PYDIST_CACHE_PATH") {
        CacheLocation {
            path: PathBuf::from(override_path),
            source: "PYDIST_CACHE_PATH",
        }
    } else {
        let base = dirs_next::cache_dir().context("no cache directory for this platform")?;
        CacheLocation {
            path: base.join("pydist"),
            source: "platform cache dir",
        }
    };
    fs::create_dir_all(&location.path)
        .with_context(|| format!("failed to create cache root {}", location.path.display()))?;
    Ok(location)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn cache_path_override_wins() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("cache-root");
        let previous = env::var_os("PYDIST_CACHE_PATH");
        env::set_var("PYDIST_CACHE_PATH", &override_path);
        let location = resolve_cache_root();
        match previous {
            Some(value) => env::set_var("PYDIST_CACHE_PATH", value),
            None => env::remove_var("PYDIST_CACHE_PATH"),
        }

        let location = location?;
        assert_eq!(location.source, "PYDIST_CACHE_PATH");
        assert_eq!(location.path, override_path);
        assert!(override_path.is_dir(), "override root should be created");
        Ok(())
    }
}
