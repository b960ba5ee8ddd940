//! Interpreter discovery and capability probing.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use pep508_rs::Requirement;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::from_slice;
use which::which;

use pydist_domain::Target;

const IDENTITY_SCRIPT: &str = r#"import json, platform, sys
try:
    from distutils.util import get_platform
except ImportError:
    from sysconfig import get_platform
data = {
    "implementation": platform.python_implementation(),
    "major": sys.version_info[0],
    "minor": sys.version_info[1],
    "platform": get_platform(),
}
print(json.dumps(data))
"#;

/// Probe script resolving the on-disk location of an installed distribution
/// satisfying `requirement`. The importlib fallback ignores the version
/// clause; it only runs on interpreters too new for pkg_resources.
fn locate_script(requirement: &Requirement) -> String {
    let spec = requirement.to_string();
    let name = requirement.name.to_string();
    format!(
        r#"import json
location = None
try:
    import pkg_resources
    location = pkg_resources.get_distribution('{spec}').location
except Exception:
    try:
        from importlib import metadata
        location = str(metadata.distribution('{name}').locate_file(''))
    except Exception:
        location = None
print(json.dumps({{"location": location}}))
"#
    )
}

/// A concrete interpreter: the binary to spawn plus the target it represents.
#[derive(Clone, Debug)]
pub struct Interpreter {
    binary: PathBuf,
    target: Target,
}

impl Interpreter {
    /// Locate the interpreter pydist should build with. `PYDIST_PYTHON`
    /// overrides lookup, otherwise `python3`/`python` on the path.
    pub fn discover() -> Result<Self> {
        Self::probe(detect_binary()?)
    }

    /// Probe `binary` for its identity and derive its target.
    pub fn probe(binary: impl Into<PathBuf>) -> Result<Self> {
        let binary = binary.into();
        let payload: IdentityPayload =
            probe_interpreter(&binary, IDENTITY_SCRIPT, "interpreter identity")?;
        let target = Target::new(
            &payload.implementation,
            (payload.major, payload.minor),
            &payload.platform,
        )?;
        Ok(Self { binary, target })
    }

    /// Build a handle for a foreign interpreter without probing it.
    pub fn from_parts(binary: impl Into<PathBuf>, target: Target) -> Self {
        Self {
            binary: binary.into(),
            target,
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Resolve the on-disk location of an installed distribution satisfying
    /// `requirement`, if the interpreter has one.
    pub fn locate(&self, requirement: &Requirement) -> Option<PathBuf> {
        let script = locate_script(requirement);
        let payload: LocatePayload =
            probe_interpreter(&self.binary, &script, "distribution location").ok()?;
        payload.location.map(PathBuf::from)
    }
}

fn detect_binary() -> Result<PathBuf> {
    if let Ok(explicit) = std::env::var("PYDIST_PYTHON") {
        return Ok(PathBuf::from(explicit));
    }
    for candidate in ["python3", "python"] {
        if let Ok(path) = which(candidate) {
            return Ok(path);
        }
    }
    bail!("no python interpreter found; set PYDIST_PYTHON")
}

fn probe_interpreter<T>(binary: &Path, script: &str, guide: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let output = Command::new(binary)
        .arg("-c")
        .arg(script)
        .output()
        .with_context(|| format!("failed to probe {guide} via {}", binary.display()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("python {guide} probe failed: {stderr}");
    }
    from_slice(&output.stdout).context(format!("invalid {guide} payload"))
}

#[derive(Deserialize)]
struct IdentityPayload {
    implementation: String,
    major: u64,
    minor: u64,
    platform: String,
}

#[derive(Deserialize)]
struct LocatePayload {
    location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::str::FromStr;

    #[test]
    fn locate_script_embeds_the_requirement() {
        let requirement = Requirement::from_str("setuptools>=1.1.7").unwrap();
        let script = locate_script(&requirement);
        assert!(script.contains("get_distribution('setuptools>=1.1.7')"));
        assert!(script.contains("metadata.distribution('setuptools')"));
    }

    #[test]
    #[serial]
    fn explicit_interpreter_override_wins() {
        let previous = std::env::var_os("PYDIST_PYTHON");
        std::env::set_var("PYDIST_PYTHON", "/opt/custom/python");
        let detected = detect_binary();
        match previous {
            Some(value) => std::env::set_var("PYDIST_PYTHON", value),
            None => std::env::remove_var("PYDIST_PYTHON"),
        }
        assert_eq!(detected.unwrap(), PathBuf::from("/opt/custom/python"));
    }
}
