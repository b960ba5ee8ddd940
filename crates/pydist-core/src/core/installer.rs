//! Isolated subprocess builds of unpacked source trees.
//!
//! An [`Installer`] is one build session: it owns a temporary output
//! directory, runs `setup.py` under the target interpreter exactly once, and
//! releases its directories on every exit path. The interpreter is driven
//! through a bootstrap script piped on stdin, so the build works even when
//! the source tree's own tooling is not importable without path setup.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::str::FromStr;

use pep508_rs::Requirement;
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, warn};

use crate::core::interpreter::Interpreter;
use crate::core::tooling::timings::TimingGuard;

/// What a build session is asked to produce.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildFlavor {
    /// Unpacked install tree plus an `installed-files.txt` manifest.
    Install,
    /// A gztar source archive.
    Sdist,
    /// A legacy single-file archive.
    BdistEgg,
    /// A standard single-file archive.
    BdistWheel,
}

impl BuildFlavor {
    /// Build-time requirements the interpreter must satisfy, as
    /// `(module, requirement)` pairs inserted onto the import path.
    fn mixins(self) -> &'static [(&'static str, &'static str)] {
        match self {
            BuildFlavor::Install => &[("setuptools", "setuptools>=1.1.7")],
            BuildFlavor::Sdist => &[],
            BuildFlavor::BdistEgg => &[("setuptools", "setuptools>=1")],
            BuildFlavor::BdistWheel => &[("setuptools", "setuptools>=2"), ("wheel", "wheel>=0.17")],
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Strict mode: a declared build-time package cannot be located for the
    /// target interpreter. Raised before any subprocess is spawned.
    #[error("interpreter {python:?} cannot run a {flavor:?} build: missing {requirement}")]
    IncapableInterpreter {
        python: PathBuf,
        flavor: BuildFlavor,
        requirement: String,
    },
    /// The subprocess exited non-zero; captured output lives on the outcome.
    #[error("build failed in {source_dir:?}")]
    BuildFailure { source_dir: PathBuf },
    #[error("no artifact produced in {dir:?}")]
    MissingArtifact { dir: PathBuf },
    #[error("ambiguous build outputs in {dir:?}: {count} entries")]
    AmbiguousArtifact { dir: PathBuf, count: usize },
    #[error("build session already cleaned up")]
    SessionClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Captured result of the single `setup.py` invocation.
#[derive(Clone, Debug)]
pub struct BuildOutcome {
    pub success: bool,
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

const BOOTSTRAP_HEADER: &str = "import sys";
const BOOTSTRAP_FOOTER: &str = "\n__file__ = 'setup.py'\n\
exec(compile(open(__file__).read().replace('\\r\\n', '\\n'), __file__, 'exec'))\n";

/// One build session over an unpacked source tree.
pub struct Installer {
    source_dir: PathBuf,
    interpreter: Interpreter,
    flavor: BuildFlavor,
    mixin_locations: Vec<(&'static str, Option<PathBuf>)>,
    install_tmp: Option<TempDir>,
    record: Option<NamedTempFile>,
    metadata_dir: Option<PathBuf>,
    outcome: Option<BuildOutcome>,
}

impl Installer {
    /// Create a session for `source_dir`. In strict mode every build-time
    /// requirement of `flavor` must be locatable for the interpreter, checked
    /// here so an incapable interpreter fails before a subprocess is spawned.
    pub fn new(
        source_dir: impl Into<PathBuf>,
        interpreter: Interpreter,
        flavor: BuildFlavor,
        strict: bool,
    ) -> Result<Self, BuildError> {
        let mut mixin_locations = Vec::new();
        for (module, spec) in flavor.mixins() {
            let Ok(requirement) = Requirement::from_str(spec) else {
                continue; // mixin specs are static and well-formed
            };
            let location = interpreter.locate(&requirement);
            if strict && location.is_none() {
                return Err(BuildError::IncapableInterpreter {
                    python: interpreter.binary().to_path_buf(),
                    flavor,
                    requirement: requirement.to_string(),
                });
            }
            mixin_locations.push((*module, location));
        }
        let record = match flavor {
            BuildFlavor::Install => Some(NamedTempFile::new()?),
            _ => None,
        };
        Ok(Self {
            source_dir: source_dir.into(),
            interpreter,
            flavor,
            mixin_locations,
            install_tmp: Some(TempDir::new()?),
            record,
            metadata_dir: None,
            outcome: None,
        })
    }

    /// The session's owned output directory, while the session is open.
    pub fn output_dir(&self) -> Option<&Path> {
        self.install_tmp.as_ref().map(TempDir::path)
    }

    /// The metadata directory an `Install` build produced, after a
    /// successful run.
    pub fn metadata_dir(&self) -> Option<&Path> {
        self.metadata_dir.as_deref()
    }

    pub fn outcome(&self) -> Option<&BuildOutcome> {
        self.outcome.as_ref()
    }

    fn setup_args(&self, output_dir: &Path) -> Vec<String> {
        let dist_dir = format!("--dist-dir={}", output_dir.display());
        match self.flavor {
            BuildFlavor::Install => {
                let mut args = vec![
                    "install".to_string(),
                    format!("--root={}", output_dir.display()),
                    "--prefix=".to_string(),
                    "--single-version-externally-managed".to_string(),
                ];
                if let Some(record) = &self.record {
                    args.push("--record".to_string());
                    args.push(record.path().display().to_string());
                }
                args
            }
            BuildFlavor::Sdist => vec![
                "sdist".to_string(),
                "--formats=gztar".to_string(),
                dist_dir,
            ],
            BuildFlavor::BdistEgg => vec!["bdist_egg".to_string(), dist_dir],
            BuildFlavor::BdistWheel => vec!["bdist_wheel".to_string(), dist_dir],
        }
    }

    /// The script piped to the interpreter: put each locatable build-time
    /// package on the import path, then execute the project's `setup.py`.
    fn bootstrap_script(&self) -> String {
        let mut lines = vec![BOOTSTRAP_HEADER.to_string()];
        for (module, location) in &self.mixin_locations {
            let Some(path) = location else {
                continue; // strict construction already rejected this
            };
            lines.push(format!(
                "sys.path.insert(0, {:?}); import {module}",
                path.display().to_string()
            ));
        }
        lines.push(BOOTSTRAP_FOOTER.to_string());
        lines.join("\n")
    }

    /// Run the build. Idempotent: a second call returns the cached outcome
    /// without spawning anything.
    pub fn run(&mut self) -> Result<&BuildOutcome, BuildError> {
        if self.outcome.is_none() {
            let mut outcome = self.spawn_build()?;
            if outcome.success
                && self.flavor == BuildFlavor::Install
                && !self.write_install_manifest()?
            {
                outcome.success = false;
            }
            if !outcome.success {
                warn!(
                    source_dir = %self.source_dir.display(),
                    code = outcome.code,
                    "build failed"
                );
                debug!(stdout = %outcome.stdout, stderr = %outcome.stderr, "build output");
            }
            self.outcome = Some(outcome);
        }
        match &self.outcome {
            Some(outcome) => Ok(outcome),
            // the branch above always fills the cache
            None => Err(BuildError::SessionClosed),
        }
    }

    fn spawn_build(&self) -> Result<BuildOutcome, BuildError> {
        let Some(output_dir) = self.output_dir() else {
            return Err(BuildError::SessionClosed);
        };
        let _timing = TimingGuard::new("build");
        let mut command = Command::new(self.interpreter.binary());
        command
            .arg("-")
            .args(self.setup_args(output_dir))
            .current_dir(&self.source_dir)
            // known to make native-extension builds non-reproducible
            .env_remove("MACOSX_DEPLOYMENT_TARGET")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let mut child = command.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            // the interpreter reads the whole script before executing; a child
            // that dies early just leaves the pipe unread
            let _ = stdin.write_all(self.bootstrap_script().as_bytes());
        }
        let output = child.wait_with_output()?;
        Ok(BuildOutcome {
            success: output.status.success(),
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Relativize the `--record` entries against the metadata directory and
    /// write the `installed-files.txt` manifest into it. Returns false when
    /// the record carries no metadata directory (a broken install).
    fn write_install_manifest(&mut self) -> Result<bool, BuildError> {
        let (Some(record), Some(output_dir)) = (self.record.as_ref(), self.output_dir()) else {
            return Ok(false);
        };
        let contents = fs::read_to_string(record.path())?;
        let installed: Vec<&str> = contents.lines().filter(|line| !line.is_empty()).collect();
        let Some(metadata_line) = installed
            .iter()
            .copied()
            .find(|line| line.ends_with(".egg-info"))
        else {
            return Ok(false);
        };
        let metadata_dir = output_dir.join(metadata_line.trim_start_matches('/'));

        let manifest: Vec<String> = installed
            .iter()
            .filter(|line| **line != metadata_line)
            .map(|line| relative_path(line, metadata_line))
            .collect();
        fs::create_dir_all(&metadata_dir)?;
        fs::write(
            metadata_dir.join("installed-files.txt"),
            manifest.join("\n") + "\n",
        )?;
        self.metadata_dir = Some(metadata_dir);
        Ok(true)
    }

    /// The single artifact the build produced: the one output-directory entry
    /// for the archive flavors, the tree holding the metadata directory for
    /// `Install`. Zero entries is a failure, several are an ambiguity.
    pub fn artifact(&mut self) -> Result<PathBuf, BuildError> {
        let success = self.run()?.success;
        if !success {
            return Err(BuildError::BuildFailure {
                source_dir: self.source_dir.clone(),
            });
        }
        let Some(output_dir) = self.output_dir().map(Path::to_path_buf) else {
            return Err(BuildError::SessionClosed);
        };
        if self.flavor == BuildFlavor::Install {
            return self
                .metadata_dir
                .as_ref()
                .and_then(|dir| dir.parent())
                .map(Path::to_path_buf)
                .ok_or(BuildError::MissingArtifact { dir: output_dir });
        }
        let mut entries: Vec<PathBuf> = fs::read_dir(&output_dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .collect();
        match entries.len() {
            0 => Err(BuildError::MissingArtifact { dir: output_dir }),
            1 => Ok(entries.remove(0)),
            count => Err(BuildError::AmbiguousArtifact {
                dir: output_dir,
                count,
            }),
        }
    }

    /// Release the session's temporary directories. Idempotent; dropping the
    /// session has the same effect, so cleanup runs on every exit path.
    pub fn cleanup(&mut self) {
        if let Some(tmp) = self.install_tmp.take() {
            if let Err(err) = tmp.close() {
                warn!(%err, "failed to remove build output dir");
            }
        }
        self.record = None;
    }
}

/// `os.path.relpath` over `/`-separated absolute paths.
fn relative_path(target: &str, base: &str) -> String {
    let target_parts: Vec<&str> = target.split('/').filter(|part| !part.is_empty()).collect();
    let base_parts: Vec<&str> = base.split('/').filter(|part| !part.is_empty()).collect();
    let common = target_parts
        .iter()
        .zip(&base_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<&str> = vec![".."; base_parts.len() - common];
    parts.extend(&target_parts[common..]);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
