//! Translate candidate packages into ready distributions.
//!
//! Each translator accepts exactly one package kind and declines everything
//! else; a chain tries them in precedence order. Declines are `None`, never
//! errors: fetch and build failures are logged and the caller moves to the
//! next candidate.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use walkdir::WalkDir;

use pydist_domain::{Distribution, Package, Target};

use crate::core::fetch::{Fetch, Fetcher};
use crate::core::finder::{find_distributions, register_finders};
use crate::core::installer::{BuildError, BuildFlavor, Installer};
use crate::core::interpreter::Interpreter;
use crate::core::tooling::timings::TimingGuard;
use crate::core::unpack::unpack_archive;

/// Translate a package into a distribution, or decline with `None`.
pub trait Translate {
    fn translate(&self, package: &Package) -> Option<Distribution>;
}

/// External syntax-migration collaborator, applied per source file.
pub trait Migrate {
    fn migrate(&self, file: &Path) -> anyhow::Result<()>;
}

/// Migrates sources with the interpreter's own refactoring tool
/// (`python -m lib2to3 -w`). Interpreters too new to ship lib2to3 fail per
/// file, which the source translator logs and skips.
pub struct Lib2to3Migrator {
    interpreter: Interpreter,
}

impl Lib2to3Migrator {
    pub fn new(interpreter: Interpreter) -> Self {
        Self { interpreter }
    }
}

impl Migrate for Lib2to3Migrator {
    fn migrate(&self, file: &Path) -> anyhow::Result<()> {
        use anyhow::Context;
        let output = std::process::Command::new(self.interpreter.binary())
            .args(["-m", "lib2to3", "-w", "-n"])
            .arg(file)
            .output()
            .with_context(|| format!("failed to run lib2to3 on {}", file.display()))?;
        if !output.status.success() {
            anyhow::bail!(
                "lib2to3 exited with {} for {}",
                output.status.code().unwrap_or(-1),
                file.display()
            );
        }
        Ok(())
    }
}

/// Fetch a prebuilt artifact into the cache and parse its metadata.
fn fetch_prebuilt(
    fetcher: &dyn Fetch,
    package: &Package,
    install_cache: &Path,
    timeout: Option<Duration>,
) -> Option<Distribution> {
    let local = match fetcher.fetch(package.location(), install_cache, timeout) {
        Ok(path) => path,
        Err(err) => {
            warn!(location = package.location(), %err, "failed to fetch");
            return None;
        }
    };
    find_distributions(&local).into_iter().next()
}

/// Translates standard prebuilt archives that are compatible with the target.
pub struct WheelTranslator {
    install_cache: PathBuf,
    target: Target,
    fetcher: Arc<dyn Fetch>,
    timeout: Option<Duration>,
}

impl WheelTranslator {
    pub fn new(install_cache: impl Into<PathBuf>, target: Target) -> Self {
        Self::with_fetcher(install_cache, target, Arc::new(Fetcher), None)
    }

    pub fn with_fetcher(
        install_cache: impl Into<PathBuf>,
        target: Target,
        fetcher: Arc<dyn Fetch>,
        timeout: Option<Duration>,
    ) -> Self {
        register_finders();
        Self {
            install_cache: install_cache.into(),
            target,
            fetcher,
            timeout,
        }
    }
}

impl Translate for WheelTranslator {
    fn translate(&self, package: &Package) -> Option<Distribution> {
        let Package::Wheel(_) = package else {
            return None;
        };
        if !package.compatible(&self.target) {
            return None;
        }
        fetch_prebuilt(
            self.fetcher.as_ref(),
            package,
            &self.install_cache,
            self.timeout,
        )
    }
}

/// Translates legacy prebuilt archives that are compatible with the target.
pub struct EggTranslator {
    install_cache: PathBuf,
    target: Target,
    fetcher: Arc<dyn Fetch>,
    timeout: Option<Duration>,
}

impl EggTranslator {
    pub fn new(install_cache: impl Into<PathBuf>, target: Target) -> Self {
        Self::with_fetcher(install_cache, target, Arc::new(Fetcher), None)
    }

    pub fn with_fetcher(
        install_cache: impl Into<PathBuf>,
        target: Target,
        fetcher: Arc<dyn Fetch>,
        timeout: Option<Duration>,
    ) -> Self {
        register_finders();
        Self {
            install_cache: install_cache.into(),
            target,
            fetcher,
            timeout,
        }
    }
}

impl Translate for EggTranslator {
    fn translate(&self, package: &Package) -> Option<Distribution> {
        let Package::Egg(_) = package else {
            return None;
        };
        if !package.compatible(&self.target) {
            return None;
        }
        fetch_prebuilt(
            self.fetcher.as_ref(),
            package,
            &self.install_cache,
            self.timeout,
        )
    }
}

/// Builds source archives into prebuilt artifacts via an isolated subprocess,
/// then re-validates the result before exposing it.
pub struct SourceTranslator {
    install_cache: PathBuf,
    interpreter: Interpreter,
    migrator: Option<Arc<dyn Migrate>>,
    fetcher: Arc<dyn Fetch>,
    timeout: Option<Duration>,
}

impl SourceTranslator {
    pub fn new(install_cache: impl Into<PathBuf>, interpreter: Interpreter) -> Self {
        register_finders();
        Self {
            install_cache: install_cache.into(),
            interpreter,
            migrator: None,
            fetcher: Arc::new(Fetcher),
            timeout: None,
        }
    }

    pub fn with_migrator(mut self, migrator: Arc<dyn Migrate>) -> Self {
        self.migrator = Some(migrator);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>, timeout: Option<Duration>) -> Self {
        self.fetcher = fetcher;
        self.timeout = timeout;
        self
    }

    fn migrate_tree(&self, migrator: &dyn Migrate, tree: &Path) {
        let _timing = TimingGuard::new("migrate");
        for entry in WalkDir::new(tree).into_iter().flatten() {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension() != Some("py".as_ref()) {
                continue;
            }
            if let Err(err) = migrator.migrate(path) {
                warn!(file = %path.display(), %err, "migration failed; skipping file");
            }
        }
    }

    /// Build the unpacked tree, preferring the standard archive format and
    /// falling back to the legacy flavor when the interpreter lacks the
    /// standard-format tooling.
    fn build(&self, tree: &Path, package: &Package) -> Option<PathBuf> {
        // distribute bootstraps its own build support
        let strict = package.name() != "distribute";
        let mut installer = match Installer::new(
            tree,
            self.interpreter.clone(),
            BuildFlavor::BdistWheel,
            strict,
        ) {
            Ok(installer) => installer,
            Err(BuildError::IncapableInterpreter { .. }) => {
                debug!(name = package.name(), "no wheel tooling; using legacy build");
                match Installer::new(tree, self.interpreter.clone(), BuildFlavor::BdistEgg, strict)
                {
                    Ok(installer) => installer,
                    Err(err) => {
                        warn!(name = package.name(), %err, "cannot construct build session");
                        return None;
                    }
                }
            }
            Err(err) => {
                warn!(name = package.name(), %err, "cannot construct build session");
                return None;
            }
        };

        let _timing = TimingGuard::new("package");
        let artifact = match installer.artifact() {
            Ok(path) => path,
            Err(err) => {
                warn!(name = package.name(), %err, "build declined");
                return None;
            }
        };
        // move out of the session's temp dir before it is released
        let cached = match place_in_cache(&artifact, &self.install_cache) {
            Ok(path) => path,
            Err(err) => {
                warn!(name = package.name(), %err, "failed to cache built artifact");
                return None;
            }
        };
        installer.cleanup();
        Some(cached)
    }
}

impl Translate for SourceTranslator {
    fn translate(&self, package: &Package) -> Option<Distribution> {
        let Package::Source(source) = package else {
            return None;
        };
        // owns the fetch/unpack scratch space; removed on every exit below
        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(err) => {
                warn!(%err, "cannot create unpack dir");
                return None;
            }
        };
        let archive = match self
            .fetcher
            .fetch(package.location(), scratch.path(), self.timeout)
        {
            Ok(path) => path,
            Err(err) => {
                warn!(location = package.location(), %err, "failed to fetch");
                return None;
            }
        };
        let tree = match unpack_archive(&archive, source.archive_kind(), &scratch.path().join("src"))
        {
            Ok(tree) => tree,
            Err(err) => {
                warn!(location = package.location(), %err, "failed to unpack");
                return None;
            }
        };

        if let Some(migrator) = &self.migrator {
            if self.interpreter.target().version().0 >= 3 {
                self.migrate_tree(migrator.as_ref(), &tree);
            }
        }

        let cached = self.build(&tree, package)?;
        let built = Package::from_location(&cached.display().to_string())?;
        if !built.compatible(self.interpreter.target()) {
            warn!(
                artifact = %cached.display(),
                "built artifact is not compatible with the target"
            );
            return None;
        }
        find_distributions(&cached).into_iter().next()
    }
}

/// Move a freshly built artifact into the shared cache without ever exposing
/// a partial file under its final name.
fn place_in_cache(artifact: &Path, install_cache: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(install_cache)?;
    let file_name = artifact
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "artifact has no filename"))?;
    let target = install_cache.join(file_name);
    // stage beside the target: the build tmp may be on another filesystem
    let staging = install_cache.join(format!(".{}.partial", file_name.to_string_lossy()));
    fs::copy(artifact, &staging)?;
    fs::rename(&staging, &target)?;
    Ok(target)
}

/// Glue translators together in priority order; the first to produce a
/// distribution wins. Element shape is the type system's problem here, so
/// construction cannot fail.
pub struct ChainedTranslator {
    translators: Vec<Box<dyn Translate>>,
}

impl ChainedTranslator {
    pub fn new(translators: Vec<Box<dyn Translate>>) -> Self {
        Self { translators }
    }
}

impl Translate for ChainedTranslator {
    fn translate(&self, package: &Package) -> Option<Distribution> {
        self.translators
            .iter()
            .find_map(|translator| translator.translate(package))
    }
}

/// The default pipeline: prebuilt artifacts before source builds.
pub fn default_translator(
    install_cache: impl Into<PathBuf>,
    interpreter: Interpreter,
    timeout: Option<Duration>,
) -> ChainedTranslator {
    let install_cache = install_cache.into();
    let target = interpreter.target().clone();
    let fetcher: Arc<dyn Fetch> = Arc::new(Fetcher);
    ChainedTranslator::new(vec![
        Box::new(WheelTranslator::with_fetcher(
            install_cache.clone(),
            target.clone(),
            fetcher.clone(),
            timeout,
        )),
        Box::new(EggTranslator::with_fetcher(
            install_cache.clone(),
            target,
            fetcher.clone(),
            timeout,
        )),
        Box::new(SourceTranslator::new(install_cache, interpreter).with_fetcher(fetcher, timeout)),
    ])
}
