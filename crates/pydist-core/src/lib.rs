#![deny(clippy::all, warnings)]

mod core;

pub use crate::core::config::{resolve_cache_root, CacheLocation};
pub use crate::core::crawl::{Crawl, DirectoryCrawler, StaticCrawler};
pub use crate::core::fetch::{Fetch, FetchError, Fetcher};
pub use crate::core::finder::{find_distributions, register_finders};
pub use crate::core::installer::{BuildError, BuildFlavor, BuildOutcome, Installer};
pub use crate::core::interpreter::Interpreter;
pub use crate::core::obtainer::{Obtainer, DEFAULT_PRECEDENCE};
pub use crate::core::translator::{
    default_translator, ChainedTranslator, EggTranslator, Lib2to3Migrator, Migrate,
    SourceTranslator, Translate, WheelTranslator,
};
pub use crate::core::unpack::{first_nontrivial_dir, unpack_archive};
