#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod distribution;
pub mod package;
pub mod requirement;
pub mod tags;

pub use distribution::Distribution;
pub use package::{
    location_basename, ArchiveKind, EggPackage, Package, PackageKind, SourcePackage, WheelPackage,
};
pub use requirement::{normalize_name, requirement_name, version_allowed};
pub use tags::{platform_family, supported_tags, Tag, Target};
