//! Repository traits, one per concern.

pub mod caches;
pub mod dependencies;
pub mod leases;
pub mod metadata;
pub mod package_files;
pub mod packages;
pub mod tags;

pub use caches::CacheRepo;
pub use dependencies::DependencyRepo;
pub use leases::LeaseRepo;
pub use metadata::MetadatumRepo;
pub use package_files::PackageFileRepo;
pub use packages::PackageRepo;
pub use tags::TagRepo;
