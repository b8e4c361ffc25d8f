//! Local filesystem access: target validation and file discovery.

pub mod validate;
pub mod walker;

pub use validate::{validate_directories, validate_directory};
pub use walker::{base_name, collect_files, DiscoveredFile, WalkOptions};
