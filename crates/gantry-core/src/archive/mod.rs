//! Archive construction: version derivation and zip packaging.

pub mod builder;
pub mod version;

pub use builder::{Archive, ArchiveBuilder, DEFAULT_EXCLUDES, MANIFEST_ENTRY};
