//! Fetch-and-package pipeline for the trained model
//!
//! `download` streams the release archive to disk, `archive` unpacks it and
//! builds the upload tarball, `export` produces the versioned serving layout.

pub mod archive;
pub mod download;
pub mod export;

pub use download::ArtifactDownloader;
pub use export::ModelExporter;
