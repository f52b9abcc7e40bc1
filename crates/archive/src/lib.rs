//! Durable transcript storage.
//!
//! [`TranscriptArchive`] is the port; [`HttpArchive`] posts to an archiver
//! service and [`FsArchive`] writes JSON files to disk.

pub mod archive;
pub mod error;
pub mod fs;
pub mod http;

pub use {
    archive::{ArchiveReference, StoredTranscript, TranscriptArchive, from_config},
    error::{Error, Result},
    fs::FsArchive,
    http::HttpArchive,
};
