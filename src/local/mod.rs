//! Local Loopback Collaborators
//!
//! Filesystem-backed implementations of the engine's two external seams,
//! used by the CLI harness and the integration tests to drive a full run
//! without a real device or a real storage service:
//!
//! - [`DirTransport`]: a directory-backed store. Accepted transfers land in
//!   a staging area, are filled chunk by chunk as the engine announces data,
//!   and are moved into place with a manifest update on commit. The quota is
//!   enforced both at preflight (`check_full_data_size`) and per chunk.
//! - [`FsProducerEngine`]: measures and streams files or directory trees.
//!   Honors quota-exceeded and tear-down signals by aborting the stream
//!   early.

mod engine;
mod error;
mod store;

pub use engine::FsProducerEngine;
pub use error::LocalStoreError;
pub use store::{BackupManifest, DirTransport, ManifestEntry};
