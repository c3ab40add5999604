//! Directory-backed transport implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::local::LocalStoreError;
use crate::producer::Producer;
use crate::relay::PipeReader;
use crate::transport::{TransferFlags, Transport, TransportStatus};

const INCOMING_DIR: &str = "incoming";
const MANIFEST_FILE: &str = "manifest.json";

/// Per-producer record of a committed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub bytes: u64,
    /// Whether the last committed transfer was user initiated.
    pub user_initiated: bool,
}

/// Committed contents of a [`DirTransport`] store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupManifest {
    pub entries: HashMap<String, ManifestEntry>,
}

struct ActiveTransfer {
    producer: String,
    user_initiated: bool,
    data: PipeReader,
    file: tokio::fs::File,
    staging_path: PathBuf,
    received: u64,
}

/// A storage backend rooted in a local directory
///
/// One transfer at a time: `begin_full_backup` stages a partial file and
/// keeps the pipe read end; each `send_chunk_notify` consumes exactly the
/// announced bytes from the pipe into the staging file, so the store never
/// depends on seeing end-of-stream. `finish_backup` moves the staging file
/// into place and records it in `manifest.json`; `cancel_full_backup`
/// deletes it.
pub struct DirTransport {
    root: PathBuf,
    quota: u64,
    delay_hint: Duration,
    active: Mutex<Option<ActiveTransfer>>,
}

impl DirTransport {
    /// Open (creating if needed) a store rooted at `root` with a per-producer
    /// byte quota.
    pub async fn open(
        root: impl Into<PathBuf>,
        quota: u64,
    ) -> Result<Self, LocalStoreError> {
        let root = root.into();
        let incoming = root.join(INCOMING_DIR);
        tokio::fs::create_dir_all(&incoming)
            .await
            .map_err(|e| LocalStoreError::io(&incoming, e))?;
        Ok(Self {
            root,
            quota,
            delay_hint: Duration::ZERO,
            active: Mutex::new(None),
        })
    }

    /// Set the advisory delay reported by `request_next_delay`.
    pub fn with_delay_hint(mut self, delay: Duration) -> Self {
        self.delay_hint = delay;
        self
    }

    /// Read the committed manifest; empty if nothing was ever committed.
    pub async fn manifest(&self) -> Result<BackupManifest, LocalStoreError> {
        let path = self.root.join(MANIFEST_FILE);
        match tokio::fs::read(&path).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Ok(BackupManifest::default())
            }
            Err(err) => Err(LocalStoreError::io(path, err)),
        }
    }

    /// Path a committed producer's payload lives at.
    pub fn payload_path(&self, producer: &str) -> PathBuf {
        self.root.join(format!("{}.full", sanitize(producer)))
    }

    async fn record_commit(
        &self,
        producer: &str,
        bytes: u64,
        user_initiated: bool,
    ) -> Result<(), LocalStoreError> {
        let mut manifest = self.manifest().await?;
        manifest.entries.insert(
            producer.to_string(),
            ManifestEntry {
                bytes,
                user_initiated,
            },
        );
        let path = self.root.join(MANIFEST_FILE);
        let raw = serde_json::to_vec_pretty(&manifest)?;
        tokio::fs::write(&path, raw)
            .await
            .map_err(|e| LocalStoreError::io(path, e))
    }
}

#[async_trait]
impl Transport for DirTransport {
    async fn begin_full_backup(
        &self,
        producer: &Producer,
        data: PipeReader,
        flags: TransferFlags,
    ) -> TransportStatus {
        let mut active = self.active.lock().await;
        if let Some(current) = active.as_ref() {
            log::warn!(
                "Refusing transfer of {}: {} is still transferring",
                producer.name(),
                current.producer
            );
            return TransportStatus::PackageRejected;
        }

        let staging_path = self
            .root
            .join(INCOMING_DIR)
            .join(format!("{}.partial", sanitize(producer.name())));
        let file = match tokio::fs::File::create(&staging_path).await {
            Ok(file) => file,
            Err(err) => {
                log::error!(
                    "Cannot stage transfer of {} at {}: {}",
                    producer.name(),
                    staging_path.display(),
                    err
                );
                return TransportStatus::TransportError;
            }
        };

        log::debug!(
            "Accepting full transfer of {} (user_initiated={})",
            producer.name(),
            flags.user_initiated
        );
        *active = Some(ActiveTransfer {
            producer: producer.name().to_string(),
            user_initiated: flags.user_initiated,
            data,
            file,
            staging_path,
            received: 0,
        });
        TransportStatus::Ok
    }

    async fn get_quota(&self, _producer: &Producer) -> u64 {
        self.quota
    }

    async fn check_full_data_size(&self, bytes: u64) -> TransportStatus {
        if bytes > self.quota {
            log::debug!("Estimated size {} exceeds quota {}", bytes, self.quota);
            TransportStatus::QuotaExceeded
        } else {
            TransportStatus::Ok
        }
    }

    async fn send_chunk_notify(&self, bytes: u64) -> TransportStatus {
        let mut guard = self.active.lock().await;
        let active = match guard.as_mut() {
            Some(active) => active,
            None => {
                log::warn!("Chunk notify with no active transfer");
                return TransportStatus::TransportError;
            }
        };

        if active.received + bytes > self.quota {
            log::warn!(
                "Transfer of {} would exceed quota: {} + {} over {}",
                active.producer,
                active.received,
                bytes,
                self.quota
            );
            return TransportStatus::QuotaExceeded;
        }

        // Consume exactly the announced bytes; the relay guarantees they are
        // already on the pipe.
        let mut chunk = vec![0u8; bytes as usize];
        if let Err(err) = active.data.read_exact(&mut chunk).await {
            log::error!("Reading chunk for {} failed: {}", active.producer, err);
            return TransportStatus::TransportError;
        }
        if let Err(err) = active.file.write_all(&chunk).await {
            log::error!("Staging chunk for {} failed: {}", active.producer, err);
            return TransportStatus::TransportError;
        }
        active.received += bytes;
        TransportStatus::Ok
    }

    async fn finish_backup(&self) -> TransportStatus {
        let taken = self.active.lock().await.take();
        let active = match taken {
            Some(active) => active,
            None => {
                log::warn!("Finish with no active transfer");
                return TransportStatus::TransportError;
            }
        };

        if let Err(err) = active.file.sync_all().await {
            log::error!("Flushing staged {} failed: {}", active.producer, err);
            return TransportStatus::TransportError;
        }
        drop(active.file);

        let final_path = self.payload_path(&active.producer);
        if let Err(err) = tokio::fs::rename(&active.staging_path, &final_path).await {
            log::error!(
                "Committing {} to {} failed: {}",
                active.producer,
                final_path.display(),
                err
            );
            return TransportStatus::TransportError;
        }
        if let Err(err) = self
            .record_commit(&active.producer, active.received, active.user_initiated)
            .await
        {
            log::error!("Recording {} in manifest failed: {}", active.producer, err);
            return TransportStatus::TransportError;
        }

        log::debug!(
            "Committed {} ({} bytes) to {}",
            active.producer,
            active.received,
            final_path.display()
        );
        TransportStatus::Ok
    }

    async fn cancel_full_backup(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        log::debug!(
            "Discarding partial transfer of {} ({} bytes staged)",
            active.producer,
            active.received
        );
        drop(active.data);
        drop(active.file);
        if let Err(err) = tokio::fs::remove_file(&active.staging_path).await {
            log::warn!(
                "Could not remove staging file {}: {}",
                active.staging_path.display(),
                err
            );
        }
    }

    async fn request_next_delay(&self) -> Duration {
        self.delay_hint
    }
}

// Producer names become file names; keep them flat.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
