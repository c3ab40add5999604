//! Filesystem-backed producer engine

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::ops::OpCompletion;
use crate::producer::{EngineError, Producer, ProducerEngine};
use crate::relay::PipeWriter;
use crate::runner::RESULT_AGENT_ERROR;

const STREAM_CHUNK: usize = 8192;

/// Streams files and directory trees as backup payloads
///
/// A producer's `source` is a path; its payload is the concatenation of the
/// file's bytes, or of every file under the directory in sorted path order.
/// One engine serves every producer in a run; abort signals
/// (`quota_exceeded`, `tear_down`) are tracked per producer name and make
/// an in-flight stream stop at its next chunk boundary.
pub struct FsProducerEngine {
    aborted: Mutex<HashSet<String>>,
}

impl Default for FsProducerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FsProducerEngine {
    pub fn new() -> Self {
        Self {
            aborted: Mutex::new(HashSet::new()),
        }
    }

    fn mark_aborted(&self, producer: &str) {
        self.aborted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(producer.to_string());
    }

    fn is_aborted(&self, producer: &str) -> bool {
        self.aborted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(producer)
    }

    fn clear(&self, producer: &str) {
        self.aborted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(producer);
    }
}

#[async_trait]
impl ProducerEngine for FsProducerEngine {
    async fn measure_expected_size(
        &self,
        producer: &Producer,
        _quota: u64,
        completion: OpCompletion,
    ) -> Result<(), EngineError> {
        let source = PathBuf::from(producer.source());
        let name = producer.name().to_string();
        // Measurement runs detached and reports through the completion
        // handle, the way a real agent answers out of band.
        tokio::spawn(async move {
            let result = match payload_size(&source).await {
                Ok(size) => size as i64,
                Err(err) => {
                    log::warn!("Measuring {} failed: {}", name, err);
                    RESULT_AGENT_ERROR
                }
            };
            completion.complete(result).await;
        });
        Ok(())
    }

    async fn stream_full_data(
        &self,
        producer: &Producer,
        mut out: PipeWriter,
        _quota: u64,
    ) -> Result<(), EngineError> {
        let files = collect_files(Path::new(producer.source()))
            .await
            .map_err(|e| EngineError::new(format!("listing payload: {}", e)))?;

        let mut buffer = vec![0u8; STREAM_CHUNK];
        for path in files {
            let mut file = tokio::fs::File::open(&path)
                .await
                .map_err(|e| EngineError::new(format!("opening {}: {}", path.display(), e)))?;
            loop {
                if self.is_aborted(producer.name()) {
                    return Err(EngineError::new("producer agent torn down mid-stream"));
                }
                let n = file
                    .read(&mut buffer)
                    .await
                    .map_err(|e| EngineError::new(format!("reading {}: {}", path.display(), e)))?;
                if n == 0 {
                    break;
                }
                out.write_all(&buffer[..n])
                    .await
                    .map_err(|e| EngineError::new(format!("writing payload: {}", e)))?;
            }
        }
        Ok(())
    }

    async fn quota_exceeded(&self, producer: &Producer, bytes: u64, quota: u64) {
        log::debug!(
            "Producer {} told to abort: {} bytes over quota {}",
            producer.name(),
            bytes,
            quota
        );
        self.mark_aborted(producer.name());
    }

    async fn tear_down(&self, producer: &Producer) {
        self.mark_aborted(producer.name());
    }

    async fn unbind(&self, producer: &Producer) {
        self.clear(producer.name());
    }
}

/// Total payload bytes under `root` (a file or a directory tree).
async fn payload_size(root: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];
    while let Some(path) = pending.pop() {
        let meta = tokio::fs::metadata(&path).await?;
        if meta.is_dir() {
            let mut entries = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push(entry.path());
            }
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Every regular file under `root`, sorted for a deterministic stream order.
async fn collect_files(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(path) = pending.pop() {
        let meta = tokio::fs::metadata(&path).await?;
        if meta.is_dir() {
            let mut entries = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push(entry.path());
            }
        } else {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
