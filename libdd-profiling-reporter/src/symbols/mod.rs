// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Uploads the debug information of executables seen by the profiler.
//!
//! An upload runs as a detached task and follows a three-step handshake with
//! the debug-info service: ask whether the build ID is wanted, ask for upload
//! instructions, then PUT the payload to a signed URL and acknowledge it.
//!
//! Two caches gate new attempts. `retry` records outcomes that should not be
//! retried (durably, or for a cooldown), `singleflight` marks attempts in
//! flight. Checking and marking are separate steps, so two racing callers
//! may both start an attempt for the same file.

mod cache_dir;
mod client;
mod extract;
mod signed_url;

pub use client::{DebuginfoClient, HttpDebuginfoClient};
pub use extract::{DebugInfoExtractor, ObjcopyExtractor};
pub use signed_url::SignedUrlTransfer;

use crate::cache::BoundedCache;
use crate::config::ReporterConfig;
use crate::error::{ReporterError, UploadError};
use crate::ids::FileId;
use libdd_profiling_reporter_protobuf::debuginfo::{
    DebuginfoType, InitiateUploadRequest, MarkUploadFinishedRequest, ShouldInitiateUploadRequest,
    UploadStrategy,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reason given by the debug-info service when another agent is uploading
/// the same build ID.
pub const REASON_UPLOAD_IN_PROGRESS: &str =
    "A previous upload is still in-progress and not stale yet (only stale uploads can be retried).";

/// Receives every executable reported to the profiler.
///
/// Implementations must return immediately; the work happens elsewhere.
pub trait SymbolUploader: Send + Sync {
    fn upload(&self, file_id: FileId, path: &str, build_id: &str);
}

/// Used when symbol upload is disabled.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSymbolUploader;

impl SymbolUploader for NoopSymbolUploader {
    fn upload(&self, _file_id: FileId, _path: &str, _build_id: &str) {}
}

pub struct DebuginfoUploader {
    inner: Arc<Inner>,
    runtime: Handle,
}

struct Inner {
    client: Arc<dyn DebuginfoClient>,
    extractor: Arc<dyn DebugInfoExtractor>,
    transfer: SignedUrlTransfer,
    retry: BoundedCache<FileId, bool>,
    singleflight: BoundedCache<FileId, bool>,
    keep_full_binary: bool,
    cache_directory: PathBuf,
    retry_cooldown: Duration,
}

/// The bytes to send: an open file, positioned at its start.
struct Payload {
    file: File,
    size: u64,
    /// Set when the file lives in the extraction cache and can be deleted
    /// after a successful upload.
    cached: Option<PathBuf>,
}

impl DebuginfoUploader {
    /// Builds an uploader talking HTTP to the configured debug-info endpoint
    /// and extracting debug info with `objcopy`.
    pub fn from_config(
        config: &ReporterConfig,
        cancel: CancellationToken,
        runtime: Handle,
    ) -> Result<Self, ReporterError> {
        let client = HttpDebuginfoClient::new(
            config.resolved_debuginfo_endpoint(),
            config.request_timeout,
            cancel.clone(),
        )?;
        let transfer = SignedUrlTransfer::new(config.request_timeout, cancel)?;
        Self::new(
            config,
            Arc::new(client),
            Arc::new(ObjcopyExtractor::default()),
            transfer,
            runtime,
        )
    }

    /// Prepares the extraction cache directory, deleting whatever a previous
    /// run left in it.
    pub fn new(
        config: &ReporterConfig,
        client: Arc<dyn DebuginfoClient>,
        extractor: Arc<dyn DebugInfoExtractor>,
        transfer: SignedUrlTransfer,
        runtime: Handle,
    ) -> Result<Self, ReporterError> {
        let cache_directory = config.symbol_cache_directory();
        cache_dir::prepare(&cache_directory)?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                extractor,
                transfer,
                retry: BoundedCache::new(config.cache_entries)?,
                singleflight: BoundedCache::new(config.cache_entries)?,
                keep_full_binary: config.keep_full_binary,
                cache_directory,
                retry_cooldown: config.upload_retry_cooldown,
            }),
            runtime,
        })
    }
}

impl SymbolUploader for DebuginfoUploader {
    fn upload(&self, file_id: FileId, path: &str, build_id: &str) {
        if build_id.is_empty() {
            return;
        }
        if self.inner.retry.get(&file_id) == Some(false) {
            return;
        }
        if self.inner.singleflight.get(&file_id) == Some(true) {
            return;
        }
        self.inner.singleflight.add(file_id, true);

        let inner = self.inner.clone();
        let path = PathBuf::from(path);
        let build_id = build_id.to_string();
        self.runtime.spawn(async move {
            let _in_flight = InFlight {
                singleflight: &inner.singleflight,
                file_id,
            };
            if let Err(e) = inner.attempt_upload(file_id, &path, &build_id).await {
                warn!(
                    file.path = %path.display(),
                    file.id = %file_id,
                    build_id = %build_id,
                    "Failed to upload debug info: {e}"
                );
            }
        });
    }
}

/// Clears the in-flight marker however the attempt ends.
struct InFlight<'a> {
    singleflight: &'a BoundedCache<FileId, bool>,
    file_id: FileId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.singleflight.add(self.file_id, false);
    }
}

impl Inner {
    async fn attempt_upload(
        &self,
        file_id: FileId,
        path: &Path,
        build_id: &str,
    ) -> Result<(), UploadError> {
        let response = self
            .client
            .should_initiate_upload(ShouldInitiateUploadRequest {
                build_id: build_id.to_string(),
                r#type: DebuginfoType::DebuginfoUnspecified.into(),
                ..Default::default()
            })
            .await?;
        if !response.should_initiate_upload {
            if response.reason == REASON_UPLOAD_IN_PROGRESS {
                self.retry
                    .add_with_lifetime(file_id, false, self.retry_cooldown);
            } else {
                self.retry.add(file_id, false);
            }
            return Ok(());
        }

        let Some(mut payload) = self.payload(file_id, path).await? else {
            return Ok(());
        };

        let response = self
            .client
            .initiate_upload(InitiateUploadRequest {
                build_id: build_id.to_string(),
                size: i64::try_from(payload.size).unwrap_or(i64::MAX),
                hash: file_id.to_string(),
                r#type: DebuginfoType::DebuginfoUnspecified.into(),
                ..Default::default()
            })
            .await?;
        let Some(instructions) = response.upload_instructions else {
            self.retry.add(file_id, false);
            return Ok(());
        };
        if instructions.strategy() != Some(UploadStrategy::SignedUrl) {
            debug!(
                file.id = %file_id,
                upload.strategy = instructions.upload_strategy,
                "Unsupported upload strategy"
            );
            self.retry.add(file_id, false);
            return Ok(());
        }

        self.transfer
            .upload(&instructions.signed_url, &mut payload.file, payload.size)
            .await?;

        self.client
            .mark_upload_finished(MarkUploadFinishedRequest {
                build_id: build_id.to_string(),
                upload_id: instructions.upload_id,
                ..Default::default()
            })
            .await?;
        self.retry.add(file_id, false);

        if let Some(cached) = payload.cached {
            drop(payload.file);
            if let Err(e) = fs::remove_file(&cached).await {
                warn!(file.path = %cached.display(), "Failed to remove cached file: {e}");
            }
        }
        Ok(())
    }

    /// Opens what should be uploaded. `None` means there is nothing to upload
    /// in this attempt.
    async fn payload(&self, file_id: FileId, path: &Path) -> Result<Option<Payload>, UploadError> {
        if self.keep_full_binary {
            let file = match File::open(path).await {
                Ok(file) => file,
                // The process is already gone.
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(UploadError::io("open file")(e)),
            };
            let size = file
                .metadata()
                .await
                .map_err(UploadError::io("stat file to upload"))?
                .len();
            if size == 0 {
                self.retry.add(file_id, false);
                return Ok(None);
            }
            return Ok(Some(Payload {
                file,
                size,
                cached: None,
            }));
        }

        let cached = self.cache_directory.join(file_id.to_string());
        match fs::metadata(&cached).await {
            Ok(_) => {
                let file = File::open(&cached)
                    .await
                    .map_err(UploadError::io("open cached file"))?;
                let size = file
                    .metadata()
                    .await
                    .map_err(UploadError::io("stat file to upload"))?
                    .len();
                if size == 0 {
                    // Empty files are never left behind on purpose.
                    drop(file);
                    discard(&cached).await;
                    return Ok(None);
                }
                Ok(Some(Payload {
                    file,
                    size,
                    cached: Some(cached),
                }))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => self.extract(file_id, path, cached).await,
            Err(e) => Err(UploadError::io("stat cached file")(e)),
        }
    }

    async fn extract(
        &self,
        file_id: FileId,
        original: &Path,
        cached: PathBuf,
    ) -> Result<Option<Payload>, UploadError> {
        File::create(&cached)
            .await
            .map_err(UploadError::io("create file"))?;
        match fs::metadata(original).await {
            Ok(_) => {}
            Err(e) => {
                discard(&cached).await;
                if e.kind() == ErrorKind::NotFound {
                    return Ok(None);
                }
                return Err(UploadError::io("open original file")(e));
            }
        }

        if let Err(e) = self.extractor.only_keep_debug(original, &cached).await {
            discard(&cached).await;
            return Err(e.into());
        }

        // Reopened rather than rewound: the extractor may replace the file.
        let file = match File::open(&cached).await {
            Ok(file) => file,
            Err(e) => {
                discard(&cached).await;
                return Err(UploadError::io("open extracted debuginfo")(e));
            }
        };
        let size = match file.metadata().await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                drop(file);
                discard(&cached).await;
                return Err(UploadError::io("stat file to upload")(e));
            }
        };
        if size == 0 {
            drop(file);
            discard(&cached).await;
            self.retry
                .add_with_lifetime(file_id, false, self.retry_cooldown);
            return Ok(None);
        }
        Ok(Some(Payload {
            file,
            size,
            cached: Some(cached),
        }))
    }
}

async fn discard(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!(file.path = %path.display(), "Failed to remove cached file: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_uploader_does_nothing() {
        NoopSymbolUploader.upload(FileId::new(1, 2), "/bin/true", "abc");
    }

    #[tokio::test]
    async fn construction_cleans_cache_directory() {
        let root = tempfile::tempdir().unwrap();
        let config = ReporterConfig::default().cache_directory(root.path());
        let directory = config.symbol_cache_directory();
        std::fs::create_dir_all(&directory).unwrap();
        std::fs::write(directory.join("stale"), b"old").unwrap();

        DebuginfoUploader::from_config(&config, CancellationToken::new(), Handle::current())
            .unwrap();

        assert!(directory.is_dir());
        assert_eq!(std::fs::read_dir(&directory).unwrap().count(), 0);
    }
}
