// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use async_trait::async_trait;
use libdd_profiling_reporter::config::ReporterConfig;
use libdd_profiling_reporter::error::{ExportError, ExtractError, TransportError};
use libdd_profiling_reporter::exporter::ProfilesClient;
use libdd_profiling_reporter::symbols::{
    DebugInfoExtractor, DebuginfoClient, DebuginfoUploader, SignedUrlTransfer,
};
use libdd_profiling_reporter_protobuf::collector::{
    ExportProfilesServiceRequest, ExportProfilesServiceResponse,
};
use libdd_profiling_reporter_protobuf::debuginfo::{
    InitiateUploadRequest, InitiateUploadResponse, MarkUploadFinishedRequest,
    MarkUploadFinishedResponse, ShouldInitiateUploadRequest, ShouldInitiateUploadResponse,
    UploadInstructions, UploadStrategy,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Polls `condition` until it holds, failing the test after a while.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

/// Gives spawned tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

/// Records exported requests instead of sending them.
#[derive(Default)]
pub struct RecordingProfilesClient {
    pub requests: Mutex<Vec<ExportProfilesServiceRequest>>,
    pub closed: AtomicUsize,
}

impl RecordingProfilesClient {
    pub fn exported(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl ProfilesClient for RecordingProfilesClient {
    async fn export(
        &self,
        request: ExportProfilesServiceRequest,
    ) -> Result<ExportProfilesServiceResponse, ExportError> {
        self.requests.lock().push(request);
        Ok(ExportProfilesServiceResponse::default())
    }

    async fn close(&self) -> Result<(), ExportError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A scripted debug-info service.
pub struct FakeDebuginfo {
    pub should_initiate: Mutex<ShouldInitiateUploadResponse>,
    pub instructions: Mutex<Option<UploadInstructions>>,
    /// When set, `should_initiate_upload` waits for a permit.
    pub gate: Option<Semaphore>,
    pub authorize_calls: AtomicUsize,
    pub initiate_calls: AtomicUsize,
    pub finish_calls: AtomicUsize,
    pub initiated: Mutex<Vec<InitiateUploadRequest>>,
    pub finished: Mutex<Vec<MarkUploadFinishedRequest>>,
}

impl FakeDebuginfo {
    /// Accepts every upload and hands out `signed_url`.
    pub fn accepting(signed_url: &str) -> Self {
        Self {
            should_initiate: Mutex::new(ShouldInitiateUploadResponse {
                should_initiate_upload: true,
                reason: String::new(),
            }),
            instructions: Mutex::new(Some(UploadInstructions {
                upload_id: "upload-1".to_string(),
                upload_strategy: UploadStrategy::SignedUrl.into(),
                signed_url: signed_url.to_string(),
                ..Default::default()
            })),
            gate: None,
            authorize_calls: AtomicUsize::new(0),
            initiate_calls: AtomicUsize::new(0),
            finish_calls: AtomicUsize::new(0),
            initiated: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    pub fn refusing(reason: &str) -> Self {
        let fake = Self::accepting("");
        *fake.should_initiate.lock() = ShouldInitiateUploadResponse {
            should_initiate_upload: false,
            reason: reason.to_string(),
        };
        fake
    }

    pub fn gated(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn authorize_calls(&self) -> usize {
        self.authorize_calls.load(Ordering::SeqCst)
    }

    pub fn initiate_calls(&self) -> usize {
        self.initiate_calls.load(Ordering::SeqCst)
    }

    pub fn finish_calls(&self) -> usize {
        self.finish_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DebuginfoClient for FakeDebuginfo {
    async fn should_initiate_upload(
        &self,
        _request: ShouldInitiateUploadRequest,
    ) -> Result<ShouldInitiateUploadResponse, TransportError> {
        self.authorize_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.map_err(|_| TransportError::Cancelled)?.forget();
        }
        Ok(self.should_initiate.lock().clone())
    }

    async fn initiate_upload(
        &self,
        request: InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.initiate_calls.fetch_add(1, Ordering::SeqCst);
        self.initiated.lock().push(request);
        Ok(InitiateUploadResponse {
            upload_instructions: self.instructions.lock().clone(),
        })
    }

    async fn mark_upload_finished(
        &self,
        request: MarkUploadFinishedRequest,
    ) -> Result<MarkUploadFinishedResponse, TransportError> {
        self.finish_calls.fetch_add(1, Ordering::SeqCst);
        self.finished.lock().push(request);
        Ok(MarkUploadFinishedResponse {})
    }
}

/// Writes fixed contents instead of stripping the source.
pub struct FakeExtractor {
    pub output: Vec<u8>,
    pub calls: AtomicUsize,
}

impl FakeExtractor {
    pub fn new(output: &[u8]) -> Self {
        Self {
            output: output.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DebugInfoExtractor for FakeExtractor {
    async fn only_keep_debug(
        &self,
        _source: &Path,
        destination: &Path,
    ) -> Result<(), ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::write(destination, &self.output)
            .await
            .map_err(|source| ExtractError::Spawn {
                program: "fake-extractor".to_string(),
                source,
            })
    }
}

pub fn upload_config(cache_root: &Path) -> ReporterConfig {
    ReporterConfig::default()
        .cache_entries(64)
        .cache_directory(cache_root)
}

pub fn uploader(
    config: &ReporterConfig,
    client: Arc<FakeDebuginfo>,
    extractor: Arc<FakeExtractor>,
) -> DebuginfoUploader {
    let transfer = SignedUrlTransfer::new(Duration::from_secs(5), CancellationToken::new())
        .expect("transfer");
    DebuginfoUploader::new(config, client, extractor, transfer, Handle::current())
        .expect("uploader")
}
