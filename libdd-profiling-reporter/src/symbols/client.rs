// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::TransportError;
use crate::transport::{join_url, HttpTransport};
use async_trait::async_trait;
use libdd_profiling_reporter_protobuf::debuginfo::{
    InitiateUploadRequest, InitiateUploadResponse, MarkUploadFinishedRequest,
    MarkUploadFinishedResponse, ShouldInitiateUploadRequest, ShouldInitiateUploadResponse,
    SERVICE_NAME,
};
use prost::Message;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CONTENT_TYPE: &str = "application/proto";

/// The remote debug-info store.
#[async_trait]
pub trait DebuginfoClient: Send + Sync {
    async fn should_initiate_upload(
        &self,
        request: ShouldInitiateUploadRequest,
    ) -> Result<ShouldInitiateUploadResponse, TransportError>;

    async fn initiate_upload(
        &self,
        request: InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError>;

    async fn mark_upload_finished(
        &self,
        request: MarkUploadFinishedRequest,
    ) -> Result<MarkUploadFinishedResponse, TransportError>;
}

/// Speaks the Connect unary protocol: one protobuf-encoded POST per call.
#[derive(Clone, Debug)]
pub struct HttpDebuginfoClient {
    endpoint: String,
    transport: HttpTransport,
}

impl HttpDebuginfoClient {
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            endpoint: endpoint.into(),
            transport: HttpTransport::new(timeout, cancel)?,
        })
    }

    async fn call<Req: Message, Resp: Message + Default>(
        &self,
        method: &str,
        request: Req,
    ) -> Result<Resp, TransportError> {
        let url = join_url(&self.endpoint, &format!("{SERVICE_NAME}/{method}"));
        let body = self
            .transport
            .post(&url, CONTENT_TYPE, request.encode_to_vec())
            .await?;
        Ok(Resp::decode(body)?)
    }
}

#[async_trait]
impl DebuginfoClient for HttpDebuginfoClient {
    async fn should_initiate_upload(
        &self,
        request: ShouldInitiateUploadRequest,
    ) -> Result<ShouldInitiateUploadResponse, TransportError> {
        self.call("ShouldInitiateUpload", request).await
    }

    async fn initiate_upload(
        &self,
        request: InitiateUploadRequest,
    ) -> Result<InitiateUploadResponse, TransportError> {
        self.call("InitiateUpload", request).await
    }

    async fn mark_upload_finished(
        &self,
        request: MarkUploadFinishedRequest,
    ) -> Result<MarkUploadFinishedResponse, TransportError> {
        self.call("MarkUploadFinished", request).await
    }
}
