// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::{ExportError, TransportError};
use crate::transport::{join_url, HttpTransport};
use async_trait::async_trait;
use libdd_profiling_reporter_protobuf::collector::{
    ExportProfilesServiceRequest, ExportProfilesServiceResponse,
};
use prost::Message;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PROFILES_PATH: &str = "/v1experimental/profiles";
const CONTENT_TYPE: &str = "application/x-protobuf";

/// Traffic counters of the profiles channel.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReporterMetrics {
    pub bytes_out: u64,
    pub bytes_in: u64,
    pub messages_out: u64,
    pub messages_in: u64,
}

#[derive(Debug, Default)]
pub(crate) struct TrafficCounters {
    bytes_out: AtomicU64,
    bytes_in: AtomicU64,
    messages_out: AtomicU64,
    messages_in: AtomicU64,
}

impl TrafficCounters {
    fn sent(&self, bytes: usize) {
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_out.fetch_add(1, Ordering::Relaxed);
    }

    fn received(&self, bytes: usize) {
        self.bytes_in.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ReporterMetrics {
        ReporterMetrics {
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            bytes_in: self.bytes_in.load(Ordering::Relaxed),
            messages_out: self.messages_out.load(Ordering::Relaxed),
            messages_in: self.messages_in.load(Ordering::Relaxed),
        }
    }
}

/// The channel profiles are exported over.
#[async_trait]
pub trait ProfilesClient: Send + Sync {
    async fn export(
        &self,
        request: ExportProfilesServiceRequest,
    ) -> Result<ExportProfilesServiceResponse, ExportError>;

    /// Called once when the reporter stops.
    async fn close(&self) -> Result<(), ExportError>;

    fn metrics(&self) -> ReporterMetrics {
        ReporterMetrics::default()
    }
}

/// OTLP/HTTP profiles exporter.
#[derive(Clone, Debug)]
pub struct HttpProfilesClient {
    url: String,
    transport: HttpTransport,
    counters: Arc<TrafficCounters>,
}

impl HttpProfilesClient {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Result<Self, TransportError> {
        Ok(Self {
            url: join_url(endpoint, PROFILES_PATH),
            transport: HttpTransport::new(timeout, cancel)?,
            counters: Arc::default(),
        })
    }
}

#[async_trait]
impl ProfilesClient for HttpProfilesClient {
    async fn export(
        &self,
        request: ExportProfilesServiceRequest,
    ) -> Result<ExportProfilesServiceResponse, ExportError> {
        let body = request.encode_to_vec();
        self.counters.sent(body.len());
        let response = self.transport.post(&self.url, CONTENT_TYPE, body).await?;
        self.counters.received(response.len());
        let response =
            ExportProfilesServiceResponse::decode(response).map_err(TransportError::from)?;

        match &response.partial_success {
            Some(partial) if partial.rejected_profiles > 0 => Err(ExportError::PartiallyRejected {
                rejected: partial.rejected_profiles,
                message: partial.error_message.clone(),
            }),
            _ => Ok(response),
        }
    }

    /// Pooled connections are released when the client is dropped.
    async fn close(&self) -> Result<(), ExportError> {
        Ok(())
    }

    fn metrics(&self) -> ReporterMetrics {
        self.counters.snapshot()
    }
}
