// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! reqwest-based HTTP plumbing shared by the profiles and debug-info clients.

use crate::error::TransportError;
use bytes::Bytes;
use std::sync::Once;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

static INIT_CRYPTO_PROVIDER: Once = Once::new();

fn init_crypto_provider() {
    INIT_CRYPTO_PROVIDER.call_once(|| {
        // Fails only if the embedding process already picked a provider.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// A connection-pooling client whose requests are aborted once `cancel`
/// fires.
#[derive(Clone, Debug)]
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    cancel: CancellationToken,
}

impl HttpTransport {
    pub(crate) fn new(timeout: Duration, cancel: CancellationToken) -> Result<Self, TransportError> {
        init_crypto_provider();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::InvalidConfig(e.to_string()))?;
        Ok(Self { client, cancel })
    }

    /// POSTs `body` and returns the response body of a 2xx answer.
    pub(crate) async fn post(
        &self,
        url: &str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> Result<Bytes, TransportError> {
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        self.send(request).await.map(|(_, body)| body)
    }

    /// PUTs `body` announcing `content_length` bytes, so streamed bodies are
    /// not sent chunked. Non-2xx answers are handed back to the caller rather
    /// than turned into errors.
    pub(crate) async fn put(
        &self,
        url: &str,
        body: reqwest::Body,
        content_length: u64,
    ) -> Result<(u16, Bytes), TransportError> {
        let request = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_LENGTH, content_length)
            .body(body);
        self.exchange(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(u16, Bytes), TransportError> {
        let (status, body) = self.exchange(request).await?;
        if !(200..300).contains(&status) {
            return Err(TransportError::RequestFailed {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok((status, body))
    }

    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<(u16, Bytes), TransportError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(TransportError::Cancelled),
            result = Self::execute(request) => result,
        }
    }

    async fn execute(request: reqwest::RequestBuilder) -> Result<(u16, Bytes), TransportError> {
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok((status, body))
    }
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::TimedOut
    } else if e.is_connect() {
        TransportError::ConnectionFailed(e.to_string())
    } else {
        TransportError::IoError(e.to_string())
    }
}
