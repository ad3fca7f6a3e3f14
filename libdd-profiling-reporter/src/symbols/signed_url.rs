// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::error::{TransportError, UploadError};
use crate::transport::HttpTransport;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// PUTs payloads to pre-authorized storage URLs.
#[derive(Clone, Debug)]
pub struct SignedUrlTransfer {
    transport: HttpTransport,
}

impl SignedUrlTransfer {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Result<Self, TransportError> {
        Ok(Self {
            transport: HttpTransport::new(timeout, cancel)?,
        })
    }

    /// Streams `size` bytes of `file`, starting at its current position.
    ///
    /// The request body reads from a duplicate of the handle, so `file` stays
    /// open and owned by the caller whatever the transport does with the body.
    pub async fn upload(&self, url: &str, file: &mut File, size: u64) -> Result<(), UploadError> {
        let reader = file
            .try_clone()
            .await
            .map_err(UploadError::io("duplicate file handle"))?;
        let stream = ReaderStream::new(BufReader::new(reader).take(size));

        let (status, body) = self
            .transport
            .put(url, reqwest::Body::wrap_stream(stream), size)
            .await?;
        if !(200..300).contains(&status) {
            return Err(UploadError::UnexpectedStatus {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tokio::io::AsyncWriteExt;

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn streams_exactly_size_bytes_and_keeps_the_file_open() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/object")
                    .header("content-length", "6")
                    .body("header");
                then.status(200);
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload");
        let mut file = File::create(&path).await.unwrap();
        file.write_all(b"header and trailing bytes").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let mut file = File::open(&path).await.unwrap();
        let transfer = SignedUrlTransfer::new(Duration::from_secs(5), CancellationToken::new())
            .unwrap();
        transfer
            .upload(&server.url("/object"), &mut file, 6)
            .await
            .unwrap();
        mock.assert_async().await;

        // The caller's handle is still usable after the transfer.
        assert_eq!(file.metadata().await.unwrap().len(), 25);
    }

    #[cfg_attr(miri, ignore)]
    #[tokio::test]
    async fn non_2xx_is_unexpected_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/object");
                then.status(403).body("signature expired");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload");
        std::fs::write(&path, b"debug").unwrap();
        let mut file = File::open(&path).await.unwrap();

        let transfer = SignedUrlTransfer::new(Duration::from_secs(5), CancellationToken::new())
            .unwrap();
        let err = transfer
            .upload(&server.url("/object"), &mut file, 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UploadError::UnexpectedStatus { status: 403, ref body } if body == "signature expired"
        ));
    }
}
