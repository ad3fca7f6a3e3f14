// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for `libdd-profiling-reporter`.
//!
//! None of these reach the collector: the ingestion API never fails. They
//! surface from construction ([`ReporterError`]) or end up in the logs
//! ([`ExportError`], [`UploadError`]), so wrapping variants always render
//! the error they wrap.

use thiserror::Error;

/// A [`crate::config::ReporterConfig`] that cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A cache was sized to hold nothing. Carries the field name.
    #[error("{0} must be greater than zero")]
    ZeroCapacity(&'static str),

    #[error("report interval must be greater than zero")]
    ZeroReportInterval,

    #[error("samples per second must be greater than zero")]
    ZeroSamplingRate,

    #[error("collector endpoint is empty")]
    MissingEndpoint,

    /// A build ID mode other than "linker" or "hash".
    #[error("unknown build ID mode {0:?}, expected \"linker\" or \"hash\"")]
    UnknownBuildIdMode(String),
}

#[derive(Debug, Error, Eq, PartialEq)]
pub enum CacheError {
    #[error("cache capacity must be greater than zero")]
    ZeroCapacity,
}

/// Errors of the HTTP transports shared by the profiles and debug-info
/// clients.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The reqwest client could not be built.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The request exceeded the configured request timeout.
    #[error("request timed out")]
    TimedOut,

    /// No connection to the server could be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Sending the request or reading the response failed midway.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The server answered with a non-2xx status.
    #[error("request failed with status {status}: {body}")]
    RequestFailed {
        status: u16,
        /// The response body, lossy-decoded as UTF-8.
        body: String,
    },

    /// A 2xx response whose body is not the expected protobuf message.
    #[error("failed to decode response: {0}")]
    Decode(#[from] prost::DecodeError),

    /// The reporter stopped while the request was in flight.
    #[error("operation cancelled")]
    Cancelled,
}

/// Why one report interval's profile did not reach the collector.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The request itself failed.
    #[error("failed to export profile: {0}")]
    Transport(#[from] TransportError),

    /// The collector accepted the request but dropped some profiles.
    #[error("collector rejected {rejected} profiles: {message}")]
    PartiallyRejected { rejected: i64, message: String },
}

/// Why one debug-info upload attempt ended early.
#[derive(Debug, Error)]
pub enum UploadError {
    /// A call to the debug-info service failed.
    #[error("debug-info service call failed: {0}")]
    Remote(#[from] TransportError),

    /// Local file handling failed. `context` names the step.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("extract debuginfo: {0}")]
    Extraction(#[from] ExtractError),

    /// The signed URL refused the payload.
    #[error("unexpected status code: {status}, msg: {body}")]
    UnexpectedStatus { status: u16, body: String },
}

impl UploadError {
    pub(crate) fn io(context: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| Self::Io { context, source }
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The extractor program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The extractor program ran and reported failure.
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Errors of [`crate::Reporter::start`] and the constructors it calls.
#[derive(Debug, Error)]
pub enum ReporterError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create cache: {0}")]
    Cache(#[from] CacheError),

    #[error("failed to create HTTP client: {0}")]
    Transport(#[from] TransportError),

    /// The symbol cache directory could not be created or listed.
    #[error("failed to prepare cache directory {path}: {source}")]
    CacheDirectory {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the reporter must be started from within a tokio runtime")]
    NoRuntime,
}
