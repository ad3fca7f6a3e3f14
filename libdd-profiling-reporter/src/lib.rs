// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Reporting side of a continuous profiler.
//!
//! The stack trace collector feeds a [`Reporter`] with traces, sample counts
//! and metadata about executables, frames and the host. Every report interval
//! the gathered samples are encoded into one pprof-style profile and exported
//! as OTLP profiles over HTTP. Native executables can additionally have their
//! debug information uploaded to a debug-info service.
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), libdd_profiling_reporter::error::ReporterError> {
//! use libdd_profiling_reporter::config::ReporterConfig;
//! use libdd_profiling_reporter::ids::{AddressOrLineno, FileId, FrameType, Trace, TraceHash};
//! use libdd_profiling_reporter::Reporter;
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let reporter = Reporter::start(ReporterConfig::new("http://localhost:4318"), &cancel)?;
//!
//! let hash = TraceHash::new(0x1, 0x2);
//! reporter.report_frames_for_trace(&Trace {
//!     hash,
//!     files: vec![FileId::new(0x3, 0x4)],
//!     linenos: vec![AddressOrLineno(0x1000)],
//!     frame_types: vec![FrameType::Native],
//! });
//! reporter.report_count_for_trace(hash, 1_700_000_000, 1, "app", "", "", "");
//!
//! reporter.stop();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod encoder;
pub mod error;
pub mod exporter;
pub mod facts;
pub mod ids;
mod reporter;
pub mod symbols;
mod transport;

pub use reporter::Reporter;
