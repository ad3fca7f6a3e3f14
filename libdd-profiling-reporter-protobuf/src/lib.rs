// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Protobuf messages spoken by the profiling reporter:
//!
//! - [`profiles`]: the extended pprof profile carried inside OTLP profiles
//!   (`opentelemetry.proto.profiles.v1experimental`), which references its
//!   string, function, mapping and location tables by index.
//! - [`collector`]: the OTLP export envelope along with the common and
//!   resource types it needs.
//! - [`debuginfo`]: the debug-info upload service
//!   (`parca.debuginfo.v1alpha1`).
//!
//! The messages are written by hand with `prost` derives instead of being
//! generated at build time, so no `protoc` is needed to build the crate. Only
//! the fields the reporter reads or writes are modelled; unknown fields are
//! skipped by prost when decoding.

pub mod collector;
pub mod debuginfo;
pub mod profiles;

pub use prost::Message;
