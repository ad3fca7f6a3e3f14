// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `parca.debuginfo.v1alpha1` messages used by the three-step upload
//! handshake: should-initiate, initiate, mark-finished.

/// Fully qualified service name, used to build request paths.
pub const SERVICE_NAME: &str = "parca.debuginfo.v1alpha1.DebuginfoService";

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ShouldInitiateUploadRequest {
    #[prost(string, tag = "1")]
    pub build_id: String,
    #[prost(string, tag = "2")]
    pub hash: String,
    #[prost(bool, tag = "3")]
    pub force: bool,
    #[prost(enumeration = "DebuginfoType", tag = "4")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct ShouldInitiateUploadResponse {
    #[prost(bool, tag = "1")]
    pub should_initiate_upload: bool,
    #[prost(string, tag = "2")]
    pub reason: String,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct InitiateUploadRequest {
    #[prost(string, tag = "1")]
    pub build_id: String,
    #[prost(int64, tag = "2")]
    pub size: i64,
    #[prost(string, tag = "3")]
    pub hash: String,
    #[prost(bool, tag = "4")]
    pub force: bool,
    #[prost(enumeration = "DebuginfoType", tag = "5")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct InitiateUploadResponse {
    #[prost(message, optional, tag = "1")]
    pub upload_instructions: Option<UploadInstructions>,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct UploadInstructions {
    #[prost(string, tag = "1")]
    pub build_id: String,
    #[prost(string, tag = "2")]
    pub upload_id: String,
    #[prost(enumeration = "UploadStrategy", tag = "3")]
    pub upload_strategy: i32,
    #[prost(string, tag = "4")]
    pub signed_url: String,
    #[prost(enumeration = "DebuginfoType", tag = "5")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct MarkUploadFinishedRequest {
    #[prost(string, tag = "1")]
    pub build_id: String,
    #[prost(string, tag = "2")]
    pub upload_id: String,
    #[prost(enumeration = "DebuginfoType", tag = "3")]
    pub r#type: i32,
}

#[derive(Clone, PartialEq, Eq, ::prost::Message)]
pub struct MarkUploadFinishedResponse {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum UploadStrategy {
    Unspecified = 0,
    Grpc = 1,
    SignedUrl = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum DebuginfoType {
    /// Debug information (the default when unspecified).
    DebuginfoUnspecified = 0,
    Executable = 1,
    Sources = 2,
}

impl UploadInstructions {
    /// The upload strategy, or `None` if the server sent a value this client
    /// doesn't know about.
    pub fn strategy(&self) -> Option<UploadStrategy> {
        UploadStrategy::try_from(self.upload_strategy).ok()
    }
}
