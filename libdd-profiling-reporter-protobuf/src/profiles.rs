// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `opentelemetry.proto.profiles.v1experimental` extended pprof types.
//!
//! Unlike classic pprof, references between tables are indices rather than
//! ids. Mapping and function references are 1-based, 0 meaning "unset".
//! String references are 0-based and index 0 is always the empty string.

use crate::collector::KeyValue;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Profile {
    #[prost(message, repeated, tag = "1")]
    pub sample_type: Vec<ValueType>,
    #[prost(message, repeated, tag = "2")]
    pub sample: Vec<Sample>,
    #[prost(message, repeated, tag = "3")]
    pub mapping: Vec<Mapping>,
    #[prost(message, repeated, tag = "4")]
    pub location: Vec<Location>,
    #[prost(int64, repeated, tag = "15")]
    pub location_indices: Vec<i64>,
    #[prost(message, repeated, tag = "5")]
    pub function: Vec<Function>,
    #[prost(message, repeated, tag = "16")]
    pub attribute_table: Vec<KeyValue>,
    #[prost(string, repeated, tag = "6")]
    pub string_table: Vec<String>,
    #[prost(int64, tag = "7")]
    pub drop_frames: i64,
    #[prost(int64, tag = "8")]
    pub keep_frames: i64,
    #[prost(int64, tag = "9")]
    pub time_nanos: i64,
    #[prost(int64, tag = "10")]
    pub duration_nanos: i64,
    #[prost(message, optional, tag = "11")]
    pub period_type: Option<ValueType>,
    #[prost(int64, tag = "12")]
    pub period: i64,
    #[prost(int64, repeated, tag = "13")]
    pub comment: Vec<i64>,
    #[prost(int64, tag = "14")]
    pub default_sample_type: i64,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct ValueType {
    #[prost(int64, tag = "1")]
    pub r#type: i64, // Index into string table
    #[prost(int64, tag = "2")]
    pub unit: i64, // Index into string table
    #[prost(enumeration = "AggregationTemporality", tag = "3")]
    pub aggregation_temporality: i32,
}

#[derive(Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Sample {
    #[prost(uint64, tag = "7")]
    pub locations_start_index: u64,
    #[prost(uint64, tag = "8")]
    pub locations_length: u64,
    #[prost(uint32, tag = "9")]
    pub stacktrace_id_index: u32, // Index into string table
    #[prost(int64, repeated, tag = "2")]
    pub value: Vec<i64>,
    #[prost(message, repeated, tag = "3")]
    pub label: Vec<Label>,
    #[prost(uint64, repeated, tag = "10")]
    pub attributes: Vec<u64>,
    #[prost(uint64, repeated, tag = "13")]
    pub timestamps: Vec<u64>,
}

#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord, ::prost::Message)]
pub struct Label {
    #[prost(int64, tag = "1")]
    pub key: i64, // Index into string table
    #[prost(int64, tag = "2")]
    pub str: i64, // Index into string table
    #[prost(int64, tag = "3")]
    pub num: i64,
    #[prost(int64, tag = "4")]
    pub num_unit: i64,
}

#[derive(Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Mapping {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub memory_start: u64,
    #[prost(uint64, tag = "3")]
    pub memory_limit: u64,
    #[prost(uint64, tag = "4")]
    pub file_offset: u64,
    #[prost(int64, tag = "5")]
    pub filename: i64, // Index into string table
    #[prost(int64, tag = "6")]
    pub build_id: i64, // Index into string table
    #[prost(enumeration = "BuildIdKind", tag = "11")]
    pub build_id_kind: i32,
    #[prost(uint64, repeated, tag = "12")]
    pub attributes: Vec<u64>,
    #[prost(bool, tag = "7")]
    pub has_functions: bool,
    #[prost(bool, tag = "8")]
    pub has_filenames: bool,
    #[prost(bool, tag = "9")]
    pub has_line_numbers: bool,
    #[prost(bool, tag = "10")]
    pub has_inline_frames: bool,
}

#[derive(Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Location {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(uint64, tag = "2")]
    pub mapping_index: u64, // 1-based index into the mapping table
    #[prost(uint64, tag = "3")]
    pub address: u64,
    #[prost(message, repeated, tag = "4")]
    pub line: Vec<Line>,
    #[prost(bool, tag = "5")]
    pub is_folded: bool,
    #[prost(uint32, tag = "6")]
    pub type_index: u32, // Index into string table
    #[prost(uint64, repeated, tag = "7")]
    pub attributes: Vec<u64>,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Line {
    #[prost(uint64, tag = "1")]
    pub function_index: u64, // 1-based index into the function table
    #[prost(int64, tag = "2")]
    pub line: i64,
    #[prost(int64, tag = "3")]
    pub column: i64,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, ::prost::Message)]
pub struct Function {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(int64, tag = "2")]
    pub name: i64, // Index into string table
    #[prost(int64, tag = "3")]
    pub system_name: i64, // Index into string table
    #[prost(int64, tag = "4")]
    pub filename: i64, // Index into string table
    #[prost(int64, tag = "5")]
    pub start_line: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum BuildIdKind {
    /// Linker-generated build ID, stored in the ELF binary notes.
    Linker = 0,
    /// Build ID derived from a hash of the binary contents.
    BinaryHash = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AggregationTemporality {
    Unspecified = 0,
    Delta = 1,
    Cumulative = 2,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn decode_what_was_encoded() {
        let profile = Profile {
            sample_type: vec![ValueType {
                r#type: 1,
                unit: 2,
                ..Default::default()
            }],
            sample: vec![Sample {
                locations_start_index: 0,
                locations_length: 1,
                stacktrace_id_index: 3,
                value: vec![7],
                timestamps: vec![1_700_000_000_000],
                ..Default::default()
            }],
            mapping: vec![Mapping {
                filename: 4,
                build_id: 5,
                build_id_kind: BuildIdKind::BinaryHash.into(),
                ..Default::default()
            }],
            location: vec![Location {
                mapping_index: 1,
                address: 0x1000,
                ..Default::default()
            }],
            location_indices: vec![0],
            string_table: vec![
                String::new(),
                "samples".into(),
                "count".into(),
                "abc".into(),
                "libc.so.6".into(),
                "deadbeef".into(),
            ],
            ..Default::default()
        };

        let bytes = profile.encode_to_vec();
        let decoded = Profile::decode(bytes.as_slice()).unwrap();
        assert_eq!(profile, decoded);
        assert_eq!(
            BuildIdKind::try_from(decoded.mapping[0].build_id_kind).ok(),
            Some(BuildIdKind::BinaryHash)
        );
    }

    #[test]
    fn zero_values_are_not_written() {
        // Every field at its default value encodes to nothing at all.
        assert!(Location::default().encode_to_vec().is_empty());
        assert!(Line::default().encode_to_vec().is_empty());
    }
}
