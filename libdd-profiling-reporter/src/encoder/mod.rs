// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns the facts gathered since the last report into one pprof-style
//! profile with deduplicated string, function, mapping and location tables.
//!
//! All tables are owned by a single encoding pass and dropped afterwards.

mod tables;

pub use tables::{FunctionTable, FxIndexSet, StringIndex, StringTable};

use crate::config::BuildIdMode;
use crate::facts::{DrainedSample, Facts};
use crate::ids::{AddressOrLineno, FileId, FrameId, FrameType};
use libdd_profiling_reporter_protobuf::profiles::{
    BuildIdKind, Label, Line, Location, Mapping, Profile, Sample, ValueType,
};
use rustc_hash::FxHashMap;

/// Function and file name used when no symbol information is available.
pub const UNKNOWN: &str = "UNKNOWN";
/// Function name of interpreted frames whose file never reported metadata.
pub const UNREPORTED: &str = "UNREPORTED";
/// Function name of interpreted frames whose address has no metadata.
pub const UNRESOLVED: &str = "UNRESOLVED";
/// Module name of kernel functions.
pub const KERNEL_IMAGE: &str = "vmlinux";
/// File name of the placeholder mappings of non-native frames.
pub const DUMMY_MAPPING: &str = "DUMMY";

const LABEL_COMM: &str = "comm";
const LABEL_POD_NAME: &str = "podName";
const LABEL_POD_NAMESPACE: &str = "podNamespace";
const LABEL_CONTAINER_NAME: &str = "containerName";
const LABEL_APM_SERVICE_NAME: &str = "apmServiceName";

const NANOS_PER_SECOND: u64 = 1_000_000_000;
const MILLIS_PER_SECOND: u64 = 1_000;

#[derive(Clone, Copy, Debug)]
pub struct EncoderSettings {
    pub build_id_mode: BuildIdMode,
    pub period_nanos: i64,
}

/// An encoded profile and the time range its samples cover, in seconds since
/// the Unix epoch.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub profile: Profile,
    pub start: u64,
    pub end: u64,
}

/// Drains the sample counters of `facts` and encodes them.
///
/// Returns `None` when there is nothing to report.
pub fn encode(facts: &Facts, settings: EncoderSettings) -> Option<Snapshot> {
    let samples = facts.drain_samples();
    if samples.is_empty() {
        return None;
    }
    let mut builder = ProfileBuilder::new(facts, settings);
    for sample in &samples {
        builder.add_sample(sample);
    }
    Some(builder.finish())
}

struct ProfileBuilder<'a> {
    facts: &'a Facts,
    build_id_mode: BuildIdMode,
    profile: Profile,
    strings: StringTable,
    functions: FunctionTable,
    /// 1-based mapping references, one mapping per file.
    mappings: FxHashMap<FileId, u64>,
    /// Function references of kernel frames already encoded.
    kernel_functions: FxHashMap<FrameId, u64>,
    start: u64,
    end: u64,
}

impl<'a> ProfileBuilder<'a> {
    fn new(facts: &'a Facts, settings: EncoderSettings) -> Self {
        let mut strings = StringTable::new();
        let sample_type = ValueType {
            r#type: strings.intern("samples").to_i64(),
            unit: strings.intern("count").to_i64(),
            ..Default::default()
        };
        let period_type = ValueType {
            r#type: strings.intern("cpu").to_i64(),
            unit: strings.intern("nanoseconds").to_i64(),
            ..Default::default()
        };
        Self {
            facts,
            build_id_mode: settings.build_id_mode,
            profile: Profile {
                sample_type: vec![sample_type],
                period_type: Some(period_type),
                period: settings.period_nanos,
                ..Default::default()
            },
            strings,
            functions: FunctionTable::default(),
            mappings: FxHashMap::default(),
            kernel_functions: FxHashMap::default(),
            start: u64::MAX,
            end: 0,
        }
    }

    fn add_sample(&mut self, drained: &DrainedSample) {
        let trace = &drained.trace;
        let mut sample = Sample {
            locations_start_index: self.profile.location.len() as u64,
            stacktrace_id_index: self.strings.intern(&drained.hash.to_string()).to_u32(),
            value: vec![i64::from(drained.counter.count)],
            ..Default::default()
        };

        for (key, value) in [
            (LABEL_COMM, &trace.comm),
            (LABEL_POD_NAME, &trace.pod_name),
            (LABEL_POD_NAMESPACE, &trace.pod_namespace),
            (LABEL_CONTAINER_NAME, &trace.container_name),
            (LABEL_APM_SERVICE_NAME, &trace.apm_service_name),
        ] {
            if !value.is_empty() {
                sample.label.push(Label {
                    key: self.strings.intern(key).to_i64(),
                    str: self.strings.intern(value).to_i64(),
                    ..Default::default()
                });
            }
        }

        for &timestamp in &drained.counter.timestamps {
            sample
                .timestamps
                .push(timestamp.saturating_mul(MILLIS_PER_SECOND));
            self.start = self.start.min(timestamp);
            self.end = self.end.max(timestamp);
        }

        let frames = trace
            .files
            .iter()
            .zip(&trace.linenos)
            .zip(&trace.frame_types);
        for ((&file_id, &address_or_line), &frame_type) in frames {
            let location = self.encode_frame(file_id, address_or_line, frame_type);
            self.profile.location.push(location);
            sample.locations_length += 1;
        }

        self.profile.sample.push(sample);
    }

    fn encode_frame(
        &mut self,
        file_id: FileId,
        address_or_line: AddressOrLineno,
        frame_type: FrameType,
    ) -> Location {
        let mut location = Location {
            address: address_or_line.0,
            type_index: self.strings.intern(frame_type.name()).to_u32(),
            ..Default::default()
        };

        match frame_type {
            FrameType::Native => {
                location.mapping_index = self.native_mapping(file_id, address_or_line);
            }
            FrameType::Kernel => {
                let frame_id = FrameId::new(file_id, address_or_line);
                let function_index = self.kernel_function(frame_id);
                location.line.push(Line {
                    function_index,
                    ..Default::default()
                });
                location.mapping_index = self.dummy_mapping(file_id);
            }
            // Aborted unwinds have no representation in the line or mapping
            // tables.
            FrameType::Abort => {}
            _ => {
                let line = match self.facts.frame_source(&file_id, &address_or_line) {
                    None => Line {
                        function_index: self.functions.dedup(
                            &mut self.strings,
                            UNREPORTED,
                            frame_type.name(),
                        ),
                        ..Default::default()
                    },
                    Some(None) => Line {
                        function_index: self.functions.dedup(
                            &mut self.strings,
                            UNRESOLVED,
                            frame_type.name(),
                        ),
                        ..Default::default()
                    },
                    Some(Some(source)) => Line {
                        function_index: self.functions.dedup(
                            &mut self.strings,
                            &source.function_name,
                            &source.file_path,
                        ),
                        line: source.line_number.0 as i64,
                        ..Default::default()
                    },
                };
                location.line.push(line);
                location.mapping_index = self.dummy_mapping(file_id);
            }
        }
        location
    }

    fn native_mapping(&mut self, file_id: FileId, address_or_line: AddressOrLineno) -> u64 {
        if let Some(&index) = self.mappings.get(&file_id) {
            return index;
        }
        let executable = self.facts.executable(&file_id);
        let file_name = executable
            .as_ref()
            .map_or(UNKNOWN, |exec| exec.file_name.as_str());
        let (build_id, build_id_kind) = match self.build_id_mode {
            BuildIdMode::Linker => (
                executable
                    .as_ref()
                    .map_or(UNKNOWN.to_string(), |exec| exec.build_id.clone()),
                BuildIdKind::Linker,
            ),
            BuildIdMode::Hash => (file_id.to_string(), BuildIdKind::BinaryHash),
        };
        let mapping = Mapping {
            file_offset: address_or_line.0,
            filename: self.strings.intern(file_name).to_i64(),
            build_id: self.strings.intern(&build_id).to_i64(),
            build_id_kind: build_id_kind as i32,
            ..Default::default()
        };
        self.push_mapping(file_id, mapping)
    }

    fn dummy_mapping(&mut self, file_id: FileId) -> u64 {
        if let Some(&index) = self.mappings.get(&file_id) {
            return index;
        }
        let mapping = Mapping {
            filename: self.strings.intern(DUMMY_MAPPING).to_i64(),
            build_id: self.strings.intern(&file_id.to_string()).to_i64(),
            build_id_kind: BuildIdKind::BinaryHash as i32,
            ..Default::default()
        };
        self.push_mapping(file_id, mapping)
    }

    fn push_mapping(&mut self, file_id: FileId, mut mapping: Mapping) -> u64 {
        let index = self.profile.mapping.len() as u64 + 1;
        mapping.id = index;
        self.profile.mapping.push(mapping);
        self.mappings.insert(file_id, index);
        index
    }

    fn kernel_function(&mut self, frame_id: FrameId) -> u64 {
        if let Some(&index) = self.kernel_functions.get(&frame_id) {
            return index;
        }
        let symbol = self.facts.fallback_symbol(&frame_id);
        let name = symbol.as_deref().unwrap_or(UNKNOWN);
        let index = self.functions.dedup(&mut self.strings, name, KERNEL_IMAGE);
        self.kernel_functions.insert(frame_id, index);
        index
    }

    fn finish(mut self) -> Snapshot {
        if self.start > self.end {
            self.start = self.end;
        }
        let mut profile = self.profile;
        profile.location_indices = (0..profile.location.len() as i64).collect();
        for (offset, location) in profile.location.iter_mut().enumerate() {
            location.id = offset as u64 + 1;
        }
        profile.function = self.functions.into_pprof();
        profile.string_table = self.strings.into_vec();
        profile.time_nanos = self.start.saturating_mul(NANOS_PER_SECOND) as i64;
        profile.duration_nanos = (self.end - self.start).saturating_mul(NANOS_PER_SECOND) as i64;
        Snapshot {
            profile,
            start: self.start,
            end: self.end,
        }
    }
}
