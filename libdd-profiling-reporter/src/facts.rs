// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The caches filled by the collector between two reports, and the
//! read-modify-write rules used to fill them.

use crate::cache::BoundedCache;
use crate::config::ReporterConfig;
use crate::error::CacheError;
use crate::ids::{AddressOrLineno, FileId, FrameId, FrameType, SourceLineno, Trace, TraceHash};
use crate::symbols::SymbolUploader;
use rustc_hash::FxHashMap;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// File name recorded for executables without a backing file, such as
/// processes spawned directly by the kernel.
pub const ANONYMOUS_BLOB: &str = "<anonymous-blob>";

/// Shape and labels of one call stack. Filled by two independent calls which
/// touch disjoint fields.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TraceInfo {
    pub files: Vec<FileId>,
    pub linenos: Vec<AddressOrLineno>,
    pub frame_types: Vec<FrameType>,
    /// Set once the frames of the trace were reported.
    pub has_frames: bool,
    pub comm: String,
    pub pod_name: String,
    pub pod_namespace: String,
    pub container_name: String,
    pub apm_service_name: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SampleCounter {
    /// Seconds since the Unix epoch, one per occurrence batch.
    pub timestamps: Vec<u64>,
    pub count: u32,
}

impl SampleCounter {
    fn absorb(&mut self, other: SampleCounter) {
        self.count = self.count.saturating_add(other.count);
        self.timestamps.extend(other.timestamps);
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecInfo {
    pub file_name: String,
    pub build_id: String,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SourceInfo {
    pub line_number: SourceLineno,
    pub function_offset: u32,
    pub function_name: String,
    pub file_path: String,
}

pub type FrameSourceMap = FxHashMap<AddressOrLineno, SourceInfo>;

/// Labels attached to a sample count.
#[derive(Clone, Copy, Debug, Default)]
pub struct SampleLabels<'a> {
    pub comm: &'a str,
    pub pod_name: &'a str,
    pub pod_namespace: &'a str,
    pub container_name: &'a str,
}

/// A drained counter joined with the shape of its trace.
#[derive(Clone, Debug)]
pub struct DrainedSample {
    pub hash: TraceHash,
    pub trace: TraceInfo,
    pub counter: SampleCounter,
}

pub struct Facts {
    traces: BoundedCache<TraceHash, TraceInfo>,
    samples: BoundedCache<TraceHash, SampleCounter>,
    fallback_symbols: BoundedCache<FrameId, String>,
    executables: BoundedCache<FileId, ExecInfo>,
    frames: BoundedCache<FileId, FrameSourceMap>,
    host_metadata: BoundedCache<String, String>,
    symbol_uploader: Arc<dyn SymbolUploader>,
}

impl Facts {
    pub fn new(
        config: &ReporterConfig,
        symbol_uploader: Arc<dyn SymbolUploader>,
    ) -> Result<Self, CacheError> {
        let entries = config.cache_entries;
        Ok(Self {
            traces: BoundedCache::new(entries)?,
            samples: BoundedCache::new(entries)?,
            fallback_symbols: BoundedCache::new(entries)?,
            executables: BoundedCache::new(entries)?,
            frames: BoundedCache::new(entries)?,
            host_metadata: BoundedCache::new(config.host_metadata_entries)?,
            symbol_uploader,
        })
    }

    pub fn record_trace_shape(&self, trace: &Trace) {
        self.traces.upsert(trace.hash, |info| {
            info.files.clone_from(&trace.files);
            info.linenos.clone_from(&trace.linenos);
            info.frame_types.clone_from(&trace.frame_types);
            info.has_frames = true;
        });
    }

    pub fn record_sample_count(
        &self,
        hash: TraceHash,
        timestamp: u32,
        count: u16,
        labels: SampleLabels<'_>,
    ) {
        self.traces.upsert(hash, |info| {
            labels.comm.clone_into(&mut info.comm);
            labels.pod_name.clone_into(&mut info.pod_name);
            labels.pod_namespace.clone_into(&mut info.pod_namespace);
            labels.container_name.clone_into(&mut info.container_name);
        });
        self.samples.upsert(hash, |counter| {
            counter.count = counter.count.saturating_add(u32::from(count));
            counter.timestamps.push(u64::from(timestamp));
        });
    }

    /// First writer wins.
    pub fn record_fallback_symbol(&self, frame_id: FrameId, symbol: &str) {
        self.fallback_symbols
            .add_if_absent(frame_id, symbol.to_string());
    }

    pub fn record_executable(&self, file_id: FileId, file_name: &str, build_id: &str) {
        let base_name = base_name(file_name);
        self.symbol_uploader.upload(file_id, file_name, build_id);
        self.executables.add(
            file_id,
            ExecInfo {
                file_name: base_name,
                build_id: build_id.to_string(),
            },
        );
    }

    pub fn record_frame(
        &self,
        file_id: FileId,
        address_or_line: AddressOrLineno,
        line_number: SourceLineno,
        function_offset: u32,
        function_name: &str,
        file_path: &str,
    ) {
        self.frames.upsert(file_id, |sources| {
            let file_path = match sources.get(&address_or_line) {
                Some(known) if file_path.is_empty() => known.file_path.clone(),
                _ => file_path.to_string(),
            };
            sources.insert(
                address_or_line,
                SourceInfo {
                    line_number,
                    function_offset,
                    function_name: function_name.to_string(),
                    file_path,
                },
            );
        });
    }

    pub fn record_host_metadata(&self, metadata: &HashMap<String, String>) {
        for (key, value) in metadata {
            self.host_metadata.add(key.clone(), value.clone());
        }
    }

    /// Removes every sample counter and joins it with its trace shape.
    ///
    /// Counters whose shape is not known yet are merged back into the cache
    /// and left for the next round.
    pub fn drain_samples(&self) -> Vec<DrainedSample> {
        let drained: Vec<(TraceHash, SampleCounter)> = self
            .samples
            .keys()
            .into_iter()
            .filter_map(|hash| self.samples.remove(&hash).map(|counter| (hash, counter)))
            .collect();

        let mut ready = Vec::with_capacity(drained.len());
        let mut requeued = 0usize;
        for (hash, counter) in drained {
            match self.traces.get(&hash) {
                Some(trace) if trace.has_frames => ready.push(DrainedSample {
                    hash,
                    trace,
                    counter,
                }),
                _ => {
                    requeued += 1;
                    self.samples.upsert(hash, |pending| {
                        let newer = std::mem::replace(pending, counter);
                        pending.absorb(newer);
                    });
                }
            }
        }
        if requeued > 0 {
            tracing::debug!(requeued, "Trace shape not yet known, keeping counts for next report");
        }
        ready
    }

    pub fn fallback_symbol(&self, frame_id: &FrameId) -> Option<String> {
        self.fallback_symbols.get(frame_id)
    }

    pub fn executable(&self, file_id: &FileId) -> Option<ExecInfo> {
        self.executables.get(file_id)
    }

    /// Looks up the source information of one frame. The outer `Option` is
    /// `None` when nothing at all is known about the file.
    pub fn frame_source(
        &self,
        file_id: &FileId,
        address_or_line: &AddressOrLineno,
    ) -> Option<Option<SourceInfo>> {
        self.frames
            .get_with(file_id, |sources| sources.get(address_or_line).cloned())
    }

    /// Host attributes, ordered by key.
    pub fn host_metadata(&self) -> Vec<(String, String)> {
        let mut attributes: Vec<(String, String)> = self
            .host_metadata
            .keys()
            .into_iter()
            .filter_map(|key| self.host_metadata.peek(&key).map(|value| (key, value)))
            .collect();
        attributes.sort_unstable();
        attributes
    }

    #[cfg(test)]
    pub(crate) fn trace(&self, hash: &TraceHash) -> Option<TraceInfo> {
        self.traces.peek(hash)
    }

    #[cfg(test)]
    pub(crate) fn pending_samples(&self, hash: &TraceHash) -> Option<SampleCounter> {
        self.samples.peek(hash)
    }
}

fn base_name(file_name: &str) -> String {
    match Path::new(file_name).file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None if file_name.trim_end_matches('/').is_empty() => ANONYMOUS_BLOB.to_string(),
        None => file_name.to_string(),
    }
}
