// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The entry point used by the trace collector.

use crate::config::ReporterConfig;
use crate::error::ReporterError;
use crate::exporter::{self, Exporter, HttpProfilesClient, ProfilesClient, ReporterMetrics};
use crate::facts::{Facts, SampleLabels};
use crate::ids::{AddressOrLineno, FileId, FrameId, SourceLineno, Trace, TraceHash};
use crate::symbols::{DebuginfoUploader, NoopSymbolUploader, SymbolUploader};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Gathers samples and metadata from the collector and exports them as OTLP
/// profiles every report interval.
///
/// None of the ingestion methods block or fail. Everything they record lives
/// in bounded caches, so under memory pressure some information is dropped and
/// shows up as placeholders in the exported profiles.
pub struct Reporter {
    facts: Arc<Facts>,
    exporter: Arc<Exporter>,
    stop: CancellationToken,
}

impl Reporter {
    /// Starts reporting on the current tokio runtime with the HTTP exporter
    /// and, if enabled, the debug-info uploader.
    ///
    /// Cancelling `cancel` stops the reporter and aborts in-flight requests.
    pub fn start(config: ReporterConfig, cancel: &CancellationToken) -> Result<Self, ReporterError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ReporterError::NoRuntime)?;
        let stop = cancel.child_token();

        let client = HttpProfilesClient::new(
            &config.collector_endpoint,
            config.request_timeout,
            stop.clone(),
        )?;
        let uploader: Arc<dyn SymbolUploader> = if config.upload_symbols {
            Arc::new(DebuginfoUploader::from_config(
                &config,
                stop.clone(),
                runtime.clone(),
            )?)
        } else {
            Arc::new(NoopSymbolUploader)
        };
        Self::start_with(config, stop, runtime, Arc::new(client), uploader)
    }

    /// Starts reporting with caller-provided collaborators. `stop` is used as
    /// is, not as the parent of a new token.
    pub fn start_with(
        config: ReporterConfig,
        stop: CancellationToken,
        runtime: Handle,
        client: Arc<dyn ProfilesClient>,
        uploader: Arc<dyn SymbolUploader>,
    ) -> Result<Self, ReporterError> {
        config.validate()?;
        let facts = Arc::new(Facts::new(&config, uploader)?);
        let exporter = Arc::new(Exporter::new(&config, facts.clone(), client));
        exporter::spawn(exporter.clone(), &runtime, stop.clone());
        debug!(
            collector.endpoint = %config.collector_endpoint,
            report.interval_ms = config.report_interval.as_millis() as u64,
            "Reporter started"
        );
        Ok(Self {
            facts,
            exporter,
            stop,
        })
    }

    /// Records the frames of a trace.
    pub fn report_frames_for_trace(&self, trace: &Trace) {
        self.facts.record_trace_shape(trace);
    }

    /// Records `count` occurrences of a trace at `timestamp` (seconds since
    /// the Unix epoch), along with the labels of the sampled process.
    #[allow(clippy::too_many_arguments)]
    pub fn report_count_for_trace(
        &self,
        hash: TraceHash,
        timestamp: u32,
        count: u16,
        comm: &str,
        pod_name: &str,
        pod_namespace: &str,
        container_name: &str,
    ) {
        self.facts.record_sample_count(
            hash,
            timestamp,
            count,
            SampleLabels {
                comm,
                pod_name,
                pod_namespace,
                container_name,
            },
        );
    }

    /// Records the kernel symbol of a frame. Only the first report of a
    /// frame is kept.
    pub fn report_fallback_symbol(&self, frame_id: FrameId, symbol: &str) {
        self.facts.record_fallback_symbol(frame_id, symbol);
    }

    /// Records a native executable and hands it to the symbol uploader.
    pub fn executable_metadata(&self, file_id: FileId, file_name: &str, build_id: &str) {
        self.facts.record_executable(file_id, file_name, build_id);
    }

    /// Records source information of an interpreted frame.
    pub fn frame_metadata(
        &self,
        file_id: FileId,
        address_or_line: AddressOrLineno,
        line_number: SourceLineno,
        function_offset: u32,
        function_name: &str,
        file_path: &str,
    ) {
        self.facts.record_frame(
            file_id,
            address_or_line,
            line_number,
            function_offset,
            function_name,
            file_path,
        );
    }

    pub fn report_host_metadata(&self, metadata: &HashMap<String, String>) {
        self.facts.record_host_metadata(metadata);
    }

    /// Same as [`Reporter::report_host_metadata`], for callers that want
    /// delivery confirmed. Host metadata only goes to a local cache, so it is
    /// delivered once this returns and there is nothing to wait for.
    pub fn report_host_metadata_blocking(&self, metadata: &HashMap<String, String>) {
        self.report_host_metadata(metadata);
    }

    /// Agent metrics are not exported by this reporter.
    pub fn report_metrics(&self, _timestamp: u32, _ids: &[u32], _values: &[i64]) {}

    /// Traffic counters of the profiles channel.
    pub fn metrics(&self) -> ReporterMetrics {
        self.exporter.metrics()
    }

    /// Stops reporting. Gathered but unreported samples are dropped. Calling
    /// this more than once has no further effect.
    pub fn stop(&self) {
        self.stop.cancel();
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        self.stop.cancel();
    }
}
