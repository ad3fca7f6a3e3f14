// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Periodically encodes the gathered samples and exports them.

mod client;

pub use client::{HttpProfilesClient, ProfilesClient, ReporterMetrics, PROFILES_PATH};

use crate::config::{ReporterConfig, REPORT_INTERVAL_JITTER};
use crate::encoder::{self, EncoderSettings, Snapshot};
use crate::error::ExportError;
use crate::facts::Facts;
use libdd_profiling_reporter_protobuf::collector::{
    ExportProfilesServiceRequest, InstrumentationScope, KeyValue, ProfileContainer, Resource,
    ResourceProfiles, ScopeProfiles,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Resource attribute naming the kind of profile.
pub const PROFILE_NAME_KEY: &str = "__name__";
pub const PROFILE_NAME: &str = "otel_profiling_agent_on_cpu";
/// Placeholder profile ID; an all-zero ID is invalid.
pub const PROFILE_ID: &[u8] = b"LIBDDPROF";

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Scales `base` by a random factor in `[1 - jitter, 1 + jitter]`.
pub fn add_jitter(base: Duration, jitter: f64) -> Duration {
    let factor = 1.0 + jitter - 2.0 * jitter * fastrand::f64();
    base.mul_f64(factor.max(0.0))
}

pub(crate) struct Exporter {
    facts: Arc<Facts>,
    client: Arc<dyn ProfilesClient>,
    settings: EncoderSettings,
    report_interval: Duration,
    scope_name: String,
    scope_version: String,
}

impl Exporter {
    pub(crate) fn new(
        config: &ReporterConfig,
        facts: Arc<Facts>,
        client: Arc<dyn ProfilesClient>,
    ) -> Self {
        Self {
            facts,
            client,
            settings: EncoderSettings {
                build_id_mode: config.build_id_mode,
                period_nanos: config.period_nanos(),
            },
            report_interval: config.report_interval,
            scope_name: config.agent_name.clone(),
            scope_version: config.scope_version(),
        }
    }

    pub(crate) fn metrics(&self) -> ReporterMetrics {
        self.client.metrics()
    }

    /// Encodes and exports whatever was gathered since the previous call.
    /// Returns whether anything was sent.
    pub(crate) async fn report_once(&self) -> Result<bool, ExportError> {
        let Some(snapshot) = encoder::encode(&self.facts, self.settings) else {
            debug!("No samples to report");
            return Ok(false);
        };
        let request = self.build_request(snapshot);
        self.client.export(request).await?;
        Ok(true)
    }

    fn build_request(&self, snapshot: Snapshot) -> ExportProfilesServiceRequest {
        let Snapshot {
            mut profile,
            start,
            end,
        } = snapshot;
        if profile.duration_nanos == 0 {
            profile.duration_nanos = i64::try_from(self.report_interval.as_nanos()).unwrap_or(i64::MAX);
        }

        let mut attributes: Vec<KeyValue> = self
            .facts
            .host_metadata()
            .into_iter()
            .map(|(key, value)| KeyValue::string(key, value))
            .collect();
        attributes.push(KeyValue::string(PROFILE_NAME_KEY, PROFILE_NAME));

        ExportProfilesServiceRequest {
            resource_profiles: vec![ResourceProfiles {
                resource: Some(Resource {
                    attributes,
                    ..Default::default()
                }),
                scope_profiles: vec![ScopeProfiles {
                    scope: Some(InstrumentationScope {
                        name: self.scope_name.clone(),
                        version: self.scope_version.clone(),
                        ..Default::default()
                    }),
                    profiles: vec![ProfileContainer {
                        profile_id: PROFILE_ID.to_vec(),
                        start_time_unix_nano: start.saturating_mul(NANOS_PER_SECOND),
                        end_time_unix_nano: end.saturating_mul(NANOS_PER_SECOND),
                        profile: Some(profile),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        }
    }
}

/// Starts the tick task and the shutdown watcher. Both end once `stop` is
/// cancelled.
pub(crate) fn spawn(
    exporter: Arc<Exporter>,
    runtime: &Handle,
    stop: CancellationToken,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let ticker = runtime.spawn(tick(exporter.clone(), stop.clone()));
    let client = exporter.client.clone();
    let watcher = runtime.spawn(async move {
        stop.cancelled().await;
        if let Err(e) = client.close().await {
            error!("Stopping the profiles channel failed: {e}");
            std::process::exit(1);
        }
    });
    (ticker, watcher)
}

async fn tick(exporter: Arc<Exporter>, stop: CancellationToken) {
    let mut interval = exporter.report_interval;
    loop {
        tokio::select! {
            biased;
            _ = stop.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
        if let Err(e) = exporter.report_once().await {
            error!("Request failed: {e}");
        }
        interval = add_jitter(exporter.report_interval, REPORT_INTERVAL_JITTER);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{AddressOrLineno, FileId, FrameType, Trace, TraceHash};
    use crate::facts::SampleLabels;
    use crate::symbols::NoopSymbolUploader;
    use async_trait::async_trait;
    use libdd_profiling_reporter_protobuf::collector::{
        any_value, ExportProfilesServiceResponse,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;

    #[derive(Default)]
    struct RecordingClient {
        requests: Mutex<Vec<ExportProfilesServiceRequest>>,
    }

    #[async_trait]
    impl ProfilesClient for RecordingClient {
        async fn export(
            &self,
            request: ExportProfilesServiceRequest,
        ) -> Result<ExportProfilesServiceResponse, ExportError> {
            self.requests.lock().push(request);
            Ok(ExportProfilesServiceResponse::default())
        }

        async fn close(&self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    /// Fails the first export, then records like [`RecordingClient`].
    #[derive(Default)]
    struct FlakyClient {
        attempts: Mutex<usize>,
        requests: Mutex<Vec<ExportProfilesServiceRequest>>,
    }

    #[async_trait]
    impl ProfilesClient for FlakyClient {
        async fn export(
            &self,
            request: ExportProfilesServiceRequest,
        ) -> Result<ExportProfilesServiceResponse, ExportError> {
            let attempt = {
                let mut attempts = self.attempts.lock();
                *attempts += 1;
                *attempts
            };
            if attempt == 1 {
                return Err(ExportError::Transport(
                    crate::error::TransportError::RequestFailed {
                        status: 503,
                        body: "overloaded".to_string(),
                    },
                ));
            }
            self.requests.lock().push(request);
            Ok(ExportProfilesServiceResponse::default())
        }

        async fn close(&self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    fn exporter<C: ProfilesClient + 'static>(client: Arc<C>) -> (Arc<Facts>, Exporter) {
        let config = ReporterConfig::default()
            .cache_entries(16)
            .agent("agent", "1.0.0", "abc123");
        let facts = Arc::new(Facts::new(&config, Arc::new(NoopSymbolUploader)).unwrap());
        let exporter = Exporter::new(&config, facts.clone(), client);
        (facts, exporter)
    }

    fn ingest(facts: &Facts, ts: u32) {
        let hash = TraceHash::new(1, 1);
        facts.record_trace_shape(&Trace {
            hash,
            files: vec![FileId::new(2, 2)],
            linenos: vec![AddressOrLineno(0x10)],
            frame_types: vec![FrameType::Native],
        });
        facts.record_sample_count(hash, ts, 1, SampleLabels::default());
    }

    fn string_value(kv: &KeyValue) -> &str {
        match kv.value.as_ref().and_then(|v| v.value.as_ref()) {
            Some(any_value::Value::StringValue(s)) => s,
            _ => panic!("not a string attribute"),
        }
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let base = Duration::from_secs(10);
        for _ in 0..1000 {
            let jittered = add_jitter(base, 0.2);
            assert!(jittered >= Duration::from_secs(8), "{jittered:?}");
            assert!(jittered <= Duration::from_secs(12), "{jittered:?}");
        }
        assert_eq!(add_jitter(base, 0.0), base);
    }

    #[tokio::test]
    async fn empty_snapshot_is_not_sent() {
        let client = Arc::new(RecordingClient::default());
        let (_, exporter) = exporter(client.clone());
        assert!(!exporter.report_once().await.unwrap());
        assert!(client.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn envelope_carries_metadata() {
        let client = Arc::new(RecordingClient::default());
        let (facts, exporter) = exporter(client.clone());
        facts.record_host_metadata(&HashMap::from([(
            "host:name".to_string(),
            "web-1".to_string(),
        )]));
        ingest(&facts, 42);

        assert!(exporter.report_once().await.unwrap());

        let requests = client.requests.lock();
        let resource_profiles = &requests[0].resource_profiles[0];
        let attributes = &resource_profiles.resource.as_ref().unwrap().attributes;
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[0].key, "host:name");
        assert_eq!(string_value(&attributes[0]), "web-1");
        assert_eq!(attributes[1].key, PROFILE_NAME_KEY);
        assert_eq!(string_value(&attributes[1]), PROFILE_NAME);

        let scope_profiles = &resource_profiles.scope_profiles[0];
        let scope = scope_profiles.scope.as_ref().unwrap();
        assert_eq!(scope.name, "agent");
        assert_eq!(scope.version, "1.0.0@abc123");

        let container = &scope_profiles.profiles[0];
        assert_eq!(container.profile_id, PROFILE_ID);
        assert_eq!(container.start_time_unix_nano, 42 * NANOS_PER_SECOND);
        assert_eq!(container.end_time_unix_nano, 42 * NANOS_PER_SECOND);
        let profile = container.profile.as_ref().unwrap();
        // A single timestamp covers no time, so the report interval is used.
        assert_eq!(profile.duration_nanos, 5_000_000_000);
        assert_eq!(profile.sample.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let client = Arc::new(RecordingClient::default());
        let (facts, exporter) = exporter(client.clone());
        let stop = CancellationToken::new();
        let (ticker, watcher) = spawn(Arc::new(exporter), &Handle::current(), stop.clone());

        ingest(&facts, 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(client.requests.lock().len(), 1);

        ingest(&facts, 2);
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(client.requests.lock().len(), 2);

        stop.cancel();
        ticker.await.unwrap();
        watcher.await.unwrap();

        ingest(&facts, 3);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(client.requests.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_export_does_not_stop_ticking() {
        let client = Arc::new(FlakyClient::default());
        let (facts, exporter) = exporter(client.clone());
        let stop = CancellationToken::new();
        let (ticker, _watcher) = spawn(Arc::new(exporter), &Handle::current(), stop.clone());

        ingest(&facts, 1);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(*client.attempts.lock(), 1);
        assert!(client.requests.lock().is_empty());
        assert!(!ticker.is_finished());

        ingest(&facts, 2);
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(*client.attempts.lock(), 2);
        let requests = client.requests.lock();
        assert_eq!(requests.len(), 1);
        let profile = requests[0].resource_profiles[0].scope_profiles[0].profiles[0]
            .profile
            .as_ref()
            .unwrap();
        assert_eq!(profile.sample.len(), 1);
        drop(requests);

        stop.cancel();
        ticker.await.unwrap();
    }
}
