//! Concurrent fan-out to the four source fetchers
//!
//! One task per source, each reporting into a shared completion channel.
//! Source failures are logged and recorded, never fatal here; deciding
//! whether enough data came back is left to the caller.

use std::sync::Arc;

use serde::Serialize;
use shared::{KIndexRecord, N0nbhRecord, RawSourceBundle, SidcRecord, SolarCycleRecord};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    config::SourcesConfig,
    error::FetchError,
    external::{
        KIndexFetcher, N0nbhFetcher, SidcFetcher, SolarCycleFetcher, SourceFetcher,
        SourceHttpClient,
    },
};

const SOURCE_COUNT: usize = 4;

/// A source that returned no usable data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFailure {
    pub source: String,
    pub code: String,
    pub message: String,
}

/// Everything one coordinator run produced
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub raw: RawSourceBundle,
    pub failures: Vec<SourceFailure>,
}

enum Payload {
    KIndex(Vec<KIndexRecord>),
    SolarCycle(Vec<SolarCycleRecord>),
    N0nbh(N0nbhRecord),
    Sidc(Vec<SidcRecord>),
}

struct Completion {
    source: &'static str,
    result: Result<Payload, FetchError>,
}

impl FetchOutcome {
    fn record(&mut self, completion: Completion) {
        match completion.result {
            Ok(Payload::KIndex(records)) => self.raw.k_index_records = records,
            Ok(Payload::SolarCycle(records)) => self.raw.solar_cycle_records = records,
            Ok(Payload::N0nbh(record)) => self.raw.n0nbh_record = Some(record),
            Ok(Payload::Sidc(records)) => self.raw.sidc_records = records,
            Err(err) => {
                tracing::warn!(
                    source = completion.source,
                    code = err.code(),
                    error = %err,
                    "Source fetch failed"
                );
                self.failures.push(SourceFailure {
                    source: completion.source.to_string(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
}

/// Runs the four fetchers concurrently
#[derive(Clone)]
pub struct FetchCoordinator {
    k_index: Arc<dyn SourceFetcher<Output = Vec<KIndexRecord>>>,
    solar_cycle: Arc<dyn SourceFetcher<Output = Vec<SolarCycleRecord>>>,
    n0nbh: Arc<dyn SourceFetcher<Output = N0nbhRecord>>,
    sidc: Arc<dyn SourceFetcher<Output = Vec<SidcRecord>>>,
}

impl FetchCoordinator {
    pub fn new(
        k_index: Arc<dyn SourceFetcher<Output = Vec<KIndexRecord>>>,
        solar_cycle: Arc<dyn SourceFetcher<Output = Vec<SolarCycleRecord>>>,
        n0nbh: Arc<dyn SourceFetcher<Output = N0nbhRecord>>,
        sidc: Arc<dyn SourceFetcher<Output = Vec<SidcRecord>>>,
    ) -> Self {
        Self {
            k_index,
            solar_cycle,
            n0nbh,
            sidc,
        }
    }

    /// HTTP fetchers for the configured feed URLs
    pub fn from_sources(sources: &SourcesConfig, http: SourceHttpClient) -> Self {
        Self::new(
            Arc::new(KIndexFetcher::new(http.clone(), sources.k_index_url.clone())),
            Arc::new(SolarCycleFetcher::new(http.clone(), sources.solar_url.clone())),
            Arc::new(N0nbhFetcher::new(http.clone(), sources.n0nbh_url.clone())),
            Arc::new(SidcFetcher::new(http, sources.sidc_url.clone())),
        )
    }

    /// Fetch every source; returns `Cancelled` as soon as `cancel` fires
    pub async fn run(&self, cancel: &CancellationToken) -> Result<FetchOutcome, FetchError> {
        let tasks = cancel.child_token();
        let (tx, mut rx) = mpsc::channel(SOURCE_COUNT);

        spawn_fetch(self.k_index.clone(), &tasks, &tx, Payload::KIndex);
        spawn_fetch(self.solar_cycle.clone(), &tasks, &tx, Payload::SolarCycle);
        spawn_fetch(self.n0nbh.clone(), &tasks, &tx, Payload::N0nbh);
        spawn_fetch(self.sidc.clone(), &tasks, &tx, Payload::Sidc);
        drop(tx);

        let mut outcome = FetchOutcome::default();
        let mut received = 0;
        while received < SOURCE_COUNT {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.cancel();
                    tracing::info!("Fetch cancelled with {} of {} sources complete", received, SOURCE_COUNT);
                    return Err(FetchError::Cancelled);
                }
                completion = rx.recv() => match completion {
                    Some(completion) => {
                        received += 1;
                        outcome.record(completion);
                    }
                    None => break,
                },
            }
        }

        tracing::info!(
            records = outcome.raw.record_count(),
            failed = outcome.failures.len(),
            "Source fetch complete"
        );
        Ok(outcome)
    }
}

fn spawn_fetch<T: Send + 'static>(
    fetcher: Arc<dyn SourceFetcher<Output = T>>,
    token: &CancellationToken,
    tx: &mpsc::Sender<Completion>,
    wrap: fn(T) -> Payload,
) {
    let token = token.clone();
    let tx = tx.clone();
    tokio::spawn(async move {
        let source = fetcher.source_name();
        let result = tokio::select! {
            _ = token.cancelled() => Err(FetchError::Cancelled),
            result = fetcher.fetch() => result,
        };
        let _ = tx
            .send(Completion {
                source,
                result: result.map(wrap),
            })
            .await;
    });
}
