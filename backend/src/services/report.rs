//! Report generation pipeline
//!
//! fetch -> normalise -> narrative -> charts -> compose -> persist, one run
//! at a time. The bundle folder is derived from the run timestamp only.

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use shared::{audit_observation, is_report_folder, report_folder_path, PropagationObservation, RawSourceBundle};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::{
    animation::AnimationBuilder,
    charts::build_all,
    composer::{ReportComposer, ANIMATION_FILE},
    coordinator::{FetchCoordinator, SourceFailure},
    mock::load_mock_bundle,
    narrative::NarrativeGenerator,
    normalizer::normalize,
};
use crate::{
    error::{AnimationError, AppError, AppResult, FetchError},
    storage::FileStorage,
};

pub const INDEX_FILE: &str = "index.html";
pub const OBSERVATION_FILE: &str = "normalized_data.json";
pub const NARRATIVE_FILE: &str = "llm_response.md";
pub const K_INDEX_FILE: &str = "noaa_k_index.json";
pub const SOLAR_FILE: &str = "noaa_solar.json";
pub const N0NBH_FILE: &str = "n0nbh_data.json";
pub const SIDC_FILE: &str = "sidc_data.json";
pub const SYSTEM_PROMPT_FILE: &str = "llm_system_prompt.txt";
pub const USER_PROMPT_FILE: &str = "llm_user_prompt.txt";

/// Keys every bundle must contain
pub const REQUIRED_FILES: [&str; 3] = [INDEX_FILE, OBSERVATION_FILE, NARRATIVE_FILE];

/// Wall-clock limit on the animation step; the run continues without it after this
pub const ANIMATION_BUDGET: StdDuration = StdDuration::from_secs(90);

/// Where observation and narrative come from
pub enum ReportSource {
    /// Built-in sample dataset and canned narrative
    Mock,
    Live {
        coordinator: FetchCoordinator,
        narrator: Arc<dyn NarrativeGenerator>,
    },
}

/// Result of one successful run
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedReport {
    pub folder_path: String,
    pub report_url: String,
    pub timestamp: DateTime<Utc>,
    /// Raw upstream records behind the report
    pub data_points: usize,
    pub failures: Vec<SourceFailure>,
}

/// One file of a bundle
struct Artefact {
    name: &'static str,
    bytes: Vec<u8>,
}

/// Inputs gathered before charting
struct Gathered {
    observation: PropagationObservation,
    raw: RawSourceBundle,
    markdown: String,
    /// System and user prompt, when a model was called
    prompts: Option<(String, String)>,
    failures: Vec<SourceFailure>,
}

/// Run timestamp: whole seconds, strictly after the previous run
pub fn next_timestamp(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let candidate = now.trunc_subsecs(0);
    match last {
        Some(last) if candidate <= last => last + Duration::seconds(1),
        _ => candidate,
    }
}

/// Browser URL of a bundle's page
pub fn report_url(folder_path: &str) -> String {
    format!("/files/{}/{}", folder_path, INDEX_FILE)
}

fn to_json<T: Serialize>(name: &str, value: &T) -> Option<Vec<u8>> {
    match serde_json::to_vec_pretty(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(file = name, error = %e, "Could not serialise raw records");
            None
        }
    }
}

/// Best-effort files: raw records of each source that answered, prompts, animation
fn optional_artefacts(
    raw: &RawSourceBundle,
    prompts: Option<(String, String)>,
    animation: Option<Vec<u8>>,
) -> Vec<Artefact> {
    let mut artefacts = Vec::new();
    let mut push_json = |name: &'static str, bytes: Option<Vec<u8>>| {
        if let Some(bytes) = bytes {
            artefacts.push(Artefact { name, bytes });
        }
    };

    if !raw.k_index_records.is_empty() {
        push_json(K_INDEX_FILE, to_json(K_INDEX_FILE, &raw.k_index_records));
    }
    if !raw.solar_cycle_records.is_empty() {
        push_json(SOLAR_FILE, to_json(SOLAR_FILE, &raw.solar_cycle_records));
    }
    if let Some(record) = &raw.n0nbh_record {
        push_json(N0NBH_FILE, to_json(N0NBH_FILE, record));
    }
    if !raw.sidc_records.is_empty() {
        push_json(SIDC_FILE, to_json(SIDC_FILE, &raw.sidc_records));
    }

    if let Some((system, user)) = prompts {
        artefacts.push(Artefact {
            name: SYSTEM_PROMPT_FILE,
            bytes: system.into_bytes(),
        });
        artefacts.push(Artefact {
            name: USER_PROMPT_FILE,
            bytes: user.into_bytes(),
        });
    }
    if let Some(gif) = animation {
        artefacts.push(Artefact {
            name: ANIMATION_FILE,
            bytes: gif,
        });
    }
    artefacts
}

/// Page rendered by `-test-charts`: sample data through every chart
pub fn render_chart_test_page(composer: &ReportComposer, now: DateTime<Utc>) -> AppResult<String> {
    let mock = load_mock_bundle(now);
    let charts = build_all(Some(&mock.observation), Some(&mock.raw));
    composer.compose(&mock.markdown, &charts, false, now)
}

/// Drives report generation and lists stored reports
pub struct ReportService {
    storage: Arc<dyn FileStorage>,
    source: ReportSource,
    animator: Arc<dyn AnimationBuilder>,
    animation_budget: StdDuration,
    composer: ReportComposer,
    /// Single-flight lock; holds the last issued run timestamp
    last_issued: Mutex<Option<DateTime<Utc>>>,
}

impl ReportService {
    pub fn new(
        storage: Arc<dyn FileStorage>,
        source: ReportSource,
        animator: Arc<dyn AnimationBuilder>,
    ) -> AppResult<Self> {
        Ok(Self {
            storage,
            source,
            animator,
            animation_budget: ANIMATION_BUDGET,
            composer: ReportComposer::new()?,
            last_issued: Mutex::new(None),
        })
    }

    pub fn with_animation_budget(mut self, budget: StdDuration) -> Self {
        self.animation_budget = budget;
        self
    }

    pub fn composer(&self) -> &ReportComposer {
        &self.composer
    }

    pub fn is_mock(&self) -> bool {
        matches!(self.source, ReportSource::Mock)
    }

    /// Generate a report for the current time.
    ///
    /// Concurrent calls queue on the single-flight lock; a queued run gets
    /// its own timestamp once it holds the lock.
    pub async fn generate(&self, cancel: &CancellationToken) -> AppResult<GeneratedReport> {
        self.generate_locked(None, cancel).await
    }

    /// Generate a report observed at `requested` (advanced if already used)
    pub async fn generate_at(
        &self,
        requested: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> AppResult<GeneratedReport> {
        self.generate_locked(Some(requested), cancel).await
    }

    async fn generate_locked(
        &self,
        requested: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> AppResult<GeneratedReport> {
        let mut last_issued = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            guard = self.last_issued.lock() => guard,
        };

        let timestamp = next_timestamp(requested.unwrap_or_else(Utc::now), *last_issued);
        *last_issued = Some(timestamp);

        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("generate_report", %run_id, %timestamp);
        self.run(timestamp, cancel).instrument(span).await
    }

    async fn gather(&self, timestamp: DateTime<Utc>, cancel: &CancellationToken) -> AppResult<Gathered> {
        match &self.source {
            ReportSource::Mock => {
                tracing::info!("Using built-in sample dataset");
                let mock = load_mock_bundle(timestamp);
                Ok(Gathered {
                    observation: mock.observation,
                    raw: mock.raw,
                    markdown: mock.markdown,
                    prompts: None,
                    failures: Vec::new(),
                })
            }
            ReportSource::Live { coordinator, narrator } => {
                let outcome = coordinator.run(cancel).await.map_err(|e| match e {
                    FetchError::Cancelled => AppError::Cancelled,
                    other => AppError::Internal(other.to_string()),
                })?;
                if !outcome.raw.has_core_data() {
                    tracing::error!(failed = outcome.failures.len(), "No core source returned data");
                    return Err(AppError::UpstreamUnavailable);
                }

                let observation = normalize(&outcome.raw, timestamp);
                let narrative = tokio::select! {
                    _ = cancel.cancelled() => return Err(AppError::Cancelled),
                    result = narrator.generate(&observation) => result?,
                };

                Ok(Gathered {
                    observation,
                    raw: outcome.raw,
                    markdown: narrative.markdown,
                    prompts: Some((narrative.system_prompt, narrative.user_prompt)),
                    failures: outcome.failures,
                })
            }
        }
    }

    async fn build_animation(&self, timestamp: DateTime<Utc>, cancel: &CancellationToken) -> AppResult<Option<Vec<u8>>> {
        let build = tokio::time::timeout(self.animation_budget, self.animator.build(timestamp));
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(AppError::Cancelled),
            result = build => result,
        };
        let Ok(result) = result else {
            tracing::warn!(
                budget_secs = self.animation_budget.as_secs_f64(),
                "Animation timed out, continuing without it"
            );
            return Ok(None);
        };
        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(AnimationError::Disabled) => {
                tracing::debug!("Animation disabled");
                Ok(None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Animation skipped");
                Ok(None)
            }
        }
    }

    async fn run(&self, timestamp: DateTime<Utc>, cancel: &CancellationToken) -> AppResult<GeneratedReport> {
        tracing::info!("Report generation started");
        let gathered = self.gather(timestamp, cancel).await?;

        for violation in audit_observation(&gathered.observation) {
            tracing::warn!(%violation, "Observation invariant violated");
        }

        let charts = build_all(Some(&gathered.observation), Some(&gathered.raw));
        let animation = self.build_animation(timestamp, cancel).await?;
        let html = self
            .composer
            .compose(&gathered.markdown, &charts, animation.is_some(), timestamp)?;
        let observation_json = serde_json::to_vec_pretty(&gathered.observation)
            .map_err(|e| AppError::Internal(format!("observation serialisation: {}", e)))?;

        let required = vec![
            Artefact {
                name: OBSERVATION_FILE,
                bytes: observation_json,
            },
            Artefact {
                name: NARRATIVE_FILE,
                bytes: gathered.markdown.clone().into_bytes(),
            },
        ];
        let index = Artefact {
            name: INDEX_FILE,
            bytes: html.into_bytes(),
        };
        for artefact in required.iter().chain(std::iter::once(&index)) {
            if artefact.bytes.is_empty() {
                return Err(AppError::MissingArtefact(artefact.name.to_string()));
            }
        }
        let optional = optional_artefacts(&gathered.raw, gathered.prompts, animation);

        let folder_path = report_folder_path(timestamp);
        self.persist(&folder_path, required, optional, index, cancel).await?;

        let report = GeneratedReport {
            report_url: report_url(&folder_path),
            folder_path,
            timestamp,
            data_points: gathered.raw.record_count(),
            failures: gathered.failures,
        };
        tracing::info!(
            folder = %report.folder_path,
            data_points = report.data_points,
            failed_sources = report.failures.len(),
            "Report generated"
        );
        Ok(report)
    }

    /// Required files, then best-effort ones, then `index.html`
    async fn persist(
        &self,
        folder_path: &str,
        required: Vec<Artefact>,
        optional: Vec<Artefact>,
        index: Artefact,
        cancel: &CancellationToken,
    ) -> AppResult<()> {
        for artefact in required {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            let key = format!("{}/{}", folder_path, artefact.name);
            self.storage.store(&key, artefact.bytes).await?;
        }

        for artefact in optional {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            let key = format!("{}/{}", folder_path, artefact.name);
            if let Err(e) = self.storage.store(&key, artefact.bytes).await {
                tracing::warn!(%key, error = %e, "Optional artefact not written");
            }
        }

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        let key = format!("{}/{}", folder_path, index.name);
        self.storage.store(&key, index.bytes).await?;
        Ok(())
    }

    /// Most recent report folders first, at most `limit`.
    ///
    /// Walks `YYYY/MM/DD/` newest first with shallow listings and stops once
    /// `limit` completed folders (those with an `index.html`) are found.
    pub async fn list_reports(&self, limit: usize) -> AppResult<Vec<String>> {
        let mut folders = Vec::new();
        if limit == 0 {
            return Ok(folders);
        }

        for year in self.date_dirs("").await? {
            for month in self.date_dirs(&year).await? {
                for day in self.date_dirs(&month).await? {
                    for folder in self.child_dirs(&day, is_report_folder).await? {
                        if !self.storage.exists(&format!("{}/{}", folder, INDEX_FILE)).await? {
                            continue;
                        }
                        folders.push(folder);
                        if folders.len() == limit {
                            return Ok(folders);
                        }
                    }
                }
            }
        }
        Ok(folders)
    }

    /// Numeric sub-directories of `prefix`, newest first
    async fn date_dirs(&self, prefix: &str) -> AppResult<Vec<String>> {
        self.child_dirs(prefix, |dir| {
            dir.rsplit('/')
                .next()
                .is_some_and(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()))
        })
        .await
    }

    /// Sub-directories of `prefix` accepted by `keep`, in descending order
    async fn child_dirs(&self, prefix: &str, keep: impl Fn(&str) -> bool) -> AppResult<Vec<String>> {
        let mut dirs: Vec<String> = self
            .storage
            .list(prefix, false)
            .await?
            .into_iter()
            .filter_map(|entry| entry.strip_suffix('/').map(str::to_string))
            .filter(|dir| keep(dir.as_str()))
            .collect();
        dirs.sort_unstable_by(|a, b| b.cmp(a));
        Ok(dirs)
    }

    pub async fn latest_report(&self) -> AppResult<Option<String>> {
        Ok(self.list_reports(1).await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StorageError,
        services::{animation::DisabledAnimation, narrative::build_user_prompt},
        storage::MemoryStorage,
    };
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 17, 14, 30, 45).unwrap()
    }

    fn mock_service(storage: Arc<MemoryStorage>) -> ReportService {
        ReportService::new(storage, ReportSource::Mock, Arc::new(DisabledAnimation)).unwrap()
    }

    /// Never finishes within a test run
    struct StalledAnimation;

    #[async_trait::async_trait]
    impl AnimationBuilder for StalledAnimation {
        async fn build(&self, _at: DateTime<Utc>) -> Result<Vec<u8>, AnimationError> {
            tokio::time::sleep(StdDuration::from_secs(24 * 3600)).await;
            Ok(b"GIF89a".to_vec())
        }
    }

    #[test]
    fn test_next_timestamp_truncates_and_advances() {
        let now = at() + Duration::milliseconds(750);
        assert_eq!(next_timestamp(now, None), at());
        assert_eq!(next_timestamp(now, Some(at())), at() + Duration::seconds(1));
        assert_eq!(
            next_timestamp(now, Some(at() + Duration::seconds(5))),
            at() + Duration::seconds(6)
        );
        assert_eq!(next_timestamp(now, Some(at() - Duration::seconds(1))), at());
    }

    #[tokio::test]
    async fn test_mock_run_writes_bundle_in_order() {
        let storage = Arc::new(MemoryStorage::new());
        let service = mock_service(storage.clone());

        let report = service.generate_at(at(), &CancellationToken::new()).await.unwrap();
        assert_eq!(report.folder_path, "2025/09/17/PropagationReport-2025-09-17-14-30-45");
        assert_eq!(
            report.report_url,
            "/files/2025/09/17/PropagationReport-2025-09-17-14-30-45/index.html"
        );
        assert!(report.data_points > 0);

        let keys = storage.keys().await;
        for name in REQUIRED_FILES.iter().chain([K_INDEX_FILE, SOLAR_FILE, N0NBH_FILE, SIDC_FILE].iter()) {
            assert!(keys.contains(&format!("{}/{}", report.folder_path, name)), "{}", name);
        }
        assert!(!keys.iter().any(|k| k.ends_with(ANIMATION_FILE)));
        assert!(!keys.iter().any(|k| k.ends_with(SYSTEM_PROMPT_FILE)));
    }

    #[tokio::test]
    async fn test_stalled_animation_does_not_block_report() {
        let storage = Arc::new(MemoryStorage::new());
        let service = ReportService::new(storage.clone(), ReportSource::Mock, Arc::new(StalledAnimation))
            .unwrap()
            .with_animation_budget(StdDuration::from_millis(50));

        let report = tokio::time::timeout(
            StdDuration::from_secs(5),
            service.generate_at(at(), &CancellationToken::new()),
        )
        .await
        .expect("generation should finish despite a stalled animation")
        .unwrap();

        let keys = storage.keys().await;
        assert!(keys.contains(&format!("{}/{}", report.folder_path, INDEX_FILE)));
        assert!(!keys.iter().any(|k| k.ends_with(ANIMATION_FILE)));

        let html = String::from_utf8(storage.get(&format!("{}/{}", report.folder_path, INDEX_FILE)).await.unwrap()).unwrap();
        assert!(!html.contains(ANIMATION_FILE));
    }

    #[test]
    fn test_default_animation_budget_fits_generate_timeout() {
        let service = mock_service(Arc::new(MemoryStorage::new()));
        assert_eq!(service.animation_budget, ANIMATION_BUDGET);
        assert!(ANIMATION_BUDGET < StdDuration::from_secs(300));
    }

    #[tokio::test]
    async fn test_same_second_runs_get_distinct_folders() {
        let storage = Arc::new(MemoryStorage::new());
        let service = Arc::new(mock_service(storage));

        let (cancel_first, cancel_second) = (CancellationToken::new(), CancellationToken::new());
        let (first, second) = tokio::join!(
            service.generate_at(at(), &cancel_first),
            service.generate_at(at(), &cancel_second)
        );
        let mut folders = vec![first.unwrap().folder_path, second.unwrap().folder_path];
        folders.sort();
        assert_eq!(
            folders,
            vec![
                "2025/09/17/PropagationReport-2025-09-17-14-30-45".to_string(),
                "2025/09/17/PropagationReport-2025-09-17-14-30-46".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_run_writes_nothing() {
        let storage = Arc::new(MemoryStorage::new());
        let service = mock_service(storage.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = service.generate_at(at(), &cancel).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(storage.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_newest_first() {
        let storage = Arc::new(MemoryStorage::new());
        let service = mock_service(storage.clone());
        let cancel = CancellationToken::new();
        for offset in [0, 3600, 86_400] {
            service
                .generate_at(at() + Duration::seconds(offset), &cancel)
                .await
                .unwrap();
        }
        storage.store("notes/index.html", b"x".to_vec()).await.unwrap();

        let reports = service.list_reports(10).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0], "2025/09/18/PropagationReport-2025-09-18-14-30-45");
        assert_eq!(service.list_reports(1).await.unwrap().len(), 1);
        assert_eq!(service.latest_report().await.unwrap(), Some(reports[0].clone()));
    }

    /// Memory storage that records every listing request
    #[derive(Default)]
    struct ListingLog {
        inner: MemoryStorage,
        listed: std::sync::Mutex<Vec<(String, bool)>>,
    }

    #[async_trait::async_trait]
    impl FileStorage for ListingLog {
        async fn store(&self, key: &str, data: Vec<u8>) -> Result<(), StorageError> {
            self.inner.store(key, data).await
        }

        async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.get(key).await
        }

        async fn exists(&self, key: &str) -> Result<bool, StorageError> {
            self.inner.exists(key).await
        }

        async fn list(&self, prefix: &str, recursive: bool) -> Result<Vec<String>, StorageError> {
            self.listed.lock().unwrap().push((prefix.to_string(), recursive));
            self.inner.list(prefix, recursive).await
        }

        async fn create_dir(&self, key: &str) -> Result<(), StorageError> {
            self.inner.create_dir(key).await
        }

        async fn close(&self) -> Result<(), StorageError> {
            self.inner.close().await
        }

        fn backend_name(&self) -> &'static str {
            "listing-log"
        }
    }

    #[tokio::test]
    async fn test_list_reports_walks_newest_dates_only() {
        let storage = Arc::new(ListingLog::default());
        let service = ReportService::new(storage.clone(), ReportSource::Mock, Arc::new(DisabledAnimation)).unwrap();
        let cancel = CancellationToken::new();
        for ts in [
            Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap(),
            at(),
            at() + Duration::hours(1),
        ] {
            service.generate_at(ts, &cancel).await.unwrap();
        }
        // Incomplete bundle: no index.html yet
        storage
            .store("2025/09/17/PropagationReport-2025-09-17-23-00-00/normalized_data.json", b"{}".to_vec())
            .await
            .unwrap();

        let newest = service.list_reports(2).await.unwrap();
        assert_eq!(
            newest,
            vec![
                "2025/09/17/PropagationReport-2025-09-17-15-30-45".to_string(),
                "2025/09/17/PropagationReport-2025-09-17-14-30-45".to_string(),
            ]
        );

        let listed = std::mem::take(&mut *storage.listed.lock().unwrap());
        assert!(listed.iter().all(|(_, recursive)| !recursive), "{:?}", listed);
        assert!(
            !listed.iter().any(|(prefix, _)| prefix.starts_with("2024") || prefix.starts_with("2025/01")),
            "{:?}",
            listed
        );

        let all = service.list_reports(10).await.unwrap();
        assert_eq!(
            all,
            vec![
                "2025/09/17/PropagationReport-2025-09-17-15-30-45".to_string(),
                "2025/09/17/PropagationReport-2025-09-17-14-30-45".to_string(),
                "2025/01/01/PropagationReport-2025-01-01-00-00-01".to_string(),
                "2024/12/31/PropagationReport-2024-12-31-23-59-59".to_string(),
            ]
        );
        assert!(service.list_reports(0).await.unwrap().is_empty());
    }

    #[test]
    fn test_chart_test_page_renders_every_chart() {
        let composer = ReportComposer::new().unwrap();
        let page = render_chart_test_page(&composer, at()).unwrap();
        for builder in crate::services::charts::all_builders() {
            assert!(page.contains(&format!("chart-{}", builder.id())), "{}", builder.id());
        }
    }

    #[test]
    fn test_prompt_dump_matches_prompt_builder() {
        let mock = load_mock_bundle(at());
        let user = build_user_prompt(&mock.observation);
        let artefacts = optional_artefacts(&mock.raw, Some(("system".to_string(), user.clone())), None);
        let dumped = artefacts.iter().find(|a| a.name == USER_PROMPT_FILE).unwrap();
        assert_eq!(dumped.bytes, user.into_bytes());
    }
}
