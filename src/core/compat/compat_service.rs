// Compatibility lookup service.
//
// This service handles:
// - Single code lookups that always produce something displayable
// - Concurrent multi-code lookups with positional, title-deduplicated output
// - The reply pipeline (working marker, content override, per-result sends)
//
// NO Discord dependencies here. Chat operations go through `ReplySink`.

use super::compat_models::{
    CompatClient, CompatOutcome, DisplayResult, LookupConfig, ReplyOrigin, ReplySink,
    ThumbnailSource, TitleInfo,
};
use super::content_override::ContentOverride;
use super::product_codes::ProductCode;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// What a pipeline run did, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Lookups that produced a result (before title deduplication).
    pub looked_up: usize,
    /// Results we tried to post.
    pub attempted: usize,
    /// Results that were actually posted.
    pub delivered: usize,
}

pub struct CompatService<C: CompatClient, T: ThumbnailSource> {
    client: C,
    thumbnails: T,
    config: LookupConfig,
    content_override: ContentOverride,
}

impl<C, T> CompatService<C, T>
where
    C: CompatClient + 'static,
    T: ThumbnailSource + 'static,
{
    pub fn new(
        client: C,
        thumbnails: T,
        config: LookupConfig,
        content_override: ContentOverride,
    ) -> Self {
        Self {
            client,
            thumbnails,
            config,
            content_override,
        }
    }

    /// Look up a single code. Never fails: every problem collapses into one of
    /// the degraded display states.
    pub async fn lookup_one(
        &self,
        code: Option<&ProductCode>,
        title_hint: Option<&str>,
        for_log: bool,
        category: Option<&str>,
    ) -> DisplayResult {
        let Some(code) = code else {
            return DisplayResult::unknown(None, title_hint, for_log, None);
        };

        let results = match self.client.search(code.as_str()).await {
            Ok(CompatOutcome::Found(results)) => results,
            Ok(CompatOutcome::Maintenance) => return DisplayResult::maintenance(Some(code)),
            Ok(CompatOutcome::CommunicationError) => {
                return DisplayResult::communication_error(Some(code))
            }
            Err(err) => {
                tracing::warn!(code = %code, error = %err, "Couldn't get compat result");
                return DisplayResult::communication_error(None);
            }
        };

        let thumbnail = self.thumbnail(code).await;

        let record = results.get(code.as_str()).or_else(|| {
            results
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(code.as_str()))
                .map(|(_, info)| info)
        });
        if let Some(info) = record {
            return DisplayResult::from_title_info(code, info, title_hint, for_log, thumbnail);
        }

        if let Some(info) = category.and_then(|c| self.presumed_record(c)) {
            return DisplayResult::from_title_info(code, &info, title_hint, for_log, thumbnail);
        }

        DisplayResult::unknown(Some(code), title_hint, for_log, thumbnail)
    }

    /// Synthesized record for codes the API doesn't know but whose category
    /// tag tells us what to expect.
    fn presumed_record(&self, category: &str) -> Option<TitleInfo> {
        let category = category.trim();
        let matches = |set: &[String]| set.iter().any(|c| c.eq_ignore_ascii_case(category));

        if matches(&self.config.presumed_playable_categories) {
            let provenance = &self.config.presumed_playable;
            return Some(TitleInfo {
                status: Some("Playable".to_string()),
                date: Some(provenance.date.format("%Y-%m-%d").to_string()),
                commit: Some(provenance.commit.clone()),
                pr: Some(provenance.pr),
                ..Default::default()
            });
        }

        if matches(&self.config.presumed_nothing_categories) {
            return Some(TitleInfo {
                status: Some("Nothing".to_string()),
                ..Default::default()
            });
        }

        None
    }

    async fn thumbnail(&self, code: &ProductCode) -> Option<String> {
        match self.thumbnails.thumbnail_url(code).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(code = %code, error = %err, "Couldn't get thumbnail");
                None
            }
        }
    }

    /// Look up every code concurrently. Output follows input order, drops codes
    /// whose lookup task failed and keeps only the first result per title.
    pub async fn lookup_many(self: &Arc<Self>, codes: &[ProductCode]) -> Vec<DisplayResult> {
        let mut tasks = LookupTasks(
            codes
                .iter()
                .cloned()
                .map(|code| {
                    let service = Arc::clone(self);
                    let lookup_code = code.clone();
                    let handle = tokio::spawn(async move {
                        service.lookup_one(Some(&lookup_code), None, false, None).await
                    });
                    (code, handle)
                })
                .collect(),
        );

        let mut results = Vec::with_capacity(codes.len());
        for (code, handle) in tasks.0.iter_mut() {
            match handle.await {
                Ok(result) => results.push(result),
                Err(err) => {
                    tracing::warn!(code = %code, error = %err, "Couldn't get product code info")
                }
            }
        }
        results
    }

    /// Look up `codes` and post one reply per distinct result.
    ///
    /// The working marker is removed on every exit path, including when the
    /// returned future is dropped before completion.
    pub async fn lookup_and_reply(
        self: &Arc<Self>,
        codes: &[ProductCode],
        origin: ReplyOrigin,
        sink: Arc<dyn ReplySink>,
    ) -> PipelineReport {
        let mut report = PipelineReport::default();
        if codes.is_empty() {
            return report;
        }

        if let Err(err) = sink.mark_working().await {
            tracing::warn!(error = %err, "Failed to mark message as in progress");
        }
        let indicator = WorkingIndicator::new(Arc::clone(&sink));

        let results = self.lookup_many(codes).await;
        report.looked_up = results.len();

        for mut result in dedup_by_title(results) {
            if self.content_override.apply(origin, &mut result) {
                if let Err(err) = sink.flag_override().await {
                    tracing::warn!(error = %err, "Failed to flag overridden result");
                }
            }

            report.attempted += 1;
            match sink.send_result(&result).await {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    tracing::warn!(title = %result.title, error = %err, "Couldn't post result")
                }
            }
        }

        indicator.release().await;
        report
    }
}

/// Keep the first result for every distinct title.
pub fn dedup_by_title(results: Vec<DisplayResult>) -> Vec<DisplayResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| seen.insert(r.title.clone()))
        .collect()
}

/// Spawned lookups, aborted if the caller goes away before joining them.
struct LookupTasks(Vec<(ProductCode, JoinHandle<DisplayResult>)>);

impl Drop for LookupTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.0 {
            handle.abort();
        }
    }
}

/// Scoped "working" marker. `release` clears it inline; if the guard is
/// dropped without release the clear runs on a background task.
struct WorkingIndicator {
    sink: Option<Arc<dyn ReplySink>>,
}

impl WorkingIndicator {
    fn new(sink: Arc<dyn ReplySink>) -> Self {
        Self { sink: Some(sink) }
    }

    async fn release(mut self) {
        if let Some(sink) = self.sink.take() {
            clear_working(sink).await;
        }
    }
}

impl Drop for WorkingIndicator {
    fn drop(&mut self) {
        if let Some(sink) = self.sink.take() {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                runtime.spawn(clear_working(sink));
            }
        }
    }
}

async fn clear_working(sink: Arc<dyn ReplySink>) {
    if let Err(err) = sink.clear_working().await {
        tracing::warn!(error = %err, "Failed to clear in-progress marker");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compat::{CompatError, DisplayState, ReplyError};
    use async_trait::async_trait;
    use dashmap::{DashMap, DashSet};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone, Copy)]
    enum Behaviour {
        Maintenance,
        CommunicationError,
        Fault,
        Panic,
        Hang,
    }

    /// In-memory compatibility API for testing
    #[derive(Default)]
    struct MockCompatClient {
        records: DashMap<String, TitleInfo>,
        behaviours: DashMap<String, Behaviour>,
        calls: AtomicUsize,
    }

    impl MockCompatClient {
        fn with_record(self, code: &str, title: &str, status: &str) -> Self {
            self.records.insert(
                code.to_string(),
                TitleInfo {
                    title: Some(title.to_string()),
                    status: Some(status.to_string()),
                    date: Some("2024-01-01".to_string()),
                    ..Default::default()
                },
            );
            self
        }

        fn with_behaviour(self, code: &str, behaviour: Behaviour) -> Self {
            self.behaviours.insert(code.to_string(), behaviour);
            self
        }
    }

    #[async_trait]
    impl CompatClient for MockCompatClient {
        async fn search(&self, term: &str) -> Result<CompatOutcome, CompatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let behaviour = self.behaviours.get(term).map(|b| *b);
            match behaviour {
                Some(Behaviour::Maintenance) => Ok(CompatOutcome::Maintenance),
                Some(Behaviour::CommunicationError) => Ok(CompatOutcome::CommunicationError),
                Some(Behaviour::Fault) => Err(CompatError::Api("connection reset".to_string())),
                Some(Behaviour::Panic) => panic!("lookup blew up for {term}"),
                Some(Behaviour::Hang) => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(CompatOutcome::Found(HashMap::new()))
                }
                None => {
                    let mut results = HashMap::new();
                    if let Some(info) = self.records.get(term) {
                        results.insert(term.to_string(), info.clone());
                    }
                    Ok(CompatOutcome::Found(results))
                }
            }
        }
    }

    #[derive(Default)]
    struct MockThumbnails {
        urls: DashMap<String, String>,
        broken: DashSet<String>,
    }

    #[async_trait]
    impl ThumbnailSource for MockThumbnails {
        async fn thumbnail_url(&self, code: &ProductCode) -> Result<Option<String>, CompatError> {
            if self.broken.contains(code.as_str()) {
                return Err(CompatError::Store("disk on fire".to_string()));
            }
            Ok(self.urls.get(code.as_str()).map(|u| u.clone()))
        }
    }

    /// Records every chat-side call in order.
    #[derive(Default)]
    struct MockSink {
        events: Mutex<Vec<String>>,
        failing_titles: DashSet<String>,
    }

    impl MockSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl ReplySink for MockSink {
        async fn mark_working(&self) -> Result<(), ReplyError> {
            self.push("mark".to_string());
            Ok(())
        }

        async fn clear_working(&self) -> Result<(), ReplyError> {
            self.push("clear".to_string());
            Ok(())
        }

        async fn flag_override(&self) -> Result<(), ReplyError> {
            self.push("flag".to_string());
            Ok(())
        }

        async fn send_result(&self, result: &DisplayResult) -> Result<(), ReplyError> {
            self.push(format!("send:{}", result.title));
            if self.failing_titles.contains(&result.title) {
                return Err(ReplyError("missing permissions".to_string()));
            }
            Ok(())
        }
    }

    fn service(
        client: MockCompatClient,
        thumbnails: MockThumbnails,
    ) -> Arc<CompatService<MockCompatClient, MockThumbnails>> {
        Arc::new(CompatService::new(
            client,
            thumbnails,
            LookupConfig::default(),
            ContentOverride::default(),
        ))
    }

    fn code(s: &str) -> ProductCode {
        ProductCode::parse(s).unwrap()
    }

    const ORIGIN: ReplyOrigin = ReplyOrigin {
        author_id: 42,
        is_private: false,
    };

    #[tokio::test]
    async fn test_missing_code_is_unknown_without_remote_call() {
        let client = MockCompatClient::default();
        let svc = service(client, MockThumbnails::default());

        let result = svc.lookup_one(None, Some("Some Game"), false, None).await;

        assert_eq!(result.state, DisplayState::Unknown);
        assert_eq!(result.title, "Some Game");
        assert_eq!(svc.client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_found_record_with_thumbnail() {
        let client = MockCompatClient::default().with_record("BLES01234", "Demon's Souls", "Ingame");
        let thumbnails = MockThumbnails::default();
        thumbnails
            .urls
            .insert("BLES01234".to_string(), "https://img/bles.png".to_string());
        let svc = service(client, thumbnails);

        let result = svc.lookup_one(Some(&code("BLES01234")), None, false, None).await;

        assert_eq!(result.title, "Demon's Souls");
        assert_eq!(result.status(), Some("Ingame"));
        assert_eq!(result.thumbnail_url.as_deref(), Some("https://img/bles.png"));
    }

    #[tokio::test]
    async fn test_thumbnail_failure_does_not_fail_lookup() {
        let client = MockCompatClient::default().with_record("BLES01234", "Demon's Souls", "Ingame");
        let thumbnails = MockThumbnails::default();
        thumbnails.broken.insert("BLES01234".to_string());
        let svc = service(client, thumbnails);

        let result = svc.lookup_one(Some(&code("BLES01234")), None, false, None).await;

        assert_eq!(result.status(), Some("Ingame"));
        assert!(result.thumbnail_url.is_none());
    }

    #[tokio::test]
    async fn test_api_signals_map_to_display_states() {
        let client = MockCompatClient::default()
            .with_behaviour("BLES00001", Behaviour::Maintenance)
            .with_behaviour("BLES00002", Behaviour::CommunicationError)
            .with_behaviour("BLES00003", Behaviour::Fault);
        let svc = service(client, MockThumbnails::default());

        let maintenance = svc.lookup_one(Some(&code("BLES00001")), None, false, None).await;
        assert_eq!(maintenance.state, DisplayState::Maintenance);
        assert_eq!(maintenance.code, Some(code("BLES00001")));

        let comm = svc.lookup_one(Some(&code("BLES00002")), None, false, None).await;
        assert_eq!(comm.state, DisplayState::CommunicationError);
        assert_eq!(comm.code, Some(code("BLES00002")));

        // A generic fault does not carry the code.
        let fault = svc.lookup_one(Some(&code("BLES00003")), None, false, None).await;
        assert_eq!(fault.state, DisplayState::CommunicationError);
        assert!(fault.code.is_none());
    }

    #[tokio::test]
    async fn test_presumed_playable_category() {
        let svc = service(MockCompatClient::default(), MockThumbnails::default());

        let result = svc
            .lookup_one(Some(&code("NPUB30001")), Some("Tiny Game"), false, Some("1P"))
            .await;

        assert_eq!(result.status(), Some("Playable"));
        assert_eq!(
            result.commit.as_deref(),
            Some("8b449ce76c91d5ff7a2829b233befe7d6df4b24f")
        );
        assert_eq!(result.date.as_deref(), Some("2018-06-23"));
        assert_eq!(result.pr, Some(4802));
        assert_eq!(result.title, "Tiny Game");
    }

    #[tokio::test]
    async fn test_presumed_nothing_category() {
        let svc = service(MockCompatClient::default(), MockThumbnails::default());

        let result = svc
            .lookup_one(Some(&code("NPUB30001")), None, false, Some("2P"))
            .await;

        assert_eq!(result.status(), Some("Nothing"));
        assert!(result.commit.is_none());
    }

    #[tokio::test]
    async fn test_unknown_without_category_keeps_thumbnail() {
        let thumbnails = MockThumbnails::default();
        thumbnails
            .urls
            .insert("NPUB30001".to_string(), "https://img/npub.png".to_string());
        let svc = service(MockCompatClient::default(), thumbnails);

        let result = svc
            .lookup_one(Some(&code("NPUB30001")), None, false, Some("XX"))
            .await;

        assert_eq!(result.state, DisplayState::Unknown);
        assert_eq!(result.thumbnail_url.as_deref(), Some("https://img/npub.png"));
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let client = MockCompatClient::default().with_record("BLES01234", "Demon's Souls", "Ingame");
        let svc = service(client, MockThumbnails::default());

        let first = svc.lookup_one(Some(&code("BLES01234")), None, false, None).await;
        let second = svc.lookup_one(Some(&code("BLES01234")), None, false, None).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_pipeline_drops_failures_and_duplicate_titles() {
        let client = MockCompatClient::default()
            .with_record("BLES00001", "Same Game", "Playable")
            .with_record("BLUS00002", "Same Game", "Playable")
            .with_record("BLES00003", "Other Game", "Ingame")
            .with_behaviour("BLES00004", Behaviour::Panic);
        let svc = service(client, MockThumbnails::default());
        let sink = Arc::new(MockSink::default());

        let codes = [
            code("BLES00001"),
            code("BLES00004"),
            code("BLUS00002"),
            code("BLES00003"),
        ];
        let report = svc.lookup_and_reply(&codes, ORIGIN, sink.clone()).await;

        assert_eq!(report.looked_up, 3);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.delivered, 2);
        assert_eq!(
            sink.events(),
            vec!["mark", "send:Same Game", "send:Other Game", "clear"]
        );
    }

    #[tokio::test]
    async fn test_send_failure_does_not_block_later_sends() {
        let client = MockCompatClient::default()
            .with_record("BLES00001", "First", "Playable")
            .with_record("BLES00002", "Second", "Playable")
            .with_record("BLES00003", "Third", "Playable");
        let svc = service(client, MockThumbnails::default());
        let sink = Arc::new(MockSink::default());
        sink.failing_titles.insert("Second".to_string());

        let codes = [code("BLES00001"), code("BLES00002"), code("BLES00003")];
        let report = svc.lookup_and_reply(&codes, ORIGIN, sink.clone()).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 2);
        assert_eq!(
            sink.events(),
            vec!["mark", "send:First", "send:Second", "send:Third", "clear"]
        );
    }

    #[tokio::test]
    async fn test_content_override_flags_and_rewrites() {
        let client = MockCompatClient::default().with_record("BLES00001", "Afrika", "Playable");
        let svc = service(client, MockThumbnails::default());
        let sink = Arc::new(MockSink::default());
        let origin = ReplyOrigin {
            author_id: ContentOverride::default().author_id,
            is_private: false,
        };

        svc.lookup_and_reply(&[code("BLES00001")], origin, sink.clone())
            .await;

        let events = sink.events();
        assert_eq!(events[1], "flag");
        assert!(events[2].starts_with("send:How about no"));
    }

    #[tokio::test]
    async fn test_empty_codes_touch_nothing() {
        let svc = service(MockCompatClient::default(), MockThumbnails::default());
        let sink = Arc::new(MockSink::default());

        let report = svc.lookup_and_reply(&[], ORIGIN, sink.clone()).await;

        assert_eq!(report, PipelineReport::default());
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_working_marker_cleared_when_cancelled() {
        let client = MockCompatClient::default().with_behaviour("BLES00001", Behaviour::Hang);
        let svc = service(client, MockThumbnails::default());
        let sink = Arc::new(MockSink::default());

        let codes = [code("BLES00001")];
        let run = svc.lookup_and_reply(&codes, ORIGIN, sink.clone());
        let outcome = tokio::time::timeout(Duration::from_millis(50), run).await;
        assert!(outcome.is_err());

        // The clear runs on a spawned task; give it a turn.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(sink.events(), vec!["mark", "clear"]);
    }

    #[test]
    fn test_dedup_keeps_first_per_title() {
        let a = DisplayResult::unknown(Some(&code("BLES00001")), Some("X"), false, None);
        let b = DisplayResult::unknown(Some(&code("BLES00002")), Some("X"), false, None);
        let c = DisplayResult::unknown(Some(&code("BLES00003")), Some("Y"), false, None);

        let out = dedup_by_title(vec![a.clone(), b, c.clone()]);

        assert_eq!(out, vec![a, c]);
    }
}
