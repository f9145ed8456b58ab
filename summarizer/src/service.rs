//! Summary service: the one long-lived owner of the cache, the client and
//! the extractor.
//!
//! ```text
//! summarize(key, root, subject, sink)
//!   ├─ disabled?        → Disabled
//!   ├─ cache hit?       → cached result
//!   └─ run_exclusive(key)
//!        [blocking pool] select_body → extract
//!        stream summary → cache write → result
//! ```
//!
//! Every request resolves to a [`SummaryResult`], and every sink sees
//! exactly one terminal (`done = true`) callback.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::cache::SummaryCache;
use crate::config::Config;
use crate::html::{ExtractOptions, ExtractorChain};
use crate::mime::{parse_raw_message, select_body, MessagePart};
use crate::settings::{Settings, SettingsSource};
use crate::summarize::{ClientOptions, OllamaClient, ProgressSink};

/// Outcome of one summary request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryResult {
    /// Trimmed, non-empty model output
    Summary(String),
    /// The message has no usable body
    NoBody,
    /// The model produced nothing, or no endpoint could be reached
    NoSummary,
    /// The computation crashed
    Failed,
    /// Summaries are switched off
    Disabled,
}

impl SummaryResult {
    /// Only real outcomes of a finished computation are cached.
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Summary(_) | Self::NoBody | Self::NoSummary)
    }
}

impl fmt::Display for SummaryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary(text) => f.write_str(text),
            Self::NoBody => f.write_str("(no body to summarize)"),
            Self::NoSummary => f.write_str("(no summary generated)"),
            Self::Failed => f.write_str("(failed to load summary)"),
            Self::Disabled => Ok(()),
        }
    }
}

/// Forwards progress for one caller and guarantees a single terminal call.
struct Progress {
    key: String,
    sink: Arc<dyn ProgressSink>,
    finished: AtomicBool,
}

impl Progress {
    fn new(key: &str, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            key: key.to_string(),
            sink,
            finished: AtomicBool::new(false),
        }
    }

    /// An empty terminal update is held back so `finish` can send the
    /// sentinel text instead.
    fn update(&self, partial: &str, done: bool) {
        if done && partial.trim().is_empty() {
            return;
        }
        if done {
            if self.finished.swap(true, Ordering::SeqCst) {
                return;
            }
        } else if self.finished.load(Ordering::SeqCst) {
            return;
        }
        self.sink.on_progress(&self.key, partial, done);
    }

    fn finish(&self, result: &SummaryResult) {
        if !self.finished.swap(true, Ordering::SeqCst) {
            self.sink.on_progress(&self.key, &result.to_string(), true);
        }
    }
}

#[derive(Clone)]
pub struct SummaryService {
    client: OllamaClient,
    cache: SummaryCache,
    settings: Arc<dyn SettingsSource>,
    extractor: Arc<ExtractorChain>,
}

impl SummaryService {
    pub fn new(
        client: OllamaClient,
        cache: SummaryCache,
        settings: Arc<dyn SettingsSource>,
        extractor: ExtractorChain,
    ) -> Self {
        Self {
            client,
            cache,
            settings,
            extractor: Arc::new(extractor),
        }
    }

    /// Wire up a service from process configuration.
    pub fn from_config(config: &Config, settings: Arc<dyn SettingsSource>) -> Result<Self> {
        let client = OllamaClient::new(ClientOptions::from_config(config))?;
        let cache = SummaryCache::new(config.cache_capacity);
        let extractor = ExtractorChain::new(ExtractOptions {
            max_chars: config.max_content_chars,
            tracking_url_min_len: config.tracking_url_min_len,
        });

        info!(
            endpoints = ?config.ollama_endpoints,
            cache_capacity = config.cache_capacity,
            "summary_service_initialized"
        );

        Ok(Self::new(client, cache, settings, extractor))
    }

    /// Latest settings from the source.
    pub fn settings(&self) -> Settings {
        self.settings.current()
    }

    /// Cached result for `key`, if any.
    pub fn cached(&self, key: &str) -> Option<SummaryResult> {
        self.cache.get(&key.to_string())
    }

    /// Summarize the message rooted at `root`, streaming partials to `sink`.
    pub async fn summarize(
        &self,
        key: &str,
        root: MessagePart,
        subject: &str,
        sink: Arc<dyn ProgressSink>,
    ) -> SummaryResult {
        let progress = Arc::new(Progress::new(key, sink));
        let settings = self.settings.current();

        if !settings.enabled {
            info!(message_id = key, "summary_disabled");
            let result = SummaryResult::Disabled;
            progress.finish(&result);
            return result;
        }

        if let Some(hit) = self.cache.get(&key.to_string()) {
            info!(message_id = key, "summary_cache_hit");
            progress.finish(&hit);
            return hit;
        }

        let service = self.clone();
        let task_key = key.to_string();
        let task_subject = subject.to_string();
        let task_progress = Arc::clone(&progress);

        let result = match self
            .cache
            .run_exclusive(key.to_string(), move || {
                service.compute(task_key, root, task_subject, settings, task_progress)
            })
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(message_id = key, error = %e, "summary_computation_failed");
                SummaryResult::Failed
            }
        };

        progress.finish(&result);
        result
    }

    /// Parse a raw RFC 5322 message and summarize it under `key`, or under
    /// its Message-Id when no key is given.
    pub async fn summarize_raw(
        &self,
        raw: &[u8],
        key: Option<&str>,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<(String, SummaryResult)> {
        let message = parse_raw_message(raw)?;
        let key = key
            .map(str::to_string)
            .or(message.message_id)
            .ok_or_else(|| anyhow::anyhow!("message has no Message-Id and no key was given"))?;
        let subject = message.subject.unwrap_or_default();

        let result = self.summarize(&key, message.root, &subject, sink).await;
        Ok((key, result))
    }

    async fn compute(
        self,
        key: String,
        root: MessagePart,
        subject: String,
        settings: Settings,
        progress: Arc<Progress>,
    ) -> SummaryResult {
        if let Some(hit) = self.cache.get(&key) {
            return hit;
        }

        let extractor = Arc::clone(&self.extractor);
        let prepared = tokio::task::spawn_blocking(move || {
            select_body(&root).map(|html| {
                let text = extractor.extract(&html);
                (html, text)
            })
        })
        .await;

        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(message_id = %key, error = %e, "summary_extraction_failed");
                return SummaryResult::Failed;
            }
        };

        let result = match prepared {
            None => {
                info!(message_id = %key, "summary_no_body");
                SummaryResult::NoBody
            }
            Some((html, text)) => {
                info!(
                    message_id = %key,
                    html_length = html.len(),
                    text_length = text.len(),
                    model = %settings.model_name,
                    "summary_generation_starting"
                );

                let on_progress = |partial: &str, done: bool| progress.update(partial, done);
                match self.client.summarize(&text, &subject, &settings, on_progress).await {
                    Ok(summary) if summary.is_empty() => SummaryResult::NoSummary,
                    Ok(summary) => SummaryResult::Summary(summary),
                    Err(e) => {
                        warn!(message_id = %key, error = %e, "summary_generation_failed");
                        return SummaryResult::NoSummary;
                    }
                }
            }
        };

        if result.is_cacheable() {
            self.cache.set(key, result.clone());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SharedSettings;
    use crate::summarize::NoopSink;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(String, String, bool)>>,
    }

    impl ProgressSink for Recorder {
        fn on_progress(&self, key: &str, partial: &str, done: bool) {
            self.calls
                .lock()
                .unwrap()
                .push((key.to_string(), partial.to_string(), done));
        }
    }

    impl Recorder {
        fn terminal(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, _, done)| *done)
                .map(|(_, text, _)| text.clone())
                .collect()
        }
    }

    fn service_for(endpoint: String, settings: SharedSettings) -> SummaryService {
        let config = Config {
            ollama_endpoints: vec![endpoint],
            progress_throttle_ms: 0,
            ..Config::default()
        };
        SummaryService::from_config(&config, Arc::new(settings)).unwrap()
    }

    fn html_message(body: &str) -> MessagePart {
        MessagePart::leaf("text/html; charset=utf-8", body)
    }

    async fn mock_model(body: &'static str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.as_bytes().to_vec(), "application/x-ndjson")
                    .set_delay(Duration::from_millis(50)),
            )
            .mount(&server)
            .await;
        server
    }

    struct Exploding;

    impl crate::html::ReadableTextExtractor for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn linearize(&self, _html: &str) -> Option<String> {
            panic!("extractor blew up");
        }
    }

    #[test]
    fn test_result_display() {
        assert_eq!(SummaryResult::Summary("hi".into()).to_string(), "hi");
        assert_eq!(SummaryResult::NoBody.to_string(), "(no body to summarize)");
        assert_eq!(SummaryResult::NoSummary.to_string(), "(no summary generated)");
        assert_eq!(SummaryResult::Failed.to_string(), "(failed to load summary)");
        assert_eq!(SummaryResult::Disabled.to_string(), "");
    }

    #[tokio::test]
    async fn test_summarizes_and_caches() {
        let server = mock_model("{\"response\":\"Lunch \"}\n{\"response\":\"moved\",\"done\":true}\n").await;
        let service = service_for(server.uri(), SharedSettings::default());
        let recorder = Arc::new(Recorder::default());

        let result = service
            .summarize("m1", html_message("<p>Lunch is moved to 1pm</p>"), "Lunch", recorder.clone())
            .await;

        assert_eq!(result, SummaryResult::Summary("Lunch moved".to_string()));
        assert_eq!(recorder.terminal(), vec!["Lunch moved".to_string()]);
        assert_eq!(service.cached("m1"), Some(result.clone()));

        let again = service
            .summarize("m1", html_message("<p>ignored</p>"), "Lunch", Arc::new(NoopSink))
            .await;
        assert_eq!(again, result);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_call() {
        let server = mock_model("{\"response\":\"Shared\",\"done\":true}\n").await;
        let service = service_for(server.uri(), SharedSettings::default());
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());

        let (a, b) = tokio::join!(
            service.summarize("m1", html_message("<p>Body</p>"), "S", first.clone()),
            service.summarize("m1", html_message("<p>Body</p>"), "S", second.clone()),
        );

        assert_eq!(a, SummaryResult::Summary("Shared".to_string()));
        assert_eq!(a, b);
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(first.terminal(), vec!["Shared".to_string()]);
        assert_eq!(second.terminal(), vec!["Shared".to_string()]);
    }

    #[tokio::test]
    async fn test_no_body_is_cached_without_network() {
        let server = mock_model("{\"response\":\"never\"}\n").await;
        let service = service_for(server.uri(), SharedSettings::default());
        let recorder = Arc::new(Recorder::default());

        let root = MessagePart::leaf("application/pdf", "JVBERi0xLjQK");
        let result = service.summarize("m1", root, "S", recorder.clone()).await;

        assert_eq!(result, SummaryResult::NoBody);
        assert_eq!(recorder.terminal(), vec!["(no body to summarize)".to_string()]);
        assert_eq!(service.cached("m1"), Some(SummaryResult::NoBody));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_model_output_is_no_summary() {
        let server = mock_model("{\"done\":true}\n").await;
        let service = service_for(server.uri(), SharedSettings::default());
        let recorder = Arc::new(Recorder::default());

        let result = service
            .summarize("m1", html_message("<p>Hello</p>"), "S", recorder.clone())
            .await;

        assert_eq!(result, SummaryResult::NoSummary);
        assert_eq!(recorder.terminal(), vec!["(no summary generated)".to_string()]);
    }

    #[tokio::test]
    async fn test_unreachable_model_is_not_cached() {
        let service = service_for(
            "http://127.0.0.1:1/api/generate".to_string(),
            SharedSettings::default(),
        );

        let result = service
            .summarize("m1", html_message("<p>Hello</p>"), "S", Arc::new(NoopSink))
            .await;

        assert_eq!(result, SummaryResult::NoSummary);
        assert_eq!(service.cached("m1"), None);
    }

    #[tokio::test]
    async fn test_disabled_skips_everything() {
        let server = mock_model("{\"response\":\"never\"}\n").await;
        let settings = SharedSettings::new(Settings {
            enabled: false,
            ..Settings::default()
        });
        let service = service_for(server.uri(), settings);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sink = move |_: &str, partial: &str, done: bool| {
            assert!(partial.is_empty() && done);
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        };

        let result = service
            .summarize("m1", html_message("<p>Hello</p>"), "S", Arc::new(sink))
            .await;

        assert_eq!(result, SummaryResult::Disabled);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(service.cached("m1"), None);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_read_per_request() {
        let server = mock_model("{\"response\":\"ok\"}\n").await;
        let settings = SharedSettings::default();
        let service = service_for(server.uri(), settings.clone());

        settings.update(crate::settings::SettingsUpdate {
            model_name: Some("phi3".to_string()),
            ..Default::default()
        });
        service
            .summarize("m1", html_message("<p>Hello</p>"), "S", Arc::new(NoopSink))
            .await;

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "phi3");
    }

    #[tokio::test]
    async fn test_summarize_raw_uses_message_id() {
        let server = mock_model("{\"response\":\"Invoice due\"}\n").await;
        let service = service_for(server.uri(), SharedSettings::default());

        let raw = "Message-Id: <inv-7@example.com>\r\n\
Subject: Invoice\r\n\
Content-Type: text/plain\r\n\
\r\n\
Your invoice is due Friday.\r\n";

        let (key, result) = service
            .summarize_raw(raw.as_bytes(), None, Arc::new(NoopSink))
            .await
            .unwrap();

        assert_eq!(key, "inv-7@example.com");
        assert_eq!(result, SummaryResult::Summary("Invoice due".to_string()));

        let no_id = "Subject: x\r\nContent-Type: text/plain\r\n\r\nhello\r\n";
        assert!(service
            .summarize_raw(no_id.as_bytes(), None, Arc::new(NoopSink))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_crashed_computation_is_failed_and_not_cached() {
        let server = mock_model("{\"response\":\"never\"}\n").await;
        let config = Config {
            ollama_endpoints: vec![server.uri()],
            ..Config::default()
        };
        let service = SummaryService::new(
            OllamaClient::new(ClientOptions::from_config(&config)).unwrap(),
            SummaryCache::new(config.cache_capacity),
            Arc::new(SharedSettings::default()),
            ExtractorChain::with_extractors(vec![Box::new(Exploding)], ExtractOptions::default()),
        );
        let recorder = Arc::new(Recorder::default());

        let result = service
            .summarize("m1", html_message("<p>Hello</p>"), "S", recorder.clone())
            .await;

        assert_eq!(result, SummaryResult::Failed);
        assert_eq!(recorder.terminal(), vec!["(failed to load summary)".to_string()]);
        assert_eq!(service.cached("m1"), None);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_text_matches_result_after_done_line() {
        let server = mock_model("{\"response\":\" Hi \",\"done\":true}\n{\"response\":\"there\"}\n  \n").await;
        let service = service_for(server.uri(), SharedSettings::default());
        let recorder = Arc::new(Recorder::default());

        let result = service
            .summarize("m1", html_message("<p>Hello</p>"), "S", recorder.clone())
            .await;

        assert_eq!(result, SummaryResult::Summary("Hi".to_string()));
        assert_eq!(recorder.terminal(), vec![result.to_string()]);
        assert_eq!(recorder.calls.lock().unwrap().last().unwrap().1, "Hi");
        assert_eq!(service.cached("m1"), Some(result));
    }
}
