//! Mock capability provider for testing.
//!
//! Provides deterministic responses without any real model. Tracks call
//! counts and the last options and input seen, so tests can verify the
//! relay drives capabilities correctly. Failure injection covers open,
//! invocation, and mid-stream errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::capability::kinds::{
    Availability, CapabilityKind, DownloadProgress, InvokeOutput, LanguageDetection, OpenOptions,
    SummaryLength,
};
use crate::capability::traits::{
    Capability, CapabilitySession, ChunkCallback, ProgressCallback, StreamChunk, StreamStats,
};
use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Mock Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration controlling mock behavior.
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Delay between streamed chunks (0 = instant).
    pub chunk_latency_ms: u64,

    /// Availability reported for this capability.
    pub availability: Availability,

    /// Simulated model size when availability requires a download.
    pub download_total_bytes: u64,

    /// Number of progress reports during a simulated download.
    pub download_steps: u32,

    /// Fail `open` with a creation failure.
    pub fail_on_open: bool,

    /// Fail `invoke`/`stream_invoke` before producing anything.
    pub fail_on_invoke: bool,

    /// Fail mid-stream after this many chunks were delivered.
    pub fail_after_chunks: Option<usize>,

    /// Fixed response text instead of the generated one.
    pub fixed_response: Option<String>,

    /// Words per streamed chunk.
    pub words_per_chunk: usize,

    /// Emit cumulative chunks (each carries the whole text so far)
    /// instead of deltas, as some prompt providers do.
    pub cumulative_chunks: bool,

    /// Language pairs the mock translator supports.
    pub supported_pairs: Vec<(String, String)>,
}

impl Default for MockConfig {
    fn default() -> Self {
        let pair = |src: &str, tgt: &str| (src.to_string(), tgt.to_string());
        Self {
            chunk_latency_ms: 0,
            availability: Availability::Available,
            download_total_bytes: 4096,
            download_steps: 4,
            fail_on_open: false,
            fail_on_invoke: false,
            fail_after_chunks: None,
            fixed_response: None,
            words_per_chunk: 3,
            cumulative_chunks: false,
            supported_pairs: vec![
                pair("en", "es"),
                pair("es", "en"),
                pair("en", "fr"),
                pair("fr", "en"),
                pair("en", "de"),
                pair("de", "en"),
                pair("en", "ja"),
                pair("ja", "en"),
            ],
        }
    }
}

/// Track method call counts for verification.
#[derive(Debug, Default)]
struct CallCounts {
    availability: u32,
    open: u32,
    invoke: u32,
    stream_invoke: u32,
    destroy: u32,
}

/// State shared between a mock capability and its open sessions.
#[derive(Debug, Default)]
struct MockState {
    call_counts: RwLock<CallCounts>,
    last_options: RwLock<Option<OpenOptions>>,
    last_input: RwLock<Option<String>>,
}

// ─────────────────────────────────────────────────────────────────
// Mock Capability
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of `Capability` for any variant.
pub struct MockCapability {
    kind: CapabilityKind,
    config: MockConfig,
    state: Arc<MockState>,
}

impl MockCapability {
    /// Create a mock capability of the given kind with defaults.
    pub fn new(kind: CapabilityKind) -> Self {
        Self::with_config(kind, MockConfig::default())
    }

    /// Create a mock capability with custom configuration.
    pub fn with_config(kind: CapabilityKind, config: MockConfig) -> Self {
        Self {
            kind,
            config,
            state: Arc::new(MockState::default()),
        }
    }

    /// Get the number of times a method was called, across the
    /// capability and all sessions it opened.
    pub fn call_count(&self, method: &str) -> u32 {
        let counts = self.state.call_counts.read();
        match method {
            "availability" => counts.availability,
            "open" => counts.open,
            "invoke" => counts.invoke,
            "stream_invoke" => counts.stream_invoke,
            "destroy" => counts.destroy,
            _ => 0,
        }
    }

    /// Reset all call counts.
    pub fn reset_counts(&self) {
        *self.state.call_counts.write() = CallCounts::default();
    }

    /// Options passed to the most recent `open`.
    pub fn last_options(&self) -> Option<OpenOptions> {
        self.state.last_options.read().clone()
    }

    /// Input passed to the most recent invocation.
    pub fn last_input(&self) -> Option<String> {
        self.state.last_input.read().clone()
    }

    /// Availability after accounting for the translator language pair.
    fn resolve_availability(&self, options: &OpenOptions) -> Availability {
        if self.kind == CapabilityKind::Translator {
            if let Some((src, tgt)) = options.language_pair() {
                let supported = self
                    .config
                    .supported_pairs
                    .iter()
                    .any(|(s, t)| s == src && t == tgt);
                if !supported {
                    return Availability::Unavailable;
                }
            }
        }
        self.config.availability
    }
}

#[async_trait]
impl Capability for MockCapability {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    fn provider(&self) -> &str {
        "mock"
    }

    async fn availability(&self, options: &OpenOptions) -> Result<Availability> {
        self.state.call_counts.write().availability += 1;
        Ok(self.resolve_availability(options))
    }

    async fn open(
        &self,
        options: OpenOptions,
        progress: Option<ProgressCallback>,
    ) -> Result<Box<dyn CapabilitySession>> {
        self.state.call_counts.write().open += 1;
        *self.state.last_options.write() = Some(options.clone());

        if self.config.fail_on_open {
            return Err(Error::creation_failure(
                self.kind.display_name(),
                "Mock open failure",
            ));
        }

        let availability = self.resolve_availability(&options);
        if !availability.is_usable() {
            return Err(Error::unavailable(self.kind.display_name()));
        }

        // Simulate the model download, reporting progress along the way.
        if availability.needs_download() {
            let total = self.config.download_total_bytes;
            let steps = self.config.download_steps.max(1) as u64;
            for step in 1..=steps {
                if self.config.chunk_latency_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.chunk_latency_ms)).await;
                }
                if let Some(ref callback) = progress {
                    callback(DownloadProgress {
                        loaded: total * step / steps,
                        total,
                    });
                }
            }
        }

        Ok(Box::new(MockSession {
            kind: self.kind,
            config: self.config.clone(),
            options,
            state: Arc::clone(&self.state),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Session
// ─────────────────────────────────────────────────────────────────

struct MockSession {
    kind: CapabilityKind,
    config: MockConfig,
    options: OpenOptions,
    state: Arc<MockState>,
}

impl MockSession {
    /// Generate deterministic response text for a streamed invocation.
    fn generate_response(&self, input: &str) -> String {
        if let Some(ref fixed) = self.config.fixed_response {
            return fixed.clone();
        }

        let response_words = [
            "The", "selected", "text", "describes", "a", "process", "where", "several",
            "components", "interact", "over", "time,", "and", "the", "key", "idea", "is", "how",
            "information", "flows", "between", "them.",
        ];

        let max_words = match self.options.length {
            SummaryLength::Short => 8,
            SummaryLength::Medium => 16,
            SummaryLength::Long => response_words.len(),
        };

        let body = response_words
            .iter()
            .cycle()
            .take(max_words.min(response_words.len()))
            .cloned()
            .collect::<Vec<_>>()
            .join(" ");

        match self.kind {
            CapabilityKind::Summarizer => {
                format!("**Summary** ({} chars of input): {}", input.len(), body)
            }
            _ => body,
        }
    }

    /// Pseudo-translation for the mock translator.
    fn translate(&self, input: &str) -> String {
        if let Some(ref fixed) = self.config.fixed_response {
            return fixed.clone();
        }
        let target = self
            .options
            .target_language
            .as_deref()
            .unwrap_or("und");
        format!("[{}] {}", target, input)
    }

    /// Ranked mock detections; scores fall off by rank.
    fn detect(&self, _input: &str) -> Vec<LanguageDetection> {
        let tags = match self.config.fixed_response {
            Some(ref fixed) => vec![fixed.as_str(), "en", "es"],
            None => vec!["en", "es", "fr"],
        };
        tags.iter()
            .enumerate()
            .map(|(i, tag)| LanguageDetection {
                detected_language: tag.to_string(),
                confidence: 0.9 / (i as f64 + 1.0),
            })
            .collect()
    }
}

#[async_trait]
impl CapabilitySession for MockSession {
    fn kind(&self) -> CapabilityKind {
        self.kind
    }

    async fn invoke(&self, input: &str) -> Result<InvokeOutput> {
        self.state.call_counts.write().invoke += 1;
        *self.state.last_input.write() = Some(input.to_string());

        if self.config.fail_on_invoke {
            return Err(Error::stream_failure("Mock invoke failure"));
        }

        match self.kind {
            CapabilityKind::Translator => Ok(InvokeOutput::text(self.translate(input))),
            CapabilityKind::LanguageDetector => Ok(InvokeOutput::Detections {
                detections: self.detect(input),
            }),
            kind => Err(Error::NotSupported(format!(
                "{} does not support single-shot invocation",
                kind
            ))),
        }
    }

    async fn stream_invoke(&self, input: &str, callback: ChunkCallback) -> Result<StreamStats> {
        self.state.call_counts.write().stream_invoke += 1;
        *self.state.last_input.write() = Some(input.to_string());

        if !self.kind.is_streaming() {
            return Err(Error::NotSupported(format!(
                "{} does not support streaming invocation",
                self.kind
            )));
        }

        if self.config.fail_on_invoke {
            return Err(Error::stream_failure("Mock stream failure"));
        }

        let start = Instant::now();
        let text = self.generate_response(input);
        let words: Vec<&str> = text.split_whitespace().collect();
        let chunk_words = self.config.words_per_chunk.max(1);

        let mut stats = StreamStats::default();
        let mut emitted = String::new();

        let groups: Vec<String> = words
            .chunks(chunk_words)
            .map(|group| group.join(" "))
            .collect();

        for (i, group) in groups.iter().enumerate() {
            if let Some(limit) = self.config.fail_after_chunks {
                if stats.chunks_emitted >= limit {
                    return Err(Error::stream_failure("Mock mid-stream failure"));
                }
            }

            let delta = if i == 0 {
                group.clone()
            } else {
                format!(" {}", group)
            };
            emitted.push_str(&delta);

            let is_final = i == groups.len() - 1;
            let chunk = if self.config.cumulative_chunks {
                StreamChunk {
                    text: emitted.clone(),
                    is_final,
                }
            } else {
                StreamChunk {
                    text: delta.clone(),
                    is_final,
                }
            };

            stats.chunks_emitted += 1;
            stats.chars_emitted += delta.len();

            // If the callback returns false, stop producing.
            if !callback(chunk) {
                stats.stopped_early = true;
                break;
            }

            if self.config.chunk_latency_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.chunk_latency_ms)).await;
            }
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    async fn destroy(&mut self) -> Result<()> {
        self.state.call_counts.write().destroy += 1;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_availability_default_is_available() {
        let capability = MockCapability::new(CapabilityKind::Summarizer);
        let availability = capability
            .availability(&OpenOptions::default())
            .await
            .unwrap();
        assert_eq!(availability, Availability::Available);
        assert_eq!(capability.call_count("availability"), 1);
    }

    #[tokio::test]
    async fn test_open_unavailable_fails() {
        let config = MockConfig {
            availability: Availability::Unavailable,
            ..Default::default()
        };
        let capability = MockCapability::with_config(CapabilityKind::Summarizer, config);
        let result = capability.open(OpenOptions::default(), None).await;
        assert!(matches!(result, Err(Error::Unavailable { .. })));
    }

    #[tokio::test]
    async fn test_open_records_options() {
        let capability = MockCapability::new(CapabilityKind::Summarizer);
        let options = OpenOptions::summarizer("explain like a pirate");
        capability.open(options, None).await.unwrap();
        assert_eq!(
            capability.last_options().unwrap().shared_context,
            "explain like a pirate"
        );
    }

    #[tokio::test]
    async fn test_download_reports_progress() {
        let config = MockConfig {
            availability: Availability::Downloadable,
            download_total_bytes: 1000,
            download_steps: 4,
            ..Default::default()
        };
        let capability = MockCapability::with_config(CapabilityKind::Summarizer, config);

        let reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let progress: ProgressCallback = Box::new(move |p| sink.lock().push(p));

        capability
            .open(OpenOptions::default(), Some(progress))
            .await
            .unwrap();

        let reports = reports.lock();
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[0].loaded, 250);
        assert_eq!(reports[3].loaded, 1000);
        assert!(reports.iter().all(|p| p.total == 1000));
    }

    #[tokio::test]
    async fn test_stream_delivers_final_chunk() {
        let capability = MockCapability::new(CapabilityKind::Summarizer);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        let stats = session
            .stream_invoke(
                "some selected text",
                Box::new(move |chunk| {
                    sink.lock().push(chunk);
                    true
                }),
            )
            .await
            .unwrap();

        let chunks = chunks.lock();
        assert!(!chunks.is_empty());
        assert!(chunks.last().unwrap().is_final);
        assert!(chunks[..chunks.len() - 1].iter().all(|c| !c.is_final));
        assert_eq!(stats.chunks_emitted, chunks.len());
        assert!(!stats.stopped_early);
    }

    #[tokio::test]
    async fn test_stream_reassembles_to_full_text() {
        let config = MockConfig {
            fixed_response: Some("alpha beta gamma delta epsilon".to_string()),
            words_per_chunk: 2,
            ..Default::default()
        };
        let capability = MockCapability::with_config(CapabilityKind::Summarizer, config);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();

        let assembled = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&assembled);
        session
            .stream_invoke(
                "input",
                Box::new(move |chunk| {
                    sink.lock().push_str(&chunk.text);
                    true
                }),
            )
            .await
            .unwrap();

        assert_eq!(*assembled.lock(), "alpha beta gamma delta epsilon");
    }

    #[tokio::test]
    async fn test_callback_false_stops_stream() {
        let config = MockConfig {
            fixed_response: Some("one two three four five six".to_string()),
            words_per_chunk: 1,
            ..Default::default()
        };
        let capability = MockCapability::with_config(CapabilityKind::Summarizer, config);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();

        let stats = session
            .stream_invoke("input", Box::new(|_chunk| false))
            .await
            .unwrap();

        assert!(stats.stopped_early);
        assert_eq!(stats.chunks_emitted, 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure() {
        let config = MockConfig {
            fixed_response: Some("one two three four five six".to_string()),
            words_per_chunk: 1,
            fail_after_chunks: Some(2),
            ..Default::default()
        };
        let capability = MockCapability::with_config(CapabilityKind::Summarizer, config);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();

        let delivered = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&delivered);
        let result = session
            .stream_invoke(
                "input",
                Box::new(move |_chunk| {
                    *counter.lock() += 1;
                    true
                }),
            )
            .await;

        assert!(matches!(result, Err(Error::StreamFailure { .. })));
        assert_eq!(*delivered.lock(), 2);
    }

    #[tokio::test]
    async fn test_cumulative_chunks_mode() {
        let config = MockConfig {
            fixed_response: Some("a b c".to_string()),
            words_per_chunk: 1,
            cumulative_chunks: true,
            ..Default::default()
        };
        let capability = MockCapability::with_config(CapabilityKind::PromptSession, config);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&chunks);
        session
            .stream_invoke(
                "question",
                Box::new(move |chunk| {
                    sink.lock().push(chunk.text);
                    true
                }),
            )
            .await
            .unwrap();

        assert_eq!(*chunks.lock(), vec!["a", "a b", "a b c"]);
    }

    #[tokio::test]
    async fn test_translator_invoke() {
        let capability = MockCapability::new(CapabilityKind::Translator);
        let session = capability
            .open(OpenOptions::translator("en", "es"), None)
            .await
            .unwrap();

        let output = session.invoke("hello world").await.unwrap();
        assert_eq!(output.into_text().unwrap(), "[es] hello world");
        assert_eq!(capability.last_input().unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_translator_unsupported_pair() {
        let capability = MockCapability::new(CapabilityKind::Translator);
        let options = OpenOptions::translator("tlh", "en");
        let availability = capability.availability(&options).await.unwrap();
        assert_eq!(availability, Availability::Unavailable);
        assert!(matches!(
            capability.open(options, None).await,
            Err(Error::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_detector_ranked_output() {
        let capability = MockCapability::new(CapabilityKind::LanguageDetector);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();

        let output = session.invoke("bonjour le monde").await.unwrap();
        let top = output.top_detection().unwrap().clone();
        assert_eq!(top.detected_language, "en");
        if let InvokeOutput::Detections { detections } = output {
            for pair in detections.windows(2) {
                assert!(pair[0].confidence >= pair[1].confidence);
            }
        }
    }

    #[tokio::test]
    async fn test_streaming_kind_rejects_invoke() {
        let capability = MockCapability::new(CapabilityKind::Summarizer);
        let session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();
        assert!(matches!(
            session.invoke("text").await,
            Err(Error::NotSupported(_))
        ));
    }

    #[tokio::test]
    async fn test_call_counts_shared_with_sessions() {
        let capability = MockCapability::new(CapabilityKind::Summarizer);
        let mut session = capability
            .open(OpenOptions::default(), None)
            .await
            .unwrap();
        session
            .stream_invoke("input", Box::new(|_chunk| true))
            .await
            .unwrap();
        session.destroy().await.unwrap();

        assert_eq!(capability.call_count("open"), 1);
        assert_eq!(capability.call_count("stream_invoke"), 1);
        assert_eq!(capability.call_count("destroy"), 1);
        assert_eq!(capability.call_count("unknown"), 0);
    }
}
