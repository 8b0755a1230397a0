//! Capability variants, availability states, and open options.
//!
//! The four platform capability variants share one interface shape:
//! availability-check, open-with-options, and invoke or stream-invoke.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────
// Capability Kind
// ─────────────────────────────────────────────────────────────────

/// The four capability variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapabilityKind {
    /// Streaming summarization of a text selection.
    Summarizer,
    /// Single-shot translation between a language pair.
    Translator,
    /// Single-shot ranked language detection.
    LanguageDetector,
    /// Streaming conversational prompting.
    PromptSession,
}

impl CapabilityKind {
    /// Slug used in config files and CLI args.
    pub fn slug(&self) -> &'static str {
        match self {
            CapabilityKind::Summarizer => "summarizer",
            CapabilityKind::Translator => "translator",
            CapabilityKind::LanguageDetector => "language-detector",
            CapabilityKind::PromptSession => "prompt-session",
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            CapabilityKind::Summarizer => "Summarizer",
            CapabilityKind::Translator => "Translator",
            CapabilityKind::LanguageDetector => "Language Detector",
            CapabilityKind::PromptSession => "Prompt Session",
        }
    }

    /// All capability kinds.
    pub fn all() -> &'static [CapabilityKind] {
        &[
            CapabilityKind::Summarizer,
            CapabilityKind::Translator,
            CapabilityKind::LanguageDetector,
            CapabilityKind::PromptSession,
        ]
    }

    /// Whether sessions of this kind produce a lazy chunk sequence.
    pub fn is_streaming(&self) -> bool {
        matches!(
            self,
            CapabilityKind::Summarizer | CapabilityKind::PromptSession
        )
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summarizer" => Ok(CapabilityKind::Summarizer),
            "translator" => Ok(CapabilityKind::Translator),
            "language-detector" | "language_detector" | "detector" => {
                Ok(CapabilityKind::LanguageDetector)
            }
            "prompt-session" | "prompt_session" | "prompt" => Ok(CapabilityKind::PromptSession),
            _ => Err(format!(
                "Unknown capability '{}'. Valid: summarizer, translator, language-detector, prompt-session",
                s
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Availability
// ─────────────────────────────────────────────────────────────────

/// Readiness of a capability on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Cannot run here at all.
    Unavailable,
    /// Usable after a model download.
    Downloadable,
    /// Download already in flight.
    Downloading,
    /// Ready to open immediately.
    Available,
}

impl Availability {
    /// Whether opening must wait for a model download.
    pub fn needs_download(&self) -> bool {
        matches!(self, Availability::Downloadable | Availability::Downloading)
    }

    /// Whether the capability can be opened at all.
    pub fn is_usable(&self) -> bool {
        !matches!(self, Availability::Unavailable)
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Availability::Unavailable => "unavailable",
            Availability::Downloadable => "downloadable",
            Availability::Downloading => "downloading",
            Availability::Available => "available",
        };
        write!(f, "{}", s)
    }
}

// ─────────────────────────────────────────────────────────────────
// Summarizer Options
// ─────────────────────────────────────────────────────────────────

/// Summary style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryType {
    #[default]
    Tldr,
    KeyPoints,
    Teaser,
    Headline,
}

/// Output format of generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryFormat {
    #[default]
    Markdown,
    PlainText,
}

/// Target summary length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryLength {
    Short,
    #[default]
    Medium,
    Long,
}

// ─────────────────────────────────────────────────────────────────
// Open Options
// ─────────────────────────────────────────────────────────────────

/// Options handed to `Capability::open`.
///
/// One bag covers all four variants; each implementation reads the fields
/// that apply to it and ignores the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Instruction steering the register of generated text.
    #[serde(default)]
    pub shared_context: String,

    /// Summarizer: summary style.
    #[serde(default)]
    pub summary_type: SummaryType,

    /// Summarizer: output format.
    #[serde(default)]
    pub format: SummaryFormat,

    /// Summarizer: target length.
    #[serde(default)]
    pub length: SummaryLength,

    /// Translator: source language (BCP 47 tag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,

    /// Translator: target language (BCP 47 tag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_language: Option<String>,

    /// Prompt session: sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Prompt session: top-k sampling cutoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl OpenOptions {
    /// Options for a summarizer session under the given instruction.
    pub fn summarizer(shared_context: impl Into<String>) -> Self {
        Self {
            shared_context: shared_context.into(),
            ..Default::default()
        }
    }

    /// Options for a translator session over a language pair.
    pub fn translator(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_language: Some(source.into()),
            target_language: Some(target.into()),
            ..Default::default()
        }
    }

    /// Options for a prompt session with a system instruction.
    pub fn prompt(shared_context: impl Into<String>) -> Self {
        Self {
            shared_context: shared_context.into(),
            ..Default::default()
        }
    }

    /// The translator language pair, if both ends are set.
    pub fn language_pair(&self) -> Option<(&str, &str)> {
        match (&self.source_language, &self.target_language) {
            (Some(src), Some(tgt)) => Some((src.as_str(), tgt.as_str())),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Invocation Output
// ─────────────────────────────────────────────────────────────────

/// One ranked language detection result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageDetection {
    /// BCP 47 tag of the detected language.
    pub detected_language: String,
    /// Confidence in [0, 1].
    pub confidence: f64,
}

impl LanguageDetection {
    /// One-line presentation with the confidence as a percentage.
    pub fn display_line(&self) -> String {
        format!("{} ({:.1}%)", self.detected_language, self.confidence * 100.0)
    }
}

/// Output of a single-shot capability invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvokeOutput {
    /// Plain text result (translation).
    Text { text: String },
    /// Ranked detection results, most confident first.
    Detections { detections: Vec<LanguageDetection> },
}

impl InvokeOutput {
    /// Wrap a plain text result.
    pub fn text(text: impl Into<String>) -> Self {
        InvokeOutput::Text { text: text.into() }
    }

    /// Extract the text result, if this is one.
    pub fn into_text(self) -> Option<String> {
        match self {
            InvokeOutput::Text { text } => Some(text),
            InvokeOutput::Detections { .. } => None,
        }
    }

    /// The most confident detection, if this is a detection result.
    pub fn top_detection(&self) -> Option<&LanguageDetection> {
        match self {
            InvokeOutput::Detections { detections } => detections.first(),
            InvokeOutput::Text { .. } => None,
        }
    }
}

/// Model download progress forwarded while a capability readies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// Bytes fetched so far.
    pub loaded: u64,
    /// Total bytes expected.
    pub total: u64,
}

impl DownloadProgress {
    /// Completion percentage, clamped to [0, 100].
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.loaded.saturating_mul(100)) / self.total).min(100) as u8
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_slugs() {
        assert_eq!(CapabilityKind::Summarizer.slug(), "summarizer");
        assert_eq!(CapabilityKind::LanguageDetector.slug(), "language-detector");
        assert_eq!(CapabilityKind::PromptSession.slug(), "prompt-session");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            "summarizer".parse::<CapabilityKind>().unwrap(),
            CapabilityKind::Summarizer
        );
        assert_eq!(
            "detector".parse::<CapabilityKind>().unwrap(),
            CapabilityKind::LanguageDetector
        );
        assert_eq!(
            "PROMPT".parse::<CapabilityKind>().unwrap(),
            CapabilityKind::PromptSession
        );
        assert!("chatbot".parse::<CapabilityKind>().is_err());
    }

    #[test]
    fn test_kind_streaming() {
        assert!(CapabilityKind::Summarizer.is_streaming());
        assert!(CapabilityKind::PromptSession.is_streaming());
        assert!(!CapabilityKind::Translator.is_streaming());
        assert!(!CapabilityKind::LanguageDetector.is_streaming());
    }

    #[test]
    fn test_availability_states() {
        assert!(!Availability::Unavailable.is_usable());
        assert!(Availability::Downloadable.is_usable());
        assert!(Availability::Downloadable.needs_download());
        assert!(Availability::Downloading.needs_download());
        assert!(!Availability::Available.needs_download());
    }

    #[test]
    fn test_availability_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Availability::Downloadable).unwrap(),
            "\"downloadable\""
        );
        let parsed: Availability = serde_json::from_str("\"available\"").unwrap();
        assert_eq!(parsed, Availability::Available);
    }

    #[test]
    fn test_summary_option_defaults() {
        let options = OpenOptions::summarizer("formal register");
        assert_eq!(options.summary_type, SummaryType::Tldr);
        assert_eq!(options.format, SummaryFormat::Markdown);
        assert_eq!(options.length, SummaryLength::Medium);
        assert_eq!(options.shared_context, "formal register");
    }

    #[test]
    fn test_summary_option_serde_values() {
        assert_eq!(
            serde_json::to_string(&SummaryFormat::PlainText).unwrap(),
            "\"plain-text\""
        );
        assert_eq!(
            serde_json::to_string(&SummaryType::KeyPoints).unwrap(),
            "\"key-points\""
        );
    }

    #[test]
    fn test_language_pair() {
        let options = OpenOptions::translator("en", "es");
        assert_eq!(options.language_pair(), Some(("en", "es")));
        assert!(OpenOptions::default().language_pair().is_none());
    }

    #[test]
    fn test_invoke_output_accessors() {
        let text = InvokeOutput::text("hola");
        assert_eq!(text.clone().into_text().unwrap(), "hola");
        assert!(text.top_detection().is_none());

        let detections = InvokeOutput::Detections {
            detections: vec![
                LanguageDetection {
                    detected_language: "en".to_string(),
                    confidence: 0.92,
                },
                LanguageDetection {
                    detected_language: "de".to_string(),
                    confidence: 0.03,
                },
            ],
        };
        assert_eq!(
            detections.top_detection().unwrap().detected_language,
            "en"
        );
        assert!(detections.into_text().is_none());
    }

    #[test]
    fn test_detection_display_line() {
        let detection = LanguageDetection {
            detected_language: "fr".to_string(),
            confidence: 0.872,
        };
        assert_eq!(detection.display_line(), "fr (87.2%)");
    }

    #[test]
    fn test_download_progress_percent() {
        let progress = DownloadProgress {
            loaded: 512,
            total: 2048,
        };
        assert_eq!(progress.percent(), 25);
        assert_eq!(DownloadProgress { loaded: 0, total: 0 }.percent(), 0);
        assert_eq!(
            DownloadProgress {
                loaded: 4096,
                total: 2048
            }
            .percent(),
            100
        );
    }
}
