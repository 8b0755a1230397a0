//! Relay task: trigger handling and streaming session execution.
//!
//! The relay runs as one spawned task driven by a command channel. Each
//! trigger reads the current persona, allocates a session, and spawns the
//! session body; capability chunks flow back to the UI consumer through an
//! unbounded envelope channel that preserves per-sender order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::capability::{
    CapabilityKind, CapabilityRegistry, CapabilitySession, ChunkCallback, CumulativeDelta,
    InvokeOutput, OpenOptions, ProgressCallback, SummaryFormat, SummaryLength, SummaryType,
};
use crate::error::{Error, Result};
use crate::persona::{PersonaLevel, PersonaStore};
use crate::protocol::{Message, MessageEnvelope};

use super::state::{RelayPhase, RelayStatus, SessionTracker};

/// Ended sessions kept in the tracker for status queries.
const RETAINED_SESSIONS: usize = 16;

// ─────────────────────────────────────────────────────────────────
// Relay Options
// ─────────────────────────────────────────────────────────────────

/// Configuration for the relay task.
#[derive(Debug, Clone)]
pub struct RelayOptions {
    /// Pause before a session starts, covering the UI surface opening.
    pub panel_open_delay_ms: u64,

    /// Selections longer than this log a warning.
    pub max_input_chars: usize,

    /// Command channel capacity.
    pub queue_size: usize,

    /// Whether a new trigger cancels the superseded session.
    pub cancel_superseded: bool,

    /// Summarizer style options applied to every summary session.
    pub summary_type: SummaryType,
    pub summary_format: SummaryFormat,
    pub summary_length: SummaryLength,

    /// Sampling options applied to every prompt session.
    pub prompt_temperature: Option<f32>,
    pub prompt_top_k: Option<u32>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self {
            panel_open_delay_ms: 500,
            max_input_chars: 4000,
            queue_size: 64,
            cancel_superseded: true,
            summary_type: SummaryType::default(),
            summary_format: SummaryFormat::default(),
            summary_length: SummaryLength::default(),
            prompt_temperature: None,
            prompt_top_k: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Command Channel
// ─────────────────────────────────────────────────────────────────

/// Commands accepted by the relay task.
#[derive(Debug)]
pub enum RelayCommand {
    /// A user trigger over selected text.
    Trigger {
        kind: CapabilityKind,
        input: String,
        languages: Option<(String, String)>,
    },

    /// An envelope arriving from the UI side (SET_LEVEL and friends).
    Deliver(MessageEnvelope),

    /// Snapshot the relay's state.
    GetStatus(oneshot::Sender<RelayStatus>),

    /// Stop the relay loop.
    Shutdown,
}

/// Cloneable handle for driving the relay.
#[derive(Clone)]
pub struct RelayHandle {
    command_tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Trigger a streaming session over the given input.
    pub async fn trigger(&self, kind: CapabilityKind, input: impl Into<String>) -> Result<()> {
        self.send(RelayCommand::Trigger {
            kind,
            input: input.into(),
            languages: None,
        })
        .await
    }

    /// Trigger a translation session over a language pair.
    pub async fn trigger_translation(
        &self,
        input: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<()> {
        self.send(RelayCommand::Trigger {
            kind: CapabilityKind::Translator,
            input: input.into(),
            languages: Some((source.into(), target.into())),
        })
        .await
    }

    /// Deliver a UI-originated envelope to the relay.
    pub async fn deliver(&self, envelope: MessageEnvelope) -> Result<()> {
        self.send(RelayCommand::Deliver(envelope)).await
    }

    /// Query the relay's current status.
    pub async fn status(&self) -> Result<RelayStatus> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RelayCommand::GetStatus(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| Error::Internal("Relay dropped a status request".to_string()))
    }

    /// Ask the relay to stop.
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(RelayCommand::Shutdown).await;
    }

    async fn send(&self, command: RelayCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| Error::Internal("Relay command channel closed".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────
// Relay Task
// ─────────────────────────────────────────────────────────────────

/// The background relay.
pub struct Relay {
    options: RelayOptions,
    registry: Arc<CapabilityRegistry>,
    personas: Arc<PersonaStore>,
    tracker: Arc<SessionTracker>,
    ui_tx: mpsc::UnboundedSender<MessageEnvelope>,
    command_rx: mpsc::Receiver<RelayCommand>,
}

/// Everything a spawned session body needs from the relay.
struct SessionContext {
    options: RelayOptions,
    registry: Arc<CapabilityRegistry>,
    tracker: Arc<SessionTracker>,
    ui_tx: mpsc::UnboundedSender<MessageEnvelope>,
}

/// One trigger, resolved against the persona current at its start.
struct SessionRequest {
    kind: CapabilityKind,
    input: String,
    languages: Option<(String, String)>,
    persona: PersonaLevel,
}

impl Relay {
    /// Create the relay, its command handle, and the UI-bound envelope
    /// stream.
    pub fn new(
        options: RelayOptions,
        registry: Arc<CapabilityRegistry>,
        personas: Arc<PersonaStore>,
    ) -> (
        Self,
        RelayHandle,
        mpsc::UnboundedReceiver<MessageEnvelope>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(options.queue_size);
        let (ui_tx, ui_rx) = mpsc::unbounded_channel();
        let tracker = Arc::new(SessionTracker::new(options.cancel_superseded));

        (
            Self {
                options,
                registry,
                personas,
                tracker,
                ui_tx,
                command_rx,
            },
            RelayHandle { command_tx },
            ui_rx,
        )
    }

    /// Shared view of the session tracker.
    pub fn tracker(&self) -> Arc<SessionTracker> {
        Arc::clone(&self.tracker)
    }

    /// Run the relay until shutdown or channel closure.
    pub async fn run(mut self) {
        info!("Relay started");

        while let Some(command) = self.command_rx.recv().await {
            match command {
                RelayCommand::Trigger {
                    kind,
                    input,
                    languages,
                } => self.start_session(kind, input, languages),
                RelayCommand::Deliver(envelope) => self.handle_envelope(envelope),
                RelayCommand::GetStatus(reply) => {
                    let _ = reply.send(self.tracker.status());
                }
                RelayCommand::Shutdown => {
                    self.tracker.cancel_current();
                    break;
                }
            }
        }

        info!(
            completed = self.tracker.total_completed(),
            failed = self.tracker.total_failed(),
            cancelled = self.tracker.total_cancelled(),
            "Relay stopped"
        );
    }

    /// Handle an envelope sent from the UI side.
    fn handle_envelope(&self, envelope: MessageEnvelope) {
        match envelope.payload {
            Message::SetLevel { level } => {
                // Storage failures are logged, never user-visible.
                if let Err(e) = self.personas.save_current(&level) {
                    warn!(error = %e, level = level.level, "Failed to persist level selection");
                } else {
                    info!(level = level.level, name = %level.name, "Persona level updated");
                }
            }
            other => {
                warn!(
                    message_type = other.type_name(),
                    "Ignoring message not addressed to the relay"
                );
            }
        }
    }

    /// Allocate a session for a trigger and spawn its body.
    fn start_session(
        &self,
        kind: CapabilityKind,
        input: String,
        languages: Option<(String, String)>,
    ) {
        let chars = input.chars().count();
        if chars > self.options.max_input_chars {
            warn!(
                chars,
                max = self.options.max_input_chars,
                "Selection exceeds the model input limit"
            );
        }

        // The persona is read once here; a change mid-stream does not
        // affect this session.
        let persona = self.personas.load_current();
        let (id, cancel) = self.tracker.begin(kind, persona.level);

        info!(
            session = id,
            capability = %kind,
            level = persona.level,
            chars,
            "Session started"
        );

        let context = SessionContext {
            options: self.options.clone(),
            registry: Arc::clone(&self.registry),
            tracker: Arc::clone(&self.tracker),
            ui_tx: self.ui_tx.clone(),
        };
        let request = SessionRequest {
            kind,
            input,
            languages,
            persona,
        };

        tokio::spawn(run_session(context, request, id, cancel));
    }
}

// ─────────────────────────────────────────────────────────────────
// Session Execution
// ─────────────────────────────────────────────────────────────────

/// Execute one streaming session end to end.
async fn run_session(
    context: SessionContext,
    request: SessionRequest,
    id: u64,
    cancel: Arc<AtomicBool>,
) {
    let level = request.persona.level;
    context.tracker.set_phase(id, RelayPhase::AvailabilityCheck);

    let outcome = drive_session(&context, &request, id, &cancel).await;
    let cancelled = cancel.load(Ordering::Relaxed);

    match outcome {
        Ok(()) if !cancelled => {
            context.tracker.mark_completed(id);
            send_to_ui(&context, id, level, Message::StreamComplete);
            info!(
                session = id,
                chunks = context.tracker.chunks_relayed(id),
                duration_ms = context.tracker.session_duration_ms(id),
                "Session completed"
            );
        }
        Ok(()) => {
            debug!(session = id, "Session stopped after cancellation");
        }
        Err(e) if !cancelled => {
            error!(session = id, error = %e, code = %e.code().as_str(), "Session failed");
            context.tracker.mark_failed(id, e.to_string());
            send_to_ui(&context, id, level, Message::from_error(&e));
        }
        Err(e) => {
            debug!(session = id, error = %e, "Error from cancelled session suppressed");
        }
    }

    context.tracker.set_phase(id, RelayPhase::Idle);
    context.tracker.cleanup_old_sessions(RETAINED_SESSIONS);
}

/// Availability check, open, and invocation for one session.
async fn drive_session(
    context: &SessionContext,
    request: &SessionRequest,
    id: u64,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    // The original pauses before opening its UI surface; modeled as a
    // configurable delay at session start.
    if context.options.panel_open_delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(context.options.panel_open_delay_ms)).await;
    }
    if cancel.load(Ordering::Relaxed) {
        return Ok(());
    }

    let capability = context.registry.require(request.kind)?;
    let open_options = compose_options(&context.options, request);

    let availability = capability.availability(&open_options).await?;
    debug!(session = id, availability = %availability, "Availability checked");

    if !availability.is_usable() {
        return Err(Error::unavailable(request.kind.display_name()));
    }

    // Download progress goes straight to the UI as AI_INITIATE traffic.
    let needs_download = availability.needs_download();
    let progress: Option<ProgressCallback> = if needs_download {
        context.tracker.set_phase(id, RelayPhase::AwaitingDownload);
        let ui_tx = context.ui_tx.clone();
        let level = request.persona.level;
        Some(Box::new(move |p| {
            let envelope = MessageEnvelope::for_session(
                id,
                level,
                Message::AiInitiate {
                    loaded: p.loaded,
                    total: p.total,
                },
            );
            let _ = ui_tx.send(envelope);
        }))
    } else {
        None
    };

    let mut session = capability.open(open_options, progress).await?;

    if cancel.load(Ordering::Relaxed) {
        let _ = session.destroy().await;
        return Ok(());
    }

    context.tracker.set_phase(id, RelayPhase::Ready);
    if needs_download {
        send_to_ui(context, id, request.persona.level, Message::AiReady);
    }

    let result = if request.kind.is_streaming() {
        stream_session(context, session.as_ref(), request, id, cancel).await
    } else {
        invoke_session(context, session.as_ref(), request, id, cancel).await
    };

    if let Err(e) = session.destroy().await {
        warn!(session = id, error = %e, "Session handle destroy failed");
    }

    result
}

/// Forward a capability's chunk stream to the UI.
async fn stream_session(
    context: &SessionContext,
    session: &dyn CapabilitySession,
    request: &SessionRequest,
    id: u64,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let level = request.persona.level;
    context.tracker.mark_streaming(id);
    context.tracker.set_phase(id, RelayPhase::Streaming);
    send_to_ui(context, id, level, Message::first_marker());

    let ui_tx = context.ui_tx.clone();
    let tracker = Arc::clone(&context.tracker);
    let cancel = Arc::clone(cancel);

    // Prompt providers may stream cumulatively; normalize to deltas.
    let normalizer = Mutex::new(if request.kind == CapabilityKind::PromptSession {
        Some(CumulativeDelta::new())
    } else {
        None
    });

    let callback: ChunkCallback = Box::new(move |chunk| {
        if cancel.load(Ordering::Relaxed) {
            return false;
        }

        let text = match normalizer.lock().as_mut() {
            Some(normalizer) => normalizer.delta(&chunk.text),
            None => chunk.text,
        };
        if text.is_empty() {
            return true;
        }

        let envelope = MessageEnvelope::for_session(id, level, Message::chunk(text));
        if ui_tx.send(envelope).is_err() {
            // UI side gone; stop producing.
            return false;
        }
        tracker.record_chunk(id);
        true
    });

    let stats = session.stream_invoke(&request.input, callback).await?;
    debug!(
        session = id,
        chunks = stats.chunks_emitted,
        duration_ms = stats.duration_ms,
        stopped_early = stats.stopped_early,
        "Stream finished"
    );
    Ok(())
}

/// Run a single-shot invocation and relay the result as one chunk.
async fn invoke_session(
    context: &SessionContext,
    session: &dyn CapabilitySession,
    request: &SessionRequest,
    id: u64,
    cancel: &Arc<AtomicBool>,
) -> Result<()> {
    let level = request.persona.level;
    context.tracker.mark_streaming(id);
    context.tracker.set_phase(id, RelayPhase::Streaming);
    send_to_ui(context, id, level, Message::first_marker());

    let output = session.invoke(&request.input).await?;
    if cancel.load(Ordering::Relaxed) {
        return Ok(());
    }

    let text = match output {
        InvokeOutput::Text { text } => text,
        InvokeOutput::Detections { detections } => detections
            .iter()
            .enumerate()
            .map(|(i, detection)| format!("{}. {}", i + 1, detection.display_line()))
            .collect::<Vec<_>>()
            .join("\n"),
    };

    send_to_ui(context, id, level, Message::chunk(text));
    context.tracker.record_chunk(id);
    Ok(())
}

/// Compose capability open options from the persona and relay settings.
fn compose_options(options: &RelayOptions, request: &SessionRequest) -> OpenOptions {
    match request.kind {
        CapabilityKind::Summarizer => OpenOptions {
            shared_context: request.persona.shared_context(),
            summary_type: options.summary_type,
            format: options.summary_format,
            length: options.summary_length,
            ..Default::default()
        },
        CapabilityKind::PromptSession => {
            let mut open = OpenOptions::prompt(request.persona.shared_context());
            open.temperature = options.prompt_temperature;
            open.top_k = options.prompt_top_k;
            open
        }
        CapabilityKind::Translator => match &request.languages {
            Some((source, target)) => OpenOptions::translator(source.clone(), target.clone()),
            None => OpenOptions::default(),
        },
        CapabilityKind::LanguageDetector => OpenOptions::default(),
    }
}

fn send_to_ui(context: &SessionContext, id: u64, level: u32, message: Message) {
    let envelope = MessageEnvelope::for_session(id, level, message);
    if context.ui_tx.send(envelope).is_err() {
        debug!(session = id, "UI channel closed; message dropped");
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
