//! Call State Machine
//!
//! Ein einzelner Task besitzt den `CallSession` und verarbeitet alle
//! Übergänge nacheinander: Befehle der Oberfläche, Abschluss des
//! Media-Aufbaus, Callbacks der Peer Connection, eingehende Anrufe und den
//! Sekundentakt des Timers. Niemand sonst verändert den Zustand.

use super::incoming::{IncomingCall, IncomingCallSource, NoIncomingCalls};
use super::state::{format_duration, CallSession, CallSnapshot, CallStatus};
use crate::config::CallConfig;
use crate::media::{MediaBackend, MediaCallbacks, MediaError, MediaSession, RemoteStream};
use chrono::{DateTime, Utc};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Takt des Gesprächs-Timers
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Kapazität des Event-Kanals
const EVENT_CAPACITY: usize = 100;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("Cannot {action} while call is {status}")]
    InvalidStateTransition {
        action: &'static str,
        status: CallStatus,
    },

    #[error("Phone number must not be empty")]
    EmptyNumber,

    #[error("Call state machine is not running")]
    Shutdown,
}

// ============================================================================
// EVENTS
// ============================================================================

/// Events die von der State Machine ausgelöst werden
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// Nach jedem Übergang und jedem Timer-Tick
    StateChanged(CallSnapshot),
    /// Genau einmal pro Anruf der `Active` erreicht hat
    CallEnded {
        remote_address: String,
        duration_secs: u64,
        ended_at: DateTime<Utc>,
    },
    /// Hinweistext für die Oberfläche
    Notice(String),
    /// Lokaler ICE Candidate (JSON), wird nicht übertragen
    IceCandidate { candidate: String },
    /// Audio der Gegenseite ist verfügbar
    RemoteStream(RemoteStream),
    /// Aufbau fehlgeschlagen, Anruf zurück auf `Idle`
    Failed(MediaError),
}

/// Callback für das Ende eines Anrufs mit der finalen Dauer in Sekunden
pub type CallEndedCallback = Box<dyn Fn(u64) + Send + Sync>;

enum Command {
    Dial {
        number: String,
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Accept {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Reject {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    HangUp {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    ToggleMute {
        reply: oneshot::Sender<Result<(), CallError>>,
    },
    Snapshot {
        reply: oneshot::Sender<CallSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Asynchrone Ereignisse, jeweils mit der Nummer des Aufbau-Versuchs
enum Internal {
    MediaReady { attempt: u64, session: MediaSession },
    MediaFailed { attempt: u64, error: MediaError },
    RemoteTrack { attempt: u64, stream: RemoteStream },
    IceCandidate { attempt: u64, candidate: String },
    ConnectionLost { attempt: u64, reason: String },
    Incoming(IncomingCall),
}

// ============================================================================
// HANDLE
// ============================================================================

/// Zugang der Oberfläche zur State Machine
#[derive(Clone)]
pub struct CallHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<CallEvent>,
}

impl CallHandle {
    /// Gibt einen Event-Receiver zurück
    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.events.subscribe()
    }

    /// Startet einen ausgehenden Anruf (`Idle` -> `Connecting`)
    pub async fn dial(&self, number: impl Into<String>) -> Result<(), CallError> {
        let number = number.into();
        self.request(|reply| Command::Dial { number, reply }).await
    }

    /// Nimmt den klingelnden Anruf an (`IncomingRinging` -> `Connecting`)
    pub async fn accept(&self) -> Result<(), CallError> {
        self.request(|reply| Command::Accept { reply }).await
    }

    /// Lehnt den klingelnden Anruf ab (`IncomingRinging` -> `Idle`)
    pub async fn reject(&self) -> Result<(), CallError> {
        self.request(|reply| Command::Reject { reply }).await
    }

    /// Beendet den aktiven Anruf oder bricht den Aufbau ab
    pub async fn hang_up(&self) -> Result<(), CallError> {
        self.request(|reply| Command::HangUp { reply }).await
    }

    pub async fn toggle_mute(&self) -> Result<(), CallError> {
        self.request(|reply| Command::ToggleMute { reply }).await
    }

    /// Aktueller Zustand
    pub async fn snapshot(&self) -> Result<CallSnapshot, CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .map_err(|_| CallError::Shutdown)?;
        rx.await.map_err(|_| CallError::Shutdown)
    }

    /// Beendet die State Machine und gibt alle Ressourcen frei
    pub async fn shutdown(&self) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Shutdown { reply })
            .map_err(|_| CallError::Shutdown)?;
        rx.await.map_err(|_| CallError::Shutdown)
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<(), CallError>>) -> Command,
    ) -> Result<(), CallError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| CallError::Shutdown)?;
        rx.await.map_err(|_| CallError::Shutdown)?
    }
}

impl std::fmt::Debug for CallHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("running", &!self.commands.is_closed())
            .finish()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Konfiguriert und startet die State Machine
pub struct CallStateMachine {
    config: CallConfig,
    backend: Arc<dyn MediaBackend>,
    incoming: Box<dyn IncomingCallSource>,
    on_call_ended: Option<CallEndedCallback>,
}

impl CallStateMachine {
    pub fn new(config: CallConfig, backend: impl MediaBackend) -> Self {
        Self {
            config,
            backend: Arc::new(backend),
            incoming: Box::new(NoIncomingCalls),
            on_call_ended: None,
        }
    }

    pub fn with_incoming_source(mut self, source: impl IncomingCallSource) -> Self {
        self.incoming = Box::new(source);
        self
    }

    /// Wird nach dem Teardown und vor dem Zurücksetzen auf `Idle` aufgerufen
    pub fn on_call_ended(mut self, callback: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_call_ended = Some(Box::new(callback));
        self
    }

    /// Startet den State-Machine-Task. Muss innerhalb einer Tokio Runtime laufen.
    pub fn spawn(self) -> CallHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let mut incoming = self.incoming;
        let incoming_tx = internal_tx.clone();
        let incoming_task = tokio::spawn(async move {
            while let Some(call) = incoming.next_call().await {
                if incoming_tx.send(Internal::Incoming(call)).is_err() {
                    break;
                }
            }
        });

        let actor = CallActor {
            config: self.config,
            backend: self.backend,
            session: CallSession::default(),
            media: None,
            pending: None,
            pending_remote: None,
            attempt: 0,
            timer: None,
            internal_tx,
            events: event_tx.clone(),
            on_call_ended: self.on_call_ended,
            incoming_task: Some(incoming_task),
        };
        tokio::spawn(actor.run(command_rx, internal_rx));

        CallHandle {
            commands: command_tx,
            events: event_tx,
        }
    }
}

// ============================================================================
// ACTOR
// ============================================================================

struct CallActor {
    config: CallConfig,
    backend: Arc<dyn MediaBackend>,
    session: CallSession,
    media: Option<MediaSession>,
    /// Laufender Media-Aufbau
    pending: Option<JoinHandle<()>>,
    /// Remote Stream der vor `MediaReady` ankam
    pending_remote: Option<RemoteStream>,
    attempt: u64,
    timer: Option<Interval>,
    internal_tx: mpsc::UnboundedSender<Internal>,
    events: broadcast::Sender<CallEvent>,
    on_call_ended: Option<CallEndedCallback>,
    incoming_task: Option<JoinHandle<()>>,
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => futures::future::pending::<()>().await,
    }
}

impl CallActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        tracing::info!("Call state machine started");

        loop {
            tokio::select! {
                biased;

                _ = next_tick(&mut self.timer) => self.on_tick(),

                Some(event) = internal.recv() => self.handle_internal(event).await,

                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        self.shutdown().await;
                        break;
                    }
                },
            }
        }

        tracing::info!("Call state machine stopped");
    }

    // ========================================================================
    // COMMANDS
    // ========================================================================

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Dial { number, reply } => {
                let _ = reply.send(self.dial(number));
            }
            Command::Accept { reply } => {
                let _ = reply.send(self.accept());
            }
            Command::Reject { reply } => {
                let _ = reply.send(self.reject());
            }
            Command::HangUp { reply } => {
                let _ = reply.send(self.hang_up().await);
            }
            Command::ToggleMute { reply } => {
                let _ = reply.send(self.toggle_mute());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Shutdown { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn ensure(&self, expected: CallStatus, action: &'static str) -> Result<(), CallError> {
        if self.session.status == expected {
            Ok(())
        } else {
            Err(CallError::InvalidStateTransition {
                action,
                status: self.session.status,
            })
        }
    }

    fn dial(&mut self, number: String) -> Result<(), CallError> {
        self.ensure(CallStatus::Idle, "dial")?;

        let number = number.trim();
        if number.is_empty() {
            return Err(CallError::EmptyNumber);
        }

        self.session.reset();
        self.session.remote_address = number.to_string();
        self.start_connecting();
        Ok(())
    }

    fn accept(&mut self) -> Result<(), CallError> {
        self.ensure(CallStatus::IncomingRinging, "accept")?;
        self.start_connecting();
        Ok(())
    }

    fn reject(&mut self) -> Result<(), CallError> {
        self.ensure(CallStatus::IncomingRinging, "reject")?;

        tracing::info!("Rejected incoming call from {}", self.session.remote_address);
        self.session.reset();
        self.notice("Call rejected");
        self.notify();
        Ok(())
    }

    async fn hang_up(&mut self) -> Result<(), CallError> {
        match self.session.status {
            CallStatus::Active => {
                self.end_active_call().await;
                Ok(())
            }
            CallStatus::Connecting => {
                tracing::info!("Call setup to {} cancelled", self.session.remote_address);
                self.release_media().await;
                self.session.reset();
                self.notice("Call cancelled");
                self.notify();
                Ok(())
            }
            status => Err(CallError::InvalidStateTransition {
                action: "hang up",
                status,
            }),
        }
    }

    fn toggle_mute(&mut self) -> Result<(), CallError> {
        match self.session.status {
            CallStatus::Active | CallStatus::Connecting => {
                self.session.muted = !self.session.muted;
                if let Some(media) = &self.media {
                    media.set_muted(self.session.muted);
                }
                self.notice(if self.session.muted {
                    "Microphone muted"
                } else {
                    "Microphone unmuted"
                });
                self.notify();
                Ok(())
            }
            status => Err(CallError::InvalidStateTransition {
                action: "toggle mute",
                status,
            }),
        }
    }

    // ========================================================================
    // MEDIA LIFECYCLE
    // ========================================================================

    /// Startet den Media-Aufbau im Hintergrund
    fn start_connecting(&mut self) {
        self.session.status = CallStatus::Connecting;
        self.session.duration_secs = 0;
        self.session.muted = false;

        self.attempt += 1;
        let attempt = self.attempt;
        let backend = Arc::clone(&self.backend);
        let ice_servers = self.config.ice_servers.clone();
        let constraints = self.config.audio;
        let callbacks = self.media_callbacks(attempt);
        let tx = self.internal_tx.clone();

        self.pending = Some(tokio::spawn(async move {
            let event =
                match MediaSession::establish(backend.as_ref(), &ice_servers, constraints, callbacks)
                    .await
                {
                    Ok(session) => Internal::MediaReady { attempt, session },
                    Err(error) => Internal::MediaFailed { attempt, error },
                };
            // Läuft die State Machine nicht mehr, räumt Drop die Session ab
            let _ = tx.send(event);
        }));

        tracing::info!(
            "Connecting to {} (attempt {})",
            self.session.remote_address,
            attempt
        );
        self.notify();
    }

    /// Leitet Peer-Connection-Callbacks als Events in die State Machine
    fn media_callbacks(&self, attempt: u64) -> MediaCallbacks {
        let remote_tx = self.internal_tx.clone();
        let ice_tx = self.internal_tx.clone();
        let lost_tx = self.internal_tx.clone();

        MediaCallbacks {
            on_remote_track: Box::new(move |stream| {
                let _ = remote_tx.send(Internal::RemoteTrack { attempt, stream });
            }),
            on_ice_candidate: Box::new(move |candidate| {
                let _ = ice_tx.send(Internal::IceCandidate { attempt, candidate });
            }),
            on_connection_lost: Box::new(move |reason| {
                let _ = lost_tx.send(Internal::ConnectionLost { attempt, reason });
            }),
        }
    }

    /// Bricht den Aufbau ab und gibt die Media Session frei.
    /// Events älterer Versuche werden danach verworfen.
    ///
    /// Kehrt erst zurück, wenn der abgebrochene Aufbau beendet ist und
    /// seine Ressourcen freigegeben hat.
    async fn release_media(&mut self) {
        self.attempt += 1;
        self.pending_remote = None;
        if let Some(pending) = self.pending.take() {
            pending.abort();
            if let Err(e) = pending.await {
                if e.is_panic() {
                    tracing::error!("Media setup task panicked: {}", e);
                }
            }
        }
        if let Some(mut media) = self.media.take() {
            media.teardown();
        }
    }

    async fn end_active_call(&mut self) {
        let duration_secs = self.session.duration_secs;
        let remote_address = self.session.remote_address.clone();

        self.stop_timer();
        self.session.duration_secs = 0;
        self.session.status = CallStatus::Ended;
        self.notify();

        self.release_media().await;

        tracing::info!(
            "Call with {} ended after {}",
            remote_address,
            format_duration(duration_secs)
        );
        if let Some(callback) = &self.on_call_ended {
            callback(duration_secs);
        }
        let _ = self.events.send(CallEvent::CallEnded {
            remote_address,
            duration_secs,
            ended_at: Utc::now(),
        });
        self.notice(format!(
            "Call ended. Duration: {}",
            format_duration(duration_secs)
        ));

        self.session.reset();
        self.notify();
    }

    async fn shutdown(&mut self) {
        match self.session.status {
            CallStatus::Active => self.end_active_call().await,
            CallStatus::Idle => self.release_media().await,
            _ => {
                self.release_media().await;
                self.session.reset();
                self.notify();
            }
        }
        if let Some(task) = self.incoming_task.take() {
            task.abort();
        }
    }

    // ========================================================================
    // INTERNAL EVENTS
    // ========================================================================

    async fn handle_internal(&mut self, event: Internal) {
        match event {
            Internal::MediaReady { attempt, session } => self.on_media_ready(attempt, session),
            Internal::MediaFailed { attempt, error } => {
                self.on_media_failed(attempt, error).await
            }
            Internal::RemoteTrack { attempt, stream } => self.on_remote_track(attempt, stream),
            Internal::IceCandidate { attempt, candidate } => {
                if attempt == self.attempt {
                    tracing::debug!("Local ICE candidate (not transmitted): {}", candidate);
                    let _ = self.events.send(CallEvent::IceCandidate { candidate });
                }
            }
            Internal::ConnectionLost { attempt, reason } => {
                self.on_connection_lost(attempt, reason).await
            }
            Internal::Incoming(call) => self.on_incoming_call(call),
        }
    }

    fn on_media_ready(&mut self, attempt: u64, mut session: MediaSession) {
        if attempt != self.attempt || self.session.status != CallStatus::Connecting {
            tracing::debug!("Discarding media session of superseded attempt {}", attempt);
            session.teardown();
            return;
        }

        self.pending = None;
        session.set_muted(self.session.muted);
        if let Some(stream) = self.pending_remote.take() {
            session.attach_remote_stream(stream);
        }
        self.media = Some(session);

        self.session.status = CallStatus::Active;
        self.session.duration_secs = 0;
        self.start_timer();

        tracing::info!("Call with {} is active", self.session.remote_address);
        self.notice(format!("Call started to {}", self.session.remote_address));
        self.notify();
    }

    async fn on_media_failed(&mut self, attempt: u64, error: MediaError) {
        if attempt != self.attempt {
            tracing::debug!("Ignoring failure of superseded attempt {}: {}", attempt, error);
            return;
        }

        tracing::warn!(
            "Call setup to {} failed: {}",
            self.session.remote_address,
            error
        );
        self.release_media().await;
        self.session.reset();

        let _ = self.events.send(CallEvent::Failed(error.clone()));
        self.notice(error.user_message());
        self.notify();
    }

    fn on_remote_track(&mut self, attempt: u64, stream: RemoteStream) {
        if attempt != self.attempt {
            return;
        }

        let is_new = match self.media.as_mut() {
            Some(media) => media.attach_remote_stream(stream.clone()),
            None => self.pending_remote.replace(stream.clone()).as_ref() != Some(&stream),
        };
        if is_new {
            tracing::info!("Remote audio available: {}", stream.stream_id);
            let _ = self.events.send(CallEvent::RemoteStream(stream));
        }
    }

    async fn on_connection_lost(&mut self, attempt: u64, reason: String) {
        if attempt != self.attempt {
            return;
        }

        tracing::warn!("Media connection lost: {}", reason);
        match self.session.status {
            CallStatus::Active => {
                self.notice("Connection lost");
                self.end_active_call().await;
            }
            CallStatus::Connecting => {
                self.on_media_failed(attempt, MediaError::NegotiationFailure(reason))
                    .await;
            }
            _ => {
                self.release_media().await;
                if self.session.status != CallStatus::Idle {
                    self.session.reset();
                    self.notify();
                }
            }
        }
    }

    fn on_incoming_call(&mut self, call: IncomingCall) {
        if self.session.status != CallStatus::Idle {
            tracing::debug!(
                "Discarding incoming call from {} while {}",
                call.caller_name,
                self.session.status
            );
            return;
        }
        if call.number.trim().is_empty() {
            tracing::warn!("Discarding incoming call without number");
            return;
        }

        tracing::info!("Incoming call from {} ({})", call.caller_name, call.number);
        self.session.reset();
        self.session.status = CallStatus::IncomingRinging;
        self.session.remote_address = call.number;
        self.notice(format!("Incoming call from {}", call.caller_name));
        self.session.caller_display_name = Some(call.caller_name);
        self.notify();
    }

    // ========================================================================
    // TIMER
    // ========================================================================

    fn start_timer(&mut self) {
        let mut interval = tokio::time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        // Verpasste Ticks werden nachgeholt, jede Sekunde zählt genau einmal
        interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
        self.timer = Some(interval);
    }

    fn stop_timer(&mut self) {
        self.timer = None;
    }

    fn on_tick(&mut self) {
        if self.session.status != CallStatus::Active {
            self.stop_timer();
            return;
        }
        self.session.duration_secs += 1;
        tracing::debug!("Call duration: {}", format_duration(self.session.duration_secs));
        self.notify();
    }

    // ========================================================================
    // NOTIFICATIONS
    // ========================================================================

    fn notify(&self) {
        debug_assert!(
            self.session.is_consistent(),
            "inconsistent call session: {:?}",
            self.session
        );
        let _ = self
            .events
            .send(CallEvent::StateChanged(self.session.snapshot()));
    }

    fn notice(&self, text: impl Into<String>) {
        let _ = self.events.send(CallEvent::Notice(text.into()));
    }
}
