//! Geskriptetes Media Backend und Hilfsfunktionen für die Call-Flow-Tests

#![allow(dead_code)]

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use softphone_lib::call::{CallEvent, CallHandle, CallSnapshot, CallStateMachine, CallStatus};
use softphone_lib::media::{
    AudioConstraints, AudioHandle, CaptureDevice, CaptureTrack, ConnectionLostHandler,
    IceCandidateHandler, MediaBackend, MediaError, PeerConnection, RemoteStream,
    RemoteTrackHandler,
};
use softphone_lib::CallConfig;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::Notify;

pub const WAIT: Duration = Duration::from_secs(5);

/// Callback, den die Fake Peer Connection während `create_offer` auslöst
#[derive(Debug, Clone)]
pub enum OfferEvent {
    RemoteTrack(String),
    ConnectionLost(String),
}

/// Zähler und Skript des Fake Backends, vom Test direkt lesbar
#[derive(Default)]
pub struct BackendState {
    pub live_audio: AtomicUsize,
    pub live_peers: AtomicUsize,
    pub audio_created: AtomicUsize,
    pub peers_created: AtomicUsize,
    pub acquire_error: Mutex<Option<MediaError>>,
    pub peer_error: Mutex<Option<MediaError>>,
    pub peer_gate: Mutex<Option<Arc<Notify>>>,
    pub ice_servers: Mutex<Vec<String>>,
    pub tracks: Mutex<Vec<Arc<CaptureTrack>>>,
    pub peers: Mutex<Vec<Arc<FakePeerShared>>>,
    pub offer_events: Mutex<Vec<OfferEvent>>,
}

/// Media Backend, dessen Verhalten jeder Test selbst festlegt
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<BackendState>,
}

impl FakeBackend {
    pub fn failing_acquire(error: MediaError) -> Self {
        let backend = Self::default();
        *backend.state.acquire_error.lock() = Some(error);
        backend
    }

    pub fn failing_peer(error: MediaError) -> Self {
        let backend = Self::default();
        *backend.state.peer_error.lock() = Some(error);
        backend
    }

    /// Peer Connection wird erst erstellt, wenn das Gate benachrichtigt wird
    pub fn gated() -> (Self, Arc<Notify>) {
        let backend = Self::default();
        let gate = Arc::new(Notify::new());
        *backend.state.peer_gate.lock() = Some(Arc::clone(&gate));
        (backend, gate)
    }

    /// Löst die Events während des Offers aus, also vor `mediaReady`
    pub fn with_offer_events(events: Vec<OfferEvent>) -> Self {
        let backend = Self::default();
        *backend.state.offer_events.lock() = events;
        backend
    }

    pub fn live_audio(&self) -> usize {
        self.state.live_audio.load(Ordering::SeqCst)
    }

    pub fn live_peers(&self) -> usize {
        self.state.live_peers.load(Ordering::SeqCst)
    }

    pub fn audio_created(&self) -> usize {
        self.state.audio_created.load(Ordering::SeqCst)
    }

    pub fn peers_created(&self) -> usize {
        self.state.peers_created.load(Ordering::SeqCst)
    }

    pub fn last_track(&self) -> Arc<CaptureTrack> {
        self.state.tracks.lock().last().cloned().expect("no track acquired")
    }

    pub fn last_peer(&self) -> Arc<FakePeerShared> {
        self.state.peers.lock().last().cloned().expect("no peer created")
    }
}

struct FakeDevice {
    state: Arc<BackendState>,
}

impl CaptureDevice for FakeDevice {
    fn name(&self) -> &str {
        "fake microphone"
    }

    fn release(&mut self) {
        self.state.live_audio.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MediaBackend for FakeBackend {
    fn acquire_local_audio(
        &self,
        constraints: AudioConstraints,
    ) -> BoxFuture<'static, Result<AudioHandle, MediaError>> {
        let state = Arc::clone(&self.state);
        async move {
            let error = state.acquire_error.lock().clone();
            if let Some(error) = error {
                return Err(error);
            }

            let track = CaptureTrack::new(constraints);
            state.tracks.lock().push(Arc::clone(&track));
            state.live_audio.fetch_add(1, Ordering::SeqCst);
            state.audio_created.fetch_add(1, Ordering::SeqCst);
            Ok(AudioHandle::new(
                constraints,
                vec![track],
                Box::new(FakeDevice {
                    state: Arc::clone(&state),
                }),
            ))
        }
        .boxed()
    }

    fn create_peer_connection<'a>(
        &'a self,
        ice_servers: &'a [String],
        local_audio: &'a AudioHandle,
    ) -> BoxFuture<'a, Result<Box<dyn PeerConnection>, MediaError>> {
        async move {
            let gate = self.state.peer_gate.lock().clone();
            if let Some(gate) = gate {
                gate.notified().await;
            }

            *self.state.ice_servers.lock() = ice_servers.to_vec();
            let error = self.state.peer_error.lock().clone();
            if let Some(error) = error {
                return Err(error);
            }
            assert!(local_audio.is_live());
            assert!(!local_audio.tracks().is_empty());

            let shared = Arc::new(FakePeerShared {
                state: Arc::clone(&self.state),
                closed: AtomicBool::new(false),
                remote: Mutex::new(None),
                ice: Mutex::new(None),
                lost: Mutex::new(None),
            });
            self.state.live_peers.fetch_add(1, Ordering::SeqCst);
            self.state.peers_created.fetch_add(1, Ordering::SeqCst);
            self.state.peers.lock().push(Arc::clone(&shared));
            Ok(Box::new(FakePeer { shared }) as Box<dyn PeerConnection>)
        }
        .boxed()
    }
}

/// Peer-Zustand, den Session und Test gemeinsam sehen
pub struct FakePeerShared {
    state: Arc<BackendState>,
    closed: AtomicBool,
    remote: Mutex<Option<RemoteTrackHandler>>,
    ice: Mutex<Option<IceCandidateHandler>>,
    lost: Mutex<Option<ConnectionLostHandler>>,
}

impl FakePeerShared {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn emit_remote_track(&self, stream_id: &str) {
        if let Some(handler) = self.remote.lock().as_ref() {
            handler(RemoteStream {
                stream_id: stream_id.to_string(),
                track_id: format!("{}-audio", stream_id),
                codec: "audio/PCMU".to_string(),
            });
        }
    }

    pub fn emit_ice_candidate(&self, candidate: &str) {
        if let Some(handler) = self.ice.lock().as_ref() {
            handler(candidate.to_string());
        }
    }

    pub fn emit_connection_lost(&self, reason: &str) {
        if let Some(handler) = self.lost.lock().as_ref() {
            handler(reason.to_string());
        }
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.live_peers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

struct FakePeer {
    shared: Arc<FakePeerShared>,
}

impl PeerConnection for FakePeer {
    fn on_remote_track(&self, handler: RemoteTrackHandler) {
        *self.shared.remote.lock() = Some(handler);
    }

    fn on_ice_candidate(&self, handler: IceCandidateHandler) {
        *self.shared.ice.lock() = Some(handler);
    }

    fn on_connection_lost(&self, handler: ConnectionLostHandler) {
        *self.shared.lost.lock() = Some(handler);
    }

    fn create_offer(&self) -> BoxFuture<'_, Result<String, MediaError>> {
        let events = self.shared.state.offer_events.lock().clone();
        for event in events {
            match event {
                OfferEvent::RemoteTrack(stream_id) => self.shared.emit_remote_track(&stream_id),
                OfferEvent::ConnectionLost(reason) => self.shared.emit_connection_lost(&reason),
            }
        }
        futures::future::ready(Ok("v=0\r\no=- 0 0 IN IP4 127.0.0.1\r\n".to_string())).boxed()
    }

    fn close(&self) {
        self.shared.close();
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

impl Drop for FakePeer {
    fn drop(&mut self) {
        self.shared.close();
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub struct Harness {
    pub handle: CallHandle,
    pub events: Receiver<CallEvent>,
    pub ended: Arc<Mutex<Vec<u64>>>,
}

pub fn spawn_machine(backend: FakeBackend) -> Harness {
    spawn_machine_with(CallStateMachine::new(CallConfig::default(), backend))
}

pub fn spawn_machine_with(machine: CallStateMachine) -> Harness {
    let ended = Arc::new(Mutex::new(Vec::new()));
    let ended_clone = Arc::clone(&ended);
    let handle = machine
        .on_call_ended(move |secs| ended_clone.lock().push(secs))
        .spawn();
    let events = handle.subscribe();
    Harness {
        handle,
        events,
        ended,
    }
}

/// Wartet auf den nächsten Wechsel nach `status`
pub async fn wait_for_status(events: &mut Receiver<CallEvent>, status: CallStatus) -> CallSnapshot {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(CallEvent::StateChanged(snapshot)) if snapshot.status == status => {
                    return snapshot
                }
                Ok(_) => {}
                Err(e) => panic!("event stream broken: {}", e),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", status))
}

/// Wartet auf das erste Event, das `predicate` erfüllt
pub async fn wait_for_event(
    events: &mut Receiver<CallEvent>,
    predicate: impl Fn(&CallEvent) -> bool,
) -> CallEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => {}
                Err(e) => panic!("event stream broken: {}", e),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Sammelt alle bereits anstehenden Events ein
pub fn drain(events: &mut Receiver<CallEvent>) -> Vec<CallEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Gibt anderen Tasks Gelegenheit weiterzulaufen
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Pollt `condition`, bis sie erfüllt ist
pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
