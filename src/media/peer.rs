//! WebRTC Backend
//!
//! Erstellt Peer Connections mit den lokalen Mikrofon-Tracks als
//! ausgehende PCMU-Tracks, spielt eingehende PCMU-Tracks über den
//! Lautsprecher ab und leitet Remote Tracks, ICE Candidates und
//! Verbindungsabbrüche an registrierte Handler weiter.

use super::audio::{
    AudioHandle, CaptureTrack, CpalCapture, CpalPlayback, RemoteAudioBuffer, FRAME_SIZE,
};
use super::codec::{decode_pcmu_frame, encode_pcmu_frame, silence_frame, PCMU_SAMPLE_RATE};
use super::{
    AudioConstraints, ConnectionLostHandler, IceCandidateHandler, MediaBackend, MediaError,
    PeerConnection, RemoteStream, RemoteTrackHandler,
};
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MediaEngine, MIME_TYPE_PCMU};
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::{
    RTCRtpCodecCapability, RTCRtpCodecParameters, RTPCodecType,
};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Dauer eines ausgehenden Frames
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Statischer RTP Payload Type von PCMU
const PCMU_PAYLOAD_TYPE: u8 = 0;

fn negotiation_failure(e: webrtc::Error) -> MediaError {
    MediaError::NegotiationFailure(e.to_string())
}

// ============================================================================
// BACKEND
// ============================================================================

/// Produktions-Backend: cpal für das Mikrofon, webrtc für die Verbindung
#[derive(Debug, Clone, Default)]
pub struct WebRtcBackend;

impl MediaBackend for WebRtcBackend {
    fn acquire_local_audio(
        &self,
        constraints: AudioConstraints,
    ) -> BoxFuture<'static, Result<AudioHandle, MediaError>> {
        async move {
            let track = CaptureTrack::new(constraints);
            let capture = CpalCapture::open(Arc::clone(&track)).await?;
            Ok(AudioHandle::new(constraints, vec![track], Box::new(capture)))
        }
        .boxed()
    }

    fn create_peer_connection<'a>(
        &'a self,
        ice_servers: &'a [String],
        local_audio: &'a AudioHandle,
    ) -> BoxFuture<'a, Result<Box<dyn PeerConnection>, MediaError>> {
        async move {
            let peer = WebRtcPeer::connect(ice_servers, local_audio.tracks()).await?;
            Ok(Box::new(peer) as Box<dyn PeerConnection>)
        }
        .boxed()
    }
}

// ============================================================================
// PEER
// ============================================================================

/// Eine webrtc Peer Connection samt ausgehender Track-Pumpen
pub struct WebRtcPeer {
    pc: Arc<RTCPeerConnection>,
    pumps: Mutex<Vec<JoinHandle<()>>>,
    seen_streams: Arc<Mutex<HashSet<String>>>,
    remote_audio: Arc<RemoteAudio>,
    closed: AtomicBool,
}

impl WebRtcPeer {
    /// Erstellt die Peer Connection und hängt alle lokalen Tracks an
    pub async fn connect(
        ice_servers: &[String],
        tracks: &[Arc<CaptureTrack>],
    ) -> Result<Self, MediaError> {
        // Nur PCMU, Encoder und Decoder sind G.711
        let mut media_engine = MediaEngine::default();
        media_engine
            .register_codec(
                RTCRtpCodecParameters {
                    capability: pcmu_capability(),
                    payload_type: PCMU_PAYLOAD_TYPE,
                    ..Default::default()
                },
                RTPCodecType::Audio,
            )
            .map_err(negotiation_failure)?;

        // Interceptors für RTCP, NACK etc.
        let mut registry = Registry::new();
        registry =
            register_default_interceptors(registry, &mut media_engine).map_err(negotiation_failure)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let mut config = RTCConfiguration::default();
        if !ice_servers.is_empty() {
            config.ice_servers = vec![RTCIceServer {
                urls: ice_servers.to_vec(),
                ..Default::default()
            }];
        }

        let pc = Arc::new(
            api.new_peer_connection(config)
                .await
                .map_err(negotiation_failure)?,
        );

        let peer = Self {
            pc,
            pumps: Mutex::new(Vec::new()),
            seen_streams: Arc::new(Mutex::new(HashSet::new())),
            remote_audio: Arc::new(RemoteAudio::default()),
            closed: AtomicBool::new(false),
        };

        // Bei Fehlern schließt Drop die halb geöffnete Verbindung
        for track in tracks {
            peer.attach_track(Arc::clone(track)).await?;
        }

        tracing::info!(
            "Peer connection created with {} outbound track(s)",
            tracks.len()
        );
        Ok(peer)
    }

    async fn attach_track(&self, track: Arc<CaptureTrack>) -> Result<(), MediaError> {
        let outbound = Arc::new(TrackLocalStaticSample::new(
            pcmu_capability(),
            track.id().to_string(),
            format!("softphone-{}", uuid::Uuid::new_v4()),
        ));

        self.pc
            .add_track(Arc::clone(&outbound) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .map_err(negotiation_failure)?;

        let pump = tokio::spawn(pump_track(track, outbound));
        self.pumps.lock().push(pump);
        Ok(())
    }
}

fn pcmu_capability() -> RTCRtpCodecCapability {
    RTCRtpCodecCapability {
        mime_type: MIME_TYPE_PCMU.to_owned(),
        clock_rate: PCMU_SAMPLE_RATE,
        channels: 1,
        ..Default::default()
    }
}

/// Schreibt alle 20ms einen PCMU-Frame (oder Stille wenn deaktiviert)
async fn pump_track(track: Arc<CaptureTrack>, outbound: Arc<TrackLocalStaticSample>) {
    let mut interval = tokio::time::interval(FRAME_DURATION);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;
        if track.is_stopped() {
            break;
        }

        let data = match track.read_frame() {
            Some(frame) if track.is_enabled() => encode_pcmu_frame(&frame),
            _ => silence_frame(FRAME_SIZE),
        };

        let sample = Sample {
            data: Bytes::from(data),
            duration: FRAME_DURATION,
            ..Default::default()
        };

        if let Err(e) = outbound.write_sample(&sample).await {
            tracing::warn!("Failed to write outbound audio: {}", e);
            break;
        }
    }

    tracing::debug!("Outbound pump for {} finished", track.id());
}

// ============================================================================
// REMOTE AUDIO
// ============================================================================

/// Wiedergabe der Gegenseite: ein RTP-Reader pro Track, ein gemeinsamer
/// Lautsprecher-Stream. Wird mit der Peer Connection gestoppt.
struct RemoteAudio {
    buffer: Arc<RemoteAudioBuffer>,
    playback: Mutex<Option<CpalPlayback>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl Default for RemoteAudio {
    fn default() -> Self {
        Self {
            buffer: RemoteAudioBuffer::new(),
            playback: Mutex::new(None),
            readers: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        }
    }
}

impl RemoteAudio {
    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    async fn play(&self, track: Arc<TrackRemote>) {
        let codec = track.codec().capability.mime_type;
        if !codec.eq_ignore_ascii_case(MIME_TYPE_PCMU) {
            tracing::warn!("No decoder for remote codec {}, track {} not played", codec, track.id());
            return;
        }
        if self.is_stopped() {
            return;
        }

        let needs_output = self.playback.lock().is_none();
        if needs_output {
            match CpalPlayback::open(Arc::clone(&self.buffer)).await {
                Ok(playback) => {
                    tracing::info!("Playing remote audio on {}", playback.device_name());
                    let mut slot = self.playback.lock();
                    if slot.is_none() && !self.is_stopped() {
                        *slot = Some(playback);
                    }
                }
                Err(e) => {
                    tracing::warn!("Remote audio cannot be played: {}", e);
                    return;
                }
            }
        }

        let reader = tokio::spawn(read_remote_track(track, Arc::clone(&self.buffer)));
        self.readers.lock().push(reader);

        // `stop` lief während des Öffnens
        if self.is_stopped() {
            self.stop();
        }
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        for reader in self.readers.lock().drain(..) {
            reader.abort();
        }
        self.buffer.stop();
        let playback = self.playback.lock().take();
        if let Some(mut playback) = playback {
            playback.stop();
        }
    }
}

/// Liest RTP vom Remote Track und schreibt dekodiertes Audio in den Buffer
async fn read_remote_track(track: Arc<TrackRemote>, buffer: Arc<RemoteAudioBuffer>) {
    loop {
        match track.read_rtp().await {
            Ok((packet, _)) => {
                if buffer.is_stopped() {
                    break;
                }
                buffer.write_samples(&decode_pcmu_frame(&packet.payload));
            }
            Err(e) => {
                tracing::debug!("Remote track {} ended: {}", track.id(), e);
                break;
            }
        }
    }
}

impl PeerConnection for WebRtcPeer {
    fn on_remote_track(&self, handler: RemoteTrackHandler) {
        let seen = Arc::clone(&self.seen_streams);
        let remote_audio = Arc::clone(&self.remote_audio);

        self.pc.on_track(Box::new(move |track, _, _| {
            let stream = RemoteStream {
                stream_id: track.stream_id(),
                track_id: track.id(),
                codec: track.codec().capability.mime_type.clone(),
            };

            if seen.lock().insert(stream.stream_id.clone()) {
                tracing::info!("Received remote stream: {:?}", stream);
                handler(stream);
            } else {
                tracing::debug!("Additional track for known stream {}", stream.stream_id);
            }

            let remote_audio = Arc::clone(&remote_audio);
            Box::pin(async move {
                remote_audio.play(track).await;
            })
        }));
    }

    fn on_ice_candidate(&self, handler: IceCandidateHandler) {
        self.pc
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                if let Some(c) = candidate {
                    if let Ok(json) = c.to_json() {
                        if let Ok(candidate_str) = serde_json::to_string(&json) {
                            handler(candidate_str);
                        }
                    }
                }
                Box::pin(async {})
            }));
    }

    fn on_connection_lost(&self, handler: ConnectionLostHandler) {
        self.pc
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                tracing::info!("Peer connection state: {:?}", s);

                match s {
                    RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
                        handler(format!("Peer connection {:?}", s));
                    }
                    RTCPeerConnectionState::Disconnected => {
                        tracing::warn!("Peer connection disconnected, waiting for recovery");
                    }
                    _ => {}
                }

                Box::pin(async {})
            }));
    }

    fn create_offer(&self) -> BoxFuture<'_, Result<String, MediaError>> {
        async move {
            let offer = self
                .pc
                .create_offer(None)
                .await
                .map_err(negotiation_failure)?;

            // Local Description setzen startet das ICE Gathering
            self.pc
                .set_local_description(offer.clone())
                .await
                .map_err(negotiation_failure)?;

            Ok(offer.sdp)
        }
        .boxed()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        for pump in self.pumps.lock().drain(..) {
            pump.abort();
        }
        self.remote_audio.stop();

        let pc = Arc::clone(&self.pc);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Err(e) = pc.close().await {
                        tracing::warn!("Failed to close peer connection: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::warn!("No runtime available, peer connection dropped without close");
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for WebRtcPeer {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for WebRtcPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcPeer")
            .field("state", &self.pc.connection_state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_capability_is_pcmu() {
        let capability = pcmu_capability();
        assert_eq!(capability.mime_type, MIME_TYPE_PCMU);
        assert_eq!(capability.clock_rate, 8000);
        assert_eq!(capability.channels, 1);
    }

    #[tokio::test]
    async fn test_remote_audio_stop_ends_readers_and_buffer() {
        let remote = RemoteAudio::default();
        remote.buffer.write_samples(&[0.25; 480]);
        assert_eq!(remote.buffer.buffered(), 480);

        let reader = tokio::spawn(futures::future::pending::<()>());
        remote.readers.lock().push(reader);

        remote.stop();
        assert!(remote.is_stopped());
        assert!(remote.readers.lock().is_empty());
        assert!(remote.playback.lock().is_none());
        assert!(remote.buffer.is_stopped());
        assert_eq!(remote.buffer.buffered(), 0);

        // Nach dem Stop wird kein Audio mehr angenommen
        remote.buffer.write_samples(&[0.25; 480]);
        assert_eq!(remote.buffer.buffered(), 0);

        // Zweiter Aufruf ist ein No-op
        remote.stop();
    }
}
