//! Media Session Module - Mikrofon und WebRTC
//!
//! Dieses Modul verwaltet:
//! - Lokale Audio-Aufnahme (Mikrofon)
//! - WebRTC Peer Connections
//! - G.711 Encoding und Decoding
//! - Remote Audio Streams und Wiedergabe

mod audio;
mod codec;
mod peer;
mod session;

pub use audio::{
    AudioHandle, CaptureDevice, CaptureTrack, CpalCapture, CpalPlayback, RemoteAudioBuffer,
    FRAME_SIZE, SAMPLE_RATE,
};
pub use codec::{
    decode_pcmu_frame, encode_pcmu_frame, linear_to_ulaw, ulaw_to_linear, PCMU_SAMPLE_RATE,
};
pub use peer::{WebRtcBackend, WebRtcPeer};
pub use session::{MediaCallbacks, MediaSession};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("No audio capture device available: {0}")]
    DeviceUnavailable(String),

    #[error("Peer connection setup failed: {0}")]
    NegotiationFailure(String),
}

impl MediaError {
    /// Text für die Benutzeroberfläche
    pub fn user_message(&self) -> String {
        match self {
            MediaError::PermissionDenied(_) => {
                "Could not access the microphone. Check the permissions.".to_string()
            }
            MediaError::DeviceUnavailable(_) => "No microphone available.".to_string(),
            MediaError::NegotiationFailure(reason) => {
                format!("Could not set up the connection: {}", reason)
            }
        }
    }
}

// ============================================================================
// AUDIO CONSTRAINTS
// ============================================================================

/// Anforderungen an die lokale Audio-Aufnahme. Video wird nie angefordert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for AudioConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

// ============================================================================
// REMOTE STREAM & HANDLERS
// ============================================================================

/// Opake Referenz auf den Audio-Stream der Gegenseite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    pub codec: String,
}

pub type RemoteTrackHandler = Box<dyn Fn(RemoteStream) + Send + Sync>;
pub type IceCandidateHandler = Box<dyn Fn(String) + Send + Sync>;
pub type ConnectionLostHandler = Box<dyn Fn(String) + Send + Sync>;

// ============================================================================
// BACKEND TRAITS
// ============================================================================

/// Eine Peer Connection mit bereits angehängten lokalen Tracks
pub trait PeerConnection: Send + Sync {
    /// Wird pro neuem Remote Stream höchstens einmal aufgerufen.
    /// Die Wiedergabe des Remote Audio gehört der Peer Connection und
    /// endet mit `close`.
    fn on_remote_track(&self, handler: RemoteTrackHandler);

    /// Wird pro gefundenem lokalen ICE Candidate aufgerufen (JSON)
    fn on_ice_candidate(&self, handler: IceCandidateHandler);

    /// Wird aufgerufen wenn die Verbindung fehlschlägt oder geschlossen wird
    fn on_connection_lost(&self, handler: ConnectionLostHandler);

    /// Erstellt das SDP Offer und setzt es als Local Description
    fn create_offer(&self) -> BoxFuture<'_, Result<String, MediaError>>;

    /// Schließt die Verbindung. Mehrfacher Aufruf ist ein No-op.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Plattform-Zugang zu Mikrofon und Peer Connections
pub trait MediaBackend: Send + Sync + 'static {
    fn acquire_local_audio(
        &self,
        constraints: AudioConstraints,
    ) -> BoxFuture<'static, Result<AudioHandle, MediaError>>;

    fn create_peer_connection<'a>(
        &'a self,
        ice_servers: &'a [String],
        local_audio: &'a AudioHandle,
    ) -> BoxFuture<'a, Result<Box<dyn PeerConnection>, MediaError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints_enable_all_processing() {
        let constraints = AudioConstraints::default();
        assert!(constraints.echo_cancellation);
        assert!(constraints.noise_suppression);
        assert!(constraints.auto_gain_control);
    }

    #[test]
    fn test_constraints_serialize_camel_case() {
        let json = serde_json::to_value(AudioConstraints::default()).unwrap();
        assert_eq!(json["echoCancellation"], true);
        assert_eq!(json["noiseSuppression"], true);
        assert_eq!(json["autoGainControl"], true);
    }

    #[test]
    fn test_user_messages() {
        let denied = MediaError::PermissionDenied("blocked".into());
        assert!(denied.user_message().contains("microphone"));

        let failed = MediaError::NegotiationFailure("ice".into());
        assert!(failed.user_message().ends_with("ice"));
    }
}
