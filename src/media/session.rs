//! Media Session - Mikrofon + Peer Connection für genau einen Anruf

use super::{
    AudioConstraints, AudioHandle, ConnectionLostHandler, IceCandidateHandler, MediaBackend,
    MediaError, PeerConnection, RemoteStream, RemoteTrackHandler,
};

/// Callbacks, die beim Aufbau an der Peer Connection registriert werden
pub struct MediaCallbacks {
    pub on_remote_track: RemoteTrackHandler,
    pub on_ice_candidate: IceCandidateHandler,
    pub on_connection_lost: ConnectionLostHandler,
}

/// Ressourcen eines Anrufs: lokale Aufnahme und Peer Connection.
///
/// Beide werden beim `teardown` oder spätestens beim Drop freigegeben.
pub struct MediaSession {
    local_audio: AudioHandle,
    peer: Box<dyn PeerConnection>,
    remote_stream: Option<RemoteStream>,
    local_description: Option<String>,
    torn_down: bool,
}

impl MediaSession {
    /// Baut eine Media Session auf.
    ///
    /// Schlägt ein Schritt fehl, wird alles bis dahin Belegte freigegeben
    /// bevor der Fehler zurückgegeben wird.
    pub async fn establish(
        backend: &dyn MediaBackend,
        ice_servers: &[String],
        constraints: AudioConstraints,
        callbacks: MediaCallbacks,
    ) -> Result<Self, MediaError> {
        let mut local_audio = backend.acquire_local_audio(constraints).await?;

        let peer = match backend
            .create_peer_connection(ice_servers, &local_audio)
            .await
        {
            Ok(peer) => peer,
            Err(e) => {
                local_audio.stop();
                return Err(e);
            }
        };

        peer.on_remote_track(callbacks.on_remote_track);
        peer.on_ice_candidate(callbacks.on_ice_candidate);
        peer.on_connection_lost(callbacks.on_connection_lost);

        let mut session = Self {
            local_audio,
            peer,
            remote_stream: None,
            local_description: None,
            torn_down: false,
        };

        match session.peer.create_offer().await {
            Ok(sdp) => {
                // Ohne Signaling-Transport bleibt das Offer lokal
                tracing::debug!("Local offer created ({} bytes), not transmitted", sdp.len());
                session.local_description = Some(sdp);
                Ok(session)
            }
            Err(e) => {
                session.teardown();
                Err(e)
            }
        }
    }

    pub fn local_audio(&self) -> &AudioHandle {
        &self.local_audio
    }

    pub fn local_description(&self) -> Option<&str> {
        self.local_description.as_deref()
    }

    /// Aktiviert/deaktiviert die ausgehenden Tracks. Nach dem Teardown ein No-op.
    pub fn set_muted(&self, muted: bool) {
        if !self.torn_down {
            self.local_audio.set_muted(muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.local_audio.is_muted()
    }

    /// Merkt sich den Remote Stream. Gibt `false` zurück wenn er schon bekannt ist.
    pub fn attach_remote_stream(&mut self, stream: RemoteStream) -> bool {
        if self.torn_down {
            return false;
        }
        match &self.remote_stream {
            Some(known) if known.stream_id == stream.stream_id => false,
            _ => {
                self.remote_stream = Some(stream);
                true
            }
        }
    }

    pub fn remote_stream(&self) -> Option<&RemoteStream> {
        self.remote_stream.as_ref()
    }

    pub fn remote_stream_available(&self) -> bool {
        self.remote_stream.is_some()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Stoppt alle lokalen Tracks und schließt die Peer Connection
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.local_audio.stop();
        self.peer.close();
        self.remote_stream = None;
        tracing::info!("Media session torn down");
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for MediaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaSession")
            .field("local_audio", &self.local_audio)
            .field("peer_closed", &self.peer.is_closed())
            .field("remote_stream", &self.remote_stream)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
