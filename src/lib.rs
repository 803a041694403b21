//! Softphone - Anruf-Kern für die Operator-Oberfläche
//!
//! Ein Operator kann Sprachanrufe über eine WebRTC Peer Connection führen:
//! - Call State Machine mit Timer, Mute und eingehenden Anrufen
//! - Media Session aus Mikrofon (cpal) und Peer Connection (webrtc)
//! - Events für die Oberfläche, die den Zustand nur darstellt

pub mod call;
pub mod config;
pub mod media;

use once_cell::sync::OnceCell;

pub use call::{CallError, CallEvent, CallHandle, CallSnapshot, CallStateMachine, CallStatus};
pub use config::CallConfig;
pub use media::{MediaError, WebRtcBackend};

static TRACING: OnceCell<()> = OnceCell::new();

/// Standard-Filter wenn `RUST_LOG` nicht gesetzt ist
const DEFAULT_LOG_FILTER: &str = "softphone=debug,softphone_lib=debug,webrtc=warn";

/// Initialisiert das Logging (mehrfacher Aufruf ist ein No-op)
///
/// Ein gesetztes `RUST_LOG` gilt unverändert, sonst `softphone=debug`
/// und `webrtc=warn`.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let rust_log = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV).ok();
        let filter = build_filter(rust_log.as_deref());

        if tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .is_err()
        {
            tracing::debug!("Tracing subscriber already installed");
        }
    });
}

fn build_filter(rust_log: Option<&str>) -> tracing_subscriber::EnvFilter {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(directives) => tracing_subscriber::EnvFilter::new(directives),
        None => tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}
