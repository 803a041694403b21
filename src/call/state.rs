//! Call Session State
//!
//! Der einzige (laufende oder wartende) Anruf und seine Snapshots für
//! die Benutzeroberfläche.

use serde::Serialize;
use std::fmt;

// ============================================================================
// CALL STATUS
// ============================================================================

/// Aktueller Status des Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Kein Anruf
    Idle,
    /// Eingehender Anruf wartet auf Antwort
    IncomingRinging,
    /// Mikrofon und Peer Connection werden aufgebaut
    Connecting,
    /// Anruf aktiv, Timer läuft
    Active,
    /// Anruf beendet, Teardown läuft
    Ended,
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallStatus::Idle => write!(f, "idle"),
            CallStatus::IncomingRinging => write!(f, "incoming_ringing"),
            CallStatus::Connecting => write!(f, "connecting"),
            CallStatus::Active => write!(f, "active"),
            CallStatus::Ended => write!(f, "ended"),
        }
    }
}

// ============================================================================
// CALL SESSION
// ============================================================================

/// Zustand des einzigen Anrufs. Wird ausschließlich von der
/// State Machine verändert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub status: CallStatus,
    pub remote_address: String,
    pub caller_display_name: Option<String>,
    pub duration_secs: u64,
    pub muted: bool,
}

impl Default for CallSession {
    fn default() -> Self {
        Self {
            status: CallStatus::Idle,
            remote_address: String::new(),
            caller_display_name: None,
            duration_secs: 0,
            muted: false,
        }
    }
}

impl CallSession {
    /// Zurück auf `Idle`, alle Felder geleert
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Prüft die Invarianten des Anrufs
    pub fn is_consistent(&self) -> bool {
        let duration_ok = self.duration_secs == 0 || self.status == CallStatus::Active;
        let address_ok = self.status == CallStatus::Idle || !self.remote_address.is_empty();
        duration_ok && address_ok
    }

    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            status: self.status,
            remote_address: self.remote_address.clone(),
            caller_display_name: self.caller_display_name.clone(),
            duration_secs: self.duration_secs,
            muted: self.muted,
        }
    }
}

/// Zustand nach jedem Übergang, wie er an die Oberfläche geht
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSnapshot {
    pub status: CallStatus,
    pub remote_address: String,
    pub caller_display_name: Option<String>,
    pub duration_secs: u64,
    pub muted: bool,
}

impl CallSnapshot {
    /// Dauer als `mm:ss`
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration_secs)
    }
}

/// Formatiert Sekunden als `mm:ss` (Minuten laufen über 59 hinaus weiter)
pub fn format_duration(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
