//! Konfiguration des Softphone-Kerns
//!
//! Alle Werte sind feste Konstanten. Der Kern liest keine Umgebungsvariablen,
//! nur das Binary darf einzelne Werte für Demos überschreiben.

use crate::media::AudioConstraints;
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Öffentliche Google STUN Server (kein TURN, keine Authentifizierung)
pub const DEFAULT_ICE_SERVERS: [&str; 2] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
];

/// Verzögerung bis zum simulierten eingehenden Anruf
pub const INCOMING_CALL_DELAY: Duration = Duration::from_secs(5);

/// Wahrscheinlichkeit, dass der simulierte Anruf überhaupt ausgelöst wird
pub const INCOMING_CALL_PROBABILITY: f64 = 0.3;

const CALLER_NAMES: [&str; 4] = [
    "Мария Петрова",
    "Иван Сидоров",
    "Елена Волкова",
    "Алексей Новиков",
];

const CALLER_NUMBERS: [&str; 3] = [
    "+7 (999) 111-22-33",
    "+7 (999) 222-33-44",
    "+7 (999) 333-44-55",
];

// ============================================================================
// CONFIG STRUCTS
// ============================================================================

/// Gesamtkonfiguration für Call State Machine und Media Session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallConfig {
    /// Geordnete Liste von ICE Server URLs
    pub ice_servers: Vec<String>,
    pub audio: AudioConstraints,
    pub incoming: IncomingSimulationConfig,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ice_servers: DEFAULT_ICE_SERVERS.iter().map(|s| s.to_string()).collect(),
            audio: AudioConstraints::default(),
            incoming: IncomingSimulationConfig::default(),
        }
    }
}

/// Parameter des simulierten eingehenden Anrufs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IncomingSimulationConfig {
    #[serde(with = "duration_secs")]
    pub delay: Duration,
    pub probability: f64,
    pub caller_names: Vec<String>,
    pub caller_numbers: Vec<String>,
}

impl Default for IncomingSimulationConfig {
    fn default() -> Self {
        Self {
            delay: INCOMING_CALL_DELAY,
            probability: INCOMING_CALL_PROBABILITY,
            caller_names: CALLER_NAMES.iter().map(|s| s.to_string()).collect(),
            caller_numbers: CALLER_NUMBERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Serialisiert `Duration` als ganze Sekunden
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
