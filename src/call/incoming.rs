//! Quellen für eingehende Anrufe
//!
//! Solange kein echter Signaling-Kanal existiert, kommen eingehende Anrufe
//! aus einer austauschbaren Quelle: simuliert, manuell ausgelöst oder gar nicht.

use crate::config::IncomingSimulationConfig;
use futures::future::{BoxFuture, FutureExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

/// Ein erkannter eingehender Anruf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCall {
    pub caller_name: String,
    pub number: String,
}

/// Liefert eingehende Anrufe. `None` beendet die Quelle.
pub trait IncomingCallSource: Send + 'static {
    fn next_call(&mut self) -> BoxFuture<'_, Option<IncomingCall>>;
}

// ============================================================================
// SIMULATED
// ============================================================================

/// Einmaliger, verzögerter Zufallsanruf aus festen Namens- und Nummernlisten
pub struct SimulatedIncomingCalls {
    config: IncomingSimulationConfig,
    rng: StdRng,
    fired: bool,
}

impl SimulatedIncomingCalls {
    pub fn new(config: IncomingSimulationConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
            fired: false,
        }
    }

    /// Deterministische Variante für Tests
    pub fn with_seed(config: IncomingSimulationConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            fired: false,
        }
    }

    fn roll(&mut self) -> Option<IncomingCall> {
        let probability = self.config.probability;
        if !(probability > 0.0) || !self.rng.gen_bool(probability.min(1.0)) {
            return None;
        }

        // Name und Nummer werden unabhängig gewählt
        let caller_name = self.config.caller_names.choose(&mut self.rng)?.clone();
        let number = self.config.caller_numbers.choose(&mut self.rng)?.clone();
        Some(IncomingCall {
            caller_name,
            number,
        })
    }
}

impl IncomingCallSource for SimulatedIncomingCalls {
    fn next_call(&mut self) -> BoxFuture<'_, Option<IncomingCall>> {
        async move {
            if self.fired {
                return None;
            }
            self.fired = true;

            tokio::time::sleep(self.config.delay).await;
            let call = self.roll();
            if call.is_none() {
                tracing::debug!("Simulated incoming call skipped");
            }
            call
        }
        .boxed()
    }
}

// ============================================================================
// MANUAL
// ============================================================================

/// Löst eingehende Anrufe von außen aus (Tests, späterer Signaling-Kanal)
#[derive(Debug, Clone)]
pub struct IncomingCallTrigger {
    tx: mpsc::UnboundedSender<IncomingCall>,
}

impl IncomingCallTrigger {
    /// Gibt `false` zurück wenn die State Machine nicht mehr läuft
    pub fn trigger(&self, caller_name: impl Into<String>, number: impl Into<String>) -> bool {
        self.tx
            .send(IncomingCall {
                caller_name: caller_name.into(),
                number: number.into(),
            })
            .is_ok()
    }
}

pub struct ManualIncomingCalls {
    rx: mpsc::UnboundedReceiver<IncomingCall>,
}

/// Erstellt ein Trigger/Quelle-Paar
pub fn manual_incoming_calls() -> (IncomingCallTrigger, ManualIncomingCalls) {
    let (tx, rx) = mpsc::unbounded_channel();
    (IncomingCallTrigger { tx }, ManualIncomingCalls { rx })
}

impl IncomingCallSource for ManualIncomingCalls {
    fn next_call(&mut self) -> BoxFuture<'_, Option<IncomingCall>> {
        self.rx.recv().boxed()
    }
}

// ============================================================================
// NONE
// ============================================================================

/// Keine eingehenden Anrufe
#[derive(Debug, Default)]
pub struct NoIncomingCalls;

impl IncomingCallSource for NoIncomingCalls {
    fn next_call(&mut self) -> BoxFuture<'_, Option<IncomingCall>> {
        futures::future::ready(None).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn always_fire() -> IncomingSimulationConfig {
        IncomingSimulationConfig {
            probability: 1.0,
            ..IncomingSimulationConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_call_fires_once_after_delay() {
        let config = always_fire();
        let mut source = SimulatedIncomingCalls::with_seed(config.clone(), 7);

        let started = tokio::time::Instant::now();
        let call = source.next_call().await.expect("call should fire");
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(config.caller_names.contains(&call.caller_name));
        assert!(config.caller_numbers.contains(&call.number));

        // Einmalig, keine Wiederholung
        assert!(source.next_call().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_call_never_fires_with_zero_probability() {
        let config = IncomingSimulationConfig {
            probability: 0.0,
            ..IncomingSimulationConfig::default()
        };
        let mut source = SimulatedIncomingCalls::with_seed(config, 7);
        assert!(source.next_call().await.is_none());
    }

    #[tokio::test]
    async fn test_simulated_call_with_empty_pool_does_not_fire() {
        let config = IncomingSimulationConfig {
            delay: Duration::ZERO,
            caller_names: Vec::new(),
            ..always_fire()
        };
        let mut source = SimulatedIncomingCalls::with_seed(config, 1);
        assert!(source.next_call().await.is_none());
    }

    #[tokio::test]
    async fn test_manual_trigger_delivers_calls() {
        let (trigger, mut source) = manual_incoming_calls();
        assert!(trigger.trigger("Елена Волкова", "+7 (999) 333-44-55"));

        let call = source.next_call().await.unwrap();
        assert_eq!(call.caller_name, "Елена Волкова");
        assert_eq!(call.number, "+7 (999) 333-44-55");

        drop(trigger);
        assert!(source.next_call().await.is_none());
    }

    #[tokio::test]
    async fn test_no_incoming_calls() {
        assert!(NoIncomingCalls.next_call().await.is_none());
    }
}
