//! Call Module - Anruf-Zustand und State Machine
//!
//! Dieses Modul verwaltet:
//! - Den Status des einzigen Anrufs (Idle, Ringing, Connecting, Active, Ended)
//! - Den Gesprächs-Timer und Mute
//! - Eingehende Anrufe (simuliert oder manuell ausgelöst)
//! - Die Orchestrierung der Media Session

mod incoming;
mod machine;
mod state;

pub use incoming::{
    manual_incoming_calls, IncomingCall, IncomingCallSource, IncomingCallTrigger,
    ManualIncomingCalls, NoIncomingCalls, SimulatedIncomingCalls,
};
pub use machine::{CallEndedCallback, CallError, CallEvent, CallHandle, CallStateMachine};
pub use state::{format_duration, CallSession, CallSnapshot, CallStatus};
