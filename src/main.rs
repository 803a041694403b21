//! Konsolen-Oberfläche für den Softphone-Kern
//!
//! Liest Befehle von stdin und gibt Zustand und Hinweise aus.

use anyhow::{Context, Result};
use softphone_lib::call::{
    format_duration, CallEvent, CallStateMachine, NoIncomingCalls, SimulatedIncomingCalls,
};
use softphone_lib::{init_tracing, CallConfig, WebRtcBackend};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

const HELP: &str = "Commands: dial <number> | accept | reject | hangup | mute | status | help | quit";

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config()?;
    tracing::info!(
        "Starting softphone with config: {}",
        serde_json::to_string(&config)?
    );

    let machine = CallStateMachine::new(config.clone(), WebRtcBackend).on_call_ended(|secs| {
        println!("Call finished after {} ({} s)", format_duration(secs), secs);
    });
    let machine = if simulate_incoming() {
        machine.with_incoming_source(SimulatedIncomingCalls::new(config.incoming.clone()))
    } else {
        machine.with_incoming_source(NoIncomingCalls)
    };
    let handle = machine.spawn();

    let mut events = handle.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Console skipped {} call events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        let (command, argument) = line.split_once(' ').unwrap_or((line, ""));

        let result = match command {
            "" => continue,
            "dial" => handle.dial(argument).await,
            "accept" => handle.accept().await,
            "reject" => handle.reject().await,
            "hangup" => handle.hang_up().await,
            "mute" => handle.toggle_mute().await,
            "status" => {
                let snapshot = handle.snapshot().await?;
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                Ok(())
            }
            "help" => {
                println!("{}", HELP);
                Ok(())
            }
            "quit" | "exit" => break,
            other => {
                println!("Unknown command: {}", other);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("! {}", e);
        }
    }

    handle.shutdown().await?;
    Ok(())
}

/// Standardkonfiguration mit optionalen Demo-Overrides
fn load_config() -> Result<CallConfig> {
    let mut config = CallConfig::default();

    if let Ok(delay) = std::env::var("SOFTPHONE_INCOMING_DELAY_SECS") {
        let secs: u64 = delay
            .parse()
            .with_context(|| format!("Invalid SOFTPHONE_INCOMING_DELAY_SECS: {}", delay))?;
        config.incoming.delay = Duration::from_secs(secs);
    }

    Ok(config)
}

fn simulate_incoming() -> bool {
    std::env::var("SOFTPHONE_SIMULATE_INCOMING")
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(true)
}

fn print_event(event: &CallEvent) {
    match event {
        CallEvent::StateChanged(snapshot) => {
            let caller = snapshot
                .caller_display_name
                .as_deref()
                .map(|name| format!(" ({})", name))
                .unwrap_or_default();
            println!(
                "[{}] {}{} {}{}",
                snapshot.status,
                snapshot.remote_address,
                caller,
                snapshot.formatted_duration(),
                if snapshot.muted { " [muted]" } else { "" }
            );
        }
        CallEvent::Notice(text) => println!("* {}", text),
        CallEvent::Failed(error) => println!("! {}", error),
        CallEvent::RemoteStream(stream) => println!("* Remote audio: {}", stream.stream_id),
        CallEvent::CallEnded { .. } | CallEvent::IceCandidate { .. } => {}
    }
}
