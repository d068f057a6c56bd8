//! Hub-to-MIDI bridge
//!
//! Logs in to the hub over WebSocket and forwards each received CC frame to
//! the local MIDI output port. Forwarding is gated by a passthrough toggle
//! carried on a watch channel and read per frame, so the toggle's owner can
//! open and close the MIDI gate while the bridge is live. Text messages from
//! the hub are status chatter and only get logged. No reconnection: when the
//! hub goes away, the bridge reports it and stops.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::midi::MidiOut;
use crate::wire::CcFrame;

/// Login URL for a bridge session
pub fn login_url(server_addr: &str, password: &str) -> String {
    format!("ws://{}/login?password={}", server_addr, password)
}

/// Run with the passthrough toggle seeded from config and never flipped
pub async fn run(config: AppConfig, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
    let (_toggle_tx, toggle_rx) = watch::channel(config.midi.passthrough);
    run_with_toggle(config, toggle_rx, shutdown).await
}

/// Run the bridge until the hub disconnects or `shutdown` resolves
pub async fn run_with_toggle(
    config: AppConfig,
    passthrough: watch::Receiver<bool>,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    let mut midi_out =
        MidiOut::connect(&config.midi.output_port).context("Failed to open MIDI output")?;
    info!("MIDI output ready: {}", midi_out.port_name());

    if !*passthrough.borrow() {
        warn!("Passthrough off; frames will be received but not forwarded");
    }

    let url = login_url(&config.server_addr(), &config.server.password);
    let (mut ws_stream, _) = connect_async(&url)
        .await
        .with_context(|| format!("Failed to log in to hub at ws://{}", config.server_addr()))?;
    info!("Logged in to hub at {}", config.server_addr());

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            incoming = ws_stream.next() => match incoming {
                Some(Ok(Message::Binary(data))) => match CcFrame::parse(&data) {
                    Ok(frame) => forward(frame, *passthrough.borrow(), &mut midi_out),
                    Err(e) => warn!("Undecodable frame from hub: {}", e),
                },
                Some(Ok(Message::Text(text))) => match CcFrame::parse_text(&text) {
                    Ok(frame) => forward(frame, *passthrough.borrow(), &mut midi_out),
                    // Non-frame text is hub status chatter
                    Err(_) => info!("Hub: {}", text),
                },
                Some(Ok(Message::Close(_))) | None => {
                    warn!("Hub connection closed");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Hub connection failed: {}", e);
                    break;
                }
            },
            _ = &mut shutdown => {
                info!("Shutting down bridge");
                let _ = ws_stream.close(None).await;
                break;
            }
        }
    }

    Ok(())
}

/// Apply the passthrough gate to one received frame
fn gate(frame: CcFrame, passthrough: bool) -> Option<CcFrame> {
    passthrough.then_some(frame)
}

fn forward(frame: CcFrame, passthrough: bool, midi_out: &mut MidiOut) {
    match gate(frame, passthrough) {
        Some(frame) => {
            if let Err(e) = midi_out.send_cc(frame.cc, frame.value) {
                warn!("MIDI forward of {} failed: {}", frame, e);
            }
        }
        None => debug!("Passthrough off, holding {}", frame),
    }
}
