//! Interactive knob surface (REPL) and one-shot test emission
//!
//! Stands in for the web frontend when jamming from a terminal: builds the
//! configured knob bank against one hub connection and turns `cc=value` lines
//! into change events.

use anyhow::{Context, Result};
use rustyline::DefaultEditor;
use tracing::info;

use crate::config::AppConfig;
use crate::connection::Connection;
use crate::knob::{build_bank, FrameSink, KnobEmitter};
use crate::wire::CcFrame;

/// Parse a `cc=value` pair entered by the user
pub fn parse_change(spec: &str) -> Result<(u8, u8)> {
    let (cc, value) = spec
        .split_once('=')
        .with_context(|| format!("Expected cc=value, got '{}'", spec))?;
    let cc: u8 = cc.trim().parse().context("cc must be 0-127")?;
    let value: u8 = value.trim().parse().context("value must be 0-127")?;
    if cc > 127 || value > 127 {
        anyhow::bail!("cc and value must be 0-127");
    }
    Ok((cc, value))
}

/// Send a single frame straight to the hub, then close
///
/// Bypasses the knob state machine: a test emission must go out even when it
/// matches a knob's resting value (a fresh knob holds 0, so `--emit 2=0`
/// would otherwise be dedupe-suppressed).
pub async fn emit_once(config: &AppConfig, cc: u8, value: u8) -> Result<()> {
    let url = format!("ws://{}/ws", config.server_addr());
    let conn = Connection::open(&url).await?;

    let frame = CcFrame::new(cc, value);
    conn.handle().send(frame).await?;
    conn.close().await;

    info!("Emitted {}", frame);
    Ok(())
}

pub async fn run_repl(config: AppConfig) -> Result<()> {
    let url = format!("ws://{}/ws", config.server_addr());
    let conn = Connection::open(&url).await?;

    let mut bank = build_bank(&config.knobs, conn.handle());
    if bank.is_empty() {
        anyhow::bail!("No knobs configured; add a knobs section to the config");
    }

    info!("Knob surface ready ({} knobs). cc=value to turn, 'list', 'exit'.", bank.len());

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("knob> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line == "exit" || line == "quit" {
                    break;
                }
                if line.is_empty() {
                    continue;
                }
                if line == "list" {
                    print_bank(&bank);
                    continue;
                }
                match parse_change(line) {
                    Ok((cc, value)) => match bank.iter_mut().find(|e| e.control().cc() == cc) {
                        Some(emitter) => emitter.on_change(value).await,
                        None => println!("No knob with cc {}", cc),
                    },
                    Err(e) => println!("{}", e),
                }
            }
            Err(_) => break,
        }
    }

    conn.close().await;
    Ok(())
}

fn print_bank<S: FrameSink>(bank: &[KnobEmitter<S>]) {
    for emitter in bank {
        let knob = emitter.control();
        println!("  cc {:3}  {:20} value {}", knob.cc(), knob.label(), knob.value());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MidiConfig, ServerConfig};
    use futures_util::StreamExt;
    use std::net::SocketAddr;
    use tokio_tungstenite::tungstenite::Message;

    fn make_test_config(addr: SocketAddr) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
                password: "jam".to_string(),
                ..Default::default()
            },
            midi: MidiConfig {
                output_port: "test".to_string(),
                passthrough: true,
            },
            knobs: vec![],
        }
    }

    #[test]
    fn test_parse_change() {
        assert_eq!(parse_change("2=64").unwrap(), (2, 64));
        assert_eq!(parse_change(" 7 = 127 ").unwrap(), (7, 127));
        assert!(parse_change("2").is_err());
        assert!(parse_change("2=700").is_err());
        assert!(parse_change("2=200").is_err());
        assert!(parse_change("x=64").is_err());
    }

    #[tokio::test]
    async fn test_emit_once_transmits_resting_value() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let mut frames = Vec::new();
            while let Some(Ok(msg)) = ws.next().await {
                match msg {
                    Message::Binary(data) => frames.push(data),
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            frames
        });

        // Value 0 matches a fresh knob's resting value; it must still go out
        emit_once(&make_test_config(addr), 2, 0).await.unwrap();

        assert_eq!(server.await.unwrap(), vec![vec![0x02, 0x00]]);
    }
}
