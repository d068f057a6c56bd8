//! Outbound WebSocket connection for knob emitters
//!
//! One `Connection` per application, opened by the top-level coordinator. The
//! connection task owns the socket; knobs only ever see a cloneable
//! [`ConnectionHandle`]. Sends are fire-and-forget: no ack, no retry, no
//! reconnection. Once the socket is gone, sends fail softly and the emitters
//! log and carry on.
//!
//! Closing is the coordinator's call, not the emitters': `close` tells the
//! writer task to flush and stop even while emitters still hold handles.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::knob::FrameSink;
use crate::wire::CcFrame;

/// Outbound frame buffer; overflow means the UI is far ahead of the socket
const SEND_BUFFER: usize = 64;

/// Cheap, cloneable handle knobs use to emit frames
#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<CcFrame>,
}

#[async_trait]
impl FrameSink for ConnectionHandle {
    async fn send(&self, frame: CcFrame) -> Result<()> {
        // try_send keeps the emitter from ever blocking on the socket
        self.tx
            .try_send(frame)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(f) => {
                    anyhow::anyhow!("send buffer full, dropped {}", f)
                }
                mpsc::error::TrySendError::Closed(f) => {
                    anyhow::anyhow!("connection closed, dropped {}", f)
                }
            })
    }
}

/// An open connection to the hub
pub struct Connection {
    handle: ConnectionHandle,
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl Connection {
    /// Dial the hub and spawn the writer task
    pub async fn open(url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to connect to {}", url))?;
        info!("WebSocket connection established: {}", url);

        let (tx, mut rx) = mpsc::channel::<CcFrame>(SEND_BUFFER);
        let (close_tx, mut close_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let (mut sink, mut stream) = ws_stream.split();

            loop {
                tokio::select! {
                    // Coordinator asked us to stop (or dropped the Connection)
                    _ = &mut close_rx => {
                        // Flush frames queued before the close request
                        while let Ok(frame) = rx.try_recv() {
                            let _ = sink.send(Message::Binary(frame.encode().to_vec())).await;
                        }
                        let _ = sink.close().await;
                        break;
                    }
                    frame = rx.recv() => match frame {
                        Some(frame) => {
                            debug!("→ {}", frame);
                            if let Err(e) = sink.send(Message::Binary(frame.encode().to_vec())).await {
                                warn!("WebSocket write failed: {}", e);
                                break;
                            }
                        }
                        // All handles dropped: close cleanly
                        None => {
                            let _ = sink.close().await;
                            break;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Close(_))) | None => {
                            info!("WebSocket connection closed");
                            break;
                        }
                        // The hub does not talk back to emitters
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("WebSocket read failed: {}", e);
                            break;
                        }
                    },
                }
            }
            info!("Connection task finished");
        });

        Ok(Self {
            handle: ConnectionHandle { tx },
            close_tx,
            task,
        })
    }

    /// Handle to pass into each knob emitter
    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    /// Flush, close the socket, and wait for the writer to finish
    ///
    /// Works even while emitters still hold handle clones; their later sends
    /// fail softly.
    pub async fn close(self) {
        let Connection {
            handle,
            close_tx,
            task,
        } = self;
        drop(handle);
        let _ = close_tx.send(());
        let _ = task.await;
    }
}
