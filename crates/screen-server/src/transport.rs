//! TCP transport.
//!
//! One accept thread; per client a reader thread (prelude + inbound frames)
//! and a writer thread draining the client's outbound queue. Everything the
//! readers learn is forwarded to the tick thread as [`ClientEvent`]s.

use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, bounded};

use screen_proto::{ControlMessage, FrameKind};

use crate::hub::ClientId;

const OUTBOUND_QUEUE: usize = 1024;
const PRELUDE_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub enum ClientEvent {
    Connected {
        id: ClientId,
        peer: SocketAddr,
        outbound: Sender<Vec<u8>>,
    },
    Control {
        id: ClientId,
        msg: ControlMessage,
    },
    /// A frame arrived that could not be decoded; the connection stays open.
    Malformed {
        id: ClientId,
        reason: String,
    },
    Disconnected {
        id: ClientId,
    },
}

/// Spawn the accept loop. Returns once the listener thread is running.
pub fn spawn_listener(listener: TcpListener, events: Sender<ClientEvent>) -> Result<()> {
    let next_id = Arc::new(AtomicU64::new(1));
    std::thread::Builder::new()
        .name("screen-accept".into())
        .spawn(move || {
            for stream in listener.incoming() {
                let stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!("accept error: {e}");
                        continue;
                    }
                };
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let events = events.clone();
                let spawned = std::thread::Builder::new()
                    .name(format!("screen-client-{id}"))
                    .spawn(move || {
                        if let Err(e) = serve_client(id, stream, &events) {
                            tracing::warn!(client = id, "client session error: {e:#}");
                        }
                        let _ = events.send(ClientEvent::Disconnected { id });
                    });
                if let Err(e) = spawned {
                    tracing::error!(client = id, "spawn client thread: {e}");
                }
            }
        })
        .context("spawn accept thread")?;
    Ok(())
}

fn serve_client(id: ClientId, stream: TcpStream, events: &Sender<ClientEvent>) -> Result<()> {
    let peer = stream.peer_addr().context("peer addr")?;
    stream.set_nodelay(true).ok();

    let mut stream_rx = stream.try_clone().context("try_clone stream for rx")?;
    let mut stream_tx = stream;

    // Handshake once per connection.
    stream_rx.set_read_timeout(Some(PRELUDE_TIMEOUT)).ok();
    screen_proto::write_prelude(&mut stream_tx).context("write prelude")?;
    screen_proto::read_prelude(&mut stream_rx).context("read prelude")?;
    stream_rx.set_read_timeout(None).ok();
    tracing::info!(client = id, %peer, "client connected");

    let (out_tx, out_rx) = bounded::<Vec<u8>>(OUTBOUND_QUEUE);
    stream_tx.set_write_timeout(Some(WRITE_TIMEOUT)).ok();
    std::thread::Builder::new()
        .name(format!("screen-writer-{id}"))
        .spawn(move || run_writer(id, stream_tx, out_rx))
        .context("spawn writer thread")?;

    if events
        .send(ClientEvent::Connected {
            id,
            peer,
            outbound: out_tx,
        })
        .is_err()
    {
        return Ok(());
    }

    loop {
        let (kind, payload) = match screen_proto::read_frame(&mut stream_rx) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::info!(client = id, "client disconnected: {e}");
                return Ok(());
            }
        };
        let event = match kind {
            FrameKind::Control => match screen_proto::decode_control(&payload) {
                Ok(msg) => ClientEvent::Control { id, msg },
                Err(e) => ClientEvent::Malformed {
                    id,
                    reason: format!("bad control payload: {e}"),
                },
            },
            FrameKind::Error => {
                let message = screen_proto::decode_error(&payload).unwrap_or_default();
                tracing::warn!(client = id, message = %message, "client reported error");
                continue;
            }
            other => ClientEvent::Malformed {
                id,
                reason: format!("unexpected frame {other:?}"),
            },
        };
        if events.send(event).is_err() {
            return Ok(());
        }
    }
}

fn run_writer(id: ClientId, mut stream: TcpStream, frames: Receiver<Vec<u8>>) {
    for frame in frames.iter() {
        if let Err(e) = stream.write_all(&frame) {
            tracing::warn!(client = id, "write failed: {e}");
            break;
        }
    }
    let _ = stream.shutdown(std::net::Shutdown::Both);
    tracing::debug!(client = id, "writer stopped");
}
