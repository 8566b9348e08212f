//! Server connection.
//!
//! One long-lived reader thread decodes inbound frames into
//! [`ServerEvent`]s; control frames are written from the caller's thread.

use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, unbounded};

use screen_proto::{ControlMessage, FrameKind, SyncMessage};
use screen_types::Location;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Sync(SyncMessage),
    /// The location no longer hosts a screen.
    Removed(Location),
    /// Error frame sent by the server.
    Error(String),
    Closed,
}

pub struct Connection {
    stream: TcpStream,
    events: Receiver<ServerEvent>,
}

impl Connection {
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let mut stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
            .with_context(|| format!("connect {addr}"))?;
        stream.set_nodelay(true).ok();
        stream.set_write_timeout(Some(WRITE_TIMEOUT)).ok();

        // Handshake once per connection.
        screen_proto::write_prelude(&mut stream).context("write prelude")?;
        let mut stream_rx = stream.try_clone().context("try_clone stream for rx")?;
        stream_rx.set_read_timeout(Some(CONNECT_TIMEOUT)).ok();
        screen_proto::read_prelude(&mut stream_rx).context("read prelude")?;
        stream_rx.set_read_timeout(None).ok();
        tracing::info!(server = %addr, "connected");

        let (tx, rx) = unbounded();
        std::thread::Builder::new()
            .name("screen-rx".into())
            .spawn(move || read_loop(stream_rx, tx))
            .context("spawn reader thread")?;

        Ok(Self { stream, events: rx })
    }

    pub fn events(&self) -> &Receiver<ServerEvent> {
        &self.events
    }

    pub fn send(&mut self, msg: &ControlMessage) -> Result<()> {
        let frame = screen_proto::control_frame(msg).context("encode control")?;
        std::io::Write::write_all(&mut self.stream, &frame).context("write control")?;
        tracing::debug!(location = %msg.location, action = ?msg.action, "control sent");
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

fn read_loop(mut stream: TcpStream, tx: Sender<ServerEvent>) {
    loop {
        let (kind, payload) = match screen_proto::read_frame(&mut stream) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::info!("server connection closed: {e}");
                break;
            }
        };
        let event = match kind {
            FrameKind::Sync => match screen_proto::decode_sync(&payload) {
                Ok(msg) => ServerEvent::Sync(msg),
                Err(e) => {
                    tracing::warn!("bad sync payload: {e}");
                    continue;
                }
            },
            FrameKind::Remove => match screen_proto::decode_remove(&payload) {
                Ok(location) => ServerEvent::Removed(location),
                Err(e) => {
                    tracing::warn!("bad remove payload: {e}");
                    continue;
                }
            },
            FrameKind::Error => {
                ServerEvent::Error(screen_proto::decode_error(&payload).unwrap_or_default())
            }
            FrameKind::Control => {
                tracing::warn!("unexpected control frame from server");
                continue;
            }
        };
        if tx.send(event).is_err() {
            return;
        }
    }
    let _ = tx.send(ServerEvent::Closed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    #[test]
    fn server_frames_become_events() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            screen_proto::read_prelude(&mut stream).unwrap();
            screen_proto::write_prelude(&mut stream).unwrap();
            let (kind, payload) = screen_proto::read_frame(&mut stream).unwrap();
            assert_eq!(kind, FrameKind::Control);
            let control = screen_proto::decode_control(&payload).unwrap();
            let sync = SyncMessage {
                location: control.location,
                url: String::new(),
                playing: false,
                position: 0,
                volume: 0.5,
            };
            stream.write_all(&screen_proto::sync_frame(&sync).unwrap()).unwrap();
            stream
                .write_all(
                    &screen_proto::encode_frame(FrameKind::Error, &screen_proto::encode_error("nope"))
                        .unwrap(),
                )
                .unwrap();
            stream
                .write_all(&screen_proto::remove_frame(control.location).unwrap())
                .unwrap();
        });

        let mut conn = Connection::connect(addr).unwrap();
        conn.send(&ControlMessage::pause(Location::new(1, 2, 3))).unwrap();
        let timeout = Duration::from_secs(5);
        match conn.events().recv_timeout(timeout).unwrap() {
            ServerEvent::Sync(sync) => {
                assert_eq!(sync.location, Location::new(1, 2, 3));
                assert_eq!(sync.volume, 0.5);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            conn.events().recv_timeout(timeout).unwrap(),
            ServerEvent::Error("nope".to_string())
        );
        assert_eq!(
            conn.events().recv_timeout(timeout).unwrap(),
            ServerEvent::Removed(Location::new(1, 2, 3))
        );
        server.join().unwrap();
        assert_eq!(conn.events().recv_timeout(timeout).unwrap(), ServerEvent::Closed);
    }
}
