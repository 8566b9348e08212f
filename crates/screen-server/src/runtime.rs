//! Server tick loop.
//!
//! The tick thread is the only owner of the store and the hub. Transport
//! threads feed it [`ClientEvent`]s; ctrl-c feeds it a shutdown signal so
//! dirty state is saved before the process exits. The config file, when
//! there is one, is polled so screens can be added or removed while running.

use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, unbounded};

use screen_proto::{FrameKind, SyncMessage};
use screen_types::Location;

use crate::config::{self, ServerConfig, ServerSettings};
use crate::hub::{ClientHub, ClientId};
use crate::store::ScreenStore;
use crate::transport::{self, ClientEvent};

/// Check the config file for changes every N ticks.
const CONFIG_POLL_TICKS: u64 = 100;

/// Store + hub, driven by events and ticks.
pub struct Server {
    store: ScreenStore,
    hub: ClientHub,
    state_path: PathBuf,
    tick_ms: u64,
    save_interval_ticks: u64,
    ticks: u64,
}

impl Server {
    pub fn new(store: ScreenStore, settings: &ServerSettings) -> Self {
        Self {
            store,
            hub: ClientHub::new(),
            state_path: settings.state_path.clone(),
            tick_ms: settings.tick.as_millis() as u64,
            save_interval_ticks: settings.save_interval_ticks,
            ticks: 0,
        }
    }

    pub fn store(&self) -> &ScreenStore {
        &self.store
    }

    pub fn client_count(&self) -> usize {
        self.hub.len()
    }

    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connected { id, peer, outbound } => {
                self.hub.add(id, outbound);
                let snapshots = self.store.snapshots();
                tracing::info!(client = id, %peer, screens = snapshots.len(), "sending initial snapshots");
                for sync in &snapshots {
                    match screen_proto::sync_frame(sync) {
                        Ok(frame) => {
                            if !self.hub.send_to(id, frame) {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!(location = %sync.location, "encode sync: {e}"),
                    }
                }
            }
            ClientEvent::Control { id, msg } => match self.store.apply_control(&msg) {
                Some(sync) => self.broadcast(&sync),
                None => self.send_error(id, &format!("unknown screen {}", msg.location)),
            },
            ClientEvent::Malformed { id, reason } => {
                tracing::warn!(client = id, reason = %reason, "malformed frame");
                self.send_error(id, &reason);
            }
            ClientEvent::Disconnected { id } => {
                if self.hub.remove(id) {
                    tracing::info!(client = id, clients = self.hub.len(), "client removed");
                }
                if self.hub.is_empty() {
                    tracing::debug!("no clients connected");
                }
            }
        }
    }

    /// Make `screens` the exact set of registered screens.
    ///
    /// Screens no longer listed lose their state and every client is told to
    /// drop them; newly listed screens are announced with a fresh snapshot.
    pub fn sync_screens(&mut self, screens: &[Location]) {
        for location in self.store.locations() {
            if !screens.contains(&location) {
                self.remove_screen(location);
            }
        }
        for location in screens {
            if self.store.register(*location) {
                tracing::info!(%location, "registered configured screen");
                if let Some(sync) = self.store.snapshot(*location) {
                    self.broadcast(&sync);
                }
            }
        }
    }

    /// Unregister one screen and broadcast its removal.
    pub fn remove_screen(&mut self, location: Location) -> bool {
        if !self.store.unregister(location) {
            return false;
        }
        tracing::info!(%location, "screen unregistered");
        match screen_proto::remove_frame(location) {
            Ok(frame) => {
                let reached = self.hub.broadcast(&frame);
                tracing::debug!(%location, clients = reached, "removal broadcast");
            }
            Err(e) => tracing::warn!(%location, "encode remove: {e}"),
        }
        true
    }

    /// One tick: advance playing screens, save periodically.
    pub fn tick(&mut self) {
        self.ticks += 1;
        self.store.advance(self.tick_ms);
        if self.ticks % self.save_interval_ticks == 0 && self.store.is_dirty() {
            if let Err(e) = self.store.save(&self.state_path) {
                tracing::warn!("periodic save failed: {e:#}");
            }
        }
    }

    /// Save if anything changed since the last save.
    pub fn flush(&mut self) -> Result<()> {
        if self.store.is_dirty() {
            self.store.save(&self.state_path)?;
            tracing::info!(path = ?self.state_path, "state saved");
        }
        Ok(())
    }

    fn broadcast(&mut self, sync: &SyncMessage) {
        match screen_proto::sync_frame(sync) {
            Ok(frame) => {
                let reached = self.hub.broadcast(&frame);
                tracing::debug!(location = %sync.location, clients = reached, "sync broadcast");
            }
            Err(e) => tracing::warn!(location = %sync.location, "encode sync: {e}"),
        }
    }

    fn send_error(&mut self, id: ClientId, message: &str) {
        match screen_proto::encode_frame(FrameKind::Error, &screen_proto::encode_error(message)) {
            Ok(frame) => {
                self.hub.send_to(id, frame);
            }
            Err(e) => tracing::warn!(client = id, "encode error frame: {e}"),
        }
    }
}

/// Watches the config file's modification time for screen list changes.
struct ConfigWatch {
    path: PathBuf,
    modified: Option<SystemTime>,
}

impl ConfigWatch {
    fn new(path: PathBuf) -> Self {
        let modified = modified_at(&path);
        Self { path, modified }
    }

    /// The new screen list, if the file changed and still lists screens.
    fn poll(&mut self) -> Option<Vec<Location>> {
        let modified = modified_at(&self.path);
        if modified.is_none() || modified == self.modified {
            return None;
        }
        self.modified = modified;
        let parsed = ServerConfig::load(&self.path)
            .and_then(|cfg| config::screens_from_config(&cfg));
        match parsed {
            Ok(screens) => {
                tracing::info!(path = ?self.path, "config changed");
                screens
            }
            Err(e) => {
                tracing::warn!(path = ?self.path, "config reload failed: {e:#}");
                None
            }
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Load state, start the transport, and run until ctrl-c.
pub fn run(settings: ServerSettings, config_path: Option<PathBuf>) -> Result<()> {
    let store = ScreenStore::load(&settings.state_path)?;
    let mut server = Server::new(store, &settings);
    if let Some(screens) = &settings.screens {
        server.sync_screens(screens);
    }

    if server.store().is_empty() {
        tracing::warn!("no screens configured or persisted; controls will be rejected");
    }

    let listener =
        TcpListener::bind(settings.bind).with_context(|| format!("bind {}", settings.bind))?;
    tracing::info!(bind = %settings.bind, screens = server.store().len(), "listening");

    let (event_tx, event_rx) = unbounded();
    transport::spawn_listener(listener, event_tx)?;

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("install ctrl-c handler")?;

    let mut watch = config_path.map(ConfigWatch::new);
    run_loop(&mut server, &event_rx, &shutdown_rx, &mut watch, settings.tick);
    tracing::info!("shutting down");
    server.flush()
}

fn run_loop(
    server: &mut Server,
    events: &Receiver<ClientEvent>,
    shutdown: &Receiver<()>,
    watch: &mut Option<ConfigWatch>,
    tick: Duration,
) {
    let mut next_tick = Instant::now() + tick;
    loop {
        if shutdown.try_recv().is_ok() {
            return;
        }
        let wait = next_tick.saturating_duration_since(Instant::now());
        match events.recv_timeout(wait) {
            Ok(event) => server.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::error!("transport stopped");
                return;
            }
        }
        if Instant::now() >= next_tick {
            server.tick();
            next_tick += tick;
            if server.ticks % CONFIG_POLL_TICKS == 0 {
                if let Some(screens) = watch.as_mut().and_then(ConfigWatch::poll) {
                    server.sync_screens(&screens);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Sender;
    use screen_proto::ControlMessage;

    fn settings(tag: &str) -> ServerSettings {
        ServerSettings {
            bind: "127.0.0.1:0".parse().unwrap(),
            state_path: std::env::temp_dir()
                .join(format!(
                    "screen-runtime-{tag}-{}",
                    std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap()
                        .as_nanos()
                ))
                .join("screens.json"),
            tick: Duration::from_millis(50),
            save_interval_ticks: 2,
            screens: None,
        }
    }

    fn server(tag: &str) -> Server {
        let mut store = ScreenStore::new();
        store.register(Location::new(0, 0, 0));
        store.register(Location::new(1, 0, 0));
        Server::new(store, &settings(tag))
    }

    fn connect(server: &mut Server, id: ClientId) -> Receiver<Vec<u8>> {
        let (tx, rx): (Sender<Vec<u8>>, _) = bounded(64);
        server.handle_event(ClientEvent::Connected {
            id,
            peer: "127.0.0.1:1".parse().unwrap(),
            outbound: tx,
        });
        rx
    }

    fn decode(frame: &[u8]) -> (FrameKind, Vec<u8>) {
        screen_proto::read_frame(std::io::Cursor::new(frame)).unwrap()
    }

    #[test]
    fn connect_sends_every_snapshot() {
        let mut server = server("connect");
        let rx = connect(&mut server, 1);
        let frames: Vec<_> = rx.try_iter().collect();
        assert_eq!(frames.len(), 2);
        let (kind, payload) = decode(&frames[0]);
        assert_eq!(kind, FrameKind::Sync);
        assert_eq!(
            screen_proto::decode_sync(&payload).unwrap().location,
            Location::new(0, 0, 0)
        );
    }

    #[test]
    fn control_is_broadcast_to_all_clients() {
        let mut server = server("broadcast");
        let rx1 = connect(&mut server, 1);
        let rx2 = connect(&mut server, 2);
        rx1.try_iter().count();
        rx2.try_iter().count();

        server.handle_event(ClientEvent::Control {
            id: 1,
            msg: ControlMessage::set_url(Location::new(1, 0, 0), "https://youtu.be/abc12345678"),
        });
        for rx in [&rx1, &rx2] {
            let (kind, payload) = decode(&rx.try_recv().unwrap());
            assert_eq!(kind, FrameKind::Sync);
            let sync = screen_proto::decode_sync(&payload).unwrap();
            assert_eq!(sync.url, "https://www.youtube.com/watch?v=abc12345678");
            assert!(!sync.playing);
        }
    }

    #[test]
    fn unknown_screen_errors_only_to_sender() {
        let mut server = server("unknown");
        let rx1 = connect(&mut server, 1);
        let rx2 = connect(&mut server, 2);
        rx1.try_iter().count();
        rx2.try_iter().count();

        server.handle_event(ClientEvent::Control {
            id: 2,
            msg: ControlMessage::play(Location::new(50, 50, 50)),
        });
        assert!(rx1.try_recv().is_err());
        let (kind, payload) = decode(&rx2.try_recv().unwrap());
        assert_eq!(kind, FrameKind::Error);
        assert!(screen_proto::decode_error(&payload).unwrap().contains("50,50,50"));
    }

    #[test]
    fn disconnect_removes_client() {
        let mut server = server("disconnect");
        let _rx = connect(&mut server, 1);
        assert_eq!(server.client_count(), 1);
        server.handle_event(ClientEvent::Disconnected { id: 1 });
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn ticks_advance_and_save_periodically() {
        let mut server = server("save");
        let path = server.state_path.clone();
        server.handle_event(ClientEvent::Control {
            id: 9,
            msg: ControlMessage::set_url(Location::new(0, 0, 0), "https://youtu.be/abc12345678"),
        });
        server.handle_event(ClientEvent::Control {
            id: 9,
            msg: ControlMessage::play(Location::new(0, 0, 0)),
        });
        server.tick();
        assert!(!path.exists());
        server.tick();
        assert!(path.exists());
        assert_eq!(
            server.store().snapshot(Location::new(0, 0, 0)).unwrap().position,
            100
        );

        server.handle_event(ClientEvent::Control {
            id: 9,
            msg: ControlMessage::pause(Location::new(0, 0, 0)),
        });
        assert!(server.store().is_dirty());
        server.flush().unwrap();
        assert!(!server.store().is_dirty());
        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn dropped_screens_are_removed_from_every_client() {
        let mut server = server("sync-screens");
        let rx1 = connect(&mut server, 1);
        let rx2 = connect(&mut server, 2);
        rx1.try_iter().count();
        rx2.try_iter().count();

        server.sync_screens(&[Location::new(1, 0, 0), Location::new(2, 0, 0)]);
        assert_eq!(
            server.store().locations(),
            vec![Location::new(1, 0, 0), Location::new(2, 0, 0)]
        );
        for rx in [&rx1, &rx2] {
            let (kind, payload) = decode(&rx.try_recv().unwrap());
            assert_eq!(kind, FrameKind::Remove);
            assert_eq!(screen_proto::decode_remove(&payload).unwrap(), Location::new(0, 0, 0));
            let (kind, payload) = decode(&rx.try_recv().unwrap());
            assert_eq!(kind, FrameKind::Sync);
            assert_eq!(
                screen_proto::decode_sync(&payload).unwrap().location,
                Location::new(2, 0, 0)
            );
            assert!(rx.try_recv().is_err());
        }

        server.handle_event(ClientEvent::Control {
            id: 1,
            msg: ControlMessage::play(Location::new(0, 0, 0)),
        });
        let (kind, _) = decode(&rx1.try_recv().unwrap());
        assert_eq!(kind, FrameKind::Error);
        assert!(!server.remove_screen(Location::new(0, 0, 0)));
    }

    #[test]
    fn config_watch_reports_changed_screen_list() {
        let dir = settings("watch").state_path.parent().unwrap().to_path_buf();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, r#"screens = ["0,0,0"]"#).unwrap();

        let mut watch = ConfigWatch::new(path.clone());
        assert_eq!(watch.poll(), None);

        std::fs::write(&path, r#"screens = ["1,0,0"]"#).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(10))
            .unwrap();
        assert_eq!(watch.poll(), Some(vec![Location::new(1, 0, 0)]));
        assert_eq!(watch.poll(), None);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
