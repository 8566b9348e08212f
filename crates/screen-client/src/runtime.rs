//! Client runtime: the `watch` tick loop and one-shot `send`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};

use screen_player::backend::NoProbe;
use screen_player::controls::ControlPanel;
use screen_player::mirror::ScreenMirror;
use screen_player::status::RegistryStatus;
use screen_player::surface::{CountingSurfaceProvider, NullSurfaceProvider};
use screen_player::{Observer, PlayerConfig, SessionRegistry};
use screen_proto::{ControlMessage, SyncMessage};
use screen_types::Location;

use crate::cli::SendAction;
use crate::net::{Connection, ServerEvent};

const SNAPSHOT_WAIT: Duration = Duration::from_secs(1);
const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub observer: Option<Observer>,
    pub tick: Duration,
    pub status_every: u64,
    pub quality: Option<i32>,
    pub source: Option<i32>,
    pub speed: Option<i32>,
}

/// Mirror + registry driven by server events and ticks.
pub struct Watcher {
    mirror: ScreenMirror,
    registry: SessionRegistry,
    options: WatchOptions,
    ticks: u64,
}

impl Watcher {
    pub fn new(registry: SessionRegistry, options: WatchOptions) -> Self {
        Self {
            mirror: ScreenMirror::new(),
            registry,
            options,
            ticks: 0,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Apply one server event. Returns `false` once the connection is gone.
    pub fn handle(&mut self, event: ServerEvent) -> bool {
        match event {
            ServerEvent::Sync(msg) => {
                if !self.mirror.contains(msg.location) {
                    self.apply_selections(msg.location);
                }
                self.mirror.apply_sync(&msg, &mut self.registry);
                true
            }
            ServerEvent::Removed(location) => {
                // The session goes on the next maintenance pass.
                if self.mirror.remove(location).is_some() {
                    tracing::info!(%location, "screen removed by server");
                }
                true
            }
            ServerEvent::Error(message) => {
                tracing::warn!(message = %message, "server error");
                true
            }
            ServerEvent::Closed => false,
        }
    }

    fn apply_selections(&mut self, location: Location) {
        let mut panel = ControlPanel::new(location);
        if let Some(index) = self.options.quality {
            panel.select_quality(index, &mut self.mirror, &mut self.registry);
        }
        if let Some(index) = self.options.source {
            panel.select_source(index, &mut self.mirror, &mut self.registry);
        }
        if let Some(index) = self.options.speed {
            panel.select_speed(index, &mut self.mirror, &mut self.registry);
        }
    }

    pub fn tick(&mut self) {
        self.ticks += 1;
        self.mirror
            .advance(self.options.tick.as_millis() as u64);
        self.registry.tick(self.options.observer);

        let cleanup_every = u64::from(self.registry.config().cleanup_interval_ticks.max(1));
        if self.ticks % cleanup_every == 0 {
            self.maintain();
        }

        if self.options.status_every > 0 && self.ticks % self.options.status_every == 0 {
            match serde_json::to_string(&self.status()) {
                Ok(json) => tracing::info!(status = %json, "registry status"),
                Err(e) => tracing::warn!("encode status: {e}"),
            }
        }
    }

    /// Evict stale and distant sessions, then recreate playing ones that came back in range.
    fn maintain(&mut self) {
        let observer = self.options.observer;
        let mirror = &self.mirror;
        self.registry.maintain(observer, |loc| mirror.contains(loc));

        let Some(observer) = observer else {
            return;
        };
        let max_sq = self.registry.config().cleanup_distance.powi(2);
        let revive: Vec<Location> = self
            .mirror
            .iter()
            .filter(|(loc, state)| {
                state.is_playing()
                    && !self.registry.contains(*loc)
                    && loc.distance_sq_to(observer) <= max_sq
            })
            .map(|(loc, _)| loc)
            .collect();
        for location in revive {
            tracing::debug!(%location, "screen back in range");
            self.mirror.reconcile(location, &mut self.registry);
        }
    }

    pub fn status(&self) -> RegistryStatus {
        self.registry.status()
    }

    pub fn shutdown(&mut self) {
        self.registry.clear();
    }
}

/// Connect, mirror server state, and tick until ctrl-c or disconnect.
pub fn run_watch(server: SocketAddr, options: WatchOptions, config: PlayerConfig) -> Result<()> {
    let conn = Connection::connect(server)?;
    let registry = SessionRegistry::new(
        Box::new(NoProbe),
        Box::new(CountingSurfaceProvider::new()),
        config,
    );

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })
    .context("install ctrl-c handler")?;

    let tick = options.tick;
    let mut watcher = Watcher::new(registry, options);
    run_loop(&mut watcher, conn.events(), &shutdown_rx, tick);
    tracing::info!(sessions = watcher.registry().len(), "shutting down");
    watcher.shutdown();
    Ok(())
}

fn run_loop(
    watcher: &mut Watcher,
    events: &Receiver<ServerEvent>,
    shutdown: &Receiver<()>,
    tick: Duration,
) {
    let mut next_tick = Instant::now() + tick;
    loop {
        if shutdown.try_recv().is_ok() {
            return;
        }
        let wait = next_tick.saturating_duration_since(Instant::now());
        match events.recv_timeout(wait) {
            Ok(event) => {
                if !watcher.handle(event) {
                    tracing::warn!("server closed the connection");
                    return;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return,
        }
        if Instant::now() >= next_tick {
            watcher.tick();
            next_tick += tick;
        }
    }
}

/// Validate `action` locally and build the control messages to send.
///
/// Url input goes through the control panel so invalid input never reaches
/// the server.
pub fn build_controls(
    location: Location,
    action: &SendAction,
    mirror: &mut ScreenMirror,
    registry: &mut SessionRegistry,
) -> Result<Vec<ControlMessage>> {
    let mut panel = ControlPanel::new(location);
    let msgs = match action {
        SendAction::Play => vec![ControlMessage::play(location)],
        SendAction::Pause => vec![panel.pause(mirror, registry)],
        SendAction::Stop => vec![panel.stop(mirror, registry)],
        SendAction::Url { input } => {
            let msgs = panel.submit_url(input, mirror, registry);
            if msgs.is_empty() {
                let notice = panel
                    .notice()
                    .map(|n| n.message.clone())
                    .unwrap_or_else(|| "rejected".to_string());
                bail!("{notice}");
            }
            msgs
        }
        SendAction::Volume { value } => {
            if !value.is_finite() || !(0.0..=1.0).contains(value) {
                bail!("volume must be within [0, 1], got {value}");
            }
            vec![ControlMessage::set_volume(location, *value)]
        }
        SendAction::VolumeUp => vec![panel.volume_up(mirror, registry)],
        SendAction::VolumeDown => vec![panel.volume_down(mirror, registry)],
        SendAction::Seek { position_ms } => {
            if *position_ms < 0 {
                bail!("seek position must not be negative");
            }
            vec![ControlMessage::seek(location, *position_ms)]
        }
    };
    Ok(msgs)
}

pub fn snapshot_json(msg: &SyncMessage) -> serde_json::Value {
    serde_json::json!({
        "location": msg.location.to_string(),
        "url": msg.url,
        "playing": msg.playing,
        "position_ms": msg.position,
        "volume": msg.volume,
    })
}

/// Send one command and print the snapshot the server answers with.
pub fn run_send(server: SocketAddr, location: Location, action: SendAction) -> Result<()> {
    let mut conn = Connection::connect(server)?;
    let mut mirror = ScreenMirror::new();
    let mut registry = SessionRegistry::new(
        Box::new(NoProbe),
        Box::new(NullSurfaceProvider),
        PlayerConfig::default(),
    );

    // The server sends every snapshot on connect; the target's current state
    // seeds relative commands such as volume steps.
    let deadline = Instant::now() + SNAPSHOT_WAIT;
    while let Some(event) = recv_until(conn.events(), deadline) {
        match event {
            ServerEvent::Sync(msg) if msg.location == location => {
                mirror.apply_sync(&msg, &mut registry);
                break;
            }
            ServerEvent::Closed => bail!("server closed the connection"),
            _ => {}
        }
    }
    if !mirror.contains(location) {
        tracing::warn!(%location, "no snapshot for screen; sending anyway");
    }

    let msgs = build_controls(location, &action, &mut mirror, &mut registry)?;
    for msg in &msgs {
        conn.send(msg)?;
    }

    let deadline = Instant::now() + REPLY_TIMEOUT;
    let mut last = None;
    let mut replies = 0;
    while replies < msgs.len() {
        match recv_until(conn.events(), deadline) {
            Some(ServerEvent::Sync(msg)) if msg.location == location => {
                replies += 1;
                last = Some(msg);
            }
            Some(ServerEvent::Sync(_)) => {}
            Some(ServerEvent::Removed(removed)) if removed == location => {
                bail!("screen {location} was removed")
            }
            Some(ServerEvent::Removed(_)) => {}
            Some(ServerEvent::Error(message)) => bail!("server rejected command: {message}"),
            Some(ServerEvent::Closed) => bail!("server closed the connection"),
            None => break,
        }
    }
    let last = last.ok_or_else(|| anyhow!("no reply from server for {location}"))?;
    println!("{}", snapshot_json(&last));
    Ok(())
}

fn recv_until(events: &Receiver<ServerEvent>, deadline: Instant) -> Option<ServerEvent> {
    let wait = deadline.saturating_duration_since(Instant::now());
    events.recv_timeout(wait).ok()
}
