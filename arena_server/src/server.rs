//! UDP front end.
//!
//! Owns the one socket shared by every room: a receive loop demultiplexes
//! datagrams by sender address into per-room ingestion queues, a once-a-
//! second sweep handles idle disconnects and finished rooms, and a small
//! lobby collects joiners until a room's worth of players is available.
//!
//! The wire protocol has no heartbeat, so a silently vanished client is
//! only detectable here: a peer idle longer than `idle_timeout_secs` gets a
//! synthesized Leave routed into its room, exactly as if it had
//! disconnected on purpose.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use arena_shared::config::ServerConfig;
use arena_shared::level::LevelSet;
use arena_shared::net::{Transport, UdpTransport};
use arena_shared::wire::{ClientId, Msg, WireError};
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ingest::IngestQueue;
use crate::room::{RoomMember, RoomSim};

/// Client ids start high so they never collide with per-room registry
/// entity ids on the wire.
pub const CLIENT_ID_BASE: u32 = 1_000_000;

/// How long the receive loop waits before yielding to housekeeping.
const RECV_SLICE: Duration = Duration::from_millis(250);

struct Route {
    room_id: u32,
    client_id: ClientId,
    queue: Arc<IngestQueue>,
    last_seen: Instant,
}

struct RoomHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    members: Vec<SocketAddr>,
}

/// The server: lobby, routing table, and running rooms.
pub struct ArenaServer {
    cfg: ServerConfig,
    socket: Arc<UdpSocket>,
    transport: Arc<dyn Transport>,
    levels: LevelSet,
    next_client_id: u32,
    next_room_id: u32,
    lobby: Vec<RoomMember>,
    routes: HashMap<SocketAddr, Route>,
    rooms: HashMap<u32, RoomHandle>,
}

impl ArenaServer {
    pub async fn bind(cfg: ServerConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let socket = Arc::new(UdpSocket::bind(addr).await.context("udp bind")?);
        let transport: Arc<dyn Transport> = Arc::new(UdpTransport::new(socket.clone()));
        let levels = LevelSet::load_dir(&cfg.levels_dir);
        info!(
            addr = %socket.local_addr()?,
            levels = levels.len(),
            room_size = cfg.room_size,
            "Server bound"
        );
        Ok(Self {
            cfg,
            socket,
            transport,
            levels,
            next_client_id: CLIENT_ID_BASE,
            next_room_id: 1,
            lobby: Vec::new(),
            routes: HashMap::new(),
            rooms: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Replaces the level set. Rooms started afterwards use the new levels;
    /// tests use this instead of a levels directory on disk.
    pub fn set_levels(&mut self, levels: LevelSet) {
        self.levels = levels;
    }

    /// Receive loop plus housekeeping. Runs until the task is aborted.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let socket = self.socket.clone();
        let mut buf = vec![0u8; 2048];
        let mut last_sweep = Instant::now();

        loop {
            match tokio::time::timeout(RECV_SLICE, socket.recv_from(&mut buf)).await {
                Ok(Ok((len, from))) => self.handle_datagram(&buf[..len], from).await,
                Ok(Err(err)) => {
                    warn!(error = %err, "UDP recv failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Err(_) => {} // quiet slice; fall through to housekeeping
            }

            if last_sweep.elapsed() >= Duration::from_secs(1) {
                last_sweep = Instant::now();
                self.sweep_idle();
                self.reap_rooms();
            }
        }
    }

    async fn handle_datagram(&mut self, payload: &[u8], from: SocketAddr) {
        if let Some(route) = self.routes.get_mut(&from) {
            route.last_seen = Instant::now();
            let leaving = matches!(Msg::decode(payload), Ok(Msg::Leave { .. }));
            route.queue.enqueue(Bytes::copy_from_slice(payload), from);
            if leaving {
                self.routes.remove(&from);
            }
            return;
        }

        match Msg::decode(payload) {
            Ok(Msg::Join { name }) => self.handle_join(name, from).await,
            Ok(other) => {
                debug!(kind = other.kind(), %from, "Message from unknown peer");
            }
            Err(WireError::UnknownKind(kind)) => {
                debug!(kind, %from, "Ignoring unknown message kind");
            }
            Err(err) => {
                debug!(?err, %from, "Dropping malformed datagram");
            }
        }
    }

    async fn handle_join(&mut self, name: String, from: SocketAddr) {
        // A re-sent Join from a waiting client just gets its ack again.
        if let Some(member) = self.lobby.iter().find(|m| m.addr == from) {
            self.send_ack(member.id, from).await;
            return;
        }

        let client_id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        info!(client = client_id.0, %from, name = %name, "Client joined lobby");
        self.lobby.push(RoomMember {
            id: client_id,
            addr: from,
            name,
        });
        self.send_ack(client_id, from).await;

        if self.lobby.len() >= self.cfg.room_size as usize {
            self.start_room();
        }
    }

    async fn send_ack(&self, client_id: ClientId, to: SocketAddr) {
        let payload = Msg::JoinAck { client_id }.encode();
        if let Err(err) = self.transport.send_to(&payload, to).await {
            warn!(peer = %to, error = %err, "JoinAck send failed");
        }
    }

    fn start_room(&mut self) {
        let count = self.cfg.room_size as usize;
        let members: Vec<RoomMember> = self.lobby.drain(..count).collect();
        let room_id = self.next_room_id;
        self.next_room_id += 1;

        let queue = Arc::new(IngestQueue::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let sim = RoomSim::new(
            room_id,
            members.clone(),
            self.levels.clone(),
            self.cfg.tick_hz,
            self.cfg.endless,
        );
        let task = tokio::spawn(sim.run(queue.clone(), self.transport.clone(), shutdown_rx));

        let addrs: Vec<SocketAddr> = members.iter().map(|m| m.addr).collect();
        for member in &members {
            self.routes.insert(
                member.addr,
                Route {
                    room_id,
                    client_id: member.id,
                    queue: queue.clone(),
                    last_seen: Instant::now(),
                },
            );
        }
        self.rooms.insert(
            room_id,
            RoomHandle {
                shutdown: shutdown_tx,
                task,
                members: addrs,
            },
        );
        info!(room = room_id, players = count, "Room started");
    }

    /// Synthesizes a Leave for every client silent past the idle timeout.
    fn sweep_idle(&mut self) {
        if self.cfg.idle_timeout_secs == 0 {
            return;
        }
        let timeout = Duration::from_secs(self.cfg.idle_timeout_secs);
        let now = Instant::now();
        let idle: Vec<SocketAddr> = self
            .routes
            .iter()
            .filter(|(_, route)| now.duration_since(route.last_seen) > timeout)
            .map(|(addr, _)| *addr)
            .collect();
        for addr in idle {
            let Some(route) = self.routes.remove(&addr) else {
                continue;
            };
            info!(
                client = route.client_id.0,
                room = route.room_id,
                %addr,
                "Idle client disconnected"
            );
            let leave = Msg::Leave {
                client_id: route.client_id,
            }
            .encode();
            route.queue.enqueue(leave, addr);
        }
    }

    /// Drops bookkeeping for rooms whose tick loop has ended.
    fn reap_rooms(&mut self) {
        let finished: Vec<u32> = self
            .rooms
            .iter()
            .filter(|(_, handle)| handle.task.is_finished())
            .map(|(id, _)| *id)
            .collect();
        for room_id in finished {
            let Some(handle) = self.rooms.remove(&room_id) else {
                continue;
            };
            for addr in &handle.members {
                self.routes.remove(addr);
            }
            info!(room = room_id, "Room reaped");
        }
    }

    /// Signals every room to stop after its current tick.
    pub fn shutdown_rooms(&self) {
        for handle in self.rooms.values() {
            let _ = handle.shutdown.send(true);
        }
    }
}

/// Helper for tests: bind to an ephemeral port with idle sweep disabled.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(ArenaServer, ServerConfig)> {
    let mut cfg = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        tick_hz,
        idle_timeout_secs: 0,
        ..Default::default()
    };
    let server = ArenaServer::bind(cfg.clone()).await?;
    cfg.listen_addr = server.local_addr()?.to_string();
    Ok((server, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_ephemeral_assigns_a_port() -> anyhow::Result<()> {
        let (server, cfg) = bind_ephemeral(60).await?;
        let addr = server.local_addr()?;
        assert_ne!(addr.port(), 0);
        assert_eq!(cfg.listen_addr, addr.to_string());
        Ok(())
    }
}
