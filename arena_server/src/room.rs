//! Room simulation.
//!
//! One `RoomSim` per concurrently running match, owning every authoritative
//! entity map. Rooms are fully isolated: no cross-room shared mutable state,
//! and the maps are touched only by the room's own tick task. The only
//! structures shared with the network path are the ingestion queue and the
//! outbound transport.
//!
//! Tick order: drain queue -> aggregate input (action edges resolve
//! immediately) -> physics -> combat -> lifecycle -> broadcast -> sleep for
//! the remaining budget. An overrunning tick starts the next immediately;
//! skipped time is never caught up.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arena_shared::ecs::{CollisionBox, EntityId, HealthMirror, Position, Registry};
use arena_shared::event::EventBus;
use arena_shared::level::LevelSet;
use arena_shared::math::Vec2;
use arena_shared::net::Transport;
use arena_shared::wire::{ClientId, InputCode, Msg, WireError};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::broadcast;
use crate::combat;
use crate::entities::{Enemy, MovementPattern, Obstacle, Pickup, Player, Projectile};
use crate::events::{
    Despawned, EnemySpawned, HealthChanged, LevelStarted, MatchEnded, ObstacleSpawned,
    PickupSpawned,
};
use crate::ingest::{IngestQueue, RawPacket};
use crate::input::{self, ActionEdge};
use crate::lifecycle;
use crate::physics::{self, WORLD_HEIGHT, WORLD_WIDTH};

/// Drain budget per tick; the rest stays queued.
pub const MAX_PACKETS_PER_TICK: usize = 256;

/// How far outside the world a projectile may travel before despawning.
const WORLD_MARGIN: f32 = 50.0;

/// One participant at room start.
#[derive(Debug, Clone)]
pub struct RoomMember {
    pub id: ClientId,
    pub addr: SocketAddr,
    pub name: String,
}

/// Per-match simulation state.
pub struct RoomSim {
    room_id: u32,
    endless: bool,
    started_at: DateTime<Utc>,
    tick_budget: Duration,
    dt: f32,
    tick: u64,

    addrs: HashMap<ClientId, SocketAddr>,
    initial_participants: usize,

    players: HashMap<ClientId, Player>,
    enemies: HashMap<EntityId, Enemy>,
    player_shots: HashMap<EntityId, Projectile>,
    enemy_shots: HashMap<EntityId, Projectile>,
    obstacles: HashMap<EntityId, Obstacle>,
    pickups: HashMap<EntityId, Pickup>,

    registry: Registry,
    events: EventBus,
    levels: LevelSet,
    level_index: usize,
    /// Whether the current level spawned a wave to clear.
    wave_active: bool,
    team_score: i32,

    rng: StdRng,
    match_over: bool,
    winner: Option<ClientId>,
}

impl RoomSim {
    pub fn new(
        room_id: u32,
        members: Vec<RoomMember>,
        levels: LevelSet,
        tick_hz: u32,
        endless: bool,
    ) -> Self {
        let tick_hz = tick_hz.max(1);
        let mut sim = Self {
            room_id,
            endless,
            started_at: Utc::now(),
            tick_budget: Duration::from_secs_f32(1.0 / tick_hz as f32),
            dt: 1.0 / tick_hz as f32,
            tick: 0,
            addrs: HashMap::new(),
            initial_participants: members.len(),
            players: HashMap::new(),
            enemies: HashMap::new(),
            player_shots: HashMap::new(),
            enemy_shots: HashMap::new(),
            obstacles: HashMap::new(),
            pickups: HashMap::new(),
            registry: Registry::default(),
            events: EventBus::default(),
            levels,
            level_index: 0,
            wave_active: false,
            team_score: 0,
            rng: StdRng::seed_from_u64(room_id as u64),
            match_over: false,
            winner: None,
        };
        sim.registry.register_component::<Position>();
        sim.registry.register_component::<CollisionBox>();
        sim.registry.register_component::<HealthMirror>();

        sim.spawn_level(0);

        for (index, member) in members.into_iter().enumerate() {
            let entity = sim.registry.spawn();
            let pos = lifecycle::respawn_position(
                sim.levels.get(0, endless),
                &sim.obstacles,
                index,
            );
            let player = lifecycle::new_player(member.id, entity, member.name, index, pos);
            sim.events.push(HealthChanged {
                client_id: member.id,
                current: player.health,
                max: player.max_health,
            });
            sim.addrs.insert(member.id, member.addr);
            sim.players.insert(member.id, player);
        }
        info!(
            room = room_id,
            players = sim.players.len(),
            levels = sim.levels.len(),
            "Room created"
        );
        sim
    }

    pub fn is_over(&self) -> bool {
        self.match_over
    }

    pub fn winner(&self) -> Option<ClientId> {
        self.winner
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// All connected clients, in stable id order.
    pub fn recipients(&self) -> Vec<SocketAddr> {
        let mut ids: Vec<ClientId> = self.addrs.keys().copied().collect();
        ids.sort();
        ids.into_iter().map(|id| self.addrs[&id]).collect()
    }

    fn spawn_level(&mut self, index: usize) {
        self.level_index = index;
        let Some(def) = self.levels.get(index, self.endless).cloned() else {
            self.wave_active = false;
            return;
        };
        self.wave_active = !def.enemies.is_empty();
        self.events.push(LevelStarted {
            index: index as u32,
            name: def.name.clone(),
        });

        for o in &def.obstacles {
            let id = self.registry.spawn();
            let obstacle = Obstacle {
                id,
                pos: Vec2::new(o.x, o.y),
                size: Vec2::new(o.width, o.height),
                kind: o.kind,
                vel: Vec2::new(o.vel_x, o.vel_y),
                moved: false,
            };
            self.events.push(ObstacleSpawned {
                id,
                kind: o.kind,
                pos: obstacle.pos,
                size: obstacle.size,
                vel: obstacle.vel,
            });
            self.obstacles.insert(id, obstacle);
        }
        for e in &def.enemies {
            let id = self.registry.spawn();
            let pos = Vec2::new(e.x, e.y);
            let enemy = Enemy {
                id,
                pos,
                size: Vec2::new(e.width, e.height),
                health: e.health,
                contact_damage: e.contact_damage,
                score_value: e.score_value,
                pattern: MovementPattern::from_kind(e.pattern, pos, e.speed),
                last_hit_by: None,
            };
            self.events.push(EnemySpawned {
                id,
                pos,
                vel: Vec2::ZERO,
                size: enemy.size,
            });
            self.enemies.insert(id, enemy);
        }
        for p in &def.pickups {
            let id = self.registry.spawn();
            let pickup = Pickup {
                id,
                pos: Vec2::new(p.x, p.y),
                size: Vec2::new(lifecycle::PICKUP_SIZE, lifecycle::PICKUP_SIZE),
                kind: p.kind,
            };
            self.events.push(PickupSpawned {
                id,
                kind: p.kind,
                pos: pickup.pos,
            });
            self.pickups.insert(id, pickup);
        }
    }

    /// Removes every level-scoped entity. Players persist across levels.
    fn teardown_level(&mut self) {
        let mut ids: Vec<EntityId> = self
            .enemies
            .keys()
            .chain(self.player_shots.keys())
            .chain(self.enemy_shots.keys())
            .chain(self.pickups.keys())
            .chain(self.obstacles.keys())
            .copied()
            .collect();
        ids.sort();
        for id in ids {
            self.registry.kill(id);
            self.events.push(Despawned { id });
        }
        self.enemies.clear();
        self.player_shots.clear();
        self.enemy_shots.clear();
        self.pickups.clear();
        self.obstacles.clear();
    }

    fn maybe_advance_level(&mut self) {
        if !self.wave_active || !self.enemies.is_empty() || self.match_over {
            return;
        }
        self.teardown_level();
        let next = self.level_index + 1;
        if self.levels.get(next, self.endless).is_some() {
            info!(room = self.room_id, level = next, "Wave cleared, next level");
            self.spawn_level(next);
        } else {
            info!(room = self.room_id, "Final wave cleared, match over");
            self.wave_active = false;
            self.match_over = true;
            self.events.push(MatchEnded { winner: None });
        }
    }

    fn remove_player(&mut self, client_id: ClientId) {
        let Some(player) = self.players.remove(&client_id) else {
            return;
        };
        self.addrs.remove(&client_id);
        self.registry.kill(player.entity);
        // Player wire identity is the client id.
        self.events.push(Despawned {
            id: EntityId(client_id.0),
        });
        info!(room = self.room_id, client = client_id.0, "Player left room");
    }

    fn handle_packet(&mut self, pkt: RawPacket) {
        let msg = match Msg::decode(&pkt.payload) {
            Ok(msg) => msg,
            Err(WireError::UnknownKind(kind)) => {
                debug!(room = self.room_id, kind, "Ignoring unknown message kind");
                return;
            }
            Err(err) => {
                debug!(room = self.room_id, ?err, from = %pkt.from, "Dropping malformed packet");
                return;
            }
        };
        match msg {
            Msg::Input {
                client_id,
                code,
                pressed,
            } => {
                if self.addrs.get(&client_id) != Some(&pkt.from) {
                    debug!(room = self.room_id, client = client_id.0, from = %pkt.from,
                        "Input from unexpected address");
                    return;
                }
                let Some(code) = InputCode::from_u8(code) else {
                    return;
                };
                // Dead (and respawning) players' input is discarded without
                // touching their last-known state.
                let edge = {
                    let Some(player) = self.players.get_mut(&client_id) else {
                        return;
                    };
                    if !player.is_alive() {
                        return;
                    }
                    input::apply_event(&mut player.held, &mut player.facing, code, pressed)
                };
                match edge {
                    Some(ActionEdge::Jump) => {
                        if let Some(player) = self.players.get_mut(&client_id) {
                            physics::try_jump(player);
                        }
                    }
                    Some(ActionEdge::Melee) => {
                        combat::resolve_melee(
                            &mut self.players,
                            &mut self.events,
                            client_id,
                            combat::MELEE_RANGE,
                            combat::MELEE_TOLERANCE,
                            combat::MELEE_DAMAGE,
                            combat::MELEE_KNOCKBACK_BASE,
                            combat::MELEE_KNOCKBACK_SCALE,
                            combat::MELEE_MULTIPLIER,
                        );
                    }
                    Some(ActionEdge::Shoot) => {
                        combat::spawn_player_shot(
                            &mut self.players,
                            &mut self.registry,
                            &mut self.player_shots,
                            &mut self.events,
                            client_id,
                        );
                    }
                    None => {}
                }
            }
            Msg::Leave { client_id } => self.remove_player(client_id),
            other => {
                debug!(room = self.room_id, kind = other.kind(), "Unexpected message in room");
            }
        }
    }

    fn check_match_end(&mut self) {
        if self.match_over {
            return;
        }
        if self.players.is_empty() {
            self.match_over = true;
            return;
        }
        if let Some(winner) = lifecycle::check_win(&self.players, self.initial_participants) {
            info!(room = self.room_id, winner = winner.0, "Match won");
            self.winner = Some(winner);
            self.match_over = true;
            self.events.push(MatchEnded {
                winner: Some(winner),
            });
            return;
        }
        if self.players.values().all(|p| !p.in_play()) {
            info!(room = self.room_id, "All players dead, match over");
            self.match_over = true;
            self.events.push(MatchEnded { winner: None });
        }
    }

    fn sync_mirrors(&mut self) {
        for p in self.players.values() {
            if !p.in_play() {
                continue;
            }
            self.registry.insert(p.entity, Position { x: p.pos.x, y: p.pos.y });
            self.registry.insert(
                p.entity,
                CollisionBox {
                    width: p.size.x,
                    height: p.size.y,
                },
            );
            self.registry.insert(
                p.entity,
                HealthMirror {
                    current: p.health,
                    max: p.max_health,
                },
            );
        }
        for e in self.enemies.values() {
            self.registry.insert(e.id, Position { x: e.pos.x, y: e.pos.y });
            self.registry.insert(
                e.id,
                CollisionBox {
                    width: e.size.x,
                    height: e.size.y,
                },
            );
            self.registry.insert(
                e.id,
                HealthMirror {
                    current: e.health,
                    max: e.health.max(1),
                },
            );
        }
        for shots in [&self.player_shots, &self.enemy_shots] {
            for s in shots.values() {
                self.registry.insert(s.id, Position { x: s.pos.x, y: s.pos.y });
            }
        }
        for o in self.obstacles.values() {
            if o.moved {
                self.registry.insert(o.id, Position { x: o.pos.x, y: o.pos.y });
            }
        }
    }

    /// One fixed simulation tick. Returns the wire messages to broadcast.
    pub fn step(&mut self, queue: &IngestQueue) -> Vec<Msg> {
        for pkt in queue.drain_up_to(MAX_PACKETS_PER_TICK) {
            self.handle_packet(pkt);
        }
        if self.match_over {
            return broadcast::collect_events(&mut self.events);
        }
        self.tick += 1;
        let dt = self.dt;

        // ─── Movement & physics ───
        let player_ids: Vec<ClientId> = self.players.keys().copied().collect();
        for id in player_ids {
            let Some(player) = self.players.get_mut(&id) else {
                continue;
            };
            combat::tick_cooldowns(player);
            if !player.is_alive() {
                continue;
            }
            physics::step_player(player, &self.obstacles, dt);
            if physics::fell_out(player) {
                player.health = 0;
                self.events.push(HealthChanged {
                    client_id: id,
                    current: 0,
                    max: player.max_health,
                });
            }
        }
        physics::step_obstacles(&mut self.obstacles, dt);
        physics::step_projectiles(&mut self.player_shots, dt);
        physics::step_projectiles(&mut self.enemy_shots, dt);

        // ─── Combat & collision ───
        combat::player_shot_pass(
            &mut self.player_shots,
            &mut self.enemies,
            &self.obstacles,
            &mut self.registry,
            &mut self.events,
        );
        combat::enemy_shot_pass(
            &mut self.enemy_shots,
            &mut self.players,
            &mut self.registry,
            &mut self.events,
        );
        combat::contact_pass(&self.enemies, &mut self.players, &mut self.events);

        // ─── Lifecycle ───
        lifecycle::step_enemies(
            &mut self.enemies,
            &self.players,
            &mut self.enemy_shots,
            &mut self.registry,
            &mut self.events,
            dt,
        );
        lifecycle::sweep_dead_enemies(
            &mut self.enemies,
            &mut self.players,
            &mut self.pickups,
            &mut self.registry,
            &mut self.events,
            &mut self.rng,
            &mut self.team_score,
        );
        expire_shots(&mut self.player_shots, &mut self.registry, &mut self.events);
        expire_shots(&mut self.enemy_shots, &mut self.registry, &mut self.events);
        lifecycle::step_player_lifecycle(
            &mut self.players,
            self.levels.get(self.level_index, self.endless),
            &self.obstacles,
            &mut self.registry,
            &mut self.events,
        );
        lifecycle::check_pickups(
            &mut self.players,
            &mut self.pickups,
            &mut self.registry,
            &mut self.events,
        );
        self.maybe_advance_level();
        self.check_match_end();

        self.sync_mirrors();
        self.registry.run_systems();

        // ─── Broadcast ───
        let mut msgs = broadcast::collect_events(&mut self.events);
        msgs.extend(broadcast::snapshot_positions(
            &self.players,
            &self.enemies,
            &self.player_shots,
            &self.enemy_shots,
            &self.obstacles,
        ));
        msgs
    }

    /// Drives the fixed-tick loop until the match ends or shutdown is
    /// signaled. The loop never blocks on I/O beyond the best-effort UDP
    /// sends; between ticks it sleeps for whatever budget remains.
    pub async fn run(
        mut self,
        queue: Arc<IngestQueue>,
        transport: Arc<dyn Transport>,
        shutdown: watch::Receiver<bool>,
    ) {
        info!(room = self.room_id, "Room loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            let tick_started = Instant::now();

            let msgs = self.step(&queue);
            let recipients = self.recipients();
            broadcast::send_all(transport.as_ref(), &msgs, &recipients).await;

            if self.match_over {
                break;
            }
            let elapsed = tick_started.elapsed();
            if elapsed < self.tick_budget {
                tokio::time::sleep(self.tick_budget - elapsed).await;
            }
        }
        let match_secs = (Utc::now() - self.started_at).num_seconds();
        info!(
            room = self.room_id,
            ticks = self.tick,
            match_secs,
            winner = self.winner.map(|w| w.0),
            dropped_packets = queue.dropped(),
            "Room loop finished"
        );
    }
}

fn expire_shots(
    shots: &mut HashMap<EntityId, Projectile>,
    registry: &mut Registry,
    events: &mut EventBus,
) {
    let mut expired: Vec<EntityId> = shots
        .iter()
        .filter(|(_, s)| {
            s.ttl == 0
                || s.pos.x < -WORLD_MARGIN
                || s.pos.x > WORLD_WIDTH + WORLD_MARGIN
                || s.pos.y < -WORLD_MARGIN
                || s.pos.y > WORLD_HEIGHT + WORLD_MARGIN
        })
        .map(|(id, _)| *id)
        .collect();
    expired.sort();
    for id in expired {
        shots.remove(&id);
        registry.kill(id);
        events.push(Despawned { id });
    }
}
