//! State broadcast.
//!
//! Once per tick, after simulation, the room turns its drained gameplay
//! events plus a position snapshot into wire messages and fans them out.
//! Delivery is best-effort: a send failure is logged at the transport
//! boundary and never aborts the tick; clients rebuild from the next
//! update.
//!
//! The recipient list is explicit, so the same path serves "all clients of
//! the room" and any subset.

use std::collections::HashMap;
use std::net::SocketAddr;

use arena_shared::ecs::EntityId;
use arena_shared::event::EventBus;
use arena_shared::level::{ObstacleKind, PickupKind};
use arena_shared::net::Transport;
use arena_shared::wire::{
    ClientId, Msg, NO_WINNER, OBSTACLE_PLATFORM, OBSTACLE_SOLID, PICKUP_EXTRA_LIFE, PICKUP_HEAL,
    PICKUP_SCORE,
};
use tracing::warn;

use crate::entities::{Enemy, Obstacle, Pickup, Player, Projectile};
use crate::events::{
    Despawned, EnemySpawned, HealthChanged, LevelStarted, MatchEnded, ObstacleSpawned,
    PickupSpawned, PlayerDied, PlayerScoreChanged, ProjectileSpawned, TeamScoreChanged,
};

fn obstacle_kind_byte(kind: ObstacleKind) -> u8 {
    match kind {
        ObstacleKind::Solid => OBSTACLE_SOLID,
        ObstacleKind::Platform => OBSTACLE_PLATFORM,
    }
}

fn pickup_kind_byte(kind: PickupKind) -> u8 {
    match kind {
        PickupKind::Heal => PICKUP_HEAL,
        PickupKind::ExtraLife => PICKUP_EXTRA_LIFE,
        PickupKind::Score => PICKUP_SCORE,
    }
}

/// Drains the tick's gameplay events into wire messages.
pub fn collect_events(events: &mut EventBus) -> Vec<Msg> {
    let mut msgs = Vec::new();

    for e in events.drain::<LevelStarted>() {
        msgs.push(Msg::LevelInfo {
            index: e.index,
            name: e.name,
        });
    }
    for e in events.drain::<ObstacleSpawned>() {
        msgs.push(Msg::SpawnObstacle {
            id: e.id,
            kind: obstacle_kind_byte(e.kind),
            x: e.pos.x,
            y: e.pos.y,
            width: e.size.x,
            height: e.size.y,
            vel_x: e.vel.x,
            vel_y: e.vel.y,
        });
    }
    for e in events.drain::<EnemySpawned>() {
        msgs.push(Msg::SpawnEnemy {
            id: e.id,
            x: e.pos.x,
            y: e.pos.y,
            vel_x: e.vel.x,
            vel_y: e.vel.y,
            width: e.size.x,
            height: e.size.y,
        });
    }
    for e in events.drain::<ProjectileSpawned>() {
        msgs.push(Msg::SpawnProjectile {
            id: e.id,
            owner: e.owner,
            x: e.pos.x,
            y: e.pos.y,
            vel_x: e.vel.x,
            vel_y: e.vel.y,
        });
    }
    for e in events.drain::<PickupSpawned>() {
        msgs.push(Msg::SpawnPickup {
            id: e.id,
            kind: pickup_kind_byte(e.kind),
            x: e.pos.x,
            y: e.pos.y,
        });
    }
    for e in events.drain::<HealthChanged>() {
        msgs.push(Msg::Health {
            client_id: e.client_id,
            current: e.current,
            max: e.max,
        });
    }
    for e in events.drain::<PlayerScoreChanged>() {
        msgs.push(Msg::PlayerScore {
            client_id: e.client_id,
            score: e.score,
        });
    }
    for e in events.drain::<TeamScoreChanged>() {
        msgs.push(Msg::TeamScore { total: e.total });
    }
    for e in events.drain::<PlayerDied>() {
        msgs.push(Msg::Death {
            client_id: e.client_id,
        });
    }
    for e in events.drain::<Despawned>() {
        msgs.push(Msg::Despawn { id: e.id });
    }
    for e in events.drain::<MatchEnded>() {
        msgs.push(Msg::MatchOver {
            winner: e.winner.map_or(NO_WINNER, |id| id.0),
        });
    }
    msgs
}

/// Position/velocity updates for everything that needs one this tick: live
/// players, enemies, projectiles, and obstacles that moved.
pub fn snapshot_positions(
    players: &HashMap<ClientId, Player>,
    enemies: &HashMap<EntityId, Enemy>,
    player_shots: &HashMap<EntityId, Projectile>,
    enemy_shots: &HashMap<EntityId, Projectile>,
    obstacles: &HashMap<EntityId, Obstacle>,
) -> Vec<Msg> {
    let mut msgs = Vec::new();

    let mut player_ids: Vec<ClientId> = players.keys().copied().collect();
    player_ids.sort();
    for id in player_ids {
        let p = &players[&id];
        if !p.is_alive() {
            continue;
        }
        msgs.push(Msg::PlayerPos {
            client_id: id,
            x: p.pos.x,
            y: p.pos.y,
            z: 0.0,
            vel_x: p.vel.x,
            vel_y: p.vel.y,
        });
    }

    let mut enemy_ids: Vec<EntityId> = enemies.keys().copied().collect();
    enemy_ids.sort();
    for id in enemy_ids {
        let e = &enemies[&id];
        msgs.push(Msg::EnemyPos {
            id,
            x: e.pos.x,
            y: e.pos.y,
            z: 0.0,
        });
    }

    for shots in [player_shots, enemy_shots] {
        let mut ids: Vec<EntityId> = shots.keys().copied().collect();
        ids.sort();
        for id in ids {
            let s = &shots[&id];
            msgs.push(Msg::ProjectilePos {
                id,
                x: s.pos.x,
                y: s.pos.y,
                z: 0.0,
            });
        }
    }

    let mut obstacle_ids: Vec<EntityId> = obstacles.keys().copied().collect();
    obstacle_ids.sort();
    for id in obstacle_ids {
        let o = &obstacles[&id];
        if o.moved {
            msgs.push(Msg::ObstaclePos {
                id,
                x: o.pos.x,
                y: o.pos.y,
                z: 0.0,
            });
        }
    }

    msgs
}

/// Sends every message to every recipient. Failures are logged and
/// swallowed; there is no acknowledgment or retry.
pub async fn send_all(transport: &dyn Transport, msgs: &[Msg], recipients: &[SocketAddr]) {
    for msg in msgs {
        let payload = msg.encode();
        for peer in recipients {
            if let Err(err) = transport.send_to(&payload, *peer).await {
                warn!(%peer, error = %err, "Broadcast send failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::net::RecordingTransport;

    #[test]
    fn events_drain_into_wire_messages() {
        let mut events = EventBus::default();
        events.push(HealthChanged {
            client_id: ClientId(4),
            current: 70,
            max: 100,
        });
        events.push(Despawned { id: EntityId(12) });
        events.push(PlayerDied {
            client_id: ClientId(4),
        });

        let msgs = collect_events(&mut events);
        assert!(msgs.contains(&Msg::Health {
            client_id: ClientId(4),
            current: 70,
            max: 100
        }));
        assert!(msgs.contains(&Msg::Despawn { id: EntityId(12) }));
        assert!(msgs.contains(&Msg::Death {
            client_id: ClientId(4)
        }));
        // Drained: a second collect is empty.
        assert!(collect_events(&mut events).is_empty());
    }

    #[tokio::test]
    async fn send_all_reaches_every_recipient() {
        let transport = RecordingTransport::default();
        let msgs = vec![Msg::TeamScore { total: 10 }, Msg::MatchOver { winner: 2 }];
        let recipients: Vec<SocketAddr> = vec![
            "127.0.0.1:6001".parse().unwrap(),
            "127.0.0.1:6002".parse().unwrap(),
        ];

        send_all(&transport, &msgs, &recipients).await;

        let sent = transport.take();
        assert_eq!(sent.len(), 4);
        for (_, payload) in &sent {
            assert!(Msg::decode(payload).is_ok());
        }
    }

    #[test]
    fn snapshot_skips_static_obstacles_and_dead_players() {
        let mut players = HashMap::new();
        let mut p = crate::lifecycle::new_player(
            ClientId(1),
            EntityId(0),
            "p".into(),
            0,
            arena_shared::math::Vec2::new(10.0, 10.0),
        );
        p.state = crate::entities::PlayerState::Dead;
        players.insert(ClientId(1), p);

        let mut obstacles = HashMap::new();
        obstacles.insert(
            EntityId(2),
            Obstacle {
                id: EntityId(2),
                pos: arena_shared::math::Vec2::new(0.0, 500.0),
                size: arena_shared::math::Vec2::new(800.0, 20.0),
                kind: ObstacleKind::Solid,
                vel: arena_shared::math::Vec2::ZERO,
                moved: false,
            },
        );

        let msgs = snapshot_positions(
            &players,
            &HashMap::new(),
            &HashMap::new(),
            &HashMap::new(),
            &obstacles,
        );
        assert!(msgs.is_empty());
    }
}
