//! Entity lifecycle.
//!
//! Player death/respawn/lives state machine, enemy pattern stepping and
//! death sweeps, pickups, and the win condition. Level transitions live in
//! the room, which owns every map at once.
//!
//! The player state machine: `Alive -> Respawning -> Alive` while lives
//! remain, otherwise `Alive -> Dead`, terminal for the match. The terminal
//! death notification fires exactly once; repeated zero-health checks on a
//! player already recorded dead do nothing.

use std::collections::HashMap;

use arena_shared::ecs::{EntityId, Registry};
use arena_shared::event::EventBus;
use arena_shared::level::{LevelDef, PickupKind};
use arena_shared::math::Vec2;
use arena_shared::wire::ClientId;
use rand::Rng;

use crate::combat::{ENEMY_SHOT_DAMAGE, ENEMY_SHOT_SPEED, SHOT_SIZE, SHOT_TTL_TICKS};
use crate::entities::{
    Enemy, Obstacle, Pickup, Player, PlayerState, Projectile, ProjectileSource,
};
use crate::events::{
    Despawned, HealthChanged, PickupSpawned, PlayerDied, PlayerScoreChanged, ProjectileSpawned,
    TeamScoreChanged,
};
use crate::physics::{MAX_AIR_JUMPS, PLAYER_HEIGHT, PLAYER_WIDTH, WORLD_WIDTH};

pub const MAX_HEALTH: i16 = 100;
pub const START_LIVES: u32 = 3;
pub const RESPAWN_DELAY_TICKS: u32 = 90;

pub const PICKUP_DROP_CHANCE: f64 = 0.2;
pub const PICKUP_SIZE: f32 = 16.0;
pub const HEAL_AMOUNT: i16 = 25;
pub const SCORE_PICKUP_VALUE: u32 = 50;

/// Fresh player record at a spawn position.
pub fn new_player(
    id: ClientId,
    entity: EntityId,
    name: String,
    spawn_index: usize,
    pos: Vec2,
) -> Player {
    Player {
        id,
        entity,
        name,
        spawn_index,
        pos,
        vel: Vec2::ZERO,
        knockback: Vec2::ZERO,
        size: Vec2::new(PLAYER_WIDTH, PLAYER_HEIGHT),
        health: MAX_HEALTH,
        max_health: MAX_HEALTH,
        lives: START_LIVES,
        score: 0,
        state: PlayerState::Alive,
        held: Default::default(),
        facing: Vec2::new(1.0, 0.0),
        on_ground: false,
        air_jumps_left: MAX_AIR_JUMPS,
        damage_cooldown: 0,
        shoot_cooldown: 0,
    }
}

/// Deterministic spawn fallback by join order.
pub fn default_spawn_pos(spawn_index: usize) -> Vec2 {
    let x = 100.0 + (spawn_index as f32 * 60.0) % (WORLD_WIDTH - 200.0);
    Vec2::new(x, 80.0)
}

/// Spawn position preference: stand atop the widest surface, else the
/// level's configured per-player point, else the deterministic default.
pub fn respawn_position(
    level: Option<&LevelDef>,
    obstacles: &HashMap<EntityId, Obstacle>,
    spawn_index: usize,
) -> Vec2 {
    let anchor = obstacles
        .values()
        .max_by(|a, b| {
            a.size
                .x
                .partial_cmp(&b.size.x)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.id.cmp(&a.id))
        })
        .map(|o| {
            // Fan players out along the surface so a simultaneous respawn
            // does not stack them.
            let slot = o.pos.x + o.size.x / 2.0 + (spawn_index as f32 * 40.0);
            let x = slot.clamp(o.pos.x, (o.pos.x + o.size.x - PLAYER_WIDTH).max(o.pos.x));
            Vec2::new(x, o.pos.y - PLAYER_HEIGHT)
        });
    if let Some(pos) = anchor {
        return pos;
    }
    if let Some((x, y)) = level.and_then(|l| l.player_spawns.get(spawn_index)) {
        return Vec2::new(*x, *y);
    }
    default_spawn_pos(spawn_index)
}

/// Advances enemy movement patterns and fires turret shots. Patterns are
/// pure in their persisted state; drifting patterns reverse at the world
/// edges.
pub fn step_enemies(
    enemies: &mut HashMap<EntityId, Enemy>,
    players: &HashMap<ClientId, Player>,
    enemy_shots: &mut HashMap<EntityId, Projectile>,
    registry: &mut Registry,
    events: &mut EventBus,
    dt: f32,
) {
    let mut ids: Vec<EntityId> = enemies.keys().copied().collect();
    ids.sort();

    for id in ids {
        let Some(enemy) = enemies.get_mut(&id) else {
            continue;
        };
        let step = enemy.pattern.step(enemy.pos, dt);
        enemy.pos = step.pos;
        if enemy.pattern.drifts()
            && (enemy.pos.x < 0.0 || enemy.pos.x + enemy.size.x > WORLD_WIDTH)
        {
            enemy.pattern.reverse_x();
            enemy.pos.x = enemy.pos.x.clamp(0.0, WORLD_WIDTH - enemy.size.x);
        }

        if step.fire {
            let origin = enemy.center();
            let target = players
                .values()
                .filter(|p| p.is_alive())
                .min_by(|a, b| {
                    let da = a.center().sub(origin).len_sq();
                    let db = b.center().sub(origin).len_sq();
                    da.partial_cmp(&db)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.id.cmp(&b.id))
                })
                .map(|p| p.center());
            let Some(target) = target else {
                continue;
            };
            let mut dir = target.sub(origin).normalized_or_zero();
            if dir == Vec2::ZERO {
                dir = Vec2::new(0.0, 1.0);
            }
            let shot_id = registry.spawn();
            let shot = Projectile {
                id: shot_id,
                pos: Vec2::new(origin.x - SHOT_SIZE / 2.0, origin.y - SHOT_SIZE / 2.0),
                vel: dir.scale(ENEMY_SHOT_SPEED),
                size: Vec2::new(SHOT_SIZE, SHOT_SIZE),
                damage: ENEMY_SHOT_DAMAGE,
                source: ProjectileSource::Enemy(id),
                ttl: SHOT_TTL_TICKS,
            };
            events.push(ProjectileSpawned {
                id: shot_id,
                owner: id.0,
                pos: shot.pos,
                vel: shot.vel,
            });
            enemy_shots.insert(shot_id, shot);
        }
    }
}

/// Removes dead enemies, credits scores, and rolls pickup drops.
#[allow(clippy::too_many_arguments)]
pub fn sweep_dead_enemies(
    enemies: &mut HashMap<EntityId, Enemy>,
    players: &mut HashMap<ClientId, Player>,
    pickups: &mut HashMap<EntityId, Pickup>,
    registry: &mut Registry,
    events: &mut EventBus,
    rng: &mut impl Rng,
    team_score: &mut i32,
) {
    let mut ids: Vec<EntityId> = enemies.keys().copied().collect();
    ids.sort();

    for id in ids {
        let dead = enemies.get(&id).is_some_and(|e| e.health <= 0);
        if !dead {
            continue;
        }
        let enemy = enemies.remove(&id).expect("checked above");

        if let Some(killer) = enemy.last_hit_by {
            if let Some(player) = players.get_mut(&killer) {
                player.score += enemy.score_value.max(0) as u32;
                events.push(PlayerScoreChanged {
                    client_id: killer,
                    score: player.score,
                });
            }
        }
        *team_score += enemy.score_value;
        events.push(TeamScoreChanged { total: *team_score });

        if rng.gen_bool(PICKUP_DROP_CHANCE) {
            let kind = match rng.gen_range(0..3) {
                0 => PickupKind::Heal,
                1 => PickupKind::ExtraLife,
                _ => PickupKind::Score,
            };
            let pickup_id = registry.spawn();
            let center = enemy.center();
            let pickup = Pickup {
                id: pickup_id,
                pos: Vec2::new(center.x - PICKUP_SIZE / 2.0, center.y - PICKUP_SIZE / 2.0),
                size: Vec2::new(PICKUP_SIZE, PICKUP_SIZE),
                kind,
            };
            events.push(PickupSpawned {
                id: pickup_id,
                kind,
                pos: pickup.pos,
            });
            pickups.insert(pickup_id, pickup);
        }

        registry.kill(id);
        events.push(Despawned { id });
    }
}

/// Drives the per-player state machine one tick.
pub fn step_player_lifecycle(
    players: &mut HashMap<ClientId, Player>,
    level: Option<&LevelDef>,
    obstacles: &HashMap<EntityId, Obstacle>,
    registry: &mut Registry,
    events: &mut EventBus,
) {
    let mut ids: Vec<ClientId> = players.keys().copied().collect();
    ids.sort();

    for id in ids {
        let Some(player) = players.get_mut(&id) else {
            continue;
        };
        match player.state {
            PlayerState::Alive if player.health <= 0 => {
                if player.lives > 0 {
                    player.lives -= 1;
                    player.state = PlayerState::Respawning {
                        ticks_left: RESPAWN_DELAY_TICKS,
                    };
                    player.vel = Vec2::ZERO;
                    player.knockback = Vec2::ZERO;
                } else {
                    player.state = PlayerState::Dead;
                    registry.kill(player.entity);
                    events.push(PlayerDied { client_id: id });
                }
            }
            PlayerState::Respawning { ticks_left } => {
                if ticks_left > 1 {
                    player.state = PlayerState::Respawning {
                        ticks_left: ticks_left - 1,
                    };
                } else {
                    player.pos = respawn_position(level, obstacles, player.spawn_index);
                    player.vel = Vec2::ZERO;
                    player.knockback = Vec2::ZERO;
                    player.health = player.max_health;
                    player.on_ground = false;
                    player.air_jumps_left = MAX_AIR_JUMPS;
                    player.state = PlayerState::Alive;
                    events.push(HealthChanged {
                        client_id: id,
                        current: player.health,
                        max: player.max_health,
                    });
                }
            }
            _ => {}
        }
    }
}

/// Applies overlapping pickups to the lowest-id living player and removes
/// them.
pub fn check_pickups(
    players: &mut HashMap<ClientId, Player>,
    pickups: &mut HashMap<EntityId, Pickup>,
    registry: &mut Registry,
    events: &mut EventBus,
) {
    let mut pickup_ids: Vec<EntityId> = pickups.keys().copied().collect();
    pickup_ids.sort();
    let mut player_ids: Vec<ClientId> = players.keys().copied().collect();
    player_ids.sort();

    for pickup_id in pickup_ids {
        let Some(pickup) = pickups.get(&pickup_id) else {
            continue;
        };
        let pickup_box = pickup.aabb();
        let collector = player_ids.iter().copied().find(|id| {
            players
                .get(id)
                .is_some_and(|p| p.is_alive() && p.aabb().overlaps(&pickup_box))
        });
        let Some(collector) = collector else {
            continue;
        };
        let kind = pickup.kind;
        pickups.remove(&pickup_id);
        registry.kill(pickup_id);
        events.push(Despawned { id: pickup_id });

        let Some(player) = players.get_mut(&collector) else {
            continue;
        };
        match kind {
            PickupKind::Heal => {
                player.health = (player.health + HEAL_AMOUNT).min(player.max_health);
                events.push(HealthChanged {
                    client_id: collector,
                    current: player.health,
                    max: player.max_health,
                });
            }
            PickupKind::ExtraLife => {
                player.lives += 1;
            }
            PickupKind::Score => {
                player.score += SCORE_PICKUP_VALUE;
                events.push(PlayerScoreChanged {
                    client_id: collector,
                    score: player.score,
                });
            }
        }
    }
}

/// Win condition, evaluated every tick. Fires only for matches that started
/// with at least two participants, once exactly one player remains in play.
pub fn check_win(
    players: &HashMap<ClientId, Player>,
    initial_participants: usize,
) -> Option<ClientId> {
    if initial_participants < 2 {
        return None;
    }
    let mut in_play = players.values().filter(|p| p.in_play());
    let first = in_play.next()?;
    if in_play.next().is_none() {
        Some(first.id)
    } else {
        None
    }
}
