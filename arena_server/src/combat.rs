//! Combat and collision resolution.
//!
//! Melee resolves immediately on the attack press edge; projectile and
//! contact passes run once per tick after movement. Every check goes
//! through the shared AABB primitive. Stale ids (entities already removed
//! this tick by another effect) are treated as absent; collision
//! resolution never fails on a missing entity.

use std::collections::HashMap;

use arena_shared::ecs::{EntityId, Registry};
use arena_shared::event::EventBus;
use arena_shared::math::Vec2;
use arena_shared::wire::ClientId;

use crate::entities::{Enemy, Obstacle, Player, Projectile, ProjectileSource};
use crate::events::{Despawned, HealthChanged, ProjectileSpawned};

pub const MELEE_RANGE: f32 = 48.0;
pub const MELEE_TOLERANCE: f32 = 20.0;
pub const MELEE_DAMAGE: i16 = 10;
pub const MELEE_KNOCKBACK_BASE: f32 = 180.0;
pub const MELEE_KNOCKBACK_SCALE: f32 = 60.0;
/// Fixed charge multiplier; this game has no charge-up.
pub const MELEE_MULTIPLIER: f32 = 1.0;

pub const SHOT_SPEED: f32 = 320.0;
pub const SHOT_DAMAGE: i16 = 8;
pub const SHOT_SIZE: f32 = 6.0;
pub const SHOT_TTL_TICKS: u32 = 180;
pub const SHOOT_COOLDOWN_TICKS: u32 = 12;

pub const ENEMY_SHOT_SPEED: f32 = 200.0;
pub const ENEMY_SHOT_DAMAGE: i16 = 6;

/// Knockback magnitude from a projectile or contact hit.
pub const HIT_KNOCKBACK: f32 = 120.0;
/// Ticks of damage immunity after a contact hit.
pub const DAMAGE_COOLDOWN_TICKS: u32 = 30;

/// Decrements per-player combat timers. Called once per tick.
pub fn tick_cooldowns(player: &mut Player) {
    player.damage_cooldown = player.damage_cooldown.saturating_sub(1);
    player.shoot_cooldown = player.shoot_cooldown.saturating_sub(1);
}

/// Melee attack from `attacker` along its last facing. Selects the single
/// nearest living player within `range` along the facing axis and within
/// the perpendicular tolerance band; ties break by distance, then lowest
/// id. Returns the victim, if any.
#[allow(clippy::too_many_arguments)]
pub fn resolve_melee(
    players: &mut HashMap<ClientId, Player>,
    events: &mut EventBus,
    attacker: ClientId,
    range: f32,
    tolerance: f32,
    damage: i16,
    knockback_base: f32,
    knockback_scale: f32,
    multiplier: f32,
) -> Option<ClientId> {
    let (origin, axis) = {
        let a = players.get(&attacker)?;
        if !a.is_alive() {
            return None;
        }
        let mut axis = a.facing.normalized_or_zero();
        if axis == Vec2::ZERO {
            axis = Vec2::new(1.0, 0.0);
        }
        (a.center(), axis)
    };

    let mut best: Option<(f32, ClientId)> = None;
    for (id, p) in players.iter() {
        if *id == attacker || !p.is_alive() {
            continue;
        }
        let rel = p.center().sub(origin);
        let along = rel.dot(axis);
        if along <= 0.0 || along > range {
            continue;
        }
        let perp = rel.sub(axis.scale(along)).len();
        if perp > tolerance {
            continue;
        }
        let dist = rel.len();
        let better = match best {
            None => true,
            Some((best_dist, best_id)) => {
                dist < best_dist || (dist == best_dist && *id < best_id)
            }
        };
        if better {
            best = Some((dist, *id));
        }
    }

    let (_, victim_id) = best?;
    let victim = players.get_mut(&victim_id)?;
    victim.health = (victim.health - damage).max(0);
    events.push(HealthChanged {
        client_id: victim_id,
        current: victim.health,
        max: victim.max_health,
    });

    let mut away = victim.center().sub(origin).normalized_or_zero();
    if away == Vec2::ZERO {
        away = axis;
    }
    let impulse = knockback_base + knockback_scale * multiplier;
    victim.knockback = victim.knockback.add(away.scale(impulse));
    Some(victim_id)
}

/// Fires the shooter's projectile if its weapon cooldown allows. Rate
/// limiting is per weapon definition; holding the button never repeats.
pub fn spawn_player_shot(
    players: &mut HashMap<ClientId, Player>,
    registry: &mut Registry,
    shots: &mut HashMap<EntityId, Projectile>,
    events: &mut EventBus,
    shooter: ClientId,
) -> Option<EntityId> {
    let player = players.get_mut(&shooter)?;
    if !player.is_alive() || player.shoot_cooldown > 0 {
        return None;
    }
    player.shoot_cooldown = SHOOT_COOLDOWN_TICKS;

    let mut dir = player.facing.normalized_or_zero();
    if dir == Vec2::ZERO {
        dir = Vec2::new(1.0, 0.0);
    }
    let origin = player.center();
    let id = registry.spawn();
    let shot = Projectile {
        id,
        pos: Vec2::new(origin.x - SHOT_SIZE / 2.0, origin.y - SHOT_SIZE / 2.0),
        vel: dir.scale(SHOT_SPEED),
        size: Vec2::new(SHOT_SIZE, SHOT_SIZE),
        damage: SHOT_DAMAGE,
        source: ProjectileSource::Player(shooter),
        ttl: SHOT_TTL_TICKS,
    };
    events.push(ProjectileSpawned {
        id,
        owner: shooter.0,
        pos: shot.pos,
        vel: shot.vel,
    });
    shots.insert(id, shot);
    Some(id)
}

fn sorted_ids<T>(map: &HashMap<EntityId, T>) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = map.keys().copied().collect();
    ids.sort();
    ids
}

/// Player-owned projectiles vs enemies and solid obstacles. First hit wins;
/// a projectile participates in at most one collision per tick.
pub fn player_shot_pass(
    shots: &mut HashMap<EntityId, Projectile>,
    enemies: &mut HashMap<EntityId, Enemy>,
    obstacles: &HashMap<EntityId, Obstacle>,
    registry: &mut Registry,
    events: &mut EventBus,
) {
    let enemy_ids = sorted_ids(enemies);
    let mut obstacle_ids: Vec<EntityId> = obstacles.keys().copied().collect();
    obstacle_ids.sort();

    for shot_id in sorted_ids(shots) {
        let Some(shot) = shots.get(&shot_id) else {
            continue;
        };
        let shot_box = shot.aabb();
        let owner = match shot.source {
            ProjectileSource::Player(id) => id,
            ProjectileSource::Enemy(_) => continue,
        };
        let damage = shot.damage;

        let mut hit = false;
        for enemy_id in &enemy_ids {
            let Some(enemy) = enemies.get_mut(enemy_id) else {
                continue;
            };
            if shot_box.overlaps(&enemy.aabb()) {
                enemy.health -= damage;
                enemy.last_hit_by = Some(owner);
                hit = true;
                break;
            }
        }
        if !hit {
            hit = obstacle_ids.iter().any(|id| {
                obstacles
                    .get(id)
                    .is_some_and(|o| o.is_solid() && shot_box.overlaps(&o.aabb()))
            });
        }
        if hit {
            shots.remove(&shot_id);
            registry.kill(shot_id);
            events.push(Despawned { id: shot_id });
        }
    }
}

/// Enemy-owned projectiles vs living players.
pub fn enemy_shot_pass(
    shots: &mut HashMap<EntityId, Projectile>,
    players: &mut HashMap<ClientId, Player>,
    registry: &mut Registry,
    events: &mut EventBus,
) {
    let mut player_ids: Vec<ClientId> = players.keys().copied().collect();
    player_ids.sort();

    for shot_id in sorted_ids(shots) {
        let Some(shot) = shots.get(&shot_id) else {
            continue;
        };
        let shot_box = shot.aabb();
        let shot_vel = shot.vel;
        let damage = shot.damage;

        let mut hit = false;
        for player_id in &player_ids {
            let Some(player) = players.get_mut(player_id) else {
                continue;
            };
            if !player.is_alive() || !shot_box.overlaps(&player.aabb()) {
                continue;
            }
            player.health = (player.health - damage).max(0);
            player.knockback = player
                .knockback
                .add(shot_vel.normalized_or_zero().scale(HIT_KNOCKBACK));
            events.push(HealthChanged {
                client_id: *player_id,
                current: player.health,
                max: player.max_health,
            });
            hit = true;
            break;
        }
        if hit {
            shots.remove(&shot_id);
            registry.kill(shot_id);
            events.push(Despawned { id: shot_id });
        }
    }
}

/// Enemy bodies vs players: contact damage, gated by the player's damage
/// cooldown so an overlap does not melt health every tick.
pub fn contact_pass(
    enemies: &HashMap<EntityId, Enemy>,
    players: &mut HashMap<ClientId, Player>,
    events: &mut EventBus,
) {
    let enemy_ids = sorted_ids(enemies);
    for player in players.values_mut() {
        if !player.is_alive() || player.damage_cooldown > 0 {
            continue;
        }
        let player_box = player.aabb();
        for enemy_id in &enemy_ids {
            let Some(enemy) = enemies.get(enemy_id) else {
                continue;
            };
            if !player_box.overlaps(&enemy.aabb()) {
                continue;
            }
            player.health = (player.health - enemy.contact_damage).max(0);
            player.damage_cooldown = DAMAGE_COOLDOWN_TICKS;
            let away = player.center().sub(enemy.center()).normalized_or_zero();
            player.knockback = player.knockback.add(away.scale(HIT_KNOCKBACK));
            events.push(HealthChanged {
                client_id: player.id,
                current: player.health,
                max: player.max_health,
            });
            break;
        }
    }
}
