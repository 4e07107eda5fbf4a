//! Movement and physics integration.
//!
//! Runs once per tick over the room's authoritative records. Horizontal
//! input movement is rejected outright when the destination overlaps a
//! solid obstacle; one-way platforms support landings from above and let a
//! player holding Down drop through. Knockback is a separate impulse
//! integrated alongside input and damped exponentially to exactly zero.

use std::collections::HashMap;

use arena_shared::ecs::EntityId;
use arena_shared::math::Vec2;

use crate::entities::{Obstacle, Player, Projectile};
use crate::input::{movement_dir, InputFlags};

pub const GRAVITY: f32 = 980.0;
pub const PLAYER_SPEED: f32 = 220.0;
pub const JUMP_VELOCITY: f32 = -420.0;
pub const PLAYER_WIDTH: f32 = 24.0;
pub const PLAYER_HEIGHT: f32 = 32.0;
pub const WORLD_WIDTH: f32 = 850.0;
pub const WORLD_HEIGHT: f32 = 600.0;
/// Mid-air jumps available after leaving the ground.
pub const MAX_AIR_JUMPS: u32 = 1;
/// Per-tick knockback damping factor.
pub const KNOCKBACK_DAMPING: f32 = 0.85;
/// Below this magnitude knockback clamps to exactly zero.
pub const KNOCKBACK_EPSILON: f32 = 1.0;
/// Falling past this y counts as leaving the world.
pub const FALL_OUT_Y: f32 = WORLD_HEIGHT + 120.0;

/// Damps one knockback axis toward zero without overshooting sign.
fn damp_axis(v: f32) -> f32 {
    let damped = v * KNOCKBACK_DAMPING;
    if damped.abs() < KNOCKBACK_EPSILON {
        0.0
    } else {
        damped
    }
}

/// Per-tick knockback decay.
pub fn decay_knockback(knockback: &mut Vec2) {
    knockback.x = damp_axis(knockback.x);
    knockback.y = damp_axis(knockback.y);
}

/// Jump on the Up press edge: from the ground freely, airborne while
/// bounded air jumps remain.
pub fn try_jump(player: &mut Player) {
    if player.on_ground {
        player.vel.y = JUMP_VELOCITY;
        player.on_ground = false;
    } else if player.air_jumps_left > 0 {
        player.vel.y = JUMP_VELOCITY;
        player.air_jumps_left -= 1;
    }
}

/// Integrates one live player for one tick.
pub fn step_player(player: &mut Player, obstacles: &HashMap<EntityId, Obstacle>, dt: f32) {
    // ─── Horizontal ───
    let dx = (movement_dir(player.held) * PLAYER_SPEED + player.knockback.x) * dt;
    if dx != 0.0 {
        let candidate = player.aabb().offset(Vec2::new(dx, 0.0));
        let blocked = obstacles
            .values()
            .any(|o| o.is_solid() && candidate.overlaps(&o.aabb()));
        if !blocked {
            player.pos.x += dx;
        }
    }
    player.pos.x = player.pos.x.clamp(0.0, WORLD_WIDTH - player.size.x);

    // ─── Vertical ───
    player.vel.y += GRAVITY * dt;
    let dy = (player.vel.y + player.knockback.y) * dt;
    let dropping = player.held.contains(InputFlags::DOWN);

    if dy > 0.0 {
        // Falling: land on the first surface the feet cross.
        let aabb = player.aabb();
        let feet = aabb.bottom;
        let mut landing: Option<f32> = None;
        for o in obstacles.values() {
            let top = o.aabb().top;
            let lateral = aabb.right > o.aabb().left && aabb.left < o.aabb().right;
            if !lateral || feet > top || feet + dy < top {
                continue;
            }
            if !o.is_solid() && dropping {
                continue;
            }
            landing = Some(landing.map_or(top, |best: f32| best.min(top)));
        }
        match landing {
            Some(top) => {
                player.pos.y = top - player.size.y;
                player.vel.y = 0.0;
                player.knockback.y = 0.0;
                player.on_ground = true;
                player.air_jumps_left = MAX_AIR_JUMPS;
            }
            None => {
                player.pos.y += dy;
                player.on_ground = false;
            }
        }
    } else if dy < 0.0 {
        // Rising: solids bump the head, platforms are pass-through.
        let candidate = player.aabb().offset(Vec2::new(0.0, dy));
        let bumped = obstacles
            .values()
            .any(|o| o.is_solid() && candidate.overlaps(&o.aabb()));
        if bumped {
            player.vel.y = 0.0;
        } else {
            player.pos.y += dy;
        }
        player.on_ground = false;
    } else if player.on_ground {
        // Standing still: verify the support is still there (it may have
        // been torn down or moved away).
        let aabb = player.aabb();
        let supported = obstacles.values().any(|o| {
            let top = o.aabb().top;
            aabb.right > o.aabb().left
                && aabb.left < o.aabb().right
                && (aabb.bottom - top).abs() <= 0.5
                && !(dropping && !o.is_solid())
        });
        if !supported {
            player.on_ground = false;
        }
    }

    if player.pos.y < 0.0 {
        player.pos.y = 0.0;
        player.vel.y = player.vel.y.max(0.0);
    }

    decay_knockback(&mut player.knockback);
}

/// Whether a player has fallen out of the world.
pub fn fell_out(player: &Player) -> bool {
    player.pos.y > FALL_OUT_Y
}

/// Moves animated obstacles and bounces them off the world bounds.
pub fn step_obstacles(obstacles: &mut HashMap<EntityId, Obstacle>, dt: f32) {
    for o in obstacles.values_mut() {
        if o.vel == Vec2::ZERO {
            o.moved = false;
            continue;
        }
        o.pos = o.pos.add(o.vel.scale(dt));
        if o.pos.x < 0.0 || o.pos.x + o.size.x > WORLD_WIDTH {
            o.vel.x = -o.vel.x;
            o.pos.x = o.pos.x.clamp(0.0, WORLD_WIDTH - o.size.x);
        }
        if o.pos.y < 0.0 || o.pos.y + o.size.y > WORLD_HEIGHT {
            o.vel.y = -o.vel.y;
            o.pos.y = o.pos.y.clamp(0.0, WORLD_HEIGHT - o.size.y);
        }
        o.moved = true;
    }
}

/// Advances projectiles and burns one tick of lifetime each.
pub fn step_projectiles(shots: &mut HashMap<EntityId, Projectile>, dt: f32) {
    for p in shots.values_mut() {
        p.pos = p.pos.add(p.vel.scale(dt));
        p.ttl = p.ttl.saturating_sub(1);
    }
}
