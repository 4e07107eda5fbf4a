//! Entity records owned by the room simulation.
//!
//! These are the authoritative records; the component registry only holds
//! rendering-relevant mirrors written from here. Enemy movement patterns are
//! a tagged enum carrying exactly the state they need to persist (center,
//! phase, traveled distance), so a paused tick loop resumes without
//! desynchronizing. No pattern reads the wall clock.

use arena_shared::ecs::EntityId;
use arena_shared::level::{ObstacleKind, PatternKind, PickupKind};
use arena_shared::math::{Aabb, Vec2};
use arena_shared::wire::ClientId;

use crate::input::InputFlags;

/// Player lifecycle state. `Dead` is terminal for the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Alive,
    Respawning { ticks_left: u32 },
    Dead,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: ClientId,
    /// Mirror entity in the component registry.
    pub entity: EntityId,
    pub name: String,
    /// Join order; used for deterministic spawn fallback.
    pub spawn_index: usize,
    pub pos: Vec2,
    pub vel: Vec2,
    /// Transient hit impulse, damped toward zero each tick.
    pub knockback: Vec2,
    pub size: Vec2,
    pub health: i16,
    pub max_health: i16,
    pub lives: u32,
    pub score: u32,
    pub state: PlayerState,
    pub held: InputFlags,
    /// Last nonzero input direction; attacks aim along this.
    pub facing: Vec2,
    pub on_ground: bool,
    pub air_jumps_left: u32,
    /// Ticks until the player can take contact/projectile damage again.
    pub damage_cooldown: u32,
    /// Ticks until the next shot is allowed.
    pub shoot_cooldown: u32,
}

impl Player {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.aabb().center()
    }

    pub fn is_alive(&self) -> bool {
        self.state == PlayerState::Alive
    }

    /// Still participating in the match (not terminally dead).
    pub fn in_play(&self) -> bool {
        self.state != PlayerState::Dead
    }
}

#[derive(Debug, Clone)]
pub struct Enemy {
    pub id: EntityId,
    pub pos: Vec2,
    pub size: Vec2,
    pub health: i16,
    pub contact_damage: i16,
    pub score_value: i32,
    pub pattern: MovementPattern,
    /// Player credited with the kill when health reaches zero.
    pub last_hit_by: Option<ClientId>,
}

impl Enemy {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    pub fn center(&self) -> Vec2 {
        self.aabb().center()
    }
}

/// Who fired a projectile. Player- and enemy-owned projectiles live in
/// separate maps and collide with different target sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectileSource {
    Player(ClientId),
    Enemy(EntityId),
}

impl ProjectileSource {
    /// Owner id as it appears on the wire.
    pub fn wire_owner(&self) -> u32 {
        match self {
            ProjectileSource::Player(id) => id.0,
            ProjectileSource::Enemy(id) => id.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub damage: i16,
    pub source: ProjectileSource,
    /// Remaining lifetime in ticks.
    pub ttl: u32,
}

impl Projectile {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }
}

#[derive(Debug, Clone)]
pub struct Obstacle {
    pub id: EntityId,
    pub pos: Vec2,
    pub size: Vec2,
    pub kind: ObstacleKind,
    pub vel: Vec2,
    /// Set by the integrator on ticks where the obstacle changed position.
    pub moved: bool,
}

impl Obstacle {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }

    pub fn is_solid(&self) -> bool {
        self.kind == ObstacleKind::Solid
    }
}

#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: EntityId,
    pub pos: Vec2,
    pub size: Vec2,
    pub kind: PickupKind,
}

impl Pickup {
    pub fn aabb(&self) -> Aabb {
        Aabb::from_pos_size(self.pos, self.size)
    }
}

/// Result of advancing a movement pattern one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternStep {
    pub pos: Vec2,
    /// Turrets request a ranged attack on this tick.
    pub fire: bool,
}

/// Enemy movement patterns. Each variant persists only what it needs to
/// resume: the tick loop can pause indefinitely and the next step continues
/// from the stored phase.
#[derive(Debug, Clone, PartialEq)]
pub enum MovementPattern {
    /// Constant drift.
    Straight { vel: Vec2 },
    /// Horizontal drift with lateral oscillation keyed to traveled
    /// horizontal distance.
    Zigzag {
        vel_x: f32,
        base_y: f32,
        amplitude: f32,
        wavelength: f32,
        traveled: f32,
    },
    /// Fixed-radius orbit around the spawn-time center.
    Circular {
        center: Vec2,
        radius: f32,
        angular_vel: f32,
        phase: f32,
    },
    /// Stationary, fires at the nearest living player on a fixed cadence.
    Turret { interval: f32, cooldown: f32 },
    /// Slow horizontal drift with a wide sinusoidal sweep.
    BossPhase {
        vel_x: f32,
        base_y: f32,
        amplitude: f32,
        frequency: f32,
        phase: f32,
    },
    /// Lissajous figure-8 around the spawn-time center.
    FigureEight {
        center: Vec2,
        radius: f32,
        frequency: f32,
        phase: f32,
    },
    /// Orbit whose radius grows with phase.
    Spiral {
        center: Vec2,
        angular_vel: f32,
        growth: f32,
        phase: f32,
    },
}

impl MovementPattern {
    /// Builds a pattern from its level-descriptor tag, recording the spawn
    /// position as the pattern center where one is needed.
    pub fn from_kind(kind: PatternKind, spawn: Vec2, speed: f32) -> Self {
        match kind {
            PatternKind::Straight => MovementPattern::Straight {
                vel: Vec2::new(-speed, 0.0),
            },
            PatternKind::Zigzag => MovementPattern::Zigzag {
                vel_x: -speed,
                base_y: spawn.y,
                amplitude: 40.0,
                wavelength: 120.0,
                traveled: 0.0,
            },
            PatternKind::Circular => MovementPattern::Circular {
                center: spawn,
                radius: 50.0,
                angular_vel: speed / 50.0,
                phase: 0.0,
            },
            PatternKind::Turret => MovementPattern::Turret {
                interval: 1.5,
                cooldown: 1.5,
            },
            PatternKind::BossPhase => MovementPattern::BossPhase {
                vel_x: -speed * 0.5,
                base_y: spawn.y,
                amplitude: 80.0,
                frequency: 1.2,
                phase: 0.0,
            },
            PatternKind::FigureEight => MovementPattern::FigureEight {
                center: spawn,
                radius: 60.0,
                frequency: speed / 60.0,
                phase: 0.0,
            },
            PatternKind::Spiral => MovementPattern::Spiral {
                center: spawn,
                angular_vel: speed / 40.0,
                growth: 8.0,
                phase: 0.0,
            },
        }
    }

    /// Advances one tick. Pure in (stored state, current position, dt).
    pub fn step(&mut self, pos: Vec2, dt: f32) -> PatternStep {
        match self {
            MovementPattern::Straight { vel } => PatternStep {
                pos: pos.add(vel.scale(dt)),
                fire: false,
            },
            MovementPattern::Zigzag {
                vel_x,
                base_y,
                amplitude,
                wavelength,
                traveled,
            } => {
                *traveled += vel_x.abs() * dt;
                let y = *base_y
                    + *amplitude * (std::f32::consts::TAU * *traveled / *wavelength).sin();
                PatternStep {
                    pos: Vec2::new(pos.x + *vel_x * dt, y),
                    fire: false,
                }
            }
            MovementPattern::Circular {
                center,
                radius,
                angular_vel,
                phase,
            } => {
                *phase += *angular_vel * dt;
                PatternStep {
                    pos: Vec2::new(
                        center.x + *radius * phase.cos(),
                        center.y + *radius * phase.sin(),
                    ),
                    fire: false,
                }
            }
            MovementPattern::Turret { interval, cooldown } => {
                *cooldown -= dt;
                let fire = *cooldown <= 0.0;
                if fire {
                    *cooldown += *interval;
                }
                PatternStep { pos, fire }
            }
            MovementPattern::BossPhase {
                vel_x,
                base_y,
                amplitude,
                frequency,
                phase,
            } => {
                *phase += dt;
                PatternStep {
                    pos: Vec2::new(
                        pos.x + *vel_x * dt,
                        *base_y + *amplitude * (*frequency * *phase).sin(),
                    ),
                    fire: false,
                }
            }
            MovementPattern::FigureEight {
                center,
                radius,
                frequency,
                phase,
            } => {
                *phase += *frequency * dt;
                PatternStep {
                    pos: Vec2::new(
                        center.x + *radius * phase.sin(),
                        center.y + *radius * phase.sin() * phase.cos(),
                    ),
                    fire: false,
                }
            }
            MovementPattern::Spiral {
                center,
                angular_vel,
                growth,
                phase,
            } => {
                *phase += *angular_vel * dt;
                let r = *growth * *phase;
                PatternStep {
                    pos: Vec2::new(center.x + r * phase.cos(), center.y + r * phase.sin()),
                    fire: false,
                }
            }
        }
    }

    /// Reverses horizontal drift for patterns that have one. Used when a
    /// drifting enemy reaches the world edge.
    pub fn reverse_x(&mut self) {
        match self {
            MovementPattern::Straight { vel } => vel.x = -vel.x,
            MovementPattern::Zigzag { vel_x, .. } => *vel_x = -*vel_x,
            MovementPattern::BossPhase { vel_x, .. } => *vel_x = -*vel_x,
            _ => {}
        }
    }

    /// Whether the pattern drifts horizontally (and so needs edge reversal).
    pub fn drifts(&self) -> bool {
        matches!(
            self,
            MovementPattern::Straight { .. }
                | MovementPattern::Zigzag { .. }
                | MovementPattern::BossPhase { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn circular_pattern_is_resumable() {
        // Stepping twice with dt/2 lands on the same phase as once with dt:
        // the pattern depends only on accumulated state, never on when the
        // steps happened.
        let spawn = Vec2::new(200.0, 100.0);
        let mut whole = MovementPattern::from_kind(PatternKind::Circular, spawn, 60.0);
        let mut halves = whole.clone();

        let full = whole.step(spawn, DT).pos;
        let _ = halves.step(spawn, DT / 2.0);
        let resumed = halves.step(spawn, DT / 2.0).pos;

        assert!((full.x - resumed.x).abs() < 1e-4);
        assert!((full.y - resumed.y).abs() < 1e-4);
    }

    #[test]
    fn zigzag_tracks_traveled_distance_not_time() {
        let spawn = Vec2::new(400.0, 150.0);
        let mut pattern = MovementPattern::from_kind(PatternKind::Zigzag, spawn, 120.0);
        let mut pos = spawn;
        for _ in 0..30 {
            pos = pattern.step(pos, DT).pos;
        }
        // Drifted left, still oscillating around the spawn row.
        assert!(pos.x < spawn.x);
        assert!((pos.y - spawn.y).abs() <= 40.0 + 1e-3);
        let MovementPattern::Zigzag { traveled, .. } = pattern else {
            panic!("pattern changed variant");
        };
        assert!((traveled - 120.0 * 30.0 * DT).abs() < 1e-3);
    }

    #[test]
    fn circular_stays_on_orbit() {
        let spawn = Vec2::new(300.0, 200.0);
        let mut pattern = MovementPattern::from_kind(PatternKind::Circular, spawn, 60.0);
        let mut pos = spawn;
        for _ in 0..200 {
            pos = pattern.step(pos, DT).pos;
            let r = pos.sub(spawn).len();
            assert!((r - 50.0).abs() < 1e-3);
        }
    }

    #[test]
    fn turret_fires_on_cadence() {
        let spawn = Vec2::new(100.0, 100.0);
        let mut pattern = MovementPattern::from_kind(PatternKind::Turret, spawn, 0.0);
        let mut fired = 0;
        // 3.2 seconds of ticks at 60 Hz: expect shots at 1.5s and 3.0s.
        for _ in 0..192 {
            let step = pattern.step(spawn, DT);
            assert_eq!(step.pos, spawn);
            if step.fire {
                fired += 1;
            }
        }
        assert_eq!(fired, 2);
    }

    #[test]
    fn drifters_reverse_at_edges() {
        let mut pattern = MovementPattern::from_kind(PatternKind::Straight, Vec2::ZERO, 60.0);
        assert!(pattern.drifts());
        let before = pattern.step(Vec2::new(10.0, 0.0), DT).pos;
        assert!(before.x < 10.0);
        pattern.reverse_x();
        let after = pattern.step(Vec2::new(10.0, 0.0), DT).pos;
        assert!(after.x > 10.0);

        let mut turret = MovementPattern::from_kind(PatternKind::Turret, Vec2::ZERO, 0.0);
        assert!(!turret.drifts());
        turret.reverse_x();
    }
}
