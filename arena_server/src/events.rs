//! Gameplay events.
//!
//! Pushed onto the room's [`EventBus`] by the combat and lifecycle systems
//! as things happen mid-tick, drained by the broadcaster at the end of the
//! tick. Each event maps to one wire message.
//!
//! [`EventBus`]: arena_shared::event::EventBus

use arena_shared::ecs::EntityId;
use arena_shared::level::{ObstacleKind, PickupKind};
use arena_shared::math::Vec2;
use arena_shared::wire::ClientId;

#[derive(Debug, Clone, PartialEq)]
pub struct EnemySpawned {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleSpawned {
    pub id: EntityId,
    pub kind: ObstacleKind,
    pub pos: Vec2,
    pub size: Vec2,
    pub vel: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSpawned {
    pub id: EntityId,
    pub owner: u32,
    pub pos: Vec2,
    pub vel: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickupSpawned {
    pub id: EntityId,
    pub kind: PickupKind,
    pub pos: Vec2,
}

/// Any entity removed from the simulation this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Despawned {
    pub id: EntityId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthChanged {
    pub client_id: ClientId,
    pub current: i16,
    pub max: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamScoreChanged {
    pub total: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerScoreChanged {
    pub client_id: ClientId,
    pub score: u32,
}

/// Terminal death. Fired exactly once per player per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerDied {
    pub client_id: ClientId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelStarted {
    pub index: u32,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchEnded {
    pub winner: Option<ClientId>,
}
