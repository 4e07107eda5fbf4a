//! Level descriptors.
//!
//! A level is a JSON file describing what to spawn on transition: an enemy
//! wave, the obstacle/platform layout, and fixed pickups. The simulation
//! only consumes the descriptor lists; how they got on disk is someone
//! else's problem.
//!
//! Load failures are not fatal: a missing or malformed file logs a warning
//! and yields an empty level, so a bad asset never takes a room down.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Enemy movement pattern selector. The simulation builds the pattern's
/// persisted state (center, phase) from the spawn position at spawn time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Straight,
    Zigzag,
    Circular,
    Turret,
    BossPhase,
    FigureEight,
    Spiral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemySpawn {
    pub x: f32,
    pub y: f32,
    pub pattern: PatternKind,
    #[serde(default = "default_enemy_health")]
    pub health: i16,
    #[serde(default = "default_enemy_size")]
    pub width: f32,
    #[serde(default = "default_enemy_size")]
    pub height: f32,
    #[serde(default = "default_enemy_speed")]
    pub speed: f32,
    #[serde(default = "default_contact_damage")]
    pub contact_damage: i16,
    #[serde(default = "default_score_value")]
    pub score_value: i32,
}

fn default_enemy_health() -> i16 {
    30
}
fn default_enemy_size() -> f32 {
    28.0
}
fn default_enemy_speed() -> f32 {
    60.0
}
fn default_contact_damage() -> i16 {
    10
}
fn default_score_value() -> i32 {
    100
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleKind {
    /// Blocks movement from every side.
    Solid,
    /// One-way: supports a landing from above, droppable by holding Down.
    Platform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObstacleSpawn {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub kind: ObstacleKind,
    #[serde(default)]
    pub vel_x: f32,
    #[serde(default)]
    pub vel_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Heal,
    ExtraLife,
    Score,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupSpawn {
    pub x: f32,
    pub y: f32,
    pub kind: PickupKind,
}

/// One level's spawn lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LevelDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enemies: Vec<EnemySpawn>,
    #[serde(default)]
    pub obstacles: Vec<ObstacleSpawn>,
    #[serde(default)]
    pub pickups: Vec<PickupSpawn>,
    /// Per-player spawn points, indexed by join order. Players beyond the
    /// list fall back to a deterministic default.
    #[serde(default)]
    pub player_spawns: Vec<(f32, f32)>,
}

impl LevelDef {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read level {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parse level {}", path.display()))
    }
}

/// Ordered set of levels for a room.
#[derive(Debug, Clone, Default)]
pub struct LevelSet {
    levels: Vec<LevelDef>,
}

impl LevelSet {
    pub fn from_levels(levels: Vec<LevelDef>) -> Self {
        Self { levels }
    }

    /// Loads every `*.json` in a directory, sorted by file name. An
    /// unreadable directory or file logs a warning and contributes nothing.
    pub fn load_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = match fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .collect(),
            Err(err) => {
                warn!(dir = %dir.display(), error = %err, "Level directory unreadable, starting empty");
                return Self::default();
            }
        };
        paths.sort();

        let mut levels = Vec::new();
        for path in paths {
            match LevelDef::load(&path) {
                Ok(level) => levels.push(level),
                Err(err) => {
                    warn!(level = %path.display(), error = %err, "Level failed to load, treating as empty");
                    levels.push(LevelDef::default());
                }
            }
        }
        Self { levels }
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Level at `index`, wrapping when `endless` and past the end. `None`
    /// means the match is over (or no levels exist at all).
    pub fn get(&self, index: usize, endless: bool) -> Option<&LevelDef> {
        if self.levels.is_empty() {
            return None;
        }
        if endless {
            self.levels.get(index % self.levels.len())
        } else {
            self.levels.get(index)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parses_with_defaults() {
        let level = LevelDef::from_json_str(
            r#"{
                "name": "wave-1",
                "enemies": [{"x": 100.0, "y": 50.0, "pattern": "zigzag"}],
                "obstacles": [{"x": 0.0, "y": 500.0, "width": 850.0, "height": 20.0, "kind": "solid"}]
            }"#,
        )
        .unwrap();
        assert_eq!(level.name, "wave-1");
        assert_eq!(level.enemies.len(), 1);
        assert_eq!(level.enemies[0].pattern, PatternKind::Zigzag);
        assert_eq!(level.enemies[0].health, 30);
        assert_eq!(level.obstacles[0].kind, ObstacleKind::Solid);
        assert_eq!(level.obstacles[0].vel_x, 0.0);
        assert!(level.pickups.is_empty());
    }

    #[test]
    fn missing_dir_yields_empty_set() {
        let set = LevelSet::load_dir("definitely/not/a/dir");
        assert!(set.is_empty());
        assert!(set.get(0, false).is_none());
        assert!(set.get(0, true).is_none());
    }

    #[test]
    fn endless_wraps_level_index() {
        let set = LevelSet::from_levels(vec![
            LevelDef {
                name: "a".into(),
                ..Default::default()
            },
            LevelDef {
                name: "b".into(),
                ..Default::default()
            },
        ]);
        assert_eq!(set.get(1, false).unwrap().name, "b");
        assert!(set.get(2, false).is_none());
        assert_eq!(set.get(2, true).unwrap().name, "a");
        assert_eq!(set.get(5, true).unwrap().name, "b");
    }
}
