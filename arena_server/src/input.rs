//! Input aggregation.
//!
//! Tracks a whitelist of input codes per player: four directions and two
//! action buttons. Each packet is a (code, pressed) edge; the aggregator
//! keeps the currently-held set and the last nonzero direction pair, which
//! gives attacks a facing even when the player stands still.
//!
//! Action buttons and jump are press edges: holding a button does not
//! repeat the action.

use arena_shared::math::Vec2;
use arena_shared::wire::InputCode;
use bitflags::bitflags;

bitflags! {
    /// Currently-held keys.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InputFlags: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const ATTACK = 1 << 4;
        const SHOOT = 1 << 5;
    }
}

impl InputFlags {
    fn for_code(code: InputCode) -> Self {
        match code {
            InputCode::Up => InputFlags::UP,
            InputCode::Down => InputFlags::DOWN,
            InputCode::Left => InputFlags::LEFT,
            InputCode::Right => InputFlags::RIGHT,
            InputCode::J => InputFlags::ATTACK,
            InputCode::K => InputFlags::SHOOT,
        }
    }
}

/// An action that must resolve immediately on the press edge, not at end of
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionEdge {
    Jump,
    Melee,
    Shoot,
}

/// Applies one input edge to a player's held set and facing. Returns the
/// action to resolve now, if the edge triggered one.
pub fn apply_event(
    held: &mut InputFlags,
    facing: &mut Vec2,
    code: InputCode,
    pressed: bool,
) -> Option<ActionEdge> {
    let flag = InputFlags::for_code(code);
    let is_edge = pressed && !held.contains(flag);
    held.set(flag, pressed);

    // Refresh the facing from whatever directions are now held; zero input
    // leaves the last known facing in place.
    let dir = held_direction(*held);
    if dir != Vec2::ZERO {
        *facing = dir;
    }

    if !is_edge {
        return None;
    }
    match code {
        InputCode::Up => Some(ActionEdge::Jump),
        InputCode::J => Some(ActionEdge::Melee),
        InputCode::K => Some(ActionEdge::Shoot),
        _ => None,
    }
}

/// Direction pair from held keys, components in {-1, 0, 1}. Screen
/// coordinates: Up is -y.
pub fn held_direction(held: InputFlags) -> Vec2 {
    let mut dir = Vec2::ZERO;
    if held.contains(InputFlags::LEFT) {
        dir.x -= 1.0;
    }
    if held.contains(InputFlags::RIGHT) {
        dir.x += 1.0;
    }
    if held.contains(InputFlags::UP) {
        dir.y -= 1.0;
    }
    if held.contains(InputFlags::DOWN) {
        dir.y += 1.0;
    }
    dir
}

/// Horizontal movement factor from held keys: -1, 0, or 1.
pub fn movement_dir(held: InputFlags) -> f32 {
    held_direction(held).x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_tracks_held_set() {
        let mut held = InputFlags::default();
        let mut facing = Vec2::new(1.0, 0.0);

        apply_event(&mut held, &mut facing, InputCode::Left, true);
        assert!(held.contains(InputFlags::LEFT));
        assert_eq!(movement_dir(held), -1.0);

        apply_event(&mut held, &mut facing, InputCode::Left, false);
        assert!(!held.contains(InputFlags::LEFT));
        assert_eq!(movement_dir(held), 0.0);
    }

    #[test]
    fn facing_keeps_last_nonzero_direction() {
        let mut held = InputFlags::default();
        let mut facing = Vec2::new(1.0, 0.0);

        apply_event(&mut held, &mut facing, InputCode::Left, true);
        apply_event(&mut held, &mut facing, InputCode::Up, true);
        assert_eq!(facing, Vec2::new(-1.0, -1.0));

        // Releasing everything leaves the facing untouched.
        apply_event(&mut held, &mut facing, InputCode::Left, false);
        assert_eq!(facing, Vec2::new(0.0, -1.0));
        apply_event(&mut held, &mut facing, InputCode::Up, false);
        assert_eq!(facing, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn action_fires_on_press_edge_only() {
        let mut held = InputFlags::default();
        let mut facing = Vec2::new(1.0, 0.0);

        let first = apply_event(&mut held, &mut facing, InputCode::J, true);
        assert_eq!(first, Some(ActionEdge::Melee));
        // Repeated press packets while held do not re-trigger.
        let repeat = apply_event(&mut held, &mut facing, InputCode::J, true);
        assert_eq!(repeat, None);
        let release = apply_event(&mut held, &mut facing, InputCode::J, false);
        assert_eq!(release, None);
        let again = apply_event(&mut held, &mut facing, InputCode::J, true);
        assert_eq!(again, Some(ActionEdge::Melee));
    }

    #[test]
    fn jump_and_shoot_edges() {
        let mut held = InputFlags::default();
        let mut facing = Vec2::new(1.0, 0.0);
        assert_eq!(
            apply_event(&mut held, &mut facing, InputCode::Up, true),
            Some(ActionEdge::Jump)
        );
        assert_eq!(
            apply_event(&mut held, &mut facing, InputCode::K, true),
            Some(ActionEdge::Shoot)
        );
    }
}
