//! Zone grid geometry

use serde::{Deserialize, Serialize};

/// Side length of a zone grid.
pub const ZONE_SIZE: i32 = 50;

/// Tile position inside a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance between two positions
    pub fn distance(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    pub fn within(self, other: Position, radius: u32) -> bool {
        self.distance(other) <= radius
    }

    pub fn in_bounds(self) -> bool {
        (0..ZONE_SIZE).contains(&self.x) && (0..ZONE_SIZE).contains(&self.y)
    }

    /// One grid step toward `target`, moving along the longer axis first.
    pub fn step_toward(self, target: Position) -> Position {
        let dx = target.x - self.x;
        let dy = target.y - self.y;
        if dx == 0 && dy == 0 {
            return self;
        }
        if dx.abs() >= dy.abs() {
            Position::new(self.x + dx.signum(), self.y)
        } else {
            Position::new(self.x, self.y + dy.signum())
        }
    }
}
