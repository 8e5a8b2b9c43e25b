//! Turtle state, operations and the segments the interpreter emits.
//!
//! Turtle space is y-up: heading 0° points along `+X` and positive turns are
//! counter-clockwise. Headings are always kept in `[0, 360)`.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Position, heading and pen of the drawing turtle.
///
/// This single type is both the live state and the snapshot pushed by `[`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurtleState {
    /// Current position in turtle space.
    pub position: Vec2,

    /// Heading in degrees, normalized to `[0, 360)`.
    pub heading: f32,

    /// Whether the last step was drawn (`F`) rather than skipped (`f`).
    pub pen_down: bool,
}

impl Default for TurtleState {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            heading: 0.0,
            pen_down: true,
        }
    }
}

impl TurtleState {
    /// Creates a state at `position` facing `heading` degrees (normalized).
    pub fn new(position: Vec2, heading: f32) -> Self {
        Self {
            position,
            heading: normalize_degrees(heading),
            pen_down: true,
        }
    }

    /// Unit vector along the current heading.
    pub fn direction(&self) -> Vec2 {
        Vec2::from_angle(self.heading.to_radians())
    }

    /// Turns by `degrees` (counter-clockwise positive).
    pub fn turn(&mut self, degrees: f32) {
        self.heading = normalize_degrees(self.heading + degrees);
    }

    /// Advances `distance` along the heading and returns the segment travelled.
    pub fn advance(&mut self, distance: f32, drawn: bool) -> Segment {
        let from = self.position;
        self.position += self.direction() * distance;
        self.pen_down = drawn;
        Segment {
            from,
            to: self.position,
            drawn,
        }
    }
}

/// Wraps an angle in degrees into `[0, 360)`.
pub fn normalize_degrees(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// One unit of interpreter output: a straight move, drawn or not.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub from: Vec2,
    pub to: Vec2,
    pub drawn: bool,
}

impl Segment {
    /// Euclidean length of the move.
    pub fn length(&self) -> f32 {
        self.from.distance(self.to)
    }

    /// Direction of travel in degrees, `[0, 360)`. Zero-length segments report 0.
    pub fn heading(&self) -> f32 {
        let d = self.to - self.from;
        if d == Vec2::ZERO {
            return 0.0;
        }
        normalize_degrees(d.y.atan2(d.x).to_degrees())
    }
}

/// Operations that can be performed by the drawing turtle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurtleOp {
    /// Move forward and emit a drawn segment (`F`).
    Draw,
    /// Move forward and emit a pen-up segment (`f`).
    Move,
    /// Turn by `+turn_angle` (`+`).
    TurnLeft,
    /// Turn by `-turn_angle` (`-`).
    TurnRight,
    /// Turn 180 degrees (`|`).
    TurnAround,
    /// Save the turtle state onto the stack (`[`).
    Push,
    /// Restore the most recently pushed turtle state (`]`).
    Pop,
    /// No-op; the symbol has no registered meaning.
    Ignore,
}
