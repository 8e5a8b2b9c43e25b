//! Interpreter that converts a derived [`Word`] into an ordered list of [`Segment`]s.
//!
//! The entry point is [`TurtleInterpreter`]. Configure it with an
//! [`InterpreterConfig`], register symbol-to-operation mappings via
//! [`TurtleInterpreter::set_op`] or [`TurtleInterpreter::populate_standard_symbols`],
//! then call [`TurtleInterpreter::interpret`] with a word and a starting state.

use crate::error::{LsysError, Result};
use crate::grammar::{Letter, Word};
use crate::turtle::{Segment, TurtleOp, TurtleState};
use glam::Vec2;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Configuration for turtle interpretation.
#[derive(Clone, Debug)]
pub struct InterpreterConfig {
    /// Distance travelled by `F` and `f`. Must be positive and finite.
    pub step_length: f32,
    /// Rotation applied by `+` and `-`, in degrees.
    pub turn_angle: f32,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            step_length: 10.0,
            turn_angle: 90.0,
        }
    }
}

impl InterpreterConfig {
    /// Step length and turn angle, unvalidated.
    pub fn new(step_length: f32, turn_angle: f32) -> Self {
        Self {
            step_length,
            turn_angle,
        }
    }

    /// Rejects non-positive or non-finite steps and non-finite angles.
    pub fn validate(&self) -> Result<()> {
        if !(self.step_length.is_finite() && self.step_length > 0.0) {
            return Err(LsysError::InvalidParameter(format!(
                "step_length must be positive, got {}",
                self.step_length
            )));
        }
        if !self.turn_angle.is_finite() {
            return Err(LsysError::InvalidParameter(format!(
                "turn_angle must be finite, got {}",
                self.turn_angle
            )));
        }
        Ok(())
    }
}

/// The result of one interpretation run.
///
/// Bracket problems never discard segments: they are recorded here and the
/// caller decides whether to treat the run as malformed.
#[derive(Clone, Debug, Default)]
pub struct Interpretation {
    /// Every segment, in the order the commands were read.
    pub segments: Vec<Segment>,
    /// Turtle state after the last letter.
    pub final_state: TurtleState,
    /// Letter indices of `]` read while the stack was empty.
    pub unmatched_pops: Vec<usize>,
    /// Number of `[` still open when the word ended.
    pub open_branches: usize,
}

impl Interpretation {
    /// True if every `[` had a matching `]`.
    pub fn is_balanced(&self) -> bool {
        self.unmatched_pops.is_empty() && self.open_branches == 0
    }

    /// Turns a bracket imbalance into an error, reporting the first problem.
    pub fn check(&self) -> Result<()> {
        if let Some(&index) = self.unmatched_pops.first() {
            return Err(LsysError::UnbalancedBracket { index });
        }
        if self.open_branches > 0 {
            return Err(LsysError::UnclosedBranch {
                depth: self.open_branches,
            });
        }
        Ok(())
    }

    /// Iterates over the segments that should be rasterized.
    pub fn drawn(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.drawn)
    }

    /// Axis-aligned bounds `(min, max)` of the drawn segments.
    pub fn bounds(&self) -> Option<(Vec2, Vec2)> {
        self.drawn().fold(None, |acc, s| {
            let (lo, hi) = (s.from.min(s.to), s.from.max(s.to));
            Some(match acc {
                Some((min, max)) => (min.min(lo), max.max(hi)),
                None => (lo, hi),
            })
        })
    }
}

/// Interprets words as turtle-graphics commands.
pub struct TurtleInterpreter {
    op_map: HashMap<String, TurtleOp>,
    config: InterpreterConfig,
}

impl TurtleInterpreter {
    /// Creates a new interpreter with the given configuration and an empty symbol map.
    ///
    /// Fails if the configuration has a non-positive step or a non-finite angle.
    pub fn new(config: InterpreterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            op_map: HashMap::new(),
            config,
        })
    }

    /// Creates an interpreter with the standard symbol table already registered.
    pub fn standard(config: InterpreterConfig) -> Result<Self> {
        let mut interpreter = Self::new(config)?;
        interpreter.populate_standard_symbols();
        Ok(interpreter)
    }

    /// Replaces the entire symbol-to-operation map in one step (builder pattern).
    pub fn with_map(mut self, map: HashMap<String, TurtleOp>) -> Self {
        self.op_map = map;
        self
    }

    /// Assigns a single [`TurtleOp`] to a symbol, replacing any previous mapping.
    pub fn set_op(&mut self, symbol: impl Into<String>, op: TurtleOp) {
        self.op_map.insert(symbol.into(), op);
    }

    /// Registers the conventional mappings: `F f + - | [ ]`.
    pub fn populate_standard_symbols(&mut self) {
        let mappings = [
            ("F", TurtleOp::Draw),
            ("f", TurtleOp::Move),
            ("+", TurtleOp::TurnLeft),
            ("-", TurtleOp::TurnRight),
            ("|", TurtleOp::TurnAround),
            ("[", TurtleOp::Push),
            ("]", TurtleOp::Pop),
        ];

        for (sym, op) in mappings {
            self.set_op(sym, op);
        }
    }

    /// The step length and turn angle in use.
    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// The operation a letter triggers. Edge letters always draw; node letters
    /// and unmapped symbols are ignored.
    pub fn op_for(&self, letter: &Letter) -> TurtleOp {
        match letter {
            Letter::Symbol(s) => self.op_map.get(s).copied().unwrap_or(TurtleOp::Ignore),
            Letter::Edge { symbol, .. } => {
                self.op_map.get(symbol).copied().unwrap_or(TurtleOp::Draw)
            }
            Letter::Node { .. } => TurtleOp::Ignore,
        }
    }

    /// Walks `word` left to right starting from `initial` and returns the segments.
    ///
    /// # Push / Pop
    ///
    /// `[` saves the full turtle state onto a stack and `]` restores it. A `]`
    /// with nothing to restore leaves the state untouched and is recorded in
    /// [`Interpretation::unmatched_pops`]; interpretation continues.
    pub fn interpret(&self, word: &Word, initial: TurtleState) -> Interpretation {
        let mut turtle = TurtleState::new(initial.position, initial.heading);
        turtle.pen_down = initial.pen_down;
        let mut stack: Vec<TurtleState> = Vec::new();
        let mut out = Interpretation::default();

        for (index, letter) in word.iter().enumerate() {
            match self.op_for(letter) {
                TurtleOp::Draw => out
                    .segments
                    .push(turtle.advance(self.config.step_length, true)),
                TurtleOp::Move => out
                    .segments
                    .push(turtle.advance(self.config.step_length, false)),
                TurtleOp::TurnLeft => turtle.turn(self.config.turn_angle),
                TurtleOp::TurnRight => turtle.turn(-self.config.turn_angle),
                TurtleOp::TurnAround => turtle.turn(180.0),
                TurtleOp::Push => stack.push(turtle),
                TurtleOp::Pop => match stack.pop() {
                    Some(saved) => turtle = saved,
                    None => out.unmatched_pops.push(index),
                },
                TurtleOp::Ignore => {}
            }
        }

        out.final_state = turtle;
        out.open_branches = stack.len();

        if !out.is_balanced() {
            warn!(
                unmatched_pops = out.unmatched_pops.len(),
                open_branches = out.open_branches,
                "malformed branch structure"
            );
        }
        debug!(segments = out.segments.len(), "interpreted word");

        out
    }
}
