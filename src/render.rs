//! Serde configuration documents and the grammar → image pipeline.
//!
//! A [`SketchConfig`] bundles a [`GrammarConfig`] and a [`RenderConfig`] so a
//! whole drawing can be described in one JSON/TOML document:
//!
//! ```json
//! {
//!   "grammar": { "axiom": "F", "rules": [{ "predecessor": "F", "successor": "F[+F]F[-F]F" }] },
//!   "render": { "depth": 4, "turn_angle": 25.7, "start": { "position": [0, 0], "heading": 90, "pen_down": true } }
//! }
//! ```

use crate::error::{LsysError, Result};
use crate::grammar::{Alphabet, AlphabetPolicy, Grammar, ProductionRule, RuleSet, Word};
use crate::interpreter::{InterpreterConfig, TurtleInterpreter};
use crate::raster::{CanvasTransform, Rasterizer};
use crate::turtle::TurtleState;
use image::Rgb;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One weighted alternative of a stochastic rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightedSuccessor {
    pub word: String,
    pub weight: f64,
}

/// A rule as written in a document. Exactly one of `successor` and
/// `successors` must be given.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub predecessor: String,
    pub successor: Option<String>,
    pub successors: Vec<WeightedSuccessor>,
}

impl RuleConfig {
    fn build(&self, alphabet: &Alphabet) -> Result<ProductionRule> {
        let predecessor = Word::parse(&self.predecessor, alphabet);
        let [letter] = predecessor.letters() else {
            return Err(LsysError::InvalidRule {
                predecessor: self.predecessor.clone(),
                reason: "predecessor must be a single letter".into(),
            });
        };

        match (&self.successor, self.successors.is_empty()) {
            (Some(word), true) => Ok(ProductionRule::new(
                letter.clone(),
                Word::parse(word, alphabet),
            )),
            (None, false) => ProductionRule::stochastic(
                letter.clone(),
                self.successors
                    .iter()
                    .map(|s| (Word::parse(&s.word, alphabet), s.weight))
                    .collect(),
            ),
            (Some(_), false) => Err(LsysError::InvalidRule {
                predecessor: self.predecessor.clone(),
                reason: "both `successor` and `successors` given".into(),
            }),
            (None, true) => Err(LsysError::InvalidRule {
                predecessor: self.predecessor.clone(),
                reason: "no successor given".into(),
            }),
        }
    }
}

/// A grammar as written in a document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// Declared symbols. Also drives tokenization of multi-character letters.
    pub alphabet: Vec<String>,
    pub axiom: String,
    pub rules: Vec<RuleConfig>,
    pub policy: AlphabetPolicy,
    pub max_word_len: Option<usize>,
}

impl GrammarConfig {
    /// Validates the document into a [`Grammar`].
    pub fn build(&self) -> Result<Grammar> {
        let alphabet: Alphabet = self.alphabet.iter().cloned().collect();
        let axiom = Word::parse(&self.axiom, &alphabet);
        let rules = self
            .rules
            .iter()
            .map(|r| r.build(&alphabet))
            .collect::<Result<Vec<_>>>()?;

        let grammar = Grammar::new(alphabet, axiom, RuleSet::from_rules(rules)?, self.policy)?;
        Ok(match self.max_word_len {
            Some(limit) => grammar.with_max_word_len(limit),
            None => grammar,
        })
    }
}

/// Rendering parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Number of derivation steps applied to the axiom.
    pub depth: usize,
    /// Seed for stochastic rules.
    pub seed: u64,
    pub step_length: f32,
    /// Degrees.
    pub turn_angle: f32,
    pub start: TurtleState,
    pub width: u32,
    pub height: u32,
    pub background: [u8; 3],
    pub line_color: [u8; 3],
    pub line_width: u32,
    /// Scale the drawing to fill the canvas instead of drawing 1:1 around the center.
    pub fit: bool,
    /// Pixels left free on each side when `fit` is set.
    pub margin: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            depth: 3,
            seed: 0,
            step_length: 10.0,
            turn_angle: 90.0,
            start: TurtleState::default(),
            width: 800,
            height: 800,
            background: [255, 255, 255],
            line_color: [0, 0, 0],
            line_width: 1,
            fit: true,
            margin: 10.0,
        }
    }
}

/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 16_384;

/// Largest accepted brush width, in pixels.
pub const MAX_LINE_WIDTH: u32 = 256;

impl RenderConfig {
    /// Turtle parameters for this render.
    pub fn interpreter(&self) -> InterpreterConfig {
        InterpreterConfig::new(self.step_length, self.turn_angle)
    }

    /// Rejects empty or oversized canvases, oversized brushes and bad turtle parameters.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LsysError::InvalidParameter(format!(
                "canvas must be non-empty, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_CANVAS_SIDE || self.height > MAX_CANVAS_SIDE {
            return Err(LsysError::InvalidParameter(format!(
                "canvas sides are capped at {MAX_CANVAS_SIDE}, got {}x{}",
                self.width, self.height
            )));
        }
        if self.line_width > MAX_LINE_WIDTH {
            return Err(LsysError::InvalidParameter(format!(
                "line_width is capped at {MAX_LINE_WIDTH}, got {}",
                self.line_width
            )));
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) {
            return Err(LsysError::InvalidParameter(format!(
                "margin must be non-negative, got {}",
                self.margin
            )));
        }
        self.interpreter().validate()
    }
}

/// A complete drawing description.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SketchConfig {
    pub grammar: GrammarConfig,
    pub render: RenderConfig,
}

impl SketchConfig {
    /// Builds the grammar and renders it to `path`.
    pub fn render_to(&self, path: impl AsRef<Path>) -> Result<RenderReport> {
        let grammar = self.grammar.build()?;
        render(&grammar, &self.render, path)
    }
}

/// Summary of one pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    /// Letters in the interpreted (final) word.
    pub letters: usize,
    /// Segments emitted by the interpreter, drawn or not.
    pub segments: usize,
    /// Segments actually rasterized.
    pub drawn: usize,
    /// Letter indices of unmatched `]`.
    pub unmatched_pops: Vec<usize>,
    /// `[` left open at the end of the word.
    pub open_branches: usize,
}

impl RenderReport {
    /// True if the interpreted word had balanced brackets.
    pub fn is_balanced(&self) -> bool {
        self.unmatched_pops.is_empty() && self.open_branches == 0
    }
}

/// An in-memory render: the filled canvas plus its report.
pub struct Rendering {
    pub raster: Rasterizer,
    pub report: RenderReport,
}

/// Derives, interprets and rasterizes `grammar` without touching the filesystem.
///
/// Bracket imbalance does not fail the run; it shows up in the report.
pub fn draw(grammar: &Grammar, config: &RenderConfig) -> Result<Rendering> {
    config.validate()?;

    let words = grammar.derive_seeded(config.depth, config.seed)?;
    let word = words.last().cloned().unwrap_or_default();
    debug!(depth = config.depth, letters = word.len(), "derivation done");

    let interpreter = TurtleInterpreter::standard(config.interpreter())?;
    let run = interpreter.interpret(&word, config.start);

    let transform = match run.bounds() {
        Some(bounds) if config.fit => {
            CanvasTransform::fit(bounds, config.width, config.height, config.margin)
        }
        _ => CanvasTransform::centered(config.width, config.height),
    };

    let mut raster = Rasterizer::new(config.width, config.height, Rgb(config.background))
        .with_transform(transform);
    let drawn = raster.draw_segments(&run.segments, Rgb(config.line_color), config.line_width);
    debug!(drawn, "segments rasterized");

    Ok(Rendering {
        raster,
        report: RenderReport {
            letters: word.len(),
            segments: run.segments.len(),
            drawn,
            unmatched_pops: run.unmatched_pops,
            open_branches: run.open_branches,
        },
    })
}

/// Runs the full pipeline and writes the image to `path`.
pub fn render(
    grammar: &Grammar,
    config: &RenderConfig,
    path: impl AsRef<Path>,
) -> Result<RenderReport> {
    let Rendering { raster, report } = draw(grammar, config)?;
    raster.persist(path)?;
    Ok(report)
}
