//! # symbios-sketch
//!
//! Generates Lindenmayer systems and renders them as 2D turtle drawings.
//!
//! The pipeline is a single data flow: a [`Grammar`] rewrites its axiom into a
//! derivation sequence, a [`TurtleInterpreter`] turns the final word into
//! ordered [`Segment`]s, and a [`Rasterizer`] paints those onto a canvas that
//! is saved as an ordinary image file. [`render`] wires the three together.

pub mod error;
pub mod grammar;
pub mod interpreter;
pub mod raster;
pub mod render;
pub mod turtle;

pub use error::*;
pub use grammar::*;
pub use interpreter::*;
pub use raster::*;
pub use render::*;
pub use turtle::*;
