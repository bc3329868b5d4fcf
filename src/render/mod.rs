//! Draw-side integration

pub mod draw;

pub use draw::{DrawLoop, DrawOutcome, DrawSurface};
