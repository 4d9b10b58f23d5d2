//! Color primitives for backgrounds and material tints.

mod color;

pub use color::Color;
