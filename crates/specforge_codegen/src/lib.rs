//! Specforge Code Synthesizer
//!
//! Renders function-like definitions and resolved types into source units
//! and writes them under the non-destructive merge rule: a new file receives
//! all proposed units, an existing file receives only the units it is
//! missing. `synthesize` is pure; filesystem writes happen only in `write`,
//! the single owner of on-disk mutation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod render;
pub mod write;

pub use render::{synthesize, SynthError, SynthUnit};
pub use write::{write, FileOutcome, WriteReport};
