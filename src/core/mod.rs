//! Autoreel Core Engine
//!
//! One module per pipeline stage, in dependency order: script selection,
//! speech synthesis, stock-footage acquisition, composition, publishing.
//! `pipeline` wires the stages together; `config` is the only place that
//! reads process environment.

pub mod compose;
pub mod config;
pub mod ffmpeg;
pub mod pipeline;
pub mod publish;
pub mod script;
pub mod stock;
pub mod tts;

mod error;
pub use error::*;

/// Time in seconds (floating point)
pub type TimeSec = f64;
