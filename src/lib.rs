//! Autoreel Core Library
//!
//! Headless pipeline that turns a short narration script into a published
//! video: script selection, speech synthesis, stock-footage acquisition,
//! composition/encoding, and an optional resumable upload.
//!
//! The binary in `src/main.rs` is a thin clap front-end over
//! [`core::pipeline::Pipeline`]; all business logic lives in `core`.

pub mod core;
