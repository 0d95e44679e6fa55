//! compose-render library
//!
//! Merges layered docker-compose files into one canonical document:
//! - [`compose`] - document merging and port normalization
//! - [`interpolation`] - environment variable substitution
//! - [`schema`] - JSON Schema validation
//! - [`render`] - the pipeline tying them together

pub mod cli;
pub mod compose;
pub mod config;
pub mod error;
pub mod interpolation;
pub mod logging;
pub mod render;
pub mod schema;
