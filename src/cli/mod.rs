//! CLI definitions for compose-render
//!
//! This module defines the command line using clap's derive macros.

use crate::render::RenderOptions;
use clap::Parser;
use std::path::PathBuf;

/// Merge docker-compose files into one rendered, validated document
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a docker compose file (repeat to merge, later files override earlier ones)
    #[arg(short = 'f', long = "docker-compose-file", value_name = "FILE", required = true)]
    pub compose_files: Vec<PathBuf>,

    /// Write the rendered file here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Wrap the output in the ECS Compose-X CloudFormation macro
    #[arg(short = 'x', long = "compose-x-macro")]
    pub compose_x_macro: bool,

    /// Leave environment variable references as written
    #[arg(long)]
    pub no_interpolate: bool,

    /// Keep references to undefined variables instead of blanking them
    #[arg(long)]
    pub keep_undefined: bool,

    /// Write the service name to image mapping to this JSON file
    #[arg(long, value_name = "FILE")]
    pub images_output: Option<PathBuf>,

    /// JSON schema to validate against (default: embedded compose schema)
    #[arg(long, value_name = "FILE")]
    pub schema: Option<PathBuf>,

    /// Skip schema validation
    #[arg(long)]
    pub no_validate: bool,

    /// Path to a settings file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2")]
    pub log: String,

    /// Extra positional arguments are accepted and ignored
    #[arg(hide = true)]
    pub rest: Vec<String>,
}

impl Cli {
    /// Apply command line flags on top of options built from settings.
    pub fn apply_to(&self, options: &mut RenderOptions) {
        if self.no_interpolate {
            options.interpolate = false;
        }
        if self.keep_undefined {
            options.undefined = crate::interpolation::UndefinedVariables::Keep;
        }
        if self.no_validate {
            options.validate = false;
        }
        if let Some(ref schema) = self.schema {
            options.schema = Some(schema.clone());
        }
    }
}
