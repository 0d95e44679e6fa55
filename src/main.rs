//! compose-render
//!
//! Merges docker-compose files left to right, normalizes service ports,
//! interpolates environment variables and writes one validated document.

use anyhow::Result;
use clap::Parser;
use compose_render::cli::Cli;
use compose_render::config::{SettingsLoader, SettingsPaths};
use compose_render::logging::{self, LogSink};
use compose_render::render::{RenderOptions, Renderer};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let sink = LogSink::parse(&cli.log).avoiding_stdout(cli.output_file.is_none());
    logging::init(&sink, cli.verbose)?;

    let loader = SettingsLoader::load(SettingsPaths::discover(cli.config.clone()))?;
    debug!(tier = %loader.top_tier(), "Loaded settings");
    let mut options = RenderOptions::from(loader.settings());
    cli.apply_to(&mut options);

    let rendered = Renderer::new(options).render_files(&cli.compose_files)?;
    rendered.write_output(cli.output_file.as_deref(), cli.compose_x_macro)?;
    if let Some(ref images_output) = cli.images_output {
        rendered.write_services_images(images_output)?;
    }

    Ok(())
}
