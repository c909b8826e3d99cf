use anyhow::{anyhow, Context, Result};
use renderer::{ChannelPaths, ReloadPolicy, Renderer, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::{parse_surface_size, validate_scale, validate_zoom_step, Cli};
use crate::settings::Settings;

pub fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref())?;
    let config = build_config(&cli, &settings)?;
    Renderer::new(config).run()
}

/// Merges command-line flags over file settings over built-in defaults.
pub fn build_config(cli: &Cli, settings: &Settings) -> Result<RendererConfig> {
    let defaults = RendererConfig::default();

    let surface_size = match (cli.size, settings.size.as_deref()) {
        (Some(size), _) => size,
        (None, Some(spec)) => parse_surface_size(spec)
            .map_err(|err| anyhow!(err))
            .context("invalid `size` in settings")?,
        (None, None) => defaults.surface_size,
    };

    let scale = match (cli.scale, settings.scale) {
        (Some(scale), _) => scale,
        (None, Some(scale)) => validate_scale(scale)
            .map_err(|err| anyhow!(err))
            .context("invalid `scale` in settings")?,
        (None, None) => defaults.scale,
    };

    let zoom_step = match (cli.zoom_step, settings.zoom_step) {
        (Some(step), _) => step,
        (None, Some(step)) => validate_zoom_step(step)
            .map_err(|err| anyhow!(err))
            .context("invalid `zoom_step` in settings")?,
        (None, None) => defaults.zoom_step,
    };

    let reload_policy = if cli.keep_last_good {
        ReloadPolicy::KeepLastGood
    } else if let Some(policy) = settings.reload_policy.as_deref() {
        policy
            .parse::<ReloadPolicy>()
            .map_err(|err| anyhow!(err))
            .context("invalid `reload_policy` in settings")?
    } else {
        defaults.reload_policy
    };

    let channels = ChannelPaths::from_paths(cli.textures.iter().cloned())?;

    Ok(RendererConfig {
        surface_size,
        shader_source: cli.shader.clone(),
        channels,
        scale,
        zoom_step,
        reload_policy,
    })
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
