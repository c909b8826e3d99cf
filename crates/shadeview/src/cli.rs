use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use renderer::CHANNEL_COUNT;

#[derive(Parser, Debug)]
#[command(
    name = "shadeview",
    author,
    version,
    about = "Live GLSL fragment-shader preview with hot reload",
    after_help = "Keys: Ctrl+R reloads the shader and textures, Ctrl+'+' / Ctrl+'-' zoom."
)]
pub struct Cli {
    /// Fragment shader body defining `vec4 main_image(vec2 coord)`.
    #[arg(value_name = "SHADER")]
    pub shader: PathBuf,

    /// Up to four images, bound to `u_tex0`..`u_tex3` in order.
    #[arg(value_name = "TEXTURE")]
    pub textures: Vec<PathBuf>,

    /// Window size in pixels (e.g. `1280x720`).
    #[arg(long, short = 's', value_name = "WIDTHxHEIGHT", value_parser = parse_surface_size)]
    pub size: Option<(u32, u32)>,

    /// Initial zoom factor, at least 1.0.
    #[arg(long, value_name = "FACTOR", value_parser = parse_scale)]
    pub scale: Option<f32>,

    /// Amount each zoom key press adds or removes.
    #[arg(long, value_name = "STEP", value_parser = parse_zoom_step)]
    pub zoom_step: Option<f32>,

    /// Keep drawing the last program or texture that built when a reload fails.
    #[arg(long)]
    pub keep_last_good: bool,

    /// Settings file to read instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Checks that clap cannot express on its own.
    pub fn validate(&self) -> Result<(), String> {
        if self.textures.len() > CHANNEL_COUNT {
            return Err(format!(
                "at most {CHANNEL_COUNT} textures are supported, got {}",
                self.textures.len()
            ));
        }
        Ok(())
    }
}

/// Parses the command line, exiting with a usage error on invalid input.
pub fn parse() -> Cli {
    let cli = Cli::parse();
    if let Err(message) = cli.validate() {
        Cli::command().error(ErrorKind::TooManyValues, message).exit();
    }
    cli
}

pub fn parse_surface_size(spec: &str) -> Result<(u32, u32), String> {
    let (width, height) = spec
        .trim()
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WIDTHxHEIGHT, e.g. 1024x800".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_scale(value: &str) -> Result<f32, String> {
    let scale: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid scale '{value}'"))?;
    validate_scale(scale)
}

pub fn validate_scale(scale: f32) -> Result<f32, String> {
    if !scale.is_finite() || scale < renderer::MIN_SCALE {
        return Err(format!("scale must be at least {}", renderer::MIN_SCALE));
    }
    Ok(scale)
}

pub fn parse_zoom_step(value: &str) -> Result<f32, String> {
    let step: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid zoom step '{value}'"))?;
    validate_zoom_step(step)
}

pub fn validate_zoom_step(step: f32) -> Result<f32, String> {
    if !step.is_finite() || step <= 0.0 {
        return Err("zoom step must be positive".into());
    }
    Ok(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shader_and_textures_in_order() {
        let cli = Cli::try_parse_from(["shadeview", "wave.glsl", "a.png", "b.jpg"]).unwrap();
        assert_eq!(cli.shader, PathBuf::from("wave.glsl"));
        assert_eq!(
            cli.textures,
            vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]
        );
        assert!(cli.validate().is_ok());
        assert_eq!(cli.size, None);
        assert!(!cli.keep_last_good);
    }

    #[test]
    fn shader_path_is_required() {
        assert!(Cli::try_parse_from(["shadeview"]).is_err());
    }

    #[test]
    fn five_textures_fail_validation() {
        let cli = Cli::try_parse_from(["shadeview", "s.glsl", "0", "1", "2", "3", "4"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn size_flag_accepts_wxh() {
        let cli = Cli::try_parse_from(["shadeview", "--size", "800X600", "s.glsl"]).unwrap();
        assert_eq!(cli.size, Some((800, 600)));
        assert_eq!(parse_surface_size(" 1920 x 1080 "), Ok((1920, 1080)));
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        assert!(parse_surface_size("800").is_err());
        assert!(parse_surface_size("0x600").is_err());
        assert!(parse_surface_size("wide x tall").is_err());
        assert!(Cli::try_parse_from(["shadeview", "--size", "big", "s.glsl"]).is_err());
    }

    #[test]
    fn scale_and_step_are_bounded() {
        assert_eq!(parse_scale("2.5"), Ok(2.5));
        assert!(parse_scale("0.5").is_err());
        assert!(parse_scale("nan").is_err());
        assert_eq!(parse_zoom_step("0.25"), Ok(0.25));
        assert!(parse_zoom_step("0").is_err());
        assert!(parse_zoom_step("-1").is_err());
    }

    #[test]
    fn numeric_validation_needs_no_text() {
        assert_eq!(validate_scale(1.0), Ok(1.0));
        assert!(validate_scale(0.99).is_err());
        assert!(validate_scale(f32::INFINITY).is_err());
        assert_eq!(validate_zoom_step(2.0), Ok(2.0));
        assert!(validate_zoom_step(0.0).is_err());
        assert!(validate_zoom_step(f32::NAN).is_err());
    }
}
