use std::path::{Path, PathBuf};

use anyhow::Result;

/// The preview exposes four optional texture channels (`u_tex0-3`).
pub const CHANNEL_COUNT: usize = 4;

/// Smallest zoom factor the preview allows; one framebuffer pixel per shader unit.
pub const MIN_SCALE: f32 = 1.0;

/// Image paths assigned to each texture channel.
///
/// Unused channels have no path; the renderer binds a transparent-black
/// placeholder in their place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelPaths {
    slots: [Option<PathBuf>; CHANNEL_COUNT],
}

impl ChannelPaths {
    /// Creates a table with every channel unassigned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns paths to channels in order, starting at channel 0.
    pub fn from_paths<I>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut table = Self::new();
        for (channel, path) in paths.into_iter().enumerate() {
            table.set(channel, path)?;
        }
        Ok(table)
    }

    /// Associates an image path with the given channel.
    pub fn set(&mut self, channel: usize, path: PathBuf) -> Result<()> {
        if channel >= CHANNEL_COUNT {
            anyhow::bail!(
                "channel {} exceeds supported texture channel count ({})",
                channel,
                CHANNEL_COUNT
            );
        }
        self.slots[channel] = Some(path);
        Ok(())
    }

    /// Path bound to `channel`, if any.
    pub fn get(&self, channel: usize) -> Option<&Path> {
        self.slots.get(channel).and_then(|slot| slot.as_deref())
    }

    /// Number of channels that have a path.
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// What happens to the active resource when its reload fails.
///
/// The replacement is always built before the previous resource is released;
/// the policy only decides what remains bound once a build has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    /// Release the previous resource and leave the slot unset.
    #[default]
    Discard,
    /// Keep drawing with the previous resource until a build succeeds.
    KeepLastGood,
}

impl std::fmt::Display for ReloadPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReloadPolicy::Discard => f.write_str("discard"),
            ReloadPolicy::KeepLastGood => f.write_str("keep-last-good"),
        }
    }
}

impl std::str::FromStr for ReloadPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "discard" | "clear" => Ok(ReloadPolicy::Discard),
            "keep-last-good" | "keep" | "last-good" => Ok(ReloadPolicy::KeepLastGood),
            other => Err(format!(
                "unknown reload policy '{other}'; expected discard or keep-last-good"
            )),
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `RendererConfig` mirrors the CLI and tells the renderer which shader file
/// to compile, which images to bind, and how large the preview window is.
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Window size in physical pixels.
    pub surface_size: (u32, u32),
    /// Path to the fragment body that defines `main_image`.
    pub shader_source: PathBuf,
    /// Optional images for texture channels 0-3.
    pub channels: ChannelPaths,
    /// Initial pixels-per-shader-unit factor.
    pub scale: f32,
    /// Amount the zoom keys add to or remove from the scale.
    pub zoom_step: f32,
    /// Behaviour when a hot reload fails.
    pub reload_policy: ReloadPolicy,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1024, 800),
            shader_source: PathBuf::new(),
            channels: ChannelPaths::default(),
            scale: MIN_SCALE,
            zoom_step: 1.0,
            reload_policy: ReloadPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_paths_fill_in_order() {
        let paths = ChannelPaths::from_paths(vec![
            PathBuf::from("a.png"),
            PathBuf::from("b.png"),
        ])
        .unwrap();
        assert_eq!(paths.get(0), Some(Path::new("a.png")));
        assert_eq!(paths.get(1), Some(Path::new("b.png")));
        assert_eq!(paths.get(2), None);
        assert_eq!(paths.occupied(), 2);
    }

    #[test]
    fn channel_paths_reject_fifth_channel() {
        let paths = (0..5).map(|index| PathBuf::from(format!("{index}.png")));
        assert!(ChannelPaths::from_paths(paths).is_err());
    }

    #[test]
    fn reload_policy_parses_aliases() {
        assert_eq!("keep".parse::<ReloadPolicy>(), Ok(ReloadPolicy::KeepLastGood));
        assert_eq!("Discard".parse::<ReloadPolicy>(), Ok(ReloadPolicy::Discard));
        assert!("sometimes".parse::<ReloadPolicy>().is_err());
    }
}
