//! Name-based lookup of the attribute and uniform slots a linked program uses.

use crate::compile::ParsedStage;
use crate::types::CHANNEL_COUNT;

/// Where a named input lives in the current program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Location {
    Resolved(u32),
    /// The program never reads this name; writes against it are skipped.
    #[default]
    Unused,
}

impl Location {
    pub fn get(self) -> Option<u32> {
        match self {
            Location::Resolved(index) => Some(index),
            Location::Unused => None,
        }
    }

    pub fn is_used(self) -> bool {
        matches!(self, Location::Resolved(_))
    }
}

impl From<Option<u32>> for Location {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Location::Unused, Location::Resolved)
    }
}

/// Uniform blocks in bind group 0. The discriminant is the binding number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    Projection = 0,
    TextureResolution = 1,
    Resolution = 2,
    Time = 3,
    Scale = 4,
}

impl UniformSlot {
    pub const ALL: [UniformSlot; 5] = [
        UniformSlot::Projection,
        UniformSlot::TextureResolution,
        UniformSlot::Resolution,
        UniformSlot::Time,
        UniformSlot::Scale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            UniformSlot::Projection => "u_pvm",
            UniformSlot::TextureResolution => "u_tex_res",
            UniformSlot::Resolution => "u_res",
            UniformSlot::Time => "u_time",
            UniformSlot::Scale => "u_scale",
        }
    }

    pub fn binding(self) -> u32 {
        self as u32
    }

    /// std140 size of the block, rounded up to 16 bytes.
    pub fn size(self) -> u64 {
        match self {
            UniformSlot::Projection => 64,
            UniformSlot::TextureResolution => 16 * CHANNEL_COUNT as u64,
            UniformSlot::Resolution | UniformSlot::Time | UniformSlot::Scale => 16,
        }
    }

    pub fn visibility(self) -> wgpu::ShaderStages {
        match self {
            UniformSlot::Projection => wgpu::ShaderStages::VERTEX,
            _ => wgpu::ShaderStages::FRAGMENT,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Vertex inputs of the fixed vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSlot {
    Position,
    TexCoord,
}

impl AttributeSlot {
    pub fn name(self) -> &'static str {
        match self {
            AttributeSlot::Position => "in_vtx_pos",
            AttributeSlot::TexCoord => "in_vtx_tex0",
        }
    }
}

/// Sampled image bound to texture channel `channel`.
pub fn texture_name(channel: usize) -> String {
    format!("u_tex{channel}_image")
}

pub const SAMPLER_NAME: &str = "u_sampler";

/// Every slot the render loop writes, resolved against one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LocationTable {
    pub position: Location,
    pub tex_coord: Location,
    uniforms: [Location; UniformSlot::ALL.len()],
    pub textures: [Location; CHANNEL_COUNT],
    pub sampler: Location,
}

impl LocationTable {
    /// Looks up every known name in both stages of a freshly linked program.
    ///
    /// Pure function of the two modules: resolving the same sources twice
    /// gives an identical table.
    pub fn resolve(vertex: &ParsedStage, fragment: &ParsedStage) -> Self {
        let binding_of = |symbol: &str| -> Location {
            vertex
                .used_binding(symbol)
                .or_else(|| fragment.used_binding(symbol))
                .map(|binding| binding.binding)
                .into()
        };

        let mut uniforms = [Location::Unused; UniformSlot::ALL.len()];
        for slot in UniformSlot::ALL {
            uniforms[slot.index()] = binding_of(slot.name());
        }

        let mut textures = [Location::Unused; CHANNEL_COUNT];
        for (channel, location) in textures.iter_mut().enumerate() {
            *location = binding_of(&texture_name(channel));
        }

        Self {
            position: vertex.input_location(AttributeSlot::Position.name()).into(),
            tex_coord: vertex.input_location(AttributeSlot::TexCoord.name()).into(),
            uniforms,
            textures,
            sampler: binding_of(SAMPLER_NAME),
        }
    }

    pub fn uniform(&self, slot: UniformSlot) -> Location {
        self.uniforms[slot.index()]
    }

    pub fn attribute(&self, slot: AttributeSlot) -> Location {
        match slot {
            AttributeSlot::Position => self.position,
            AttributeSlot::TexCoord => self.tex_coord,
        }
    }

    /// Uniform slots the program reads, in binding order.
    pub fn used_uniforms(&self) -> impl Iterator<Item = UniformSlot> + '_ {
        UniformSlot::ALL
            .into_iter()
            .filter(|slot| self.uniform(*slot).is_used())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{fragment_sources, vertex_sources, ShaderStage};

    fn resolve(body: &str) -> LocationTable {
        let vertex = ParsedStage::parse(ShaderStage::Vertex, &vertex_sources()).unwrap();
        let fragment =
            ParsedStage::parse(ShaderStage::Fragment, &fragment_sources(body, "body.glsl"))
                .unwrap();
        LocationTable::resolve(&vertex, &fragment)
    }

    #[test]
    fn solid_colour_leaves_fragment_uniforms_unused() {
        let table = resolve("vec4 main_image(vec2 coord) { return vec4(1.0, 0.0, 0.0, 1.0); }\n");
        assert_eq!(table.position, Location::Resolved(0));
        assert_eq!(table.tex_coord, Location::Resolved(1));
        assert_eq!(table.uniform(UniformSlot::Projection), Location::Resolved(0));
        // The epilogue always reads the resolution and scale.
        assert_eq!(table.uniform(UniformSlot::Resolution), Location::Resolved(2));
        assert_eq!(table.uniform(UniformSlot::Scale), Location::Resolved(4));
        assert_eq!(table.uniform(UniformSlot::Time), Location::Unused);
        assert_eq!(table.uniform(UniformSlot::TextureResolution), Location::Unused);
        assert!(table.textures.iter().all(|location| !location.is_used()));
        assert_eq!(table.sampler, Location::Unused);
    }

    #[test]
    fn sampled_channels_resolve_to_their_unit() {
        let table = resolve(
            r"
vec4 main_image(vec2 coord) {
    vec2 uv = coord / u_res;
    return texture(u_tex1, uv) + texture(u_tex3, uv) * u_time;
}
",
        );
        assert_eq!(
            table.textures,
            [
                Location::Unused,
                Location::Resolved(1),
                Location::Unused,
                Location::Resolved(3)
            ]
        );
        assert_eq!(table.sampler, Location::Resolved(4));
        assert_eq!(table.uniform(UniformSlot::Time), Location::Resolved(3));
        let used: Vec<_> = table.used_uniforms().collect();
        assert_eq!(
            used,
            vec![
                UniformSlot::Projection,
                UniformSlot::Resolution,
                UniformSlot::Time,
                UniformSlot::Scale
            ]
        );
    }

    #[test]
    fn resolving_the_same_source_twice_is_identical() {
        let body = "vec4 main_image(vec2 coord) { return vec4(fract(coord * u_time), u_tex_res[0].x, 1.0); }\n";
        assert_eq!(resolve(body), resolve(body));
    }

    #[test]
    fn default_table_is_all_unused() {
        let table = LocationTable::default();
        assert!(UniformSlot::ALL
            .iter()
            .all(|slot| table.uniform(*slot) == Location::Unused));
        assert_eq!(table.attribute(AttributeSlot::Position), Location::Unused);
    }

    #[test]
    fn uniform_blocks_are_at_least_one_row() {
        for slot in UniformSlot::ALL {
            assert!(slot.size() >= 16 && slot.size() % 16 == 0, "{slot:?}");
        }
    }
}
