//! The [`Material`] record: a surface-appearance description for a mesh.

use std::collections::BTreeMap;

use meshprep_texture::Texture;

/// The shader model assigned when a material file names none.
pub const DEFAULT_SHADER_MODEL: &str = "pbr";

/// A surface-appearance description parsed from a material file or
/// synthesized by the merger.
///
/// The three texture slots the merger operates on are explicit optional
/// fields; everything else a material file carries passes through the
/// `scalars` / `strings` extension maps untouched.
#[derive(Clone, Debug, Default)]
pub struct Material {
    /// Identifier, not required to be unique across a scene.
    pub name: String,

    /// Tag selecting the shading function (MTL key `bsdf`).
    pub shader_model: String,

    /// Diffuse color, linear. The codec materializes constants as 1×1
    /// buffers, so a record leaving the codec always has this set.
    pub kd: Option<Texture>,

    /// Specular / ORM parameters, linear. Same materialization rule as `kd`.
    pub ks: Option<Texture>,

    /// Tangent-space normals decoded to `[-1, 1]` per component.
    pub normal: Option<Texture>,

    /// Legacy/unknown numeric keys, passed through verbatim.
    pub scalars: BTreeMap<String, Vec<f32>>,

    /// Legacy string-valued keys (texture paths and friends), passed
    /// through verbatim.
    pub strings: BTreeMap<String, String>,
}

impl Material {
    /// Creates an empty record with the given name and the default shader
    /// model.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shader_model: DEFAULT_SHADER_MODEL.to_string(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_sets_default_shader_model() {
        let mat = Material::named("granite");
        assert_eq!(mat.name, "granite");
        assert_eq!(mat.shader_model, "pbr");
        assert!(mat.kd.is_none());
        assert!(mat.ks.is_none());
        assert!(mat.normal.is_none());
    }
}
