//! Atlas merger: folds N materials into one uber material whose textures are
//! a horizontal atlas, and rewrites the mesh's texture coordinates to address
//! the correct atlas cell.
//!
//! Atlas column order is material-index order and is semantically
//! significant: it determines the UV mapping. The canvas is padded up to a
//! power of two in each dimension for downstream GPU sampling; the live
//! region stays `max_res.h × (max_res.w · material_count)`.

use std::collections::HashMap;

use glam::Vec2;

use meshprep_texture::{Texture, TextureError};

use crate::material::Material;

/// Name carried by every merged material.
pub const UBER_MATERIAL_NAME: &str = "uber_material";

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Merge precondition violations. These are data-modeling contract failures:
/// the merge aborts entirely and no partial uber material is returned.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    /// The material set is empty.
    #[error("cannot merge an empty material set")]
    Empty,

    /// The face UV table and face material table disagree on length.
    #[error("face tables disagree: {faces} UV triples vs {materials} material indices")]
    FaceTableMismatch {
        /// Number of face UV triples.
        faces: usize,
        /// Number of face material indices.
        materials: usize,
    },

    /// Materials in one merge call must share a shader model.
    #[error("material '{material}' uses shader model '{found}', expected '{expected}'")]
    ShaderModelMismatch {
        /// Shader model of material 0.
        expected: String,
        /// Diverging shader model.
        found: String,
        /// Name of the diverging material.
        material: String,
    },

    /// Texture presence must be uniform across the set.
    #[error("material '{material}' disagrees with the set on presence of the '{slot}' texture")]
    TexturePresenceMismatch {
        /// Texture slot name.
        slot: &'static str,
        /// Name of the diverging material.
        material: String,
    },

    /// A required texture slot is not materialized.
    #[error("material '{material}' has no '{slot}' texture; constants must be materialized before merging")]
    MissingTexture {
        /// Texture slot name.
        slot: &'static str,
        /// Name of the offending material.
        material: String,
    },

    /// A face references a UV index outside the texture coordinate table.
    #[error("face references UV index {index}, but the table holds {len} entries")]
    UvIndexOutOfRange {
        /// Offending index.
        index: u32,
        /// Table length.
        len: usize,
    },

    /// Buffer arithmetic failure while assembling the atlas.
    #[error(transparent)]
    Texture(#[from] TextureError),
}

// ---------------------------------------------------------------------------
// MergeOutput
// ---------------------------------------------------------------------------

/// Result of one merge call.
pub struct MergeOutput {
    /// The synthesized uber material.
    pub material: Material,
    /// New texture coordinate table, in first-creation order.
    pub texcoords: Vec<Vec2>,
    /// Face UV-index triples rewritten against the new table.
    pub faces_uv: Vec<[u32; 3]>,
}

// ---------------------------------------------------------------------------
// Axis convention
// ---------------------------------------------------------------------------

/// Maps an original UV through the atlas layout.
///
/// Texture coordinates are stored `(u, v)` but the atlas buffer is indexed
/// `(row, col)`: `u` walks the column (width) axis and `v` the row (height)
/// axis, so the scale coefficients swap here. Material `i`'s unit UV square
/// lands at columns `[i, i+1)` of the unpadded atlas, rescaled into the
/// padded canvas's `[0, 1]` range.
fn atlas_uv(uv: Vec2, material_index: u32, s_row: f32, s_col: f32) -> Vec2 {
    Vec2::new((material_index as f32 + uv.x) / s_col, uv.y / s_row)
}

// ---------------------------------------------------------------------------
// merge_materials
// ---------------------------------------------------------------------------

/// Merges `materials` into a single uber material and rewrites the mesh's
/// texture coordinates accordingly.
///
/// `faces_uv[f]` holds the three texture-coordinate indices of face `f`;
/// `faces_mat[f]` its material index. Inputs are not mutated; the rewritten
/// face table is part of the returned [`MergeOutput`].
///
/// A vertex shared by faces of different materials is split into
/// per-material duplicates: the new table has exactly one entry per distinct
/// `(original UV index, material index)` pair.
///
/// # Errors
///
/// Any [`MergeError`] aborts the whole call; there is no partial merge.
pub fn merge_materials(
    materials: &[Material],
    texcoords: &[Vec2],
    faces_uv: &[[u32; 3]],
    faces_mat: &[u32],
) -> Result<MergeOutput, MergeError> {
    if materials.is_empty() {
        return Err(MergeError::Empty);
    }
    if faces_uv.len() != faces_mat.len() {
        return Err(MergeError::FaceTableMismatch {
            faces: faces_uv.len(),
            materials: faces_mat.len(),
        });
    }

    // Normal-presence normalization: when the set is mixed, materials
    // lacking a normal map get a flat 1x1 stand-in so presence is uniform.
    // A set with no normals at all stays normal-free.
    let has_normal: Vec<bool> = materials.iter().map(|m| m.normal.is_some()).collect();
    let inject_flat = has_normal.iter().any(|&b| b) && !has_normal.iter().all(|&b| b);
    let flat_normal = Texture::constant(&[0.0, 0.0, 1.0]);
    let normals: Vec<Option<&Texture>> = materials
        .iter()
        .map(|m| {
            m.normal
                .as_ref()
                .or(if inject_flat { Some(&flat_normal) } else { None })
        })
        .collect();

    let mut kd = Vec::with_capacity(materials.len());
    let mut ks = Vec::with_capacity(materials.len());
    for mat in materials {
        if mat.shader_model != materials[0].shader_model {
            return Err(MergeError::ShaderModelMismatch {
                expected: materials[0].shader_model.clone(),
                found: mat.shader_model.clone(),
                material: mat.name.clone(),
            });
        }
        kd.push(mat.kd.as_ref().ok_or_else(|| MergeError::MissingTexture {
            slot: "kd",
            material: mat.name.clone(),
        })?);
        ks.push(mat.ks.as_ref().ok_or_else(|| MergeError::MissingTexture {
            slot: "ks",
            material: mat.name.clone(),
        })?);
    }
    // Unreachable for 'normal' after normalization above; retained as a
    // defensive invariant.
    for (mat, normal) in materials.iter().zip(&normals) {
        if normal.is_some() != normals[0].is_some() {
            return Err(MergeError::TexturePresenceMismatch {
                slot: "normal",
                material: mat.name.clone(),
            });
        }
    }

    // Maximum (height, width) across all materials and slots; an absent
    // slot counts as 1x1.
    let mut max_res = (1_u32, 1_u32);
    for i in 0..materials.len() {
        for slot in [Some(kd[i]), Some(ks[i]), normals[i]] {
            let (h, w) = slot.map_or((1, 1), Texture::resolution);
            max_res = (max_res.0.max(h), max_res.1.max(w));
        }
    }

    // Smallest power-of-two canvas holding all cells side by side.
    let cells = materials.len() as u32;
    let full_res = (
        max_res.0.next_power_of_two(),
        (max_res.1 * cells).next_power_of_two(),
    );

    tracing::debug!(
        materials = materials.len(),
        cell_h = max_res.0,
        cell_w = max_res.1,
        atlas_h = full_res.0,
        atlas_w = full_res.1,
        "merging materials into uber atlas"
    );

    let merge_slot = |parts: &[&Texture]| -> Result<Texture, MergeError> {
        let resampled: Vec<Texture> = parts
            .iter()
            .map(|tex| tex.resample(max_res.0, max_res.1))
            .collect();
        let refs: Vec<&Texture> = resampled.iter().collect();
        let strip = Texture::concat_width(&refs)?;
        Ok(strip.pad_replicate(full_res.0, full_res.1))
    };

    let merged_normal = if normals[0].is_some() {
        let parts: Vec<&Texture> = normals.iter().map(|n| n.expect("presence checked")).collect();
        Some(merge_slot(&parts)?)
    } else {
        None
    };

    let material = Material {
        kd: Some(merge_slot(&kd)?),
        ks: Some(merge_slot(&ks)?),
        normal: merged_normal,
        shader_model: materials[0].shader_model.clone(),
        ..Material::named(UBER_MATERIAL_NAME)
    };

    // How much of the padded canvas, per dimension, is live atlas area.
    let s_row = full_res.0 as f32 / max_res.0 as f32;
    let s_col = full_res.1 as f32 / max_res.1 as f32;

    // Rewrite texture coordinates, deduplicating on
    // (original UV index, material index).
    let mut seen: HashMap<(u32, u32), u32> = HashMap::new();
    let mut new_texcoords: Vec<Vec2> = Vec::new();
    let mut new_faces_uv = faces_uv.to_vec();

    for (face, &mat_idx) in new_faces_uv.iter_mut().zip(faces_mat) {
        for uv_idx in face.iter_mut() {
            let key = (*uv_idx, mat_idx);
            let new_index = match seen.get(&key) {
                Some(&existing) => existing,
                None => {
                    let uv = texcoords.get(*uv_idx as usize).copied().ok_or(
                        MergeError::UvIndexOutOfRange {
                            index: *uv_idx,
                            len: texcoords.len(),
                        },
                    )?;
                    let created = new_texcoords.len() as u32;
                    new_texcoords.push(atlas_uv(uv, mat_idx, s_row, s_col));
                    seen.insert(key, created);
                    created
                }
            };
            *uv_idx = new_index;
        }
    }

    Ok(MergeOutput {
        material,
        texcoords: new_texcoords,
        faces_uv: new_faces_uv,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
