//! OBJ reader/writer with per-face material tracking.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};

use meshprep_materials::{
    load_mtl, merge_materials, save_mtl, Material, MergeError, MtlError, MtlOptions,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by OBJ loading and saving.
#[derive(Debug, thiserror::Error)]
pub enum ObjError {
    /// I/O error on the OBJ file itself.
    #[error("failed to access mesh file '{path}': {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed OBJ text.
    #[error("malformed mesh file (line {line}): {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// `usemtl` names a material the loaded libraries do not define.
    #[error("usemtl references unknown material '{0}'")]
    UnknownMaterial(String),

    /// Material library failure.
    #[error(transparent)]
    Mtl(#[from] MtlError),

    /// Material merge failure.
    #[error(transparent)]
    Merge(#[from] MergeError),
}

// ---------------------------------------------------------------------------
// Mesh
// ---------------------------------------------------------------------------

/// A triangle mesh with separate position and texture-coordinate index
/// tables, one material index per face, and at most one material.
#[derive(Debug, Default)]
pub struct Mesh {
    /// Vertex positions, referenced by `faces_pos`.
    pub positions: Vec<Vec3>,
    /// Texture coordinates, referenced by `faces_uv`. Insertion order is
    /// load order; indices are stable identifiers.
    pub texcoords: Vec<Vec2>,
    /// Per-face position index triples.
    pub faces_pos: Vec<[u32; 3]>,
    /// Per-face texture-coordinate index triples.
    pub faces_uv: Vec<[u32; 3]>,
    /// Per-face material index. All zero once materials are merged.
    pub faces_mat: Vec<u32>,
    /// The mesh's material; the uber material when the source referenced
    /// more than one.
    pub material: Option<Material>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Loads an OBJ file, its material libraries, and — when the mesh references
/// more than one material — merges them into a single uber material with
/// rewritten texture coordinates.
///
/// Supports `v`, `vt`, `f` (polygons are fan-triangulated; indices may be
/// negative), `usemtl`, and `mtllib`; other directives are ignored. A face
/// corner without a `vt` reference shares one zero texture coordinate.
///
/// # Errors
///
/// [`ObjError::Parse`] on malformed text; material and merge failures
/// propagate unchanged.
pub fn load_obj(path: &Path, options: &MtlOptions) -> Result<Mesh, ObjError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ObjError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let mut mesh = Mesh::default();
    let mut all_materials: Vec<Material> = Vec::new();
    let mut name_to_material: HashMap<String, usize> = HashMap::new();

    // Materials in first-use order; faces_mat indexes this list.
    let mut used: Vec<usize> = Vec::new();
    let mut active: Option<u32> = None;
    // Lazily created shared UV slot for corners without a vt reference.
    let mut zero_uv: Option<u32> = None;

    for (index, raw_line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let key = tokens
            .next()
            .expect("non-empty line has at least one token")
            .to_ascii_lowercase();
        let rest: Vec<&str> = tokens.collect();

        match key.as_str() {
            "mtllib" => {
                let rel = rest.first().ok_or_else(|| ObjError::Parse {
                    line: line_no,
                    message: "mtllib directive is missing a path".to_string(),
                })?;
                for material in load_mtl(&base_dir.join(rel), options)? {
                    // First definition of a name wins.
                    name_to_material
                        .entry(material.name.clone())
                        .or_insert(all_materials.len());
                    all_materials.push(material);
                }
            }
            "usemtl" => {
                let name = rest.first().ok_or_else(|| ObjError::Parse {
                    line: line_no,
                    message: "usemtl directive is missing a name".to_string(),
                })?;
                let material_index = *name_to_material
                    .get(*name)
                    .ok_or_else(|| ObjError::UnknownMaterial(name.to_string()))?;
                let used_index = match used.iter().position(|&m| m == material_index) {
                    Some(i) => i as u32,
                    None => {
                        used.push(material_index);
                        (used.len() - 1) as u32
                    }
                };
                active = Some(used_index);
            }
            "v" => {
                let v = parse_floats::<3>(&rest, line_no, "v")?;
                mesh.positions.push(Vec3::from_array(v));
            }
            "vt" => {
                let vt = parse_floats::<2>(&rest, line_no, "vt")?;
                mesh.texcoords.push(Vec2::from_array(vt));
            }
            "f" => {
                let mut corners = Vec::with_capacity(rest.len());
                for token in &rest {
                    corners.push(parse_corner(
                        token,
                        mesh.positions.len(),
                        mesh.texcoords.len(),
                        line_no,
                    )?);
                }
                if corners.len() < 3 {
                    return Err(ObjError::Parse {
                        line: line_no,
                        message: format!("face has {} corners, need at least 3", corners.len()),
                    });
                }
                // Fan triangulation around the first corner.
                for i in 1..corners.len() - 1 {
                    let tri = [corners[0], corners[i], corners[i + 1]];
                    mesh.faces_pos.push([tri[0].0, tri[1].0, tri[2].0]);
                    let uvs = [
                        uv_or_zero(tri[0].1, &mut mesh, &mut zero_uv),
                        uv_or_zero(tri[1].1, &mut mesh, &mut zero_uv),
                        uv_or_zero(tri[2].1, &mut mesh, &mut zero_uv),
                    ];
                    mesh.faces_uv.push(uvs);
                    mesh.faces_mat.push(active.unwrap_or(0));
                }
            }
            // vn, s, o, g and friends are not needed for merging.
            _ => {}
        }
    }

    match used.len() {
        0 => {}
        1 => mesh.material = Some(all_materials[used[0]].clone()),
        _ => {
            let referenced: Vec<Material> =
                used.iter().map(|&i| all_materials[i].clone()).collect();
            tracing::info!(
                path = %path.display(),
                materials = referenced.len(),
                "merging mesh materials into an uber material"
            );
            let merged =
                merge_materials(&referenced, &mesh.texcoords, &mesh.faces_uv, &mesh.faces_mat)?;
            mesh.texcoords = merged.texcoords;
            mesh.faces_uv = merged.faces_uv;
            mesh.faces_mat = vec![0; mesh.faces_pos.len()];
            mesh.material = Some(merged.material);
        }
    }

    tracing::debug!(
        positions = mesh.positions.len(),
        texcoords = mesh.texcoords.len(),
        faces = mesh.faces_pos.len(),
        "loaded mesh"
    );
    Ok(mesh)
}

/// Returns the corner's UV index, or the shared zero-UV slot (created on
/// first use) when the corner carries no `vt` reference.
fn uv_or_zero(uv: Option<u32>, mesh: &mut Mesh, zero_uv: &mut Option<u32>) -> u32 {
    match uv {
        Some(i) => i,
        None => *zero_uv.get_or_insert_with(|| {
            mesh.texcoords.push(Vec2::ZERO);
            (mesh.texcoords.len() - 1) as u32
        }),
    }
}

fn parse_floats<const N: usize>(
    tokens: &[&str],
    line: usize,
    key: &str,
) -> Result<[f32; N], ObjError> {
    if tokens.len() < N {
        return Err(ObjError::Parse {
            line,
            message: format!("'{key}' needs {N} components, got {}", tokens.len()),
        });
    }
    let mut out = [0.0; N];
    for (dst, token) in out.iter_mut().zip(tokens) {
        *dst = token.parse().map_err(|_| ObjError::Parse {
            line,
            message: format!("non-numeric value '{token}' for '{key}'"),
        })?;
    }
    Ok(out)
}

/// Parses one `f`-directive corner (`v`, `v/vt`, `v//vn`, or `v/vt/vn`) into
/// zero-based position and optional texture-coordinate indices. OBJ indices
/// are 1-based; negative values count back from the end of the table.
fn parse_corner(
    token: &str,
    positions: usize,
    texcoords: usize,
    line: usize,
) -> Result<(u32, Option<u32>), ObjError> {
    let mut fields = token.split('/');
    let pos_field = fields.next().unwrap_or("");
    let uv_field = fields.next().unwrap_or("");

    let pos = resolve_index(pos_field, positions).ok_or_else(|| ObjError::Parse {
        line,
        message: format!("invalid face corner '{token}'"),
    })?;
    let uv = if uv_field.is_empty() {
        None
    } else {
        Some(resolve_index(uv_field, texcoords).ok_or_else(|| ObjError::Parse {
            line,
            message: format!("invalid face corner '{token}'"),
        })?)
    };
    Ok((pos, uv))
}

fn resolve_index(field: &str, len: usize) -> Option<u32> {
    let value: i64 = field.parse().ok()?;
    let resolved = match value {
        v if v > 0 => v - 1,
        v if v < 0 => len as i64 + v,
        _ => return None,
    };
    (0..len as i64)
        .contains(&resolved)
        .then_some(resolved as u32)
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

/// Writes the mesh as an OBJ file. When the mesh carries a material, a
/// sibling `.mtl` (named after the OBJ stem) plus its companion textures are
/// written through the material codec, and the faces are tagged
/// `usemtl defaultMat`.
///
/// # Errors
///
/// [`ObjError::Io`] on write failure; codec failures propagate unchanged.
pub fn save_obj(path: &Path, mesh: &Mesh) -> Result<(), ObjError> {
    let io_err = |source| ObjError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::create(path).map_err(io_err)?;

    if let Some(material) = &mesh.material {
        let mtl_path = path.with_extension("mtl");
        save_mtl(&mtl_path, material)?;
        let mtl_name = mtl_path
            .file_name()
            .expect("mtl path derived from obj path has a file name")
            .to_string_lossy()
            .into_owned();
        writeln!(file, "mtllib {mtl_name}").map_err(io_err)?;
    }

    for p in &mesh.positions {
        writeln!(file, "v {} {} {}", p.x, p.y, p.z).map_err(io_err)?;
    }
    for uv in &mesh.texcoords {
        writeln!(file, "vt {} {}", uv.x, uv.y).map_err(io_err)?;
    }

    if mesh.material.is_some() {
        writeln!(file, "usemtl defaultMat").map_err(io_err)?;
    }
    for (pos, uv) in mesh.faces_pos.iter().zip(&mesh.faces_uv) {
        writeln!(
            file,
            "f {}/{} {}/{} {}/{}",
            pos[0] + 1,
            uv[0] + 1,
            pos[1] + 1,
            uv[1] + 1,
            pos[2] + 1,
            uv[2] + 1,
        )
        .map_err(io_err)?;
    }

    tracing::debug!(path = %path.display(), "saved mesh");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_MATERIAL_MTL: &str = "newmtl red\nkd 1 0 0\nks 0 0 0\n\nnewmtl blue\nkd 0 0 1\nks 0 0 0\n";

    fn write_scene(dir: &Path, obj_text: &str) -> PathBuf {
        std::fs::write(dir.join("scene.mtl"), TWO_MATERIAL_MTL).unwrap();
        let obj_path = dir.join("scene.obj");
        std::fs::write(&obj_path, obj_text).unwrap();
        obj_path
    }

    #[test]
    fn test_multi_material_mesh_is_merged_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scene(
            dir.path(),
            "mtllib scene.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\n\
             usemtl red\nf 1/1 2/2 3/3\n\
             usemtl blue\nf 1/1 2/2 3/3\n",
        );
        let mesh = load_obj(&path, &MtlOptions::default()).unwrap();

        let material = mesh.material.expect("merged material");
        assert_eq!(material.name, "uber_material");
        // 3 shared UVs split one set per material.
        assert_eq!(mesh.texcoords.len(), 6);
        assert_eq!(mesh.faces_uv, vec![[0, 1, 2], [3, 4, 5]]);
        assert_eq!(mesh.faces_mat, vec![0, 0]);
    }

    #[test]
    fn test_single_material_mesh_is_kept_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scene(
            dir.path(),
            "mtllib scene.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\n\
             usemtl blue\nf 1/1 2/2 3/3\n",
        );
        let mesh = load_obj(&path, &MtlOptions::default()).unwrap();
        assert_eq!(mesh.material.unwrap().name, "blue");
        assert_eq!(mesh.texcoords.len(), 3);
        assert_eq!(mesh.faces_uv, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_polygons_are_fan_triangulated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quad.obj");
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             f 1/1 2/2 3/3 4/4\n",
        )
        .unwrap();
        let mesh = load_obj(&path, &MtlOptions::default()).unwrap();
        assert_eq!(mesh.faces_pos, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(mesh.faces_uv, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn test_negative_indices_resolve_from_the_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("neg.obj");
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\n\
             f -3/-3 -2/-2 -1/-1\n",
        )
        .unwrap();
        let mesh = load_obj(&path, &MtlOptions::default()).unwrap();
        assert_eq!(mesh.faces_pos, vec![[0, 1, 2]]);
    }

    #[test]
    fn test_corner_without_vt_shares_a_zero_uv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bare.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        let mesh = load_obj(&path, &MtlOptions::default()).unwrap();
        assert_eq!(mesh.texcoords, vec![Vec2::ZERO]);
        assert_eq!(mesh.faces_uv, vec![[0, 0, 0]]);
    }

    #[test]
    fn test_unknown_usemtl_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_scene(dir.path(), "mtllib scene.mtl\nusemtl chrome\n");
        let result = load_obj(&path, &MtlOptions::default());
        assert!(matches!(result, Err(ObjError::UnknownMaterial(name)) if name == "chrome"));
    }

    #[test]
    fn test_malformed_face_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.obj");
        std::fs::write(&path, "v 0 0 0\nf 1 2 oops\n").unwrap();
        let result = load_obj(&path, &MtlOptions::default());
        assert!(matches!(result, Err(ObjError::Parse { line: 2, .. })));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_scene(
            dir.path(),
            "mtllib scene.mtl\n\
             v 0 0 0\nv 1 0 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 0 1\n\
             usemtl red\nf 1/1 2/2 3/3\n\
             usemtl blue\nf 1/1 2/2 3/3\n",
        );
        let mesh = load_obj(&source, &MtlOptions::default()).unwrap();

        let out = dir.path().join("out").join("scene_uber.obj");
        std::fs::create_dir_all(out.parent().unwrap()).unwrap();
        save_obj(&out, &mesh).unwrap();
        assert!(out.parent().unwrap().join("scene_uber.mtl").exists());
        assert!(out.parent().unwrap().join("texture_kd.png").exists());

        let reloaded = load_obj(&out, &MtlOptions::default()).unwrap();
        assert_eq!(reloaded.positions.len(), mesh.positions.len());
        assert_eq!(reloaded.texcoords.len(), mesh.texcoords.len());
        assert_eq!(reloaded.faces_pos, mesh.faces_pos);
        assert_eq!(reloaded.material.unwrap().name, "defaultMat");
    }
}
