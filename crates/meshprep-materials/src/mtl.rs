//! MTL text codec: parses a material-list file into [`Material`] records and
//! serializes a single record (plus companion textures) back out.
//!
//! The format is line-oriented: whitespace/tab-delimited tokens, one
//! directive per line, case-insensitive keys. `newmtl <name>` opens a
//! record; every following `<key> <value...>` line belongs to it.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use meshprep_texture::{Texture, TextureError};

use crate::material::{Material, DEFAULT_SHADER_MODEL};

/// Keys whose value is the first token, kept as a string. Everything else
/// parses as a float vector.
///
/// `ka` is string-valued here even though `Ka` is conventionally a color
/// triple; the historical format table treated it as a texture-path-like
/// string and that behavior is kept (and pinned by a test).
const STRING_KEYS: [&str; 8] = [
    "bsdf", "map_kd", "map_ks", "bump", "map_ns", "ns", "ka", "refl",
];

// ---------------------------------------------------------------------------
// Errors and options
// ---------------------------------------------------------------------------

/// Errors returned by the MTL codec.
#[derive(Debug, thiserror::Error)]
pub enum MtlError {
    /// I/O error reading or writing the material file itself.
    #[error("failed to access material file '{path}': {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed material text. Aborts the load of the whole file.
    #[error("malformed material file (line {line}): {message}")]
    Format {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A record defines neither a texture map nor a constant for a
    /// required slot.
    #[error("material '{material}' defines neither map_{key} nor a {key} constant")]
    MissingKey {
        /// Record name.
        material: String,
        /// Slot key (`kd` or `ks`).
        key: &'static str,
    },

    /// Texture load/save failure, including unresolvable texture paths.
    #[error(transparent)]
    Texture(#[from] TextureError),
}

/// Load-time options for [`load_mtl`].
#[derive(Clone, Copy, Debug)]
pub struct MtlOptions {
    /// Zero the first channel of `ks` at every mip level. That channel is
    /// repurposed downstream and must not carry stale occlusion data.
    pub clear_specular_occlusion: bool,
}

impl Default for MtlOptions {
    fn default() -> Self {
        Self {
            clear_specular_occlusion: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// A record as it appears in the file, before textures are materialized.
#[derive(Default)]
struct RawRecord {
    name: String,
    strings: BTreeMap<String, String>,
    scalars: BTreeMap<String, Vec<f32>>,
}

/// Parses a material-list file into fully materialized [`Material`] records.
///
/// Texture paths are resolved relative to the file's own directory. Per
/// record: the shader model defaults to `"pbr"`, `kd`/`ks` constants are
/// materialized as 1×1 buffers, `kd` is converted from sRGB to linear,
/// `bump` maps are decoded to `[-1, 1]` normals, and (by default) the
/// occlusion channel of `ks` is cleared.
///
/// # Errors
///
/// [`MtlError::Format`] on malformed text, [`MtlError::Texture`] when a
/// referenced image cannot be loaded.
pub fn load_mtl(path: &Path, options: &MtlOptions) -> Result<Vec<Material>, MtlError> {
    let contents = std::fs::read_to_string(path).map_err(|source| MtlError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let records = parse_records(&contents)?;
    let materials = records
        .into_iter()
        .map(|record| finalize_record(record, base_dir, options))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        path = %path.display(),
        count = materials.len(),
        "loaded material file"
    );
    Ok(materials)
}

fn parse_records(contents: &str) -> Result<Vec<RawRecord>, MtlError> {
    let mut records: Vec<RawRecord> = Vec::new();

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

        if key == "newmtl" {
            let name = tokens.next().ok_or_else(|| MtlError::Format {
                line: line_no,
                message: "newmtl directive is missing a name".to_string(),
            })?;
            records.push(RawRecord {
                name: name.to_string(),
                ..RawRecord::default()
            });
            continue;
        }

        // Keys before the first newmtl have no record to attach to.
        let Some(record) = records.last_mut() else {
            continue;
        };

        if STRING_KEYS.contains(&key.as_str()) {
            let value = tokens.next().ok_or_else(|| MtlError::Format {
                line: line_no,
                message: format!("key '{key}' is missing a value"),
            })?;
            record.strings.insert(key, value.to_string());
        } else {
            let values = tokens
                .map(|token| {
                    token.parse::<f32>().map_err(|_| MtlError::Format {
                        line: line_no,
                        message: format!("non-numeric value '{token}' for key '{key}'"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            record.scalars.insert(key, values);
        }
    }

    Ok(records)
}

fn finalize_record(
    record: RawRecord,
    base_dir: &Path,
    options: &MtlOptions,
) -> Result<Material, MtlError> {
    let RawRecord {
        name,
        strings,
        scalars,
    } = record;

    let shader_model = strings
        .get("bsdf")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SHADER_MODEL.to_string());

    let kd = match strings.get("map_kd") {
        Some(rel) => Texture::load(&base_dir.join(rel), None)?,
        None => match scalars.get("kd") {
            Some(values) => Texture::constant(values),
            None => {
                return Err(MtlError::MissingKey {
                    material: name,
                    key: "kd",
                })
            }
        },
    };
    // Diffuse color arrives gamma-encoded; everything downstream is linear.
    let kd = kd.to_linear();

    let ks = match strings.get("map_ks") {
        Some(rel) => Texture::load(&base_dir.join(rel), Some(3))?,
        None => match scalars.get("ks") {
            Some(values) => Texture::constant(values),
            None => {
                return Err(MtlError::MissingKey {
                    material: name,
                    key: "ks",
                })
            }
        },
    };
    let ks = if options.clear_specular_occlusion {
        ks.with_channel_zeroed(0)
    } else {
        ks
    };

    let normal = match strings.get("bump") {
        Some(rel) => Some(Texture::load_with(
            &base_dir.join(rel),
            Some(3),
            |x| x * 2.0 - 1.0,
        )?),
        None => None,
    };

    Ok(Material {
        name,
        shader_model,
        kd: Some(kd),
        ks: Some(ks),
        normal,
        scalars,
        strings,
    })
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Writes a single-record material file shaped for the uber material.
///
/// The record is always named `defaultMat`; per-material names and legacy
/// scalar fields are intentionally discarded. Present texture slots are
/// written as `texture_kd.png` / `texture_ks.png` / `texture_n.png` beside
/// `path` (`kd` re-encoded to sRGB, `ks` linear, `normal` re-encoded via
/// `(x + 1) * 0.5`).
///
/// # Errors
///
/// [`MtlError::Io`] on write failure, [`MtlError::Texture`] if a companion
/// image cannot be encoded.
pub fn save_mtl(path: &Path, material: &Material) -> Result<(), MtlError> {
    let folder = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source| MtlError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = std::fs::File::create(path).map_err(io_err)?;
    writeln!(file, "newmtl defaultMat").map_err(io_err)?;

    if !material.shader_model.is_empty() {
        writeln!(file, "bsdf {}", material.shader_model).map_err(io_err)?;
    }

    match &material.kd {
        Some(kd) => {
            writeln!(file, "map_Kd texture_kd.png").map_err(io_err)?;
            kd.to_srgb().save(&folder.join("texture_kd.png"))?;
        }
        None => writeln!(file, "Kd 1 1 1").map_err(io_err)?,
    }
    // Ambient fallback is emitted even when a diffuse map is present.
    writeln!(file, "Ka 0 0 0").map_err(io_err)?;

    match &material.ks {
        Some(ks) => {
            writeln!(file, "map_Ks texture_ks.png").map_err(io_err)?;
            ks.save(&folder.join("texture_ks.png"))?;
        }
        None => writeln!(file, "Ks 0 0 0").map_err(io_err)?,
    }
    writeln!(file, "Ns 0").map_err(io_err)?;
    writeln!(file, "Ni 1").map_err(io_err)?;
    writeln!(file, "Tf 1 1 1").map_err(io_err)?;

    if let Some(normal) = &material.normal {
        writeln!(file, "bump texture_n.png").map_err(io_err)?;
        normal.save_with(&folder.join("texture_n.png"), |x| (x + 1.0) * 0.5)?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
