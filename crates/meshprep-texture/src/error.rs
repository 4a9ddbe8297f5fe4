//! Texture buffer error types.

use std::path::PathBuf;

/// Errors returned by texture loading, saving, and combination.
#[derive(Debug, thiserror::Error)]
pub enum TextureError {
    /// A referenced texture file does not resolve to a readable file.
    #[error("failed to read texture '{path}': {source}")]
    Io {
        /// Path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Image decode or encode failure.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Width-wise concatenation requires all parts to share a height.
    #[error("cannot concatenate textures of heights {left} and {right}")]
    HeightMismatch {
        /// Height of the first part.
        left: u32,
        /// Height of the mismatching part.
        right: u32,
    },

    /// Width-wise concatenation of an empty list.
    #[error("cannot concatenate an empty texture list")]
    Empty,
}
