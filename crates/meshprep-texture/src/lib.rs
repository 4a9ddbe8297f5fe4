//! CPU texture buffers: f32 image data with a mip chain, plus the whole-buffer
//! operations the material pipeline needs — resampling, width-wise concatenation,
//! edge-replicate padding, sRGB⇄linear conversion, and per-channel overwrite.
//!
//! All operations are pure: they return a fresh [`Texture`] and never mutate
//! the receiver, so loaded assets can be shared freely.

mod error;
mod texture;

pub use error::TextureError;
pub use texture::Texture;
