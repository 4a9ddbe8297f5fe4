//! The [`Texture`] buffer type and its whole-buffer operations.

use std::path::Path;

use image::imageops::FilterType;
use image::{Rgba, Rgba32FImage};

use crate::error::TextureError;

// ---------------------------------------------------------------------------
// Color space conversion
// ---------------------------------------------------------------------------

/// Piecewise sRGB EOTF: encoded (gamma) component → linear light.
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Piecewise sRGB OETF: linear component → encoded (gamma). Inverse of
/// [`srgb_to_linear`] within float tolerance.
fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

// ---------------------------------------------------------------------------
// Texture
// ---------------------------------------------------------------------------

/// A CPU-resident image buffer with a full mip chain.
///
/// Storage is always RGBA f32; `channels` records the semantic channel count
/// (1–4) and controls how the buffer is written back to disk. Mip level 0 is
/// the full-resolution image, each subsequent level is half-size down to 1×1.
#[derive(Clone, Debug)]
pub struct Texture {
    mips: Vec<Rgba32FImage>,
    channels: u32,
}

impl Texture {
    /// Wraps a full-resolution image, generating the mip chain.
    pub fn from_level0(level0: Rgba32FImage, channels: u32) -> Self {
        Self {
            mips: build_mip_chain(level0),
            channels: channels.clamp(1, 4),
        }
    }

    /// Materializes a scalar/vector constant as a 1×1 buffer.
    ///
    /// Missing components default to 0, alpha to 1. The semantic channel
    /// count is the number of components given.
    pub fn constant(components: &[f32]) -> Self {
        let mut rgba = [0.0, 0.0, 0.0, 1.0];
        for (dst, src) in rgba.iter_mut().zip(components) {
            *dst = *src;
        }
        let mut level0 = Rgba32FImage::new(1, 1);
        level0.put_pixel(0, 0, Rgba(rgba));
        Self::from_level0(level0, components.len() as u32)
    }

    /// Decodes an image file into an f32 buffer in `[0, 1]`.
    ///
    /// `channels` forces the semantic channel count; `None` infers it from
    /// the source color type.
    ///
    /// # Errors
    ///
    /// [`TextureError::Io`] if the file cannot be opened,
    /// [`TextureError::Image`] if decoding fails.
    pub fn load(path: &Path, channels: Option<u32>) -> Result<Self, TextureError> {
        Self::load_with(path, channels, |x| x)
    }

    /// Like [`Texture::load`], applying `transform` to each color component
    /// at load time (alpha untouched). Used to decode `[0,1]`-encoded
    /// tangent-space normal maps via `x * 2 - 1`.
    pub fn load_with(
        path: &Path,
        channels: Option<u32>,
        transform: impl Fn(f32) -> f32,
    ) -> Result<Self, TextureError> {
        let reader = image::ImageReader::open(path).map_err(|source| TextureError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let decoded = reader.decode()?;
        let channels = channels.unwrap_or_else(|| u32::from(decoded.color().channel_count()));
        let mut level0 = decoded.to_rgba32f();
        for pixel in level0.pixels_mut() {
            for c in &mut pixel.0[..3] {
                *c = transform(*c);
            }
        }
        Ok(Self::from_level0(level0, channels))
    }

    /// Encodes mip level 0 as an 8-bit PNG/JPEG, clamping to `[0, 1]`.
    /// Textures with up to 3 semantic channels are written without alpha.
    pub fn save(&self, path: &Path) -> Result<(), TextureError> {
        self.save_with(path, |x| x)
    }

    /// Like [`Texture::save`], applying `transform` to each color component
    /// before quantization. Used to re-encode normal maps via `(x+1)*0.5`.
    pub fn save_with(
        &self,
        path: &Path,
        transform: impl Fn(f32) -> f32,
    ) -> Result<(), TextureError> {
        let level0 = &self.mips[0];
        let quantize = |c: f32| (transform(c).clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.channels <= 3 {
            let mut out = image::RgbImage::new(level0.width(), level0.height());
            for (x, y, pixel) in level0.enumerate_pixels() {
                let [r, g, b, _] = pixel.0;
                out.put_pixel(x, y, image::Rgb([quantize(r), quantize(g), quantize(b)]));
            }
            out.save(path)?;
        } else {
            let mut out = image::RgbaImage::new(level0.width(), level0.height());
            for (x, y, pixel) in level0.enumerate_pixels() {
                let [r, g, b, a] = pixel.0;
                let a = (a.clamp(0.0, 1.0) * 255.0).round() as u8;
                out.put_pixel(x, y, image::Rgba([quantize(r), quantize(g), quantize(b), a]));
            }
            out.save(path)?;
        }
        Ok(())
    }

    /// `(height, width)` of mip level 0.
    pub fn resolution(&self) -> (u32, u32) {
        (self.mips[0].height(), self.mips[0].width())
    }

    /// Semantic channel count (1–4).
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// The mip chain; level 0 is full resolution, the last level is 1×1.
    pub fn mips(&self) -> &[Rgba32FImage] {
        &self.mips
    }

    /// Bilinearly resamples to the target resolution.
    pub fn resample(&self, height: u32, width: u32) -> Self {
        let level0 = image::imageops::resize(&self.mips[0], width, height, FilterType::Triangle);
        Self::from_level0(level0, self.channels)
    }

    /// Lays out `parts` horizontally, in order, into one buffer.
    ///
    /// # Errors
    ///
    /// [`TextureError::Empty`] for an empty list,
    /// [`TextureError::HeightMismatch`] if the parts disagree on height.
    pub fn concat_width(parts: &[&Texture]) -> Result<Self, TextureError> {
        let first = parts.first().ok_or(TextureError::Empty)?;
        let (height, _) = first.resolution();
        let mut width = 0;
        for part in parts {
            let (h, w) = part.resolution();
            if h != height {
                return Err(TextureError::HeightMismatch {
                    left: height,
                    right: h,
                });
            }
            width += w;
        }

        let mut level0 = Rgba32FImage::new(width, height);
        let mut x = 0_i64;
        for part in parts {
            image::imageops::replace(&mut level0, &part.mips[0], x, 0);
            x += i64::from(part.mips[0].width());
        }
        Ok(Self::from_level0(level0, first.channels))
    }

    /// Grows the canvas to the target resolution, filling the new area by
    /// replicating the right column and bottom row of the source. Never
    /// wraps or zero-fills, so filtering at the canvas edge sees no seam.
    pub fn pad_replicate(&self, height: u32, width: u32) -> Self {
        let src = &self.mips[0];
        let (src_h, src_w) = (src.height(), src.width());
        let mut level0 = Rgba32FImage::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let pixel = src.get_pixel(x.min(src_w - 1), y.min(src_h - 1));
                level0.put_pixel(x, y, *pixel);
            }
        }
        Self::from_level0(level0, self.channels)
    }

    /// Converts encoded (gamma) color to linear. Alpha is untouched.
    pub fn to_linear(&self) -> Self {
        self.map_color(srgb_to_linear)
    }

    /// Converts linear color to encoded (gamma). Alpha is untouched.
    pub fn to_srgb(&self) -> Self {
        self.map_color(linear_to_srgb)
    }

    /// Returns a copy with `channel` zeroed at every mip level.
    ///
    /// `channel` indexes the backing RGBA storage and must be in `0..4`.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is 4 or greater.
    pub fn with_channel_zeroed(&self, channel: usize) -> Self {
        assert!(channel < 4, "channel index {channel} out of range 0..4");
        let mut out = self.clone();
        for mip in &mut out.mips {
            for pixel in mip.pixels_mut() {
                pixel.0[channel] = 0.0;
            }
        }
        out
    }

    /// Applies `f` to the first 3 components of every pixel of mip level 0
    /// and rebuilds the mip chain.
    fn map_color(&self, f: impl Fn(f32) -> f32) -> Self {
        let mut level0 = self.mips[0].clone();
        for pixel in level0.pixels_mut() {
            for c in &mut pixel.0[..3] {
                *c = f(*c);
            }
        }
        Self::from_level0(level0, self.channels)
    }
}

/// Builds the mip chain: successive half-size reductions down to 1×1.
fn build_mip_chain(level0: Rgba32FImage) -> Vec<Rgba32FImage> {
    let mut mips = vec![level0];
    loop {
        let prev = &mips[mips.len() - 1];
        if prev.width() <= 1 && prev.height() <= 1 {
            break;
        }
        let w = (prev.width() / 2).max(1);
        let h = (prev.height() / 2).max(1);
        let next = image::imageops::resize(prev, w, h, FilterType::Triangle);
        mips.push(next);
    }
    mips
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(height: u32, width: u32, rgba: [f32; 4]) -> Texture {
        Texture::from_level0(
            Rgba32FImage::from_pixel(width, height, Rgba(rgba)),
            3,
        )
    }

    #[test]
    fn test_constant_is_1x1_with_defaults() {
        let tex = Texture::constant(&[0.25, 0.5]);
        assert_eq!(tex.resolution(), (1, 1));
        assert_eq!(tex.channels(), 2);
        let pixel = tex.mips()[0].get_pixel(0, 0).0;
        assert_eq!(pixel, [0.25, 0.5, 0.0, 1.0]);
    }

    #[test]
    fn test_mip_chain_is_complete() {
        let tex = solid(8, 4, [0.5, 0.5, 0.5, 1.0]);
        // 8x4 -> 4x2 -> 2x1 -> 1x1
        assert_eq!(tex.mips().len(), 4);
        let last = tex.mips().last().unwrap();
        assert_eq!((last.height(), last.width()), (1, 1));
    }

    #[test]
    fn test_resample_reaches_target_resolution() {
        let tex = solid(2, 2, [1.0, 0.0, 0.0, 1.0]);
        let scaled = tex.resample(5, 7);
        assert_eq!(scaled.resolution(), (5, 7));
        // Solid color survives bilinear resampling exactly.
        for pixel in scaled.mips()[0].pixels() {
            assert!((pixel.0[0] - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_concat_width_preserves_order() {
        let red = solid(2, 2, [1.0, 0.0, 0.0, 1.0]);
        let blue = solid(2, 3, [0.0, 0.0, 1.0, 1.0]);
        let joined = Texture::concat_width(&[&red, &blue]).unwrap();
        assert_eq!(joined.resolution(), (2, 5));
        assert_eq!(joined.mips()[0].get_pixel(0, 0).0[0], 1.0);
        assert_eq!(joined.mips()[0].get_pixel(1, 1).0[0], 1.0);
        assert_eq!(joined.mips()[0].get_pixel(2, 0).0[2], 1.0);
        assert_eq!(joined.mips()[0].get_pixel(4, 1).0[2], 1.0);
    }

    #[test]
    fn test_concat_width_rejects_height_mismatch() {
        let a = solid(2, 2, [0.0; 4]);
        let b = solid(3, 2, [0.0; 4]);
        let result = Texture::concat_width(&[&a, &b]);
        assert!(matches!(
            result,
            Err(TextureError::HeightMismatch { left: 2, right: 3 })
        ));
    }

    #[test]
    fn test_concat_width_rejects_empty() {
        assert!(matches!(
            Texture::concat_width(&[]),
            Err(TextureError::Empty)
        ));
    }

    #[test]
    fn test_pad_replicate_extends_border() {
        let mut level0 = Rgba32FImage::new(1, 1);
        level0.put_pixel(0, 0, Rgba([0.3, 0.6, 0.9, 1.0]));
        let tex = Texture::from_level0(level0, 3);
        let padded = tex.pad_replicate(2, 4);
        assert_eq!(padded.resolution(), (2, 4));
        for pixel in padded.mips()[0].pixels() {
            assert_eq!(pixel.0, [0.3, 0.6, 0.9, 1.0]);
        }
    }

    #[test]
    fn test_srgb_round_trip_is_identity() {
        for c in [0.0, 0.001, 0.04, 0.2, 0.5, 0.73, 1.0] {
            let tex = Texture::constant(&[c, c, c]);
            let round = tex.to_linear().to_srgb();
            let got = round.mips()[0].get_pixel(0, 0).0[0];
            assert!(
                (got - c).abs() < 1e-5,
                "round trip of {c} gave {got}"
            );
        }
    }

    #[test]
    #[should_panic(expected = "channel index 4 out of range")]
    fn test_with_channel_zeroed_rejects_out_of_range_index() {
        Texture::constant(&[1.0, 1.0, 1.0]).with_channel_zeroed(4);
    }

    #[test]
    fn test_with_channel_zeroed_covers_every_mip() {
        let tex = solid(4, 4, [0.8, 0.4, 0.2, 1.0]);
        let cleared = tex.with_channel_zeroed(0);
        assert!(cleared.mips().len() > 1);
        for mip in cleared.mips() {
            for pixel in mip.pixels() {
                assert_eq!(pixel.0[0], 0.0);
                assert!(pixel.0[1] > 0.0);
            }
        }
        // Source is untouched.
        assert_eq!(tex.mips()[0].get_pixel(0, 0).0[0], 0.8);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tex.png");
        let tex = solid(2, 2, [1.0, 0.0, 0.5019608, 1.0]);
        tex.save(&path).unwrap();

        let loaded = Texture::load(&path, None).unwrap();
        assert_eq!(loaded.resolution(), (2, 2));
        assert_eq!(loaded.channels(), 3);
        let pixel = loaded.mips()[0].get_pixel(0, 0).0;
        assert!((pixel[0] - 1.0).abs() < 1e-2);
        assert!(pixel[1].abs() < 1e-2);
        assert!((pixel[2] - 0.5019608).abs() < 1e-2);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Texture::load(Path::new("/nonexistent/tex.png"), None);
        assert!(matches!(result, Err(TextureError::Io { .. })));
    }

    #[test]
    fn test_load_with_applies_transform() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("normal.png");
        // Encoded flat normal: (0.5, 0.5, 1.0) -> decoded (0, 0, 1).
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([128, 128, 255]));
        img.save(&path).unwrap();

        let tex = Texture::load_with(&path, Some(3), |x| x * 2.0 - 1.0).unwrap();
        let pixel = tex.mips()[0].get_pixel(0, 0).0;
        assert!(pixel[0].abs() < 0.01);
        assert!(pixel[1].abs() < 0.01);
        assert!((pixel[2] - 1.0).abs() < 0.01);
    }
}
