//! In-memory raster buffers
//!
//! [`RasterImage`] is the pixel currency that crosses the canvas boundary:
//! transparency-group layers pop off the canvas as raster images, the
//! filter pipeline transforms them, mask multipliers are computed from
//! them, and the final render result is extracted from one.
//!
//! Storage is premultiplied RGBA8, row-major, matching the raster
//! backend's native layout so layer extraction is a plain copy. The public
//! pixel-buffer export unpremultiplies into packed `u32` values with R in
//! the low byte.

use crate::error::CanvasError;
use crate::geometry::Rect;

const BYTES_PER_PIXEL: u64 = 4;
/// Upper bound on a single buffer allocation to avoid process aborts on OOM.
pub(crate) const MAX_IMAGE_BYTES: u64 = 512 * 1024 * 1024;

/// Validates dimensions and returns the byte size of the buffer.
pub(crate) fn guard_dimensions(width: u32, height: u32) -> Result<usize, CanvasError> {
  if width == 0 || height == 0 {
    return Err(CanvasError::ZeroArea { width, height });
  }
  let bytes = (width as u64)
    .checked_mul(height as u64)
    .and_then(|px| px.checked_mul(BYTES_PER_PIXEL))
    .ok_or(CanvasError::Oversized {
      width,
      height,
      bytes: u64::MAX,
      limit: MAX_IMAGE_BYTES,
    })?;
  if bytes > MAX_IMAGE_BYTES {
    return Err(CanvasError::Oversized {
      width,
      height,
      bytes,
      limit: MAX_IMAGE_BYTES,
    });
  }
  Ok(bytes as usize)
}

fn allocate_zeroed(bytes: usize) -> Result<Vec<u8>, CanvasError> {
  let mut buffer = Vec::new();
  buffer
    .try_reserve_exact(bytes)
    .map_err(|err| CanvasError::AllocationFailed {
      message: err.to_string(),
    })?;
  buffer.resize(bytes, 0);
  Ok(buffer)
}

/// A premultiplied RGBA8 pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
  width: u32,
  height: u32,
  data: Vec<u8>,
}

impl RasterImage {
  /// Allocates a transparent image, guarding against zero, overflowing and
  /// oversized dimensions.
  pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
    let bytes = guard_dimensions(width, height)?;
    Ok(Self {
      width,
      height,
      data: allocate_zeroed(bytes)?,
    })
  }

  /// Wraps an existing premultiplied RGBA8 buffer.
  ///
  /// The buffer length must be exactly `width * height * 4`.
  pub fn from_premultiplied(
    width: u32,
    height: u32,
    data: Vec<u8>,
  ) -> Result<Self, CanvasError> {
    let bytes = guard_dimensions(width, height)?;
    if data.len() != bytes {
      return Err(CanvasError::Backend {
        message: format!(
          "pixel buffer length {} does not match {}x{}",
          data.len(),
          width,
          height
        ),
      });
    }
    Ok(Self {
      width,
      height,
      data,
    })
  }

  /// Builds an image from straight-alpha packed pixels (R in the low byte),
  /// premultiplying on the way in. This is how pre-decoded bitmap content
  /// enters the document tree.
  pub fn from_packed_rgba(width: u32, height: u32, pixels: &[u32]) -> Result<Self, CanvasError> {
    let bytes = guard_dimensions(width, height)?;
    if pixels.len() != (width as usize) * (height as usize) {
      return Err(CanvasError::Backend {
        message: format!(
          "pixel count {} does not match {}x{}",
          pixels.len(),
          width,
          height
        ),
      });
    }
    let mut data = allocate_zeroed(bytes)?;
    for (px, out) in pixels.iter().zip(data.chunks_exact_mut(4)) {
      let r = (px & 0xff) as u8;
      let g = ((px >> 8) & 0xff) as u8;
      let b = ((px >> 16) & 0xff) as u8;
      let a = ((px >> 24) & 0xff) as u8;
      let [pr, pg, pb] = premultiply(r, g, b, a);
      out[0] = pr;
      out[1] = pg;
      out[2] = pb;
      out[3] = a;
    }
    Ok(Self {
      width,
      height,
      data,
    })
  }

  /// Infallible internal constructor: the buffer is truncated or padded
  /// with transparent pixels to match the dimensions.
  pub(crate) fn from_parts(width: u32, height: u32, mut data: Vec<u8>) -> Self {
    let width = width.max(1);
    let height = height.max(1);
    let bytes = width as usize * height as usize * 4;
    data.resize(bytes, 0);
    Self {
      width,
      height,
      data,
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  /// Raw premultiplied RGBA8 bytes, row-major.
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn data_mut(&mut self) -> &mut [u8] {
    &mut self.data
  }

  pub fn into_data(self) -> Vec<u8> {
    self.data
  }

  /// Exports the buffer as packed straight-alpha `u32` pixels
  /// (`A<<24 | B<<16 | G<<8 | R`), row-major.
  pub fn to_packed_rgba(&self) -> Vec<u32> {
    self
      .data
      .chunks_exact(4)
      .map(|px| {
        let [r, g, b] = unpremultiply(px[0], px[1], px[2], px[3]);
        u32::from(r) | u32::from(g) << 8 | u32::from(b) << 16 | u32::from(px[3]) << 24
      })
      .collect()
  }

  /// Keeps the alpha channel and zeroes the color channels (in
  /// premultiplied form this is exactly r=g=b=0).
  pub fn to_alpha_only(&self) -> RasterImage {
    let mut out = self.clone();
    for px in out.data.chunks_exact_mut(4) {
      px[0] = 0;
      px[1] = 0;
      px[2] = 0;
    }
    out
  }

  /// Per-pixel mask multiplier: luminance times alpha, in [0,1].
  ///
  /// Uses the Rec. 709 luminance coefficients on unpremultiplied sRGB
  /// channels, the convention mask rendering follows.
  pub fn luminance_alpha(&self) -> Vec<f32> {
    self
      .data
      .chunks_exact(4)
      .map(|px| {
        let a = f32::from(px[3]) / 255.0;
        if a == 0.0 {
          return 0.0;
        }
        let [r, g, b] = unpremultiply(px[0], px[1], px[2], px[3]);
        let lum = 0.2126 * f32::from(r) + 0.7152 * f32::from(g) + 0.0722 * f32::from(b);
        (lum / 255.0) * a
      })
      .collect()
  }

  /// Multiplies every pixel by the corresponding factor in [0,1].
  ///
  /// Factors beyond the image's pixel count are ignored; missing factors
  /// leave trailing pixels untouched.
  pub fn multiply_alpha(&mut self, factors: &[f32]) {
    for (px, factor) in self.data.chunks_exact_mut(4).zip(factors.iter()) {
      let f = factor.clamp(0.0, 1.0);
      for channel in px.iter_mut() {
        *channel = (f32::from(*channel) * f).round() as u8;
      }
    }
  }

  /// Multiplies every pixel by one uniform factor in [0,1].
  pub fn scale_alpha(&mut self, factor: f32) {
    let f = factor.clamp(0.0, 1.0);
    if f >= 1.0 {
      return;
    }
    for channel in self.data.iter_mut() {
      *channel = (f32::from(*channel) * f).round() as u8;
    }
  }

  /// Clears every pixel outside `region` (device-space rectangle).
  pub fn clear_outside(&mut self, region: Rect) {
    let width = self.width as i32;
    let height = self.height as i32;
    let min_x = region.min_x().floor() as i32;
    let min_y = region.min_y().floor() as i32;
    let max_x = region.max_x().ceil() as i32;
    let max_y = region.max_y().ceil() as i32;
    let min_x = min_x.clamp(0, width);
    let min_y = min_y.clamp(0, height);
    let max_x = max_x.clamp(0, width);
    let max_y = max_y.clamp(0, height);
    if min_x == 0 && min_y == 0 && max_x == width && max_y == height {
      return;
    }
    let stride = self.width as usize * 4;
    for (y, row) in self.data.chunks_exact_mut(stride).enumerate() {
      let y = y as i32;
      if y < min_y || y >= max_y {
        row.fill(0);
        continue;
      }
      for (x, px) in row.chunks_exact_mut(4).enumerate() {
        let x = x as i32;
        if x < min_x || x >= max_x {
          px.fill(0);
        }
      }
    }
  }

  /// Source-over composites `src` onto `self`. Both images must have the
  /// same dimensions; mismatched sizes composite the overlapping region.
  pub fn composite_over(&mut self, src: &RasterImage) {
    let rows = self.height.min(src.height) as usize;
    let cols = self.width.min(src.width) as usize;
    let dst_stride = self.width as usize * 4;
    let src_stride = src.width as usize * 4;
    for y in 0..rows {
      let dst_row = &mut self.data[y * dst_stride..y * dst_stride + cols * 4];
      let src_row = &src.data[y * src_stride..y * src_stride + cols * 4];
      for (dst, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
        let inv_a = 1.0 - f32::from(s[3]) / 255.0;
        for i in 0..4 {
          let v = f32::from(s[i]) + f32::from(dst[i]) * inv_a;
          dst[i] = v.round().clamp(0.0, 255.0) as u8;
        }
      }
    }
  }

  /// Returns a copy shifted by an integer pixel delta; vacated pixels are
  /// transparent, shifted-out pixels are dropped.
  pub fn translated(&self, dx: i32, dy: i32) -> RasterImage {
    let mut out = RasterImage {
      width: self.width,
      height: self.height,
      data: vec![0; self.data.len()],
    };
    let width = self.width as i32;
    let height = self.height as i32;
    let stride = self.width as usize * 4;
    for y in 0..height {
      let sy = y - dy;
      if sy < 0 || sy >= height {
        continue;
      }
      for x in 0..width {
        let sx = x - dx;
        if sx < 0 || sx >= width {
          continue;
        }
        let src_idx = sy as usize * stride + sx as usize * 4;
        let dst_idx = y as usize * stride + x as usize * 4;
        out.data[dst_idx..dst_idx + 4].copy_from_slice(&self.data[src_idx..src_idx + 4]);
      }
    }
    out
  }
}

/// Premultiplies straight-alpha channels.
pub(crate) fn premultiply(r: u8, g: u8, b: u8, a: u8) -> [u8; 3] {
  if a == 255 {
    return [r, g, b];
  }
  let a = f32::from(a) / 255.0;
  [
    (f32::from(r) * a).round() as u8,
    (f32::from(g) * a).round() as u8,
    (f32::from(b) * a).round() as u8,
  ]
}

/// Recovers straight-alpha channels from premultiplied ones.
pub(crate) fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> [u8; 3] {
  if a == 0 {
    return [0, 0, 0];
  }
  if a == 255 {
    return [r, g, b];
  }
  let inv = 255.0 / f32::from(a);
  [
    (f32::from(r) * inv).round().min(255.0) as u8,
    (f32::from(g) * inv).round().min(255.0) as u8,
    (f32::from(b) * inv).round().min(255.0) as u8,
  ]
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_zero_dimensions() {
    assert!(matches!(
      RasterImage::new(0, 10),
      Err(CanvasError::ZeroArea { .. })
    ));
    assert!(matches!(
      RasterImage::new(10, 0),
      Err(CanvasError::ZeroArea { .. })
    ));
  }

  #[test]
  fn rejects_overflow_and_limit() {
    assert!(matches!(
      RasterImage::new(u32::MAX, u32::MAX),
      Err(CanvasError::Oversized { .. })
    ));
    let too_wide = (MAX_IMAGE_BYTES / BYTES_PER_PIXEL + 1) as u32;
    assert!(matches!(
      RasterImage::new(too_wide, 1),
      Err(CanvasError::Oversized { .. })
    ));
  }

  #[test]
  fn packed_round_trip_preserves_opaque_pixels() {
    let pixels = [0xff00_00ffu32, 0xff00_ff00, 0xffff_0000, 0xff80_4020];
    let img = RasterImage::from_packed_rgba(2, 2, &pixels).unwrap();
    assert_eq!(img.to_packed_rgba(), pixels);
  }

  #[test]
  fn packed_layout_is_r_low_byte() {
    let img = RasterImage::from_packed_rgba(1, 1, &[0xff00_00ff]).unwrap();
    // premultiplied bytes: pure red, full alpha
    assert_eq!(img.data(), &[255, 0, 0, 255]);
  }

  #[test]
  fn alpha_only_zeroes_color() {
    let img = RasterImage::from_packed_rgba(1, 1, &[0x8000_ff00]).unwrap();
    let alpha = img.to_alpha_only();
    assert_eq!(alpha.data()[0], 0);
    assert_eq!(alpha.data()[1], 0);
    assert_eq!(alpha.data()[2], 0);
    assert_eq!(alpha.data()[3], 0x80);
  }

  #[test]
  fn luminance_alpha_white_is_one_black_is_zero() {
    let img = RasterImage::from_packed_rgba(2, 1, &[0xffff_ffff, 0xff00_0000]).unwrap();
    let factors = img.luminance_alpha();
    assert!((factors[0] - 1.0).abs() < 0.01);
    assert!(factors[1] < 0.01);
  }

  #[test]
  fn multiply_alpha_halves_pixels() {
    let mut img = RasterImage::from_packed_rgba(1, 1, &[0xffff_ffff]).unwrap();
    img.multiply_alpha(&[0.5]);
    assert_eq!(img.data()[3], 128);
  }

  #[test]
  fn clear_outside_keeps_region() {
    let mut img = RasterImage::from_packed_rgba(
      3,
      1,
      &[0xffff_ffff, 0xffff_ffff, 0xffff_ffff],
    )
    .unwrap();
    img.clear_outside(Rect::from_xywh(1.0, 0.0, 1.0, 1.0));
    assert_eq!(img.data()[3], 0);
    assert_eq!(img.data()[7], 255);
    assert_eq!(img.data()[11], 0);
  }

  #[test]
  fn composite_over_obeys_source_alpha() {
    let mut dst = RasterImage::from_packed_rgba(1, 1, &[0xff00_00ff]).unwrap();
    let src = RasterImage::from_packed_rgba(1, 1, &[0x0000_0000]).unwrap();
    dst.composite_over(&src);
    // Transparent source leaves destination untouched.
    assert_eq!(dst.to_packed_rgba(), vec![0xff00_00ff]);

    let opaque = RasterImage::from_packed_rgba(1, 1, &[0xff00_ff00]).unwrap();
    dst.composite_over(&opaque);
    assert_eq!(dst.to_packed_rgba(), vec![0xff00_ff00]);
  }

  #[test]
  fn translated_shifts_and_drops() {
    let img = RasterImage::from_packed_rgba(2, 1, &[0xffff_ffff, 0xff00_00ff]).unwrap();
    let moved = img.translated(1, 0);
    let packed = moved.to_packed_rgba();
    assert_eq!(packed[0], 0);
    assert_eq!(packed[1], 0xffff_ffff);
  }
}
