//! Filter primitive image operations
//!
//! Pixel-level implementations for the non-blur primitives. Compositing
//! runs on premultiplied values; color transforms unpremultiply first and
//! re-premultiply afterward so every matrix sees straight-alpha sRGB
//! channels.

use crate::canvas::image::{premultiply, unpremultiply, RasterImage};
use crate::filter::blur::gaussian_blur;
use crate::filter::{BlendMode, ColorMatrixKind, CompositeOperator, MorphologyOperator};
use crate::geometry::Rect;
use crate::style::Rgba;

/// Constant fill of the filter region.
pub fn flood(width: u32, height: u32, color: Rgba, opacity: f32, region: Rect) -> RasterImage {
  let mut out = match RasterImage::new(width, height) {
    Ok(img) => img,
    Err(_) => return RasterImage::from_parts(width, height, Vec::new()),
  };
  let alpha = (color.a * opacity.clamp(0.0, 1.0)).clamp(0.0, 1.0);
  let a = (alpha * 255.0).round() as u8;
  let [r, g, b] = premultiply(color.r, color.g, color.b, a);
  for px in out.data_mut().chunks_exact_mut(4) {
    px[0] = r;
    px[1] = g;
    px[2] = b;
    px[3] = a;
  }
  out.clear_outside(region);
  out
}

fn saturate_matrix(s: f32) -> [f32; 20] {
  [
    0.213 + 0.787 * s,
    0.715 - 0.715 * s,
    0.072 - 0.072 * s,
    0.0,
    0.0,
    0.213 - 0.213 * s,
    0.715 + 0.285 * s,
    0.072 - 0.072 * s,
    0.0,
    0.0,
    0.213 - 0.213 * s,
    0.715 - 0.715 * s,
    0.072 + 0.928 * s,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    1.0,
    0.0,
  ]
}

fn hue_rotate_matrix(degrees: f32) -> [f32; 20] {
  let rad = degrees.to_radians();
  let (sin, cos) = rad.sin_cos();
  [
    0.213 + cos * 0.787 - sin * 0.213,
    0.715 - cos * 0.715 - sin * 0.715,
    0.072 - cos * 0.072 + sin * 0.928,
    0.0,
    0.0,
    0.213 - cos * 0.213 + sin * 0.143,
    0.715 + cos * 0.285 + sin * 0.140,
    0.072 - cos * 0.072 - sin * 0.283,
    0.0,
    0.0,
    0.213 - cos * 0.213 - sin * 0.787,
    0.715 - cos * 0.715 + sin * 0.715,
    0.072 + cos * 0.928 + sin * 0.072,
    0.0,
    0.0,
    0.0,
    0.0,
    0.0,
    1.0,
    0.0,
  ]
}

/// Applies a 4x5 color matrix (or one of its shorthand forms) in place.
pub fn color_matrix(image: &mut RasterImage, kind: &ColorMatrixKind) {
  let matrix: [f32; 20] = match kind {
    ColorMatrixKind::Matrix(m) => **m,
    ColorMatrixKind::Saturate(s) => saturate_matrix(s.clamp(0.0, 1.0)),
    ColorMatrixKind::HueRotate(deg) => hue_rotate_matrix(*deg),
    ColorMatrixKind::LuminanceToAlpha => [
      0.0, 0.0, 0.0, 0.0, 0.0, //
      0.0, 0.0, 0.0, 0.0, 0.0, //
      0.0, 0.0, 0.0, 0.0, 0.0, //
      0.2126, 0.7152, 0.0722, 0.0, 0.0,
    ],
  };

  for px in image.data_mut().chunks_exact_mut(4) {
    let a = px[3];
    let [r, g, b] = unpremultiply(px[0], px[1], px[2], a);
    let input = [
      f32::from(r) / 255.0,
      f32::from(g) / 255.0,
      f32::from(b) / 255.0,
      f32::from(a) / 255.0,
    ];
    let mut out = [0.0f32; 4];
    for (row, out_c) in out.iter_mut().enumerate() {
      let m = &matrix[row * 5..row * 5 + 5];
      *out_c = (m[0] * input[0] + m[1] * input[1] + m[2] * input[2] + m[3] * input[3] + m[4])
        .clamp(0.0, 1.0);
    }
    let new_a = (out[3] * 255.0).round() as u8;
    let [pr, pg, pb] = premultiply(
      (out[0] * 255.0).round() as u8,
      (out[1] * 255.0).round() as u8,
      (out[2] * 255.0).round() as u8,
      new_a,
    );
    px[0] = pr;
    px[1] = pg;
    px[2] = pb;
    px[3] = new_a;
  }
}

/// Porter-Duff composite of `input1` (source) against `input2`
/// (destination), returning a new image.
pub fn composite(
  input1: &RasterImage,
  input2: &RasterImage,
  operator: CompositeOperator,
) -> RasterImage {
  let width = input1.width().min(input2.width());
  let height = input1.height().min(input2.height());
  let mut out = match RasterImage::new(width, height) {
    Ok(img) => img,
    Err(_) => return input1.clone(),
  };
  let stride1 = input1.width() as usize * 4;
  let stride2 = input2.width() as usize * 4;
  let out_stride = width as usize * 4;

  for y in 0..height as usize {
    for x in 0..width as usize {
      let i1 = &input1.data()[y * stride1 + x * 4..y * stride1 + x * 4 + 4];
      let i2 = &input2.data()[y * stride2 + x * 4..y * stride2 + x * 4 + 4];
      let o = y * out_stride + x * 4;
      let sa = f32::from(i1[3]) / 255.0;
      let da = f32::from(i2[3]) / 255.0;
      // Porter-Duff weights: result = fa*src + fb*dst on premultiplied
      // channels.
      let (fa, fb) = match operator {
        CompositeOperator::Over => (1.0, 1.0 - sa),
        CompositeOperator::In => (da, 0.0),
        CompositeOperator::Out => (1.0 - da, 0.0),
        CompositeOperator::Atop => (da, 1.0 - sa),
        CompositeOperator::Xor => (1.0 - da, 1.0 - sa),
        CompositeOperator::Arithmetic { .. } => (0.0, 0.0),
      };
      for c in 0..4 {
        let s = f32::from(i1[c]) / 255.0;
        let d = f32::from(i2[c]) / 255.0;
        let v = match operator {
          CompositeOperator::Arithmetic { k1, k2, k3, k4 } => k1 * s * d + k2 * s + k3 * d + k4,
          _ => fa * s + fb * d,
        };
        out.data_mut()[o + c] = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
      }
      // Keep the premultiplied invariant after arithmetic combinations.
      let a = out.data()[o + 3];
      for c in 0..3 {
        if out.data()[o + c] > a {
          out.data_mut()[o + c] = a;
        }
      }
    }
  }
  out
}

/// Separable blend of `input1` (source) over `input2` (backdrop).
pub fn blend(input1: &RasterImage, input2: &RasterImage, mode: BlendMode) -> RasterImage {
  let width = input1.width().min(input2.width());
  let height = input1.height().min(input2.height());
  let mut out = match RasterImage::new(width, height) {
    Ok(img) => img,
    Err(_) => return input1.clone(),
  };
  let stride1 = input1.width() as usize * 4;
  let stride2 = input2.width() as usize * 4;
  let out_stride = width as usize * 4;

  for y in 0..height as usize {
    for x in 0..width as usize {
      let i1 = &input1.data()[y * stride1 + x * 4..y * stride1 + x * 4 + 4];
      let i2 = &input2.data()[y * stride2 + x * 4..y * stride2 + x * 4 + 4];
      let o = y * out_stride + x * 4;
      let sa = f32::from(i1[3]) / 255.0;
      let da = f32::from(i2[3]) / 255.0;
      let ra = sa + da - sa * da;
      let [sr, sg, sb] = unpremultiply(i1[0], i1[1], i1[2], i1[3]);
      let [dr, dg, db] = unpremultiply(i2[0], i2[1], i2[2], i2[3]);
      let blend_channel = |cs: u8, cb: u8| -> f32 {
        let cs = f32::from(cs) / 255.0;
        let cb = f32::from(cb) / 255.0;
        let blended = match mode {
          BlendMode::Normal => cs,
          BlendMode::Multiply => cs * cb,
          BlendMode::Screen => cs + cb - cs * cb,
          BlendMode::Darken => cs.min(cb),
          BlendMode::Lighten => cs.max(cb),
        };
        // W3C compositing: source and backdrop contribute where the other
        // is absent, the blend where both overlap.
        (1.0 - da) * sa * cs + (1.0 - sa) * da * cb + sa * da * blended
      };
      let channels = [
        blend_channel(sr, dr),
        blend_channel(sg, dg),
        blend_channel(sb, db),
      ];
      for (c, value) in channels.iter().enumerate() {
        out.data_mut()[o + c] = (value.clamp(0.0, 1.0) * 255.0).round() as u8;
      }
      out.data_mut()[o + 3] = (ra.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
  }
  out
}

/// Dilation/erosion with a rectangular structuring element.
pub fn morphology(image: &mut RasterImage, operator: MorphologyOperator, rx: f32, ry: f32) {
  let rx = rx.max(0.0).round() as usize;
  let ry = ry.max(0.0).round() as usize;
  if rx == 0 && ry == 0 {
    return;
  }
  let width = image.width() as usize;
  let height = image.height() as usize;
  let src = image.data().to_vec();
  let stride = width * 4;

  for y in 0..height {
    for x in 0..width {
      let y0 = y.saturating_sub(ry);
      let y1 = (y + ry).min(height - 1);
      let x0 = x.saturating_sub(rx);
      let x1 = (x + rx).min(width - 1);
      let mut extreme = match operator {
        MorphologyOperator::Dilate => [0u8; 4],
        MorphologyOperator::Erode => [255u8; 4],
      };
      for sy in y0..=y1 {
        for sx in x0..=x1 {
          let idx = sy * stride + sx * 4;
          for c in 0..4 {
            let v = src[idx + c];
            extreme[c] = match operator {
              MorphologyOperator::Dilate => extreme[c].max(v),
              MorphologyOperator::Erode => extreme[c].min(v),
            };
          }
        }
      }
      let idx = y * stride + x * 4;
      image.data_mut()[idx..idx + 4].copy_from_slice(&extreme);
    }
  }
}

/// Shadow: the input's alpha, colored, blurred and offset, composited
/// under the input.
pub fn drop_shadow(
  input: &RasterImage,
  dx: i32,
  dy: i32,
  std_dev: (f32, f32),
  color: Rgba,
  opacity: f32,
) -> RasterImage {
  let mut shadow = input.to_alpha_only();
  gaussian_blur(&mut shadow, std_dev.0, std_dev.1);
  let mut shadow = shadow.translated(dx, dy);
  let alpha = (color.a * opacity.clamp(0.0, 1.0)).clamp(0.0, 1.0);
  for px in shadow.data_mut().chunks_exact_mut(4) {
    let a = (f32::from(px[3]) / 255.0 * alpha * 255.0).round() as u8;
    let [r, g, b] = premultiply(color.r, color.g, color.b, a);
    px[0] = r;
    px[1] = g;
    px[2] = b;
    px[3] = a;
  }
  shadow.composite_over(input);
  shadow
}
