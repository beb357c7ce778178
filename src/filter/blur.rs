//! Separable gaussian blur
//!
//! True gaussian convolution with a normalized kernel truncated at three
//! standard deviations, applied as a horizontal pass followed by a
//! vertical pass over premultiplied float channels. Edge samples clamp to
//! the border pixel.

use crate::canvas::RasterImage;

pub(crate) fn gaussian_kernel(sigma: f32) -> (Vec<f32>, usize) {
  let radius = (sigma.abs() * 3.0).ceil() as usize;
  if radius == 0 {
    return (Vec::new(), 0);
  }

  let mut kernel = Vec::with_capacity(radius * 2 + 1);
  let sigma_sq = sigma * sigma;
  let mut sum = 0.0;
  for i in 0..=radius * 2 {
    let x = i as f32 - radius as f32;
    let value = (-x * x / (2.0 * sigma_sq)).exp();
    kernel.push(value);
    sum += value;
  }
  if sum != 0.0 {
    for k in &mut kernel {
      *k /= sum;
    }
  }
  (kernel, radius)
}

/// Blurs `image` in place with independent per-axis deviations.
///
/// A zero deviation on an axis skips that pass, so `(0, 0)` is an exact
/// no-op.
pub fn gaussian_blur(image: &mut RasterImage, sigma_x: f32, sigma_y: f32) {
  let width = image.width() as usize;
  let height = image.height() as usize;
  if width == 0 || height == 0 {
    return;
  }

  let (kernel_x, radius_x) = gaussian_kernel(sigma_x);
  let (kernel_y, radius_y) = gaussian_kernel(sigma_y);
  if kernel_x.is_empty() && kernel_y.is_empty() {
    return;
  }

  let mut src: Vec<[f32; 4]> = image
    .data()
    .chunks_exact(4)
    .map(|px| {
      [
        f32::from(px[0]) / 255.0,
        f32::from(px[1]) / 255.0,
        f32::from(px[2]) / 255.0,
        f32::from(px[3]) / 255.0,
      ]
    })
    .collect();

  if !kernel_x.is_empty() {
    let mut out = vec![[0.0f32; 4]; src.len()];
    for y in 0..height {
      for x in 0..width {
        let mut accum = [0.0f32; 4];
        for (i, weight) in kernel_x.iter().enumerate() {
          let offset = i as isize - radius_x as isize;
          let cx = (x as isize + offset).clamp(0, width as isize - 1) as usize;
          let sample = src[y * width + cx];
          for c in 0..4 {
            accum[c] += sample[c] * weight;
          }
        }
        out[y * width + x] = accum;
      }
    }
    src = out;
  }

  if !kernel_y.is_empty() {
    let mut out = vec![[0.0f32; 4]; src.len()];
    for y in 0..height {
      for x in 0..width {
        let mut accum = [0.0f32; 4];
        for (i, weight) in kernel_y.iter().enumerate() {
          let offset = i as isize - radius_y as isize;
          let cy = (y as isize + offset).clamp(0, height as isize - 1) as usize;
          let sample = src[cy * width + x];
          for c in 0..4 {
            accum[c] += sample[c] * weight;
          }
        }
        out[y * width + x] = accum;
      }
    }
    src = out;
  }

  for (px, vals) in image.data_mut().chunks_exact_mut(4).zip(src.iter()) {
    // Premultiplied invariant: color channels may not exceed alpha.
    let a = (vals[3] * 255.0).round().clamp(0.0, 255.0);
    px[3] = a as u8;
    for c in 0..3 {
      px[c] = (vals[c] * 255.0).round().clamp(0.0, a) as u8;
    }
  }
}
