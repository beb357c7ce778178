//! Bitmap comparison harness
//!
//! Per-pixel tolerance comparison between a render result and a reference
//! raster, for regression testing. This is a collaborator of the
//! renderer, not part of the rendering contract: nothing in the engine
//! depends on it.
//!
//! The default tolerance is an absolute difference of 10 per channel, the
//! threshold the original renderer's sample suite was validated against.

use crate::error::{CompareError, Error, Result};
use crate::render::RenderResult;

/// Configuration for comparing two images.
#[derive(Debug, Clone)]
pub struct CompareConfig {
  /// Maximum allowed difference per color channel (0-255).
  pub channel_tolerance: u8,
  /// Maximum percentage of pixels that may exceed the tolerance before
  /// the comparison fails (0.0-100.0).
  pub max_different_percent: f64,
  /// Whether to compare the alpha channel.
  pub compare_alpha: bool,
}

impl Default for CompareConfig {
  fn default() -> Self {
    Self {
      channel_tolerance: 10,
      max_different_percent: 0.0,
      compare_alpha: true,
    }
  }
}

impl CompareConfig {
  /// Exact match required.
  pub fn strict() -> Self {
    Self {
      channel_tolerance: 0,
      max_different_percent: 0.0,
      compare_alpha: true,
    }
  }

  /// Sets the channel tolerance.
  pub fn with_channel_tolerance(mut self, tolerance: u8) -> Self {
    self.channel_tolerance = tolerance;
    self
  }

  /// Sets the allowed percentage of differing pixels.
  pub fn with_max_different_percent(mut self, percent: f64) -> Self {
    self.max_different_percent = percent;
    self
  }

  /// Enables or disables alpha comparison.
  pub fn with_compare_alpha(mut self, compare: bool) -> Self {
    self.compare_alpha = compare;
    self
  }
}

/// Statistics about pixel differences.
#[derive(Debug, Clone, Default)]
pub struct DiffStatistics {
  /// Total number of pixels compared.
  pub total_pixels: u64,
  /// Number of pixels exceeding the tolerance.
  pub different_pixels: u64,
  /// Percentage of pixels exceeding the tolerance (0.0-100.0).
  pub different_percent: f64,
  /// Maximum difference per channel.
  pub max_red_diff: u8,
  pub max_green_diff: u8,
  pub max_blue_diff: u8,
  pub max_alpha_diff: u8,
}

impl DiffStatistics {
  /// Returns the maximum difference across the compared channels.
  pub fn max_channel_diff(&self, compare_alpha: bool) -> u8 {
    let max_rgb = self
      .max_red_diff
      .max(self.max_green_diff)
      .max(self.max_blue_diff);
    if compare_alpha {
      max_rgb.max(self.max_alpha_diff)
    } else {
      max_rgb
    }
  }
}

/// Outcome of a comparison.
#[derive(Debug, Clone)]
pub struct CompareOutcome {
  pub passed: bool,
  pub stats: DiffStatistics,
}

fn channels(px: u32) -> [u8; 4] {
  [
    (px & 0xff) as u8,
    ((px >> 8) & 0xff) as u8,
    ((px >> 16) & 0xff) as u8,
    ((px >> 24) & 0xff) as u8,
  ]
}

/// Compares two render results pixel by pixel.
///
/// Dimensions must match exactly; a mismatch is an error rather than a
/// failed comparison because it indicates a broken test setup.
pub fn compare(
  actual: &RenderResult,
  expected: &RenderResult,
  config: &CompareConfig,
) -> Result<CompareOutcome> {
  if actual.width != expected.width || actual.height != expected.height {
    return Err(Error::Compare(CompareError::DimensionMismatch {
      actual_width: actual.width,
      actual_height: actual.height,
      expected_width: expected.width,
      expected_height: expected.height,
    }));
  }

  let mut stats = DiffStatistics {
    total_pixels: actual.pixels.len() as u64,
    ..DiffStatistics::default()
  };

  for (a, e) in actual.pixels.iter().zip(expected.pixels.iter()) {
    let [ar, ag, ab, aa] = channels(*a);
    let [er, eg, eb, ea] = channels(*e);
    let dr = ar.abs_diff(er);
    let dg = ag.abs_diff(eg);
    let db = ab.abs_diff(eb);
    let da = aa.abs_diff(ea);
    stats.max_red_diff = stats.max_red_diff.max(dr);
    stats.max_green_diff = stats.max_green_diff.max(dg);
    stats.max_blue_diff = stats.max_blue_diff.max(db);
    stats.max_alpha_diff = stats.max_alpha_diff.max(da);

    let mut exceeded = dr > config.channel_tolerance
      || dg > config.channel_tolerance
      || db > config.channel_tolerance;
    if config.compare_alpha {
      exceeded |= da > config.channel_tolerance;
    }
    if exceeded {
      stats.different_pixels += 1;
    }
  }

  if stats.total_pixels > 0 {
    stats.different_percent =
      stats.different_pixels as f64 / stats.total_pixels as f64 * 100.0;
  }
  let passed = stats.different_percent <= config.max_different_percent;
  Ok(CompareOutcome { passed, stats })
}

/// Decodes an encoded reference image (PNG and the other formats the
/// `image` crate's enabled features support) into a comparable result.
pub fn decode_reference(bytes: &[u8]) -> Result<RenderResult> {
  let decoded = image::load_from_memory(bytes).map_err(|err| CompareError::Decode {
    reason: err.to_string(),
  })?;
  let rgba = decoded.to_rgba8();
  let (width, height) = rgba.dimensions();
  let pixels = rgba
    .pixels()
    .map(|px| {
      u32::from(px.0[0])
        | u32::from(px.0[1]) << 8
        | u32::from(px.0[2]) << 16
        | u32::from(px.0[3]) << 24
    })
    .collect();
  Ok(RenderResult {
    width,
    height,
    pixels,
  })
}

/// Convenience wrapper: compares a render result against an encoded
/// reference image.
pub fn compare_to_reference(
  actual: &RenderResult,
  reference_bytes: &[u8],
  config: &CompareConfig,
) -> Result<CompareOutcome> {
  let expected = decode_reference(reference_bytes)?;
  compare(actual, &expected, config)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(width: u32, height: u32, pixels: Vec<u32>) -> RenderResult {
    RenderResult {
      width,
      height,
      pixels,
    }
  }

  #[test]
  fn identical_images_pass_strictly() {
    let a = result(2, 1, vec![0xff00_00ff, 0xff00_ff00]);
    let outcome = compare(&a, &a.clone(), &CompareConfig::strict()).unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.stats.different_pixels, 0);
  }

  #[test]
  fn default_tolerance_absorbs_small_differences() {
    let a = result(1, 1, vec![0xff00_00ff]);
    let b = result(1, 1, vec![0xff00_00f5]); // red differs by 10
    let outcome = compare(&a, &b, &CompareConfig::default()).unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.stats.max_red_diff, 10);
  }

  #[test]
  fn differences_beyond_tolerance_fail() {
    let a = result(1, 1, vec![0xff00_00ff]);
    let b = result(1, 1, vec![0xff00_00e0]);
    let outcome = compare(&a, &b, &CompareConfig::default()).unwrap();
    assert!(!outcome.passed);
    assert_eq!(outcome.stats.different_pixels, 1);
  }

  #[test]
  fn alpha_can_be_ignored() {
    let a = result(1, 1, vec![0xff00_00ff]);
    let b = result(1, 1, vec![0x0000_00ff]);
    let config = CompareConfig::default().with_compare_alpha(false);
    assert!(compare(&a, &b, &config).unwrap().passed);
    assert!(!compare(&a, &b, &CompareConfig::default()).unwrap().passed);
  }

  #[test]
  fn percent_budget_allows_outliers() {
    let mut pixels = vec![0xff00_00ffu32; 100];
    pixels[0] = 0xffff_ffff;
    let a = result(10, 10, pixels);
    let b = result(10, 10, vec![0xff00_00ff; 100]);
    let config = CompareConfig::default().with_max_different_percent(1.0);
    let outcome = compare(&a, &b, &config).unwrap();
    assert!(outcome.passed);
    assert_eq!(outcome.stats.different_pixels, 1);
  }

  #[test]
  fn dimension_mismatch_is_an_error() {
    let a = result(1, 1, vec![0]);
    let b = result(2, 1, vec![0, 0]);
    assert!(matches!(
      compare(&a, &b, &CompareConfig::default()),
      Err(Error::Compare(CompareError::DimensionMismatch { .. }))
    ));
  }

  #[test]
  fn decode_rejects_garbage() {
    assert!(matches!(
      decode_reference(b"not an image"),
      Err(Error::Compare(CompareError::Decode { .. }))
    ));
  }
}
