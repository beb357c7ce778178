//! Length values and unit resolution
//!
//! Attribute lengths carry a unit suffix and are resolved against the
//! current viewport at render time. Absolute units convert at 96 dpi;
//! percentages resolve against the viewport width, height, or the
//! normalized diagonal depending on which axis the attribute measures;
//! `em`/`ex` resolve against the cascaded font size.

use crate::geometry::Size;

/// Unit of a [`Length`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LengthUnit {
  /// User units (equivalent to CSS px at 96 dpi).
  #[default]
  Px,
  /// Current font size.
  Em,
  /// x-height, approximated as half the font size.
  Ex,
  /// Percentage of the viewport basis for the attribute's axis.
  Percent,
  Inch,
  Cm,
  Mm,
  Pt,
  Pc,
}

/// Which viewport basis a percentage length resolves against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthAxis {
  Horizontal,
  Vertical,
  /// Lengths not tied to one axis (stroke width, radius): the SVG
  /// normalized diagonal `sqrt((w^2 + h^2) / 2)`.
  Other,
}

/// A number with a unit suffix, resolved lazily against a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length {
  pub value: f32,
  pub unit: LengthUnit,
}

impl Length {
  pub fn new(value: f32, unit: LengthUnit) -> Self {
    Self { value, unit }
  }

  /// User-unit length (px).
  pub fn px(value: f32) -> Self {
    Self::new(value, LengthUnit::Px)
  }

  pub fn percent(value: f32) -> Self {
    Self::new(value, LengthUnit::Percent)
  }

  pub const ZERO: Length = Length {
    value: 0.0,
    unit: LengthUnit::Px,
  };

  pub fn is_percent(self) -> bool {
    self.unit == LengthUnit::Percent
  }

  /// Resolves the length to user units.
  ///
  /// Malformed values (non-finite) resolve to zero, the attribute's
  /// initial value per the error-handling policy.
  pub fn resolve(self, axis: LengthAxis, ctx: &LengthContext) -> f32 {
    if !self.value.is_finite() {
      return 0.0;
    }
    let n = self.value;
    let resolved = match self.unit {
      LengthUnit::Px => n,
      LengthUnit::Em => n * ctx.font_size,
      LengthUnit::Ex => n * ctx.font_size * 0.5,
      LengthUnit::Percent => n / 100.0 * ctx.percent_basis(axis),
      LengthUnit::Inch => n * 96.0,
      LengthUnit::Cm => n * (96.0 / 2.54),
      LengthUnit::Mm => n * (96.0 / 25.4),
      LengthUnit::Pt => n * (96.0 / 72.0),
      LengthUnit::Pc => n * (96.0 / 6.0),
    };
    if resolved.is_finite() {
      resolved
    } else {
      0.0
    }
  }

  /// Resolves against a unit interval instead of a viewport, for
  /// object-bounding-box coordinate spaces where `50%` and `0.5` coincide.
  pub fn resolve_fraction(self) -> f32 {
    if !self.value.is_finite() {
      return 0.0;
    }
    match self.unit {
      LengthUnit::Percent => self.value / 100.0,
      _ => self.value,
    }
  }
}

/// Resolution context: the current viewport extents and font size.
#[derive(Debug, Clone, Copy)]
pub struct LengthContext {
  pub viewport: Size,
  pub font_size: f32,
}

impl LengthContext {
  pub fn new(viewport: Size, font_size: f32) -> Self {
    Self {
      viewport,
      font_size,
    }
  }

  fn percent_basis(&self, axis: LengthAxis) -> f32 {
    match axis {
      LengthAxis::Horizontal => self.viewport.width,
      LengthAxis::Vertical => self.viewport.height,
      LengthAxis::Other => {
        let w = self.viewport.width;
        let h = self.viewport.height;
        ((w * w + h * h) / 2.0).sqrt()
      }
    }
  }
}
