//! Filter-effect graphs
//!
//! A filter definition is an ordered list of primitive steps over named
//! intermediate images. Evaluation is a single forward pass: each step
//! reads its declared inputs (defaulting to the previous step's output,
//! or the source image for the first step), produces an image, and may
//! publish it under a result name. Because inputs may only name results
//! that an *earlier* step produced, the graph is a DAG by construction —
//! a reference to an unknown or not-yet-produced name invalidates the
//! whole filter, which then degrades to identity on the source image.
//!
//! All intermediate images live in device space and are clipped to the
//! filter region, which defaults to the target bounding box padded by 10%
//! on every side.

pub mod blur;
pub mod primitives;

use crate::canvas::RasterImage;
use crate::geometry::Rect;
use crate::style::Rgba;
use crate::tree::CoordUnits;
use crate::units::{Length, LengthAxis, LengthContext};
use log::warn;
use rustc_hash::FxHashMap;

/// A named input to a filter primitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FilterInput {
  /// The pre-filter rendering of the target.
  SourceGraphic,
  /// The alpha channel of the pre-filter rendering.
  SourceAlpha,
  /// A named result of an earlier step.
  Reference(String),
  /// The previous step's output (the source image for the first step).
  #[default]
  Previous,
}

/// Color-matrix variants. `Matrix` rows are in RGBA order, 5 columns each
/// (the last column is the constant offset in unit-interval terms).
#[derive(Debug, Clone, PartialEq)]
pub enum ColorMatrixKind {
  Matrix(Box<[f32; 20]>),
  Saturate(f32),
  HueRotate(f32),
  LuminanceToAlpha,
}

/// Porter-Duff style compositing operators for the composite primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeOperator {
  Over,
  In,
  Out,
  Atop,
  Xor,
  Arithmetic { k1: f32, k2: f32, k3: f32, k4: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologyOperator {
  Dilate,
  Erode,
}

/// Pixel blend modes for the blend primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
  #[default]
  Normal,
  Multiply,
  Screen,
  Darken,
  Lighten,
}

/// One filter operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPrimitive {
  /// Fills the filter region with a constant color.
  Flood { color: Rgba, opacity: f32 },
  /// Separable gaussian blur with per-axis standard deviations.
  GaussianBlur {
    input: FilterInput,
    std_dev: (f32, f32),
  },
  /// Translates the input by a user-space delta.
  Offset {
    input: FilterInput,
    dx: f32,
    dy: f32,
  },
  /// 4x5 affine color transform on straight-alpha RGBA.
  ColorMatrix {
    input: FilterInput,
    kind: ColorMatrixKind,
  },
  /// Combines two inputs with a Porter-Duff operator.
  Composite {
    input1: FilterInput,
    input2: FilterInput,
    operator: CompositeOperator,
  },
  /// Stacks inputs by over-compositing in declaration order.
  Merge { inputs: Vec<FilterInput> },
  /// Dilates or erodes by a per-axis radius.
  Morphology {
    input: FilterInput,
    operator: MorphologyOperator,
    radius: (f32, f32),
  },
  /// Blends two inputs with a separable blend mode.
  Blend {
    input1: FilterInput,
    input2: FilterInput,
    mode: BlendMode,
  },
  /// Blurred, offset, colored copy of the input underneath the input.
  DropShadow {
    input: FilterInput,
    dx: f32,
    dy: f32,
    std_dev: (f32, f32),
    color: Rgba,
    opacity: f32,
  },
}

impl FilterPrimitive {
  fn inputs(&self) -> Vec<&FilterInput> {
    match self {
      FilterPrimitive::Flood { .. } => Vec::new(),
      FilterPrimitive::GaussianBlur { input, .. }
      | FilterPrimitive::Offset { input, .. }
      | FilterPrimitive::ColorMatrix { input, .. }
      | FilterPrimitive::Morphology { input, .. }
      | FilterPrimitive::DropShadow { input, .. } => vec![input],
      FilterPrimitive::Composite { input1, input2, .. }
      | FilterPrimitive::Blend { input1, input2, .. } => vec![input1, input2],
      FilterPrimitive::Merge { inputs } => inputs.iter().collect(),
    }
  }
}

/// One step of a filter: a primitive plus an optional result name.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStep {
  pub result: Option<String>,
  pub primitive: FilterPrimitive,
}

impl FilterStep {
  pub fn new(primitive: FilterPrimitive) -> Self {
    Self {
      result: None,
      primitive,
    }
  }

  pub fn named(result: impl Into<String>, primitive: FilterPrimitive) -> Self {
    Self {
      result: Some(result.into()),
      primitive,
    }
  }
}

/// A filter definition as referenced from a node.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterDef {
  /// Units of the region rectangle.
  pub units: CoordUnits,
  /// Units of primitive distances (offsets, radii, deviations).
  pub primitive_units: CoordUnits,
  pub x: Length,
  pub y: Length,
  pub width: Length,
  pub height: Length,
  pub steps: Vec<FilterStep>,
}

impl Default for FilterDef {
  fn default() -> Self {
    Self {
      units: CoordUnits::ObjectBoundingBox,
      primitive_units: CoordUnits::UserSpace,
      x: Length::percent(-10.0),
      y: Length::percent(-10.0),
      width: Length::percent(120.0),
      height: Length::percent(120.0),
      steps: Vec::new(),
    }
  }
}

impl FilterDef {
  /// Resolves the filter region to user space against the target bbox.
  pub fn resolve_region(&self, bbox: Rect, ctx: &LengthContext) -> Rect {
    match self.units {
      CoordUnits::ObjectBoundingBox => {
        let x = bbox.x() + self.x.resolve_fraction() * bbox.width();
        let y = bbox.y() + self.y.resolve_fraction() * bbox.height();
        let w = self.width.resolve_fraction() * bbox.width();
        let h = self.height.resolve_fraction() * bbox.height();
        Rect::from_xywh(x, y, w.max(0.0), h.max(0.0))
      }
      CoordUnits::UserSpace => Rect::from_xywh(
        self.x.resolve(LengthAxis::Horizontal, ctx),
        self.y.resolve(LengthAxis::Vertical, ctx),
        self.width.resolve(LengthAxis::Horizontal, ctx).max(0.0),
        self.height.resolve(LengthAxis::Vertical, ctx).max(0.0),
      ),
    }
  }

  /// Validates the input wiring: every referenced name must have been
  /// produced by an earlier step. Forward and unknown references (which
  /// subsume cycles in a declaration-ordered graph) make the filter
  /// invalid.
  pub fn validate(&self) -> bool {
    let mut produced: Vec<&str> = Vec::new();
    for step in &self.steps {
      for input in step.primitive.inputs() {
        if let FilterInput::Reference(name) = input {
          if !produced.iter().any(|p| p == name) {
            return false;
          }
        }
      }
      if let Some(name) = &step.result {
        produced.push(name);
      }
    }
    true
  }
}

/// Everything the evaluator needs about the filter's placement.
#[derive(Debug, Clone, Copy)]
pub struct FilterContext {
  /// Target bounding box in user space.
  pub bbox: Rect,
  /// User-space → device-space scale factors.
  pub scale: (f32, f32),
  /// Filter region mapped to device space; intermediates clip to it.
  pub region_device: Rect,
}

/// Evaluates `def` over `source` (a full-canvas device-space image).
///
/// Returns the filtered image, or the unmodified source when the filter
/// is invalid. The result is clipped to the filter region.
pub fn evaluate(def: &FilterDef, source: &RasterImage, ctx: &FilterContext) -> RasterImage {
  if !def.validate() {
    warn!("filter has an unresolvable primitive input; skipping filter");
    return source.clone();
  }
  if !ctx.region_device.is_valid() {
    // A collapsed filter region renders the target invisible.
    let mut empty = source.clone();
    empty.clear_outside(Rect::ZERO);
    return empty;
  }
  let region = ctx.region_device;
  let (scale_x, scale_y) = ctx.scale;

  // Distances in objectBoundingBox primitive units are fractions of the
  // bbox; in user units they only need the device scale.
  let distance = |value: (f32, f32)| -> (f32, f32) {
    match def.primitive_units {
      CoordUnits::UserSpace => (value.0 * scale_x, value.1 * scale_y),
      CoordUnits::ObjectBoundingBox => (
        value.0 * ctx.bbox.width() * scale_x,
        value.1 * ctx.bbox.height() * scale_y,
      ),
    }
  };

  let mut source_clipped = source.clone();
  source_clipped.clear_outside(region);
  let source_alpha = source_clipped.to_alpha_only();

  let mut results: FxHashMap<&str, RasterImage> = FxHashMap::default();
  let mut current = source_clipped.clone();

  for step in &def.steps {
    let resolve = |input: &FilterInput| -> RasterImage {
      match input {
        FilterInput::SourceGraphic => source_clipped.clone(),
        FilterInput::SourceAlpha => source_alpha.clone(),
        FilterInput::Previous => current.clone(),
        FilterInput::Reference(name) => results
          .get(name.as_str())
          .cloned()
          // validate() guarantees presence; keep a defined fallback anyway.
          .unwrap_or_else(|| source_clipped.clone()),
      }
    };

    let mut output = match &step.primitive {
      FilterPrimitive::Flood { color, opacity } => {
        primitives::flood(source.width(), source.height(), *color, *opacity, region)
      }
      FilterPrimitive::GaussianBlur { input, std_dev } => {
        let mut img = resolve(input);
        let (sx, sy) = distance(*std_dev);
        blur::gaussian_blur(&mut img, sx, sy);
        img
      }
      FilterPrimitive::Offset { input, dx, dy } => {
        let (dx, dy) = distance((*dx, *dy));
        resolve(input).translated(dx.round() as i32, dy.round() as i32)
      }
      FilterPrimitive::ColorMatrix { input, kind } => {
        let mut img = resolve(input);
        primitives::color_matrix(&mut img, kind);
        img
      }
      FilterPrimitive::Composite {
        input1,
        input2,
        operator,
      } => primitives::composite(&resolve(input1), &resolve(input2), *operator),
      FilterPrimitive::Merge { inputs } => {
        let mut acc = match RasterImage::new(source.width(), source.height()) {
          Ok(img) => img,
          Err(_) => current.clone(),
        };
        for input in inputs {
          acc.composite_over(&resolve(input));
        }
        acc
      }
      FilterPrimitive::Morphology {
        input,
        operator,
        radius,
      } => {
        let mut img = resolve(input);
        let (rx, ry) = distance(*radius);
        primitives::morphology(&mut img, *operator, rx, ry);
        img
      }
      FilterPrimitive::Blend {
        input1,
        input2,
        mode,
      } => primitives::blend(&resolve(input1), &resolve(input2), *mode),
      FilterPrimitive::DropShadow {
        input,
        dx,
        dy,
        std_dev,
        color,
        opacity,
      } => {
        let img = resolve(input);
        let (dx, dy) = distance((*dx, *dy));
        let (sx, sy) = distance(*std_dev);
        primitives::drop_shadow(
          &img,
          dx.round() as i32,
          dy.round() as i32,
          (sx, sy),
          *color,
          *opacity,
        )
      }
    };

    output.clear_outside(region);
    if let Some(name) = &step.result {
      results.insert(name.as_str(), output.clone());
    }
    current = output;
  }

  current
}
