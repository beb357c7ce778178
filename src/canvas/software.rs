//! Software canvas backend over tiny-skia
//!
//! Implements the [`Canvas`] capability with a CPU rasterizer. One
//! [`SoftwareCanvas`] owns one pixmap plus a stack of clip masks and a
//! stack of layer surfaces; layers swap the active pixmap so draw calls
//! never need to know whether they target the root surface or a
//! transparency group.
//!
//! Pixel-buffer allocations are guarded (zero dimensions, size overflow,
//! byte cap, fallible reservation) before any surface is constructed, so
//! pathological documents fail with a descriptive error instead of
//! aborting the process.

use crate::canvas::image::{guard_dimensions, RasterImage};
use crate::canvas::{
  Canvas, CanvasFactory, ClipRegion, PaintSource, PathData, PathSegment, SpreadMethod,
};
use crate::error::CanvasError;
use crate::geometry::Transform;
use crate::style::{FillRule, LineCap, LineJoin, Rgba, StrokeStyle};
use tiny_skia::{
  FilterQuality, GradientStop as SkiaGradientStop, IntSize, Mask, MaskType, Paint, PathBuilder,
  Pixmap, PixmapPaint, Stroke, StrokeDash,
};

/// Allocates a pixmap behind the same guards as [`RasterImage::new`].
fn new_pixmap(width: u32, height: u32) -> Result<Pixmap, CanvasError> {
  let bytes = guard_dimensions(width, height)?;
  let mut buffer = Vec::new();
  buffer
    .try_reserve_exact(bytes)
    .map_err(|err| CanvasError::AllocationFailed {
      message: err.to_string(),
    })?;
  buffer.resize(bytes, 0);
  let size = IntSize::from_wh(width, height).ok_or(CanvasError::Backend {
    message: format!("pixmap dimensions out of range ({width}x{height})"),
  })?;
  Pixmap::from_vec(buffer, size).ok_or(CanvasError::Backend {
    message: format!("pixmap creation failed for {width}x{height}"),
  })
}

fn to_skia_transform(t: Transform) -> tiny_skia::Transform {
  tiny_skia::Transform::from_row(t.sx, t.ky, t.kx, t.sy, t.tx, t.ty)
}

fn to_skia_fill_rule(rule: FillRule) -> tiny_skia::FillRule {
  match rule {
    FillRule::NonZero => tiny_skia::FillRule::Winding,
    FillRule::EvenOdd => tiny_skia::FillRule::EvenOdd,
  }
}

fn to_skia_spread(spread: SpreadMethod) -> tiny_skia::SpreadMode {
  match spread {
    SpreadMethod::Pad => tiny_skia::SpreadMode::Pad,
    SpreadMethod::Repeat => tiny_skia::SpreadMode::Repeat,
    SpreadMethod::Reflect => tiny_skia::SpreadMode::Reflect,
  }
}

fn to_skia_color(color: Rgba) -> tiny_skia::Color {
  tiny_skia::Color::from_rgba8(color.r, color.g, color.b, color.alpha_u8())
}

fn to_skia_path(path: &PathData) -> Option<tiny_skia::Path> {
  let mut pb = PathBuilder::new();
  for seg in path.segments() {
    match *seg {
      PathSegment::MoveTo(p) => pb.move_to(p.x, p.y),
      PathSegment::LineTo(p) => pb.line_to(p.x, p.y),
      PathSegment::QuadTo(c, p) => pb.quad_to(c.x, c.y, p.x, p.y),
      PathSegment::CubicTo(c1, c2, p) => pb.cubic_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y),
      PathSegment::Close => pb.close(),
    }
  }
  pb.finish()
}

fn to_skia_stroke(stroke: &StrokeStyle) -> Stroke {
  Stroke {
    width: stroke.width,
    miter_limit: stroke.miter_limit,
    line_cap: match stroke.cap {
      LineCap::Butt => tiny_skia::LineCap::Butt,
      LineCap::Round => tiny_skia::LineCap::Round,
      LineCap::Square => tiny_skia::LineCap::Square,
    },
    line_join: match stroke.join {
      LineJoin::Miter => tiny_skia::LineJoin::Miter,
      LineJoin::Round => tiny_skia::LineJoin::Round,
      LineJoin::Bevel => tiny_skia::LineJoin::Bevel,
    },
    dash: stroke
      .dash
      .as_ref()
      .and_then(|(array, offset)| StrokeDash::new(array.clone(), *offset)),
  }
}

fn gradient_stops(stops: &[crate::canvas::GradientStop]) -> Vec<SkiaGradientStop> {
  stops
    .iter()
    .map(|stop| SkiaGradientStop::new(stop.offset, to_skia_color(stop.color)))
    .collect()
}

fn image_to_pixmap(image: &RasterImage) -> Option<Pixmap> {
  let size = IntSize::from_wh(image.width(), image.height())?;
  Pixmap::from_vec(image.data().to_vec(), size)
}

/// Builds a backend paint for a resolved paint source.
///
/// Returns `None` for paints the backend cannot represent (degenerate
/// gradient geometry that slipped past the resolver, unmappable tiles);
/// callers skip the draw, matching the no-paint degradation policy.
fn to_skia_paint<'a>(
  source: &PaintSource,
  tile_pixmap: &'a Option<Pixmap>,
) -> Option<Paint<'a>> {
  let mut paint = Paint {
    anti_alias: true,
    ..Paint::default()
  };
  match source {
    PaintSource::Solid(color) => {
      paint.set_color_rgba8(color.r, color.g, color.b, color.alpha_u8());
    }
    PaintSource::LinearGradient(gradient) => {
      let shader = tiny_skia::LinearGradient::new(
        tiny_skia::Point::from_xy(gradient.start.x, gradient.start.y),
        tiny_skia::Point::from_xy(gradient.end.x, gradient.end.y),
        gradient_stops(&gradient.stops),
        to_skia_spread(gradient.spread),
        to_skia_transform(gradient.transform),
      )?;
      paint.shader = shader;
    }
    PaintSource::RadialGradient(gradient) => {
      let shader = tiny_skia::RadialGradient::new(
        tiny_skia::Point::from_xy(gradient.focal.x, gradient.focal.y),
        tiny_skia::Point::from_xy(gradient.center.x, gradient.center.y),
        gradient.radius,
        gradient_stops(&gradient.stops),
        to_skia_spread(gradient.spread),
        to_skia_transform(gradient.transform),
      )?;
      paint.shader = shader;
    }
    PaintSource::Pattern(pattern) => {
      let pixmap = tile_pixmap.as_ref()?;
      paint.shader = tiny_skia::Pattern::new(
        pixmap.as_ref(),
        tiny_skia::SpreadMode::Repeat,
        FilterQuality::Bilinear,
        1.0,
        to_skia_transform(pattern.transform),
      );
    }
  }
  Some(paint)
}

/// Multiplies `into` by `existing`, the clip-stack intersection step.
fn combine_masks(into: &mut Mask, existing: &Mask) {
  if into.width() != existing.width() || into.height() != existing.height() {
    return;
  }
  for (dst, src) in into.data_mut().iter_mut().zip(existing.data().iter()) {
    *dst = ((*dst as u16 * *src as u16 + 127) / 255) as u8;
  }
}

/// The bundled CPU canvas.
///
/// The clip stack stores one entry per `push_clip`; a `None` entry marks
/// a degraded push (coverage surface allocation failed) that intersects
/// nothing, keeping push/pop balanced on every path.
pub struct SoftwareCanvas {
  pixmap: Pixmap,
  transform: Transform,
  clip_stack: Vec<Option<Mask>>,
  /// Parent surfaces saved while a transparency group is open.
  layer_stack: Vec<Pixmap>,
}

impl SoftwareCanvas {
  pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
    Ok(Self {
      pixmap: new_pixmap(width, height)?,
      transform: Transform::identity(),
      clip_stack: Vec::new(),
      layer_stack: Vec::new(),
    })
  }

  fn fill_or_stroke(
    &mut self,
    path: &PathData,
    paint_source: &PaintSource,
    rule: FillRule,
    stroke: Option<&StrokeStyle>,
  ) {
    let Some(skia_path) = to_skia_path(path) else {
      return;
    };
    let tile_pixmap = match paint_source {
      PaintSource::Pattern(pattern) => image_to_pixmap(&pattern.tile),
      _ => None,
    };
    let Some(paint) = to_skia_paint(paint_source, &tile_pixmap) else {
      return;
    };
    let transform = to_skia_transform(self.transform);
    match stroke {
      None => {
        self.pixmap.fill_path(
          &skia_path,
          &paint,
          to_skia_fill_rule(rule),
          transform,
          self.clip_stack.last().and_then(|m| m.as_ref()),
        );
      }
      Some(style) => {
        if style.width > 0.0 {
          self.pixmap.stroke_path(
            &skia_path,
            &paint,
            &to_skia_stroke(style),
            transform,
            self.clip_stack.last().and_then(|m| m.as_ref()),
          );
        }
      }
    }
  }
}

impl Canvas for SoftwareCanvas {
  fn width(&self) -> u32 {
    self.pixmap.width()
  }

  fn height(&self) -> u32 {
    self.pixmap.height()
  }

  fn clear(&mut self, color: Rgba) {
    self.pixmap.fill(to_skia_color(color));
  }

  fn set_transform(&mut self, transform: Transform) {
    self.transform = transform;
  }

  fn transform(&self) -> Transform {
    self.transform
  }

  fn fill_path(&mut self, path: &PathData, paint: &PaintSource, rule: FillRule) {
    self.fill_or_stroke(path, paint, rule, None);
  }

  fn stroke_path(&mut self, path: &PathData, paint: &PaintSource, stroke: &StrokeStyle) {
    self.fill_or_stroke(path, paint, FillRule::NonZero, Some(stroke));
  }

  fn draw_image(&mut self, image: &RasterImage, transform: Transform, opacity: f32) {
    let Some(pixmap) = image_to_pixmap(image) else {
      return;
    };
    let paint = PixmapPaint {
      opacity: opacity.clamp(0.0, 1.0),
      ..PixmapPaint::default()
    };
    self.pixmap.draw_pixmap(
      0,
      0,
      pixmap.as_ref(),
      &paint,
      to_skia_transform(transform),
      self.clip_stack.last().and_then(|m| m.as_ref()),
    );
  }

  fn push_clip(&mut self, region: &ClipRegion) {
    // Union the entries' coverage into one surface, then intersect with
    // the clip already in effect. An empty region clips everything away.
    let coverage = new_pixmap(self.pixmap.width(), self.pixmap.height());
    let mut coverage = match coverage {
      Ok(pixmap) => pixmap,
      Err(_) => {
        // Keep the stack balanced; an unreproducible coverage surface
        // degrades to the clip already in effect.
        let inherited = self.clip_stack.last().cloned().flatten();
        self.clip_stack.push(inherited);
        return;
      }
    };
    let mut white = Paint::default();
    white.set_color_rgba8(255, 255, 255, 255);
    white.anti_alias = true;
    for entry in &region.entries {
      if let Some(path) = to_skia_path(&entry.path) {
        coverage.fill_path(
          &path,
          &white,
          to_skia_fill_rule(entry.rule),
          to_skia_transform(entry.transform),
          None,
        );
      }
    }
    let mut mask = Mask::from_pixmap(coverage.as_ref(), MaskType::Alpha);
    if let Some(existing) = self.clip_stack.last().and_then(|m| m.as_ref()) {
      combine_masks(&mut mask, existing);
    }
    self.clip_stack.push(Some(mask));
  }

  fn pop_clip(&mut self) {
    self.clip_stack.pop();
  }

  fn push_layer(&mut self) -> Result<(), CanvasError> {
    let fresh = new_pixmap(self.pixmap.width(), self.pixmap.height())?;
    let parent = std::mem::replace(&mut self.pixmap, fresh);
    self.layer_stack.push(parent);
    Ok(())
  }

  fn pop_layer(&mut self) -> Option<RasterImage> {
    let parent = self.layer_stack.pop()?;
    let layer = std::mem::replace(&mut self.pixmap, parent);
    let (width, height) = (layer.width(), layer.height());
    Some(RasterImage::from_parts(width, height, layer.take()))
  }

  fn into_image(self: Box<Self>) -> RasterImage {
    let (width, height) = (self.pixmap.width(), self.pixmap.height());
    RasterImage::from_parts(width, height, self.pixmap.take())
  }
}

/// Factory for the bundled software backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareCanvasFactory;

impl CanvasFactory for SoftwareCanvasFactory {
  fn create(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, CanvasError> {
    Ok(Box::new(SoftwareCanvas::new(width, height)?))
  }
}
