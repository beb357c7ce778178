//! Paint resolution
//!
//! Maps abstract paint references (solid colors, gradient and pattern
//! ids) to concrete [`PaintSource`]s the canvas can draw with. Gradient
//! stops are normalized here — offsets clamped into [0,1] and forced
//! non-decreasing — and the degenerate forms collapse the way the
//! processing model requires: no stops paint nothing, a single effective
//! stop paints a solid, a zero-length axis paints the last stop's color.
//!
//! Pattern tiles are rendered on demand through a recursive sub-render
//! scoped to the tile's own coordinate system.

use crate::canvas::{
  GradientStop, LinearGradientSource, PaintSource, PatternSource, RadialGradientSource,
};
use crate::geometry::{Point, Rect, Size, Transform};
use crate::render::context::CoordSpace;
use crate::render::RenderPass;
use crate::style::{Paint, Rgba, StyleState};
use crate::tree::{
  CoordUnits, LinearGradientDef, NodeKind, PatternDef, RadialGradientDef, StopDef,
};
use crate::units::{LengthAxis, LengthContext};
use log::warn;

/// Largest pattern tile surface we will rasterize, per axis.
const MAX_PATTERN_TILE_PX: f32 = 4096.0;

/// Normalized stops: offsets clamped to [0,1] and monotonically
/// non-decreasing (each offset is forced up to its predecessor), colors
/// carrying stop-opacity and the channel opacity.
fn normalize_stops(stops: &[StopDef], channel_opacity: f32) -> Vec<GradientStop> {
  let mut previous = 0.0f32;
  stops
    .iter()
    .map(|stop| {
      let mut offset = if stop.offset.is_finite() {
        stop.offset.clamp(0.0, 1.0)
      } else {
        0.0
      };
      offset = offset.max(previous);
      previous = offset;
      let opacity = if stop.opacity.is_finite() {
        stop.opacity.clamp(0.0, 1.0)
      } else {
        1.0
      };
      GradientStop::new(offset, stop.color.with_alpha_scaled(opacity * channel_opacity))
    })
    .collect()
}

/// Collapsed view of a normalized stop list.
enum StopProfile {
  Empty,
  /// All offsets coincide; the last stop wins.
  Single(Rgba),
  Gradient,
}

fn stop_profile(stops: &[GradientStop]) -> StopProfile {
  match stops {
    [] => StopProfile::Empty,
    [only] => StopProfile::Single(only.color),
    [first, .., last] => {
      if (last.offset - first.offset).abs() < f32::EPSILON {
        StopProfile::Single(last.color)
      } else {
        StopProfile::Gradient
      }
    }
  }
}

/// The mapping from gradient coordinates into user space.
///
/// Object-bounding-box units express geometry in the unit square and rely
/// on this transform to place it; a degenerate bounding box therefore
/// disables the paint entirely.
fn units_transform(
  units: CoordUnits,
  gradient_transform: Transform,
  bbox: Option<Rect>,
) -> Option<Transform> {
  match units {
    CoordUnits::UserSpace => Some(gradient_transform),
    CoordUnits::ObjectBoundingBox => {
      let bbox = bbox.filter(|b| b.is_valid())?;
      let to_bbox = Transform::from_translate(bbox.x(), bbox.y())
        .pre_scale(bbox.width(), bbox.height());
      Some(to_bbox.pre_concat(gradient_transform))
    }
  }
}

fn resolve_pair(
  x: crate::units::Length,
  y: crate::units::Length,
  units: CoordUnits,
  ctx: &LengthContext,
) -> Point {
  match units {
    CoordUnits::ObjectBoundingBox => Point::new(x.resolve_fraction(), y.resolve_fraction()),
    CoordUnits::UserSpace => Point::new(
      x.resolve(LengthAxis::Horizontal, ctx),
      y.resolve(LengthAxis::Vertical, ctx),
    ),
  }
}

impl<'a> RenderPass<'a> {
  /// Resolves a paint reference for one channel.
  ///
  /// `None` means "draw nothing on this channel" — the documented
  /// degradation for missing paints, unresolvable references and
  /// degenerate geometry.
  pub(crate) fn resolve_paint(
    &mut self,
    paint: &Paint,
    style: &StyleState,
    channel_opacity: f32,
    bbox: Option<Rect>,
    space: CoordSpace,
  ) -> Option<PaintSource> {
    match paint {
      Paint::None => None,
      Paint::Color(color) => Some(PaintSource::Solid(color.with_alpha_scaled(channel_opacity))),
      // Context paints are resolved by the caller against the style
      // snapshot; reaching here means no context was captured.
      Paint::ContextFill | Paint::ContextStroke => None,
      Paint::Ref(id) => {
        let doc = self.doc;
        let Some(node_id) = doc.node_by_id(id) else {
          warn!("paint references unknown id '{id}'");
          return None;
        };
        match &doc.get(node_id).kind {
          NodeKind::LinearGradient(def) => {
            self.resolve_linear_gradient(def, style, channel_opacity, bbox, space)
          }
          NodeKind::RadialGradient(def) => {
            self.resolve_radial_gradient(def, style, channel_opacity, bbox, space)
          }
          NodeKind::Pattern(def) => {
            self.resolve_pattern(def, node_id, style, channel_opacity, bbox, space)
          }
          _ => {
            warn!("'{id}' does not reference a paint server");
            None
          }
        }
      }
    }
  }

  fn resolve_linear_gradient(
    &mut self,
    def: &LinearGradientDef,
    style: &StyleState,
    channel_opacity: f32,
    bbox: Option<Rect>,
    space: CoordSpace,
  ) -> Option<PaintSource> {
    let stops = normalize_stops(&def.stops, channel_opacity);
    match stop_profile(&stops) {
      StopProfile::Empty => None,
      StopProfile::Single(color) => Some(PaintSource::Solid(color)),
      StopProfile::Gradient => {
        let transform = units_transform(def.units, def.transform, bbox)?;
        let ctx = space.length_ctx(style.font_size);
        let start = resolve_pair(def.x1, def.y1, def.units, &ctx);
        let end = resolve_pair(def.x2, def.y2, def.units, &ctx);
        if !start.is_finite() || !end.is_finite() {
          return None;
        }
        // A zero-length axis is a solid fill of the final stop.
        if start.distance_to(end) < f32::EPSILON {
          let last = stops.last()?;
          return Some(PaintSource::Solid(last.color));
        }
        Some(PaintSource::LinearGradient(LinearGradientSource {
          start,
          end,
          stops,
          spread: def.spread,
          transform,
        }))
      }
    }
  }

  fn resolve_radial_gradient(
    &mut self,
    def: &RadialGradientDef,
    style: &StyleState,
    channel_opacity: f32,
    bbox: Option<Rect>,
    space: CoordSpace,
  ) -> Option<PaintSource> {
    let stops = normalize_stops(&def.stops, channel_opacity);
    match stop_profile(&stops) {
      StopProfile::Empty => None,
      StopProfile::Single(color) => Some(PaintSource::Solid(color)),
      StopProfile::Gradient => {
        let transform = units_transform(def.units, def.transform, bbox)?;
        let ctx = space.length_ctx(style.font_size);
        let center = resolve_pair(def.cx, def.cy, def.units, &ctx);
        let radius = match def.units {
          CoordUnits::ObjectBoundingBox => def.r.resolve_fraction(),
          CoordUnits::UserSpace => def.r.resolve(LengthAxis::Other, &ctx),
        };
        if !center.is_finite() || !radius.is_finite() {
          return None;
        }
        if radius <= 0.0 {
          let last = stops.last()?;
          return Some(PaintSource::Solid(last.color));
        }
        let focal = match (def.fx, def.fy) {
          (None, None) => center,
          (fx, fy) => {
            let fx = fx.unwrap_or(def.cx);
            let fy = fy.unwrap_or(def.cy);
            resolve_pair(fx, fy, def.units, &ctx)
          }
        };
        Some(PaintSource::RadialGradient(RadialGradientSource {
          center,
          focal,
          radius,
          stops,
          spread: def.spread,
          transform,
        }))
      }
    }
  }

  /// Renders the pattern's content once into an offscreen tile and wraps
  /// it as a repeating paint.
  fn resolve_pattern(
    &mut self,
    def: &PatternDef,
    pattern_id: crate::tree::NodeId,
    style: &StyleState,
    channel_opacity: f32,
    bbox: Option<Rect>,
    space: CoordSpace,
  ) -> Option<PaintSource> {
    let ctx = space.length_ctx(style.font_size);
    let tile = match def.units {
      CoordUnits::ObjectBoundingBox => {
        let bbox = bbox.filter(|b| b.is_valid())?;
        Rect::from_xywh(
          bbox.x() + def.x.resolve_fraction() * bbox.width(),
          bbox.y() + def.y.resolve_fraction() * bbox.height(),
          def.width.resolve_fraction() * bbox.width(),
          def.height.resolve_fraction() * bbox.height(),
        )
      }
      CoordUnits::UserSpace => Rect::from_xywh(
        def.x.resolve(LengthAxis::Horizontal, &ctx),
        def.y.resolve(LengthAxis::Vertical, &ctx),
        def.width.resolve(LengthAxis::Horizontal, &ctx),
        def.height.resolve(LengthAxis::Vertical, &ctx),
      ),
    };
    if !tile.is_valid() {
      return None;
    }

    // Cycle protection: a pattern whose content paints with itself would
    // otherwise recurse forever.
    if !self.guard.enter(pattern_id) {
      warn!("pattern reference cycle detected; dropping paint");
      return None;
    }
    let source = self.render_pattern_tile(def, pattern_id, tile, channel_opacity, bbox, space);
    self.guard.exit(pattern_id);
    source
  }

  fn render_pattern_tile(
    &mut self,
    def: &PatternDef,
    pattern_id: crate::tree::NodeId,
    tile: Rect,
    channel_opacity: f32,
    bbox: Option<Rect>,
    space: CoordSpace,
  ) -> Option<PaintSource> {
    let (scale_x, scale_y) = space.transform.scale_factors();
    let tile_w = (tile.width() * scale_x).ceil().clamp(1.0, MAX_PATTERN_TILE_PX);
    let tile_h = (tile.height() * scale_y).ceil().clamp(1.0, MAX_PATTERN_TILE_PX);
    let mut canvas = match self.factory.create(tile_w as u32, tile_h as u32) {
      Ok(canvas) => canvas,
      Err(err) => {
        warn!("pattern tile surface creation failed: {err}");
        return None;
      }
    };

    // Tile pixels per content unit.
    let mut content = Transform::from_scale(tile_w / tile.width(), tile_h / tile.height());
    let viewport = match def.view_box {
      Some(vb) => {
        content = content.pre_concat(crate::render::context::view_box_transform(
          vb,
          def.aspect,
          tile.width(),
          tile.height(),
        ));
        Size::new(vb.width, vb.height)
      }
      None => {
        // Without a viewBox, bounding-box content units make the tile
        // content a fraction of the referencing element's box.
        if def.content_units == CoordUnits::ObjectBoundingBox {
          let bbox = bbox.filter(|b| b.is_valid())?;
          content = content.pre_concat(Transform::from_scale(bbox.width(), bbox.height()));
        }
        Size::new(tile.width(), tile.height())
      }
    };
    let tile_space = CoordSpace::new(content, viewport);

    // Pattern content styles cascade from a fresh default snapshot plus
    // the pattern element's own declarations, not from the referencing
    // element.
    let doc = self.doc;
    let base = StyleState::default();
    let tile_ctx = tile_space.length_ctx(base.font_size);
    let tile_style = base.cascade(&doc.get(pattern_id).style, &tile_ctx);
    self.render_children(canvas.as_mut(), tile_space, &tile_style, pattern_id);

    let mut image = canvas.into_image();
    image.scale_alpha(channel_opacity);

    // Maps tile pixels back into user space, then applies the pattern's
    // own transform.
    let placement = def
      .transform
      .pre_concat(Transform::from_translate(tile.x(), tile.y()))
      .pre_concat(Transform::from_scale(
        tile.width() / tile_w,
        tile.height() / tile_h,
      ));
    Some(PaintSource::Pattern(PatternSource {
      tile: image,
      transform: placement,
    }))
  }
}
