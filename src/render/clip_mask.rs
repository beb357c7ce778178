//! Clip-path and mask evaluation
//!
//! Clip paths contribute geometry only: every shape reachable from the
//! clip definition (directly, through groups, or through `use`) is
//! collected into one coverage region, each with its own fill rule, and
//! the canvas intersects that coverage with its clip stack while the
//! clipped subtree paints.
//!
//! Masks are full colored sub-renders: the mask content is drawn into an
//! offscreen surface, restricted to the mask region, and reduced to a
//! per-pixel luminance-times-alpha multiplier applied to the masked
//! group's buffer.
//!
//! Missing and self-referential clip or mask references are treated as
//! absent, never as errors.

use crate::canvas::{ClipEntry, ClipRegion, RasterImage};
use crate::geometry::{Rect, Transform};
use crate::render::context::CoordSpace;
use crate::render::{shape_to_path, RenderPass};
use crate::style::StyleState;
use crate::tree::{CoordUnits, NodeId, NodeKind};
use crate::units::{LengthAxis, LengthContext};
use log::warn;

impl<'a> RenderPass<'a> {
  /// Resolves a clip-path reference into a clip region.
  ///
  /// Returns `None` when the reference is missing, ill-kinded or cyclic —
  /// the target then renders as if no clip-path were declared. A resolved
  /// but geometrically empty clip region is returned as-is and clips
  /// everything away.
  pub(crate) fn resolve_clip(
    &mut self,
    clip_ref: &str,
    target: NodeId,
    space: CoordSpace,
    style: &StyleState,
  ) -> Option<ClipRegion> {
    let doc = self.doc;
    let Some(clip_id) = doc.node_by_id(clip_ref) else {
      warn!("clip-path references unknown id '{clip_ref}'");
      return None;
    };
    let NodeKind::ClipPath(def) = &doc.get(clip_id).kind else {
      warn!("'{clip_ref}' is not a clip-path definition");
      return None;
    };
    if !self.guard.enter(clip_id) {
      warn!("clip-path '{clip_ref}' references itself; ignoring clip");
      return None;
    }

    let ctx = space.length_ctx(style.font_size);
    let base = match def.units {
      CoordUnits::UserSpace => Some(space.transform),
      CoordUnits::ObjectBoundingBox => self
        .node_bbox(target, &ctx)
        .filter(|b| b.is_valid())
        .map(|bbox| {
          space
            .transform
            .pre_concat(Transform::from_translate(bbox.x(), bbox.y()))
            .pre_concat(Transform::from_scale(bbox.width(), bbox.height()))
        }),
    };

    let region = base.map(|base| {
      let mut entries = Vec::new();
      self.collect_clip_entries(clip_id, base, &ctx, &mut entries, 0);
      ClipRegion::new(entries)
    });
    self.guard.exit(clip_id);
    // Bounding-box units against empty geometry clip everything.
    Some(region.unwrap_or_default())
  }

  /// Collects shapes reachable from a clip definition, geometry only.
  fn collect_clip_entries(
    &mut self,
    parent: NodeId,
    base: Transform,
    ctx: &LengthContext,
    entries: &mut Vec<ClipEntry>,
    depth: usize,
  ) {
    if depth > crate::render::context::MAX_RENDER_DEPTH {
      return;
    }
    let doc = self.doc;
    for &child in doc.get(parent).children() {
      let node = doc.get(child);
      let transform = base.pre_concat(node.transform);
      match &node.kind {
        NodeKind::Shape(shape) => {
          if let Some(path) = shape_to_path(shape, ctx) {
            entries.push(ClipEntry {
              path,
              rule: node.style.fill_rule.unwrap_or_default(),
              transform,
            });
          }
        }
        NodeKind::Group => {
          self.collect_clip_entries(child, transform, ctx, entries, depth + 1);
        }
        NodeKind::Use(use_node) => {
          let Some(target) = doc.node_by_id(&use_node.href) else {
            continue;
          };
          if !self.guard.enter(target) {
            warn!("cyclic use inside clip-path; skipping reference");
            continue;
          }
          let offset = transform.pre_concat(Transform::from_translate(
            use_node.x.resolve(LengthAxis::Horizontal, ctx),
            use_node.y.resolve(LengthAxis::Vertical, ctx),
          ));
          let target_node = doc.get(target);
          let target_transform = offset.pre_concat(target_node.transform);
          if let NodeKind::Shape(shape) = &target_node.kind {
            if let Some(path) = shape_to_path(shape, ctx) {
              entries.push(ClipEntry {
                path,
                rule: target_node.style.fill_rule.unwrap_or_default(),
                transform: target_transform,
              });
            }
          } else if matches!(target_node.kind, NodeKind::Group) {
            self.collect_clip_entries(target, target_transform, ctx, entries, depth + 1);
          }
          self.guard.exit(target);
        }
        // Paints, text and other content are meaningless in a clip.
        _ => {}
      }
    }
  }

  /// Applies a mask reference to a transparency-group buffer in place.
  ///
  /// Missing, ill-kinded and self-referential masks leave the buffer
  /// untouched.
  pub(crate) fn apply_mask(
    &mut self,
    mask_ref: &str,
    image: &mut RasterImage,
    target: NodeId,
    space: CoordSpace,
    style: &StyleState,
  ) {
    let doc = self.doc;
    let Some(mask_id) = doc.node_by_id(mask_ref) else {
      warn!("mask references unknown id '{mask_ref}'");
      return;
    };
    let NodeKind::Mask(def) = &doc.get(mask_id).kind else {
      warn!("'{mask_ref}' is not a mask definition");
      return;
    };
    if !self.guard.enter(mask_id) {
      warn!("mask '{mask_ref}' references itself; ignoring mask");
      return;
    }

    let ctx = space.length_ctx(style.font_size);
    let bbox = self.node_bbox(target, &ctx);

    // The mask region limits where the mask lets anything through.
    let region = match def.units {
      CoordUnits::ObjectBoundingBox => bbox.filter(|b| b.is_valid()).map(|b| {
        Rect::from_xywh(
          b.x() + def.x.resolve_fraction() * b.width(),
          b.y() + def.y.resolve_fraction() * b.height(),
          def.width.resolve_fraction() * b.width(),
          def.height.resolve_fraction() * b.height(),
        )
      }),
      CoordUnits::UserSpace => Some(Rect::from_xywh(
        def.x.resolve(LengthAxis::Horizontal, &ctx),
        def.y.resolve(LengthAxis::Vertical, &ctx),
        def.width.resolve(LengthAxis::Horizontal, &ctx),
        def.height.resolve(LengthAxis::Vertical, &ctx),
      )),
    };
    let Some(region) = region.filter(|r| r.is_valid()) else {
      // Empty region: nothing survives the mask.
      image.clear_outside(Rect::ZERO);
      self.guard.exit(mask_id);
      return;
    };

    let content_transform = match def.content_units {
      CoordUnits::UserSpace => space.transform,
      CoordUnits::ObjectBoundingBox => match bbox.filter(|b| b.is_valid()) {
        Some(b) => space
          .transform
          .pre_concat(Transform::from_translate(b.x(), b.y()))
          .pre_concat(Transform::from_scale(b.width(), b.height())),
        None => {
          image.clear_outside(Rect::ZERO);
          self.guard.exit(mask_id);
          return;
        }
      },
    };

    let mut canvas = match self.factory.create(image.width(), image.height()) {
      Ok(canvas) => canvas,
      Err(err) => {
        warn!("mask surface creation failed: {err}; ignoring mask");
        self.guard.exit(mask_id);
        return;
      }
    };
    let mask_space = CoordSpace::new(content_transform, space.viewport);
    let base = StyleState::default();
    let mask_style = base.cascade(&doc.get(mask_id).style, &ctx);
    self.render_children(canvas.as_mut(), mask_space, &mask_style, mask_id);

    let mut mask_image = canvas.into_image();
    mask_image.clear_outside(space.transform.map_rect(region));
    let factors = mask_image.luminance_alpha();
    image.multiply_alpha(&factors);
    self.guard.exit(mask_id);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::canvas::SoftwareCanvasFactory;
  use crate::geometry::Size;
  use crate::render::context::RecursionGuard;
  use crate::style::FillRule;
  use crate::tree::{ClipPathDef, DocumentBuilder, NodeData, Shape};
  use crate::units::Length;

  fn rect_shape(x: f32, y: f32, w: f32, h: f32) -> NodeKind {
    NodeKind::Shape(Shape::Rect {
      x: Length::px(x),
      y: Length::px(y),
      width: Length::px(w),
      height: Length::px(h),
      rx: None,
      ry: None,
    })
  }

  fn space() -> CoordSpace {
    CoordSpace::new(Transform::identity(), Size::new(100.0, 100.0))
  }

  #[test]
  fn missing_clip_reference_resolves_to_none() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let target = builder.append(root, NodeData::new(rect_shape(0.0, 0.0, 10.0, 10.0)));
    let doc = builder.finish();
    let mut pass = RenderPass {
      doc: &doc,
      factory: &SoftwareCanvasFactory,
      guard: RecursionGuard::new(),
    };
    assert!(pass
      .resolve_clip("nope", target, space(), &StyleState::default())
      .is_none());
  }

  #[test]
  fn non_clip_reference_resolves_to_none() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let target = builder.append(
      root,
      NodeData::new(rect_shape(0.0, 0.0, 10.0, 10.0)).with_id("shape"),
    );
    let doc = builder.finish();
    let mut pass = RenderPass {
      doc: &doc,
      factory: &SoftwareCanvasFactory,
      guard: RecursionGuard::new(),
    };
    assert!(pass
      .resolve_clip("shape", target, space(), &StyleState::default())
      .is_none());
  }

  #[test]
  fn clip_collects_shape_geometry_and_fill_rules() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let clip = builder.append(
      root,
      NodeData::new(NodeKind::ClipPath(ClipPathDef::default())).with_id("clip"),
    );
    builder.append(clip, NodeData::new(rect_shape(0.0, 0.0, 5.0, 5.0)));
    let mut circle_style = crate::style::NodeStyle::default();
    circle_style.fill_rule = Some(FillRule::EvenOdd);
    builder.append(
      clip,
      NodeData::new(NodeKind::Shape(Shape::Circle {
        cx: Length::px(5.0),
        cy: Length::px(5.0),
        r: Length::px(2.0),
      }))
      .with_style(circle_style),
    );
    let target = builder.append(root, NodeData::new(rect_shape(0.0, 0.0, 10.0, 10.0)));
    let doc = builder.finish();
    let mut pass = RenderPass {
      doc: &doc,
      factory: &SoftwareCanvasFactory,
      guard: RecursionGuard::new(),
    };
    let region = pass
      .resolve_clip("clip", target, space(), &StyleState::default())
      .unwrap();
    assert_eq!(region.entries.len(), 2);
    assert_eq!(region.entries[0].rule, FillRule::NonZero);
    assert_eq!(region.entries[1].rule, FillRule::EvenOdd);
  }

  #[test]
  fn bounding_box_clip_maps_unit_square() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let clip = builder.append(
      root,
      NodeData::new(NodeKind::ClipPath(ClipPathDef {
        units: CoordUnits::ObjectBoundingBox,
      }))
      .with_id("clip"),
    );
    // Left half of the unit square.
    builder.append(clip, NodeData::new(rect_shape(0.0, 0.0, 0.5, 1.0)));
    let target = builder.append(root, NodeData::new(rect_shape(10.0, 10.0, 20.0, 20.0)));
    let doc = builder.finish();
    let mut pass = RenderPass {
      doc: &doc,
      factory: &SoftwareCanvasFactory,
      guard: RecursionGuard::new(),
    };
    let region = pass
      .resolve_clip("clip", target, space(), &StyleState::default())
      .unwrap();
    assert_eq!(region.entries.len(), 1);
    let mapped = region.entries[0]
      .transform
      .map_rect(region.entries[0].path.bounds().unwrap());
    assert_eq!(mapped, Rect::from_xywh(10.0, 10.0, 10.0, 20.0));
  }

  #[test]
  fn mask_with_unknown_reference_is_ignored() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let target = builder.append(root, NodeData::new(rect_shape(0.0, 0.0, 4.0, 4.0)));
    let doc = builder.finish();
    let mut pass = RenderPass {
      doc: &doc,
      factory: &SoftwareCanvasFactory,
      guard: RecursionGuard::new(),
    };
    let mut image = RasterImage::from_packed_rgba(2, 2, &[0xffff_ffff; 4]).unwrap();
    let before = image.clone();
    pass.apply_mask("nope", &mut image, target, space(), &StyleState::default());
    assert_eq!(image, before);
  }
}
