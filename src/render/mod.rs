//! The rendering engine
//!
//! [`Renderer`] is the top-level entry point: it computes output
//! dimensions from the document's declared size / viewBox and an optional
//! caller override, allocates a canvas through the injected factory, and
//! drives a pre-order depth-first traversal of the tree.
//!
//! Per node the traversal:
//! 1. concatenates the node's transform into the coordinate context,
//! 2. cascades style into a fresh immutable snapshot,
//! 3. opens a transparency group when opacity, a filter or a mask demand
//!    atomic compositing,
//! 4. dispatches on the node kind (shapes paint fill-then-stroke, `use`
//!    inlines its target under cycle protection, nested viewports remap
//!    the coordinate context),
//! 5. applies filter → clip → mask → group opacity while compositing the
//!    group back into its parent.
//!
//! Reference errors never abort a render: a dangling or cyclic reference
//! degrades to its documented fallback and the traversal continues.

pub mod clip_mask;
pub mod context;
pub mod paint_server;

use crate::canvas::{Canvas, CanvasFactory, ClipEntry, ClipRegion, PathData, SoftwareCanvasFactory};
use crate::error::{CanvasError, Result};
use crate::filter::{self, FilterContext};
use crate::geometry::{Rect, Size, Transform};
use crate::style::{FillRule, Rgba, StyleState, Visibility};
use crate::tree::{
  Document, ImageNode, NodeData, NodeId, NodeKind, Shape, SvgNode, UseNode, ViewBox,
};
use crate::units::{LengthAxis, LengthContext};
use context::{view_box_transform, CoordSpace, RecursionGuard, MAX_RENDER_DEPTH};
use log::warn;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Fallback document extent when neither a size nor a viewBox is declared.
const DEFAULT_DOCUMENT_SIZE: f32 = 100.0;

/// Render configuration.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
  /// Explicit output size in pixels; overrides the document's own sizing
  /// and establishes a document-units → device-pixels scale.
  pub size: Option<(u32, u32)>,
  /// Optional opaque background; `None` renders over transparency.
  pub background: Option<Rgba>,
}

/// The rendered pixels plus their dimensions.
///
/// `pixels` is row-major, one `u32` per pixel with R in the low byte and
/// straight (non-premultiplied) alpha in the high byte.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
  pub width: u32,
  pub height: u32,
  pub pixels: Vec<u32>,
}

/// Renders documents to pixel buffers.
///
/// A renderer holds no per-document state: one instance can be reused
/// across documents, and independent renders never share a canvas.
pub struct Renderer {
  factory: Arc<dyn CanvasFactory>,
}

impl Default for Renderer {
  fn default() -> Self {
    Self::new()
  }
}

impl Renderer {
  /// A renderer backed by the bundled software rasterizer.
  pub fn new() -> Self {
    Self {
      factory: Arc::new(SoftwareCanvasFactory),
    }
  }

  /// A renderer drawing through a caller-provided canvas backend.
  pub fn with_factory(factory: Arc<dyn CanvasFactory>) -> Self {
    Self { factory }
  }

  pub fn render(&self, document: &Document) -> Result<RenderResult> {
    self.render_with_options(document, &RenderOptions::default())
  }

  pub fn render_with_options(
    &self,
    document: &Document,
    options: &RenderOptions,
  ) -> Result<RenderResult> {
    let user_size = document_user_size(document);
    let (width, height) = output_dimensions(document, options)?;

    let mut canvas = self.factory.create(width, height)?;
    if let Some(background) = options.background {
      canvas.clear(background);
    }

    let transform = root_transform(document, user_size, width, height);
    let space = CoordSpace::new(transform, user_size);
    let style = StyleState::default();
    let mut pass = RenderPass {
      doc: document,
      factory: self.factory.as_ref(),
      guard: RecursionGuard::new(),
    };
    pass.render_children(canvas.as_mut(), space, &style, document.root());

    let image = canvas.into_image();
    Ok(RenderResult {
      width,
      height,
      pixels: image.to_packed_rgba(),
    })
  }
}

/// User-space viewport extents of the document.
fn document_user_size(doc: &Document) -> Size {
  if let Some(vb) = doc.view_box {
    return Size::new(vb.width, vb.height);
  }
  declared_size(doc).unwrap_or(Size::new(DEFAULT_DOCUMENT_SIZE, DEFAULT_DOCUMENT_SIZE))
}

/// The document's declared absolute size, when it has one.
fn declared_size(doc: &Document) -> Option<Size> {
  let (width, height) = (doc.width?, doc.height?);
  if width.is_percent() || height.is_percent() {
    return None;
  }
  let ctx = LengthContext::new(
    Size::new(DEFAULT_DOCUMENT_SIZE, DEFAULT_DOCUMENT_SIZE),
    16.0,
  );
  let size = Size::new(
    width.resolve(LengthAxis::Horizontal, &ctx),
    height.resolve(LengthAxis::Vertical, &ctx),
  );
  if size.is_empty() {
    None
  } else {
    Some(size)
  }
}

fn output_dimensions(doc: &Document, options: &RenderOptions) -> Result<(u32, u32)> {
  let (width, height) = match options.size {
    Some(size) => size,
    None => {
      let size = declared_size(doc)
        .or_else(|| {
          doc
            .view_box
            .map(|vb| Size::new(vb.width, vb.height))
        })
        .unwrap_or(Size::new(DEFAULT_DOCUMENT_SIZE, DEFAULT_DOCUMENT_SIZE));
      (size.width.ceil() as u32, size.height.ceil() as u32)
    }
  };
  if width == 0 || height == 0 {
    return Err(CanvasError::ZeroArea { width, height }.into());
  }
  Ok((width, height))
}

/// Document units → device pixels for the root scope.
fn root_transform(doc: &Document, user_size: Size, width: u32, height: u32) -> Transform {
  if let Some(vb) = doc.view_box {
    return view_box_transform(vb, doc.aspect, width as f32, height as f32);
  }
  if user_size.is_empty() {
    return Transform::identity();
  }
  Transform::from_scale(
    width as f32 / user_size.width,
    height as f32 / user_size.height,
  )
}

/// Converts a shape's declared geometry into a user-space path.
///
/// Returns `None` for degenerate geometry (non-positive extents), which
/// simply renders nothing.
pub(crate) fn shape_to_path(shape: &Shape, ctx: &LengthContext) -> Option<PathData> {
  let path = match shape {
    Shape::Path(path) => path.clone(),
    Shape::Rect {
      x,
      y,
      width,
      height,
      rx,
      ry,
    } => {
      let w = width.resolve(LengthAxis::Horizontal, ctx);
      let h = height.resolve(LengthAxis::Vertical, ctx);
      if w <= 0.0 || h <= 0.0 {
        return None;
      }
      let rect = Rect::from_xywh(
        x.resolve(LengthAxis::Horizontal, ctx),
        y.resolve(LengthAxis::Vertical, ctx),
        w,
        h,
      );
      // A radius declared on one axis implies the other.
      let rx_resolved = rx.or(*ry).map(|r| r.resolve(LengthAxis::Horizontal, ctx));
      let ry_resolved = ry.or(*rx).map(|r| r.resolve(LengthAxis::Vertical, ctx));
      PathData::from_rect(
        rect,
        rx_resolved.unwrap_or(0.0).max(0.0),
        ry_resolved.unwrap_or(0.0).max(0.0),
      )
    }
    Shape::Circle { cx, cy, r } => {
      let radius = r.resolve(LengthAxis::Other, ctx);
      if radius <= 0.0 {
        return None;
      }
      PathData::from_circle(
        cx.resolve(LengthAxis::Horizontal, ctx),
        cy.resolve(LengthAxis::Vertical, ctx),
        radius,
      )
    }
    Shape::Ellipse { cx, cy, rx, ry } => {
      let rx = rx.resolve(LengthAxis::Horizontal, ctx);
      let ry = ry.resolve(LengthAxis::Vertical, ctx);
      if rx <= 0.0 || ry <= 0.0 {
        return None;
      }
      PathData::from_ellipse(
        cx.resolve(LengthAxis::Horizontal, ctx),
        cy.resolve(LengthAxis::Vertical, ctx),
        rx,
        ry,
      )
    }
    Shape::Line { x1, y1, x2, y2 } => PathData::from_line(
      x1.resolve(LengthAxis::Horizontal, ctx),
      y1.resolve(LengthAxis::Vertical, ctx),
      x2.resolve(LengthAxis::Horizontal, ctx),
      y2.resolve(LengthAxis::Vertical, ctx),
    ),
    Shape::Polyline { points } => PathData::from_polyline(points),
    Shape::Polygon { points } => PathData::from_polygon(points),
  };
  if path.is_empty() {
    None
  } else {
    Some(path)
  }
}

/// One render invocation's traversal state.
///
/// All mutation is confined to the canvas and this stack-scoped state;
/// nothing outlives the render call.
pub(crate) struct RenderPass<'a> {
  pub(crate) doc: &'a Document,
  pub(crate) factory: &'a dyn CanvasFactory,
  pub(crate) guard: RecursionGuard,
}

impl<'a> RenderPass<'a> {
  pub(crate) fn render_children(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    parent: NodeId,
  ) {
    let doc = self.doc;
    for &child in doc.get(parent).children() {
      self.render_node(canvas, space, style, child);
    }
  }

  pub(crate) fn render_node(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    id: NodeId,
  ) {
    let doc = self.doc;
    let node = doc.get(id);
    if node.kind.is_definition() {
      return;
    }
    if !self.guard.enter(id) {
      warn!(
        "skipping node{}: reference cycle or recursion deeper than {MAX_RENDER_DEPTH}",
        node
          .id
          .as_deref()
          .map(|i| format!(" '{i}'"))
          .unwrap_or_default()
      );
      return;
    }

    let space = space.with_node_transform(node.transform);
    let ctx = space.length_ctx(style.font_size);
    let style = style.cascade(&node.style, &ctx);
    let opacity = node.style.group_opacity();
    let needs_group = opacity < 1.0 || node.filter.is_some() || node.mask.is_some();

    if needs_group {
      self.render_group(canvas, space, &style, node, id, opacity);
    } else if let Some(clip_ref) = &node.clip_path {
      match self.resolve_clip(clip_ref, id, space, &style) {
        Some(region) => {
          canvas.push_clip(&region);
          self.render_kind(canvas, space, &style, id);
          canvas.pop_clip();
        }
        // Unresolvable clip reference: render as if none was declared.
        None => self.render_kind(canvas, space, &style, id),
      }
    } else {
      self.render_kind(canvas, space, &style, id);
    }

    self.guard.exit(id);
  }

  /// Renders a node into a transparency group and composites the group
  /// back with filter → clip → mask → opacity applied in that order.
  fn render_group(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    node: &NodeData,
    id: NodeId,
    opacity: f32,
  ) {
    if let Err(err) = canvas.push_layer() {
      warn!("cannot open transparency group: {err}; drawing without isolation");
      self.render_kind(canvas, space, style, id);
      return;
    }
    self.render_kind(canvas, space, style, id);
    let Some(mut image) = canvas.pop_layer() else {
      return;
    };

    if let Some(filter_ref) = &node.filter {
      image = self.apply_filter(filter_ref, image, id, space, style);
    }
    let clip = node
      .clip_path
      .as_ref()
      .and_then(|clip_ref| self.resolve_clip(clip_ref, id, space, style));
    if let Some(region) = &clip {
      canvas.push_clip(region);
    }
    if let Some(mask_ref) = &node.mask {
      self.apply_mask(mask_ref, &mut image, id, space, style);
    }
    canvas.draw_image(&image, Transform::identity(), opacity);
    if clip.is_some() {
      canvas.pop_clip();
    }
  }

  fn render_kind(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    id: NodeId,
  ) {
    let doc = self.doc;
    match &doc.get(id).kind {
      NodeKind::Group => self.render_children(canvas, space, style, id),
      NodeKind::Shape(shape) => self.render_shape(canvas, space, style, shape),
      NodeKind::Image(image) => self.render_image(canvas, space, style, image),
      NodeKind::Use(use_node) => self.render_use(canvas, space, style, use_node),
      NodeKind::Svg(svg) => self.render_svg(canvas, space, style, svg, id),
      // Definitions are filtered in render_node.
      _ => {}
    }
  }

  fn render_shape(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    shape: &Shape,
  ) {
    if style.visibility == Visibility::Hidden {
      return;
    }
    let ctx = space.length_ctx(style.font_size);
    let Some(path) = shape_to_path(shape, &ctx) else {
      return;
    };
    let bbox = path.bounds();

    canvas.set_transform(space.transform);

    // Fill under stroke.
    let fill = style.resolve_context(&style.fill);
    if let Some(source) = self.resolve_paint(&fill, style, style.fill_opacity, bbox, space) {
      canvas.fill_path(&path, &source, style.fill_rule);
    }
    let stroke = style.resolve_context(&style.stroke);
    if style.stroke_style.width > 0.0 {
      if let Some(source) = self.resolve_paint(&stroke, style, style.stroke_opacity, bbox, space)
      {
        canvas.stroke_path(&path, &source, &style.stroke_style);
      }
    }
  }

  fn render_image(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    node: &ImageNode,
  ) {
    if style.visibility == Visibility::Hidden {
      return;
    }
    let ctx = space.length_ctx(style.font_size);
    let intrinsic_w = node.image.width() as f32;
    let intrinsic_h = node.image.height() as f32;
    let x = node.x.resolve(LengthAxis::Horizontal, &ctx);
    let y = node.y.resolve(LengthAxis::Vertical, &ctx);
    let w = node
      .width
      .map(|len| len.resolve(LengthAxis::Horizontal, &ctx))
      .unwrap_or(intrinsic_w);
    let h = node
      .height
      .map(|len| len.resolve(LengthAxis::Vertical, &ctx))
      .unwrap_or(intrinsic_h);
    if w <= 0.0 || h <= 0.0 {
      return;
    }
    let Some(pixel_box) = ViewBox::new(0.0, 0.0, intrinsic_w, intrinsic_h) else {
      return;
    };
    let fit = view_box_transform(pixel_box, node.aspect, w, h);
    let transform = space
      .transform
      .pre_concat(Transform::from_translate(x, y))
      .pre_concat(fit);

    // The image viewport clips its content (visible with slice fitting).
    let viewport_path = PathData::from_rect(Rect::from_xywh(x, y, w, h), 0.0, 0.0);
    canvas.push_clip(&ClipRegion::new(vec![ClipEntry {
      path: viewport_path,
      rule: FillRule::NonZero,
      transform: space.transform,
    }]));
    canvas.draw_image(&node.image, transform, 1.0);
    canvas.pop_clip();
  }

  fn render_use(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    use_node: &UseNode,
  ) {
    let doc = self.doc;
    let Some(target) = doc.node_by_id(&use_node.href) else {
      warn!("use references unknown id '{}'", use_node.href);
      return;
    };
    let ctx = space.length_ctx(style.font_size);
    let offset = Transform::from_translate(
      use_node.x.resolve(LengthAxis::Horizontal, &ctx),
      use_node.y.resolve(LengthAxis::Vertical, &ctx),
    );
    let space = space.with_node_transform(offset);

    // The referencing element's paints become the context paints of the
    // inlined subtree.
    let mut style = style.clone();
    style.context_fill = style.resolve_context(&style.fill);
    style.context_stroke = style.resolve_context(&style.stroke);

    // Cycles are caught by render_node's guard: the target is already on
    // the active path when a chain loops back.
    self.render_node(canvas, space, &style, target);
  }

  fn render_svg(
    &mut self,
    canvas: &mut dyn Canvas,
    space: CoordSpace,
    style: &StyleState,
    svg: &SvgNode,
    id: NodeId,
  ) {
    let ctx = space.length_ctx(style.font_size);
    let x = svg.x.resolve(LengthAxis::Horizontal, &ctx);
    let y = svg.y.resolve(LengthAxis::Vertical, &ctx);
    let w = svg.width.resolve(LengthAxis::Horizontal, &ctx);
    let h = svg.height.resolve(LengthAxis::Vertical, &ctx);
    // A zero-extent viewport renders nothing.
    if w <= 0.0 || h <= 0.0 {
      return;
    }

    let viewport_path = PathData::from_rect(Rect::from_xywh(x, y, w, h), 0.0, 0.0);
    canvas.push_clip(&ClipRegion::new(vec![ClipEntry {
      path: viewport_path,
      rule: FillRule::NonZero,
      transform: space.transform,
    }]));

    let mut inner = space.with_node_transform(Transform::from_translate(x, y));
    inner.viewport = match svg.view_box {
      Some(vb) => {
        inner.transform = inner
          .transform
          .pre_concat(view_box_transform(vb, svg.aspect, w, h));
        Size::new(vb.width, vb.height)
      }
      None => Size::new(w, h),
    };
    self.render_children(canvas, inner, style, id);
    canvas.pop_clip();
  }

  fn apply_filter(
    &mut self,
    filter_ref: &str,
    image: crate::canvas::RasterImage,
    id: NodeId,
    space: CoordSpace,
    style: &StyleState,
  ) -> crate::canvas::RasterImage {
    let doc = self.doc;
    let Some(filter_id) = doc.node_by_id(filter_ref) else {
      warn!("filter references unknown id '{filter_ref}'");
      return image;
    };
    let NodeKind::Filter(def) = &doc.get(filter_id).kind else {
      warn!("'{filter_ref}' is not a filter definition");
      return image;
    };
    let ctx = space.length_ctx(style.font_size);
    let bbox = match self.node_bbox(id, &ctx) {
      Some(bbox) => bbox,
      None => {
        if def.units == crate::tree::CoordUnits::ObjectBoundingBox {
          // A bounding-box-relative filter on empty geometry hides it.
          let mut empty = image;
          empty.clear_outside(Rect::ZERO);
          return empty;
        }
        Rect::ZERO
      }
    };
    let region_user = def.resolve_region(bbox, &ctx);
    let region_device = space.transform.map_rect(region_user);
    let filter_ctx = FilterContext {
      bbox,
      scale: space.transform.scale_factors(),
      region_device,
    };
    filter::evaluate(def, &image, &filter_ctx)
  }

  /// Geometry-only bounding box of a node in its own user space.
  ///
  /// Children contribute their boxes mapped through their own transforms;
  /// strokes and filters do not grow the box. Reference loops simply stop
  /// contributing, mirroring the render-time cycle policy.
  pub(crate) fn node_bbox(&self, id: NodeId, ctx: &LengthContext) -> Option<Rect> {
    let mut visited = FxHashSet::default();
    self.node_bbox_inner(id, ctx, &mut visited, 0)
  }

  fn node_bbox_inner(
    &self,
    id: NodeId,
    ctx: &LengthContext,
    visited: &mut FxHashSet<NodeId>,
    depth: usize,
  ) -> Option<Rect> {
    if depth > MAX_RENDER_DEPTH || !visited.insert(id) {
      return None;
    }
    let doc = self.doc;
    let node = doc.get(id);
    let result = match &node.kind {
      NodeKind::Shape(shape) => shape_to_path(shape, ctx).and_then(|path| path.bounds()),
      NodeKind::Group | NodeKind::Svg(_) => {
        let mut union: Option<Rect> = None;
        for &child in node.children() {
          let child_node = doc.get(child);
          if child_node.kind.is_definition() {
            continue;
          }
          if let Some(bbox) = self.node_bbox_inner(child, ctx, visited, depth + 1) {
            let mapped = child_node.transform.map_rect(bbox);
            union = Some(match union {
              Some(acc) => acc.union(mapped),
              None => mapped,
            });
          }
        }
        union
      }
      NodeKind::Use(use_node) => {
        let target = doc.node_by_id(&use_node.href)?;
        let bbox = self.node_bbox_inner(target, ctx, visited, depth + 1)?;
        let mapped = doc.get(target).transform.map_rect(bbox);
        Some(mapped.translate(crate::geometry::Point::new(
          use_node.x.resolve(LengthAxis::Horizontal, ctx),
          use_node.y.resolve(LengthAxis::Vertical, ctx),
        )))
      }
      NodeKind::Image(image) => {
        let w = image
          .width
          .map(|len| len.resolve(LengthAxis::Horizontal, ctx))
          .unwrap_or(image.image.width() as f32);
        let h = image
          .height
          .map(|len| len.resolve(LengthAxis::Vertical, ctx))
          .unwrap_or(image.image.height() as f32);
        let rect = Rect::from_xywh(
          image.x.resolve(LengthAxis::Horizontal, ctx),
          image.y.resolve(LengthAxis::Vertical, ctx),
          w,
          h,
        );
        rect.is_valid().then_some(rect)
      }
      _ => None,
    };
    visited.remove(&id);
    result
  }
}
