//! The document tree
//!
//! A parsed scene arrives as an arena of nodes: children are owned as
//! id lists, and every cross-reference (paints, `use` targets, clip
//! paths, masks, filters) is a string id resolved through the document's
//! id index. The ownership graph is therefore always a tree even when the
//! source markup references itself cyclically; cycle handling is the
//! renderer's job, not the tree's.
//!
//! Node kinds form a closed enum so the traversal dispatch is exhaustive:
//! adding a kind forces every match in the renderer to acknowledge it.

use crate::canvas::{PathData, RasterImage, SpreadMethod};
use crate::filter::FilterDef;
use crate::geometry::{Point, Transform};
use crate::style::{NodeStyle, Rgba};
use crate::units::Length;
use log::warn;
use rustc_hash::FxHashMap;

/// Index of a node within its [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The unit space a definition's geometry is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordUnits {
  /// Geometry in the current user coordinate system.
  UserSpace,
  /// Geometry as fractions of the referencing node's bounding box.
  ObjectBoundingBox,
}

/// A viewBox rectangle: new user-space extents for a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewBox {
  pub min_x: f32,
  pub min_y: f32,
  pub width: f32,
  pub height: f32,
}

impl ViewBox {
  pub fn new(min_x: f32, min_y: f32, width: f32, height: f32) -> Option<Self> {
    if !(min_x.is_finite() && min_y.is_finite() && width > 0.0 && height > 0.0) {
      return None;
    }
    Some(Self {
      min_x,
      min_y,
      width,
      height,
    })
  }
}

/// Alignment of a viewBox within its viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
  /// Non-uniform scale filling the viewport exactly.
  None,
  XMinYMin,
  XMidYMin,
  XMaxYMin,
  XMinYMid,
  #[default]
  XMidYMid,
  XMaxYMid,
  XMinYMax,
  XMidYMax,
  XMaxYMax,
}

/// preserveAspectRatio: alignment plus meet (fit inside) or slice (cover).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AspectRatio {
  pub align: Align,
  pub slice: bool,
}

/// A gradient color stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopDef {
  pub offset: f32,
  pub color: Rgba,
  pub opacity: f32,
}

impl StopDef {
  pub fn new(offset: f32, color: Rgba) -> Self {
    Self {
      offset,
      color,
      opacity: 1.0,
    }
  }

  pub fn with_opacity(mut self, opacity: f32) -> Self {
    self.opacity = opacity;
    self
  }
}

/// Linear gradient definition. Coordinates default to a left-to-right
/// axis across the bounding box.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradientDef {
  pub x1: Length,
  pub y1: Length,
  pub x2: Length,
  pub y2: Length,
  pub units: CoordUnits,
  pub transform: Transform,
  pub spread: SpreadMethod,
  pub stops: Vec<StopDef>,
}

impl Default for LinearGradientDef {
  fn default() -> Self {
    Self {
      x1: Length::percent(0.0),
      y1: Length::percent(0.0),
      x2: Length::percent(100.0),
      y2: Length::percent(0.0),
      units: CoordUnits::ObjectBoundingBox,
      transform: Transform::identity(),
      spread: SpreadMethod::Pad,
      stops: Vec::new(),
    }
  }
}

/// Radial gradient definition. The focal point defaults to the center.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradientDef {
  pub cx: Length,
  pub cy: Length,
  pub r: Length,
  pub fx: Option<Length>,
  pub fy: Option<Length>,
  pub units: CoordUnits,
  pub transform: Transform,
  pub spread: SpreadMethod,
  pub stops: Vec<StopDef>,
}

impl Default for RadialGradientDef {
  fn default() -> Self {
    Self {
      cx: Length::percent(50.0),
      cy: Length::percent(50.0),
      r: Length::percent(50.0),
      fx: None,
      fy: None,
      units: CoordUnits::ObjectBoundingBox,
      transform: Transform::identity(),
      spread: SpreadMethod::Pad,
      stops: Vec::new(),
    }
  }
}

/// Pattern definition; the node's children are the tile content.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternDef {
  pub x: Length,
  pub y: Length,
  pub width: Length,
  pub height: Length,
  /// Units of the tile rectangle.
  pub units: CoordUnits,
  /// Units of the tile content when no viewBox is present.
  pub content_units: CoordUnits,
  pub view_box: Option<ViewBox>,
  pub aspect: AspectRatio,
  pub transform: Transform,
}

impl Default for PatternDef {
  fn default() -> Self {
    Self {
      x: Length::ZERO,
      y: Length::ZERO,
      width: Length::ZERO,
      height: Length::ZERO,
      units: CoordUnits::ObjectBoundingBox,
      content_units: CoordUnits::UserSpace,
      view_box: None,
      aspect: AspectRatio::default(),
      transform: Transform::identity(),
    }
  }
}

/// Clip path definition; children contribute geometry only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPathDef {
  pub units: CoordUnits,
}

impl Default for ClipPathDef {
  fn default() -> Self {
    Self {
      units: CoordUnits::UserSpace,
    }
  }
}

/// Mask definition; children are rendered and reduced to a luminance
/// multiplier over the mask region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskDef {
  /// Units of the mask region rectangle.
  pub units: CoordUnits,
  /// Units of the mask content.
  pub content_units: CoordUnits,
  pub x: Length,
  pub y: Length,
  pub width: Length,
  pub height: Length,
}

impl Default for MaskDef {
  fn default() -> Self {
    Self {
      units: CoordUnits::ObjectBoundingBox,
      content_units: CoordUnits::UserSpace,
      x: Length::percent(-10.0),
      y: Length::percent(-10.0),
      width: Length::percent(120.0),
      height: Length::percent(120.0),
    }
  }
}

/// Basic shape geometry, with lengths resolved at render time.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
  Path(PathData),
  Rect {
    x: Length,
    y: Length,
    width: Length,
    height: Length,
    rx: Option<Length>,
    ry: Option<Length>,
  },
  Circle {
    cx: Length,
    cy: Length,
    r: Length,
  },
  Ellipse {
    cx: Length,
    cy: Length,
    rx: Length,
    ry: Length,
  },
  Line {
    x1: Length,
    y1: Length,
    x2: Length,
    y2: Length,
  },
  Polyline {
    points: Vec<Point>,
  },
  Polygon {
    points: Vec<Point>,
  },
}

/// A pre-decoded bitmap placed into a rectangle.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
  pub image: RasterImage,
  pub x: Length,
  pub y: Length,
  /// Defaults to the bitmap's intrinsic size when absent.
  pub width: Option<Length>,
  pub height: Option<Length>,
  pub aspect: AspectRatio,
}

/// A reference that inlines another node at render time.
#[derive(Debug, Clone, PartialEq)]
pub struct UseNode {
  pub href: String,
  pub x: Length,
  pub y: Length,
}

/// A nested viewport container.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgNode {
  pub x: Length,
  pub y: Length,
  pub width: Length,
  pub height: Length,
  pub view_box: Option<ViewBox>,
  pub aspect: AspectRatio,
}

impl Default for SvgNode {
  fn default() -> Self {
    Self {
      x: Length::ZERO,
      y: Length::ZERO,
      width: Length::percent(100.0),
      height: Length::percent(100.0),
      view_box: None,
      aspect: AspectRatio::default(),
    }
  }
}

/// Every kind of node the renderer can encounter.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
  Group,
  Shape(Shape),
  Image(ImageNode),
  Use(UseNode),
  Svg(SvgNode),
  LinearGradient(LinearGradientDef),
  RadialGradient(RadialGradientDef),
  Pattern(PatternDef),
  ClipPath(ClipPathDef),
  Mask(MaskDef),
  Filter(FilterDef),
}

impl NodeKind {
  /// Definitions render only when referenced, never in document order.
  pub fn is_definition(&self) -> bool {
    matches!(
      self,
      NodeKind::LinearGradient(_)
        | NodeKind::RadialGradient(_)
        | NodeKind::Pattern(_)
        | NodeKind::ClipPath(_)
        | NodeKind::Mask(_)
        | NodeKind::Filter(_)
    )
  }
}

/// One node: kind, declared style, transform, effect references, children.
#[derive(Debug, Clone)]
pub struct NodeData {
  pub id: Option<String>,
  pub transform: Transform,
  pub style: NodeStyle,
  pub clip_path: Option<String>,
  pub mask: Option<String>,
  pub filter: Option<String>,
  pub kind: NodeKind,
  children: Vec<NodeId>,
}

impl NodeData {
  pub fn new(kind: NodeKind) -> Self {
    Self {
      id: None,
      transform: Transform::identity(),
      style: NodeStyle::default(),
      clip_path: None,
      mask: None,
      filter: None,
      kind,
      children: Vec::new(),
    }
  }

  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.id = Some(id.into());
    self
  }

  pub fn with_transform(mut self, transform: Transform) -> Self {
    self.transform = transform;
    self
  }

  pub fn with_style(mut self, style: NodeStyle) -> Self {
    self.style = style;
    self
  }

  pub fn with_clip_path(mut self, id: impl Into<String>) -> Self {
    self.clip_path = Some(id.into());
    self
  }

  pub fn with_mask(mut self, id: impl Into<String>) -> Self {
    self.mask = Some(id.into());
    self
  }

  pub fn with_filter(mut self, id: impl Into<String>) -> Self {
    self.filter = Some(id.into());
    self
  }

  pub fn children(&self) -> &[NodeId] {
    &self.children
  }
}

/// A read-only scene: node arena, root, id index and document sizing.
///
/// Documents are immutable once built, which is what makes sharing one
/// tree across independent render calls sound.
#[derive(Debug, Clone)]
pub struct Document {
  nodes: Vec<NodeData>,
  root: NodeId,
  ids: FxHashMap<String, NodeId>,
  pub width: Option<Length>,
  pub height: Option<Length>,
  pub view_box: Option<ViewBox>,
  pub aspect: AspectRatio,
}

impl Document {
  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn get(&self, id: NodeId) -> &NodeData {
    &self.nodes[id.0]
  }

  /// Looks a node up by its markup id.
  pub fn node_by_id(&self, id: &str) -> Option<NodeId> {
    self.ids.get(id).copied()
  }

  pub fn node_count(&self) -> usize {
    self.nodes.len()
  }
}

/// Incremental document construction.
///
/// The builder is the seam to an external markup parser: the parser walks
/// its syntax tree and appends nodes here. Duplicate markup ids keep the
/// first definition, matching reference-resolution behavior in the
/// original format.
pub struct DocumentBuilder {
  nodes: Vec<NodeData>,
  ids: FxHashMap<String, NodeId>,
  width: Option<Length>,
  height: Option<Length>,
  view_box: Option<ViewBox>,
  aspect: AspectRatio,
}

impl Default for DocumentBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl DocumentBuilder {
  pub fn new() -> Self {
    Self {
      nodes: vec![NodeData::new(NodeKind::Group)],
      ids: FxHashMap::default(),
      width: None,
      height: None,
      view_box: None,
      aspect: AspectRatio::default(),
    }
  }

  /// Declared intrinsic document size.
  pub fn with_size(mut self, width: Length, height: Length) -> Self {
    self.width = Some(width);
    self.height = Some(height);
    self
  }

  pub fn with_view_box(mut self, view_box: ViewBox) -> Self {
    self.view_box = Some(view_box);
    self
  }

  pub fn with_aspect_ratio(mut self, aspect: AspectRatio) -> Self {
    self.aspect = aspect;
    self
  }

  pub fn root(&self) -> NodeId {
    NodeId(0)
  }

  /// Appends `node` under `parent`, registering its id if it has one.
  pub fn append(&mut self, parent: NodeId, node: NodeData) -> NodeId {
    let id = NodeId(self.nodes.len());
    if let Some(markup_id) = &node.id {
      if self.ids.contains_key(markup_id) {
        warn!("duplicate id '{markup_id}': keeping the first definition");
      } else {
        self.ids.insert(markup_id.clone(), id);
      }
    }
    self.nodes.push(node);
    self.nodes[parent.0].children.push(id);
    id
  }

  pub fn finish(self) -> Document {
    Document {
      nodes: self.nodes,
      root: NodeId(0),
      ids: self.ids,
      width: self.width,
      height: self.height,
      view_box: self.view_box,
      aspect: self.aspect,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::geometry::Rect;

  fn rect_node() -> NodeData {
    NodeData::new(NodeKind::Shape(Shape::Rect {
      x: Length::ZERO,
      y: Length::ZERO,
      width: Length::px(10.0),
      height: Length::px(10.0),
      rx: None,
      ry: None,
    }))
  }

  #[test]
  fn builder_appends_children_in_order() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let a = builder.append(root, rect_node().with_id("a"));
    let b = builder.append(root, rect_node().with_id("b"));
    let doc = builder.finish();
    assert_eq!(doc.get(doc.root()).children(), &[a, b]);
  }

  #[test]
  fn id_index_resolves_and_keeps_first_duplicate() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let first = builder.append(root, rect_node().with_id("shape"));
    let _second = builder.append(root, rect_node().with_id("shape"));
    let doc = builder.finish();
    assert_eq!(doc.node_by_id("shape"), Some(first));
    assert_eq!(doc.node_by_id("missing"), None);
  }

  #[test]
  fn nested_structure_is_reachable() {
    let mut builder = DocumentBuilder::new();
    let root = builder.root();
    let group = builder.append(root, NodeData::new(NodeKind::Group));
    let leaf = builder.append(group, rect_node());
    let doc = builder.finish();
    assert_eq!(doc.get(group).children(), &[leaf]);
    assert!(doc.get(leaf).children().is_empty());
  }

  #[test]
  fn definitions_are_flagged() {
    assert!(NodeKind::ClipPath(ClipPathDef::default()).is_definition());
    assert!(NodeKind::LinearGradient(LinearGradientDef::default()).is_definition());
    assert!(!NodeKind::Group.is_definition());
    assert!(!NodeKind::Shape(Shape::Path(PathData::new())).is_definition());
  }

  #[test]
  fn view_box_rejects_degenerate_extents() {
    assert!(ViewBox::new(0.0, 0.0, 100.0, 100.0).is_some());
    assert!(ViewBox::new(0.0, 0.0, 0.0, 100.0).is_none());
    assert!(ViewBox::new(0.0, 0.0, 100.0, -1.0).is_none());
    assert!(ViewBox::new(f32::NAN, 0.0, 100.0, 100.0).is_none());
  }

  #[test]
  fn document_is_shareable_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Document>();
  }

  #[test]
  fn path_shape_round_trips_geometry() {
    let path = PathData::from_rect(Rect::from_xywh(0.0, 0.0, 4.0, 4.0), 0.0, 0.0);
    let node = NodeData::new(NodeKind::Shape(Shape::Path(path.clone())));
    match &node.kind {
      NodeKind::Shape(Shape::Path(p)) => assert_eq!(*p, path),
      other => panic!("unexpected kind {other:?}"),
    }
  }
}
