//! Integration tests for pattern paints
//!
//! A pattern renders its content subtree once into an offscreen tile and
//! repeats it; the tile geometry resolves against the referencing
//! element's bounding box or user space depending on the declared units.

use vgraster::style::{NodeStyle, Paint, Rgba};
use vgraster::tree::{
  CoordUnits, DocumentBuilder, NodeData, NodeKind, PatternDef, Shape,
};
use vgraster::units::Length;
use vgraster::{RenderResult, Renderer};

const WHITE: u32 = 0xffff_ffff;

fn rect_kind(x: f32, y: f32, w: f32, h: f32) -> NodeKind {
  NodeKind::Shape(Shape::Rect {
    x: Length::px(x),
    y: Length::px(y),
    width: Length::px(w),
    height: Length::px(h),
    rx: None,
    ry: None,
  })
}

fn fill(color: Rgba) -> NodeStyle {
  NodeStyle {
    fill: Some(Paint::Color(color)),
    ..NodeStyle::default()
  }
}

fn px(result: &RenderResult, x: u32, y: u32) -> u32 {
  result.pixels[(y * result.width + x) as usize]
}

#[test]
fn user_space_tile_repeats_with_its_period() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(8.0), Length::px(8.0));
  let root = builder.root();
  let pattern = builder.append(
    root,
    NodeData::new(NodeKind::Pattern(PatternDef {
      x: Length::ZERO,
      y: Length::ZERO,
      width: Length::px(2.0),
      height: Length::px(2.0),
      units: CoordUnits::UserSpace,
      ..PatternDef::default()
    }))
    .with_id("pat"),
  );
  // One white texel in the tile's top-left corner.
  builder.append(
    pattern,
    NodeData::new(rect_kind(0.0, 0.0, 1.0, 1.0)).with_style(fill(Rgba::WHITE)),
  );
  builder.append(
    root,
    NodeData::new(rect_kind(0.0, 0.0, 8.0, 8.0)).with_style(NodeStyle {
      fill: Some(Paint::Ref("pat".to_string())),
      ..NodeStyle::default()
    }),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();

  for (x, y) in [(0, 0), (2, 0), (4, 4), (6, 2)] {
    assert_eq!(px(&result, x, y), WHITE, "tile corner at ({x},{y})");
  }
  for (x, y) in [(1, 1), (3, 3), (5, 1)] {
    assert_eq!(px(&result, x, y), 0, "tile gap at ({x},{y})");
  }
}

#[test]
fn bounding_box_tile_scales_with_the_shape() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(8.0), Length::px(8.0));
  let root = builder.root();
  let pattern = builder.append(
    root,
    NodeData::new(NodeKind::Pattern(PatternDef {
      x: Length::ZERO,
      y: Length::ZERO,
      // Half the bbox on each axis: four tiles across the shape.
      width: Length::px(0.5),
      height: Length::px(0.5),
      units: CoordUnits::ObjectBoundingBox,
      ..PatternDef::default()
    }))
    .with_id("pat"),
  );
  builder.append(
    pattern,
    NodeData::new(rect_kind(0.0, 0.0, 4.0, 4.0)).with_style(fill(Rgba::GREEN)),
  );
  builder.append(
    root,
    NodeData::new(rect_kind(0.0, 0.0, 8.0, 8.0)).with_style(NodeStyle {
      fill: Some(Paint::Ref("pat".to_string())),
      ..NodeStyle::default()
    }),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  // Tile is 4x4 device pixels, green everywhere (content covers it).
  assert_eq!(px(&result, 1, 1), 0xff00_ff00);
  assert_eq!(px(&result, 6, 6), 0xff00_ff00);
}

#[test]
fn zero_area_tile_paints_nothing() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(8.0), Length::px(8.0));
  let root = builder.root();
  builder.append(
    root,
    NodeData::new(NodeKind::Pattern(PatternDef {
      width: Length::px(0.0),
      height: Length::px(2.0),
      units: CoordUnits::UserSpace,
      ..PatternDef::default()
    }))
    .with_id("pat"),
  );
  builder.append(
    root,
    NodeData::new(rect_kind(0.0, 0.0, 8.0, 8.0)).with_style(NodeStyle {
      fill: Some(Paint::Ref("pat".to_string())),
      ..NodeStyle::default()
    }),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert!(result.pixels.iter().all(|&p| p == 0));
}

#[test]
fn self_referential_pattern_terminates() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(8.0), Length::px(8.0));
  let root = builder.root();
  let pattern = builder.append(
    root,
    NodeData::new(NodeKind::Pattern(PatternDef {
      width: Length::px(4.0),
      height: Length::px(4.0),
      units: CoordUnits::UserSpace,
      ..PatternDef::default()
    }))
    .with_id("pat"),
  );
  // The tile paints with the pattern itself: the inner reference is
  // dropped, the outer fill still succeeds.
  builder.append(
    pattern,
    NodeData::new(rect_kind(0.0, 0.0, 4.0, 4.0)).with_style(NodeStyle {
      fill: Some(Paint::Ref("pat".to_string())),
      ..NodeStyle::default()
    }),
  );
  builder.append(
    root,
    NodeData::new(rect_kind(0.0, 0.0, 8.0, 8.0)).with_style(NodeStyle {
      fill: Some(Paint::Ref("pat".to_string())),
      ..NodeStyle::default()
    }),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  // Terminates without overflow; nothing painted since the only content
  // degraded to no paint.
  assert!(result.pixels.iter().all(|&p| p == 0));
}
