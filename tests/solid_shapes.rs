//! Integration tests for solid-fill shape rendering
//!
//! Covers the baseline contract: opaque solid fills land exactly, fills
//! paint under strokes, visibility and fill rules are honored, and a
//! render is deterministic.

use vgraster::canvas::PathData;
use vgraster::style::{FillRule, NodeStyle, Paint, Rgba, Visibility};
use vgraster::tree::{DocumentBuilder, Document, NodeData, NodeKind, Shape};
use vgraster::units::Length;
use vgraster::{RenderOptions, Renderer, RenderResult};

const RED: u32 = 0xff00_00ff;
const GREEN: u32 = 0xff00_ff00;
const BLUE: u32 = 0xffff_0000;
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

fn doc_with(size: f32, nodes: Vec<NodeData>) -> Document {
  let mut builder = DocumentBuilder::new().with_size(Length::px(size), Length::px(size));
  let root = builder.root();
  for node in nodes {
    builder.append(root, node);
  }
  builder.finish()
}

#[test]
fn opaque_fill_lands_exactly() {
  let doc = doc_with(
    8.0,
    vec![NodeData::new(rect_kind(2.0, 2.0, 4.0, 4.0)).with_style(fill(Rgba::RED))],
  );
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 4, 4), RED);
  assert_eq!(px(&result, 0, 0), 0);
  assert_eq!(px(&result, 7, 7), 0);
}

#[test]
fn default_fill_is_black() {
  let doc = doc_with(4.0, vec![NodeData::new(rect_kind(0.0, 0.0, 4.0, 4.0))]);
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 2, 2), 0xff00_0000);
}

#[test]
fn fill_paints_under_stroke() {
  let style = NodeStyle {
    fill: Some(Paint::Color(Rgba::RED)),
    stroke: Some(Paint::Color(Rgba::BLUE)),
    stroke_width: Some(Length::px(2.0)),
    ..NodeStyle::default()
  };
  let doc = doc_with(
    12.0,
    vec![NodeData::new(rect_kind(2.0, 2.0, 8.0, 8.0)).with_style(style)],
  );
  let result = Renderer::new().render(&doc).unwrap();
  // Interior keeps the fill; the stroke band straddling the edge wins.
  assert_eq!(px(&result, 6, 6), RED);
  assert_eq!(px(&result, 2, 6), BLUE);
  assert_eq!(px(&result, 9, 6), BLUE);
}

#[test]
fn hidden_shape_paints_nothing() {
  let style = NodeStyle {
    fill: Some(Paint::Color(Rgba::RED)),
    visibility: Some(Visibility::Hidden),
    ..NodeStyle::default()
  };
  let doc = doc_with(
    4.0,
    vec![NodeData::new(rect_kind(0.0, 0.0, 4.0, 4.0)).with_style(style)],
  );
  let result = Renderer::new().render(&doc).unwrap();
  assert!(result.pixels.iter().all(|&p| p == 0));
}

#[test]
fn visibility_is_inherited_but_overridable() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(8.0), Length::px(8.0));
  let root = builder.root();
  let group = builder.append(
    root,
    NodeData::new(NodeKind::Group).with_style(NodeStyle {
      visibility: Some(Visibility::Hidden),
      ..NodeStyle::default()
    }),
  );
  builder.append(
    group,
    NodeData::new(rect_kind(0.0, 0.0, 4.0, 8.0)).with_style(fill(Rgba::RED)),
  );
  builder.append(
    group,
    NodeData::new(rect_kind(4.0, 0.0, 4.0, 8.0)).with_style(NodeStyle {
      fill: Some(Paint::Color(Rgba::GREEN)),
      visibility: Some(Visibility::Visible),
      ..NodeStyle::default()
    }),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 2, 4), 0);
  assert_eq!(px(&result, 6, 4), GREEN);
}

#[test]
fn even_odd_fill_rule_cuts_a_hole() {
  let mut path = PathData::new();
  // Outer square and inner square wound the same way: evenodd makes the
  // inner one a hole, nonzero fills it.
  path.move_to(1.0, 1.0);
  path.line_to(9.0, 1.0);
  path.line_to(9.0, 9.0);
  path.line_to(1.0, 9.0);
  path.close();
  path.move_to(3.0, 3.0);
  path.line_to(7.0, 3.0);
  path.line_to(7.0, 7.0);
  path.line_to(3.0, 7.0);
  path.close();

  let even_odd = doc_with(
    10.0,
    vec![NodeData::new(NodeKind::Shape(Shape::Path(path.clone()))).with_style(NodeStyle {
      fill: Some(Paint::Color(Rgba::RED)),
      fill_rule: Some(FillRule::EvenOdd),
      ..NodeStyle::default()
    })],
  );
  let result = Renderer::new().render(&even_odd).unwrap();
  assert_eq!(px(&result, 2, 5), RED);
  assert_eq!(px(&result, 5, 5), 0);

  let non_zero = doc_with(
    10.0,
    vec![NodeData::new(NodeKind::Shape(Shape::Path(path))).with_style(fill(Rgba::RED))],
  );
  let result = Renderer::new().render(&non_zero).unwrap();
  assert_eq!(px(&result, 5, 5), RED);
}

#[test]
fn polygon_closes_itself() {
  let points = vec![
    vgraster::Point::new(0.0, 0.0),
    vgraster::Point::new(8.0, 0.0),
    vgraster::Point::new(8.0, 8.0),
    vgraster::Point::new(0.0, 8.0),
  ];
  let doc = doc_with(
    8.0,
    vec![NodeData::new(NodeKind::Shape(Shape::Polygon { points })).with_style(fill(Rgba::GREEN))],
  );
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 4, 4), GREEN);
}

#[test]
fn group_opacity_composites_atomically() {
  // Two overlapping opaque reds in a half-opacity group must composite
  // as one unit: the overlap is not darker/more opaque than the rest.
  let mut builder = DocumentBuilder::new().with_size(Length::px(8.0), Length::px(8.0));
  let root = builder.root();
  let group = builder.append(
    root,
    NodeData::new(NodeKind::Group).with_style(NodeStyle {
      opacity: Some(0.5),
      ..NodeStyle::default()
    }),
  );
  builder.append(
    group,
    NodeData::new(rect_kind(0.0, 0.0, 6.0, 8.0)).with_style(fill(Rgba::RED)),
  );
  builder.append(
    group,
    NodeData::new(rect_kind(2.0, 0.0, 6.0, 8.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new()
    .render_with_options(
      &doc,
      &RenderOptions {
        background: Some(Rgba::WHITE),
        ..RenderOptions::default()
      },
    )
    .unwrap();
  let overlap = px(&result, 4, 4);
  let single = px(&result, 1, 4);
  assert_eq!(overlap, single);
  // 50% red over white is pink.
  let r = single & 0xff;
  let g = (single >> 8) & 0xff;
  assert_eq!(r, 255);
  assert!((g as i32 - 128).abs() <= 2, "g = {g}");
}

#[test]
fn background_option_fills_canvas() {
  let doc = doc_with(4.0, vec![]);
  let result = Renderer::new()
    .render_with_options(
      &doc,
      &RenderOptions {
        background: Some(Rgba::WHITE),
        ..RenderOptions::default()
      },
    )
    .unwrap();
  assert!(result.pixels.iter().all(|&p| p == WHITE));
}

#[test]
fn rendering_twice_is_bit_identical() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(16.0), Length::px(16.0));
  let root = builder.root();
  builder.append(
    root,
    NodeData::new(NodeKind::Shape(Shape::Circle {
      cx: Length::px(8.0),
      cy: Length::px(8.0),
      r: Length::px(5.0),
    }))
    .with_style(NodeStyle {
      fill: Some(Paint::Color(Rgba::rgba(20, 120, 220, 0.7))),
      stroke: Some(Paint::Color(Rgba::BLACK)),
      stroke_width: Some(Length::px(1.5)),
      ..NodeStyle::default()
    }),
  );
  let doc = builder.finish();
  let renderer = Renderer::new();
  let options = RenderOptions {
    size: Some((32, 32)),
    ..RenderOptions::default()
  };
  let first = renderer.render_with_options(&doc, &options).unwrap();
  let second = renderer.render_with_options(&doc, &options).unwrap();
  assert_eq!(first, second);
}

#[test]
fn zero_output_size_is_a_fatal_error() {
  let doc = doc_with(4.0, vec![]);
  let result = Renderer::new().render_with_options(
    &doc,
    &RenderOptions {
      size: Some((0, 4)),
      ..RenderOptions::default()
    },
  );
  assert!(result.is_err());
}

#[test]
fn transform_translates_shape() {
  let doc = doc_with(
    8.0,
    vec![NodeData::new(rect_kind(0.0, 0.0, 2.0, 2.0))
      .with_style(fill(Rgba::GREEN))
      .with_transform(vgraster::Transform::from_translate(4.0, 4.0))],
  );
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 5, 5), GREEN);
  assert_eq!(px(&result, 1, 1), 0);
}
