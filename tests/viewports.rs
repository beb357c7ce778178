//! Integration tests for output sizing and viewport mapping
//!
//! Output dimensions come from the declared size, then the viewBox, then
//! a default; an explicit override always wins and establishes the
//! document-to-device scale. Nested viewports remap and clip.

use vgraster::style::{NodeStyle, Paint, Rgba};
use vgraster::tree::{
  Align, AspectRatio, DocumentBuilder, NodeData, NodeKind, Shape, SvgNode, ViewBox,
};
use vgraster::units::Length;
use vgraster::{RenderOptions, RenderResult, Renderer};

const RED: u32 = 0xff00_00ff;
const BLUE: u32 = 0xffff_0000;

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
fn override_scales_view_box_by_half() {
  let mut builder =
    DocumentBuilder::new().with_view_box(ViewBox::new(0.0, 0.0, 100.0, 100.0).unwrap());
  let root = builder.root();
  // Covers user space (50,50)..(100,100).
  builder.append(
    root,
    NodeData::new(rect_kind(50.0, 50.0, 50.0, 50.0)).with_style(fill(Rgba::BLUE)),
  );
  let doc = builder.finish();
  let result = Renderer::new()
    .render_with_options(
      &doc,
      &RenderOptions {
        size: Some((50, 50)),
        ..RenderOptions::default()
      },
    )
    .unwrap();
  assert_eq!((result.width, result.height), (50, 50));
  // User (50,50) maps to device (25,25); user (100,100) to the clamped
  // corner (49,49).
  assert_eq!(px(&result, 30, 30), BLUE);
  assert_eq!(px(&result, 49, 49), BLUE);
  assert_eq!(px(&result, 20, 20), 0);
}

#[test]
fn declared_size_sets_output_dimensions() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(30.0), Length::px(20.0));
  let root = builder.root();
  builder.append(
    root,
    NodeData::new(rect_kind(0.0, 0.0, 30.0, 20.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!((result.width, result.height), (30, 20));
  assert_eq!(px(&result, 15, 10), RED);
}

#[test]
fn absolute_units_convert_in_the_declared_size() {
  let doc = DocumentBuilder::new()
    .with_size(
      Length::new(1.0, vgraster::units::LengthUnit::Inch),
      Length::new(0.5, vgraster::units::LengthUnit::Inch),
    )
    .finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!((result.width, result.height), (96, 48));
}

#[test]
fn default_document_is_100_by_100() {
  let doc = DocumentBuilder::new().finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!((result.width, result.height), (100, 100));
}

#[test]
fn view_box_offset_shifts_user_space() {
  let mut builder =
    DocumentBuilder::new().with_view_box(ViewBox::new(10.0, 10.0, 20.0, 20.0).unwrap());
  let root = builder.root();
  builder.append(
    root,
    NodeData::new(rect_kind(10.0, 10.0, 10.0, 10.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!((result.width, result.height), (20, 20));
  // viewBox min shifts to the origin.
  assert_eq!(px(&result, 4, 4), RED);
  assert_eq!(px(&result, 15, 15), 0);
}

#[test]
fn nested_viewport_clips_its_content() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(20.0), Length::px(20.0));
  let root = builder.root();
  let svg = builder.append(
    root,
    NodeData::new(NodeKind::Svg(SvgNode {
      x: Length::px(5.0),
      y: Length::px(5.0),
      width: Length::px(10.0),
      height: Length::px(10.0),
      ..SvgNode::default()
    })),
  );
  // Content overflows the nested viewport on every side.
  builder.append(
    svg,
    NodeData::new(rect_kind(-5.0, -5.0, 30.0, 30.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 10, 10), RED);
  assert_eq!(px(&result, 2, 2), 0);
  assert_eq!(px(&result, 17, 17), 0);
}

#[test]
fn nested_view_box_rescales_content() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(20.0), Length::px(20.0));
  let root = builder.root();
  let svg = builder.append(
    root,
    NodeData::new(NodeKind::Svg(SvgNode {
      x: Length::px(0.0),
      y: Length::px(0.0),
      width: Length::px(20.0),
      height: Length::px(20.0),
      view_box: ViewBox::new(0.0, 0.0, 5.0, 5.0),
      ..SvgNode::default()
    })),
  );
  // One user unit in the nested space is four device pixels.
  builder.append(
    svg,
    NodeData::new(rect_kind(1.0, 1.0, 2.0, 2.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 6, 6), RED);
  assert_eq!(px(&result, 2, 2), 0);
  assert_eq!(px(&result, 13, 13), 0);
}

#[test]
fn zero_extent_nested_viewport_renders_nothing() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(10.0), Length::px(10.0));
  let root = builder.root();
  let svg = builder.append(
    root,
    NodeData::new(NodeKind::Svg(SvgNode {
      width: Length::px(0.0),
      height: Length::px(10.0),
      ..SvgNode::default()
    })),
  );
  builder.append(
    svg,
    NodeData::new(rect_kind(0.0, 0.0, 10.0, 10.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert!(result.pixels.iter().all(|&p| p == 0));
}

#[test]
fn percentage_lengths_resolve_against_the_nested_viewport() {
  let mut builder = DocumentBuilder::new().with_size(Length::px(20.0), Length::px(20.0));
  let root = builder.root();
  let svg = builder.append(
    root,
    NodeData::new(NodeKind::Svg(SvgNode {
      x: Length::px(10.0),
      y: Length::px(0.0),
      width: Length::px(10.0),
      height: Length::px(20.0),
      ..SvgNode::default()
    })),
  );
  // 100% of the nested viewport, not the document.
  builder.append(
    svg,
    NodeData::new(NodeKind::Shape(Shape::Rect {
      x: Length::ZERO,
      y: Length::ZERO,
      width: Length::percent(100.0),
      height: Length::percent(100.0),
      rx: None,
      ry: None,
    }))
    .with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new().render(&doc).unwrap();
  assert_eq!(px(&result, 15, 10), RED);
  assert_eq!(px(&result, 5, 10), 0);
}

#[test]
fn non_uniform_override_with_align_none_stretches() {
  let mut builder = DocumentBuilder::new()
    .with_view_box(ViewBox::new(0.0, 0.0, 10.0, 10.0).unwrap())
    .with_aspect_ratio(AspectRatio {
      align: Align::None,
      slice: false,
    });
  let root = builder.root();
  builder.append(
    root,
    NodeData::new(rect_kind(0.0, 0.0, 10.0, 5.0)).with_style(fill(Rgba::RED)),
  );
  let doc = builder.finish();
  let result = Renderer::new()
    .render_with_options(
      &doc,
      &RenderOptions {
        size: Some((20, 40)),
        ..RenderOptions::default()
      },
    )
    .unwrap();
  // The top half of user space covers the top half of the stretched
  // output.
  assert_eq!(px(&result, 10, 10), RED);
  assert_eq!(px(&result, 10, 30), 0);
}
