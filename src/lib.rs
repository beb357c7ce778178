//! vgraster: a vector-scene-to-raster rendering engine
//!
//! Turns a parsed vector-graphics scene description — a tree of shapes,
//! groups, paints, gradients, patterns, clip paths, masks and
//! filter-effect graphs — into an in-memory RGBA pixel buffer at a
//! caller-specified resolution. No browser, no layout engine: one
//! synchronous, deterministic document → bitmap transform.
//!
//! # Pipeline
//!
//! 1. **Build**: construct a [`tree::Document`] through
//!    [`tree::DocumentBuilder`] (typically driven by an external markup
//!    parser).
//! 2. **Render**: [`render::Renderer`] computes output dimensions from
//!    the document's size/viewBox (or a caller override), allocates a
//!    canvas through the injected [`canvas::CanvasFactory`], and walks
//!    the tree — cascading style, resolving paints, applying clips,
//!    masks and filter graphs.
//! 3. **Extract**: the result is a packed `u32` RGBA buffer plus its
//!    dimensions.
//!
//! # Error policy
//!
//! Only resource failures (zero-area canvas, allocation guard) abort a
//! render. Dangling or cyclic references, malformed values and degenerate
//! geometry degrade locally and the rest of the document still renders.
//!
//! # Example
//!
//! ```
//! use vgraster::style::{NodeStyle, Paint, Rgba};
//! use vgraster::tree::{DocumentBuilder, NodeData, NodeKind, Shape};
//! use vgraster::units::Length;
//! use vgraster::Renderer;
//!
//! let mut builder = DocumentBuilder::new().with_size(Length::px(4.0), Length::px(4.0));
//! let root = builder.root();
//! builder.append(
//!   root,
//!   NodeData::new(NodeKind::Shape(Shape::Rect {
//!     x: Length::ZERO,
//!     y: Length::ZERO,
//!     width: Length::px(4.0),
//!     height: Length::px(4.0),
//!     rx: None,
//!     ry: None,
//!   }))
//!   .with_style(NodeStyle {
//!     fill: Some(Paint::Color(Rgba::RED)),
//!     ..NodeStyle::default()
//!   }),
//! );
//! let document = builder.finish();
//!
//! let result = Renderer::new().render(&document).unwrap();
//! assert_eq!((result.width, result.height), (4, 4));
//! assert_eq!(result.pixels[0], 0xff00_00ff);
//! ```

pub mod canvas;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod image_compare;
pub mod render;
pub mod style;
pub mod tree;
pub mod units;

pub use error::{Error, Result};
pub use geometry::{Point, Rect, Size, Transform};
pub use render::{RenderOptions, RenderResult, Renderer};
pub use style::Rgba;
