//! The canvas capability boundary
//!
//! The renderer never talks to a raster library directly: it draws through
//! the [`Canvas`] trait and obtains surfaces through a [`CanvasFactory`]
//! injected at construction. This keeps the traversal backend-agnostic —
//! the bundled software backend ([`SoftwareCanvasFactory`]) rasterizes with
//! tiny-skia, and a test double can substitute it without touching the
//! renderer.
//!
//! # Capability surface
//!
//! - path fill/stroke with a resolved [`PaintSource`] and style
//! - an affine transform applied to subsequent draws
//! - a clip stack (intersection semantics)
//! - transparency-group layers that pop off as [`RasterImage`]s
//! - compositing a raster image back with an opacity
//! - pixel extraction

pub mod image;
pub mod path;
pub mod software;

pub use image::RasterImage;
pub use path::{PathData, PathSegment};
pub use software::{SoftwareCanvas, SoftwareCanvasFactory};

use crate::error::CanvasError;
use crate::geometry::{Point, Transform};
use crate::style::{FillRule, Rgba, StrokeStyle};

/// Gradient behavior outside the [0,1] offset range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpreadMethod {
  #[default]
  Pad,
  Repeat,
  Reflect,
}

/// One resolved gradient stop. The color already carries stop-opacity and
/// the consuming channel's fill-/stroke-opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
  pub offset: f32,
  pub color: Rgba,
}

impl GradientStop {
  pub fn new(offset: f32, color: Rgba) -> Self {
    Self { offset, color }
  }
}

/// A concrete linear gradient in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradientSource {
  pub start: Point,
  pub end: Point,
  pub stops: Vec<GradientStop>,
  pub spread: SpreadMethod,
  /// Additional gradient transform (gradient space → user space).
  pub transform: Transform,
}

/// A concrete radial gradient in user space.
#[derive(Debug, Clone, PartialEq)]
pub struct RadialGradientSource {
  pub center: Point,
  /// Focal point; equals `center` when no focus was declared.
  pub focal: Point,
  pub radius: f32,
  pub stops: Vec<GradientStop>,
  pub spread: SpreadMethod,
  pub transform: Transform,
}

/// A pattern tile ready for repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternSource {
  pub tile: RasterImage,
  /// Maps tile pixel space into user space.
  pub transform: Transform,
}

/// A fully-resolved paint, consumable by any canvas backend.
#[derive(Debug, Clone, PartialEq)]
pub enum PaintSource {
  Solid(Rgba),
  LinearGradient(LinearGradientSource),
  RadialGradient(RadialGradientSource),
  Pattern(PatternSource),
}

/// One geometry contribution to a clip region.
#[derive(Debug, Clone)]
pub struct ClipEntry {
  pub path: PathData,
  pub rule: FillRule,
  /// User space of this entry → device space.
  pub transform: Transform,
}

/// A clip region: the union of its entries' coverage, intersected with any
/// clip already on the canvas when pushed.
#[derive(Debug, Clone, Default)]
pub struct ClipRegion {
  pub entries: Vec<ClipEntry>,
}

impl ClipRegion {
  pub fn new(entries: Vec<ClipEntry>) -> Self {
    Self { entries }
  }
}

/// An opaque 2D drawing surface.
///
/// Draw calls observe the current transform and the intersected clip
/// stack. Layers nest: drawing between `push_layer` and `pop_layer` lands
/// on an isolated surface that pops off as a [`RasterImage`] for group
/// compositing, masking and filtering.
pub trait Canvas {
  fn width(&self) -> u32;
  fn height(&self) -> u32;

  /// Fills the whole surface with `color`, ignoring transform and clip.
  fn clear(&mut self, color: Rgba);

  fn set_transform(&mut self, transform: Transform);
  fn transform(&self) -> Transform;

  fn fill_path(&mut self, path: &PathData, paint: &PaintSource, rule: FillRule);
  fn stroke_path(&mut self, path: &PathData, paint: &PaintSource, stroke: &StrokeStyle);

  /// Composites `image` with `transform` mapping image pixels to device
  /// space, honoring the clip stack but not the current transform.
  fn draw_image(&mut self, image: &RasterImage, transform: Transform, opacity: f32);

  /// Intersects the clip stack with `region`'s coverage.
  fn push_clip(&mut self, region: &ClipRegion);
  fn pop_clip(&mut self);

  /// Begins a transparency group; subsequent draws are isolated.
  fn push_layer(&mut self) -> Result<(), CanvasError>;

  /// Ends the innermost transparency group, returning its pixels.
  /// Returns `None` when no layer is open.
  fn pop_layer(&mut self) -> Option<RasterImage>;

  /// Consumes the canvas, returning the accumulated pixels.
  fn into_image(self: Box<Self>) -> RasterImage;
}

/// Creates canvases; injected into the renderer at construction so the
/// backend can be swapped without touching the traversal.
pub trait CanvasFactory: Send + Sync {
  fn create(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>, CanvasError>;
}
