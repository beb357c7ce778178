//! Geometric primitives
//!
//! Points, sizes, rectangles and 2D affine transforms used throughout the
//! renderer. All coordinates are `f32`; rectangles are axis-aligned and
//! stored as origin + extent.
//!
//! The `Transform` type follows the row layout of common 2D raster
//! libraries: mapping a point computes
//! `x' = sx*x + kx*y + tx` and `y' = ky*x + sy*y + ty`.

use std::fmt;

/// A point in 2D space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
  pub x: f32,
  pub y: f32,
}

impl Point {
  pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }

  /// Euclidean distance to another point.
  pub fn distance_to(self, other: Point) -> f32 {
    let dx = other.x - self.x;
    let dy = other.y - self.y;
    (dx * dx + dy * dy).sqrt()
  }

  pub fn is_finite(self) -> bool {
    self.x.is_finite() && self.y.is_finite()
  }
}

impl fmt::Display for Point {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "({}, {})", self.x, self.y)
  }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
  pub width: f32,
  pub height: f32,
}

impl Size {
  pub fn new(width: f32, height: f32) -> Self {
    Self { width, height }
  }

  pub fn is_empty(self) -> bool {
    self.width <= 0.0 || self.height <= 0.0
  }

  pub fn scale(self, factor: f32) -> Self {
    Self::new(self.width * factor, self.height * factor)
  }
}

impl fmt::Display for Size {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// An axis-aligned rectangle.
///
/// Negative extents are permitted to exist transiently (e.g. the result of
/// an inward inflate); callers that need a well-formed rectangle should
/// check [`Rect::is_valid`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
  x: f32,
  y: f32,
  width: f32,
  height: f32,
}

impl Rect {
  pub const ZERO: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 0.0,
    height: 0.0,
  };

  pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
    Self {
      x: left,
      y: top,
      width: right - left,
      height: bottom - top,
    }
  }

  pub fn x(self) -> f32 {
    self.x
  }

  pub fn y(self) -> f32 {
    self.y
  }

  pub fn width(self) -> f32 {
    self.width
  }

  pub fn height(self) -> f32 {
    self.height
  }

  pub fn min_x(self) -> f32 {
    self.x
  }

  pub fn min_y(self) -> f32 {
    self.y
  }

  pub fn max_x(self) -> f32 {
    self.x + self.width
  }

  pub fn max_y(self) -> f32 {
    self.y + self.height
  }

  pub fn size(self) -> Size {
    Size::new(self.width, self.height)
  }

  pub fn center(self) -> Point {
    Point::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
  }

  /// True when both extents are positive and all fields are finite.
  pub fn is_valid(self) -> bool {
    self.x.is_finite()
      && self.y.is_finite()
      && self.width.is_finite()
      && self.height.is_finite()
      && self.width > 0.0
      && self.height > 0.0
  }

  pub fn contains_point(self, point: Point) -> bool {
    point.x >= self.min_x()
      && point.x < self.max_x()
      && point.y >= self.min_y()
      && point.y < self.max_y()
  }

  pub fn union(self, other: Rect) -> Rect {
    let left = self.min_x().min(other.min_x());
    let top = self.min_y().min(other.min_y());
    let right = self.max_x().max(other.max_x());
    let bottom = self.max_y().max(other.max_y());
    Rect::from_ltrb(left, top, right, bottom)
  }

  pub fn intersection(self, other: Rect) -> Option<Rect> {
    let left = self.min_x().max(other.min_x());
    let top = self.min_y().max(other.min_y());
    let right = self.max_x().min(other.max_x());
    let bottom = self.max_y().min(other.max_y());
    if right <= left || bottom <= top {
      return None;
    }
    Some(Rect::from_ltrb(left, top, right, bottom))
  }

  pub fn translate(self, offset: Point) -> Rect {
    Rect::from_xywh(self.x + offset.x, self.y + offset.y, self.width, self.height)
  }

  /// Expands (or with negative amounts shrinks) the rectangle on each axis.
  pub fn inflate_xy(self, dx: f32, dy: f32) -> Rect {
    Rect::from_xywh(
      self.x - dx,
      self.y - dy,
      self.width + dx * 2.0,
      self.height + dy * 2.0,
    )
  }

  /// Smallest integer-aligned rectangle covering `self`.
  pub fn round_out(self) -> Rect {
    let left = self.min_x().floor();
    let top = self.min_y().floor();
    Rect::from_ltrb(left, top, self.max_x().ceil(), self.max_y().ceil())
  }
}

impl fmt::Display for Rect {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "({}, {}) {}x{}",
      self.x, self.y, self.width, self.height
    )
  }
}

/// A 2D affine transform.
///
/// Stored row-major as `[sx kx tx; ky sy ty]`. `pre_concat` appends a
/// transform that is applied *before* `self`, matching the semantics of the
/// raster backend's transform type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
  pub sx: f32,
  pub kx: f32,
  pub ky: f32,
  pub sy: f32,
  pub tx: f32,
  pub ty: f32,
}

impl Default for Transform {
  fn default() -> Self {
    Self::identity()
  }
}

impl Transform {
  pub fn identity() -> Self {
    Self::from_row(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
  }

  /// Builds a transform from row-major components `(sx, ky, kx, sy, tx, ty)`.
  ///
  /// The argument order matches the backend's constructor so transform
  /// literals can be cross-checked against it directly.
  pub fn from_row(sx: f32, ky: f32, kx: f32, sy: f32, tx: f32, ty: f32) -> Self {
    Self {
      sx,
      kx,
      ky,
      sy,
      tx,
      ty,
    }
  }

  pub fn from_translate(tx: f32, ty: f32) -> Self {
    Self::from_row(1.0, 0.0, 0.0, 1.0, tx, ty)
  }

  pub fn from_scale(sx: f32, sy: f32) -> Self {
    Self::from_row(sx, 0.0, 0.0, sy, 0.0, 0.0)
  }

  /// Rotation by `degrees` counter-clockwise about the origin.
  pub fn from_rotate(degrees: f32) -> Self {
    let rad = degrees.to_radians();
    let (sin, cos) = rad.sin_cos();
    Self::from_row(cos, sin, -sin, cos, 0.0, 0.0)
  }

  pub fn is_identity(self) -> bool {
    self == Self::identity()
  }

  pub fn is_finite(self) -> bool {
    self.sx.is_finite()
      && self.kx.is_finite()
      && self.ky.is_finite()
      && self.sy.is_finite()
      && self.tx.is_finite()
      && self.ty.is_finite()
  }

  pub fn map_point(self, p: Point) -> Point {
    Point::new(
      self.sx * p.x + self.kx * p.y + self.tx,
      self.ky * p.x + self.sy * p.y + self.ty,
    )
  }

  /// Axis-aligned bounding box of the transformed rectangle corners.
  pub fn map_rect(self, rect: Rect) -> Rect {
    let corners = [
      self.map_point(Point::new(rect.min_x(), rect.min_y())),
      self.map_point(Point::new(rect.max_x(), rect.min_y())),
      self.map_point(Point::new(rect.min_x(), rect.max_y())),
      self.map_point(Point::new(rect.max_x(), rect.max_y())),
    ];
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for c in corners {
      min_x = min_x.min(c.x);
      min_y = min_y.min(c.y);
      max_x = max_x.max(c.x);
      max_y = max_y.max(c.y);
    }
    Rect::from_ltrb(min_x, min_y, max_x, max_y)
  }

  /// Returns `self * other`: `other` is applied first.
  pub fn pre_concat(self, other: Transform) -> Transform {
    Transform {
      sx: self.sx * other.sx + self.kx * other.ky,
      kx: self.sx * other.kx + self.kx * other.sy,
      ky: self.ky * other.sx + self.sy * other.ky,
      sy: self.ky * other.kx + self.sy * other.sy,
      tx: self.sx * other.tx + self.kx * other.ty + self.tx,
      ty: self.ky * other.tx + self.sy * other.ty + self.ty,
    }
  }

  /// Returns `other * self`: `self` is applied first.
  pub fn post_concat(self, other: Transform) -> Transform {
    other.pre_concat(self)
  }

  pub fn pre_translate(self, tx: f32, ty: f32) -> Transform {
    self.pre_concat(Transform::from_translate(tx, ty))
  }

  pub fn pre_scale(self, sx: f32, sy: f32) -> Transform {
    self.pre_concat(Transform::from_scale(sx, sy))
  }

  pub fn invert(self) -> Option<Transform> {
    let det = self.sx * self.sy - self.kx * self.ky;
    if det == 0.0 || !det.is_finite() {
      return None;
    }
    let inv_det = 1.0 / det;
    Some(Transform {
      sx: self.sy * inv_det,
      kx: -self.kx * inv_det,
      ky: -self.ky * inv_det,
      sy: self.sx * inv_det,
      tx: (self.kx * self.ty - self.sy * self.tx) * inv_det,
      ty: (self.ky * self.tx - self.sx * self.ty) * inv_det,
    })
  }

  /// Per-axis scale magnitudes (column norms), used to carry user-space
  /// distances (blur radii, offsets) into device space.
  pub fn scale_factors(self) -> (f32, f32) {
    let sx = (self.sx * self.sx + self.ky * self.ky).sqrt();
    let sy = (self.kx * self.kx + self.sy * self.sy).sqrt();
    (sx, sy)
  }
}
