//! Path construction
//!
//! [`PathData`] is the geometry currency of the renderer: shape nodes are
//! converted to paths in user space, clip children contribute their paths
//! to coverage masks, and the canvas backend translates paths to its own
//! path type when drawing.
//!
//! Bounding boxes are tight: curve extents are computed from the curve's
//! derivative roots, not from control-point hulls, because gradient and
//! filter geometry in object-bounding-box units depends on the exact
//! extents.

use crate::geometry::{Point, Rect, Transform};

/// Circle-to-cubic approximation constant (4/3 * (sqrt(2) - 1)).
const KAPPA: f32 = 0.552_284_8;

/// One path verb with its absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
  MoveTo(Point),
  LineTo(Point),
  QuadTo(Point, Point),
  CubicTo(Point, Point, Point),
  Close,
}

/// An immutable-after-build sequence of path segments.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PathData {
  segments: Vec<PathSegment>,
}

impl PathData {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn segments(&self) -> &[PathSegment] {
    &self.segments
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
    self.segments.push(PathSegment::MoveTo(Point::new(x, y)));
    self
  }

  pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
    self.segments.push(PathSegment::LineTo(Point::new(x, y)));
    self
  }

  pub fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) -> &mut Self {
    self
      .segments
      .push(PathSegment::QuadTo(Point::new(cx, cy), Point::new(x, y)));
    self
  }

  pub fn cubic_to(
    &mut self,
    c1x: f32,
    c1y: f32,
    c2x: f32,
    c2y: f32,
    x: f32,
    y: f32,
  ) -> &mut Self {
    self.segments.push(PathSegment::CubicTo(
      Point::new(c1x, c1y),
      Point::new(c2x, c2y),
      Point::new(x, y),
    ));
    self
  }

  pub fn close(&mut self) -> &mut Self {
    self.segments.push(PathSegment::Close);
    self
  }

  /// Axis-aligned rectangle, optionally with rounded corners.
  ///
  /// Corner radii are clamped to half the extent on each axis; a radius on
  /// one axis only implies the same radius on the other, matching how the
  /// source attributes default.
  pub fn from_rect(rect: Rect, rx: f32, ry: f32) -> Self {
    let mut path = PathData::new();
    if !rect.is_valid() {
      return path;
    }
    let (l, t, r, b) = (rect.min_x(), rect.min_y(), rect.max_x(), rect.max_y());
    let rx = rx.clamp(0.0, rect.width() / 2.0);
    let ry = ry.clamp(0.0, rect.height() / 2.0);
    if rx <= 0.0 || ry <= 0.0 {
      path.move_to(l, t);
      path.line_to(r, t);
      path.line_to(r, b);
      path.line_to(l, b);
      path.close();
      return path;
    }
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    path.move_to(l + rx, t);
    path.line_to(r - rx, t);
    path.cubic_to(r - rx + kx, t, r, t + ry - ky, r, t + ry);
    path.line_to(r, b - ry);
    path.cubic_to(r, b - ry + ky, r - rx + kx, b, r - rx, b);
    path.line_to(l + rx, b);
    path.cubic_to(l + rx - kx, b, l, b - ry + ky, l, b - ry);
    path.line_to(l, t + ry);
    path.cubic_to(l, t + ry - ky, l + rx - kx, t, l + rx, t);
    path.close();
    path
  }

  pub fn from_circle(cx: f32, cy: f32, r: f32) -> Self {
    Self::from_ellipse(cx, cy, r, r)
  }

  pub fn from_ellipse(cx: f32, cy: f32, rx: f32, ry: f32) -> Self {
    let mut path = PathData::new();
    if rx <= 0.0 || ry <= 0.0 || !rx.is_finite() || !ry.is_finite() {
      return path;
    }
    let (kx, ky) = (rx * KAPPA, ry * KAPPA);
    path.move_to(cx + rx, cy);
    path.cubic_to(cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry);
    path.cubic_to(cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy);
    path.cubic_to(cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry);
    path.cubic_to(cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy);
    path.close();
    path
  }

  pub fn from_line(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    let mut path = PathData::new();
    path.move_to(x1, y1);
    path.line_to(x2, y2);
    path
  }

  pub fn from_polyline(points: &[Point]) -> Self {
    let mut path = PathData::new();
    let mut iter = points.iter();
    if let Some(first) = iter.next() {
      path.move_to(first.x, first.y);
      for p in iter {
        path.line_to(p.x, p.y);
      }
    }
    path
  }

  pub fn from_polygon(points: &[Point]) -> Self {
    let mut path = Self::from_polyline(points);
    if !path.is_empty() {
      path.close();
    }
    path
  }

  /// Returns the path with every coordinate mapped through `transform`.
  pub fn transformed(&self, transform: Transform) -> PathData {
    let segments = self
      .segments
      .iter()
      .map(|seg| match *seg {
        PathSegment::MoveTo(p) => PathSegment::MoveTo(transform.map_point(p)),
        PathSegment::LineTo(p) => PathSegment::LineTo(transform.map_point(p)),
        PathSegment::QuadTo(c, p) => {
          PathSegment::QuadTo(transform.map_point(c), transform.map_point(p))
        }
        PathSegment::CubicTo(c1, c2, p) => PathSegment::CubicTo(
          transform.map_point(c1),
          transform.map_point(c2),
          transform.map_point(p),
        ),
        PathSegment::Close => PathSegment::Close,
      })
      .collect();
    PathData { segments }
  }

  /// Tight bounding box of the path geometry, or `None` for an empty path.
  pub fn bounds(&self) -> Option<Rect> {
    let mut acc = BoundsAccumulator::new();
    let mut current = Point::ZERO;
    let mut subpath_start = Point::ZERO;
    let mut any = false;
    for seg in &self.segments {
      match *seg {
        PathSegment::MoveTo(p) => {
          acc.add(p);
          current = p;
          subpath_start = p;
          any = true;
        }
        PathSegment::LineTo(p) => {
          acc.add(p);
          current = p;
          any = true;
        }
        PathSegment::QuadTo(c, p) => {
          acc.add_quad(current, c, p);
          current = p;
          any = true;
        }
        PathSegment::CubicTo(c1, c2, p) => {
          acc.add_cubic(current, c1, c2, p);
          current = p;
          any = true;
        }
        PathSegment::Close => {
          current = subpath_start;
        }
      }
    }
    if any {
      acc.finish()
    } else {
      None
    }
  }
}

struct BoundsAccumulator {
  min_x: f32,
  min_y: f32,
  max_x: f32,
  max_y: f32,
}

impl BoundsAccumulator {
  fn new() -> Self {
    Self {
      min_x: f32::INFINITY,
      min_y: f32::INFINITY,
      max_x: f32::NEG_INFINITY,
      max_y: f32::NEG_INFINITY,
    }
  }

  fn add(&mut self, p: Point) {
    self.min_x = self.min_x.min(p.x);
    self.min_y = self.min_y.min(p.y);
    self.max_x = self.max_x.max(p.x);
    self.max_y = self.max_y.max(p.y);
  }

  fn add_quad(&mut self, p0: Point, c: Point, p1: Point) {
    self.add(p1);
    // dB/dt = 0 at t = (p0 - c) / (p0 - 2c + p1) per axis.
    for (a, b, e) in [(p0.x, c.x, p1.x), (p0.y, c.y, p1.y)] {
      let denom = a - 2.0 * b + e;
      if denom.abs() > f32::EPSILON {
        let t = (a - b) / denom;
        if t > 0.0 && t < 1.0 {
          self.add(quad_at(p0, c, p1, t));
        }
      }
    }
  }

  fn add_cubic(&mut self, p0: Point, c1: Point, c2: Point, p1: Point) {
    self.add(p1);
    for t in cubic_extrema(p0.x, c1.x, c2.x, p1.x) {
      self.add(cubic_at(p0, c1, c2, p1, t));
    }
    for t in cubic_extrema(p0.y, c1.y, c2.y, p1.y) {
      self.add(cubic_at(p0, c1, c2, p1, t));
    }
  }

  fn finish(self) -> Option<Rect> {
    if self.min_x > self.max_x || self.min_y > self.max_y {
      return None;
    }
    Some(Rect::from_ltrb(self.min_x, self.min_y, self.max_x, self.max_y))
  }
}

fn quad_at(p0: Point, c: Point, p1: Point, t: f32) -> Point {
  let mt = 1.0 - t;
  Point::new(
    mt * mt * p0.x + 2.0 * mt * t * c.x + t * t * p1.x,
    mt * mt * p0.y + 2.0 * mt * t * c.y + t * t * p1.y,
  )
}

fn cubic_at(p0: Point, c1: Point, c2: Point, p1: Point, t: f32) -> Point {
  let mt = 1.0 - t;
  let a = mt * mt * mt;
  let b = 3.0 * mt * mt * t;
  let c = 3.0 * mt * t * t;
  let d = t * t * t;
  Point::new(
    a * p0.x + b * c1.x + c * c2.x + d * p1.x,
    a * p0.y + b * c1.y + c * c2.y + d * p1.y,
  )
}

/// Roots of the cubic's derivative in (0, 1) for one coordinate.
fn cubic_extrema(p0: f32, c1: f32, c2: f32, p1: f32) -> impl Iterator<Item = f32> {
  // B'(t) = 3(at^2 + 2bt + c)
  let a = -p0 + 3.0 * c1 - 3.0 * c2 + p1;
  let b = p0 - 2.0 * c1 + c2;
  let c = c1 - p0;
  let mut roots = [f32::NAN; 2];
  if a.abs() < f32::EPSILON {
    if b.abs() > f32::EPSILON {
      roots[0] = -c / (2.0 * b);
    }
  } else {
    let disc = b * b - a * c;
    if disc >= 0.0 {
      let sqrt = disc.sqrt();
      roots[0] = (-b + sqrt) / a;
      roots[1] = (-b - sqrt) / a;
    }
  }
  roots.into_iter().filter(|t| *t > 0.0 && *t < 1.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn assert_rect_near(a: Rect, b: Rect, eps: f32) {
    assert!(
      (a.min_x() - b.min_x()).abs() < eps
        && (a.min_y() - b.min_y()).abs() < eps
        && (a.max_x() - b.max_x()).abs() < eps
        && (a.max_y() - b.max_y()).abs() < eps,
      "{} != {}",
      a,
      b
    );
  }

  #[test]
  fn rect_path_bounds_match_rect() {
    let rect = Rect::from_xywh(10.0, 20.0, 30.0, 40.0);
    let path = PathData::from_rect(rect, 0.0, 0.0);
    assert_eq!(path.bounds().unwrap(), rect);
  }

  #[test]
  fn circle_bounds_are_tight() {
    // The cubic approximation's control points stick out past the radius;
    // extrema-based bounds must not include them.
    let path = PathData::from_circle(50.0, 50.0, 10.0);
    assert_rect_near(
      path.bounds().unwrap(),
      Rect::from_xywh(40.0, 40.0, 20.0, 20.0),
      0.05,
    );
  }

  #[test]
  fn empty_path_has_no_bounds() {
    assert!(PathData::new().bounds().is_none());
    assert!(PathData::from_polyline(&[]).bounds().is_none());
  }

  #[test]
  fn degenerate_rect_yields_empty_path() {
    let path = PathData::from_rect(Rect::from_xywh(0.0, 0.0, -5.0, 10.0), 0.0, 0.0);
    assert!(path.is_empty());
  }

  #[test]
  fn polygon_closes_polyline_does_not() {
    let pts = [
      Point::new(0.0, 0.0),
      Point::new(10.0, 0.0),
      Point::new(5.0, 8.0),
    ];
    let poly = PathData::from_polygon(&pts);
    assert!(matches!(poly.segments().last(), Some(PathSegment::Close)));
    let line = PathData::from_polyline(&pts);
    assert!(!matches!(line.segments().last(), Some(PathSegment::Close)));
  }

  #[test]
  fn transformed_path_maps_all_points() {
    let path = PathData::from_line(0.0, 0.0, 10.0, 0.0);
    let moved = path.transformed(Transform::from_translate(5.0, 5.0));
    assert_eq!(
      moved.segments()[0],
      PathSegment::MoveTo(Point::new(5.0, 5.0))
    );
    assert_eq!(
      moved.segments()[1],
      PathSegment::LineTo(Point::new(15.0, 5.0))
    );
  }

  #[test]
  fn rounded_rect_clamps_oversized_radii() {
    let rect = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
    let path = PathData::from_rect(rect, 50.0, 50.0);
    // Radii clamp to half extents; bounds still the rect itself.
    assert_rect_near(path.bounds().unwrap(), rect, 0.05);
  }
}
