//! Style state and the top-down cascade
//!
//! Every node may declare a sparse [`NodeStyle`]; the traversal carries a
//! fully-resolved [`StyleState`] snapshot and derives a child snapshot with
//! [`StyleState::cascade`]. Snapshots are immutable values: sibling
//! subtrees can never observe each other's style changes because nothing
//! is mutated in place.
//!
//! Group opacity is deliberately *not* part of the snapshot — it is a
//! per-node compositing property applied through a transparency group, not
//! an inherited paint property.

use crate::units::{Length, LengthAxis, LengthContext};

/// An RGBA color with 8-bit color channels and a unit-interval alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
  /// Red component (0-255)
  pub r: u8,
  /// Green component (0-255)
  pub g: u8,
  /// Blue component (0-255)
  pub b: u8,
  /// Alpha component (0.0-1.0)
  pub a: f32,
}

impl Rgba {
  /// Fully transparent black
  pub const TRANSPARENT: Self = Self {
    r: 0,
    g: 0,
    b: 0,
    a: 0.0,
  };

  /// Opaque black
  pub const BLACK: Self = Self {
    r: 0,
    g: 0,
    b: 0,
    a: 1.0,
  };

  /// Opaque white
  pub const WHITE: Self = Self {
    r: 255,
    g: 255,
    b: 255,
    a: 1.0,
  };

  /// Opaque red
  pub const RED: Self = Self {
    r: 255,
    g: 0,
    b: 0,
    a: 1.0,
  };

  /// Opaque green
  pub const GREEN: Self = Self {
    r: 0,
    g: 255,
    b: 0,
    a: 1.0,
  };

  /// Opaque blue
  pub const BLUE: Self = Self {
    r: 0,
    g: 0,
    b: 255,
    a: 1.0,
  };

  pub fn rgb(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b, a: 1.0 }
  }

  pub fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
    Self {
      r,
      g,
      b,
      a: a.clamp(0.0, 1.0),
    }
  }

  /// Returns the color with its alpha multiplied by `factor`.
  pub fn with_alpha_scaled(self, factor: f32) -> Self {
    Self {
      a: (self.a * factor.clamp(0.0, 1.0)).clamp(0.0, 1.0),
      ..self
    }
  }

  pub fn alpha_u8(self) -> u8 {
    (self.a.clamp(0.0, 1.0) * 255.0).round() as u8
  }
}

/// An abstract paint reference on a fill or stroke channel.
///
/// `Ref` points into the document's id index and is resolved by the paint
/// resolver at draw time; a dangling or ill-kinded reference degrades to no
/// paint on that channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
  None,
  Color(Rgba),
  /// Reference to a gradient or pattern definition by id.
  Ref(String),
  /// The fill paint of the nearest referencing `use` element.
  ContextFill,
  /// The stroke paint of the nearest referencing `use` element.
  ContextStroke,
}

impl Paint {
  pub fn is_none(&self) -> bool {
    matches!(self, Paint::None)
  }
}

/// Fill rule for path filling and clip coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
  #[default]
  NonZero,
  EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
  #[default]
  Butt,
  Round,
  Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineJoin {
  #[default]
  Miter,
  Round,
  Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
  #[default]
  Visible,
  Hidden,
}

/// Resolved stroke parameters in user units.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
  pub width: f32,
  pub miter_limit: f32,
  pub cap: LineCap,
  pub join: LineJoin,
  /// Dash lengths plus the starting offset into the pattern.
  pub dash: Option<(Vec<f32>, f32)>,
}

impl Default for StrokeStyle {
  fn default() -> Self {
    Self {
      width: 1.0,
      miter_limit: 4.0,
      cap: LineCap::Butt,
      join: LineJoin::Miter,
      dash: None,
    }
  }
}

/// Sparse per-node style declarations.
///
/// `None` means "inherit" for inherited properties. `opacity` is the only
/// non-inherited field here; it defaults to fully opaque.
#[derive(Debug, Clone, Default)]
pub struct NodeStyle {
  pub fill: Option<Paint>,
  pub stroke: Option<Paint>,
  pub fill_opacity: Option<f32>,
  pub stroke_opacity: Option<f32>,
  pub fill_rule: Option<FillRule>,
  pub stroke_width: Option<Length>,
  pub stroke_cap: Option<LineCap>,
  pub stroke_join: Option<LineJoin>,
  pub stroke_miter_limit: Option<f32>,
  pub stroke_dasharray: Option<Vec<Length>>,
  pub stroke_dashoffset: Option<Length>,
  pub visibility: Option<Visibility>,
  pub font_size: Option<Length>,
  /// Group opacity, applied via a transparency group. Not inherited.
  pub opacity: Option<f32>,
}

impl NodeStyle {
  /// Group opacity clamped to [0,1]; malformed values fall back to opaque.
  pub fn group_opacity(&self) -> f32 {
    match self.opacity {
      Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
      _ => 1.0,
    }
  }
}

/// Fully-resolved style snapshot for one traversal scope.
///
/// Every field is concrete — "inherit" never survives into a snapshot, so
/// painting code never needs to look further up the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleState {
  pub fill: Paint,
  pub stroke: Paint,
  pub fill_opacity: f32,
  pub stroke_opacity: f32,
  pub fill_rule: FillRule,
  pub stroke_style: StrokeStyle,
  pub visibility: Visibility,
  pub font_size: f32,
  /// Paints captured at the nearest `use` instantiation, for
  /// `context-fill` / `context-stroke` resolution.
  pub context_fill: Paint,
  pub context_stroke: Paint,
}

impl Default for StyleState {
  fn default() -> Self {
    Self {
      fill: Paint::Color(Rgba::BLACK),
      stroke: Paint::None,
      fill_opacity: 1.0,
      stroke_opacity: 1.0,
      fill_rule: FillRule::NonZero,
      stroke_style: StrokeStyle::default(),
      visibility: Visibility::Visible,
      font_size: 16.0,
      context_fill: Paint::None,
      context_stroke: Paint::None,
    }
  }
}

fn clamp_opacity(declared: Option<f32>, inherited: f32) -> f32 {
  match declared {
    Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
    Some(_) => inherited,
    None => inherited,
  }
}

impl StyleState {
  /// Derives the snapshot for a child scope.
  ///
  /// Declared properties override, absent ones inherit. Lengths are
  /// resolved immediately against `ctx` so the snapshot carries only
  /// concrete user-unit values. Font size is resolved first because em/ex
  /// lengths elsewhere in the same declaration resolve against it.
  pub fn cascade(&self, declared: &NodeStyle, ctx: &LengthContext) -> StyleState {
    let font_size = match declared.font_size {
      Some(len) => {
        let resolved = len.resolve(
          LengthAxis::Other,
          &LengthContext::new(ctx.viewport, self.font_size),
        );
        if resolved > 0.0 {
          resolved
        } else {
          self.font_size
        }
      }
      None => self.font_size,
    };
    let ctx = LengthContext::new(ctx.viewport, font_size);

    let stroke_width = match declared.stroke_width {
      Some(len) => {
        let w = len.resolve(LengthAxis::Other, &ctx);
        // A negative stroke-width is malformed; keep the inherited value.
        if w >= 0.0 {
          w
        } else {
          self.stroke_style.width
        }
      }
      None => self.stroke_style.width,
    };

    let dash = match &declared.stroke_dasharray {
      Some(lengths) => resolve_dasharray(lengths, declared.stroke_dashoffset, &ctx)
        .or_else(|| self.stroke_style.dash.clone()),
      None => match declared.stroke_dashoffset {
        Some(offset) => self
          .stroke_style
          .dash
          .clone()
          .map(|(array, _)| (array, offset.resolve(LengthAxis::Other, &ctx))),
        None => self.stroke_style.dash.clone(),
      },
    };

    StyleState {
      fill: declared.fill.clone().unwrap_or_else(|| self.fill.clone()),
      stroke: declared
        .stroke
        .clone()
        .unwrap_or_else(|| self.stroke.clone()),
      fill_opacity: clamp_opacity(declared.fill_opacity, self.fill_opacity),
      stroke_opacity: clamp_opacity(declared.stroke_opacity, self.stroke_opacity),
      fill_rule: declared.fill_rule.unwrap_or(self.fill_rule),
      stroke_style: StrokeStyle {
        width: stroke_width,
        miter_limit: declared
          .stroke_miter_limit
          .filter(|m| m.is_finite() && *m >= 1.0)
          .unwrap_or(self.stroke_style.miter_limit),
        cap: declared.stroke_cap.unwrap_or(self.stroke_style.cap),
        join: declared.stroke_join.unwrap_or(self.stroke_style.join),
        dash,
      },
      visibility: declared.visibility.unwrap_or(self.visibility),
      font_size,
      context_fill: self.context_fill.clone(),
      context_stroke: self.context_stroke.clone(),
    }
  }

  /// Resolves `context-fill`/`context-stroke` indirections on a channel.
  pub fn resolve_context(&self, paint: &Paint) -> Paint {
    match paint {
      Paint::ContextFill => self.context_fill.clone(),
      Paint::ContextStroke => self.context_stroke.clone(),
      other => other.clone(),
    }
  }
}

/// Resolves a dash array declaration, rejecting malformed arrays.
///
/// An array with a negative entry, or one that sums to zero, disables
/// dashing per the SVG stroking model.
fn resolve_dasharray(
  lengths: &[Length],
  offset: Option<Length>,
  ctx: &LengthContext,
) -> Option<(Vec<f32>, f32)> {
  if lengths.is_empty() {
    return None;
  }
  let mut resolved = Vec::with_capacity(lengths.len());
  let mut sum = 0.0;
  for len in lengths {
    let v = len.resolve(LengthAxis::Other, ctx);
    if v < 0.0 {
      return None;
    }
    sum += v;
    resolved.push(v);
  }
  if sum <= 0.0 {
    return None;
  }
  let offset = offset
    .map(|o| o.resolve(LengthAxis::Other, ctx))
    .unwrap_or(0.0);
  Some((resolved, offset))
}
