//! Coordinate-system state and traversal guards
//!
//! [`CoordSpace`] is the per-scope snapshot of the user-space → device
//! transform plus the viewport extents percentages resolve against. Like
//! style snapshots it is passed down by value, so its stack discipline
//! falls out of the call stack: depth always equals tree depth.
//!
//! [`RecursionGuard`] is the explicit active-ancestor set the reference
//! machinery uses to reject cycles, plus a depth bound that keeps
//! pathologically deep reference chains from exhausting the call stack.

use crate::geometry::{Size, Transform};
use crate::tree::{Align, AspectRatio, NodeId, ViewBox};
use crate::units::LengthContext;
use rustc_hash::FxHashSet;

/// Hard bound on nested render scopes (tree depth plus reference,
/// pattern, mask and clip sub-renders).
pub const MAX_RENDER_DEPTH: usize = 512;

/// The coordinate context of one traversal scope.
#[derive(Debug, Clone, Copy)]
pub struct CoordSpace {
  /// Current user space → device space.
  pub transform: Transform,
  /// Viewport extents in user units, the basis for percentage lengths.
  pub viewport: Size,
}

impl CoordSpace {
  pub fn new(transform: Transform, viewport: Size) -> Self {
    Self {
      transform,
      viewport,
    }
  }

  /// Derives the scope entered through a node's own transform attribute.
  pub fn with_node_transform(self, node_transform: Transform) -> Self {
    Self {
      transform: self.transform.pre_concat(node_transform),
      viewport: self.viewport,
    }
  }

  pub fn length_ctx(&self, font_size: f32) -> LengthContext {
    LengthContext::new(self.viewport, font_size)
  }
}

/// Maps a viewBox onto a viewport rectangle of `width` x `height`,
/// honoring the alignment policy.
pub fn view_box_transform(view_box: ViewBox, aspect: AspectRatio, width: f32, height: f32) -> Transform {
  let sx = width / view_box.width;
  let sy = height / view_box.height;
  if aspect.align == Align::None {
    return Transform::from_row(
      sx,
      0.0,
      0.0,
      sy,
      -view_box.min_x * sx,
      -view_box.min_y * sy,
    );
  }

  let scale = if aspect.slice { sx.max(sy) } else { sx.min(sy) };
  let scaled_w = view_box.width * scale;
  let scaled_h = view_box.height * scale;

  let (align_x, align_y) = match aspect.align {
    Align::None | Align::XMinYMin => (0.0, 0.0),
    Align::XMidYMin => ((width - scaled_w) * 0.5, 0.0),
    Align::XMaxYMin => (width - scaled_w, 0.0),
    Align::XMinYMid => (0.0, (height - scaled_h) * 0.5),
    Align::XMidYMid => ((width - scaled_w) * 0.5, (height - scaled_h) * 0.5),
    Align::XMaxYMid => (width - scaled_w, (height - scaled_h) * 0.5),
    Align::XMinYMax => (0.0, height - scaled_h),
    Align::XMidYMax => ((width - scaled_w) * 0.5, height - scaled_h),
    Align::XMaxYMax => (width - scaled_w, height - scaled_h),
  };

  Transform::from_row(
    scale,
    0.0,
    0.0,
    scale,
    align_x - view_box.min_x * scale,
    align_y - view_box.min_y * scale,
  )
}

/// Active-ancestor tracking for cycle rejection plus a depth bound.
///
/// Cycle detection deliberately does not rely on call-stack identity: the
/// membership test works the same whether a node is re-entered through
/// plain recursion or through a chain of `use`/paint/clip references.
#[derive(Debug, Default)]
pub struct RecursionGuard {
  active: FxHashSet<NodeId>,
  depth: usize,
}

impl RecursionGuard {
  pub fn new() -> Self {
    Self::default()
  }

  /// Marks a node as being on the active path. Returns `false` when the
  /// node is already active (a reference cycle) or the depth bound is
  /// reached; the caller must skip the node in that case and must not
  /// call [`RecursionGuard::exit`].
  pub fn enter(&mut self, id: NodeId) -> bool {
    if self.depth >= MAX_RENDER_DEPTH {
      return false;
    }
    if !self.active.insert(id) {
      return false;
    }
    self.depth += 1;
    true
  }

  pub fn exit(&mut self, id: NodeId) {
    if self.active.remove(&id) {
      self.depth = self.depth.saturating_sub(1);
    }
  }

  pub fn depth(&self) -> usize {
    self.depth
  }
}
