//! Error types for vgraster
//!
//! Fatal errors are rare by design: the renderer prefers local, per-node
//! degradation (dangling references, malformed values) over aborting a
//! render. Only resource-level failures surface here:
//! - Canvas errors (zero-area surface, allocation guard, backend failure)
//! - Comparison-harness errors (reference image decoding)
//!
//! All errors use the `thiserror` crate for minimal boilerplate and proper
//! error trait implementations.

use thiserror::Error;

/// Result type alias for vgraster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for vgraster.
///
/// Each variant wraps a more specific error type for that subsystem.
#[derive(Error, Debug)]
pub enum Error {
  /// Canvas creation or pixel buffer allocation error.
  #[error("Canvas error: {0}")]
  Canvas(#[from] CanvasError),

  /// Image comparison harness error.
  #[error("Comparison error: {0}")]
  Compare(#[from] CompareError),

  /// I/O error (reference file reading, etc.).
  #[error("I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Errors raised while creating a drawing surface or its pixel buffer.
///
/// These are the only errors that abort a render: a canvas that cannot be
/// allocated has no best-effort fallback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanvasError {
  /// Requested surface has a zero dimension.
  #[error("canvas size is zero ({width}x{height})")]
  ZeroArea { width: u32, height: u32 },

  /// Requested surface exceeds the allocation cap.
  #[error("canvas {width}x{height} would allocate {bytes} bytes (limit {limit})")]
  Oversized {
    width: u32,
    height: u32,
    bytes: u64,
    limit: u64,
  },

  /// The pixel buffer reservation failed.
  #[error("pixel buffer allocation failed: {message}")]
  AllocationFailed { message: String },

  /// The backend could not construct a surface over the buffer.
  #[error("backend surface creation failed: {message}")]
  Backend { message: String },
}

/// Errors raised by the bitmap comparison harness.
#[derive(Error, Debug)]
pub enum CompareError {
  /// The reference image could not be decoded.
  #[error("failed to decode reference image: {reason}")]
  Decode { reason: String },

  /// The images have different pixel dimensions.
  #[error("image dimensions differ: {actual_width}x{actual_height} vs {expected_width}x{expected_height}")]
  DimensionMismatch {
    actual_width: u32,
    actual_height: u32,
    expected_width: u32,
    expected_height: u32,
  },
}
