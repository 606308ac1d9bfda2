//! Error Types
//!
//! The pipeline itself never fails mid-frame: per-submission problems are
//! logged and skipped. What remains are caller bugs that must surface before
//! a frame begins (bad configuration, zero-sized targets, lifecycle misuse).
//!
//! All fallible public APIs return [`Result<T>`], an alias for
//! `std::result::Result<T, RenderError>`.

use thiserror::Error;

/// The error type for the deferred renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// A frame target was asked to take a zero width or height.
    #[error("Render target '{label}' cannot be zero-sized ({width}x{height})")]
    ZeroSizedTarget {
        /// Debug label of the offending target.
        label: &'static str,
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Renderer settings failed validation.
    #[error("Invalid renderer settings: {0}")]
    InvalidSettings(String),

    /// The frame camera has a non-positive near plane, a far plane not
    /// beyond it, or non-finite matrices.
    #[error("Invalid camera: near {near}, far {far}")]
    InvalidCamera {
        /// Near plane distance.
        near: f32,
        /// Far plane distance.
        far: f32,
    },

    /// Settings JSON could not be parsed.
    #[error("Failed to parse renderer settings: {0}")]
    SettingsParse(#[from] serde_json::Error),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The front buffer handed to `end` is not a live device target.
    #[error("Unknown render target")]
    UnknownTarget,

    /// `end` (or a frame-scoped call) was made outside `begin`/`end`.
    #[error("No frame in progress; call begin() first")]
    FrameNotBegun,

    /// `begin` or a reallocation was requested while a frame is open.
    #[error("A frame is already in progress")]
    FrameInProgress,
}

/// Alias for `Result<T, RenderError>`.
pub type Result<T> = std::result::Result<T, RenderError>;
