//! Error taxonomy for the pelorus rendering core.
//!
//! Per-feature failures are recovered locally (the feature is skipped and the
//! frame continues); construction-time failures surface as `Err` and leave the
//! engine unbuilt. Absent attributes are `Option::None`, never an error.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, S52Error>;

#[derive(Debug, Error)]
pub enum S52Error {
    /// `begin`/`end` called while another cycle is active, or out of order.
    #[error("render cycle out of sync: {0}")]
    CycleOutOfSync(&'static str),

    /// A geographic-to-projected transform was attempted before the Mercator
    /// origin was bound by the first chart load.
    #[error("projection origin not set; load a chart first")]
    ProjectionNotSet,

    /// A second attempt to bind the Mercator origin.
    #[error("projection origin already set")]
    OriginAlreadySet,

    /// Non-canonical (W>E, S>N) or non-finite projected extent.
    #[error("invalid extent: W={w} S={s} E={e} N={n}")]
    ExtentInvalid { w: f64, s: f64, e: f64, n: f64 },

    /// The polygon tessellator rejected a feature's rings.
    #[error("tessellator error: {0}")]
    Tessellator(String),

    /// GPU buffer creation/upload failed; the cached handle stays invalid and
    /// the upload is retried next frame.
    #[error("GPU buffer upload failed: {0}")]
    UploadFailure(&'static str),

    /// No adapter/device, or the context died underneath us.
    #[error("GPU init failed: {0}")]
    GpuInit(String),

    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    #[error("pipeline link failed: {0}")]
    ShaderLink(String),

    /// Offscreen pattern-tile target could not be created; pattern rendering
    /// for that symbol is disabled for the session.
    #[error("offscreen target incomplete: {0}")]
    FramebufferIncomplete(String),

    /// More objects drawn in one pick cycle than the 8-bit index space holds.
    #[error("pick color-index overflow (> {0} objects in one cycle)")]
    PickOverflow(u32),

    /// A touch role already holds a different feature.
    #[error("touch role {0} already occupied")]
    TouchOccupied(&'static str),

    /// Geometry does not meet a command's shape requirement.
    #[error("bad geometry: {0}")]
    BadGeometry(&'static str),
}
