// Backend contract and dispatch table

use super::types::{BackendFamily, CaptureContext};
use crate::error::CaptureResult;
use crate::image::ImageBuffer;

/// One acquisition technology.
///
/// Implementations acquire, copy, map and pack a single frame, and release
/// every native resource before returning. The returned buffer's origin is
/// the screen-space top-left of the captured area.
pub trait CaptureBackend {
    fn capture(&self, ctx: &CaptureContext) -> CaptureResult<ImageBuffer>;
}

/// Maps a method family to the backend that serves it.
pub trait BackendRegistry {
    fn backend(&self, family: BackendFamily) -> &dyn CaptureBackend;
}

impl<F> CaptureBackend for F
where
    F: Fn(&CaptureContext) -> CaptureResult<ImageBuffer>,
{
    fn capture(&self, ctx: &CaptureContext) -> CaptureResult<ImageBuffer> {
        self(ctx)
    }
}
