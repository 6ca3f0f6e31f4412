// Capture pipeline: backend dispatch → retries → alpha forcing → crop → outcome
//
// This half is platform-neutral and drives any `BackendRegistry`; the
// Windows entry point that resolves targets and owns the native backends
// lives in `native`.

#[cfg(windows)]
pub mod native;

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::capture::backend::BackendRegistry;
use crate::capture::policy::CropMode;
use crate::capture::region::resolve_crop_rect;
use crate::capture::types::{
    CaptureContext, CaptureMethod, CaptureTarget, MonitorTarget, WindowTarget,
};
use crate::config::CaptureOptions;
use crate::error::{CaptureError, CaptureResult};
use crate::geometry::{Pad, Rect};
use crate::image::{ImageBuffer, ImageStats};

/// Result of one successful capture.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    /// Final, cropped pixels.
    pub image: ImageBuffer,
    pub method: CaptureMethod,
    /// Crop mode actually applied (may be implicit).
    pub crop_mode: CropMode,
    /// Screen-space rectangle of `image`.
    pub crop_rect: Rect,
    pub pad: Pad,
    /// Backend invocations, including the successful one.
    pub attempts: u32,
    /// Wall time from first attempt to cropped image.
    pub duration: Duration,
    pub window: Option<WindowTarget>,
    pub monitor: Option<MonitorTarget>,
    pub stats: ImageStats,
}

impl CaptureOutcome {
    /// Save the final image. See [`ImageBuffer::save`].
    pub fn save(&self, path: impl AsRef<Path>, overwrite: bool) -> CaptureResult<()> {
        self.image.save(path, overwrite)
    }
}

/// Screen-space area a target covers.
///
/// Monitor-backed targets use the monitor desktop, windows their outer
/// rectangle, and the virtual screen the bounding rectangle of all monitors.
pub fn default_capture_rect(target: &CaptureTarget, virtual_screen: Rect) -> Rect {
    match target {
        CaptureTarget::VirtualScreen => virtual_screen,
        CaptureTarget::Monitor(m) | CaptureTarget::WindowOnMonitor { monitor: m, .. } => m.desktop,
        CaptureTarget::Window(w) => w.rect,
    }
}

/// Crop mode to apply for `method`.
///
/// An explicit mode always wins. Otherwise methods that duplicate a whole
/// monitor on behalf of a window are framed to the window's outer rectangle,
/// unless `implicit_window_crop` is disabled.
pub fn effective_crop_mode(method: CaptureMethod, options: &CaptureOptions) -> CropMode {
    match options.crop.mode {
        CropMode::None if method.frames_window_on_monitor() && options.implicit_window_crop => {
            CropMode::Window
        }
        mode => mode,
    }
}

/// Run one capture through `registry`.
///
/// A window-based crop without a window target fails before any backend
/// runs. Retryable failures (acquisition and timeouts) are retried up to
/// `options.retries` extra times, back to back; only the last error is
/// returned. Every other failure returns immediately.
#[tracing::instrument(skip_all, fields(method = %ctx.method))]
pub fn run_capture<R>(
    registry: &R,
    ctx: &CaptureContext,
    options: &CaptureOptions,
) -> CaptureResult<CaptureOutcome>
where
    R: BackendRegistry + ?Sized,
{
    let crop_mode = effective_crop_mode(ctx.method, options);
    if crop_mode.needs_window() && ctx.window().is_none() {
        return Err(CaptureError::geometry(
            "run_capture",
            format!("crop {crop_mode} requested but no window target"),
        ));
    }

    let start = Instant::now();
    let (mut image, attempts) = acquire_with_retry(registry, ctx, options.retries)?;

    if options.force_opaque_alpha {
        image.force_opaque_alpha();
    }

    let pad = options.crop.pad;
    let crop_rect = resolve_crop_rect(&crop_mode, ctx.window(), image.screen_rect(), pad)?;
    if crop_rect != image.screen_rect() {
        debug!(%crop_mode, %crop_rect, "cropping capture");
        image.crop_in_place(crop_rect)?;
    }

    let stats = image.stats();
    let duration = start.elapsed();
    info!(
        attempts,
        width = image.width(),
        height = image.height(),
        duration_ms = duration.as_millis() as u64,
        black_ratio = stats.black_ratio,
        "capture complete"
    );

    Ok(CaptureOutcome {
        image,
        method: ctx.method,
        crop_mode,
        crop_rect,
        pad,
        attempts,
        duration,
        window: ctx.window().cloned(),
        monitor: ctx.monitor().cloned(),
        stats,
    })
}

fn acquire_with_retry<R>(
    registry: &R,
    ctx: &CaptureContext,
    retries: u32,
) -> CaptureResult<(ImageBuffer, u32)>
where
    R: BackendRegistry + ?Sized,
{
    let backend = registry.backend(ctx.method.family());
    let max_attempts = retries.saturating_add(1);
    let mut last_err: Option<CaptureError> = None;

    for attempt in 1..=max_attempts {
        match backend.capture(ctx) {
            Ok(image) => return Ok((image, attempt)),
            Err(e) if e.is_retryable() => {
                warn!(attempt, max_attempts, step = e.step(), error = %e, "capture attempt failed");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        CaptureError::acquisition("acquire_with_retry", "no capture attempt was made")
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::policy::CropSpec;
    use crate::capture::types::fixtures;

    #[test]
    fn test_default_capture_rect() {
        let vs = Rect::new(-1920, 0, 1920, 1080);
        let win = fixtures::window(Rect::new(-500, 100, -100, 400));
        let mon = fixtures::monitor(1, Rect::new(-1920, 0, 0, 1080));

        assert_eq!(default_capture_rect(&CaptureTarget::VirtualScreen, vs), vs);
        assert_eq!(default_capture_rect(&CaptureTarget::Window(win.clone()), vs), win.rect);
        assert_eq!(
            default_capture_rect(&CaptureTarget::WindowOnMonitor { window: win, monitor: mon.clone() }, vs),
            mon.desktop
        );
    }

    #[test]
    fn test_implicit_crop_only_for_window_duplication() {
        let opts = CaptureOptions::default();
        assert_eq!(effective_crop_mode(CaptureMethod::DxgiWindow, &opts), CropMode::Window);
        assert_eq!(effective_crop_mode(CaptureMethod::DxgiMonitor, &opts), CropMode::None);
        assert_eq!(effective_crop_mode(CaptureMethod::WgcWindow, &opts), CropMode::None);
    }

    #[test]
    fn test_implicit_crop_yields_to_explicit_mode_and_option() {
        let opts = CaptureOptions::default().crop(CropSpec::new(CropMode::Client, Pad::default()));
        assert_eq!(effective_crop_mode(CaptureMethod::DxgiWindow, &opts), CropMode::Client);

        let opts = CaptureOptions::default().implicit_window_crop(false);
        assert_eq!(effective_crop_mode(CaptureMethod::DxgiWindow, &opts), CropMode::None);
    }
}
