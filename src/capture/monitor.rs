// DPI awareness and window → monitor mapping

use std::sync::OnceLock;

use tracing::{debug, warn};
use windows::Win32::Graphics::Gdi::{MonitorFromWindow, MONITOR_DEFAULTTONEAREST};
use windows::Win32::UI::HiDpi::{
    SetProcessDpiAwarenessContext, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
    DPI_AWARENESS_CONTEXT_SYSTEM_AWARE,
};

use super::policy::DpiMode;
use super::types::{MonitorHandle, MonitorTarget, WindowTarget};
use crate::error::{CaptureError, CaptureResult};

static DPI_MODE: OnceLock<DpiMode> = OnceLock::new();

/// Set process DPI awareness so enumerated rectangles are physical pixels.
///
/// Awareness is process-wide and can only be set once, so only the first
/// call touches the OS; later calls return the mode already in effect.
/// Best effort: a refusal (awareness fixed by a manifest) is only logged.
pub fn apply_dpi_mode(mode: DpiMode) -> DpiMode {
    let applied = *DPI_MODE.get_or_init(|| {
        set_process_awareness(mode);
        mode
    });
    if applied != mode {
        debug!(
            requested = mode.name(),
            applied = applied.name(),
            "DPI awareness already set for this process"
        );
    }
    applied
}

fn set_process_awareness(mode: DpiMode) {
    unsafe {
        let applied = match mode {
            DpiMode::Auto | DpiMode::PerMonitorV2 => {
                SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2)
                    .or_else(|e| {
                        debug!(error = %e, "per-monitor v2 awareness refused, trying system");
                        SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_SYSTEM_AWARE)
                    })
            }
            DpiMode::System => SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_SYSTEM_AWARE),
        };
        if let Err(e) = applied {
            warn!(dpi_mode = mode.name(), error = %e, "DPI awareness left unchanged");
        }
    }
}

/// Monitor nearest to `window`, looked up in an enumeration snapshot.
pub fn monitor_for_window(
    window: &WindowTarget,
    monitors: &[MonitorTarget],
) -> CaptureResult<MonitorTarget> {
    // SAFETY: MonitorFromWindow with DEFAULTTONEAREST accepts any handle.
    let hmonitor = unsafe { MonitorFromWindow(window.handle.hwnd(), MONITOR_DEFAULTTONEAREST) };
    let handle = MonitorHandle::from_hmonitor(hmonitor);
    monitors
        .iter()
        .find(|m| m.handle == handle)
        .cloned()
        .ok_or_else(|| {
            CaptureError::target(
                "monitor_for_window",
                format!("no monitor contains window 0x{:X}", window.handle.0),
            )
        })
}
