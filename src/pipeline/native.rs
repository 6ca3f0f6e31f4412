// Windows entry point: request → resolved targets → native backends

use tracing::info;

use super::{default_capture_rect, run_capture, CaptureOutcome};
use crate::capture::backend::{BackendRegistry, CaptureBackend};
use crate::capture::dxgi::DxgiBackend;
use crate::capture::enumerate::{
    enumerate_monitors, enumerate_windows, foreground_window, virtual_screen_rect,
};
use crate::capture::gdi::GdiBackend;
use crate::capture::monitor::{apply_dpi_mode, monitor_for_window};
use crate::capture::target::{find_monitor, select_window, MonitorSelector, WindowQuery};
use crate::capture::types::{BackendFamily, CaptureContext, CaptureMethod, CaptureTarget, WindowTarget};
use crate::capture::wgc::WgcBackend;
use crate::com::ApartmentGuard;
use crate::config::CaptureOptions;
use crate::error::{CaptureError, CaptureResult, ErrorKind};

/// What to capture, before resolution against the live desktop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    Window(WindowQuery),
    Monitor(MonitorSelector),
    /// The monitor showing the matched window.
    WindowOnMonitor(WindowQuery),
    VirtualScreen,
}

/// One capture request.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub method: CaptureMethod,
    pub target: TargetSpec,
    pub options: CaptureOptions,
}

impl CaptureRequest {
    /// Request with default options (see [`CaptureOptions::from_env`] for overrides).
    pub fn new(method: CaptureMethod, target: TargetSpec) -> Self {
        Self {
            method,
            target,
            options: CaptureOptions::default(),
        }
    }

    pub fn options(mut self, options: CaptureOptions) -> Self {
        self.options = options;
        self
    }
}

/// Dispatch table over the three native backends.
#[derive(Debug, Default)]
pub struct NativeBackends {
    gdi: GdiBackend,
    dxgi: DxgiBackend,
    wgc: WgcBackend,
}

impl BackendRegistry for NativeBackends {
    fn backend(&self, family: BackendFamily) -> &dyn CaptureBackend {
        match family {
            BackendFamily::Gdi => &self.gdi,
            BackendFamily::Dxgi => &self.dxgi,
            BackendFamily::Wgc => &self.wgc,
        }
    }
}

/// Resolve, capture and crop in one call.
///
/// Target resolution failures are returned as-is and never retried.
#[tracing::instrument(skip_all, fields(method = %request.method))]
pub fn capture(request: &CaptureRequest) -> CaptureResult<CaptureOutcome> {
    apply_dpi_mode(request.options.dpi_mode);
    let _apartment = ApartmentGuard::enter_multithreaded()
        .map_err(|e| CaptureError::from_anyhow(ErrorKind::Acquisition, "capture", e))?;

    let ctx = build_context(request)?;
    run_capture(&NativeBackends::default(), &ctx, &request.options)
}

/// Resolve the request's target and build the backend context.
pub fn build_context(request: &CaptureRequest) -> CaptureResult<CaptureContext> {
    let target = resolve_target(&request.target)?;
    let capture_rect = default_capture_rect(&target, virtual_screen_rect());
    info!(
        resolved = ?target_summary(&target),
        %capture_rect,
        "target resolved"
    );
    CaptureContext::new(request.method, target, capture_rect, request.options.timeout)
}

/// Resolve a target spec against the live desktop.
pub fn resolve_target(spec: &TargetSpec) -> CaptureResult<CaptureTarget> {
    match spec {
        TargetSpec::Window(query) => Ok(CaptureTarget::Window(resolve_window(query)?)),
        TargetSpec::Monitor(selector) => {
            let monitors = enumerate_monitors()?;
            Ok(CaptureTarget::Monitor(find_monitor(*selector, &monitors)?))
        }
        TargetSpec::WindowOnMonitor(query) => {
            let window = resolve_window(query)?;
            let monitors = enumerate_monitors()?;
            let monitor = monitor_for_window(&window, &monitors)?;
            Ok(CaptureTarget::WindowOnMonitor { window, monitor })
        }
        TargetSpec::VirtualScreen => Ok(CaptureTarget::VirtualScreen),
    }
}

fn resolve_window(query: &WindowQuery) -> CaptureResult<WindowTarget> {
    let windows = enumerate_windows()?;
    select_window(query, &windows, foreground_window())
}

fn target_summary(target: &CaptureTarget) -> (Option<&str>, Option<&str>) {
    (
        target.window().map(|w| w.title.as_str()),
        target.monitor().map(|m| m.name.as_str()),
    )
}
