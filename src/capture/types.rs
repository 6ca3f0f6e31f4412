// Capture model: targets, method identifiers and the per-capture context

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CaptureError, CaptureResult};
use crate::geometry::Rect;

/// Opaque window handle (stored as isize so it can cross threads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

/// Opaque monitor handle (stored as isize so it can cross threads).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonitorHandle(pub isize);

#[cfg(windows)]
impl WindowHandle {
    pub fn from_hwnd(hwnd: windows::Win32::Foundation::HWND) -> Self {
        Self(hwnd.0 as isize)
    }

    pub fn hwnd(self) -> windows::Win32::Foundation::HWND {
        windows::Win32::Foundation::HWND(self.0 as *mut _)
    }
}

#[cfg(windows)]
impl MonitorHandle {
    pub fn from_hmonitor(hmonitor: windows::Win32::Graphics::Gdi::HMONITOR) -> Self {
        Self(hmonitor.0 as isize)
    }

    pub fn hmonitor(self) -> windows::Win32::Graphics::Gdi::HMONITOR {
        windows::Win32::Graphics::Gdi::HMONITOR(self.0 as *mut _)
    }
}

/// Top-level window with every rectangle the region resolver may need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTarget {
    pub handle: WindowHandle,
    pub pid: u32,
    pub title: String,
    pub class_name: String,
    /// Outer window rectangle, including chrome and drop shadow.
    pub rect: Rect,
    /// Client area in screen coordinates.
    pub client_rect: Rect,
    /// DWM extended frame bounds (shadow excluded); equals `rect` when unavailable.
    pub frame_rect: Rect,
    pub visible: bool,
    pub minimized: bool,
    pub cloaked: bool,
    /// Whether the window is its own root ancestor.
    pub is_root: bool,
}

impl WindowTarget {
    /// Visible, not minimized and not cloaked by DWM.
    pub fn is_presentable(&self) -> bool {
        self.visible && !self.minimized && !self.cloaked
    }
}

/// Display monitor in enumeration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorTarget {
    pub handle: MonitorHandle,
    /// Stable index (system enumeration order, not necessarily primary = 0).
    pub index: usize,
    /// Device name, e.g. `\\.\DISPLAY1`.
    pub name: String,
    /// Desktop rectangle in virtual-screen coordinates.
    pub desktop: Rect,
    pub primary: bool,
}

/// What a backend acquires pixels from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    /// A single window.
    Window(WindowTarget),
    /// A whole monitor.
    Monitor(MonitorTarget),
    /// The monitor containing a window (window kept for cropping).
    WindowOnMonitor {
        window: WindowTarget,
        monitor: MonitorTarget,
    },
    /// The whole virtual desktop.
    VirtualScreen,
}

impl CaptureTarget {
    pub fn window(&self) -> Option<&WindowTarget> {
        match self {
            Self::Window(w) | Self::WindowOnMonitor { window: w, .. } => Some(w),
            _ => None,
        }
    }

    pub fn monitor(&self) -> Option<&MonitorTarget> {
        match self {
            Self::Monitor(m) | Self::WindowOnMonitor { monitor: m, .. } => Some(m),
            _ => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Window(_) => "window",
            Self::Monitor(_) => "monitor",
            Self::WindowOnMonitor { .. } => "window-on-monitor",
            Self::VirtualScreen => "virtual-screen",
        }
    }
}

/// Acquisition technology family, selected by method-name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendFamily {
    /// On-screen copy through GDI device contexts.
    Gdi,
    /// DXGI desktop duplication.
    Dxgi,
    /// Windows.Graphics.Capture sessions.
    Wgc,
}

impl BackendFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Gdi => "gdi-",
            Self::Dxgi => "dxgi-",
            Self::Wgc => "wgc-",
        }
    }
}

/// Capture method. The string ids are a stable contract with callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureMethod {
    /// `PrintWindow` with full application-rendered content.
    GdiPrintWindow,
    /// Blit from the window's client-area DC.
    GdiBitBltClient,
    /// Blit from the whole-window DC.
    GdiBitBltWindowDc,
    /// Blit a screen rectangle from the desktop DC.
    GdiBitBltScreen,
    /// Duplicate a monitor.
    DxgiMonitor,
    /// Duplicate the monitor containing a window, framed to that window.
    DxgiWindow,
    /// Capture session on a window.
    WgcWindow,
    /// Capture session on a monitor.
    WgcMonitor,
}

impl CaptureMethod {
    pub const ALL: [CaptureMethod; 8] = [
        Self::GdiPrintWindow,
        Self::GdiBitBltClient,
        Self::GdiBitBltWindowDc,
        Self::GdiBitBltScreen,
        Self::DxgiMonitor,
        Self::DxgiWindow,
        Self::WgcWindow,
        Self::WgcMonitor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GdiPrintWindow => "gdi-printwindow",
            Self::GdiBitBltClient => "gdi-bitblt-client",
            Self::GdiBitBltWindowDc => "gdi-bitblt-windowdc",
            Self::GdiBitBltScreen => "gdi-bitblt-screen",
            Self::DxgiMonitor => "dxgi-monitor",
            Self::DxgiWindow => "dxgi-window",
            Self::WgcWindow => "wgc-window",
            Self::WgcMonitor => "wgc-monitor",
        }
    }

    pub fn family(self) -> BackendFamily {
        match self {
            Self::GdiPrintWindow
            | Self::GdiBitBltClient
            | Self::GdiBitBltWindowDc
            | Self::GdiBitBltScreen => BackendFamily::Gdi,
            Self::DxgiMonitor | Self::DxgiWindow => BackendFamily::Dxgi,
            Self::WgcWindow | Self::WgcMonitor => BackendFamily::Wgc,
        }
    }

    /// Methods that read from a specific window.
    pub fn needs_window(self) -> bool {
        matches!(
            self,
            Self::GdiPrintWindow
                | Self::GdiBitBltClient
                | Self::GdiBitBltWindowDc
                | Self::DxgiWindow
                | Self::WgcWindow
        )
    }

    /// Methods that read from a whole monitor.
    pub fn needs_monitor(self) -> bool {
        matches!(self, Self::DxgiMonitor | Self::DxgiWindow | Self::WgcMonitor)
    }

    /// Duplicates a full monitor but is conceptually a window capture, so the
    /// result is framed to the window unless a crop is requested.
    pub fn frames_window_on_monitor(self) -> bool {
        self == Self::DxgiWindow
    }
}

impl fmt::Display for CaptureMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaptureMethod {
    type Err = CaptureError;

    fn from_str(s: &str) -> CaptureResult<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| CaptureError::config("CaptureMethod::from_str", format!("unknown method '{s}'")))
    }
}

/// Everything one backend invocation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureContext {
    pub method: CaptureMethod,
    pub target: CaptureTarget,
    /// Screen-space area to acquire (used by screen blits and as the
    /// fallback origin for session captures).
    pub capture_rect: Rect,
    /// Upper bound for frame waits.
    pub timeout: Duration,
}

impl CaptureContext {
    /// Build a context, checking that the target fits the method.
    pub fn new(
        method: CaptureMethod,
        target: CaptureTarget,
        capture_rect: Rect,
        timeout: Duration,
    ) -> CaptureResult<Self> {
        let compatible = match (method, &target) {
            (CaptureMethod::GdiBitBltScreen, _) => true,
            (CaptureMethod::DxgiWindow, t) => matches!(t, CaptureTarget::WindowOnMonitor { .. }),
            (m, t) if m.needs_window() => t.window().is_some(),
            (m, t) if m.needs_monitor() => t.monitor().is_some(),
            _ => false,
        };
        if !compatible {
            return Err(CaptureError::config(
                "CaptureContext::new",
                format!("{method} cannot capture a {} target", target.kind_name()),
            ));
        }
        if !capture_rect.is_valid() {
            return Err(CaptureError::geometry(
                "CaptureContext::new",
                format!("capture rect {capture_rect} is empty"),
            ));
        }
        Ok(Self {
            method,
            target,
            capture_rect,
            timeout,
        })
    }

    pub fn window(&self) -> Option<&WindowTarget> {
        self.target.window()
    }

    pub fn monitor(&self) -> Option<&MonitorTarget> {
        self.target.monitor()
    }

    /// Timeout in whole milliseconds, clamped to the Win32 `u32` range.
    pub fn timeout_ms(&self) -> u32 {
        self.timeout.as_millis().min(u32::MAX as u128) as u32
    }
}
