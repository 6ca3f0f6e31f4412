// Desktop enumeration: top-level windows, monitors, virtual screen

use std::ffi::c_void;

use windows::core::BOOL;
use windows::Win32::Foundation::{HWND, LPARAM, POINT, RECT};
use windows::Win32::Graphics::Dwm::{
    DwmGetWindowAttribute, DWMWA_CLOAKED, DWMWA_EXTENDED_FRAME_BOUNDS, DWMWINDOWATTRIBUTE,
};
use windows::Win32::Graphics::Gdi::{
    ClientToScreen, EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO,
    MONITORINFOEXW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetAncestor, GetClassNameW, GetClientRect, GetForegroundWindow,
    GetSystemMetrics, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindowVisible, GA_ROOT, SM_CXVIRTUALSCREEN,
    SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN,
};

use super::types::{MonitorHandle, MonitorTarget, WindowHandle, WindowTarget};
use crate::error::{CaptureError, CaptureResult, ErrorKind};
use crate::geometry::Rect;

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

/// Snapshot of every top-level window, in z-order.
pub fn enumerate_windows() -> CaptureResult<Vec<WindowTarget>> {
    let mut handles: Vec<HWND> = Vec::new();
    unsafe {
        EnumWindows(Some(enum_window_proc), LPARAM(&mut handles as *mut _ as isize)).map_err(
            |e| CaptureError::from_win(ErrorKind::TargetResolution, "enumerate_windows", "EnumWindows failed", &e),
        )?;
    }
    Ok(handles.into_iter().map(describe_window).collect())
}

unsafe extern "system" fn enum_window_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
    // SAFETY: lparam points to the Vec<HWND> owned by enumerate_windows(), which
    // outlives the synchronous EnumWindows call.
    let handles = &mut *(lparam.0 as *mut Vec<HWND>);
    handles.push(hwnd);
    BOOL(1)
}

/// Collect every rectangle and flag of one window. Missing data degrades
/// to empty strings, empty rectangles or the outer rectangle.
fn describe_window(hwnd: HWND) -> WindowTarget {
    unsafe {
        let mut pid = 0u32;
        GetWindowThreadProcessId(hwnd, Some(&mut pid));

        let mut rect = RECT::default();
        let rect = match GetWindowRect(hwnd, &mut rect) {
            Ok(()) => Rect::from(rect),
            Err(_) => Rect::default(),
        };

        WindowTarget {
            handle: WindowHandle::from_hwnd(hwnd),
            pid,
            title: window_text(hwnd),
            class_name: class_name(hwnd),
            rect,
            client_rect: client_rect_on_screen(hwnd),
            frame_rect: dwm_rect(hwnd, DWMWA_EXTENDED_FRAME_BOUNDS).unwrap_or(rect),
            visible: IsWindowVisible(hwnd).as_bool(),
            minimized: IsIconic(hwnd).as_bool(),
            cloaked: dwm_u32(hwnd, DWMWA_CLOAKED).is_some_and(|v| v != 0),
            is_root: GetAncestor(hwnd, GA_ROOT) == hwnd,
        }
    }
}

/// Full window title; the buffer is sized from the reported title length.
fn window_text(hwnd: HWND) -> String {
    let len = unsafe { GetWindowTextLengthW(hwnd) };
    if len <= 0 {
        return String::new();
    }
    let mut buf = vec![0u16; len as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..copied.clamp(0, len) as usize])
}

fn class_name(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let len = unsafe { GetClassNameW(hwnd, &mut buf) };
    String::from_utf16_lossy(&buf[..len.max(0) as usize])
}

fn client_rect_on_screen(hwnd: HWND) -> Rect {
    unsafe {
        let mut rc = RECT::default();
        if GetClientRect(hwnd, &mut rc).is_err() {
            return Rect::default();
        }
        let mut top_left = POINT { x: rc.left, y: rc.top };
        let mut bottom_right = POINT {
            x: rc.right,
            y: rc.bottom,
        };
        if !ClientToScreen(hwnd, &mut top_left).as_bool()
            || !ClientToScreen(hwnd, &mut bottom_right).as_bool()
        {
            return Rect::default();
        }
        Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }
}

fn dwm_rect(hwnd: HWND, attribute: DWMWINDOWATTRIBUTE) -> Option<Rect> {
    let mut rc = RECT::default();
    unsafe {
        DwmGetWindowAttribute(
            hwnd,
            attribute,
            &mut rc as *mut RECT as *mut c_void,
            std::mem::size_of::<RECT>() as u32,
        )
        .ok()?;
    }
    Some(Rect::from(rc)).filter(Rect::is_valid)
}

fn dwm_u32(hwnd: HWND, attribute: DWMWINDOWATTRIBUTE) -> Option<u32> {
    let mut value = 0u32;
    unsafe {
        DwmGetWindowAttribute(
            hwnd,
            attribute,
            &mut value as *mut u32 as *mut c_void,
            std::mem::size_of::<u32>() as u32,
        )
        .ok()?;
    }
    Some(value)
}

/// Current foreground window, if any.
pub fn foreground_window() -> Option<WindowHandle> {
    let hwnd = unsafe { GetForegroundWindow() };
    (!hwnd.is_invalid()).then(|| WindowHandle::from_hwnd(hwnd))
}

// ---------------------------------------------------------------------------
// Monitors
// ---------------------------------------------------------------------------

/// All monitors in system enumeration order.
pub fn enumerate_monitors() -> CaptureResult<Vec<MonitorTarget>> {
    let mut monitors: Vec<MonitorTarget> = Vec::new();
    let ok = unsafe {
        EnumDisplayMonitors(
            Some(HDC::default()),
            None,
            Some(enum_monitor_proc),
            LPARAM(&mut monitors as *mut _ as isize),
        )
    };
    if !ok.as_bool() {
        return Err(CaptureError::last_os_error(
            ErrorKind::TargetResolution,
            "enumerate_monitors",
            "EnumDisplayMonitors failed",
        ));
    }
    if monitors.is_empty() {
        return Err(CaptureError::target("enumerate_monitors", "no monitors detected"));
    }
    Ok(monitors)
}

unsafe extern "system" fn enum_monitor_proc(
    hmonitor: HMONITOR,
    _: HDC,
    _: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    // SAFETY: lparam points to the Vec owned by enumerate_monitors(); the
    // callback runs synchronously on the same thread.
    let monitors = &mut *(lparam.0 as *mut Vec<MonitorTarget>);

    let mut info = MONITORINFOEXW {
        monitorInfo: MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFOEXW>() as u32,
            ..Default::default()
        },
        ..Default::default()
    };
    if GetMonitorInfoW(hmonitor, &mut info.monitorInfo as *mut _ as *mut _).as_bool() {
        let name = String::from_utf16_lossy(&info.szDevice)
            .trim_end_matches('\0')
            .to_string();
        monitors.push(MonitorTarget {
            handle: MonitorHandle::from_hmonitor(hmonitor),
            index: monitors.len(),
            name,
            desktop: Rect::from(info.monitorInfo.rcMonitor),
            primary: (info.monitorInfo.dwFlags & 1) != 0, // MONITORINFOF_PRIMARY
        });
    }

    BOOL(1)
}

/// Bounding rectangle of all monitors.
pub fn virtual_screen_rect() -> Rect {
    unsafe {
        Rect::from_xywh(
            GetSystemMetrics(SM_XVIRTUALSCREEN),
            GetSystemMetrics(SM_YVIRTUALSCREEN),
            GetSystemMetrics(SM_CXVIRTUALSCREEN),
            GetSystemMetrics(SM_CYVIRTUALSCREEN),
        )
    }
}
