// On-screen copy backend: window/screen device contexts → top-down 32-bit DIB
//
// Every GDI object lives in a guard so that each early return releases the
// DCs, restores the previous selection and deletes the bitmap.

use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::null_mut;

use tracing::debug;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, GetWindowDC,
    ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, CAPTUREBLT, DIB_RGB_COLORS,
    HBITMAP, HDC, HGDIOBJ, ROP_CODE, SRCCOPY,
};
use windows::Win32::Storage::Xps::{PrintWindow, PRINT_WINDOW_FLAGS};

use super::backend::CaptureBackend;
use super::types::{CaptureContext, CaptureMethod, WindowTarget};
use crate::error::{CaptureError, CaptureResult, ErrorKind};
use crate::geometry::Rect;
use crate::image::ImageBuffer;

/// Ask the window to render its full content, including DirectComposition surfaces.
const PW_RENDERFULLCONTENT: PRINT_WINDOW_FLAGS = PRINT_WINDOW_FLAGS(2);

/// On-screen copy through GDI (`gdi-*` methods).
#[derive(Debug, Default)]
pub struct GdiBackend;

impl CaptureBackend for GdiBackend {
    fn capture(&self, ctx: &CaptureContext) -> CaptureResult<ImageBuffer> {
        match ctx.method {
            CaptureMethod::GdiPrintWindow => {
                let w = require_window(ctx)?;
                let src = WindowDc::window(w.handle.hwnd())?;
                let surface = DibSurface::new(src.hdc, w.rect)?;
                // SAFETY: hwnd and the memory DC are valid for this call.
                let ok = unsafe { PrintWindow(w.handle.hwnd(), surface.mem.0, PW_RENDERFULLCONTENT) };
                if !ok.as_bool() {
                    return Err(CaptureError::last_os_error(
                        ErrorKind::Acquisition,
                        "gdi_print_window",
                        "PrintWindow failed",
                    ));
                }
                surface.into_image(w.rect)
            }
            CaptureMethod::GdiBitBltClient => {
                let w = require_window(ctx)?;
                let src = WindowDc::client(w.handle.hwnd())?;
                blit(src.hdc, (0, 0), w.client_rect)
            }
            CaptureMethod::GdiBitBltWindowDc => {
                let w = require_window(ctx)?;
                let src = WindowDc::window(w.handle.hwnd())?;
                blit(src.hdc, (0, 0), w.rect)
            }
            CaptureMethod::GdiBitBltScreen => {
                let src = WindowDc::screen()?;
                let r = ctx.capture_rect;
                blit(src.hdc, (r.left, r.top), r)
            }
            other => Err(CaptureError::config(
                "GdiBackend::capture",
                format!("{other} is not an on-screen copy method"),
            )),
        }
    }
}

fn require_window(ctx: &CaptureContext) -> CaptureResult<&WindowTarget> {
    ctx.window().ok_or_else(|| {
        CaptureError::config(
            "GdiBackend::capture",
            format!("{} requires a window target", ctx.method),
        )
    })
}

/// Copy `area.width() x area.height()` pixels from `src` at `src_origin`
/// into a fresh DIB; the result is anchored at `area`'s top-left.
fn blit(src: HDC, src_origin: (i32, i32), area: Rect) -> CaptureResult<ImageBuffer> {
    let surface = DibSurface::new(src, area)?;
    // SAFETY: both DCs are live for the duration of the call.
    unsafe {
        BitBlt(
            surface.mem.0,
            0,
            0,
            area.width(),
            area.height(),
            Some(src),
            src_origin.0,
            src_origin.1,
            ROP_CODE(SRCCOPY.0 | CAPTUREBLT.0),
        )
    }
    .map_err(|e| {
        CaptureError::from_win(ErrorKind::Acquisition, "gdi_blit", "BitBlt failed", &e)
            .with_win32_error(e.code().0 as u32 & 0xFFFF)
    })?;
    surface.into_image(area)
}

// ---------------------------------------------------------------------------
// Scoped GDI resources
// ---------------------------------------------------------------------------

/// DC from GetDC/GetWindowDC, released on drop.
struct WindowDc {
    hwnd: Option<HWND>,
    hdc: HDC,
}

impl WindowDc {
    fn screen() -> CaptureResult<Self> {
        Self::acquire(None, false, "GetDC(NULL) failed")
    }

    fn client(hwnd: HWND) -> CaptureResult<Self> {
        Self::acquire(Some(hwnd), false, "GetDC(hwnd) failed")
    }

    fn window(hwnd: HWND) -> CaptureResult<Self> {
        Self::acquire(Some(hwnd), true, "GetWindowDC failed")
    }

    fn acquire(hwnd: Option<HWND>, whole_window: bool, message: &'static str) -> CaptureResult<Self> {
        // SAFETY: a stale or null hwnd yields a null DC, which is checked below.
        let hdc = unsafe {
            if whole_window {
                GetWindowDC(hwnd)
            } else {
                GetDC(hwnd)
            }
        };
        if hdc.is_invalid() {
            return Err(CaptureError::last_os_error(ErrorKind::Acquisition, "gdi_get_dc", message));
        }
        Ok(Self { hwnd, hdc })
    }
}

impl Drop for WindowDc {
    fn drop(&mut self) {
        // SAFETY: hdc was obtained for self.hwnd and is released once.
        let released = unsafe { ReleaseDC(self.hwnd, self.hdc) };
        if released == 0 {
            debug!("ReleaseDC reported failure");
        }
    }
}

/// Memory DC, deleted on drop.
struct MemoryDc(HDC);

impl Drop for MemoryDc {
    fn drop(&mut self) {
        // SAFETY: created by CreateCompatibleDC and deleted once.
        unsafe {
            let _ = DeleteDC(self.0);
        }
    }
}

/// Top-down 32-bit DIB selected into a memory DC.
///
/// Drop restores the previous selection and deletes the bitmap, then the
/// memory DC itself is deleted.
struct DibSurface {
    bitmap: HBITMAP,
    previous: HGDIOBJ,
    bits: *mut u8,
    width: usize,
    height: usize,
    mem: MemoryDc,
}

impl DibSurface {
    fn new(compatible_with: HDC, area: Rect) -> CaptureResult<Self> {
        if !area.is_valid() {
            return Err(CaptureError::acquisition(
                "gdi_surface",
                format!("invalid source size {}x{} ({area})", area.width(), area.height()),
            ));
        }
        let (width, height) = (area.width(), area.height());

        // SAFETY: compatible_with is a live DC owned by the caller.
        let mem = MemoryDc(unsafe { CreateCompatibleDC(Some(compatible_with)) });
        if mem.0.is_invalid() {
            return Err(CaptureError::last_os_error(
                ErrorKind::Acquisition,
                "gdi_surface",
                "CreateCompatibleDC failed",
            ));
        }

        let mut info = BITMAPINFO::default();
        info.bmiHeader.biSize = size_of::<BITMAPINFOHEADER>() as u32;
        info.bmiHeader.biWidth = width;
        info.bmiHeader.biHeight = -height;
        info.bmiHeader.biPlanes = 1;
        info.bmiHeader.biBitCount = 32;
        info.bmiHeader.biCompression = BI_RGB.0;

        let mut bits: *mut c_void = null_mut();
        // SAFETY: info describes a 32-bit top-down DIB; bits receives its pixel pointer.
        let bitmap = unsafe { CreateDIBSection(Some(mem.0), &info, DIB_RGB_COLORS, &mut bits, None, 0) }
            .map_err(|e| {
                CaptureError::from_win(ErrorKind::Acquisition, "gdi_surface", "CreateDIBSection failed", &e)
            })?;
        if bits.is_null() {
            // SAFETY: bitmap was just created and is not selected anywhere.
            unsafe {
                let _ = DeleteObject(bitmap.into());
            }
            return Err(CaptureError::acquisition(
                "gdi_surface",
                "CreateDIBSection returned no pixel storage",
            ));
        }

        // SAFETY: both handles are valid; the previous object is restored on drop.
        let previous = unsafe { SelectObject(mem.0, bitmap.into()) };

        Ok(Self {
            bitmap,
            previous,
            bits: bits.cast(),
            width: width as usize,
            height: height as usize,
            mem,
        })
    }

    /// Copy the DIB pixels out, anchored at `area`'s top-left.
    fn into_image(self, area: Rect) -> CaptureResult<ImageBuffer> {
        let len = self.width * self.height * 4;
        // SAFETY: the DIB section owns width * height * 4 bytes (32 bpp,
        // DWORD-aligned rows) for as long as the bitmap lives.
        let pixels = unsafe { std::slice::from_raw_parts(self.bits, len) }.to_vec();
        ImageBuffer::packed(self.width as u32, self.height as u32, (area.left, area.top), pixels)
    }
}

impl Drop for DibSurface {
    fn drop(&mut self) {
        // SAFETY: previous was returned by SelectObject on this DC.
        unsafe {
            let _ = SelectObject(self.mem.0, self.previous);
            let _ = DeleteObject(self.bitmap.into());
        }
    }
}
