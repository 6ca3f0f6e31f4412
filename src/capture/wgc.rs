// Capture-session backend: Windows Graphics Capture, one frame per capture
//
// The FrameArrived callback runs on a system thread and only forwards the
// first frame into a one-shot channel; the capturing thread waits on it with
// the context timeout. Session, frame pool and callback registration are torn
// down on every exit path.

use tracing::debug;
use windows::core::Interface;
use windows::Foundation::TypedEventHandler;
use windows::Graphics::Capture::{
    Direct3D11CaptureFrame, Direct3D11CaptureFramePool, GraphicsCaptureItem, GraphicsCaptureSession,
};
use windows::Graphics::DirectX::Direct3D11::IDirect3DSurface;
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::System::WinRT::Direct3D11::IDirect3DDxgiInterfaceAccess;
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

use super::backend::CaptureBackend;
use super::session::{with_first_frame, FrameSession, FrameSink};
use super::types::{CaptureContext, CaptureMethod};
use crate::d3d11::{create_d3d11_device, texture, D3D11Context};
use crate::error::{CaptureError, CaptureResult, ErrorKind, WinResultExt};
use crate::image::ImageBuffer;

/// Windows Graphics Capture (`wgc-*` methods).
#[derive(Debug, Default)]
pub struct WgcBackend;

impl CaptureBackend for WgcBackend {
    fn capture(&self, ctx: &CaptureContext) -> CaptureResult<ImageBuffer> {
        ensure_supported()?;

        let origin = frame_origin(ctx)?;
        let item = match ctx.method {
            CaptureMethod::WgcWindow => {
                let w = ctx.window().ok_or_else(|| target_mismatch(ctx, "window"))?;
                create_capture_item(CaptureSource::Window(w.handle.hwnd()))?
            }
            _ => {
                let m = ctx.monitor().ok_or_else(|| target_mismatch(ctx, "monitor"))?;
                create_capture_item(CaptureSource::Monitor(m.handle.hmonitor()))?
            }
        };

        let d3d = create_d3d11_device(None)
            .map_err(|e| CaptureError::from_anyhow(ErrorKind::Acquisition, "wgc_device", e))?;
        let session = WgcSession::open(&d3d, item)?;

        with_first_frame(session, ctx.timeout, |_, frame| {
            let tex = frame_to_texture(&frame)?;
            let readback = texture::read_bgra(&d3d, &tex, u32::MAX, u32::MAX)
                .map_err(|e| CaptureError::from_anyhow(ErrorKind::Acquisition, "wgc_read", e))?;
            ImageBuffer::packed(readback.width, readback.height, origin, readback.bgra)
        })
    }
}

/// Screen-space top-left of the frames a session delivers for `ctx`.
///
/// Window sessions render the DWM extended frame (drop shadow excluded), so
/// the origin is the frame rectangle, not the outer window rectangle.
fn frame_origin(ctx: &CaptureContext) -> CaptureResult<(i32, i32)> {
    match ctx.method {
        CaptureMethod::WgcWindow => {
            let w = ctx.window().ok_or_else(|| target_mismatch(ctx, "window"))?;
            Ok((w.frame_rect.left, w.frame_rect.top))
        }
        CaptureMethod::WgcMonitor => Ok((ctx.capture_rect.left, ctx.capture_rect.top)),
        other => Err(CaptureError::config(
            "WgcBackend::capture",
            format!("{other} is not a capture-session method"),
        )),
    }
}

fn target_mismatch(ctx: &CaptureContext, wanted: &str) -> CaptureError {
    CaptureError::config(
        "WgcBackend::capture",
        format!("{} requires a {wanted} target", ctx.method),
    )
}

fn ensure_supported() -> CaptureResult<()> {
    let supported = GraphicsCaptureSession::IsSupported()
        .capture_err(ErrorKind::Acquisition, "wgc_supported", "IsSupported query failed")?;
    if !supported {
        return Err(CaptureError::acquisition(
            "wgc_supported",
            "Windows.Graphics.Capture is not supported on this system",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Capture item
// ---------------------------------------------------------------------------

enum CaptureSource {
    Window(windows::Win32::Foundation::HWND),
    Monitor(windows::Win32::Graphics::Gdi::HMONITOR),
}

fn create_capture_item(source: CaptureSource) -> CaptureResult<GraphicsCaptureItem> {
    let interop = windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()
        .capture_err(
            ErrorKind::Acquisition,
            "wgc_item",
            "Failed to get IGraphicsCaptureItemInterop factory",
        )?;

    // SAFETY: handles come from a fresh enumeration; stale ones fail with an HRESULT.
    unsafe {
        match source {
            CaptureSource::Window(hwnd) => interop.CreateForWindow(hwnd).capture_err(
                ErrorKind::Acquisition,
                "wgc_item",
                "Failed to create CaptureItem for window",
            ),
            CaptureSource::Monitor(hmonitor) => interop.CreateForMonitor(hmonitor).capture_err(
                ErrorKind::Acquisition,
                "wgc_item",
                "Failed to create CaptureItem for monitor",
            ),
        }
    }
}

/// Extract the `ID3D11Texture2D` behind a capture frame.
///
/// `frame` must outlive every use of the returned texture.
fn frame_to_texture(frame: &Direct3D11CaptureFrame) -> CaptureResult<ID3D11Texture2D> {
    let surface: IDirect3DSurface = frame
        .Surface()
        .capture_err(ErrorKind::Acquisition, "wgc_read", "Frame surface unavailable")?;
    let access: IDirect3DDxgiInterfaceAccess = surface
        .cast()
        .capture_err(ErrorKind::Acquisition, "wgc_read", "Surface interop cast failed")?;

    // SAFETY: access was obtained from a live surface above.
    unsafe { access.GetInterface() }.capture_err(
        ErrorKind::Acquisition,
        "wgc_read",
        "Failed to get ID3D11Texture2D interface",
    )
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Free-threaded frame pool plus capture session for one item.
struct WgcSession {
    _item: GraphicsCaptureItem,
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
    /// FrameArrived registration, removed on close
    frame_arrived_token: Option<i64>,
    closed: bool,
}

impl WgcSession {
    fn open(d3d: &D3D11Context, item: GraphicsCaptureItem) -> CaptureResult<Self> {
        let winrt_device = d3d
            .winrt_device()
            .map_err(|e| CaptureError::from_anyhow(ErrorKind::Acquisition, "wgc_session", e))?;
        let size = item
            .Size()
            .capture_err(ErrorKind::Acquisition, "wgc_session", "CaptureItem size unavailable")?;

        let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
            &winrt_device,
            DirectXPixelFormat::B8G8R8A8UIntNormalized,
            1,
            size,
        )
        .capture_err(ErrorKind::Acquisition, "wgc_session", "CreateFreeThreaded failed")?;

        let session = match frame_pool.CreateCaptureSession(&item) {
            Ok(session) => session,
            Err(e) => {
                let _ = frame_pool.Close();
                return Err(CaptureError::from_win(
                    ErrorKind::Acquisition,
                    "wgc_session",
                    "CreateCaptureSession failed",
                    &e,
                ));
            }
        };
        if let Err(e) = session.SetIsBorderRequired(false) {
            debug!(error = %e, "capture border cannot be disabled");
        }

        debug!(width = size.Width, height = size.Height, "capture session created");
        Ok(Self {
            _item: item,
            frame_pool,
            session,
            frame_arrived_token: None,
            closed: false,
        })
    }
}

impl FrameSession for WgcSession {
    type Frame = Direct3D11CaptureFrame;

    fn start(&mut self, sink: FrameSink<Direct3D11CaptureFrame>) -> CaptureResult<()> {
        let handler = TypedEventHandler::<Direct3D11CaptureFramePool, windows::core::IInspectable>::new(
            move |pool, _| {
                if let Some(pool) = pool.as_ref() {
                    if let Ok(frame) = pool.TryGetNextFrame() {
                        sink.offer(frame);
                    }
                }
                Ok(())
            },
        );
        let token = self
            .frame_pool
            .FrameArrived(&handler)
            .capture_err(ErrorKind::Acquisition, "wgc_session", "FrameArrived registration failed")?;
        self.frame_arrived_token = Some(token);

        self.session
            .StartCapture()
            .capture_err(ErrorKind::Acquisition, "wgc_session", "StartCapture failed")
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(token) = self.frame_arrived_token.take() {
            if let Err(e) = self.frame_pool.RemoveFrameArrived(token) {
                debug!(error = %e, "RemoveFrameArrived failed");
            }
        }
        if let Err(e) = self.session.Close() {
            debug!(error = %e, "capture session close failed");
        }
        if let Err(e) = self.frame_pool.Close() {
            debug!(error = %e, "frame pool close failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{fixtures, CaptureTarget};
    use crate::error::ErrorKind;
    use crate::geometry::Rect;
    use std::time::Duration;

    #[test]
    fn test_window_frames_start_at_dwm_frame() {
        let win = fixtures::window(Rect::new(100, 100, 500, 400));
        let ctx = CaptureContext::new(
            CaptureMethod::WgcWindow,
            CaptureTarget::Window(win.clone()),
            win.rect,
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(frame_origin(&ctx).unwrap(), (win.frame_rect.left, win.frame_rect.top));
        assert_ne!(frame_origin(&ctx).unwrap(), (win.rect.left, win.rect.top));
    }

    #[test]
    fn test_monitor_frames_start_at_desktop() {
        let mon = fixtures::monitor(1, Rect::new(-1920, 0, 0, 1080));
        let ctx = CaptureContext::new(
            CaptureMethod::WgcMonitor,
            CaptureTarget::Monitor(mon.clone()),
            mon.desktop,
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(frame_origin(&ctx).unwrap(), (-1920, 0));
    }

    #[test]
    fn test_non_session_method_is_rejected() {
        let mon = fixtures::monitor(0, Rect::new(0, 0, 1920, 1080));
        let ctx = CaptureContext::new(
            CaptureMethod::DxgiMonitor,
            CaptureTarget::Monitor(mon.clone()),
            mon.desktop,
            Duration::from_millis(100),
        )
        .unwrap();

        assert_eq!(frame_origin(&ctx).unwrap_err().kind(), ErrorKind::Configuration);
    }
}
