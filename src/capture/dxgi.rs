// GPU duplication backend: DXGI output duplication → staging readback
//
// The output is located before any device exists, so an unknown monitor
// never creates GPU objects.

use tracing::{debug, info};
use windows::core::Interface;
use windows::Win32::Graphics::Direct3D11::ID3D11Texture2D;
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory1, IDXGIAdapter1, IDXGIFactory1, IDXGIOutput, IDXGIOutput1,
    IDXGIOutputDuplication, IDXGIResource, DXGI_ERROR_NOT_FOUND, DXGI_ERROR_WAIT_TIMEOUT,
    DXGI_OUTDUPL_FRAME_INFO,
};

use super::backend::CaptureBackend;
use super::output_scan::{locate_output, OutputTopology};
use super::types::{CaptureContext, MonitorHandle};
use crate::d3d11::{create_d3d11_device, texture};
use crate::error::{CaptureError, CaptureResult, ErrorKind, WinResultExt};
use crate::image::ImageBuffer;

/// Desktop duplication (`dxgi-*` methods).
#[derive(Debug, Default)]
pub struct DxgiBackend;

impl CaptureBackend for DxgiBackend {
    fn capture(&self, ctx: &CaptureContext) -> CaptureResult<ImageBuffer> {
        let monitor = ctx.monitor().ok_or_else(|| {
            CaptureError::config(
                "DxgiBackend::capture",
                format!("{} requires a monitor target", ctx.method),
            )
        })?;

        let topology = FactoryTopology::new()?;
        let found = locate_output(&topology, monitor.handle)?;
        info!(
            adapter = found.adapter_index,
            output = found.output_index,
            monitor = %monitor.name,
            "duplicating output"
        );

        let output1: IDXGIOutput1 = found
            .output
            .cast()
            .capture_err(ErrorKind::Acquisition, "dxgi_duplicate", "IDXGIOutput1 query failed")?;

        let d3d = create_d3d11_device(Some(&found.adapter))
            .map_err(|e| CaptureError::from_anyhow(ErrorKind::Acquisition, "dxgi_device", e))?;

        // SAFETY: the device was created on the adapter owning this output.
        let dup = unsafe { output1.DuplicateOutput(&d3d.device) }
            .capture_err(ErrorKind::Acquisition, "dxgi_duplicate", "DuplicateOutput failed")?;

        let frame = AcquiredFrame::acquire(&dup, ctx.timeout_ms())?;
        let tex: ID3D11Texture2D = frame
            .resource
            .cast()
            .capture_err(ErrorKind::Acquisition, "dxgi_read", "frame resource to texture failed")?;

        let desktop = monitor.desktop;
        let readback = texture::read_bgra(&d3d, &tex, desktop.width() as u32, desktop.height() as u32)
            .map_err(|e| CaptureError::from_anyhow(ErrorKind::Acquisition, "dxgi_read", e))?;
        drop(frame);

        ImageBuffer::packed(
            readback.width,
            readback.height,
            (desktop.left, desktop.top),
            readback.bgra,
        )
    }
}

// ---------------------------------------------------------------------------
// Output topology over a DXGI factory
// ---------------------------------------------------------------------------

struct FactoryTopology {
    factory: IDXGIFactory1,
}

impl FactoryTopology {
    fn new() -> CaptureResult<Self> {
        // SAFETY: plain factory creation.
        let factory = unsafe { CreateDXGIFactory1::<IDXGIFactory1>() }
            .capture_err(ErrorKind::Acquisition, "locate_output", "CreateDXGIFactory1 failed")?;
        Ok(Self { factory })
    }
}

impl OutputTopology for FactoryTopology {
    type Adapter = IDXGIAdapter1;
    type Output = IDXGIOutput;

    fn adapter(&self, index: u32) -> CaptureResult<Option<IDXGIAdapter1>> {
        match unsafe { self.factory.EnumAdapters1(index) } {
            Ok(adapter) => Ok(Some(adapter)),
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(CaptureError::from_win(
                ErrorKind::Acquisition,
                "locate_output",
                "EnumAdapters1 failed",
                &e,
            )),
        }
    }

    fn output(&self, adapter: &IDXGIAdapter1, index: u32) -> CaptureResult<Option<IDXGIOutput>> {
        match unsafe { adapter.EnumOutputs(index) } {
            Ok(output) => Ok(Some(output)),
            Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => Ok(None),
            Err(e) => Err(CaptureError::from_win(
                ErrorKind::Acquisition,
                "locate_output",
                "EnumOutputs failed",
                &e,
            )),
        }
    }

    fn monitor_of(&self, output: &IDXGIOutput) -> Option<MonitorHandle> {
        let desc = unsafe { output.GetDesc() }.ok()?;
        Some(MonitorHandle::from_hmonitor(desc.Monitor))
    }
}

// ---------------------------------------------------------------------------
// Acquired frame
// ---------------------------------------------------------------------------

/// Frame held by the duplication; released on drop.
struct AcquiredFrame<'a> {
    dup: &'a IDXGIOutputDuplication,
    resource: IDXGIResource,
}

impl<'a> AcquiredFrame<'a> {
    fn acquire(dup: &'a IDXGIOutputDuplication, timeout_ms: u32) -> CaptureResult<Self> {
        let mut info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource: Option<IDXGIResource> = None;

        // SAFETY: out-pointers reference locals that outlive the call.
        let acquired = unsafe { dup.AcquireNextFrame(timeout_ms, &mut info, &mut resource) };
        match acquired {
            Ok(()) => {}
            Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => {
                return Err(CaptureError::from_win(
                    ErrorKind::Acquisition,
                    "dxgi_acquire",
                    format!("AcquireNextFrame timed out after {timeout_ms} ms"),
                    &e,
                )
                .timed_out());
            }
            Err(e) => {
                return Err(CaptureError::from_win(
                    ErrorKind::Acquisition,
                    "dxgi_acquire",
                    "AcquireNextFrame failed",
                    &e,
                ));
            }
        }

        let Some(resource) = resource else {
            release_frame(dup);
            return Err(CaptureError::acquisition(
                "dxgi_acquire",
                "AcquireNextFrame returned no resource",
            ));
        };

        debug!(
            accumulated_frames = info.AccumulatedFrames,
            last_present = info.LastPresentTime,
            "duplication frame acquired"
        );
        Ok(Self { dup, resource })
    }
}

impl Drop for AcquiredFrame<'_> {
    fn drop(&mut self) {
        release_frame(self.dup);
    }
}

fn release_frame(dup: &IDXGIOutputDuplication) {
    // SAFETY: called exactly once per successful AcquireNextFrame.
    if let Err(e) = unsafe { dup.ReleaseFrame() } {
        debug!(error = %e, "ReleaseFrame failed");
    }
}
