// GPU texture readback into packed BGRA rows

use anyhow::{bail, Context, Result};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::Common::*;

use super::D3D11Context;

/// Packed BGRA pixels read back from a texture.
pub struct Readback {
    pub width: u32,
    pub height: u32,
    /// `width * 4` bytes per row, top-down.
    pub bgra: Vec<u8>,
}

/// Unmaps a mapped subresource on drop.
struct MappedGuard<'a> {
    context: &'a ID3D11DeviceContext,
    resource: &'a ID3D11Texture2D,
}

impl Drop for MappedGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: constructed only after a successful Map of subresource 0.
        unsafe {
            self.context.Unmap(self.resource, 0);
        }
    }
}

/// Copy `source` to a CPU-readable staging texture and pack its top-left
/// `max_width` x `max_height` pixels (clamped to the texture size).
///
/// The source must be `DXGI_FORMAT_B8G8R8A8_UNORM`.
pub fn read_bgra(
    d3d: &D3D11Context,
    source: &ID3D11Texture2D,
    max_width: u32,
    max_height: u32,
) -> Result<Readback> {
    let mut desc = D3D11_TEXTURE2D_DESC::default();
    unsafe {
        source.GetDesc(&mut desc);
    }
    if desc.Format != DXGI_FORMAT_B8G8R8A8_UNORM {
        bail!("Unsupported texture format {:?}, expected B8G8R8A8_UNORM", desc.Format);
    }

    let width = max_width.min(desc.Width);
    let height = max_height.min(desc.Height);
    if width == 0 || height == 0 {
        bail!("Texture region is empty ({}x{})", width, height);
    }

    let staging_desc = D3D11_TEXTURE2D_DESC {
        MipLevels: 1,
        ArraySize: 1,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        Usage: D3D11_USAGE_STAGING,
        BindFlags: 0,
        CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
        MiscFlags: 0,
        ..desc
    };

    let staging = unsafe {
        let mut texture = None;
        d3d.device
            .CreateTexture2D(&staging_desc, None, Some(&mut texture))
            .context("Failed to create staging texture")?;
        texture.context("CreateTexture2D returned no texture")?
    };

    unsafe {
        d3d.context.CopyResource(&staging, source);

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        d3d.context
            .Map(&staging, 0, D3D11_MAP_READ, 0, Some(&mut mapped))
            .context("Failed to map staging texture")?;
        let _unmap = MappedGuard {
            context: &d3d.context,
            resource: &staging,
        };

        let row_pitch = mapped.RowPitch as usize;
        let row_bytes = width as usize * 4;
        if mapped.pData.is_null() || row_pitch < row_bytes {
            bail!("Mapped staging texture has invalid layout (pitch {})", row_pitch);
        }

        // SAFETY: the mapping covers RowPitch * desc.Height bytes, and
        // height <= desc.Height, row_bytes <= RowPitch.
        let src = std::slice::from_raw_parts(
            mapped.pData as *const u8,
            row_pitch * (height as usize - 1) + row_bytes,
        );
        let mut bgra = Vec::with_capacity(row_bytes * height as usize);
        for y in 0..height as usize {
            let start = y * row_pitch;
            bgra.extend_from_slice(&src[start..start + row_bytes]);
        }

        Ok(Readback {
            width,
            height,
            bgra,
        })
    }
}
