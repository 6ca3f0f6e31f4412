// D3D11 device creation

pub mod texture;

use anyhow::{Context, Result};
use windows::core::Interface;
use windows::Graphics::DirectX::Direct3D11::IDirect3DDevice;
use windows::Win32::Foundation::HMODULE;
use windows::Win32::Graphics::Direct3D::*;
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;
use windows::Win32::System::WinRT::Direct3D11::CreateDirect3D11DeviceFromDXGIDevice;

/// D3D11 device and its immediate context
pub struct D3D11Context {
    pub device: ID3D11Device,
    pub context: ID3D11DeviceContext,
}

impl D3D11Context {
    /// WinRT wrapper around the device, as required by capture frame pools.
    pub fn winrt_device(&self) -> Result<IDirect3DDevice> {
        let dxgi_device: IDXGIDevice = self
            .device
            .cast()
            .context("ID3D11Device -> IDXGIDevice cast failed")?;
        // SAFETY: dxgi_device is a live DXGI device obtained above.
        let inspectable = unsafe {
            CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)
                .context("CreateDirect3D11DeviceFromDXGIDevice failed")?
        };
        inspectable
            .cast()
            .context("IInspectable -> IDirect3DDevice cast failed")
    }
}

/// Create a BGRA-capable device.
///
/// With `adapter`, the device is created on that adapter (driver type
/// unknown); duplication requires the device to live on the adapter that
/// owns the duplicated output. Without one, the default hardware adapter is used.
pub fn create_d3d11_device(adapter: Option<&IDXGIAdapter1>) -> Result<D3D11Context> {
    let driver_type = if adapter.is_some() {
        D3D_DRIVER_TYPE_UNKNOWN
    } else {
        D3D_DRIVER_TYPE_HARDWARE
    };
    let adapter: Option<IDXGIAdapter> = adapter
        .map(|a| a.cast())
        .transpose()
        .context("IDXGIAdapter1 -> IDXGIAdapter cast failed")?;

    let (device, context) = unsafe {
        let mut device = None;
        let mut context = None;

        D3D11CreateDevice(
            adapter.as_ref(),
            driver_type,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .context("D3D11CreateDevice failed")?;

        (
            device.context("D3D11CreateDevice returned no device")?,
            context.context("D3D11CreateDevice returned no context")?,
        )
    };

    if let Err(e) = log_device_info(&device) {
        tracing::debug!(error = %e, "device info unavailable");
    }

    Ok(D3D11Context { device, context })
}

fn log_device_info(device: &ID3D11Device) -> Result<()> {
    let dxgi_device: IDXGIDevice = device.cast()?;
    unsafe {
        let adapter = dxgi_device.GetAdapter()?;
        let desc = adapter.GetDesc()?;
        let name = String::from_utf16_lossy(&desc.Description);

        tracing::debug!(
            gpu = name.trim_end_matches('\0'),
            vram_mb = desc.DedicatedVideoMemory / 1024 / 1024,
            "D3D11 device created"
        );
    }
    Ok(())
}
