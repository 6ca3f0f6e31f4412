// Capture engine: target model, crop policy, backends

pub mod backend;
pub mod output_scan;
pub mod policy;
pub mod region;
pub mod session;
pub mod target;
pub mod types;

#[cfg(windows)]
pub mod dxgi;
#[cfg(windows)]
pub mod enumerate;
#[cfg(windows)]
pub mod gdi;
#[cfg(windows)]
pub mod monitor;
#[cfg(windows)]
pub mod wgc;

// Re-export commonly used types
pub use backend::{BackendRegistry, CaptureBackend};
pub use policy::{CropMode, CropSpec, DpiMode};
pub use region::resolve_crop_rect;
pub use target::{MonitorSelector, WindowQuery};
pub use types::{
    BackendFamily, CaptureContext, CaptureMethod, CaptureTarget, MonitorHandle, MonitorTarget,
    WindowHandle, WindowTarget,
};
